use thiserror::Error;

pub const START_CALCULATION_LABEL: &str = "📊 Start calculation";
pub const NEW_CALCULATION_LABEL: &str = "📊 New calculation";
pub const MANUAL_ENTRY_LABEL: &str = "🔢 Enter supplier code";
pub const MANUAL_ENTRY_CALLBACK: &str = "supplier_code_input";

const SUPPLIER_CALLBACK_PREFIX: &str = "supplier_";
const MONTH_CALLBACK_PREFIX: &str = "month_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Unknown { command: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    StartCalculation,
    NewCalculation,
}

/// Classified inbound message text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundText {
    Command(BotCommand),
    Menu(MenuAction),
    Free(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    SupplierChosen { index: usize },
    ManualEntry,
    MonthChosen { month: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackParseError {
    #[error("unsupported callback payload: {0}")]
    Unsupported(String),
    #[error("invalid supplier position in callback payload: {0}")]
    InvalidSupplierIndex(String),
    #[error("invalid month in callback payload: {0}")]
    InvalidMonth(String),
}

pub fn classify_text(text: &str) -> InboundText {
    let trimmed = text.trim();

    if let Some(command) = trimmed.strip_prefix('/') {
        let name = command.split_whitespace().next().unwrap_or_default();
        let name = name.split('@').next().unwrap_or_default().to_ascii_lowercase();
        return InboundText::Command(match name.as_str() {
            "start" => BotCommand::Start,
            "help" => BotCommand::Help,
            _ => BotCommand::Unknown { command: trimmed.to_owned() },
        });
    }

    if matches_label(trimmed, START_CALCULATION_LABEL) {
        return InboundText::Menu(MenuAction::StartCalculation);
    }
    if matches_label(trimmed, NEW_CALCULATION_LABEL) {
        return InboundText::Menu(MenuAction::NewCalculation);
    }

    InboundText::Free(trimmed.to_owned())
}

/// Accepts the button label verbatim or typed without its emoji.
fn matches_label(text: &str, label: &str) -> bool {
    if text == label {
        return true;
    }
    let bare = label.split_once(' ').map(|(_, rest)| rest).unwrap_or(label);
    text.eq_ignore_ascii_case(bare)
}

pub fn parse_callback(data: &str) -> Result<CallbackAction, CallbackParseError> {
    if data == MANUAL_ENTRY_CALLBACK {
        return Ok(CallbackAction::ManualEntry);
    }

    if let Some(raw) = data.strip_prefix(MONTH_CALLBACK_PREFIX) {
        let month =
            raw.parse::<u32>().map_err(|_| CallbackParseError::InvalidMonth(data.to_owned()))?;
        return Ok(CallbackAction::MonthChosen { month });
    }

    if let Some(raw) = data.strip_prefix(SUPPLIER_CALLBACK_PREFIX) {
        let index = raw
            .parse::<usize>()
            .map_err(|_| CallbackParseError::InvalidSupplierIndex(data.to_owned()))?;
        return Ok(CallbackAction::SupplierChosen { index });
    }

    Err(CallbackParseError::Unsupported(data.to_owned()))
}

pub fn supplier_callback(index: usize) -> String {
    format!("{SUPPLIER_CALLBACK_PREFIX}{index}")
}

pub fn month_callback(month: u32) -> String {
    format!("{MONTH_CALLBACK_PREFIX}{month}")
}

#[cfg(test)]
mod tests {
    use super::{
        classify_text, month_callback, parse_callback, supplier_callback, BotCommand,
        CallbackAction, CallbackParseError, InboundText, MenuAction, NEW_CALCULATION_LABEL,
        START_CALCULATION_LABEL,
    };

    #[test]
    fn commands_are_recognized_with_bot_suffix() {
        assert_eq!(classify_text("/start"), InboundText::Command(BotCommand::Start));
        assert_eq!(classify_text(" /HELP "), InboundText::Command(BotCommand::Help));
        assert_eq!(classify_text("/start@merch_bot"), InboundText::Command(BotCommand::Start));
        assert_eq!(
            classify_text("/report now"),
            InboundText::Command(BotCommand::Unknown { command: "/report now".to_owned() })
        );
    }

    #[test]
    fn menu_labels_are_recognized_with_or_without_emoji() {
        assert_eq!(
            classify_text(START_CALCULATION_LABEL),
            InboundText::Menu(MenuAction::StartCalculation)
        );
        assert_eq!(
            classify_text(NEW_CALCULATION_LABEL),
            InboundText::Menu(MenuAction::NewCalculation)
        );
        assert_eq!(classify_text("start calculation"), InboundText::Menu(MenuAction::StartCalculation));
    }

    #[test]
    fn other_text_is_free_and_trimmed() {
        assert_eq!(classify_text("  1064 "), InboundText::Free("1064".to_owned()));
    }

    #[test]
    fn callbacks_round_trip_through_builders() {
        assert_eq!(
            parse_callback(&supplier_callback(3)),
            Ok(CallbackAction::SupplierChosen { index: 3 })
        );
        assert_eq!(parse_callback(&month_callback(12)), Ok(CallbackAction::MonthChosen { month: 12 }));
        assert_eq!(parse_callback("supplier_code_input"), Ok(CallbackAction::ManualEntry));
    }

    #[test]
    fn malformed_callbacks_are_rejected() {
        assert_eq!(
            parse_callback("supplier_x"),
            Err(CallbackParseError::InvalidSupplierIndex("supplier_x".to_owned()))
        );
        assert_eq!(
            parse_callback("month_-1"),
            Err(CallbackParseError::InvalidMonth("month_-1".to_owned()))
        );
        assert_eq!(
            parse_callback("refresh"),
            Err(CallbackParseError::Unsupported("refresh".to_owned()))
        );
    }
}
