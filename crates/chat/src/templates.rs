use serde::Serialize;

use merchhours_core::calc::{UtilizationReport, VerdictKind};
use merchhours_core::config::CalculationConfig;
use merchhours_core::domain::supplier::SupplierIdentity;
use merchhours_core::errors::{ConversationError, InputError};

use crate::commands::{
    month_callback, supplier_callback, MANUAL_ENTRY_CALLBACK, MANUAL_ENTRY_LABEL,
    NEW_CALCULATION_LABEL, START_CALCULATION_LABEL,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    Plain,
    Html,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Keyboard {
    Inline { rows: Vec<Vec<InlineButton>> },
    Reply { rows: Vec<Vec<String>>, resize: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub text: String,
    pub parse_mode: ParseMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
}

impl MessageTemplate {
    pub fn inline_buttons(&self) -> Vec<&InlineButton> {
        match &self.keyboard {
            Some(Keyboard::Inline { rows }) => rows.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }
}

pub struct MessageBuilder {
    lines: Vec<String>,
    parse_mode: ParseMode,
    keyboard: Option<Keyboard>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self { lines: Vec::new(), parse_mode: ParseMode::Plain, keyboard: None }
    }

    pub fn html() -> Self {
        Self { parse_mode: ParseMode::Html, ..Self::new() }
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    pub fn blank(self) -> Self {
        self.line("")
    }

    pub fn inline_keyboard<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut InlineKeyboardBuilder),
    {
        let mut builder = InlineKeyboardBuilder::default();
        build(&mut builder);
        self.keyboard = Some(Keyboard::Inline { rows: builder.rows });
        self
    }

    pub fn reply_keyboard(mut self, labels: &[&str]) -> Self {
        self.keyboard = Some(Keyboard::Reply {
            rows: labels.iter().map(|label| vec![(*label).to_owned()]).collect(),
            resize: true,
        });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { text: self.lines.join("\n"), parse_mode: self.parse_mode, keyboard: self.keyboard }
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct InlineKeyboardBuilder {
    rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboardBuilder {
    /// Adds a row holding a single button.
    pub fn button(&mut self, button: InlineButton) -> &mut Self {
        self.rows.push(vec![button]);
        self
    }
}

pub fn welcome_message() -> MessageTemplate {
    MessageBuilder::new()
        .line("🚀 Welcome to the supplier hours calculation bot!")
        .blank()
        .line("This bot calculates:")
        .line("• Actual hours worked")
        .line("• Planned hours from FTE")
        .line("• Underwork or overtime analysis")
        .line("• Cost of unworked hours")
        .blank()
        .line("Press the button below to begin 👇")
        .reply_keyboard(&[START_CALCULATION_LABEL])
        .build()
}

pub fn help_message(settings: &CalculationConfig) -> MessageTemplate {
    MessageBuilder::html()
        .line("📚 <b>How to use the bot</b>")
        .blank()
        .line("<b>Commands:</b>")
        .line("/start - Start working with the bot")
        .line("/help - Show this help")
        .blank()
        .line("<b>Steps:</b>")
        .line(format!("1. Press \"{START_CALCULATION_LABEL}\""))
        .line("2. Pick a supplier from the list OR enter its code or name")
        .line(format!("3. Enter a year ({}-{})", settings.year_range_min, settings.year_range_max))
        .line("4. Pick a month")
        .line("5. Receive the calculation result")
        .blank()
        .line("<b>Finding a supplier:</b>")
        .line("• Pick it from the list")
        .line("• Or enter its code (for example 1064)")
        .line("• Or enter the company name")
        .blank()
        .line("<b>Constants:</b>")
        .line(format!("• {} hours per 1 FTE", format_number(settings.hours_per_fte)))
        .line(format!(
            "• {} {} per 1 FTE",
            format_thousands(settings.cost_per_fte),
            escape_html(&settings.currency)
        ))
        .build()
}

fn available_actions(builder: MessageBuilder) -> MessageBuilder {
    builder
        .line("<b>Available commands:</b>")
        .line("/start - Start working with the bot")
        .line("/help - Show help")
        .blank()
        .line("<b>Available actions:</b>")
        .line(format!("{START_CALCULATION_LABEL} - Run a supplier hours calculation"))
        .line(format!("{NEW_CALCULATION_LABEL} - Run another calculation"))
}

pub fn unknown_command_message(command: &str) -> MessageTemplate {
    let builder = MessageBuilder::html()
        .line(format!("❌ <b>Unknown command: {}</b>", escape_html(command)))
        .blank();
    available_actions(builder).blank().line("Use /help for detailed instructions.").build()
}

pub fn unknown_message(settings: &CalculationConfig) -> MessageTemplate {
    let builder = MessageBuilder::html().line("🤖 <b>Unknown message</b>").blank();
    available_actions(builder)
        .blank()
        .line("<b>How to use the bot:</b>")
        .line(format!("1. Press \"{START_CALCULATION_LABEL}\""))
        .line("2. Pick a supplier from the list OR enter its code or name")
        .line(format!("3. Enter a year ({}-{})", settings.year_range_min, settings.year_range_max))
        .line("4. Pick a month")
        .line("5. Receive the calculation result")
        .blank()
        .line("If a calculation is in progress, follow the bot's prompts.")
        .build()
}

pub fn supplier_choices_message(suppliers: &[SupplierIdentity]) -> MessageTemplate {
    MessageBuilder::new()
        .line("🏢 Pick a supplier to analyse:")
        .blank()
        .line(format!("Found {} suppliers", suppliers.len()))
        .blank()
        .line(format!("Or press '{MANUAL_ENTRY_LABEL}' if you know the code"))
        .inline_keyboard(|keyboard| {
            for (index, supplier) in suppliers.iter().enumerate() {
                keyboard.button(InlineButton::new(
                    format!("{}. {supplier}", index + 1),
                    supplier_callback(index),
                ));
            }
            keyboard.button(InlineButton::new(MANUAL_ENTRY_LABEL, MANUAL_ENTRY_CALLBACK));
        })
        .build()
}

pub fn supplier_text_prompt() -> MessageTemplate {
    MessageBuilder::new()
        .line("🔢 Enter the supplier code (for example 1064):")
        .blank()
        .line("Or enter the full company name:")
        .build()
}

pub fn year_prompt(supplier: &SupplierIdentity, min_year: i32, max_year: i32) -> MessageTemplate {
    MessageBuilder::new()
        .line(format!("✅ Supplier selected: {supplier}"))
        .blank()
        .line(format!("📅 Now enter the year to analyse ({min_year}-{max_year}, for example 2025):"))
        .build()
}

pub fn month_choices_message(year: i32, month_names: &[String]) -> MessageTemplate {
    MessageBuilder::new()
        .line(format!("✅ Year: {year}"))
        .blank()
        .line("📅 Pick a month:")
        .inline_keyboard(|keyboard| {
            for (month, name) in (1_u32..).zip(month_names) {
                keyboard.button(InlineButton::new(format!("{month}. {name}"), month_callback(month)));
            }
        })
        .build()
}

pub fn calculating_message(report: &UtilizationReport, settings: &CalculationConfig) -> MessageTemplate {
    MessageBuilder::new()
        .line("🔄 Calculating for:")
        .line(format!("🏢 Supplier: {}", report.supplier))
        .line(format!("📅 Period: {}", period_label(report, settings)))
        .line(format!("📅 Dates: {} - {}", report.period.start, report.period.end))
        .build()
}

pub fn report_message(report: &UtilizationReport, settings: &CalculationConfig) -> MessageTemplate {
    let verdict = &report.verdict;
    let currency = escape_html(&settings.currency);
    let builder = MessageBuilder::html()
        .line("📊 <b>Calculation result</b>")
        .blank()
        .line(format!("🏢 <b>Supplier:</b> {}", escape_html(report.supplier.as_str())))
        .line(format!("📅 <b>Period:</b> {}", escape_html(&period_label(report, settings))))
        .line(format!("📅 <b>Dates:</b> {} - {}", report.period.start, report.period.end))
        .blank()
        .line(format!("⏰ <b>Actual hours worked:</b> {:.2} hours", report.actual_hours))
        .line(format!("📈 <b>Actual FTE worked:</b> {:.2}", report.actual_fte))
        .line(format!("📊 <b>Planned hours:</b> {:.2} hours", verdict.planned_hours))
        .line(format!("📈 <b>Planned FTE:</b> {:.2}", report.planned_fte))
        .blank();

    let builder = match verdict.kind {
        VerdictKind::Underwork => builder
            .line("❌ <b>UNDERWORK</b>")
            .line(format!("⏰ Hours not worked: {:.2}", verdict.hours_difference))
            .line(format!("📉 FTE not worked: {:.2}", verdict.fte_difference))
            .line(format!("💰 Cost of unworked hours: {} {currency}", format_thousands(verdict.cost))),
        VerdictKind::Overtime => builder
            .line("🔄 <b>OVERTIME</b>")
            .line(format!("⏰ Overtime hours: {:.2}", verdict.hours_difference))
            .line(format!("📈 Overtime FTE: {:.2}", verdict.fte_difference))
            .line(format!("💰 Cost of overtime: {} {currency}", format_thousands(verdict.cost))),
        VerdictKind::Exact => builder
            .line("✅ <b>WORK MATCHES THE PLAN EXACTLY!</b>")
            .line(format!("💰 Additional cost: 0 {currency}")),
    };
    builder.build()
}

pub fn new_calculation_prompt() -> MessageTemplate {
    MessageBuilder::new()
        .line("🔄 Would you like to run a new calculation?")
        .reply_keyboard(&[NEW_CALCULATION_LABEL])
        .build()
}

pub fn error_message(error: &ConversationError) -> MessageTemplate {
    let summary = match error {
        ConversationError::DataUnavailable(_) => {
            "❌ Database connection error. Please try again later.".to_owned()
        }
        ConversationError::NoMatch { token, .. } => {
            format!("❌ Supplier with code or name '{token}' was not found.")
        }
        ConversationError::NoSuppliers => "❌ No suppliers found in the database.".to_owned(),
        ConversationError::NoActualData { supplier, year, month } => {
            format!("❌ No worked hours found for {supplier} in {month:02}.{year}.")
        }
        ConversationError::NoPlanData { supplier, year, month } => {
            format!("❌ No FTE plan found for {supplier} in {month:02}.{year}.")
        }
        ConversationError::InvalidInput(InputError::SupplierIndexOutOfRange { .. }) => {
            "❌ Invalid supplier position.".to_owned()
        }
        ConversationError::InvalidInput(InputError::EmptySupplierToken) => {
            "❌ Enter a supplier code or name.".to_owned()
        }
        ConversationError::InvalidInput(InputError::YearNotNumeric { .. }) => {
            "❌ Please enter a valid year.".to_owned()
        }
        ConversationError::InvalidInput(InputError::YearOutOfRange { min, max, .. }) => {
            format!("❌ The year must be between {min} and {max}.")
        }
        ConversationError::InvalidInput(InputError::MonthOutOfRange(month)) => {
            format!("❌ Month {month} does not exist.")
        }
        ConversationError::OutOfTurn { .. } => "❌ This input does not fit the current step.".to_owned(),
        ConversationError::IncompleteSession => "❌ Error: calculation data not found.".to_owned(),
        ConversationError::Unrecognized => "🤖 Unknown message.".to_owned(),
    };

    let builder = MessageBuilder::new().line(summary);
    match error.retry_hint() {
        Some(hint) => builder.blank().line(hint).build(),
        None => builder.build(),
    }
}

fn period_label(report: &UtilizationReport, settings: &CalculationConfig) -> String {
    let month = report.period.month();
    let name = settings.month_name(month).map(str::to_owned).unwrap_or_else(|| format!("{month:02}"));
    format!("{name} {}", report.period.year())
}

/// Rounds to whole units and groups thousands with commas, e.g. `37500.4` becomes `37,500`.
pub fn format_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value < 0.0 && digits != "0" {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
