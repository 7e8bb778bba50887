use serde::{Deserialize, Serialize};

use crate::calc::UtilizationReport;
use crate::domain::supplier::SupplierIdentity;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingSupplierChoice,
    AwaitingSupplierTextInput,
    AwaitingYear,
    AwaitingMonth,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationEvent {
    StartRequested,
    RestartRequested,
    SupplierChosen { index: usize },
    ManualEntryRequested,
    SupplierTextSubmitted { token: String },
    YearSubmitted { text: String },
    MonthChosen { month: u32 },
}

impl ConversationEvent {
    /// Interprets free text according to the step that is waiting for it.
    pub fn from_text(state: ConversationState, text: &str) -> Option<Self> {
        match state {
            ConversationState::AwaitingSupplierTextInput => {
                Some(Self::SupplierTextSubmitted { token: text.to_owned() })
            }
            ConversationState::AwaitingYear => Some(Self::YearSubmitted { text: text.to_owned() }),
            _ => None,
        }
    }
}

/// Inputs collected so far for one session.
///
/// `candidate_suppliers` is the snapshot that was presented to the user; positional choices are
/// always checked against it. `selected_month` only lives for the duration of a calculation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub candidate_suppliers: Vec<SupplierIdentity>,
    pub selected_supplier: Option<SupplierIdentity>,
    pub selected_year: Option<i32>,
    pub selected_month: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub state: ConversationState,
    pub context: ConversationContext,
}

impl ConversationSession {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What the presentation layer should show next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationRequest {
    SupplierChoices { suppliers: Vec<SupplierIdentity> },
    SupplierTextEntry,
    YearEntry { supplier: SupplierIdentity, min_year: i32, max_year: i32 },
    MonthChoices { year: i32, month_names: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConversationReply {
    Present(PresentationRequest),
    Report(UtilizationReport),
}
