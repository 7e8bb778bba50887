use thiserror::Error;

use crate::calc::CalculationError;
use crate::domain::supplier::SupplierIdentity;
use crate::flows::states::ConversationState;
use crate::lookup::LookupError;

/// Malformed user input. The session never advances on any of these.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("supplier position {index} is outside the {available} presented choices")]
    SupplierIndexOutOfRange { index: usize, available: usize },
    #[error("supplier code or name is empty")]
    EmptySupplierToken,
    #[error("`{text}` is not a year")]
    YearNotNumeric { text: String },
    #[error("year {year} is outside {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },
    #[error("month {0} is not in 1..=12")]
    MonthOutOfRange(u32),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConversationError {
    #[error("data source unavailable: {0}")]
    DataUnavailable(String),
    #[error("no supplier matches `{token}`")]
    NoMatch { token: String, suppliers: Vec<SupplierIdentity> },
    #[error("no suppliers found in the data source")]
    NoSuppliers,
    #[error("no worked hours recorded for {supplier} in {year}-{month:02}")]
    NoActualData { supplier: String, year: i32, month: u32 },
    #[error("no staffing plan for {supplier} in {year}-{month:02}")]
    NoPlanData { supplier: String, year: i32, month: u32 },
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error("input does not fit the current step ({state:?})")]
    OutOfTurn { state: ConversationState },
    #[error("session data is incomplete; start a new calculation")]
    IncompleteSession,
    #[error("unrecognized input")]
    Unrecognized,
}

impl ConversationError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::NoActualData { .. }
                | Self::NoPlanData { .. }
                | Self::NoSuppliers
                | Self::IncompleteSession
        )
    }

    /// Instruction telling the user what to (re)submit, when there is one.
    pub fn retry_hint(&self) -> Option<&'static str> {
        match self {
            Self::DataUnavailable(_) => Some("Please try the same step again in a moment."),
            Self::NoMatch { .. } => Some("Pick a supplier from the list or enter another code or name."),
            Self::InvalidInput(InputError::SupplierIndexOutOfRange { .. }) => {
                Some("Pick one of the suppliers shown in the list.")
            }
            Self::InvalidInput(InputError::EmptySupplierToken) => {
                Some("Enter a supplier code (for example 1064) or part of its name.")
            }
            Self::InvalidInput(InputError::YearNotNumeric { .. }) => {
                Some("Enter a year as a number, for example 2025.")
            }
            Self::InvalidInput(InputError::YearOutOfRange { .. }) => {
                Some("Enter a year inside the allowed range.")
            }
            Self::InvalidInput(InputError::MonthOutOfRange(_)) => {
                Some("Pick a month from the keyboard.")
            }
            Self::OutOfTurn { .. } => Some("Follow the current prompt or press New calculation."),
            Self::Unrecognized | Self::IncompleteSession => Some("Press Start calculation to begin."),
            Self::NoSuppliers | Self::NoActualData { .. } | Self::NoPlanData { .. } => None,
        }
    }
}

impl From<LookupError> for ConversationError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::DataUnavailable(detail) => Self::DataUnavailable(detail),
        }
    }
}

impl From<CalculationError> for ConversationError {
    fn from(error: CalculationError) -> Self {
        match error {
            CalculationError::DataUnavailable(detail) => Self::DataUnavailable(detail),
            CalculationError::NoActualData { supplier, year, month } => {
                Self::NoActualData { supplier, year, month }
            }
            CalculationError::NoPlanData { supplier, year, month } => {
                Self::NoPlanData { supplier, year, month }
            }
        }
    }
}
