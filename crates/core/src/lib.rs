pub mod calc;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod lookup;

pub use calc::{
    perform_full_calculation, CalculationError, DeterministicUtilizationEngine, UtilizationEngine,
    UtilizationRates, UtilizationReport, UtilizationVerdict, VerdictKind,
};
pub use domain::period::{Period, PeriodError};
pub use domain::supplier::SupplierIdentity;
pub use errors::{ConversationError, InputError};
pub use flows::{
    ConversationContext, ConversationEngine, ConversationEvent, ConversationReply,
    ConversationService, ConversationSession, ConversationState, PresentationRequest, SessionId,
    SessionRegistry,
};
pub use lookup::{
    resolve_supplier, InMemoryLookupProvider, LookupError, LookupProvider, TimeoutLookupProvider,
};
