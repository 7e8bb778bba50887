pub mod engine;
pub mod sessions;
pub mod states;

pub use engine::ConversationEngine;
pub use sessions::{ConversationService, SessionId, SessionRegistry};
pub use states::{
    ConversationContext, ConversationEvent, ConversationReply, ConversationSession,
    ConversationState, PresentationRequest,
};
