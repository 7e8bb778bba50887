use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use merchhours_core::config::CalculationConfig;
use merchhours_core::errors::ConversationError;
use merchhours_core::flows::{
    ConversationReply, ConversationService, PresentationRequest, SessionId,
};

use crate::{
    commands::{
        classify_text, parse_callback, BotCommand, CallbackAction, CallbackParseError,
        InboundText, MenuAction,
    },
    templates::{self, MessageTemplate},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUpdate {
    pub update_id: String,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Message(MessageEvent),
    Callback(CallbackEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Message(_) => ChatEventType::Message,
            Self::Callback(_) => ChatEventType::Callback,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Message(event) => Some(event.chat_id),
            Self::Callback(event) => Some(event.chat_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Message,
    Callback,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

/// A pressed inline keyboard button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackEvent {
    pub chat_id: i64,
    pub user_id: i64,
    pub callback_id: String,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<MessageTemplate>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Callback(#[from] CallbackParseError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&update.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(update, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wired to a conversation service: text messages and button callbacks.
pub fn conversation_dispatcher(service: Arc<ConversationService>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(service.clone()));
    dispatcher.register(CallbackHandler::new(service));
    dispatcher
}

pub struct MessageHandler {
    service: Arc<ConversationService>,
}

impl MessageHandler {
    pub fn new(service: Arc<ConversationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Message
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Message(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };
        let session = SessionId::from(event.chat_id);
        let settings = self.service.engine().settings();

        let messages = match classify_text(&event.text) {
            InboundText::Command(BotCommand::Start) => {
                self.service.registry().reset(&session).await;
                info!(
                    event_name = "chat.command.start",
                    correlation_id = %ctx.correlation_id,
                    chat_id = event.chat_id,
                    user_id = event.user_id,
                    "conversation started"
                );
                vec![templates::welcome_message()]
            }
            InboundText::Command(BotCommand::Help) => vec![templates::help_message(settings)],
            InboundText::Command(BotCommand::Unknown { command }) => {
                vec![templates::unknown_command_message(&command)]
            }
            InboundText::Menu(MenuAction::StartCalculation) => {
                let outcome = self.service.begin_session(&session).await;
                render_presentation(outcome, settings)
            }
            InboundText::Menu(MenuAction::NewCalculation) => {
                let outcome = self.service.restart(&session).await;
                render_presentation(outcome, settings)
            }
            InboundText::Free(text) => {
                let outcome = self.service.submit_text(&session, &text).await;
                render_reply(outcome, settings)
            }
        };

        debug!(
            event_name = "chat.message.handled",
            correlation_id = %ctx.correlation_id,
            chat_id = event.chat_id,
            responses = messages.len(),
            "message handled"
        );
        Ok(HandlerResult::Responded(messages))
    }
}

pub struct CallbackHandler {
    service: Arc<ConversationService>,
}

impl CallbackHandler {
    pub fn new(service: Arc<ConversationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for CallbackHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Callback
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Callback(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };
        let session = SessionId::from(event.chat_id);
        let settings = self.service.engine().settings();

        let messages = match parse_callback(&event.data)? {
            CallbackAction::SupplierChosen { index } => {
                let outcome = self.service.submit_supplier_choice(&session, index).await;
                render_presentation(outcome, settings)
            }
            CallbackAction::ManualEntry => {
                let outcome = self.service.request_manual_entry(&session).await;
                render_presentation(outcome, settings)
            }
            CallbackAction::MonthChosen { month } => {
                let outcome = self.service.submit_month(&session, month).await;
                render_reply(outcome.map(ConversationReply::Report), settings)
            }
        };

        debug!(
            event_name = "chat.callback.handled",
            correlation_id = %ctx.correlation_id,
            chat_id = event.chat_id,
            callback_id = %event.callback_id,
            responses = messages.len(),
            "callback handled"
        );
        Ok(HandlerResult::Responded(messages))
    }
}

fn render_presentation(
    outcome: Result<PresentationRequest, ConversationError>,
    settings: &CalculationConfig,
) -> Vec<MessageTemplate> {
    render_reply(outcome.map(ConversationReply::Present), settings)
}

pub fn render_reply(
    outcome: Result<ConversationReply, ConversationError>,
    settings: &CalculationConfig,
) -> Vec<MessageTemplate> {
    match outcome {
        Ok(ConversationReply::Present(request)) => vec![render_request(&request)],
        Ok(ConversationReply::Report(report)) => vec![
            templates::calculating_message(&report, settings),
            templates::report_message(&report, settings),
            templates::new_calculation_prompt(),
        ],
        Err(error) => render_error(&error, settings),
    }
}

pub fn render_request(request: &PresentationRequest) -> MessageTemplate {
    match request {
        PresentationRequest::SupplierChoices { suppliers } => {
            templates::supplier_choices_message(suppliers)
        }
        PresentationRequest::SupplierTextEntry => templates::supplier_text_prompt(),
        PresentationRequest::YearEntry { supplier, min_year, max_year } => {
            templates::year_prompt(supplier, *min_year, *max_year)
        }
        PresentationRequest::MonthChoices { year, month_names } => {
            templates::month_choices_message(*year, month_names)
        }
    }
}

pub fn render_error(error: &ConversationError, settings: &CalculationConfig) -> Vec<MessageTemplate> {
    match error {
        ConversationError::Unrecognized => vec![templates::unknown_message(settings)],
        ConversationError::NoMatch { suppliers, .. } if !suppliers.is_empty() => vec![
            templates::error_message(error),
            templates::supplier_choices_message(suppliers),
        ],
        _ if !error.is_recoverable() => {
            vec![templates::error_message(error), templates::new_calculation_prompt()]
        }
        _ => vec![templates::error_message(error)],
    }
}
