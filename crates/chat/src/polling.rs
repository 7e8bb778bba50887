use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{ChatUpdate, EventContext, EventDispatcher, HandlerResult};
use crate::templates::MessageTemplate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Connection to a chat platform. `next_update` returns `None` once the stream is closed.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError>;
    async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError>;
    async fn send(&self, chat_id: i64, message: &MessageTemplate) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _update_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, _chat_id: i64, _message: &MessageTemplate) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct PollingRunner {
    transport: Arc<dyn ChatTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await?;
        info!(attempt, "chat transport connected");

        loop {
            let Some(update) = self.transport.next_update().await? else {
                info!(attempt, "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let chat_id = update.event.chat_id();

            info!(
                event_name = "ingress.chat.update_received",
                update_id = %update.update_id,
                event_type = ?update.event.event_type(),
                correlation_id = %update.update_id,
                chat_id = chat_id.unwrap_or_default(),
                "received chat update"
            );

            if let Err(error) = self.transport.acknowledge(&update.update_id).await {
                warn!(
                    event_name = "ingress.chat.ack_sent",
                    update_id = %update.update_id,
                    correlation_id = %update.update_id,
                    error = %error,
                    "failed to acknowledge chat update"
                );
            } else {
                debug!(
                    event_name = "ingress.chat.ack_sent",
                    update_id = %update.update_id,
                    correlation_id = %update.update_id,
                    "acknowledged chat update"
                );
            }

            let context = EventContext { correlation_id: update.update_id.clone() };
            let messages = match self.dispatcher.dispatch(&update, &context).await {
                Ok(HandlerResult::Responded(messages)) => messages,
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => continue,
                Err(error) => {
                    warn!(
                        update_id = %update.update_id,
                        correlation_id = %update.update_id,
                        error = %error,
                        "event dispatch failed; continuing polling loop"
                    );
                    continue;
                }
            };

            let Some(chat_id) = chat_id else {
                continue;
            };
            for message in &messages {
                if let Err(error) = self.transport.send(chat_id, message).await {
                    warn!(
                        event_name = "egress.chat.send_failed",
                        update_id = %update.update_id,
                        correlation_id = %update.update_id,
                        chat_id,
                        error = %error,
                        "failed to send chat response"
                    );
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use tokio::sync::Mutex;

    use merchhours_core::config::CalculationConfig;
    use merchhours_core::flows::{ConversationEngine, ConversationService};
    use merchhours_core::lookup::InMemoryLookupProvider;

    use super::{ChatTransport, PollingRunner, ReconnectPolicy, TransportError};
    use crate::commands::START_CALCULATION_LABEL;
    use crate::events::{
        conversation_dispatcher, CallbackEvent, ChatEvent, ChatUpdate, EventDispatcher,
        MessageEvent,
    };
    use crate::templates::MessageTemplate;

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        updates: VecDeque<Result<Option<ChatUpdate>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        sent: Vec<(i64, MessageTemplate)>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            updates: Vec<Result<Option<ChatUpdate>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    updates: updates.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn sent(&self) -> Vec<(i64, MessageTemplate)> {
            self.state.lock().await.sent.clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError> {
            let mut state = self.state.lock().await;
            state.updates.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(update_id.to_owned());
            Ok(())
        }

        async fn send(&self, chat_id: i64, message: &MessageTemplate) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.sent.push((chat_id, message.clone()));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn text(update_id: &str, chat_id: i64, text: &str) -> Result<Option<ChatUpdate>, TransportError> {
        Ok(Some(ChatUpdate {
            update_id: update_id.to_owned(),
            event: ChatEvent::Message(MessageEvent { chat_id, user_id: 1, text: text.to_owned() }),
        }))
    }

    fn press(update_id: &str, chat_id: i64, data: &str) -> Result<Option<ChatUpdate>, TransportError> {
        Ok(Some(ChatUpdate {
            update_id: update_id.to_owned(),
            event: ChatEvent::Callback(CallbackEvent {
                chat_id,
                user_id: 1,
                callback_id: format!("cq-{update_id}"),
                data: data.to_owned(),
            }),
        }))
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![
                Ok(Some(ChatUpdate {
                    update_id: "upd-1".to_owned(),
                    event: ChatEvent::Unsupported { event_type: "poll".to_owned() },
                })),
                Ok(None),
            ],
        ));

        let runner = PollingRunner::new(transport.clone(), EventDispatcher::default(), no_delay(2));

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["upd-1"]);
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = PollingRunner::new(transport.clone(), EventDispatcher::default(), no_delay(2));

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn conversation_responses_are_sent_back_to_the_chat() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 5, d).expect("valid date");
        let provider = InMemoryLookupProvider::new()
            .with_plan("Beta Logistics (3300)", day(1), 1.0)
            .with_shift("Beta Logistics (3300)", day(3), Duration::hours(180));
        let service = Arc::new(ConversationService::new(ConversationEngine::from_config(
            Arc::new(provider),
            CalculationConfig::default(),
        )));

        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                text("u1", 77, START_CALCULATION_LABEL),
                press("u2", 77, "supplier_0"),
                text("u3", 77, "2025"),
                press("u4", 77, "not-a-button"),
                press("u5", 77, "month_5"),
                Ok(None),
            ],
        ));
        let runner = PollingRunner::new(transport.clone(), conversation_dispatcher(service), no_delay(0));

        runner.start().await.expect("runner");

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 6);
        assert!(sent.iter().all(|(chat_id, _)| *chat_id == 77));
        assert!(sent[4].1.text.contains("OVERTIME"));
        assert!(sent[4].1.text.contains("25,000 KZT"));
        assert_eq!(transport.acknowledgements().await.len(), 5);
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0).as_millis(), 100);
        assert_eq!(policy.backoff(2).as_millis(), 400);
        assert_eq!(policy.backoff(6).as_millis(), 1_000);
    }
}
