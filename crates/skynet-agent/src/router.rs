use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::provider::{ChatRequest, ChatResponse, LlmProvider};

/// A single provider slot inside the `ProviderRouter`.
pub struct ProviderSlot {
    pub provider: Box<dyn LlmProvider>,
    /// Number of retries on this slot before moving to the next.
    pub max_retries: u32,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>, max_retries: u32) -> Self {
        Self { provider, max_retries }
    }
}

/// Routes requests across providers in priority order with automatic
/// failover.
///
/// Retryable errors (network, transient 5xx, rate-limit) advance to the
/// next slot. An authentication failure (`no_api_key`/`unauthorized`) on
/// the PRIMARY slot (index 0) short-circuits the whole router — no further
/// provider is tried for that outcome, and the caller is expected to turn
/// the error into a user-visible hint rather than retry.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        assert!(!slots.is_empty(), "ProviderRouter requires at least one provider slot");
        Self { slots }
    }

    pub fn primary_name(&self) -> &str {
        self.slots[0].provider.name()
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    fn has_credentials(&self) -> bool {
        self.slots.iter().any(|s| s.provider.has_credentials())
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for (index, slot) in self.slots.iter().enumerate() {
            let provider_name = slot.provider.name();

            for attempt in 0..=slot.max_retries {
                match slot.provider.send(req).await {
                    Ok(resp) => {
                        if attempt > 0 {
                            info!(provider = %provider_name, attempt, "request succeeded after retry");
                        }
                        return Ok(resp);
                    }
                    Err(e) => {
                        warn!(provider = %provider_name, attempt, err = %e, "provider send failed");

                        if index == 0 && e.is_auth_failure() {
                            return Err(e);
                        }

                        let retryable = e.is_retryable();
                        last_err = Some(e);
                        if !retryable || attempt == slot.max_retries {
                            break;
                        }
                        tokio::time::sleep(tokio::time::Duration::from_millis(200 * (attempt as u64 + 1))).await;
                    }
                }
            }

            info!(provider = %provider_name, "provider exhausted, trying next provider");
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("all providers failed".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skynet_core::types::Message;

    struct AlwaysFail {
        auth: bool,
    }

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        fn has_credentials(&self) -> bool {
            true
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            if self.auth {
                Err(ProviderError::Unauthorized("bad key".to_string()))
            } else {
                Err(ProviderError::Unavailable("down".to_string()))
            }
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "always-ok"
        }
        fn has_credentials(&self) -> bool {
            true
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "end_turn".to_string(),
                tool_calls: Vec::new(),
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            system: "you are a test".to_string(),
            messages: vec![Message::user("hello")],
            max_tokens: 64,
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_provider_on_transient_failure() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail { auth: false }), 0),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ]);
        let result = router.send(&dummy_request()).await;
        assert_eq!(result.unwrap().content, "ok");
    }

    #[tokio::test]
    async fn primary_auth_failure_short_circuits_without_trying_fallback() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail { auth: true }), 0),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ]);
        let result = router.send(&dummy_request()).await;
        assert!(matches!(result, Err(ProviderError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn non_primary_auth_failure_still_falls_through() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysOk), 0),
            ProviderSlot::new(Box::new(AlwaysFail { auth: true }), 0),
        ]);
        let result = router.send(&dummy_request()).await;
        assert_eq!(result.unwrap().content, "ok");
    }

    #[tokio::test]
    async fn errors_when_all_fail() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail { auth: false }), 0),
            ProviderSlot::new(Box::new(AlwaysFail { auth: false }), 0),
        ]);
        assert!(router.send(&dummy_request()).await.is_err());
    }
}
