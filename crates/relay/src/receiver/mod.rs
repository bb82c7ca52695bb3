mod alertmanager;

pub use alertmanager::{build_prompt, AlertManagerAlert, AlertManagerWebhook, FIRING};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    config::HawkeyeConfig,
    hawkeye::{HttpInferenceApi, InferenceClient, PromptOutcome},
    metrics,
};

/// Delivers one prompt somewhere that can investigate it.
#[async_trait]
pub trait PromptDispatcher: Send + Sync {
    async fn dispatch(&self, prompt: &str) -> PromptOutcome;
}

/// Opens a brand new Hawkeye session for every prompt.
pub struct HawkeyeDispatcher {
    config: HawkeyeConfig,
}

impl HawkeyeDispatcher {
    pub fn new(config: HawkeyeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PromptDispatcher for HawkeyeDispatcher {
    async fn dispatch(&self, prompt: &str) -> PromptOutcome {
        let api = match HttpInferenceApi::new(&self.config.url, self.config.delivery) {
            Ok(api) => api,
            Err(e) => {
                error!("Failed to build Hawkeye HTTP client: {}", e);
                return PromptOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let client = InferenceClient::connect(api, &self.config).await;
        client.send_prompt(prompt).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySummary {
    pub received: usize,
    pub firing: usize,
    pub delivered: usize,
}

/// Turns an Alertmanager batch into one investigation prompt per firing alert.
pub struct AlertRelay {
    dispatcher: Arc<dyn PromptDispatcher>,
}

impl AlertRelay {
    pub fn new(dispatcher: Arc<dyn PromptDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn from_config(config: HawkeyeConfig) -> Self {
        Self::new(Arc::new(HawkeyeDispatcher::new(config)))
    }

    /// Alerts are dispatched one after another, each awaited in full before
    /// the next. Dispatch failures are logged and counted, never returned.
    pub async fn handle(&self, payload: AlertManagerWebhook) -> RelaySummary {
        info!(
            "Processing AlertManager webhook from receiver {} with {} alerts",
            payload.receiver,
            payload.alerts.len()
        );

        let mut summary = RelaySummary {
            received: payload.alerts.len(),
            ..Default::default()
        };
        metrics::ALERTS_RECEIVED_TOTAL.inc_by(summary.received as u64);

        for alert in payload.alerts.iter().filter(|alert| alert.is_firing()) {
            summary.firing += 1;
            metrics::ALERTS_FIRING_TOTAL.inc();

            let prompt = alert.prompt();
            info!(alertname = ?alert.alert_name(), "Dispatching firing alert");

            if self.dispatcher.dispatch(&prompt).await.is_delivered() {
                summary.delivered += 1;
            }
        }

        info!(
            firing = summary.firing,
            delivered = summary.delivered,
            "Finished AlertManager webhook"
        );
        summary
    }
}
