use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FIRING: &str = "firing";

// AlertManager webhook payload structures
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertManagerWebhook {
    pub receiver: String,
    pub status: String,
    pub alerts: Vec<AlertManagerAlert>,
    #[serde(rename = "groupLabels")]
    pub group_labels: HashMap<String, String>,
    #[serde(rename = "commonLabels")]
    pub common_labels: HashMap<String, String>,
    #[serde(rename = "commonAnnotations")]
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    pub version: String,
    #[serde(rename = "groupKey")]
    pub group_key: String,
    #[serde(rename = "truncatedAlerts", default)]
    pub truncated_alerts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertManagerAlert {
    pub status: String,
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    // Raw strings, passed through unvalidated.
    #[serde(rename = "startsAt")]
    pub starts_at: String,
    #[serde(rename = "endsAt", default)]
    pub ends_at: String,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

impl AlertManagerAlert {
    /// Only an exact, case-sensitive `firing` counts.
    pub fn is_firing(&self) -> bool {
        self.status == FIRING
    }

    pub fn alert_name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.annotations.get("description").map(String::as_str)
    }

    pub fn prompt(&self) -> String {
        build_prompt(self.alert_name(), self.description())
    }
}

/// Investigation prompt for one alert. Absent values render as `None`.
pub fn build_prompt(alert_name: Option<&str>, description: Option<&str>) -> String {
    format!(
        "{} - {}. Investigate from last 1 hour. Please provide a detailed report.",
        alert_name.unwrap_or("None"),
        description.unwrap_or("None"),
    )
}
