use serde::{Deserialize, Serialize};

pub const DEFAULT_ORGANIZATION: &str = "ORGANIZATION_NAME_ROOT";

/// What to do with the streamed reply to a prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Close the stream as soon as the status line is accepted.
    #[serde(rename = "discard")]
    #[default]
    Discard,
    /// Read every streamed event until the server closes the stream.
    #[serde(rename = "drain")]
    Drain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub hawkeye: HawkeyeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct HawkeyeConfig {
    pub url: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub project: String,
    pub organization: String,
    #[serde(default)]
    pub delivery: DeliveryMode,
}

impl std::fmt::Debug for HawkeyeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HawkeyeConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("project", &self.project)
            .field("organization", &self.organization)
            .field("delivery", &self.delivery)
            .finish()
    }
}

impl HawkeyeConfig {
    pub fn new(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            password: password.into(),
            project: project.into(),
            organization: DEFAULT_ORGANIZATION.to_string(),
            delivery: DeliveryMode::Discard,
        }
    }
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> crate::Result<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| crate::Error::Config(format!("{} must be set", key)))
        };

        let url = required("HAWKEYE_URL")?;
        url::Url::parse(&url)?;

        let delivery = match lookup("HAWKEYE_STREAM_RESPONSE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "true" | "1" | "yes" => DeliveryMode::Drain,
            _ => DeliveryMode::Discard,
        };

        let config = Config {
            server: ServerConfig {
                addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            },
            hawkeye: HawkeyeConfig {
                url: url.trim_end_matches('/').to_string(),
                user: required("HAWKEYE_USER")?,
                password: required("HAWKEYE_PASSWORD")?,
                project: required("HAWKEYE_PROJECT")?,
                organization: lookup("HAWKEYE_ORGANIZATION")
                    .unwrap_or_else(|| DEFAULT_ORGANIZATION.to_string()),
                delivery,
            },
        };

        if config.hawkeye.url.starts_with("http://") {
            tracing::warn!("HAWKEYE_URL uses plain HTTP; credentials will be sent unencrypted");
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8000".to_string(),
            },
            hawkeye: HawkeyeConfig::new("http://localhost:8080", "", "", ""),
        }
    }
}
