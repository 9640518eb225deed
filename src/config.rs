use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BASE_URL_ENV: &str = "CHATLINK_BASE_URL";
const AGENT_ID_ENV: &str = "CHATLINK_AGENT_ID";
const USER_ID_ENV: &str = "CHATLINK_USER_ID";
const IDLE_TIMEOUT_ENV: &str = "CHATLINK_IDLE_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://localhost:8080/be/v1";
const DEFAULT_USER_ID: &str = "user-1";
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub agent_id: String,
    pub user_id: String,
    pub idle_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let agent_id = std::env::var(AGENT_ID_ENV).unwrap_or_default();
        let user_id = std::env::var(USER_ID_ENV).unwrap_or_else(|_| DEFAULT_USER_ID.to_string());
        let idle_timeout_secs = match std::env::var(IDLE_TIMEOUT_ENV) {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => secs,
                Err(_) => {
                    bail!("Invalid {IDLE_TIMEOUT_ENV} '{raw}': expected a whole number of seconds")
                }
            },
            Err(_) => DEFAULT_IDLE_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url,
            agent_id,
            user_id,
            idle_timeout_secs,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!(
                "Invalid {BASE_URL_ENV} '{}': expected http:// or https:// URL",
                self.base_url
            );
        }
        if self.agent_id.trim().is_empty() {
            bail!("{AGENT_ID_ENV} must name the chat agent to talk to");
        }
        if self.user_id.trim().is_empty() {
            bail!("{USER_ID_ENV} must not be blank");
        }
        Ok(())
    }

    /// Agent-scoped streaming endpoint: `{base}/chatagents/{agent}`.
    pub fn chat_endpoint(&self) -> String {
        format!(
            "{}/chatagents/{}",
            self.base_url.trim_end_matches('/'),
            self.agent_id
        )
    }

    /// Inter-frame idle timeout; `0` disables it.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}
