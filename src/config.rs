use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::details::MAX_DETAIL_IDS;
use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.usaspending.gov/api/v2";

/// Runtime configuration for [`crate::client::UsaSpendingClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint is resolved against.
    pub base_url: String,
    /// Fixed timeout applied to every outbound request.
    pub timeout: Duration,
    /// Optional `User-Agent` header value.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: Some(concat!("usaspending-tools/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl ClientConfig {
    /// Reads `USASPENDING_API_BASE_URL` and `USASPENDING_TIMEOUT_SECS`, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(base_url) = env::var("USASPENDING_API_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().to_string();
            }
        }
        if let Some(secs) = env_number::<u64>("USASPENDING_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Hard limits applied by the request builders and tools.
///
/// Revisions of the upstream service disagree on several of these, so they
/// are configuration rather than constants buried in the builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub award_max_limit: u32,
    pub geography_max_limit: u32,
    pub recipient_max_limit: u32,
    /// Shared by the sub-agency, sub-component and program activity listings.
    pub agency_max_limit: u32,
    /// `max_pages` used by award search when the caller does not pass one.
    pub default_max_pages: u32,
    /// Maximum IDs per detail fetch; also the concurrency ceiling.
    pub max_detail_ids: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            award_max_limit: 100,
            geography_max_limit: 100,
            recipient_max_limit: 100,
            agency_max_limit: 100,
            default_max_pages: 3,
            max_detail_ids: 10,
        }
    }
}

impl SearchLimits {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            award_max_limit: env_number("USASPENDING_AWARD_MAX_LIMIT")?
                .unwrap_or(defaults.award_max_limit),
            geography_max_limit: env_number("USASPENDING_GEOGRAPHY_MAX_LIMIT")?
                .unwrap_or(defaults.geography_max_limit),
            recipient_max_limit: env_number("USASPENDING_RECIPIENT_MAX_LIMIT")?
                .unwrap_or(defaults.recipient_max_limit),
            agency_max_limit: env_number("USASPENDING_AGENCY_MAX_LIMIT")?
                .unwrap_or(defaults.agency_max_limit),
            default_max_pages: env_number("USASPENDING_DEFAULT_MAX_PAGES")?
                .unwrap_or(defaults.default_max_pages),
            max_detail_ids: detail_id_cap(env_number("USASPENDING_MAX_DETAIL_IDS")?)?
                .unwrap_or(defaults.max_detail_ids),
        })
    }
}

/// The detail cap must stay within `1..=MAX_DETAIL_IDS`.
fn detail_id_cap(value: Option<usize>) -> Result<Option<usize>, ConfigError> {
    match value {
        Some(cap) if cap == 0 || cap > MAX_DETAIL_IDS => Err(ConfigError::InvalidValue {
            key: "USASPENDING_MAX_DETAIL_IDS",
            value: cap.to_string(),
        }),
        other => Ok(other),
    }
}

fn env_number<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
        })
}
