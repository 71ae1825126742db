use std::env;
use std::time::Duration;

use tracing::warn;

use crate::constants::{
    DEFAULT_AUTH_URL, DEFAULT_COMPETITION_REFRESH_MS, DEFAULT_GATEWAY_URL,
    DEFAULT_LEADERBOARD_REFRESH_MS, DEFAULT_MEMBER_LABEL, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_TOKEN_EXPIRES_MS, DEFAULT_WS_PING_MS, FINISHED_HISTORY_DAYS, MIN_LEADERBOARD_SIZE,
};
use crate::error::{Result, WidgetError};

/// Construction-time settings. Immutable for the widget's lifetime.
#[derive(Clone, Debug)]
pub struct WidgetConfig {
    pub api_key: String,
    pub gateway_url: String,
    pub auth_url: String,
    pub language: String,
    pub currency: String,
    pub token_expires: Duration,
    pub competition_refresh: Duration,
    pub leaderboard_refresh: Duration,
    pub request_timeout: Duration,
    pub ws_ping_interval: Duration,
    pub leaderboard_size_floor: u32,
    pub member_name_length: usize,
    pub member_label: String,
    pub show_finished_tournaments: bool,
    pub show_ready_achievements: bool,
    pub finished_history_days: i64,
}

/// Member identity and token. The only part of the configuration that can be
/// swapped at runtime, and only through a credential refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub member_ref_id: Option<String>,
    pub member_token: Option<String>,
}

impl Credentials {
    pub fn for_member(member_ref_id: impl Into<String>) -> Self {
        Self {
            member_ref_id: Some(member_ref_id.into()),
            member_token: None,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            member_ref_id: None,
            member_token: Some(token.into()),
        }
    }
}

impl WidgetConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            language: "en".to_string(),
            currency: String::new(),
            token_expires: Duration::from_millis(DEFAULT_TOKEN_EXPIRES_MS),
            competition_refresh: Duration::from_millis(DEFAULT_COMPETITION_REFRESH_MS),
            leaderboard_refresh: Duration::from_millis(DEFAULT_LEADERBOARD_REFRESH_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            ws_ping_interval: Duration::from_millis(DEFAULT_WS_PING_MS),
            leaderboard_size_floor: MIN_LEADERBOARD_SIZE,
            member_name_length: 0,
            member_label: DEFAULT_MEMBER_LABEL.to_string(),
            show_finished_tournaments: true,
            show_ready_achievements: true,
            finished_history_days: FINISHED_HISTORY_DAYS,
        }
    }

    pub fn from_env() -> Result<(Self, Credentials)> {
        let api_key = read_env_first(&["WIDGET_API_KEY", "ZIQNI_API_KEY"])
            .ok_or_else(|| WidgetError::Config("WIDGET_API_KEY is required".to_string()))?;
        let mut config = Self::new(api_key);

        match read_env_first(&["WIDGET_GATEWAY_URL", "WIDGET_WS_URL"]) {
            Some(url) => config.gateway_url = derive_ws_url(&url),
            None => warn!("WIDGET_GATEWAY_URL not set; defaulting to {}", DEFAULT_GATEWAY_URL),
        }
        if let Some(url) = read_env_first(&["WIDGET_AUTH_URL"]) {
            config.auth_url = url;
        }
        if let Some(language) = read_env_first(&["WIDGET_LANGUAGE"]) {
            config.language = language;
        }
        if let Some(currency) = read_env_first(&["WIDGET_CURRENCY"]) {
            config.currency = currency;
        }
        if let Some(label) = read_env_first(&["WIDGET_MEMBER_LABEL"]) {
            config.member_label = label;
        }

        config.token_expires = read_millis(&["WIDGET_TOKEN_EXPIRES_MS"], DEFAULT_TOKEN_EXPIRES_MS);
        config.competition_refresh =
            read_millis(&["COMPETITION_REFRESH_MS"], DEFAULT_COMPETITION_REFRESH_MS);
        config.leaderboard_refresh =
            read_millis(&["LEADERBOARD_REFRESH_MS"], DEFAULT_LEADERBOARD_REFRESH_MS);
        config.request_timeout = read_millis(&["REQUEST_TIMEOUT_MS"], DEFAULT_REQUEST_TIMEOUT_MS);
        config.ws_ping_interval = read_millis(&["WS_PING_MS"], DEFAULT_WS_PING_MS);

        config.member_name_length = read_env_first(&["MEMBER_NAME_LENGTH"])
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0);
        config.show_finished_tournaments = read_env_first(&["SHOW_FINISHED_TOURNAMENTS"])
            .map(|value| value != "0" && !value.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        let credentials = Credentials {
            member_ref_id: read_env_first(&["WIDGET_MEMBER_REF_ID"]),
            member_token: read_env_first(&["WIDGET_MEMBER_TOKEN"]),
        };

        Ok((config, credentials))
    }
}

fn read_millis(keys: &[&str], default_ms: u64) -> Duration {
    parse_millis(keys.first().copied().unwrap_or_default(), read_env_first(keys), default_ms)
}

/// Zero and unparsable values fall back to the default.
fn parse_millis(key: &str, value: Option<String>, default_ms: u64) -> Duration {
    let millis = match value.map(|value| value.parse::<u64>()) {
        None => default_ms,
        Some(Ok(millis)) if millis > 0 => millis,
        Some(_) => {
            warn!(key, default_ms, "ignoring invalid interval");
            default_ms
        }
    };
    Duration::from_millis(millis)
}

pub(crate) fn read_env_first(keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Ok(value) = env::var(key) {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
    }
    None
}

pub(crate) fn derive_ws_url(gateway_url: &str) -> String {
    let mut url = match url::Url::parse(gateway_url) {
        Ok(url) => url,
        Err(_) => return gateway_url.to_string(),
    };
    match url.scheme() {
        "http" => {
            let _ = url.set_scheme("ws");
        }
        "https" => {
            let _ = url.set_scheme("wss");
        }
        "ws" | "wss" => {}
        _ => return gateway_url.to_string(),
    }
    url.to_string()
}
