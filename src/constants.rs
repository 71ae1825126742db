pub const DEFAULT_AUTH_URL: &str = "https://api.ziqni.com/member-token";
pub const DEFAULT_GATEWAY_URL: &str = "wss://gapi.ziqni.com/ws";
pub const TOKEN_RESOURCE: &str = "ziqni-gapi";
pub const PUBLIC_MEMBER: &str = "PUBLIC";

pub const DEFAULT_TOKEN_EXPIRES_MS: u64 = 36_000_000;
pub const DEFAULT_COMPETITION_REFRESH_MS: u64 = 1_000_000;
pub const DEFAULT_LEADERBOARD_REFRESH_MS: u64 = 1_000_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_WS_PING_MS: u64 = 20_000;
/// Renewal fires at this fraction of the stated token expiry.
pub const TOKEN_RENEWAL_RATIO: f64 = 0.9;

pub const PRELOADER_WATCHDOG_MS: u64 = 3_000;
pub const PRELOADER_STALE_MS: u64 = 8_000;

/// Ranks that are always rendered, even with no data behind them.
pub const DEFAULT_SHOWN_RANKS: u32 = 3;
pub const MIN_LEADERBOARD_SIZE: u32 = 3;
pub const PAGE_SIZE: u32 = 20;
pub const FINISHED_HISTORY_DAYS: i64 = 30;

pub const OPT_IN_REVALIDATE_ATTEMPTS: u32 = 5;
pub const OPT_IN_REVALIDATE_DELAY_MS: u64 = 100;
pub const AWARD_CELEBRATION_DELAY_MS: u64 = 2_000;
pub const ACHIEVEMENT_RELOAD_DELAY_MS: u64 = 2_000;

/// Distance from the container top under which the member row counts as hidden.
pub const VIEWPORT_INDENTATION: f64 = 80.0;
pub const MASKED_NAME_SUFFIX: &str = "*****";
pub const PLACEHOLDER: &str = "-";
pub const DEFAULT_MEMBER_LABEL: &str = "You";

pub const OPT_IN_REQUIRED_CONSTRAINT: &str = "optinRequiredForEntrants";
pub const SINGLE_WHEEL_TYPE: i32 = 1;
