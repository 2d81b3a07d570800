//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listing source location and block detection
    #[serde(default)]
    pub source: SourceConfig,

    /// Browser session settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Listing card selectors
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Polling cadence and persistence policy
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Notification channel settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration if the file exists.
    ///
    /// A missing file is `Ok(None)`; a file that does not parse is an error.
    pub fn load_if_exists(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Override values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.notifier.bot_token = Some(token);
        }
        if let Some(chat_id) = non_empty("TELEGRAM_CHAT_ID") {
            self.notifier.chat_id = Some(chat_id);
        }
        if let Some(domain) = non_empty("SITE_DOMAIN") {
            self.source.domain = domain;
        }
        if let Some(path) = non_empty("ENDPOINT_PATH") {
            self.source.endpoint_path = path;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.domain.trim().is_empty() {
            return Err(AppError::validation("source.domain is empty"));
        }
        url::Url::parse(&self.source.domain)
            .map_err(|e| AppError::validation(format!("source.domain is not a URL: {e}")))?;
        if self.source.blocked_sentinel.is_empty() {
            return Err(AppError::validation("source.blocked_sentinel is empty"));
        }
        if self.browser.user_agent.trim().is_empty() {
            return Err(AppError::validation("browser.user_agent is empty"));
        }
        if self.browser.timeout_secs == 0 {
            return Err(AppError::validation("browser.timeout_secs must be > 0"));
        }
        if self.schedule.interval_secs == 0 {
            return Err(AppError::validation("schedule.interval_secs must be > 0"));
        }
        if self.notifier.timeout_secs == 0 {
            return Err(AppError::validation("notifier.timeout_secs must be > 0"));
        }
        if self.notifier.max_message_chars == 0 {
            return Err(AppError::validation(
                "notifier.max_message_chars must be > 0",
            ));
        }
        if self.extractor.card_selector.trim().is_empty() {
            return Err(AppError::validation("extractor.card_selector is empty"));
        }
        Ok(())
    }

    /// Whether notifier credentials are present.
    pub fn has_notifier_credentials(&self) -> bool {
        self.notifier.bot_token.is_some() && self.notifier.chat_id.is_some()
    }

    /// Path of the record store file.
    pub fn store_path(&self) -> PathBuf {
        self.paths.data_dir.join("records.json")
    }
}

/// Listing source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Scheme and host of the source, e.g. `https://www.example.com`
    #[serde(default = "defaults::domain")]
    pub domain: String,

    /// Path of the listing search endpoint
    #[serde(default = "defaults::endpoint_path")]
    pub endpoint_path: String,

    /// Substring of the rendered body text that marks a blocked request
    #[serde(default = "defaults::blocked_sentinel")]
    pub blocked_sentinel: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            domain: defaults::domain(),
            endpoint_path: defaults::endpoint_path(),
            blocked_sentinel: defaults::blocked_sentinel(),
        }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// User-Agent presented by the browser
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Upper bound for one page fetch, in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// Run without a visible window
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Chrome/Chromium executable; auto-detected when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Extra command line switches
    #[serde(default)]
    pub args: Vec<String>,

    /// Viewport width and height
    #[serde(default = "defaults::window_size")]
    pub window_size: (u32, u32),
}

impl BrowserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            headless: defaults::headless(),
            executable: None,
            args: Vec::new(),
            window_size: defaults::window_size(),
        }
    }
}

/// CSS selectors describing a listing card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// One node per listing
    #[serde(default = "defaults::card_selector")]
    pub card_selector: String,

    /// Tag name of the enclosing link element
    #[serde(default = "defaults::anchor_tag")]
    pub anchor_tag: String,

    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    #[serde(default = "defaults::price_selector")]
    pub price_selector: String,

    #[serde(default = "defaults::specs_selector")]
    pub specs_selector: String,

    #[serde(default = "defaults::description_selector")]
    pub description_selector: String,

    /// First two matches are city and neighborhood
    #[serde(default = "defaults::location_selector")]
    pub location_selector: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            card_selector: defaults::card_selector(),
            anchor_tag: defaults::anchor_tag(),
            title_selector: defaults::title_selector(),
            price_selector: defaults::price_selector(),
            specs_selector: defaults::specs_selector(),
            description_selector: defaults::description_selector(),
            location_selector: defaults::location_selector(),
        }
    }
}

/// Order of persistence and delivery for a new record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Mark seen, then notify. A failed delivery is not retried.
    #[default]
    PersistFirst,
    /// Notify, then mark seen only on success. A failed delivery is retried
    /// next cycle, at the cost of a possible duplicate.
    DeliverFirst,
}

/// Polling cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Clear the record store when the watcher starts
    #[serde(default = "defaults::reset_on_start")]
    pub reset_on_start: bool,

    #[serde(default)]
    pub delivery_policy: DeliveryPolicy,
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            reset_on_start: defaults::reset_on_start(),
            delivery_policy: DeliveryPolicy::default(),
        }
    }
}

/// Telegram notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Label of the button that opens the listing
    #[serde(default = "defaults::button_text")]
    pub button_text: String,

    #[serde(default = "defaults::notifier_timeout")]
    pub timeout_secs: u64,

    /// Message length limit of the channel, in characters
    #[serde(default = "defaults::max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: defaults::api_base(),
            button_text: defaults::button_text(),
            timeout_secs: defaults::notifier_timeout(),
            max_message_chars: defaults::max_message_chars(),
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the record store
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Directory for raw markup and record dumps
    #[serde(default = "defaults::artifacts_dir")]
    pub artifacts_dir: PathBuf,

    #[serde(default = "defaults::save_artifacts")]
    pub save_artifacts: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            artifacts_dir: defaults::artifacts_dir(),
            save_artifacts: defaults::save_artifacts(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn domain() -> String {
        "https://www.example.com".into()
    }
    pub fn endpoint_path() -> String {
        "/realestate/rent".into()
    }
    pub fn blocked_sentinel() -> String {
        "blocked".into()
    }

    // Browser defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/60.0.3112.50 Safari/537.36"
            .into()
    }
    pub fn fetch_timeout() -> u64 {
        60
    }
    pub fn headless() -> bool {
        true
    }
    pub fn window_size() -> (u32, u32) {
        (1920, 1080)
    }

    // Extractor defaults
    pub fn card_selector() -> String {
        "div._listingCard__PoR_B".into()
    }
    pub fn anchor_tag() -> String {
        "a".into()
    }
    pub fn title_selector() -> String {
        "h4".into()
    }
    pub fn price_selector() -> String {
        "p._price__X51mi".into()
    }
    pub fn specs_selector() -> String {
        "div._spec__SIJiK".into()
    }
    pub fn description_selector() -> String {
        "div._description__zVaD6".into()
    }
    pub fn location_selector() -> String {
        "span".into()
    }

    // Schedule defaults
    pub fn interval() -> u64 {
        180
    }
    pub fn reset_on_start() -> bool {
        true
    }

    // Notifier defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn button_text() -> String {
        "Open in Browser".into()
    }
    pub fn notifier_timeout() -> u64 {
        15
    }
    pub fn max_message_chars() -> usize {
        4096
    }

    // Path defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn artifacts_dir() -> PathBuf {
        PathBuf::from("artifacts")
    }
    pub fn save_artifacts() -> bool {
        true
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.schedule.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_domain() {
        let mut config = Config::default();
        config.source.domain = "example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [source]
            domain = "https://listings.test"

            [schedule]
            interval_secs = 60
            delivery_policy = "deliver_first"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.domain, "https://listings.test");
        assert_eq!(config.source.blocked_sentinel, "blocked");
        assert_eq!(config.schedule.interval_secs, 60);
        assert_eq!(config.schedule.delivery_policy, DeliveryPolicy::DeliverFirst);
        assert!(config.schedule.reset_on_start);
        assert_eq!(config.extractor.title_selector, "h4");
    }

    #[test]
    fn load_if_exists_distinguishes_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.toml");
        assert!(Config::load_if_exists(&missing).unwrap().is_none());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[source]\nendpoint_path = 5\n").unwrap();
        assert!(matches!(
            Config::load_if_exists(&bad),
            Err(AppError::Toml(_))
        ));

        let good = dir.path().join("good.toml");
        fs::write(&good, "[schedule]\ninterval_secs = 30\n").unwrap();
        let config = Config::load_if_exists(&good).unwrap().unwrap();
        assert_eq!(config.schedule.interval_secs, 30);
    }

    #[test]
    fn env_overrides_credentials_and_source() {
        let mut config = Config::default();
        config.apply_vars(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some("123:abc".to_string()),
            "TELEGRAM_CHAT_ID" => Some("42".to_string()),
            "SITE_DOMAIN" => Some("https://listings.test".to_string()),
            "ENDPOINT_PATH" => Some("   ".to_string()),
            _ => None,
        });

        assert!(config.has_notifier_credentials());
        assert_eq!(config.notifier.chat_id.as_deref(), Some("42"));
        assert_eq!(config.source.domain, "https://listings.test");
        assert_eq!(config.source.endpoint_path, "/realestate/rent");
    }
}
