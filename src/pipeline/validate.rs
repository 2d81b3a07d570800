// src/pipeline/validate.rs

use crate::error::Result;
use crate::models::Config;
use crate::services::ListingExtractor;
use crate::utils::log as report_log;

/// Validate configuration and check that every selector parses.
pub fn run_validate(config: &Config) -> Result<()> {
    report_log::header("Validating configuration");

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    ListingExtractor::new(&config.source.domain, &config.extractor)?;

    report_log::success("Config OK");
    report_log::sub_item(&format!(
        "Source: {}{}",
        config.source.domain, config.source.endpoint_path
    ));
    report_log::sub_item(&format!("Browser timeout: {}s", config.browser.timeout_secs));
    report_log::sub_item(&format!("Interval: {}s", config.schedule.interval_secs));
    report_log::sub_item(&format!(
        "Delivery policy: {:?}",
        config.schedule.delivery_policy
    ));
    report_log::sub_item(&format!("Store: {}", config.store_path().display()));

    if config.has_notifier_credentials() {
        report_log::success("Notifier credentials present");
    } else {
        log::warn!("Notifier credentials missing; only --dry-run will work");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(run_validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_bad_selector_fails() {
        let mut config = Config::default();
        config.extractor.title_selector = "h4[".to_string();
        assert!(run_validate(&config).is_err());
    }
}
