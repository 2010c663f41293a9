//! Collector settings.

use crate::error::{Error, Result};
use chrono::TimeDelta;

/// Default minimum age of an unreferenced asset before it may be deleted.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Longest retention window accepted, roughly a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Default number of pending deletions committed per flush.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default number of children requested per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Tunables for one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcConfig {
    /// Minimum age of an unreferenced asset before it is deleted.
    pub retention: TimeDelta,
    /// Pending deletions committed per flush.
    pub batch_size: usize,
    /// Children requested per listing page.
    pub page_size: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            retention: TimeDelta::days(DEFAULT_RETENTION_DAYS),
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl GcConfig {
    /// Set the retention window in whole days.
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention = TimeDelta::days(days);
        self
    }

    /// Set the flush batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the listing page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reject settings the collector cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retention < TimeDelta::zero() {
            return Err(Error::invalid_config("retention must not be negative"));
        }
        if self.retention > TimeDelta::days(MAX_RETENTION_DAYS) {
            return Err(Error::invalid_config(format!(
                "retention must not exceed {} days",
                MAX_RETENTION_DAYS
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_config("batch_size must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(Error::invalid_config("page_size must be at least 1"));
        }
        Ok(())
    }

    /// Parse collector settings from `key=value` lines.
    ///
    /// Recognizes `retention_days`, `batch_size` and `page_size`; missing keys
    /// keep their defaults and unknown keys are ignored so the settings can
    /// live alongside other store configuration.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "retention_days" => {
                    let days = value.parse::<i64>().map_err(|_| {
                        Error::invalid_config(format!("Invalid retention_days: {}", value))
                    })?;
                    config.retention = TimeDelta::try_days(days).ok_or_else(|| {
                        Error::invalid_config(format!("retention_days out of range: {}", days))
                    })?;
                }
                "batch_size" => {
                    config.batch_size = value.parse().map_err(|_| {
                        Error::invalid_config(format!("Invalid batch_size: {}", value))
                    })?;
                }
                "page_size" => {
                    config.page_size = value.parse().map_err(|_| {
                        Error::invalid_config(format!("Invalid page_size: {}", value))
                    })?;
                }
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GcConfig::default();
        assert_eq!(config.retention, TimeDelta::days(30));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.page_size, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let config = GcConfig::parse("version=1\nretention_days=7\nbatch_size=10\n").unwrap();
        assert_eq!(config.retention, TimeDelta::days(7));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_parse_config_with_comments() {
        let config = GcConfig::parse("# settings\n\n page_size = 5 \n").unwrap();
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn test_parse_config_invalid_number() {
        assert!(GcConfig::parse("batch_size=lots").is_err());
        assert!(GcConfig::parse("retention_days=-").is_err());
    }

    #[test]
    fn test_parse_config_rejects_zero_batch() {
        assert!(GcConfig::parse("batch_size=0").is_err());
    }

    #[test]
    fn test_parse_config_rejects_huge_retention() {
        let err = GcConfig::parse("retention_days=100000000").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(GcConfig::parse("retention_days=36500").is_ok());
    }

    #[test]
    fn test_validate_negative_retention() {
        let config = GcConfig::default().with_retention_days(-1);
        assert!(config.validate().is_err());
    }
}
