use std::env;
use std::path::PathBuf;

/// Configuration for the leadflow CLI tool
///
/// This is a simple, single-process config suitable for one showroom's
/// pipeline. Charges and tax are configuration, not business logic; the
/// billing calculator reads them from here.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory path (default: `.leadflow/` in current directory)
    pub data_dir: PathBuf,

    /// Output format: "human" (default) or "json"
    pub output_format: String,

    /// Log level: "info", "debug", "warn", "error" (default: "info")
    pub log_level: String,

    /// Flat transport charge in minor currency units
    pub transport_charge: i64,

    /// Flat handling/lift charge in minor currency units
    pub handling_charge: i64,

    /// Tax rate in basis points (1800 = 18% GST)
    pub tax_bps: i64,

    /// Currency code for payment links
    pub currency: String,

    /// Frontend base URL for tracking and payment-status redirects
    pub frontend_url: String,

    /// Address that receives follow-up escalations
    pub admin_alert_email: String,

    /// Eligible assignees for round-robin lead assignment
    pub assignees: Vec<String>,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        let data_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".leadflow");

        Config {
            data_dir,
            output_format: "human".to_string(),
            log_level: "info".to_string(),
            transport_charge: 10_000,
            handling_charge: 1_200,
            tax_bps: 1_800,
            currency: "INR".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            admin_alert_email: "ops@example.com".to_string(),
            assignees: Vec::new(),
        }
    }

    /// Create config with custom data directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Config {
            data_dir,
            ..Config::new()
        }
    }

    /// Get the data directory path
    pub fn get_data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Set data directory
    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.data_dir = dir;
    }

    /// Get output format
    pub fn get_output_format(&self) -> &str {
        &self.output_format
    }

    /// Set output format ("human" or "json")
    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    /// Get audit log path
    pub fn get_audit_log_path(&self) -> PathBuf {
        self.data_dir.join("audit.log")
    }

    /// Get state snapshot path
    pub fn get_state_path(&self) -> PathBuf {
        self.data_dir.join("state.bin")
    }

    /// Public tracking URL for a token
    pub fn tracking_url(&self, token: &str) -> String {
        format!("{}/track/{}", self.frontend_url, token)
    }

    /// Public design-review URL for a revision token
    pub fn design_review_url(&self, token: &str) -> String {
        format!("{}/approve-design/{}", self.frontend_url, token)
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `LEADFLOW_DATA_DIR`: override data directory
    /// - `LEADFLOW_OUTPUT_FORMAT`: "human" or "json"
    /// - `LEADFLOW_LOG_LEVEL`: log level
    /// - `LEADFLOW_FRONTEND_URL`: tracking/redirect base URL
    /// - `LEADFLOW_ADMIN_EMAIL`: escalation recipient
    /// - `LEADFLOW_ASSIGNEES`: comma-separated assignee pool
    pub fn from_env() -> Self {
        let mut config = Config::new();

        if let Ok(dir) = env::var("LEADFLOW_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(format) = env::var("LEADFLOW_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        if let Ok(level) = env::var("LEADFLOW_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(url) = env::var("LEADFLOW_FRONTEND_URL") {
            config.frontend_url = url;
        }

        if let Ok(email) = env::var("LEADFLOW_ADMIN_EMAIL") {
            config.admin_alert_email = email;
        }

        if let Ok(pool) = env::var("LEADFLOW_ASSIGNEES") {
            config.assignees = pool
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.output_format, "human");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.tax_bps, 1800);
        assert_eq!(config.transport_charge, 10_000);
        assert_eq!(config.handling_charge, 1_200);
        assert!(config.data_dir.ends_with(".leadflow"));
    }

    #[test]
    fn test_config_paths() {
        let config = Config::new();
        assert!(config.get_audit_log_path().ends_with("audit.log"));
        assert!(config.get_state_path().ends_with("state.bin"));
    }

    #[test]
    fn test_config_urls() {
        let config = Config::new();
        assert_eq!(
            config.tracking_url("abc123"),
            "http://localhost:5173/track/abc123"
        );
        assert_eq!(
            config.design_review_url("tok"),
            "http://localhost:5173/approve-design/tok"
        );
    }
}
