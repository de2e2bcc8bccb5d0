use crate::checkout::{PollPolicy, PIX_MINIMUM_CHARGE};
use crate::error::{Error, Result};
use crate::logger::LogLevel;
use crate::money::Money;
use crate::pricing::CouponCatalog;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the arthemi-checkout CLI tool
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory path (default: `.arthemi/` in current directory)
    pub data_dir: PathBuf,

    /// Output format: "human" (default) or "json"
    pub output_format: String,

    /// Log level: "info", "debug", "warn", "error" (default: "info")
    pub log_level: String,

    /// Smallest amount the payment processor will charge
    pub minimum_charge: Money,

    /// JSON coupon catalog; the built-in catalog is used when unset
    pub coupons_path: Option<PathBuf>,

    /// Base URL the payment links are built from
    pub payment_base_url: String,

    pub poll_policy: PollPolicy,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        let data_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".arthemi");

        Config {
            data_dir,
            output_format: "human".to_string(),
            log_level: "info".to_string(),
            minimum_charge: PIX_MINIMUM_CHARGE,
            coupons_path: None,
            payment_base_url: "http://localhost:8080/pix".to_string(),
            poll_policy: PollPolicy::default(),
        }
    }

    /// Create config with custom data directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Config {
            data_dir,
            ..Config::new()
        }
    }

    pub fn get_data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.data_dir = dir;
    }

    pub fn get_output_format(&self) -> &str {
        &self.output_format
    }

    /// Set output format ("human" or "json")
    pub fn set_output_format(&mut self, format: String) {
        self.output_format = format;
    }

    pub fn get_log_level(&self) -> &str {
        &self.log_level
    }

    pub fn set_log_level(&mut self, level: String) {
        self.log_level = level;
    }

    /// Parsed log level; unknown names fall back to info.
    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.log_level).unwrap_or(LogLevel::Info)
    }

    /// Get audit journal path
    pub fn get_audit_log_path(&self) -> PathBuf {
        self.data_dir.join("audit.log")
    }

    /// Get ledger snapshot path
    pub fn get_state_path(&self) -> PathBuf {
        self.data_dir.join("state.bin")
    }

    /// Status file of the offline PIX processor
    pub fn get_payments_path(&self) -> PathBuf {
        self.data_dir.join("payments.json")
    }

    /// Coupon catalog from `coupons_path`, or the built-in one.
    pub fn load_catalog(&self) -> Result<CouponCatalog> {
        match &self.coupons_path {
            Some(path) => CouponCatalog::load(path),
            None => Ok(CouponCatalog::standard()),
        }
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `ARTHEMI_DATA_DIR`: override data directory
    /// - `ARTHEMI_OUTPUT_FORMAT`: "human" or "json"
    /// - `ARTHEMI_LOG_LEVEL`: log level
    /// - `ARTHEMI_MIN_CHARGE_CENTS`: minimum processor charge in centavos
    /// - `ARTHEMI_COUPONS_PATH`: JSON coupon catalog
    /// - `ARTHEMI_PAYMENT_BASE_URL`: base of generated payment links
    /// - `ARTHEMI_POLL_INTERVAL_SECS`, `ARTHEMI_POLL_SOFT_TIMEOUT_SECS`,
    ///   `ARTHEMI_POLL_HARD_TIMEOUT_SECS`: payment polling cadence
    pub fn from_env() -> Result<Self> {
        let mut config = Config::new();

        if let Ok(dir) = env::var("ARTHEMI_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(format) = env::var("ARTHEMI_OUTPUT_FORMAT") {
            config.output_format = format;
        }

        if let Ok(level) = env::var("ARTHEMI_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(cents) = env::var("ARTHEMI_MIN_CHARGE_CENTS") {
            config.minimum_charge = Money::from_cents(parse_u64("ARTHEMI_MIN_CHARGE_CENTS", &cents)?);
        }

        if let Ok(path) = env::var("ARTHEMI_COUPONS_PATH") {
            config.coupons_path = Some(PathBuf::from(path));
        }

        if let Ok(url) = env::var("ARTHEMI_PAYMENT_BASE_URL") {
            config.payment_base_url = url;
        }

        if let Ok(secs) = env::var("ARTHEMI_POLL_INTERVAL_SECS") {
            config.poll_policy.interval =
                Duration::from_secs(parse_u64("ARTHEMI_POLL_INTERVAL_SECS", &secs)?);
        }
        if let Ok(secs) = env::var("ARTHEMI_POLL_SOFT_TIMEOUT_SECS") {
            config.poll_policy.soft_timeout =
                Duration::from_secs(parse_u64("ARTHEMI_POLL_SOFT_TIMEOUT_SECS", &secs)?);
        }
        if let Ok(secs) = env::var("ARTHEMI_POLL_HARD_TIMEOUT_SECS") {
            config.poll_policy.hard_timeout =
                Duration::from_secs(parse_u64("ARTHEMI_POLL_HARD_TIMEOUT_SECS", &secs)?);
        }
        config.poll_policy.validate()?;

        Ok(config)
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::ConfigError(format!("{} must be a whole number: {}", name, e)))
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
