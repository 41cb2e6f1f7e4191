//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VERIAL_ERP_URL=http://erp.local:8000/WcfServiceLibraryVerial/      │
//! │     VERIAL_BATCH_SIZE_PRODUCTS=100                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/verial-sync/sync.toml (Linux)                            │
//! │     ~/Library/Application Support/com.verial.verial-sync/sync.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     batch sizes 50/20/50, 3 attempts, uncategorized term 15            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [erp]
//! endpoint = "http://erp.local:8000/WcfServiceLibraryVerial/"
//! session_id = "18"
//!
//! [batch]
//! products = 50
//! orders = 20
//!
//! [retry]
//! max_attempts = 3
//! call_timeout_secs = 30
//!
//! [mapping]
//! uncategorized_category_id = 15
//! resolve_tariff_prices = true
//!
//! [[bad_ranges]]
//! entity = "products"
//! start = 5001
//! end = 5020
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use verial_core::{
    BadRange, BatchLimits, BatchRangeCalculator, EntityType, DEFAULT_MAX_REPORTED_ERRORS,
};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// ERP Settings
// =============================================================================

/// Connection settings for the Verial web service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErpSettings {
    /// Base URL of the Verial service (http or https).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Verial session number sent with every call.
    #[serde(default)]
    pub session_id: Option<String>,

    /// Customer id used when asking for tariff conditions.
    /// 0 means the general tariff.
    #[serde(default)]
    pub tariff_customer_id: i64,
}

// =============================================================================
// Batch Settings
// =============================================================================

/// Per-entity batch sizes and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "default_products_batch")]
    pub products: u64,

    #[serde(default = "default_orders_batch")]
    pub orders: u64,

    #[serde(default = "default_customers_batch")]
    pub customers: u64,

    /// Limits per entity; missing entries use the built-in limits.
    #[serde(default)]
    pub limits: BatchLimitSettings,
}

/// Optional limit overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchLimitSettings {
    #[serde(default)]
    pub products: Option<BatchLimits>,
    #[serde(default)]
    pub orders: Option<BatchLimits>,
    #[serde(default)]
    pub customers: Option<BatchLimits>,
}

fn default_products_batch() -> u64 {
    50
}
fn default_orders_batch() -> u64 {
    20
}
fn default_customers_batch() -> u64 {
    50
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            products: default_products_batch(),
            orders: default_orders_batch(),
            customers: default_customers_batch(),
            limits: BatchLimitSettings::default(),
        }
    }
}

impl BatchSettings {
    /// Configured default batch size for an entity.
    pub fn size_for(&self, entity: EntityType) -> u64 {
        match entity {
            EntityType::Products => self.products,
            EntityType::Orders => self.orders,
            EntityType::Customers => self.customers,
        }
    }

    fn limits_for(&self, entity: EntityType) -> Option<BatchLimits> {
        match entity {
            EntityType::Products => self.limits.products,
            EntityType::Orders => self.limits.orders,
            EntityType::Customers => self.limits.customers,
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Retry budget for ERP and store calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Timeout applied to every single call (seconds).
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    200
}
fn default_max_backoff() -> u64 {
    5
}
fn default_call_timeout() -> u64 {
    30
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

// =============================================================================
// Mapping Settings
// =============================================================================

/// Knobs for the record mappers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSettings {
    /// Sku candidate fields probed after the barcode and the numeric id.
    #[serde(default = "default_sku_fields")]
    pub sku_fields: Vec<String>,

    /// Store term id used when no category resolves.
    #[serde(default = "default_uncategorized")]
    pub uncategorized_category_id: i64,

    /// Query the tariff endpoint per product to fill `sale_price`.
    #[serde(default = "default_true")]
    pub resolve_tariff_prices: bool,

    /// Currency code for orders that do not carry one.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_sku_fields() -> Vec<String> {
    ["sku", "SKU", "Referencia", "CodigoArticulo", "codigo"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_uncategorized() -> i64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_currency() -> String {
    "EUR".to_string()
}

impl Default for MappingSettings {
    fn default() -> Self {
        MappingSettings {
            sku_fields: default_sku_fields(),
            uncategorized_category_id: default_uncategorized(),
            resolve_tariff_prices: true,
            currency: default_currency(),
        }
    }
}

// =============================================================================
// Driver & Report Settings
// =============================================================================

/// Polling driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Interval between batches (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    1000
}

impl Default for DriverSettings {
    fn default() -> Self {
        DriverSettings {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Status report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Item errors carried by a status report.
    #[serde(default = "default_max_reported_errors")]
    pub max_reported_errors: usize,
}

fn default_max_reported_errors() -> usize {
    DEFAULT_MAX_REPORTED_ERRORS
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            max_reported_errors: default_max_reported_errors(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub erp: ErpSettings,

    #[serde(default)]
    pub batch: BatchSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub mapping: MappingSettings,

    #[serde(default)]
    pub driver: DriverSettings,

    #[serde(default)]
    pub report: ReportSettings,

    /// Extra ranges to skip, on top of the built-in list.
    #[serde(default)]
    pub bad_ranges: Vec<BadRange>,
}

impl SyncConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Runs before any sync run is created; every error here is fatal.
    pub fn validate(&self) -> SyncResult<()> {
        let endpoint = self
            .erp
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(SyncError::MissingErpEndpoint)?;

        let url = Url::parse(endpoint)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "ERP endpoint must start with http:// or https://, got: {}",
                endpoint
            )));
        }

        for entity in EntityType::ALL {
            if self.batch.size_for(entity) == 0 {
                return Err(SyncError::InvalidConfig(format!(
                    "batch size for {} must be greater than 0",
                    entity
                )));
            }
            if let Some(limits) = self.batch.limits_for(entity) {
                if limits.min == 0 || limits.min > limits.max {
                    return Err(SyncError::InvalidConfig(format!(
                        "batch limits for {} must satisfy 1 <= min <= max",
                        entity
                    )));
                }
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.call_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "retry.call_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.mapping.uncategorized_category_id <= 0 {
            return Err(SyncError::InvalidConfig(
                "mapping.uncategorized_category_id must be a positive term id".into(),
            ));
        }

        if let Some(bad) = self.bad_ranges.iter().find(|r| r.start > r.end) {
            return Err(SyncError::InvalidConfig(format!(
                "bad range {}-{} for {} is inverted",
                bad.start, bad.end, bad.entity
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("VERIAL_ERP_URL") {
            debug!(url = %url, "Overriding ERP endpoint from environment");
            self.erp.endpoint = Some(url);
        }

        if let Ok(session) = std::env::var("VERIAL_SESSION_ID") {
            self.erp.session_id = Some(session);
        }

        for (var, entity) in [
            ("VERIAL_BATCH_SIZE_PRODUCTS", EntityType::Products),
            ("VERIAL_BATCH_SIZE_ORDERS", EntityType::Orders),
            ("VERIAL_BATCH_SIZE_CUSTOMERS", EntityType::Customers),
        ] {
            if let Ok(raw) = std::env::var(var) {
                match raw.parse::<u64>() {
                    Ok(size) => {
                        debug!(entity = %entity, size, "Overriding batch size from environment");
                        match entity {
                            EntityType::Products => self.batch.products = size,
                            EntityType::Orders => self.batch.orders = size,
                            EntityType::Customers => self.batch.customers = size,
                        }
                    }
                    Err(_) => warn!(var, value = %raw, "Ignoring non-numeric batch size"),
                }
            }
        }

        if let Ok(raw) = std::env::var("VERIAL_MAX_ATTEMPTS") {
            if let Ok(attempts) = raw.parse::<u32>() {
                self.retry.max_attempts = attempts;
            }
        }

        if let Ok(raw) = std::env::var("VERIAL_RESOLVE_TARIFFS") {
            match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.mapping.resolve_tariff_prices = true,
                "0" | "false" | "no" | "off" => self.mapping.resolve_tariff_prices = false,
                _ => warn!(value = %raw, "Unknown VERIAL_RESOLVE_TARIFFS value"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "verial", "verial-sync")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Builds the range calculator from the configured limits and bad ranges.
    pub fn range_calculator(&self) -> BatchRangeCalculator {
        let mut calculator = BatchRangeCalculator::new();
        for entity in EntityType::ALL {
            if let Some(limits) = self.batch.limits_for(entity) {
                calculator = calculator.with_limits(entity, limits);
            }
        }
        calculator.with_bad_ranges(self.bad_ranges.iter().copied())
    }

    /// Returns the ERP endpoint if configured.
    pub fn erp_endpoint(&self) -> Option<&str> {
        self.erp.endpoint.as_deref()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.driver.poll_interval_ms.max(1))
    }
}
