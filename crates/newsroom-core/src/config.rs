//! Newsroom configuration
//!
//! Loaded once at startup, from TOML or built in code:
//!
//! ```toml
//! months_to_show = 24
//! image_cache_capacity = 512
//!
//! [layout]
//! width = 1400.0
//! height = 900.0
//!
//! [attestation]
//! chain_id = 8453
//! outcomes_schema_uid = "0x..."
//! reporting_schema_uid = "0x..."
//! authorized_attesters = ["0xabc..."]
//!
//! [logging]
//! filter = "newsroom_core=debug,info"
//! json = true
//! ```

use crate::error::{NewsroomError, Result};
use crate::raster::RasterOptions;
use newsroom_timeline::{LayoutParams, MonthsToShow};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Base mainnet
pub const BASE_CHAIN_ID: u64 = 0x2105;

/// Which schema an attestation is written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationType {
    Outcomes,
    Reporting,
}

impl AttestationType {
    /// Name of the leading score field in the schema
    #[must_use]
    pub fn score_field(self) -> &'static str {
        match self {
            Self::Outcomes => "scoreOutcomes",
            Self::Reporting => "scoreReporting",
        }
    }
}

/// On-chain attestation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationConfig {
    /// Chain attestations are written to
    pub chain_id: u64,
    pub outcomes_schema_uid: String,
    pub reporting_schema_uid: String,
    /// Lowercase wallet addresses allowed to attest; empty allows any wallet
    pub authorized_attesters: Vec<String>,
}

impl AttestationConfig {
    /// Schema UID for an attestation type
    ///
    /// # Errors
    /// Returns [`NewsroomError::Config`] if the UID is not configured.
    pub fn schema_uid(&self, kind: AttestationType) -> Result<&str> {
        let uid = match kind {
            AttestationType::Outcomes => &self.outcomes_schema_uid,
            AttestationType::Reporting => &self.reporting_schema_uid,
        };
        if uid.trim().is_empty() {
            return Err(NewsroomError::Config(format!("no schema UID configured for {kind:?}")));
        }
        Ok(uid)
    }

    /// True if the wallet may attest
    #[must_use]
    pub fn is_authorized(&self, wallet: &str) -> bool {
        let wallet = wallet.to_lowercase();
        self.authorized_attesters.is_empty()
            || self.authorized_attesters.iter().any(|a| a.to_lowercase() == wallet)
    }
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            chain_id: BASE_CHAIN_ID,
            outcomes_schema_uid: String::new(),
            reporting_schema_uid: String::new(),
            authorized_attesters: Vec::new(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Newsroom configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsroomConfig {
    /// Window used by serpentine blocks without their own setting
    pub months_to_show: MonthsToShow,
    /// Serpentine canvas
    pub layout: LayoutParams,
    /// Preview rendering
    pub raster: RasterOptions,
    /// Inlined images kept in memory
    pub image_cache_capacity: u64,
    pub attestation: AttestationConfig,
    pub logging: LoggingConfig,
}

impl NewsroomConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML
    ///
    /// # Errors
    /// Returns [`NewsroomError::Config`] on malformed or out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| NewsroomError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// Returns [`NewsroomError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| NewsroomError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&raw)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check values serde cannot
    ///
    /// # Errors
    /// Returns [`NewsroomError::Config`] naming the bad value.
    pub fn validate(&self) -> Result<()> {
        if self.layout.width <= 0.0 || self.layout.height <= 0.0 {
            return Err(NewsroomError::Config("layout width and height must be positive".to_string()));
        }
        if self.layout.months_per_row == 0 {
            return Err(NewsroomError::Config("layout monthsPerRow must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.raster.quality) {
            return Err(NewsroomError::Config("raster quality must be within 0..=1".to_string()));
        }
        if self.raster.pixel_ratio <= 0.0 {
            return Err(NewsroomError::Config("raster pixel_ratio must be positive".to_string()));
        }
        Ok(())
    }

    /// With default month window
    #[inline]
    #[must_use]
    pub fn with_months_to_show(mut self, months: MonthsToShow) -> Self {
        self.months_to_show = months;
        self
    }

    /// With canvas layout
    #[inline]
    #[must_use]
    pub fn with_layout(mut self, layout: LayoutParams) -> Self {
        self.layout = layout;
        self
    }

    /// With raster options
    #[inline]
    #[must_use]
    pub fn with_raster(mut self, raster: RasterOptions) -> Self {
        self.raster = raster;
        self
    }

    /// With image cache capacity
    #[inline]
    #[must_use]
    pub fn with_image_cache_capacity(mut self, capacity: u64) -> Self {
        self.image_cache_capacity = capacity;
        self
    }

    /// With attestation schema UIDs
    #[must_use]
    pub fn with_schema_uids(mut self, outcomes: impl Into<String>, reporting: impl Into<String>) -> Self {
        self.attestation.outcomes_schema_uid = outcomes.into();
        self.attestation.reporting_schema_uid = reporting.into();
        self
    }

    /// With attester allow-list; addresses are stored lowercase
    #[must_use]
    pub fn with_authorized_attesters<I, S>(mut self, wallets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.attestation.authorized_attesters = wallets.into_iter().map(|w| w.as_ref().to_lowercase()).collect();
        self
    }

    /// With logging settings
    #[inline]
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

impl Default for NewsroomConfig {
    fn default() -> Self {
        Self {
            months_to_show: MonthsToShow::default(),
            layout: LayoutParams::default(),
            raster: RasterOptions::default(),
            image_cache_capacity: 256,
            attestation: AttestationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
