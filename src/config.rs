//! Application constants and the intake configuration bundle.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::quality::{BlankPolicy, DuplicatePolicy, ResolutionPolicy};
use crate::pipeline::transform::{PixelDatatype, TransformConfig};
use crate::pipeline::validation::{normalize_extension, ImageFormat, DEFAULT_ALLOWED_EXTENSIONS};

/// Application-level constants
pub const APP_NAME: &str = "image-intake";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "IMAGE_INTAKE_CONFIG";

pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    if cfg!(debug_assertions) {
        "info,image_intake=debug".to_string()
    } else {
        "warn,image_intake=info".to_string()
    }
}

/// Per-user data directory for persistent state.
/// Falls back to the current directory when the platform reports none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Where the persistent seen-identifier store lives unless configured.
pub fn default_seen_store_path() -> PathBuf {
    app_data_dir().join("seen_identifiers.sqlite3")
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Width × height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Everything one batch run needs. Every field has a default, so a partial
/// JSON file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub allowed_extensions: Vec<String>,
    pub quality_gate: ResolutionPolicy,
    pub blank: BlankPolicy,
    pub max_batch_size: usize,
    pub concurrency: usize,
    pub transform: TransformConfig,
    pub duplicates: DuplicatePolicy,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            quality_gate: ResolutionPolicy::quality_gate(),
            blank: BlankPolicy::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            transform: TransformConfig::default(),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading & validation
// ═══════════════════════════════════════════════════════════

impl IntakeConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `IMAGE_INTAKE_CONFIG` when set, defaults otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// Reject configurations that would make every file fail the same way.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_extensions.is_empty() {
            return Err(invalid("allowed_extensions must not be empty"));
        }
        for ext in &self.allowed_extensions {
            if ImageFormat::from_extension(&normalize_extension(ext)).is_none() {
                return Err(invalid(format!("no decoder for allowed extension '{ext}'")));
            }
        }

        if self.max_batch_size == 0 {
            return Err(invalid("max_batch_size must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }

        if self.quality_gate.min.is_zero_area() {
            return Err(invalid("quality_gate minimum resolution must be non-zero"));
        }

        let pct = self.blank.max_percentage;
        if !pct.is_finite() || pct <= 0.0 || pct > 100.0 {
            return Err(invalid(format!(
                "blank.max_percentage must be in (0, 100], got {pct}"
            )));
        }

        let target = self.transform.target;
        if target.is_zero_area() {
            return Err(invalid(format!("target resolution {target} has zero area")));
        }
        let gate = ResolutionPolicy::preprocessing_gate();
        if !gate.admits(target.width, target.height) {
            return Err(invalid(format!(
                "target resolution {target} outside supported range {} to {}",
                gate.min,
                gate.max.unwrap_or(gate.min)
            )));
        }

        if let Some(constants) = &self.transform.normalization {
            if self.transform.datatype == PixelDatatype::Uint8 {
                return Err(invalid(
                    "normalization constants require a floating-point datatype",
                ));
            }
            constants.check().map_err(invalid)?;
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
