// Configuration loading and parsing (benchmark.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// benchmark.toml structs
// ---------------------------------------------------------------------------

/// Deserialization target for the entire benchmark.toml file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub grid: GridConfig,
    pub noise: NoiseConfig,
    pub priors: PriorsConfig,
    pub data: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

/// Image/sinogram geometry. The image is `size x size` pixels on the square
/// `[lower, upper]^2`; the sinogram holds `num_angles` projections of `size`
/// detector bins each.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub size: usize,
    pub num_angles: usize,
    pub lower: f64,
    pub upper: f64,
}

impl GridConfig {
    /// Number of unknowns (image pixels).
    pub fn dim(&self) -> usize {
        self.size * self.size
    }

    /// Number of sinogram entries.
    pub fn sino_len(&self) -> usize {
        self.num_angles * self.size
    }

    /// Pixel width; the loaded operator is scaled by this.
    pub fn dx(&self) -> f64 {
        (self.upper - self.lower) / self.size as f64
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoiseConfig {
    pub std: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriorsConfig {
    pub default_delta: f64,
    pub lmrf_delta: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub operator: String,
    pub sinogram: String,
    pub exact: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/benchmark.toml` relative to
/// the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults
/// and does not consult the environment. Prefer `load_config()` which handles
/// both.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("benchmark.toml");
    let text = read_file(&path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    validate(&config)?;

    Ok(config)
}

/// Ensure `config/benchmark.toml` exists by copying it from `defaults/` if
/// missing. Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let source = defaults_dir.join("benchmark.toml");
    let target = config_dir.join("benchmark.toml");

    if !source.exists() || target.exists() {
        return Ok(vec![]);
    }

    std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!(
            "failed to copy {} to {}: {e}",
            source.display(),
            target.display()
        ),
    })?;

    Ok(vec![target])
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying defaults first and applying environment overrides
/// (`PORT` overrides `server.port`).
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let mut config = load_config_from(&cwd)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply environment overrides. Only `PORT` is recognized, for parity with
/// containerized deployments that inject the serving port.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(raw) = std::env::var("PORT") {
        let port: u16 = raw.parse().map_err(|_| ConfigError::ValidationError {
            field: "PORT".into(),
            message: format!("environment override is not a valid port: {raw:?}"),
        })?;
        config.server.port = port;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.grid.size == 0 {
        return Err(ConfigError::ValidationError {
            field: "grid.size".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.grid.num_angles == 0 {
        return Err(ConfigError::ValidationError {
            field: "grid.num_angles".into(),
            message: "must be greater than 0".into(),
        });
    }

    if !(config.grid.lower < config.grid.upper) {
        return Err(ConfigError::ValidationError {
            field: "grid.lower".into(),
            message: format!(
                "lower bound {} must be strictly below upper bound {}",
                config.grid.lower, config.grid.upper
            ),
        });
    }

    if !config.noise.std.is_finite() || config.noise.std <= 0.0 {
        return Err(ConfigError::ValidationError {
            field: "noise.std".into(),
            message: format!("must be a positive finite number, got {}", config.noise.std),
        });
    }

    let delta_fields: &[(&str, f64)] = &[
        ("priors.default_delta", config.priors.default_delta),
        ("priors.lmrf_delta", config.priors.lmrf_delta),
    ];
    for (name, val) in delta_fields {
        if !val.is_finite() || *val <= 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be a positive finite number, got {val}"),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
