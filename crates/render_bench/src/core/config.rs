//! # Workbench Configuration
//!
//! Preferences that the host would normally hold: renderer executables,
//! default render size and sampling, where scene files go and where material
//! cards are searched for.
//!
//! ```toml
//! log_level = "info"
//! card_paths = ["~/.bench/materials", "/usr/share/bench/materials"]
//!
//! [defaults]
//! width = 800
//! height = 600
//! spp = 32
//!
//! [renderers.luxcore]
//! executable = "/opt/luxcore/luxcoreconsole"
//! prefix = ["optirun"]
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// Render size and sampling used when the caller gives none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Samples per pixel
    pub spp: u32,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            spp: 32,
        }
    }
}

/// # Renderer Configuration
///
/// Per-renderer launch options. Every field is optional; what is left out
/// comes from the backend's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Path to the renderer executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    /// Argument template replacing the backend default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Words placed before the executable (e.g. `optirun`)
    pub prefix: Vec<String>,
    /// Environment overrides for the child process
    pub env: BTreeMap<String, String>,
    /// Sampler name replacing the backend default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<String>,
    /// Integrator name replacing the backend default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrator: Option<String>,
}

impl RendererConfig {
    /// Create a renderer configuration for an executable
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
            ..Self::default()
        }
    }

    /// Set the argument template
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Set the command prefix
    pub fn with_prefix<I, S>(mut self, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix = prefix.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment override
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// # Complete Workbench Configuration
///
/// Top-level configuration. Renderer sections are keyed by backend id in
/// lower case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Default render settings
    pub defaults: RenderDefaults,
    /// Directory for scene files; the system temp directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Card search directories, user directory first
    pub card_paths: Vec<PathBuf>,
    /// Renderer sections
    pub renderers: BTreeMap<String, RendererConfig>,
}

impl BenchConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            defaults: RenderDefaults::default(),
            output_dir: None,
            card_paths: Vec::new(),
            renderers: BTreeMap::new(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set default render size
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.defaults.width = width;
        self.defaults.height = height;
        self
    }

    /// Set default samples per pixel
    pub fn with_spp(mut self, spp: u32) -> Self {
        self.defaults.spp = spp;
        self
    }

    /// Set the scene output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Append a card search directory
    pub fn with_card_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.card_paths.push(dir.into());
        self
    }

    /// Set the configuration of one renderer
    pub fn with_renderer(mut self, backend_id: &str, renderer: RendererConfig) -> Self {
        self.renderers.insert(backend_id.to_ascii_lowercase(), renderer);
        self
    }

    /// Renderer section for a backend id, looked up case-insensitively
    pub fn renderer(&self, backend_id: &str) -> Option<&RendererConfig> {
        self.renderers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(backend_id))
            .map(|(_, renderer)| renderer)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.defaults.width == 0 || self.defaults.height == 0 {
            return Err("Render resolution must be at least 1x1".to_string());
        }

        if self.defaults.spp == 0 {
            return Err("Samples per pixel must be at least 1".to_string());
        }

        for (name, renderer) in &self.renderers {
            if let Some(args) = &renderer.args {
                if !args.iter().any(|arg| arg.contains("{scene}") || arg.contains("{stem}")) {
                    return Err(format!("Argument template of '{name}' never references the scene"));
                }
            }
        }

        Ok(())
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for BenchConfig {}
