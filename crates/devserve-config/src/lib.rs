//! Configuration management for devserve.
//!
//! Parses `devserve.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! Precedence, lowest to highest: built-in defaults, `devserve.toml`,
//! then [`CliSettings`] (which the CLI fills from flags and the `PORT`
//! environment variable).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override static root directory.
    pub root_dir: Option<PathBuf>,
    /// Override SPA fallback flag.
    pub spa_fallback: Option<bool>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "devserve.toml";

/// Port used when neither the config file nor `PORT` sets one.
pub const DEFAULT_PORT: u16 = 5173;

/// Index document served for directories and as the SPA fallback.
pub const DEFAULT_INDEX_FILE: &str = "index.html";

/// Default live reload debounce in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Upper bound for `live_reload.debounce_ms`.
const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Site configuration (root path is a relative string from TOML).
    site: SiteConfigRaw,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,

    /// Resolved site configuration (set after loading).
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

/// Raw site configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SiteConfigRaw {
    root_dir: Option<String>,
    index_file: Option<String>,
    spa_fallback: Option<bool>,
}

/// Resolved site configuration with an absolute root.
#[derive(Debug)]
pub struct SiteConfig {
    /// Directory static files are served from.
    pub root_dir: PathBuf,
    /// Index document name (`index.html`).
    pub index_file: String,
    /// Serve the root index document for unmatched routes.
    pub spa_fallback: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            index_file: DEFAULT_INDEX_FILE.to_owned(),
            spa_fallback: true,
        }
    }
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Whether live reload is enabled.
    pub enabled: bool,
    /// Quiet period before a burst of file events becomes one reload.
    pub debounce_ms: u64,
    /// Glob patterns for paths that never trigger a reload.
    pub ignore: Vec<String>,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ignore: default_ignore_patterns(),
        }
    }
}

/// Paths that churn during development without affecting the served app.
fn default_ignore_patterns() -> Vec<String> {
    [".git", "node_modules", ".output", "dist", "build", "bun.lockb"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `devserve.toml` in current directory and parents,
    /// and falls back to defaults. The root is the current directory unless
    /// `site.root_dir` sets one (relative to the config file).
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. Validation runs
    /// last so overrides are checked too.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// the current directory is unavailable, or the merged configuration is
    /// invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        Self::load_in(std::env::current_dir(), config_path, cli_settings)
    }

    /// [`Config::load`] against a given working directory lookup.
    fn load_in(
        cwd: std::io::Result<PathBuf>,
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let cwd = cwd?;

        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path, &cwd)?
        } else if let Some(discovered) = Self::discover_config(&cwd) {
            Self::load_from_file(&discovered, &cwd)?
        } else {
            Self::default_with_base(&cwd)
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) -> Result<(), ConfigError> {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(root_dir) = &settings.root_dir {
            self.site_resolved.root_dir = std::path::absolute(root_dir)?;
        }
        if let Some(spa_fallback) = settings.spa_fallback {
            self.site_resolved.spa_fallback = spa_fallback;
        }
        if let Some(live_reload_enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = live_reload_enabled;
        }
        Ok(())
    }

    /// Search for config file in current directory and parents.
    fn discover_config(cwd: &Path) -> Option<PathBuf> {
        let mut current = cwd.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config rooted at the given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            site: SiteConfigRaw::default(),
            live_reload: LiveReloadConfig::default(),
            site_resolved: SiteConfig {
                root_dir: base.to_path_buf(),
                ..SiteConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path, cwd: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = std::path::absolute(path.parent().unwrap_or(Path::new(".")))?;
        config.resolve_paths(&config_dir, cwd);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_site()?;
        self.validate_live_reload()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate_site(&self) -> Result<(), ConfigError> {
        let index_file = &self.site_resolved.index_file;
        require_non_empty(index_file, "site.index_file")?;

        if index_file.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "site.index_file must be a file name, not a path".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate_live_reload(&self) -> Result<(), ConfigError> {
        if self.live_reload.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "live_reload.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        for pattern in &self.live_reload.ignore {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "live_reload.ignore contains invalid pattern {pattern:?}: {e}"
                ))
            })?;
        }

        Ok(())
    }

    /// Resolve the raw site section.
    ///
    /// A configured `root_dir` is relative to the config file's directory;
    /// without one the root stays at the working directory.
    fn resolve_paths(&mut self, config_dir: &Path, cwd: &Path) {
        let root_dir = match self.site.root_dir.as_deref() {
            Some(dir) => config_dir.join(dir),
            None => cwd.to_path_buf(),
        };

        self.site_resolved = SiteConfig {
            root_dir,
            index_file: self
                .site
                .index_file
                .clone()
                .unwrap_or_else(|| DEFAULT_INDEX_FILE.to_owned()),
            spa_fallback: self.site.spa_fallback.unwrap_or(true),
        };
    }
}
