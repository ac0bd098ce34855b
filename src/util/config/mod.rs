//! tsrepl configuration system
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. User-level (~/.config/tsrepl/config.toml)
//! 3. Default values
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use tsrepl::util::config::{load_user_config, UserConfig};
//!
//! let config: UserConfig = load_user_config().unwrap_or_default();
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// User-level configuration for tsrepl
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UserConfig {
    /// REPL settings
    #[serde(default)]
    pub repl: ReplConfig,
    /// Type-stripping compiler settings
    #[serde(default)]
    pub compiler: CompilerConfig,
}

/// REPL configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplConfig {
    /// History file path, `~/` is expanded against the home directory
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    /// History size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Colorize banner, notices and results
    #[serde(default = "default_colors")]
    pub colors: bool,
}

fn default_history_size() -> usize {
    1000
}

fn default_colors() -> bool {
    true
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            history_file: None,
            history_size: default_history_size(),
            colors: default_colors(),
        }
    }
}

/// External compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompilerConfig {
    /// Shell-style command line of a type-stripping tool reading stdin
    #[serde(default)]
    pub command: Option<String>,
    /// Whether the tool accepts TypeScript input
    #[serde(default = "default_typescript")]
    pub typescript: bool,
}

fn default_typescript() -> bool {
    true
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: None,
            typescript: default_typescript(),
        }
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("tsrepl"));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("tsrepl"));
    }

    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("tsrepl"));
    }

    None
}

/// Get the user config file path (~/.config/tsrepl/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load user-level configuration
/// Returns default config if file doesn't exist
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(UserConfig::default()),
    }
}

/// Load configuration from an explicit path
pub fn load_config_from(path: &Path) -> Result<UserConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse configuration text
pub fn parse_config(content: &str) -> Result<UserConfig, ConfigError> {
    let mut config: UserConfig = toml::from_str(content)?;
    config.repl.history_file = config.repl.history_file.map(|p| expand_home(&p));
    Ok(config)
}

/// Render configuration back to TOML
pub fn render_config(config: &UserConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Expand a leading `~/` against `$HOME`
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var("HOME")) {
        (Ok(rest), Ok(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = parse_config("").unwrap();
        assert_eq!(config, UserConfig::default());
        assert_eq!(config.repl.history_size, 1000);
        assert!(config.repl.colors);
        assert!(config.compiler.command.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [repl]
            history_file = "/tmp/tsrepl_history"
            history_size = 20
            colors = false

            [compiler]
            command = "esbuild --loader=ts"
            typescript = true
            "#,
        )
        .unwrap();

        assert_eq!(
            config.repl.history_file,
            Some(PathBuf::from("/tmp/tsrepl_history"))
        );
        assert_eq!(config.repl.history_size, 20);
        assert!(!config.repl.colors);
        assert_eq!(config.compiler.command.as_deref(), Some("esbuild --loader=ts"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[repl\nhistory_size = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_render_parses_back() {
        let mut config = UserConfig::default();
        config.repl.history_size = 5;
        let text = render_config(&config).unwrap();
        assert_eq!(parse_config(&text).unwrap(), config);
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        let path = PathBuf::from("/var/tmp/history");
        assert_eq!(expand_home(&path), path);
    }
}
