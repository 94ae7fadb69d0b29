//! Environment configuration
//!
//! Environment variables are the only configuration surface; there are no
//! flags and no config file.

use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ANTHROPIC_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub data_dir: PathBuf,
    pub home_dir: PathBuf,
    pub model: String,
    pub max_tokens: u32,
    pub context_window: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            api_key,
            data_dir: dir_or_default(&lookup, "KOMATACHI_DATA_DIR", "data"),
            home_dir: dir_or_default(&lookup, "KOMATACHI_HOME_DIR", "home"),
            model: lookup("KOMATACHI_MODEL")
                .filter(|model| !model.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_or_default(&lookup, "KOMATACHI_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            context_window: parse_or_default(
                &lookup,
                "KOMATACHI_CONTEXT_WINDOW",
                DEFAULT_CONTEXT_WINDOW,
            )?,
        })
    }
}

/// `$VAR` if set, else `~/.komatachi/<leaf>`, else `/<leaf>` when there is
/// no `HOME` (the in-container case).
fn dir_or_default(lookup: impl Fn(&str) -> Option<String>, var: &str, leaf: &str) -> PathBuf {
    if let Some(dir) = lookup(var).filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }
    match lookup("HOME").filter(|home| !home.is_empty()) {
        Some(home) => PathBuf::from(home).join(".komatachi").join(leaf),
        None => PathBuf::from(format!("/{leaf}")),
    }
}

fn parse_or_default<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var).filter(|value| !value.is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |var| map.get(var).map(|value| value.to_string())
    }

    #[test]
    fn test_api_key_is_required() {
        let err = Config::from_lookup(lookup_in(&[("HOME", "/home/u")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn test_host_defaults_hang_off_home() {
        let config = Config::from_lookup(lookup_in(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("HOME", "/home/u"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/home/u/.komatachi/data"));
        assert_eq!(config.home_dir, PathBuf::from("/home/u/.komatachi/home"));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.context_window, 200_000);
    }

    #[test]
    fn test_container_defaults_without_home() {
        let config =
            Config::from_lookup(lookup_in(&[("ANTHROPIC_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.home_dir, PathBuf::from("/home"));
    }

    #[test]
    fn test_explicit_values_win() {
        let config = Config::from_lookup(lookup_in(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("KOMATACHI_DATA_DIR", "/var/komatachi"),
            ("KOMATACHI_HOME_DIR", "/etc/komatachi"),
            ("KOMATACHI_MODEL", "claude-opus-4-1"),
            ("KOMATACHI_MAX_TOKENS", "4096"),
            ("KOMATACHI_CONTEXT_WINDOW", "100000"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/komatachi"));
        assert_eq!(config.home_dir, PathBuf::from("/etc/komatachi"));
        assert_eq!(config.model, "claude-opus-4-1");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.context_window, 100_000);
    }

    #[test]
    fn test_unparsable_integer_is_a_startup_error() {
        let err = Config::from_lookup(lookup_in(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("KOMATACHI_MAX_TOKENS", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "KOMATACHI_MAX_TOKENS",
                ..
            }
        ));
    }
}
