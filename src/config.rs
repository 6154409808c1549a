//! Recognized arena configuration (section 6).
//!
//! Validated once at arena construction, the way the teacher validates
//! index/sequence definitions at registration time rather than deferring
//! to first use.

use crate::error::ConfigError;

const DEFAULT_PAGE_SIZE: usize = 4096;
const DEFAULT_INITIAL_PAGES: usize = 1;
const DEFAULT_MAX_PAGES: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub page_size: usize,
    pub max_pages: usize,
    pub initial_pages: usize,
    pub enable_prefix_index: bool,
    pub enable_suffix_index: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            initial_pages: DEFAULT_INITIAL_PAGES,
            enable_prefix_index: true,
            enable_suffix_index: true,
        }
    }
}

/// A single `(name, value)` option as handed in from an external config
/// producer, before validation.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Int(i64),
    Bool(bool),
}

impl Config {
    /// Builds a `Config` from a sequence of recognized options, applying
    /// defaults for anything unspecified. Unrecognized option names error
    /// immediately rather than being silently ignored.
    pub fn from_options(options: &[(&str, ConfigValue)]) -> Result<Self, ConfigError> {
        let mut cfg = Config::default();
        for (name, value) in options {
            match *name {
                "page_size" => cfg.page_size = expect_positive_usize(name, value)?,
                "max_pages" => cfg.max_pages = expect_positive_usize(name, value)?,
                "initial_pages" => cfg.initial_pages = expect_positive_usize(name, value)?,
                "enable_prefix_index" => cfg.enable_prefix_index = expect_bool(name, value)?,
                "enable_suffix_index" => cfg.enable_suffix_index = expect_bool(name, value)?,
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
        }
        if cfg.initial_pages > cfg.max_pages {
            return Err(ConfigError::InvalidValue(
                "initial_pages".into(),
                "initial_pages cannot exceed max_pages".into(),
            ));
        }
        Ok(cfg)
    }
}

fn expect_positive_usize(name: &str, value: &ConfigValue) -> Result<usize, ConfigError> {
    match value {
        ConfigValue::Int(v) if *v > 0 => Ok(*v as usize),
        ConfigValue::Int(v) => Err(ConfigError::InvalidValue(name.to_string(), format!("{v} must be > 0"))),
        ConfigValue::Bool(_) => Err(ConfigError::InvalidValue(name.to_string(), "expected an integer".into())),
    }
}

fn expect_bool(name: &str, value: &ConfigValue) -> Result<bool, ConfigError> {
    match value {
        ConfigValue::Bool(b) => Ok(*b),
        ConfigValue::Int(_) => Err(ConfigError::InvalidValue(name.to_string(), "expected a boolean".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unspecified() {
        let cfg = Config::from_options(&[]).unwrap();
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert!(cfg.enable_prefix_index);
        assert!(cfg.enable_suffix_index);
    }

    #[test]
    fn unknown_option_errors() {
        let err = Config::from_options(&[("bogus", ConfigValue::Bool(true))]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownOption("bogus".into()));
    }

    #[test]
    fn zero_page_size_errors() {
        let err = Config::from_options(&[("page_size", ConfigValue::Int(0))]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "page_size"));
    }
}
