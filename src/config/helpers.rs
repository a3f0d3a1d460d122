//! Typed environment lookups shared by the config resolvers.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ConfigError;

/// Where configuration values are read from.
///
/// `Env::process()` reads the real environment; tests build one from pairs
/// so they never have to mutate process state.
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    pub fn process() -> Self {
        Self { overrides: None }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            overrides: Some(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
        }
    }

    /// Read a variable. Unset and empty are both `None`.
    pub fn optional(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let value = match &self.overrides {
            Some(map) => map.get(key).cloned(),
            None => match std::env::var(key) {
                Ok(v) => Some(v),
                Err(std::env::VarError::NotPresent) => None,
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        message: "value is not valid unicode".to_string(),
                    });
                }
            },
        };
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    pub fn string(&self, key: &str, default: impl Into<String>) -> Result<String, ConfigError> {
        Ok(self.optional(key)?.unwrap_or_else(|| default.into()))
    }

    pub fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key)? {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
    pub fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key)? {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                other => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected a boolean, got '{other}'"),
                }),
            },
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_unset() {
        let env = Env::from_pairs([("A", ""), ("B", "  "), ("C", "x")]);
        assert_eq!(env.optional("A").unwrap(), None);
        assert_eq!(env.optional("B").unwrap(), None);
        assert_eq!(env.optional("C").unwrap().as_deref(), Some("x"));
        assert_eq!(env.optional("MISSING").unwrap(), None);
    }

    #[test]
    fn test_parse_with_default() {
        let env = Env::from_pairs([("SECS", "42"), ("BAD", "forty")]);
        assert_eq!(env.parse("SECS", 7u64).unwrap(), 42);
        assert_eq!(env.parse("MISSING", 7u64).unwrap(), 7);

        let err = env.parse("BAD", 7u64).unwrap_err();
        assert!(err.to_string().contains("Invalid value for BAD"));
    }

    #[test]
    fn test_bool_spellings() {
        let env = Env::from_pairs([("A", "yes"), ("B", "OFF"), ("C", "maybe")]);
        assert!(env.bool("A", false).unwrap());
        assert!(!env.bool("B", true).unwrap());
        assert!(env.bool("MISSING", true).unwrap());
        assert!(env.bool("C", false).is_err());
    }
}
