//! Runtime configuration for schema-change handling.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Default location of the JSON schema store used by `schemactl`.
const DEFAULT_STORE_PATH: &str = ".holo_schema/schema.json";
/// Default budget for one schema announcement.
const DEFAULT_ANNOUNCE_TIMEOUT_MS: u64 = 10_000;

/// How far `IF NOT EXISTS` reaches when one target of a multi-column
/// CREATE INDEX is already indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IfNotExistsScope {
    /// The whole statement becomes a no-op as soon as one target is already
    /// indexed. This is the historical behavior and stays the default.
    #[default]
    Statement,
    /// Only the already-indexed target is skipped; the remaining targets are
    /// still indexed.
    Target,
}

impl FromStr for IfNotExistsScope {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "statement" => Ok(Self::Statement),
            "target" => Ok(Self::Target),
            other => Err(anyhow!(
                "invalid IF NOT EXISTS scope '{other}' (expected 'statement' or 'target')"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SchemaChangeConfig {
    pub if_not_exists_scope: IfNotExistsScope,
    /// Upper bound for submitting a schema to the migration coordinator
    /// (`0` disables the bound).
    pub announce_timeout: Duration,
    /// Location of the JSON schema store.
    pub store_path: PathBuf,
}

impl Default for SchemaChangeConfig {
    fn default() -> Self {
        Self {
            if_not_exists_scope: IfNotExistsScope::default(),
            announce_timeout: Duration::from_millis(DEFAULT_ANNOUNCE_TIMEOUT_MS),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl SchemaChangeConfig {
    /// Loads configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let if_not_exists_scope = match lookup("HOLO_SCHEMA_IF_NOT_EXISTS_SCOPE") {
            Some(raw) => raw
                .parse::<IfNotExistsScope>()
                .context("parse HOLO_SCHEMA_IF_NOT_EXISTS_SCOPE")?,
            None => IfNotExistsScope::default(),
        };
        let announce_timeout_ms = parse_u64(
            lookup("HOLO_SCHEMA_ANNOUNCE_TIMEOUT_MS"),
            DEFAULT_ANNOUNCE_TIMEOUT_MS,
        )?;
        let store_path = lookup("HOLO_SCHEMA_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

        Ok(Self {
            if_not_exists_scope,
            announce_timeout: Duration::from_millis(announce_timeout_ms),
            store_path,
        })
    }

    /// Returns the announce bound, or `None` when disabled.
    pub fn announce_timeout(&self) -> Option<Duration> {
        (!self.announce_timeout.is_zero()).then_some(self.announce_timeout)
    }
}

/// Parses an optional `u64` with fallback default.
fn parse_u64(value: Option<String>, default_value: u64) -> Result<u64> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid u64 value: {raw}")),
        None => Ok(default_value),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_keep_statement_scope() {
        let config = SchemaChangeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.if_not_exists_scope, IfNotExistsScope::Statement);
        assert_eq!(config.announce_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = SchemaChangeConfig::from_lookup(lookup(&[
            ("HOLO_SCHEMA_IF_NOT_EXISTS_SCOPE", "Target"),
            ("HOLO_SCHEMA_ANNOUNCE_TIMEOUT_MS", "0"),
            ("HOLO_SCHEMA_STORE_PATH", "/tmp/schema.json"),
        ]))
        .unwrap();
        assert_eq!(config.if_not_exists_scope, IfNotExistsScope::Target);
        assert_eq!(config.announce_timeout(), None);
        assert_eq!(config.store_path, PathBuf::from("/tmp/schema.json"));
    }

    #[test]
    fn invalid_values_fail_with_context() {
        let err = SchemaChangeConfig::from_lookup(lookup(&[(
            "HOLO_SCHEMA_IF_NOT_EXISTS_SCOPE",
            "keyspace",
        )]))
        .unwrap_err();
        assert!(format!("{err:#}").contains("HOLO_SCHEMA_IF_NOT_EXISTS_SCOPE"));

        let err = SchemaChangeConfig::from_lookup(lookup(&[(
            "HOLO_SCHEMA_ANNOUNCE_TIMEOUT_MS",
            "soon",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("invalid u64 value"));
    }
}
