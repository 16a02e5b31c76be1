//! Parsing of the Admin API root document

use crate::{Error, Result};

/// How Kong persists its configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbMode {
    /// DB-less: configuration lives in memory and is lost on restart
    InMemory,
    /// Postgres-backed
    Durable,
}

impl DbMode {
    /// Map Kong's `configuration.database` value to a mode
    pub fn parse(database: &str) -> Result<Self> {
        match database {
            "" | "off" => Ok(DbMode::InMemory),
            "postgres" => Ok(DbMode::Durable),
            other => Err(Error::UnsupportedBackendMode(other.to_string())),
        }
    }
}

/// Facts about the Admin API learned from `GET /`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootInfo {
    /// Persistence mode
    pub db_mode: DbMode,
    /// Kong version, normalised to major.minor.patch
    pub version: semver::Version,
}

impl RootInfo {
    /// Extract database mode and version from the root document
    pub fn from_value(root: &serde_json::Value) -> Result<Self> {
        let configuration = root
            .get("configuration")
            .and_then(|c| c.as_object())
            .ok_or_else(|| Error::config("invalid root configuration, expected a map"))?;

        let database = configuration
            .get("database")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::config(format!(
                    "invalid database configuration, expected a string got {}",
                    configuration.get("database").unwrap_or(&serde_json::Value::Null)
                ))
            })?;
        let db_mode = DbMode::parse(database)?;

        let raw = root
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::config("root document has no version"))?;
        let version = parse_version(raw)?;

        Ok(Self { db_mode, version })
    }
}

/// Parse a Kong version string
///
/// Enterprise builds report four numeric components and a suffix
/// (`2.8.1.0-enterprise-edition`); only the first three numbers are kept and
/// the suffix becomes the pre-release tag.
pub fn parse_version(raw: &str) -> Result<semver::Version> {
    let raw = raw.trim();
    let (numbers, suffix) = match raw.split_once('-') {
        Some((n, s)) => (n, Some(s)),
        None => (raw, None),
    };

    let mut parts: Vec<&str> = numbers.split('.').take(3).collect();
    while parts.len() < 3 {
        parts.push("0");
    }

    let mut normalized = parts.join(".");
    if let Some(suffix) = suffix {
        normalized.push('-');
        normalized.push_str(suffix);
    }

    semver::Version::parse(&normalized)
        .map_err(|e| Error::config(format!("could not parse kong version {:?}: {}", raw, e)))
}
