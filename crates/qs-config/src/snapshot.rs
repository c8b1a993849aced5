//! Config snapshot for log correlation.
//!
//! Records which settings were in effect and where they came from, with a
//! digest so two runs can be compared without diffing files.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::resolve::ConfigSource;
use crate::settings::Settings;

/// Resolved settings plus provenance.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub source: ConfigSource,
    /// SHA-256 of the canonical JSON form of the settings.
    pub digest: String,
    /// ISO-8601 timestamp of resolution.
    pub resolved_at: String,
    pub settings: Settings,
}

impl ConfigSnapshot {
    pub fn new(settings: Settings, source: ConfigSource) -> Self {
        let digest = digest(&settings);
        ConfigSnapshot {
            source,
            digest,
            resolved_at: chrono::Utc::now().to_rfc3339(),
            settings,
        }
    }

    /// First 12 hex chars of the digest, for log lines.
    pub fn short_digest(&self) -> &str {
        &self.digest[..self.digest.len().min(12)]
    }
}

fn digest(settings: &Settings) -> String {
    // Serializing a plain struct of strings, numbers and vectors cannot fail.
    let json = serde_json::to_vec(settings).unwrap_or_default();
    hex::encode(Sha256::digest(&json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_sensitive() {
        let a = ConfigSnapshot::new(Settings::default(), ConfigSource::Default);
        let b = ConfigSnapshot::new(Settings::default(), ConfigSource::Default);
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);
        assert_eq!(a.short_digest().len(), 12);

        let changed = Settings {
            transition_ticks: 99,
            ..Settings::default()
        };
        let c = ConfigSnapshot::new(changed, ConfigSource::Default);
        assert_ne!(a.digest, c.digest);
    }
}
