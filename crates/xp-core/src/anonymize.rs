//! Deterministic, one-way participant identifier tokens.
//!
//! An [`Anonymizer`] is created at the start of a run, consulted for every raw
//! worker id, and its forward mapping is persisted at the end so an authorized
//! operator can de-anonymize. The persisted map is sensitive and must not be
//! shipped with the derived data.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of hex digits kept from the digest.
const TOKEN_HEX_LEN: usize = 16;

/// Errors from the anonymizer.
#[derive(Debug, Error)]
pub enum AnonymizeError {
    /// Two distinct raw ids produced the same token.
    #[error("token {token} collides for '{first}' and '{second}'")]
    Collision {
        token: String,
        first: String,
        second: String,
    },
    #[error("failed to write identifier map {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode identifier map: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anonymizer settings.
#[derive(Clone, PartialEq, Eq)]
pub struct AnonymizerConfig {
    /// When false every id passes through unchanged.
    pub enabled: bool,
    /// Ids containing this substring are never anonymized.
    pub debug_marker: String,
    /// Secret mixed into the digest so tokens cannot be recomputed from
    /// guessed worker ids.
    pub salt: Option<String>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug_marker: "debug".to_string(),
            salt: None,
        }
    }
}

impl fmt::Debug for AnonymizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnonymizerConfig")
            .field("enabled", &self.enabled)
            .field("debug_marker", &self.debug_marker)
            .field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Memoizing raw id to token mapping, owned by a single processing run.
#[derive(Debug)]
pub struct Anonymizer {
    config: AnonymizerConfig,
    mapping: BTreeMap<String, String>,
    owners: HashMap<String, String>,
}

impl Anonymizer {
    pub fn new(config: AnonymizerConfig) -> Self {
        Self {
            config,
            mapping: BTreeMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Returns true if `raw` is returned unchanged.
    pub fn is_exempt(&self, raw: &str) -> bool {
        !self.config.enabled || raw.contains(&self.config.debug_marker)
    }

    /// Returns the token for `raw`, generating it on first sight.
    pub fn anonymize(&mut self, raw: &str) -> Result<String, AnonymizeError> {
        if self.is_exempt(raw) {
            return Ok(raw.to_string());
        }
        if let Some(token) = self.mapping.get(raw) {
            return Ok(token.clone());
        }

        let token = self.token_for(raw);
        if let Some(owner) = self.owners.get(&token) {
            return Err(AnonymizeError::Collision {
                token,
                first: owner.clone(),
                second: raw.to_string(),
            });
        }

        tracing::trace!(%token, "assigned anonymization token");
        self.owners.insert(token.clone(), raw.to_string());
        self.mapping.insert(raw.to_string(), token.clone());
        Ok(token)
    }

    fn token_for(&self, raw: &str) -> String {
        let mut hasher = Sha256::new();
        if let Some(salt) = &self.config.salt {
            hasher.update(salt.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(raw.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("w{}", &digest[..TOKEN_HEX_LEN])
    }

    /// The forward mapping (raw id to token), sorted by raw id.
    ///
    /// Exempt ids are not recorded.
    pub const fn mapping(&self) -> &BTreeMap<String, String> {
        &self.mapping
    }

    /// Persists the forward mapping as a JSON object.
    pub fn save(&self, path: &Path) -> Result<(), AnonymizeError> {
        let json = serde_json::to_string_pretty(&self.mapping)?;
        fs::write(path, json).map_err(|source| AnonymizeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), ids = self.mapping.len(), "saved identifier map");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anonymizer() -> Anonymizer {
        Anonymizer::new(AnonymizerConfig::default())
    }

    #[test]
    fn same_input_same_token() {
        let mut anon = anonymizer();
        let first = anon.anonymize("A1B2C3").unwrap();
        let second = anon.anonymize("A1B2C3").unwrap();
        assert_eq!(first, second);
        assert_ne!(first, "A1B2C3");
        assert_eq!(first.len(), 1 + TOKEN_HEX_LEN);
        assert!(first.starts_with('w'));
    }

    #[test]
    fn distinct_inputs_distinct_tokens() {
        let mut anon = anonymizer();
        let tokens: std::collections::HashSet<String> = (0..500)
            .map(|i| anon.anonymize(&format!("WORKER{i}")).unwrap())
            .collect();
        assert_eq!(tokens.len(), 500);
    }

    #[test]
    fn debug_ids_pass_through() {
        let mut anon = anonymizer();
        assert_eq!(anon.anonymize("debug12345").unwrap(), "debug12345");
        assert!(anon.mapping().is_empty());
    }

    #[test]
    fn disabled_anonymizer_passes_everything() {
        let mut anon = Anonymizer::new(AnonymizerConfig {
            enabled: false,
            ..AnonymizerConfig::default()
        });
        assert_eq!(anon.anonymize("A1B2C3").unwrap(), "A1B2C3");
    }

    #[test]
    fn salt_changes_tokens() {
        let mut plain = anonymizer();
        let mut salted = Anonymizer::new(AnonymizerConfig {
            salt: Some("pepper".to_string()),
            ..AnonymizerConfig::default()
        });
        assert_ne!(plain.anonymize("A1").unwrap(), salted.anonymize("A1").unwrap());
    }

    #[test]
    fn save_writes_forward_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identifiers.json");

        let mut anon = anonymizer();
        let token = anon.anonymize("A1").unwrap();
        anon.anonymize("debug-1").unwrap();
        anon.save(&path).unwrap();

        let saved: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved["A1"], token);
    }

    #[test]
    fn debug_config_redacts_salt() {
        let config = AnonymizerConfig {
            salt: Some("secret".to_string()),
            ..AnonymizerConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
