//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Name of the per-project config file looked up in the working directory.
const LOCAL_CONFIG_FILE: &str = "xp.toml";

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the `raw/<version>` and `processed/<version>` trees.
    pub data_dir: PathBuf,

    /// Experiment code version used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Worker and unique ids containing this marker are test participants.
    pub debug_marker: String,

    /// Worker id prefix of the recruitment platform's preview participant.
    pub preview_worker_prefix: String,

    /// Secret mixed into anonymization tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymize_salt: Option<String>,

    /// Practice threshold for experiments without an instructions phase.
    pub instructions_end_fallback: f64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field("version", &self.version)
            .field("debug_marker", &self.debug_marker)
            .field("preview_worker_prefix", &self.preview_worker_prefix)
            .field(
                "anonymize_salt",
                &self.anonymize_salt.as_ref().map(|_| "[REDACTED]"),
            )
            .field("instructions_end_fallback", &self.instructions_end_fallback)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            version: None,
            debug_marker: "debug".to_string(),
            preview_worker_prefix: "601055".to_string(),
            anonymize_salt: None,
            instructions_end_fallback: 0.0,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources override earlier ones: defaults, the user config file,
    /// `./xp.toml`, the given file, then `XP_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from the project directory
        figment = figment.merge(Toml::file_exact(LOCAL_CONFIG_FILE));

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (XP_*)
        figment = figment.merge(Env::prefixed("XP_"));

        figment.extract()
    }

    /// Directory holding raw data for `version`.
    pub fn raw_dir(&self, version: &str) -> PathBuf {
        self.data_dir.join("raw").join(version)
    }

    /// Directory receiving processed output for `version`.
    pub fn processed_dir(&self, version: &str) -> PathBuf {
        self.data_dir.join("processed").join(version)
    }

    /// Resolves the experiment version from the argument or configuration.
    pub fn resolve_version(&self, arg: Option<&str>) -> anyhow::Result<String> {
        if let Some(version) = arg {
            return Ok(version.to_string());
        }
        match &self.version {
            Some(version) => {
                tracing::info!(%version, "using configured version");
                Ok(version.clone())
            }
            None => anyhow::bail!(
                "no experiment version given; pass VERSION or set `version` in {LOCAL_CONFIG_FILE} (or XP_VERSION)"
            ),
        }
    }
}

/// Returns the platform-specific config directory for xp.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("xp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use figment::Jail;

    #[test]
    fn test_default_config_paths() {
        let config = Config::default();
        assert_eq!(config.raw_dir("v1"), PathBuf::from("data/raw/v1"));
        assert_eq!(config.processed_dir("v1"), PathBuf::from("data/processed/v1"));
    }

    #[test]
    fn test_resolve_version_prefers_argument() {
        let config = Config {
            version: Some("configured".to_string()),
            ..Config::default()
        };
        assert_eq!(config.resolve_version(Some("cli")).unwrap(), "cli");
        assert_eq!(config.resolve_version(None).unwrap(), "configured");
    }

    #[test]
    fn test_resolve_version_requires_some_source() {
        let err = Config::default().resolve_version(None).unwrap_err();
        assert!(err.to_string().contains("no experiment version"));
    }

    #[test]
    fn test_layering_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                data_dir = "/srv/experiment"
                version = "v3"
                anonymize_salt = "pepper"
                "#,
            )?;
            jail.set_env("XP_VERSION", "v4");

            let config = Config::load_from(Some(Path::new("custom.toml")))?;
            assert_eq!(config.data_dir, PathBuf::from("/srv/experiment"));
            assert_eq!(config.version.as_deref(), Some("v4"));
            assert_eq!(config.debug_marker, "debug");
            assert_eq!(config.anonymize_salt.as_deref(), Some("pepper"));
            Ok(())
        });
    }

    #[test]
    fn test_debug_redacts_salt() {
        let config = Config {
            anonymize_salt: Some("pepper".to_string()),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("pepper"));
    }
}
