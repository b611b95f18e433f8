//! Configuration I/O (YAML)
//!
//! Schema v1: a preset plus optional per-section overrides. Sections given in
//! the file replace the preset's section wholesale; omitted fields inside a
//! section fall back to the section default.

use super::analysis_config::AnalysisConfig;
use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::sections::{CacheConfig, PsaConfig, SmtConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1)
    pub version: Option<u32>,

    /// Base preset
    pub preset: Preset,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub psa: Option<PsaConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub smt: Option<SmtConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
}

impl AnalysisConfig {
    /// Parse a v1 YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let export: ConfigExportV1 = serde_yaml::from_str(yaml).map_err(unknown_field_or_yaml)?;
        let version = export.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let mut config = AnalysisConfig::preset(export.preset);
        if let Some(psa) = export.psa {
            config.psa = psa;
        }
        if let Some(smt) = export.smt {
            config.smt = smt;
        }
        if let Some(cache) = export.cache {
            config.cache = cache;
        }
        config.build()
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: Some(1),
            preset: self.preset,
            psa: Some(self.psa.clone()),
            smt: Some(self.smt.clone()),
            cache: Some(self.cache.clone()),
        };
        Ok(serde_yaml::to_string(&export)?)
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

/// Turns serde's "unknown field `x`, expected one of `a`, `b`" into an
/// `UnknownField` error with a suggestion; other errors pass through
fn unknown_field_or_yaml(err: serde_yaml::Error) -> ConfigError {
    let msg = err.to_string();
    let Some(at) = msg.find("unknown field `") else {
        return err.into();
    };
    let rest = &msg[at + "unknown field `".len()..];
    let Some(end) = rest.find('`') else {
        return err.into();
    };
    let field = &rest[..end];
    let expected = rest[end + 1..]
        .split(" at line")
        .next()
        .unwrap_or_default();
    let valid: Vec<String> = expected
        .split('`')
        .skip(1)
        .step_by(2)
        .map(str::to_string)
        .collect();
    let section = msg[..at]
        .trim_end()
        .trim_end_matches(':')
        .rsplit(['.', ' '])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("root");
    ConfigError::unknown_field_with_suggestion(field, section, valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sections::PsaMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_yaml_roundtrip() {
        let config = AnalysisConfig::preset(Preset::Fast).smt(|c| c.timeout_ms(1234));

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(yaml.contains("preset: fast"));
        assert!(yaml.contains("timeout_ms: 1234"));

        let back = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_yaml_loading() {
        let yaml_content = r#"
version: 1
preset: precise
psa:
  mode: one_for_all_td
  optimize_states: true
smt:
  timeout_ms: 500
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = AnalysisConfig::from_yaml(temp_file.path()).unwrap();
        assert_eq!(config.psa.mode, PsaMode::OneForAllTd);
        assert!(config.psa.optimize_states);
        assert_eq!(config.smt.timeout_ms, 500);
        assert_eq!(config.smt.probe_count_limit, 16);
    }

    #[test]
    fn test_yaml_missing_version() {
        let result = AnalysisConfig::from_yaml_str("preset: fast\n");
        assert!(matches!(result, Err(ConfigError::MissingVersion)));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let result = AnalysisConfig::from_yaml_str("version: 2\npreset: fast\n");
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_yaml_unknown_field() {
        let yaml = "version: 1\npreset: fast\nsmt:\n  timout_ms: 5\n";
        match AnalysisConfig::from_yaml_str(yaml) {
            Err(ConfigError::UnknownField {
                field,
                suggestion,
                valid_fields,
                ..
            }) => {
                assert_eq!(field, "timout_ms");
                assert!(suggestion.contains("timeout_ms"), "{}", suggestion);
                assert!(valid_fields.iter().any(|f| f == "backend"));
            }
            other => panic!("expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn test_yaml_syntax_error_stays_yaml() {
        assert!(matches!(
            AnalysisConfig::from_yaml_str("version: [1\n"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
