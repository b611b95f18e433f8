//! Top-level analysis configuration

use super::error::ConfigResult;
use super::preset::Preset;
use super::sections::{CacheConfig, PsaConfig, SmtConfig};
use serde::{Deserialize, Serialize};

/// Every knob of the engine, passed by reference into the components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    pub preset: Preset,
    #[serde(default)]
    pub psa: PsaConfig,
    #[serde(default)]
    pub smt: SmtConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::preset(Preset::default())
    }
}

impl AnalysisConfig {
    pub fn preset(preset: Preset) -> Self {
        Self {
            preset,
            psa: PsaConfig::from_preset(preset),
            smt: SmtConfig::from_preset(preset),
            cache: CacheConfig::default(),
        }
    }

    /// Override the path-sensitivity section
    pub fn psa(mut self, f: impl FnOnce(PsaConfig) -> PsaConfig) -> Self {
        self.psa = f(self.psa);
        self
    }

    /// Override the SMT section
    pub fn smt(mut self, f: impl FnOnce(SmtConfig) -> SmtConfig) -> Self {
        self.smt = f(self.smt);
        self
    }

    /// Override the cache section
    pub fn cache(mut self, f: impl FnOnce(CacheConfig) -> CacheConfig) -> Self {
        self.cache = f(self.cache);
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.psa.validate()?;
        self.smt.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    /// Validate and return the configuration
    pub fn build(self) -> ConfigResult<Self> {
        self.validate()?;
        Ok(self)
    }
}
