//! Analysis configuration
//!
//! Two tiers:
//! - Preset: `AnalysisConfig::preset(Preset::Fast)`
//! - Section override: `.smt(|c| c.timeout_ms(500))` or a v1 YAML file
//!
//! ```rust,ignore
//! use symstate_engine::config::{AnalysisConfig, Preset};
//!
//! let config = AnalysisConfig::preset(Preset::Balanced)
//!     .psa(|c| c.optimize_states(true))
//!     .build()?;
//!
//! let config = AnalysisConfig::from_yaml("analysis.yaml")?;
//! ```

pub mod analysis_config;
pub mod error;
pub mod io;
pub mod preset;
pub mod sections;

pub use analysis_config::AnalysisConfig;
pub use error::{ConfigError, ConfigResult};
pub use io::ConfigExportV1;
pub use preset::Preset;
pub use sections::{BackendKind, CacheConfig, PsaConfig, PsaMode, SmtConfig};
