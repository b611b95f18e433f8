//! Section configuration types
//!
//! One struct per component, each with its own range validation and
//! by-value builder setters.

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use serde::{Deserialize, Serialize};

// ============================================================================
// Path-sensitivity analysis
// ============================================================================

/// Which path-sensitivity algorithm populates instruction states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsaMode {
    OneForOne,
    OneForAll,
    OneForAllTd,
}

/// Path-sensitivity configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PsaConfig {
    pub mode: PsaMode,

    /// Drop worklist items whose incoming state is flagged unreachable
    pub check_unreachable: bool,

    /// Run the state-size optimizer on finalized states
    pub optimize_states: bool,

    /// Hoist common prefixes out of merged choices (OneForAll)
    pub aggressive_choice_optimization: bool,

    /// Append each instruction's post-map predicates to later states
    pub assume_defects_trigger_once: bool,
}

impl Default for PsaConfig {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}

impl PsaConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Precise => Self {
                mode: PsaMode::OneForOne,
                check_unreachable: true,
                optimize_states: false,
                aggressive_choice_optimization: false,
                assume_defects_trigger_once: false,
            },
            Preset::Balanced => Self {
                mode: PsaMode::OneForAll,
                check_unreachable: true,
                optimize_states: false,
                aggressive_choice_optimization: false,
                assume_defects_trigger_once: false,
            },
            Preset::Fast => Self {
                mode: PsaMode::OneForAllTd,
                check_unreachable: true,
                optimize_states: true,
                aggressive_choice_optimization: true,
                assume_defects_trigger_once: false,
            },
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.aggressive_choice_optimization && self.mode == PsaMode::OneForOne {
            return Err(ConfigError::Conflict {
                issue: "aggressive_choice_optimization has no effect in one_for_one mode"
                    .to_string(),
                fix: "use mode one_for_all or disable aggressive_choice_optimization".to_string(),
            });
        }
        Ok(())
    }

    pub fn mode(mut self, v: PsaMode) -> Self {
        self.mode = v;
        self
    }

    pub fn check_unreachable(mut self, v: bool) -> Self {
        self.check_unreachable = v;
        self
    }

    pub fn optimize_states(mut self, v: bool) -> Self {
        self.optimize_states = v;
        self
    }

    pub fn aggressive_choice_optimization(mut self, v: bool) -> Self {
        self.aggressive_choice_optimization = v;
        self
    }

    pub fn assume_defects_trigger_once(mut self, v: bool) -> Self {
        self.assume_defects_trigger_once = v;
        self
    }
}

// ============================================================================
// SMT layer
// ============================================================================

/// Solver backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Bit-blasting backend shipped with the crate
    Builtin,
    /// Z3 through the `z3` cargo feature
    Z3,
}

/// SMT encoding and solving configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtConfig {
    pub backend: BackendKind,

    /// Wall-clock budget per check in milliseconds (0 = unlimited)
    pub timeout_ms: u64,

    /// Unwritten memory cells are unconstrained instead of 0xFF
    pub memory_defaults_to_unknown: bool,

    /// Malloc results may be null
    pub nullable_mallocs: bool,

    /// Ignore initializers of global data (SeqData over globals)
    pub skip_static_init: bool,

    /// Store GEP bounds in memory instead of constraining a free bounds array
    pub craig_colton_bounds: bool,

    /// Models collected per probe (1..=1024)
    pub probe_count_limit: usize,

    /// Solver calls allowed per probe (1..=100000)
    pub probe_attempt_limit: usize,

    /// Cube-blocking rounds of the interpolation loop (1..=100000)
    pub interpolation_max_iterations: usize,

    /// SAT conflicts per check for the builtin backend (0 = unlimited)
    pub conflict_budget: u64,
}

impl Default for SmtConfig {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}

impl SmtConfig {
    pub fn from_preset(preset: Preset) -> Self {
        let base = Self {
            backend: BackendKind::Builtin,
            timeout_ms: 10_000,
            memory_defaults_to_unknown: false,
            nullable_mallocs: true,
            skip_static_init: false,
            craig_colton_bounds: false,
            probe_count_limit: 16,
            probe_attempt_limit: 100,
            interpolation_max_iterations: 64,
            conflict_budget: 200_000,
        };
        match preset {
            Preset::Precise => Self {
                timeout_ms: 60_000,
                interpolation_max_iterations: 256,
                conflict_budget: 1_000_000,
                ..base
            },
            Preset::Balanced => base,
            Preset::Fast => Self {
                timeout_ms: 2_000,
                probe_count_limit: 4,
                probe_attempt_limit: 20,
                interpolation_max_iterations: 16,
                conflict_budget: 20_000,
                ..base
            },
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.probe_count_limit == 0 || self.probe_count_limit > 1024 {
            return Err(ConfigError::range_with_hint(
                "probe_count_limit",
                self.probe_count_limit,
                1,
                1024,
                "At least one model must be probed",
            ));
        }

        if self.probe_attempt_limit == 0 || self.probe_attempt_limit > 100_000 {
            return Err(ConfigError::range_with_hint(
                "probe_attempt_limit",
                self.probe_attempt_limit,
                1,
                100_000,
                "Probing must be allowed at least one solver call",
            ));
        }

        if self.probe_attempt_limit < self.probe_count_limit {
            return Err(ConfigError::Conflict {
                issue: format!(
                    "probe_attempt_limit ({}) is below probe_count_limit ({})",
                    self.probe_attempt_limit, self.probe_count_limit
                ),
                fix: "raise probe_attempt_limit".to_string(),
            });
        }

        if self.interpolation_max_iterations == 0 || self.interpolation_max_iterations > 100_000 {
            return Err(ConfigError::range_with_hint(
                "interpolation_max_iterations",
                self.interpolation_max_iterations,
                1,
                100_000,
                "Interpolation must be allowed to run at least once",
            ));
        }

        if self.backend == BackendKind::Z3 && !cfg!(feature = "z3") {
            return Err(ConfigError::Conflict {
                issue: "backend z3 selected but the crate was built without the z3 feature"
                    .to_string(),
                fix: "enable the `z3` cargo feature or use backend builtin".to_string(),
            });
        }

        Ok(())
    }

    pub fn backend(mut self, v: BackendKind) -> Self {
        self.backend = v;
        self
    }

    pub fn timeout_ms(mut self, v: u64) -> Self {
        self.timeout_ms = v;
        self
    }

    pub fn memory_defaults_to_unknown(mut self, v: bool) -> Self {
        self.memory_defaults_to_unknown = v;
        self
    }

    pub fn nullable_mallocs(mut self, v: bool) -> Self {
        self.nullable_mallocs = v;
        self
    }

    pub fn skip_static_init(mut self, v: bool) -> Self {
        self.skip_static_init = v;
        self
    }

    pub fn craig_colton_bounds(mut self, v: bool) -> Self {
        self.craig_colton_bounds = v;
        self
    }

    pub fn probe_count_limit(mut self, v: usize) -> Self {
        self.probe_count_limit = v;
        self
    }

    pub fn probe_attempt_limit(mut self, v: usize) -> Self {
        self.probe_attempt_limit = v;
        self
    }

    pub fn interpolation_max_iterations(mut self, v: usize) -> Self {
        self.interpolation_max_iterations = v;
        self
    }

    pub fn conflict_budget(mut self, v: u64) -> Self {
        self.conflict_budget = v;
        self
    }
}

// ============================================================================
// Encoding cache
// ============================================================================

/// Encoding cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Entries kept in the LRU (1..=1000000)
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 || self.capacity > 1_000_000 {
            return Err(ConfigError::range_with_hint(
                "capacity",
                self.capacity,
                1,
                1_000_000,
                "The encoding cache needs at least one slot",
            ));
        }
        Ok(())
    }

    pub fn capacity(mut self, v: usize) -> Self {
        self.capacity = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for preset in [Preset::Precise, Preset::Balanced, Preset::Fast] {
            PsaConfig::from_preset(preset).validate().unwrap();
            SmtConfig::from_preset(preset).validate().unwrap();
        }
        CacheConfig::default().validate().unwrap();
    }

    #[test]
    fn test_probe_limits() {
        let cfg = SmtConfig::default().probe_count_limit(0);
        assert!(matches!(cfg.validate(), Err(ConfigError::Range { .. })));

        let cfg = SmtConfig::default()
            .probe_count_limit(16)
            .probe_attempt_limit(8);
        assert!(matches!(cfg.validate(), Err(ConfigError::Conflict { .. })));
    }

    #[test]
    fn test_choice_optimization_conflicts_with_one_for_one() {
        let cfg = PsaConfig::default()
            .mode(PsaMode::OneForOne)
            .aggressive_choice_optimization(true);
        assert!(cfg.validate().is_err());
    }

    #[cfg(not(feature = "z3"))]
    #[test]
    fn test_z3_backend_requires_feature() {
        let cfg = SmtConfig::default().backend(BackendKind::Z3);
        assert!(matches!(cfg.validate(), Err(ConfigError::Conflict { .. })));
    }

    #[test]
    fn test_default_probe_limits() {
        let cfg = SmtConfig::default();
        assert_eq!(cfg.probe_count_limit, 16);
        assert_eq!(cfg.probe_attempt_limit, 100);
        assert!(!cfg.memory_defaults_to_unknown);
    }
}
