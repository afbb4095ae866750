//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - vague.toml (project configuration)
//! - Environment variables (VAGUE_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # vague.toml
//! [limits]
//! record_retries = 100
//! dataset_retries = 50
//!
//! [generation]
//! seed = 42
//! reference_date = "2024-01-01"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! VAGUE_LIMITS__RECORD_RETRIES=200
//! VAGUE_GENERATION__SEED=7
//! ```

use chrono::NaiveDate;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Compile-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileConfig {
    #[serde(default)]
    pub limits: RetryLimits,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Retry budgets guarding the constraint engine's resampling loops
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryLimits {
    /// Per-record resampling budget for `assume` constraints (R1)
    #[serde(default = "default_record_retries")]
    pub record_retries: usize,

    /// Whole-dataset resampling budget for `validate` blocks (R2)
    #[serde(default = "default_dataset_retries")]
    pub dataset_retries: usize,
}

fn default_record_retries() -> usize {
    100
}

fn default_dataset_retries() -> usize {
    50
}

impl Default for RetryLimits {
    fn default() -> Self {
        RetryLimits {
            record_retries: default_record_retries(),
            dataset_retries: default_dataset_retries(),
        }
    }
}

/// Generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Fixed PRNG seed; omit for a non-deterministic seed per compile
    #[serde(default)]
    pub seed: Option<u64>,

    /// Anchor date for `today`/`now` and the relative date helpers.
    /// A fixed anchor keeps output a function of source and seed alone;
    /// reading the wall clock would change output across days.
    #[serde(default = "default_reference_date")]
    pub reference_date: NaiveDate,
}

fn default_reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            seed: None,
            reference_date: default_reference_date(),
        }
    }
}

impl CompileConfig {
    /// Load from `vague.toml` and `VAGUE_*` environment variables,
    /// falling back to defaults.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("vague.toml"))
            .merge(Env::prefixed("VAGUE_").split("__"))
            .extract()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.generation.seed = Some(seed);
        self
    }

    pub fn with_record_retries(mut self, retries: usize) -> Self {
        self.limits.record_retries = retries;
        self
    }

    pub fn with_dataset_retries(mut self, retries: usize) -> Self {
        self.limits.dataset_retries = retries;
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.generation.reference_date = date;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_budgets() {
        let config = CompileConfig::default();
        assert_eq!(config.limits.record_retries, 100);
        assert_eq!(config.limits.dataset_retries, 50);
        assert_eq!(config.generation.seed, None);
        assert_eq!(
            config.generation.reference_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
        );
    }

    #[test]
    fn builder_overrides() {
        let anchor = NaiveDate::from_ymd_opt(2020, 6, 15).expect("valid date");
        let config = CompileConfig::default()
            .with_seed(42)
            .with_record_retries(10)
            .with_dataset_retries(5)
            .with_reference_date(anchor);
        assert_eq!(config.generation.seed, Some(42));
        assert_eq!(config.limits.record_retries, 10);
        assert_eq!(config.limits.dataset_retries, 5);
        assert_eq!(config.generation.reference_date, anchor);
    }

    #[test]
    fn deserializes_partial_toml() {
        let config: CompileConfig =
            toml_like(r#"{"limits": {"record_retries": 7}, "generation": {}}"#);
        assert_eq!(config.limits.record_retries, 7);
        assert_eq!(config.limits.dataset_retries, 50);
    }

    fn toml_like(json: &str) -> CompileConfig {
        serde_json::from_str(json).expect("deserialize")
    }
}
