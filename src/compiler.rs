//! # Compile Facade
//!
//! `Compiler` ties the pipeline together: lex → parse (with recovery) →
//! bind → drive the datasets → emit. It owns the warning collector (cleared
//! at the start of each compile), the plugin registry, the import loader
//! and the configuration, and threads the seeded PRNG through generation.

use crate::binder;
use crate::config::CompileConfig;
use crate::dataset;
use crate::error::{CompileResult, VagueError};
use crate::import::{FileSpecLoader, SpecLoader};
use crate::parser;
use crate::plugin::{Plugin, PluginRegistry};
use crate::rng::Prng;
use crate::value::Value;
use crate::warnings::WarningCollector;

/// One compilation environment. Reusable: each `compile` call clears the
/// warning collector and runs in isolation; plugins, loader and seed
/// persist across calls.
pub struct Compiler {
    config: CompileConfig,
    plugins: PluginRegistry,
    loader: Box<dyn SpecLoader>,
    warnings: WarningCollector,
    seed: Option<u64>,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            config: CompileConfig::default(),
            plugins: PluginRegistry::new(),
            loader: Box::new(FileSpecLoader::default()),
            warnings: WarningCollector::new(),
            seed: None,
        }
    }

    pub fn with_config(mut self, config: CompileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_loader(mut self, loader: impl SpecLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Install a deterministic seed for every subsequent compile.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    pub fn register_plugin(&mut self, plugin: Plugin) {
        self.plugins.register(plugin);
    }

    /// The warnings of the most recent compile.
    pub fn warnings(&self) -> &WarningCollector {
        &self.warnings
    }

    /// Compile a program to its output value: a record mapping each
    /// dataset collection name to a list of generated records.
    pub fn compile(&mut self, source: &str) -> CompileResult<Value> {
        self.warnings.clear();

        let (program, errors) = parser::parse_with_recovery(source);
        if !errors.is_empty() {
            return Err(VagueError::ParseCollection(errors));
        }

        let bound = binder::bind(&program, self.loader.as_ref(), &mut self.warnings)?;

        let mut prng = match self.seed.or(self.config.generation.seed) {
            Some(seed) => Prng::seeded(seed),
            None => Prng::from_entropy(),
        };

        dataset::drive(
            &bound,
            &self.plugins,
            &self.config,
            &mut prng,
            &mut self.warnings,
        )
    }

    /// Compile straight to JSON.
    pub fn compile_json(&mut self, source: &str) -> CompileResult<serde_json::Value> {
        Ok(self.compile(source)?.to_json())
    }
}

/// Convenience one-shot compile with default configuration and no
/// plugins. Warnings are discarded; use [`Compiler`] to inspect them.
pub fn compile(source: &str) -> CompileResult<Value> {
    Compiler::new().compile(source)
}
