//! # Import Loading
//!
//! `import common from "common.vague"` pulls schema shapes from another
//! source. Loading is delegated to a [`SpecLoader`] so embedders control
//! where specs come from (disk, memory, a registry). The default
//! [`FileSpecLoader`] reads and parses `.vague` files relative to a base
//! directory.

use crate::ast::SchemaDef;
use crate::error::{CompileResult, VagueError};
use crate::parser;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Schemas exported by an imported module, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ImportedModule {
    pub schemas: IndexMap<String, SchemaDef>,
}

impl ImportedModule {
    pub fn new() -> Self {
        ImportedModule::default()
    }

    pub fn with_schema(mut self, schema: SchemaDef) -> Self {
        self.schemas.insert(schema.name.clone(), schema);
        self
    }
}

/// External collaborator that resolves an import path to a module.
pub trait SpecLoader {
    fn load(&self, path: &str) -> CompileResult<ImportedModule>;
}

/// Loads and parses `.vague` sources from disk.
#[derive(Debug, Clone)]
pub struct FileSpecLoader {
    base_dir: PathBuf,
}

impl FileSpecLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FileSpecLoader {
            base_dir: base_dir.into(),
        }
    }
}

impl Default for FileSpecLoader {
    fn default() -> Self {
        FileSpecLoader::new(".")
    }
}

impl SpecLoader for FileSpecLoader {
    fn load(&self, path: &str) -> CompileResult<ImportedModule> {
        let full = self.base_dir.join(path);
        let source = std::fs::read_to_string(&full).map_err(|err| {
            VagueError::runtime(format!("cannot read import '{}': {err}", full.display()))
        })?;
        let program = parser::parse(&source)?;
        let mut module = ImportedModule::new();
        for schema in program.schemas() {
            module
                .schemas
                .insert(schema.name.clone(), schema.clone());
        }
        Ok(module)
    }
}

/// A loader with no modules; every import fails. Used when the embedder
/// supplies no loader but a program still declares imports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImports;

impl SpecLoader for NoImports {
    fn load(&self, path: &str) -> CompileResult<ImportedModule> {
        Err(VagueError::runtime(format!(
            "no import loader is configured; cannot load '{path}'"
        )))
    }
}
