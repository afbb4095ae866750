//! Warning Collection
//!
//! Non-fatal diagnostics produced during generation. A compile succeeds with
//! warnings; callers inspect the collector afterwards. The collector lives
//! for exactly one compile and is cleared at the start of the next.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Warning categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A `unique` field ran out of distinct values for its collection
    UniqueValueExhaustion,
    /// Constraint resampling hit the retry budget; last candidate accepted
    ConstraintRetryLimit,
    /// A schema inheriting from an import declares a field the base lacks
    UnknownFieldInImportedSchema,
    /// A derived field could not be recomputed in the final pass
    DerivedFieldFailure,
    /// A registered plugin was expected but not found
    PluginMissing,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::UniqueValueExhaustion => "unique-value-exhaustion",
            WarningKind::ConstraintRetryLimit => "constraint-retry-limit",
            WarningKind::UnknownFieldInImportedSchema => "unknown-field-in-imported-schema",
            WarningKind::DerivedFieldFailure => "derived-field-failure",
            WarningKind::PluginMissing => "plugin-missing",
        };
        write!(f, "{name}")
    }
}

/// A single structured warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Schema the warning refers to, when applicable
    pub schema: Option<String>,
    /// Field the warning refers to, when applicable
    pub field: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Warning {
            kind,
            schema: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(schema) = &self.schema {
            write!(f, " schema={schema}")?;
        }
        if let Some(field) = &self.field {
            write!(f, " field={field}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Accumulates warnings over one compilation.
#[derive(Debug, Default)]
pub struct WarningCollector {
    warnings: Vec<Warning>,
}

impl WarningCollector {
    pub fn new() -> Self {
        WarningCollector::default()
    }

    /// Drop all collected warnings. Called at the start of each compile.
    pub fn clear(&mut self) {
        self.warnings.clear();
    }

    pub fn add(&mut self, warning: Warning) {
        tracing::warn!(kind = %warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn get_all(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn get_by_kind(&self, kind: WarningKind) -> Vec<&Warning> {
        self.warnings.iter().filter(|w| w.kind == kind).collect()
    }

    pub fn has_any(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
