//! # Constraint Engine
//!
//! Two enforcement surfaces, both by resample-with-retry:
//!
//! - per-record `assume` items (flat or guarded), applied while a record is
//!   generated: a failing record is thrown away and regenerated, up to the
//!   configured record retry budget;
//! - dataset-level `validate` blocks, applied by the driver to the whole
//!   built dataset, which is regenerated on failure up to the dataset retry
//!   budget.
//!
//! A `violating` dataset inverts acceptance: a record must *fail* at least
//! one assume (and the dataset's validate block must fail as a whole).
//! Exhausting a budget emits `ConstraintRetryLimit` and accepts the last
//! candidate rather than aborting the compile.

use crate::ast::{AssumeItem, DatasetDef, FieldOverride, SchemaDef};
use crate::error::CompileResult;
use crate::eval::{EvalState, Evaluator, Scope};
use crate::generator::UniqueTracker;
use crate::value::Record;
use crate::warnings::{Warning, WarningKind};

impl<'a> Evaluator<'a> {
    /// Generate a record and resample it until its schema's `assume`
    /// constraints accept it (or reject it, in violating mode).
    pub fn generate_record_constrained(
        &self,
        schema: &SchemaDef,
        parent: Option<&Record>,
        overrides: &[FieldOverride],
        violating: bool,
        state: &mut EvalState<'_>,
        uniq: &mut UniqueTracker,
    ) -> CompileResult<Record> {
        // Nothing to violate: a schema without constraints accepts its
        // first candidate even in violating mode.
        if schema.assumes.is_empty() {
            return self.generate_record(schema, parent, overrides, state, uniq);
        }

        let retries = self.config.limits.record_retries.max(1);
        let mut last = None;
        for _ in 0..retries {
            // Unique bookkeeping from rejected attempts must not leak.
            let mut attempt_uniq = uniq.clone();
            let record =
                self.generate_record(schema, parent, overrides, state, &mut attempt_uniq)?;
            let satisfied = self.assumes_hold(schema, &record, parent, state)?;
            let accepted = if violating { !satisfied } else { satisfied };
            if accepted {
                *uniq = attempt_uniq;
                return Ok(record);
            }
            last = Some((record, attempt_uniq));
        }

        let (record, attempt_uniq) = last.expect("retries >= 1 always produces a candidate");
        *uniq = attempt_uniq;
        state.warnings.add(
            Warning::new(
                WarningKind::ConstraintRetryLimit,
                if violating {
                    format!(
                        "could not produce a violating record of schema '{}' within {retries} retries",
                        schema.name
                    )
                } else {
                    format!(
                        "constraints of schema '{}' still failing after {retries} retries; accepting the last candidate",
                        schema.name
                    )
                },
            )
            .with_schema(schema.name.clone()),
        );
        Ok(record)
    }

    /// Whether every `assume` item of the schema holds for the record.
    /// Guarded items are vacuously true when their guard is false.
    pub fn assumes_hold(
        &self,
        schema: &SchemaDef,
        record: &Record,
        parent: Option<&Record>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<bool> {
        let scope = Scope {
            record: Some(record),
            parent,
            element: None,
        };
        for assume in &schema.assumes {
            match assume {
                AssumeItem::Flat(pred) => {
                    if !self.eval(pred, scope, state)?.as_bool()? {
                        return Ok(false);
                    }
                }
                AssumeItem::Guarded { cond, predicates } => {
                    if !self.eval(cond, scope, state)?.as_bool()? {
                        continue;
                    }
                    for pred in predicates {
                        if !self.eval(pred, scope, state)?.as_bool()? {
                            return Ok(false);
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    /// Whether the dataset's `validate` block holds against the built
    /// arena. An empty block holds trivially.
    pub fn validate_holds(
        &self,
        dataset: &DatasetDef,
        state: &mut EvalState<'_>,
    ) -> CompileResult<bool> {
        for pred in &dataset.validate {
            if !self.eval(pred, Scope::empty(), state)?.as_bool()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
