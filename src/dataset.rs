//! # Dataset Driver
//!
//! Orchestrates one dataset at a time, in declaration order:
//!
//! 1. generate each collection (cardinality draw, then records 0..N), with
//!    collection-level field overrides and the constraint engine applied
//!    per record;
//! 2. run `then` hooks for every `any of` reference found in the built
//!    records, one execution per reference, mutating the referenced record
//!    through its arena index;
//! 3. recompute derived fields (pure expressions over the now-final
//!    record), warning `DerivedFieldFailure` and keeping the generated
//!    value if recomputation fails;
//! 4. evaluate the `validate` block; on failure regenerate the whole
//!    dataset up to the dataset retry budget;
//! 5. strip `private` fields and resolve arena references for emission.

use crate::ast::{DatasetDef, SchemaDef, TypeExpr};
use crate::binder::BoundProgram;
use crate::config::CompileConfig;
use crate::error::{CompileResult, VagueError};
use crate::eval::{Arena, EvalState, Evaluator, Scope, SequenceState};
use crate::generator::UniqueTracker;
use crate::plugin::PluginRegistry;
use crate::rng::Prng;
use crate::value::{Record, RecordRef, Value};
use crate::warnings::{Warning, WarningCollector, WarningKind};
use indexmap::IndexMap;

/// Generate every dataset of the bound program and assemble the final
/// output value: one key per dataset collection, each a list of records.
pub fn drive(
    bound: &BoundProgram,
    plugins: &PluginRegistry,
    config: &CompileConfig,
    prng: &mut Prng,
    warnings: &mut WarningCollector,
) -> CompileResult<Value> {
    let evaluator = Evaluator {
        schemas: &bound.schemas,
        lets: &bound.lets,
        plugins,
        config,
    };

    let mut output = IndexMap::new();
    for dataset in &bound.datasets {
        tracing::debug!(dataset = %dataset.name, "generating dataset");
        let arena = evaluator.generate_dataset(dataset, prng, warnings)?;
        for collection in &dataset.collections {
            let records = arena
                .get(&collection.name)
                .ok_or_else(|| {
                    VagueError::runtime(format!(
                        "collection '{}' missing from generated dataset",
                        collection.name
                    ))
                })?;
            let schema = evaluator.schema_of(&collection.schema)?;
            let emitted: Vec<Value> = records
                .iter()
                .map(|record| evaluator.emit_record(record, schema, &arena, dataset))
                .collect::<CompileResult<_>>()?;
            output.insert(collection.name.clone(), Value::List(emitted));
        }
    }
    Ok(Value::Record(output))
}

impl<'a> Evaluator<'a> {
    fn schema_of(&self, name: &str) -> CompileResult<&SchemaDef> {
        self.schemas
            .get(name)
            .ok_or_else(|| VagueError::runtime(format!("unknown schema '{name}'")))
    }

    /// Build the full arena for one dataset, including the
    /// `validate`-driven regeneration loop.
    fn generate_dataset(
        &self,
        dataset: &DatasetDef,
        prng: &mut Prng,
        warnings: &mut WarningCollector,
    ) -> CompileResult<Arena> {
        let budget = self.config.limits.dataset_retries.max(1);
        let has_validate = !dataset.validate.is_empty();

        let mut last = None;
        for attempt in 0..budget {
            let arena = self.generate_dataset_once(dataset, prng, warnings)?;

            if !has_validate {
                return Ok(arena);
            }

            let holds = {
                let mut seq = SequenceState::new();
                let mut state = EvalState {
                    prng: &mut *prng,
                    warnings: &mut *warnings,
                    arena: &arena,
                    seq: &mut seq,
                };
                self.validate_holds(dataset, &mut state)?
            };
            let accepted = if dataset.violating { !holds } else { holds };
            if accepted {
                if attempt > 0 {
                    tracing::debug!(
                        dataset = %dataset.name,
                        attempts = attempt + 1,
                        "validate accepted after resampling"
                    );
                }
                return Ok(arena);
            }
            last = Some(arena);
        }

        warnings.add(
            Warning::new(
                WarningKind::ConstraintRetryLimit,
                if dataset.violating {
                    format!(
                        "validate block of violating dataset '{}' still holds after {budget} attempts; accepting the last dataset",
                        dataset.name
                    )
                } else {
                    format!(
                        "validate block of dataset '{}' still failing after {budget} attempts; accepting the last dataset",
                        dataset.name
                    )
                },
            )
            .with_schema(dataset.name.clone()),
        );
        last.ok_or_else(|| VagueError::runtime("dataset retry budget must be at least 1"))
    }

    /// One full generation pass over the dataset: collections, then hooks,
    /// derived fields.
    fn generate_dataset_once(
        &self,
        dataset: &DatasetDef,
        prng: &mut Prng,
        warnings: &mut WarningCollector,
    ) -> CompileResult<Arena> {
        let mut arena = Arena::new();

        for collection in &dataset.collections {
            tracing::debug!(collection = %collection.name, schema = %collection.schema, "generating collection");
            let schema = self.schema_of(&collection.schema)?.clone();

            // Cardinality first, evaluated against the collections built so
            // far; its draw precedes every record draw.
            let count = {
                let mut seq = SequenceState::new();
                let mut state = EvalState {
                    prng: &mut *prng,
                    warnings: &mut *warnings,
                    arena: &arena,
                    seq: &mut seq,
                };
                self.eval_cardinality(&collection.cardinality, Scope::empty(), &mut state)?
            };

            let mut seq = SequenceState::new();
            let mut uniq = UniqueTracker::new();
            let mut records = Vec::with_capacity(count);
            for _ in 0..count {
                let record = {
                    let mut state = EvalState {
                        prng: &mut *prng,
                        warnings: &mut *warnings,
                        arena: &arena,
                        seq: &mut seq,
                    };
                    self.generate_record_constrained(
                        &schema,
                        None,
                        &collection.overrides,
                        dataset.violating,
                        &mut state,
                        &mut uniq,
                    )?
                };
                seq.advance(record.clone());
                records.push(record);
            }
            arena.insert(collection.name.clone(), records);
        }

        self.apply_then_hooks(dataset, &mut arena, prng, warnings)?;
        self.derived_pass(dataset, &mut arena, prng, warnings)?;
        Ok(arena)
    }

    /// Execute `then` hooks: every `any of` reference held by a generated
    /// record triggers the referenced schema's hook once, in declaration
    /// order of the referencing collection.
    fn apply_then_hooks(
        &self,
        dataset: &DatasetDef,
        arena: &mut Arena,
        prng: &mut Prng,
        warnings: &mut WarningCollector,
    ) -> CompileResult<()> {
        let mut triggers: Vec<(RecordRef, Record)> = Vec::new();
        for collection in &dataset.collections {
            let Some(records) = arena.get(&collection.name) else {
                continue;
            };
            for record in records {
                collect_reference_triggers(record, &mut triggers);
            }
        }

        for (target, referrer) in triggers {
            let Some(collection) = dataset.collections.iter().find(|c| c.name == target.collection)
            else {
                continue;
            };
            let schema = self.schema_of(&collection.schema)?.clone();
            if schema.then.is_empty() {
                continue;
            }

            let mut updated = arena
                .record(&target)
                .ok_or_else(|| {
                    VagueError::runtime(format!(
                        "then hook target {}[{}] does not exist",
                        target.collection, target.index
                    ))
                })?
                .clone();

            for stmt in &schema.then {
                let value = {
                    let mut seq = SequenceState::new();
                    let mut state = EvalState {
                        prng: &mut *prng,
                        warnings: &mut *warnings,
                        arena: &*arena,
                        seq: &mut seq,
                    };
                    let scope = Scope {
                        record: Some(&updated),
                        parent: Some(&referrer),
                        element: None,
                    };
                    self.eval(&stmt.expr, scope, &mut state)?
                };
                let new_value = match stmt.op {
                    crate::ast::AssignOp::Set => value,
                    crate::ast::AssignOp::Add => {
                        match updated.get(&stmt.target) {
                            None | Some(Value::Null) => value,
                            Some(old) => old.add(&value)?,
                        }
                    }
                };
                updated.insert(stmt.target.clone(), new_value);
            }

            if let Some(slot) = arena.record_mut(&target) {
                *slot = updated;
            }
        }
        Ok(())
    }

    /// Recompute derived fields against the final record state. Failures
    /// keep the originally generated value and warn.
    fn derived_pass(
        &self,
        dataset: &DatasetDef,
        arena: &mut Arena,
        prng: &mut Prng,
        warnings: &mut WarningCollector,
    ) -> CompileResult<()> {
        for collection in &dataset.collections {
            let schema = self.schema_of(&collection.schema)?.clone();
            let len = arena.get(&collection.name).map_or(0, Vec::len);
            for index in 0..len {
                let record = {
                    let Some(records) = arena.get(&collection.name) else {
                        continue;
                    };
                    records[index].clone()
                };
                let updated = self.recompute_derived(&schema, record, None, arena, prng, warnings)?;
                if let Some(records) = arena.get_mut(&collection.name) {
                    records[index] = updated;
                }
            }
        }
        Ok(())
    }

    fn recompute_derived(
        &self,
        schema: &SchemaDef,
        mut record: Record,
        parent: Option<&Record>,
        arena: &Arena,
        prng: &mut Prng,
        warnings: &mut WarningCollector,
    ) -> CompileResult<Record> {
        // Nested collections first, so aggregates over them see their final
        // derived values.
        for field in &schema.fields {
            let TypeExpr::CollectionOf { schema: target, .. } = &field.ty else {
                continue;
            };
            let Some(sub) = self.schemas.get(target) else {
                continue;
            };
            let sub = sub.clone();
            let Some(Value::List(items)) = record.get(&field.name).cloned() else {
                continue;
            };
            let mut updated_items = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Record(nested) => {
                        let nested = self.recompute_derived(
                            &sub,
                            nested,
                            Some(&record),
                            arena,
                            prng,
                            warnings,
                        )?;
                        updated_items.push(Value::Record(nested));
                    }
                    other => updated_items.push(other),
                }
            }
            record.insert(field.name.clone(), Value::List(updated_items));
        }

        for field in &schema.fields {
            let TypeExpr::Expr(expr) = &field.ty else {
                continue;
            };
            if !field.ty.is_derived() {
                continue;
            }
            // A field suppressed by its `when` guard stays absent.
            if field.when.is_some() && !record.contains_key(&field.name) {
                continue;
            }
            let result = {
                let mut seq = SequenceState::new();
                let mut state = EvalState {
                    prng: &mut *prng,
                    warnings: &mut *warnings,
                    arena,
                    seq: &mut seq,
                };
                let scope = Scope {
                    record: Some(&record),
                    parent,
                    element: None,
                };
                self.eval(expr, scope, &mut state)
            };
            match result {
                Ok(value) => {
                    record.insert(field.name.clone(), value);
                }
                Err(err) => {
                    warnings.add(
                        Warning::new(
                            WarningKind::DerivedFieldFailure,
                            format!(
                                "could not recompute derived field '{}' of schema '{}': {err}",
                                field.name, schema.name
                            ),
                        )
                        .with_schema(schema.name.clone())
                        .with_field(field.name.clone()),
                    );
                }
            }
        }
        Ok(record)
    }

    /// Emit one record: declaration-ordered fields, private fields
    /// stripped, arena references resolved to the records they point at.
    fn emit_record(
        &self,
        record: &Record,
        schema: &SchemaDef,
        arena: &Arena,
        dataset: &DatasetDef,
    ) -> CompileResult<Value> {
        let mut out = IndexMap::new();
        for field in &schema.fields {
            if field.private {
                continue;
            }
            let Some(value) = record.get(&field.name) else {
                continue;
            };
            out.insert(
                field.name.clone(),
                self.emit_value(value, Some(&field.ty), arena, dataset)?,
            );
        }
        Ok(Value::Record(out))
    }

    fn emit_value(
        &self,
        value: &Value,
        ty: Option<&TypeExpr>,
        arena: &Arena,
        dataset: &DatasetDef,
    ) -> CompileResult<Value> {
        match value {
            Value::Ref(r) => {
                let record = arena.record(r).ok_or_else(|| {
                    VagueError::runtime(format!(
                        "dangling reference to {}[{}] at emission",
                        r.collection, r.index
                    ))
                })?;
                let collection = dataset
                    .collections
                    .iter()
                    .find(|c| c.name == r.collection)
                    .ok_or_else(|| {
                        VagueError::runtime(format!(
                            "reference to unknown collection '{}'",
                            r.collection
                        ))
                    })?;
                let schema = self.schema_of(&collection.schema)?;
                self.emit_record(record, schema, arena, dataset)
            }
            Value::List(items) => {
                let element_ty = match ty {
                    Some(TypeExpr::CollectionOf { schema, .. }) => Some(schema.as_str()),
                    _ => None,
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match (item, element_ty) {
                        (Value::Record(nested), Some(schema_name)) => {
                            let schema = self.schema_of(schema_name)?;
                            out.push(self.emit_record(nested, schema, arena, dataset)?);
                        }
                        _ => out.push(self.emit_value(item, None, arena, dataset)?),
                    }
                }
                Ok(Value::List(out))
            }
            Value::Record(nested) => {
                let schema_name = match ty {
                    Some(TypeExpr::Named(name)) if self.schemas.contains_key(name) => {
                        Some(name.as_str())
                    }
                    _ => None,
                };
                match schema_name {
                    Some(name) => {
                        let schema = self.schema_of(name)?;
                        self.emit_record(nested, schema, arena, dataset)
                    }
                    None => {
                        let mut out = IndexMap::new();
                        for (key, value) in nested {
                            out.insert(key.clone(), self.emit_value(value, None, arena, dataset)?);
                        }
                        Ok(Value::Record(out))
                    }
                }
            }
            other => Ok(other.clone()),
        }
    }
}

/// Find every arena reference held by a record (including inside nested
/// lists and records), paired with a snapshot of the record that directly
/// holds it. Walk order follows field declaration order, so hook execution
/// order is deterministic.
fn collect_reference_triggers(holder: &Record, out: &mut Vec<(RecordRef, Record)>) {
    for value in holder.values() {
        collect_from_value(value, holder, out);
    }
}

fn collect_from_value(value: &Value, holder: &Record, out: &mut Vec<(RecordRef, Record)>) {
    match value {
        Value::Ref(r) => out.push((r.clone(), holder.clone())),
        Value::List(items) => {
            for item in items {
                match item {
                    Value::Record(nested) => collect_reference_triggers(nested, out),
                    other => collect_from_value(other, holder, out),
                }
            }
        }
        Value::Record(nested) => collect_reference_triggers(nested, out),
        _ => {}
    }
}
