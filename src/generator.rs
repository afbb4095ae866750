//! # Field Generator
//!
//! Produces one value per field spec: primitive defaults, ranges with
//! decimal precision, superpositions with residual weight splitting,
//! ordered sequences, embedded records and sub-collections, `any of` picks
//! and generator calls. `unique`, nullable and `when` behavior lives here
//! too.
//!
//! Draw order within one field is fixed and documented by the tests:
//! the `when` guard evaluates first (no draw unless it contains one), then
//! the nullable coin flip, then the value draw itself.

use crate::ast::{
    Cardinality, Expr, FieldOverride, FieldSpec, Primitive, SchemaDef, TypeExpr,
};
use crate::error::{CompileResult, VagueError};
use crate::eval::{literal_value, EvalState, Evaluator, Scope};
use crate::value::{Record, Value};
use crate::warnings::{Warning, WarningKind};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// Per-collection used-value bookkeeping for `unique` fields.
#[derive(Debug, Clone, Default)]
pub struct UniqueTracker {
    used: HashMap<String, Vec<Value>>,
    warned: HashSet<String>,
}

impl UniqueTracker {
    pub fn new() -> Self {
        UniqueTracker::default()
    }

    fn seen(&self, field: &str, value: &Value) -> bool {
        self.used
            .get(field)
            .is_some_and(|values| values.iter().any(|v| v.equals(value)))
    }

    fn insert(&mut self, field: &str, value: Value) {
        self.used.entry(field.to_string()).or_default().push(value);
    }

    fn already_warned(&mut self, field: &str) -> bool {
        !self.warned.insert(field.to_string())
    }
}

impl<'a> Evaluator<'a> {
    /// Generate a full record of `schema`: fields in declaration order,
    /// then refine rewrites. Collection-level `overrides` replace the type
    /// expression of the matching base fields.
    pub fn generate_record(
        &self,
        schema: &SchemaDef,
        parent: Option<&Record>,
        overrides: &[FieldOverride],
        state: &mut EvalState<'_>,
        uniq: &mut UniqueTracker,
    ) -> CompileResult<Record> {
        let mut record = Record::new();
        for field in &schema.fields {
            let spec = effective_spec(field, overrides);
            let value = {
                let scope = Scope {
                    record: Some(&record),
                    parent,
                    element: None,
                };
                self.generate_field(&schema.name, &spec, scope, state, uniq)?
            };
            if let Some(value) = value {
                record.insert(spec.name.clone(), value);
            }
        }

        // Refine: regenerate only the listed fields when the condition
        // holds on the just-generated record.
        for clause in &schema.refine {
            let applies = {
                let scope = Scope {
                    record: Some(&record),
                    parent,
                    element: None,
                };
                self.eval(&clause.cond, scope, state)?.as_bool()?
            };
            if !applies {
                continue;
            }
            for over in &clause.overrides {
                let Some(base) = schema.field(&over.name) else {
                    continue;
                };
                let spec = FieldSpec {
                    ty: over.ty.clone(),
                    when: None,
                    ..base.clone()
                };
                let value = {
                    let scope = Scope {
                        record: Some(&record),
                        parent,
                        element: None,
                    };
                    self.generate_field(&schema.name, &spec, scope, state, uniq)?
                };
                if let Some(value) = value {
                    record.insert(spec.name.clone(), value);
                }
            }
        }

        Ok(record)
    }

    /// Generate one field. Returns `None` when a `when` guard suppresses
    /// the field entirely.
    pub fn generate_field(
        &self,
        schema_name: &str,
        field: &FieldSpec,
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
        uniq: &mut UniqueTracker,
    ) -> CompileResult<Option<Value>> {
        if let Some(guard) = &field.when {
            if !self.eval(guard, scope, state)?.as_bool()? {
                return Ok(None);
            }
        }

        // Nullable draws its 50/50 coin before the value draw.
        if field.nullable && state.prng.uniform_float() < 0.5 {
            return Ok(Some(Value::Null));
        }

        let seq_key = format!("{schema_name}.{}", field.name);

        // Derived fields may reference later fields; they evaluate inline
        // when they can, and fall back to Null until the final derived pass
        // fills them in.
        if field.ty.is_derived() {
            let value = self
                .generate_type_keyed(&field.ty, &seq_key, scope, state)
                .unwrap_or(Value::Null);
            return Ok(Some(value));
        }

        if !field.unique {
            return Ok(Some(self.generate_type_keyed(&field.ty, &seq_key, scope, state)?));
        }

        // Unique: retry until unseen, up to the record retry budget.
        let retries = self.config.limits.record_retries.max(1);
        let mut candidate = Value::Null;
        for _ in 0..retries {
            candidate = self.generate_type_keyed(&field.ty, &seq_key, scope, state)?;
            if !uniq.seen(&field.name, &candidate) {
                uniq.insert(&field.name, candidate.clone());
                return Ok(Some(candidate));
            }
        }
        if !uniq.already_warned(&field.name) {
            state.warnings.add(
                Warning::new(
                    WarningKind::UniqueValueExhaustion,
                    format!(
                        "unique field '{}' of schema '{schema_name}' ran out of distinct values after {retries} retries",
                        field.name
                    ),
                )
                .with_schema(schema_name)
                .with_field(field.name.clone()),
            );
        }
        uniq.insert(&field.name, candidate.clone());
        Ok(Some(candidate))
    }

    /// Generate a value from a type expression, using the enclosing field's
    /// `schema.field` key for ordered-sequence cursors.
    pub fn generate_type_keyed(
        &self,
        ty: &TypeExpr,
        seq_key: &str,
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        match ty {
            TypeExpr::Literal(lit) => Ok(literal_value(lit)),
            TypeExpr::Primitive {
                primitive,
                precision,
            } => self.generate_primitive(*primitive, *precision, state),
            TypeExpr::Range {
                primitive,
                precision,
                lo,
                hi,
            } => self.generate_range(*primitive, *precision, lo, hi, scope, state),
            TypeExpr::Named(name) => {
                if let Some(schema) = self.schemas.get(name) {
                    let schema = schema.clone();
                    let mut nested_uniq = UniqueTracker::new();
                    let record = self.generate_record_constrained(
                        &schema,
                        scope.record,
                        &[],
                        false,
                        state,
                        &mut nested_uniq,
                    )?;
                    return Ok(Value::Record(record));
                }
                if let Some(let_ty) = self.lets.get(name) {
                    return self.generate_type_keyed(let_ty, seq_key, scope, state);
                }
                // An earlier field of the same record.
                self.eval(&Expr::Ident(name.clone()), scope, state)
            }
            TypeExpr::CollectionOf {
                cardinality,
                schema,
                overrides,
            } => {
                let count = self.eval_cardinality(cardinality, scope, state)?;
                let Some(sub) = self.schemas.get(schema) else {
                    return Err(VagueError::runtime(format!("unknown schema '{schema}'")));
                };
                let sub = sub.clone();
                let mut records = Vec::with_capacity(count);
                let mut nested_uniq = UniqueTracker::new();
                for _ in 0..count {
                    let record = self.generate_record_constrained(
                        &sub,
                        scope.record,
                        overrides,
                        false,
                        state,
                        &mut nested_uniq,
                    )?;
                    records.push(Value::Record(record));
                }
                Ok(Value::List(records))
            }
            TypeExpr::Superposition(variants) => {
                let weights: Vec<Option<f64>> = variants.iter().map(|v| v.weight).collect();
                let idx = state.prng.weighted_index(&weights);
                self.generate_type_keyed(&variants[idx].ty, seq_key, scope, state)
            }
            TypeExpr::OrderedSequence(items) => {
                if items.is_empty() {
                    return Ok(Value::Null);
                }
                let position = state.seq.cursor_next(seq_key, items.len());
                self.eval(&items[position], scope, state)
            }
            TypeExpr::Expr(expr) => self.eval(expr, scope, state),
        }
    }

    /// Entry point used by expression evaluation when an identifier
    /// resolves to a let binding.
    pub fn generate_type(
        &self,
        ty: &TypeExpr,
        seq_key: &str,
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        self.generate_type_keyed(ty, seq_key, scope, state)
    }

    fn generate_primitive(
        &self,
        primitive: Primitive,
        precision: Option<u32>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        match primitive {
            Primitive::Int => Ok(Value::Int(state.prng.range_int(0, 100))),
            Primitive::Decimal => {
                let raw = state.prng.range_float(0.0, 1.0);
                Ok(Value::Decimal(round_to(raw, precision.unwrap_or(2))))
            }
            Primitive::Boolean => Ok(Value::Bool(state.prng.uniform_float() < 0.5)),
            Primitive::String => {
                // A pronounceable lowercase token of 4-12 letters.
                let len = state.prng.range_int(4, 12) as usize;
                let mut s = String::with_capacity(len);
                for _ in 0..len {
                    let c = b'a' + state.prng.range_int(0, 25) as u8;
                    s.push(c as char);
                }
                Ok(Value::String(s))
            }
            Primitive::Date => {
                let lo = NaiveDate::from_ymd_opt(2000, 1, 1)
                    .ok_or_else(|| VagueError::runtime("invalid default date range"))?;
                let hi = NaiveDate::from_ymd_opt(2030, 12, 31)
                    .ok_or_else(|| VagueError::runtime("invalid default date range"))?;
                self.random_date_between(lo, hi, state)
            }
        }
    }

    fn generate_range(
        &self,
        primitive: Primitive,
        precision: Option<u32>,
        lo: &Expr,
        hi: &Expr,
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        let lo_value = self.eval(lo, scope, state)?;
        let hi_value = self.eval(hi, scope, state)?;
        match primitive {
            Primitive::Int => {
                let (lo, hi) = int_bounds(&lo_value, &hi_value)?;
                Ok(Value::Int(state.prng.range_int(lo, hi)))
            }
            Primitive::Decimal => {
                let (lo, hi) = num_bounds(&lo_value, &hi_value)?;
                let raw = state.prng.range_float(lo, hi);
                Ok(Value::Decimal(round_to(raw, precision.unwrap_or(2))))
            }
            Primitive::Date => {
                let (lo, hi) = date_bounds(&lo_value, &hi_value)?;
                self.random_date_between(lo, hi, state)
            }
            other => Err(VagueError::runtime(format!(
                "'{other}' does not support ranges"
            ))),
        }
    }

    fn random_date_between(
        &self,
        lo: NaiveDate,
        hi: NaiveDate,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        use chrono::Datelike;
        let lo_days = i64::from(lo.num_days_from_ce());
        let hi_days = i64::from(hi.num_days_from_ce());
        let picked = state.prng.range_int(lo_days, hi_days);
        NaiveDate::from_num_days_from_ce_opt(picked as i32)
            .map(Value::Date)
            .ok_or_else(|| VagueError::runtime("generated date out of range"))
    }

    /// Evaluate a collection cardinality to a concrete length.
    pub fn eval_cardinality(
        &self,
        cardinality: &Cardinality,
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<usize> {
        match cardinality {
            Cardinality::Exact(expr) => {
                let value = self.eval(expr, scope, state)?;
                cardinality_int(&value)
            }
            Cardinality::Range(lo, hi) => {
                let lo_value = self.eval(lo, scope, state)?;
                let hi_value = self.eval(hi, scope, state)?;
                let lo = cardinality_int(&lo_value)?;
                let hi = cardinality_int(&hi_value)?;
                if hi < lo {
                    return Err(VagueError::runtime(format!(
                        "invalid cardinality range {lo}..{hi}"
                    )));
                }
                Ok(state.prng.range_int(lo as i64, hi as i64) as usize)
            }
        }
    }
}

/// Apply a collection-level override to a base field spec. Overrides swap
/// the type expression but keep modifiers and generation order.
fn effective_spec(field: &FieldSpec, overrides: &[FieldOverride]) -> FieldSpec {
    match overrides.iter().find(|o| o.name == field.name) {
        Some(over) => FieldSpec {
            ty: over.ty.clone(),
            ..field.clone()
        },
        None => field.clone(),
    }
}

fn round_to(x: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (x * factor).round() / factor
}

fn int_bounds(lo: &Value, hi: &Value) -> CompileResult<(i64, i64)> {
    match (lo.as_int(), hi.as_int()) {
        (Some(lo), Some(hi)) if lo <= hi => Ok((lo, hi)),
        (Some(lo), Some(hi)) => Err(VagueError::runtime(format!(
            "invalid range {lo}..{hi}: lower bound is greater than upper bound"
        ))),
        _ => Err(VagueError::runtime(format!(
            "int range bounds must be integers, found {} and {}",
            lo.type_name(),
            hi.type_name()
        ))),
    }
}

fn num_bounds(lo: &Value, hi: &Value) -> CompileResult<(f64, f64)> {
    match (lo.as_number(), hi.as_number()) {
        (Some(lo), Some(hi)) if lo <= hi => Ok((lo, hi)),
        (Some(lo), Some(hi)) => Err(VagueError::runtime(format!(
            "invalid range {lo}..{hi}: lower bound is greater than upper bound"
        ))),
        _ => Err(VagueError::runtime(format!(
            "decimal range bounds must be numbers, found {} and {}",
            lo.type_name(),
            hi.type_name()
        ))),
    }
}

/// Date range bounds accept years (`2020..2024`), ISO strings, or dates.
fn date_bounds(lo: &Value, hi: &Value) -> CompileResult<(NaiveDate, NaiveDate)> {
    let parse = |value: &Value, edge: Edge| -> CompileResult<NaiveDate> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::Int(year) => {
                let (month, day) = match edge {
                    Edge::Lo => (1, 1),
                    Edge::Hi => (12, 31),
                };
                NaiveDate::from_ymd_opt(*year as i32, month, day)
                    .ok_or_else(|| VagueError::runtime(format!("invalid year {year}")))
            }
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                VagueError::runtime(format!("'{s}' is not an ISO date (YYYY-MM-DD)"))
            }),
            other => Err(VagueError::runtime(format!(
                "date range bounds must be years or ISO dates, found {}",
                other.type_name()
            ))),
        }
    };
    let lo = parse(lo, Edge::Lo)?;
    let hi = parse(hi, Edge::Hi)?;
    if hi < lo {
        return Err(VagueError::runtime(format!(
            "invalid date range: {lo} is after {hi}"
        )));
    }
    Ok((lo, hi))
}

enum Edge {
    Lo,
    Hi,
}

fn cardinality_int(value: &Value) -> CompileResult<usize> {
    match value.as_int() {
        Some(n) if n >= 0 => Ok(n as usize),
        Some(n) => Err(VagueError::runtime(format!(
            "collection cardinality must be non-negative, found {n}"
        ))),
        None => Err(VagueError::runtime(format!(
            "collection cardinality must be an integer, found {}",
            value.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileConfig;
    use crate::eval::{Arena, SequenceState};
    use crate::parser;
    use crate::plugin::PluginRegistry;
    use crate::rng::Prng;
    use crate::warnings::WarningCollector;
    use indexmap::IndexMap;

    struct Fixture {
        schemas: IndexMap<String, SchemaDef>,
        lets: IndexMap<String, TypeExpr>,
        plugins: PluginRegistry,
        config: CompileConfig,
    }

    impl Fixture {
        fn from_source(source: &str) -> Self {
            let program = parser::parse(source).expect("parse");
            let schemas = program
                .schemas()
                .map(|s| (s.name.clone(), s.clone()))
                .collect();
            let lets = program
                .lets()
                .map(|l| (l.name.clone(), l.ty.clone()))
                .collect();
            Fixture {
                schemas,
                lets,
                plugins: PluginRegistry::new(),
                config: CompileConfig::default(),
            }
        }

        fn generate(&self, schema: &str, seed: u64, n: usize) -> (Vec<Record>, WarningCollector) {
            let evaluator = Evaluator {
                schemas: &self.schemas,
                lets: &self.lets,
                plugins: &self.plugins,
                config: &self.config,
            };
            let arena = Arena::new();
            let mut prng = Prng::seeded(seed);
            let mut warnings = WarningCollector::new();
            let mut seq = SequenceState::new();
            let mut uniq = UniqueTracker::new();
            let schema = self.schemas.get(schema).expect("schema").clone();
            let mut records = Vec::new();
            for _ in 0..n {
                let record = {
                    let mut state = EvalState {
                        prng: &mut prng,
                        warnings: &mut warnings,
                        arena: &arena,
                        seq: &mut seq,
                    };
                    evaluator
                        .generate_record(&schema, None, &[], &mut state, &mut uniq)
                        .expect("generate")
                };
                seq.advance(record.clone());
                records.push(record);
            }
            (records, warnings)
        }
    }

    #[test]
    fn int_range_is_inclusive() {
        let fx = Fixture::from_source("schema X { id: int in 1..3 }");
        let (records, _) = fx.generate("X", 7, 200);
        for record in &records {
            let Value::Int(v) = record["id"] else {
                panic!("expected int");
            };
            assert!((1..=3).contains(&v));
        }
    }

    #[test]
    fn decimal_precision_rounding() {
        let fx = Fixture::from_source("schema X { amount: decimal(2) in 10.0..99.0 }");
        let (records, _) = fx.generate("X", 3, 100);
        for record in &records {
            let Value::Decimal(v) = record["amount"] else {
                panic!("expected decimal");
            };
            assert!((10.0..=99.0).contains(&v));
            assert_eq!(v, round_to(v, 2));
        }
    }

    #[test]
    fn unique_exhaustion_warns_and_still_generates() {
        let fx = Fixture::from_source("schema X { id: unique int in 1..3 }");
        let (records, warnings) = fx.generate("X", 42, 10);
        assert_eq!(records.len(), 10);
        let warned = warnings.get_by_kind(WarningKind::UniqueValueExhaustion);
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].schema.as_deref(), Some("X"));
        assert_eq!(warned[0].field.as_deref(), Some("id"));
    }

    #[test]
    fn unique_within_space_is_distinct() {
        let fx = Fixture::from_source(
            r#"
            let colors = "red" | "green" | "blue"
            schema I { c: unique colors }
            "#,
        );
        let (records, warnings) = fx.generate("I", 11, 3);
        let mut seen: Vec<&str> = records
            .iter()
            .map(|r| r["c"].as_str().expect("string"))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec!["blue", "green", "red"]);
        assert!(!warnings.has_any());
    }

    #[test]
    fn when_guard_controls_presence() {
        let fx = Fixture::from_source(
            r#"schema C { type: "p" | "b", companyId: string when type == "b" }"#,
        );
        let (records, _) = fx.generate("C", 5, 100);
        for record in &records {
            let is_business = record["type"].as_str() == Some("b");
            assert_eq!(record.contains_key("companyId"), is_business);
        }
    }

    #[test]
    fn nullable_field_mixes_nulls() {
        let fx = Fixture::from_source("schema X { n: int in 1..100? }");
        let (records, _) = fx.generate("X", 9, 200);
        let nulls = records.iter().filter(|r| r["n"].is_null()).count();
        assert!((60..140).contains(&nulls), "nulls = {nulls}");
    }

    #[test]
    fn superposition_weights_respected() {
        let fx =
            Fixture::from_source(r#"schema I { status: 0.9:"paid" | 0.1:"draft" }"#);
        let (records, _) = fx.generate("I", 1, 1000);
        let paid = records
            .iter()
            .filter(|r| r["status"].as_str() == Some("paid"))
            .count();
        let freq = paid as f64 / 1000.0;
        assert!((0.85..0.95).contains(&freq), "freq = {freq}");
    }

    #[test]
    fn ordered_sequence_cycles() {
        let fx = Fixture::from_source(r#"schema X { tier: ["a", "b", "c"] }"#);
        let (records, _) = fx.generate("X", 2, 7);
        let tiers: Vec<&str> = records
            .iter()
            .map(|r| r["tier"].as_str().expect("string"))
            .collect();
        assert_eq!(tiers, vec!["a", "b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn nested_collection_with_parent_access() {
        let fx = Fixture::from_source(
            r#"
            schema LI { amount: int in 10..100, cur: ^currency }
            schema Inv { currency: "USD" | "EUR", items: 3..5 of LI, total: sum(items.amount) }
            "#,
        );
        let (records, _) = fx.generate("Inv", 21, 10);
        for record in &records {
            let Value::List(items) = &record["items"] else {
                panic!("expected a list");
            };
            assert!((3..=5).contains(&items.len()));
            let mut expected = 0i64;
            for item in items {
                let Value::Record(fields) = item else {
                    panic!("expected records");
                };
                assert_eq!(fields["cur"], record["currency"]);
                expected += fields["amount"].as_int().expect("int");
            }
            assert_eq!(record["total"].as_int(), Some(expected));
        }
    }

    #[test]
    fn derived_expression_field() {
        let fx = Fixture::from_source(
            r#"schema P { age: int in 0..100, bracket: age < 18 ? "minor" : "adult" }"#,
        );
        let (records, _) = fx.generate("P", 4, 50);
        for record in &records {
            let age = record["age"].as_int().expect("int");
            let expected = if age < 18 { "minor" } else { "adult" };
            assert_eq!(record["bracket"].as_str(), Some(expected));
        }
    }

    #[test]
    fn refine_rewrites_matching_records() {
        let fx = Fixture::from_source(
            r#"
            schema O { total: int in 1..100 }
            refine {
                if total > 50 { total: 0 }
            }
            "#,
        );
        let (records, _) = fx.generate("O", 6, 100);
        for record in &records {
            let total = record["total"].as_int().expect("int");
            assert!(total <= 50, "refine should cap totals, got {total}");
        }
    }

    #[test]
    fn sequence_helper_numbers_records() {
        let fx = Fixture::from_source(r#"schema X { num: sequence("INV-", 1000) }"#);
        let (records, _) = fx.generate("X", 8, 3);
        let nums: Vec<&str> = records
            .iter()
            .map(|r| r["num"].as_str().expect("string"))
            .collect();
        assert_eq!(nums, vec!["INV-1000", "INV-1001", "INV-1002"]);
    }

    #[test]
    fn previous_helper_reads_last_record() {
        let fx = Fixture::from_source(
            r#"schema X { id: sequence_int("id", 1), prev: previous(id) }"#,
        );
        let (records, _) = fx.generate("X", 8, 3);
        assert_eq!(records[0]["prev"], Value::Null);
        assert_eq!(records[1]["prev"], records[0]["id"]);
        assert_eq!(records[2]["prev"], records[1]["id"]);
    }

    #[test]
    fn fixed_seed_reproduces_records() {
        let fx = Fixture::from_source(
            r#"schema X { id: int in 1..1000, s: string, f: decimal(3) in 0.0..1.0 }"#,
        );
        let (a, _) = fx.generate("X", 123, 20);
        let (b, _) = fx.generate("X", 123, 20);
        assert_eq!(a, b);
        let (c, _) = fx.generate("X", 124, 20);
        assert_ne!(a, c);
    }
}
