//! # Expression Evaluation
//!
//! Evaluates expressions inside a record-under-construction scope. Lookup
//! walks a fixed chain: current record fields, the lexical parent record
//! (`^`), dataset collections in the arena, let bindings, and finally the
//! plugin registry for namespaced calls.
//!
//! The same [`Evaluator`] also carries the field generator
//! (`crate::generator`), the constraint engine (`crate::constraints`) and
//! the dataset driver (`crate::dataset`), which are separate impl blocks on
//! this type so every stage shares one set of resolved references.

pub mod functions;

use crate::ast::{Expr, Literal, SchemaDef, TypeExpr, UnaryOp};
use crate::config::CompileConfig;
use crate::error::{CompileResult, VagueError};
use crate::plugin::PluginRegistry;
use crate::rng::Prng;
use crate::value::{Record, RecordRef, Value};
use crate::warnings::WarningCollector;
use indexmap::IndexMap;
use std::collections::HashMap;

// ============================================================================
// Arena
// ============================================================================

/// Owns every generated collection of the dataset being built. `any of`
/// bindings address records as `(collection, index)` so `then` hooks can
/// mutate through the arena without cyclic ownership.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    collections: IndexMap<String, Vec<Record>>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, records: Vec<Record>) {
        self.collections.insert(name.into(), records);
    }

    pub fn get(&self, name: &str) -> Option<&Vec<Record>> {
        self.collections.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<Record>> {
        self.collections.get_mut(name)
    }

    pub fn record(&self, r: &RecordRef) -> Option<&Record> {
        self.collections.get(&r.collection)?.get(r.index)
    }

    pub fn record_mut(&mut self, r: &RecordRef) -> Option<&mut Record> {
        self.collections.get_mut(&r.collection)?.get_mut(r.index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Record>)> {
        self.collections.iter()
    }

    /// The collection as a list of arena references.
    pub fn as_ref_list(&self, name: &str) -> Option<Value> {
        let records = self.collections.get(name)?;
        Some(Value::List(
            (0..records.len())
                .map(|index| {
                    Value::Ref(RecordRef {
                        collection: name.to_string(),
                        index,
                    })
                })
                .collect(),
        ))
    }
}

// ============================================================================
// Per-collection sequential state
// ============================================================================

/// Counters backing the stateful helpers (`sequence`, `sequence_int`,
/// `previous`) and ordered-sequence cursors. One instance per collection,
/// reset when the next collection starts.
#[derive(Debug, Default)]
pub struct SequenceState {
    /// Index of the record currently being generated, 0-based.
    pub record_index: usize,
    /// The previously completed record of this collection.
    pub previous: Option<Record>,
    counters: HashMap<String, i64>,
    cursors: HashMap<String, usize>,
}

impl SequenceState {
    pub fn new() -> Self {
        SequenceState::default()
    }

    /// Advance to the next record, remembering the one just finished.
    pub fn advance(&mut self, finished: Record) {
        self.previous = Some(finished);
        self.record_index += 1;
    }

    /// Next value of the named integer counter, starting at `start`.
    pub fn counter_next(&mut self, key: &str, start: i64) -> i64 {
        let counter = self.counters.entry(key.to_string()).or_insert(start);
        let value = *counter;
        *counter += 1;
        value
    }

    /// Next cursor position for an ordered sequence keyed by
    /// `schema.field`, cycling over `len` entries.
    pub fn cursor_next(&mut self, key: &str, len: usize) -> usize {
        let cursor = self.cursors.entry(key.to_string()).or_insert(0);
        let position = *cursor % len.max(1);
        *cursor += 1;
        position
    }
}

// ============================================================================
// Scope & mutable evaluation state
// ============================================================================

/// Immutable view of the records an expression can see.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    /// The record under construction (or under inspection).
    pub record: Option<&'a Record>,
    /// The lexical parent record, for `^field`.
    pub parent: Option<&'a Record>,
    /// The current element inside `all`/`some`/`none` predicates and
    /// `any of ... where` filters.
    pub element: Option<&'a Value>,
}

impl<'a> Scope<'a> {
    pub fn empty() -> Self {
        Scope::default()
    }

    pub fn of_record(record: &'a Record) -> Self {
        Scope {
            record: Some(record),
            parent: None,
            element: None,
        }
    }

    pub fn with_parent(mut self, parent: &'a Record) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_element(mut self, element: &'a Value) -> Self {
        self.element = Some(element);
        self
    }
}

/// Mutable state threaded through evaluation: the PRNG, the warning
/// collector, the arena built so far, and the current collection's
/// sequential counters.
pub struct EvalState<'a> {
    pub prng: &'a mut Prng,
    pub warnings: &'a mut WarningCollector,
    pub arena: &'a Arena,
    pub seq: &'a mut SequenceState,
}

// ============================================================================
// Evaluator
// ============================================================================

/// Shared references for one compile: resolved schemas, let bindings, the
/// plugin registry and the configuration.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    pub schemas: &'a IndexMap<String, SchemaDef>,
    pub lets: &'a IndexMap<String, TypeExpr>,
    pub plugins: &'a PluginRegistry,
    pub config: &'a CompileConfig,
}

impl<'a> Evaluator<'a> {
    /// Evaluate an expression to a value.
    pub fn eval(&self, expr: &Expr, scope: Scope<'_>, state: &mut EvalState<'_>) -> CompileResult<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Ident(name) => self.resolve_ident(name, scope, state),
            Expr::ElementField(field) => {
                let Some(element) = scope.element else {
                    return Err(VagueError::runtime(format!(
                        "'.{field}' is only valid inside a collection predicate"
                    )));
                };
                self.field_of(element, field, state)
            }
            Expr::ParentField(field) => {
                let Some(parent) = scope.parent else {
                    return Err(VagueError::runtime(format!(
                        "'^{field}' is only valid inside an embedded record"
                    )));
                };
                Ok(parent.get(field).cloned().unwrap_or(Value::Null))
            }
            Expr::Member { object, field } => {
                let value = self.eval(object, scope, state)?;
                self.field_of(&value, field, state)
            }
            Expr::Call { name, args } => self.eval_call(name, args, scope, state),
            Expr::AnyOf { collection, filter } => {
                self.eval_any_of(collection, filter.as_deref(), scope, state)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, scope, state)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.as_bool()?)),
                    UnaryOp::Neg => match value {
                        Value::Int(v) => Ok(Value::Int(-v)),
                        Value::Decimal(v) => Ok(Value::Decimal(-v)),
                        other => Err(VagueError::runtime(format!(
                            "cannot negate {}",
                            other.type_name()
                        ))),
                    },
                    UnaryOp::Pos => match value {
                        v @ (Value::Int(_) | Value::Decimal(_)) => Ok(v),
                        other => Err(VagueError::runtime(format!(
                            "unary '+' expects a number, found {}",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, scope, state),
            Expr::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.eval(cond, scope, state)?.as_bool()?;
                if cond {
                    self.eval(then_branch, scope, state)
                } else {
                    self.eval(else_branch, scope, state)
                }
            }
        }
    }

    fn eval_binary(
        &self,
        op: crate::ast::BinaryOp,
        left: &Expr,
        right: &Expr,
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        use crate::ast::BinaryOp;
        // Short-circuit logic first.
        match op {
            BinaryOp::And => {
                let lhs = self.eval(left, scope, state)?.as_bool()?;
                if !lhs {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval(right, scope, state)?.as_bool()?));
            }
            BinaryOp::Or => {
                let lhs = self.eval(left, scope, state)?.as_bool()?;
                if lhs {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval(right, scope, state)?.as_bool()?));
            }
            _ => {}
        }

        let lhs = self.eval(left, scope, state)?;
        let rhs = self.eval(right, scope, state)?;
        // Comparisons look through arena references.
        let lhs = self.deref(lhs, state);
        let rhs = self.deref(rhs, state);

        match op {
            BinaryOp::Add => lhs.add(&rhs),
            BinaryOp::Sub => lhs.sub(&rhs),
            BinaryOp::Mul => lhs.mul(&rhs),
            BinaryOp::Div => lhs.div(&rhs),
            BinaryOp::Eq => Ok(Value::Bool(lhs.equals(&rhs))),
            BinaryOp::NotEq => Ok(Value::Bool(!lhs.equals(&rhs))),
            BinaryOp::Lt => Ok(Value::Bool(lhs.try_cmp(&rhs)? == std::cmp::Ordering::Less)),
            BinaryOp::Le => Ok(Value::Bool(lhs.try_cmp(&rhs)? != std::cmp::Ordering::Greater)),
            BinaryOp::Gt => Ok(Value::Bool(lhs.try_cmp(&rhs)? == std::cmp::Ordering::Greater)),
            BinaryOp::Ge => Ok(Value::Bool(lhs.try_cmp(&rhs)? != std::cmp::Ordering::Less)),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    /// Resolve a bare identifier: current record field, then dataset
    /// collection, then let binding.
    fn resolve_ident(
        &self,
        name: &str,
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        if let Some(record) = scope.record {
            if let Some(value) = record.get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(list) = state.arena.as_ref_list(name) {
            return Ok(list);
        }
        if let Some(ty) = self.lets.get(name) {
            let ty = ty.clone();
            return self.generate_type(&ty, name, scope, state);
        }
        Err(VagueError::runtime(format!("unknown name '{name}'")))
    }

    /// Member access with list projection and arena dereferencing.
    fn field_of(
        &self,
        value: &Value,
        field: &str,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        match value {
            Value::Record(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
            Value::Ref(r) => match state.arena.record(r) {
                Some(record) => Ok(record.get(field).cloned().unwrap_or(Value::Null)),
                None => Err(VagueError::runtime(format!(
                    "dangling reference to {}[{}]",
                    r.collection, r.index
                ))),
            },
            Value::List(items) => {
                let mut projected = Vec::with_capacity(items.len());
                for item in items {
                    projected.push(self.field_of(item, field, state)?);
                }
                Ok(Value::List(projected))
            }
            Value::Null => Ok(Value::Null),
            other => Err(VagueError::runtime(format!(
                "cannot access field '{field}' on {}",
                other.type_name()
            ))),
        }
    }

    /// Replace an arena reference by a clone of the record it points to.
    /// Used before comparisons so `==` on picked records compares content.
    fn deref(&self, value: Value, state: &EvalState<'_>) -> Value {
        match value {
            Value::Ref(ref r) => match state.arena.record(r) {
                Some(record) => Value::Record(record.clone()),
                None => value,
            },
            other => other,
        }
    }

    fn eval_any_of(
        &self,
        collection: &str,
        filter: Option<&Expr>,
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        let len = state
            .arena
            .get(collection)
            .ok_or_else(|| {
                VagueError::runtime(format!(
                    "'any of {collection}': collection has not been generated yet"
                ))
            })?
            .len();

        let mut candidates = Vec::new();
        for index in 0..len {
            let r = RecordRef {
                collection: collection.to_string(),
                index,
            };
            match filter {
                None => candidates.push(r),
                Some(filter) => {
                    let element = Value::Ref(r.clone());
                    let element_scope = scope.with_element(&element);
                    if self.eval(filter, element_scope, state)?.as_bool()? {
                        candidates.push(r);
                    }
                }
            }
        }

        if candidates.is_empty() {
            return Ok(Value::Null);
        }
        let idx = state.prng.range_int(0, candidates.len() as i64 - 1) as usize;
        Ok(Value::Ref(candidates[idx].clone()))
    }

    fn eval_call(
        &self,
        name: &crate::ast::DottedName,
        args: &[Expr],
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        let full_name = name.to_string();

        // Special forms that receive unevaluated arguments.
        if name.is_single() {
            match name.head() {
                "all" | "some" | "none" => {
                    return self.eval_quantifier(name.head(), args, scope, state);
                }
                "previous" => {
                    let field = match args.first() {
                        Some(Expr::Ident(field)) => field.clone(),
                        Some(Expr::Literal(Literal::Str(field))) => field.clone(),
                        _ => {
                            return Err(VagueError::runtime(
                                "previous() expects a field name",
                            ));
                        }
                    };
                    return Ok(state
                        .seq
                        .previous
                        .as_ref()
                        .and_then(|record| record.get(&field))
                        .cloned()
                        .unwrap_or(Value::Null));
                }
                _ => {}
            }
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval(arg, scope, state)?;
            values.push(self.deref_shallow(value, state));
        }

        if name.is_single() && functions::is_builtin(name.head()) {
            return functions::call_builtin(
                name.head(),
                &values,
                self.config.generation.reference_date,
                state,
            );
        }

        // Anything else goes through the plugin registry.
        match self.plugins.get(&full_name) {
            Some(generator) => {
                let mut ctx = crate::plugin::PluginContext {
                    prng: &mut *state.prng,
                    record: scope.record,
                };
                generator(&values, &mut ctx)
            }
            None => {
                state.warnings.add(
                    crate::warnings::Warning::new(
                        crate::warnings::WarningKind::PluginMissing,
                        format!("no registered plugin provides '{full_name}'"),
                    ),
                );
                Err(VagueError::runtime(format!(
                    "unknown generator '{full_name}'"
                )))
            }
        }
    }

    /// Dereference refs one level deep (lists of refs become lists of
    /// records) so builtins see plain values.
    fn deref_shallow(&self, value: Value, state: &EvalState<'_>) -> Value {
        match value {
            Value::Ref(_) => self.deref(value, state),
            Value::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.deref(item, state))
                    .collect(),
            ),
            other => other,
        }
    }

    fn eval_quantifier(
        &self,
        which: &str,
        args: &[Expr],
        scope: Scope<'_>,
        state: &mut EvalState<'_>,
    ) -> CompileResult<Value> {
        let [list_expr, predicate] = args else {
            return Err(VagueError::runtime(format!(
                "{which}() expects a list and a predicate"
            )));
        };
        let list = match self.eval(list_expr, scope, state)? {
            Value::List(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(VagueError::runtime(format!(
                    "{which}() expects a list, found {}",
                    other.type_name()
                )));
            }
        };

        let mut matches = 0usize;
        for element in &list {
            let element_scope = scope.with_element(element);
            if self.eval(predicate, element_scope, state)?.as_bool()? {
                matches += 1;
            }
        }

        let result = match which {
            "all" => matches == list.len(),
            "some" => matches > 0,
            "none" => matches == 0,
            _ => unreachable!("quantifier names are fixed"),
        };
        Ok(Value::Bool(result))
    }
}

/// Literal to value conversion.
pub fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(v) => Value::Int(*v),
        Literal::Decimal(v) => Value::Decimal(*v),
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use indexmap::IndexMap;

    fn eval_in_record(expr_src: &str, record: &Record) -> CompileResult<Value> {
        // Parse the expression by wrapping it in a throwaway schema field.
        let source = format!("schema T {{ probe: {expr_src} }}");
        let program = parser::parse(&source).expect("parse");
        let schema = program.schemas().next().expect("schema").clone();
        let TypeExpr::Expr(expr) = schema.fields[0].ty.clone() else {
            panic!("expected an expression type");
        };

        let schemas = IndexMap::new();
        let lets = IndexMap::new();
        let plugins = PluginRegistry::new();
        let config = CompileConfig::default();
        let evaluator = Evaluator {
            schemas: &schemas,
            lets: &lets,
            plugins: &plugins,
            config: &config,
        };
        let arena = Arena::new();
        let mut seq = SequenceState::new();
        let mut prng = Prng::seeded(1);
        let mut warnings = WarningCollector::new();
        let mut state = EvalState {
            prng: &mut prng,
            warnings: &mut warnings,
            arena: &arena,
            seq: &mut seq,
        };
        evaluator.eval(&expr, Scope::of_record(record), &mut state)
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn arithmetic_over_fields() {
        let rec = record(&[("a", Value::Int(2)), ("b", Value::Int(3))]);
        assert_eq!(eval_in_record("a + b * 2", &rec).expect("eval"), Value::Int(8));
    }

    #[test]
    fn ternary_over_fields() {
        let rec = record(&[("age", Value::Int(15))]);
        assert_eq!(
            eval_in_record(r#"age < 18 ? "minor" : "adult""#, &rec).expect("eval"),
            Value::string("minor")
        );
    }

    #[test]
    fn logic_short_circuits() {
        // `b` is a string, but `false and ...` never evaluates it.
        let rec = record(&[("x", Value::Bool(false)), ("b", Value::string("s"))]);
        assert_eq!(
            eval_in_record("x and b < 3", &rec).expect("eval"),
            Value::Bool(false)
        );
        assert!(eval_in_record("b < 3", &rec).is_err());
    }

    #[test]
    fn member_projection_over_list() {
        let items = Value::List(vec![
            Value::Record(record(&[("amount", Value::Int(10))])),
            Value::Record(record(&[("amount", Value::Int(20))])),
        ]);
        let rec = record(&[("items", items)]);
        assert_eq!(
            eval_in_record("sum(items.amount)", &rec).expect("eval"),
            Value::Int(30)
        );
    }

    #[test]
    fn quantifiers() {
        let items = Value::List(vec![
            Value::Record(record(&[("amount", Value::Int(10))])),
            Value::Record(record(&[("amount", Value::Int(20))])),
        ]);
        let rec = record(&[("items", items)]);
        assert_eq!(
            eval_in_record("all(items, .amount > 5)", &rec).expect("eval"),
            Value::Bool(true)
        );
        assert_eq!(
            eval_in_record("some(items, .amount > 15)", &rec).expect("eval"),
            Value::Bool(true)
        );
        assert_eq!(
            eval_in_record("none(items, .amount > 50)", &rec).expect("eval"),
            Value::Bool(true)
        );
    }

    #[test]
    fn null_equality_works() {
        let rec = record(&[("x", Value::Null)]);
        assert_eq!(
            eval_in_record("x == null", &rec).expect("eval"),
            Value::Bool(true)
        );
    }

    #[test]
    fn unknown_name_is_runtime_error() {
        let rec = record(&[]);
        let err = eval_in_record("mystery + 1", &rec).expect_err("should fail");
        assert!(err.to_string().contains("unknown name 'mystery'"));
    }

    #[test]
    fn unknown_generator_is_runtime_error() {
        let rec = record(&[]);
        let err = eval_in_record("faker.nope()", &rec).expect_err("should fail");
        assert!(err.to_string().contains("unknown generator"));
    }
}
