//! # Vague AST - Abstract Syntax Tree Types
//!
//! One variant per language construct. The parser produces these; the binder
//! checks them; the dataset driver and evaluator walk them. The AST is
//! immutable once parsing completes.

use crate::error::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod builders;

// ============================================================================
// Program & Top-Level Items
// ============================================================================

/// A parsed Vague program: an ordered list of top-level items.
///
/// Ordering is irrelevant for name resolution but defines the deterministic
/// generation order of datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate schema definitions in declaration order.
    pub fn schemas(&self) -> impl Iterator<Item = &SchemaDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Schema(def) => Some(def),
            _ => None,
        })
    }

    /// Iterate dataset definitions in declaration order.
    pub fn datasets(&self) -> impl Iterator<Item = &DatasetDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Dataset(def) => Some(def),
            _ => None,
        })
    }

    /// Iterate let bindings in declaration order.
    pub fn lets(&self) -> impl Iterator<Item = &LetBinding> {
        self.items.iter().filter_map(|item| match item {
            Item::Let(def) => Some(def),
            _ => None,
        })
    }

    /// Iterate import directives in declaration order.
    pub fn imports(&self) -> impl Iterator<Item = &ImportDirective> {
        self.items.iter().filter_map(|item| match item {
            Item::Import(def) => Some(def),
            _ => None,
        })
    }
}

/// Top-level item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Let(LetBinding),
    Schema(SchemaDef),
    Dataset(DatasetDef),
    Import(ImportDirective),
}

/// `let name = <type expression>` - a reusable alias, typically for a
/// superposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetBinding {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// `import alias from "path"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDirective {
    pub alias: String,
    pub path: String,
    pub span: Span,
}

// ============================================================================
// Schemas
// ============================================================================

/// `schema Name (from imported.Type)? { fields..., assumes... } refine? then?`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    pub name: String,
    /// Inherited base shape, e.g. `from common.BaseUser`
    pub base: Option<DottedName>,
    /// Generation order equals declaration order.
    pub fields: Vec<FieldSpec>,
    pub assumes: Vec<AssumeItem>,
    pub refine: Vec<RefineClause>,
    pub then: Vec<ThenStatement>,
    pub span: Span,
}

impl SchemaDef {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Dotted path such as `common.BaseUser` or `faker.person.firstName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DottedName {
    pub parts: Vec<String>,
}

impl DottedName {
    pub fn new(parts: Vec<String>) -> Self {
        DottedName { parts }
    }

    pub fn single(name: impl Into<String>) -> Self {
        DottedName {
            parts: vec![name.into()],
        }
    }

    pub fn is_single(&self) -> bool {
        self.parts.len() == 1
    }

    pub fn head(&self) -> &str {
        &self.parts[0]
    }
}

impl fmt::Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// One field declaration inside a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeExpr,
    pub unique: bool,
    pub private: bool,
    pub nullable: bool,
    /// `when <cond>` guard; the field is absent when the guard is false.
    pub when: Option<Expr>,
    pub span: Span,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        FieldSpec {
            name: name.into(),
            ty,
            unique: false,
            private: false,
            nullable: false,
            when: None,
            span: Span::default(),
        }
    }
}

/// A per-record constraint: flat predicate or guarded block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssumeItem {
    /// `assume <pred>`
    Flat(Expr),
    /// `assume if <cond> { p1, p2, ... }` - vacuously true when the guard
    /// does not hold.
    Guarded { cond: Expr, predicates: Vec<Expr> },
}

/// One `if <cond> { overrides }` clause of a refine block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefineClause {
    pub cond: Expr,
    pub overrides: Vec<FieldOverride>,
}

/// `name: <type expression>` replacing the base spec of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOverride {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// One statement of a `then` mutation hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThenStatement {
    pub target: String,
    pub op: AssignOp,
    pub expr: Expr,
}

/// Assignment operator in `then` hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=` (additive across multiple references)
    Add,
}

// ============================================================================
// Datasets
// ============================================================================

/// `dataset Name violating? { collections..., validate { ... }? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDef {
    pub name: String,
    /// Inverts constraint acceptance: records/datasets must *fail*.
    pub violating: bool,
    pub collections: Vec<DatasetCollection>,
    pub validate: Vec<Expr>,
    pub span: Span,
}

/// `cname: <cardinality> of SchemaRef { overrides }?`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetCollection {
    pub name: String,
    pub cardinality: Cardinality,
    pub schema: String,
    pub overrides: Vec<FieldOverride>,
    pub span: Span,
}

/// Collection length: exact or a range, both possibly dynamic expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cardinality {
    Exact(Expr),
    Range(Expr, Expr),
}

// ============================================================================
// Type Expressions
// ============================================================================

/// Primitive field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Primitive {
    Int,
    Decimal,
    String,
    Boolean,
    Date,
}

impl Primitive {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Primitive::Int),
            "decimal" => Some(Primitive::Decimal),
            "string" => Some(Primitive::String),
            "boolean" | "bool" => Some(Primitive::Boolean),
            "date" => Some(Primitive::Date),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Decimal => "decimal",
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Date => "date",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The right-hand side of a field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// `int`, `decimal`, `decimal(2)`, `string`, `boolean`, `date`
    Primitive {
        primitive: Primitive,
        precision: Option<u32>,
    },
    /// `int in a..b`, `decimal(2) in a..b`, `date in 2020..2024`
    Range {
        primitive: Primitive,
        precision: Option<u32>,
        lo: Expr,
        hi: Expr,
    },
    /// A literal value: `42`, `"paid"`, `true`, `null`
    Literal(Literal),
    /// A bare name: schema reference, let binding, or earlier field -
    /// resolved at bind time in that order.
    Named(String),
    /// `N of S` / `a..b of S`, with optional field overrides
    CollectionOf {
        cardinality: Cardinality,
        schema: String,
        overrides: Vec<FieldOverride>,
    },
    /// `A | B | 0.3:C` - weighted or uniform union of alternatives
    Superposition(Vec<Variant>),
    /// `[v1, v2, v3]` - cycled per record, one step per generated record
    OrderedSequence(Vec<Expr>),
    /// Anything else: generator calls, `any of`, `^field`, arithmetic,
    /// ternaries over other fields...
    Expr(Expr),
}

impl TypeExpr {
    /// Whether this spec is a pure expression over other fields of the same
    /// record (a derived field, recomputed in the final pass).
    pub fn is_derived(&self) -> bool {
        matches!(self, TypeExpr::Expr(expr) if !expr.draws_randomness())
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive {
                primitive,
                precision,
            } => match precision {
                Some(p) => write!(f, "{primitive}({p})"),
                None => write!(f, "{primitive}"),
            },
            TypeExpr::Range {
                primitive,
                precision,
                lo,
                hi,
            } => {
                match precision {
                    Some(p) => write!(f, "{primitive}({p})")?,
                    None => write!(f, "{primitive}")?,
                }
                write!(f, " in {lo}..{hi}")
            }
            TypeExpr::Literal(lit) => write!(f, "{lit}"),
            TypeExpr::Named(name) => write!(f, "{name}"),
            TypeExpr::CollectionOf {
                cardinality,
                schema,
                ..
            } => match cardinality {
                Cardinality::Exact(n) => write!(f, "{n} of {schema}"),
                Cardinality::Range(lo, hi) => write!(f, "{lo}..{hi} of {schema}"),
            },
            TypeExpr::Superposition(variants) => {
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    if let Some(w) = v.weight {
                        write!(f, "{w}:")?;
                    }
                    write!(f, "{}", v.ty)?;
                }
                Ok(())
            }
            TypeExpr::OrderedSequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            TypeExpr::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

/// One arm of a superposition, optionally weighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub weight: Option<f64>,
    pub ty: TypeExpr,
}

/// Literal constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Decimal(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Decimal(v) => write!(f, "{v}"),
            Literal::Str(s) => write!(f, "\"{s}\""),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Null => write!(f, "null"),
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Expression nodes, evaluated inside a record-under-construction scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// Field of the current record, let binding, or collection name
    Ident(String),
    /// `.field` - the current element inside all/some/none predicates and
    /// `any of ... where` filters
    ElementField(String),
    /// `^field` - field of the lexically enclosing parent record
    ParentField(String),
    /// `object.field` - member access (projects over lists)
    Member { object: Box<Expr>, field: String },
    /// `name(args)` / `ns.name(args)` - builtin or plugin generator call
    Call { name: DottedName, args: Vec<Expr> },
    /// `any of collection where <filter>?`
    AnyOf {
        collection: String,
        filter: Option<Box<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `cond ? a : b`
    Ternary {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

impl Expr {
    /// True when evaluating this expression consumes PRNG state (generator
    /// calls, `any of` picks). Pure expressions over record fields are safe
    /// to recompute in the derived pass.
    pub fn draws_randomness(&self) -> bool {
        match self {
            Expr::Call { name, .. } => !is_pure_builtin(&name.parts.join(".")),
            Expr::AnyOf { .. } => true,
            Expr::Literal(_) | Expr::Ident(_) | Expr::ElementField(_) | Expr::ParentField(_) => {
                false
            }
            Expr::Member { object, .. } => object.draws_randomness(),
            Expr::Unary { operand, .. } => operand.draws_randomness(),
            Expr::Binary { left, right, .. } => {
                left.draws_randomness() || right.draws_randomness()
            }
            Expr::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.draws_randomness()
                    || then_branch.draws_randomness()
                    || else_branch.draws_randomness()
            }
        }
    }
}

/// Builtins that are pure functions of their arguments (no PRNG, no
/// per-collection state). Only these may appear in derived fields.
fn is_pure_builtin(name: &str) -> bool {
    matches!(
        name,
        "sum"
            | "avg"
            | "min"
            | "max"
            | "median"
            | "product"
            | "count"
            | "first"
            | "last"
            | "all"
            | "some"
            | "none"
            | "round"
            | "floor"
            | "ceil"
            | "upper"
            | "lower"
            | "capitalize"
            | "kebab"
            | "snake"
            | "camel"
            | "trim"
            | "concat"
            | "substring"
            | "replace"
            | "length"
    )
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::ElementField(name) => write!(f, ".{name}"),
            Expr::ParentField(name) => write!(f, "^{name}"),
            Expr::Member { object, field } => write!(f, "{object}.{field}"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::AnyOf { collection, filter } => {
                write!(f, "any of {collection}")?;
                if let Some(filter) = filter {
                    write!(f, " where {filter}")?;
                }
                Ok(())
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Pos => write!(f, "+{operand}"),
                UnaryOp::Not => write!(f, "not {operand}"),
            },
            Expr::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            Expr::Ternary {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "{cond} ? {then_branch} : {else_branch}"),
        }
    }
}
