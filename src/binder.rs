//! # Name Binding
//!
//! Pre-evaluation pass over the parsed program. Resolves every name the
//! evaluator will rely on and rejects programs the driver could not run:
//!
//! - schema references in dataset collections and `N of S` fields
//! - `any of C` targets, which must be collections declared *earlier* in the
//!   same dataset
//! - `^field` parent access, only legal in schemas embedded via `N of S` and
//!   only for fields the embedding schema declares
//! - same-record field references, which must point backward unless the
//!   field is derived (a pure expression recomputed in the final pass)
//! - builtin call arities
//! - imported schema bases, loaded through the external [`SpecLoader`];
//!   local fields missing from the base produce
//!   `UnknownFieldInImportedSchema` warnings, never errors

use crate::ast::{
    AssumeItem, Cardinality, DatasetDef, Expr, FieldOverride, Item, Program, SchemaDef, TypeExpr,
};
use crate::error::{CompileResult, Span, VagueError};
use crate::eval::functions::builtin_arity;
use crate::import::SpecLoader;
use crate::warnings::{Warning, WarningCollector, WarningKind};
use indexmap::IndexMap;
use std::collections::HashSet;

/// A program with all names resolved, ready for the dataset driver.
#[derive(Debug, Clone)]
pub struct BoundProgram {
    /// Schemas by name, with imported bases merged in.
    pub schemas: IndexMap<String, SchemaDef>,
    /// Let bindings by name, in declaration order.
    pub lets: IndexMap<String, TypeExpr>,
    /// Datasets in declaration order.
    pub datasets: Vec<DatasetDef>,
}

/// Run the binding pass.
pub fn bind(
    program: &Program,
    loader: &dyn SpecLoader,
    warnings: &mut WarningCollector,
) -> CompileResult<BoundProgram> {
    let binder = Binder::new(program);
    binder.run(loader, warnings)
}

struct Binder<'a> {
    program: &'a Program,
    /// Every collection name declared by any dataset; used to accept
    /// aggregate references to already-generated collections.
    collection_names: HashSet<String>,
}

impl<'a> Binder<'a> {
    fn new(program: &'a Program) -> Self {
        let collection_names = program
            .datasets()
            .flat_map(|d| d.collections.iter().map(|c| c.name.clone()))
            .collect();
        Binder {
            program,
            collection_names,
        }
    }

    fn run(
        self,
        loader: &dyn SpecLoader,
        warnings: &mut WarningCollector,
    ) -> CompileResult<BoundProgram> {
        let mut lets = IndexMap::new();
        for binding in self.program.lets() {
            lets.insert(binding.name.clone(), binding.ty.clone());
        }

        let schemas = self.merge_schemas(loader, warnings)?;

        for schema in schemas.values() {
            self.check_schema(schema, &schemas, &lets)?;
        }

        let mut datasets = Vec::new();
        for dataset in self.program.datasets() {
            self.check_dataset(dataset, &schemas, &lets)?;
            datasets.push(dataset.clone());
        }

        Ok(BoundProgram {
            schemas,
            lets,
            datasets,
        })
    }

    /// Build the schema catalog, folding imported bases into local schemas.
    fn merge_schemas(
        &self,
        loader: &dyn SpecLoader,
        warnings: &mut WarningCollector,
    ) -> CompileResult<IndexMap<String, SchemaDef>> {
        let mut imports: IndexMap<String, String> = IndexMap::new();
        for directive in self.program.imports() {
            imports.insert(directive.alias.clone(), directive.path.clone());
        }

        let mut schemas = IndexMap::new();
        for item in &self.program.items {
            let Item::Schema(schema) = item else { continue };
            if schemas.contains_key(&schema.name) {
                return Err(VagueError::bind(
                    format!("schema '{}' is defined twice", schema.name),
                    schema.span,
                ));
            }
            let merged = match &schema.base {
                None => schema.clone(),
                Some(base) => {
                    let (alias, type_name) = split_base(base, schema.span)?;
                    let Some(path) = imports.get(alias) else {
                        return Err(VagueError::bind(
                            format!("unknown import alias '{alias}' in schema '{}'", schema.name),
                            schema.span,
                        ));
                    };
                    let module = loader.load(path).map_err(|err| {
                        VagueError::bind(
                            format!("cannot load import '{alias}' from \"{path}\": {err}"),
                            schema.span,
                        )
                    })?;
                    let Some(base_schema) = module.schemas.get(type_name) else {
                        return Err(VagueError::bind(
                            format!("import '{alias}' has no schema named '{type_name}'"),
                            schema.span,
                        ));
                    };
                    merge_base(schema, base_schema, warnings)
                }
            };
            schemas.insert(merged.name.clone(), merged);
        }
        Ok(schemas)
    }

    fn check_schema(
        &self,
        schema: &SchemaDef,
        schemas: &IndexMap<String, SchemaDef>,
        lets: &IndexMap<String, TypeExpr>,
    ) -> CompileResult<()> {
        let all_fields: HashSet<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();

        for (idx, field) in schema.fields.iter().enumerate() {
            let earlier: HashSet<&str> = schema.fields[..idx]
                .iter()
                .map(|f| f.name.as_str())
                .collect();

            // Derived fields may look forward; everything else must point
            // backward.
            let visible = if field.ty.is_derived() {
                &all_fields
            } else {
                &earlier
            };
            self.check_type_expr(&field.ty, schema, schemas, lets, visible, field.span)?;

            if let Some(guard) = &field.when {
                self.check_expr(guard, schema, lets, &earlier, field.span)?;
            }
        }

        for assume in &schema.assumes {
            match assume {
                AssumeItem::Flat(pred) => {
                    self.check_expr(pred, schema, lets, &all_fields, schema.span)?;
                }
                AssumeItem::Guarded { cond, predicates } => {
                    self.check_expr(cond, schema, lets, &all_fields, schema.span)?;
                    for pred in predicates {
                        self.check_expr(pred, schema, lets, &all_fields, schema.span)?;
                    }
                }
            }
        }

        for clause in &schema.refine {
            self.check_expr(&clause.cond, schema, lets, &all_fields, schema.span)?;
            for over in &clause.overrides {
                if !all_fields.contains(over.name.as_str()) {
                    return Err(VagueError::bind(
                        format!(
                            "refine override targets unknown field '{}' of schema '{}'",
                            over.name, schema.name
                        ),
                        over.span,
                    ));
                }
                self.check_type_expr(&over.ty, schema, schemas, lets, &all_fields, over.span)?;
            }
        }

        for stmt in &schema.then {
            if !all_fields.contains(stmt.target.as_str()) {
                return Err(VagueError::bind(
                    format!(
                        "then hook assigns unknown field '{}' of schema '{}'",
                        stmt.target, schema.name
                    ),
                    schema.span,
                ));
            }
            self.check_expr(&stmt.expr, schema, lets, &all_fields, schema.span)?;
        }

        Ok(())
    }

    fn check_type_expr(
        &self,
        ty: &TypeExpr,
        schema: &SchemaDef,
        schemas: &IndexMap<String, SchemaDef>,
        lets: &IndexMap<String, TypeExpr>,
        visible_fields: &HashSet<&str>,
        span: Span,
    ) -> CompileResult<()> {
        match ty {
            TypeExpr::Primitive { .. } | TypeExpr::Literal(_) => Ok(()),
            TypeExpr::Range { lo, hi, .. } => {
                self.check_expr(lo, schema, lets, visible_fields, span)?;
                self.check_expr(hi, schema, lets, visible_fields, span)
            }
            TypeExpr::Named(name) => {
                if schemas.contains_key(name)
                    || lets.contains_key(name)
                    || visible_fields.contains(name.as_str())
                {
                    Ok(())
                } else if schema.field(name).is_some() {
                    Err(VagueError::bind(
                        format!(
                            "field '{name}' is declared later in schema '{}'; forward references are only allowed in derived fields",
                            schema.name
                        ),
                        span,
                    ))
                } else {
                    Err(VagueError::bind(
                        format!("unknown name '{name}' in schema '{}'", schema.name),
                        span,
                    ))
                }
            }
            TypeExpr::CollectionOf {
                cardinality,
                schema: target,
                overrides,
            } => {
                let Some(sub) = schemas.get(target) else {
                    return Err(VagueError::bind(
                        format!("unknown schema '{target}' in schema '{}'", schema.name),
                        span,
                    ));
                };
                self.check_cardinality(cardinality, schema, lets, visible_fields, span)?;
                self.check_overrides(overrides, sub, schemas, lets, span)?;
                // The embedded schema's parent fields must exist here.
                self.check_parent_fields(sub, schema, schemas, span)
            }
            TypeExpr::Superposition(variants) => {
                for variant in variants {
                    self.check_type_expr(&variant.ty, schema, schemas, lets, visible_fields, span)?;
                }
                Ok(())
            }
            TypeExpr::OrderedSequence(items) => {
                for item in items {
                    self.check_expr(item, schema, lets, visible_fields, span)?;
                }
                Ok(())
            }
            TypeExpr::Expr(expr) => self.check_expr(expr, schema, lets, visible_fields, span),
        }
    }

    fn check_cardinality(
        &self,
        cardinality: &Cardinality,
        schema: &SchemaDef,
        lets: &IndexMap<String, TypeExpr>,
        visible_fields: &HashSet<&str>,
        span: Span,
    ) -> CompileResult<()> {
        match cardinality {
            Cardinality::Exact(n) => self.check_expr(n, schema, lets, visible_fields, span),
            Cardinality::Range(lo, hi) => {
                self.check_expr(lo, schema, lets, visible_fields, span)?;
                self.check_expr(hi, schema, lets, visible_fields, span)
            }
        }
    }

    fn check_overrides(
        &self,
        overrides: &[FieldOverride],
        target: &SchemaDef,
        schemas: &IndexMap<String, SchemaDef>,
        lets: &IndexMap<String, TypeExpr>,
        span: Span,
    ) -> CompileResult<()> {
        let target_fields: HashSet<&str> = target.fields.iter().map(|f| f.name.as_str()).collect();
        for over in overrides {
            if !target_fields.contains(over.name.as_str()) {
                return Err(VagueError::bind(
                    format!(
                        "override targets unknown field '{}' of schema '{}'",
                        over.name, target.name
                    ),
                    over.span,
                ));
            }
            self.check_type_expr(&over.ty, target, schemas, lets, &target_fields, span)?;
        }
        Ok(())
    }

    /// Every `^field` in `embedded` must name a field of `parent`.
    fn check_parent_fields(
        &self,
        embedded: &SchemaDef,
        parent: &SchemaDef,
        schemas: &IndexMap<String, SchemaDef>,
        span: Span,
    ) -> CompileResult<()> {
        let mut parent_refs = Vec::new();
        collect_schema_parent_fields(embedded, &mut parent_refs);
        for name in parent_refs {
            if parent.field(&name).is_none() {
                return Err(VagueError::bind(
                    format!(
                        "schema '{}' accesses '^{name}' but embedding schema '{}' has no field '{name}'",
                        embedded.name, parent.name
                    ),
                    span,
                ));
            }
        }
        // Sub-collections of the embedded schema resolve `^` against the
        // embedded schema itself; recurse one level down.
        for field in &embedded.fields {
            if let TypeExpr::CollectionOf { schema: target, .. } = &field.ty {
                if let Some(sub) = schemas.get(target) {
                    if sub.name != embedded.name {
                        self.check_parent_fields(sub, embedded, schemas, span)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_dataset(
        &self,
        dataset: &DatasetDef,
        schemas: &IndexMap<String, SchemaDef>,
        lets: &IndexMap<String, TypeExpr>,
    ) -> CompileResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for collection in &dataset.collections {
            let Some(schema) = schemas.get(&collection.schema) else {
                return Err(VagueError::bind(
                    format!(
                        "dataset '{}' references unknown schema '{}'",
                        dataset.name, collection.schema
                    ),
                    collection.span,
                ));
            };

            // `any of` targets anywhere in the schema tree must already be
            // generated when this collection runs.
            let mut any_refs = Vec::new();
            let mut visited = HashSet::new();
            collect_any_of_targets(schema, schemas, &mut visited, &mut any_refs);
            for over in &collection.overrides {
                collect_expr_any_of(&over.ty, &mut any_refs);
            }
            for target in any_refs {
                if !seen.contains(target.as_str()) {
                    return Err(VagueError::bind(
                        format!(
                            "'any of {target}' in collection '{}' refers to a collection not yet generated in dataset '{}'",
                            collection.name, dataset.name
                        ),
                        collection.span,
                    ));
                }
            }

            // Top-level schemas have no parent record to satisfy `^`.
            let mut parent_refs = Vec::new();
            collect_parent_fields_shallow(schema, &mut parent_refs);
            if let Some(name) = parent_refs.first() {
                return Err(VagueError::bind(
                    format!(
                        "schema '{}' uses '^{name}' but is generated at the top level of dataset '{}'",
                        schema.name, dataset.name
                    ),
                    collection.span,
                ));
            }

            self.check_overrides(&collection.overrides, schema, schemas, lets, collection.span)?;
            seen.insert(collection.name.as_str());
        }

        // Validate predicates see collection names and lets.
        let collection_fields: HashSet<&str> = dataset
            .collections
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        for pred in &dataset.validate {
            let mut idents = Vec::new();
            collect_free_idents(pred, &mut idents);
            for ident in idents {
                if !collection_fields.contains(ident.as_str()) && !lets.contains_key(&ident) {
                    return Err(VagueError::bind(
                        format!(
                            "validate predicate references unknown name '{ident}' in dataset '{}'",
                            dataset.name
                        ),
                        dataset.span,
                    ));
                }
            }
            self.check_call_arities(pred, dataset.span)?;
        }

        Ok(())
    }

    /// Free identifier check for expressions inside a schema scope.
    fn check_expr(
        &self,
        expr: &Expr,
        schema: &SchemaDef,
        lets: &IndexMap<String, TypeExpr>,
        visible_fields: &HashSet<&str>,
        span: Span,
    ) -> CompileResult<()> {
        let mut idents = Vec::new();
        collect_free_idents(expr, &mut idents);
        for ident in idents {
            if visible_fields.contains(ident.as_str())
                || lets.contains_key(&ident)
                || self.collection_names.contains(&ident)
            {
                continue;
            }
            if schema.field(&ident).is_some() {
                return Err(VagueError::bind(
                    format!(
                        "field '{ident}' is declared later in schema '{}'; forward references are only allowed in derived fields",
                        schema.name
                    ),
                    span,
                ));
            }
            return Err(VagueError::bind(
                format!("unknown name '{ident}' in schema '{}'", schema.name),
                span,
            ));
        }
        self.check_call_arities(expr, span)
    }

    fn check_call_arities(&self, expr: &Expr, span: Span) -> CompileResult<()> {
        let mut result = Ok(());
        walk_expr(expr, &mut |e| {
            if result.is_err() {
                return;
            }
            if let Expr::Call { name, args } = e {
                if name.is_single() {
                    if let Some((min, max)) = builtin_arity(name.head()) {
                        if args.len() < min || args.len() > max {
                            result = Err(VagueError::bind(
                                format!(
                                    "'{}' expects {} argument(s), got {}",
                                    name.head(),
                                    if min == max {
                                        min.to_string()
                                    } else {
                                        format!("{min} to {max}")
                                    },
                                    args.len()
                                ),
                                span,
                            ));
                        }
                    }
                }
            }
        });
        result
    }
}

fn split_base(base: &crate::ast::DottedName, span: Span) -> CompileResult<(&str, &str)> {
    match base.parts.as_slice() {
        [alias, type_name] => Ok((alias, type_name)),
        _ => Err(VagueError::bind(
            format!("schema base must be 'alias.Type', found '{base}'"),
            span,
        )),
    }
}

/// Fold a base schema into a local one: base fields first (in base order),
/// local declarations override by name; local fields absent from the base
/// are kept and warned about.
fn merge_base(
    local: &SchemaDef,
    base: &SchemaDef,
    warnings: &mut WarningCollector,
) -> SchemaDef {
    let mut merged = local.clone();
    merged.base = None;

    let mut fields = Vec::new();
    for base_field in &base.fields {
        match local.field(&base_field.name) {
            Some(over) => fields.push(over.clone()),
            None => fields.push(base_field.clone()),
        }
    }
    for field in &local.fields {
        if base.field(&field.name).is_none() {
            warnings.add(
                Warning::new(
                    WarningKind::UnknownFieldInImportedSchema,
                    format!(
                        "field '{}' does not exist in imported base '{}'",
                        field.name, base.name
                    ),
                )
                .with_schema(local.name.clone())
                .with_field(field.name.clone()),
            );
            fields.push(field.clone());
        }
    }
    merged.fields = fields;
    merged
}

// ----------------------------------------------------------------------
// Expression walkers
// ----------------------------------------------------------------------

fn walk_expr(expr: &Expr, visit: &mut impl FnMut(&Expr)) {
    visit(expr);
    match expr {
        Expr::Member { object, .. } => walk_expr(object, visit),
        Expr::Call { args, .. } => {
            for arg in args {
                walk_expr(arg, visit);
            }
        }
        Expr::AnyOf { filter, .. } => {
            if let Some(filter) = filter {
                walk_expr(filter, visit);
            }
        }
        Expr::Unary { operand, .. } => walk_expr(operand, visit),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, visit);
            walk_expr(right, visit);
        }
        Expr::Ternary {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr(cond, visit);
            walk_expr(then_branch, visit);
            walk_expr(else_branch, visit);
        }
        Expr::Literal(_) | Expr::Ident(_) | Expr::ElementField(_) | Expr::ParentField(_) => {}
    }
}

/// Free identifiers: `Ident` nodes, excluding call names. `previous(...)`
/// takes a field name positionally, so its arguments are skipped too.
fn collect_free_idents(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Ident(name) => out.push(name.clone()),
        Expr::Call { name, args } => {
            if name.is_single() && name.head() == "previous" {
                return;
            }
            for arg in args {
                collect_free_idents(arg, out);
            }
        }
        Expr::Member { object, .. } => collect_free_idents(object, out),
        Expr::AnyOf { filter, .. } => {
            if let Some(filter) = filter {
                collect_free_idents(filter, out);
            }
        }
        Expr::Unary { operand, .. } => collect_free_idents(operand, out),
        Expr::Binary { left, right, .. } => {
            collect_free_idents(left, out);
            collect_free_idents(right, out);
        }
        Expr::Ternary {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_free_idents(cond, out);
            collect_free_idents(then_branch, out);
            collect_free_idents(else_branch, out);
        }
        Expr::Literal(_) | Expr::ElementField(_) | Expr::ParentField(_) => {}
    }
}

fn collect_expr_any_of(ty: &TypeExpr, out: &mut Vec<String>) {
    let mut from_expr = |expr: &Expr, out: &mut Vec<String>| {
        walk_expr(expr, &mut |e| {
            if let Expr::AnyOf { collection, .. } = e {
                out.push(collection.clone());
            }
        });
    };
    match ty {
        TypeExpr::Expr(expr) => from_expr(expr, out),
        TypeExpr::Range { lo, hi, .. } => {
            from_expr(lo, out);
            from_expr(hi, out);
        }
        TypeExpr::Superposition(variants) => {
            for v in variants {
                collect_expr_any_of(&v.ty, out);
            }
        }
        TypeExpr::OrderedSequence(items) => {
            for item in items {
                from_expr(item, out);
            }
        }
        _ => {}
    }
}

/// All `any of` targets reachable from a schema, including embedded
/// sub-schemas, refine overrides, assumes and then hooks.
fn collect_any_of_targets(
    schema: &SchemaDef,
    schemas: &IndexMap<String, SchemaDef>,
    visited: &mut HashSet<String>,
    out: &mut Vec<String>,
) {
    if !visited.insert(schema.name.clone()) {
        return;
    }
    for field in &schema.fields {
        collect_expr_any_of(&field.ty, out);
        if let Some(guard) = &field.when {
            walk_expr(guard, &mut |e| {
                if let Expr::AnyOf { collection, .. } = e {
                    out.push(collection.clone());
                }
            });
        }
        if let TypeExpr::CollectionOf { schema: target, .. } = &field.ty {
            if let Some(sub) = schemas.get(target) {
                collect_any_of_targets(sub, schemas, visited, out);
            }
        }
    }
    for clause in &schema.refine {
        for over in &clause.overrides {
            collect_expr_any_of(&over.ty, out);
        }
    }
}

/// `^field` references in a schema's own expressions (not those of embedded
/// sub-schemas, which resolve against this schema instead).
fn collect_parent_fields_shallow(schema: &SchemaDef, out: &mut Vec<String>) {
    let mut from_expr = |expr: &Expr, out: &mut Vec<String>| {
        walk_expr(expr, &mut |e| {
            if let Expr::ParentField(name) = e {
                out.push(name.clone());
            }
        });
    };
    for field in &schema.fields {
        collect_type_parent_fields(&field.ty, out);
        if let Some(guard) = &field.when {
            from_expr(guard, out);
        }
    }
}

fn collect_type_parent_fields(ty: &TypeExpr, out: &mut Vec<String>) {
    let mut from_expr = |expr: &Expr, out: &mut Vec<String>| {
        walk_expr(expr, &mut |e| {
            if let Expr::ParentField(name) = e {
                out.push(name.clone());
            }
        });
    };
    match ty {
        TypeExpr::Expr(expr) => from_expr(expr, out),
        TypeExpr::Range { lo, hi, .. } => {
            from_expr(lo, out);
            from_expr(hi, out);
        }
        TypeExpr::Superposition(variants) => {
            for v in variants {
                collect_type_parent_fields(&v.ty, out);
            }
        }
        TypeExpr::OrderedSequence(items) => {
            for item in items {
                from_expr(item, out);
            }
        }
        // CollectionOf cardinalities evaluate in this schema's scope;
        // the sub-schema body does not.
        TypeExpr::CollectionOf { cardinality, .. } => match cardinality {
            Cardinality::Exact(n) => from_expr(n, out),
            Cardinality::Range(lo, hi) => {
                from_expr(lo, out);
                from_expr(hi, out);
            }
        },
        _ => {}
    }
}

/// Same as [`collect_parent_fields_shallow`] but used when the schema *is*
/// embedded: gathers the refs that must exist on the embedding parent.
fn collect_schema_parent_fields(schema: &SchemaDef, out: &mut Vec<String>) {
    collect_parent_fields_shallow(schema, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{ImportedModule, NoImports};
    use crate::parser::parse;

    fn bind_source(source: &str) -> CompileResult<BoundProgram> {
        let program = parse(source).expect("parse");
        let mut warnings = WarningCollector::new();
        bind(&program, &NoImports, &mut warnings)
    }

    #[test]
    fn binds_valid_program() {
        let bound = bind_source(
            r#"
            let colors = "red" | "green"
            schema X { id: int in 1..3, c: colors }
            dataset D { xs: 10 of X }
            "#,
        )
        .expect("bind");
        assert_eq!(bound.schemas.len(), 1);
        assert_eq!(bound.lets.len(), 1);
        assert_eq!(bound.datasets.len(), 1);
    }

    #[test]
    fn unknown_schema_in_dataset() {
        let err = bind_source("dataset D { xs: 3 of Missing }").expect_err("should fail");
        assert!(err.to_string().contains("unknown schema 'Missing'"));
    }

    #[test]
    fn forward_reference_rejected() {
        // `uniform` draws randomness, so this is not a derived field and
        // the forward reference to b is an error.
        let err = bind_source(
            r#"
            schema X { a: b + uniform(0, 1), b: int in 1..3 }
            "#,
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("forward references"));

        // `when` guards always look backward.
        let err = bind_source(
            r#"
            schema X { a: int in 1..3 when b > 1, b: int in 1..3 }
            "#,
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("forward references"));
    }

    #[test]
    fn derived_field_may_look_forward() {
        // `a + b` is pure, so it is recomputed in the derived pass and may
        // reference b even though b comes later.
        bind_source(
            r#"
            schema X { t: a + b, a: int in 1..3, b: int in 1..3 }
            "#,
        )
        .expect("bind");
    }

    #[test]
    fn any_of_must_point_backward() {
        let err = bind_source(
            r#"
            schema O { c: any of customers }
            schema C { id: int in 1..9 }
            dataset D { orders: 3 of O, customers: 3 of C }
            "#,
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("any of customers"));

        bind_source(
            r#"
            schema O { c: any of customers }
            schema C { id: int in 1..9 }
            dataset D { customers: 3 of C, orders: 3 of O }
            "#,
        )
        .expect("bind");
    }

    #[test]
    fn parent_field_requires_embedding() {
        let err = bind_source(
            r#"
            schema LI { cur: ^currency }
            dataset D { items: 3 of LI }
            "#,
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("top level"));
    }

    #[test]
    fn parent_field_checked_against_parent_schema() {
        bind_source(
            r#"
            schema LI { cur: ^currency }
            schema Inv { currency: "USD" | "EUR", items: 2 of LI }
            dataset D { invs: 3 of Inv }
            "#,
        )
        .expect("bind");

        let err = bind_source(
            r#"
            schema LI { cur: ^missing }
            schema Inv { currency: "USD", items: 2 of LI }
            dataset D { invs: 3 of Inv }
            "#,
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("^missing"));
    }

    #[test]
    fn builtin_arity_checked() {
        let err = bind_source(
            r#"
            schema X { a: int in 1..5, b: round(a) }
            "#,
        )
        .err();
        // round takes 1 or 2 args, so this passes; substring takes 2..3.
        assert!(err.is_none());

        let err = bind_source(
            r#"
            schema X { a: int in 1..5, b: sum() }
            "#,
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("argument"));
    }

    #[test]
    fn validate_names_must_be_collections() {
        let err = bind_source(
            r#"
            schema X { id: int in 1..3 }
            dataset D { xs: 3 of X, validate { count(ys) > 1 } }
            "#,
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("unknown name 'ys'"));
    }

    #[test]
    fn imported_base_merges_and_warns() {
        struct Fixed(ImportedModule);
        impl SpecLoader for Fixed {
            fn load(&self, _path: &str) -> CompileResult<ImportedModule> {
                Ok(self.0.clone())
            }
        }

        let base = parse("schema BaseUser { id: int in 1..100, name: string }")
            .expect("parse base")
            .schemas()
            .next()
            .expect("schema")
            .clone();
        let loader = Fixed(ImportedModule::new().with_schema(base));

        let program = parse(
            r#"
            import common from "common.vague"
            schema User from common.BaseUser { name: "fixed", email: string }
            "#,
        )
        .expect("parse");
        let mut warnings = WarningCollector::new();
        let bound = bind(&program, &loader, &mut warnings).expect("bind");

        let user = &bound.schemas["User"];
        // Base order first: id, name (overridden), then the new email field.
        let names: Vec<&str> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email"]);

        let warned = warnings.get_by_kind(WarningKind::UnknownFieldInImportedSchema);
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].field.as_deref(), Some("email"));
    }

    #[test]
    fn unknown_import_alias_is_fatal() {
        let err = bind_source(
            r#"
            schema User from common.BaseUser { email: string }
            "#,
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("unknown import alias"));
    }
}
