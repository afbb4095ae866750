//! Builder Patterns for AST Construction
//!
//! Provides fluent APIs for constructing AST nodes, particularly useful for tests.
//!
//! ## Example
//!
//! ```rust
//! use vague::ast::builders::SchemaBuilder;
//! use vague::ast::{Expr, Literal, Primitive, TypeExpr};
//!
//! // Build: schema X { id: int in 1..10, name: string }
//! let schema = SchemaBuilder::new("X")
//!     .field(
//!         "id",
//!         TypeExpr::Range {
//!             primitive: Primitive::Int,
//!             precision: None,
//!             lo: Expr::Literal(Literal::Int(1)),
//!             hi: Expr::Literal(Literal::Int(10)),
//!         },
//!     )
//!     .field(
//!         "name",
//!         TypeExpr::Primitive {
//!             primitive: Primitive::String,
//!             precision: None,
//!         },
//!     )
//!     .build();
//! assert_eq!(schema.fields.len(), 2);
//! ```

use super::{AssumeItem, Expr, FieldSpec, SchemaDef, TypeExpr};
use crate::error::Span;

/// Builder for constructing `SchemaDef` instances
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: SchemaDef,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        SchemaBuilder {
            schema: SchemaDef {
                name: name.into(),
                base: None,
                fields: Vec::new(),
                assumes: Vec::new(),
                refine: Vec::new(),
                then: Vec::new(),
                span: Span::default(),
            },
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeExpr) -> Self {
        self.schema.fields.push(FieldSpec::new(name, ty));
        self
    }

    pub fn field_spec(mut self, spec: FieldSpec) -> Self {
        self.schema.fields.push(spec);
        self
    }

    pub fn assume(mut self, predicate: Expr) -> Self {
        self.schema.assumes.push(AssumeItem::Flat(predicate));
        self
    }

    pub fn build(self) -> SchemaDef {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Literal, Primitive};

    #[test]
    fn builds_schema_with_fields_and_assume() {
        let schema = SchemaBuilder::new("Invoice")
            .field(
                "amount",
                TypeExpr::Primitive {
                    primitive: Primitive::Decimal,
                    precision: Some(2),
                },
            )
            .assume(Expr::Binary {
                op: BinaryOp::Gt,
                left: Box::new(Expr::Ident("amount".into())),
                right: Box::new(Expr::Literal(Literal::Int(0))),
            })
            .build();

        assert_eq!(schema.name, "Invoice");
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.assumes.len(), 1);
    }
}
