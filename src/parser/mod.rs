//! # Parser
//!
//! Recursive descent over the token stream, producing the AST in `crate::ast`.
//!
//! Two entry points:
//! - [`parse`] stops at the first error.
//! - [`parse_with_recovery`] skips to the next top-level statement boundary
//!   (`schema`, `dataset`, `let`, `import`, or end of input) after an error,
//!   records it, and keeps going, returning a partial program plus the list.
//!
//! Operator precedence, low to high: ternary `?:`, `or`, `and`, `not`,
//! equality, comparison, additive, multiplicative, unary sign, call/member
//! access. The superposition `|` lives in type-expression positions only.

use crate::ast::{
    AssignOp, AssumeItem, BinaryOp, Cardinality, DatasetCollection, DatasetDef, DottedName, Expr,
    FieldOverride, FieldSpec, ImportDirective, Item, LetBinding, Literal, Primitive, Program,
    RefineClause, SchemaDef, ThenStatement, TypeExpr, UnaryOp, Variant,
};
use crate::error::{CompileResult, Span, VagueError};
use crate::lexer::{tokenize, Token, TokenKind};

/// Parse a program, failing on the first error.
pub fn parse(source: &str) -> CompileResult<Program> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).program_strict()
}

/// Parse a program with statement-level error recovery. Returns the partial
/// program and every error encountered. Empty input parses to an empty
/// program with no errors.
pub fn parse_with_recovery(source: &str) -> (Program, Vec<VagueError>) {
    match tokenize(source) {
        Ok(tokens) => Parser::new(tokens).program_recovering(),
        Err(err) => (Program::new(), vec![err]),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_ahead(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, context: &str) -> CompileResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error_here(format!(
                "expected '{kind}' {context}, found {}",
                self.peek().describe()
            )))
        }
    }

    fn expect_ident(&mut self, context: &str) -> CompileResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error_here(format!(
                "expected an identifier {context}, found {}",
                other.describe()
            ))),
        }
    }

    fn error_here(&self, message: String) -> VagueError {
        VagueError::parse(message, self.span())
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    // ------------------------------------------------------------------
    // Program & items
    // ------------------------------------------------------------------

    fn program_strict(mut self) -> CompileResult<Program> {
        let mut program = Program::new();
        while !self.at_eof() {
            program.items.push(self.item()?);
        }
        Ok(program)
    }

    fn program_recovering(mut self) -> (Program, Vec<VagueError>) {
        let mut program = Program::new();
        let mut errors = Vec::new();
        while !self.at_eof() {
            match self.item() {
                Ok(item) => program.items.push(item),
                Err(err) => {
                    errors.push(err);
                    self.synchronize();
                }
            }
        }
        (program, errors)
    }

    /// Skip to the next top-level statement boundary.
    fn synchronize(&mut self) {
        // Always consume at least one token so a bad statement keyword does
        // not loop forever.
        if !self.at_eof() {
            self.advance();
        }
        while !self.at_eof() {
            match self.peek() {
                TokenKind::Schema | TokenKind::Dataset | TokenKind::Let | TokenKind::Import => {
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn item(&mut self) -> CompileResult<Item> {
        match self.peek() {
            TokenKind::Let => self.let_binding().map(Item::Let),
            TokenKind::Schema => self.schema_def().map(Item::Schema),
            TokenKind::Dataset => self.dataset_def().map(Item::Dataset),
            TokenKind::Import => self.import_directive().map(Item::Import),
            other => Err(self.error_here(format!(
                "expected 'schema', 'dataset', 'let' or 'import', found {}",
                other.describe()
            ))),
        }
    }

    fn let_binding(&mut self) -> CompileResult<LetBinding> {
        let span = self.span();
        self.expect(&TokenKind::Let, "to begin a let binding")?;
        let name = self.expect_ident("after 'let'")?;
        self.expect(&TokenKind::Assign, "after the let binding name")?;
        let ty = self.type_expr()?;
        Ok(LetBinding { name, ty, span })
    }

    fn import_directive(&mut self) -> CompileResult<ImportDirective> {
        let span = self.span();
        self.expect(&TokenKind::Import, "to begin an import")?;
        let alias = self.expect_ident("after 'import'")?;
        self.expect(&TokenKind::From, "after the import alias")?;
        let path = match self.peek().clone() {
            TokenKind::Str(path) => {
                self.advance();
                path
            }
            other => {
                return Err(self.error_here(format!(
                    "expected a quoted path after 'from', found {}",
                    other.describe()
                )));
            }
        };
        Ok(ImportDirective { alias, path, span })
    }

    // ------------------------------------------------------------------
    // Schemas
    // ------------------------------------------------------------------

    fn schema_def(&mut self) -> CompileResult<SchemaDef> {
        let span = self.span();
        self.expect(&TokenKind::Schema, "to begin a schema")?;
        let name = self.expect_ident("after 'schema'")?;

        let base = if self.eat(&TokenKind::From) {
            Some(self.dotted_name()?)
        } else {
            None
        };

        self.expect(&TokenKind::LBrace, "to open the schema body")?;
        let mut fields = Vec::new();
        let mut assumes = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Assume) {
                assumes.push(self.assume_item()?);
            } else {
                fields.push(self.field_spec()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "to close the schema body")?;

        let refine = if self.check(&TokenKind::Refine) {
            self.refine_block()?
        } else {
            Vec::new()
        };
        let then = if self.check(&TokenKind::Then) {
            self.then_block()?
        } else {
            Vec::new()
        };

        Ok(SchemaDef {
            name,
            base,
            fields,
            assumes,
            refine,
            then,
            span,
        })
    }

    fn dotted_name(&mut self) -> CompileResult<DottedName> {
        let mut parts = vec![self.expect_ident("in a dotted name")?];
        while self.check(&TokenKind::Dot) {
            self.advance();
            parts.push(self.expect_ident("after '.'")?);
        }
        Ok(DottedName::new(parts))
    }

    fn field_spec(&mut self) -> CompileResult<FieldSpec> {
        let span = self.span();
        let name = self.expect_ident("as a field name")?;
        self.expect(&TokenKind::Colon, "after the field name")?;

        let mut unique = false;
        let mut private = false;
        loop {
            if self.eat(&TokenKind::Unique) {
                unique = true;
            } else if self.eat(&TokenKind::Private) {
                private = true;
            } else {
                break;
            }
        }

        let ty = self.type_expr()?;

        // Trailing `?` marks the field nullable when nothing expression-like
        // follows; otherwise it belongs to a ternary and was consumed there.
        let mut nullable = false;
        if self.check(&TokenKind::Question) && !self.ahead_starts_expr(1) {
            self.advance();
            nullable = true;
        }

        let when = if self.eat(&TokenKind::When) {
            Some(self.expr()?)
        } else {
            None
        };

        Ok(FieldSpec {
            name,
            ty,
            unique,
            private,
            nullable,
            when,
            span,
        })
    }

    fn ahead_starts_expr(&self, n: usize) -> bool {
        matches!(
            self.peek_ahead(n),
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Decimal(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::LParen
                | TokenKind::Caret
                | TokenKind::Dot
                | TokenKind::Any
                | TokenKind::Not
                | TokenKind::Minus
                | TokenKind::Plus
        )
    }

    fn assume_item(&mut self) -> CompileResult<AssumeItem> {
        self.expect(&TokenKind::Assume, "to begin a constraint")?;
        if self.eat(&TokenKind::If) {
            let cond = self.expr()?;
            self.expect(&TokenKind::LBrace, "to open the guarded constraints")?;
            let mut predicates = Vec::new();
            while !self.check(&TokenKind::RBrace) {
                predicates.push(self.expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RBrace, "to close the guarded constraints")?;
            Ok(AssumeItem::Guarded { cond, predicates })
        } else {
            Ok(AssumeItem::Flat(self.expr()?))
        }
    }

    fn refine_block(&mut self) -> CompileResult<Vec<RefineClause>> {
        self.expect(&TokenKind::Refine, "to begin a refine block")?;
        self.expect(&TokenKind::LBrace, "after 'refine'")?;
        let mut clauses = Vec::new();
        while self.check(&TokenKind::If) {
            self.advance();
            let cond = self.expr()?;
            self.expect(&TokenKind::LBrace, "to open the refine overrides")?;
            let overrides = self.field_overrides()?;
            self.expect(&TokenKind::RBrace, "to close the refine overrides")?;
            clauses.push(RefineClause { cond, overrides });
            self.eat(&TokenKind::Comma);
        }
        if clauses.is_empty() && !self.check(&TokenKind::RBrace) {
            return Err(self.error_here(format!(
                "expected 'if' inside refine block, found {}",
                self.peek().describe()
            )));
        }
        self.expect(&TokenKind::RBrace, "to close the refine block")?;
        Ok(clauses)
    }

    fn then_block(&mut self) -> CompileResult<Vec<ThenStatement>> {
        self.expect(&TokenKind::Then, "to begin a then block")?;
        self.expect(&TokenKind::LBrace, "after 'then'")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let target = self.expect_ident("as an assignment target")?;
            let op = if self.eat(&TokenKind::PlusAssign) {
                AssignOp::Add
            } else {
                self.expect(&TokenKind::Assign, "in a then assignment")?;
                AssignOp::Set
            };
            let expr = self.expr()?;
            statements.push(ThenStatement { target, op, expr });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "to close the then block")?;
        Ok(statements)
    }

    fn field_overrides(&mut self) -> CompileResult<Vec<FieldOverride>> {
        let mut overrides = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let span = self.span();
            let name = self.expect_ident("as an override field name")?;
            self.expect(&TokenKind::Colon, "after the override field name")?;
            let ty = self.type_expr()?;
            overrides.push(FieldOverride { name, ty, span });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(overrides)
    }

    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    fn dataset_def(&mut self) -> CompileResult<DatasetDef> {
        let span = self.span();
        self.expect(&TokenKind::Dataset, "to begin a dataset")?;
        let name = self.expect_ident("after 'dataset'")?;
        let violating = self.eat(&TokenKind::Violating);

        self.expect(&TokenKind::LBrace, "to open the dataset body")?;
        let mut collections = Vec::new();
        let mut validate = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Validate) {
                self.advance();
                self.expect(&TokenKind::LBrace, "after 'validate'")?;
                while !self.check(&TokenKind::RBrace) {
                    validate.push(self.expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace, "to close the validate block")?;
            } else {
                collections.push(self.dataset_collection()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "to close the dataset body")?;

        Ok(DatasetDef {
            name,
            violating,
            collections,
            validate,
            span,
        })
    }

    fn dataset_collection(&mut self) -> CompileResult<DatasetCollection> {
        let span = self.span();
        let name = self.expect_ident("as a collection name")?;
        self.expect(&TokenKind::Colon, "after the collection name")?;

        let lo = self.expr()?;
        let cardinality = if self.eat(&TokenKind::DotDot) {
            let hi = self.expr()?;
            Cardinality::Range(lo, hi)
        } else {
            Cardinality::Exact(lo)
        };

        self.expect(&TokenKind::Of, "after the collection cardinality")?;
        let schema = self.expect_ident("as the collection schema")?;

        let overrides = if self.eat(&TokenKind::LBrace) {
            let overrides = self.field_overrides()?;
            self.expect(&TokenKind::RBrace, "to close the collection overrides")?;
            overrides
        } else {
            Vec::new()
        };

        Ok(DatasetCollection {
            name,
            cardinality,
            schema,
            overrides,
            span,
        })
    }

    // ------------------------------------------------------------------
    // Type expressions
    // ------------------------------------------------------------------

    fn type_expr(&mut self) -> CompileResult<TypeExpr> {
        let first = self.type_variant()?;
        if !self.check(&TokenKind::Pipe) {
            return Ok(match first {
                Variant { weight: None, ty } => ty,
                weighted => TypeExpr::Superposition(vec![weighted]),
            });
        }
        let mut variants = vec![first];
        while self.eat(&TokenKind::Pipe) {
            variants.push(self.type_variant()?);
        }
        Ok(TypeExpr::Superposition(variants))
    }

    fn type_variant(&mut self) -> CompileResult<Variant> {
        // `0.9:"paid"` - a number directly followed by ':' is a weight.
        let weight = match (self.peek(), self.peek_ahead(1)) {
            (TokenKind::Decimal(w), TokenKind::Colon) => {
                let w = *w;
                self.advance();
                self.advance();
                Some(w)
            }
            (TokenKind::Int(w), TokenKind::Colon) => {
                let w = *w as f64;
                self.advance();
                self.advance();
                Some(w)
            }
            _ => None,
        };
        let ty = self.type_variant_core()?;
        Ok(Variant { weight, ty })
    }

    fn type_variant_core(&mut self) -> CompileResult<TypeExpr> {
        // Ordered sequence: [v1, v2, ...]
        if self.eat(&TokenKind::LBracket) {
            let mut items = Vec::new();
            while !self.check(&TokenKind::RBracket) {
                items.push(self.expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RBracket, "to close the ordered sequence")?;
            return Ok(TypeExpr::OrderedSequence(items));
        }

        // Primitive types, optionally with precision and a range.
        if let TokenKind::Ident(word) = self.peek() {
            if let Some(primitive) = Primitive::parse(word) {
                // `decimal(2)` - but `decimal(...)` only reads as a precision
                // when the parenthesized content is a bare integer; anything
                // else is an ordinary call expression of the same name.
                let is_precision = matches!(
                    (self.peek_ahead(1), self.peek_ahead(2), self.peek_ahead(3)),
                    (TokenKind::LParen, TokenKind::Int(_), TokenKind::RParen)
                );
                let treat_as_primitive = !matches!(self.peek_ahead(1), TokenKind::LParen)
                    || is_precision;
                if treat_as_primitive {
                    self.advance();
                    let precision = if is_precision {
                        self.advance(); // (
                        let p = match self.peek() {
                            TokenKind::Int(p) => *p as u32,
                            _ => 0,
                        };
                        self.advance(); // precision
                        self.advance(); // )
                        Some(p)
                    } else {
                        None
                    };
                    if self.eat(&TokenKind::In) {
                        let lo = self.expr()?;
                        self.expect(&TokenKind::DotDot, "in a range type")?;
                        let hi = self.expr()?;
                        return Ok(TypeExpr::Range {
                            primitive,
                            precision,
                            lo,
                            hi,
                        });
                    }
                    return Ok(TypeExpr::Primitive {
                        primitive,
                        precision,
                    });
                }
            }
        }

        // Everything else starts life as an expression.
        let expr = self.expr()?;

        // `3 of LI`, `3..5 of LI` - collection specs.
        if self.check(&TokenKind::DotDot) {
            self.advance();
            let hi = self.expr()?;
            self.expect(&TokenKind::Of, "after a cardinality range")?;
            let schema = self.expect_ident("as the collection schema")?;
            let overrides = self.optional_overrides()?;
            return Ok(TypeExpr::CollectionOf {
                cardinality: Cardinality::Range(expr, hi),
                schema,
                overrides,
            });
        }
        if self.eat(&TokenKind::Of) {
            let schema = self.expect_ident("as the collection schema")?;
            let overrides = self.optional_overrides()?;
            return Ok(TypeExpr::CollectionOf {
                cardinality: Cardinality::Exact(expr),
                schema,
                overrides,
            });
        }

        Ok(match expr {
            Expr::Literal(lit) => TypeExpr::Literal(lit),
            Expr::Ident(name) => TypeExpr::Named(name),
            other => TypeExpr::Expr(other),
        })
    }

    fn optional_overrides(&mut self) -> CompileResult<Vec<FieldOverride>> {
        if self.eat(&TokenKind::LBrace) {
            let overrides = self.field_overrides()?;
            self.expect(&TokenKind::RBrace, "to close the field overrides")?;
            Ok(overrides)
        } else {
            Ok(Vec::new())
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self) -> CompileResult<Expr> {
        self.ternary()
    }

    fn ternary(&mut self) -> CompileResult<Expr> {
        let cond = self.logical_or()?;
        // `?` opens a ternary only when an expression follows; a bare
        // trailing `?` is the nullable marker, owned by the field parser.
        if self.check(&TokenKind::Question) && self.ahead_starts_expr(1) {
            self.advance();
            let then_branch = self.expr()?;
            self.expect(&TokenKind::Colon, "between ternary branches")?;
            let else_branch = self.expr()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(cond)
    }

    fn logical_or(&mut self) -> CompileResult<Expr> {
        let mut left = self.logical_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.logical_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> CompileResult<Expr> {
        let mut left = self.logical_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.logical_not()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_not(&mut self) -> CompileResult<Expr> {
        if self.eat(&TokenKind::Not) {
            let operand = self.logical_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.equality()
    }

    fn equality(&mut self) -> CompileResult<Expr> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.comparison()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn comparison(&mut self) -> CompileResult<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn additive(&mut self) -> CompileResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> CompileResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> CompileResult<Expr> {
        if self.eat(&TokenKind::Minus) {
            let operand = self.unary()?;
            // Fold a negated literal directly, matching the lexer's
            // sign-free number tokens.
            return Ok(match operand {
                Expr::Literal(Literal::Int(v)) => Expr::Literal(Literal::Int(-v)),
                Expr::Literal(Literal::Decimal(v)) => Expr::Literal(Literal::Decimal(-v)),
                other => Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(other),
                },
            });
        }
        if self.eat(&TokenKind::Plus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Pos,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> CompileResult<Expr> {
        let mut expr = self.primary()?;
        while self.check(&TokenKind::Dot) {
            self.advance();
            let field = self.expect_ident("after '.'")?;
            if self.check(&TokenKind::LParen) {
                // A parenthesis after a dotted chain of plain identifiers is
                // a namespaced generator call: faker.person.firstName(...)
                let Some(mut parts) = ident_chain(&expr) else {
                    return Err(self.error_here(
                        "method-style calls are not supported; only dotted generator names may be called"
                            .to_string(),
                    ));
                };
                parts.push(field);
                let args = self.call_args()?;
                expr = Expr::Call {
                    name: DottedName::new(parts),
                    args,
                };
            } else {
                expr = Expr::Member {
                    object: Box::new(expr),
                    field,
                };
            }
        }
        Ok(expr)
    }

    fn call_args(&mut self) -> CompileResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen, "to open the argument list")?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "to close the argument list")?;
        Ok(args)
    }

    fn primary(&mut self) -> CompileResult<Expr> {
        match self.peek().clone() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(v)))
            }
            TokenKind::Decimal(v) => {
                self.advance();
                Ok(Expr::Literal(Literal::Decimal(v)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen, "to close the parenthesized expression")?;
                Ok(inner)
            }
            TokenKind::Caret => {
                self.advance();
                let field = self.expect_ident("after '^'")?;
                Ok(Expr::ParentField(field))
            }
            TokenKind::Dot => {
                self.advance();
                let field = self.expect_ident("after '.'")?;
                Ok(Expr::ElementField(field))
            }
            TokenKind::Any => {
                self.advance();
                self.expect(&TokenKind::Of, "after 'any'")?;
                let collection = self.expect_ident("as the referenced collection")?;
                let filter = if self.eat(&TokenKind::Where) {
                    Some(Box::new(self.expr()?))
                } else {
                    None
                };
                Ok(Expr::AnyOf { collection, filter })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    let args = self.call_args()?;
                    Ok(Expr::Call {
                        name: DottedName::single(name),
                        args,
                    })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(self.error_here(format!(
                "expected an expression, found {}",
                other.describe()
            ))),
        }
    }
}

/// Flatten `a.b.c` member chains into identifier parts, when the chain is
/// made of plain identifiers only.
fn ident_chain(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::Ident(name) => Some(vec![name.clone()]),
        Expr::Member { object, field } => {
            let mut parts = ident_chain(object)?;
            parts.push(field.clone());
            Some(parts)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> Item {
        let program = parse(source).expect("parse");
        assert_eq!(program.items.len(), 1, "expected exactly one item");
        program.items.into_iter().next().expect("item")
    }

    #[test]
    fn empty_input_is_empty_program() {
        let program = parse("").expect("parse");
        assert!(program.is_empty());
        let (program, errors) = parse_with_recovery("");
        assert!(program.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn parse_simple_schema() {
        let Item::Schema(schema) = parse_one("schema X { id: unique int in 1..3 }") else {
            panic!("expected schema");
        };
        assert_eq!(schema.name, "X");
        assert_eq!(schema.fields.len(), 1);
        let field = &schema.fields[0];
        assert_eq!(field.name, "id");
        assert!(field.unique);
        assert!(matches!(
            field.ty,
            TypeExpr::Range {
                primitive: Primitive::Int,
                ..
            }
        ));
    }

    #[test]
    fn parse_weighted_superposition() {
        let Item::Schema(schema) = parse_one(r#"schema I { status: 0.9:"paid" | 0.1:"draft" }"#)
        else {
            panic!("expected schema");
        };
        let TypeExpr::Superposition(variants) = &schema.fields[0].ty else {
            panic!("expected superposition");
        };
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].weight, Some(0.9));
        assert_eq!(variants[1].weight, Some(0.1));
    }

    #[test]
    fn parse_mixed_superposition_with_null() {
        let Item::Let(binding) = parse_one(r#"let s = 0.5:"a" | "b" | null"#) else {
            panic!("expected let");
        };
        let TypeExpr::Superposition(variants) = &binding.ty else {
            panic!("expected superposition");
        };
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[1].weight, None);
        assert_eq!(variants[2].ty, TypeExpr::Literal(Literal::Null));
    }

    #[test]
    fn parse_collection_field_and_aggregate() {
        let source = "schema Inv { items: 3..5 of LI, total: sum(items.amount) }";
        let Item::Schema(schema) = parse_one(source) else {
            panic!("expected schema");
        };
        assert!(matches!(
            &schema.fields[0].ty,
            TypeExpr::CollectionOf {
                cardinality: Cardinality::Range(_, _),
                schema,
                ..
            } if schema == "LI"
        ));
        assert!(matches!(&schema.fields[1].ty, TypeExpr::Expr(Expr::Call { name, .. }) if name.head() == "sum"));
    }

    #[test]
    fn parse_ternary_vs_nullable() {
        // Ternary: `?` followed by an expression
        let Item::Schema(schema) =
            parse_one(r#"schema P { b: age < 18 ? "minor" : "adult" }"#)
        else {
            panic!("expected schema");
        };
        assert!(matches!(
            &schema.fields[0].ty,
            TypeExpr::Expr(Expr::Ternary { .. })
        ));

        // Nullable: trailing `?`
        let Item::Schema(schema) = parse_one("schema P { n: int in 1..5? }") else {
            panic!("expected schema");
        };
        assert!(schema.fields[0].nullable);
    }

    #[test]
    fn parse_when_guard() {
        let source = r#"schema C { type: "p"|"b", companyId: string when type == "b" }"#;
        let Item::Schema(schema) = parse_one(source) else {
            panic!("expected schema");
        };
        assert!(schema.fields[1].when.is_some());
    }

    #[test]
    fn parse_any_of_with_where() {
        let source = r#"schema O { customer: any of customers where .country == "US" }"#;
        let Item::Schema(schema) = parse_one(source) else {
            panic!("expected schema");
        };
        let TypeExpr::Expr(Expr::AnyOf { collection, filter }) = &schema.fields[0].ty else {
            panic!("expected any-of");
        };
        assert_eq!(collection, "customers");
        assert!(filter.is_some());
    }

    #[test]
    fn parse_dotted_generator_call() {
        let Item::Schema(schema) = parse_one("schema U { name: faker.person.firstName() }")
        else {
            panic!("expected schema");
        };
        let TypeExpr::Expr(Expr::Call { name, args }) = &schema.fields[0].ty else {
            panic!("expected call");
        };
        assert_eq!(name.to_string(), "faker.person.firstName");
        assert!(args.is_empty());
    }

    #[test]
    fn parse_dataset_with_validate() {
        let source = r#"
            dataset D {
                customers: 10 of Customer,
                orders: 2..4 of Order { region: "EU" },
                validate { count(orders) > 1, sum(orders.total) < 10000 }
            }
        "#;
        let Item::Dataset(dataset) = parse_one(source) else {
            panic!("expected dataset");
        };
        assert_eq!(dataset.collections.len(), 2);
        assert_eq!(dataset.validate.len(), 2);
        assert!(!dataset.violating);
        assert_eq!(dataset.collections[1].overrides.len(), 1);
    }

    #[test]
    fn parse_violating_dataset() {
        let Item::Dataset(dataset) = parse_one("dataset D violating { xs: 5 of X }") else {
            panic!("expected dataset");
        };
        assert!(dataset.violating);
    }

    #[test]
    fn parse_schema_with_assume_refine_then() {
        let source = r#"
            schema Order {
                total: decimal(2) in 1.0..100.0,
                assume total > 0,
                assume if total > 50 { total < 90 }
            }
            refine {
                if total > 80 { total: 80.0 }
            }
            then {
                total += 1
            }
        "#;
        let Item::Schema(schema) = parse_one(source) else {
            panic!("expected schema");
        };
        assert_eq!(schema.assumes.len(), 2);
        assert_eq!(schema.refine.len(), 1);
        assert_eq!(schema.then.len(), 1);
        assert_eq!(schema.then[0].op, AssignOp::Add);
    }

    #[test]
    fn parse_ordered_sequence() {
        let Item::Schema(schema) = parse_one(r#"schema X { tier: ["a", "b", "c"] }"#) else {
            panic!("expected schema");
        };
        let TypeExpr::OrderedSequence(items) = &schema.fields[0].ty else {
            panic!("expected ordered sequence");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn parse_parent_access() {
        let Item::Schema(schema) = parse_one("schema LI { currency: ^currency }") else {
            panic!("expected schema");
        };
        assert!(matches!(
            &schema.fields[0].ty,
            TypeExpr::Expr(Expr::ParentField(f)) if f == "currency"
        ));
    }

    #[test]
    fn parse_import_and_base() {
        let program = parse(
            r#"
            import common from "common.vague"
            schema User from common.BaseUser { email: string }
            "#,
        )
        .expect("parse");
        assert_eq!(program.imports().count(), 1);
        let schema = program.schemas().next().expect("schema");
        assert_eq!(
            schema.base.as_ref().map(ToString::to_string),
            Some("common.BaseUser".to_string())
        );
    }

    #[test]
    fn recovery_skips_to_next_statement() {
        let source = r#"
            schema Bad { id: }
            schema Good { id: int in 1..3 }
        "#;
        let (program, errors) = parse_with_recovery(source);
        assert_eq!(errors.len(), 1);
        assert_eq!(program.schemas().count(), 1);
        assert_eq!(program.schemas().next().expect("schema").name, "Good");
    }

    #[test]
    fn recovery_collects_multiple_errors() {
        let source = r#"
            schema A { x }
            dataset D { }}
            schema B { y: int }
        "#;
        let (program, errors) = parse_with_recovery(source);
        assert!(errors.len() >= 2);
        assert!(program.schemas().any(|s| s.name == "B"));
    }

    #[test]
    fn strict_parse_fails_fast() {
        assert!(parse("schema {").is_err());
    }

    #[test]
    fn error_carries_position() {
        let err = parse("schema X {\n  id int\n}").expect_err("should fail");
        let span = err.span().expect("span");
        assert_eq!(span.line, 2);
    }
}
