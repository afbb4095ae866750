//! # Vague
//!
//! A declarative DSL for generating structured synthetic test data. A
//! program declares record shapes (`schema`) and named collections of
//! records (`dataset`); compilation yields a JSON-shaped value mapping
//! every dataset collection to a list of generated records, driven by a
//! seeded deterministic PRNG.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Vague Source Code
//!     ↓
//! [Lexer]              → positioned token stream
//!     ↓
//! [Parser]             → AST (statement-level error recovery)
//!     ↓
//! [Binder]             → resolved schemas, lets, datasets
//!     ↓
//! [Dataset Driver]     → collections → records → fields (seeded PRNG)
//!     ├── field generator (ranges, superpositions, unique, any of, ...)
//!     ├── constraint engine (assume / validate, resample-with-retry)
//!     ├── then hooks + derived-field pass
//!     └── private-field stripping
//!     ↓
//! Output Value (JSON-shaped)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use vague::Compiler;
//!
//! let mut compiler = Compiler::new();
//! compiler.set_seed(42);
//!
//! let output = compiler.compile(r#"
//!     schema Invoice {
//!         number: unique int in 1000..9999,
//!         status: 0.9:"paid" | 0.1:"draft",
//!         amount: decimal(2) in 10.0..500.0
//!     }
//!     dataset Billing { invoices: 10 of Invoice }
//! "#)?;
//!
//! let json = output.to_json();
//! assert_eq!(json["invoices"].as_array().map(Vec::len), Some(10));
//!
//! // Non-fatal diagnostics live in the warning collector.
//! assert!(!compiler.warnings().has_any());
//! # Ok::<(), vague::VagueError>(())
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `lexer` | Source text → tokens |
//! | `parser` | Tokens → AST, with recovery |
//! | `ast` | AST node types |
//! | `binder` | Name resolution & import merging |
//! | `value` | Runtime value model |
//! | `eval` | Expression evaluation & builtins |
//! | `generator` | Field/record generation |
//! | `constraints` | assume / validate enforcement |
//! | `dataset` | Dataset orchestration & emission |
//! | `plugin` | Generator plugin contract |
//! | `rng` | Seeded PRNG primitives |
//! | `config` | Retry budgets & seed configuration |
//! | `import` | External spec loading |

// Language front end
pub mod ast;
pub mod lexer;
pub mod parser;

// Semantic analysis
pub mod binder;
pub mod import;

// Evaluation & generation
pub mod constraints;
pub mod dataset;
pub mod eval;
pub mod generator;
pub mod plugin;
pub mod rng;
pub mod value;

// Diagnostics & configuration
pub mod config;
pub mod error;
pub mod warnings;

// Facade
pub mod compiler;

// Re-export the public surface
pub use compiler::{compile, Compiler};
pub use config::CompileConfig;
pub use error::{CompileResult, Span, VagueError};
pub use import::{FileSpecLoader, ImportedModule, SpecLoader};
pub use plugin::{Plugin, PluginContext, PluginRegistry};
pub use value::{CalendarDuration, Record, RecordRef, Value};
pub use warnings::{Warning, WarningCollector, WarningKind};
