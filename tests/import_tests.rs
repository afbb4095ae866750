//! Import & Schema Inheritance Tests
//!
//! Exercises the `SpecLoader` contract end to end: `.vague` files on disk
//! through `FileSpecLoader`, base-field merging, override semantics, and
//! the `UnknownFieldInImportedSchema` warning.

use anyhow::Result;
use std::io::Write;
use vague::{Compiler, FileSpecLoader, Value, WarningKind};

fn write_spec(dir: &tempfile::TempDir, name: &str, contents: &str) -> Result<()> {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(path)?;
    write!(file, "{contents}")?;
    Ok(())
}

#[test]
fn schema_inherits_fields_from_imported_base() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_spec(
        &dir,
        "common.vague",
        "schema BaseUser { id: unique int in 1..10000, name: string, active: boolean }",
    )?;

    let mut compiler = Compiler::new().with_loader(FileSpecLoader::new(dir.path()));
    compiler.set_seed(9);
    let output = compiler.compile(
        r#"
        import common from "common.vague"
        schema User from common.BaseUser { active: true }
        dataset D { users: 5 of User }
        "#,
    )?;

    let Value::Record(map) = &output else {
        panic!("record output");
    };
    let Value::List(users) = &map["users"] else {
        panic!("list of users");
    };
    assert_eq!(users.len(), 5);
    for user in users {
        let Value::Record(user) = user else {
            panic!("record");
        };
        // Base order preserved: id, name, active.
        let keys: Vec<&String> = user.keys().collect();
        assert_eq!(keys, vec!["id", "name", "active"]);
        // Local override wins.
        assert_eq!(user["active"], Value::Bool(true));
    }
    assert!(!compiler.warnings().has_any());
    Ok(())
}

#[test]
fn local_field_missing_from_base_warns_but_compiles() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_spec(&dir, "common.vague", "schema Base { id: int in 1..100 }")?;

    let mut compiler = Compiler::new().with_loader(FileSpecLoader::new(dir.path()));
    compiler.set_seed(2);
    let output = compiler.compile(
        r#"
        import common from "common.vague"
        schema User from common.Base { email: string }
        dataset D { users: 2 of User }
        "#,
    )?;

    let warnings = compiler
        .warnings()
        .get_by_kind(WarningKind::UnknownFieldInImportedSchema);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].schema.as_deref(), Some("User"));
    assert_eq!(warnings[0].field.as_deref(), Some("email"));

    // The extra field still generates.
    let Value::Record(map) = &output else {
        panic!("record output");
    };
    let Value::List(users) = &map["users"] else {
        panic!("list");
    };
    for user in users {
        let Value::Record(user) = user else { panic!("record") };
        assert!(user.contains_key("email"));
    }
    Ok(())
}

#[test]
fn missing_import_file_is_a_bind_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut compiler = Compiler::new().with_loader(FileSpecLoader::new(dir.path()));
    let err = compiler
        .compile(
            r#"
            import common from "nope.vague"
            schema User from common.Base { id: int in 1..3 }
            dataset D { users: 1 of User }
            "#,
        )
        .expect_err("missing spec file must fail");
    assert!(err.to_string().contains("cannot load import"));
}

#[test]
fn unknown_type_in_import_is_a_bind_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_spec(&dir, "common.vague", "schema Base { id: int in 1..100 }")?;

    let mut compiler = Compiler::new().with_loader(FileSpecLoader::new(dir.path()));
    let err = compiler
        .compile(
            r#"
            import common from "common.vague"
            schema User from common.Missing { id: int in 1..3 }
            dataset D { users: 1 of User }
            "#,
        )
        .expect_err("unknown base type must fail");
    assert!(err.to_string().contains("no schema named 'Missing'"));
    Ok(())
}

#[test]
fn imports_are_unused_without_a_base_reference() {
    // An import that no schema uses never touches the loader.
    let mut compiler = Compiler::new().with_loader(FileSpecLoader::new("/nonexistent"));
    compiler.set_seed(1);
    compiler
        .compile(
            r#"
            import ghost from "ghost.vague"
            schema X { id: int in 1..3 }
            dataset D { xs: 1 of X }
            "#,
        )
        .expect("unused imports are not loaded");
}
