//! Library loading tests: declaration files and custom sources.

use std::sync::Arc;

use termgraph::bridge::host_fn1;
use termgraph::{
    CodeUnit, DeclarationSource, KernelBuilder, KernelError, LibrarySource, StandardLibrary,
    Value,
};

const UNITS: &str = "\
-- temperature conversions
type Celsius
fn to_celsius(float) -> Celsius
fn freezing() -> Celsius
";

fn builder() -> KernelBuilder {
    let _ = env_logger::builder().is_test(true).try_init();
    KernelBuilder::new().unwrap()
}

#[test]
fn declarations_create_types_and_functions() {
    let mut builder = builder();
    builder
        .load_library(&DeclarationSource::new("units", UNITS))
        .unwrap();

    let celsius = builder.get_named_term("Celsius").unwrap();
    let convert = builder.get_named_term("to_celsius").unwrap();
    let function = builder.unit().function_value(convert).unwrap();
    assert_eq!(function.inputs, vec![builder.terms().float]);
    assert_eq!(function.output, Some(celsius));
    assert!(!function.is_installed());

    let freezing = builder.unit().function_value(builder.get_named_term("freezing").unwrap()).unwrap();
    assert!(freezing.inputs.is_empty());
}

#[test]
fn installed_declarations_evaluate() {
    let mut builder = builder();
    builder
        .load_library(&DeclarationSource::new("units", UNITS))
        .unwrap();
    builder
        .install_func("to_celsius", host_fn1(|f: f64| (f - 32.0) * 5.0 / 9.0))
        .unwrap();
    let kernel = Arc::new(builder.build());
    assert_eq!(kernel.libraries(), ["units".to_string()]);

    let mut unit = CodeUnit::new(kernel);
    let boiling = unit.wrap(None, 212.0_f64).unwrap();
    let converted = unit.apply("to_celsius", &[boiling], None).unwrap();
    assert_eq!(unit.evaluate(converted).unwrap(), Value::float(100.0));
}

#[test]
fn unknown_types_fail_the_load() {
    let mut builder = builder();
    let source = DeclarationSource::new("bad", "fn broken(nope) -> int\n");

    let err = builder.load_library(&source).unwrap_err();
    assert!(matches!(&err, KernelError::LibraryLoad { library, .. } if library == "bad"));
    let message = format!("{:#}", anyhow::Error::from(err));
    assert!(message.contains("broken"), "{message}");
    assert!(message.contains("nope"), "{message}");
    assert!(builder.libraries().is_empty());
}

#[test]
fn malformed_lines_fail_the_load() {
    let mut builder = builder();
    let source = DeclarationSource::new("typo", "type Point\nfn move(Point -> Point\n");

    let err = builder.load_library(&source).unwrap_err();
    let message = format!("{:#}", anyhow::Error::from(err));
    assert!(message.contains("typo:2"), "{message}");
}

#[test]
fn names_cannot_be_declared_twice() {
    let mut builder = builder();
    builder.load_library(&StandardLibrary).unwrap();

    let err = builder
        .load_library(&DeclarationSource::new("clash", "fn add(int, int) -> int\n"))
        .unwrap_err();
    assert!(matches!(err, KernelError::LibraryLoad { .. }));
}

#[test]
fn declaration_files_load_from_disk() {
    let path = std::env::temp_dir().join(format!("termgraph-units-{}.decl", std::process::id()));
    std::fs::write(&path, UNITS).unwrap();

    let source = DeclarationSource::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(source.name().starts_with("termgraph-units"));
    assert_eq!(source.declarations().unwrap().len(), 3);
}
