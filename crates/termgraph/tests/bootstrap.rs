//! Bootstrap tests: the Function/Type fixed point and the kernel built on it.

use std::sync::Arc;
use termgraph::{Bootstrap, BootstrapStep, CodeUnit, Kernel, KernelConfig, KernelError, Value};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn type_is_its_own_type() {
    init_logging();
    let kernel = Kernel::standard().unwrap();
    let terms = kernel.terms();

    let ty = kernel.unit().term(terms.type_type).unwrap();
    assert_eq!(ty.ty, Some(terms.type_type));
    assert_eq!(ty.name.as_deref(), Some("Type"));

    let function = kernel.unit().term(terms.function_type).unwrap();
    assert_eq!(function.ty, Some(terms.type_type));
}

#[test]
fn generator_is_bound_to_itself() {
    let kernel = Kernel::standard().unwrap();
    let terms = kernel.terms();
    let unit = kernel.unit();

    let generator = unit.term(terms.constant_generator).unwrap();
    assert_eq!(generator.function, terms.constant_generator);

    let signature = unit.function_value(terms.constant_generator).unwrap();
    assert_eq!(signature.inputs, vec![terms.type_type]);
    assert_eq!(signature.output, Some(terms.function_type));

    let constant_type = unit.function_value(terms.constant_type).unwrap();
    assert_eq!(constant_type.output, Some(terms.type_type));
    assert_eq!(unit.term(terms.constant_type).unwrap().function, terms.constant_generator);
}

#[test]
fn every_kernel_term_resolves() {
    let kernel = Kernel::standard().unwrap();
    let unit = kernel.unit();

    for term in unit.all_terms() {
        assert!(
            unit.function_value(term.function).is_ok(),
            "{} has an unresolved function reference",
            term.display_name()
        );
        let ty = term.ty.unwrap_or_else(|| panic!("{} has no type", term.display_name()));
        assert!(unit.term(ty).unwrap().value.as_ref().unwrap().as_type().is_some());
    }
}

#[test]
fn kernel_ids_strictly_increase() {
    let kernel = Kernel::standard().unwrap();
    let ids: Vec<_> = kernel.unit().all_terms().map(|term| term.id).collect();

    assert_eq!(ids[0].raw(), 1);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn primitive_types_exist() {
    let kernel = Kernel::standard().unwrap();
    for name in ["any", "void", "int", "float", "text", "bool", "Subroutine", "Ref", "List"] {
        let id = kernel.get_named_term(name).unwrap();
        let value = kernel.unit().term(id).unwrap().value.clone().unwrap();
        assert_eq!(value.as_type().unwrap().name.as_ref(), name);
    }

    let yes = kernel.get_named_term("true").unwrap();
    assert_eq!(kernel.unit().term(yes).unwrap().value, Some(Value::Bool(true)));
}

#[test]
fn shared_kernel_bootstraps_once() {
    let first = Kernel::shared().unwrap();
    let second = Kernel::shared().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.libraries(), ["standard".to_string()]);
    assert!(first.types().is_frozen());
}

#[test]
fn manual_steps_must_follow_the_fixed_point_order() {
    let mut bootstrap = Bootstrap::new(KernelConfig::default());
    bootstrap.constant_generator().unwrap();
    bootstrap.constant_type().unwrap();

    let err = bootstrap.function_type().unwrap_err();
    assert!(matches!(
        err,
        KernelError::BootstrapOrder {
            attempted: BootstrapStep::FunctionType,
            expected: BootstrapStep::TypeType,
        }
    ));

    bootstrap.type_type().unwrap();
    bootstrap.backfill().unwrap();
    bootstrap.function_type().unwrap();
    let (unit, fixed) = bootstrap.finish().unwrap();
    assert_eq!(unit.term(fixed.type_type).unwrap().ty, Some(fixed.type_type));
}

#[test]
fn units_inherit_kernel_config() {
    let config = KernelConfig {
        max_eval_depth: 16,
        ..KernelConfig::default()
    };
    let kernel = Kernel::with_config(config.clone()).unwrap();
    let unit = CodeUnit::new(kernel);
    assert_eq!(unit.config(), &config);
}
