//! Subroutine tests: definition, invocation, state and block scoping.

use termgraph::{
    CodeUnit, Kernel, KernelBuilder, KernelConfig, KernelError, StandardLibrary,
    StructuralError, SubroutineBuilder, SubroutineState, TermId, Value,
};

fn unit() -> CodeUnit {
    let _ = env_logger::builder().is_test(true).try_init();
    CodeUnit::new(Kernel::shared().unwrap())
}

fn define_add_one(unit: &mut CodeUnit) -> TermId {
    let int = unit.kernel_terms().unwrap().int;
    let mut builder = SubroutineBuilder::new(unit, "add_one").unwrap();
    builder.add_input("x", int).unwrap();
    builder.wrap(Some("one"), 1_i64).unwrap();
    builder.call("add", &["x", "one"], Some("result")).unwrap();
    builder.set_result("result").unwrap();
    builder.finish().unwrap()
}

fn define_counter(unit: &mut CodeUnit, name: &str, stateful: bool) -> TermId {
    let int = unit.kernel_terms().unwrap().int;
    let mut builder = SubroutineBuilder::new(unit, name).unwrap();
    builder.set_stateful(stateful);
    builder.add_input("step", int).unwrap();
    builder.call("accumulate", &["step"], Some("total")).unwrap();
    builder.finish().unwrap()
}

#[test]
fn add_one() {
    let mut unit = unit();
    let add_one = define_add_one(&mut unit);

    assert_eq!(unit.invoke(add_one, &[Value::Int(5)]).unwrap(), Value::Int(6));
    assert_eq!(unit.invoke(add_one, &[Value::Int(10)]).unwrap(), Value::Int(11));
}

#[test]
fn definition_fills_the_signature() {
    let mut unit = unit();
    let int = unit.kernel_terms().unwrap().int;
    let add_one = define_add_one(&mut unit);

    let function = unit.function_value(add_one).unwrap();
    assert_eq!(function.inputs, vec![int]);
    assert_eq!(function.output, Some(int));
    assert!(!function.stateful);

    let subroutine = unit.term(add_one).unwrap().subroutine.as_deref().unwrap();
    assert_eq!(subroutine.state, SubroutineState::Invocable);
    assert_eq!(subroutine.placeholders.len(), 1);
}

#[test]
fn body_names_stay_local() {
    let mut unit = unit();
    define_add_one(&mut unit);

    assert!(unit.get_named_term("add_one").is_ok());
    for local in ["x", "one", "result"] {
        assert!(matches!(
            unit.get_named_term(local),
            Err(KernelError::NameNotFound(_))
        ));
    }
}

#[test]
fn call_sites_evaluate_like_any_term() {
    let mut unit = unit();
    let add_one = define_add_one(&mut unit);
    let five = unit.wrap(None, 5_i64).unwrap();
    let six = unit.create_term(add_one, &[five], Some("six")).unwrap();
    let seven = unit.create_term(add_one, &[six], None).unwrap();

    assert_eq!(unit.evaluate(seven).unwrap(), Value::Int(7));
    assert_eq!(unit.evaluate(six).unwrap(), Value::Int(6));
}

/// `add_g(x) = x + g`, with `g` defined in the unit.
fn define_add_g(unit: &mut CodeUnit) -> (TermId, TermId) {
    let int = unit.kernel_terms().unwrap().int;
    let g = unit.wrap(Some("g"), 10_i64).unwrap();
    let mut builder = SubroutineBuilder::new(unit, "add_g").unwrap();
    builder.add_input("x", int).unwrap();
    builder.call("add", &["x", "g"], None).unwrap();
    (g, builder.finish().unwrap())
}

#[test]
fn call_sites_see_changes_to_captured_terms() {
    let mut unit = unit();
    let (g, add_g) = define_add_g(&mut unit);
    let five = unit.wrap(None, 5_i64).unwrap();
    let call = unit.create_term(add_g, &[five], None).unwrap();
    assert_eq!(unit.evaluate(call).unwrap(), Value::Int(15));

    unit.feedback(g, Value::Int(100)).unwrap();
    assert!(unit.term(call).unwrap().is_dirty());
    assert_eq!(unit.evaluate(call).unwrap(), Value::Int(105));
}

#[test]
fn captures_reach_through_nested_subroutines() {
    let mut unit = unit();
    let int = unit.kernel_terms().unwrap().int;
    let (g, _) = define_add_g(&mut unit);

    let mut builder = SubroutineBuilder::new(&mut unit, "twice").unwrap();
    builder.add_input("x", int).unwrap();
    builder.call("add_g", &["x"], Some("once")).unwrap();
    builder.call("add_g", &["once"], None).unwrap();
    let twice = builder.finish().unwrap();

    let one = unit.wrap(None, 1_i64).unwrap();
    let call = unit.create_term(twice, &[one], None).unwrap();
    assert_eq!(unit.evaluate(call).unwrap(), Value::Int(21));

    unit.feedback(g, Value::Int(100)).unwrap();
    assert_eq!(unit.evaluate(call).unwrap(), Value::Int(201));
}

#[test]
fn arguments_must_fit_placeholder_types() {
    let mut unit = unit();
    let int = unit.kernel_terms().unwrap().int;
    let mut builder = SubroutineBuilder::new(&mut unit, "show").unwrap();
    builder.add_input("x", int).unwrap();
    builder.call("to_string", &["x"], None).unwrap();
    let show = builder.finish().unwrap();

    assert!(matches!(
        unit.invoke(show, &[Value::text("not an int")]),
        Err(KernelError::Structural(StructuralError::ValueType { .. }))
    ));
    assert_eq!(unit.invoke(show, &[Value::Int(4)]).unwrap(), Value::text("4"));
}

#[test]
fn state_resets_between_invocations() {
    let mut unit = unit();
    let counter = define_counter(&mut unit, "counter", false);

    assert_eq!(unit.invoke(counter, &[Value::Int(1)]).unwrap(), Value::Int(1));
    assert_eq!(unit.invoke(counter, &[Value::Int(1)]).unwrap(), Value::Int(1));
}

#[test]
fn stateful_subroutines_keep_state() {
    let mut unit = unit();
    let counter = define_counter(&mut unit, "running", true);
    assert!(unit.function_value(counter).unwrap().stateful);

    assert_eq!(unit.invoke(counter, &[Value::Int(1)]).unwrap(), Value::Int(1));
    assert_eq!(unit.invoke(counter, &[Value::Int(1)]).unwrap(), Value::Int(2));
    assert_eq!(unit.invoke(counter, &[Value::Int(3)]).unwrap(), Value::Int(5));
}

#[test]
fn nested_blocks_shadow_and_hide_names() {
    let mut unit = unit();
    let int = unit.kernel_terms().unwrap().int;
    let mut builder = SubroutineBuilder::new(&mut unit, "scoped").unwrap();
    builder.add_input("x", int).unwrap();
    builder.wrap(Some("ten"), 10_i64).unwrap();

    builder.enter_block();
    builder.wrap(Some("ten"), 20_i64).unwrap();
    let inner = builder.call("add", &["x", "ten"], Some("inner")).unwrap();
    assert_eq!(builder.lookup("inner").unwrap(), inner);
    builder.exit_block().unwrap();

    assert!(matches!(
        builder.lookup("inner"),
        Err(KernelError::NameNotFound(_))
    ));
    // Same block, same name
    assert!(matches!(
        builder.wrap(Some("ten"), 30_i64),
        Err(KernelError::DuplicateName(_))
    ));
    builder.call("add", &["x", "ten"], Some("outer")).unwrap();
    let scoped = builder.finish().unwrap();

    assert_eq!(unit.invoke(scoped, &[Value::Int(1)]).unwrap(), Value::Int(11));
    assert_eq!(unit.term(inner).unwrap().value, Some(Value::Int(21)));
}

#[test]
fn blocks_must_be_balanced() {
    let mut unit = unit();
    let mut builder = SubroutineBuilder::new(&mut unit, "unbalanced").unwrap();
    assert!(matches!(
        builder.exit_block(),
        Err(KernelError::Structural(StructuralError::NotInvocable { .. }))
    ));

    builder.enter_block();
    builder.wrap(Some("one"), 1_i64).unwrap();
    assert!(matches!(
        builder.finish(),
        Err(KernelError::Structural(StructuralError::NotInvocable { .. }))
    ));
}

#[test]
fn unknown_names_fail_at_definition() {
    let mut unit = unit();
    let int = unit.kernel_terms().unwrap().int;
    let mut builder = SubroutineBuilder::new(&mut unit, "broken").unwrap();
    builder.add_input("x", int).unwrap();
    assert!(matches!(
        builder.call("add", &["x", "missing"], None),
        Err(KernelError::NameNotFound(name)) if name == "missing"
    ));
    assert!(matches!(
        builder.add_input("x", int),
        Err(KernelError::DuplicateName(_))
    ));
}

#[test]
fn unbound_placeholders_cannot_evaluate() {
    let mut unit = unit();
    let int = unit.kernel_terms().unwrap().int;
    let mut builder = SubroutineBuilder::new(&mut unit, "double").unwrap();
    let x = builder.add_input("x", int).unwrap();
    let body = builder.call("add", &["x", "x"], None).unwrap();
    builder.finish().unwrap();

    assert!(matches!(
        unit.evaluate(body),
        Err(KernelError::Structural(StructuralError::Unbound(id))) if id == x
    ));
}

#[test]
fn invocation_checks_arguments_and_target() {
    let mut unit = unit();
    let add_one = define_add_one(&mut unit);
    let five = unit.wrap(None, 5_i64).unwrap();

    assert!(matches!(
        unit.invoke(add_one, &[]),
        Err(KernelError::Structural(StructuralError::Arity {
            expected: 1,
            found: 0,
            ..
        }))
    ));
    assert!(matches!(
        unit.invoke(five, &[]),
        Err(KernelError::Structural(StructuralError::NotSubroutine(id))) if id == five
    ));
}

#[test]
fn recursion_is_rejected() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = KernelConfig {
        check_input_types: false,
        ..KernelConfig::default()
    };
    let mut unit = CodeUnit::with_config(Kernel::shared().unwrap(), config);
    let int = unit.kernel_terms().unwrap().int;

    let mut builder = SubroutineBuilder::new(&mut unit, "forever").unwrap();
    builder.add_input("n", int).unwrap();
    builder.call("forever", &["n"], Some("again")).unwrap();
    let forever = builder.finish().unwrap();

    for _ in 0..2 {
        assert!(matches!(
            unit.invoke(forever, &[Value::Int(1)]),
            Err(KernelError::Structural(StructuralError::Reentrant(id))) if id == forever
        ));
    }
}

#[test]
fn kernel_subroutines_are_not_invocable() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut builder = KernelBuilder::new().unwrap();
    builder.load_library(&StandardLibrary).unwrap();
    let int = builder.terms().int;

    let mut definition = SubroutineBuilder::new(builder.unit_mut(), "double").unwrap();
    definition.add_input("x", int).unwrap();
    definition.call("add", &["x", "x"], None).unwrap();
    let double = definition.finish().unwrap();
    let kernel = std::sync::Arc::new(builder.build());

    let mut unit = CodeUnit::new(kernel);
    assert!(matches!(
        unit.invoke(double, &[Value::Int(2)]),
        Err(KernelError::Structural(StructuralError::NotInvocable { subroutine, .. }))
            if subroutine == double
    ));
}
