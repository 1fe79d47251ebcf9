//! Snapshot tests: capturing a unit for inspection.

use termgraph::snapshot::SerializedValue;
use termgraph::{CodeUnit, Kernel, UnitSnapshot};

#[test]
fn snapshot_lists_the_unit() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut unit = CodeUnit::new(Kernel::shared().unwrap());
    let a = unit.wrap(Some("a"), 3_i64).unwrap();
    let b = unit.wrap(Some("b"), 4_i64).unwrap();
    let sum = unit.apply("add", &[a, b], Some("sum")).unwrap();
    unit.evaluate(sum).unwrap();

    let snapshot = UnitSnapshot::capture(&unit);
    assert_eq!(snapshot.version, UnitSnapshot::VERSION);
    assert_eq!(snapshot.unit, unit.id());
    // Only the unit's own terms, not the kernel's
    assert_eq!(snapshot.terms.len(), unit.len());

    let term = snapshot.term(sum).unwrap();
    assert_eq!(term.function_name.as_deref(), Some("add"));
    assert_eq!(term.inputs, vec![a, b]);
    assert_eq!(term.value, Some(SerializedValue::Int(7)));
    assert!(!term.dirty);

    assert_eq!(
        snapshot.term(a).unwrap().function_name.as_deref(),
        Some("const-int")
    );

    let listing = snapshot.listing();
    assert!(
        listing.contains(&format!("{sum} sum = add({a}, {b}) -> Int(7)")),
        "{listing}"
    );
}

#[test]
fn listing_has_a_line_per_term() {
    let mut unit = CodeUnit::new(Kernel::shared().unwrap());
    let a = unit.wrap(None, 3_i64).unwrap();
    let sum = unit.apply("add", &[a, a], None).unwrap();

    let listing = UnitSnapshot::capture(&unit).listing();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), unit.len());
    // Unnamed and not yet evaluated
    assert!(lines.contains(&format!("{sum} = add({a}, {a})").as_str()), "{listing}");
    assert!(listing.ends_with('\n'));
}

#[test]
fn snapshot_survives_json() {
    let mut unit = CodeUnit::new(Kernel::shared().unwrap());
    let step = unit.wrap(None, 2_i64).unwrap();
    let total = unit.apply("accumulate", &[step], Some("total")).unwrap();
    unit.evaluate(total).unwrap();
    unit.evaluate(total).unwrap();

    let json = UnitSnapshot::capture(&unit).to_json().unwrap();
    let restored = UnitSnapshot::from_json(&json).unwrap();

    let term = restored.term(total).unwrap();
    assert_eq!(term.name.as_deref(), Some("total"));
    assert_eq!(term.state, Some(SerializedValue::Int(4)));
    assert_eq!(restored.terms.len(), 2);
}
