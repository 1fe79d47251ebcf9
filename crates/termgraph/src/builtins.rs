//! Standard library: declarations plus host behaviors.

use anyhow::{Context, anyhow, bail};

use crate::bridge::{host_fn1, host_fn2, host_fn_values, try_host_fn2};
use crate::context::TermContext;
use crate::error::{KernelError, Result, StructuralError};
use crate::function::HostBehavior;
use crate::kernel::KernelBuilder;
use crate::library::{DeclarationSource, LibrarySource};
use crate::value::Value;

pub const STANDARD_DECLARATIONS: &str = "\
-- int arithmetic
fn add(int, int) -> int
fn sub(int, int) -> int
fn mult(int, int) -> int

-- float arithmetic
fn add_f(float, float) -> float
fn sub_f(float, float) -> float
fn mult_f(float, float) -> float
fn div_f(float, float) -> float

-- comparison and logic
fn less_than(int, int) -> bool
fn equals(any, any) -> bool
fn not(bool) -> bool
fn and(bool, bool) -> bool
fn or(bool, bool) -> bool

-- text and types
fn concat(text, text) -> text
fn to_string(any) -> text
fn typeof(any) -> Type
fn if_expr(bool, any, any) -> any

-- lists
fn list(any...) -> List
fn length(List) -> int
fn get_index(List, int) -> any
fn set_index(List, int, any) -> List

-- effects and state
fn print(any)
stateful fn variable(any) -> any
stateful fn accumulate(int) -> int
";

/// Declares and installs the standard functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLibrary;

impl LibrarySource for StandardLibrary {
    fn name(&self) -> &str {
        "standard"
    }

    fn populate(&self, builder: &mut KernelBuilder) -> anyhow::Result<()> {
        DeclarationSource::new("standard", STANDARD_DECLARATIONS).populate(builder)?;
        install_standard(builder).context("installing standard behaviors")?;
        Ok(())
    }
}

pub fn install_standard(builder: &mut KernelBuilder) -> Result<()> {
    builder.install_func("add", add())?;
    builder.install_func("sub", sub())?;
    builder.install_func("mult", checked_int(i64::checked_mul, "*"))?;

    builder.install_func("add_f", host_fn2(|a: f64, b: f64| a + b))?;
    builder.install_func("sub_f", host_fn2(|a: f64, b: f64| a - b))?;
    builder.install_func("mult_f", host_fn2(|a: f64, b: f64| a * b))?;
    builder.install_func(
        "div_f",
        try_host_fn2(|a: f64, b: f64| {
            if b == 0.0 {
                bail!("division by zero");
            }
            Ok(a / b)
        }),
    )?;

    builder.install_func("less_than", host_fn2(|a: i64, b: i64| a < b))?;
    builder.install_func(
        "equals",
        host_fn_values(|inputs| Ok(Value::Bool(arg(inputs, 0)? == arg(inputs, 1)?))),
    )?;
    builder.install_func("not", host_fn1(|a: bool| !a))?;
    builder.install_func("and", host_fn2(|a: bool, b: bool| a && b))?;
    builder.install_func("or", host_fn2(|a: bool, b: bool| a || b))?;

    builder.install_func("concat", host_fn2(|a: String, b: String| a + &b))?;
    builder.install_func(
        "to_string",
        host_fn_values(|inputs| Ok(Value::text(arg(inputs, 0)?.to_string()))),
    )?;
    builder.install_func("typeof", type_of())?;
    builder.install_func(
        "if_expr",
        host_fn_values(|inputs| match arg(inputs, 0)? {
            Value::Bool(true) => Ok(arg(inputs, 1)?.clone()),
            Value::Bool(false) => Ok(arg(inputs, 2)?.clone()),
            other => bail!("condition is {}, expected bool", other.kind_name()),
        }),
    )?;

    builder.install_func(
        "list",
        host_fn_values(|inputs| Ok(Value::list(inputs.iter().cloned()))),
    )?;
    builder.install_func(
        "length",
        host_fn_values(|inputs| {
            let list = arg(inputs, 0)?;
            let items = list
                .as_list()
                .ok_or_else(|| anyhow!("expected a List, got {}", list.kind_name()))?;
            Ok(Value::Int(items.len() as i64))
        }),
    )?;

    builder.install_func(
        "get_index",
        host_fn_values(|inputs| {
            let (items, index) = list_index(inputs)?;
            Ok(items[index].clone())
        }),
    )?;
    // Lists are values: the result is a modified copy
    builder.install_func(
        "set_index",
        host_fn_values(|inputs| {
            let (items, index) = list_index(inputs)?;
            let mut items = items.to_vec();
            items[index] = arg(inputs, 2)?.clone();
            Ok(Value::list(items))
        }),
    )?;

    builder.install_func("print", print())?;
    builder.install_func("variable", variable())?;
    builder.install_func("accumulate", accumulate())?;
    Ok(())
}

fn arg(inputs: &[Value], index: usize) -> anyhow::Result<&Value> {
    inputs
        .get(index)
        .ok_or_else(|| anyhow!("missing input {index}"))
}

/// The list in input 0 and a checked position from input 1.
fn list_index(inputs: &[Value]) -> anyhow::Result<(&[Value], usize)> {
    let list = arg(inputs, 0)?;
    let items = list
        .as_list()
        .ok_or_else(|| anyhow!("expected a List, got {}", list.kind_name()))?;
    let index = arg(inputs, 1)?;
    let index = index
        .as_int()
        .ok_or_else(|| anyhow!("index is {}, expected int", index.kind_name()))?;
    if index < 0 {
        bail!("negative index: {index}");
    }
    match usize::try_from(index) {
        Ok(position) if position < items.len() => Ok((items, position)),
        _ => bail!("index out of range: {index} (length {})", items.len()),
    }
}

fn int_input(ctx: &TermContext<'_>, index: usize) -> anyhow::Result<i64> {
    let value = ctx.input(index)?;
    value
        .as_int()
        .ok_or_else(|| anyhow!("input {index} is {}, expected int", value.kind_name()))
}

/// Input `index` brought up to date and read as an int.
fn evaluated_int(ctx: &mut TermContext<'_>, index: usize) -> Result<i64> {
    let value = ctx.evaluated_input(index)?;
    value.as_int().ok_or_else(|| {
        feedback_failed(
            ctx,
            anyhow!("input {index} is {}, expected int", value.kind_name()),
        )
    })
}

fn desired_int(desired: &Value) -> Result<i64> {
    desired.as_int().ok_or_else(|| {
        StructuralError::ValueType {
            expected: "int".to_string(),
            found: desired.kind_name(),
        }
        .into()
    })
}

/// Feedback moves the first operand: `a = desired - b`.
fn add() -> HostBehavior {
    checked_int(i64::checked_add, "+").with_feedback(|ctx, desired| {
        let desired = desired_int(&desired)?;
        let b = evaluated_int(ctx, 1)?;
        let a = desired
            .checked_sub(b)
            .ok_or_else(|| feedback_failed(ctx, anyhow!("integer overflow in {desired} - {b}")))?;
        ctx.feedback_input(0, Value::Int(a))
    })
}

/// Feedback moves the first operand: `a = desired + b`.
fn sub() -> HostBehavior {
    checked_int(i64::checked_sub, "-").with_feedback(|ctx, desired| {
        let desired = desired_int(&desired)?;
        let b = evaluated_int(ctx, 1)?;
        let a = desired
            .checked_add(b)
            .ok_or_else(|| feedback_failed(ctx, anyhow!("integer overflow in {desired} + {b}")))?;
        ctx.feedback_input(0, Value::Int(a))
    })
}

/// Integer operation that fails on overflow instead of wrapping.
fn checked_int(op: fn(i64, i64) -> Option<i64>, symbol: &'static str) -> HostBehavior {
    try_host_fn2(move |a: i64, b: i64| {
        op(a, b).ok_or_else(|| anyhow!("integer overflow in {a} {symbol} {b}"))
    })
}

fn feedback_failed(ctx: &TermContext<'_>, source: anyhow::Error) -> KernelError {
    let function = ctx
        .unit()
        .function_of(ctx.term())
        .map(|function| function.name.clone())
        .unwrap_or_default();
    KernelError::Evaluation {
        term: ctx.term(),
        function,
        source,
    }
}

fn type_of() -> HostBehavior {
    HostBehavior::new(|ctx| {
        let ty = ctx
            .input_type(0)?
            .ok_or_else(|| anyhow!("input has no type"))?;
        let value = ctx
            .unit()
            .term(ty)?
            .value
            .clone()
            .ok_or_else(|| anyhow!("type {ty} has no value"))?;
        ctx.set_output(value)?;
        Ok(())
    })
}

fn print() -> HostBehavior {
    HostBehavior::new(|ctx| {
        let value = ctx.input(0)?;
        log::info!(target: "termgraph::print", "{value}");
        ctx.set_output(Value::Null)?;
        Ok(())
    })
}

/// Holds a value in state. Starts from its input; feedback overwrites it.
fn variable() -> HostBehavior {
    HostBehavior::new(|ctx| {
        let state = ctx.state().cloned().unwrap_or(Value::Null);
        ctx.set_output(state)?;
        Ok(())
    })
    .with_init(|ctx| Ok(ctx.input(0)?.clone()))
    .with_feedback(|ctx, desired| {
        ctx.set_state(desired.clone())?;
        ctx.assign_output(desired)
    })
}

/// Running sum of its input across evaluations.
fn accumulate() -> HostBehavior {
    HostBehavior::new(|ctx| {
        let total = ctx.state().and_then(Value::as_int).unwrap_or(0);
        let input = int_input(ctx, 0)?;
        let total = total
            .checked_add(input)
            .ok_or_else(|| anyhow!("integer overflow in running sum"))?;
        ctx.set_state(Value::Int(total))?;
        ctx.set_output(Value::Int(total))?;
        Ok(())
    })
    .with_init(|_| Ok(Value::Int(0)))
}
