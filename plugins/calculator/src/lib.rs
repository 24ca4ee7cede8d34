//! Calculator Plugin.
//!
//! Build with `cargo build --release --target wasm32-unknown-unknown` and
//! upload the resulting `.wasm`.

use loom_pdk::extism_pdk::Error;
use loom_pdk::prelude::*;

#[plugin_fn]
pub fn loom_name() -> FnResult<String> {
    Ok("Calculator Plugin".into())
}

#[plugin_fn]
pub fn loom_description() -> FnResult<String> {
    Ok("Basic arithmetic on two numbers".into())
}

/// Text commands such as `add 1 2` or `divide 9 3`.
#[plugin_fn]
pub fn loom_execute(input: String) -> FnResult<String> {
    let mut words = input.split_whitespace();
    let (Some(op), Some(a), Some(b), None) = (words.next(), words.next(), words.next(), words.next())
    else {
        return Ok("usage: <add|subtract|multiply|divide> <a> <b>".into());
    };
    let (a, b) = match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return Ok(format!("not a number in '{input}'")),
    };
    match apply(op, a, b) {
        Ok(result) => Ok(result.to_string()),
        Err(e) => Ok(format!("error: {e}")),
    }
}

#[plugin_fn]
pub fn loom_describe() -> FnResult<String> {
    let method = |name: &str, description: &str| {
        MethodSpec::new(name)
            .param(ParamType::Float)
            .param(ParamType::Float)
            .returns(ParamType::Float)
            .safe(description)
    };
    describe([
        method("add", "Adds two numbers"),
        method("subtract", "Subtracts the second number from the first"),
        method("multiply", "Multiplies two numbers"),
        method("divide", "Divides the first number by the second"),
    ])
}

#[plugin_fn]
pub fn add(input: String) -> FnResult<String> {
    binary("add", &input)
}

#[plugin_fn]
pub fn subtract(input: String) -> FnResult<String> {
    binary("subtract", &input)
}

#[plugin_fn]
pub fn multiply(input: String) -> FnResult<String> {
    binary("multiply", &input)
}

#[plugin_fn]
pub fn divide(input: String) -> FnResult<String> {
    binary("divide", &input)
}

fn binary(op: &str, input: &str) -> FnResult<String> {
    let (a, b): (f64, f64) = args(input)?;
    ret(apply(op, a, b)?)
}

#[allow(clippy::arithmetic_side_effects)]
fn apply(op: &str, a: f64, b: f64) -> Result<f64, Error> {
    match op {
        "add" => Ok(a + b),
        "subtract" => Ok(a - b),
        "multiply" => Ok(a * b),
        "divide" if b == 0.0 => Err(Error::msg("division by zero")),
        "divide" => Ok(a / b),
        other => Err(Error::msg(format!("unknown operation '{other}'"))),
    }
}
