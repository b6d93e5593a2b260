//! Built-in functions and pipe filters.
//!
//! Names resolve through strum so the sets stay closed; an unknown name and a known
//! name with the wrong number of arguments fail the same way.

use std::str::FromStr;

use super::value::Value;
use crate::error::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Function {
    Contains,
    Upper,
    Lower,
    Trim,
    Max,
    Min,
    Len,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Filter {
    Trim,
    Upper,
    Lower,
    Default,
    Int,
}

pub fn call_function(name: &str, args: &[Value]) -> RuntimeResult<Value> {
    let undefined = || RuntimeError::UndefinedFunction {
        name: name.to_string(),
        arity: args.len(),
    };
    let function = Function::from_str(name).map_err(|_| undefined())?;

    match (function, args) {
        (Function::Contains, [haystack, needle]) => {
            Ok(Value::Bool(haystack.render().contains(&needle.render())))
        }
        (Function::Upper, [value]) => Ok(Value::String(value.render().to_uppercase())),
        (Function::Lower, [value]) => Ok(Value::String(value.render().to_lowercase())),
        (Function::Trim, [value]) => Ok(Value::String(value.render().trim().to_string())),
        (Function::Len, [value]) => Ok(Value::Number(value.render().chars().count() as f64)),
        (Function::Int, [value]) => Ok(Value::Number(to_int(value))),
        (Function::Max, [_, ..]) => numeric_fold(function, args, f64::max),
        (Function::Min, [_, ..]) => numeric_fold(function, args, f64::min),
        _ => Err(undefined()),
    }
}

pub fn apply_filter(name: &str, value: Value, args: &[Value]) -> RuntimeResult<Value> {
    let undefined = || RuntimeError::UndefinedFilter {
        name: name.to_string(),
        arity: args.len(),
    };
    let filter = Filter::from_str(name).map_err(|_| undefined())?;

    match (filter, args) {
        (Filter::Trim, []) => Ok(Value::String(value.render().trim().to_string())),
        (Filter::Upper, []) => Ok(Value::String(value.render().to_uppercase())),
        (Filter::Lower, []) => Ok(Value::String(value.render().to_lowercase())),
        (Filter::Int, []) => Ok(Value::Number(to_int(&value))),
        (Filter::Default, [fallback]) => {
            if value.is_empty() {
                Ok(fallback.clone())
            } else {
                Ok(value)
            }
        }
        _ => Err(undefined()),
    }
}

/// Integer coercion: numbers and numeric strings truncate toward zero; `Null`,
/// empty and non-numeric strings are `0`.
pub fn to_int(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        other => other.as_number().map_or(0.0, f64::trunc),
    }
}

fn numeric_fold(function: Function, args: &[Value], f: fn(f64, f64) -> f64) -> RuntimeResult<Value> {
    let mut result: Option<f64> = None;
    for arg in args {
        let n = arg.as_number().ok_or_else(|| {
            RuntimeError::type_error(format!(
                "{}() expects numbers, got {} `{}`",
                function,
                arg.type_name(),
                arg.render()
            ))
        })?;
        result = Some(result.map_or(n, |acc| f(acc, n)));
    }
    Ok(result.map_or(Value::Null, Value::Number))
}
