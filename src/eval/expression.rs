use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::trace;

use super::builtin;
use super::value::Value;
use crate::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::error::{RuntimeError, RuntimeResult};

/// Variable bindings of one session.
pub type Bindings = HashMap<String, Value>;

/// Evaluates `expr` against `bindings`. Undefined variables are `Null`.
pub fn evaluate(expr: &Expression, bindings: &Bindings) -> RuntimeResult<Value> {
    ExpressionEvaluator::new(bindings).eval_expression(expr)
}

pub struct ExpressionEvaluator<'a> {
    bindings: &'a Bindings,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(bindings: &'a Bindings) -> Self {
        Self { bindings }
    }

    pub fn eval_expression(&self, expr: &Expression) -> RuntimeResult<Value> {
        match expr {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(name) => Ok(self.bindings.get(name).cloned().unwrap_or_default()),
            Expression::UnaryOp { op, operand } => {
                let value = self.eval_expression(operand)?;
                self.eval_unary_op(*op, value)
            }
            Expression::BinaryOp { op, left, right } => self.eval_binary_op(*op, left, right),
            Expression::Call {
                function,
                arguments,
            } => {
                let args = self.eval_arguments(arguments)?;
                trace!(function = %function, arity = args.len(), "call");
                builtin::call_function(function, &args)
            }
            Expression::Pipe { expr, filters } => {
                let mut value = self.eval_expression(expr)?;
                for filter in filters {
                    let args = self.eval_arguments(&filter.args)?;
                    value = builtin::apply_filter(&filter.name, value, &args)?;
                }
                Ok(value)
            }
        }
    }

    fn eval_arguments(&self, arguments: &[Expression]) -> RuntimeResult<Vec<Value>> {
        arguments
            .iter()
            .map(|arg| self.eval_expression(arg))
            .collect()
    }

    fn eval_unary_op(&self, op: UnaryOperator, value: Value) -> RuntimeResult<Value> {
        match op {
            UnaryOperator::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOperator::Minus => value.as_number().map(|n| Value::Number(-n)).ok_or_else(|| {
                RuntimeError::type_error(format!("cannot negate {} `{}`", value.type_name(), value))
            }),
        }
    }

    fn eval_binary_op(
        &self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
    ) -> RuntimeResult<Value> {
        // logical operators short-circuit
        match op {
            BinaryOperator::And => {
                let left = self.eval_expression(left)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval_expression(right)?.is_truthy()));
            }
            BinaryOperator::Or => {
                let left = self.eval_expression(left)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval_expression(right)?.is_truthy()));
            }
            _ => {}
        }

        let left = self.eval_expression(left)?;
        let right = self.eval_expression(right)?;

        match op {
            BinaryOperator::Add => Ok(match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                _ => Value::String(format!("{}{}", left, right)),
            }),
            BinaryOperator::Subtract => arithmetic(op, &left, &right, |a, b| Ok(a - b)),
            BinaryOperator::Multiply => arithmetic(op, &left, &right, |a, b| Ok(a * b)),
            BinaryOperator::Divide => arithmetic(op, &left, &right, |a, b| {
                if b == 0.0 {
                    Err(RuntimeError::type_error("division by zero"))
                } else {
                    Ok(a / b)
                }
            }),
            BinaryOperator::Equal => Ok(Value::Bool(compare(&left, &right) == Some(Ordering::Equal))),
            BinaryOperator::NotEqual => {
                Ok(Value::Bool(compare(&left, &right) != Some(Ordering::Equal)))
            }
            BinaryOperator::LessThan => Ok(Value::Bool(compare(&left, &right) == Some(Ordering::Less))),
            BinaryOperator::GreaterThan => {
                Ok(Value::Bool(compare(&left, &right) == Some(Ordering::Greater)))
            }
            BinaryOperator::LessThanEqual => Ok(Value::Bool(matches!(
                compare(&left, &right),
                Some(Ordering::Less | Ordering::Equal)
            ))),
            BinaryOperator::GreaterThanEqual => Ok(Value::Bool(matches!(
                compare(&left, &right),
                Some(Ordering::Greater | Ordering::Equal)
            ))),
            BinaryOperator::And | BinaryOperator::Or => Ok(Value::Bool(false)),
        }
    }
}

fn arithmetic(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    f: impl Fn(f64, f64) -> RuntimeResult<f64>,
) -> RuntimeResult<Value> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => f(a, b).map(Value::Number),
        _ => Err(RuntimeError::type_error(format!(
            "cannot apply `{}` to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

/// Same tags compare by value. Mixed tags compare numerically when both sides look
/// numeric and are otherwise unordered, which makes `==` false and `!=` true.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}
