//! Predicate expression evaluator.

use crate::expr::{BinaryOp, Expr};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("{name}() expects {expected} argument(s)")]
    Arity { name: String, expected: usize },
    #[error("{0}() expects a node-set argument")]
    NotNodeSet(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("{0}")]
    Context(String),
}

/// The node a predicate is evaluated against.
pub trait ExprContext {
    /// Values of the nodes selected by a relative location path.
    fn select(&self, path: &str) -> Result<Vec<Value>, ExprError>;
    /// Value of the context node itself.
    fn current(&self) -> Vec<Value>;
    /// 1-based position of the context node within the candidate set.
    fn position(&self) -> usize;
    /// Size of the candidate set.
    fn last(&self) -> usize;
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Number(f64),
    Str(String),
    Bool(bool),
    Nodes(Vec<Value>),
}

impl ExprValue {
    pub fn as_bool(&self) -> bool {
        match self {
            ExprValue::Number(n) => *n != 0.0 && !n.is_nan(),
            ExprValue::Str(s) => !s.is_empty(),
            ExprValue::Bool(b) => *b,
            ExprValue::Nodes(nodes) => !nodes.is_empty(),
        }
    }

    pub fn as_number(&self) -> f64 {
        match self {
            ExprValue::Number(n) => *n,
            ExprValue::Str(s) => str_to_number(s),
            ExprValue::Bool(b) => f64::from(u8::from(*b)),
            ExprValue::Nodes(nodes) => nodes.first().map(value_to_number).unwrap_or(f64::NAN),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            ExprValue::Number(n) => number_to_string(*n),
            ExprValue::Str(s) => s.clone(),
            ExprValue::Bool(b) => b.to_string(),
            ExprValue::Nodes(nodes) => nodes.first().map(value_to_string).unwrap_or_default(),
        }
    }
}

/// String form of a node value.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_to_string).collect::<Vec<_>>().join(" "),
        Value::Object(_) => String::new(),
    }
}

fn value_to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => str_to_number(s),
        _ => f64::NAN,
    }
}

fn str_to_number(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn number_to_string(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl Expr {
    /// Evaluate the expression against a context node.
    pub fn evaluate(&self, ctx: &dyn ExprContext) -> Result<ExprValue, ExprError> {
        match self {
            Expr::Number(n) => Ok(ExprValue::Number(*n)),
            Expr::Literal(s) => Ok(ExprValue::Str(s.clone())),
            Expr::Path(path) => Ok(ExprValue::Nodes(ctx.select(path)?)),
            Expr::Negate(operand) => Ok(ExprValue::Number(-operand.evaluate(ctx)?.as_number())),
            Expr::Function { name, args } => eval_function(name, args, ctx),
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Or => {
                    if left.evaluate(ctx)?.as_bool() {
                        return Ok(ExprValue::Bool(true));
                    }
                    Ok(ExprValue::Bool(right.evaluate(ctx)?.as_bool()))
                }
                BinaryOp::And => {
                    if !left.evaluate(ctx)?.as_bool() {
                        return Ok(ExprValue::Bool(false));
                    }
                    Ok(ExprValue::Bool(right.evaluate(ctx)?.as_bool()))
                }
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt
                | BinaryOp::Ge => {
                    let l = left.evaluate(ctx)?;
                    let r = right.evaluate(ctx)?;
                    Ok(ExprValue::Bool(compare(*op, &l, &r)))
                }
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                    let l = left.evaluate(ctx)?.as_number();
                    let r = right.evaluate(ctx)?.as_number();
                    Ok(ExprValue::Number(match op {
                        BinaryOp::Add => l + r,
                        BinaryOp::Sub => l - r,
                        BinaryOp::Mul => l * r,
                        BinaryOp::Div => l / r,
                        _ => l % r,
                    }))
                }
            },
        }
    }

    /// Predicate truth: a numeric result selects by position, anything else
    /// is converted to a boolean.
    pub fn test(&self, ctx: &dyn ExprContext) -> Result<bool, ExprError> {
        match self.evaluate(ctx)? {
            ExprValue::Number(n) => Ok(n == ctx.position() as f64),
            other => Ok(other.as_bool()),
        }
    }
}

fn eval_function(name: &str, args: &[Expr], ctx: &dyn ExprContext) -> Result<ExprValue, ExprError> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ExprError::Arity {
                name: name.to_string(),
                expected,
            })
        }
    };
    match name {
        "position" => {
            arity(0)?;
            Ok(ExprValue::Number(ctx.position() as f64))
        }
        "first" => {
            arity(0)?;
            Ok(ExprValue::Number(1.0))
        }
        "last" => {
            arity(0)?;
            Ok(ExprValue::Number(ctx.last() as f64))
        }
        "current" => {
            arity(0)?;
            Ok(ExprValue::Nodes(ctx.current()))
        }
        "count" => {
            arity(1)?;
            match args[0].evaluate(ctx)? {
                ExprValue::Nodes(nodes) => Ok(ExprValue::Number(nodes.len() as f64)),
                _ => Err(ExprError::NotNodeSet(name.to_string())),
            }
        }
        "not" => {
            arity(1)?;
            Ok(ExprValue::Bool(!args[0].evaluate(ctx)?.as_bool()))
        }
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

fn compare(op: BinaryOp, left: &ExprValue, right: &ExprValue) -> bool {
    match (left, right) {
        (ExprValue::Nodes(a), ExprValue::Nodes(b)) => a.iter().any(|x| {
            b.iter().any(|y| {
                compare_scalars(
                    op,
                    &ExprValue::Str(value_to_string(x)),
                    &ExprValue::Str(value_to_string(y)),
                )
            })
        }),
        (ExprValue::Nodes(nodes), scalar) => compare_nodes(op, nodes, scalar),
        (scalar, ExprValue::Nodes(nodes)) => compare_nodes(op.flip(), nodes, scalar),
        (l, r) => compare_scalars(op, l, r),
    }
}

/// Existential comparison of a node-set against a scalar: true if any node
/// satisfies it. Booleans compare against the node-set as a whole.
fn compare_nodes(op: BinaryOp, nodes: &[Value], scalar: &ExprValue) -> bool {
    match scalar {
        ExprValue::Bool(_) => compare_scalars(op, &ExprValue::Bool(!nodes.is_empty()), scalar),
        ExprValue::Number(_) => nodes
            .iter()
            .any(|v| compare_scalars(op, &ExprValue::Number(value_to_number(v)), scalar)),
        _ => nodes
            .iter()
            .any(|v| compare_scalars(op, &ExprValue::Str(value_to_string(v)), scalar)),
    }
}

fn compare_scalars(op: BinaryOp, left: &ExprValue, right: &ExprValue) -> bool {
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (left, right) {
                (ExprValue::Bool(_), _) | (_, ExprValue::Bool(_)) => {
                    left.as_bool() == right.as_bool()
                }
                (ExprValue::Number(_), _) | (_, ExprValue::Number(_)) => {
                    left.as_number() == right.as_number()
                }
                _ => left.as_string() == right.as_string(),
            };
            equal == (op == BinaryOp::Eq)
        }
        _ => {
            let (l, r) = (left.as_number(), right.as_number());
            match op {
                BinaryOp::Lt => l < r,
                BinaryOp::Le => l <= r,
                BinaryOp::Gt => l > r,
                _ => l >= r,
            }
        }
    }
}
