use std::{fmt::Display, sync::Arc};

use crate::ast::Literal;

/// Longest string, in bytes, an operation may produce.
pub const MAX_STRING_LEN: usize = 1 << 30;

/// The tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int32,
    String,
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int32 => write!(f, "int32"),
            Type::String => write!(f, "string"),
        }
    }
}

/// Runtime value. Strings are immutable and shared, so cloning a value never
/// copies character data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int32(i32),
    String(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Add => write!(f, "add"),
            Operation::Subtract => write!(f, "subtract"),
            Operation::Multiply => write!(f, "multiply"),
            Operation::Divide => write!(f, "divide"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("Type error: cannot {operation} {left} and {right}")]
    Type {
        operation: Operation,
        left: Type,
        right: Type,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Cannot {operation}: result of {len} bytes exceeds the {} byte string limit", MAX_STRING_LEN)]
    TooLarge { operation: Operation, len: usize },
}

impl Value {
    pub fn new_int32(i: i32) -> Self {
        Value::Int32(i)
    }

    pub fn new_string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn type_of(&self) -> Type {
        match self {
            Value::Int32(_) => Type::Int32,
            Value::String(_) => Type::String,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self {
            Value::Int32(i) => Some(*i),
            Value::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            Value::Int32(_) => None,
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => Ok(Value::Int32(a.wrapping_add(*b))),
            (Value::String(a), Value::String(b)) => {
                let len = a.len().saturating_add(b.len());
                let mut s = string_buffer(Operation::Add, len)?;
                s.push_str(a);
                s.push_str(b);
                Ok(Value::new_string(s))
            }
            _ => Err(self.type_error(Operation::Add, other)),
        }
    }

    pub fn subtract(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => Ok(Value::Int32(a.wrapping_sub(*b))),
            _ => Err(self.type_error(Operation::Subtract, other)),
        }
    }

    /// The multiplier must be the right operand: `string * int32` repeats the
    /// string, `int32 * string` is a type error.
    pub fn multiply(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => Ok(Value::Int32(a.wrapping_mul(*b))),
            (Value::String(s), Value::Int32(n)) => {
                if *n <= 0 || s.is_empty() {
                    return Ok(Value::new_string(""));
                }
                let len = s
                    .len()
                    .checked_mul(*n as usize)
                    .unwrap_or(usize::MAX);
                let mut out = string_buffer(Operation::Multiply, len)?;
                for _ in 0..*n {
                    out.push_str(s);
                }
                Ok(Value::new_string(out))
            }
            _ => Err(self.type_error(Operation::Multiply, other)),
        }
    }

    pub fn divide(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Int32(_), Value::Int32(0)) => Err(ValueError::DivisionByZero),
            (Value::Int32(a), Value::Int32(b)) => Ok(Value::Int32(a.wrapping_div(*b))),
            _ => Err(self.type_error(Operation::Divide, other)),
        }
    }

    fn type_error(&self, operation: Operation, other: &Value) -> ValueError {
        ValueError::Type {
            operation,
            left: self.type_of(),
            right: other.type_of(),
        }
    }
}

/// Reserves the whole result up front, or refuses results over
/// `MAX_STRING_LEN` and allocations the allocator cannot satisfy.
fn string_buffer(operation: Operation, len: usize) -> Result<String, ValueError> {
    let too_large = ValueError::TooLarge { operation, len };
    if len > MAX_STRING_LEN {
        return Err(too_large);
    }
    let mut s = String::new();
    s.try_reserve_exact(len).map_err(|_| too_large)?;
    Ok(s)
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Int(i) => Value::Int32(*i),
            Literal::String(s) => Value::new_string(s.as_str()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int32(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}
