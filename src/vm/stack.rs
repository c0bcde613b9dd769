use std::fmt::Display;

use super::Value;

pub const MAX_STACK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error("Stack overflow: more than {} values", MAX_STACK_SIZE)]
    Overflow,
    #[error("Stack underflow: pop from empty stack")]
    Underflow,
}

#[derive(Debug)]
pub struct Stack {
    storage: Vec<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Stack {
            storage: Vec::with_capacity(MAX_STACK_SIZE),
        }
    }

    pub fn push(&mut self, value: Value) -> Result<(), StackError> {
        if self.storage.len() >= MAX_STACK_SIZE {
            return Err(StackError::Overflow);
        }
        self.storage.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, StackError> {
        self.storage.pop().ok_or(StackError::Underflow)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn clear(&mut self) {
        self.storage.clear();
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "          ")?;
        for value in self.storage.iter() {
            write!(f, "[ {:?} ]", value)?;
        }
        Ok(())
    }
}
