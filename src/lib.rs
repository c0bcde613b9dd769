pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod parser;
pub mod span;
pub mod tokenizer;
pub mod vm;

pub use vm::{InterpretError, Value, Vm};
