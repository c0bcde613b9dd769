mod stack;
mod value;

use crate::{
    bytecode::{Chunk, OpCode, OpCodeFromU8Error},
    compiler::{self, CompileError},
    parser::{self, ParseError},
};

pub use self::{
    stack::{StackError, MAX_STACK_SIZE},
    value::{Operation, Type, Value, ValueError, MAX_STRING_LEN},
};
use self::stack::Stack;

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error("Failed to parse: {0}")]
    Parse(#[from] ParseError),
    #[error("Failed to compile: {0}")]
    Compile(#[from] CompileError),
    #[error("Runtime failure occurred: {0}")]
    Runtime(#[from] RuntimeError),
}

/// The byte stream does not follow the compiler's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedBytecode {
    #[error("Unknown opcode {byte:#04x} at offset {offset}")]
    UnknownOpCode { byte: u8, offset: usize },
    #[error("{opcode:?} at offset {offset} is missing its operand")]
    MissingOperand { opcode: OpCode, offset: usize },
    #[error("Constant index {index} at offset {offset} is out of range")]
    ConstantOutOfRange { index: u8, offset: usize },
    #[error("Bytecode ended at offset {offset} without OP_HALT")]
    MissingHalt { offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Malformed bytecode: {0}")]
    Malformed(#[from] MalformedBytecode),
    #[error(transparent)]
    Stack(#[from] StackError),
    #[error(transparent)]
    Value(#[from] ValueError),
}

struct Execution<'a> {
    chunk: &'a Chunk,
    ip: usize,
}

impl Execution<'_> {
    fn read_byte(&mut self) -> Option<u8> {
        let ret = self.chunk.get_bytecode(self.ip)?;
        self.ip += 1;
        Some(ret)
    }
}

/// Stack-based bytecode evaluator. Every entry point starts from an empty
/// stack, so one `Vm` can run any number of independent programs in turn.
#[derive(Debug, Default)]
pub struct Vm {
    chunk: Chunk,
    stack: Stack,
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses, compiles and runs `source`.
    pub fn exec(&mut self, source: &str) -> Result<Value, InterpretError> {
        self.reset();
        let expression = parser::parse(source)?;
        compiler::compile_into(&expression, &mut self.chunk)?;
        log::debug!(
            "compiled {} bytes of code, {} constants",
            self.chunk.code().len(),
            self.chunk.constants().len()
        );
        Ok(self.run()?)
    }

    /// Runs an already compiled chunk.
    pub fn interpret(&mut self, chunk: Chunk) -> Result<Value, RuntimeError> {
        self.stack.clear();
        self.chunk = chunk;
        self.run()
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.chunk.clear();
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    fn run(&mut self) -> Result<Value, RuntimeError> {
        let mut execution = Execution {
            chunk: &self.chunk,
            ip: 0,
        };
        let stack = &mut self.stack;

        loop {
            #[cfg(feature = "trace")]
            {
                let mut instruction = String::new();
                execution
                    .chunk
                    .disassemble_instruction(&mut instruction, execution.ip)
                    .expect("writing to a String cannot fail");
                log::trace!("{}\n{}", stack, instruction.trim_end());
            }

            let offset = execution.ip;
            let Some(byte) = execution.read_byte() else {
                return Err(MalformedBytecode::MissingHalt { offset }.into());
            };
            let opcode = OpCode::try_from(byte)
                .map_err(|OpCodeFromU8Error(byte)| MalformedBytecode::UnknownOpCode { byte, offset })?;

            match opcode {
                OpCode::Halt => {
                    let value = stack.pop()?;
                    if !stack.is_empty() {
                        log::debug!("{} values left below the result", stack.len());
                    }
                    log::debug!("halted with {:?}", value);
                    return Ok(value);
                }
                OpCode::Constant => {
                    let index = execution
                        .read_byte()
                        .ok_or(MalformedBytecode::MissingOperand { opcode, offset })?;
                    let constant = execution
                        .chunk
                        .get_constant(index)
                        .ok_or(MalformedBytecode::ConstantOutOfRange { index, offset })?;
                    stack.push(constant.clone())?;
                }
                OpCode::Add => binary_op(stack, Value::add)?,
                OpCode::Subtract => binary_op(stack, Value::subtract)?,
                OpCode::Multiply => binary_op(stack, Value::multiply)?,
                OpCode::Divide => binary_op(stack, Value::divide)?,
            }
        }
    }
}

fn binary_op(
    stack: &mut Stack,
    op: impl Fn(&Value, &Value) -> Result<Value, ValueError>,
) -> Result<(), RuntimeError> {
    let b = stack.pop()?;
    let a = stack.pop()?;
    stack.push(op(&a, &b)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(constants: &[Value], code: &[u8]) -> Chunk {
        let mut chunk = Chunk::new();
        for constant in constants {
            chunk.add_constant(constant.clone()).unwrap();
        }
        for &byte in code {
            chunk.add_bytecode(byte, 1);
        }
        chunk
    }

    const CONST: u8 = OpCode::Constant as u8;
    const HALT: u8 = OpCode::Halt as u8;
    const ADD: u8 = OpCode::Add as u8;
    const SUB: u8 = OpCode::Subtract as u8;
    const MUL: u8 = OpCode::Multiply as u8;
    const DIV: u8 = OpCode::Divide as u8;

    fn run(constants: &[Value], code: &[u8]) -> Result<Value, RuntimeError> {
        Vm::new().interpret(chunk(constants, code))
    }

    #[test]
    fn test_constant_halt() {
        assert_eq!(
            run(&[Value::new_int32(42)], &[CONST, 0, HALT]),
            Ok(Value::new_int32(42))
        );
    }

    #[test]
    fn test_add_int32() {
        assert_eq!(
            run(
                &[Value::new_int32(3), Value::new_int32(4)],
                &[CONST, 0, CONST, 1, ADD, HALT]
            ),
            Ok(Value::new_int32(7))
        );
    }

    #[test]
    fn test_add_strings() {
        assert_eq!(
            run(
                &[Value::new_string("foo"), Value::new_string("bar")],
                &[CONST, 0, CONST, 1, ADD, HALT]
            ),
            Ok(Value::new_string("foobar"))
        );
    }

    #[test]
    fn test_operand_order() {
        let constants = [Value::new_int32(10), Value::new_int32(4)];
        assert_eq!(
            run(&constants, &[CONST, 0, CONST, 1, SUB, HALT]),
            Ok(Value::new_int32(6))
        );
        assert_eq!(
            run(&constants, &[CONST, 1, CONST, 0, SUB, HALT]),
            Ok(Value::new_int32(-6))
        );
        assert_eq!(
            run(&constants, &[CONST, 0, CONST, 1, DIV, HALT]),
            Ok(Value::new_int32(2))
        );
    }

    #[test]
    fn test_multiply_string() {
        assert_eq!(
            run(
                &[Value::new_string("ab"), Value::new_int32(3)],
                &[CONST, 0, CONST, 1, MUL, HALT]
            ),
            Ok(Value::new_string("ababab"))
        );
    }

    #[test]
    fn test_type_error() {
        assert_eq!(
            run(
                &[Value::new_int32(1), Value::new_string("a")],
                &[CONST, 0, CONST, 1, ADD, HALT]
            ),
            Err(RuntimeError::Value(ValueError::Type {
                operation: Operation::Add,
                left: Type::Int32,
                right: Type::String,
            }))
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            run(
                &[Value::new_int32(1), Value::new_int32(0)],
                &[CONST, 0, CONST, 1, DIV, HALT]
            ),
            Err(RuntimeError::Value(ValueError::DivisionByZero))
        );
    }

    #[test]
    fn test_missing_halt() {
        assert_eq!(
            run(&[Value::new_int32(1)], &[CONST, 0]),
            Err(RuntimeError::Malformed(MalformedBytecode::MissingHalt {
                offset: 2
            }))
        );
        assert_eq!(
            run(&[], &[]),
            Err(RuntimeError::Malformed(MalformedBytecode::MissingHalt {
                offset: 0
            }))
        );
    }

    #[test]
    fn test_missing_operand() {
        assert_eq!(
            run(&[Value::new_int32(1)], &[CONST]),
            Err(RuntimeError::Malformed(MalformedBytecode::MissingOperand {
                opcode: OpCode::Constant,
                offset: 0
            }))
        );
    }

    #[test]
    fn test_constant_out_of_range() {
        assert_eq!(
            run(&[Value::new_int32(1)], &[CONST, 1, HALT]),
            Err(RuntimeError::Malformed(
                MalformedBytecode::ConstantOutOfRange {
                    index: 1,
                    offset: 0
                }
            ))
        );
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(
            run(&[Value::new_int32(1)], &[CONST, 0, 0xee, HALT]),
            Err(RuntimeError::Malformed(MalformedBytecode::UnknownOpCode {
                byte: 0xee,
                offset: 2
            }))
        );
    }

    #[test]
    fn test_underflow() {
        assert_eq!(run(&[], &[HALT]), Err(RuntimeError::Stack(StackError::Underflow)));
        assert_eq!(
            run(&[Value::new_int32(1)], &[CONST, 0, ADD, HALT]),
            Err(RuntimeError::Stack(StackError::Underflow))
        );
    }

    #[test]
    fn test_overflow() {
        let mut code = Vec::new();
        for _ in 0..=MAX_STACK_SIZE {
            code.extend_from_slice(&[CONST, 0]);
        }
        code.push(HALT);
        assert_eq!(
            run(&[Value::new_int32(1)], &code),
            Err(RuntimeError::Stack(StackError::Overflow))
        );
    }

    #[test]
    fn test_interpret_clears_stack() {
        let mut vm = Vm::new();
        let leftover = chunk(
            &[Value::new_int32(1), Value::new_int32(2)],
            &[CONST, 0, CONST, 1, HALT],
        );
        assert_eq!(vm.interpret(leftover), Ok(Value::new_int32(2)));

        // Would pop the 1 left behind above if the stack were not cleared.
        assert_eq!(
            vm.interpret(chunk(&[], &[HALT])),
            Err(RuntimeError::Stack(StackError::Underflow))
        );
    }

    #[test]
    fn test_exec() {
        let mut vm = Vm::new();
        assert_eq!(vm.exec("42").unwrap(), Value::new_int32(42));
        assert_eq!(
            vm.exec("(+ \"Hello, \" \"Eva!\")").unwrap(),
            Value::new_string("Hello, Eva!")
        );
    }

    #[test]
    fn test_exec_resets_constants() {
        let mut vm = Vm::new();
        vm.exec("(+ 1 2)").unwrap();
        assert_eq!(vm.chunk().constants().len(), 2);
        vm.exec("'x'").unwrap();
        assert_eq!(vm.chunk().constants(), &[Value::new_string("x")]);
    }

    #[test]
    fn test_oversized_string_is_recoverable() {
        let source = format!("(* '{}' 2147483647)", "a".repeat(4096));
        let mut vm = Vm::new();
        assert!(matches!(
            vm.exec(&source),
            Err(InterpretError::Runtime(RuntimeError::Value(
                ValueError::TooLarge { .. }
            )))
        ));
        assert_eq!(vm.exec("1").unwrap(), Value::new_int32(1));
    }

    #[test]
    fn test_runtime_error_message() {
        let err = Vm::new().exec("(/ 1 0)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Runtime failure occurred: Division by zero"
        );
    }

    #[test]
    fn test_exec_reports_stage() {
        let mut vm = Vm::new();
        assert!(matches!(vm.exec("("), Err(InterpretError::Parse(_))));
        assert!(matches!(
            vm.exec("(* 2 'a')"),
            Err(InterpretError::Runtime(RuntimeError::Value(
                ValueError::Type { .. }
            )))
        ));
    }
}
