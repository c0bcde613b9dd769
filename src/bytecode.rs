use std::fmt::Write;

use rustc_hash::FxHashMap;

use crate::vm::Value;

/// Maximum number of constants a chunk can address with a one-byte index.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Halt = 0,
    Constant = 1,
    Add = 2,
    Subtract = 3,
    Multiply = 4,
    Divide = 5,
}

impl OpCode {
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Halt => "OP_HALT",
            OpCode::Constant => "OP_CONSTANT",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
        }
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> u8 {
        value as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid byte {0:#04x} found when expecting an OpCode")]
pub struct OpCodeFromU8Error(pub u8);

impl TryFrom<u8> for OpCode {
    type Error = OpCodeFromU8Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OpCode::Halt),
            1 => Ok(OpCode::Constant),
            2 => Ok(OpCode::Add),
            3 => Ok(OpCode::Subtract),
            4 => Ok(OpCode::Multiply),
            5 => Ok(OpCode::Divide),
            _ => Err(OpCodeFromU8Error(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Too many constants in one chunk (limit {})", MAX_CONSTANTS)]
pub struct TooManyConstants;

/// Bytecode with its line table and constant pool.
#[derive(Debug, Default)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<usize>,
    constants: Vec<Value>,
    interned: FxHashMap<Value, u8>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_bytecode(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn add_bytecode(&mut self, byte: impl Into<u8>, line: usize) {
        self.code.push(byte.into());
        self.lines.push(line);
    }

    pub fn get_constant(&self, index: u8) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    /// Appends `value` to the constant pool, or returns the index of an equal
    /// constant already in it.
    pub fn add_constant(&mut self, value: Value) -> Result<u8, TooManyConstants> {
        if let Some(&index) = self.interned.get(&value) {
            return Ok(index);
        }
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(TooManyConstants);
        }
        let index = self.constants.len() as u8;
        self.constants.push(value.clone());
        self.interned.insert(value, index);
        Ok(index)
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn line(&self, offset: usize) -> Option<usize> {
        self.lines.get(offset).copied()
    }

    pub fn clear(&mut self) {
        self.code.clear();
        self.lines.clear();
        self.constants.clear();
        self.interned.clear();
    }

    pub fn disassemble(&self, name: &str) -> String {
        let mut out = String::new();
        self.write_disassembly(&mut out, name)
            .expect("writing to a String cannot fail");
        out
    }

    fn write_disassembly(&self, out: &mut impl Write, name: &str) -> std::fmt::Result {
        writeln!(out, "== {} ==", name)?;

        let mut offset = 0;
        while offset < self.code.len() {
            offset = self.disassemble_instruction(out, offset)?;
        }
        Ok(())
    }

    /// Writes one instruction to `out` and returns the offset of the next one.
    pub fn disassemble_instruction(
        &self,
        out: &mut impl Write,
        offset: usize,
    ) -> Result<usize, std::fmt::Error> {
        write!(out, "{:04} ", offset)?;

        if offset > 0 && self.lines.get(offset) == self.lines.get(offset - 1) {
            write!(out, "   | ")?;
        } else {
            write!(out, "{:4} ", self.line(offset).unwrap_or(0))?;
        }

        let Some(instruction) = self.get_bytecode(offset) else {
            writeln!(out, "<end of code>")?;
            return Ok(offset + 1);
        };
        match OpCode::try_from(instruction) {
            Ok(OpCode::Constant) => constant_instruction(self, out, offset),
            Ok(opcode) => simple_instruction(out, opcode, offset),
            Err(OpCodeFromU8Error(byte)) => {
                writeln!(out, "UNKNOWN {:#04x}", byte)?;
                Ok(offset + 1)
            }
        }
    }
}

fn constant_instruction(
    chunk: &Chunk,
    out: &mut impl Write,
    offset: usize,
) -> Result<usize, std::fmt::Error> {
    let name = OpCode::Constant.name();
    let Some(index) = chunk.get_bytecode(offset + 1) else {
        writeln!(out, "{:<16} <missing operand>", name)?;
        return Ok(offset + 1);
    };
    match chunk.get_constant(index) {
        Some(constant) => writeln!(out, "{:<16} {:4} '{}'", name, index, constant)?,
        None => writeln!(out, "{:<16} {:4} <out of range>", name, index)?,
    }
    Ok(offset + 2)
}

fn simple_instruction(
    out: &mut impl Write,
    opcode: OpCode,
    offset: usize,
) -> Result<usize, std::fmt::Error> {
    writeln!(out, "{}", opcode.name())?;
    Ok(offset + 1)
}
