use crate::{
    ast::{Expression, InfixOperator},
    bytecode::{Chunk, OpCode, TooManyConstants},
    span::Span,
    vm::Value,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("{source} at {span}")]
    TooManyConstants {
        source: TooManyConstants,
        span: Span,
    },
}

pub fn compile(expression: &Expression) -> Result<Chunk, CompileError> {
    let mut chunk = Chunk::new();
    compile_into(expression, &mut chunk)?;
    Ok(chunk)
}

/// Appends the code for `expression`, terminated by `OP_HALT`, to `chunk`.
pub fn compile_into(expression: &Expression, chunk: &mut Chunk) -> Result<(), CompileError> {
    let mut compiler = Compiler { chunk };
    compiler.expression(expression)?;
    compiler
        .chunk
        .add_bytecode(OpCode::Halt, expression.span().end_line);

    #[cfg(feature = "disassemble")]
    log::debug!("{}", compiler.chunk.disassemble("code"));

    Ok(())
}

struct Compiler<'a> {
    chunk: &'a mut Chunk,
}

impl Compiler<'_> {
    fn expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Literal(literal, span) => self.emit_constant(literal.into(), *span),
            Expression::Binary {
                operator,
                left,
                right,
                span,
            } => {
                self.expression(left)?;
                self.expression(right)?;
                let opcode = match operator {
                    InfixOperator::Plus => OpCode::Add,
                    InfixOperator::Minus => OpCode::Subtract,
                    InfixOperator::Multiply => OpCode::Multiply,
                    InfixOperator::Divide => OpCode::Divide,
                };
                self.chunk.add_bytecode(opcode, span.end_line);
                Ok(())
            }
        }
    }

    fn emit_constant(&mut self, value: Value, span: Span) -> Result<(), CompileError> {
        let c = self
            .chunk
            .add_constant(value)
            .map_err(|source| CompileError::TooManyConstants { source, span })?;
        self.chunk.add_bytecode(OpCode::Constant, span.start_line);
        self.chunk.add_bytecode(c, span.start_line);
        Ok(())
    }
}
