use std::str::Chars;

use crate::{
    ast::{Expression, InfixOperator, Literal},
    span::Span,
    tokenizer::{Source, Token, TokenType, TokenizeError, Tokenizer},
};

const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error("Unexpected token type '{found}' at {span}, expected '{expected}'")]
    UnexpectedToken {
        found: TokenType,
        expected: TokenType,
        span: Span,
    },
    #[error("Unexpected token type '{found}' at {span}, expected one of {expected:?}")]
    ExpectedOneOf {
        found: TokenType,
        expected: &'static [TokenType],
        span: Span,
    },
    #[error("Invalid int literal '{lexeme}' at {span}: {source}")]
    InvalidInt {
        lexeme: String,
        span: Span,
        source: std::num::ParseIntError,
    },
    #[error("Expression nested deeper than {} levels at {span}", MAX_DEPTH)]
    TooDeep { span: Span },
}

/// Parses a complete program: one expression followed by end of input.
pub fn parse(source: &str) -> Result<Expression, ParseError> {
    Parser::new(source).parse()
}

/// Single-lookahead parser. The next token, or the error produced while
/// reading it, is fetched eagerly and held until consumed.
pub struct Parser<I> {
    tokenizer: Tokenizer<I>,
    next: Result<Token, TokenizeError>,
    depth: usize,
}

impl<'a> Parser<Chars<'a>> {
    pub fn new(source: &'a str) -> Self {
        Self::from_tokenizer(Tokenizer::new(source))
    }
}

impl<I: Iterator<Item = char>> Parser<I> {
    pub fn from_source(source: Source<I>) -> Self {
        Self::from_tokenizer(Tokenizer::from_source(source))
    }

    pub fn from_tokenizer(mut tokenizer: Tokenizer<I>) -> Self {
        let next = tokenizer.token();
        Self {
            tokenizer,
            next,
            depth: 0,
        }
    }

    // Program
    //  : Expression Eof
    //  ;
    pub fn parse(&mut self) -> Result<Expression, ParseError> {
        let expression = self.parse_expression()?;
        self.consume(TokenType::Eof)?;
        Ok(expression)
    }

    // Expression
    //  : Literal
    //  | '(' Operator Expression Expression ')'
    //  ;
    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let (token_type, span) = self.lookahead()?;
        match token_type {
            TokenType::Int | TokenType::String => {
                let literal = self.parse_literal()?;
                Ok(Expression::Literal(literal, span))
            }
            TokenType::LeftParen => self.parse_binary(),
            found => Err(ParseError::ExpectedOneOf {
                found,
                expected: &[TokenType::Int, TokenType::String, TokenType::LeftParen],
                span,
            }),
        }
    }

    // Literal
    //  : IntLiteral
    //  | StringLiteral
    //  ;
    pub fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let (token_type, span) = self.lookahead()?;
        match token_type {
            TokenType::Int => self.parse_int(),
            TokenType::String => self.parse_string(),
            found => Err(ParseError::ExpectedOneOf {
                found,
                expected: &[TokenType::Int, TokenType::String],
                span,
            }),
        }
    }

    pub fn parse_int(&mut self) -> Result<Literal, ParseError> {
        let token = self.consume(TokenType::Int)?;
        match token.lexeme.parse::<i32>() {
            Ok(value) => Ok(Literal::Int(value)),
            Err(source) => Err(ParseError::InvalidInt {
                lexeme: token.lexeme,
                span: token.span,
                source,
            }),
        }
    }

    pub fn parse_string(&mut self) -> Result<Literal, ParseError> {
        let token = self.consume(TokenType::String)?;
        let lexeme = token.lexeme;
        // Quote characters are single bytes, so slicing one off each end is safe.
        if lexeme.len() < 2 {
            return Ok(Literal::String(String::new()));
        }
        Ok(Literal::String(lexeme[1..lexeme.len() - 1].to_string()))
    }

    fn parse_binary(&mut self) -> Result<Expression, ParseError> {
        let open = self.consume(TokenType::LeftParen)?;
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep { span: open.span });
        }
        self.depth += 1;

        let (token_type, span) = self.lookahead()?;
        let operator = match token_type {
            TokenType::Plus => InfixOperator::Plus,
            TokenType::Minus => InfixOperator::Minus,
            TokenType::Star => InfixOperator::Multiply,
            TokenType::Slash => InfixOperator::Divide,
            found => {
                return Err(ParseError::ExpectedOneOf {
                    found,
                    expected: &[
                        TokenType::Plus,
                        TokenType::Minus,
                        TokenType::Star,
                        TokenType::Slash,
                    ],
                    span,
                })
            }
        };
        self.advance()?;

        let left = self.parse_expression()?;
        let right = self.parse_expression()?;
        let close = self.consume(TokenType::RightParen)?;
        self.depth -= 1;

        Ok(Expression::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            span: open.span + close.span,
        })
    }

    /// The lookahead token. A buffered tokenize error takes priority over
    /// anything the caller would check.
    fn peek(&self) -> Result<&Token, ParseError> {
        self.next.as_ref().map_err(|e| e.clone().into())
    }

    fn lookahead(&self) -> Result<(TokenType, Span), ParseError> {
        let token = self.peek()?;
        Ok((*token.token_type(), token.span))
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let next = self.tokenizer.token();
        Ok(std::mem::replace(&mut self.next, next)?)
    }

    fn consume(&mut self, expected: TokenType) -> Result<Token, ParseError> {
        let token = self.peek()?;
        if token.token_type != expected {
            return Err(ParseError::UnexpectedToken {
                found: token.token_type,
                expected,
                span: token.span,
            });
        }
        self.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(source: &str) -> Literal {
        match parse(source).unwrap() {
            Expression::Literal(literal, _) => literal,
            e => panic!("Expected literal, found {e}"),
        }
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(literal("42"), Literal::Int(42));
        assert_eq!(literal("  0007 "), Literal::Int(7));
        assert_eq!(literal("2147483647"), Literal::Int(i32::MAX));
    }

    #[test]
    fn test_parse_int_overflow() {
        let err = parse("2147483648").unwrap_err();
        assert!(
            matches!(err, ParseError::InvalidInt { ref lexeme, .. } if lexeme == "2147483648"),
            "{err:?}"
        );
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(literal("\"hello, eva!\""), Literal::String("hello, eva!".into()));
        assert_eq!(literal("'single'"), Literal::String("single".into()));
        assert_eq!(literal("\"\""), Literal::String(String::new()));
    }

    #[test]
    fn test_parse_string_from_source() {
        let source = Source::new("\"streamed\"".chars());
        let literal = Parser::from_source(source).parse_literal().unwrap();
        assert_eq!(literal, Literal::String("streamed".into()));
    }

    #[test]
    fn test_parse_with_comments() {
        assert_eq!(literal("// answer\n42 /* done */"), Literal::Int(42));
    }

    #[test]
    fn test_parse_binary() {
        let expression = parse("(+ 1 (* \"a\" 3))").unwrap();
        assert_eq!(expression.to_string(), "(+ 1 (* \"a\" 3))");
        let span = expression.span();
        assert_eq!((span.start_column, span.end_column), (1, 15));
    }

    #[test]
    fn test_kind_mismatch_names_both_kinds() {
        let mut parser = Parser::new("\"text\"");
        let err = parser.parse_int().unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                found: TokenType::String,
                expected: TokenType::Int,
                span: Span::point(1, 1),
            }
        );
        assert!(err.to_string().contains("'string'"));
        assert!(err.to_string().contains("'int'"));
    }

    #[test]
    fn test_tokenize_error_takes_priority() {
        let mut parser = Parser::new("#");
        let err = parser.parse_int().unwrap_err();
        assert!(matches!(
            err,
            ParseError::Tokenize(TokenizeError::UnexpectedCharacter { character: '#', .. })
        ));
    }

    #[test]
    fn test_buffered_error_surfaces_after_token() {
        let err = parse("1 \"open").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Tokenize(TokenizeError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn test_trailing_token() {
        let err = parse("1 2").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedToken {
                found: TokenType::Int,
                expected: TokenType::Eof,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_program() {
        let err = parse("   ").unwrap_err();
        assert!(matches!(
            err,
            ParseError::ExpectedOneOf {
                found: TokenType::Eof,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_operator() {
        let err = parse("(1 2)").unwrap_err();
        assert!(matches!(
            err,
            ParseError::ExpectedOneOf {
                found: TokenType::Int,
                ..
            }
        ));
    }

    #[test]
    fn test_unclosed_binary() {
        let err = parse("(+ 1 2").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedToken {
                found: TokenType::Eof,
                expected: TokenType::RightParen,
                ..
            }
        ));
    }

    #[test]
    fn test_too_deep() {
        let source = "(+ ".repeat(MAX_DEPTH + 1);
        assert!(matches!(parse(&source), Err(ParseError::TooDeep { .. })));
    }
}
