use std::str::Chars;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Literals
    Int,
    String,

    // Single-character tokens
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Star,
    Slash,

    // End of file
    Eof,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenType::Int => "int",
            TokenType::String => "string",
            TokenType::LeftParen => "(",
            TokenType::RightParen => ")",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Star => "*",
            TokenType::Slash => "/",
            TokenType::Eof => "end of input",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("Unexpected character '{character}' at {span}")]
    UnexpectedCharacter { character: char, span: Span },
    #[error("Unterminated string starting at {span}")]
    UnterminatedString { span: Span },
    #[error("Unterminated block comment starting at {span}")]
    UnterminatedComment { span: Span },
}

/// Pull-based character source with one character of pushback.
///
/// Lines and columns are 1-based and describe the next character `read` will
/// return.
pub struct Source<I> {
    chars: I,
    pushback: Option<char>,
    line: usize,
    column: usize,
    previous: (usize, usize),
}

impl<I: Iterator<Item = char>> Source<I> {
    pub fn new(chars: I) -> Self {
        Self {
            chars,
            pushback: None,
            line: 1,
            column: 1,
            previous: (1, 1),
        }
    }

    pub fn read(&mut self) -> Option<char> {
        let c = self.pushback.take().or_else(|| self.chars.next())?;
        self.previous = (self.line, self.column);
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Pushes back the character returned by the last `read`.
    pub fn unread(&mut self, c: char) {
        debug_assert!(self.pushback.is_none(), "Source only holds one character of pushback");
        self.pushback = Some(c);
        (self.line, self.column) = self.previous;
    }

    pub fn position(&self) -> Span {
        Span::point(self.line, self.column)
    }

    /// Position of the character most recently returned by `read`.
    fn last_position(&self) -> Span {
        Span::point(self.previous.0, self.previous.1)
    }
}

impl<'a> From<&'a str> for Source<Chars<'a>> {
    fn from(source: &'a str) -> Self {
        Source::new(source.chars())
    }
}

pub struct Tokenizer<I> {
    source: Source<I>,
}

impl<'a> Tokenizer<Chars<'a>> {
    pub fn new(source: &'a str) -> Self {
        Self::from_source(Source::from(source))
    }
}

impl<I: Iterator<Item = char>> Tokenizer<I> {
    pub fn from_source(source: Source<I>) -> Self {
        Self { source }
    }

    /// Reads the next token. Once the source is exhausted every call returns
    /// an `Eof` token.
    pub fn token(&mut self) -> Result<Token, TokenizeError> {
        loop {
            self.skip_whitespace();

            let start = self.source.position();
            let Some(c) = self.source.read() else {
                return Ok(Token {
                    token_type: TokenType::Eof,
                    lexeme: String::new(),
                    span: start,
                });
            };

            let token_type = match c {
                '/' => match self.source.read() {
                    Some('/') => {
                        self.line_comment();
                        continue;
                    }
                    Some('*') => {
                        self.block_comment(start)?;
                        continue;
                    }
                    Some(other) => {
                        self.source.unread(other);
                        TokenType::Slash
                    }
                    None => TokenType::Slash,
                },
                '(' => TokenType::LeftParen,
                ')' => TokenType::RightParen,
                '+' => TokenType::Plus,
                '-' => TokenType::Minus,
                '*' => TokenType::Star,
                '"' | '\'' => return self.string(c, start),
                c if c.is_ascii_digit() => return Ok(self.int(c, start)),
                character => {
                    return Err(TokenizeError::UnexpectedCharacter {
                        character,
                        span: start,
                    })
                }
            };

            return Ok(Token {
                token_type,
                lexeme: c.to_string(),
                span: start,
            });
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.source.read() {
            if !c.is_whitespace() {
                self.source.unread(c);
                break;
            }
        }
    }

    fn line_comment(&mut self) {
        while let Some(c) = self.source.read() {
            if c == '\n' {
                break;
            }
        }
    }

    fn block_comment(&mut self, start: Span) -> Result<(), TokenizeError> {
        let mut star = false;
        while let Some(c) = self.source.read() {
            match c {
                '/' if star => return Ok(()),
                '*' => star = true,
                _ => star = false,
            }
        }
        Err(TokenizeError::UnterminatedComment { span: start })
    }

    fn int(&mut self, first: char, start: Span) -> Token {
        let mut lexeme = String::from(first);
        let mut end = start;
        while let Some(c) = self.source.read() {
            if !c.is_ascii_digit() {
                self.source.unread(c);
                break;
            }
            end = self.source.last_position();
            lexeme.push(c);
        }

        Token {
            token_type: TokenType::Int,
            lexeme,
            span: start + end,
        }
    }

    fn string(&mut self, quote: char, start: Span) -> Result<Token, TokenizeError> {
        let mut lexeme = String::from(quote);
        while let Some(c) = self.source.read() {
            lexeme.push(c);
            if c == quote {
                return Ok(Token {
                    token_type: TokenType::String,
                    lexeme,
                    span: start + self.source.last_position(),
                });
            }
        }
        Err(TokenizeError::UnterminatedString { span: start })
    }
}

pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.token()?;
        let eof = token.token_type == TokenType::Eof;
        tokens.push(token);
        if eof {
            break;
        }
    }

    Ok(tokens)
}
