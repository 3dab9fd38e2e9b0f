//! Tokenizer for `loopscript` source text.

use loop_core::errors::{ErrorInfo, LoopError};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Let,
    Fn,
    If,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Return,
    Use,
    And,
    Or,
    Not,
    True,
    False,
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Semi,
    Newline,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "let" => TokenKind::Let,
            "fn" => TokenKind::Fn,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "use" => TokenKind::Use,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        })
    }

    /// Short rendering used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Int(value) => format!("integer {value}"),
            TokenKind::Float(value) => format!("float {value}"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("{other:?}").to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

pub(crate) fn syntax_error(line: u32, column: u32, message: impl Into<String>) -> LoopError {
    LoopError::Compilation(
        ErrorInfo::new("loop_host.syntax", message)
            .with_context("line", line.to_string())
            .with_context("column", column.to_string()),
    )
}

/// Splits `source` into tokens.
///
/// Newlines are significant statement terminators except inside `()` and
/// `[]`, where they are dropped so long calls and lists can wrap.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LoopError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        depth: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    depth: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn push(&mut self, kind: TokenKind, line: u32, column: u32) {
        self.tokens.push(Token { kind, line, column });
    }

    fn run(&mut self) -> Result<(), LoopError> {
        while let Some(ch) = self.peek() {
            let (line, column) = (self.line, self.column);
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        self.push(TokenKind::Newline, line, column);
                    }
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '"' | '\'' => {
                    let text = self.string(ch)?;
                    self.push(TokenKind::Str(text), line, column);
                }
                c if c.is_ascii_digit() => {
                    let kind = self.number()?;
                    self.push(kind, line, column);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let mut word = String::new();
                    while let Some(c) = self.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            word.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word));
                    self.push(kind, line, column);
                }
                _ => {
                    self.bump();
                    let kind = match ch {
                        '(' => {
                            self.depth += 1;
                            TokenKind::LParen
                        }
                        '[' => {
                            self.depth += 1;
                            TokenKind::LBracket
                        }
                        ')' => {
                            self.depth = self.depth.saturating_sub(1);
                            TokenKind::RParen
                        }
                        ']' => {
                            self.depth = self.depth.saturating_sub(1);
                            TokenKind::RBracket
                        }
                        '{' => TokenKind::LBrace,
                        '}' => TokenKind::RBrace,
                        ',' => TokenKind::Comma,
                        ':' => TokenKind::Colon,
                        '.' => TokenKind::Dot,
                        ';' => TokenKind::Semi,
                        '+' => TokenKind::Plus,
                        '-' => TokenKind::Minus,
                        '*' => TokenKind::Star,
                        '/' => TokenKind::Slash,
                        '%' => TokenKind::Percent,
                        '=' => self.with_eq(TokenKind::Eq, TokenKind::Assign),
                        '<' => self.with_eq(TokenKind::Le, TokenKind::Lt),
                        '>' => self.with_eq(TokenKind::Ge, TokenKind::Gt),
                        '!' if self.peek() == Some('=') => {
                            self.bump();
                            TokenKind::Ne
                        }
                        other => {
                            return Err(syntax_error(
                                line,
                                column,
                                format!("unexpected character '{other}'"),
                            ))
                        }
                    };
                    self.push(kind, line, column);
                }
            }
        }
        let (line, column) = (self.line, self.column);
        self.push(TokenKind::Newline, line, column);
        self.push(TokenKind::Eof, line, column);
        Ok(())
    }

    fn with_eq(&mut self, paired: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.bump();
            paired
        } else {
            single
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LoopError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(syntax_error(line, column, "unterminated string literal"))
                }
                Some(c) if c == quote => return Ok(text),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        other => {
                            return Err(syntax_error(
                                self.line,
                                self.column,
                                format!("unknown escape sequence '\\{}'", other.unwrap_or(' ')),
                            ))
                        }
                    };
                    text.push(escaped);
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<TokenKind, LoopError> {
        let (line, column) = (self.line, self.column);
        let mut digits = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    digits.push(c);
                }
                self.bump();
            } else if c == '.'
                && !is_float
                && self.peek_next().map_or(false, |next| next.is_ascii_digit())
            {
                is_float = true;
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if is_float {
            digits
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|err| syntax_error(line, column, format!("invalid float literal: {err}")))
        } else {
            digits.parse::<i64>().map(TokenKind::Int).map_err(|_| {
                syntax_error(line, column, format!("integer literal {digits} out of range"))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn newlines_inside_parens_are_dropped() {
        let tokens = kinds("f(1,\n 2)\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("f".into()),
                TokenKind::LParen,
                TokenKind::Int(1),
                TokenKind::Comma,
                TokenKind::Int(2),
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_escapes() {
        let tokens = kinds("let s = 'a\\'b' # trailing\n");
        assert_eq!(tokens[3], TokenKind::Str("a'b".into()));
        assert_eq!(tokens[4], TokenKind::Newline);
    }

    #[test]
    fn float_and_int_literals() {
        let tokens = kinds("1.5 + 2");
        assert_eq!(tokens[0], TokenKind::Float(1.5));
        assert_eq!(tokens[2], TokenKind::Int(2));
    }

    #[test]
    fn unterminated_string_is_a_compilation_error() {
        let err = tokenize("let s = \"abc\n").unwrap_err();
        assert_eq!(err.info().code, "loop_host.syntax");
        assert_eq!(err.info().context.get("line").map(String::as_str), Some("1"));
    }
}
