use std::fmt;

use crate::ast::SourcePosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals, identifiers, operators
    IntLiteral,
    CharLiteral,
    Identifier,
    Operator,
    /// `**`, the doubling shorthand in `v **`
    DoubleOperator,

    // Reserved words
    Array,
    Begin,
    Const,
    Do,
    Else,
    End,
    Func,
    If,
    In,
    Let,
    Loop,
    Of,
    Proc,
    Record,
    Repeat,
    Then,
    Type,
    Until,
    Var,
    While,

    // Punctuation
    Dot,
    Colon,
    Semicolon,
    Comma,
    Becomes, // :=
    Is,      // ~

    // Brackets
    LParen,
    RParen,
    LBracket,
    RBracket,
    LCurly,
    RCurly,

    // Special
    EndOfText,
    Error,
}

impl TokenKind {
    /// How the token is written, or a description for the token classes.
    pub fn spell(self) -> &'static str {
        match self {
            TokenKind::IntLiteral => "<int>",
            TokenKind::CharLiteral => "<char>",
            TokenKind::Identifier => "<identifier>",
            TokenKind::Operator => "<operator>",
            TokenKind::DoubleOperator => "**",
            TokenKind::Array => "array",
            TokenKind::Begin => "begin",
            TokenKind::Const => "const",
            TokenKind::Do => "do",
            TokenKind::Else => "else",
            TokenKind::End => "end",
            TokenKind::Func => "func",
            TokenKind::If => "if",
            TokenKind::In => "in",
            TokenKind::Let => "let",
            TokenKind::Loop => "loop",
            TokenKind::Of => "of",
            TokenKind::Proc => "proc",
            TokenKind::Record => "record",
            TokenKind::Repeat => "repeat",
            TokenKind::Then => "then",
            TokenKind::Type => "type",
            TokenKind::Until => "until",
            TokenKind::Var => "var",
            TokenKind::While => "while",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Becomes => ":=",
            TokenKind::Is => "~",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LCurly => "{",
            TokenKind::RCurly => "}",
            TokenKind::EndOfText => "",
            TokenKind::Error => "<error>",
        }
    }

    fn reserved(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "array" => TokenKind::Array,
            "begin" => TokenKind::Begin,
            "const" => TokenKind::Const,
            "do" => TokenKind::Do,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "func" => TokenKind::Func,
            "if" => TokenKind::If,
            "in" => TokenKind::In,
            "let" => TokenKind::Let,
            "loop" => TokenKind::Loop,
            "of" => TokenKind::Of,
            "proc" => TokenKind::Proc,
            "record" => TokenKind::Record,
            "repeat" => TokenKind::Repeat,
            "then" => TokenKind::Then,
            "type" => TokenKind::Type,
            "until" => TokenKind::Until,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spell())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub spelling: String,
    pub position: SourcePosition,
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '=' | '<' | '>' | '\\' | '&' | '@' | '%' | '^' | '?' | '|'
    )
}

/// Scan a whole source text. The last token is always `EndOfText`.
pub fn tokenize(source: &str) -> Vec<Token> {
    Scanner::new(source).collect()
}

/// Pull-based scanner: each `next_token` call yields the next token, and
/// `EndOfText` forever once the source is exhausted.
pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    /// Line of the most recently consumed character.
    last_line: u32,
    finished: bool,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            last_line: 1,
            finished: false,
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_separators();
        let start = self.line;
        let mut spelling = String::new();
        let kind = match self.peek() {
            None => TokenKind::EndOfText,
            Some(ch) => self.scan_token(ch, &mut spelling),
        };
        let finish = if kind == TokenKind::EndOfText { start } else { self.last_line };
        Token {
            kind,
            spelling,
            position: SourcePosition::new(start, finish),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        self.last_line = self.line;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn take(&mut self, spelling: &mut String) {
        if let Some(c) = self.advance() {
            spelling.push(c);
        }
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '!' | '#' => {
                    // Line comment: up to and including the newline
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '$' => {
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '$' {
                            break;
                        }
                    }
                }
                ' ' | '\n' | '\r' | '\t' => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn scan_token(&mut self, ch: char, spelling: &mut String) -> TokenKind {
        match ch {
            c if c.is_ascii_alphabetic() => {
                self.take(spelling);
                while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
                    self.take(spelling);
                }
                TokenKind::reserved(spelling).unwrap_or(TokenKind::Identifier)
            }
            c if c.is_ascii_digit() => {
                self.take(spelling);
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.take(spelling);
                }
                TokenKind::IntLiteral
            }
            c if is_operator_char(c) => {
                self.take(spelling);
                if c == '*' && self.peek() == Some('*') {
                    self.take(spelling);
                    return TokenKind::DoubleOperator;
                }
                while self.peek().is_some_and(is_operator_char) {
                    self.take(spelling);
                }
                TokenKind::Operator
            }
            '\'' => {
                self.take(spelling);
                if self.peek().is_none() {
                    return TokenKind::Error;
                }
                self.take(spelling);
                if self.peek() == Some('\'') {
                    self.take(spelling);
                    TokenKind::CharLiteral
                } else {
                    TokenKind::Error
                }
            }
            ':' => {
                self.take(spelling);
                if self.peek() == Some('=') {
                    self.take(spelling);
                    TokenKind::Becomes
                } else {
                    TokenKind::Colon
                }
            }
            _ => {
                self.take(spelling);
                match ch {
                    '.' => TokenKind::Dot,
                    ';' => TokenKind::Semicolon,
                    ',' => TokenKind::Comma,
                    '~' => TokenKind::Is,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    '{' => TokenKind::LCurly,
                    '}' => TokenKind::RCurly,
                    _ => TokenKind::Error,
                }
            }
        }
    }
}

/// Yields every token up to and including the first `EndOfText`.
impl Iterator for Scanner {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::EndOfText {
            self.finished = true;
        }
        Some(token)
    }
}
