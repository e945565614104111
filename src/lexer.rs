//! Lexical analysis for ion script source text

use crate::error::{CompileError, CompileErrorKind, Result};
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Comment,
    Identifier,
    Function,
    Rule,
    Unit,
    Separator,
    Operator,
    BooleanLiteral,
    HexLiteral,
    NumericLiteral,
    StringLiteral,
    Unknown,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::Comment => "comment",
            TokenKind::Identifier => "identifier",
            TokenKind::Function => "function",
            TokenKind::Rule => "rule",
            TokenKind::Unit => "unit",
            TokenKind::Separator => "separator",
            TokenKind::Operator => "operator",
            TokenKind::BooleanLiteral => "boolean literal",
            TokenKind::HexLiteral => "hex literal",
            TokenKind::NumericLiteral => "numeric literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Unknown => "unknown symbol",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub file: String,
    pub line: usize,
}

impl Token {
    pub fn is_separator(&self, ch: char) -> bool {
        self.kind == TokenKind::Separator && self.lexeme.chars().next() == Some(ch)
    }

    pub fn is_operator(&self, ch: char) -> bool {
        self.kind == TokenKind::Operator && self.lexeme.chars().next() == Some(ch)
    }
}

/// `@import "path";` recognition runs inline with the scan so imports can
/// be scheduled while the rest of the file is still being lexed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ImportState {
    Outside,
    AwaitingPath { line: usize },
    AwaitingSemicolon { path: String, line: usize },
}

/// Callback used to schedule one recursive import compilation.
/// Receives the quoted path (unquoted) and the line of the statement.
pub type ImportScheduler<'a> = dyn FnMut(&str, usize) -> Result<()> + 'a;

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    file: String,

    numeric_regex: Regex,
    import_state: ImportState,
    // Kind of the immediately preceding token, whitespace included,
    // so `50%` pairs up but `50 %` does not.
    last_kind: Option<TokenKind>,
}

impl Lexer {
    pub fn new(input: &str, file: String) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            file,
            numeric_regex: Regex::new(r"^(\d+(\.\d+)?|\.\d+)([eE][+-]?\d+)?$").unwrap(),
            import_state: ImportState::Outside,
            last_kind: None,
        }
    }

    /// Tokenize without scheduling imports. Import statements are still
    /// recognized and shape-checked; they just go nowhere.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        self.tokenize_with_imports(&mut |_, _| Ok(()))
    }

    /// Tokenize the whole input, invoking `schedule` once per complete
    /// `@import "path";` statement as soon as it is recognized.
    pub fn tokenize_with_imports(&mut self, schedule: &mut ImportScheduler) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            let token = self.next_token();
            self.track_import(&token, schedule)?;
            tokens.push(token);
        }

        if self.import_state != ImportState::Outside {
            return Err(CompileError::new(
                CompileErrorKind::MissingImportFile,
                self.file.clone(),
                self.line,
            ));
        }

        Ok(tokens)
    }

    /// Advance the import state machine by one token.
    fn track_import(&mut self, token: &Token, schedule: &mut ImportScheduler) -> Result<()> {
        if matches!(token.kind, TokenKind::Whitespace | TokenKind::Comment) {
            return Ok(());
        }

        match std::mem::replace(&mut self.import_state, ImportState::Outside) {
            ImportState::Outside => {
                if token.kind == TokenKind::Rule && token.lexeme == "@import" {
                    self.import_state = ImportState::AwaitingPath { line: token.line };
                }
            }
            ImportState::AwaitingPath { line } => {
                if token.kind == TokenKind::StringLiteral {
                    self.import_state = ImportState::AwaitingSemicolon {
                        path: unquote(&token.lexeme),
                        line,
                    };
                } else {
                    return Err(CompileError::new(
                        CompileErrorKind::MissingImportFile,
                        self.file.clone(),
                        line,
                    ));
                }
            }
            ImportState::AwaitingSemicolon { path, line } => {
                if token.is_separator(';') {
                    schedule(&path, line)?;
                } else {
                    return Err(CompileError::new(
                        CompileErrorKind::MissingImportFile,
                        self.file.clone(),
                        line,
                    ));
                }
            }
        }

        Ok(())
    }

    /// Produce the longest token at the current position. Check order
    /// matters: comments before operators (`/` overlaps), words before
    /// operators (leading `-` overlaps).
    fn next_token(&mut self) -> Token {
        let start_line = self.line;
        let start = self.position;

        let ch = self.peek().unwrap_or('\0');
        let previous_numeric = self.last_kind == Some(TokenKind::NumericLiteral);

        let kind = if ch.is_whitespace() {
            self.scan_whitespace()
        } else if is_separator_char(ch) {
            self.advance();
            TokenKind::Separator
        } else if ch == '"' || ch == '\'' {
            self.scan_string(ch)
        } else if ch == '/' && matches!(self.peek_next(), Some('/') | Some('*')) {
            self.scan_comment()
        } else if is_word_start(ch, self.peek_next()) || (previous_numeric && ch == '%') {
            self.scan_word(previous_numeric)
        } else if is_operator_char(ch) {
            self.advance();
            TokenKind::Operator
        } else if ch.is_ascii_digit() || (ch == '.' && self.peek_next().map_or(false, |c| c.is_ascii_digit())) {
            self.scan_numeric()
        } else if ch == '#' && self.peek_next().map_or(false, |c| c.is_ascii_hexdigit()) {
            self.scan_hex()
        } else if ch == '@' && self.peek_next().map_or(false, |c| c.is_alphabetic() || c == '_') {
            self.scan_rule()
        } else {
            self.advance();
            TokenKind::Unknown
        };

        self.last_kind = Some(kind);
        Token {
            kind,
            lexeme: self.input[start..self.position].iter().collect(),
            file: self.file.clone(),
            line: start_line,
        }
    }

    fn scan_whitespace(&mut self) -> TokenKind {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance();
        }
        TokenKind::Whitespace
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        self.advance(); // opening quote
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.advance();
                if self.peek().is_some() {
                    self.advance();
                }
            } else if ch == quote {
                self.advance();
                break;
            } else if ch == '\n' {
                // Unterminated: stop at the newline, leave it for the next scan
                break;
            } else {
                self.advance();
            }
        }
        TokenKind::StringLiteral
    }

    fn scan_comment(&mut self) -> TokenKind {
        self.advance(); // '/'
        if self.peek() == Some('/') {
            while let Some(ch) = self.peek() {
                if ch == '\n' {
                    break;
                }
                self.advance();
            }
        } else {
            self.advance(); // '*'
            while let Some(ch) = self.peek() {
                if ch == '*' && self.peek_next() == Some('/') {
                    self.advance();
                    self.advance();
                    break;
                }
                self.advance();
            }
        }
        TokenKind::Comment
    }

    fn scan_word(&mut self, previous_numeric: bool) -> TokenKind {
        let start = self.position;
        if self.peek() == Some('%') {
            self.advance();
            return TokenKind::Unit;
        }

        self.advance();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                self.advance();
            } else {
                break;
            }
        }

        if previous_numeric {
            return TokenKind::Unit;
        }

        let lexeme: String = self.input[start..self.position].iter().collect();
        if lexeme == "true" || lexeme == "false" {
            TokenKind::BooleanLiteral
        } else if self.peek() == Some('(') {
            TokenKind::Function
        } else {
            TokenKind::Identifier
        }
    }

    fn scan_numeric(&mut self) -> TokenKind {
        let start = self.position;
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut ahead = self.position + 1;
            if matches!(self.input.get(ahead), Some('+') | Some('-')) {
                ahead += 1;
            }
            if self.input.get(ahead).map_or(false, |c| c.is_ascii_digit()) {
                while self.position < ahead {
                    self.advance();
                }
                while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let lexeme: String = self.input[start..self.position].iter().collect();
        if self.numeric_regex.is_match(&lexeme) {
            TokenKind::NumericLiteral
        } else {
            TokenKind::Unknown
        }
    }

    fn scan_hex(&mut self) -> TokenKind {
        self.advance(); // '#'
        while self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
            self.advance();
        }
        TokenKind::HexLiteral
    }

    fn scan_rule(&mut self) -> TokenKind {
        self.advance(); // '@'
        while self.peek().map_or(false, |c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        TokenKind::Rule
    }

    fn advance(&mut self) {
        if let Some(&ch) = self.input.get(self.position) {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

fn is_separator_char(ch: char) -> bool {
    matches!(ch, ':' | ';' | '{' | '}' | '(' | ')' | ',')
}

fn is_operator_char(ch: char) -> bool {
    matches!(ch, '-' | '+' | '*' | '/')
}

/// Words may lead with `-` (CSS-style identifiers), which is why words are
/// tried before operators.
fn is_word_start(ch: char, next: Option<char>) -> bool {
    ch.is_alphabetic()
        || ch == '_'
        || (ch == '-' && next.map_or(false, |c| c.is_alphabetic() || c == '_'))
}

/// Strip quotes from a string lexeme and resolve escape sequences.
/// Fails on a lexeme whose closing quote never arrived.
pub fn unquote_checked(lexeme: &str, file: &str, line: usize) -> Result<String> {
    let mut chars = lexeme.chars();
    let quote = chars.next().unwrap_or('"');
    let body: Vec<char> = chars.collect();

    if body.last() != Some(&quote) || body.is_empty() {
        return Err(CompileError::new(
            CompileErrorKind::UnexpectedLiteral,
            file,
            line,
        ));
    }

    let mut out = String::new();
    let mut iter = body[..body.len() - 1].iter();
    while let Some(&ch) = iter.next() {
        if ch == '\\' {
            match iter.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(&c) => out.push(c),
                None => break,
            }
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

/// Lenient unquote for contexts where the lexeme is already known good.
pub fn unquote(lexeme: &str) -> String {
    unquote_checked(lexeme, "", 0).unwrap_or_else(|_| {
        let trimmed = lexeme.trim_matches(|c| c == '"' || c == '\'');
        trimmed.to_string()
    })
}
