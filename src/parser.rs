//! Recursive descent parser for ion script token streams
//!
//! One pass does both the context-sensitive syntax checks and the tree
//! build; import workers run the same pass in check-only mode and throw the
//! tree away. The first violation aborts the parse for the whole file.

use crate::error::{CompileError, CompileErrorKind, Result};
use crate::functions;
use crate::lexer::{unquote_checked, Token, TokenKind};
use crate::tree::{Argument, ObjectNode, PropertyNode, ScriptTree};
use crate::types::{named_color, parse_hex_color};

/// Drop whitespace and comment tokens ahead of parsing.
pub fn pre_parse(tokens: Vec<Token>) -> Vec<Token> {
    tokens
        .into_iter()
        .filter(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment))
        .collect()
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    file: String,
}

impl Parser {
    /// `tokens` must already be pre-parsed (no whitespace or comments).
    /// `file` is the diagnostic fallback for an empty stream.
    pub fn new(tokens: Vec<Token>, file: String) -> Self {
        Self {
            tokens,
            current: 0,
            file,
        }
    }

    /// Full parse into a tree.
    pub fn parse(mut self) -> Result<ScriptTree> {
        let mut objects = Vec::new();
        while !self.is_at_end() {
            if self.skip_import_statement()? {
                continue;
            }
            objects.push(self.parse_object()?);
        }
        Ok(ScriptTree::new(objects))
    }

    /// Syntax check only; used by import workers, which lex and check but
    /// never build trees.
    pub fn check(self) -> Result<()> {
        self.parse().map(|_| ())
    }

    /// Import statements are legal only at the top level. Tree compilation
    /// splices them away before parsing; standalone checks skip them here.
    fn skip_import_statement(&mut self) -> Result<bool> {
        if self.peek().map(|t| t.kind) != Some(TokenKind::Rule) {
            return Ok(false);
        }
        let rule = self.advance().clone();
        if rule.lexeme != "@import" {
            return Err(self.unexpected(&rule));
        }
        let path = self.advance_or_eof()?.clone();
        if path.kind != TokenKind::StringLiteral {
            return Err(CompileError::new(
                CompileErrorKind::MissingImportFile,
                rule.file,
                rule.line,
            ));
        }
        let semicolon = self.advance_or_eof()?.clone();
        if !semicolon.is_separator(';') {
            return Err(CompileError::new(
                CompileErrorKind::MissingImportFile,
                rule.file,
                rule.line,
            ));
        }
        Ok(true)
    }

    /// `identifier "selector"? { properties and nested objects }`
    fn parse_object(&mut self) -> Result<ObjectNode> {
        let name_token = self.advance_or_eof()?.clone();
        if name_token.kind != TokenKind::Identifier {
            return Err(self.unexpected(&name_token));
        }

        let mut object = ObjectNode::new(name_token.lexeme.clone());

        // Right after the object-signature identifier an optional selector
        // string may appear; only `{` or a string is legal here.
        let next = self.advance_or_eof()?.clone();
        let brace = if next.kind == TokenKind::StringLiteral {
            object.selector = Some(unquote_checked(&next.lexeme, &next.file, next.line)?);
            self.advance_or_eof()?.clone()
        } else {
            next
        };
        if !brace.is_separator('{') {
            return Err(self.unexpected(&brace));
        }

        loop {
            let token = self.peek_or_close_error(&name_token)?.clone();
            if token.is_separator('}') {
                self.advance();
                break;
            }
            match token.kind {
                TokenKind::Identifier => {
                    // `name :` is a property, `name {` or `name "sel" {`
                    // opens a nested object.
                    if self.peek_ahead(1).map_or(false, |t| t.is_separator(':')) {
                        let property = self.parse_property()?;
                        object.properties.push(property);
                    } else {
                        let child = self.parse_object()?;
                        object.children.push(child);
                    }
                }
                _ => return Err(self.unexpected(&token)),
            }
        }

        Ok(object)
    }

    /// `identifier : value (, value)* ;`
    fn parse_property(&mut self) -> Result<PropertyNode> {
        let name_token = self.advance_or_eof()?.clone();
        self.expect_separator(':')?;

        let mut arguments = Vec::new();
        self.parse_value(&mut arguments)?;
        loop {
            let token = self.advance_or_eof()?.clone();
            if token.is_separator(';') {
                break;
            }
            if token.is_separator(',') {
                self.parse_value(&mut arguments)?;
            } else {
                return Err(self.unexpected(&token));
            }
        }

        Ok(PropertyNode::new(name_token.lexeme, arguments))
    }

    /// One value; appends one argument, or several when an unrecognized
    /// constructor call passes its arguments through unfolded.
    fn parse_value(&mut self, arguments: &mut Vec<Argument>) -> Result<()> {
        let token = self.advance_or_eof()?.clone();
        match token.kind {
            TokenKind::BooleanLiteral => {
                arguments.push(Argument::Boolean(token.lexeme == "true"));
            }
            TokenKind::StringLiteral => {
                arguments.push(Argument::String(unquote_checked(
                    &token.lexeme,
                    &token.file,
                    token.line,
                )?));
            }
            TokenKind::HexLiteral => {
                // Including the `#`, only lengths 4, 5, 7, and 9 are legal.
                if !matches!(token.lexeme.len(), 4 | 5 | 7 | 9) {
                    return Err(CompileError::new(
                        CompileErrorKind::UnexpectedLiteral,
                        token.file,
                        token.line,
                    ));
                }
                arguments.push(Argument::Color(parse_hex_color(
                    &token.lexeme,
                    &token.file,
                    token.line,
                )?));
            }
            TokenKind::NumericLiteral => {
                arguments.push(self.numeric_argument(&token, 1.0)?);
            }
            TokenKind::Operator => {
                // Unary sign, legal only directly before a numeric literal.
                let sign = match token.lexeme.as_str() {
                    "-" => -1.0,
                    "+" => 1.0,
                    _ => return Err(self.unexpected(&token)),
                };
                let number = self.advance_or_eof()?.clone();
                if number.kind != TokenKind::NumericLiteral {
                    return Err(CompileError::new(
                        CompileErrorKind::UnexpectedOperator,
                        token.file,
                        token.line,
                    ));
                }
                arguments.push(self.numeric_argument(&number, sign)?);
            }
            TokenKind::Identifier => {
                // Bare identifiers in argument position are enumerables or
                // recognized color names.
                match named_color(&token.lexeme) {
                    Some(color) => arguments.push(Argument::Color(color)),
                    None => arguments.push(Argument::Enumerable(token.lexeme)),
                }
            }
            TokenKind::Function => {
                self.parse_function_call(&token, arguments)?;
            }
            _ => return Err(self.unexpected(&token)),
        }
        Ok(())
    }

    /// A numeric literal with its optional trailing unit. `%` normalizes
    /// to a float fraction; other units leave the value to the engine.
    fn numeric_argument(&mut self, token: &Token, sign: f32) -> Result<Argument> {
        let is_float = token.lexeme.contains(['.', 'e', 'E']);
        let invalid = || {
            CompileError::new(
                CompileErrorKind::UnexpectedLiteral,
                token.file.clone(),
                token.line,
            )
        };

        let unit = if self.peek().map(|t| t.kind) == Some(TokenKind::Unit) {
            Some(self.advance().lexeme.clone())
        } else {
            None
        };

        if unit.as_deref() == Some("%") {
            let value: f32 = token.lexeme.parse().map_err(|_| invalid())?;
            return Ok(Argument::FloatingPoint(sign * value / 100.0));
        }

        if is_float {
            let value: f32 = token.lexeme.parse().map_err(|_| invalid())?;
            Ok(Argument::FloatingPoint(sign * value))
        } else {
            let value: i32 = token.lexeme.parse().map_err(|_| invalid())?;
            Ok(Argument::Integer(sign as i32 * value))
        }
    }

    /// `name(arg, arg, ...)`. `calc()` alone admits binary arithmetic;
    /// everything else is a constructor call with value arguments.
    fn parse_function_call(&mut self, name_token: &Token, arguments: &mut Vec<Argument>) -> Result<()> {
        self.expect_separator('(')?;

        if name_token.lexeme == "calc" {
            let argument = self.parse_calc(name_token)?;
            arguments.push(argument);
            return Ok(());
        }

        let mut call_arguments = Vec::new();
        let closed = self
            .peek_or_close_error(name_token)?
            .is_separator(')');
        if closed {
            self.advance();
        } else {
            self.parse_value(&mut call_arguments)?;
            loop {
                let token = self.advance_or_eof()?.clone();
                if token.is_separator(')') {
                    break;
                }
                if token.is_separator(',') {
                    self.parse_value(&mut call_arguments)?;
                } else {
                    return Err(self.unexpected(&token));
                }
            }
        }

        match functions::evaluate(
            &name_token.lexeme,
            &call_arguments,
            &name_token.file,
            name_token.line,
        )? {
            Some(folded) => arguments.push(folded),
            // Not a recognized constructor: the raw arguments go through.
            None => arguments.append(&mut call_arguments),
        }
        Ok(())
    }

    /// Collect the arithmetic expression inside `calc( ... )` and evaluate
    /// it. Numbers, `+ - * /`, and nested parentheses only.
    fn parse_calc(&mut self, name_token: &Token) -> Result<Argument> {
        let mut expression = String::new();
        let mut depth = 1usize;
        loop {
            let token = self.advance_or_eof()?.clone();
            match token.kind {
                TokenKind::Separator if token.is_separator('(') => {
                    depth += 1;
                    expression.push('(');
                }
                TokenKind::Separator if token.is_separator(')') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    expression.push(')');
                }
                TokenKind::NumericLiteral | TokenKind::Operator => {
                    expression.push_str(&token.lexeme);
                    expression.push(' ');
                }
                _ => return Err(self.unexpected(&token)),
            }
        }
        functions::evaluate_calc(&expression, &name_token.file, name_token.line)
    }

    // Utility methods

    fn unexpected(&self, token: &Token) -> CompileError {
        let kind = match token.kind {
            TokenKind::Identifier => CompileErrorKind::UnexpectedIdentifier,
            TokenKind::Function => CompileErrorKind::UnexpectedFunction,
            TokenKind::Rule => CompileErrorKind::UnexpectedRule,
            TokenKind::Unit => CompileErrorKind::UnexpectedUnit,
            TokenKind::Separator => CompileErrorKind::UnexpectedSeparator,
            TokenKind::Operator => CompileErrorKind::UnexpectedOperator,
            TokenKind::BooleanLiteral
            | TokenKind::HexLiteral
            | TokenKind::NumericLiteral
            | TokenKind::StringLiteral => CompileErrorKind::UnexpectedLiteral,
            _ => CompileErrorKind::UnknownSymbol,
        };
        CompileError::new(kind, token.file.clone(), token.line)
    }

    fn eof_error(&self) -> CompileError {
        let (file, line) = self
            .tokens
            .last()
            .map(|t| (t.file.clone(), t.line))
            .unwrap_or_else(|| (self.file.clone(), 1));
        CompileError::new(CompileErrorKind::MissingSeparator, file, line)
    }

    /// A body that hits end of input is missing its closing brace.
    fn peek_or_close_error(&self, opened_by: &Token) -> Result<&Token> {
        if self.is_at_end() {
            let line = self.tokens.last().map(|t| t.line).unwrap_or(opened_by.line);
            return Err(CompileError::new(
                CompileErrorKind::MissingSeparator,
                opened_by.file.clone(),
                line,
            ));
        }
        Ok(&self.tokens[self.current])
    }

    fn expect_separator(&mut self, ch: char) -> Result<()> {
        let token = self.advance_or_eof()?.clone();
        if token.is_separator(ch) {
            Ok(())
        } else {
            Err(self.unexpected(&token))
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_ahead(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset)
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.current];
        self.current += 1;
        token
    }

    fn advance_or_eof(&mut self) -> Result<&Token> {
        if self.is_at_end() {
            return Err(self.eof_error());
        }
        Ok(self.advance())
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }
}
