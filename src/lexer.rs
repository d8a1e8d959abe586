use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Position};
use crate::reader::SourceReader;
use crate::token::{Token, TokenKind};

/// Turns a normalized character stream into tokens.
///
/// Whitespace and `/* ... */` comments are filtered between tokens.
/// Recoverable problems (bad characters, unterminated or oversized
/// literals) are accumulated as diagnostics and lexing continues, so a
/// single run can surface every lexical error in the source.
pub struct Lexer {
    reader: SourceReader,
    config: Config,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer {
    pub fn new(source: &str, config: Config) -> Self {
        Self {
            reader: SourceReader::new(source),
            config,
            diagnostics: Vec::new(),
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_trivia();
            let position = self.reader.position();
            let Some(c) = self.reader.peek(1) else {
                return Token::new(TokenKind::Eof, position);
            };

            if c.is_alphabetic() {
                return self.read_identifier(position);
            }
            if c.is_ascii_digit() {
                if let Some(token) = self.read_number(position) {
                    return token;
                }
                // Invalid literal run was consumed; keep scanning.
                continue;
            }
            if c == '"' {
                return self.read_string(position);
            }
            if let Some(token) = self.read_operator(position) {
                return token;
            }
            // Unknown character: report, skip, continue.
            self.report(DiagnosticKind::InvalidSymbol, position);
            self.reader.advance();
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.reader.peek(1) {
                Some(c) if c.is_whitespace() => {
                    self.reader.advance();
                }
                Some('/') if self.reader.peek(2) == Some('*') => {
                    self.skip_comment();
                }
                _ => return,
            }
        }
    }

    /// Consumes a `/* ... */` comment. The length limit counts every
    /// character from the opening `/` to the closing `/` inclusive.
    fn skip_comment(&mut self) {
        let open = self.reader.position();
        self.reader.advance(); // '/'
        self.reader.advance(); // '*'
        let mut length = 2usize;

        loop {
            let Some(c) = self.reader.advance() else {
                self.report(DiagnosticKind::MissingCommentClose, open);
                return;
            };
            length += 1;
            if c == '*' && self.reader.peek(1) == Some('/') {
                self.reader.advance();
                length += 1;
                break;
            }
        }

        if length > self.config.max_comment_length {
            self.report(DiagnosticKind::MaxCommentLengthExceeded, open);
        }
    }

    fn read_identifier(&mut self, position: Position) -> Token {
        let mut text = String::new();
        let mut reported = false;
        while let Some(c) = self.reader.peek(1) {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.reader.advance();
            if text.chars().count() == self.config.max_identifier_length && !reported {
                self.report(DiagnosticKind::MaxIdentifierLengthExceeded, position);
                reported = true;
            }
            text.push(c);
        }

        match TokenKind::keyword(&text) {
            Some(kind) => Token::new(kind, position),
            None => Token::new(TokenKind::Ident(text), position),
        }
    }

    /// Reads an integer or float literal. Returns `None` when the literal
    /// is malformed (digits glued to identifier characters, or an
    /// overflowing integer); the whole run is consumed in that case.
    fn read_number(&mut self, position: Position) -> Option<Token> {
        let mut text = String::new();
        while let Some(c) = self.reader.peek(1) {
            if !c.is_ascii_digit() {
                break;
            }
            self.reader.advance();
            text.push(c);
        }

        let mut is_float = false;
        if self.reader.peek(1) == Some('.') {
            is_float = true;
            self.reader.advance();
            text.push('.');
            while let Some(c) = self.reader.peek(1) {
                if !c.is_ascii_digit() {
                    break;
                }
                self.reader.advance();
                text.push(c);
            }
        }

        // A literal glued to identifier characters (e.g. `34a7`) is a
        // single invalid run, not two tokens.
        if matches!(self.reader.peek(1), Some(c) if c.is_alphanumeric() || c == '_') {
            self.consume_alphanumeric_run();
            self.report(DiagnosticKind::InvalidValue, position);
            return None;
        }

        if is_float {
            match text.parse::<f64>() {
                Ok(value) => Some(Token::new(TokenKind::Float(value), position)),
                Err(_) => {
                    self.report(DiagnosticKind::InvalidValue, position);
                    None
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => Some(Token::new(TokenKind::Int(value), position)),
                Err(_) => {
                    self.report(DiagnosticKind::InvalidValue, position);
                    None
                }
            }
        }
    }

    fn consume_alphanumeric_run(&mut self) {
        while let Some(c) = self.reader.peek(1) {
            if !(c.is_alphanumeric() || c == '_' || c == '.') {
                break;
            }
            self.reader.advance();
        }
    }

    fn read_string(&mut self, position: Position) -> Token {
        self.reader.advance(); // opening quote
        let mut value = String::new();
        let mut length = 0usize;
        let mut over_limit = false;

        loop {
            let escape_position = self.reader.position();
            let Some(c) = self.reader.advance() else {
                // Unterminated string at end of input.
                self.report(DiagnosticKind::InvalidValue, position);
                break;
            };
            if c == '"' {
                break;
            }

            let resolved = if c == '\\' {
                match self.reader.advance() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some(other) => {
                        self.report(DiagnosticKind::InvalidValue, escape_position);
                        other
                    }
                    None => {
                        self.report(DiagnosticKind::InvalidValue, position);
                        break;
                    }
                }
            } else {
                c
            };

            length += 1;
            if length > self.config.max_string_length {
                if !over_limit {
                    self.report(DiagnosticKind::MaxStringLengthExceeded, position);
                    over_limit = true;
                }
                continue; // keep consuming, stop accumulating
            }
            value.push(resolved);
        }

        Token::new(TokenKind::Str(value), position)
    }

    fn read_operator(&mut self, position: Position) -> Option<Token> {
        let c = self.reader.peek(1)?;
        let next = self.reader.peek(2);

        let (kind, width) = match (c, next) {
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('=', _) => (TokenKind::Assign, 1),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::LessEq, 2),
            ('<', _) => (TokenKind::Less, 1),
            ('>', Some('=')) => (TokenKind::GreaterEq, 2),
            ('>', _) => (TokenKind::Greater, 1),
            ('&', Some('&')) => (TokenKind::And, 2),
            ('|', Some('|')) => (TokenKind::Or, 2),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            _ => return None,
        };

        for _ in 0..width {
            self.reader.advance();
        }
        Some(Token::new(kind, position))
    }

    fn report(&mut self, kind: DiagnosticKind, position: Position) {
        self.diagnostics.push(Diagnostic::new(kind, position));
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Lexes the whole source. The token list always ends with `Eof`; the
/// diagnostics list is empty iff the source lexed cleanly.
pub fn tokenize(source: &str, config: &Config) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer::new(source, config.clone());
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let is_eof = matches!(token.kind, TokenKind::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    (tokens, lexer.into_diagnostics())
}
