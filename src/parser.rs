use std::mem;
use std::rc::Rc;

use crate::ast::{
    AssignTarget, BinaryOp, CtorType, Expr, FuncDef, Param, Program, Stmt, TypeSignature,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Position};
use crate::token::{Token, TokenKind};

type ParseResult<T> = Result<T, Diagnostic>;

/// Recursive-descent parser with single-token lookahead.
///
/// On an error the offending diagnostic is recorded and the parser
/// resynchronizes to the next `;` or the closing `}` of the current
/// block, so one run can report several parse errors. A program with any
/// parse error is not handed to the type checker.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, Position::default()));
        }
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn parse_program(mut self) -> (Program, Vec<Diagnostic>) {
        let mut statements = Vec::new();
        while !self.at(&TokenKind::Eof) {
            let result = if self.at(&TokenKind::Func) {
                self.parse_function_def()
            } else {
                self.parse_block_statement()
            };
            match result {
                Ok(statement) => statements.push(statement),
                Err(diagnostic) => {
                    self.diagnostics.push(diagnostic);
                    self.synchronize();
                }
            }
        }
        (Program { statements }, self.diagnostics)
    }

    // --- Statements ---

    fn parse_block_statement(&mut self) -> ParseResult<Stmt> {
        match &self.current().kind {
            kind if kind.starts_type() => self.parse_var_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Ident(_) => self.parse_ident_statement(),
            _ => {
                let expr = self.parse_expression()?;
                let position = expr.position();
                self.expect_semicolon()?;
                Ok(Stmt::Expr { expr, position })
            }
        }
    }

    fn parse_var_decl(&mut self) -> ParseResult<Stmt> {
        let position = self.current().position;
        let ty = self.parse_type()?;
        let name = self.expect_ident(DiagnosticKind::InvalidDeclaration)?;
        self.expect(&TokenKind::Assign, DiagnosticKind::InvalidDeclaration)?;
        let init = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(Stmt::VarDecl {
            ty,
            name,
            init,
            position,
        })
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let position = self.current().position;
        self.advance(); // 'if'
        self.expect(&TokenKind::LParen, DiagnosticKind::MissingParentheses)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen, DiagnosticKind::MissingParentheses)?;
        let then_block = self.parse_code_block()?;
        let else_block = if self.at(&TokenKind::Else) {
            self.advance();
            Some(self.parse_code_block()?)
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_block,
            else_block,
            position,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let position = self.current().position;
        self.advance(); // 'while'
        self.expect(&TokenKind::LParen, DiagnosticKind::MissingParentheses)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen, DiagnosticKind::MissingParentheses)?;
        let body = self.parse_code_block()?;
        Ok(Stmt::While {
            condition,
            body,
            position,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let position = self.current().position;
        self.advance(); // 'return'
        if self.at(&TokenKind::Semicolon) {
            self.advance();
            return Ok(Stmt::Return {
                value: None,
                position,
            });
        }
        let value = self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(Stmt::Return {
            value: Some(value),
            position,
        })
    }

    /// A statement opening with an identifier: plain assignment, call
    /// statement, or an expression statement (possibly a member
    /// assignment, which the type checker rejects later).
    fn parse_ident_statement(&mut self) -> ParseResult<Stmt> {
        let position = self.current().position;
        if matches!(self.peek_kind(), TokenKind::Assign) {
            let name = self.expect_ident(DiagnosticKind::UnexpectedToken)?;
            self.advance(); // '='
            let value = self.parse_expression()?;
            self.expect_semicolon()?;
            return Ok(Stmt::Assign {
                target: AssignTarget::Name { name, position },
                value,
                position,
            });
        }

        let expr = self.parse_expression()?;
        if self.at(&TokenKind::Assign) {
            self.advance();
            let value = self.parse_expression()?;
            self.expect_semicolon()?;
            let target = match expr {
                Expr::Member {
                    target,
                    name,
                    args: None,
                    position,
                } => AssignTarget::Member {
                    target,
                    name,
                    position,
                },
                other => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::UnexpectedToken,
                        other.position(),
                    ));
                }
            };
            return Ok(Stmt::Assign {
                target,
                value,
                position,
            });
        }
        self.expect_semicolon()?;
        Ok(Stmt::Expr { expr, position })
    }

    fn parse_code_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace, DiagnosticKind::UnexpectedToken)?;
        let mut statements = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            match self.parse_block_statement() {
                Ok(statement) => statements.push(statement),
                Err(diagnostic) => {
                    self.diagnostics.push(diagnostic);
                    self.synchronize();
                }
            }
        }
        self.expect(&TokenKind::RBrace, DiagnosticKind::UnexpectedToken)?;
        Ok(statements)
    }

    // --- Function definitions ---

    fn parse_function_def(&mut self) -> ParseResult<Stmt> {
        let position = self.current().position;
        self.advance(); // 'func'
        let return_type = self.parse_return_type()?;
        let name = self.expect_ident(DiagnosticKind::UnexpectedToken)?;
        self.expect(&TokenKind::LParen, DiagnosticKind::MissingParentheses)?;
        let params = self.parse_params()?;
        self.expect(&TokenKind::RParen, DiagnosticKind::MissingParentheses)?;
        let body = self.parse_function_body()?;
        Ok(Stmt::FuncDef(Rc::new(FuncDef {
            return_type,
            name,
            params,
            body,
            position,
        })))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.at(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let position = self.current().position;
            let ty = self.parse_type()?;
            let name = self.expect_ident(DiagnosticKind::InvalidDeclaration)?;
            params.push(Param { ty, name, position });
            if !self.at(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(params)
    }

    /// A function body is a code block whose last statement must be a
    /// `return` (also for `void` functions). Reaching the closing brace
    /// without one is an error at the brace.
    fn parse_function_body(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace, DiagnosticKind::UnexpectedToken)?;
        let mut statements = Vec::new();
        loop {
            if self.at(&TokenKind::RBrace) || self.at(&TokenKind::Eof) {
                let ends_with_return = matches!(statements.last(), Some(Stmt::Return { .. }));
                if !ends_with_return {
                    let at = self.current().position;
                    self.advance_if(&TokenKind::RBrace);
                    return Err(Diagnostic::new(DiagnosticKind::UnexpectedToken, at));
                }
                self.expect(&TokenKind::RBrace, DiagnosticKind::UnexpectedToken)?;
                return Ok(statements);
            }
            match self.parse_block_statement() {
                Ok(statement) => statements.push(statement),
                Err(diagnostic) => {
                    self.diagnostics.push(diagnostic);
                    self.synchronize();
                }
            }
        }
    }

    // --- Types ---

    fn parse_type(&mut self) -> ParseResult<TypeSignature> {
        let token = self.advance();
        let ty = match token.kind {
            TokenKind::IntKw => TypeSignature::Int,
            TokenKind::FloatKw => TypeSignature::Float,
            TokenKind::BoolKw => TypeSignature::Bool,
            TokenKind::StringKw => TypeSignature::Str,
            TokenKind::Folder => TypeSignature::Folder,
            TokenKind::File => TypeSignature::File,
            TokenKind::Audio => TypeSignature::Audio,
            TokenKind::List => {
                self.expect(&TokenKind::Less, DiagnosticKind::UnexpectedToken)?;
                let element = self.parse_type()?;
                self.expect(&TokenKind::Greater, DiagnosticKind::UnexpectedToken)?;
                TypeSignature::List(Box::new(element))
            }
            _ => {
                return Err(Diagnostic::new(
                    DiagnosticKind::UnexpectedToken,
                    token.position,
                ));
            }
        };
        Ok(ty)
    }

    fn parse_return_type(&mut self) -> ParseResult<TypeSignature> {
        if self.at(&TokenKind::Void) {
            self.advance();
            return Ok(TypeSignature::Void);
        }
        self.parse_type()
    }

    // --- Expressions ---

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.at(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_comparison()?;
        while self.at(&TokenKind::And) {
            self.advance();
            let right = self.parse_comparison()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        Ok(expr)
    }

    /// Comparison is non-associative: `a < b < c` is an error at the
    /// second operator.
    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(expr);
        };
        self.advance();
        let right = self.parse_additive()?;
        if self.comparison_op().is_some() {
            return Err(Diagnostic::new(
                DiagnosticKind::UnexpectedToken,
                self.current().position,
            ));
        }
        Ok(binary(op, expr, right))
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        let op = match self.current().kind {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEq => BinaryOp::LessEq,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEq => BinaryOp::GreaterEq,
            _ => return None,
        };
        Some(op)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.at(&TokenKind::Minus) {
            let position = self.current().position;
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Negate {
                operand: Box::new(operand),
                position,
            });
        }
        self.parse_postfix()
    }

    /// A primary followed by a left-associative chain of `.name` or
    /// `.name(args)`.
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        while self.at(&TokenKind::Dot) {
            self.advance();
            let name = self.expect_ident(DiagnosticKind::UnexpectedToken)?;
            let args = if self.at(&TokenKind::LParen) {
                Some(self.parse_args()?)
            } else {
                None
            };
            let position = expr.position();
            expr = Expr::Member {
                target: Box::new(expr),
                name,
                args,
                position,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let position = self.current().position;
        match &self.current().kind {
            TokenKind::Int(value) => {
                let value = *value;
                self.advance();
                Ok(Expr::IntLit { value, position })
            }
            TokenKind::Float(value) => {
                let value = *value;
                self.advance();
                Ok(Expr::FloatLit { value, position })
            }
            TokenKind::Str(value) => {
                let value = value.clone();
                self.advance();
                Ok(Expr::StringLit { value, position })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::BoolLit {
                    value: true,
                    position,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::BoolLit {
                    value: false,
                    position,
                })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::NullLit { position })
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                if self.at(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    return Ok(Expr::Call {
                        name,
                        args,
                        position,
                    });
                }
                Ok(Expr::Ident { name, position })
            }
            TokenKind::Folder | TokenKind::File | TokenKind::Audio => {
                let ctor = match self.current().kind {
                    TokenKind::Folder => CtorType::Folder,
                    TokenKind::File => CtorType::File,
                    _ => CtorType::Audio,
                };
                self.advance();
                let args = self.parse_args()?;
                Ok(Expr::Ctor {
                    ctor,
                    args,
                    position,
                })
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.at(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expression()?);
                        if !self.at(&TokenKind::Comma) {
                            break;
                        }
                        self.advance();
                    }
                }
                self.expect(&TokenKind::RBracket, DiagnosticKind::UnexpectedToken)?;
                Ok(Expr::ListLit { items, position })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen, DiagnosticKind::MissingParentheses)?;
                Ok(expr)
            }
            _ => Err(Diagnostic::new(DiagnosticKind::UnexpectedToken, position)),
        }
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen, DiagnosticKind::MissingParentheses)?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.at(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(&TokenKind::RParen, DiagnosticKind::MissingParentheses)?;
        Ok(args)
    }

    // --- Token plumbing ---

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|token| &token.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        mem::discriminant(&self.current().kind) == mem::discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn advance_if(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, diagnostic: DiagnosticKind) -> ParseResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(Diagnostic::new(diagnostic, self.current().position))
        }
    }

    fn expect_semicolon(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Semicolon, DiagnosticKind::UnexpectedToken)?;
        Ok(())
    }

    fn expect_ident(&mut self, diagnostic: DiagnosticKind) -> ParseResult<String> {
        if let TokenKind::Ident(name) = &self.current().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(Diagnostic::new(diagnostic, self.current().position))
        }
    }

    /// Skips tokens until the next `;` at the current nesting depth
    /// (consumed) or the `}` closing the current block (left in place).
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current().kind {
                TokenKind::Eof => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let position = left.position();
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        position,
    }
}

/// Parses a full token stream. Any recorded diagnostic invalidates the
/// returned tree for later stages.
pub fn parse_tokens(tokens: Vec<Token>) -> (Program, Vec<Diagnostic>) {
    Parser::new(tokens).parse_program()
}
