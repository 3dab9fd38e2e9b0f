//! Recursive-descent parser producing [`Program`] trees.

use std::collections::HashMap;
use std::sync::Arc;

use loop_core::errors::LoopError;

use super::ast::{BinaryOp, Expr, FnDef, LogicalOp, Program, Stmt, StmtKind, UnaryOp};
use super::lexer::{syntax_error, tokenize, Token, TokenKind};

/// Deepest expression/block nesting accepted before parsing gives up. Each
/// link of an operator, index or method chain counts as one level, since
/// evaluation recurses once per link.
pub const MAX_NESTING: usize = 64;

pub type ParseResult<T> = Result<T, LoopError>;

/// Parses `source` into a program. Syntax problems are `Compilation` errors
/// carrying the line and column of the offending token.
pub fn parse(source: &str) -> ParseResult<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        loop_depth: 0,
        in_function: false,
    };
    parser.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    loop_depth: usize,
    in_function: bool,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> LoopError {
        let token = self.current();
        syntax_error(token.line, token.column, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {what}, found {}",
                self.peek().describe()
            )))
        }
    }

    fn ident(&mut self, what: &str) -> ParseResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected {what}, found {}", other.describe()))),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), TokenKind::Newline | TokenKind::Semi) {
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Enters one more link of a left-associative chain.
    fn link(&mut self, links: &mut usize) -> ParseResult<()> {
        self.enter()?;
        *links += 1;
        Ok(())
    }

    fn unlink(&mut self, links: usize) {
        self.depth -= links;
    }

    fn program(&mut self) -> ParseResult<Program> {
        let mut functions = HashMap::new();
        let mut body = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::Eof) {
            if self.check(&TokenKind::Fn) {
                let def = self.function()?;
                if functions.contains_key(&def.name) {
                    return Err(syntax_error(
                        def.line,
                        1,
                        format!("function '{}' is defined twice", def.name),
                    ));
                }
                functions.insert(def.name.clone(), Arc::new(def));
            } else {
                body.push(self.statement()?);
            }
            self.end_of_statement()?;
        }
        Ok(Program { functions, body })
    }

    fn end_of_statement(&mut self) -> ParseResult<()> {
        match self.peek() {
            TokenKind::Newline | TokenKind::Semi => {
                self.skip_separators();
                Ok(())
            }
            TokenKind::Eof | TokenKind::RBrace => Ok(()),
            other => Err(self.error(format!(
                "expected end of statement, found {}",
                other.describe()
            ))),
        }
    }

    fn function(&mut self) -> ParseResult<FnDef> {
        let line = self.expect(TokenKind::Fn, "'fn'")?.line;
        let name = self.ident("function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let param = self.ident("parameter name")?;
            if params.contains(&param) {
                return Err(self.error(format!("duplicate parameter '{param}'")));
            }
            params.push(param);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.in_function = true;
        let body = self.block();
        self.in_function = false;
        self.loop_depth = outer_loops;
        Ok(FnDef {
            name,
            params,
            body: body?,
            line,
        })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.enter()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error("unexpected end of input, expected '}'"));
            }
            if self.check(&TokenKind::Fn) {
                return Err(self.error("functions may only be defined at the top level"));
            }
            stmts.push(self.statement()?);
            self.end_of_statement()?;
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        self.leave();
        Ok(stmts)
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let line = self.current().line;
        let kind = match self.peek().clone() {
            TokenKind::Use => {
                self.advance();
                StmtKind::Use(self.ident("module name")?)
            }
            TokenKind::Let => {
                self.advance();
                let name = self.ident("variable name")?;
                self.expect(TokenKind::Assign, "'='")?;
                StmtKind::Let(name, self.expression()?)
            }
            TokenKind::If => self.if_statement()?,
            TokenKind::While => {
                self.advance();
                let cond = self.expression()?;
                let body = self.loop_body()?;
                StmtKind::While { cond, body }
            }
            TokenKind::For => {
                self.advance();
                let var = self.ident("loop variable")?;
                self.expect(TokenKind::In, "'in'")?;
                let iter = self.expression()?;
                let body = self.loop_body()?;
                StmtKind::For { var, iter, body }
            }
            TokenKind::Break | TokenKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(self.error("'break' and 'continue' must appear inside a loop"));
                }
                if self.advance().kind == TokenKind::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            TokenKind::Return => {
                if !self.in_function {
                    return Err(self.error("'return' outside of a function"));
                }
                self.advance();
                if matches!(
                    self.peek(),
                    TokenKind::Newline | TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof
                ) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.expression()?))
                }
            }
            _ => self.expression_statement()?,
        };
        Ok(Stmt { kind, line })
    }

    fn loop_body(&mut self) -> ParseResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body
    }

    fn if_statement(&mut self) -> ParseResult<StmtKind> {
        let mut branches = Vec::new();
        let mut otherwise = None;
        self.expect(TokenKind::If, "'if'")?;
        loop {
            let cond = self.expression()?;
            let body = self.block()?;
            branches.push((cond, body));
            // `else` may follow the closing brace on the next line.
            let save = self.pos;
            self.skip_newlines();
            if !self.eat(&TokenKind::Else) {
                self.pos = save;
                break;
            }
            if self.eat(&TokenKind::If) {
                continue;
            }
            otherwise = Some(self.block()?);
            break;
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn expression_statement(&mut self) -> ParseResult<StmtKind> {
        let target = self.expression()?;
        if !self.eat(&TokenKind::Assign) {
            return Ok(StmtKind::Expr(target));
        }
        let value = self.expression()?;
        match target {
            Expr::Name(name) => Ok(StmtKind::Assign(name, value)),
            Expr::Index { .. } => {
                let mut indices = Vec::new();
                let mut cursor = target;
                loop {
                    match cursor {
                        Expr::Index { target, index } => {
                            indices.push(*index);
                            cursor = *target;
                        }
                        Expr::Name(name) => {
                            indices.reverse();
                            return Ok(StmtKind::IndexAssign {
                                name,
                                indices,
                                value,
                            });
                        }
                        _ => return Err(self.error("invalid assignment target")),
                    }
                }
            }
            _ => Err(self.error("invalid assignment target")),
        }
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let expr = self.or_expr();
        self.leave();
        expr
    }

    fn or_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.and_expr()?;
        let mut links = 0;
        while self.eat(&TokenKind::Or) {
            self.link(&mut links)?;
            let rhs = self.and_expr()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn and_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.not_expr()?;
        let mut links = 0;
        while self.eat(&TokenKind::And) {
            self.link(&mut links)?;
            let rhs = self.not_expr()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn not_expr(&mut self) -> ParseResult<Expr> {
        if self.eat(&TokenKind::Not) {
            self.enter()?;
            let expr = self.not_expr();
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr?),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::In => BinaryOp::In,
            TokenKind::Not => {
                let next = self.tokens.get(self.pos + 1).map(|token| &token.kind);
                if next != Some(&TokenKind::In) {
                    return Ok(lhs);
                }
                self.advance();
                BinaryOp::NotIn
            }
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.unlink(links);
                    return Ok(lhs);
                }
            };
            self.advance();
            self.link(&mut links)?;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => {
                    self.unlink(links);
                    return Ok(lhs);
                }
            };
            self.advance();
            self.link(&mut links)?;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.eat(&TokenKind::Minus) {
            self.enter()?;
            let expr = self.unary();
            self.leave();
            return Ok(match expr? {
                Expr::Int(value) => Expr::Int(-value),
                Expr::Float(value) => Expr::Float(-value),
                other => Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(other),
                },
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            match self.peek() {
                TokenKind::LBracket => {
                    self.advance();
                    self.link(&mut links)?;
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    self.link(&mut links)?;
                    let name = self.ident("attribute name")?;
                    if self.check(&TokenKind::LParen) {
                        let args = self.arguments()?;
                        expr = Expr::MethodCall {
                            receiver: Box::new(expr),
                            name,
                            args,
                        };
                    } else {
                        expr = Expr::Attr {
                            receiver: Box::new(expr),
                            name,
                        };
                    }
                }
                _ => {
                    self.unlink(links);
                    return Ok(expr);
                }
            }
        }
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.advance();
        Ok(match token.kind {
            TokenKind::Null => Expr::Null,
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
            TokenKind::Int(value) => Expr::Int(value),
            TokenKind::Float(value) => Expr::Float(value),
            TokenKind::Str(value) => Expr::Str(value),
            TokenKind::Ident(name) => {
                if self.check(&TokenKind::LParen) {
                    let args = self.arguments()?;
                    Expr::Call { name, args }
                } else {
                    Expr::Name(name)
                }
            }
            TokenKind::LParen => {
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                expr
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    items.push(self.expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Expr::List(items)
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                self.skip_newlines();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.expression()?;
                    self.expect(TokenKind::Colon, "':'")?;
                    self.skip_newlines();
                    let value = self.expression()?;
                    entries.push((key, value));
                    self.skip_newlines();
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                    self.skip_newlines();
                }
                self.skip_newlines();
                self.expect(TokenKind::RBrace, "'}'")?;
                Expr::Map(entries)
            }
            other => {
                return Err(syntax_error(
                    token.line,
                    token.column,
                    format!("unexpected {}", other.describe()),
                ))
            }
        })
    }
}
