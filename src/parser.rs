//! Parser for Nori.
//!
//! Recursive descent with precedence climbing for binary expressions and
//! postfix chains (call, index, member access). Error recovery is at
//! statement/declaration granularity: on an unexpected token the parser
//! records a diagnostic and skips to the next plausible synchronization
//! point, so downstream phases always receive a (possibly partial) tree.

use crate::ast::*;
use crate::diagnostics::{Diagnostics, codes};
use crate::lexer::{decode_escapes, lex};
use crate::span::SourceSpan;
use crate::token::{LiteralValue, Token, TokenKind};
use std::path::{Path, PathBuf};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: PathBuf,
    diags: &'a mut Diagnostics,
}

/// Parse a token stream into a module. `Error` tokens are dropped up front;
/// the lexer has already reported them.
pub fn parse(tokens: Vec<Token>, file: &Path, diags: &mut Diagnostics) -> Module {
    Parser::new(tokens, file, diags).parse_module()
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, file: &Path, diags: &'a mut Diagnostics) -> Self {
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Error)
            .collect();
        Parser {
            tokens,
            pos: 0,
            file: file.to_path_buf(),
            diags,
        }
    }

    pub fn parse_module(&mut self) -> Module {
        let mut module = Module::default();
        while !self.at_end() {
            let before = self.pos;
            match self.parse_decl() {
                Some(decl) => module.decls.push(decl),
                None => {
                    self.synchronize();
                    if self.pos == before && !self.at_end() {
                        self.advance();
                    }
                }
            }
        }
        module
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_decl(&mut self) -> Option<Decl> {
        match self.peek_kind() {
            TokenKind::Pub => {
                let pub_tok = self.advance();
                if self.peek_kind() != TokenKind::Let {
                    self.diags.error(
                        codes::PUB_WITHOUT_LET,
                        "'pub' must be followed by 'let'",
                        pub_tok.span,
                    );
                    return None;
                }
                self.advance(); // let
                self.parse_var_decl(pub_tok.span, true, SyncMode::NotSynced)
                    .map(Decl::Variable)
            }
            TokenKind::Sync => {
                let sync_tok = self.advance();
                let mode_tok = self.expect(TokenKind::Ident, "sync mode")?;
                let Some(mode) = SyncMode::from_ident(&mode_tok.text) else {
                    self.diags.error(
                        codes::INVALID_SYNC_MODE,
                        format!(
                            "invalid sync mode '{}'; expected none, linear, or smooth",
                            mode_tok.text
                        ),
                        mode_tok.span,
                    );
                    return None;
                };
                self.parse_var_decl(sync_tok.span, false, mode)
                    .map(Decl::Variable)
            }
            TokenKind::Let => {
                let let_tok = self.advance();
                self.parse_var_decl(let_tok.span, false, SyncMode::NotSynced)
                    .map(Decl::Variable)
            }
            TokenKind::Fn => self.parse_fn_decl().map(Decl::Function),
            TokenKind::On => self.parse_event_handler().map(Decl::EventHandler),
            TokenKind::Event => self.parse_custom_event().map(Decl::CustomEvent),
            _ => {
                let tok = self.peek().clone();
                self.diags.error(
                    codes::UNEXPECTED_TOKEN,
                    format!("expected a declaration, found {}", tok.kind.describe()),
                    tok.span,
                );
                None
            }
        }
    }

    /// The `name: type [= init]` tail shared by `let`, `pub let`, and
    /// `sync <mode>` declarations.
    fn parse_var_decl(
        &mut self,
        start: SourceSpan,
        is_public: bool,
        sync: SyncMode,
    ) -> Option<VarDecl> {
        let name = self.expect(TokenKind::Ident, "variable name")?;
        self.expect(TokenKind::Colon, "':' after variable name")?;
        let (ty, is_array) = self.parse_type()?;
        let init = if self.check(TokenKind::Assign) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        let span = start.merge(&self.prev_span());
        Some(VarDecl {
            name: name.text,
            ty,
            is_array,
            is_public,
            sync,
            init,
            span,
            resolved_ty: None,
        })
    }

    fn parse_fn_decl(&mut self) -> Option<FnDecl> {
        let fn_tok = self.advance();
        let name = self.expect(TokenKind::Ident, "function name")?;
        self.expect(TokenKind::LParen, "'(' after function name")?;
        let params = self.parse_params()?;
        let return_ty = if self.check(TokenKind::Arrow) {
            self.advance();
            let (ty, is_array) = self.parse_type()?;
            Some(if is_array { format!("{}[]", ty) } else { ty })
        } else {
            None
        };
        let body = self.parse_block()?;
        let span = fn_tok.span.merge(&self.prev_span());
        Some(FnDecl {
            name: name.text,
            params,
            return_ty,
            body,
            span,
            resolved_ret: None,
        })
    }

    fn parse_event_handler(&mut self) -> Option<EventDecl> {
        let on_tok = self.advance();
        let name = self.expect(TokenKind::Ident, "event name after 'on'")?;
        let params = if self.check(TokenKind::LParen) {
            self.advance();
            self.parse_params()?
        } else {
            Vec::new()
        };
        let body = self.parse_block()?;
        let span = on_tok.span.merge(&self.prev_span());
        Some(EventDecl {
            name: name.text,
            params,
            body,
            span,
        })
    }

    fn parse_custom_event(&mut self) -> Option<CustomEventDecl> {
        let event_tok = self.advance();
        let name = self.expect(TokenKind::Ident, "event name after 'event'")?;
        let body = self.parse_block()?;
        let span = event_tok.span.merge(&self.prev_span());
        Some(CustomEventDecl {
            name: name.text,
            body,
            span,
        })
    }

    /// Parameter list up to and including the closing paren.
    fn parse_params(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            self.advance();
            return Some(params);
        }
        loop {
            let name = self.expect(TokenKind::Ident, "parameter name")?;
            self.expect(TokenKind::Colon, "':' after parameter name")?;
            let (ty, is_array) = self.parse_type()?;
            let span = name.span.merge(&self.prev_span());
            params.push(Param {
                name: name.text,
                ty,
                is_array,
                span,
                resolved_ty: None,
            });
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            self.expect(TokenKind::RParen, "')' after parameters")?;
            return Some(params);
        }
    }

    /// A surface type: identifier with an optional `[]` suffix.
    fn parse_type(&mut self) -> Option<(String, bool)> {
        let name = self.expect(TokenKind::Ident, "type name")?;
        if self.check(TokenKind::LBracket) {
            self.advance();
            self.expect(TokenKind::RBracket, "']' in array type")?;
            Some((name.text, true))
        } else {
            Some((name.text, false))
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> Option<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_end() {
            let before = self.pos;
            match self.parse_stmt() {
                Some(stmt) => body.push(stmt),
                None => {
                    self.synchronize();
                    if self.pos == before && !self.at_end() && !self.check(TokenKind::RBrace) {
                        self.advance();
                    }
                }
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Some(body)
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.peek_kind() {
            TokenKind::Let => {
                let let_tok = self.advance();
                let name = self.expect(TokenKind::Ident, "variable name")?;
                self.expect(TokenKind::Colon, "':' after variable name")?;
                let (ty, is_array) = self.parse_type()?;
                let init = if self.check(TokenKind::Assign) {
                    self.advance();
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                let span = let_tok.span.merge(&self.prev_span());
                Some(Stmt::Local(LocalDecl {
                    name: name.text,
                    ty,
                    is_array,
                    init,
                    span,
                    resolved_ty: None,
                }))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                let while_tok = self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                let span = while_tok.span.merge(&self.prev_span());
                Some(Stmt::While { cond, body, span })
            }
            TokenKind::For => self.parse_for(),
            TokenKind::Return => {
                let ret_tok = self.advance();
                let value = if self.starts_expression() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                let span = ret_tok.span.merge(&self.prev_span());
                Some(Stmt::Return { value, span })
            }
            TokenKind::Break => {
                let tok = self.advance();
                Some(Stmt::Break { span: tok.span })
            }
            TokenKind::Continue => {
                let tok = self.advance();
                Some(Stmt::Continue { span: tok.span })
            }
            TokenKind::Send => self.parse_send(),
            _ => self.parse_expr_or_assign(),
        }
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let if_tok = self.advance();
        let cond = self.parse_expr()?;
        let then_body = self.parse_block()?;
        let else_body = if self.check(TokenKind::Else) {
            self.advance();
            if self.check(TokenKind::If) {
                // else-if chains nest as a single-statement else body
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        let span = if_tok.span.merge(&self.prev_span());
        Some(Stmt::If {
            cond,
            then_body,
            else_body,
            span,
        })
    }

    fn parse_for(&mut self) -> Option<Stmt> {
        let for_tok = self.advance();
        let var = self.expect(TokenKind::Ident, "loop variable after 'for'")?;
        self.expect(TokenKind::In, "'in' after loop variable")?;
        let first = self.parse_expr()?;
        if self.check(TokenKind::DotDot) {
            self.advance();
            let end = self.parse_expr()?;
            let body = self.parse_block()?;
            let span = for_tok.span.merge(&self.prev_span());
            Some(Stmt::ForRange {
                var: var.text,
                start: first,
                end,
                body,
                span,
            })
        } else {
            let body = self.parse_block()?;
            let span = for_tok.span.merge(&self.prev_span());
            Some(Stmt::ForEach {
                var: var.text,
                collection: first,
                body,
                span,
            })
        }
    }

    fn parse_send(&mut self) -> Option<Stmt> {
        let send_tok = self.advance();
        let event = self.expect(TokenKind::Ident, "event name after 'send'")?;
        let target = if self.check(TokenKind::To) {
            self.advance();
            let tok = self.expect(TokenKind::Ident, "'All' or 'Owner' after 'to'")?;
            match tok.text.as_str() {
                "All" => Some(SendTarget::All),
                "Owner" => Some(SendTarget::Owner),
                other => {
                    self.diags.error(
                        codes::UNEXPECTED_TOKEN,
                        format!("expected 'All' or 'Owner' after 'to', found '{}'", other),
                        tok.span,
                    );
                    return None;
                }
            }
        } else {
            None
        };
        let span = send_tok.span.merge(&self.prev_span());
        Some(Stmt::Send {
            event: event.text,
            target,
            span,
        })
    }

    fn parse_expr_or_assign(&mut self) -> Option<Stmt> {
        let expr = self.parse_expr()?;
        let op = match self.peek_kind() {
            TokenKind::Assign => Some(AssignOp::Assign),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            _ => None,
        };
        let Some(op) = op else {
            return Some(Stmt::Expr(expr));
        };
        let op_tok = self.advance();
        if !matches!(
            expr.kind,
            ExprKind::Name(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            self.diags.error(
                codes::UNEXPECTED_TOKEN,
                "invalid assignment target",
                op_tok.span,
            );
            return None;
        }
        let value = self.parse_expr()?;
        let span = expr.span.merge(&value.span);
        Some(Stmt::Assign {
            target: expr,
            op,
            value,
            span,
            op_sig: None,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_binary(0)
    }

    fn binary_precedence(kind: TokenKind) -> Option<(BinOp, u8)> {
        Some(match kind {
            TokenKind::OrOr => (BinOp::Or, 1),
            TokenKind::AndAnd => (BinOp::And, 2),
            TokenKind::EqEq => (BinOp::Eq, 3),
            TokenKind::NotEq => (BinOp::NotEq, 3),
            TokenKind::Lt => (BinOp::Lt, 4),
            TokenKind::Gt => (BinOp::Gt, 4),
            TokenKind::LtEq => (BinOp::LtEq, 4),
            TokenKind::GtEq => (BinOp::GtEq, 4),
            TokenKind::Plus => (BinOp::Add, 5),
            TokenKind::Minus => (BinOp::Sub, 5),
            TokenKind::Star => (BinOp::Mul, 6),
            TokenKind::Slash => (BinOp::Div, 6),
            TokenKind::Percent => (BinOp::Rem, 6),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = Self::binary_precedence(self.peek_kind()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span.merge(&rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let tok = self.advance();
            let operand = self.parse_unary()?;
            let span = tok.span.merge(&operand.span);
            return Some(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let member = self.expect(TokenKind::Ident, "member name after '.'")?;
                    let span = expr.span.merge(&member.span);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            member: member.text,
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(TokenKind::Comma) {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    let close = self.expect(TokenKind::RParen, "')' after arguments")?;
                    let span = expr.span.merge(&close.span);
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    let close = self.expect(TokenKind::RBracket, "']' after index")?;
                    let span = expr.span.merge(&close.span);
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::As => {
                    self.advance();
                    let (ty, is_array) = self.parse_type()?;
                    let span = expr.span.merge(&self.prev_span());
                    let ty = if is_array { format!("{}[]", ty) } else { ty };
                    expr = Expr::new(
                        ExprKind::Cast {
                            expr: Box::new(expr),
                            ty,
                        },
                        span,
                    );
                }
                _ => return Some(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.peek_kind() {
            TokenKind::IntLiteral => {
                let tok = self.advance();
                let value = match tok.literal {
                    Some(LiteralValue::Int(v)) => v,
                    _ => 0,
                };
                Some(Expr::new(ExprKind::Int(value), tok.span))
            }
            TokenKind::FloatLiteral => {
                let tok = self.advance();
                let value = match tok.literal {
                    Some(LiteralValue::Float(v)) => v,
                    _ => 0.0,
                };
                Some(Expr::new(ExprKind::Float(value), tok.span))
            }
            TokenKind::True => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::Bool(true), tok.span))
            }
            TokenKind::False => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::Bool(false), tok.span))
            }
            TokenKind::Null => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::Null, tok.span))
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                self.string_expr(tok)
            }
            TokenKind::Ident => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::Name(tok.text), tok.span))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Some(expr)
            }
            TokenKind::LBracket => {
                let open = self.advance();
                let mut elems = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        elems.push(self.parse_expr()?);
                        if self.check(TokenKind::Comma) {
                            self.advance();
                            continue;
                        }
                        break;
                    }
                }
                let close = self.expect(TokenKind::RBracket, "']' after array literal")?;
                Some(Expr::new(
                    ExprKind::ArrayLit(elems),
                    open.span.merge(&close.span),
                ))
            }
            _ => {
                let tok = self.peek().clone();
                self.diags.error(
                    codes::UNEXPECTED_TOKEN,
                    format!("expected an expression, found {}", tok.kind.describe()),
                    tok.span,
                );
                None
            }
        }
    }

    /// Build a plain or interpolated string expression from a string token.
    /// Interpolation segments are re-lexed and sub-parsed; their spans are
    /// pinned to the string token so diagnostics stay anchored in the file.
    fn string_expr(&mut self, tok: Token) -> Option<Expr> {
        let mut raw = tok.text.clone();
        if raw.starts_with('"') {
            raw.remove(0);
        }
        if raw.ends_with('"') {
            raw.pop();
        }
        let raw = raw.as_str();
        if !has_interpolation(raw) {
            let decoded = match tok.literal {
                Some(LiteralValue::Str(s)) => s,
                _ => decode_escapes(raw),
            };
            return Some(Expr::new(ExprKind::Str(decoded), tok.span));
        }

        let mut parts = Vec::new();
        let mut text = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                text.push(ch);
                if let Some(esc) = chars.next() {
                    text.push(esc);
                }
                continue;
            }
            if ch != '{' {
                text.push(ch);
                continue;
            }
            if !text.is_empty() {
                parts.push(StrPart::Text(decode_escapes(&text)));
                text.clear();
            }
            let mut segment = String::new();
            let mut depth = 1usize;
            for inner in chars.by_ref() {
                if inner == '{' {
                    depth += 1;
                } else if inner == '}' {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                segment.push(inner);
            }
            if segment.trim().is_empty() {
                self.diags.error(
                    codes::UNEXPECTED_TOKEN,
                    "empty interpolation segment",
                    tok.span.clone(),
                );
                continue;
            }
            if let Some(expr) = self.parse_interpolation_segment(&segment, &tok.span) {
                parts.push(StrPart::Expr(Box::new(expr)));
            }
        }
        if !text.is_empty() {
            parts.push(StrPart::Text(decode_escapes(&text)));
        }
        Some(Expr::new(ExprKind::Interp(parts), tok.span))
    }

    fn parse_interpolation_segment(&mut self, segment: &str, span: &SourceSpan) -> Option<Expr> {
        let mut tokens = lex(segment, &self.file, self.diags);
        for t in &mut tokens {
            t.span = span.clone();
        }
        let mut sub = Parser::new(tokens, &self.file, self.diags);
        let expr = sub.parse_expr()?;
        if !sub.at_end() {
            self.diags.error(
                codes::UNEXPECTED_TOKEN,
                "trailing tokens in interpolation segment",
                span.clone(),
            );
        }
        Some(expr)
    }

    // ------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.check(kind) {
            return Some(self.advance());
        }
        let tok = self.peek().clone();
        self.diags.error(
            codes::UNEXPECTED_TOKEN,
            format!("expected {}, found {}", what, tok.kind.describe()),
            tok.span,
        );
        None
    }

    fn prev_span(&self) -> SourceSpan {
        if self.pos == 0 {
            self.tokens[0].span.clone()
        } else {
            self.tokens[self.pos - 1].span.clone()
        }
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::StringLiteral
                | TokenKind::Ident
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::Minus
                | TokenKind::Bang
        )
    }

    /// Skip to the next statement terminator or top-level keyword.
    fn synchronize(&mut self) {
        while !self.at_end() {
            match self.peek_kind() {
                TokenKind::RBrace
                | TokenKind::Let
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Send
                | TokenKind::Fn
                | TokenKind::On
                | TokenKind::Event
                | TokenKind::Pub
                | TokenKind::Sync => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

/// Does this raw (escapes intact) string body contain an interpolation brace?
fn has_interpolation(raw: &str) -> bool {
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '{' => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse_source(source: &str) -> (Module, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tokens = lex(source, Path::new("test.nori"), &mut diags);
        let module = parse(tokens, Path::new("test.nori"), &mut diags);
        (module, diags)
    }

    fn parse_ok(source: &str) -> Module {
        let (module, diags) = parse_source(source);
        assert!(
            !diags.has_errors(),
            "unexpected errors: {}",
            crate::diagnostics::format_diagnostics(&diags)
        );
        module
    }

    #[test]
    fn empty_source_is_a_valid_empty_module() {
        let module = parse_ok("");
        assert!(module.decls.is_empty());
    }

    #[test]
    fn top_level_variable_forms() {
        let module = parse_ok(
            "pub let max_score: int = 10\n\
             sync none score: int = 0\n\
             let is_over: bool = false\n\
             let tag: string\n\
             let spots: float[] = [1.0, 2.5]",
        );
        assert_eq!(module.decls.len(), 5);
        let Decl::Variable(v) = &module.decls[0] else {
            panic!("expected variable");
        };
        assert!(v.is_public);
        assert_eq!(v.ty, "int");
        let Decl::Variable(v) = &module.decls[1] else {
            panic!("expected variable");
        };
        assert_eq!(v.sync, SyncMode::None);
        assert!(!v.is_public);
        let Decl::Variable(v) = &module.decls[3] else {
            panic!("expected variable");
        };
        assert!(v.init.is_none());
        let Decl::Variable(v) = &module.decls[4] else {
            panic!("expected variable");
        };
        assert!(v.is_array);
    }

    #[test]
    fn pub_requires_let() {
        let (_, diags) = parse_source("pub fn broken() {}");
        assert!(diags.iter().any(|d| d.code == codes::PUB_WITHOUT_LET));
    }

    #[test]
    fn sync_requires_a_valid_mode() {
        let (_, diags) = parse_source("sync sometimes score: int = 0");
        assert!(diags.iter().any(|d| d.code == codes::INVALID_SYNC_MODE));
    }

    #[test]
    fn function_with_params_and_return() {
        let module = parse_ok("fn clamp_score(v: int, lo: int) -> int { return v }");
        let Decl::Function(f) = &module.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.return_ty.as_deref(), Some("int"));
        assert!(matches!(f.body[0], Stmt::Return { .. }));
    }

    #[test]
    fn event_handler_and_custom_event() {
        let module = parse_ok("on Start { } event AddPoint { }");
        assert!(matches!(module.decls[0], Decl::EventHandler(_)));
        assert!(matches!(module.decls[1], Decl::CustomEvent(_)));
    }

    #[test]
    fn for_range_and_for_each() {
        let module = parse_ok(
            "fn f(items: int[]) {\n\
               for i in 0..10 { }\n\
               for item in items { }\n\
             }",
        );
        let Decl::Function(f) = &module.decls[0] else {
            panic!("expected function");
        };
        assert!(matches!(f.body[0], Stmt::ForRange { .. }));
        assert!(matches!(f.body[1], Stmt::ForEach { .. }));
    }

    #[test]
    fn send_forms() {
        let module = parse_ok("on Start { send AddPoint send GameOver to All send Ping to Owner }");
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        assert!(matches!(
            e.body[0],
            Stmt::Send { target: None, .. }
        ));
        assert!(matches!(
            e.body[1],
            Stmt::Send {
                target: Some(SendTarget::All),
                ..
            }
        ));
        assert!(matches!(
            e.body[2],
            Stmt::Send {
                target: Some(SendTarget::Owner),
                ..
            }
        ));
    }

    #[test]
    fn send_to_rejects_other_targets() {
        let (_, diags) = parse_source("on Start { send X to Everyone }");
        assert!(diags.has_errors());
    }

    #[test]
    fn precedence_multiplication_binds_tighter() {
        let module = parse_ok("on Start { let x: int = 1 + 2 * 3 }");
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        let Stmt::Local(local) = &e.body[0] else {
            panic!("expected local");
        };
        let ExprKind::Binary { op, rhs, .. } = &local.init.as_ref().unwrap().kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn postfix_chains() {
        let module = parse_ok("on Start { transform.position.x transform.Translate(v) arr[0] }");
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        assert_eq!(e.body.len(), 3);
        let Stmt::Expr(call) = &e.body[1] else {
            panic!("expected expr stmt");
        };
        assert!(matches!(call.kind, ExprKind::Call { .. }));
        let Stmt::Expr(index) = &e.body[2] else {
            panic!("expected expr stmt");
        };
        assert!(matches!(index.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn compound_assignments_are_distinguished() {
        let module = parse_ok("on Start { score += 1 score = 2 arr[0] -= 3 }");
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        assert!(matches!(
            e.body[0],
            Stmt::Assign {
                op: AssignOp::Add,
                ..
            }
        ));
        assert!(matches!(
            e.body[1],
            Stmt::Assign {
                op: AssignOp::Assign,
                ..
            }
        ));
        assert!(matches!(
            e.body[2],
            Stmt::Assign {
                op: AssignOp::Sub,
                ..
            }
        ));
    }

    #[test]
    fn interpolated_string_splits_into_parts() {
        let module = parse_ok(r#"on Start { log("Score: {score} of {max + 1}") }"#);
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        let Stmt::Expr(call) = &e.body[0] else {
            panic!("expected expr stmt");
        };
        let ExprKind::Call { args, .. } = &call.kind else {
            panic!("expected call");
        };
        let ExprKind::Interp(parts) = &args[0].kind else {
            panic!("expected interpolation, got {:?}", args[0].kind);
        };
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], StrPart::Text(t) if t == "Score: "));
        assert!(matches!(&parts[1], StrPart::Expr(_)));
        assert!(matches!(&parts[2], StrPart::Text(t) if t == " of "));
        assert!(matches!(&parts[3], StrPart::Expr(_)));
    }

    #[test]
    fn escaped_braces_are_not_interpolation() {
        let module = parse_ok(r#"on Start { log("literal \{brace\}") }"#);
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        let Stmt::Expr(call) = &e.body[0] else {
            panic!("expected expr stmt");
        };
        let ExprKind::Call { args, .. } = &call.kind else {
            panic!("expected call");
        };
        assert!(matches!(&args[0].kind, ExprKind::Str(s) if s == "literal {brace}"));
    }

    #[test]
    fn cast_expression() {
        let module = parse_ok("on Start { let f: float = score as float }");
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        let Stmt::Local(local) = &e.body[0] else {
            panic!("expected local");
        };
        assert!(matches!(
            local.init.as_ref().unwrap().kind,
            ExprKind::Cast { .. }
        ));
    }

    #[test]
    fn recovery_continues_after_a_broken_statement() {
        let (module, diags) = parse_source(
            "on Start { let = 3 let ok: int = 1 }\n\
             fn later() { }",
        );
        assert!(diags.has_errors());
        // Both declarations survive; the broken statement was skipped.
        assert_eq!(module.decls.len(), 2);
        let Decl::EventHandler(e) = &module.decls[0] else {
            panic!("expected handler");
        };
        assert!(e.body.iter().any(|s| matches!(s, Stmt::Local(l) if l.name == "ok")));
    }

    #[test]
    fn recovery_at_top_level() {
        let (module, diags) = parse_source("]]] fn ok() { }");
        assert!(diags.has_errors());
        assert_eq!(module.decls.len(), 1);
    }
}
