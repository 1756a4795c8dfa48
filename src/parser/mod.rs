//! Recursive-descent parser with type-system integration.
//!
//! `parse_expression` handles parenthesized and pre-unary forms, delegates
//! to `parse_expression_impl` for the leading-token dispatch, then folds
//! right-side continuations (postfix operators, calls, indexing, binary and
//! comparison operators via precedence climbing, right-associative
//! assignment) in `parse_rhs`.
//!
//! The parser owns the type registry for the compilation: types named in
//! source are interned as they are parsed, and every expression node gets
//! its produced type assigned here.

pub mod ast;
pub mod context;
pub mod types;

use std::collections::HashMap;

use crate::diag::{CompileError, Diagnostic};
use crate::lexer::{Token, TokenKind};

use ast::{Expr, ExprKind, Loc};
use types::{Definition, TypeId, TypeKind, TypeSystem, NONE_TYPE};

#[derive(Debug)]
pub struct ParserOutput {
    pub source: Vec<Expr>,
    pub types: TypeSystem,
    pub warnings: Vec<Diagnostic>,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ts: TypeSystem,
    anonymous_functions: usize,
    warnings: Vec<Diagnostic>,
    /// Declared variable/argument types, innermost scope last. Used to give
    /// name references a type so return-type inference has something to
    /// work with.
    scopes: Vec<HashMap<String, TypeId>>,
}

fn precedence(text: &str, kind: TokenKind) -> u32 {
    match kind {
        TokenKind::Star => 60,
        TokenKind::Ampersand => 36,
        TokenKind::BinaryOp => match text {
            "/" | "%" => 60,
            "+" | "-" => 50,
            "<<" | ">>" => 40,
            "^" => 34,
            "|" => 32,
            _ => 0,
        },
        TokenKind::CompOp => match text {
            "&&" | "||" | "^^" => 10,
            _ => 20,
        },
        _ => 0,
    }
}

fn is_binary_start(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::BinaryOp | TokenKind::Star | TokenKind::Ampersand | TokenKind::CompOp
    )
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser {
            tokens,
            pos: 0,
            ts: TypeSystem::new(),
            anonymous_functions: 0,
            warnings: Vec::new(),
            scopes: vec![HashMap::new()],
        }
    }

    pub fn parse(mut self) -> Result<ParserOutput, CompileError> {
        let mut source = Vec::new();

        while !self.is_token(TokenKind::Eof) {
            let expr = self.parse_expression()?;

            self.expect_token(TokenKind::Semicolon)?;
            self.consume();

            source.push(expr);
        }

        Ok(ParserOutput {
            source,
            types: self.ts,
            warnings: self.warnings,
        })
    }

    // -- Token plumbing --

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn consume(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn is_token(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn expect_token(&self, kind: TokenKind) -> Result<(), CompileError> {
        if !self.is_token(kind) {
            return Err(self.error(format!(
                "Expected {}, got '{}' instead",
                kind.name(),
                self.current().text
            )));
        }

        Ok(())
    }

    fn error(&self, message: String) -> CompileError {
        let tok = self.current();

        CompileError::new("parser", message, tok.line, tok.col, tok.text.len().max(1))
    }

    fn warn(&mut self, message: String, loc: Loc) {
        self.warnings
            .push(Diagnostic::warning("parser", message, loc.line, loc.col, loc.len));
    }

    fn loc_here(&self) -> Loc {
        let tok = self.current();

        Loc::new(tok.line, tok.col, tok.text.len().max(1))
    }

    fn expr(&self, loc: Loc, ty: TypeId, kind: ExprKind) -> Expr {
        Expr { loc, ty, kind }
    }

    // -- Scope bookkeeping (declared types only; name *resolution* is the
    //    contextualizer's job) --

    fn lookup_var(&self, name: &str) -> Option<TypeId> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    fn declare_var(&mut self, name: &str, ty: TypeId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned(), ty);
        }
    }

    // -- Types --

    fn is_type_modifier(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::KwMut | TokenKind::KwStatic | TokenKind::KwConst
        )
    }

    fn is_type(&self) -> bool {
        self.ts.exists(&self.current().text)
            || self.is_type_modifier()
            || self.is_token(TokenKind::KwFn)
            || self.is_token(TokenKind::KwTypedef)
    }

    /// `[mut|static|const]* (named-type | fn* … | typedef T alias) '*'*`
    fn parse_type(&mut self) -> Result<TypeId, CompileError> {
        let mut mutable = false;
        let mut is_static = false;

        while self.is_type_modifier() {
            match self.current().kind {
                TokenKind::KwMut => mutable = true,
                TokenKind::KwStatic => is_static = true,
                TokenKind::KwConst => mutable = false,
                _ => unreachable!(),
            }

            self.consume();
        }

        if self.is_token(TokenKind::KwTypedef) {
            self.consume();

            let target = self.parse_type()?;

            self.expect_token(TokenKind::Ident)?;

            let alias = self.current().text.clone();
            let target_sig = self.ts.signature(target).to_owned();

            self.ts.type_def(&alias, &target_sig);
            self.consume();

            return Ok(target);
        }

        let base = if self.is_token(TokenKind::KwFn) {
            self.parse_function_type()?
        } else {
            if !self.ts.exists(&self.current().text) {
                return Err(self.error(format!(
                    "'{}' does not name a type",
                    self.current().text
                )));
            }

            let ty = self.ts.get_type(&self.current().text);

            self.consume();

            ty
        };

        let mut ty = base;

        while self.is_token(TokenKind::Star) {
            ty = self.ts.pointer_to(ty);

            self.consume();
        }

        Ok(self.ts.with_modifiers(ty, mutable, is_static))
    }

    /// `fn* [(arg-list)] -> type` — a function pointer type.
    fn parse_function_type(&mut self) -> Result<TypeId, CompileError> {
        self.expect_token(TokenKind::KwFn)?;
        self.consume();

        self.expect_token(TokenKind::Star)?;
        self.consume();

        let mut args = Vec::new();

        if self.is_token(TokenKind::OpeningParen) {
            self.consume();

            while !self.is_token(TokenKind::ClosingParen) {
                args.push(self.parse_definition()?);

                if self.is_token(TokenKind::Comma) {
                    self.consume();
                } else if !self.is_token(TokenKind::ClosingParen) {
                    return Err(self.error("Expected ',' or ')' in argument list".to_owned()));
                }
            }

            self.consume();
        }

        self.expect_token(TokenKind::Arrow)?;
        self.consume();

        let return_type = self.parse_type()?;

        Ok(self.ts.function_of(&args, return_type))
    }

    /// Function argument: `name: type`, or a bare type for unnamed
    /// arguments.
    fn parse_definition(&mut self) -> Result<Definition, CompileError> {
        if self.is_type() {
            let ty = self.parse_type()?;

            return Ok(Definition::new(ty, ""));
        }

        self.expect_token(TokenKind::Ident)?;

        let name = self.current().text.clone();

        self.consume();
        self.expect_token(TokenKind::Colon)?;
        self.consume();

        if !self.is_type() {
            return Err(self.error(format!(
                "'{}' does not name a type",
                self.current().text
            )));
        }

        let ty = self.parse_type()?;

        Ok(Definition { ty, name })
    }

    // -- Expressions --

    pub fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        if self.is_token(TokenKind::OpeningParen) {
            self.consume();

            let expr = self.parse_expression()?;

            self.expect_token(TokenKind::ClosingParen)?;
            self.consume();

            return self.parse_rhs(expr);
        }

        let expr = if self.is_pre_unary() {
            self.parse_pre_unary()?
        } else {
            self.parse_expression_impl()?
        };

        self.parse_rhs(expr)
    }

    fn is_pre_unary(&self) -> bool {
        self.is_token(TokenKind::UnaryOp)
            || (self.is_token(TokenKind::BinaryOp) && self.current().text == "-")
    }

    fn parse_pre_unary(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc_here();
        let op = self.current().text.clone();

        self.consume();

        let operand = self.parse_expression()?;
        let ty = operand.ty;

        Ok(self.expr(
            loc,
            ty,
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
                post: false,
            },
        ))
    }

    /// A primary expression with postfix continuations but no binary
    /// operators; the operand unit of precedence climbing.
    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let mut expr = if self.is_token(TokenKind::OpeningParen) {
            self.consume();

            let inner = self.parse_expression()?;

            self.expect_token(TokenKind::ClosingParen)?;
            self.consume();

            inner
        } else if self.is_pre_unary() {
            self.parse_pre_unary()?
        } else {
            self.parse_expression_impl()?
        };

        loop {
            expr = match self.current().kind {
                TokenKind::UnaryOp => self.parse_post_unary(expr),
                TokenKind::OpeningParen => self.parse_function_call(expr)?,
                TokenKind::OpeningBracket => self.parse_array_access(expr)?,
                _ => break,
            };
        }

        Ok(expr)
    }

    fn parse_post_unary(&mut self, operand: Expr) -> Expr {
        let loc = operand.loc;
        let op = self.current().text.clone();
        let ty = operand.ty;

        self.consume();

        self.expr(
            loc,
            ty,
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
                post: true,
            },
        )
    }

    fn parse_function_call(&mut self, callee: Expr) -> Result<Expr, CompileError> {
        let loc = callee.loc;

        self.consume();

        let mut args = Vec::new();

        while !self.is_token(TokenKind::ClosingParen) {
            args.push(self.parse_expression()?);

            if self.is_token(TokenKind::Comma) {
                self.consume();
            } else if !self.is_token(TokenKind::ClosingParen) {
                return Err(self.error("Expected ',' or ')' in call arguments".to_owned()));
            }
        }

        self.consume();

        let ty = self.call_result_type(callee.ty);

        Ok(self.expr(
            loc,
            ty,
            ExprKind::FunctionCall {
                callee: Box::new(callee),
                args,
            },
        ))
    }

    fn call_result_type(&self, callee: TypeId) -> TypeId {
        match &self.ts.get(callee).kind {
            TypeKind::Function { return_type, .. } => *return_type,
            TypeKind::Pointer { target } => match &self.ts.get(*target).kind {
                TypeKind::Function { return_type, .. } => *return_type,
                _ => NONE_TYPE,
            },
            _ => NONE_TYPE,
        }
    }

    fn parse_array_access(&mut self, base: Expr) -> Result<Expr, CompileError> {
        let loc = base.loc;

        self.consume();

        let index = self.parse_expression()?;

        self.expect_token(TokenKind::ClosingBracket)?;
        self.consume();

        let ty = match &self.ts.get(base.ty).kind {
            TypeKind::Pointer { target } => *target,
            _ => self.ts.get_type("u32"),
        };

        Ok(self.expr(
            loc,
            ty,
            ExprKind::ArrayAccess {
                base: Box::new(base),
                index: Box::new(index),
            },
        ))
    }

    /// Right-side continuations, applied until none matches.
    fn parse_rhs(&mut self, lhs: Expr) -> Result<Expr, CompileError> {
        let mut expr = lhs;

        loop {
            expr = match self.current().kind {
                TokenKind::UnaryOp => self.parse_post_unary(expr),

                TokenKind::OpeningParen => self.parse_function_call(expr)?,

                TokenKind::OpeningBracket => self.parse_array_access(expr)?,

                kind if is_binary_start(kind) => self.parse_binary_expr(expr, 0)?,

                TokenKind::AssignOp => {
                    let loc = expr.loc;
                    let op = self.current().text.clone();

                    self.consume();

                    let value = self.parse_expression()?;
                    let ty = expr.ty;

                    self.expr(
                        loc,
                        ty,
                        ExprKind::Assignment {
                            assignee: Box::new(expr),
                            op,
                            value: Box::new(value),
                        },
                    )
                }

                _ => break,
            };
        }

        Ok(expr)
    }

    /// Precedence climbing over binary and comparison operators.
    fn parse_binary_expr(&mut self, mut lhs: Expr, min_prec: u32) -> Result<Expr, CompileError> {
        loop {
            let kind = self.current().kind;

            if !is_binary_start(kind) {
                break;
            }

            let prec = precedence(&self.current().text, kind);

            if prec < min_prec {
                break;
            }

            let op = self.current().text.clone();

            self.consume();

            let mut rhs = self.parse_primary()?;

            loop {
                let next = self.current().kind;

                if !is_binary_start(next) {
                    break;
                }

                if precedence(&self.current().text, next) <= prec {
                    break;
                }

                rhs = self.parse_binary_expr(rhs, prec + 1)?;
            }

            let loc = lhs.loc;
            let ty = lhs.ty;

            lhs = if kind == TokenKind::CompOp {
                let ty = self.ts.get_type("u32");

                self.expr(
                    loc,
                    ty,
                    ExprKind::CompOp {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                )
            } else {
                self.expr(
                    loc,
                    ty,
                    ExprKind::BinaryOp {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                )
            };
        }

        Ok(lhs)
    }

    fn parse_numeric_value(&self, text: &str) -> Result<u64, CompileError> {
        let parsed = if let Some(hex) = text.strip_prefix("0x") {
            u64::from_str_radix(hex, 16)
        } else if let Some(bin) = text.strip_prefix("0b") {
            u64::from_str_radix(bin, 2)
        } else {
            text.parse()
        };

        parsed.map_err(|_| self.error(format!("Invalid numeric literal '{}'", text)))
    }

    /// A parsed type becomes a variable definition when a name follows it,
    /// and a bare type expression (e.g. the base of `u16[a]`) otherwise.
    fn finish_definition(&mut self, loc: Loc, var_type: TypeId) -> Expr {
        if self.is_token(TokenKind::Ident) {
            let name = self.current().text.clone();

            self.consume();
            self.declare_var(&name, var_type);

            let ty = self.ts.pointer_to(var_type);

            self.expr(loc, ty, ExprKind::VariableDef { var_type, name })
        } else {
            self.expr(loc, var_type, ExprKind::TypeExpr { ty: var_type })
        }
    }

    /// Leading-token dispatch for everything that can start an expression.
    fn parse_expression_impl(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc_here();

        match self.current().kind {
            TokenKind::KwFn => {
                // `fn*` starts a function pointer type, not a definition.
                if self.peek().kind == TokenKind::Star {
                    let var_type = self.parse_type()?;

                    Ok(self.finish_definition(loc, var_type))
                } else {
                    self.parse_function_def()
                }
            }

            TokenKind::NumericLiteral => {
                let value = self.parse_numeric_value(&self.current().text)?;
                let ty = self.ts.get_type("u32");

                self.consume();

                Ok(self.expr(loc, ty, ExprKind::NumericLiteral { value }))
            }

            TokenKind::StringLiteral => {
                let text = self.current().text.clone();
                let char_ty = self.ts.get_type("char");
                let ty = self.ts.pointer_to(char_ty);

                self.consume();

                Ok(self.expr(loc, ty, ExprKind::StringLiteral { text }))
            }

            TokenKind::KwInvoke => {
                self.consume();

                let pointer = self.parse_expression()?;
                let ty = self.ts.get_type("u32");

                Ok(self.expr(
                    loc,
                    ty,
                    ExprKind::Invoke {
                        pointer: Box::new(pointer),
                    },
                ))
            }

            // `[addr]`: raw memory access; the base is the `none` type
            // expression.
            TokenKind::OpeningBracket => {
                self.consume();

                let index = self.parse_expression()?;

                self.expect_token(TokenKind::ClosingBracket)?;
                self.consume();

                let base = self.expr(loc, NONE_TYPE, ExprKind::TypeExpr { ty: NONE_TYPE });
                let ty = self.ts.get_type("u32");

                Ok(self.expr(
                    loc,
                    ty,
                    ExprKind::ArrayAccess {
                        base: Box::new(base),
                        index: Box::new(index),
                    },
                ))
            }

            TokenKind::Ident => {
                if self.is_type() {
                    let var_type = self.parse_type()?;

                    Ok(self.finish_definition(loc, var_type))
                } else {
                    let name = self.current().text.clone();
                    let ty = self.lookup_var(&name).unwrap_or(NONE_TYPE);

                    self.consume();

                    Ok(self.expr(loc, ty, ExprKind::NameRef { name }))
                }
            }

            TokenKind::KwMut | TokenKind::KwStatic | TokenKind::KwConst | TokenKind::KwTypedef => {
                let var_type = self.parse_type()?;

                Ok(self.finish_definition(loc, var_type))
            }

            TokenKind::OpeningBrace => {
                self.consume();

                let mut body = Vec::new();

                while !self.is_token(TokenKind::ClosingBrace) {
                    if self.is_token(TokenKind::Eof) {
                        return Err(self.error("Expected '}' before end of input".to_owned()));
                    }

                    let expr = self.parse_expression()?;

                    self.expect_token(TokenKind::Semicolon)?;
                    self.consume();

                    body.push(expr);
                }

                self.consume();

                let ty = body.last().map(|e| e.ty).unwrap_or(NONE_TYPE);

                Ok(self.expr(loc, ty, ExprKind::ExpressionBlock { body }))
            }

            TokenKind::AsmBlock => {
                let text = self.current().text.clone();

                self.consume();

                Ok(self.expr(loc, NONE_TYPE, ExprKind::AsmBlock { text }))
            }

            TokenKind::KwIf => {
                self.consume();

                let condition = self.parse_expression()?;

                self.expect_token(TokenKind::Colon)?;
                self.consume();

                let then_expr = self.parse_expression()?;

                let else_expr = if self.is_token(TokenKind::KwElse) {
                    self.consume();

                    if self.is_token(TokenKind::Colon) {
                        self.consume();
                    }

                    Some(Box::new(self.parse_expression()?))
                } else {
                    None
                };

                let ty = then_expr.ty;

                Ok(self.expr(
                    loc,
                    ty,
                    ExprKind::IfElse {
                        condition: Box::new(condition),
                        then_expr: Box::new(then_expr),
                        else_expr,
                    },
                ))
            }

            TokenKind::KwWhile => {
                self.consume();

                let condition = self.parse_expression()?;

                self.expect_token(TokenKind::Colon)?;
                self.consume();

                let body = self.parse_expression()?;

                Ok(self.expr(
                    loc,
                    NONE_TYPE,
                    ExprKind::WhileLoop {
                        condition: Box::new(condition),
                        body: Box::new(body),
                    },
                ))
            }

            TokenKind::KwReturn => {
                self.consume();

                let value = self.parse_expression()?;
                let ty = value.ty;

                Ok(self.expr(
                    loc,
                    ty,
                    ExprKind::Return {
                        value: Box::new(value),
                    },
                ))
            }

            TokenKind::KwArray => self.parse_array_literal(loc),

            TokenKind::KwBlob => {
                self.consume();
                self.expect_token(TokenKind::StringLiteral)?;

                let file = self.current().text.clone();

                self.consume();

                let u8_ty = self.ts.get_type("u8");
                let ty = self.ts.pointer_to(u8_ty);

                Ok(self.expr(loc, ty, ExprKind::Blob { file }))
            }

            _ => Err(self.error(format!(
                "Unhandled token \"{}\"",
                if self.current().text.is_empty() {
                    self.current().kind.name().to_owned()
                } else {
                    self.current().text.clone()
                }
            ))),
        }
    }

    /// `array <type>[<size>]: (e0, e1, …)`
    fn parse_array_literal(&mut self, loc: Loc) -> Result<Expr, CompileError> {
        self.consume();

        let element_type = self.parse_type()?;

        self.expect_token(TokenKind::OpeningBracket)?;
        self.consume();

        self.expect_token(TokenKind::NumericLiteral)?;

        let size = self.parse_numeric_value(&self.current().text)? as usize;

        self.consume();
        self.expect_token(TokenKind::ClosingBracket)?;
        self.consume();
        self.expect_token(TokenKind::Colon)?;
        self.consume();
        self.expect_token(TokenKind::OpeningParen)?;
        self.consume();

        let mut values = Vec::new();

        while !self.is_token(TokenKind::ClosingParen) {
            values.push(self.parse_expression()?);

            if self.is_token(TokenKind::Comma) {
                self.consume();
            } else if !self.is_token(TokenKind::ClosingParen) {
                return Err(self.error("Expected ',' or ')' in array values".to_owned()));
            }
        }

        self.consume();

        if values.len() != size {
            self.warn(
                format!(
                    "Array declared with size {} but initialized with {} values",
                    size,
                    values.len()
                ),
                loc,
            );
        }

        let ty = self.ts.pointer_to(element_type);

        Ok(self.expr(
            loc,
            ty,
            ExprKind::ArrayLiteral {
                element_type,
                size,
                values,
            },
        ))
    }

    fn anonymous_function_name(&mut self) -> String {
        let name = format!("<anonymous_{}>", self.anonymous_functions);

        self.anonymous_functions += 1;

        name
    }

    /// `fn [name]? [(arg-list)]? [-> type]? : body` — the optional pieces
    /// may appear in any order before the colon.
    fn parse_function_def(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc_here();

        self.expect_token(TokenKind::KwFn)?;
        self.consume();

        let mut name = String::new();
        let mut args: Vec<Definition> = Vec::new();
        let mut declared_return: Option<TypeId> = None;

        while !self.is_token(TokenKind::Colon) {
            match self.current().kind {
                TokenKind::Ident if !self.is_type() => {
                    name = self.current().text.clone();

                    self.consume();
                }

                TokenKind::OpeningParen => {
                    self.consume();

                    while !self.is_token(TokenKind::ClosingParen) {
                        args.push(self.parse_definition()?);

                        if self.is_token(TokenKind::Comma) {
                            self.consume();
                        } else if !self.is_token(TokenKind::ClosingParen) {
                            return Err(
                                self.error("Expected ',' or ')' in argument list".to_owned())
                            );
                        }
                    }

                    self.consume();
                }

                TokenKind::Arrow => {
                    self.consume();

                    declared_return = Some(self.parse_type()?);
                }

                _ => {
                    return Err(self.error(format!(
                        "Expected ':' before function body, got '{}' instead",
                        self.current().text
                    )));
                }
            }
        }

        if name.is_empty() {
            name = self.anonymous_function_name();
        }

        self.consume();

        let mut scope = HashMap::new();

        for arg in &args {
            if !arg.name.is_empty() {
                scope.insert(arg.name.clone(), arg.ty);
            }
        }

        self.scopes.push(scope);

        let body = self.parse_expression();

        self.scopes.pop();

        let body = body?;

        let return_type = match declared_return {
            Some(declared) => {
                if body.ty != NONE_TYPE && !self.ts.type_eq(declared, body.ty) {
                    self.warn(
                        format!(
                            "Declared return type '{}' does not match body type '{}'",
                            self.ts.signature(declared),
                            self.ts.signature(body.ty)
                        ),
                        loc,
                    );
                }

                declared
            }
            None => body.ty,
        };

        let fty = self.ts.function_of(&args, return_type);

        self.declare_var(&name, fty);

        Ok(self.expr(
            loc,
            fty,
            ExprKind::FunctionDef {
                name,
                args,
                return_type,
                body: Box::new(body),
            },
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> ParserOutput {
        let tokens = Lexer::new(source).lex().unwrap();

        Parser::new(tokens).parse().unwrap()
    }

    fn parse_err(source: &str) -> CompileError {
        let tokens = Lexer::new(source).lex().unwrap();

        Parser::new(tokens).parse().unwrap_err()
    }

    #[test]
    fn full_function_definition() {
        let out = parse("fn id(x: u32) -> u32: x;");

        assert_eq!(out.source.len(), 1);

        match &out.source[0].kind {
            ExprKind::FunctionDef {
                name,
                args,
                return_type,
                body,
            } => {
                assert_eq!(name, "id");
                assert_eq!(args.len(), 1);
                assert_eq!(args[0].name, "x");
                assert_eq!(out.types.signature(args[0].ty), "u32");
                assert_eq!(out.types.signature(*return_type), "u32");
                assert!(matches!(body.kind, ExprKind::NameRef { .. }));
            }
            other => panic!("expected function-def, got {:?}", other),
        }

        assert_eq!(out.types.signature(out.source[0].ty), "(u32)->u32");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn function_def_optional_pieces() {
        // Every subset of name/args/return-type is accepted.
        parse("fn: 0;");
        parse("fn f: 0;");
        parse("fn (x: u32): 0;");
        parse("fn -> u32: 0;");
        parse("fn f -> u32: 0;");
        parse("fn f(x: u32) -> u32: 0;");
    }

    #[test]
    fn anonymous_functions_are_numbered() {
        let out = parse("fn: 0; fn: 1;");

        let names: Vec<&str> = out
            .source
            .iter()
            .map(|e| match &e.kind {
                ExprKind::FunctionDef { name, .. } => name.as_str(),
                _ => panic!(),
            })
            .collect();

        assert_eq!(names, vec!["<anonymous_0>", "<anonymous_1>"]);
    }

    #[test]
    fn return_type_mismatch_is_a_warning() {
        let out = parse("fn f(x: u8) -> u32: x;");

        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].message.contains("return type"));
    }

    #[test]
    fn variable_def_type_is_storage_address() {
        let out = parse("u32 x;");

        match &out.source[0].kind {
            ExprKind::VariableDef { var_type, name } => {
                assert_eq!(name, "x");
                assert_eq!(out.types.signature(*var_type), "u32");
            }
            other => panic!("expected variable-def, got {:?}", other),
        }

        assert_eq!(out.types.signature(out.source[0].ty), "u32*");
    }

    #[test]
    fn pointer_and_modifier_types() {
        let out = parse("mut u32* p;");

        match &out.source[0].kind {
            ExprKind::VariableDef { var_type, .. } => {
                assert_eq!(out.types.signature(*var_type), "mut u32*");
            }
            other => panic!("expected variable-def, got {:?}", other),
        }
    }

    #[test]
    fn typedef_registers_alias() {
        let out = parse("typedef u32 word; word w;");

        match &out.source[1].kind {
            ExprKind::VariableDef { var_type, .. } => {
                assert_eq!(out.types.signature(*var_type), "u32");
            }
            other => panic!("expected variable-def, got {:?}", other),
        }
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let out = parse("fn f: 1 + 2 * 3;");

        let body = match &out.source[0].kind {
            ExprKind::FunctionDef { body, .. } => body,
            _ => panic!(),
        };

        match &body.kind {
            ExprKind::BinaryOp { op, rhs, .. } => {
                assert_eq!(op, "+");
                assert!(matches!(
                    &rhs.kind,
                    ExprKind::BinaryOp { op, .. } if op == "*"
                ));
            }
            other => panic!("expected binary-op, got {:?}", other),
        }
    }

    #[test]
    fn comparison_below_arithmetic() {
        let out = parse("fn f(i: u32): i < 10 + 1;");

        let body = match &out.source[0].kind {
            ExprKind::FunctionDef { body, .. } => body,
            _ => panic!(),
        };

        match &body.kind {
            ExprKind::CompOp { op, rhs, .. } => {
                assert_eq!(op, "<");
                assert!(matches!(&rhs.kind, ExprKind::BinaryOp { .. }));
            }
            other => panic!("expected comp-op, got {:?}", other),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let out = parse("fn f(a: u32, b: u32): a = b = 1;");

        let body = match &out.source[0].kind {
            ExprKind::FunctionDef { body, .. } => body,
            _ => panic!(),
        };

        match &body.kind {
            ExprKind::Assignment { value, .. } => {
                assert!(matches!(&value.kind, ExprKind::Assignment { .. }));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn while_and_block() {
        let out = parse("fn f: { u32 i; i = 0; while (i < 10): i = i + 1; };");

        let body = match &out.source[0].kind {
            ExprKind::FunctionDef { body, .. } => body,
            _ => panic!(),
        };

        match &body.kind {
            ExprKind::ExpressionBlock { body } => {
                assert_eq!(body.len(), 3);
                assert!(matches!(&body[2].kind, ExprKind::WhileLoop { .. }));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn if_else_shape() {
        let out = parse("fn f(x: u32): if (x == 0): 1 else 2;");

        let body = match &out.source[0].kind {
            ExprKind::FunctionDef { body, .. } => body,
            _ => panic!(),
        };

        match &body.kind {
            ExprKind::IfElse {
                condition,
                else_expr,
                ..
            } => {
                assert!(matches!(&condition.kind, ExprKind::CompOp { .. }));
                assert!(else_expr.is_some());
            }
            other => panic!("expected if-else, got {:?}", other),
        }
    }

    #[test]
    fn array_literal_and_size_warning() {
        let out = parse("array u32[3]: (1, 2, 3); array u32[4]: (1, 2);");

        match &out.source[0].kind {
            ExprKind::ArrayLiteral { size, values, .. } => {
                assert_eq!(*size, 3);
                assert_eq!(values.len(), 3);
            }
            other => panic!("expected array literal, got {:?}", other),
        }

        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].message.contains("size 4"));
    }

    #[test]
    fn raw_memory_access() {
        let out = parse("[0x1000];");

        match &out.source[0].kind {
            ExprKind::ArrayAccess { base, .. } => {
                assert!(matches!(&base.kind, ExprKind::TypeExpr { .. }));
                assert_eq!(base.ty, NONE_TYPE);
            }
            other => panic!("expected array-access, got {:?}", other),
        }
    }

    #[test]
    fn call_with_arguments() {
        let out = parse("fn add(a: u32, b: u32) -> u32: a + b; fn main: add(1, 2);");

        let body = match &out.source[1].kind {
            ExprKind::FunctionDef { body, .. } => body,
            _ => panic!(),
        };

        match &body.kind {
            ExprKind::FunctionCall { args, .. } => assert_eq!(args.len(), 2),
            other => panic!("expected call, got {:?}", other),
        }

        // The callee's return type propagates to the call expression.
        assert_eq!(out.types.signature(body.ty), "u32");
    }

    #[test]
    fn function_pointer_type() {
        let out = parse("fn*(x: u32) -> u32 cb;");

        match &out.source[0].kind {
            ExprKind::VariableDef { var_type, .. } => {
                assert_eq!(out.types.signature(*var_type), "(u32)->u32");
            }
            other => panic!("expected variable-def, got {:?}", other),
        }
    }

    #[test]
    fn missing_semicolon_is_fatal() {
        let err = parse_err("u32 x");

        assert!(err.message.contains("';'"));
    }

    #[test]
    fn numeric_literal_radixes() {
        let out = parse("0x10; 0b101; 42;");

        let values: Vec<u64> = out
            .source
            .iter()
            .map(|e| match &e.kind {
                ExprKind::NumericLiteral { value } => *value,
                _ => panic!(),
            })
            .collect();

        assert_eq!(values, vec![16, 5, 42]);
    }

    #[test]
    fn node_locations_point_at_first_token() {
        let out = parse("fn f:\n  1 + 2;");

        let def = &out.source[0];

        assert_eq!(def.loc.line, 0);
        assert_eq!(def.loc.col, 0);

        match &def.kind {
            ExprKind::FunctionDef { body, .. } => {
                assert_eq!(body.loc.line, 1);
                assert_eq!(body.loc.col, 2);
            }
            _ => panic!(),
        }
    }
}
