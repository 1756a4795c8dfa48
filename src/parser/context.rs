//! Scope resolution and name mangling.
//!
//! Walks the parsed expressions rewriting every definition and name
//! reference to its fully-qualified form `<scope>.<bare>`. The scope stack
//! starts at the `<global>` sentinel; entering a function definition pushes
//! the function's qualified name and its per-scope variable set, which is
//! discarded again on the way out. Resolution is two-level: the current
//! scope's variables shadow globals, anything else resolves to `<unknown>`
//! with a warning.

use std::collections::HashSet;

use crate::diag::Diagnostic;
use crate::parser::ast::{Expr, ExprKind};

pub const GLOBAL_SCOPE: &str = "<global>";
pub const UNKNOWN_SCOPE: &str = "<unknown>";

pub struct Contextualizer {
    scope_stack: Vec<String>,
    scope_vars: Vec<HashSet<String>>,
    globals: HashSet<String>,
    warnings: Vec<Diagnostic>,
}

impl Contextualizer {
    pub fn new() -> Contextualizer {
        Contextualizer {
            scope_stack: vec![GLOBAL_SCOPE.to_owned()],
            scope_vars: Vec::new(),
            globals: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    pub fn contextualize(mut self, source: &mut [Expr]) -> Vec<Diagnostic> {
        for expr in source.iter_mut() {
            self.walk(expr);
        }

        self.warnings
    }

    fn current_scope(&self) -> &str {
        self.scope_stack.last().unwrap()
    }

    fn in_global_scope(&self) -> bool {
        self.scope_stack.len() == 1
    }

    fn register(&mut self, bare: &str) {
        if self.in_global_scope() {
            self.globals.insert(bare.to_owned());
        } else {
            self.scope_vars.last_mut().unwrap().insert(bare.to_owned());
        }
    }

    fn warn(&mut self, message: String, expr: &Expr) {
        self.warnings.push(Diagnostic::warning(
            "context",
            message,
            expr.loc.line,
            expr.loc.col,
            expr.loc.len,
        ));
    }

    fn walk(&mut self, expr: &mut Expr) {
        if let ExprKind::FunctionDef { .. } = expr.kind {
            self.walk_function_def(expr);

            return;
        }

        if let ExprKind::NameRef { .. } = expr.kind {
            self.walk_name_ref(expr);

            return;
        }

        match &mut expr.kind {
            ExprKind::VariableDef { name, .. } => {
                let bare = name.clone();

                self.register(&bare);

                *name = format!("{}.{}", self.scope_stack.last().unwrap(), bare);
            }

            ExprKind::FunctionCall { callee, args } => {
                self.walk(callee);

                for arg in args {
                    self.walk(arg);
                }
            }

            ExprKind::BinaryOp { lhs, rhs, .. } | ExprKind::CompOp { lhs, rhs, .. } => {
                self.walk(lhs);
                self.walk(rhs);
            }

            ExprKind::UnaryOp { operand, .. } => self.walk(operand),

            ExprKind::Assignment { assignee, value, .. } => {
                self.walk(assignee);
                self.walk(value);
            }

            ExprKind::ArrayAccess { base, index } => {
                self.walk(base);
                self.walk(index);
            }

            ExprKind::ExpressionBlock { body } => {
                for child in body {
                    self.walk(child);
                }
            }

            ExprKind::IfElse {
                condition,
                then_expr,
                else_expr,
            } => {
                self.walk(condition);
                self.walk(then_expr);

                if let Some(else_expr) = else_expr {
                    self.walk(else_expr);
                }
            }

            ExprKind::WhileLoop { condition, body } => {
                self.walk(condition);
                self.walk(body);
            }

            ExprKind::Return { value } => self.walk(value),

            ExprKind::ArrayLiteral { values, .. } => {
                for value in values {
                    self.walk(value);
                }
            }

            ExprKind::Invoke { pointer } => self.walk(pointer),

            ExprKind::NumericLiteral { .. }
            | ExprKind::StringLiteral { .. }
            | ExprKind::TypeExpr { .. }
            | ExprKind::Blob { .. }
            | ExprKind::AsmBlock { .. } => {}

            ExprKind::NameRef { .. } | ExprKind::FunctionDef { .. } => unreachable!(),
        }
    }

    fn walk_function_def(&mut self, expr: &mut Expr) {
        if let ExprKind::FunctionDef {
            name, args, body, ..
        } = &mut expr.kind
        {
            let bare = name.clone();
            let qualified = format!("{}.{}", self.scope_stack.last().unwrap(), bare);

            // The function's own name is visible in the scope that defines
            // it, like any other definition.
            self.register(&bare);

            *name = qualified.clone();

            self.scope_stack.push(qualified.clone());
            self.scope_vars.push(HashSet::new());

            // Arguments belong to the scope being entered.
            for arg in args.iter_mut() {
                if arg.name.is_empty() {
                    continue;
                }

                let bare = arg.name.clone();

                self.scope_vars.last_mut().unwrap().insert(bare.clone());

                arg.name = format!("{}.{}", qualified, bare);
            }

            self.walk(body);

            self.scope_stack.pop();
            self.scope_vars.pop();
        }
    }

    fn walk_name_ref(&mut self, expr: &mut Expr) {
        let bare = match &expr.kind {
            ExprKind::NameRef { name } => name.clone(),
            _ => unreachable!(),
        };

        let in_scope = !self.in_global_scope()
            && self
                .scope_vars
                .last()
                .map(|vars| vars.contains(&bare))
                .unwrap_or(false);

        let in_global = self.globals.contains(&bare);

        if in_scope && in_global {
            self.warn(
                format!(
                    "Name \"{}\" in scope {} clashes with a global",
                    bare,
                    self.current_scope()
                ),
                expr,
            );
        }

        let qualified = if in_scope {
            format!("{}.{}", self.current_scope(), bare)
        } else if in_global {
            format!("{}.{}", GLOBAL_SCOPE, bare)
        } else {
            self.warn(format!("Using undefined name \"{}\"", bare), expr);

            format!("{}.{}", UNKNOWN_SCOPE, bare)
        };

        if let ExprKind::NameRef { name } = &mut expr.kind {
            *name = qualified;
        }
    }
}

impl Default for Contextualizer {
    fn default() -> Contextualizer {
        Contextualizer::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn contextualized(source: &str) -> (Vec<Expr>, Vec<Diagnostic>) {
        let tokens = Lexer::new(source).lex().unwrap();
        let mut output = Parser::new(tokens).parse().unwrap();
        let warnings = Contextualizer::new().contextualize(&mut output.source);

        (output.source, warnings)
    }

    fn function_parts(expr: &Expr) -> (&str, &Expr) {
        match &expr.kind {
            ExprKind::FunctionDef { name, body, .. } => (name, body),
            other => panic!("expected function-def, got {:?}", other),
        }
    }

    #[test]
    fn definitions_are_scope_qualified() {
        let (source, warnings) = contextualized("u32 g; fn main: g;");

        match &source[0].kind {
            ExprKind::VariableDef { name, .. } => assert_eq!(name, "<global>.g"),
            other => panic!("expected variable-def, got {:?}", other),
        }

        let (name, body) = function_parts(&source[1]);

        assert_eq!(name, "<global>.main");

        match &body.kind {
            ExprKind::NameRef { name } => assert_eq!(name, "<global>.g"),
            other => panic!("expected name-ref, got {:?}", other),
        }

        assert!(warnings.is_empty());
    }

    #[test]
    fn arguments_shadow_globals_and_warn() {
        let (source, warnings) = contextualized("u32 x; fn f(x: u32): x;");

        let (_, body) = function_parts(&source[1]);

        match &body.kind {
            ExprKind::NameRef { name } => assert_eq!(name, "<global>.f.x"),
            other => panic!("expected name-ref, got {:?}", other),
        }

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("clashes"));
    }

    #[test]
    fn undefined_names_go_to_unknown() {
        let (source, warnings) = contextualized("fn f: nope;");

        let (_, body) = function_parts(&source[0]);

        match &body.kind {
            ExprKind::NameRef { name } => assert_eq!(name, "<unknown>.nope"),
            other => panic!("expected name-ref, got {:?}", other),
        }

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("undefined"));
    }

    #[test]
    fn locals_resolve_to_the_function_scope() {
        let (source, _) = contextualized("fn f: { u32 i; i = 0; };");

        let (_, body) = function_parts(&source[0]);

        let block = match &body.kind {
            ExprKind::ExpressionBlock { body } => body,
            other => panic!("expected block, got {:?}", other),
        };

        match &block[0].kind {
            ExprKind::VariableDef { name, .. } => assert_eq!(name, "<global>.f.i"),
            other => panic!("expected variable-def, got {:?}", other),
        }

        match &block[1].kind {
            ExprKind::Assignment { assignee, .. } => match &assignee.kind {
                ExprKind::NameRef { name } => assert_eq!(name, "<global>.f.i"),
                other => panic!("expected name-ref, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn nested_functions_nest_scopes() {
        let (source, _) = contextualized("fn outer: fn inner: 0;");

        let (outer_name, outer_body) = function_parts(&source[0]);

        assert_eq!(outer_name, "<global>.outer");

        let (inner_name, _) = function_parts(outer_body);

        assert_eq!(inner_name, "<global>.outer.inner");
    }

    #[test]
    fn function_names_are_global_definitions() {
        let (source, warnings) = contextualized("fn f: 0; fn main: f();");

        let (_, body) = function_parts(&source[1]);

        match &body.kind {
            ExprKind::FunctionCall { callee, .. } => match &callee.kind {
                ExprKind::NameRef { name } => assert_eq!(name, "<global>.f"),
                other => panic!("expected name-ref, got {:?}", other),
            },
            other => panic!("expected call, got {:?}", other),
        }

        assert!(warnings.is_empty());
    }
}
