//! Expression tree produced by the parser.
//!
//! One sum type over every expression kind; each node carries its source
//! location and the type it produces when evaluated, assigned during
//! parsing (for a variable definition that is the *storage address*, a
//! pointer to the declared type).

use crate::parser::types::{Definition, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    pub line: usize,
    pub col: usize,
    pub len: usize,
}

impl Loc {
    pub fn new(line: usize, col: usize, len: usize) -> Loc {
        Loc { line, col, len }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub loc: Loc,
    pub ty: TypeId,
    pub kind: ExprKind,
}

impl Expr {
    /// The type this expression produces when evaluated. Total once the
    /// parser has returned.
    pub fn hs_type(&self) -> TypeId {
        self.ty
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    NumericLiteral {
        value: u64,
    },
    StringLiteral {
        text: String,
    },
    NameRef {
        name: String,
    },
    TypeExpr {
        ty: TypeId,
    },
    VariableDef {
        var_type: TypeId,
        name: String,
    },
    FunctionDef {
        name: String,
        args: Vec<Definition>,
        return_type: TypeId,
        body: Box<Expr>,
    },
    FunctionCall {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    BinaryOp {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    CompOp {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnaryOp {
        op: String,
        operand: Box<Expr>,
        post: bool,
    },
    Assignment {
        assignee: Box<Expr>,
        op: String,
        value: Box<Expr>,
    },
    ArrayAccess {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    ExpressionBlock {
        body: Vec<Expr>,
    },
    IfElse {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Option<Box<Expr>>,
    },
    WhileLoop {
        condition: Box<Expr>,
        body: Box<Expr>,
    },
    Return {
        value: Box<Expr>,
    },
    ArrayLiteral {
        element_type: TypeId,
        size: usize,
        values: Vec<Expr>,
    },
    Blob {
        file: String,
    },
    AsmBlock {
        text: String,
    },
    Invoke {
        pointer: Box<Expr>,
    },
}

impl Expr {
    /// Debug printer (lisp-ish), used by `--debug-parser-output`.
    pub fn print(&self, depth: usize) -> String {
        let pad = "  ".repeat(depth);

        match &self.kind {
            ExprKind::NumericLiteral { value } => format!("{}{}", pad, value),
            ExprKind::StringLiteral { text } => format!("{}\"{}\"", pad, text),
            ExprKind::NameRef { name } => format!("{}{}", pad, name),
            ExprKind::TypeExpr { .. } => format!("{}(type)", pad),
            ExprKind::VariableDef { name, .. } => format!("{}(def {})", pad, name),

            ExprKind::FunctionDef { name, body, .. } => format!(
                "{}(fn {}:\n{}\n{})",
                pad,
                name,
                body.print(depth + 1),
                pad
            ),

            ExprKind::FunctionCall { callee, args } => {
                let mut out = format!("{}(call\n{}", pad, callee.print(depth + 1));

                for arg in args {
                    out.push('\n');
                    out.push_str(&arg.print(depth + 1));
                }

                out.push(')');
                out
            }

            ExprKind::BinaryOp { op, lhs, rhs } | ExprKind::CompOp { op, lhs, rhs } => format!(
                "{}({}\n{}\n{})",
                pad,
                op,
                lhs.print(depth + 1),
                rhs.print(depth + 1)
            ),

            ExprKind::UnaryOp { op, operand, post } => format!(
                "{}({}{}\n{})",
                pad,
                if *post { "post" } else { "pre" },
                op,
                operand.print(depth + 1)
            ),

            ExprKind::Assignment { assignee, op, value } => format!(
                "{}({}\n{}\n{})",
                pad,
                op,
                assignee.print(depth + 1),
                value.print(depth + 1)
            ),

            ExprKind::ArrayAccess { base, index } => format!(
                "{}(index\n{}\n{})",
                pad,
                base.print(depth + 1),
                index.print(depth + 1)
            ),

            ExprKind::ExpressionBlock { body } => {
                let mut out = format!("{}(block", pad);

                for expr in body {
                    out.push('\n');
                    out.push_str(&expr.print(depth + 1));
                }

                out.push(')');
                out
            }

            ExprKind::IfElse {
                condition,
                then_expr,
                else_expr,
            } => {
                let mut out = format!(
                    "{}(if\n{}\n{}",
                    pad,
                    condition.print(depth + 1),
                    then_expr.print(depth + 1)
                );

                if let Some(e) = else_expr {
                    out.push('\n');
                    out.push_str(&e.print(depth + 1));
                }

                out.push(')');
                out
            }

            ExprKind::WhileLoop { condition, body } => format!(
                "{}(while\n{}\n{})",
                pad,
                condition.print(depth + 1),
                body.print(depth + 1)
            ),

            ExprKind::Return { value } => {
                format!("{}(ret\n{})", pad, value.print(depth + 1))
            }

            ExprKind::ArrayLiteral { size, values, .. } => {
                let mut out = format!("{}(arr size={} {{", pad, size);

                for value in values {
                    out.push('\n');
                    out.push_str(&value.print(depth + 1));
                }

                out.push_str("})");
                out
            }

            ExprKind::Blob { file } => format!("{}(blob {})", pad, file),
            ExprKind::AsmBlock { .. } => format!("{}(asm)", pad),

            ExprKind::Invoke { pointer } => {
                format!("{}(invoke\n{})", pad, pointer.print(depth + 1))
            }
        }
    }
}
