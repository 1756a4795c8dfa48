//! Lowering from the contextualized AST to per-function IR lists.
//!
//! `generate_impl` produces the value of an expression into a caller-chosen
//! virtual register `R<base>` and returns how many virtual registers the
//! lowering consumed. Passing `pointer = true` requests an lvalue (the
//! value's address) instead, used for assignment targets and indexing
//! bases.
//!
//! Literal strings, arrays, and blobs are collected into pools labeled
//! `DS<n>`, `DA<n>`, `DB<n>` and emitted into a trailing read-only section
//! once everything else has been lowered.

use std::collections::HashMap;

use crate::diag::{CompileError, Diagnostic};
use crate::ir::{IrFunction, IrInstruction, IrOpcode};
use crate::parser::ast::{Expr, ExprKind, Loc};
use crate::parser::types::{TypeId, TypeSystem};

/// Label of the synthesized program entry point.
pub const ENTRY_LABEL: &str = "<ENTRY>";
/// Virtual address the text section is assembled at.
pub const TEXT_ORG: &str = "0x40000";
/// Marker word emitted after the startup call into `main`.
pub const DEBUG_MARKER: &str = "0xdeadc0de";

pub struct IrOutput {
    pub functions: Vec<IrFunction>,
    pub warnings: Vec<Diagnostic>,
}

struct Frame {
    locals: HashMap<String, (usize, TypeId)>,
    num_locals: usize,
    num_args: usize,
}

impl Frame {
    fn new() -> Frame {
        Frame {
            locals: HashMap::new(),
            num_locals: 0,
            num_args: 0,
        }
    }
}

pub struct IrGenerator<'a> {
    ts: &'a TypeSystem,
    functions: Vec<IrFunction>,
    lists: Vec<IrFunction>,
    frames: Vec<Frame>,
    strings: Vec<String>,
    arrays: Vec<Vec<String>>,
    blobs: Vec<String>,
    label_counter: usize,
    warnings: Vec<Diagnostic>,
}

fn bare_name(mangled: &str) -> &str {
    match mangled.rfind('.') {
        Some(dot) => &mangled[dot + 1..],
        None => mangled,
    }
}

fn reg(n: usize) -> String {
    format!("R{}", n)
}

impl<'a> IrGenerator<'a> {
    pub fn new(ts: &'a TypeSystem) -> IrGenerator<'a> {
        IrGenerator {
            ts,
            functions: Vec::new(),
            lists: Vec::new(),
            frames: Vec::new(),
            strings: Vec::new(),
            arrays: Vec::new(),
            blobs: Vec::new(),
            label_counter: 0,
            warnings: Vec::new(),
        }
    }

    pub fn generate(mut self, source: &[Expr]) -> Result<IrOutput, CompileError> {
        let mut entry = IrFunction::new();

        entry.push(IrInstruction::new(IrOpcode::Entry, &[ENTRY_LABEL]));
        entry.push(IrInstruction::new(IrOpcode::Org, &[TEXT_ORG]));
        entry.push(IrInstruction::new(IrOpcode::Section, &[".text"]));
        entry.push(IrInstruction::new(IrOpcode::Label, &[ENTRY_LABEL]));

        self.lists.push(entry);
        self.frames.push(Frame::new());

        for expr in source {
            self.generate_impl(expr, 0, false, false)?;
        }

        // Startup convention: call <global>.main, then the debug marker.
        self.emit(IrInstruction::new(IrOpcode::Movi, &["R0", "<global>.main"]));
        self.emit(IrInstruction::new(IrOpcode::Pushr, &["FP"]));
        self.emit_call_sequence(0, 0);
        self.emit(IrInstruction::new(IrOpcode::Debug, &[DEBUG_MARKER]));

        let entry = self.lists.pop().unwrap();

        self.frames.pop();
        self.functions.insert(0, entry);

        self.emit_pools();

        Ok(IrOutput {
            functions: self.functions,
            warnings: self.warnings,
        })
    }

    fn emit(&mut self, instruction: IrInstruction) {
        self.lists.last_mut().unwrap().push(instruction);
    }

    fn frame(&mut self) -> &mut Frame {
        self.frames.last_mut().unwrap()
    }

    fn next_label(&mut self) -> usize {
        let label = self.label_counter;

        self.label_counter += 1;

        label
    }

    fn warn(&mut self, message: String, loc: Loc) {
        self.warnings
            .push(Diagnostic::warning("ir", message, loc.line, loc.col, loc.len));
    }

    /// The `PUSHR FP … POPR FP` bracket shared by calls, `invoke`, and the
    /// startup call. The callee address is already in `R<base>`; arguments
    /// have already been pushed.
    fn emit_call_sequence(&mut self, base: usize, num_args: usize) {
        self.emit(IrInstruction::new(IrOpcode::Mov, &["FP", "SP"]));
        self.emit(IrInstruction::new(
            IrOpcode::Addfp,
            &[&(num_args * 4).to_string()],
        ));
        self.emit(IrInstruction::new(IrOpcode::Callr, &[&reg(base)]));
        self.emit(IrInstruction::new(IrOpcode::Mov, &[&reg(base), "A0"]));
        self.emit(IrInstruction::new(IrOpcode::Mov, &["SP", "FP"]));
        self.emit(IrInstruction::new(IrOpcode::Popr, &["FP"]));
    }

    fn generate_impl(
        &mut self,
        expr: &Expr,
        base: usize,
        pointer: bool,
        inside_fn: bool,
    ) -> Result<usize, CompileError> {
        match &expr.kind {
            ExprKind::FunctionDef { .. } => {
                let name = self.lower_function(expr)?;

                // A function definition evaluates to the function's address.
                self.emit(IrInstruction::new(IrOpcode::Movi, &[&reg(base), &name]));

                Ok(1)
            }

            ExprKind::ExpressionBlock { body } => {
                if body.is_empty() {
                    self.emit(IrInstruction::new(IrOpcode::Nop, &[]));

                    return Ok(0);
                }

                for child in body {
                    self.generate_impl(child, base, pointer, true)?;
                }

                Ok(1)
            }

            ExprKind::VariableDef { var_type, name } => {
                self.emit(IrInstruction::new(IrOpcode::Decsp, &[]));
                self.emit(IrInstruction::new(IrOpcode::Mov, &[&reg(base), "SP"]));

                if inside_fn {
                    let frame = self.frame();

                    frame.num_locals += 1;

                    let offset = (frame.num_locals + frame.num_args) * 4;

                    frame.locals.insert(name.clone(), (offset, *var_type));
                }

                Ok(1)
            }

            ExprKind::NumericLiteral { value } => {
                self.emit(IrInstruction::new(
                    IrOpcode::Movi,
                    &[&reg(base), &value.to_string()],
                ));

                Ok(1)
            }

            ExprKind::StringLiteral { text } => {
                let label = self.intern_string(text);

                self.emit(IrInstruction::new(IrOpcode::Movi, &[&reg(base), &label]));

                Ok(1)
            }

            ExprKind::Blob { file } => {
                let label = format!("DB{}", self.blobs.len());

                self.blobs.push(file.clone());
                self.emit(IrInstruction::new(IrOpcode::Movi, &[&reg(base), &label]));

                Ok(1)
            }

            ExprKind::ArrayLiteral { values, .. } => {
                let label = self.intern_array(values)?;

                self.emit(IrInstruction::new(IrOpcode::Movi, &[&reg(base), &label]));

                Ok(1)
            }

            ExprKind::NameRef { name } => {
                let local = self
                    .frames
                    .last()
                    .and_then(|f| f.locals.get(name).copied());

                match local {
                    Some((offset, ty)) => {
                        let size = self.ts.size_of(ty).max(1);
                        let opcode = if pointer { IrOpcode::Leaf } else { IrOpcode::Loadf };

                        self.emit(IrInstruction::new(
                            opcode,
                            &[&reg(base), &offset.to_string(), &size.to_string()],
                        ));
                    }

                    None => {
                        self.emit(IrInstruction::new(IrOpcode::Movi, &[&reg(base), name]));

                        if !pointer {
                            self.emit(IrInstruction::new(
                                IrOpcode::Loadr,
                                &[&reg(base), &reg(base), "4"],
                            ));
                        }
                    }
                }

                Ok(1)
            }

            ExprKind::FunctionCall { callee, args } => {
                let r = self.generate_impl(callee, base, true, inside_fn)?;

                self.emit(IrInstruction::new(IrOpcode::Pushr, &["FP"]));

                for (i, arg) in args.iter().enumerate() {
                    self.generate_impl(arg, base + r + i, false, inside_fn)?;
                    self.emit(IrInstruction::new(IrOpcode::Pushr, &[&reg(base + r + i)]));
                }

                self.emit_call_sequence(base, args.len());

                Ok(1)
            }

            ExprKind::Invoke { pointer: target } => {
                let r = self.generate_impl(target, base, false, inside_fn)?;

                self.emit(IrInstruction::new(IrOpcode::Pushr, &["FP"]));
                self.emit_call_sequence(base, 0);

                Ok(r)
            }

            ExprKind::BinaryOp { op, lhs, rhs } => {
                let r = self.generate_impl(rhs, base, false, inside_fn)?;
                let l = self.generate_impl(lhs, base + 1, false, inside_fn)?;

                self.emit(IrInstruction::new(
                    IrOpcode::Alu,
                    &[op, &reg(base + 1), &reg(base)],
                ));
                self.emit(IrInstruction::new(
                    IrOpcode::Mov,
                    &[&reg(base), &reg(base + 1)],
                ));

                Ok(r + l)
            }

            ExprKind::CompOp { op, lhs, rhs } => {
                let r = self.generate_impl(rhs, base, false, inside_fn)?;
                let l = self.generate_impl(lhs, base + 1, false, inside_fn)?;

                self.emit(IrInstruction::new(
                    IrOpcode::Cmpr,
                    &[op, &reg(base + 1), &reg(base)],
                ));
                self.emit(IrInstruction::new(
                    IrOpcode::Mov,
                    &[&reg(base), &reg(base + 1)],
                ));

                Ok(r + l)
            }

            ExprKind::UnaryOp { op, operand, .. } => {
                self.lower_unary(expr, op, operand, base, inside_fn)
            }

            ExprKind::Assignment { assignee, op, value } => {
                let r = if op == "=" {
                    self.generate_impl(value, base, false, inside_fn)?
                } else {
                    // Compound assignment desugars to `assignee op value`.
                    let stripped = op.trim_end_matches('=').to_owned();
                    let synthesized = Expr {
                        loc: expr.loc,
                        ty: value.ty,
                        kind: ExprKind::BinaryOp {
                            op: stripped,
                            lhs: assignee.clone(),
                            rhs: value.clone(),
                        },
                    };

                    self.generate_impl(&synthesized, base, false, inside_fn)?
                };

                let l = self.generate_impl(assignee, base + r, true, inside_fn)?;

                self.emit(IrInstruction::new(
                    IrOpcode::Store,
                    &[&reg(base + r), &reg(base)],
                ));

                Ok(r + l)
            }

            ExprKind::ArrayAccess { base: target, index } => {
                let consumed = if matches!(target.kind, ExprKind::TypeExpr { .. }) {
                    // Raw memory access: the index is the address.
                    self.generate_impl(index, base, false, inside_fn)?
                } else {
                    // Named base: synthesize `base + index` for the address.
                    let synthesized = Expr {
                        loc: expr.loc,
                        ty: target.ty,
                        kind: ExprKind::BinaryOp {
                            op: "+".to_owned(),
                            lhs: target.clone(),
                            rhs: index.clone(),
                        },
                    };

                    self.generate_impl(&synthesized, base, false, inside_fn)?
                };

                if !pointer {
                    self.emit(IrInstruction::new(
                        IrOpcode::Loadr,
                        &[&reg(base), &reg(base), "4"],
                    ));
                }

                Ok(consumed)
            }

            ExprKind::IfElse {
                condition,
                then_expr,
                else_expr,
            } => {
                let index = self.next_label();
                let skip = format!(".E{}", index);
                let end = format!(".L{}", index);

                self.generate_impl(condition, base, false, inside_fn)?;
                self.emit(IrInstruction::new(
                    IrOpcode::Cmpzb,
                    &["EQ", &reg(base), &skip],
                ));

                self.generate_impl(then_expr, base, false, inside_fn)?;

                if else_expr.is_some() {
                    self.emit(IrInstruction::new(IrOpcode::Branch, &["AL", &end]));
                }

                self.emit(IrInstruction::new(IrOpcode::Label, &[&skip]));

                if let Some(else_expr) = else_expr {
                    self.generate_impl(else_expr, base, false, inside_fn)?;
                    self.emit(IrInstruction::new(IrOpcode::Label, &[&end]));
                }

                Ok(1)
            }

            ExprKind::WhileLoop { condition, body } => {
                let index = self.next_label();
                let head = format!(".L{}", index);
                let end = format!(".E{}", index);

                self.emit(IrInstruction::new(IrOpcode::Label, &[&head]));

                self.generate_impl(condition, base, false, inside_fn)?;
                self.emit(IrInstruction::new(
                    IrOpcode::Cmpzb,
                    &["EQ", &reg(base), &end],
                ));

                self.generate_impl(body, base, false, inside_fn)?;

                self.emit(IrInstruction::new(IrOpcode::Branch, &["AL", &head]));
                self.emit(IrInstruction::new(IrOpcode::Label, &[&end]));

                Ok(1)
            }

            ExprKind::Return { value } => {
                let r = self.generate_impl(value, base, false, inside_fn)?;

                self.emit(IrInstruction::new(IrOpcode::Mov, &["A0", &reg(base)]));

                let num_locals = self.frames.last().map(|f| f.num_locals).unwrap_or(0);

                if num_locals > 0 {
                    self.emit(IrInstruction::new(
                        IrOpcode::Addsp,
                        &[&(num_locals * 4).to_string()],
                    ));
                }

                self.emit(IrInstruction::new(IrOpcode::Ret, &[]));

                Ok(r)
            }

            ExprKind::AsmBlock { text } => {
                self.emit(IrInstruction::new(IrOpcode::Passthrough, &[text]));

                Ok(0)
            }

            ExprKind::TypeExpr { .. } => Ok(0),
        }
    }

    fn lower_unary(
        &mut self,
        expr: &Expr,
        op: &str,
        operand: &Expr,
        base: usize,
        inside_fn: bool,
    ) -> Result<usize, CompileError> {
        match op {
            "!" => {
                let r = self.generate_impl(operand, base, false, inside_fn)?;

                self.emit(IrInstruction::new(IrOpcode::Movi, &[&reg(base + 1), "0"]));
                self.emit(IrInstruction::new(
                    IrOpcode::Cmpr,
                    &["==", &reg(base), &reg(base + 1)],
                ));

                Ok(r + 1)
            }

            "~" => {
                let r = self.generate_impl(operand, base, false, inside_fn)?;

                self.emit(IrInstruction::new(
                    IrOpcode::Movi,
                    &[&reg(base + 1), "4294967295"],
                ));
                self.emit(IrInstruction::new(
                    IrOpcode::Alu,
                    &["^", &reg(base), &reg(base + 1)],
                ));

                Ok(r + 1)
            }

            "-" => {
                let r = self.generate_impl(operand, base, false, inside_fn)?;

                self.emit(IrInstruction::new(IrOpcode::Movi, &[&reg(base + 1), "0"]));
                self.emit(IrInstruction::new(
                    IrOpcode::Alu,
                    &["-", &reg(base + 1), &reg(base)],
                ));
                self.emit(IrInstruction::new(
                    IrOpcode::Mov,
                    &[&reg(base), &reg(base + 1)],
                ));

                Ok(r + 1)
            }

            "++" | "--" => {
                // Read-modify-write through the assignment path; both the
                // pre and post forms evaluate to the updated value.
                let one = Expr {
                    loc: expr.loc,
                    ty: operand.ty,
                    kind: ExprKind::NumericLiteral { value: 1 },
                };

                let synthesized = Expr {
                    loc: expr.loc,
                    ty: operand.ty,
                    kind: ExprKind::Assignment {
                        assignee: Box::new(operand.clone()),
                        op: format!("{}=", &op[..1]),
                        value: Box::new(one),
                    },
                };

                self.generate_impl(&synthesized, base, false, inside_fn)
            }

            other => {
                self.warn(format!("Unimplemented unary operator '{}'", other), expr.loc);

                self.generate_impl(operand, base, false, inside_fn)
            }
        }
    }

    /// Lowers a function definition into its own IR list and returns the
    /// (mangled) function name.
    fn lower_function(&mut self, expr: &Expr) -> Result<String, CompileError> {
        let (name, args, body) = match &expr.kind {
            ExprKind::FunctionDef {
                name, args, body, ..
            } => (name, args, body),
            _ => unreachable!(),
        };

        self.lists.push(IrFunction::new());
        self.frames.push(Frame::new());

        self.emit(IrInstruction::new(IrOpcode::Label, &[name]));

        for arg in args {
            let position = {
                let frame = self.frame();

                frame.num_args += 1;
                frame.num_args
            };

            self.emit(IrInstruction::new(
                IrOpcode::Define,
                &[
                    &format!("arg_{}", bare_name(&arg.name)),
                    &format!("[fp-{}]", position * 4),
                ],
            ));

            self.frame()
                .locals
                .insert(arg.name.clone(), (position * 4, arg.ty));
        }

        // The call sequence leaves the return address just past the
        // arguments.
        {
            let frame = self.frame();

            frame.num_args += 1;

            let position = frame.num_args * 4;

            frame
                .locals
                .insert("<return_address>".to_owned(), (position, crate::parser::types::NONE_TYPE));
        }

        self.generate_impl(body, 0, false, true)?;

        self.emit(IrInstruction::new(IrOpcode::Mov, &["A0", "R0"]));

        let num_locals = self.frame().num_locals;

        if num_locals > 0 {
            self.emit(IrInstruction::new(
                IrOpcode::Addsp,
                &[&(num_locals * 4).to_string()],
            ));
        }

        for arg in args {
            self.emit(IrInstruction::new(
                IrOpcode::Undef,
                &[&format!("arg_{}", bare_name(&arg.name))],
            ));
        }

        self.emit(IrInstruction::new(IrOpcode::Ret, &[]));

        let finished = self.lists.pop().unwrap();

        self.frames.pop();
        self.functions.push(finished);

        Ok(name.clone())
    }

    fn intern_string(&mut self, text: &str) -> String {
        let label = format!("DS{}", self.strings.len());

        self.strings.push(text.to_owned());

        label
    }

    /// Array elements must be compile-time expressions; each resolves to
    /// the string placed in its `DEFV` slot.
    fn intern_array(&mut self, values: &[Expr]) -> Result<String, CompileError> {
        let label = format!("DA{}", self.arrays.len());

        // Reserve the slot first so nested literals keep label order.
        self.arrays.push(Vec::new());

        let index = self.arrays.len() - 1;
        let mut resolved = Vec::with_capacity(values.len());

        for value in values {
            match &value.kind {
                ExprKind::NumericLiteral { value } => resolved.push(value.to_string()),
                ExprKind::StringLiteral { text } => {
                    let label = self.intern_string(text);

                    resolved.push(label);
                }
                ExprKind::NameRef { name } => resolved.push(name.clone()),
                ExprKind::FunctionDef { .. } => {
                    let name = self.lower_function(value)?;

                    resolved.push(name);
                }
                _ => {
                    self.warn(
                        "Array values must be compile-time expressions".to_owned(),
                        value.loc,
                    );

                    resolved.push("0".to_owned());
                }
            }
        }

        self.arrays[index] = resolved;

        Ok(label)
    }

    /// The trailing read-only data section: arrays, strings, blobs.
    fn emit_pools(&mut self) {
        let mut pools = IrFunction::new();

        pools.push(IrInstruction::new(IrOpcode::Nop, &[]));
        pools.push(IrInstruction::new(IrOpcode::Nop, &[]));
        pools.push(IrInstruction::new(IrOpcode::Align, &["4"]));
        pools.push(IrInstruction::new(IrOpcode::Section, &[".rodata"]));

        for (i, values) in self.arrays.iter().enumerate() {
            pools.push(IrInstruction::new(IrOpcode::Label, &[&format!("DA{}", i)]));

            for value in values {
                pools.push(IrInstruction::new(IrOpcode::Defv, &["l", value]));
            }
        }

        for (i, text) in self.strings.iter().enumerate() {
            pools.push(IrInstruction::new(IrOpcode::Label, &[&format!("DS{}", i)]));
            pools.push(IrInstruction::new(IrOpcode::Defstr, &[text]));
        }

        for (i, file) in self.blobs.iter().enumerate() {
            pools.push(IrInstruction::new(IrOpcode::Label, &[&format!("DB{}", i)]));
            pools.push(IrInstruction::new(IrOpcode::Defblob, &[file]));
        }

        pools.push(IrInstruction::new(IrOpcode::Align, &["4"]));

        self.functions.push(pools);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::context::Contextualizer;
    use crate::parser::Parser;

    fn lower(source: &str) -> (Vec<IrFunction>, Vec<Diagnostic>) {
        let tokens = Lexer::new(source).lex().unwrap();
        let mut output = Parser::new(tokens).parse().unwrap();

        Contextualizer::new().contextualize(&mut output.source);

        let generated = IrGenerator::new(&output.types)
            .generate(&output.source)
            .unwrap();

        (generated.functions, generated.warnings)
    }

    fn lines(f: &IrFunction) -> Vec<String> {
        f.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn identity_function_ir() {
        let (functions, _) = lower("fn id(x: u32) -> u32: x;");

        // functions[0] is the entry, functions[1] the lowered `id`.
        assert_eq!(
            lines(&functions[1]),
            vec![
                "LABEL <global>.id",
                "DEFINE arg_x [fp-4]",
                "LOADF R0 4 4",
                "MOV A0 R0",
                "UNDEF arg_x",
                "RET",
            ]
        );
    }

    #[test]
    fn while_loop_labels() {
        let (functions, _) = lower("fn f: { u32 i; i = 0; while (i < 10): i = i + 1; };");

        let text = lines(&functions[1]).join("\n");

        assert!(text.contains("LABEL .L0"));
        assert!(text.contains("CMPZB EQ R0 .E0"));
        assert!(text.contains("BRANCH AL .L0"));
        assert!(text.ends_with("RET") || text.contains("LABEL .E0"));

        // Function lists always end with RET.
        assert_eq!(functions[1].last().unwrap().opcode, IrOpcode::Ret);
    }

    #[test]
    fn string_pool_emission() {
        let (functions, _) = lower("fn f: \"hello\";");

        let pools = lines(functions.last().unwrap()).join("\n");

        assert!(pools.contains("LABEL DS0"));
        assert!(pools.contains("DEFSTR hello"));
        assert!(pools.contains("SECTION .rodata"));
    }

    #[test]
    fn call_push_discipline() {
        let (functions, _) = lower(
            "fn add(a: u32, b: u32) -> u32: a + b; fn main -> u32: add(1, 2);",
        );

        let main = &functions[2];
        let text = lines(main);

        // One PUSHR R… per argument.
        let arg_pushes = text
            .iter()
            .filter(|l| l.starts_with("PUSHR R"))
            .count();

        assert_eq!(arg_pushes, 2);

        // Exactly one MOV SP FP; POPR FP pair, in order.
        let mov_sp = text.iter().position(|l| l == "MOV SP FP").unwrap();

        assert_eq!(text[mov_sp + 1], "POPR FP");

        // Frame register is saved before the arguments go up.
        let push_fp = text.iter().position(|l| l == "PUSHR FP").unwrap();

        assert!(push_fp < mov_sp);
    }

    #[test]
    fn locals_are_frame_offsets() {
        let (functions, _) = lower("fn f(x: u32): { u32 i; i = x; };");

        let text = lines(&functions[1]).join("\n");

        // x is arg 1 (fp-4); i lands past the return-address slot.
        assert!(text.contains("LOADF R0 4 4"));
        assert!(text.contains("DECSP"));
        assert!(text.contains("LEAF R1 12 4"));
    }

    #[test]
    fn entry_calls_main_and_marks() {
        let (functions, _) = lower("fn main -> u32: 0;");

        let entry = lines(&functions[0]).join("\n");

        assert!(entry.starts_with("ENTRY <ENTRY>"));
        assert!(entry.contains("ORG 0x40000"));
        assert!(entry.contains("SECTION .text"));
        assert!(entry.contains("LABEL <ENTRY>"));
        assert!(entry.contains("MOVI R0 <global>.main"));
        assert!(entry.contains("CALLR R0"));
        assert!(entry.contains("DEBUG 0xdeadc0de"));
    }

    #[test]
    fn array_literal_values() {
        let (functions, warnings) = lower("array u32[3]: (1, 2, 3);");

        let pools = lines(functions.last().unwrap());

        let label = pools.iter().position(|l| l == "LABEL DA0").unwrap();

        assert_eq!(pools[label + 1], "DEFV l 1");
        assert_eq!(pools[label + 2], "DEFV l 2");
        assert_eq!(pools[label + 3], "DEFV l 3");
        assert!(warnings.is_empty());
    }

    #[test]
    fn non_constant_array_value_warns() {
        let (functions, warnings) = lower("fn f(x: u32): array u32[1]: (x + 1);");

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("compile-time"));

        let pools = lines(functions.last().unwrap()).join("\n");

        assert!(pools.contains("DEFV l 0"));
    }

    #[test]
    fn if_else_branch_shape() {
        let (functions, _) = lower("fn f(x: u32): if (x): 1 else 2;");

        let text = lines(&functions[1]).join("\n");

        assert!(text.contains("CMPZB EQ R0 .E0"));
        assert!(text.contains("BRANCH AL .L0"));
        assert!(text.contains("LABEL .E0"));
        assert!(text.contains("LABEL .L0"));
    }

    #[test]
    fn global_name_loads_through_address() {
        let (functions, _) = lower("u32 g; fn f: g;");

        let text = lines(&functions[1]).join("\n");

        assert!(text.contains("MOVI R0 <global>.g"));
        assert!(text.contains("LOADR R0 R0 4"));
    }

    #[test]
    fn asm_block_passthrough() {
        let (functions, _) = lower("fn f: asm { nop r0 };");

        let text = lines(&functions[1]).join("\n");

        assert!(text.contains("PASSTHROUGH"));
        assert!(text.contains("nop r0"));
    }
}
