//! Renders IR lists as HV2 assembly text.
//!
//! Stateless except for the indentation flag: a `LABEL` starts an indented
//! region, `RET` ends it. Symbolic registers map onto the HV2 register
//! file (`R<n>` → `x<n>`, `A<n>` → `a<n>`, special registers lowercase)
//! and mangled compiler names become assembler-safe symbols.

use crate::ir::{IrFunction, IrInstruction, IrOpcode};

pub struct Hv2Translator;

fn map_register(reg: &str) -> String {
    match reg {
        "PC" => return "pc".to_owned(),
        "SP" => return "sp".to_owned(),
        "LR" => return "lr".to_owned(),
        "FP" => return "fp".to_owned(),
        "TR" => return "tr".to_owned(),
        _ => {}
    }

    if reg.len() < 2 {
        return "unimplemented_register".to_owned();
    }

    match reg.split_at(1) {
        ("A", n) => format!("a{}", n),
        ("R", n) => format!("x{}", n),
        _ => "unimplemented_register".to_owned(),
    }
}

fn map_binary_op(op: &str) -> &'static str {
    match op {
        "+" => "add.u",
        "-" => "sub.u",
        "*" => "mul.u",
        "/" => "div.u",
        "%" => "mod.u",
        "&" => "and.u",
        "|" => "or.u",
        "^" => "xor.u",
        "<<" => "lsl.u",
        ">>" => "lsr.u",
        _ => "unimplemented_binary_operator",
    }
}

fn map_comp_op(op: &str) -> &'static str {
    match op {
        "==" => "seq",
        "!=" => "sne",
        ">" => "sgt",
        ">=" => "sge",
        "<" => "slt",
        "<=" => "sle",
        _ => "unimplemented_comp_operator",
    }
}

fn map_branch(cond: &str) -> &'static str {
    match cond {
        "EQ" => "beq",
        "NE" => "bne",
        "AL" => "b",
        _ => "unimplemented_branch",
    }
}

/// Makes a compiler label assembler-safe: `<` becomes `_`, `>` is dropped,
/// `.` becomes `_`, `!` becomes `.`. Pure-digit labels pass through.
pub fn fmt_label(label: &str) -> String {
    if label.chars().next().map_or(false, |c| c.is_ascii_digit()) {
        return label.to_owned();
    }

    let mut out = String::with_capacity(label.len());

    for c in label.chars() {
        match c {
            '<' => out.push('_'),
            '>' => {}
            '.' => out.push('_'),
            '!' => out.push('.'),
            other => out.push(other),
        }
    }

    out
}

impl Hv2Translator {
    pub fn translate(functions: &[IrFunction]) -> String {
        let mut out = String::new();
        let mut indented = false;

        for function in functions {
            for instruction in function {
                if indented && instruction.opcode != IrOpcode::Label {
                    out.push_str("    ");
                }

                Hv2Translator::render(instruction, &mut out, &mut indented);

                out.push('\n');
            }
        }

        out
    }

    fn render(i: &IrInstruction, out: &mut String, indented: &mut bool) {
        let a = &i.args;

        match i.opcode {
            IrOpcode::Label => {
                out.push('\n');
                out.push_str(&fmt_label(&a[0]));
                out.push(':');

                *indented = true;
            }

            IrOpcode::Mov => {
                out.push_str(&format!(
                    "{:<8}{}, {}",
                    "move",
                    map_register(&a[0]),
                    map_register(&a[1])
                ));
            }

            IrOpcode::Movi => {
                out.push_str(&format!(
                    "{:<8}{}, !{}",
                    "li.w",
                    map_register(&a[0]),
                    fmt_label(&a[1])
                ));
            }

            IrOpcode::Loadr => {
                out.push_str(&format!(
                    "{:<8}{}, [{}]",
                    "load.l",
                    map_register(&a[0]),
                    map_register(&a[1])
                ));
            }

            IrOpcode::Loadf => {
                out.push_str(&format!(
                    "{:<8}{}, [fp-{}]",
                    "load.l",
                    map_register(&a[0]),
                    a[1]
                ));
            }

            IrOpcode::Leaf => {
                out.push_str(&format!(
                    "{:<8}{}, [fp-{}]",
                    "lea.l",
                    map_register(&a[0]),
                    a[1]
                ));
            }

            IrOpcode::Store => {
                out.push_str(&format!(
                    "{:<8}[{}], {}",
                    "store.l",
                    map_register(&a[0]),
                    map_register(&a[1])
                ));
            }

            IrOpcode::Addsp => out.push_str(&format!("{:<8}sp, {}", "add.u", a[0])),
            IrOpcode::Subsp => out.push_str(&format!("{:<8}sp, {}", "sub.u", a[0])),
            IrOpcode::Addfp => out.push_str(&format!("{:<8}fp, {}", "add.u", a[0])),
            IrOpcode::Decsp => out.push_str(&format!("{:<8}sp, 4", "sub.u")),

            IrOpcode::Callr => {
                out.push_str(&format!("{:<8}{}", "call.r", map_register(&a[0])));
            }

            IrOpcode::Pushr => {
                out.push_str(&format!("{:<8}{}", "push", map_register(&a[0])));
            }

            IrOpcode::Popr => {
                out.push_str(&format!("{:<8}{}", "pop", map_register(&a[0])));
            }

            IrOpcode::Ret => {
                out.push_str(&format!("{:<8}r0", "ret"));

                *indented = false;
            }

            IrOpcode::Alu => {
                let op = map_binary_op(&a[0]);
                let reg = map_register(&a[1]);

                out.push_str(&format!(
                    "{:<8}{}, {}, {}",
                    op,
                    reg,
                    reg,
                    map_register(&a[2])
                ));
            }

            IrOpcode::Fpu => {
                // The generator never produces this opcode; the placeholder
                // mnemonic simply fails to assemble as unknown.
                out.push_str(&format!("{:<8}{}", "unimplemented_fpu", a[0]));
            }

            IrOpcode::Cmpr => {
                let op = map_comp_op(&a[0]);
                let reg = map_register(&a[1]);

                out.push_str(&format!(
                    "{:<8}{}, {}, {}",
                    op,
                    reg,
                    reg,
                    map_register(&a[2])
                ));
            }

            IrOpcode::Branch => {
                out.push_str(&format!("{:<8}{}", map_branch(&a[0]), fmt_label(&a[1])));
            }

            IrOpcode::Cmpzb => {
                out.push_str(&format!(
                    "{:<8}{}, zero, {}",
                    map_branch(&a[0]),
                    map_register(&a[1]),
                    fmt_label(&a[2])
                ));
            }

            IrOpcode::Nop => out.push_str(&format!("{:<8}r0", "nop")),

            IrOpcode::Define => out.push_str(&format!("#define {} {}", a[0], a[1])),
            IrOpcode::Undef => out.push_str(&format!("#undef {}", a[0])),

            IrOpcode::Defstr => out.push_str(&format!(".asciiz \"{}\"", a[0])),
            IrOpcode::Defv => out.push_str(&format!(".long {}", fmt_label(&a[1]))),
            IrOpcode::Defblob => out.push_str(&format!(".blob {}", a[0])),

            IrOpcode::Section => out.push_str(&format!(".section {}", a[0])),
            IrOpcode::Org => out.push_str(&format!(".org {}", a[0])),
            IrOpcode::Entry => out.push_str(&format!(".entry !{}", fmt_label(&a[0]))),
            IrOpcode::Align => out.push_str(&format!(".align {}", a[0])),

            IrOpcode::Debug => out.push_str(&format!("debug {}", fmt_label(&a[0]))),

            IrOpcode::Passthrough => out.push_str(&a[0]),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::IrInstruction;

    fn one(opcode: IrOpcode, args: &[&str]) -> String {
        let f = vec![IrInstruction::new(opcode, args)];

        Hv2Translator::translate(&[f]).trim_end().to_owned()
    }

    #[test]
    fn register_mapping() {
        assert_eq!(map_register("R0"), "x0");
        assert_eq!(map_register("R12"), "x12");
        assert_eq!(map_register("A0"), "a0");
        assert_eq!(map_register("SP"), "sp");
        assert_eq!(map_register("FP"), "fp");
        assert_eq!(map_register("PC"), "pc");
        assert_eq!(map_register("LR"), "lr");
        assert_eq!(map_register("TR"), "tr");
    }

    #[test]
    fn label_mangling() {
        assert_eq!(fmt_label("<global>.main"), "_global_main");
        assert_eq!(fmt_label("<ENTRY>"), "_ENTRY");
        assert_eq!(fmt_label(".L0"), "_L0");
        assert_eq!(fmt_label("0xdeadc0de"), "0xdeadc0de");
        assert_eq!(fmt_label("42"), "42");
    }

    #[test]
    fn movi_loads_absolute_label() {
        assert_eq!(one(IrOpcode::Movi, &["R0", "<global>.main"]), "li.w    x0, !_global_main");
    }

    #[test]
    fn alu_is_destination_first() {
        assert_eq!(
            one(IrOpcode::Alu, &["+", "R1", "R0"]),
            "add.u   x1, x1, x0"
        );
        assert_eq!(
            one(IrOpcode::Alu, &["<<", "R1", "R0"]),
            "lsl.u   x1, x1, x0"
        );
    }

    #[test]
    fn cmpzb_three_operand_branch() {
        assert_eq!(
            one(IrOpcode::Cmpzb, &["EQ", "R0", ".E0"]),
            "beq     x0, zero, _E0"
        );
    }

    #[test]
    fn comparison_set_instructions() {
        assert_eq!(
            one(IrOpcode::Cmpr, &["<", "R1", "R0"]),
            "slt     x1, x1, x0"
        );
        assert_eq!(
            one(IrOpcode::Cmpr, &["==", "R1", "R0"]),
            "seq     x1, x1, x0"
        );
    }

    #[test]
    fn frame_access_forms() {
        assert_eq!(one(IrOpcode::Loadf, &["R0", "4", "4"]), "load.l  x0, [fp-4]");
        assert_eq!(one(IrOpcode::Leaf, &["R1", "8", "4"]), "lea.l   x1, [fp-8]");
        assert_eq!(one(IrOpcode::Store, &["R1", "R0"]), "store.l [x1], x0");
        assert_eq!(one(IrOpcode::Loadr, &["R0", "R0", "4"]), "load.l  x0, [x0]");
    }

    #[test]
    fn stack_pointer_forms() {
        assert_eq!(one(IrOpcode::Addsp, &["8"]), "add.u   sp, 8");
        assert_eq!(one(IrOpcode::Decsp, &[]), "sub.u   sp, 4");
        assert_eq!(one(IrOpcode::Addfp, &["8"]), "add.u   fp, 8");
    }

    #[test]
    fn directives() {
        assert_eq!(one(IrOpcode::Defstr, &["hello"]), ".asciiz \"hello\"");
        assert_eq!(one(IrOpcode::Defv, &["l", "42"]), ".long 42");
        assert_eq!(one(IrOpcode::Defv, &["l", "<global>.f"]), ".long _global_f");
        assert_eq!(one(IrOpcode::Section, &[".rodata"]), ".section .rodata");
        assert_eq!(one(IrOpcode::Org, &["0x40000"]), ".org 0x40000");
        assert_eq!(one(IrOpcode::Entry, &["<ENTRY>"]), ".entry !_ENTRY");
        assert_eq!(one(IrOpcode::Align, &["4"]), ".align 4");
        assert_eq!(one(IrOpcode::Debug, &["0xdeadc0de"]), "debug 0xdeadc0de");
    }

    #[test]
    fn labels_indent_following_instructions() {
        let f = vec![
            IrInstruction::new(IrOpcode::Label, &["<global>.f"]),
            IrInstruction::new(IrOpcode::Nop, &[]),
            IrInstruction::new(IrOpcode::Ret, &[]),
            IrInstruction::new(IrOpcode::Section, &[".rodata"]),
        ];

        let text = Hv2Translator::translate(&[f]);

        assert!(text.contains("\n_global_f:\n"));
        assert!(text.contains("\n    nop     r0\n"));
        assert!(text.contains("\n    ret     r0\n"));
        // RET resets the indent.
        assert!(text.contains("\n.section .rodata\n"));
    }

    #[test]
    fn passthrough_is_verbatim() {
        assert_eq!(one(IrOpcode::Passthrough, &["xch x0, x1"]), "xch x0, x1");
    }
}
