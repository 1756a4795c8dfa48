//! The linear, register-virtual intermediate representation.
//!
//! An instruction is an opcode plus up to four string arguments (symbolic
//! register names, decimal literals, labels, operator spellings). Per
//! function the generator produces one ordered list; the translator renders
//! the lists to target assembly text.

pub mod generator;
pub mod translate;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrOpcode {
    Label,
    Mov,
    Movi,
    Loadr,
    Loadf,
    Store,
    Addsp,
    Subsp,
    Addfp,
    Decsp,
    Callr,
    Cmpzb,
    Cmpr,
    Pushr,
    Popr,
    Leaf,
    Ret,
    Alu,
    Fpu,
    Branch,
    Define,
    Undef,
    Defstr,
    Defv,
    Defblob,
    Section,
    Org,
    Entry,
    Passthrough,
    Nop,
    Debug,
    Align,
}

impl IrOpcode {
    pub fn name(self) -> &'static str {
        match self {
            IrOpcode::Label => "LABEL",
            IrOpcode::Mov => "MOV",
            IrOpcode::Movi => "MOVI",
            IrOpcode::Loadr => "LOADR",
            IrOpcode::Loadf => "LOADF",
            IrOpcode::Store => "STORE",
            IrOpcode::Addsp => "ADDSP",
            IrOpcode::Subsp => "SUBSP",
            IrOpcode::Addfp => "ADDFP",
            IrOpcode::Decsp => "DECSP",
            IrOpcode::Callr => "CALLR",
            IrOpcode::Cmpzb => "CMPZB",
            IrOpcode::Cmpr => "CMPR",
            IrOpcode::Pushr => "PUSHR",
            IrOpcode::Popr => "POPR",
            IrOpcode::Leaf => "LEAF",
            IrOpcode::Ret => "RET",
            IrOpcode::Alu => "ALU",
            IrOpcode::Fpu => "FPU",
            IrOpcode::Branch => "BRANCH",
            IrOpcode::Define => "DEFINE",
            IrOpcode::Undef => "UNDEF",
            IrOpcode::Defstr => "DEFSTR",
            IrOpcode::Defv => "DEFV",
            IrOpcode::Defblob => "DEFBLOB",
            IrOpcode::Section => "SECTION",
            IrOpcode::Org => "ORG",
            IrOpcode::Entry => "ENTRY",
            IrOpcode::Passthrough => "PASSTHROUGH",
            IrOpcode::Nop => "NOP",
            IrOpcode::Debug => "DEBUG",
            IrOpcode::Align => "ALIGN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrInstruction {
    pub opcode: IrOpcode,
    pub args: [String; 4],
}

impl IrInstruction {
    pub fn new(opcode: IrOpcode, args: &[&str]) -> IrInstruction {
        let mut filled: [String; 4] = Default::default();

        for (slot, arg) in filled.iter_mut().zip(args) {
            *slot = (*arg).to_owned();
        }

        IrInstruction {
            opcode,
            args: filled,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.args.iter().take_while(|a| !a.is_empty()).count()
    }
}

impl fmt::Display for IrInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.opcode.name())?;

        for arg in self.args.iter().take(self.arg_count()) {
            write!(f, " {}", arg)?;
        }

        Ok(())
    }
}

pub type IrFunction = Vec<IrInstruction>;
