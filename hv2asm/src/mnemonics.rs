//! The structured mnemonic tables.
//!
//! Every real mnemonic resolves to a [`MnemonicData`] record: the 5-bit
//! instruction-type code plus the fixed sub-fields the encoder needs.
//! Pseudo-mnemonics resolve to a [`PseudoOp`] and expand elsewhere.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;

/// 5-bit instruction-type codes (bits 27-31 of every encoded word).
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
pub enum InstrType {
    Alu = 0b00000,
    Beq = 0b00010,
    Bne = 0b00100,
    Bgt = 0b00110,
    Bge = 0b01000,
    Blt = 0b01010,
    Ble = 0b01100,
    Brr = 0b01101,
    Cpe = 0b01110,
    Sys = 0b01111,
    Lsl = 0b10000,
    Li = 0b10001,
    Seq = 0b10011,
    Sne = 0b10101,
    Sgt = 0b10111,
    Sge = 0b11001,
    Slt = 0b11011,
    Sle = 0b11101,
    Cpi = 0b11110,
}

#[inline]
pub fn enum_to_u32<T: ToPrimitive + Copy>(val: T) -> u32 {
    val.to_u32().unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MnemonicData {
    pub class: InstrType,
    pub alu_op: u32,
    pub alu_sign: bool,
    pub alu_mode: bool,
    pub brn_link: bool,
    pub brr_cond: u32,
    pub cpe_op: u32,
    pub sys_op: u32,
    pub lsl_op: u32,
    pub lsl_size: u32,
    pub sci_sx: bool,
    pub li_sx: bool,
}

const fn base(class: InstrType) -> MnemonicData {
    MnemonicData {
        class,
        alu_op: 0,
        alu_sign: false,
        alu_mode: false,
        brn_link: false,
        brr_cond: 0,
        cpe_op: 0,
        sys_op: 0,
        lsl_op: 0,
        lsl_size: 0,
        sci_sx: false,
        li_sx: false,
    }
}

const fn alu(op: u32, sign: bool, mode: bool) -> MnemonicData {
    let mut md = base(InstrType::Alu);

    md.alu_op = op;
    md.alu_sign = sign;
    md.alu_mode = mode;

    md
}

const fn brn(class: InstrType, link: bool) -> MnemonicData {
    let mut md = base(class);

    md.brn_link = link;

    md
}

const fn brr(link: bool, cond: u32) -> MnemonicData {
    let mut md = base(InstrType::Brr);

    md.brn_link = link;
    md.brr_cond = cond;

    md
}

const fn cpe(op: u32) -> MnemonicData {
    let mut md = base(InstrType::Cpe);

    md.cpe_op = op;

    md
}

const fn sci(class: InstrType, sx: bool) -> MnemonicData {
    let mut md = base(class);

    md.sci_sx = sx;

    md
}

const fn sys(op: u32) -> MnemonicData {
    let mut md = base(InstrType::Sys);

    md.sys_op = op;

    md
}

const fn lsl(op: u32, size: u32) -> MnemonicData {
    let mut md = base(InstrType::Lsl);

    md.lsl_op = op;
    md.lsl_size = size;

    md
}

const fn li(sx: bool) -> MnemonicData {
    let mut md = base(InstrType::Li);

    md.li_sx = sx;

    md
}

/// Real (directly encodable) mnemonics.
pub fn mnemonic_data(name: &str) -> Option<MnemonicData> {
    let md = match name {
        // ALU register/immediate, unsigned/signed variants
        "add" | "add.s" => alu(0x0, true, false),
        "add.u" => alu(0x0, false, false),
        "addi" | "addi.s" => alu(0x0, true, true),
        "addi.u" => alu(0x0, false, true),

        "sub" | "sub.s" => alu(0x1, true, false),
        "sub.u" => alu(0x1, false, false),
        "subi" | "subi.s" => alu(0x1, true, true),
        "subi.u" => alu(0x1, false, true),

        "mul" | "mul.s" => alu(0x2, true, false),
        "mul.u" => alu(0x2, false, false),
        "muli" | "muli.s" => alu(0x2, true, true),
        "muli.u" => alu(0x2, false, true),

        "mla" | "mla.s" => alu(0x3, true, false),
        "mla.u" => alu(0x3, false, false),
        "mlai" | "mlai.s" => alu(0x3, true, true),
        "mlai.u" => alu(0x3, false, true),

        "div" | "div.s" => alu(0x4, true, false),
        "div.u" => alu(0x4, false, false),
        "divi" | "divi.s" => alu(0x4, true, true),
        "divi.u" => alu(0x4, false, true),

        "mod" | "mod.s" => alu(0x5, true, false),
        "mod.u" => alu(0x5, false, false),
        "modi" | "modi.s" => alu(0x5, true, true),
        "modi.u" => alu(0x5, false, true),

        "and" | "and.s" => alu(0x6, true, false),
        "and.u" => alu(0x6, false, false),
        "andi" | "andi.s" => alu(0x6, true, true),
        "andi.u" => alu(0x6, false, true),

        "or" | "or.s" => alu(0x7, true, false),
        "or.u" => alu(0x7, false, false),
        "ori" | "ori.s" => alu(0x7, true, true),
        "ori.u" => alu(0x7, false, true),

        "xor" | "xor.s" => alu(0x8, true, false),
        "xor.u" => alu(0x8, false, false),
        "xori" | "xori.s" => alu(0x8, true, true),
        "xori.u" => alu(0x8, false, true),

        "lsl" | "lsl.s" => alu(0x9, true, false),
        "lsl.u" => alu(0x9, false, false),
        "lsli" | "lsli.s" => alu(0x9, true, true),
        "lsli.u" => alu(0x9, false, true),

        "lsr" | "lsr.s" => alu(0xa, true, false),
        "lsr.u" => alu(0xa, false, false),
        "lsri" | "lsri.s" => alu(0xa, true, true),
        "lsri.u" => alu(0xa, false, true),

        "asr" | "asr.s" => alu(0xb, true, false),
        "asr.u" => alu(0xb, false, false),
        "asri" | "asri.s" => alu(0xb, true, true),
        "asri.u" => alu(0xb, false, true),

        "sx.b" => alu(0xc, true, true),
        "sx.s" => alu(0xd, true, true),

        "rol" | "rol.s" => alu(0xe, true, false),
        "rol.u" => alu(0xe, false, false),
        "roli" | "roli.s" => alu(0xe, true, true),
        "roli.u" => alu(0xe, false, true),

        "ror" | "ror.s" => alu(0xf, true, false),
        "ror.u" => alu(0xf, false, false),
        "rori" | "rori.s" => alu(0xf, true, true),
        "rori.u" => alu(0xf, false, true),

        // Branch immediate
        "beq" => brn(InstrType::Beq, false),
        "bleq" => brn(InstrType::Beq, true),
        "bne" => brn(InstrType::Bne, false),
        "blne" => brn(InstrType::Bne, true),
        "bgt" => brn(InstrType::Bgt, false),
        "blgt" => brn(InstrType::Bgt, true),
        "bge" => brn(InstrType::Bge, false),
        "blge" => brn(InstrType::Bge, true),
        "blt" => brn(InstrType::Blt, false),
        "bllt" => brn(InstrType::Blt, true),
        "ble" => brn(InstrType::Ble, false),
        "blle" => brn(InstrType::Ble, true),

        // Branch register
        "beq.r" => brr(false, 1),
        "bleq.r" => brr(true, 1),
        "bne.r" => brr(false, 2),
        "blne.r" => brr(true, 2),
        "bgt.r" => brr(false, 3),
        "blgt.r" => brr(true, 3),
        "bge.r" => brr(false, 4),
        "blge.r" => brr(true, 4),
        "blt.r" => brr(false, 5),
        "bllt.r" => brr(true, 5),
        "ble.r" => brr(false, 6),
        "blle.r" => brr(true, 6),

        // Coprocessor-CPU exchange
        "mtcr" => cpe(0),
        "mfcr" => cpe(1),

        // Coprocessor instruction
        "cpex" => base(InstrType::Cpi),

        // Set-cond immediate
        "seq.u" => sci(InstrType::Seq, false),
        "seq.s" => sci(InstrType::Seq, true),
        "sne.u" => sci(InstrType::Sne, false),
        "sne.s" => sci(InstrType::Sne, true),
        "sgt.u" => sci(InstrType::Sgt, false),
        "sgt.s" => sci(InstrType::Sgt, true),
        "sge.u" => sci(InstrType::Sge, false),
        "sge.s" => sci(InstrType::Sge, true),
        "slt.u" => sci(InstrType::Slt, false),
        "slt.s" => sci(InstrType::Slt, true),
        "sle.u" => sci(InstrType::Sle, false),
        "sle.s" => sci(InstrType::Sle, true),

        // Translator shorthands: the unsuffixed set-cond forms
        "seq" => sci(InstrType::Seq, false),
        "sne" => sci(InstrType::Sne, false),
        "sgt" => sci(InstrType::Sgt, false),
        "sge" => sci(InstrType::Sge, false),
        "slt" => sci(InstrType::Slt, false),
        "sle" => sci(InstrType::Sle, false),

        // System
        "syscall" => sys(0),
        "tpl0" => sys(1),
        "tpl1" => sys(2),
        "tpl2" => sys(3),
        "tpl3" => sys(4),
        "debug" => sys(5),
        "excep" => sys(6),

        // Load/Store/LEA
        "load.b" => lsl(0, 0),
        "load.s" => lsl(0, 1),
        "load.l" => lsl(0, 2),
        "load.x" => lsl(0, 3),
        "store.b" => lsl(1, 0),
        "store.s" => lsl(1, 1),
        "store.l" => lsl(1, 2),
        "store.x" => lsl(1, 3),
        "lea.b" => lsl(2, 0),
        "lea.s" => lsl(2, 1),
        "lea.l" => lsl(2, 2),
        "lea.x" => lsl(2, 3),

        // Load immediate
        "li" | "li.s" => li(true),
        "li.u" => li(false),

        _ => return None,
    };

    Some(md)
}

/// Pseudo-mnemonics, expanded into one or more real instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoOp {
    B,
    LiW,
    Nop,
    Move,
    Not,
    Swap,
    Clr,
    ZxB,
    ZxS,
    Inc,
    Dec,
    CallI,
    CallR,
    Ret,
    Push,
    Pop,
    Xch,
}

pub fn pseudo_op(name: &str) -> Option<PseudoOp> {
    let op = match name {
        "b" | "bra" => PseudoOp::B,
        "li.w" => PseudoOp::LiW,
        "nop" => PseudoOp::Nop,
        "move" | "mov" => PseudoOp::Move,
        "not" => PseudoOp::Not,
        "swap" => PseudoOp::Swap,
        "clr" => PseudoOp::Clr,
        "zx.b" => PseudoOp::ZxB,
        "zx.s" => PseudoOp::ZxS,
        "inc" => PseudoOp::Inc,
        "dec" => PseudoOp::Dec,
        "call.i" | "call" => PseudoOp::CallI,
        "call.r" => PseudoOp::CallR,
        "ret" => PseudoOp::Ret,
        "push" => PseudoOp::Push,
        "pop" => PseudoOp::Pop,
        "xch" => PseudoOp::Xch,
        _ => return None,
    };

    Some(op)
}
