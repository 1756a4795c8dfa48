//! Fixed-width instruction encoding.
//!
//! Every instruction is one 32-bit little-endian word; the instruction-type
//! code lives in bits 27-31 and the operand fields at the positions below.
//!
//! ```text
//! ALU register:             iiiii xxxxx yyyyy zzzzz ----- OOOO MS
//! ALU immediate:            iiiii xxxxx IIIIIIIIIIIIIIII OOOO MS
//! Branch immediate:         Sccc0 xxxxx yyyyy IIIIIIIIIIIIIIII L
//! Branch register:          01101 xxxxx yyyyy zzzzz wwwww III cccM
//! COP-CPU exchange:         01110 xxxxx yyyyyyyyyy ccccc --OOOOO
//! COP instruction:          1111i iiiiiiiiiiiiiiiiiiiiiiiiiii cccc
//! System:                   01111 ooo cccccccccccccccccccccccc
//! Load/Store/LEA fixed:     iiiii xxxxx IIIIIIIIIII SS OO mmm
//! Load/Store/LEA register:  iiiii xxxxx yyyyy zzzzz wwwww SS OO mmm
//! Load immediate:           10001 xxxxx IIIIIIIIIIIIIIII S sssss
//! Set-cond immediate:       1ccc1 xxxxx yyyyy IIIIIIIIIIIIIIII S
//! ```

use crate::mnemonics::{enum_to_u32, InstrType, MnemonicData};
use crate::operand::{OperandData, OperandMode};

#[inline]
pub fn encode_d(v: u32) -> u32 {
    (v & 0x1f) << 22
}

#[inline]
pub fn encode_s0(v: u32) -> u32 {
    (v & 0x1f) << 17
}

#[inline]
pub fn encode_s1(v: u32) -> u32 {
    (v & 0x1f) << 12
}

#[inline]
pub fn encode_s2(v: u32) -> u32 {
    (v & 0x1f) << 7
}

/// First-set-bit shift used by the LI encoding.
#[inline]
fn ffs(v: u32) -> u32 {
    if v == 0 {
        0
    } else {
        v.trailing_zeros()
    }
}

fn invalid_mode(od: &OperandData, name: &str) -> String {
    format!("Invalid mode {} for {}", od.mode.name(), name)
}

/// Encodes one instruction word. `name` is only used in error messages.
pub fn encode_instruction(
    md: &MnemonicData,
    od: &OperandData,
    name: &str,
) -> Result<u32, String> {
    let mut opcode = enum_to_u32(md.class) << 27;

    match md.class {
        InstrType::Alu => {
            opcode |= encode_d(od.integer[0]);
            opcode |= md.alu_op << 2;
            opcode |= md.alu_sign as u32;

            match od.mode {
                // Single-operand form is only valid for sx.b/sx.s.
                OperandMode::Int1 => {
                    if !(md.alu_op == 12 || md.alu_op == 13) {
                        return Err(invalid_mode(od, name));
                    }
                }

                // Immediate mode.
                OperandMode::Int2 => {
                    opcode |= 1 << 1;
                    opcode |= (od.integer[1] & 0xffff) << 6;
                }

                // Register mode.
                OperandMode::Int3 => {
                    opcode |= encode_s0(od.integer[1]);
                    opcode |= encode_s1(od.integer[2]);
                }

                _ => return Err(invalid_mode(od, name)),
            }
        }

        InstrType::Beq
        | InstrType::Bne
        | InstrType::Bgt
        | InstrType::Bge
        | InstrType::Blt
        | InstrType::Ble => {
            if od.mode != OperandMode::Int3 {
                return Err(invalid_mode(od, name));
            }

            let imm = od.integer[2] & 0x1ffff;

            opcode |= encode_d(od.integer[0]);
            opcode |= encode_s0(od.integer[1]);
            opcode |= (imm & 0xffff) << 1;
            opcode |= (imm & 0x10000) << 15;
            opcode |= md.brn_link as u32;
        }

        InstrType::Brr => {
            if od.mode != OperandMode::Int3 {
                return Err(invalid_mode(od, name));
            }

            opcode |= encode_d(od.integer[0]);
            opcode |= encode_s0(od.integer[1]);
            opcode |= encode_s1(od.integer[2]);
            opcode |= md.brr_cond << 1;
        }

        InstrType::Cpe => {
            if od.mode != OperandMode::Int3 && od.mode != OperandMode::Int2 {
                return Err(invalid_mode(od, name));
            }

            opcode |= md.cpe_op;

            // mtcr and mfcr keep "destination <- source" operand order, so
            // their field assignment is mirrored. The two-operand form
            // merges coprocessor number and register into one integer
            // (e.g. `mfcr x0, cop0_xpc`).
            if md.cpe_op == 0 {
                if od.mode == OperandMode::Int3 {
                    opcode |= od.integer[0] << 8;
                    opcode |= (od.integer[1] & 0x3ff) << 12;
                    opcode |= encode_d(od.integer[2]);
                } else {
                    opcode |= encode_d(od.integer[1]);
                    opcode |= (od.integer[0] & 0x3fff) << 8;
                }
            } else {
                if od.mode == OperandMode::Int3 {
                    opcode |= encode_d(od.integer[0]);
                    opcode |= od.integer[1] << 8;
                    opcode |= (od.integer[2] & 0x3ff) << 12;
                } else {
                    opcode |= encode_d(od.integer[0]);
                    opcode |= (od.integer[1] & 0x3fff) << 8;
                }
            }
        }

        InstrType::Sys => {
            if od.mode != OperandMode::Int1 {
                return Err(invalid_mode(od, name));
            }

            opcode |= md.sys_op << 24;
            opcode |= od.integer[0] & 0xffffff;
        }

        InstrType::Lsl => {
            opcode |= md.lsl_op << 3;
            opcode |= md.lsl_size << 5;

            // Mode bits mmm:
            // 000 add scaled register   001 sub scaled register
            // 010 add shifted register  011 sub shifted register
            // 100 add fixed (MSB 0)     101 sub fixed (MSB 0)
            // 110 add fixed (MSB 1)     111 sub fixed (MSB 1)
            opcode |= ((od.fixed as u32) << 2) | (!od.add as u32);

            opcode |= encode_d(od.integer[0]);
            opcode |= encode_s0(od.idx_base);

            if od.fixed {
                let fix = od.idx_fix & 0x7ff;

                // The multiply bit doubles as the fix MSB.
                opcode |= (fix & 0x400) >> 9;
                opcode |= (fix & 0x3ff) << 7;
            } else {
                opcode |= (!od.mult as u32) << 1;
                opcode |= encode_s1(od.idx_index);
                opcode |= encode_s2(od.idx_scale);
            }
        }

        InstrType::Li => {
            if od.mode != OperandMode::Int2 {
                return Err(invalid_mode(od, name));
            }

            opcode |= encode_d(od.integer[0]);

            let fsb = ffs(od.integer[1]);

            opcode |= ((od.integer[1] >> fsb) & 0xffff) << 6;
            opcode |= (md.li_sx as u32) << 5;
            opcode |= fsb;
        }

        InstrType::Cpi => {
            if od.mode != OperandMode::Int2 {
                return Err(invalid_mode(od, name));
            }

            opcode |= od.integer[0];
            opcode |= (od.integer[1] & 0xffffff) << 4;
        }

        InstrType::Seq
        | InstrType::Sne
        | InstrType::Sgt
        | InstrType::Sge
        | InstrType::Slt
        | InstrType::Sle => {
            if od.mode != OperandMode::Int3 {
                return Err(invalid_mode(od, name));
            }

            opcode |= encode_d(od.integer[0]);
            opcode |= encode_s0(od.integer[1]);
            opcode |= (od.integer[2] & 0xffff) << 1;
            opcode |= md.sci_sx as u32;
        }
    }

    Ok(opcode)
}
