//! Pseudo-instruction expansion.
//!
//! Each pseudo-mnemonic expands into a fixed sequence of real instructions,
//! built directly as operand records and encoded on the spot (no text
//! round-trip). Operand symbols were already resolved at the
//! pseudo-instruction's own address, matching the behavior of expanding
//! before the address advances.

use crate::encode::encode_instruction;
use crate::mnemonics::{mnemonic_data, PseudoOp};
use crate::operand::OperandData;

const R0: u32 = 0;
const AT: u32 = 1;
const SP: u32 = 29;
const PC: u32 = 31;

/// How many words a pseudo-instruction expands to; needed by pass 0 before
/// operands can be resolved.
pub fn expansion_len(op: PseudoOp) -> u32 {
    match op {
        PseudoOp::B => 1,
        PseudoOp::LiW => 2,
        PseudoOp::Nop => 1,
        PseudoOp::Move => 1,
        PseudoOp::Not => 1,
        PseudoOp::Swap => 1,
        PseudoOp::Clr => 1,
        PseudoOp::ZxB | PseudoOp::ZxS => 1,
        PseudoOp::Inc | PseudoOp::Dec => 1,
        PseudoOp::CallI => 5,
        PseudoOp::CallR => 4,
        PseudoOp::Ret => 4,
        PseudoOp::Push => 2,
        PseudoOp::Pop => 2,
        PseudoOp::Xch => 3,
    }
}

fn enc(name: &str, od: OperandData) -> Result<u32, String> {
    let md = mnemonic_data(name).expect("expansion refers to a real mnemonic");

    encode_instruction(&md, &od, name)
}

/// `li.w d, value` — load a full 32-bit value via `li.u` + `or.u`.
fn expand_li_w(d: u32, value: u32) -> Result<Vec<u32>, String> {
    Ok(vec![
        enc("li.u", OperandData::int2(d, value & 0xffff_0000))?,
        enc("or.u", OperandData::int2(d, value & 0x0000_ffff))?,
    ])
}

pub fn expand(op: PseudoOp, od: &OperandData, pipeline_offset: u32) -> Result<Vec<u32>, String> {
    let words = match op {
        // b target  ->  beq r0, r0, target
        PseudoOp::B => vec![enc("beq", OperandData::int3(R0, R0, od.integer[0]))?],

        PseudoOp::LiW => expand_li_w(od.integer[0], od.integer[1])?,

        PseudoOp::Nop => vec![enc("add.u", OperandData::int3(R0, R0, R0))?],

        // move d, s  ->  add.u d, r0, s
        PseudoOp::Move => vec![enc(
            "add.u",
            OperandData::int3(od.integer[0], R0, od.integer[1]),
        )?],

        PseudoOp::Not => vec![enc("xor.s", OperandData::int2(od.integer[0], 0xffff))?],

        PseudoOp::Swap => vec![enc("rol.u", OperandData::int2(od.integer[0], 16))?],

        PseudoOp::Clr => {
            let d = od.integer[0];

            vec![enc("xor.u", OperandData::int3(d, d, d))?]
        }

        PseudoOp::ZxB => vec![enc("and.u", OperandData::int2(od.integer[0], 0xff))?],
        PseudoOp::ZxS => vec![enc("and.u", OperandData::int2(od.integer[0], 0xffff))?],

        PseudoOp::Inc => vec![enc("add.u", OperandData::int2(od.integer[0], 1))?],
        PseudoOp::Dec => vec![enc("sub.u", OperandData::int2(od.integer[0], 1))?],

        PseudoOp::CallI => {
            let mut words = vec![
                enc("sub.u", OperandData::int2(SP, 4))?,
                enc("store.l", OperandData::indexed(PC, SP))?,
            ];

            words.extend(expand_li_w(AT, od.integer[0])?);
            words.push(enc("add.u", OperandData::int3(PC, R0, AT))?);

            words
        }

        PseudoOp::CallR => vec![
            enc("sub.u", OperandData::int2(SP, 4))?,
            enc("store.l", OperandData::indexed(PC, SP))?,
            enc("add.u", OperandData::int3(R0, R0, R0))?,
            enc("add.u", OperandData::int3(PC, R0, od.integer[0]))?,
        ],

        PseudoOp::Ret => vec![
            enc("add.u", OperandData::int2(SP, 4))?,
            enc("load.l", OperandData::indexed_fixed(AT, SP, 4, false))?,
            enc("add.u", OperandData::int2(AT, pipeline_offset))?,
            enc("add.u", OperandData::int3(PC, R0, AT))?,
        ],

        PseudoOp::Push => vec![
            enc("sub.u", OperandData::int2(SP, 4))?,
            enc("store.l", OperandData::indexed(od.integer[0], SP))?,
        ],

        PseudoOp::Pop => vec![
            enc("add.u", OperandData::int2(SP, 4))?,
            enc("load.l", OperandData::indexed_fixed(od.integer[0], SP, 4, false))?,
        ],

        // XOR swap.
        PseudoOp::Xch => {
            let (a, b) = (od.integer[0], od.integer[1]);

            vec![
                enc("xor.u", OperandData::int3(a, a, b))?,
                enc("xor.u", OperandData::int3(b, b, a))?,
                enc("xor.u", OperandData::int3(a, a, b))?,
            ]
        }
    };

    debug_assert_eq!(words.len() as u32, expansion_len(op));

    Ok(words)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_expansion_matches_its_length() {
        let ops = [
            PseudoOp::B,
            PseudoOp::LiW,
            PseudoOp::Nop,
            PseudoOp::Move,
            PseudoOp::Not,
            PseudoOp::Swap,
            PseudoOp::Clr,
            PseudoOp::ZxB,
            PseudoOp::ZxS,
            PseudoOp::Inc,
            PseudoOp::Dec,
            PseudoOp::CallI,
            PseudoOp::CallR,
            PseudoOp::Ret,
            PseudoOp::Push,
            PseudoOp::Pop,
            PseudoOp::Xch,
        ];

        for &op in &ops {
            let od = OperandData::int2(3, 4);
            let words = expand(op, &od, 12).unwrap();

            assert_eq!(words.len() as u32, expansion_len(op), "{:?}", op);
        }
    }

    #[test]
    fn nop_is_add_zero() {
        let words = expand(PseudoOp::Nop, &OperandData::int1(0), 12).unwrap();

        assert_eq!(words, vec![0]);
    }

    #[test]
    fn branch_always_is_beq_zero_zero() {
        let words = expand(PseudoOp::B, &OperandData::int1(4), 12).unwrap();

        assert_eq!(words[0], (0b00010 << 27) | (4 << 1));
    }

    #[test]
    fn push_is_sub_then_store() {
        let words = expand(PseudoOp::Push, &OperandData::int1(0), 12).unwrap();

        // sub.u sp, 4
        assert_eq!(words[0], (29 << 22) | (4 << 6) | (1 << 2) | (1 << 1));

        // store.l [sp], r0
        assert_eq!(words[1] >> 27, 0b10000);
        assert_eq!((words[1] >> 17) & 0x1f, 29);
    }

    #[test]
    fn ret_applies_pipeline_offset() {
        let flushed = expand(PseudoOp::Ret, &OperandData::default(), 0).unwrap();
        let delayed = expand(PseudoOp::Ret, &OperandData::default(), 12).unwrap();

        // Third word adds the pipeline offset to the return address.
        assert_ne!(flushed[2], delayed[2]);
        assert_eq!((delayed[2] >> 6) & 0xffff, 12);
    }

    #[test]
    fn li_w_splits_halves() {
        let words = expand(PseudoOp::LiW, &OperandData::int2(3, 0xdead_beef), 12).unwrap();

        // li.u of the high half: ffs(0xdead0000) = 16, payload 0xdead.
        assert_eq!(words[0] & 0x1f, 16);
        assert_eq!((words[0] >> 6) & 0xffff, 0xdead);

        // or.u of the low half.
        assert_eq!((words[1] >> 6) & 0xffff, 0xbeef);
    }
}
