//! Collected operand state and register-name resolution.

/// How the operands of one instruction were shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandMode {
    None,
    Int1,
    Int2,
    Int3,
    IdxInt,
    Idx1,
}

impl OperandMode {
    pub fn name(self) -> &'static str {
        match self {
            OperandMode::None => "OPR_NONE",
            OperandMode::Int1 => "OPR_INT1",
            OperandMode::Int2 => "OPR_INT2",
            OperandMode::Int3 => "OPR_INT3",
            OperandMode::IdxInt => "OPR_IDX_INT",
            OperandMode::Idx1 => "OPR_IDX1",
        }
    }
}

/// Fully-resolved operands, ready for encoding. `integer[..]` holds plain
/// operands in order; the `idx_*` fields describe one indexed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandData {
    pub mode: OperandMode,
    pub integer: [u32; 3],
    pub idx_base: u32,
    pub idx_index: u32,
    pub idx_scale: u32,
    pub idx_fix: u32,
    pub fixed: bool,
    pub add: bool,
    pub mult: bool,
}

impl Default for OperandData {
    fn default() -> OperandData {
        OperandData {
            mode: OperandMode::None,
            integer: [0; 3],
            idx_base: 0,
            idx_index: 0,
            idx_scale: 0,
            idx_fix: 0,
            fixed: false,
            add: false,
            mult: false,
        }
    }
}

impl OperandData {
    pub fn int1(a: u32) -> OperandData {
        OperandData {
            mode: OperandMode::Int1,
            integer: [a, 0, 0],
            ..OperandData::default()
        }
    }

    pub fn int2(a: u32, b: u32) -> OperandData {
        OperandData {
            mode: OperandMode::Int2,
            integer: [a, b, 0],
            ..OperandData::default()
        }
    }

    pub fn int3(a: u32, b: u32, c: u32) -> OperandData {
        OperandData {
            mode: OperandMode::Int3,
            integer: [a, b, c],
            ..OperandData::default()
        }
    }

    /// `op reg, [base]` (or the store direction, `op [base], reg`).
    pub fn indexed(reg: u32, base: u32) -> OperandData {
        OperandData {
            mode: OperandMode::IdxInt,
            integer: [reg, 0, 0],
            idx_base: base,
            ..OperandData::default()
        }
    }

    /// `op reg, [base-fix]` / `[base+fix]`.
    pub fn indexed_fixed(reg: u32, base: u32, fix: u32, add: bool) -> OperandData {
        OperandData {
            mode: OperandMode::IdxInt,
            integer: [reg, 0, 0],
            idx_base: base,
            idx_fix: fix,
            fixed: true,
            add,
            ..OperandData::default()
        }
    }
}

/// What an integer operand turned out to be once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntKind {
    Literal,
    Symbol,
    Register,
}

/// Resolves a register name to its encoding number: `r0`-`r31` and their
/// conventional aliases, `x<n>` compiler temporaries, and the coprocessor-0
/// register identifiers.
pub fn register_number(name: &str) -> Option<u32> {
    let fixed = match name {
        "zero" => Some(0),
        "at" => Some(1),
        "a0" => Some(2),
        "fp" => Some(28),
        "sp" => Some(29),
        "lr" => Some(30),
        "pc" => Some(31),
        "cop0_cr0" => Some(0x000),
        "cop0_cr1" => Some(0x010),
        "cop0_xcause" => Some(0x020),
        "cop0_xhaddr" => Some(0x030),
        "cop0_xpc" => Some(0x040),
        _ => None,
    };

    if fixed.is_some() {
        return fixed;
    }

    if let Some(rest) = name.strip_prefix('r') {
        return rest.parse::<u32>().ok().filter(|&n| n <= 31);
    }

    // x0..x24 are r3..r27.
    if let Some(rest) = name.strip_prefix('x') {
        return rest
            .parse::<u32>()
            .ok()
            .filter(|&n| n <= 24)
            .map(|n| n + 3);
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_aliases() {
        assert_eq!(register_number("r0"), Some(0));
        assert_eq!(register_number("zero"), Some(0));
        assert_eq!(register_number("at"), Some(1));
        assert_eq!(register_number("a0"), Some(2));
        assert_eq!(register_number("x0"), Some(3));
        assert_eq!(register_number("x24"), Some(27));
        assert_eq!(register_number("fp"), Some(28));
        assert_eq!(register_number("sp"), Some(29));
        assert_eq!(register_number("lr"), Some(30));
        assert_eq!(register_number("pc"), Some(31));
        assert_eq!(register_number("r31"), Some(31));
        assert_eq!(register_number("cop0_xpc"), Some(0x040));
    }

    #[test]
    fn out_of_range_names() {
        assert_eq!(register_number("r32"), None);
        assert_eq!(register_number("x25"), None);
        assert_eq!(register_number("y0"), None);
        assert_eq!(register_number("_main"), None);
    }
}
