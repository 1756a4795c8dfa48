//! Two-pass assembler for the HV2 architecture.
//!
//! The main entry point is [`assemble`](fn.assemble.html), which accepts
//! HV2 assembly text and produces an [`Output`](struct.Output.html): the
//! raw machine-code bytes, the section records, the entry point, and the
//! global symbol table. Wrapping the output into an executable image is
//! done by the [elf32](../elf32/index.html) crate
//! (`elf32::Image::link(...)`).
//!
//! Parsing is implemented with [pest]; the crate's [`Error`](type.Error.html)
//! type is an alias of `pest::error::Error`, so all pest functionality such
//! as pretty error formatting is available on failures.
//!
//! Branch displacements compensate for the target's pipeline depth: a
//! symbol operand resolves to `address - (current_vaddr + pipeline_size *
//! 4)` unless pipeline-flush mode is on (offset 0) or the operand carries
//! the `!` absolute marker.
//!
//! [pest]: https://docs.rs/pest/

mod assembler;
mod encode;
mod mnemonics;
mod operand;
mod parser;
mod pseudo;

pub use assembler::{assemble, Output};
pub use encode::{encode_d, encode_instruction, encode_s0, encode_s1, encode_s2};
pub use mnemonics::{mnemonic_data, pseudo_op, InstrType, MnemonicData, PseudoOp};
pub use operand::{register_number, OperandData, OperandMode};
pub use parser::Rule;

use pest::Span;

pub type Error = pest::error::Error<Rule>;

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn new_parser_error(span: Span, message: String) -> Error {
    Error::new_from_span(pest::error::ErrorVariant::CustomError { message }, span)
}

/// Assembler configuration (`--Xasm` on the compiler driver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Pipeline depth in instructions; branch displacements are reduced by
    /// `pipeline_size * 4` bytes.
    pub pipeline_size: u32,
    /// When set, branches flush the pipeline and no compensation applies.
    pub flush: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            pipeline_size: 3,
            flush: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    fn assemble_ok(source: &str) -> Output {
        assemble(source, &Options::default()).unwrap()
    }

    fn words(output: &Output) -> Vec<u32> {
        output
            .text
            .chunks(4)
            .map(|c| LittleEndian::read_u32(c))
            .collect()
    }

    #[test]
    fn encodes_single_alu_instruction() {
        let output = assemble_ok("add.u r1, r2, r3\n");

        assert_eq!(output.text, vec![0x00, 0x30, 0x44, 0x00]);
    }

    #[test]
    fn labels_record_addresses() {
        let output = assemble_ok(".org 0x40000\nstart:\n    nop\n    nop\nafter:\n    nop\n");

        assert_eq!(output.symbols.len(), 2);
        assert_eq!(output.symbols[0], ("after".to_owned(), 0x40008));
        assert_eq!(output.symbols[1], ("start".to_owned(), 0x40000));
    }

    #[test]
    fn local_labels_scope_to_current_symbol() {
        // Both f and g define a local l0; the reference after g's label
        // resolves to g's copy (address 4), PC-relative as usual.
        let output = assemble_ok("f:\n.l0:\n    nop\ng:\n.l0:\n    nop\n.dl l0\n");

        let value = LittleEndian::read_u32(&output.text[8..12]);

        assert_eq!(value, 4u32.wrapping_sub(8 + 12));
    }

    #[test]
    fn pipeline_compensation() {
        // beq r0, r0, target with target 16 bytes ahead encodes 16 - 12.
        let source = "beq r0, r0, target\nnop\nnop\nnop\ntarget:\n    nop\n";

        let output = assemble_ok(source);
        let word = words(&output)[0];

        assert_eq!((word >> 1) & 0xffff, 4);

        // With flush mode the full displacement is encoded.
        let flushed = assemble(
            source,
            &Options {
                pipeline_size: 3,
                flush: true,
            },
        )
        .unwrap();

        assert_eq!((words(&flushed)[0] >> 1) & 0xffff, 16);
    }

    #[test]
    fn absolute_marker_skips_compensation() {
        let output = assemble_ok(".org 0x40000\nmain:\n    li.w x0, !main\n");

        // li.w expands to li.u + or.u; the or.u immediate is the low half
        // of the absolute address.
        let w = words(&output);

        assert_eq!(w.len(), 2);
        assert_eq!((w[1] >> 6) & 0xffff, 0x0000);

        // And the high half went through li.u: ffs(0x40000) = 18.
        assert_eq!(w[0] & 0x1f, 18);
    }

    #[test]
    fn pass0_is_idempotent() {
        let source = ".org 0x40000\nmain:\n    nop\nloop:\n    b loop\n";

        let first = assemble_ok(source).symbols;
        let second = assemble_ok(source).symbols;

        assert_eq!(first, second);
    }

    #[test]
    fn data_directives_emit_little_endian() {
        let output = assemble_ok(".db 1, 2\n.ds 0x1234\n.dl 0xdeadbeef\n");

        assert_eq!(
            output.text,
            vec![1, 2, 0x34, 0x12, 0xef, 0xbe, 0xad, 0xde]
        );
    }

    #[test]
    fn data_values_advance_position_per_element() {
        let output = assemble_ok(".db 1, 2, 3, 4\nafter:\n    nop\n");

        assert_eq!(output.symbols[0], ("after".to_owned(), 4));
        assert_eq!(output.text.len(), 8);
    }

    #[test]
    fn asciiz_terminates() {
        let output = assemble_ok(".asciiz \"hello\"\n");

        assert_eq!(output.text, b"hello\0");

        let plain = assemble_ok(".ascii \"hi\"\n");

        assert_eq!(plain.text, b"hi");
    }

    #[test]
    fn align_pads_with_zeroes() {
        let output = assemble_ok(".ascii \"abc\"\n.align 4\nnop\n");

        assert_eq!(output.text.len(), 8);
        assert_eq!(&output.text[3..4], &[0]);
    }

    #[test]
    fn entry_directive_resolves_absolute() {
        let output = assemble_ok(".org 0x40000\n.entry !main\nmain:\n    nop\n");

        assert_eq!(output.entry, 0x40000);
    }

    #[test]
    fn sections_record_layout() {
        let output = assemble_ok(
            ".org 0x40000\n.section .text\nmain:\n    nop\n    nop\n.section .rodata\n.asciiz \"x\"\n",
        );

        // Sentinel, .text, .rodata.
        assert_eq!(output.sections.len(), 3);
        assert_eq!(output.sections[1].name, ".text");
        assert_eq!(output.sections[1].header.sh_size, 8);
        assert_eq!(output.sections[1].header.sh_addr, 0x40000);
        assert_eq!(output.sections[2].name, ".rodata");
        assert_eq!(output.sections[2].header.sh_size, 2);
    }

    #[test]
    fn push_pop_expand() {
        let output = assemble_ok("push x0\npop x0\n");

        // Two instructions each.
        assert_eq!(output.text.len(), 16);

        let w = words(&output);

        // push: sub.u sp, 4 then store.l [sp], x0.
        assert_eq!(w[0], (29 << 22) | (4 << 6) | (1 << 2) | (1 << 1));
        assert_eq!(w[1] >> 27, 0b10000);
    }

    #[test]
    fn push_range_expands_per_register() {
        let output = assemble_ok("push {x0, x3}\n");

        assert_eq!(output.text.len(), 4 * 2 * 4);
    }

    #[test]
    fn unknown_mnemonic_is_fatal() {
        let err = assemble("frobnicate r0\n", &Options::default()).unwrap_err();

        assert!(format!("{}", err).contains("Unknown instruction"));
    }

    #[test]
    fn invalid_mode_is_fatal() {
        let err = assemble("add.u r1\n", &Options::default()).unwrap_err();

        assert!(format!("{}", err).contains("Invalid mode"));
    }

    #[test]
    fn undefined_symbol_is_fatal() {
        let err = assemble("beq r0, r0, nowhere\n", &Options::default()).unwrap_err();

        assert!(format!("{}", err).contains("Undefined symbol"));
    }

    #[test]
    fn call_and_ret_expand() {
        let output = assemble_ok("main:\n    call.r x0\n    ret\n");

        assert_eq!(output.text.len(), 8 * 4);
    }

    #[test]
    fn xch_is_three_xors() {
        let output = assemble_ok("xch x0, x1\n");

        let w = words(&output);

        assert_eq!(w.len(), 3);

        // All three are xor.u (ALU op 8, register mode).
        for word in w {
            assert_eq!(word >> 27, 0);
            assert_eq!((word >> 2) & 0xf, 8);
        }
    }

    #[test]
    fn blob_splices_file_bytes() {
        let dir = std::env::temp_dir().join("hv2asm-blob-test");
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join("blob.bin");
        std::fs::write(&path, &[1u8, 2, 3]).unwrap();

        let source = format!(".blob \"{}\"\nafter:\n    nop\n", path.display());
        let output = assemble_ok(&source);

        assert_eq!(&output.text[..3], &[1, 2, 3]);
        assert_eq!(output.symbols[0], ("after".to_owned(), 3));
    }

    #[test]
    fn org_rejects_symbols() {
        let err = assemble("main:\n.org main\n", &Options::default()).unwrap_err();

        assert!(format!("{}", err).contains(".org"));
    }
}
