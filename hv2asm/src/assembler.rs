//! The two-pass assembler.
//!
//! Pass 0 walks the statement list tracking the virtual address and file
//! position and records every label's address (globals, and locals scoped
//! to the current global symbol). Pass 1 walks again, resolves symbols,
//! encodes instructions, and emits bytes. The pass transition finalizes
//! the open section record and resets position, address, and current
//! symbol.

use std::collections::HashMap;
use std::fs;

use byteorder::{LittleEndian, WriteBytesExt};
use pest::Span;

use elf32::{section_flags, section_type, section_type_by_name, Section, SHF_ALLOC, SHF_WRITE};

use crate::encode::encode_instruction;
use crate::mnemonics::{mnemonic_data, pseudo_op, PseudoOp};
use crate::operand::{register_number, IntKind, OperandData, OperandMode};
use crate::parser::{DirectiveArg, IntAtom, IntExpr, Operand, Statement};
use crate::{new_parser_error, Error, Options, Result};

#[derive(Debug)]
pub struct Output {
    /// The raw assembled bytes (the "text stream").
    pub text: Vec<u8>,
    /// Section records accumulated during pass 1, sentinel first.
    pub sections: Vec<Section>,
    /// Value of the `.entry` directive, 0 if none appeared.
    pub entry: u32,
    /// Global symbol table, sorted by name.
    pub symbols: Vec<(String, u32)>,
}

pub struct Assembler {
    pos: u32,
    vaddr: u32,
    entry: u32,
    pass: u32,
    globals: HashMap<String, u32>,
    locals: HashMap<String, u32>,
    current_symbol: String,
    sections: Vec<Section>,
    output: Vec<u8>,
    pipeline_size: u32,
    flush: bool,
}

impl Assembler {
    pub fn new(options: &Options) -> Assembler {
        Assembler {
            pos: 0,
            vaddr: 0,
            entry: 0,
            pass: 0,
            globals: HashMap::new(),
            locals: HashMap::new(),
            current_symbol: "none".to_owned(),
            sections: vec![Section::sentinel()],
            output: Vec::new(),
            pipeline_size: options.pipeline_size,
            flush: options.flush,
        }
    }

    fn pipeline_offset(&self) -> u32 {
        if self.flush {
            0
        } else {
            self.pipeline_size * 4
        }
    }

    fn finalize_section(&mut self) {
        if let Some(section) = self.sections.last_mut() {
            section.header.sh_size = self.pos - section.header.sh_offset;
        }
    }

    fn setup_next_pass(&mut self) {
        self.finalize_section();

        self.pass += 1;
        self.pos = 0;
        self.vaddr = 0;
        self.current_symbol = "none".to_owned();
    }

    fn lookup_symbol(&self, name: &str) -> Option<u32> {
        if let Some(&value) = self.globals.get(name) {
            return Some(value);
        }

        let local = format!("{}{}", name, self.current_symbol);

        self.locals.get(&local).copied()
    }

    /// Resolves an integer-or-symbol expression. On pass 0 symbols resolve
    /// to 0; on pass 1 registers short-circuit to their number and labels
    /// become either absolute values (`!` marker) or displacements relative
    /// to the current address plus the pipeline offset.
    fn resolve_int(&self, expr: &IntExpr) -> Result<(u32, IntKind)> {
        let (value, kind) = match &expr.atom {
            IntAtom::Literal(v) => (*v, IntKind::Literal),

            IntAtom::Symbol(name) => {
                if self.pass == 0 {
                    return Ok((0, IntKind::Literal));
                }

                if let Some(number) = register_number(name) {
                    let value = if expr.negative {
                        number.wrapping_neg()
                    } else {
                        number
                    };

                    return Ok((value, IntKind::Register));
                }

                let value = self.lookup_symbol(name).ok_or_else(|| {
                    new_parser_error(
                        expr.span.clone(),
                        format!("Undefined symbol \"{}\"", name),
                    )
                })?;

                let value = if expr.absolute {
                    value
                } else {
                    value.wrapping_sub(self.vaddr + self.pipeline_offset())
                };

                return Ok((value, IntKind::Symbol));
            }
        };

        let value = if expr.negative {
            value.wrapping_neg()
        } else {
            value
        };

        Ok((value, kind))
    }

    /// Folds a flat operand list into one resolved operand record.
    fn collect_operands(&self, operands: &[Operand], span: &Span) -> Result<OperandData> {
        let mut od = OperandData::default();

        for operand in operands {
            match operand {
                Operand::Int(expr) => {
                    let (value, _) = self.resolve_int(expr)?;

                    od.mode = match od.mode {
                        OperandMode::None => {
                            od.integer[0] = value;

                            OperandMode::Int1
                        }
                        OperandMode::Int1 => {
                            od.integer[1] = value;

                            OperandMode::Int2
                        }
                        OperandMode::Int2 => {
                            od.integer[2] = value;

                            OperandMode::Int3
                        }
                        OperandMode::Idx1 => {
                            od.integer[0] = value;

                            OperandMode::IdxInt
                        }
                        _ => {
                            return Err(new_parser_error(
                                span.clone(),
                                "Unknown operand mode".to_owned(),
                            ));
                        }
                    };
                }

                Operand::Indexed(indexed) => {
                    let (base, _) = self.resolve_int(&indexed.base)?;

                    od.idx_base = base;
                    od.add = indexed.add;
                    od.mult = indexed.shift;

                    if let Some(offset) = &indexed.offset {
                        let (value, kind) = self.resolve_int(offset)?;

                        match kind {
                            IntKind::Register => {
                                od.idx_index = value;

                                if let Some(scale) = &indexed.scale {
                                    let (scale, kind) = self.resolve_int(scale)?;

                                    if kind == IntKind::Register {
                                        return Err(new_parser_error(
                                            scale_span(indexed),
                                            "Expected integer literal".to_owned(),
                                        ));
                                    }

                                    od.idx_scale = scale;
                                }
                            }

                            _ => {
                                if indexed.scale.is_some() {
                                    return Err(new_parser_error(
                                        scale_span(indexed),
                                        "Scale requires a register index".to_owned(),
                                    ));
                                }

                                od.idx_fix = value;
                                od.fixed = true;
                            }
                        }
                    }

                    od.mode = match od.mode {
                        OperandMode::None => OperandMode::Idx1,
                        OperandMode::Int1 => OperandMode::IdxInt,
                        _ => {
                            return Err(new_parser_error(
                                span.clone(),
                                "Unknown operand mode".to_owned(),
                            ));
                        }
                    };
                }

                Operand::Range { span, .. } => {
                    return Err(new_parser_error(
                        span.clone(),
                        "Register ranges are only valid with push/pop".to_owned(),
                    ));
                }
            }
        }

        Ok(od)
    }

    fn emit_word(&mut self, word: u32) {
        self.output.write_u32::<LittleEndian>(word).unwrap();
    }

    fn advance(&mut self, bytes: u32) {
        self.pos += bytes;
        self.vaddr += bytes;
    }

    fn run_pass(&mut self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            match statement {
                Statement::GlobalLabel { name, .. } => {
                    self.current_symbol = (*name).to_owned();

                    if self.pass == 0 {
                        let vaddr = self.vaddr;

                        self.globals.entry((*name).to_owned()).or_insert(vaddr);
                    }
                }

                Statement::LocalLabel { name, .. } => {
                    if self.pass == 0 {
                        let key = format!("{}{}", name, self.current_symbol);
                        let vaddr = self.vaddr;

                        self.locals.entry(key).or_insert(vaddr);
                    }
                }

                Statement::Directive { name, args, span } => {
                    self.handle_directive(name, args, span)?;
                }

                Statement::Blob { file, span } => {
                    self.handle_blob(file, span)?;
                }

                Statement::Instruction {
                    mnemonic,
                    operands,
                    span,
                } => {
                    self.handle_instruction(mnemonic, operands, span)?;
                }
            }
        }

        Ok(())
    }

    fn handle_instruction(
        &mut self,
        mnemonic: &str,
        operands: &[Operand],
        span: &Span,
    ) -> Result<()> {
        if let Some(md) = mnemonic_data(mnemonic) {
            if self.pass == 1 {
                let od = self.collect_operands(operands, span)?;
                let word = encode_instruction(&md, &od, mnemonic)
                    .map_err(|message| new_parser_error(span.clone(), message))?;

                self.emit_word(word);
            }

            self.advance(4);

            return Ok(());
        }

        let op = match pseudo_op(mnemonic) {
            Some(op) => op,
            None => {
                return Err(new_parser_error(
                    span.clone(),
                    format!("Unknown instruction \"{}\"", mnemonic),
                ));
            }
        };

        // push/pop accept a register range and expand once per register.
        if let Some(Operand::Range { lo, hi, span: range_span }) = operands.first() {
            if op != PseudoOp::Push && op != PseudoOp::Pop {
                return Err(new_parser_error(
                    range_span.clone(),
                    "Register ranges are only valid with push/pop".to_owned(),
                ));
            }

            let lo = register_number(lo).ok_or_else(|| {
                new_parser_error(range_span.clone(), format!("Unknown register \"{}\"", lo))
            })?;
            let hi = register_number(hi).ok_or_else(|| {
                new_parser_error(range_span.clone(), format!("Unknown register \"{}\"", hi))
            })?;

            if lo > hi {
                return Err(new_parser_error(
                    range_span.clone(),
                    "Register range is reversed".to_owned(),
                ));
            }

            let registers: Vec<u32> = if op == PseudoOp::Push {
                (lo..=hi).collect()
            } else {
                (lo..=hi).rev().collect()
            };

            for register in registers {
                self.expand_pseudo(op, OperandData::int1(register), span)?;
            }

            return Ok(());
        }

        let od = if self.pass == 1 {
            self.collect_operands(operands, span)?
        } else {
            OperandData::default()
        };

        self.expand_pseudo(op, od, span)
    }

    fn expand_pseudo(&mut self, op: PseudoOp, od: OperandData, span: &Span) -> Result<()> {
        if self.pass == 1 {
            let words = crate::pseudo::expand(op, &od, self.pipeline_offset())
                .map_err(|message| new_parser_error(span.clone(), message))?;

            for word in words {
                self.emit_word(word);
            }
        }

        self.advance(crate::pseudo::expansion_len(op) * 4);

        Ok(())
    }

    fn expect_value<'a, 'i>(
        args: &'a [DirectiveArg<'i>],
        index: usize,
        span: &Span,
        what: &str,
    ) -> Result<&'a IntExpr<'i>> {
        match args.get(index) {
            Some(DirectiveArg::Value(expr)) => Ok(expr),
            _ => Err(new_parser_error(
                span.clone(),
                format!("Expected {} operand", what),
            )),
        }
    }

    fn handle_directive(
        &mut self,
        name: &str,
        args: &[DirectiveArg],
        span: &Span,
    ) -> Result<()> {
        match name {
            "org" => {
                let expr = Assembler::expect_value(args, 0, span, "an address")?;

                if let IntAtom::Symbol(_) = expr.atom {
                    return Err(new_parser_error(
                        expr.span.clone(),
                        "Symbols not allowed for use with .org".to_owned(),
                    ));
                }

                let (value, _) = self.resolve_int(expr)?;

                self.vaddr = value;
            }

            "db" | "byte" => self.handle_data(args, span, 1)?,
            "ds" | "short" => self.handle_data(args, span, 2)?,
            "dl" | "long" | "dw" => self.handle_data(args, span, 4)?,

            "ascii" | "asciiz" => {
                let text = match args.get(0) {
                    Some(DirectiveArg::Str(text)) => text,
                    _ => {
                        return Err(new_parser_error(
                            span.clone(),
                            "Expected string operand".to_owned(),
                        ));
                    }
                };

                let terminated = name == "asciiz";
                let len = text.len() as u32 + terminated as u32;

                if self.pass == 1 {
                    self.output.extend_from_slice(text.as_bytes());

                    if terminated {
                        self.output.push(0);
                    }
                }

                self.advance(len);
            }

            "entry" => {
                if self.pass == 1 {
                    let expr = Assembler::expect_value(args, 0, span, "an entry label")?;
                    let (value, _) = self.resolve_int(expr)?;

                    self.entry = value;
                }
            }

            "section" => self.handle_section(args, span)?,

            "align" => {
                let expr = Assembler::expect_value(args, 0, span, "an alignment")?;
                let (value, _) = self.resolve_int(expr)?;

                if value > 0 {
                    let pad = (value - self.vaddr % value) % value;

                    if self.pass == 1 {
                        self.output.extend(std::iter::repeat(0).take(pad as usize));
                    }

                    self.advance(pad);
                }
            }

            // Macro bookkeeping belongs to the preprocessor; accepted for
            // compatibility, no effect here.
            "def" | "undef" | "pad" => {}

            _ => {
                return Err(new_parser_error(
                    span.clone(),
                    format!("Unknown directive \".{}\"", name),
                ));
            }
        }

        Ok(())
    }

    /// `.db/.ds/.dl`: one element of `size` bytes per comma-separated
    /// value, on both passes.
    fn handle_data(&mut self, args: &[DirectiveArg], span: &Span, size: u32) -> Result<()> {
        if args.is_empty() {
            return Err(new_parser_error(
                span.clone(),
                "Expected integer or symbol".to_owned(),
            ));
        }

        for arg in args {
            let expr = match arg {
                DirectiveArg::Value(expr) => expr,
                _ => {
                    return Err(new_parser_error(
                        span.clone(),
                        "Expected integer or symbol".to_owned(),
                    ));
                }
            };

            if self.pass == 1 {
                let (value, _) = self.resolve_int(expr)?;
                let masked = (u64::from(value)) & (0xffff_ffffu64 >> (32 - size * 8));

                self.output
                    .write_uint::<LittleEndian>(masked, size as usize)
                    .unwrap();
            }

            self.advance(size);
        }

        Ok(())
    }

    fn handle_blob(&mut self, file: &str, span: &Span) -> Result<()> {
        let data = fs::read(file).map_err(|err| {
            new_parser_error(span.clone(), format!("Couldn't read blob \"{}\": {}", file, err))
        })?;

        if self.pass == 1 {
            self.output.extend_from_slice(&data);
        }

        self.advance(data.len() as u32);

        Ok(())
    }

    /// `.section name[, "flags"][, @type]` — sections are materialized on
    /// pass 1 only; addresses come from the current position.
    fn handle_section(&mut self, args: &[DirectiveArg], span: &Span) -> Result<()> {
        if self.pass != 1 {
            return Ok(());
        }

        let name = match args.get(0) {
            Some(DirectiveArg::SectionName(name)) => (*name).to_owned(),
            Some(DirectiveArg::Value(IntExpr {
                atom: IntAtom::Symbol(name),
                ..
            })) => (*name).to_owned(),
            _ => {
                return Err(new_parser_error(
                    span.clone(),
                    "Expected section name".to_owned(),
                ));
            }
        };

        self.finalize_section();

        let mut section = Section::new(&name);

        section.header.sh_addr = self.vaddr;
        section.header.sh_offset = self.pos;
        section.header.sh_addralign = 4;

        match (section_flags(&name), section_type(&name)) {
            (Some(flags), Some(sh_type)) => {
                section.header.sh_flags = flags;
                section.header.sh_type = sh_type;
            }
            _ => {
                section.header.sh_flags = SHF_ALLOC | SHF_WRITE;
            }
        }

        // Optional explicit flag string.
        if let Some(DirectiveArg::Str(flags)) = args.get(1) {
            for c in flags.chars() {
                section.header.sh_flags |= match c {
                    'a' => elf32::SHF_ALLOC,
                    'w' => elf32::SHF_WRITE,
                    'x' => elf32::SHF_EXECINSTR,
                    other => {
                        return Err(new_parser_error(
                            span.clone(),
                            format!("Invalid ELF section flag '{}'", other),
                        ));
                    }
                };
            }
        }

        // Optional explicit @type.
        if let Some(DirectiveArg::SectionType(type_name)) = args.get(2).or_else(|| args.get(1)) {
            section.header.sh_type = section_type_by_name(type_name).ok_or_else(|| {
                new_parser_error(
                    span.clone(),
                    format!("Invalid type mask name \"{}\"", type_name),
                )
            })?;
        }

        self.sections.push(section);

        Ok(())
    }
}

fn scale_span<'i>(indexed: &crate::parser::IndexedOperand<'i>) -> Span<'i> {
    indexed
        .scale
        .as_ref()
        .map(|s| s.span.clone())
        .unwrap_or_else(|| indexed.base.span.clone())
}

/// Assembles `input` with the given options.
pub fn assemble(input: &str, options: &Options) -> std::result::Result<Output, Error> {
    let statements = crate::parser::parse_program(input)?;

    let mut assembler = Assembler::new(options);

    assembler.run_pass(&statements)?;
    assembler.setup_next_pass();
    assembler.run_pass(&statements)?;
    assembler.finalize_section();

    let mut symbols: Vec<(String, u32)> = assembler.globals.into_iter().collect();

    symbols.sort();

    Ok(Output {
        text: assembler.output,
        sections: assembler.sections,
        entry: assembler.entry,
        symbols,
    })
}
