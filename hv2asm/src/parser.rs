//! Grammar front end: pest parse plus conversion of the pair tree into the
//! statement list both assembler passes walk.

use matches::debug_assert_matches;
use pest::iterators::Pair;
use pest::Parser;
use pest::Span;
use pest_derive::Parser;

use crate::{new_parser_error, Result};

#[derive(Parser)]
#[grammar = "hv2asm.pest"]
pub struct Hv2Parser;

/// One parsed source element. Spans are kept for error reporting during
/// the assembly passes.
#[derive(Debug, Clone)]
pub enum Statement<'i> {
    GlobalLabel {
        name: &'i str,
        span: Span<'i>,
    },
    LocalLabel {
        name: &'i str,
        span: Span<'i>,
    },
    Directive {
        name: &'i str,
        args: Vec<DirectiveArg<'i>>,
        span: Span<'i>,
    },
    Blob {
        file: String,
        span: Span<'i>,
    },
    Instruction {
        mnemonic: &'i str,
        operands: Vec<Operand<'i>>,
        span: Span<'i>,
    },
}

#[derive(Debug, Clone)]
pub enum DirectiveArg<'i> {
    /// A string literal, already unescaped.
    Str(String),
    /// A `.name` section name.
    SectionName(&'i str),
    /// An `@name` section type.
    SectionType(&'i str),
    /// An integer, character, or symbol expression.
    Value(IntExpr<'i>),
}

/// An integer-or-symbol operand atom: optional `!` (absolute) and `-`
/// markers around a literal or a name.
#[derive(Debug, Clone)]
pub struct IntExpr<'i> {
    pub absolute: bool,
    pub negative: bool,
    pub atom: IntAtom<'i>,
    pub span: Span<'i>,
}

#[derive(Debug, Clone)]
pub enum IntAtom<'i> {
    Literal(u32),
    Symbol(&'i str),
}

#[derive(Debug, Clone)]
pub enum Operand<'i> {
    Int(IntExpr<'i>),
    Indexed(IndexedOperand<'i>),
    Range {
        lo: &'i str,
        hi: &'i str,
        span: Span<'i>,
    },
}

/// `[base]`, `[base±x]`, `[base±idx*scale]`, `[base±idx:scale]`.
///
/// Whether `x` is a fixed offset or an index register is decided at
/// resolution time, when symbols gain meaning.
#[derive(Debug, Clone)]
pub struct IndexedOperand<'i> {
    pub base: IntExpr<'i>,
    pub add: bool,
    pub offset: Option<IntExpr<'i>>,
    /// `true` for the `*` (shift) spelling, `false` for `:`.
    pub shift: bool,
    pub scale: Option<IntExpr<'i>>,
}

fn unescape(c: char) -> char {
    match c {
        'a' => '\x07',
        'b' => '\x08',
        'e' => '\x1b',
        'f' => '\x0c',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0b',
        other => other,
    }
}

fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(esc) = chars.next() {
                out.push(unescape(esc));
            }
        } else {
            out.push(c);
        }
    }

    out
}

fn process_int_expr(pair: Pair<Rule>) -> Result<IntExpr> {
    debug_assert_matches!(pair.as_rule(), Rule::int_or_symbol);

    let span = pair.as_span();
    let mut absolute = false;
    let mut negative = false;
    let mut atom = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::absolute => absolute = true,
            Rule::negative => negative = true,

            Rule::hex_number => {
                let text = &inner.as_str()[2..];
                let value = u32::from_str_radix(text, 16).map_err(|err| {
                    new_parser_error(inner.as_span(), format!("Parsing integer failed: {}", err))
                })?;

                atom = Some(IntAtom::Literal(value));
            }

            Rule::bin_number => {
                let text = &inner.as_str()[2..];
                let value = u32::from_str_radix(text, 2).map_err(|err| {
                    new_parser_error(inner.as_span(), format!("Parsing integer failed: {}", err))
                })?;

                atom = Some(IntAtom::Literal(value));
            }

            Rule::dec_number => {
                let value: u32 = inner.as_str().parse().map_err(|err| {
                    new_parser_error(inner.as_span(), format!("Parsing integer failed: {}", err))
                })?;

                atom = Some(IntAtom::Literal(value));
            }

            Rule::char_literal => {
                let raw = inner.as_str();
                let body = &raw[1..raw.len() - 1];
                let value = unescape_string(body)
                    .chars()
                    .next()
                    .map(|c| c as u32)
                    .unwrap_or(0);

                atom = Some(IntAtom::Literal(value));
            }

            Rule::identifier => {
                atom = Some(IntAtom::Symbol(inner.as_str()));
            }

            _ => unreachable!(),
        }
    }

    Ok(IntExpr {
        absolute,
        negative,
        atom: atom.unwrap(),
        span,
    })
}

fn process_indexed(pair: Pair<Rule>) -> Result<IndexedOperand> {
    debug_assert_matches!(pair.as_rule(), Rule::indexed);

    let mut inner = pair.into_inner();
    let base = process_int_expr(inner.next().unwrap())?;

    let mut indexed = IndexedOperand {
        base,
        add: false,
        offset: None,
        shift: false,
        scale: None,
    };

    if let Some(op) = inner.next() {
        debug_assert_matches!(op.as_rule(), Rule::index_op);

        indexed.add = op.as_str() == "+";
        indexed.offset = Some(process_int_expr(inner.next().unwrap())?);

        if let Some(op) = inner.next() {
            debug_assert_matches!(op.as_rule(), Rule::scale_op);

            indexed.shift = op.as_str() == "*";
            indexed.scale = Some(process_int_expr(inner.next().unwrap())?);
        }
    }

    Ok(indexed)
}

fn process_operand(pair: Pair<Rule>) -> Result<Operand> {
    match pair.as_rule() {
        Rule::int_or_symbol => Ok(Operand::Int(process_int_expr(pair)?)),
        Rule::indexed => Ok(Operand::Indexed(process_indexed(pair)?)),

        Rule::register_range => {
            let span = pair.as_span();
            let mut inner = pair.into_inner();
            let lo = inner.next().unwrap().as_str();
            let hi = inner.next().unwrap().as_str();

            Ok(Operand::Range { lo, hi, span })
        }

        _ => unreachable!(),
    }
}

fn process_directive_arg(pair: Pair<Rule>) -> Result<DirectiveArg> {
    match pair.as_rule() {
        Rule::string => {
            let inner = pair.into_inner().next().unwrap();

            Ok(DirectiveArg::Str(unescape_string(inner.as_str())))
        }

        Rule::section_name => Ok(DirectiveArg::SectionName(pair.as_str())),

        Rule::section_type => {
            let inner = pair.into_inner().next().unwrap();

            Ok(DirectiveArg::SectionType(inner.as_str()))
        }

        Rule::int_or_symbol => Ok(DirectiveArg::Value(process_int_expr(pair)?)),

        _ => unreachable!(),
    }
}

/// Parses the whole input into the statement list walked by both passes.
pub fn parse_program(input: &str) -> Result<Vec<Statement>> {
    let program = Hv2Parser::parse(Rule::program, input)?.next().unwrap();

    let mut statements = Vec::new();

    for pair in program.into_inner() {
        let span = pair.as_span();

        match pair.as_rule() {
            Rule::global_label => {
                let name = pair.into_inner().next().unwrap().as_str();

                statements.push(Statement::GlobalLabel { name, span });
            }

            Rule::local_label => {
                let name = pair.into_inner().next().unwrap().as_str();

                statements.push(Statement::LocalLabel { name, span });
            }

            Rule::blob_directive => {
                let inner = pair.into_inner().next().unwrap();

                let file = match inner.as_rule() {
                    Rule::string => unescape_string(inner.into_inner().next().unwrap().as_str()),
                    Rule::file_name => inner.as_str().to_owned(),
                    _ => unreachable!(),
                };

                statements.push(Statement::Blob { file, span });
            }

            Rule::generic_directive => {
                let mut inner = pair.into_inner();
                let name = inner.next().unwrap().as_str();
                let mut args = Vec::new();

                for arg in inner {
                    args.push(process_directive_arg(arg)?);
                }

                statements.push(Statement::Directive { name, args, span });
            }

            Rule::instruction => {
                let mut inner = pair.into_inner();
                let mnemonic = inner.next().unwrap().as_str();
                let mut operands = Vec::new();

                for operand in inner {
                    operands.push(process_operand(operand)?);
                }

                statements.push(Statement::Instruction {
                    mnemonic,
                    operands,
                    span,
                });
            }

            Rule::EOI => {}

            _ => {}
        }
    }

    Ok(statements)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labels_directives_instructions() {
        let statements = parse_program(
            "_start:\n    li.w x0, !_start\n.loop:\n    beq x0, zero, 8\n.org 0x40000\n",
        )
        .unwrap();

        assert_eq!(statements.len(), 5);

        assert!(matches!(
            statements[0],
            Statement::GlobalLabel { name: "_start", .. }
        ));
        assert!(matches!(
            statements[1],
            Statement::Instruction {
                mnemonic: "li.w",
                ..
            }
        ));
        assert!(matches!(
            statements[2],
            Statement::LocalLabel { name: "loop", .. }
        ));
        assert!(matches!(statements[4], Statement::Directive { name: "org", .. }));
    }

    #[test]
    fn absolute_and_negative_markers() {
        let statements = parse_program("li.w x0, !_main\nsub.u sp, -4\n").unwrap();

        match &statements[0] {
            Statement::Instruction { operands, .. } => match &operands[1] {
                Operand::Int(e) => {
                    assert!(e.absolute);
                    assert!(matches!(e.atom, IntAtom::Symbol("_main")));
                }
                other => panic!("expected int operand, got {:?}", other),
            },
            other => panic!("expected instruction, got {:?}", other),
        }

        match &statements[1] {
            Statement::Instruction { operands, .. } => match &operands[1] {
                Operand::Int(e) => {
                    assert!(e.negative);
                    assert!(matches!(e.atom, IntAtom::Literal(4)));
                }
                other => panic!("expected int operand, got {:?}", other),
            },
            other => panic!("expected instruction, got {:?}", other),
        }
    }

    #[test]
    fn indexed_operand_forms() {
        let statements =
            parse_program("load.l x0, [sp]\nload.l x1, [fp-4]\nload.l x2, [x3+x4*2]\n").unwrap();

        fn indexed<'a>(s: &'a Statement<'a>) -> IndexedOperand<'a> {
            match s {
                Statement::Instruction { operands, .. } => match &operands[1] {
                    Operand::Indexed(i) => i.clone(),
                    other => panic!("expected indexed operand, got {:?}", other),
                },
                other => panic!("expected instruction, got {:?}", other),
            }
        }

        let bare = indexed(&statements[0]);

        assert!(bare.offset.is_none());

        let fixed = indexed(&statements[1]);

        assert!(!fixed.add);
        assert!(matches!(
            fixed.offset.as_ref().unwrap().atom,
            IntAtom::Literal(4)
        ));

        let scaled = indexed(&statements[2]);

        assert!(scaled.add);
        assert!(scaled.shift);
        assert!(matches!(
            scaled.scale.as_ref().unwrap().atom,
            IntAtom::Literal(2)
        ));
    }

    #[test]
    fn register_ranges() {
        let statements = parse_program("push {x0, x3}\n").unwrap();

        match &statements[0] {
            Statement::Instruction { operands, .. } => {
                assert!(matches!(
                    operands[0],
                    Operand::Range { lo: "x0", hi: "x3", .. }
                ));
            }
            other => panic!("expected instruction, got {:?}", other),
        }
    }

    #[test]
    fn char_and_radix_literals() {
        let statements = parse_program(".db 'a', 0x10, 0b101, 9\n").unwrap();

        match &statements[0] {
            Statement::Directive { args, .. } => {
                let values: Vec<u32> = args
                    .iter()
                    .map(|a| match a {
                        DirectiveArg::Value(IntExpr {
                            atom: IntAtom::Literal(v),
                            ..
                        }) => *v,
                        other => panic!("expected literal, got {:?}", other),
                    })
                    .collect();

                assert_eq!(values, vec![97, 16, 5, 9]);
            }
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn section_directive_args() {
        let statements = parse_program(".section .text, \"ax\", @progbits\n").unwrap();

        match &statements[0] {
            Statement::Directive { name, args, .. } => {
                assert_eq!(*name, "section");
                assert!(matches!(args[0], DirectiveArg::SectionName(".text")));
                assert!(matches!(args[1], DirectiveArg::Str(ref s) if s == "ax"));
                assert!(matches!(args[2], DirectiveArg::SectionType("progbits")));
            }
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn string_unescaping() {
        let statements = parse_program(".asciiz \"a\\n\\\"b\\\"\"\n").unwrap();

        match &statements[0] {
            Statement::Directive { args, .. } => {
                assert!(matches!(args[0], DirectiveArg::Str(ref s) if s == "a\n\"b\""));
            }
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn blob_file_names() {
        let statements = parse_program(".blob data/table.bin\n.blob \"other.bin\"\n").unwrap();

        assert!(matches!(
            statements[0],
            Statement::Blob { ref file, .. } if file == "data/table.bin"
        ));
        assert!(matches!(
            statements[1],
            Statement::Blob { ref file, .. } if file == "other.bin"
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_program("add.u x0, @nope\n").is_err());
    }
}
