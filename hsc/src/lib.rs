//! Pipeline wiring for the hs compiler.
//!
//! The stages live in the [hs](../hs/index.html), [hv2asm](../hv2asm/index.html)
//! and [elf32](../elf32/index.html) crates; this crate strings them
//! together: preprocess → lex → parse → contextualize → generate IR →
//! translate → preprocess the assembly → assemble → emit raw bytes or an
//! ELF32 image.

use std::io;
use std::path::PathBuf;

use hs::diag::{CompileError, Diagnostic, Logger};
use hs::ir::generator::IrGenerator;
use hs::ir::translate::Hv2Translator;
use hs::lexer::Lexer;
use hs::parser::context::Contextualizer;
use hs::parser::Parser;
use hs::preprocessor::Preprocessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Raw,
    Elf32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFlags {
    pub lexer: bool,
    pub parser: bool,
    pub ir: bool,
    pub irt: bool,
}

pub struct CompileOptions {
    pub filename: String,
    pub include_paths: Vec<PathBuf>,
    pub system_include: Option<PathBuf>,
    pub format: OutputFormat,
    pub asm: hv2asm::Options,
    pub debug: DebugFlags,
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            filename: String::new(),
            include_paths: vec![PathBuf::from(".")],
            system_include: None,
            format: OutputFormat::Raw,
            asm: hv2asm::Options::default(),
            debug: DebugFlags::default(),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Compile(CompileError),
    Asm(Box<hv2asm::Error>),
    Io(io::Error, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Compile(err) => write!(f, "{}", err),
            Error::Asm(err) => write!(f, "{}", err),
            Error::Io(err, path) => write!(f, "\"{}\": {}", path.display(), err),
        }
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Error {
        Error::Compile(err)
    }
}

impl From<hv2asm::Error> for Error {
    fn from(err: hv2asm::Error) -> Error {
        Error::Asm(Box::new(err))
    }
}

/// Everything a compilation produces.
pub struct Artifacts {
    /// The generated (pre-assembly-preprocessing) HV2 assembly text.
    pub assembly: String,
    /// Raw machine code or a serialized ELF32 image, per the requested
    /// format.
    pub object: Vec<u8>,
    /// The assembler's global symbol table.
    pub symbols: Vec<(String, u32)>,
    /// Warnings collected across all stages (already printed).
    pub warnings: Vec<Diagnostic>,
}

/// Front half of the pipeline: hs source to HV2 assembly text.
pub fn compile_to_assembly(
    source: &str,
    options: &CompileOptions,
) -> Result<(String, Vec<Diagnostic>), Error> {
    let logger = Logger::new(source, &options.filename);

    let mut warnings = Vec::new();

    let mut preprocessor = Preprocessor::new(
        options.include_paths.clone(),
        options.system_include.clone(),
    );

    let preprocessed = preprocessor.preprocess(source).map_err(|err| {
        logger.print_error(&err);
        err
    })?;

    let tokens = Lexer::new(&preprocessed).lex().map_err(|err| {
        logger.print_error(&err);
        err
    })?;

    if options.debug.lexer {
        println!("Lexer output:");

        for token in &tokens {
            println!(
                "({}, {}): type: {}, text: {}",
                token.line + 1,
                token.col + 1,
                token.kind.name(),
                token.text
            );
        }
    }

    let mut parsed = Parser::new(tokens).parse().map_err(|err| {
        logger.print_error(&err);
        err
    })?;

    for warning in &parsed.warnings {
        logger.print_diagnostic(warning);
    }

    warnings.append(&mut parsed.warnings);

    let mut context_warnings = Contextualizer::new().contextualize(&mut parsed.source);

    for warning in &context_warnings {
        logger.print_diagnostic(warning);
    }

    warnings.append(&mut context_warnings);

    if options.debug.parser {
        println!("Contextualized parser output:");

        for expr in &parsed.source {
            println!("{}", expr.print(0));
        }
    }

    let mut generated = IrGenerator::new(&parsed.types)
        .generate(&parsed.source)
        .map_err(|err| {
            logger.print_error(&err);
            err
        })?;

    for warning in &generated.warnings {
        logger.print_diagnostic(warning);
    }

    warnings.append(&mut generated.warnings);

    if options.debug.ir {
        println!("IR generator output:");

        for function in &generated.functions {
            for instruction in function {
                println!("{}", instruction);
            }

            println!();
        }
    }

    let assembly = Hv2Translator::translate(&generated.functions);

    if options.debug.irt {
        println!("IR translator output:");
        println!("{}", assembly);
    }

    Ok((assembly, warnings))
}

/// Back half: assembly text to the final object bytes.
pub fn assemble(
    assembly: &str,
    options: &CompileOptions,
) -> Result<(Vec<u8>, Vec<(String, u32)>), Error> {
    // Second preprocessor pass strips/expands the #define lines the IR
    // generator put into the assembly.
    let mut preprocessor = Preprocessor::new(
        options.include_paths.clone(),
        options.system_include.clone(),
    );

    let preprocessed = preprocessor.preprocess(assembly)?;

    let output = hv2asm::assemble(&preprocessed, &options.asm)?;

    let object = match options.format {
        OutputFormat::Raw => output.text,
        OutputFormat::Elf32 => {
            elf32::Image::link(output.sections, output.text, output.entry).to_bytes()
        }
    };

    Ok((object, output.symbols))
}

/// The full pipeline.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Artifacts, Error> {
    let (assembly, warnings) = compile_to_assembly(source, options)?;
    let (object, symbols) = assemble(&assembly, options)?;

    Ok(Artifacts {
        assembly,
        object,
        symbols,
        warnings,
    })
}
