use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::{App, Arg};

#[derive(Debug)]
enum IoContext {
    ReadInput,
    WriteOutput,
}

#[derive(Debug)]
enum Error {
    Asm(Box<hv2asm::Error>),
    Io(std::io::Error, IoContext, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, context, path) => writeln!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IoContext::ReadInput => "Reading input",
                    IoContext::WriteOutput => "Writing output",
                },
                path.display(),
                err
            ),
            Error::Asm(err) => {
                writeln!(f, "Assembling input failed:")?;
                write!(f, "{}", err)
            }
        }
    }
}

fn main() {
    let matches = App::new("hv2asm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assembles HV2 assembly into raw machine code or an ELF32 image")
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input file to use")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Sets the output file to write to"),
        )
        .arg(
            Arg::with_name("format")
                .short("F")
                .long("output-format")
                .takes_value(true)
                .value_name("FORMAT")
                .possible_values(&["raw", "elf32"])
                .help("Selects the output format"),
        )
        .arg(
            Arg::with_name("pipeline")
                .short("P")
                .long("pipeline-size")
                .takes_value(true)
                .value_name("N")
                .help("Sets the pipeline size assumed for branch targets"),
        )
        .arg(
            Arg::with_name("flush")
                .short("f")
                .long("pipeline-flush")
                .help("Assume branches flush the pipeline (no branch offset)"),
        )
        .get_matches();

    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("output");
    let format = matches.value_of("format").unwrap_or("raw");

    let mut options = hv2asm::Options::default();

    if let Some(pipeline) = matches.value_of("pipeline") {
        match pipeline.parse() {
            Ok(size) => options.pipeline_size = size,
            Err(_) => {
                eprintln!("Invalid pipeline size \"{}\"", pipeline);
                std::process::exit(1);
            }
        }
    }

    options.flush = matches.is_present("flush");

    if let Err(err) = run(input, output, format, &options) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run(
    input: &str,
    output: Option<&str>,
    format: &str,
    options: &hv2asm::Options,
) -> Result<(), Error> {
    let input_path = Path::new(input);

    let input_file = File::open(input_path)
        .map_err(|err| Error::Io(err, IoContext::ReadInput, input_path.to_owned()))?;

    let mut source = String::new();

    BufReader::new(input_file)
        .read_to_string(&mut source)
        .map_err(|err| Error::Io(err, IoContext::ReadInput, input_path.to_owned()))?;

    let assembled = hv2asm::assemble(&source, options).map_err(|err| {
        Error::Asm(Box::new(match input_path.to_str() {
            Some(path) => err.with_path(path),
            None => err,
        }))
    })?;

    let output_path: PathBuf = output
        .map(PathBuf::from)
        .unwrap_or_else(|| input_path.with_extension(if format == "elf32" { "elf" } else { "bin" }));

    let file = File::create(&output_path)
        .map_err(|err| Error::Io(err, IoContext::WriteOutput, output_path.clone()))?;

    let mut writer = BufWriter::new(file);

    let result = if format == "elf32" {
        let image = elf32::Image::link(assembled.sections, assembled.text, assembled.entry);

        image.write_to(&mut writer)
    } else {
        writer.write_all(&assembled.text)
    };

    result.map_err(|err| Error::Io(err, IoContext::WriteOutput, output_path))
}
