use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::{App, AppSettings, Arg};

use hsc::{compile, compile_to_assembly, CompileOptions, DebugFlags, OutputFormat};

const VERSION_TEXT: &str = concat!(
    "hsc (hs compiler) ",
    env!("CARGO_PKG_VERSION"),
    "\nTargets the HV2 architecture; output formats: raw, elf32.",
);

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim_matches('"').to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

fn main() {
    let matches = App::new("hsc")
        .setting(AppSettings::DisableVersion)
        .arg(Arg::with_name("FILE").help("Input file").index(1))
        .arg(Arg::with_name("version").short("v").long("version").help("Display compiler version information"))
        .arg(Arg::with_name("quiet").short("q").long("quiet").help("Display minimal/no information output"))
        .arg(Arg::with_name("verbose").short("V").long("verbose").help("Display maximal/all information output"))
        .arg(Arg::with_name("assemble").short("a").long("assemble").help("Assemble input using the target's assembler"))
        .arg(Arg::with_name("log").short("L").long("log").help("Log compiler information output to a file (a.log)"))
        .arg(Arg::with_name("output-assembly").short("A").long("output-assembly").help("Output source's assembly to a file (a.s)"))
        .arg(Arg::with_name("only-symbols").long("only-symbols").help("Only output the symbol file"))
        .arg(Arg::with_name("debug-lexer-output").long("debug-lexer-output").help("Display lexer debugging information"))
        .arg(Arg::with_name("debug-parser-output").long("debug-parser-output").help("Display parser debugging information"))
        .arg(Arg::with_name("debug-ir-output").long("debug-ir-output").help("Display IR generator debugging information"))
        .arg(Arg::with_name("debug-irt-output").long("debug-irt-output").help("Display IR translator debugging information"))
        .arg(Arg::with_name("debug-all").long("debug-all").help("Display debugging information from all stages"))
        .arg(Arg::with_name("stdin").long("stdin").help("Get input stream from stdin"))
        .arg(Arg::with_name("stdout").long("stdout").help("Compile output to stdout"))
        .arg(Arg::with_name("stdio").long("stdio").help("Use stdin for input and stdout for output"))
        .arg(Arg::with_name("include-paths").short("I").long("include-paths").takes_value(true).value_name("PATHS").help("Comma-separated include search paths"))
        .arg(Arg::with_name("system-include").long("system-include").takes_value(true).value_name("PATH").help("System include search path"))
        .arg(Arg::with_name("input").short("i").long("input").takes_value(true).value_name("FILE").help("Input file"))
        .arg(Arg::with_name("output").short("o").long("output").takes_value(true).value_name("FILE").help("Output file"))
        .arg(Arg::with_name("output-format").short("F").long("output-format").takes_value(true).value_name("FORMAT").possible_values(&["raw", "elf32"]).help("Output format"))
        .arg(Arg::with_name("target-arch").short("T").long("target-arch").takes_value(true).value_name("ARCH").help("Target architecture (default hv2)"))
        .arg(Arg::with_name("output-symbols").short("S").long("output-symbols").takes_value(true).value_name("FILE").help("Output the global symbol table"))
        .arg(Arg::with_name("Xasm").long("Xasm").takes_value(true).value_name("OPTS").help("Comma-separated options for the assembler"))
        .arg(Arg::with_name("help-target").long("help-target").takes_value(true).value_name("ARCH").help("Get target-specific help"))
        .get_matches();

    if matches.is_present("version") {
        println!("{}", VERSION_TEXT);
        return;
    }

    if let Some(target) = matches.value_of("help-target") {
        println!("{}-specific help unimplemented", target);
        return;
    }

    let quiet = matches.is_present("quiet");
    let verbose = matches.is_present("verbose") && !quiet;

    if let Some(target) = matches.value_of("target-arch") {
        if target != "hv2" {
            eprintln!("error: hsc: Target architecture \"{}\" not supported", target);
            std::process::exit(1);
        }
    }

    let use_stdin = matches.is_present("stdin") || matches.is_present("stdio");
    let use_stdout = matches.is_present("stdout") || matches.is_present("stdio");

    let input_path = matches
        .value_of("input")
        .or_else(|| matches.value_of("FILE"))
        .map(PathBuf::from);

    let (source, filename) = if use_stdin {
        let mut text = String::new();

        if io::stdin().read_to_string(&mut text).is_err() {
            eprintln!("error: hsc: Couldn't read stdin");
            std::process::exit(1);
        }

        (text, "<stdin>".to_owned())
    } else {
        let path = match &input_path {
            Some(path) => path,
            None => {
                eprintln!("error: hsc: No input files");
                eprintln!("error: hsc: compilation terminated");
                std::process::exit(1);
            }
        };

        match fs::read_to_string(path) {
            Ok(text) => (text, path.display().to_string()),
            Err(err) => {
                eprintln!(
                    "error: hsc: Couldn't open input file \"{}\": {}",
                    path.display(),
                    err
                );
                eprintln!("error: hsc: compilation terminated");
                std::process::exit(1);
            }
        }
    };

    let debug_all = matches.is_present("debug-all");

    let mut options = CompileOptions::default();

    options.filename = filename;
    options.debug = DebugFlags {
        lexer: debug_all || matches.is_present("debug-lexer-output"),
        parser: debug_all || matches.is_present("debug-parser-output"),
        ir: debug_all || matches.is_present("debug-ir-output"),
        irt: debug_all || matches.is_present("debug-irt-output"),
    };

    if let Some(paths) = matches.value_of("include-paths") {
        options
            .include_paths
            .extend(parse_csv(paths).into_iter().map(PathBuf::from));
    }

    if let Some(path) = matches.value_of("system-include") {
        options.system_include = Some(PathBuf::from(path));
    }

    if matches.value_of("output-format") == Some("elf32") {
        options.format = OutputFormat::Elf32;
    }

    // Assembler options: -P<n> pipeline size, -f/-F pipeline flush.
    if let Some(xasm) = matches.value_of("Xasm") {
        for option in parse_csv(xasm) {
            let mut chars = option.chars();

            if chars.next() != Some('-') {
                eprintln!("warning: hsc: Unknown assembler setting \"{}\"", option);
                continue;
            }

            match chars.next() {
                Some('P') => match option[2..].parse() {
                    Ok(size) => options.asm.pipeline_size = size,
                    Err(_) => {
                        eprintln!("error: hsc: Invalid pipeline size in \"{}\"", option);
                        std::process::exit(1);
                    }
                },

                Some(c @ 'f') | Some(c @ 'F') => options.asm.flush = c == 'F',

                _ => eprintln!("warning: hsc: Unknown assembler setting \"{}\"", option),
            }
        }
    }

    let mut log = if matches.is_present("log") {
        Some(String::new())
    } else {
        None
    };

    let mut progress = |stage: &str| {
        if verbose {
            eprintln!("hsc: {}", stage);
        }

        if let Some(log) = &mut log {
            log.push_str(stage);
            log.push('\n');
        }
    };

    // -a: the input already is assembly.
    let artifacts = if matches.is_present("assemble") {
        progress("assembling input");

        match hsc::assemble(&source, &options) {
            Ok((object, symbols)) => hsc::Artifacts {
                assembly: source.clone(),
                object,
                symbols,
                warnings: Vec::new(),
            },
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        }
    } else {
        progress("compiling");

        let result = if matches.is_present("output-assembly") {
            // Compile in two halves so the assembly text can be saved even
            // if assembling then fails.
            compile_to_assembly(&source, &options).and_then(|(assembly, warnings)| {
                if let Err(err) = fs::write("a.s", &assembly) {
                    eprintln!("error: hsc: Couldn't write a.s: {}", err);
                }

                hsc::assemble(&assembly, &options).map(|(object, symbols)| hsc::Artifacts {
                    assembly,
                    object,
                    symbols,
                    warnings,
                })
            })
        } else {
            compile(&source, &options)
        };

        match result {
            Ok(artifacts) => artifacts,
            Err(err) => {
                eprintln!("{}", err);
                eprintln!("error: hsc: compilation terminated");
                std::process::exit(1);
            }
        }
    };

    progress("writing output");

    let only_symbols = matches.is_present("only-symbols");

    if let Some(path) = matches.value_of("output-symbols") {
        let mut table = String::new();

        for (name, value) in &artifacts.symbols {
            table.push_str(&format!("{} = 0x{:08x}\n", name, value));
        }

        if let Err(err) = fs::write(path, table) {
            eprintln!("error: hsc: Couldn't write \"{}\": {}", path, err);
            std::process::exit(1);
        }
    } else if only_symbols {
        let mut table = String::new();

        for (name, value) in &artifacts.symbols {
            table.push_str(&format!("{} = 0x{:08x}\n", name, value));
        }

        if let Err(err) = fs::write("a.sym", table) {
            eprintln!("error: hsc: Couldn't write a.sym: {}", err);
            std::process::exit(1);
        }
    }

    if !only_symbols {
        if use_stdout {
            if io::stdout().write_all(&artifacts.object).is_err() {
                std::process::exit(1);
            }
        } else {
            let output_path = matches
                .value_of("output")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("a.out"));

            if let Err(err) = fs::write(&output_path, &artifacts.object) {
                eprintln!(
                    "error: hsc: Couldn't open output file \"{}\": {}",
                    output_path.display(),
                    err
                );
                std::process::exit(1);
            }
        }
    }

    if let Some(log) = log {
        if let Err(err) = fs::write("a.log", log) {
            eprintln!("error: hsc: Couldn't write a.log: {}", err);
        }
    }

    if !quiet {
        eprintln!("hsc: done");
    }
}
