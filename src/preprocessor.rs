//! Text-level preprocessor.
//!
//! Runs twice per compilation: over hs source before the lexer, and over the
//! generated assembly before the assembler (function lowering emits
//! `#define`/`#undef` lines for argument offsets). Recognized directives:
//!
//! - `#include "file"` splices the preprocessed file, searching the current
//!   directory, the user include paths, then the system include path.
//! - `#define NAME value` records a replacement; later occurrences of `NAME`
//!   outside string literals become `value`.
//! - `#undef NAME` removes a replacement.
//!
//! Any other `#` line is dropped, which doubles as the comment syntax.
//! Directive lines are replaced by an empty line so diagnostics keep their
//! source line numbers.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::diag::CompileError;

const MAX_INCLUDE_DEPTH: usize = 64;

pub struct Preprocessor {
    defines: HashMap<String, String>,
    include_paths: Vec<PathBuf>,
    system_include: Option<PathBuf>,
    depth: usize,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Preprocessor {
    pub fn new(include_paths: Vec<PathBuf>, system_include: Option<PathBuf>) -> Preprocessor {
        Preprocessor {
            defines: HashMap::new(),
            include_paths,
            system_include,
            depth: 0,
        }
    }

    pub fn preprocess(&mut self, input: &str) -> Result<String, CompileError> {
        let mut output = String::with_capacity(input.len());

        self.process(input, &mut output)?;

        Ok(output)
    }

    pub fn defines(&self) -> &HashMap<String, String> {
        &self.defines
    }

    fn process(&mut self, input: &str, output: &mut String) -> Result<(), CompileError> {
        let chars: Vec<char> = input.chars().collect();
        let mut pos = 0;
        let mut line = 0;

        while pos < chars.len() {
            let c = chars[pos];

            match c {
                '#' => {
                    pos += 1;
                    self.directive(&chars, &mut pos, line, output)?;
                    line += 1;
                }

                '"' => {
                    // String literals pass through untouched, escapes included.
                    output.push(c);
                    pos += 1;

                    while pos < chars.len() && chars[pos] != '"' {
                        if chars[pos] == '\\' && pos + 1 < chars.len() {
                            output.push(chars[pos]);
                            pos += 1;
                        }

                        output.push(chars[pos]);
                        pos += 1;
                    }

                    if pos < chars.len() {
                        output.push('"');
                        pos += 1;
                    }
                }

                _ if is_name_start(c) => {
                    let start = pos;

                    while pos < chars.len() && is_name_char(chars[pos]) {
                        pos += 1;
                    }

                    let name: String = chars[start..pos].iter().collect();

                    match self.defines.get(&name) {
                        Some(value) => output.push_str(value),
                        None => output.push_str(&name),
                    }
                }

                _ => {
                    if c == '\n' {
                        line += 1;
                    }

                    output.push(c);
                    pos += 1;
                }
            }
        }

        Ok(())
    }

    /// Consumes the directive (and the rest of its line); the cursor ends up
    /// past the line's newline, which is re-emitted to preserve numbering.
    fn directive(
        &mut self,
        chars: &[char],
        pos: &mut usize,
        line: usize,
        output: &mut String,
    ) -> Result<(), CompileError> {
        let name = read_name(chars, pos);

        match name.as_str() {
            "include" => {
                skip_blank(chars, pos);

                let filename = read_string(chars, pos);

                if filename.is_empty() {
                    return Err(CompileError::new(
                        "preprocessor",
                        "Expected \"filename\" after #include".to_owned(),
                        line,
                        0,
                        1,
                    ));
                }

                self.include(&filename, line, output)?;
            }

            "define" => {
                skip_blank(chars, pos);

                let name = read_name(chars, pos);

                if name.is_empty() {
                    return Err(CompileError::new(
                        "preprocessor",
                        "Expected name after #define".to_owned(),
                        line,
                        0,
                        1,
                    ));
                }

                skip_blank(chars, pos);

                let mut value = String::new();

                while *pos < chars.len() && chars[*pos] != '\n' {
                    value.push(chars[*pos]);
                    *pos += 1;
                }

                self.defines.insert(name, value.trim_end().to_owned());
            }

            "undef" => {
                skip_blank(chars, pos);

                let name = read_name(chars, pos);

                self.defines.remove(&name);
            }

            // Unknown directives are comments.
            _ => {}
        }

        while *pos < chars.len() && chars[*pos] != '\n' {
            *pos += 1;
        }

        if *pos < chars.len() {
            output.push('\n');
            *pos += 1;
        }

        Ok(())
    }

    fn include(
        &mut self,
        filename: &str,
        line: usize,
        output: &mut String,
    ) -> Result<(), CompileError> {
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(CompileError::new(
                "preprocessor",
                format!("Include depth limit reached at \"{}\"", filename),
                line,
                0,
                1,
            ));
        }

        let path = self.resolve_include(filename).ok_or_else(|| {
            CompileError::new(
                "preprocessor",
                format!("File \"{}\" for include wasn't found", filename),
                line,
                0,
                1,
            )
        })?;

        let text = fs::read_to_string(&path).map_err(|err| {
            CompileError::new(
                "preprocessor",
                format!("Couldn't read include \"{}\": {}", path.display(), err),
                line,
                0,
                1,
            )
        })?;

        self.depth += 1;

        let result = self.process(&text, output);

        self.depth -= 1;

        result
    }

    fn resolve_include(&self, filename: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(filename);

        if direct.is_file() {
            return Some(direct);
        }

        for dir in &self.include_paths {
            let candidate = dir.join(filename);

            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if let Some(dir) = &self.system_include {
            let candidate = dir.join(filename);

            if candidate.is_file() {
                return Some(candidate);
            }
        }

        None
    }
}

fn read_name(chars: &[char], pos: &mut usize) -> String {
    let mut name = String::new();

    if *pos < chars.len() && is_name_start(chars[*pos]) {
        while *pos < chars.len() && is_name_char(chars[*pos]) {
            name.push(chars[*pos]);
            *pos += 1;
        }
    }

    name
}

fn read_string(chars: &[char], pos: &mut usize) -> String {
    let mut text = String::new();

    if *pos < chars.len() && chars[*pos] == '"' {
        *pos += 1;

        while *pos < chars.len() && chars[*pos] != '"' {
            text.push(chars[*pos]);
            *pos += 1;
        }

        if *pos < chars.len() {
            *pos += 1;
        }
    }

    text
}

fn skip_blank(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && (chars[*pos] == ' ' || chars[*pos] == '\t') {
        *pos += 1;
    }
}
