//! Diagnostics: located errors and warnings, plus the logger that renders
//! them with a source snippet and caret marker.

use std::fmt;

const ESC_RESET: &str = "\x1b[0m";
const ESC_ERROR: &str = "\x1b[31;1m";
const ESC_WARNING: &str = "\x1b[35;1m";
const ESC_BOLD: &str = "\x1b[37;1m";

/// A fatal condition produced by one of the pipeline stages.
///
/// Stages never exit the process; they return one of these and the driver
/// decides what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub module: &'static str,
    pub message: String,
    pub line: usize,
    pub col: usize,
    pub len: usize,
}

impl CompileError {
    pub fn new(
        module: &'static str,
        message: String,
        line: usize,
        col: usize,
        len: usize,
    ) -> CompileError {
        CompileError {
            module,
            message,
            line,
            col,
            len,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} (at L{}, C{})",
            self.module,
            self.message,
            self.line + 1,
            self.col + 1
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

/// A non-fatal message collected during a stage and printed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub module: &'static str,
    pub message: String,
    pub line: usize,
    pub col: usize,
    pub len: usize,
}

impl Diagnostic {
    pub fn warning(
        module: &'static str,
        message: String,
        line: usize,
        col: usize,
        len: usize,
    ) -> Diagnostic {
        Diagnostic {
            level: Level::Warning,
            module,
            message,
            line,
            col,
            len,
        }
    }
}

/// Renders diagnostics against the original source text.
///
/// Message shape: `<level>: in <file>: <module>: <message> (at L<l>, C<c>)`
/// followed by the offending source line and a `^~~~` marker under the span.
pub struct Logger {
    source: Vec<String>,
    filename: String,
}

impl Logger {
    pub fn new(source: &str, filename: &str) -> Logger {
        Logger {
            source: source.lines().map(str::to_owned).collect(),
            filename: filename.to_owned(),
        }
    }

    fn level_tag(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("error", ESC_ERROR),
            Level::Warning => ("warning", ESC_WARNING),
        }
    }

    fn header(&self, level: Level, module: &str, message: &str, line: usize, col: usize) -> String {
        let (tag, color) = Logger::level_tag(level);

        if self.filename.is_empty() {
            format!(
                "{}{}:{} {}: {} (at L{}, C{})",
                color,
                tag,
                ESC_RESET,
                module,
                message,
                line + 1,
                col + 1
            )
        } else {
            format!(
                "{}{}:{} in {}{}:{} {}: {} (at L{}, C{})",
                color,
                tag,
                ESC_RESET,
                ESC_BOLD,
                self.filename,
                ESC_RESET,
                module,
                message,
                line + 1,
                col + 1
            )
        }
    }

    /// The two-line hint: the source line with the span highlighted, then a
    /// caret marker padded to the same column.
    fn snippet(&self, level: Level, line: usize, col: usize, len: usize) -> Option<String> {
        let text = self.source.get(line)?;
        let (_, color) = Logger::level_tag(level);

        let len = len.max(1);
        let col = col.min(text.len());
        let end = (col + len).min(text.len());

        let highlighted = format!(
            "{}{}{}{}{}",
            &text[..col],
            color,
            &text[col..end],
            ESC_RESET,
            &text[end..]
        );

        let mut marker = " ".repeat(col);
        marker.push_str(color);
        marker.push('^');

        if len > 1 {
            marker.push_str(&"~".repeat(len - 1));
        }

        marker.push_str(ESC_RESET);

        Some(format!(
            "  {}\t| {}\n  {}\t| {}",
            line + 1,
            highlighted,
            line + 2,
            marker
        ))
    }

    pub fn print(&self, level: Level, module: &str, message: &str, line: usize, col: usize, len: usize) {
        eprintln!("{}", self.header(level, module, message, line, col));

        if let Some(hint) = self.snippet(level, line, col, len) {
            eprintln!("here:\n{}", hint);
        }
    }

    pub fn print_error(&self, err: &CompileError) {
        self.print(
            Level::Error,
            err.module,
            &err.message,
            err.line,
            err.col,
            err.len,
        );
    }

    pub fn print_diagnostic(&self, diag: &Diagnostic) {
        self.print(
            diag.level,
            diag.module,
            &diag.message,
            diag.line,
            diag.col,
            diag.len,
        );
    }

    /// A bare message without location info, for conditions that precede any
    /// source position (missing files, bad options).
    pub fn print_plain(&self, level: Level, module: &str, message: &str) {
        let (tag, color) = Logger::level_tag(level);

        eprintln!("{}{}:{} {}: {}", color, tag, ESC_RESET, module, message);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_display_is_one_based() {
        let err = CompileError::new("parser", "Expected ';'".to_owned(), 0, 4, 1);

        assert_eq!(format!("{}", err), "parser: Expected ';' (at L1, C5)");
    }

    #[test]
    fn snippet_highlights_span() {
        let logger = Logger::new("u32 x;\nx = 1;\n", "t.hs");
        let hint = logger.snippet(Level::Error, 0, 4, 1).unwrap();

        assert!(hint.contains("u32 "));
        assert!(hint.contains('^'));
    }

    #[test]
    fn snippet_out_of_range_line_is_none() {
        let logger = Logger::new("one line", "t.hs");

        assert!(logger.snippet(Level::Error, 5, 0, 1).is_none());
    }
}
