//! Human-readable rendering of parser diagnostics.
//!
//! A rendered entry looks like this when the source line is known:
//!
//! ```text
//! 1 2 3 4 5
//! ----^
//! Warning (223): error message!
//!   Line: 2
//!   Column: 4
//!   File: /path/to/file.extension
//! --------------------------------------------
//! ```

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::diagnostic::Diagnostic;

/// Rule printed above entries without source context and below every entry.
pub const SEPARATOR: &str = "--------------------------------------------";

/// Rendered in place of an empty diagnostic list.
pub const NO_ERRORS: &str = "No XML Parser Internal Errors!";

const SUMMARY_MAX_CHARS: usize = 80;
const SUMMARY_HEAD_CHARS: usize = 65;
const SUMMARY_TAIL_CHARS: usize = 12;

fn line_break_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\r\n|[\n\x0B\x0C\r\x{85}\x{2028}\x{2029}]").expect("valid line break pattern")
    })
}

fn is_trim_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B')
}

/// Trim the ASCII whitespace set used throughout reports.
pub fn trim_blank(s: &str) -> &str {
    s.trim_matches(is_trim_char)
}

/// True when nothing but report whitespace is left after trimming.
pub fn is_blank(s: &str) -> bool {
    trim_blank(s).is_empty()
}

/// Split source text on any Unicode line break.
pub fn split_source_lines(source: &str) -> Vec<&str> {
    line_break_regex().split(source).collect()
}

/// One-based line and column of a byte offset, counting line breaks the
/// same way [`split_source_lines`] does.
///
/// Offsets past the end of `source` are clamped to its length.
pub fn position_at(source: &str, offset: usize) -> (i64, i64) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }

    let mut line = 1_i64;
    let mut line_start = 0;
    for brk in line_break_regex().find_iter(&source[..offset]) {
        line += 1;
        line_start = brk.end();
    }

    let column = source[line_start..offset].chars().count() as i64 + 1;
    (line, column)
}

/// Byte offset of a position whose rows count `\n` only and whose columns
/// count characters from one, as reported by the XML parser.
pub(crate) fn newline_position_offset(source: &str, row: u32, col: u32) -> usize {
    let mut line_start = 0;
    for _ in 1..row {
        match source[line_start..].find('\n') {
            Some(i) => line_start += i + 1,
            None => return source.len(),
        }
    }

    let skip = col.saturating_sub(1) as usize;
    source[line_start..]
        .char_indices()
        .nth(skip)
        .map(|(i, _)| line_start + i)
        .unwrap_or(source.len())
}

/// Render one diagnostic, with a caret under the offending column when the
/// source is provided and the diagnostic's line exists in it.
///
/// The result always ends with exactly one newline.
pub fn render_diagnostic(diagnostic: &Diagnostic, source: Option<&str>) -> String {
    let lines = source.map(split_source_lines);
    render_with_lines(diagnostic, lines.as_deref())
}

/// Render a list of diagnostics, separated by blank lines.
pub fn render_diagnostics(diagnostics: &[Diagnostic], source: Option<&str>) -> String {
    let lines = source.map(split_source_lines);

    let mut result = String::new();
    for diagnostic in diagnostics {
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&render_with_lines(diagnostic, lines.as_deref()));
    }

    if result.is_empty() {
        result.push_str(NO_ERRORS);
        result.push('\n');
    }

    result
}

fn render_with_lines(diagnostic: &Diagnostic, lines: Option<&[&str]>) -> String {
    let mut result = String::new();

    match (lines, context_line(diagnostic, lines)) {
        (Some(lines), Some(index)) => {
            result.push_str(lines[index]);
            result.push('\n');

            // a column past the end of the line puts the caret just after it
            let width = lines[index].chars().count();
            let column = diagnostic
                .column
                .and_then(|c| usize::try_from(c).ok())
                .unwrap_or(0)
                .min(width);
            result.push_str(&"-".repeat(column));
            result.push_str("^\n");
        }
        _ => {
            result.push_str(SEPARATOR);
            result.push('\n');
        }
    }

    let code = diagnostic
        .code
        .as_deref()
        .map(trim_blank)
        .filter(|c| !c.is_empty())
        .unwrap_or("?");

    let label = diagnostic
        .level
        .map(|level| level.label())
        .unwrap_or("Unknown Error");

    let message = diagnostic.message.as_deref().map(trim_blank).unwrap_or("");

    result.push_str(&format!("{} ({}): {}", label, code, message));
    result.push_str(&format!("\n  Line: {}", display_opt(diagnostic.line)));
    result.push_str(&format!("\n  Column: {}", display_opt(diagnostic.column)));

    if let Some(file) = diagnostic.file.as_deref().filter(|f| !f.is_empty()) {
        result.push_str(&format!("\n  File: {}", file));
    }

    result.push('\n');
    result.push_str(SEPARATOR);
    result.push('\n');
    result
}

/// Zero-based index of the diagnostic's line, if it can be shown.
fn context_line(diagnostic: &Diagnostic, lines: Option<&[&str]>) -> Option<usize> {
    let lines = lines?;
    let line = diagnostic.line.filter(|l| *l > 0)?;
    let index = usize::try_from(line - 1).ok()?;
    (index < lines.len()).then_some(index)
}

fn display_opt(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Shorten long input for the headline of a failure message.
///
/// Inputs over 80 characters keep their first 65 and last 12 characters.
pub fn summarize_source(data: &str) -> Cow<'_, str> {
    let count = data.chars().count();
    if count <= SUMMARY_MAX_CHARS {
        return Cow::Borrowed(data);
    }

    let head: String = data.chars().take(SUMMARY_HEAD_CHARS).collect();
    let tail: String = data.chars().skip(count - SUMMARY_TAIL_CHARS).collect();
    Cow::Owned(format!("{}...{}", head, tail))
}

/// The complete message of a failed parse: a headline naming the input,
/// followed by the rendered report.
pub fn failure_message(data: &str, diagnostics: &[Diagnostic]) -> String {
    let message = format!(
        "unable to parse xml string like `{}`, internal error(s):\n\n{}",
        summarize_source(data),
        render_diagnostics(diagnostics, Some(data))
    );
    trim_blank(&message).to_string()
}
