//! Terminal renderer for diagnostics.
//!
//! Produces Clang-style output: a `file:line:col: level: message` header
//! followed by the offending source line, a caret underline, and the
//! optional `help:` / `try:` gutter lines:
//!
//! ```text
//! demo.pl0:3:11: error: use of undeclared identifier 'b'
//!   3 | begin a := b + 1 end
//!     |            ^
//! ```
//!
//! Spans store byte columns because the input buffer reasons in bytes.
//! The renderer decodes the cached source line to translate byte columns
//! into display columns: one column per ASCII byte or 2-byte UTF-8
//! sequence, two columns per 3/4-byte sequence (approximating CJK double
//! width), and four columns per tab (tabs are re-rendered as four
//! spaces so the caret always lines up).

use super::Diagnostic;

const RESET: &str = "\x1b[0m";
const BOLD_WHITE: &str = "\x1b[1;37m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const BLUE: &str = "\x1b[34m";

/// Renderer for collected diagnostics.
///
/// Owns the display file name, the source-line cache captured from the
/// input buffer, and the color switch.
pub struct Renderer {
    file: String,
    lines: Vec<String>,
    color: bool,
}

impl Renderer {
    /// Create a renderer over a source-line cache.
    pub fn new(file: impl Into<String>, lines: Vec<String>, color: bool) -> Self {
        Self {
            file: file.into(),
            lines,
            color,
        }
    }

    /// Render one diagnostic to a string (no trailing newline).
    pub fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();
        self.render_header(diag, &mut out);

        let line_idx = diag.span.line as usize;
        if line_idx == 0 || line_idx > self.lines.len() {
            // No source line to show (synthesized span); header only.
            self.render_extras(diag, 0, &mut out);
            return out;
        }
        let source = &self.lines[line_idx - 1];

        let gutter_width = line_idx.to_string().len().max(3);
        let (display_col, caret_width) = display_extent(source, diag.span.column, diag.span.len);

        // Source line, tabs expanded to four spaces.
        let shown: String = source.replace('\t', "    ");
        out.push('\n');
        out.push_str(&self.gutter(&line_idx.to_string(), gutter_width));
        out.push_str(&shown);

        // Caret underline.
        out.push('\n');
        out.push_str(&self.gutter("", gutter_width));
        for _ in 0..display_col.saturating_sub(1) {
            out.push(' ');
        }
        let mut underline = String::from("^");
        for _ in 1..caret_width.max(1) {
            underline.push('~');
        }
        out.push_str(&self.paint(&underline, BOLD_GREEN));

        self.render_extras(diag, gutter_width, &mut out);
        out
    }

    /// Render every diagnostic, each on its own block, separated by
    /// newlines.
    pub fn render_all(&self, diags: &[Diagnostic]) -> String {
        diags
            .iter()
            .map(|d| self.render(d))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_header(&self, diag: &Diagnostic, out: &mut String) {
        let location = format!("{}:{}:{}:", self.file, diag.span.line, diag.span.column);
        out.push_str(&self.paint(&location, BOLD_WHITE));
        out.push(' ');
        let tag = format!("{}:", diag.level);
        let style = format!("\x1b[1;{}m", diag.level.color_code());
        out.push_str(&self.paint_with(&tag, &style));
        out.push(' ');
        out.push_str(&diag.message);
    }

    fn render_extras(&self, diag: &Diagnostic, gutter_width: usize, out: &mut String) {
        let width = gutter_width.max(3);
        if let Some(help) = &diag.help {
            out.push('\n');
            out.push_str(&self.gutter("", width));
            out.push_str("help: ");
            out.push_str(help);
        }
        if let Some(fixit) = &diag.fixit {
            out.push('\n');
            out.push_str(&self.gutter("", width));
            out.push_str("try:  ");
            out.push_str(fixit);
        }
    }

    fn gutter(&self, label: &str, width: usize) -> String {
        let g = format!("{:>width$} | ", label, width = width);
        self.paint(&g, BLUE)
    }

    fn paint(&self, text: &str, style: &str) -> String {
        self.paint_with(text, style)
    }

    fn paint_with(&self, text: &str, style: &str) -> String {
        if self.color {
            format!("{}{}{}", style, text, RESET)
        } else {
            text.to_string()
        }
    }
}

/// Translate a byte column and byte length into a display column and a
/// display width on the given (unexpanded) source line.
fn display_extent(line: &str, byte_column: u32, byte_len: u32) -> (usize, usize) {
    let start = byte_column.saturating_sub(1) as usize;
    let end = start + byte_len as usize;

    let mut display_col = 1usize;
    let mut caret_width = 0usize;
    let mut byte_pos = 0usize;

    for ch in line.chars() {
        if byte_pos >= end {
            break;
        }
        let width = char_display_width(ch);
        if byte_pos < start {
            display_col += width;
        } else {
            caret_width += width;
        }
        byte_pos += ch.len_utf8();
    }

    // Span past the end of the cached line (e.g. an EOF diagnostic):
    // place the caret one column after the last character.
    if caret_width == 0 {
        caret_width = 1;
    }
    (display_col, caret_width)
}

fn char_display_width(ch: char) -> usize {
    match ch {
        '\t' => 4,
        c if (c as u32) < 0x80 => 1,
        c if (c as u32) < 0x800 => 1,
        _ => 2,
    }
}
