//! Python `pprint` compatible rendering of nested string lists.
//!
//! The report file is read by people used to the `pprint(header, f)` dump, so
//! the layout follows `pprint.pformat(obj, width=80)`: a list is written on one
//! line while its repr fits, otherwise one element per line, indented one
//! column deeper than the opening bracket. A string that still does not fit is
//! cut after whitespace into adjacent literals.

use std::sync::OnceLock;
use regex::Regex;

/// Line width `pprint` wraps at by default.
pub const WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    Str(String),
    List(Vec<PyValue>),
}

impl From<&str> for PyValue {
    fn from(s: &str) -> Self {
        PyValue::Str(s.to_string())
    }
}

impl From<String> for PyValue {
    fn from(s: String) -> Self {
        PyValue::Str(s)
    }
}

impl<T: Into<PyValue>> From<Vec<T>> for PyValue {
    fn from(items: Vec<T>) -> Self {
        PyValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl PyValue {
    /// Single line `repr()`.
    pub fn repr(&self) -> String {
        match self {
            PyValue::Str(s) => repr_str(s),
            PyValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|x| x.repr()).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }

    /// `pprint.pformat(self, width)` without the trailing newline.
    pub fn pformat(&self, width: usize) -> String {
        let mut out = String::new();
        self.format_into(&mut out, width, 0, 0, 0);
        out
    }

    fn format_into(&self, out: &mut String, width: usize, indent: usize, allowance: usize, level: usize) {
        let rep = self.repr();
        let max_width = width.saturating_sub(indent + allowance);
        if rep.chars().count() <= max_width {
            out.push_str(&rep);
            return;
        }
        match self {
            PyValue::List(items) if !items.is_empty() => {
                out.push('[');
                let indent = indent + 1;
                let delim = format!(",\n{}", " ".repeat(indent));
                let last = items.len() - 1;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(&delim);
                    }
                    // the closing bracket follows the last item on its line
                    let allowance = if i == last { allowance + 1 } else { 1 };
                    item.format_into(out, width, indent, allowance, level + 1);
                }
                out.push(']');
            }
            PyValue::Str(s) => format_str(s, out, width, indent, allowance, level + 1),
            _ => out.push_str(&rep),
        }
    }
}

/// An over-wide string as adjacent literals, each line cut after whitespace.
/// Only a top-level string gets wrapped in parentheses.
fn format_str(s: &str, out: &mut String, width: usize, indent: usize, allowance: usize, level: usize) {
    if s.is_empty() {
        out.push_str(&repr_str(s));
        return;
    }
    let (indent, allowance) = if level == 1 { (indent + 1, allowance + 1) } else { (indent, allowance) };
    let max_width = width.saturating_sub(indent);
    let lines = split_lines(s);

    let mut chunks = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let last_line = i + 1 == lines.len();
        let max_width1 = if last_line { max_width.saturating_sub(allowance) } else { max_width };
        let rep = repr_str(line);
        if rep.chars().count() <= max_width1 {
            chunks.push(rep);
            continue;
        }

        let parts = words(line);
        let mut current = String::new();
        for (j, part) in parts.iter().enumerate() {
            let candidate = format!("{current}{part}");
            let max_width2 = if last_line && j + 1 == parts.len() {
                max_width.saturating_sub(allowance)
            } else {
                max_width
            };
            if repr_str(&candidate).chars().count() > max_width2 {
                if !current.is_empty() {
                    chunks.push(repr_str(&current));
                }
                current = part.to_string();
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            chunks.push(repr_str(&current));
        }
    }

    if let [only] = chunks.as_slice() {
        out.push_str(only);
        return;
    }
    if level == 1 {
        out.push('(');
    }
    let delim = format!("\n{}", " ".repeat(indent));
    out.push_str(&chunks.join(&delim));
    if level == 1 {
        out.push(')');
    }
}

/// `str.splitlines(keepends=True)`.
fn split_lines(s: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let end = match c {
            '\r' => match chars.peek() {
                Some(&(j, '\n')) => {
                    chars.next();
                    j + 1
                }
                _ => i + 1,
            },
            '\n' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}' => {
                i + c.len_utf8()
            }
            _ => continue,
        };
        lines.push(&s[start..end]);
        start = end;
    }
    if start < s.len() {
        lines.push(&s[start..]);
    }
    lines
}

/// Runs of non-space followed by their trailing spaces (`re.findall(r'\S*\s*')`).
fn words(line: &str) -> Vec<&str> {
    static WORDS: OnceLock<Option<Regex>> = OnceLock::new();
    match WORDS.get_or_init(|| Regex::new(r"[^\s\x1c-\x1f]*[\s\x1c-\x1f]*").ok()) {
        Some(re) => re.find_iter(line).map(|m| m.as_str()).filter(|p| !p.is_empty()).collect(),
        None => vec![line],
    }
}

/// `not str.isprintable()` for one character: control, format, private use,
/// unassigned, and separators other than the ASCII space.
fn is_non_printable(c: char) -> bool {
    static NON_PRINTABLE: OnceLock<Option<Regex>> = OnceLock::new();
    match NON_PRINTABLE.get_or_init(|| Regex::new(r"^[[\p{C}\p{Z}]--\x20]$").ok()) {
        Some(re) => {
            let mut buf = [0u8; 4];
            re.is_match(c.encode_utf8(&mut buf))
        }
        None => c.is_control(),
    }
}

/// Python's `str.__repr__`: single quotes unless the text has a single quote
/// and no double quote.
pub fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if (c as u32) < 0x7f => out.push(c),
            c if is_non_printable(c) => {
                let code = c as u32;
                let escaped = match code {
                    0..=0xff => format!("\\x{code:02x}"),
                    0x100..=0xffff => format!("\\u{code:04x}"),
                    _ => format!("\\U{code:08x}"),
                };
                out.push_str(&escaped);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
