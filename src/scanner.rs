//! Structural scanning for ShortCSS source text
//!
//! All brace, bracket and parenthesis counting goes through [`DepthTracker`],
//! a small state machine fed one character at a time. Parentheses that belong
//! to a CSS function call (`calc(...)`, `rgba(...)`, ...) and everything inside
//! `[...]` never change the statement parenthesis depth. Quoted strings inside
//! a value or function call are opaque.

use crate::error::{CompilerError, Result};

const CSS_FUNCTIONS: &[&str] = &[
    "calc", "var", "rgb", "rgba", "hsl", "hsla", "hwb", "lab", "lch", "oklab", "oklch",
    "color-mix", "url", "min", "max", "clamp", "linear-gradient", "radial-gradient",
    "conic-gradient", "cubic-bezier", "steps", "attr", "env", "blur", "brightness",
    "contrast", "drop-shadow", "grayscale", "hue-rotate", "invert", "saturate", "sepia",
    "opacity", "fit-content", "minmax", "repeat", "perspective", "format", "local",
    "counter", "counters", "image-set", "element",
];

const CSS_FUNCTION_PREFIXES: &[&str] = &[
    "translate", "rotate", "scale", "skew", "matrix", "repeating-", "-webkit-", "-moz-",
];

/// Returns true when `name(` opens a CSS function call rather than a block.
pub fn is_css_function(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    CSS_FUNCTIONS.contains(&lower.as_str())
        || CSS_FUNCTION_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Plain,
    FunctionCall,
    BracketValue,
    /// Inside `'...'` or `"..."`; holds the closing quote.
    Quoted(char),
}

#[derive(Debug, Clone)]
pub struct DepthTracker {
    stack: Vec<ScanState>,
    brace_depth: usize,
    paren_depth: usize,
    ident: String,
    line: usize,
    escaped: bool,
}

impl Default for DepthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthTracker {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(line: usize) -> Self {
        Self {
            stack: Vec::new(),
            brace_depth: 0,
            paren_depth: 0,
            ident: String::new(),
            line,
            escaped: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.stack.last().copied().unwrap_or(ScanState::Plain)
    }

    pub fn brace_depth(&self) -> usize {
        self.brace_depth
    }

    pub fn paren_depth(&self) -> usize {
        self.paren_depth
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// No open parenthesis, bracket or function call.
    pub fn at_statement_boundary(&self) -> bool {
        self.stack.is_empty() && self.paren_depth == 0
    }

    pub fn feed(&mut self, ch: char) -> Result<()> {
        if ch == '\n' {
            self.line += 1;
        }

        match self.state() {
            ScanState::Quoted(quote) => {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == quote {
                    self.stack.pop();
                }
            }
            ScanState::BracketValue => match ch {
                '[' => self.stack.push(ScanState::BracketValue),
                ']' => {
                    self.stack.pop();
                }
                '"' | '\'' => self.stack.push(ScanState::Quoted(ch)),
                _ => {}
            },
            ScanState::FunctionCall => match ch {
                '(' => self.stack.push(ScanState::FunctionCall),
                ')' => {
                    self.stack.pop();
                }
                '[' => self.stack.push(ScanState::BracketValue),
                ']' => return Err(self.error("Unexpected ']' inside function call")),
                '"' | '\'' => self.stack.push(ScanState::Quoted(ch)),
                _ => {}
            },
            ScanState::Plain => match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    if self.brace_depth == 0 {
                        return Err(self.error("Unexpected '}' without matching '{'"));
                    }
                    self.brace_depth -= 1;
                }
                '[' => self.stack.push(ScanState::BracketValue),
                ']' => return Err(self.error("Unexpected ']' without matching '['")),
                '(' => {
                    if !self.ident.is_empty() && is_css_function(&self.ident) {
                        self.stack.push(ScanState::FunctionCall);
                    } else {
                        self.paren_depth += 1;
                    }
                }
                ')' => {
                    if self.paren_depth == 0 {
                        return Err(self.error("Unexpected ')' without matching '('"));
                    }
                    self.paren_depth -= 1;
                }
                _ => {}
            },
        }

        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            self.ident.push(ch);
        } else {
            self.ident.clear();
        }
        Ok(())
    }

    fn error(&self, message: &str) -> CompilerError {
        CompilerError::parse_legacy(self.line, message)
    }
}

/// Byte index of the `}` closing the `{` at `open`, or `None` when the block
/// never closes.
pub fn find_matching_brace(text: &str, open: usize) -> Result<Option<usize>> {
    let mut tracker = DepthTracker::starting_at(line_at(text, open));
    for (offset, ch) in text[open..].char_indices() {
        tracker.feed(ch)?;
        if ch == '}' && tracker.state() == ScanState::Plain && tracker.brace_depth() == 0 {
            return Ok(Some(open + offset));
        }
    }
    Ok(None)
}

/// Split a body into whitespace-separated statements. Whitespace inside
/// brackets or open parentheses does not split.
pub fn split_statements(text: &str) -> Result<Vec<String>> {
    let mut tracker = DepthTracker::new();
    let mut statements = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_whitespace() && tracker.at_statement_boundary() {
            if !current.is_empty() {
                statements.push(std::mem::take(&mut current));
            }
            tracker.feed(ch)?;
            continue;
        }
        tracker.feed(ch)?;
        current.push(ch);
    }

    if !tracker.at_statement_boundary() {
        return Err(CompilerError::parse_legacy(
            tracker.line(),
            format!("Unterminated statement '{}'", current.trim()),
        ));
    }
    if !current.is_empty() {
        statements.push(current);
    }
    Ok(statements)
}

/// Split on `separator` where it appears outside brackets and parentheses.
pub fn split_top_level(text: &str, separator: char) -> Result<Vec<String>> {
    let mut tracker = DepthTracker::new();
    let mut parts = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == separator && tracker.at_statement_boundary() {
            parts.push(std::mem::take(&mut current));
            continue;
        }
        tracker.feed(ch)?;
        current.push(ch);
    }
    parts.push(current);
    Ok(parts)
}

/// A logical statement line after multi-line parentheses have been merged.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    pub text: String,
    pub line: usize,
}

/// Merge multi-line parenthesised statements into single logical lines.
///
/// While a parenthesis is open, nested parentheses, `@` markers and braces
/// are rejected. Function-call parentheses do not count.
pub fn merge_logical_lines(body: &str, first_line: usize) -> Result<Vec<LogicalLine>> {
    let mut tracker = DepthTracker::starting_at(first_line);
    let mut lines = Vec::new();
    let mut pending = String::new();
    let mut pending_line = first_line;

    for (index, raw_line) in body.lines().enumerate() {
        let line_number = first_line + index;
        let trimmed = raw_line.trim();
        let continuing = !tracker.at_statement_boundary();

        if continuing && (trimmed.contains('@') || trimmed.contains('{') || trimmed.contains('}')) {
            return Err(CompilerError::parse_legacy(
                line_number,
                format!("Directives and blocks are not allowed inside a parenthesised statement: '{}'", trimmed),
            ));
        }

        for ch in raw_line.chars() {
            tracker.feed(ch)?;
            if tracker.paren_depth() > 1 {
                return Err(CompilerError::parse_legacy(
                    line_number,
                    format!("Nested parentheses are not allowed: '{}'", trimmed),
                ));
            }
        }
        tracker.feed('\n')?;

        if trimmed.is_empty() && !continuing {
            continue;
        }
        if !continuing {
            pending_line = line_number;
        } else if !pending.is_empty() && !trimmed.is_empty() {
            pending.push(' ');
        }
        pending.push_str(trimmed);

        if tracker.at_statement_boundary() {
            lines.push(LogicalLine {
                text: std::mem::take(&mut pending),
                line: pending_line,
            });
        }
    }

    if !pending.is_empty() || !tracker.at_statement_boundary() {
        return Err(CompilerError::parse_legacy(
            pending_line,
            format!("Unterminated parenthesis in '{}'", pending.trim()),
        ));
    }
    Ok(lines)
}

/// Remove `/* ... */` comments, keeping newlines so line numbers stay valid.
pub fn strip_block_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        result.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => {
                let comment = &rest[start..start + 2 + end + 2];
                result.extend(comment.chars().filter(|c| *c == '\n'));
                rest = &rest[start + 2 + end + 2..];
            }
            None => {
                let comment = &rest[start..];
                result.extend(comment.chars().filter(|c| *c == '\n'));
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

/// Overwrite `text[start..end]` with spaces, keeping newlines and byte length.
pub fn blank_span(text: &mut String, start: usize, end: usize) {
    let blanked: String = text[start..end]
        .chars()
        .flat_map(|c| {
            let fill = if c == '\n' { '\n' } else { ' ' };
            std::iter::repeat(fill).take(c.len_utf8())
        })
        .collect();
    text.replace_range(start..end, &blanked);
}

/// 1-based line number of a byte offset.
pub fn line_at(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}
