//! Block extraction: splits a file into consts, keyframes, directives and
//! top-level classes
//!
//! Extraction runs in a fixed order over one working copy of the source.
//! Every consumed span is blanked before the next pass so nothing is parsed
//! twice, and line numbers of what remains stay valid.

use crate::error::{CompilerError, Result};
use crate::scanner::{blank_span, find_matching_brace, line_at, merge_logical_lines, DepthTracker};
use crate::types::{ClassBlock, ConstBlock, Directive, KeyframeBlock, SCOPE_NONE};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

static CONST_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@const\s+([A-Za-z0-9_-]+)\s*\{").expect("valid const regex"));

static KEYFRAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@keyframes?\s+([A-Za-z0-9_-]+)\s*\{").expect("valid keyframe regex"));

static CLASS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.([A-Za-z_-][A-Za-z0-9_-]*)\s*\{").expect("valid class regex"));

static DIRECTIVE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@([A-Za-z][A-Za-z0-9_-]*)(?:\s+(.*))?$").expect("valid directive regex")
});

static SCOPE_VALUE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid scope regex"));

/// Everything extracted from one file, in source order.
#[derive(Debug, Default)]
pub struct ExtractedFile {
    pub consts: Vec<ConstBlock>,
    pub keyframes: Vec<KeyframeBlock>,
    pub directives: Vec<Directive>,
    pub classes: Vec<ClassBlock>,
}

#[derive(Debug)]
struct RawBlock {
    name: String,
    body: String,
    line: usize,
    body_line: usize,
}

pub struct BlockExtractor<'f> {
    file: &'f str,
}

impl<'f> BlockExtractor<'f> {
    pub fn new(file: &'f str) -> Self {
        Self { file }
    }

    pub fn extract(&self, source: &str) -> Result<ExtractedFile> {
        let mut text = source.to_string();
        let mut extracted = ExtractedFile::default();

        for block in self.extract_blocks(&mut text, &CONST_REGEX, "@const")? {
            let lines = merge_logical_lines(&block.body, block.body_line)
                .map_err(|e| e.located(self.file, block.line))?
                .into_iter()
                .map(|logical| logical.text)
                .collect();
            extracted.consts.push(ConstBlock {
                name: block.name,
                lines,
                line: block.line,
            });
        }

        for block in self.extract_blocks(&mut text, &KEYFRAME_REGEX, "@keyframe")? {
            extracted.keyframes.push(KeyframeBlock {
                name: block.name,
                body: block.body,
                line: block.line,
                body_line: block.body_line,
            });
        }

        extracted.directives = self.extract_directives(&mut text)?;

        let mut seen = IndexSet::new();
        for block in self.extract_blocks(&mut text, &CLASS_REGEX, "class")? {
            if !seen.insert(block.name.clone()) {
                return Err(CompilerError::parse(
                    self.file,
                    block.line,
                    format!("Duplicate class '.{}'", block.name),
                ));
            }
            extracted.classes.push(ClassBlock {
                name: block.name,
                body: block.body,
                line: block.line,
                body_line: block.body_line,
            });
        }

        self.check_leftover(&text)?;

        log::debug!(
            "Extracted {} consts, {} keyframes, {} directives, {} classes from {}",
            extracted.consts.len(),
            extracted.keyframes.len(),
            extracted.directives.len(),
            extracted.classes.len(),
            self.file
        );
        Ok(extracted)
    }

    /// Pull every top-level block whose header matches `pattern`, blanking
    /// each consumed span.
    fn extract_blocks(&self, text: &mut String, pattern: &Regex, what: &str) -> Result<Vec<RawBlock>> {
        let mut blocks = Vec::new();
        let mut spans = Vec::new();
        let mut tracker = DepthTracker::new();
        let mut pos = 0;

        while let Some(ch) = text[pos..].chars().next() {
            let at_top = tracker.brace_depth() == 0 && tracker.at_statement_boundary();
            if at_top && (ch == '@' || ch == '.') {
                if let Some(captures) = pattern.captures(&text[pos..]) {
                    let line = line_at(text, pos);
                    let open = pos + captures[0].len() - 1;
                    let close = find_matching_brace(text, open)
                        .map_err(|e| e.located(self.file, line))?
                        .ok_or_else(|| {
                            CompilerError::parse(
                                self.file,
                                line,
                                format!("Unterminated {} block '{}'", what, &captures[1]),
                            )
                        })?;

                    blocks.push(RawBlock {
                        name: captures[1].to_string(),
                        body: text[open + 1..close].to_string(),
                        line,
                        body_line: line_at(text, open),
                    });
                    spans.push((pos, close + 1));

                    for consumed in text[pos..=close].chars().filter(|c| *c == '\n') {
                        tracker.feed(consumed)?;
                    }
                    pos = close + 1;
                    continue;
                }
            }

            tracker.feed(ch).map_err(|e| e.located(self.file, 0))?;
            pos += ch.len_utf8();
        }

        for (start, end) in spans {
            blank_span(text, start, end);
        }
        Ok(blocks)
    }

    /// Top-level `@name value` lines.
    fn extract_directives(&self, text: &mut String) -> Result<Vec<Directive>> {
        let mut directives = Vec::new();
        let mut spans = Vec::new();
        let mut tracker = DepthTracker::new();
        let mut offset = 0;

        for (index, raw_line) in text.split('\n').enumerate() {
            let line = index + 1;
            let at_top = tracker.brace_depth() == 0 && tracker.at_statement_boundary();
            let trimmed = raw_line.trim();

            if at_top && trimmed.starts_with('@') {
                let directive = self.parse_directive(trimmed, line)?;
                directives.push(directive);
                spans.push((offset, offset + raw_line.len()));
            } else {
                for ch in raw_line.chars() {
                    tracker.feed(ch).map_err(|e| e.located(self.file, line))?;
                }
            }
            tracker.feed('\n')?;
            offset += raw_line.len() + 1;
        }

        for (start, end) in spans {
            blank_span(text, start, end);
        }
        Ok(directives)
    }

    fn parse_directive(&self, trimmed: &str, line: usize) -> Result<Directive> {
        let captures = DIRECTIVE_REGEX.captures(trimmed).ok_or_else(|| {
            CompilerError::parse(self.file, line, format!("Malformed directive '{}'", trimmed))
        })?;
        let name = captures[1].to_string();
        let value = captures
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        match name.as_str() {
            "use" | "query" => {
                return Err(CompilerError::parse(
                    self.file,
                    line,
                    format!("'@{}' is only allowed inside a class body", name),
                ))
            }
            "const" | "keyframe" | "keyframes" => {
                return Err(CompilerError::parse(
                    self.file,
                    line,
                    format!("'@{}' requires a name followed by a '{{ ... }}' block", name),
                ))
            }
            _ => {}
        }

        if value.is_empty() {
            return Err(CompilerError::parse(
                self.file,
                line,
                format!("Directive '@{}' requires a value", name),
            ));
        }
        if name == "scope" && value != SCOPE_NONE && !SCOPE_VALUE_REGEX.is_match(&value) {
            return Err(CompilerError::parse(
                self.file,
                line,
                format!("Invalid scope identifier '{}'", value),
            ));
        }

        Ok(Directive { name, value, line })
    }

    fn check_leftover(&self, text: &str) -> Result<()> {
        if let Some(position) = text.find(|c: char| !c.is_whitespace()) {
            let line = line_at(text, position);
            let snippet: String = text[position..]
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .chars()
                .take(40)
                .collect();
            return Err(CompilerError::parse(
                self.file,
                line,
                format!("Unexpected text outside of any block: '{}'", snippet),
            ));
        }
        Ok(())
    }
}
