//! Nested query resolution
//!
//! A class body is split into `@use` inclusion lines, `@query <selector> {}`
//! sub-blocks and ordinary statements. Query bodies are split the same way and
//! dispatched in restricted mode, building a [`NestedQueryNode`] tree that
//! keeps source order.

use crate::dispatcher::{BlockKind, Dispatcher};
use crate::error::{CompilerError, Result};
use crate::registry;
use crate::scanner::{
    blank_span, find_matching_brace, line_at, merge_logical_lines, split_statements, DepthTracker,
    LogicalLine,
};
use crate::theme::Theme;
use crate::types::{ConstFragment, NestedQueryNode, Placeholder, ShortNameTable, StyleDefinition};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static QUERY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@query\s+([^{}]*)\{").expect("valid query regex"));

static USE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@use(?:\s+(.*))?$").expect("valid use regex"));

static PLUGIN_STATE_REF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|\s)(&?):([A-Za-z][A-Za-z0-9]*-[A-Za-z0-9-]+)").expect("valid plugin state regex")
});

static SCOPE_REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@scope\.([A-Za-z0-9_-]+)").expect("valid scope reference regex"));

/// An unparsed `@query` block.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    pub selector: String,
    pub body: String,
    pub line: usize,
    pub body_line: usize,
}

/// An `@use a b` line.
#[derive(Debug, Clone, PartialEq)]
pub struct UseLine {
    pub names: Vec<String>,
    pub line: usize,
}

/// A block body split into its three kinds of content.
#[derive(Debug, Default)]
pub struct BodyParts {
    pub uses: Vec<UseLine>,
    pub queries: Vec<RawQuery>,
    /// One entry per statement, tagged with its starting line.
    pub statements: Vec<LogicalLine>,
}

/// Split a class or query body. Nested `@query` blocks are returned raw.
pub fn split_body(body: &str, first_line: usize) -> Result<BodyParts> {
    let mut text = body.to_string();
    let mut parts = BodyParts::default();

    let mut spans = Vec::new();
    let mut tracker = DepthTracker::starting_at(first_line);
    let mut pos = 0;
    while let Some(ch) = text[pos..].chars().next() {
        let at_top = tracker.brace_depth() == 0 && tracker.at_statement_boundary();
        if at_top && ch == '@' {
            if let Some(captures) = QUERY_REGEX.captures(&text[pos..]) {
                let line = tracker.line();
                let open = pos + captures[0].len() - 1;
                let close = find_matching_brace(&text, open)
                    .map_err(|e| CompilerError::parse_legacy(line, e.message()))?
                    .ok_or_else(|| {
                        CompilerError::parse_legacy(
                            line,
                            format!("Unterminated @query block '{}'", captures[1].trim()),
                        )
                    })?;
                parts.queries.push(RawQuery {
                    selector: captures[1].trim().to_string(),
                    body: text[open + 1..close].to_string(),
                    line,
                    body_line: first_line + line_at(&text, open) - 1,
                });
                spans.push((pos, close + 1));
                for consumed in text[pos..=close].chars().filter(|c| *c == '\n') {
                    tracker.feed(consumed)?;
                }
                pos = close + 1;
                continue;
            }
        }
        if at_top && ch == '{' {
            return Err(CompilerError::parse_legacy(
                tracker.line(),
                "Unexpected '{' outside of an @query block",
            ));
        }
        tracker.feed(ch)?;
        pos += ch.len_utf8();
    }
    for (start, end) in spans {
        blank_span(&mut text, start, end);
    }

    let mut remaining = String::with_capacity(text.len());
    for (index, raw_line) in text.split('\n').enumerate() {
        if index > 0 {
            remaining.push('\n');
        }
        let trimmed = raw_line.trim();
        match USE_REGEX.captures(trimmed) {
            Some(captures) => {
                let line = first_line + index;
                let names: Vec<String> = captures
                    .get(1)
                    .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default();
                if names.is_empty() {
                    return Err(CompilerError::parse_legacy(line, "'@use' requires at least one const name"));
                }
                parts.uses.push(UseLine { names, line });
            }
            None => remaining.push_str(raw_line),
        }
    }

    for logical in merge_logical_lines(&remaining, first_line)? {
        let statements = split_statements(&logical.text)
            .map_err(|e| CompilerError::parse_legacy(logical.line, e.message()))?;
        for statement in statements {
            parts.statements.push(LogicalLine {
                text: statement,
                line: logical.line,
            });
        }
    }
    Ok(parts)
}

/// Rewrite plugin-state shorthands and `@scope.<name>` references in a raw
/// `@query` selector.
pub fn preprocess_selector(selector: &str) -> String {
    let with_states = PLUGIN_STATE_REF_REGEX.replace_all(selector, |captures: &regex::Captures| {
        let lead = &captures[1];
        let amp = &captures[2];
        let name = &captures[3];
        match registry::plugin_state_selector(name) {
            Some(concrete) if amp.is_empty() => format!(" {}", concrete),
            Some(concrete) => format!("{}&{}", lead, concrete),
            None => captures[0].to_string(),
        }
    });
    SCOPE_REF_REGEX
        .replace_all(&with_states, |captures: &regex::Captures| Placeholder::scope_ref(&captures[1]))
        .trim()
        .to_string()
}

/// Merge `@use` inclusions into `style`, in order.
pub fn apply_uses(
    uses: &[UseLine],
    consts: &IndexMap<String, ConstFragment>,
    style: &mut StyleDefinition,
    file: &str,
) -> Result<()> {
    for use_line in uses {
        for name in &use_line.names {
            let fragment = consts.get(name).ok_or_else(|| {
                CompilerError::semantic(file, use_line.line, format!("Unknown const '{}'", name))
            })?;
            style.merge_fragment(&fragment.style);
        }
    }
    Ok(())
}

struct Frame {
    node: NestedQueryNode,
    pending: std::vec::IntoIter<RawQuery>,
}

pub struct NestedQueryResolver<'a> {
    dispatcher: Dispatcher<'a>,
    consts: &'a IndexMap<String, ConstFragment>,
    file: &'a str,
}

impl<'a> NestedQueryResolver<'a> {
    pub fn new(
        theme: &'a Theme,
        keyframe_names: &'a ShortNameTable,
        consts: &'a IndexMap<String, ConstFragment>,
        file: &'a str,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(theme, BlockKind::Nested).with_keyframes(keyframe_names),
            consts,
            file,
        }
    }

    /// Build the query tree depth-first with an explicit stack.
    pub fn resolve(&self, queries: Vec<RawQuery>) -> Result<Vec<NestedQueryNode>> {
        let mut roots = Vec::new();
        let mut top_level = queries.into_iter();
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            let next = match stack.last_mut() {
                Some(frame) => frame.pending.next(),
                None => top_level.next(),
            };

            match next {
                Some(raw) => {
                    let (node, children) = self.build_node(raw)?;
                    stack.push(Frame {
                        node,
                        pending: children.into_iter(),
                    });
                }
                None => match stack.pop() {
                    Some(finished) => match stack.last_mut() {
                        Some(parent) => parent.node.style.nested_queries.push(finished.node),
                        None => roots.push(finished.node),
                    },
                    None => break,
                },
            }
        }

        Ok(roots)
    }

    fn build_node(&self, raw: RawQuery) -> Result<(NestedQueryNode, Vec<RawQuery>)> {
        let selector = preprocess_selector(&raw.selector);
        if selector.is_empty() {
            return Err(CompilerError::parse(self.file, raw.line, "@query requires a selector"));
        }

        let parts = split_body(&raw.body, raw.body_line).map_err(|e| e.located(self.file, raw.line))?;
        let mut style = StyleDefinition::new();
        apply_uses(&parts.uses, self.consts, &mut style, self.file)?;
        for statement in &parts.statements {
            self.dispatcher
                .dispatch(&statement.text, &mut style)
                .map_err(|e| e.located(self.file, statement.line))?;
        }

        log::trace!("Resolved @query '{}' at line {}", raw.selector, raw.line);
        Ok((
            NestedQueryNode {
                selector,
                style,
                line: raw.line,
            },
            parts.queries,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_body() {
        let body = "\n  @use flex card\n  bg[red]\n  hover(\n    c[blue]\n  )\n  @query .child {\n    c[green]\n    @query &:hover { c[red] }\n  }\n  p[4px]\n";
        let parts = split_body(body, 1).unwrap();

        assert_eq!(parts.uses.len(), 1);
        assert_eq!(parts.uses[0].names, vec!["flex", "card"]);
        assert_eq!(parts.uses[0].line, 2);

        assert_eq!(parts.queries.len(), 1);
        assert_eq!(parts.queries[0].selector, ".child");
        assert_eq!(parts.queries[0].line, 7);
        assert!(parts.queries[0].body.contains("@query &:hover"));

        let statements: Vec<_> = parts.statements.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(statements, vec!["bg[red]", "hover( c[blue] )", "p[4px]"]);
        assert_eq!(parts.statements[1].line, 4);
        assert_eq!(parts.statements[2].line, 11);
    }

    #[test]
    fn test_split_body_errors() {
        assert!(split_body("@use\n", 1).is_err());
        assert!(split_body("@query .x { c[red]\n", 1).is_err());
        assert!(split_body("c[red] { }", 1).is_err());
        assert!(split_body("c[red] }", 1).is_err());
    }

    #[test]
    fn test_preprocess_selector() {
        assert_eq!(preprocess_selector("&:option-selected"), "&[aria-selected=\"true\"]");
        assert_eq!(preprocess_selector(".item :accordion-open"), ".item [data-state=\"open\"]");
        assert_eq!(preprocess_selector("&:hover"), "&:hover");
        assert_eq!(preprocess_selector("&:first-child"), "&:first-child");
        assert_eq!(
            preprocess_selector("@scope.icon > span"),
            format!("{} > span", Placeholder::scope_ref("icon"))
        );
    }

    #[test]
    fn test_resolve_keeps_source_order() {
        let theme = Theme::empty();
        let names = ShortNameTable::new();
        let consts = IndexMap::new();
        let resolver = NestedQueryResolver::new(&theme, &names, &consts, "test.scs");

        let parts = split_body(
            "@query .a {\n c[red]\n @query .a1 { c[blue] }\n @query .a2 { c[green] }\n}\n@query .b { c[black] }",
            1,
        )
        .unwrap();
        let roots = resolver.resolve(parts.queries).unwrap();

        let selectors: Vec<_> = roots.iter().map(|n| n.selector.as_str()).collect();
        assert_eq!(selectors, vec![".a", ".b"]);
        let children: Vec<_> = roots[0].children().iter().map(|n| n.selector.as_str()).collect();
        assert_eq!(children, vec![".a1", ".a2"]);
        assert_eq!(roots[0].children()[1].style.base["color"], "green");
        assert_eq!(roots[0].children()[1].line, 4);
    }

    #[test]
    fn test_resolve_restrictions() {
        let theme = Theme::empty();
        let names = ShortNameTable::new();
        let consts = IndexMap::new();
        let resolver = NestedQueryResolver::new(&theme, &names, &consts, "test.scs");

        for body in ["@query .x {\n $bg[red]\n}", "@query .x {\n --&pad[1px]\n}", "@query .x {\n @use ghost\n}"] {
            let parts = split_body(body, 1).unwrap();
            assert!(resolver.resolve(parts.queries).is_err(), "{}", body);
        }

        let parts = split_body("@query .x {\n\n c[red]\n xyz[1]\n}", 1).unwrap();
        let err = resolver.resolve(parts.queries).unwrap_err();
        assert!(err.to_string().contains("test.scs at line 4"));
    }
}
