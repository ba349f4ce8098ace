//! Token dispatch: turns one ShortCSS statement into property assignments
//!
//! A statement is either a flat token (`bg[red]`, `$bg[red]`, `--&pad[8px]`,
//! `--raw[1px]`, optionally suffixed with `!`) or a context block
//! (`hover(...)`, `before(...)`, `screen(md, ...)`, `container(...)`,
//! `option-selected(...)`, `dialog-container(...)`). Block bodies are split
//! into flat sub-tokens and dispatched against the block's property map.

use crate::error::{CompilerError, Result};
use crate::registry::{self, TYPOGRAPHY_ABBR};
use crate::scanner::{split_statements, split_top_level, DepthTracker};
use crate::theme::Theme;
use crate::types::{ConditionalBlock, Placeholder, PropertyMap, ShortNameTable, StyleDefinition};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_TYPOGRAPHY_DEPTH: usize = 8;
const IMPORTANT_SUFFIX: &str = " !important";

static NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("valid name regex"));

static LOCAL_REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--&([A-Za-z0-9_-]+)").expect("valid local reference regex"));

static ANIMATION_WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\s,]+").expect("valid animation word regex"));

/// The kind of block a statement is being dispatched for. Each kind carries
/// its own restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Class,
    Const,
    Nested,
    Keyframe,
    ThemeFragment,
}

impl BlockKind {
    pub fn describe(self) -> &'static str {
        match self {
            BlockKind::Class => "class",
            BlockKind::Const => "const fragment",
            BlockKind::Nested => "nested query",
            BlockKind::Keyframe => "keyframe step",
            BlockKind::ThemeFragment => "theme fragment",
        }
    }

    fn allows_runtime_vars(self) -> bool {
        matches!(self, BlockKind::Class | BlockKind::Keyframe)
    }

    fn allows_local_declarations(self) -> bool {
        self == BlockKind::Class
    }

    fn allows_local_references(self) -> bool {
        matches!(self, BlockKind::Class | BlockKind::Const | BlockKind::Nested)
    }

    fn allows_importance(self) -> bool {
        !matches!(self, BlockKind::Const | BlockKind::ThemeFragment)
    }

    fn allows_blocks(self) -> bool {
        matches!(self, BlockKind::Class | BlockKind::Const | BlockKind::Nested)
    }
}

/// Where the declarations of a flat token land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Base,
    State { name: String, selector: String },
    Pseudo { name: String },
    Screen { label: String, condition: String },
    Container { label: String, condition: String },
    PluginContainer { name: String, selector: String },
}

impl Target {
    fn describe(&self) -> String {
        match self {
            Target::Base => "base".to_string(),
            Target::State { name, .. } => format!("{}(...)", name),
            Target::Pseudo { name } => format!("{}(...)", name),
            Target::Screen { .. } => "screen(...)".to_string(),
            Target::Container { .. } => "container(...)".to_string(),
            Target::PluginContainer { name, .. } => format!("{}(...)", name),
        }
    }
}

/// Context named by the text before a statement's first `(`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockContext {
    PseudoClass { name: String, selector: String },
    PseudoElement { name: String },
    Screen,
    Container,
    PluginState { name: String, selector: String },
    PluginContainer { name: String, selector: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenPrefix {
    Plain,
    Runtime,
    LocalDeclaration,
    Custom,
}

/// A parsed flat token.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FlatToken<'s> {
    prefix: TokenPrefix,
    name: &'s str,
    value: &'s str,
    important: bool,
}

pub struct Dispatcher<'a> {
    theme: &'a Theme,
    kind: BlockKind,
    keyframe_names: Option<&'a ShortNameTable>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(theme: &'a Theme, kind: BlockKind) -> Self {
        Self {
            theme,
            kind,
            keyframe_names: None,
        }
    }

    /// Keyframe names declared in the current file, raw -> final.
    pub fn with_keyframes(mut self, names: &'a ShortNameTable) -> Self {
        self.keyframe_names = Some(names);
        self
    }

    /// Classify and apply one trimmed statement.
    pub fn dispatch(&self, statement: &str, def: &mut StyleDefinition) -> Result<()> {
        let statement = statement.trim();
        if statement.is_empty() {
            return Ok(());
        }
        if statement.starts_with('@') {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("Unexpected directive '{}' in {}", statement, self.kind.describe()),
            ));
        }

        if let Some(open) = statement.find('(') {
            if let Some(context) = self.classify(&statement[..open]) {
                if !self.kind.allows_blocks() {
                    return Err(CompilerError::semantic_legacy(
                        0,
                        format!(
                            "'{}' blocks are not allowed in a {}",
                            &statement[..open],
                            self.kind.describe()
                        ),
                    ));
                }
                let inner = block_inner(statement, open)?;
                return self.dispatch_block(context, inner, def);
            }
        }

        self.apply_flat(statement, &Target::Base, def, 0)
    }

    fn classify(&self, head: &str) -> Option<BlockContext> {
        let head = head.trim();
        if !NAME_REGEX.is_match(head) {
            return None;
        }
        if let Some(selector) = registry::pseudo_class_selector(head) {
            return Some(BlockContext::PseudoClass {
                name: head.to_string(),
                selector: selector.to_string(),
            });
        }
        if registry::is_pseudo_element(head) {
            return Some(BlockContext::PseudoElement {
                name: head.to_string(),
            });
        }
        match head {
            "screen" => return Some(BlockContext::Screen),
            "container" => return Some(BlockContext::Container),
            _ => {}
        }
        if let Some(selector) = registry::plugin_state_selector(head) {
            return Some(BlockContext::PluginState {
                name: head.to_string(),
                selector: selector.to_string(),
            });
        }
        if let Some(selector) = registry::plugin_container_selector(head) {
            return Some(BlockContext::PluginContainer {
                name: head.to_string(),
                selector: selector.to_string(),
            });
        }
        None
    }

    fn dispatch_block(&self, context: BlockContext, inner: &str, def: &mut StyleDefinition) -> Result<()> {
        let (target, body) = match context {
            BlockContext::PseudoClass { name, selector } | BlockContext::PluginState { name, selector } => {
                (Target::State { name, selector }, inner.to_string())
            }
            BlockContext::PseudoElement { name } => (Target::Pseudo { name }, inner.to_string()),
            BlockContext::PluginContainer { name, selector } => {
                (Target::PluginContainer { name, selector }, inner.to_string())
            }
            BlockContext::Screen => {
                let (condition, label, body) = self.conditional_parts("screen", inner)?;
                let label = existing_label(&def.screens, &condition).unwrap_or(label);
                (Target::Screen { label, condition }, body)
            }
            BlockContext::Container => {
                let (condition, label, body) = self.conditional_parts("container", inner)?;
                let label = existing_label(&def.containers, &condition).unwrap_or(label);
                (Target::Container { label, condition }, body)
            }
        };

        // Register the block even when it ends up empty so source order is kept
        target_map(def, &target);

        for token in split_statements(&body)? {
            if let Some(open) = token.find('(') {
                if self.classify(&token[..open]).is_some() {
                    return Err(CompilerError::semantic_legacy(
                        0,
                        format!(
                            "Nested block '{}' is not allowed inside {}",
                            token,
                            target.describe()
                        ),
                    ));
                }
            }
            self.apply_flat(&token, &target, def, 0)?;
        }
        Ok(())
    }

    /// Split `md, w[100%]` into the resolved condition, its label and the body.
    fn conditional_parts(&self, keyword: &str, inner: &str) -> Result<(String, String, String)> {
        let mut parts = split_top_level(inner, ',')?.into_iter();
        let clause = parts.next().unwrap_or_default();
        let body: Vec<String> = parts.collect();
        if body.is_empty() {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("{}(...) requires a condition followed by ',' and properties", keyword),
            ));
        }

        let condition = self.resolve_condition(clause.trim())?;
        let label = format!("{}-{}", keyword, sanitize_label(clause.trim()));
        Ok((condition, label, body.join(",")))
    }

    /// `min[x]`/`max[x]` literals or breakpoint names, joined with ` and `.
    pub fn resolve_condition(&self, clause: &str) -> Result<String> {
        let mut conditions = Vec::new();
        for part in split_statements(clause)? {
            if part == "and" {
                continue;
            }
            if let Some(value) = bracket_value(&part, "min") {
                conditions.push(format!("(min-width:{})", value));
            } else if let Some(value) = bracket_value(&part, "max") {
                conditions.push(format!("(max-width:{})", value));
            } else if let Some(breakpoint) = self.theme.breakpoint(&part) {
                let breakpoint = breakpoint.trim();
                if breakpoint.starts_with('(') {
                    conditions.push(breakpoint.to_string());
                } else {
                    conditions.push(format!("({})", breakpoint));
                }
            } else {
                return Err(CompilerError::semantic_legacy(
                    0,
                    format!("Unknown breakpoint '{}'", part),
                ));
            }
        }

        if conditions.is_empty() {
            return Err(CompilerError::semantic_legacy(0, "Empty condition clause"));
        }
        Ok(conditions.join(" and "))
    }

    fn apply_flat(&self, token: &str, target: &Target, def: &mut StyleDefinition, depth: usize) -> Result<()> {
        let flat = parse_flat_token(token)?;

        if flat.important && !self.kind.allows_importance() {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("'!important' is not allowed in a {}: '{}'", self.kind.describe(), token),
            ));
        }

        let value = self.process_value(flat.value, def, token)?;
        match flat.prefix {
            TokenPrefix::Custom => {
                let property = format!("--{}", flat.name);
                insert_declaration(target_map(def, target), &property, &value, flat.important);
                Ok(())
            }
            TokenPrefix::LocalDeclaration => self.declare_local(flat, value, target, def, token),
            TokenPrefix::Runtime => self.declare_runtime(flat, value, target, def, token),
            TokenPrefix::Plain => self.apply_abbreviation(flat, value, target, def, depth),
        }
    }

    /// Record and substitute `--&name` references.
    fn process_value(&self, value: &str, def: &mut StyleDefinition, token: &str) -> Result<String> {
        if !LOCAL_REF_REGEX.is_match(value) {
            return Ok(value.to_string());
        }
        if !self.kind.allows_local_references() {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("Local variables cannot be referenced in a {}: '{}'", self.kind.describe(), token),
            ));
        }
        for captures in LOCAL_REF_REGEX.captures_iter(value) {
            def.used_local_vars.insert(captures[1].to_string());
        }
        Ok(LOCAL_REF_REGEX
            .replace_all(value, |captures: &regex::Captures| Placeholder::local(&captures[1]))
            .into_owned())
    }

    fn declare_local(
        &self,
        flat: FlatToken,
        value: String,
        target: &Target,
        def: &mut StyleDefinition,
        token: &str,
    ) -> Result<()> {
        if !self.kind.allows_local_declarations() {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("Local variables cannot be declared in a {}: '{}'", self.kind.describe(), token),
            ));
        }
        if *target != Target::Base {
            return Err(CompilerError::semantic_legacy(
                0,
                format!(
                    "Local variables must be declared at the top level of a class, not inside {}: '{}'",
                    target.describe(),
                    token
                ),
            ));
        }
        if flat.important {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("'!important' cannot be applied to a local variable declaration: '{}'", token),
            ));
        }
        if def.local_vars.contains_key(flat.name) {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("Local variable '--&{}' is already declared", flat.name),
            ));
        }
        def.local_vars.insert(flat.name.to_string(), value);
        Ok(())
    }

    fn declare_runtime(
        &self,
        flat: FlatToken,
        value: String,
        target: &Target,
        def: &mut StyleDefinition,
        token: &str,
    ) -> Result<()> {
        if !self.kind.allows_runtime_vars() {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("Runtime variable '{}' is not allowed in a {}", token, self.kind.describe()),
            ));
        }
        if Placeholder::contains_any(&value) {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("Runtime variable defaults cannot reference local variables: '{}'", token),
            ));
        }
        let properties = registry::lookup_abbreviation(flat.name).ok_or_else(|| {
            CompilerError::semantic_legacy(
                0,
                format!("Runtime variable '{}' must use a known abbreviation", token),
            )
        })?;

        let bucket = match target {
            Target::Base => &mut def.var_base,
            Target::State { name, .. } => def.var_states.entry(name.clone()).or_default(),
            Target::Pseudo { name } => def.var_pseudos.entry(name.clone()).or_default(),
            Target::Screen { label, .. } | Target::Container { label, .. } => {
                def.var_containers.entry(label.clone()).or_default()
            }
            Target::PluginContainer { .. } => {
                return Err(CompilerError::semantic_legacy(
                    0,
                    format!("Runtime variable '{}' is not allowed in {}", token, target.describe()),
                ))
            }
        };
        if bucket.contains_key(flat.name) {
            return Err(CompilerError::semantic_legacy(
                0,
                format!(
                    "Conflicting declarations: runtime variable '${}' is declared twice in {}",
                    flat.name,
                    target.describe()
                ),
            ));
        }
        bucket.insert(flat.name.to_string(), value);
        def.has_runtime_var = true;

        let placeholder = Placeholder::runtime(flat.name);
        let map = target_map(def, target);
        for property in properties {
            insert_declaration(map, property, &placeholder, flat.important);
        }
        Ok(())
    }

    fn apply_abbreviation(
        &self,
        flat: FlatToken,
        value: String,
        target: &Target,
        def: &mut StyleDefinition,
        depth: usize,
    ) -> Result<()> {
        if flat.name == TYPOGRAPHY_ABBR {
            return self.apply_typography(&value, flat.important, target, def, depth);
        }

        if let Some(properties) = registry::lookup_abbreviation(flat.name) {
            let map = target_map(def, target);
            for property in properties {
                let resolved = self.resolve_keyframe_names(property, &value);
                insert_declaration(map, property, &resolved, flat.important);
            }
            return Ok(());
        }

        if self.theme.has_define_group(flat.name) {
            let variant = value.trim();
            let fragment = self.theme.define(flat.name, variant).ok_or_else(|| {
                CompilerError::semantic_legacy(
                    0,
                    format!("Unknown variant '{}' for define '{}'", variant, flat.name),
                )
            })?;
            let map = target_map(def, target);
            for (property, fragment_value) in &fragment.base {
                insert_declaration(map, property, fragment_value, flat.important);
            }
            return Ok(());
        }

        Err(CompilerError::semantic_legacy(
            0,
            format!("Unknown abbreviation '{}'", flat.name),
        ))
    }

    fn apply_typography(
        &self,
        key: &str,
        important: bool,
        target: &Target,
        def: &mut StyleDefinition,
        depth: usize,
    ) -> Result<()> {
        if depth >= MAX_TYPOGRAPHY_DEPTH {
            return Err(CompilerError::semantic_legacy(
                0,
                format!("Typography preset '{}' nests too deeply", key),
            ));
        }
        let preset = self.theme.typography(key.trim()).ok_or_else(|| {
            CompilerError::semantic_legacy(0, format!("Unknown typography preset '{}'", key))
        })?;

        for token in split_statements(preset)? {
            if token.starts_with('$') || token.starts_with("--&") {
                return Err(CompilerError::semantic_legacy(
                    0,
                    format!("Typography preset '{}' may only contain plain tokens, found '{}'", key, token),
                ));
            }
            let token = if important && !token.ends_with('!') {
                format!("{}!", token)
            } else {
                token
            };
            self.apply_flat(&token, target, def, depth + 1)?;
        }
        Ok(())
    }

    /// Swap keyframe names in `animation`/`animation-name` values for their
    /// final, scope-qualified names.
    fn resolve_keyframe_names(&self, property: &str, value: &str) -> String {
        if property != "animation" && property != "animation-name" {
            return value.to_string();
        }
        ANIMATION_WORD_REGEX
            .replace_all(value, |captures: &regex::Captures| {
                let word = &captures[0];
                self.keyframe_names
                    .and_then(|names| names.get(word).cloned())
                    .or_else(|| self.theme.keyframe(word).map(str::to_string))
                    .unwrap_or_else(|| word.to_string())
            })
            .into_owned()
    }
}

fn parse_flat_token(token: &str) -> Result<FlatToken<'_>> {
    let trimmed = token.trim();
    let (body, important) = match trimmed.strip_suffix('!') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let (prefix, rest) = if let Some(rest) = body.strip_prefix('$') {
        (TokenPrefix::Runtime, rest)
    } else if let Some(rest) = body.strip_prefix("--&") {
        (TokenPrefix::LocalDeclaration, rest)
    } else if let Some(rest) = body.strip_prefix("--") {
        (TokenPrefix::Custom, rest)
    } else {
        (TokenPrefix::Plain, body)
    };

    let invalid = || {
        CompilerError::semantic_legacy(
            0,
            format!("Invalid token '{}': expected '<abbr>[<value>]'", trimmed),
        )
    };
    let open = rest.find('[').ok_or_else(invalid)?;
    if !rest.ends_with(']') {
        return Err(invalid());
    }
    let name = &rest[..open];
    let value = &rest[open + 1..rest.len() - 1];
    if !NAME_REGEX.is_match(name) {
        return Err(invalid());
    }
    if value.trim().is_empty() {
        return Err(CompilerError::semantic_legacy(
            0,
            format!("Empty value in token '{}'", trimmed),
        ));
    }

    Ok(FlatToken {
        prefix,
        name,
        value,
        important,
    })
}

/// Content between the `(` at `open` and the statement's final `)`.
fn block_inner(statement: &str, open: usize) -> Result<&str> {
    let mut tracker = DepthTracker::new();
    for (offset, ch) in statement[open..].char_indices() {
        tracker.feed(ch)?;
        if ch == ')' && tracker.at_statement_boundary() {
            let close = open + offset;
            if close + 1 != statement.len() {
                return Err(CompilerError::semantic_legacy(
                    0,
                    format!("Unexpected text after ')' in '{}'", statement),
                ));
            }
            return Ok(&statement[open + 1..close]);
        }
    }
    Err(CompilerError::parse_legacy(
        0,
        format!("Unterminated parenthesis in '{}'", statement),
    ))
}

/// `min[768px]` -> `768px` when the token uses `keyword`.
fn bracket_value<'s>(token: &'s str, keyword: &str) -> Option<&'s str> {
    token
        .strip_prefix(keyword)?
        .strip_prefix('[')?
        .strip_suffix(']')
        .map(str::trim)
}

/// Reduce a condition clause to `[a-z0-9-]` for use in generated names.
pub fn sanitize_label(text: &str) -> String {
    let mut label = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            label.push(ch.to_ascii_lowercase());
        } else if ch == '.' {
            label.push('_');
        } else if !label.ends_with('-') {
            label.push('-');
        }
    }
    label.trim_matches('-').to_string()
}

/// Entries with the same condition share one block and one label.
fn existing_label(entries: &[ConditionalBlock], condition: &str) -> Option<String> {
    entries
        .iter()
        .find(|entry| entry.condition == condition)
        .map(|entry| entry.label.clone())
}

fn target_map<'d>(def: &'d mut StyleDefinition, target: &Target) -> &'d mut PropertyMap {
    match target {
        Target::Base => &mut def.base,
        Target::State { name, selector } => def.state_mut(name, selector),
        Target::Pseudo { name } => def.pseudo_mut(name),
        Target::Screen { label, condition } => def.screen_mut(label, condition),
        Target::Container { label, condition } => def.container_mut(label, condition),
        Target::PluginContainer { name, selector } => def.plugin_container_mut(name, selector),
    }
}

fn insert_declaration(map: &mut PropertyMap, property: &str, value: &str, important: bool) {
    let value = if important && !value.ends_with(IMPORTANT_SUFFIX) {
        format!("{}{}", value, IMPORTANT_SUFFIX)
    } else {
        value.to_string()
    };
    map.insert(property.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeSource;

    fn theme() -> Theme {
        let mut source = ThemeSource::default();
        source.breakpoints.insert("md".into(), "(min-width:768px)".into());
        source.breakpoints.insert("lg".into(), "min-width:1024px".into());
        source.typography.insert("body".into(), "fs[16px] lh[1.5]".into());
        source
            .defines
            .entry("btn".into())
            .or_default()
            .insert("primary".into(), "bg[blue] c[white]".into());
        source.keyframes.insert("spin".into(), "shared_spin".into());
        Theme::from_source(source).unwrap()
    }

    fn dispatch_all(kind: BlockKind, statements: &[&str]) -> Result<StyleDefinition> {
        let theme = theme();
        let dispatcher = Dispatcher::new(&theme, kind);
        let mut def = StyleDefinition::new();
        for statement in statements {
            dispatcher.dispatch(statement, &mut def)?;
        }
        Ok(def)
    }

    #[test]
    fn test_flat_property_and_multi_expansion() {
        let def = dispatch_all(BlockKind::Class, &["bg[red]", "px[4px]"]).unwrap();
        assert_eq!(def.base["background-color"], "red");
        assert_eq!(def.base["padding-left"], "4px");
        assert_eq!(def.base["padding-right"], "4px");
    }

    #[test]
    fn test_importance() {
        let def = dispatch_all(BlockKind::Class, &["c[red]!"]).unwrap();
        assert_eq!(def.base["color"], "red !important");

        let err = dispatch_all(BlockKind::Const, &["c[red]!"]).unwrap_err();
        assert!(err.to_string().contains("!important"));
    }

    #[test]
    fn test_unknown_abbreviation() {
        let err = dispatch_all(BlockKind::Class, &["xyz[1px]"]).unwrap_err();
        assert!(err.to_string().contains("Unknown abbreviation 'xyz'"));
    }

    #[test]
    fn test_state_pseudo_and_plugin_blocks() {
        let def = dispatch_all(
            BlockKind::Class,
            &[
                "hover(bg[blue] c[white])",
                "before(ct[''])",
                "option-selected(bg[green])",
                "dialog-container(p[2px])",
            ],
        )
        .unwrap();

        assert_eq!(def.states["hover"].selector, ":hover");
        assert_eq!(def.states["hover"].properties["color"], "white");
        assert_eq!(def.pseudos["before"]["content"], "''");
        assert_eq!(def.states["option-selected"].selector, "[aria-selected=\"true\"]");
        assert_eq!(def.plugin_containers[0].selector, "[role=\"dialog\"]");
    }

    #[test]
    fn test_screen_conditions() {
        let def = dispatch_all(
            BlockKind::Class,
            &["screen(md, w[100%])", "screen(lg, w[50%])", "container(min[400px] and max[800px], d[grid])"],
        )
        .unwrap();

        assert_eq!(def.screens[0].condition, "(min-width:768px)");
        assert_eq!(def.screens[0].label, "screen-md");
        assert_eq!(def.screens[1].condition, "(min-width:1024px)");
        assert_eq!(def.containers[0].condition, "(min-width:400px) and (max-width:800px)");
        assert_eq!(def.containers[0].properties["display"], "grid");

        let err = dispatch_all(BlockKind::Class, &["screen(xl, w[1px])"]).unwrap_err();
        assert!(err.to_string().contains("Unknown breakpoint 'xl'"));
    }

    #[test]
    fn test_vendor_function_falls_back_to_flat() {
        let def = dispatch_all(BlockKind::Class, &["w[calc(100% - 4px)]", "tf[rotate(3deg)]"]).unwrap();
        assert_eq!(def.base["width"], "calc(100% - 4px)");
        assert_eq!(def.base["transform"], "rotate(3deg)");
    }

    #[test]
    fn test_runtime_variables() {
        let def = dispatch_all(BlockKind::Class, &["$bg[red]", "hover($bg[blue])"]).unwrap();
        assert!(def.has_runtime_var);
        assert_eq!(def.var_base["bg"], "red");
        assert_eq!(def.var_states["hover"]["bg"], "blue");
        assert_eq!(def.base["background-color"], Placeholder::runtime("bg"));

        for kind in [BlockKind::Const, BlockKind::Nested, BlockKind::ThemeFragment] {
            assert!(dispatch_all(kind, &["$bg[red]"]).is_err());
        }
        assert!(dispatch_all(BlockKind::Class, &["menu-container($bg[red])"]).is_err());
        assert!(dispatch_all(BlockKind::Class, &["$bg[red]", "$bg[blue]"]).is_err());
    }

    #[test]
    fn test_local_variables() {
        let def = dispatch_all(BlockKind::Class, &["--&pad[8px]", "p[--&pad]"]).unwrap();
        assert_eq!(def.local_vars["pad"], "8px");
        assert!(def.used_local_vars.contains("pad"));
        assert_eq!(def.base["padding"], Placeholder::local("pad"));

        let err = dispatch_all(BlockKind::Class, &["--&pad[8px]", "--&pad[4px]"]).unwrap_err();
        assert!(err.to_string().contains("already declared"));

        assert!(dispatch_all(BlockKind::Const, &["--&pad[8px]"]).is_err());
        assert!(dispatch_all(BlockKind::Nested, &["--&pad[8px]"]).is_err());
        assert!(dispatch_all(BlockKind::Class, &["hover(--&pad[8px])"]).is_err());
        assert!(dispatch_all(BlockKind::Class, &["--&pad[8px]!"]).is_err());
        assert!(dispatch_all(BlockKind::Keyframe, &["p[--&pad]"]).is_err());

        let def = dispatch_all(BlockKind::Nested, &["m[--&pad]"]).unwrap();
        assert!(def.used_local_vars.contains("pad"));
    }

    #[test]
    fn test_custom_property_passthrough() {
        let def = dispatch_all(BlockKind::Const, &["--brand[#f00]"]).unwrap();
        assert_eq!(def.base["--brand"], "#f00");
    }

    #[test]
    fn test_typography_and_defines() {
        let def = dispatch_all(BlockKind::Class, &["ty[body]", "btn[primary]"]).unwrap();
        assert_eq!(def.base["font-size"], "16px");
        assert_eq!(def.base["line-height"], "1.5");
        assert_eq!(def.base["background-color"], "blue");

        let def = dispatch_all(BlockKind::Class, &["hover(ty[body]!)"]).unwrap();
        assert_eq!(def.states["hover"].properties["font-size"], "16px !important");

        assert!(dispatch_all(BlockKind::Class, &["ty[missing]"]).is_err());
        let err = dispatch_all(BlockKind::Class, &["btn[ghost]"]).unwrap_err();
        assert!(err.to_string().contains("Unknown variant 'ghost'"));
    }

    #[test]
    fn test_keyframe_restrictions() {
        assert!(dispatch_all(BlockKind::Keyframe, &["op[0]", "$op[1]"]).is_ok());
        let err = dispatch_all(BlockKind::Keyframe, &["hover(op[1])"]).unwrap_err();
        assert!(err.to_string().contains("not allowed in a keyframe step"));
    }

    #[test]
    fn test_nested_blocks_are_rejected() {
        let err = dispatch_all(BlockKind::Class, &["hover(focus(c[red]))"]).unwrap_err();
        assert!(err.to_string().contains("Nested block"));
    }

    #[test]
    fn test_keyframe_names_in_animation_values() {
        let theme = theme();
        let mut names = ShortNameTable::new();
        names.insert("fade".into(), "app_fade".into());
        let dispatcher = Dispatcher::new(&theme, BlockKind::Class).with_keyframes(&names);
        let mut def = StyleDefinition::new();
        dispatcher.dispatch("an[fade 1s ease, spin 2s]", &mut def).unwrap();
        dispatcher.dispatch("tr[fade 1s]", &mut def).unwrap();
        assert_eq!(def.base["animation"], "app_fade 1s ease, shared_spin 2s");
        assert_eq!(def.base["transition"], "fade 1s");
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("md"), "md");
        assert_eq!(sanitize_label("min[400px] and max[50.5em]"), "min-400px-and-max-50_5em");
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(dispatch_all(BlockKind::Class, &["bg"]).is_err());
        assert!(dispatch_all(BlockKind::Class, &["bg[]"]).is_err());
        assert!(dispatch_all(BlockKind::Class, &["hover(c[red]) x"]).is_err());
        assert!(dispatch_all(BlockKind::Class, &["@use a"]).is_err());
    }
}
