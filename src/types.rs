//! Core data model shared by every compiler phase

use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// Ordered property name -> value map. Re-setting a property keeps its
/// original position and replaces the value.
pub type PropertyMap = IndexMap<String, String>;

/// Pending runtime variables of one bucket: raw abbreviation -> default value.
pub type PendingVars = IndexMap<String, String>;

pub const SCOPE_NONE: &str = "none";

// Placeholders use a control character as delimiter so they can never collide
// with text written by hand in a value.
const PLACEHOLDER_DELIMITER: char = '\u{1}';
const RUNTIME_TAG: &str = "rt:";
const LOCAL_TAG: &str = "lv:";
const SCOPE_REF_TAG: &str = "scope:";

/// Per-file namespace used to qualify generated names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    None,
    Named(String),
}

impl Scope {
    pub fn from_value(value: &str) -> Self {
        if value == SCOPE_NONE {
            Scope::None
        } else {
            Scope::Named(value.to_string())
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Scope::None)
    }

    /// Scope-qualified display name for a class or keyframe.
    pub fn final_name(&self, name: &str) -> String {
        match self {
            Scope::None => name.to_string(),
            Scope::Named(scope) => format!("{}_{}", scope, name),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::None => write!(f, "{}", SCOPE_NONE),
            Scope::Named(scope) => write!(f, "{}", scope),
        }
    }
}

/// `finalName(scope, name)`: `none` keeps the name, anything else prefixes it.
pub fn final_name(scope: &str, name: &str) -> String {
    Scope::from_value(scope).final_name(name)
}

/// Builders and scanners for the internal placeholders left in values
/// between dispatch and emission.
pub struct Placeholder;

impl Placeholder {
    pub fn runtime(abbr: &str) -> String {
        Self::wrap(RUNTIME_TAG, abbr)
    }

    pub fn local(name: &str) -> String {
        Self::wrap(LOCAL_TAG, name)
    }

    pub fn scope_ref(name: &str) -> String {
        Self::wrap(SCOPE_REF_TAG, name)
    }

    fn wrap(tag: &str, name: &str) -> String {
        format!("{d}{tag}{name}{d}", d = PLACEHOLDER_DELIMITER, tag = tag, name = name)
    }

    pub fn contains_any(value: &str) -> bool {
        value.contains(PLACEHOLDER_DELIMITER)
    }

    /// Replace every local-variable placeholder using `resolve(name)`.
    pub fn replace_local<F>(value: &str, resolve: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        Self::replace_tagged(value, LOCAL_TAG, resolve)
    }

    /// Replace every scope-reference placeholder using `resolve(name)`.
    pub fn replace_scope_refs<F>(value: &str, mut resolve: F) -> Result<String, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut missing = None;
        let replaced = Self::replace_tagged(value, SCOPE_REF_TAG, |name| match resolve(name) {
            Some(real) => real,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        });
        match missing {
            Some(name) => Err(name),
            None => Ok(replaced),
        }
    }

    fn replace_tagged<F>(value: &str, tag: &str, mut resolve: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let open = format!("{}{}", PLACEHOLDER_DELIMITER, tag);
        let mut result = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find(&open) {
            result.push_str(&rest[..start]);
            let after = &rest[start + open.len()..];
            match after.find(PLACEHOLDER_DELIMITER) {
                Some(end) => {
                    result.push_str(&resolve(&after[..end]));
                    rest = &after[end + PLACEHOLDER_DELIMITER.len_utf8()..];
                }
                None => {
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }
}

/// One pseudo-class or plugin-state block of a definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateBlock {
    /// Selector suffix appended to the owner, e.g. `:hover` or `[open]`.
    pub selector: String,
    pub properties: PropertyMap,
}

/// A `screen(...)` or `container(...)` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionalBlock {
    /// Stable identifier used for variable naming, e.g. `screen-md`.
    pub label: String,
    /// Condition text, e.g. `(min-width:768px)`.
    pub condition: String,
    pub properties: PropertyMap,
}

/// A plugin virtual-container entry, styled under an ancestor selector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginContainerBlock {
    pub name: String,
    pub selector: String,
    pub properties: PropertyMap,
}

/// The compiled result of one selector context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleDefinition {
    pub base: PropertyMap,
    pub states: IndexMap<String, StateBlock>,
    pub screens: Vec<ConditionalBlock>,
    pub containers: Vec<ConditionalBlock>,
    pub pseudos: IndexMap<String, PropertyMap>,
    pub plugin_containers: Vec<PluginContainerBlock>,
    pub nested_queries: Vec<NestedQueryNode>,

    /// Generated custom property -> default value, filled by the transformer.
    pub root_vars: IndexMap<String, String>,
    /// Declared local variable -> raw value.
    pub local_vars: IndexMap<String, String>,
    /// Local variables referenced anywhere in this definition.
    pub used_local_vars: IndexSet<String>,
    pub has_runtime_var: bool,

    // Pending runtime variables, drained by the transformer
    pub var_base: PendingVars,
    pub var_states: IndexMap<String, PendingVars>,
    pub var_pseudos: IndexMap<String, PendingVars>,
    pub var_containers: IndexMap<String, PendingVars>,
}

impl StyleDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending_vars(&self) -> bool {
        !self.var_base.is_empty()
            || self.var_states.values().any(|b| !b.is_empty())
            || self.var_pseudos.values().any(|b| !b.is_empty())
            || self.var_containers.values().any(|b| !b.is_empty())
    }

    pub fn state_mut(&mut self, name: &str, selector: &str) -> &mut PropertyMap {
        &mut self
            .states
            .entry(name.to_string())
            .or_insert_with(|| StateBlock {
                selector: selector.to_string(),
                properties: PropertyMap::new(),
            })
            .properties
    }

    pub fn pseudo_mut(&mut self, name: &str) -> &mut PropertyMap {
        self.pseudos.entry(name.to_string()).or_default()
    }

    pub fn screen_mut(&mut self, label: &str, condition: &str) -> &mut PropertyMap {
        conditional_entry(&mut self.screens, label, condition)
    }

    pub fn container_mut(&mut self, label: &str, condition: &str) -> &mut PropertyMap {
        conditional_entry(&mut self.containers, label, condition)
    }

    pub fn plugin_container_mut(&mut self, name: &str, selector: &str) -> &mut PropertyMap {
        let index = match self.plugin_containers.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.plugin_containers.push(PluginContainerBlock {
                    name: name.to_string(),
                    selector: selector.to_string(),
                    properties: PropertyMap::new(),
                });
                self.plugin_containers.len() - 1
            }
        };
        &mut self.plugin_containers[index].properties
    }

    /// Merge a const fragment in. Later values override earlier ones.
    pub fn merge_fragment(&mut self, fragment: &StyleDefinition) {
        merge_properties(&mut self.base, &fragment.base);
        for (name, state) in &fragment.states {
            let target = self.state_mut(name, &state.selector);
            merge_properties(target, &state.properties);
        }
        for screen in &fragment.screens {
            let target = self.screen_mut(&screen.label, &screen.condition);
            merge_properties(target, &screen.properties);
        }
        for container in &fragment.containers {
            let target = self.container_mut(&container.label, &container.condition);
            merge_properties(target, &container.properties);
        }
        for (name, properties) in &fragment.pseudos {
            merge_properties(self.pseudo_mut(name), properties);
        }
        for container in &fragment.plugin_containers {
            let target = self.plugin_container_mut(&container.name, &container.selector);
            merge_properties(target, &container.properties);
        }
        for name in &fragment.used_local_vars {
            self.used_local_vars.insert(name.clone());
        }
    }
}

fn conditional_entry<'a>(
    entries: &'a mut Vec<ConditionalBlock>,
    label: &str,
    condition: &str,
) -> &'a mut PropertyMap {
    let index = match entries.iter().position(|e| e.condition == condition) {
        Some(index) => index,
        None => {
            entries.push(ConditionalBlock {
                label: label.to_string(),
                condition: condition.to_string(),
                properties: PropertyMap::new(),
            });
            entries.len() - 1
        }
    };
    &mut entries[index].properties
}

pub fn merge_properties(target: &mut PropertyMap, source: &PropertyMap) {
    for (property, value) in source {
        target.insert(property.clone(), value.clone());
    }
}

/// Raw `.name { body }` pair produced by the block extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBlock {
    pub name: String,
    pub body: String,
    pub line: usize,
    /// Line on which `body` starts (the line of the opening brace).
    pub body_line: usize,
}

/// Raw `@const name { body }` pair, body already merged into logical lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstBlock {
    pub name: String,
    pub lines: Vec<String>,
    pub line: usize,
}

/// Raw `@keyframe name { body }` pair, body kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeBlock {
    pub name: String,
    pub body: String,
    pub line: usize,
    pub body_line: usize,
}

/// A top-level `@name value` line.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub value: String,
    pub line: usize,
}

/// Named, reusable subset of declarations includable with `@use`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstFragment {
    pub style: StyleDefinition,
}

/// A `@query <selector> { ... }` node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedQueryNode {
    /// Selector relative to the parent; may contain `&` or scope placeholders.
    pub selector: String,
    pub style: StyleDefinition,
    pub line: usize,
}

impl NestedQueryNode {
    pub fn children(&self) -> &[NestedQueryNode] {
        &self.style.nested_queries
    }
}

/// One labelled step of an animation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeStep {
    pub label: String,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeDefinition {
    pub name: String,
    pub final_name: String,
    pub steps: Vec<KeyframeStep>,
    pub root_vars: IndexMap<String, String>,
}

/// A fully dispatched and transformed top-level class.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledClass {
    pub name: String,
    pub display_name: String,
    pub style: StyleDefinition,
    pub line: usize,
}

/// Per-file raw class name -> final class name table.
pub type ShortNameTable = IndexMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_name() {
        assert_eq!(final_name("none", "box"), "box");
        assert_eq!(final_name("app", "box"), "app_box");
        assert_eq!(Scope::from_value("app").final_name("box"), "app_box");
        assert!(Scope::from_value("none").is_none());
    }

    #[test]
    fn test_placeholder_replacement() {
        let value = format!("calc({} * 2) {}", Placeholder::local("pad"), Placeholder::local("gap"));
        let replaced = Placeholder::replace_local(&value, |name| format!("var(--{}-card)", name));
        assert_eq!(replaced, "calc(var(--pad-card) * 2) var(--gap-card)");
        assert!(!Placeholder::contains_any(&replaced));
    }

    #[test]
    fn test_scope_ref_reports_missing_name() {
        let selector = format!("{} .x", Placeholder::scope_ref("ghost"));
        let result = Placeholder::replace_scope_refs(&selector, |_| None);
        assert_eq!(result, Err("ghost".to_string()));
    }

    #[test]
    fn test_conditional_entries_merge_by_condition() {
        let mut def = StyleDefinition::new();
        def.screen_mut("screen-md", "(min-width:768px)")
            .insert("width".into(), "100%".into());
        def.screen_mut("screen-md", "(min-width:768px)")
            .insert("height".into(), "auto".into());
        assert_eq!(def.screens.len(), 1);
        assert_eq!(def.screens[0].properties.len(), 2);
    }

    #[test]
    fn test_merge_fragment_overrides_and_keeps_order() {
        let mut fragment = StyleDefinition::new();
        fragment.base.insert("color".into(), "red".into());
        fragment.base.insert("padding".into(), "4px".into());
        fragment.state_mut("hover", ":hover").insert("color".into(), "blue".into());

        let mut def = StyleDefinition::new();
        def.base.insert("padding".into(), "1px".into());
        def.merge_fragment(&fragment);

        let keys: Vec<_> = def.base.keys().cloned().collect();
        assert_eq!(keys, vec!["padding", "color"]);
        assert_eq!(def.base["padding"], "4px");
        assert_eq!(def.states["hover"].selector, ":hover");
    }
}
