//! CSS text generation

use crate::error::{CompilerError, Result};
use crate::scanner::split_top_level;
use crate::types::{CompiledClass, KeyframeDefinition, NestedQueryNode, Placeholder, PropertyMap, ShortNameTable, StyleDefinition};
use indexmap::IndexMap;

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    /// `selector{prop:value;}`, one rule per line
    #[default]
    Compact,
    /// One declaration per line, two-space indentation
    Pretty,
}

type Declarations = Vec<(String, String)>;

pub struct CodeGenerator<'a> {
    style: OutputStyle,
    short_names: &'a ShortNameTable,
    file: &'a str,
    output: String,
    rule_count: usize,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(style: OutputStyle, short_names: &'a ShortNameTable, file: &'a str) -> Self {
        Self {
            style,
            short_names,
            file,
            output: String::new(),
            rule_count: 0,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn write_comment(&mut self, text: &str) {
        self.output.push_str("/* ");
        self.output.push_str(&text.replace("*/", "* /"));
        self.output.push_str(" */\n");
    }

    pub fn generate_keyframe(&mut self, keyframe: &KeyframeDefinition) {
        self.push_rule(":root", plain_declarations(&keyframe.root_vars));

        let steps: Vec<(String, Declarations)> = keyframe
            .steps
            .iter()
            .map(|step| (step.label.clone(), plain_declarations(&step.properties)))
            .collect();
        self.push_at_rule(&format!("@keyframes {}", keyframe.final_name), steps);
    }

    /// Emit a class and its nested query tree, depth-first in source order.
    pub fn generate_class(&mut self, class: &CompiledClass) -> Result<()> {
        let display = class.display_name.as_str();
        if class.style.has_pending_vars() {
            return Err(CompilerError::semantic(
                self.file,
                class.line,
                format!("Runtime variables of '.{}' were never scoped to custom properties", display),
            ));
        }
        let selectors = vec![format!(".{}", display)];

        self.push_rule(":root", plain_declarations(&class.style.root_vars));
        self.emit_definition(&selectors, &class.style, display, true, class.line)?;

        let mut stack: Vec<(Vec<String>, &NestedQueryNode)> = class
            .style
            .nested_queries
            .iter()
            .rev()
            .map(|node| (selectors.clone(), node))
            .collect();

        while let Some((parents, node)) = stack.pop() {
            let resolved = self.resolve_nested_selector(&parents, node)?;
            self.emit_definition(&resolved, &node.style, display, false, node.line)?;
            for child in node.children().iter().rev() {
                stack.push((resolved.clone(), child));
            }
        }
        Ok(())
    }

    pub fn finish(self) -> String {
        self.output
    }

    fn emit_definition(
        &mut self,
        selectors: &[String],
        def: &StyleDefinition,
        display: &str,
        top_level: bool,
        line: usize,
    ) -> Result<()> {
        let selector_list = selectors.join(",");

        let mut base = Declarations::new();
        if top_level {
            for (name, value) in &def.local_vars {
                base.push((format!("--{}-{}", name, display), self.resolve_value(name, value, display, line)?));
            }
        }
        base.extend(self.resolve_declarations(&def.base, display, line)?);
        self.push_rule(&selector_list, base);

        for state in def.states.values() {
            let selector = suffixed(selectors, &state.selector);
            let declarations = self.resolve_declarations(&state.properties, display, line)?;
            self.push_rule(&selector, declarations);
        }

        for screen in &def.screens {
            let declarations = self.resolve_declarations(&screen.properties, display, line)?;
            self.push_at_rule(
                &format!("@media only screen and {}", screen.condition),
                vec![(selector_list.clone(), declarations)],
            );
        }

        for container in &def.containers {
            let declarations = self.resolve_declarations(&container.properties, display, line)?;
            self.push_at_rule(
                &format!("@container {}", container.condition),
                vec![(selector_list.clone(), declarations)],
            );
        }

        for plugin in &def.plugin_containers {
            let selector = selectors
                .iter()
                .map(|s| format!("{} {}", plugin.selector, s))
                .collect::<Vec<_>>()
                .join(",");
            let declarations = self.resolve_declarations(&plugin.properties, display, line)?;
            self.push_rule(&selector, declarations);
        }

        for (name, properties) in &def.pseudos {
            let selector = suffixed(selectors, &format!("::{}", name));
            let declarations = self.resolve_declarations(properties, display, line)?;
            self.push_rule(&selector, declarations);
        }
        Ok(())
    }

    /// Combine a node selector with every parent selector: `&` is replaced
    /// by the parent, otherwise the two are joined as descendants.
    fn resolve_nested_selector(&self, parents: &[String], node: &NestedQueryNode) -> Result<Vec<String>> {
        let selector = Placeholder::replace_scope_refs(&node.selector, |name| {
            self.short_names.get(name).map(|final_name| format!(".{}", final_name))
        })
        .map_err(|name| {
            CompilerError::semantic(
                self.file,
                node.line,
                format!("Unresolved scope reference '@scope.{}'", name),
            )
        })?;

        let parts = split_top_level(&selector, ',').map_err(|e| e.located(self.file, node.line))?;
        let mut resolved = Vec::new();
        for parent in parents {
            for part in &parts {
                let part = part.trim();
                if part.is_empty() {
                    return Err(CompilerError::semantic(
                        self.file,
                        node.line,
                        format!("Empty selector in '@query {}'", node.selector),
                    ));
                }
                if part.contains('&') {
                    resolved.push(part.replace('&', parent));
                } else {
                    resolved.push(format!("{} {}", parent, part));
                }
            }
        }
        Ok(resolved)
    }

    fn resolve_declarations(&self, properties: &PropertyMap, display: &str, line: usize) -> Result<Declarations> {
        properties
            .iter()
            .map(|(property, value)| Ok((property.clone(), self.resolve_value(property, value, display, line)?)))
            .collect()
    }

    /// Local-variable placeholders always resolve against the top-level
    /// class, however deep the query.
    fn resolve_value(&self, property: &str, value: &str, display: &str, line: usize) -> Result<String> {
        let resolved = Placeholder::replace_local(value, |name| format!("var(--{}-{})", name, display));
        if Placeholder::contains_any(&resolved) {
            return Err(CompilerError::semantic(
                self.file,
                line,
                format!("Unresolved variable reference in '{}' of '.{}'", property, display),
            ));
        }
        Ok(resolved)
    }

    fn push_rule(&mut self, selector: &str, declarations: Declarations) {
        if declarations.is_empty() {
            return;
        }
        let rule = self.format_rule(selector, &declarations, 0);
        self.output.push_str(&rule);
        if self.style == OutputStyle::Compact {
            self.output.push('\n');
        }
        self.rule_count += 1;
    }

    fn push_at_rule(&mut self, prelude: &str, rules: Vec<(String, Declarations)>) {
        let rules: Vec<_> = rules.into_iter().filter(|(_, d)| !d.is_empty()).collect();
        if rules.is_empty() {
            return;
        }

        match self.style {
            OutputStyle::Compact => {
                self.output.push_str(prelude);
                self.output.push('{');
                for (selector, declarations) in &rules {
                    let rule = self.format_rule(selector, declarations, 0);
                    self.output.push_str(&rule);
                }
                self.output.push_str("}\n");
            }
            OutputStyle::Pretty => {
                self.output.push_str(prelude);
                self.output.push_str(" {\n");
                for (selector, declarations) in &rules {
                    let rule = self.format_rule(selector, declarations, 1);
                    self.output.push_str(&rule);
                }
                self.output.push_str("}\n");
            }
        }
        self.rule_count += 1;
    }

    fn format_rule(&self, selector: &str, declarations: &[(String, String)], depth: usize) -> String {
        let mut rule = String::new();
        match self.style {
            OutputStyle::Compact => {
                rule.push_str(selector);
                rule.push('{');
                for (property, value) in declarations {
                    rule.push_str(property);
                    rule.push(':');
                    rule.push_str(value);
                    rule.push(';');
                }
                rule.push('}');
            }
            OutputStyle::Pretty => {
                let pad = INDENT.repeat(depth);
                rule.push_str(&pad);
                rule.push_str(selector);
                rule.push_str(" {\n");
                for (property, value) in declarations {
                    rule.push_str(&pad);
                    rule.push_str(INDENT);
                    rule.push_str(property);
                    rule.push_str(": ");
                    rule.push_str(value);
                    rule.push_str(";\n");
                }
                rule.push_str(&pad);
                rule.push_str("}\n");
            }
        }
        rule
    }
}

fn suffixed(selectors: &[String], suffix: &str) -> String {
    selectors
        .iter()
        .map(|s| format!("{}{}", s, suffix))
        .collect::<Vec<_>>()
        .join(",")
}

fn plain_declarations(map: &IndexMap<String, String>) -> Declarations {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
