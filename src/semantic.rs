//! Semantic analysis: compiles const fragments and class bodies into
//! [`StyleDefinition`]s and validates local-variable usage

use crate::dispatcher::{BlockKind, Dispatcher};
use crate::error::{CompilerError, Result};
use crate::nested::{apply_uses, split_body, NestedQueryResolver};
use crate::scanner::split_statements;
use crate::theme::Theme;
use crate::types::{ClassBlock, ConstBlock, ConstFragment, NestedQueryNode, ShortNameTable, StyleDefinition};
use indexmap::{IndexMap, IndexSet};

pub struct SemanticAnalyzer<'a> {
    theme: &'a Theme,
    file: &'a str,
    keyframe_names: &'a ShortNameTable,
    consts: IndexMap<String, ConstFragment>,
    warnings: Vec<String>,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(theme: &'a Theme, file: &'a str, keyframe_names: &'a ShortNameTable) -> Self {
        Self {
            theme,
            file,
            keyframe_names,
            consts: IndexMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Suspicious-but-legal findings collected so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Compile const fragments in source order. A const may `@use` consts
    /// declared before it.
    pub fn compile_consts(&mut self, blocks: &[ConstBlock]) -> Result<()> {
        for block in blocks {
            if self.consts.contains_key(&block.name) {
                return Err(CompilerError::parse(
                    self.file,
                    block.line,
                    format!("Duplicate const '{}'", block.name),
                ));
            }

            let style = self
                .compile_const(block)
                .map_err(|e| e.located(self.file, block.line))?;
            self.consts.insert(block.name.clone(), ConstFragment { style });
        }
        Ok(())
    }

    fn compile_const(&self, block: &ConstBlock) -> Result<StyleDefinition> {
        let mut style = StyleDefinition::new();
        let mut statements = Vec::new();

        // Inclusions first so the const's own statements win
        for line in &block.lines {
            if line.starts_with("@query") {
                return Err(CompilerError::semantic_legacy(
                    0,
                    format!("'@query' is not allowed in const '{}'", block.name),
                ));
            }
            match line.strip_prefix("@use") {
                Some(names) if names.is_empty() || names.starts_with(char::is_whitespace) => {
                    let names: Vec<&str> = names.split_whitespace().collect();
                    if names.is_empty() {
                        return Err(CompilerError::parse_legacy(0, "'@use' requires at least one const name"));
                    }
                    for name in names {
                        let fragment = self.consts.get(name).ok_or_else(|| {
                            CompilerError::semantic_legacy(
                                0,
                                format!("Unknown const '{}' used in const '{}'", name, block.name),
                            )
                        })?;
                        style.merge_fragment(&fragment.style);
                    }
                }
                _ => statements.extend(split_statements(line)?),
            }
        }

        let dispatcher = Dispatcher::new(self.theme, BlockKind::Const).with_keyframes(self.keyframe_names);
        for statement in &statements {
            dispatcher.dispatch(statement, &mut style)?;
        }
        Ok(style)
    }

    /// Compile one class body: inclusions, own statements, then the nested
    /// query tree. Pending runtime variables are left for the transformer.
    pub fn compile_class(&mut self, block: &ClassBlock) -> Result<StyleDefinition> {
        let parts = split_body(&block.body, block.body_line).map_err(|e| e.located(self.file, block.line))?;

        let mut style = StyleDefinition::new();
        apply_uses(&parts.uses, &self.consts, &mut style, self.file)?;

        let dispatcher = Dispatcher::new(self.theme, BlockKind::Class).with_keyframes(self.keyframe_names);
        for statement in &parts.statements {
            dispatcher
                .dispatch(&statement.text, &mut style)
                .map_err(|e| e.located(self.file, statement.line))?;
        }

        let resolver = NestedQueryResolver::new(self.theme, self.keyframe_names, &self.consts, self.file);
        style.nested_queries = resolver.resolve(parts.queries)?;

        self.check_local_variables(block, &style)?;
        Ok(style)
    }

    /// Every local variable referenced anywhere in the class, its consts or
    /// its nested queries must be declared at the class top level.
    fn check_local_variables(&mut self, block: &ClassBlock, style: &StyleDefinition) -> Result<()> {
        let used = collect_used_locals(style);

        for name in &used {
            if !style.local_vars.contains_key(name) {
                return Err(CompilerError::semantic(
                    self.file,
                    block.line,
                    format!(
                        "Local variable '--&{}' is used but not declared in '.{}'",
                        name, block.name
                    ),
                ));
            }
        }

        for name in style.local_vars.keys() {
            if !used.contains(name) {
                let warning = format!(
                    "{}:{}: local variable '--&{}' is declared but never used in '.{}'",
                    self.file, block.line, name, block.name
                );
                log::warn!("{}", warning);
                self.warnings.push(warning);
            }
        }
        Ok(())
    }
}

fn collect_used_locals(style: &StyleDefinition) -> IndexSet<String> {
    let mut used: IndexSet<String> = style.used_local_vars.iter().cloned().collect();
    let mut stack: Vec<&NestedQueryNode> = style.nested_queries.iter().collect();
    while let Some(node) = stack.pop() {
        used.extend(node.style.used_local_vars.iter().cloned());
        stack.extend(node.children());
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::BlockExtractor;
    use crate::types::Placeholder;

    fn analyze(source: &str) -> Result<(Vec<StyleDefinition>, Vec<String>)> {
        let theme = Theme::empty();
        let names = ShortNameTable::new();
        let file = BlockExtractor::new("test.scs").extract(source)?;
        let mut analyzer = SemanticAnalyzer::new(&theme, "test.scs", &names);
        analyzer.compile_consts(&file.consts)?;
        let mut styles = Vec::new();
        for class in &file.classes {
            styles.push(analyzer.compile_class(class)?);
        }
        Ok((styles, analyzer.warnings().to_vec()))
    }

    #[test]
    fn test_uses_merge_before_own_statements() {
        let (styles, _) = analyze("@const base {\n  c[red] p[1px]\n}\n.box {\n  p[2px]\n  @use base\n}").unwrap();
        assert_eq!(styles[0].base["color"], "red");
        assert_eq!(styles[0].base["padding"], "2px");
    }

    #[test]
    fn test_const_uses_earlier_const() {
        let source = "@const a {\n  c[red]\n}\n@const b {\n  @use a\n  fw[700]\n}\n.box {\n  @use b\n}";
        let (styles, _) = analyze(source).unwrap();
        assert_eq!(styles[0].base["color"], "red");
        assert_eq!(styles[0].base["font-weight"], "700");

        assert!(analyze("@const b {\n  @use a\n}\n@const a {\n  c[red]\n}").is_err());
    }

    #[test]
    fn test_const_restrictions() {
        assert!(analyze("@const a {\n  $bg[red]\n}").is_err());
        assert!(analyze("@const a {\n  c[red]\n}\n@const a {\n  c[blue]\n}").is_err());
        let err = analyze(".box {\n  @use ghost\n}").unwrap_err();
        assert!(err.to_string().contains("Unknown const 'ghost'"));
    }

    #[test]
    fn test_local_variables_across_nesting_and_consts() {
        let source = "@const spaced {\n  m[--&gap]\n}\n.card {\n  --&gap[4px]\n  --&pad[8px]\n  @use spaced\n  @query .inner {\n    p[--&pad]\n  }\n}";
        let (styles, warnings) = analyze(source).unwrap();
        assert_eq!(styles[0].base["margin"], Placeholder::local("gap"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_undeclared_local_variable() {
        let err = analyze(".card {\n  @query .inner {\n    p[--&pad]\n  }\n}").unwrap_err();
        assert!(err
            .to_string()
            .contains("Local variable '--&pad' is used but not declared in '.card'"));

        assert!(analyze("@const c {\n  p[--&pad]\n}\n.card {\n  @use c\n}").is_err());
    }

    #[test]
    fn test_unused_local_variable_warns() {
        let (_, warnings) = analyze(".card {\n  --&pad[8px]\n  c[red]\n}").unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("never used"));
    }

    #[test]
    fn test_error_lines() {
        let err = analyze("\n.box {\n  c[red]\n\n  xyz[1px]\n}").unwrap_err();
        assert!(err.to_string().contains("test.scs at line 5"));
        assert!(err.to_string().contains("Unknown abbreviation 'xyz'"));
    }
}
