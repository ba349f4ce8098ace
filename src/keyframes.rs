//! Keyframe compilation
//!
//! `@keyframe fade { from(op[0]) 50%( op[0.5] ) to(op[1]) }` is merged into
//! logical statements, each step body is dispatched with keyframe
//! restrictions and any runtime variables are named after the keyframe.

use crate::dispatcher::{BlockKind, Dispatcher};
use crate::error::{CompilerError, Result};
use crate::scanner::{merge_logical_lines, split_statements};
use crate::theme::Theme;
use crate::transformer::VariableTransformer;
use crate::types::{KeyframeBlock, KeyframeDefinition, KeyframeStep, Scope, ShortNameTable, StyleDefinition};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

static STEP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(from|to|\d+(?:\.\d+)?%)\s*\((.*)\)$").expect("valid keyframe step regex")
});

/// Final names for every keyframe of a file, computed before any class so
/// references work in both directions.
pub fn final_names(blocks: &[KeyframeBlock], scope: &Scope, file: &str) -> Result<ShortNameTable> {
    let mut names = ShortNameTable::new();
    for block in blocks {
        if names.contains_key(&block.name) {
            return Err(CompilerError::parse(
                file,
                block.line,
                format!("Duplicate keyframe '{}'", block.name),
            ));
        }
        names.insert(block.name.clone(), scope.final_name(&block.name));
    }
    Ok(names)
}

pub struct KeyframeCompiler<'a> {
    dispatcher: Dispatcher<'a>,
    names: &'a ShortNameTable,
    file: &'a str,
}

impl<'a> KeyframeCompiler<'a> {
    pub fn new(theme: &'a Theme, names: &'a ShortNameTable, file: &'a str) -> Self {
        Self {
            dispatcher: Dispatcher::new(theme, BlockKind::Keyframe).with_keyframes(names),
            names,
            file,
        }
    }

    /// Runtime variables of every step are declared through `transformer`,
    /// the same one the file's classes use.
    pub fn compile(&self, block: &KeyframeBlock, transformer: &mut VariableTransformer) -> Result<KeyframeDefinition> {
        let final_name = self
            .names
            .get(&block.name)
            .cloned()
            .ok_or_else(|| CompilerError::semantic(self.file, block.line, format!("Unknown keyframe '{}'", block.name)))?;

        let mut definition = KeyframeDefinition {
            name: block.name.clone(),
            final_name: final_name.clone(),
            ..Default::default()
        };
        let mut labels = IndexSet::new();

        let lines = merge_logical_lines(&block.body, block.body_line).map_err(|e| e.located(self.file, block.line))?;
        for logical in lines {
            let statements = split_statements(&logical.text)
                .map_err(|e| CompilerError::parse(self.file, logical.line, e.message()))?;

            for statement in statements {
                let (label, body) = self.parse_step(&statement, logical.line)?;
                if !labels.insert(label.clone()) {
                    return Err(CompilerError::parse(
                        self.file,
                        logical.line,
                        format!("Duplicate step '{}' in keyframe '{}'", label, block.name),
                    ));
                }

                let mut style = StyleDefinition::new();
                for token in split_statements(&body).map_err(|e| e.located(self.file, logical.line))? {
                    if token.starts_with('@') {
                        return Err(CompilerError::semantic(
                            self.file,
                            logical.line,
                            format!("Directives are not allowed in keyframe step '{}'", label),
                        ));
                    }
                    self.dispatcher
                        .dispatch(&token, &mut style)
                        .map_err(|e| e.located(self.file, logical.line))?;
                }

                let mut properties = style.base;
                transformer.transform_keyframe_step(
                    &mut properties,
                    style.var_base,
                    &final_name,
                    &label,
                    &mut definition.root_vars,
                    logical.line,
                )?;
                definition.steps.push(KeyframeStep { label, properties });
            }
        }

        log::debug!("Compiled keyframe '{}' with {} steps", final_name, definition.steps.len());
        Ok(definition)
    }

    fn parse_step(&self, statement: &str, line: usize) -> Result<(String, String)> {
        if statement.starts_with('@') {
            return Err(CompilerError::semantic(
                self.file,
                line,
                format!("Directives are not allowed in keyframes: '{}'", statement),
            ));
        }
        let captures = STEP_REGEX.captures(statement).ok_or_else(|| {
            CompilerError::parse(
                self.file,
                line,
                format!("Invalid keyframe step '{}': expected from(...), to(...) or <n>%(...)", statement),
            )
        })?;
        Ok((captures[1].to_string(), captures[2].to_string()))
    }
}
