//! Variable scoping: turns pending runtime variables into uniquely named
//! custom properties declared on `:root`

use crate::error::{CompilerError, Result};
use crate::types::{PendingVars, Placeholder, PropertyMap, Scope, StyleDefinition};
use indexmap::IndexMap;

/// One transformer is shared by every class and keyframe of a file, so a
/// generated name can only ever be declared once per file.
pub struct VariableTransformer<'a> {
    scope: &'a Scope,
    file: &'a str,
    /// generated custom property -> owner that declared it
    generated: IndexMap<String, String>,
}

impl<'a> VariableTransformer<'a> {
    pub fn new(scope: &'a Scope, file: &'a str) -> Self {
        Self {
            scope,
            file,
            generated: IndexMap::new(),
        }
    }

    /// Drain every pending bucket of `style`, declaring
    /// `--<abbr>-<display>[-<context>]` in `root_vars` and rewriting the
    /// matching placeholders to `var(...)`.
    pub fn transform(&mut self, style: &mut StyleDefinition, display: &str, line: usize) -> Result<()> {
        if !style.has_runtime_var {
            return Ok(());
        }
        let owner = format!(".{}", display);
        self.ensure_scoped(style, &owner, line)?;

        let base = std::mem::take(&mut style.var_base);
        for (abbr, default) in base {
            let name = format!("--{}-{}", abbr, display);
            self.declare(&mut style.root_vars, &name, default, &owner, line)?;
            rewrite(&mut style.base, &abbr, &name);
        }

        let states = std::mem::take(&mut style.var_states);
        for (state, bucket) in states {
            let properties = style
                .states
                .get_mut(&state)
                .map(|block| &mut block.properties)
                .ok_or_else(|| missing_block(self.file, &state, line))?;
            for (abbr, default) in bucket {
                let name = format!("--{}-{}-{}", abbr, display, state);
                rewrite(properties, &abbr, &name);
                self.declare(&mut style.root_vars, &name, default, &owner, line)?;
            }
        }

        let pseudos = std::mem::take(&mut style.var_pseudos);
        for (pseudo, bucket) in pseudos {
            let properties = style
                .pseudos
                .get_mut(&pseudo)
                .ok_or_else(|| missing_block(self.file, &pseudo, line))?;
            for (abbr, default) in bucket {
                let name = format!("--{}-{}-{}", abbr, display, pseudo);
                rewrite(properties, &abbr, &name);
                self.declare(&mut style.root_vars, &name, default, &owner, line)?;
            }
        }

        let containers = std::mem::take(&mut style.var_containers);
        for (label, bucket) in containers {
            let properties = style
                .screens
                .iter_mut()
                .chain(style.containers.iter_mut())
                .find(|entry| entry.label == label)
                .map(|entry| &mut entry.properties)
                .ok_or_else(|| missing_block(self.file, &label, line))?;
            for (abbr, default) in bucket {
                let name = format!("--{}-{}-{}", abbr, display, label);
                rewrite(properties, &abbr, &name);
                self.declare(&mut style.root_vars, &name, default, &owner, line)?;
            }
        }

        log::trace!("Scoped {} runtime variables for .{}", style.root_vars.len(), display);
        Ok(())
    }

    /// Keyframe steps name their variables after the keyframe and the step
    /// label instead of a class.
    pub fn transform_keyframe_step(
        &mut self,
        properties: &mut PropertyMap,
        pending: PendingVars,
        keyframe: &str,
        label: &str,
        root_vars: &mut IndexMap<String, String>,
        line: usize,
    ) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        if self.scope.is_none() {
            let abbr = pending.keys().next().map(String::as_str).unwrap_or_default();
            return Err(self.unscoped_error(&format!("@keyframe {}", keyframe), abbr, line));
        }

        let owner = format!("@keyframe {} {}", keyframe, label);
        let step = label.trim_end_matches('%').replace('.', "_");
        for (abbr, default) in pending {
            let name = format!("--{}-{}-{}", abbr, keyframe, step);
            rewrite(properties, &abbr, &name);
            self.declare(root_vars, &name, default, &owner, line)?;
        }
        Ok(())
    }

    fn ensure_scoped(&self, style: &StyleDefinition, owner: &str, line: usize) -> Result<()> {
        if !self.scope.is_none() {
            return Ok(());
        }
        let first = style
            .var_base
            .keys()
            .chain(style.var_states.values().flat_map(|bucket| bucket.keys()))
            .chain(style.var_pseudos.values().flat_map(|bucket| bucket.keys()))
            .chain(style.var_containers.values().flat_map(|bucket| bucket.keys()))
            .next()
            .map(String::as_str)
            .unwrap_or_default();
        Err(self.unscoped_error(owner, first, line))
    }

    fn unscoped_error(&self, owner: &str, abbr: &str, line: usize) -> CompilerError {
        CompilerError::semantic(
            self.file,
            line,
            format!(
                "Runtime variable '${}' in '{}' is not allowed under scope 'none'; declare '@scope <name>' first",
                abbr, owner
            ),
        )
    }

    fn declare(
        &mut self,
        root_vars: &mut IndexMap<String, String>,
        name: &str,
        default: String,
        owner: &str,
        line: usize,
    ) -> Result<()> {
        if let Some(previous) = self.generated.get(name) {
            return Err(CompilerError::semantic(
                self.file,
                line,
                format!(
                    "Conflicting declarations: custom property '{}' is generated by both '{}' and '{}'",
                    name, previous, owner
                ),
            ));
        }
        self.generated.insert(name.to_string(), owner.to_string());
        root_vars.insert(name.to_string(), default);
        Ok(())
    }
}

fn missing_block(file: &str, name: &str, line: usize) -> CompilerError {
    CompilerError::semantic(
        file,
        line,
        format!("Runtime variable registered for unknown block '{}'", name),
    )
}

fn rewrite(properties: &mut PropertyMap, abbr: &str, name: &str) {
    let placeholder = Placeholder::runtime(abbr);
    let reference = format!("var({})", name);
    for value in properties.values_mut() {
        if value.contains(&placeholder) {
            *value = value.replace(&placeholder, &reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{BlockKind, Dispatcher};
    use crate::theme::Theme;

    fn dispatched(statements: &[&str]) -> StyleDefinition {
        let theme = Theme::empty();
        let dispatcher = Dispatcher::new(&theme, BlockKind::Class);
        let mut style = StyleDefinition::new();
        for statement in statements {
            dispatcher.dispatch(statement, &mut style).unwrap();
        }
        style
    }

    #[test]
    fn test_names_per_context() {
        let mut style = dispatched(&[
            "$bg[red]",
            "hover($bg[blue])",
            "before($c[gray])",
            "screen(min[768px], $p[4px])",
        ]);
        let scope = Scope::from_value("app");
        VariableTransformer::new(&scope, "test.scs")
            .transform(&mut style, "app_box", 1)
            .unwrap();

        assert!(!style.has_pending_vars());
        assert_eq!(style.root_vars["--bg-app_box"], "red");
        assert_eq!(style.root_vars["--bg-app_box-hover"], "blue");
        assert_eq!(style.root_vars["--c-app_box-before"], "gray");
        assert_eq!(style.root_vars["--p-app_box-screen-min-768px"], "4px");

        assert_eq!(style.base["background-color"], "var(--bg-app_box)");
        assert_eq!(style.states["hover"].properties["background-color"], "var(--bg-app_box-hover)");
        assert_eq!(style.pseudos["before"]["color"], "var(--c-app_box-before)");
        assert_eq!(style.screens[0].properties["padding"], "var(--p-app_box-screen-min-768px)");
    }

    #[test]
    fn test_importance_survives_rewrite() {
        let mut style = dispatched(&["$bg[red]!"]);
        let scope = Scope::from_value("app");
        VariableTransformer::new(&scope, "test.scs")
            .transform(&mut style, "app_box", 1)
            .unwrap();
        assert_eq!(style.base["background-color"], "var(--bg-app_box) !important");
    }

    #[test]
    fn test_scope_none_rejects_runtime_variables() {
        let mut style = dispatched(&["hover($bg[blue])"]);
        let err = VariableTransformer::new(&Scope::None, "test.scs")
            .transform(&mut style, "box", 3)
            .unwrap_err();
        assert!(err.to_string().contains("'$bg'"));
        assert!(err.to_string().contains("line 3"));

        let mut plain = dispatched(&["bg[red]"]);
        assert!(VariableTransformer::new(&Scope::None, "test.scs")
            .transform(&mut plain, "box", 1)
            .is_ok());
    }

    #[test]
    fn test_keyframe_step_names() {
        let scope = Scope::from_value("app");
        let mut transformer = VariableTransformer::new(&scope, "test.scs");
        let mut properties = PropertyMap::new();
        properties.insert("opacity".into(), Placeholder::runtime("op"));
        let mut pending = PendingVars::new();
        pending.insert("op".into(), "0.5".into());
        let mut root_vars = IndexMap::new();

        transformer
            .transform_keyframe_step(&mut properties, pending, "app_fade", "12.5%", &mut root_vars, 1)
            .unwrap();
        assert_eq!(root_vars["--op-app_fade-12_5"], "0.5");
        assert_eq!(properties["opacity"], "var(--op-app_fade-12_5)");
    }

    #[test]
    fn test_generated_names_are_unique_per_file() {
        let scope = Scope::from_value("app");
        let mut transformer = VariableTransformer::new(&scope, "test.scs");

        let mut hovered = dispatched(&["hover($bg[blue])"]);
        transformer.transform(&mut hovered, "app_box", 1).unwrap();

        let mut sibling = dispatched(&["$bg[red]"]);
        let err = transformer.transform(&mut sibling, "app_box-hover", 2).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Conflicting declarations"));
        assert!(message.contains("--bg-app_box-hover"));
        assert!(message.contains("'.app_box'"));
        assert!(message.contains("'.app_box-hover'"));
        assert!(message.contains("line 2"));
    }
}
