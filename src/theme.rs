//! Theme snapshot: breakpoints, typography presets, define groups and
//! shared keyframe names
//!
//! Snapshots are JSON or TOML documents:
//!
//! ```toml
//! [breakpoints]
//! md = "(min-width:768px)"
//!
//! [typography]
//! body = "fs[16px] lh[1.5]"
//!
//! [defines.btn]
//! primary = "bg[blue] c[white]"
//!
//! [keyframes]
//! spin = "spin"
//! ```

use crate::dispatcher::{BlockKind, Dispatcher};
use crate::error::{CompilerError, Result};
use crate::registry;
use crate::scanner::split_statements;
use crate::types::StyleDefinition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// On-disk shape of a theme snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSource {
    pub breakpoints: BTreeMap<String, String>,
    pub typography: BTreeMap<String, String>,
    /// group -> variant -> token string
    pub defines: BTreeMap<String, BTreeMap<String, String>>,
    /// raw keyframe name -> final keyframe name
    pub keyframes: BTreeMap<String, String>,
}

/// A loaded theme with define groups precompiled.
#[derive(Debug, Clone, Default)]
pub struct Theme {
    breakpoints: HashMap<String, String>,
    typography: HashMap<String, String>,
    defines: HashMap<String, HashMap<String, StyleDefinition>>,
    keyframes: HashMap<String, String>,
}

impl Theme {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
            path: format!("Theme file {}: {}", display, e),
        })?;

        let source: ThemeSource = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                CompilerError::theme(format!("Invalid JSON theme {}: {}", display, e))
            })?,
            Some("toml") => toml::from_str(&content).map_err(|e| {
                CompilerError::theme(format!("Invalid TOML theme {}: {}", display, e))
            })?,
            _ => {
                return Err(CompilerError::InvalidFormat {
                    message: format!("Theme file {} must be .json or .toml format", display),
                })
            }
        };

        log::info!("Loaded theme from {}", display);
        Self::from_source(source)
    }

    /// Build a theme, compiling every define variant in name order. A variant
    /// may use define groups that sort before it.
    pub fn from_source(source: ThemeSource) -> Result<Self> {
        let mut theme = Theme {
            breakpoints: source.breakpoints.into_iter().collect(),
            typography: source.typography.into_iter().collect(),
            defines: HashMap::new(),
            keyframes: source.keyframes.into_iter().collect(),
        };

        for (group, variants) in source.defines {
            if registry::is_abbreviation(&group) {
                return Err(CompilerError::theme(format!(
                    "Define group '{}' collides with a built-in abbreviation",
                    group
                )));
            }

            let mut compiled = HashMap::new();
            for (variant, tokens) in variants {
                let fragment = compile_define(&theme, &tokens).map_err(|e| {
                    CompilerError::theme(format!(
                        "Define '{}[{}]' is invalid: {}",
                        group,
                        variant,
                        e.message()
                    ))
                })?;
                compiled.insert(variant, fragment);
            }
            theme.defines.insert(group, compiled);
        }

        log::debug!(
            "Theme ready: {} breakpoints, {} typography presets, {} define groups, {} keyframes",
            theme.breakpoints.len(),
            theme.typography.len(),
            theme.defines.len(),
            theme.keyframes.len()
        );
        Ok(theme)
    }

    pub fn breakpoint(&self, name: &str) -> Option<&str> {
        self.breakpoints.get(name).map(String::as_str)
    }

    pub fn typography(&self, key: &str) -> Option<&str> {
        self.typography.get(key).map(String::as_str)
    }

    pub fn has_define_group(&self, group: &str) -> bool {
        self.defines.contains_key(group)
    }

    pub fn define(&self, group: &str, variant: &str) -> Option<&StyleDefinition> {
        self.defines.get(group)?.get(variant)
    }

    pub fn keyframe(&self, name: &str) -> Option<&str> {
        self.keyframes.get(name).map(String::as_str)
    }
}

fn compile_define(theme: &Theme, tokens: &str) -> Result<StyleDefinition> {
    let dispatcher = Dispatcher::new(theme, BlockKind::ThemeFragment);
    let mut fragment = StyleDefinition::new();
    for token in split_statements(tokens)? {
        dispatcher.dispatch(&token, &mut fragment)?;
    }
    Ok(fragment)
}
