//! ShortCSS Compiler
//!
//! Compiles an abbreviation-based styling language into plain CSS.
//!
//! # Features
//!
//! - Short property tokens (`bg[red]`, `px[4px]`) backed by a static table
//! - State, pseudo-element, screen, container and plugin blocks
//! - Nested `@query` selector trees with `&` and `@scope.<name>` references
//! - Scoped runtime (`$bg[red]`) and local (`--&pad[8px]`) variables
//! - Reusable `@const` fragments and `@keyframe` animations
//! - Theme snapshots with breakpoints, typography presets and define groups
//!
//! # Basic Usage
//!
//! ```rust
//! use shortcss::compile_source;
//!
//! let css = compile_source("@scope app\n.box { bg[red] hover(bg[blue]) }", "box.scs").unwrap();
//! assert!(css.contains(".app_box{background-color:red;}"));
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Phase 1**: Block Extractor - Split consts, keyframes, directives and classes
//! 2. **Phase 2**: Directives - Resolve the file scope
//! 3. **Phase 3**: Semantic Analysis - Dispatch consts and class bodies, resolve nested queries
//! 4. **Phase 4**: Variable Scoping - Name runtime variables after their class
//! 5. **Phase 5**: Keyframes - Compile animation steps
//! 6. **Phase 6**: Code Generator - Write keyframes, then classes, as CSS text

pub mod cli;
pub mod codegen;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod keyframes;
pub mod nested;
pub mod registry;
pub mod scanner;
pub mod semantic;
pub mod theme;
pub mod transformer;
pub mod types;

use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;

pub use codegen::{CodeGenerator, OutputStyle};
pub use dispatcher::{BlockKind, Dispatcher};
pub use error::{CompilerError, ErrorKind, Result};
pub use extractor::{BlockExtractor, ExtractedFile};
pub use keyframes::KeyframeCompiler;
pub use nested::NestedQueryResolver;
pub use semantic::SemanticAnalyzer;
pub use theme::{Theme, ThemeSource};
pub use transformer::VariableTransformer;
pub use types::*;

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default extension of ShortCSS source files.
pub const SOURCE_EXTENSION: &str = "scs";

/// Compilation options and settings
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Enable debug mode with per-phase logging
    pub debug_mode: bool,

    /// Scope used when the file has no `@scope` directive
    pub default_scope: String,

    /// Compact or pretty CSS
    pub output_style: OutputStyle,

    /// Comment written at the top of the generated CSS
    pub header_comment: Option<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            default_scope: SCOPE_NONE.to_string(),
            output_style: OutputStyle::Compact,
            header_comment: None,
        }
    }
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Original source size in bytes
    pub source_size: u64,

    /// Generated CSS size in bytes
    pub output_size: u64,

    /// Scope the file was compiled under
    pub scope: String,

    pub class_count: usize,
    pub const_count: usize,
    pub keyframe_count: usize,

    /// Number of `@query` nodes at any depth
    pub nested_query_count: usize,

    /// Number of generated `:root` custom properties
    pub root_variable_count: usize,

    /// Number of CSS rules written
    pub rule_count: usize,

    /// Non-fatal findings, e.g. unused local variables
    pub warnings: Vec<String>,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Main compiler entry point with default options and an empty theme
pub fn compile_file(input_path: &str, output_path: &str) -> Result<CompilationStats> {
    compile_file_with_options(input_path, output_path, &Theme::empty(), CompilerOptions::default())
}

/// Compile a file and write the CSS. The output file is only replaced once
/// compilation has fully succeeded.
pub fn compile_file_with_options(
    input_path: &str,
    output_path: &str,
    theme: &Theme,
    options: CompilerOptions,
) -> Result<CompilationStats> {
    let start_time = Instant::now();

    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::info!("Compiling '{}' to '{}'...", input_path, output_path);
        log::debug!("Compiler options: {:?}", options);
    }

    let source = fs::read_to_string(input_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", input_path, e),
    })?;

    let debug_mode = options.debug_mode;
    let (css, mut stats) = compile_source_with_options(&source, input_path, theme, options)?;

    write_atomically(Path::new(output_path), &css)?;
    stats.compile_time_ms = start_time.elapsed().as_millis() as u64;

    if debug_mode {
        log::info!("Compilation successful!");
        log::info!("Source size: {} bytes", stats.source_size);
        log::info!("Output size: {} bytes", stats.output_size);
        log::info!("Compile time: {}ms", stats.compile_time_ms);
        log::debug!("Full stats: {:?}", stats);
    }
    Ok(stats)
}

/// Compile ShortCSS source to CSS text with default options
pub fn compile_source(source: &str, filename: &str) -> Result<String> {
    let (css, _stats) = compile_source_with_options(source, filename, &Theme::empty(), CompilerOptions::default())?;
    Ok(css)
}

/// Compile ShortCSS source to CSS text. Either the whole file compiles or an
/// error is returned; there is no partial output.
pub fn compile_source_with_options(
    source: &str,
    filename: &str,
    theme: &Theme,
    options: CompilerOptions,
) -> Result<(String, CompilationStats)> {
    let start_time = Instant::now();
    let mut stats = CompilationStats {
        source_size: source.len() as u64,
        ..Default::default()
    };

    if options.debug_mode {
        log::debug!("Starting compilation pipeline for {}", filename);
        log::debug!("Source length: {} characters", source.len());
    }

    // Phase 1: Block extraction
    if options.debug_mode {
        log::debug!("Phase 1: Extracting blocks...");
    }
    let stripped = scanner::strip_block_comments(source);
    let extracted = BlockExtractor::new(filename).extract(&stripped)?;
    stats.const_count = extracted.consts.len();
    stats.keyframe_count = extracted.keyframes.len();
    stats.class_count = extracted.classes.len();

    // Phase 2: Directives
    if options.debug_mode {
        log::debug!("Phase 2: Resolving directives...");
    }
    let scope = resolve_scope(&extracted.directives, &options.default_scope, filename)?;
    stats.scope = scope.to_string();
    if options.debug_mode {
        log::debug!("Phase 2 complete. Scope: {}", scope);
    }

    let keyframe_names = keyframes::final_names(&extracted.keyframes, &scope, filename)?;
    let short_names: ShortNameTable = extracted
        .classes
        .iter()
        .map(|class| (class.name.clone(), scope.final_name(&class.name)))
        .collect();

    // Phase 3: Semantic analysis
    if options.debug_mode {
        log::debug!("Phase 3: Semantic analysis...");
    }
    let mut analyzer = SemanticAnalyzer::new(theme, filename, &keyframe_names);
    analyzer.compile_consts(&extracted.consts)?;

    // Phase 4: Variable scoping, per class. The transformer also scopes
    // keyframe steps in phase 5 so generated names stay unique file-wide.
    let mut transformer = VariableTransformer::new(&scope, filename);
    let mut classes = Vec::with_capacity(extracted.classes.len());
    for block in &extracted.classes {
        let mut style = analyzer.compile_class(block)?;
        let display_name = scope.final_name(&block.name);
        transformer.transform(&mut style, &display_name, block.line)?;

        stats.nested_query_count += count_nested(&style);
        stats.root_variable_count += style.root_vars.len();
        classes.push(CompiledClass {
            name: block.name.clone(),
            display_name,
            style,
            line: block.line,
        });
    }
    stats.warnings = analyzer.warnings().to_vec();
    if options.debug_mode {
        log::debug!(
            "Phase 3/4 complete. {} consts, {} classes, {} nested queries",
            stats.const_count,
            stats.class_count,
            stats.nested_query_count
        );
    }

    // Phase 5: Keyframes
    if options.debug_mode {
        log::debug!("Phase 5: Compiling keyframes...");
    }
    let keyframe_compiler = KeyframeCompiler::new(theme, &keyframe_names, filename);
    let mut compiled_keyframes = Vec::with_capacity(extracted.keyframes.len());
    for block in &extracted.keyframes {
        let keyframe = keyframe_compiler.compile(block, &mut transformer)?;
        stats.root_variable_count += keyframe.root_vars.len();
        compiled_keyframes.push(keyframe);
    }

    // Phase 6: Code generation
    if options.debug_mode {
        log::debug!("Phase 6: Generating CSS...");
    }
    let mut generator = CodeGenerator::new(options.output_style, &short_names, filename);
    if let Some(header) = &options.header_comment {
        generator.write_comment(header);
    }
    for keyframe in &compiled_keyframes {
        generator.generate_keyframe(keyframe);
    }
    for class in &classes {
        generator.generate_class(class)?;
    }
    stats.rule_count = generator.rule_count();
    let css = generator.finish();

    stats.output_size = css.len() as u64;
    stats.compile_time_ms = start_time.elapsed().as_millis() as u64;
    if options.debug_mode {
        log::debug!("Phase 6 complete. {} rules, {} bytes", stats.rule_count, stats.output_size);
    }
    Ok((css, stats))
}

/// Only `@scope` is a valid top-level directive, and only once.
fn resolve_scope(directives: &[Directive], default_scope: &str, filename: &str) -> Result<Scope> {
    let mut scope: Option<&Directive> = None;
    for directive in directives {
        if directive.name != "scope" {
            return Err(CompilerError::semantic(
                filename,
                directive.line,
                format!("Unknown directive '@{}'", directive.name),
            ));
        }
        if let Some(previous) = scope {
            return Err(CompilerError::parse(
                filename,
                directive.line,
                format!("Duplicate '@scope' directive (first declared at line {})", previous.line),
            ));
        }
        scope = Some(directive);
    }

    Ok(Scope::from_value(
        scope.map(|directive| directive.value.as_str()).unwrap_or(default_scope),
    ))
}

fn count_nested(style: &StyleDefinition) -> usize {
    let mut count = 0;
    let mut stack: Vec<&NestedQueryNode> = style.nested_queries.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children());
    }
    count
}

/// Write through a sibling temp file and rename it into place.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CompilerError::InvalidFormat {
            message: format!("Output path '{}' has no file name", path.display()),
        })?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&temp_path, contents)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn compile(source: &str) -> Result<String> {
        compile_source(source, "test.scs")
    }

    #[test]
    fn test_scoped_state_block() {
        let css = compile("@scope app\n.box { bg[red] hover(bg[blue]) }").unwrap();
        assert!(css.contains(".app_box{background-color:red;}"));
        assert!(css.contains(".app_box:hover{background-color:blue;}"));
    }

    #[test]
    fn test_local_variable_output() {
        let css = compile(".card { --&pad[8px] p[--&pad] }").unwrap();
        assert_eq!(css, ".card{--pad-card:8px;padding:var(--pad-card);}\n");
    }

    #[test]
    fn test_runtime_variable_output() {
        let css = compile("@scope app\n.box { $bg[red] }").unwrap();
        assert!(css.contains(":root{--bg-app_box:red;}"));
        assert!(css.contains(".app_box{background-color:var(--bg-app_box);}"));

        assert!(compile(".box { $bg[red] }").is_err());
    }

    #[test]
    fn test_generated_variable_collides_across_classes() {
        let err = compile("@scope app\n.box { hover($bg[blue]) }\n.box-hover { $bg[red] }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        assert!(err.to_string().contains("Conflicting declarations"));
        assert!(err.to_string().contains("--bg-app_box-hover"));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_generated_variable_collides_with_keyframe_step() {
        let err = compile("@scope app\n@keyframe fade { from($op[0]) to(op[1]) }\n.fade-from { $op[1] }").unwrap_err();
        assert!(err.to_string().contains("Conflicting declarations"));
        assert!(err.to_string().contains("--op-app_fade-from"));
        assert!(err.to_string().contains("'.app_fade-from'"));
        assert!(err.to_string().contains("'@keyframe app_fade from'"));
    }

    #[test]
    fn test_nested_query_output() {
        let css = compile(".box { @query .child { c[blue] } }").unwrap();
        assert_eq!(css, ".box .child{color:blue;}\n");
    }

    #[test]
    fn test_quoted_bracket_in_value() {
        let css = compile(".box { ct[\"]\"] c[red] }").unwrap();
        assert_eq!(css, ".box{content:\"]\";color:red;}\n");
    }

    #[test]
    fn test_unknown_abbreviation() {
        let err = compile(".box { xyz[1px] }").unwrap_err();
        assert!(err.to_string().starts_with(error::ERROR_PREFIX));
        assert!(err.to_string().contains("'xyz'"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let source = "@scope app\n@keyframe fade { from(op[0]) to(op[1]) }\n.box {\n  $bg[red]\n  an[fade 1s]\n  screen(min[600px], w[50%])\n  @query &:hover { c[blue] }\n}\n.icon { @query @scope.box > span { w[1px] } }";
        let first = compile(source).unwrap();
        let second = compile(source).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("@keyframes app_fade{"));
        assert!(first.contains(".app_box{background-color:var(--bg-app_box);animation:app_fade 1s;}"));
        assert!(first.contains(".app_icon .app_box > span{width:1px;}"));
    }

    #[test]
    fn test_scope_reference_to_later_class() {
        let css = compile(".a { @query @scope.b { c[red] } }\n.b { c[blue] }").unwrap();
        assert!(css.contains(".a .b{color:red;}"));

        let err = compile(".a { @query @scope.ghost { c[red] } }").unwrap_err();
        assert!(err.to_string().contains("@scope.ghost"));
    }

    #[test]
    fn test_directives() {
        assert!(compile("@scope a\n@scope b\n.x { c[red] }").is_err());
        let err = compile("@theme dark\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);

        let options = CompilerOptions {
            default_scope: "lib".to_string(),
            ..Default::default()
        };
        let (css, stats) = compile_source_with_options(".x { c[red] }", "x.scs", &Theme::empty(), options).unwrap();
        assert_eq!(css, ".lib_x{color:red;}\n");
        assert_eq!(stats.scope, "lib");
    }

    #[test]
    fn test_comments_are_ignored() {
        let css = compile("/* header\n */\n.box { /* inline */ c[red] }").unwrap();
        assert_eq!(css, ".box{color:red;}\n");
    }

    #[test]
    fn test_stats() {
        let source = "@scope app\n@const a { c[red] }\n.x {\n  $bg[red]\n  @use a\n  @query .y { c[blue] @query .z { c[green] } }\n}";
        let (_, stats) = compile_source_with_options(source, "x.scs", &Theme::empty(), CompilerOptions::default()).unwrap();
        assert_eq!(stats.class_count, 1);
        assert_eq!(stats.const_count, 1);
        assert_eq!(stats.nested_query_count, 2);
        assert_eq!(stats.root_variable_count, 1);
        assert_eq!(stats.rule_count, 4);
    }

    #[test]
    fn test_header_comment_and_pretty_output() {
        let options = CompilerOptions {
            output_style: OutputStyle::Pretty,
            header_comment: Some("generated".to_string()),
            ..Default::default()
        };
        let (css, _) = compile_source_with_options(".x { c[red] }", "x.scs", &Theme::empty(), options).unwrap();
        assert_eq!(css, "/* generated */\n.x {\n  color: red;\n}\n");
    }

    #[test]
    fn test_compile_file_keeps_previous_output_on_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("main.scs");
        let output = dir.path().join("out/main.css");

        fs::write(&input, ".box { c[red] }").unwrap();
        let stats = compile_file(input.to_str().unwrap(), output.to_str().unwrap()).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), ".box{color:red;}\n");
        assert_eq!(stats.class_count, 1);

        fs::write(&input, ".box { xyz[1px] }").unwrap();
        assert!(compile_file(input.to_str().unwrap(), output.to_str().unwrap()).is_err());
        assert_eq!(fs::read_to_string(&output).unwrap(), ".box{color:red;}\n");
    }

    #[test]
    fn test_compile_file_missing_input() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.scs");
        let output = dir.path().join("out.css");
        let err = compile_file(missing.to_str().unwrap(), output.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!output.exists());
    }
}
