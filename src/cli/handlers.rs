use super::{flag, ListFormat, ShortCssCli};
use crate::error::{CompilerError, Result};
use crate::{compile_file_with_options, compile_source_with_options, registry, CompilationStats, SOURCE_EXTENSION};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn required_arg<'a>(matches: &'a clap::ArgMatches, name: &str) -> Result<&'a String> {
    matches.get_one::<String>(name).ok_or_else(|| CompilerError::InvalidFormat {
        message: format!("Missing required argument '{}'", name),
    })
}

/// `-o` wins; otherwise the input name with a `.css` extension, placed in the
/// configured output directory when there is one.
fn default_output_path(input: &str, output_directory: Option<&str>) -> PathBuf {
    let css_name = Path::new(input).with_extension("css");
    match (output_directory, css_name.file_name()) {
        (Some(dir), Some(file_name)) => Path::new(dir).join(file_name),
        _ => css_name,
    }
}

pub fn handle_compile_command(cli: &ShortCssCli, matches: &clap::ArgMatches) -> Result<()> {
    let input = required_arg(matches, "input")?;
    let output = match matches.get_one::<String>("output") {
        Some(output) => PathBuf::from(output),
        None => default_output_path(input, cli.output_directory()),
    };
    let output = output.to_string_lossy().to_string();

    let theme = cli.load_theme(matches)?;
    let options = cli.build_compiler_options(matches)?;

    println!("🔨 Compiling {} -> {}", input, output);

    // Failures are reported once, by the binary.
    let stats = compile_file_with_options(input, &output, &theme, options)?;
    println!("✅ Compilation successful!");
    println!(
        "   {} classes, {} keyframes, {} rules ({} bytes) in {}ms",
        stats.class_count, stats.keyframe_count, stats.rule_count, stats.output_size, stats.compile_time_ms
    );
    for warning in &stats.warnings {
        println!("⚠️  {}", warning);
    }

    if flag(matches, "stats") {
        print_detailed_stats(&stats)?;
    }
    Ok(())
}

pub fn handle_check_command(cli: &ShortCssCli, matches: &clap::ArgMatches) -> Result<()> {
    let input = required_arg(matches, "input")?;
    let recursive = flag(matches, "recursive");
    let theme = cli.load_theme(matches)?;
    let options = cli.build_compiler_options(matches)?;

    let files = collect_source_files(Path::new(input), recursive)?;
    if files.is_empty() {
        println!("🔍 No .{} files found in {}", SOURCE_EXTENSION, input);
        return Ok(());
    }

    let mut total_files = 0;
    let mut successful_files = 0;

    for file in &files {
        total_files += 1;
        let display = file.display().to_string();
        println!("🔍 Checking {}", display);

        let source = match fs::read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                println!("❌ {}: {}", display, e);
                continue;
            }
        };

        match compile_source_with_options(&source, &display, &theme, options.clone()) {
            Ok((_, stats)) => {
                successful_files += 1;
                println!("✅ {} ({} classes, {} rules)", display, stats.class_count, stats.rule_count);
                for warning in &stats.warnings {
                    println!("⚠️  {}", warning);
                }
            }
            Err(e) => println!("❌ {}", e),
        }
    }

    println!("\n📊 Check Summary:");
    println!("   Total files: {}", total_files);
    println!("   Successful: {}", successful_files);
    println!("   Failed: {}", total_files - successful_files);
    println!(
        "   Success rate: {:.1}%",
        (successful_files as f64 / total_files as f64) * 100.0
    );

    if successful_files < total_files {
        return Err(CompilerError::InvalidFormat {
            message: format!("{} file(s) failed to compile", total_files - successful_files),
        });
    }
    Ok(())
}

pub fn handle_abbreviations_command(matches: &clap::ArgMatches) -> Result<()> {
    let format = matches.get_one::<ListFormat>("format").cloned().unwrap_or(ListFormat::Text);

    match format {
        ListFormat::Json => {
            let listing: IndexMap<&str, &[&str]> = registry::abbreviations().iter().copied().collect();
            let json = serde_json::to_string_pretty(&listing).map_err(|e| CompilerError::InvalidFormat {
                message: format!("Failed to serialize abbreviations: {}", e),
            })?;
            println!("{}", json);
        }
        ListFormat::Text => {
            let width = registry::abbreviations()
                .iter()
                .map(|(abbr, _)| abbr.len())
                .max()
                .unwrap_or(0);
            for (abbr, properties) in registry::abbreviations() {
                println!("{:width$}  {}", abbr, properties.join(", "), width = width);
            }
        }
    }
    Ok(())
}

fn collect_source_files(input: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(CompilerError::FileNotFound {
            path: input.display().to_string(),
        });
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map_or(false, |ext| ext == SOURCE_EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

fn print_detailed_stats(stats: &CompilationStats) -> Result<()> {
    println!("\n📊 Detailed Statistics:");
    println!("   Scope: {}", stats.scope);
    println!("   Source size: {} bytes", stats.source_size);
    println!("   Output size: {} bytes", stats.output_size);
    println!("   Consts: {}", stats.const_count);
    println!("   Nested queries: {}", stats.nested_query_count);
    println!("   Root variables: {}", stats.root_variable_count);

    let json = serde_json::to_string_pretty(stats).map_err(|e| CompilerError::InvalidFormat {
        message: format!("Failed to serialize stats: {}", e),
    })?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path("styles/app.scs", None), PathBuf::from("styles/app.css"));
        assert_eq!(
            default_output_path("styles/app.scs", Some("dist")),
            PathBuf::from("dist/app.css")
        );
    }

    #[test]
    fn test_collect_source_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.scs"), ".a { bg[red] }").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("b.scs"), ".b { c[blue] }").unwrap();

        let flat = collect_source_files(dir.path(), false).unwrap();
        assert_eq!(flat.len(), 1);
        assert!(flat[0].ends_with("a.scs"));

        let recursive = collect_source_files(dir.path(), true).unwrap();
        assert_eq!(recursive.len(), 2);

        assert!(collect_source_files(&dir.path().join("missing"), false).is_err());
    }

    #[test]
    fn test_compile_command_propagates_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("broken.scs");
        let output = dir.path().join("broken.css");
        fs::write(&input, ".box { xyz[1px] }").unwrap();

        let cli = ShortCssCli::new();
        let matches = cli
            .build_cli()
            .try_get_matches_from([
                "shortcss",
                "compile",
                input.to_str().unwrap(),
                "-o",
                output.to_str().unwrap(),
            ])
            .unwrap();
        let compile = matches.subcommand_matches("compile").unwrap();

        let err = handle_compile_command(&cli, compile).unwrap_err();
        assert!(err.to_string().starts_with(crate::error::ERROR_PREFIX));
        assert!(err.to_string().contains("'xyz'"));
        assert!(!output.exists());
    }
}
