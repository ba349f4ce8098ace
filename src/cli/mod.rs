mod config;
mod handlers;

use crate::error::{CompilerError, Result};
use crate::types::SCOPE_NONE;
use crate::{CompilerOptions, OutputStyle, Theme};
use clap::{Arg, ArgAction, Command, ValueEnum};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Subcommands share option handling but not every flag.
fn flag(matches: &clap::ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

static SCOPE_ARG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid scope regex"));

#[derive(Debug, Clone, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
}

pub struct ShortCssCli {
    config: config::ConfigFile,
}

impl Default for ShortCssCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortCssCli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let matches = self.build_cli().get_matches();

        self.setup_logging(matches.get_count("verbose"));

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        match matches.subcommand() {
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            Some(("abbreviations", sub_matches)) => handlers::handle_abbreviations_command(sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("ShortCSS Development Team")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.toml or .json)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("compile")
                    .about("Compile a ShortCSS file to CSS")
                    .arg(Arg::new("input").help("Input .scs file").required(true).index(1))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output CSS file"))
                    .arg(Arg::new("theme").short('t').long("theme").value_name("FILE").help("Theme snapshot (.json or .toml)"))
                    .arg(Arg::new("scope").short('s').long("scope").value_name("SCOPE").help("Scope for files without an @scope directive"))
                    .arg(Arg::new("pretty").long("pretty").help("Write indented CSS").action(ArgAction::SetTrue))
                    .arg(Arg::new("debug").short('d').long("debug").help("Enable debug mode with per-phase logging").action(ArgAction::SetTrue))
                    .arg(Arg::new("stats").long("stats").help("Show detailed compilation statistics").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("check")
                    .about("Check ShortCSS files for errors without writing output")
                    .arg(Arg::new("input").help("Input .scs file or directory").required(true).index(1))
                    .arg(Arg::new("theme").short('t').long("theme").value_name("FILE").help("Theme snapshot (.json or .toml)"))
                    .arg(Arg::new("scope").short('s').long("scope").value_name("SCOPE").help("Scope for files without an @scope directive"))
                    .arg(Arg::new("recursive").short('r').long("recursive").help("Check all .scs files in directory recursively").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("abbreviations")
                    .about("List the built-in property abbreviations")
                    .arg(Arg::new("format").short('f').long("format").value_parser(clap::value_parser!(ListFormat)).default_value("text").help("Listing format")),
            )
    }

    fn setup_logging(&self, verbose_count: u8) {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    }

    pub fn build_compiler_options(&self, matches: &clap::ArgMatches) -> Result<CompilerOptions> {
        let mut options = CompilerOptions::default();
        options.debug_mode = flag(matches, "debug");

        let pretty = flag(matches, "pretty") || self.config.pretty.unwrap_or(false);
        options.output_style = if pretty { OutputStyle::Pretty } else { OutputStyle::Compact };

        let scope = matches
            .try_get_one::<String>("scope")
            .ok()
            .flatten()
            .or(self.config.scope.as_ref());
        if let Some(scope) = scope {
            if scope != SCOPE_NONE && !SCOPE_ARG_REGEX.is_match(scope) {
                return Err(CompilerError::InvalidFormat {
                    message: format!("Invalid scope '{}': use 'none' or [A-Za-z0-9_-]+", scope),
                });
            }
            options.default_scope = scope.clone();
        }

        options.header_comment = self.config.header_comment.clone();
        Ok(options)
    }

    /// `--theme` wins over the config file; no theme means an empty one.
    pub fn load_theme(&self, matches: &clap::ArgMatches) -> Result<Theme> {
        let path = matches
            .get_one::<String>("theme")
            .or(self.config.theme.as_ref());
        match path {
            Some(path) => Theme::load(Path::new(path)),
            None => Ok(Theme::empty()),
        }
    }

    pub fn output_directory(&self) -> Option<&str> {
        self.config.output_directory.as_deref()
    }
}
