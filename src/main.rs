//! ShortCSS Compiler Binary

use shortcss::cli::ShortCssCli;
use std::process;

fn main() {
    let mut cli = ShortCssCli::new();
    if let Err(e) = cli.run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}
