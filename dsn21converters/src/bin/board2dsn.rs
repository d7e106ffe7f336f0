//! # board2dsn
//!
//! Board to Specctra DSN Design Exporter
//!

use clap::Parser;
use dsn21converters::{export_design, Board, ExportOptions};
use dsn21utils::SerdeFile;
use std::error::Error;

// => The doc-comment on `ProgramOptions` here is displayed by the `clap`-generated help docs =>

/// Board to Specctra DSN Design Exporter
#[derive(Parser)]
pub struct ProgramOptions {
    /// Board Input File (YAML, JSON or TOML)
    #[arg(short = 'i', long, default_value = "")]
    pub board: String,
    /// DSN Output File
    #[arg(short = 'o', long, default_value = "")]
    pub dsn: String,
    /// Export Options File. Defaults apply if omitted.
    #[arg(short = 'c', long, default_value = "")]
    pub config: String,
    /// Verbose Output Mode
    #[arg(short, long)]
    pub verbose: bool,
}

/// The main entry point.
/// All logic is offloaded to `_main` for sake of testing.
fn main() -> Result<(), Box<dyn Error>> {
    let options = ProgramOptions::parse();
    let level = if options.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    _main(&options)
}

/// All the real logic, with `ProgramOptions` argument for sake of testing
fn _main(options: &ProgramOptions) -> Result<(), Box<dyn Error>> {
    let board = Board::load(&options.board)?;
    let export_options = if options.config.is_empty() {
        ExportOptions::default()
    } else {
        ExportOptions::load(&options.config)?
    };
    let bytes = export_design(&board, &export_options)?;
    std::fs::write(&options.dsn, bytes)?;

    if options.verbose {
        println!("wrote {:?}", &options.dsn);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_exports_to_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let dsn = dir.path().join("blinky.dsn");
        let options = ProgramOptions {
            board: resource("board.yaml"),
            dsn: dsn.to_string_lossy().to_string(),
            config: String::new(),
            verbose: false,
        };
        _main(&options)?;

        let tree = dsn21::parse_design_file(&dsn)?;
        let placement = tree
            .child_tagged(tree.root, dsn21::DsnKey::Placement)
            .ok_or("No placement")?;
        assert_eq!(tree.children(placement).len(), 2);
        Ok(())
    }
    #[test]
    fn it_fails_on_missing_boards() {
        let options = ProgramOptions {
            board: resource("nonexistent.yaml"),
            dsn: String::new(),
            config: String::new(),
            verbose: false,
        };
        assert!(_main(&options).is_err());
    }

    /// Grab the full path of resource-file `fname`
    fn resource(fname: &str) -> String {
        format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), fname)
    }
}
