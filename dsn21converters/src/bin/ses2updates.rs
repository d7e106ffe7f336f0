//! # ses2updates
//!
//! Specctra DSN Session to Board Update Importer
//!

use clap::Parser;
use dsn21converters::{import_session, Board, ImportOptions};
use dsn21utils::{SerdeFile, SerializationFormat};
use std::error::Error;

/// Specctra DSN Session to Board Update Importer
#[derive(Parser)]
pub struct ProgramOptions {
    /// Session Input File
    #[arg(short = 'i', long, default_value = "")]
    pub session: String,
    /// Board File the Session Was Routed From
    #[arg(short = 'b', long, default_value = "")]
    pub board: String,
    /// Update Output File (YAML, JSON or TOML)
    #[arg(short = 'o', long, default_value = "")]
    pub updates: String,
    /// Updated Board Output File. The board is left as-is if omitted.
    #[arg(short = 'a', long, default_value = "")]
    pub apply: String,
    /// Import Options File. Defaults apply if omitted.
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
    let mut board = Board::load(&options.board)?;
    let import_options = if options.config.is_empty() {
        ImportOptions::default()
    } else {
        ImportOptions::load(&options.config)?
    };
    let bytes = std::fs::read(&options.session)?;
    let update = import_session(&bytes, &board, &import_options)?;

    if !options.updates.is_empty() {
        let fmt = format_of(&options.updates)?;
        fmt.save(&update, &options.updates)?;
        if options.verbose {
            println!("wrote {:?}", &options.updates);
        }
    }
    if !options.apply.is_empty() {
        board.apply(&update)?;
        let fmt = format_of(&options.apply)?;
        fmt.save(&board, &options.apply)?;
        if options.verbose {
            println!("wrote {:?}", &options.apply);
        }
    }
    Ok(())
}

/// Get the serialization format of file `fname` from its extension
fn format_of(fname: &str) -> Result<SerializationFormat, Box<dyn Error>> {
    SerializationFormat::from_path(fname)
        .ok_or_else(|| format!("Cannot infer output format of {}", fname).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsn21converters::SessionUpdate;

    #[test]
    fn it_writes_updates_and_applies_them() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let updates = dir.path().join("updates.yaml");
        let routed = dir.path().join("routed.json");
        let options = ProgramOptions {
            session: resource("routed.ses"),
            board: resource("board.yaml"),
            updates: updates.to_string_lossy().to_string(),
            apply: routed.to_string_lossy().to_string(),
            config: String::new(),
            verbose: false,
        };
        _main(&options)?;

        let update = SessionUpdate::load(&updates)?;
        assert_eq!(update.routes.len(), 2);
        let board = Board::load(&routed)?;
        assert_eq!(board.tracks.len(), 3);
        Ok(())
    }

    /// Grab the full path of resource-file `fname`
    fn resource(fname: &str) -> String {
        format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), fname)
    }
}
