//! # dsn2yaml
//!
//! Specctra DSN Design or Session to YAML Converter
//!

use clap::Parser;
use dsn21utils::SerializationFormat::Yaml;
use std::error::Error;

/// Specctra DSN Design or Session to YAML Converter
#[derive(Parser)]
pub struct ProgramOptions {
    /// DSN Input File. Files ending in `.ses` are read as sessions.
    #[arg(short = 'i', long, default_value = "")]
    pub dsn: String,
    /// YAML Output File
    #[arg(short = 'o', long, default_value = "")]
    pub yaml: String,
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
    let tree = if options.dsn.to_ascii_lowercase().ends_with(".ses") {
        dsn21::parse_session_file(&options.dsn)?
    } else {
        dsn21::parse_design_file(&options.dsn)?
    };
    Yaml.save(&tree, &options.yaml)?;

    if options.verbose {
        println!("wrote {:?}", &options.yaml);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_converts_sessions() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let yaml = dir.path().join("routed.yaml");
        let options = ProgramOptions {
            dsn: format!("{}/resources/routed.ses", env!("CARGO_MANIFEST_DIR")),
            yaml: yaml.to_string_lossy().to_string(),
            verbose: false,
        };
        _main(&options)?;

        let readback: dsn21::DsnTree = Yaml.open(&yaml)?;
        let parsed = dsn21::parse_session_file(&options.dsn)?;
        assert!(readback.same_structure(readback.root, &parsed, parsed.root));
        Ok(())
    }
}
