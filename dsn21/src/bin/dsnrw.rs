use std::env;
use std::error::Error;
use std::process;

struct Config {
    indsn: String,
    outdsn: String,
}

impl Config {
    fn new(args: &[String]) -> Result<Config, &'static str> {
        if args.len() < 3 {
            return Err("Not enough arguments, expecting 2.");
        }
        let indsn = args[1].clone();
        let outdsn = args[2].clone();
        Ok(Config { indsn, outdsn })
    }
}

/// Read a design, or a session if its extension is `.ses`, and write it back out
fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let cfg = Config::new(&args)?;
    let tree = if cfg.indsn.to_ascii_lowercase().ends_with(".ses") {
        dsn21::parse_session_file(&cfg.indsn)?
    } else {
        dsn21::parse_design_file(&cfg.indsn)?
    };
    dsn21::save(&tree, &cfg.outdsn)?;
    Ok(())
}
fn main() {
    run().unwrap_or_else(|err| {
        println!("Problem in dsnrw: {}", err);
        process::exit(1);
    });
}
