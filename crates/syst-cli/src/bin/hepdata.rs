//! HEPData dump converter
//!
//! Reads one or more dataset dumps, accumulates them into one table, and
//! writes it in the flat text form the editor consumes.

use clap::Parser;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use syst_core::{ingest_into, Error, Table};

#[derive(Parser)]
#[command(name = "syst-hepdata")]
#[command(about = "Convert HEPData dataset dumps to uncertainty tables", long_about = None)]
#[command(version)]
struct Cli {
    /// Input dump files (standard input if none)
    inputs: Vec<PathBuf>,

    /// Output file (standard output if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> syst_core::Result<()> {
    let cli = Cli::parse();

    let mut table = Table::new();
    if cli.inputs.is_empty() {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        ingest_into(&content, "<stdin>", &mut table)?;
    } else {
        for path in &cli.inputs {
            let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
                path: path.clone(),
                source: e,
            })?;
            ingest_into(&content, &path.display().to_string(), &mut table)?;
        }
    }
    table.check()?;

    match &cli.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write!(writer, "{}", table)?;
        }
        None => print!("{}", table),
    }
    Ok(())
}
