//! Systematic-uncertainty table editor
//!
//! Reads one or more tables, merges them (later files override earlier
//! ones), applies the requested editing stages in a fixed order, and writes
//! the result.

use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use syst_core::{
    edit, merge_tables, numeric, parse_table, parse_table_str, AggregateSpec, EditOptions, Error,
    FieldSelector, TopSpec,
};

#[derive(Parser)]
#[command(name = "syst-edit")]
#[command(about = "Edit tables of systematic-uncertainty contributions", long_about = None)]
#[command(version)]
struct Cli {
    /// Input table files, merged in order (standard input if none)
    inputs: Vec<PathBuf>,

    /// Output file (standard output if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Remove fields matching these patterns
    #[arg(long = "rm", num_args = 1.., value_name = "PATTERN")]
    remove: Vec<String>,

    /// Symmetrize asymmetric uncertainties (take the larger)
    #[arg(short, long)]
    sym: bool,

    /// Sum fields linearly: output name, then patterns
    #[arg(long, num_args = 1.., value_name = "NAME|PATTERN")]
    add: Vec<String>,

    /// Sum fields in quadrature: output name, then patterns
    #[arg(long, num_args = 1.., value_name = "NAME|PATTERN")]
    qadd: Vec<String>,

    /// Sum all fields except the patterns, linearly
    #[arg(long = "add-except", num_args = 1.., value_name = "NAME|PATTERN")]
    add_except: Vec<String>,

    /// Sum all fields except the patterns, in quadrature
    #[arg(long = "qadd-except", num_args = 1.., value_name = "NAME|PATTERN")]
    qadd_except: Vec<String>,

    /// Keep the N highest-impact fields, combine the rest
    #[arg(long, value_name = "N[:NAME]")]
    top: Option<String>,

    /// Fields kept out of the top-N reduction
    #[arg(long, num_args = 1.., value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Fractional digits for computed values
    #[arg(long, default_value_t = numeric::DEFAULT_PRECISION)]
    prec: usize,

    /// Fractional tolerance for comparing bin edges while merging
    #[arg(long, value_name = "FLOAT")]
    tol: Option<f64>,

    /// Field names to move to the front, in order
    #[arg(long, num_args = 1.., value_name = "NAME")]
    order: Vec<String>,
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

    // configuration problems abort before any table I/O
    let opts = build_options(&cli)?;

    let mut parsed = Vec::new();
    if cli.inputs.is_empty() {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        parsed.push((parse_table_str(&content, "<stdin>")?, "<stdin>".to_string()));
    } else {
        for path in &cli.inputs {
            let name = path.display().to_string();
            parsed.push((parse_table(path)?, name));
        }
    }

    let mut table = merge_tables(parsed, cli.tol)?;
    table.check()?;
    edit::apply(&mut table, &opts)?;

    match &cli.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write!(writer, "{}", table)?;
        }
        None => print!("{}", table),
    }
    Ok(())
}

fn build_options(cli: &Cli) -> syst_core::Result<EditOptions> {
    let modes = [
        (&cli.add, false, false),
        (&cli.qadd, true, false),
        (&cli.add_except, false, true),
        (&cli.qadd_except, true, true),
    ];
    let mut aggregate = None;
    for (args, quadrature, exclusive) in modes {
        if args.is_empty() {
            continue;
        }
        if aggregate.is_some() {
            return Err(Error::Config(
                "more than one of --add, --qadd, --add-except, --qadd-except".to_string(),
            ));
        }
        aggregate = Some(AggregateSpec::from_args(args, quadrature, exclusive)?);
    }

    let top = match &cli.top {
        Some(arg) => Some(TopSpec::from_arg(
            arg,
            FieldSelector::new(&cli.exclude, false)?,
        )?),
        None if !cli.exclude.is_empty() => {
            return Err(Error::Config("--exclude requires --top".to_string()))
        }
        None => None,
    };

    let remove = if cli.remove.is_empty() {
        None
    } else {
        Some(FieldSelector::new(&cli.remove, false)?)
    };

    Ok(EditOptions {
        remove,
        symmetrize: cli.sym,
        aggregate,
        top,
        order: cli.order.clone(),
        precision: cli.prec,
    })
}
