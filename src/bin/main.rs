//! Cleave CLI - split a query AST into its map/reduce pair
//!
//! Usage:
//!   cleave split <query.json> [--params <params.json>] [--collocated] [--dialect <dialect>]
//!   cleave render <query.json> [--dialect <dialect>]
//!
//! The query file holds a JSON-serialized `Query` AST (the same shape the
//! library's serde derives produce); the params file holds a JSON array of
//! bound values.

use clap::{Parser, Subcommand, ValueEnum};
use cleave::split::split_for_dialect;
use cleave::sql::{Dialect, Query};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cleave")]
#[command(about = "Cleave - split a SQL query into a two-step map/reduce pair")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a query AST into its map and reduce queries
    Split {
        /// Path to the JSON-serialized query AST
        file: PathBuf,

        /// Path to a JSON array of bound parameter values
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Treat grouped/aggregated data as collocated on one node
        #[arg(short, long)]
        collocated: bool,

        /// SQL dialect to generate
        #[arg(short, long, default_value = "generic")]
        dialect: DialectArg,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// Render a query AST to SQL without splitting
    Render {
        /// Path to the JSON-serialized query AST
        file: PathBuf,

        /// SQL dialect to generate
        #[arg(short, long, default_value = "generic")]
        dialect: DialectArg,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Generic,
    Postgres,
    Mysql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Generic => Dialect::Generic,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// The two SQL statements with their parameter lists
    Sql,
    /// The full TwoStepQuery as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Split {
            file,
            params,
            collocated,
            dialect,
            output,
        } => {
            let qry = load_query(&file)?;

            let params: Vec<serde_json::Value> = match params {
                Some(path) => serde_json::from_str(&fs::read_to_string(&path)?)?,
                None => vec![],
            };

            let two_step = split_for_dialect(qry, &params, collocated, dialect.into())?;

            match output {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&two_step)?);
                }
                OutputFormat::Sql => {
                    for map_qry in &two_step.map_queries {
                        println!("-- map -> {}", map_qry.target);
                        println!("{}", map_qry.sql);
                        if !map_qry.params.is_empty() {
                            println!("-- params: {}", serde_json::to_string(&map_qry.params)?);
                        }
                        println!();
                    }
                    println!("-- reduce");
                    println!("{}", two_step.reduce_sql);
                    if !two_step.reduce_params.is_empty() {
                        println!(
                            "-- params: {}",
                            serde_json::to_string(&two_step.reduce_params)?
                        );
                    }
                }
            }
        }

        Commands::Render { file, dialect } => {
            let qry = load_query(&file)?;
            println!("{}", qry.to_sql(dialect.into()));
        }
    }

    Ok(())
}

fn load_query(path: &PathBuf) -> Result<Query, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let qry = serde_json::from_str(&text)
        .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?;
    Ok(qry)
}
