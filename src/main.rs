//! Platfuse CLI
//!
//! Entry point for the `platfuse` command-line tool.

use clap::{Parser, Subcommand};
use platfuse::plan;
use platfuse::{ConsoleSink, MergeConfig, Merger};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "platfuse")]
#[command(about = "Merge multi-platform build artifacts into one archive", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the artifacts named by a config file
    Merge {
        /// Path to merge config file (default: platfuse.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Scratch directory, overriding the configured one
        #[arg(long)]
        scratch: Option<PathBuf>,

        /// Print per-phase diagnostics
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Show the initial relocation plan without merging
    Plan {
        /// Path to merge config file (default: platfuse.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Merge {
            config,
            scratch,
            verbose,
        } => {
            run_merge(config, scratch, verbose);
        }
        Commands::Plan { config, json } => {
            run_plan(config, json);
        }
    }
}

fn load_config(path: Option<PathBuf>) -> MergeConfig {
    let path = path.unwrap_or_else(|| PathBuf::from("platfuse.toml"));
    match MergeConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn run_merge(config_path: Option<PathBuf>, scratch: Option<PathBuf>, verbose: bool) {
    let request = load_config(config_path).into_request(scratch);
    let sink = ConsoleSink::new(verbose);

    match Merger::new(request, &sink).merge() {
        Ok(output) => {
            println!("{}", output.display());
        }
        Err(e) => {
            eprintln!("Merge failed: {}", e);
            process::exit(1);
        }
    }
}

fn run_plan(config_path: Option<PathBuf>, json_output: bool) {
    let request = load_config(config_path).into_request(None);

    let mut plans: Vec<serde_json::Value> = Vec::new();
    for platform in request.platforms.iter().filter(|p| p.participates()) {
        let source = platform.source.as_deref().expect("participant has a source");
        let map = match plan::initial_map(
            &request.group,
            &platform.tag,
            &platform.extra_relocations,
            source,
        ) {
            Ok(map) => map,
            Err(e) => {
                eprintln!("Error planning {}: {}", platform.tag, e);
                process::exit(1);
            }
        };

        if json_output {
            let pairs: Vec<serde_json::Value> = map
                .iter()
                .map(|(from, to)| serde_json::json!({ "from": from, "to": to }))
                .collect();
            plans.push(serde_json::json!({
                "platform": platform.tag,
                "source": source.display().to_string(),
                "relocations": pairs,
            }));
        } else {
            println!("{} ({})", platform.tag, source.display());
            for (from, to) in map.iter() {
                println!("  {} -> {}", from, to);
            }
            println!();
        }
    }

    if json_output {
        match serde_json::to_string_pretty(&plans) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    }
}
