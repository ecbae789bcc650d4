//! Forest generation utility
//!
//! Places, grows and classifies a forest from a JSON config and writes a JSON
//! report with one entry per tree.
//!
//! Usage:
//!     generate_forest [OPTIONS] <CONFIG>
//!
//! Options:
//!     --surface <CSV>         Elevation grid, one row per line (default: flat)
//!     --seed <SEED>           Override the config seed
//!     -o, --output <FILE>     Report path (default: forest_report.json)
//!     -h, --help              Show this help message

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use sylvan::core::logging;
use sylvan::core::{Error, Result};
use sylvan::forest::{ForestConfig, ForestGenerator, ForestReport};
use sylvan::voxel::SurfaceField;

fn print_help() {
    eprintln!("generate_forest - Forest generation utility");
    eprintln!();
    eprintln!("Usage: generate_forest [OPTIONS] <CONFIG>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    --surface <CSV>         Elevation grid, one row per line (default: flat)");
    eprintln!("    --seed <SEED>           Override the config seed");
    eprintln!("    -o, --output <FILE>     Report path (default: forest_report.json)");
    eprintln!("    -h, --help              Show this help message");
    eprintln!();
    eprintln!("Example:");
    eprintln!("    generate_forest --seed 42 --surface hills.csv forest.json");
}

#[derive(Debug)]
struct Args {
    config: PathBuf,
    surface: Option<PathBuf>,
    seed: Option<u64>,
    output: PathBuf,
}

fn parse_args() -> std::result::Result<Args, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut config: Option<PathBuf> = None;
    let mut surface: Option<PathBuf> = None;
    let mut seed: Option<u64> = None;
    let mut output = PathBuf::from("forest_report.json");

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--surface" => {
                i += 1;
                let value = args.get(i).ok_or("Missing value for --surface")?;
                surface = Some(PathBuf::from(value));
            }
            "--seed" => {
                i += 1;
                let value = args.get(i).ok_or("Missing value for --seed")?;
                seed = Some(value.parse().map_err(|_| format!("Invalid seed: {}", value))?);
            }
            "-o" | "--output" => {
                i += 1;
                let value = args.get(i).ok_or("Missing value for --output")?;
                output = PathBuf::from(value);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            path => {
                if config.is_some() {
                    return Err("Multiple config files specified".to_string());
                }
                config = Some(PathBuf::from(path));
            }
        }
        i += 1;
    }

    let config = config.ok_or("Missing config file")?;
    Ok(Args { config, surface, seed, output })
}

/// Parse a comma separated elevation grid, rows index Y
fn load_surface(path: &Path) -> Result<SurfaceField> {
    let text = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|cell| cell.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("{}:{}: {}", path.display(), line_no + 1, e)))?;
        rows.push(row);
    }
    SurfaceField::from_rows(rows)
}

fn run(args: &Args) -> Result<()> {
    let mut config = ForestConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let surface = args.surface.as_deref().map(load_surface).transpose()?;

    let seed = config.seed;
    let generator = ForestGenerator::new(config)?;
    let forest = generator.generate(surface)?;

    let report = ForestReport::new(&forest, seed);
    let json = report.to_json().map_err(|e| Error::Config(e.to_string()))?;
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.output, json)?;

    println!(
        "  {} trees grown, {} skipped, {} not placed",
        forest.grown_count(),
        forest.trees.len() - forest.grown_count(),
        forest.placement_failures.len()
    );
    Ok(())
}

fn main() {
    logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    println!("Forest Generation Utility");
    println!("=========================");
    println!("Config: {}", args.config.display());
    if let Some(surface) = &args.surface {
        println!("Surface: {}", surface.display());
    }
    println!("Report: {}", args.output.display());
    println!();

    let start = Instant::now();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    println!("Completed in {:.2}s", start.elapsed().as_secs_f64());
}
