use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;

use youtube_merge::matcher::merge;
use youtube_merge::models::{MergeStats, URL_COLUMN};
use youtube_merge::progress::{create_spinner, format_duration};
use youtube_merge::safety::ensure_input_exists;
use youtube_merge::table::{read_csv, write_csv_atomic};

#[derive(Parser)]
#[command(name = "youtube-merge", version)]
#[command(about = "Matches rows from a source CSV to a target CSV by year, country, and artist,
then adds the 'youtube_url' from the source to the target.
WARNING: This overwrites the target file.")]
struct Args {
    /// The path to the source CSV file (e.g., a.csv)
    source: PathBuf,

    /// The path to the target CSV file (e.g., b.csv)
    target: PathBuf,
}

fn run(source_path: &Path, target_path: &Path) -> Result<MergeStats> {
    let start = Instant::now();

    ensure_input_exists(source_path, "Source")?;
    ensure_input_exists(target_path, "Target")?;

    println!("Reading source data from: {}", source_path.display());
    println!("Reading target data from: {}", target_path.display());

    let spinner = create_spinner("Loading CSV files");
    let source = read_csv(source_path)?;
    let target = read_csv(target_path)?;
    spinner.finish_and_clear();

    if target.column_index(URL_COLUMN).is_some() {
        println!(
            "'{}' column already exists in target. Will fill in missing values.",
            URL_COLUMN
        );
    } else {
        println!("Creating '{}' column in target.", URL_COLUMN);
    }

    println!("Standardizing key columns for a reliable match...");
    let output = merge(&source, target)?;
    let mut stats = output.stats;

    println!(
        "Created a specific map with {} artist-level entries.",
        stats.specific_map_entries
    );
    println!(
        "Created a general map with {} unambiguous country-level entries.",
        stats.general_map_entries
    );
    println!(
        "Matched {} rows using the specific artist key.",
        stats.pass1_matches
    );
    println!(
        "Matched an additional {} rows using the year/country fallback.",
        stats.pass2_matches
    );

    let spinner = create_spinner("Writing target file");
    write_csv_atomic(&output.table, target_path)?;
    spinner.finish_and_clear();

    let elapsed = start.elapsed();
    stats.elapsed_seconds = elapsed.as_secs_f64();

    println!("\n--- Success! ---");
    println!(
        "The file '{}' has been updated. Total rows with URLs: {} ({:.1}%)",
        target_path.display(),
        stats.rows_with_url,
        stats.coverage()
    );
    println!("  Elapsed: {}", format_duration(elapsed));

    Ok(stats)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let stats = run(&args.source, &args.target)?;
    stats.log_phase("merge");

    Ok(())
}
