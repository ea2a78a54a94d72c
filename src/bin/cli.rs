//! Boatrace CLI - Bet recommendations from finishing-position probabilities

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use boatrace::core::{compute_recommendations, flatten_recommendations, FlatViewConfig};
use boatrace::data::{fetch_or_uniform, load_prediction_file, JsonFileSource, ProbabilitySource};
use boatrace::error::validate_boat_set;
use boatrace::{
    BetCandidate, BoatProbability, ConfidenceTier, FlatRecommendation, RecommendResponse,
    RecommendationSet, WagerType,
};

/// Default prediction directory (relative to project root)
const DEFAULT_DATA_DIR: &str = "data/predictions";

#[derive(Parser)]
#[command(name = "boatrace")]
#[command(author, version, about = "Boat race bet recommendation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to prediction directory (race_<id>.json files)
    #[arg(long, env = "BOATRACE_DATA_DIR", default_value = DEFAULT_DATA_DIR, global = true)]
    data_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend bets for a single race
    Recommend {
        /// Race id to load from the data directory
        #[arg(short, long, required_unless_present = "input")]
        race: Option<u64>,

        /// Read probabilities from this file instead
        #[arg(short, long, conflicts_with = "race")]
        input: Option<PathBuf>,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,

        /// Include the flat 単勝 + 2連単 view
        #[arg(long)]
        flat: bool,

        /// Reject incomplete or out-of-range probability tables
        #[arg(long)]
        strict: bool,

        /// Rows shown per wager type in table output
        #[arg(long, default_value = "10")]
        top: usize,

        /// Flat view: minimum win probability
        #[arg(long, default_value = "0.25")]
        win_threshold: f64,

        /// Flat view: minimum 2連単 probability
        #[arg(long, default_value = "0.08")]
        pair_threshold: f64,

        /// Flat view: maximum rows
        #[arg(long, default_value = "10")]
        flat_limit: usize,
    },

    /// List races with stored predictions
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Recommend {
            race,
            input,
            json,
            flat,
            strict,
            top,
            win_threshold,
            pair_threshold,
            flat_limit,
        } => {
            let flat_config = flat.then_some(FlatViewConfig {
                win_threshold,
                pair_threshold,
                limit: flat_limit,
            });
            recommend(
                &cli.data_dir,
                race,
                input.as_deref(),
                json,
                strict,
                top,
                flat_config,
            )?;
        }
        Commands::List => {
            list_races(&cli.data_dir)?;
        }
    }

    Ok(())
}

/// Probability table plus fallback details
struct Loaded {
    race_id: Option<u64>,
    boats: Vec<BoatProbability>,
    warning: Option<String>,
    error: Option<String>,
}

fn load_boats(
    data_dir: &Path,
    race: Option<u64>,
    input: Option<&Path>,
    strict: bool,
) -> Result<Loaded> {
    if let Some(path) = input {
        let (race_id, boats) = load_prediction_file(path)
            .with_context(|| format!("Failed to load predictions from {:?}", path))?;
        return Ok(Loaded {
            race_id: race.or(race_id),
            boats,
            warning: None,
            error: None,
        });
    }

    let race_id = race.context("Either --race or --input is required")?;
    let source = JsonFileSource::new(data_dir);

    // Strict mode surfaces source errors instead of falling back
    if strict {
        let boats = source
            .fetch_boat_probabilities(race_id)
            .with_context(|| format!("Failed to load predictions for race {}", race_id))?;
        return Ok(Loaded {
            race_id: Some(race_id),
            boats,
            warning: None,
            error: None,
        });
    }

    let fetched = fetch_or_uniform(&source, race_id);
    Ok(Loaded {
        race_id: Some(race_id),
        boats: fetched.boats,
        warning: fetched.warning,
        error: fetched.error,
    })
}

fn recommend(
    data_dir: &Path,
    race: Option<u64>,
    input: Option<&Path>,
    json: bool,
    strict: bool,
    top: usize,
    flat_config: Option<FlatViewConfig>,
) -> Result<()> {
    let loaded = load_boats(data_dir, race, input, strict)?;

    if strict {
        validate_boat_set(&loaded.boats).context("Invalid probability table")?;
    }

    info!(
        "Computing recommendations for {} boats{}",
        loaded.boats.len(),
        loaded
            .race_id
            .map(|id| format!(" (race {})", id))
            .unwrap_or_default()
    );

    let recommendations = compute_recommendations(&loaded.boats);
    let flat_rows = flat_config
        .as_ref()
        .map(|config| flatten_recommendations(&recommendations, config));

    if json {
        let response = RecommendResponse {
            race_id: loaded.race_id,
            predictions: loaded.boats,
            recommendations,
            flat: flat_rows,
            warning: loaded.warning,
            error: loaded.error,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if let Some(race_id) = loaded.race_id {
        println!("{}: race {}", "Recommending".green(), race_id);
        println!();
    }
    if let Some(ref warning) = loaded.warning {
        println!("{} {}", "Warning:".yellow().bold(), warning);
        if let Some(ref error) = loaded.error {
            println!("{}", format!("({})", error).dimmed());
        }
        println!();
    }

    print_probabilities(&loaded.boats);
    print_recommendations(&recommendations, top);
    if let Some(rows) = flat_rows {
        print_flat(&rows);
    }

    Ok(())
}

fn print_probabilities(boats: &[BoatProbability]) {
    println!("{}", "着順予想 (Position Probabilities):".yellow().bold());
    println!(
        "{:>4} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "艇番", "1着", "2着", "3着", "4着", "5着", "6着"
    );
    println!("{}", "-".repeat(60));

    let mut sorted: Vec<&BoatProbability> = boats.iter().collect();
    sorted.sort_by_key(|b| b.boat_number);

    for boat in sorted {
        let p = boat.rank_probs();
        println!(
            "{:>4} {:>7.1}% {:>7.1}% {:>7.1}% {:>7.1}% {:>7.1}% {:>7.1}%",
            boat.boat_number,
            p[0] * 100.0,
            p[1] * 100.0,
            p[2] * 100.0,
            p[3] * 100.0,
            p[4] * 100.0,
            p[5] * 100.0
        );
    }
    println!();
}

fn tier_colored(tier: ConfidenceTier) -> ColoredString {
    match tier {
        ConfidenceTier::High => tier.label().red().bold(),
        ConfidenceTier::Medium => tier.label().yellow(),
        ConfidenceTier::Low => tier.label().dimmed(),
    }
}

fn print_candidates(wager_type: WagerType, candidates: &[BetCandidate], top: usize) {
    if candidates.is_empty() {
        println!(
            "{}",
            format!("(組合せがありません: {}艇以上必要)", wager_type.arity()).dimmed()
        );
        return;
    }

    println!("{:>10} {:>10} {:>6}", "組合せ", "確率", "信頼度");
    println!("{}", "-".repeat(32));
    for c in candidates.iter().take(top) {
        println!(
            "{:>10} {:>9.2}% {:>6}",
            c.combination,
            c.probability * 100.0,
            tier_colored(c.confidence)
        );
    }
}

fn print_recommendations(set: &RecommendationSet, top: usize) {
    for (wager_type, candidates) in set.iter() {
        println!(
            "{}",
            format!("{}予想 ({:?}):", wager_type.display_name(), wager_type)
                .yellow()
                .bold()
        );
        print_candidates(wager_type, candidates, top);
        println!();
    }
}

fn print_flat(rows: &[FlatRecommendation]) {
    println!("{}", "おすすめ (Top Picks):".yellow().bold());
    if rows.is_empty() {
        println!("{}", "(条件を満たす買い目がありません)".dimmed());
        return;
    }

    println!("{:>6} {:>10} {:>10} {:>6}", "券種", "買い目", "確率", "信頼度");
    println!("{}", "-".repeat(38));
    for row in rows {
        println!(
            "{:>6} {:>10} {:>9.2}% {:>6}",
            row.wager_type.display_name(),
            row.bet,
            row.probability * 100.0,
            tier_colored(row.confidence)
        );
    }
    println!();
}

fn list_races(data_dir: &Path) -> Result<()> {
    println!("{}: {:?}", "Listing races in".green(), data_dir);
    println!();

    let races = JsonFileSource::new(data_dir)
        .list_races()
        .with_context(|| format!("Failed to list races in {:?}", data_dir))?;

    if races.is_empty() {
        println!("{}", "No prediction files found.".yellow());
        return Ok(());
    }

    for race_id in &races {
        println!("  {}", race_id);
    }
    println!();
    println!("Total: {} races", races.len());

    Ok(())
}
