//! Baken CLI - expected-value ranking and race registration for netkeiba races

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use baken::core::{ExpectationEngine, RankedEntry};
use baken::scraper::{
    validate_race_id, ExtractionOutcome, ListingMode, RaceScraper, ScrapedRaceCard, ScraperConfig,
};
use baken::storage::Repository;
use baken::{IncompleteOddsError, RaceInfo, RowFailure};

/// Default SQLite database file
const DEFAULT_DB: &str = "horse_racing.db";

#[derive(Parser)]
#[command(name = "baken")]
#[command(author, version, about = "netkeiba expected-value CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Run in interactive mode (default when no command is given)
    #[arg(short, long)]
    interactive: bool,

    /// Path to SQLite database
    #[arg(long, env = "BAKEN_DB", default_value = DEFAULT_DB)]
    db: PathBuf,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank a race's entries by expected value of a win bet
    Predict {
        /// netkeiba race id (12 digits)
        #[arg(short, long)]
        race_id: String,

        /// EV threshold for highlighting
        #[arg(long, default_value = "1.0")]
        threshold: f64,

        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scrape a race and store it in the database
    Register {
        /// netkeiba race id (12 digits)
        #[arg(short, long)]
        race_id: String,
    },
}

/// JSON output of `predict`
#[derive(Serialize)]
struct PredictionReport<'a> {
    race_id: &'a str,
    race: &'a RaceInfo,
    outcome: ExtractionOutcome,
    failures: &'a [RowFailure],
    win_rate_table: &'static str,
    ranking: Vec<RankedEntry<'a>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let config = ScraperConfig {
        timeout_secs: cli.timeout,
        ..Default::default()
    };
    let scraper = RaceScraper::new(config).context("Failed to create HTTP client")?;

    match cli.command {
        Some(Commands::Predict {
            race_id,
            threshold,
            json,
        }) if !cli.interactive => predict_race(&rt, &scraper, &race_id, threshold, json),
        Some(Commands::Register { race_id }) if !cli.interactive => {
            register_race(&rt, &scraper, &cli.db, &race_id)
        }
        _ => run_interactive(&rt, &scraper, &cli.db),
    }
}

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn fetch_card(
    rt: &tokio::runtime::Runtime,
    scraper: &RaceScraper,
    race_id: &str,
) -> Result<ScrapedRaceCard> {
    let pb = spinner(format!("Fetching race card {}...", race_id))?;
    let card = rt.block_on(scraper.fetch_race_card(race_id, ListingMode::PreRace));
    pb.finish_and_clear();
    card.with_context(|| format!("Failed to scrape race card {}", race_id))
}

fn predict_race(
    rt: &tokio::runtime::Runtime,
    scraper: &RaceScraper,
    race_id: &str,
    threshold: f64,
    json: bool,
) -> Result<()> {
    validate_race_id(race_id)?;
    let card = fetch_card(rt, scraper, race_id)?;
    let engine = ExpectationEngine::with_defaults();

    if json {
        let ranking = engine.rank(&card.race)?;
        let report = PredictionReport {
            race_id,
            race: &card.race,
            outcome: card.outcome(),
            failures: &card.failures,
            win_rate_table: engine.table().version,
            ranking,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_race_header(race_id, &card.race);
    print_failures(&card.failures, card.outcome());

    let ranking = match engine.rank(&card.race) {
        Ok(ranking) => ranking,
        Err(IncompleteOddsError { missing }) => {
            println!(
                "{} 馬番 {:?} のオッズが未確定のため予想できません。",
                "!".red().bold(),
                missing
            );
            return Ok(());
        }
    };

    if ranking.is_empty() {
        println!("{}", "No entries found for this race.".red());
        return Ok(());
    }

    println!("{}", "人気順期待値 (Expected Value by Popularity):".yellow().bold());
    println!(
        "{:>4} {:>4} {:<18} {:>7} {:>7} {:>7}",
        "人気", "馬番", "馬名", "オッズ", "勝率", "期待値"
    );
    println!("{}", "-".repeat(56));

    let mut bet_count = 0;
    for ranked in &ranking {
        let ev_str = format!("{:.3}", ranked.expected_value);
        let ev_color = if ranked.expected_value >= threshold {
            bet_count += 1;
            ev_str.green().bold()
        } else {
            ev_str.normal()
        };

        println!(
            "{:>4} {:>4} {:<18} {:>7.1} {:>6.1}% {:>7}",
            ranked.popularity_rank + 1,
            ranked.entry.post_position(),
            truncate_name(ranked.entry.horse().name(), 9),
            ranked.odds,
            ranked.win_rate * 100.0,
            ev_color
        );
    }
    println!();

    if ranking.len() < card.race.entries().len() {
        println!(
            "{} {}頭は人気順位表の範囲外です。",
            "※".dimmed(),
            card.race.entries().len() - ranking.len()
        );
    }

    if bet_count > 0 {
        println!(
            "{} EV ≥ {:.2} のベット候補: {}件",
            "→".green(),
            threshold,
            bet_count
        );
    } else {
        println!("{} EV ≥ {:.2} の候補はありません。", "→".dimmed(), threshold);
    }
    println!();

    Ok(())
}

fn register_race(
    rt: &tokio::runtime::Runtime,
    scraper: &RaceScraper,
    db: &Path,
    race_id: &str,
) -> Result<()> {
    validate_race_id(race_id)?;
    let mut repo = Repository::open(db)
        .with_context(|| format!("Failed to open database {:?}", db))?;

    let card = fetch_card(rt, scraper, race_id)?;
    print_failures(&card.failures, card.outcome());
    let summary = repo
        .save_race_card(race_id, &card)
        .with_context(|| format!("Failed to save race card {}", race_id))?;
    println!(
        "{}: 出馬表 {}頭 (skipped {})",
        "Saved".green(),
        summary.race_cards,
        summary.skipped
    );

    let pb = spinner(format!("Fetching result {}...", race_id))?;
    let result = rt.block_on(scraper.fetch_race_result(race_id));
    pb.finish_and_clear();
    let result = result.with_context(|| format!("Failed to scrape result {}", race_id))?;

    match result {
        Some(result) => {
            print_failures(&result.failures, result.outcome());
            let summary = repo
                .save_race_result(race_id, &result)
                .with_context(|| format!("Failed to save result {}", race_id))?;
            println!(
                "{}: 成績 {}頭 (skipped {})",
                "Saved".green(),
                summary.past_performances,
                summary.skipped
            );
        }
        None => println!("レースID {} は結果確定前です。", race_id),
    }

    Ok(())
}

fn print_race_header(race_id: &str, race: &RaceInfo) {
    let name = race.race_name().unwrap_or("-");
    println!("{}: {} ({})", "Race".green(), name, race_id);

    let mut details = vec![format!(
        "{}{}m",
        race.track_surface().code(),
        race.distance_in_meters()
    )];
    if let Some(course) = race.course() {
        details.insert(0, course.to_string());
    }
    if let Some(date) = race.race_date() {
        details.insert(0, date.format("%Y-%m-%d").to_string());
    }
    if let Some(weather) = race.weather() {
        details.push(format!("天候:{}", weather.label()));
    }
    if let Some(condition) = race.track_condition() {
        details.push(format!("馬場:{}", condition.label()));
    }
    println!("{}", details.join(" / "));
    println!();
}

fn print_failures(failures: &[RowFailure], outcome: ExtractionOutcome) {
    match outcome {
        ExtractionOutcome::Complete => {}
        ExtractionOutcome::Partial { failed } => {
            println!("{} {} row(s) skipped:", "Warning:".yellow(), failed);
        }
        ExtractionOutcome::Empty { failed } => {
            println!("{} no rows extracted ({} failed)", "Warning:".red(), failed);
        }
    }
    for failure in failures {
        println!("  {}", failure.to_string().dimmed());
    }
    if !failures.is_empty() {
        println!();
    }
}

fn run_interactive(rt: &tokio::runtime::Runtime, scraper: &RaceScraper, db: &Path) -> Result<()> {
    println!("{}", format!("Baken CLI v{}", env!("CARGO_PKG_VERSION")).cyan().bold());
    println!();

    let theme = ColorfulTheme::default();

    loop {
        let options = ["予想モード", "レース番組登録モード", "終了"];

        let selection = Select::with_theme(&theme)
            .with_prompt("モードを選択してください")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => {
                let race_id = prompt_race_id(&theme)?;
                let threshold: f64 = Input::with_theme(&theme)
                    .with_prompt("EV threshold")
                    .default(1.0)
                    .interact_text()?;

                println!();
                if let Err(e) = predict_race(rt, scraper, &race_id, threshold, false) {
                    println!("{} {:#}", "Error:".red(), e);
                }
                println!();
            }
            1 => {
                let race_id = prompt_race_id(&theme)?;

                println!();
                if let Err(e) = register_race(rt, scraper, db, &race_id) {
                    println!("{} {:#}", "Error:".red(), e);
                }
                println!();
            }
            _ => {
                println!("終了します。");
                break;
            }
        }
    }

    Ok(())
}

fn prompt_race_id(theme: &ColorfulTheme) -> Result<String> {
    let race_id: String = Input::with_theme(theme)
        .with_prompt("レースID (12桁)")
        .validate_with(|input: &String| -> Result<(), String> {
            validate_race_id(input.trim()).map_err(|e| e.to_string())
        })
        .interact_text()?;
    Ok(race_id.trim().to_string())
}

/// Truncate name to fit display width
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        name.to_string()
    } else {
        chars[..max_len - 1].iter().collect::<String>() + "…"
    }
}
