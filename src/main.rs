use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use image::imageops::FilterType;
use image::ImageReader;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use sortrs::core::analysis::{BasicInfo, Brightness, ColorStats, Contrast};
use sortrs::core::history::{History, RestoreSelection};
use sortrs::{
    AnalysisResult, CategorizedContent, Content, EngineConfig, OrganizationEngine, Strategy,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "sortrs", version, about = "Categorize, deduplicate and organize photo libraries")]
struct Cli {
    /// Config file (default: <config dir>/sortrs/config.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Duplicate workflows
    Duplicates {
        #[command(subcommand)]
        command: Dups,
    },

    /// Categorize every image under a directory and move it into a folder layout
    Organize {
        /// Directory to organize
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Storage root for the layout (default: `planner.storage_root`, relative to DIR)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// auto, date, category, quality or hybrid
        #[arg(short, long, default_value = "auto")]
        strategy: Strategy,
        /// Leave duplicates in their strategy folder
        #[arg(long)]
        keep_duplicates: bool,
        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Work with the move history of a storage root
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Subcommand, Debug)]
enum Dups {
    /// Find and list duplicate groups
    Scan {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List all history records
    List {
        /// Storage root the moves went into
        #[arg(short, long, value_name = "DIR")]
        root: PathBuf,
    },

    /// Move files back to where they were before a run
    Restore {
        /// Storage root the moves went into
        #[arg(short, long, value_name = "DIR")]
        root: PathBuf,
        /// Restore a specific record index
        #[arg(long, conflicts_with = "all")]
        record: Option<usize>,
        /// Restore all records
        #[arg(long, conflicts_with = "record")]
        all: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = EngineConfig::resolve(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Duplicates {
            command: Dups::Scan { path },
        } => {
            println!("▶ Scanning for duplicates in: {}", path.display());
            let engine = OrganizationEngine::new(config)?;
            let items = index(&engine, &path)?;
            let report = benchmark("duplicate detection", || engine.find_duplicates(&items));
            let summary = engine.storage_summary(&items, &report);
            println!(
                "📊 {} file(s), {} bytes, storage efficiency {:.1}%",
                summary.total_files,
                summary.total_bytes,
                summary.storage_efficiency * 100.0
            );

            if report.groups.is_empty() {
                println!("No duplicates found.");
                return Ok(());
            }
            println!("Found {} duplicate group(s):", report.groups.len());
            for (i, group) in report.groups.iter().enumerate() {
                println!(
                    " Group {} ({:?}, similarity {:.3}):",
                    i + 1,
                    group.kind,
                    group.similarity
                );
                for id in &group.member_ids {
                    if let Some(item) = items.iter().find(|c| &c.id == id) {
                        println!("   ▶ {}", item.path.display());
                    }
                }
            }
            println!(
                "\n💾 {} redundant file(s), {} bytes reclaimable",
                summary.duplicates_found, summary.reclaimable_bytes
            );
        }

        Commands::Organize {
            path,
            root,
            strategy,
            keep_duplicates,
            dry_run,
            yes,
        } => {
            let mut config = config;
            config.planner.storage_root = match root {
                Some(root) => root,
                None if config.planner.storage_root.is_relative() => {
                    path.join(&config.planner.storage_root)
                }
                None => config.planner.storage_root.clone(),
            };
            println!(
                "▶ Organizing {} into {}",
                path.display(),
                config.planner.storage_root.display()
            );

            let engine = OrganizationEngine::new(config)?;
            let items = index(&engine, &path)?;
            if items.is_empty() {
                println!("No images found.");
                return Ok(());
            }

            let groups = if keep_duplicates {
                Vec::new()
            } else {
                engine.find_duplicates(&items).groups
            };

            let mut categorized = benchmark("categorizing", || {
                items
                    .into_par_iter()
                    .map(|content| -> Result<CategorizedContent> {
                        let analysis = analyze_image(&content);
                        let assignments = engine.categorize(&content, &analysis, &[])?;
                        Ok(CategorizedContent::new(content, assignments))
                    })
                    .collect::<Result<Vec<_>>>()
            })?;

            let plan = engine.plan(&categorized, &groups, strategy);
            println!(
                "\n🗂️  {} strategy: {} folder(s), {} move(s)",
                plan.strategy,
                plan.folders.len(),
                plan.moves.len()
            );
            if plan.is_empty() {
                println!("Everything is already in place.");
                return Ok(());
            }
            for planned in &plan.moves {
                println!(
                    "   📦 {}{} → {}",
                    if dry_run { "[dry-run] " } else { "" },
                    planned.source_path.display(),
                    planned.dest_path.display()
                );
            }
            if dry_run {
                println!("\n⚠️  Dry-run only; no files were changed.");
                return Ok(());
            }

            if !yes
                && !Confirm::new()
                    .with_prompt(format!("Move {} file(s)?", plan.moves.len()))
                    .default(false)
                    .interact()?
            {
                println!("Aborted; no files were changed.");
                return Ok(());
            }

            let report = benchmark("moving files", || engine.execute(&plan, &mut categorized));
            println!(
                "\n✅ Created {} folder(s), moved {} file(s)",
                report.folders_created, report.items_moved
            );
            for error in &report.errors {
                eprintln!(
                    "⚠️  {} ({}): {}",
                    error.content_id,
                    error.source_path.display(),
                    error.reason
                );
            }
            if report.items_moved > 0 {
                println!("✅ Recorded history in {}", engine.history().path().display());
            }
        }

        Commands::History { command } => match command {
            HistoryCmd::List { root } => {
                let history = History::new(&root);
                let records = history
                    .read_all()
                    .with_context(|| format!("Could not read history {:?}", history.path()))?;

                println!("🗂️  History:");
                if records.is_empty() {
                    println!("   (empty)");
                }
                for (i, record) in records.iter().enumerate() {
                    println!(
                        "[{}] {}\n     strategy: {}\n     moved: {} file(s)",
                        i,
                        record.timestamp,
                        record.strategy,
                        record.moves.len()
                    );
                    for applied in &record.moves {
                        println!("       {} → {}", applied.from.display(), applied.to.display());
                    }
                }
            }

            HistoryCmd::Restore { root, record, all } => {
                let history = History::new(&root);
                let selection = match (record, all) {
                    (_, true) => RestoreSelection::All,
                    (Some(index), false) => RestoreSelection::Index(index),
                    (None, false) => RestoreSelection::Latest,
                };
                let summary = history
                    .restore(selection)
                    .with_context(|| format!("Failed to restore from {:?}", history.path()))?;

                for skipped in &summary.skipped {
                    eprintln!("⚠️  Could not restore {}; skipped", skipped.display());
                }
                println!(
                    "🔄 Restored {} file(s); 🧹 removed {} record(s) from history",
                    summary.files_restored, summary.records_restored
                );
            }
        },
    }

    Ok(())
}

/// Discover and hash every supported file under `dir`, with progress output.
fn index(engine: &OrganizationEngine, dir: &Path) -> Result<Vec<Content>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let files = engine.discover(dir);
    spinner.finish_with_message(format!("Found {} image(s)", files.len()));

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {msg}",
    )?);
    bar.set_message("hashing");
    let outcome = benchmark("hashing all images", || {
        engine.index_files(&files, |_| bar.inc(1))
    });
    bar.finish_and_clear();

    for (path, reason) in &outcome.skipped {
        eprintln!("⚠️  Skipping {}: {}", path.display(), reason);
    }
    Ok(outcome.items)
}

/// Cheap colour signals for the rule-based source. A block stays absent when
/// the file cannot be decoded.
fn analyze_image(content: &Content) -> AnalysisResult {
    let mut analysis = AnalysisResult::new(content.id.clone());
    let image = match ImageReader::open(&content.path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => match reader.decode() {
            Ok(image) => image,
            Err(e) => {
                log::debug!("Cannot decode {}: {}", content.path.display(), e);
                return analysis;
            }
        },
        Err(e) => {
            log::debug!("Cannot open {}: {}", content.path.display(), e);
            return analysis;
        }
    };
    analysis.basic = Some(BasicInfo::from_dimensions(image.width(), image.height()));

    let thumb = image.resize_exact(32, 32, FilterType::Triangle).to_rgb8();
    let luma: Vec<f64> = thumb
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .collect();
    let mean = luma.iter().sum::<f64>() / luma.len() as f64;
    let std = (luma.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / luma.len() as f64).sqrt();
    let colors: HashSet<(u8, u8, u8)> = thumb
        .pixels()
        .map(|p| (p[0] >> 4, p[1] >> 4, p[2] >> 4))
        .collect();

    analysis.color_stats = Some(ColorStats {
        brightness_category: match mean {
            m if m < 85.0 => Brightness::Dark,
            m if m > 170.0 => Brightness::Bright,
            _ => Brightness::Normal,
        },
        contrast_category: match std {
            s if s < 30.0 => Contrast::Low,
            s if s > 70.0 => Contrast::High,
            _ => Contrast::Normal,
        },
        diversity: colors.len() as f64,
    });
    analysis
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
