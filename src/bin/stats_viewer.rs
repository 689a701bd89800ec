//! # Stats Viewer CLI
//!
//! Command-line tool for logging, querying and inspecting page stats.
//!
//! Usage:
//!   stats-viewer log <entity> [--visit] [--browser ID] [--referrer HOST] [--at SECS]
//!   stats-viewer logs <entity> <from> [to] [--resolution hourly|daily] [--format json]
//!   stats-viewer totals <entity> <from> [to]
//!   stats-viewer seed <entity> <from> [to] [--max-per-hour N] [--rng-seed N]
//!   stats-viewer shards <entity> [--kind counts|categories]
//!   stats-viewer dump <entity> <YYYY-MM> <counts|categories> [--raw]

use clap::{Parser, Subcommand, ValueEnum};
use page_stats::codec::record;
use page_stats::{
    Analysis, CategoriesRecord, CountsRecord, DateRange, LogKind, MetricsStore, Month, Resolution,
    Seeder, Stats, StatsConfig, StatsError, StatsLogs, Totals,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stats-viewer")]
#[command(about = "Log and query time-bucketed page stats", long_about = None)]
struct Cli {
    /// Root directory of the stats content tree (overrides config and STATS_ROOT_DIR)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one request against an entity
    Log {
        /// Entity id, e.g. blog/hello-world
        entity: String,

        /// Count the request as a visit (implies a view)
        #[arg(long)]
        visit: bool,

        /// Browser id, e.g. ff@78
        #[arg(long)]
        browser: Option<String>,

        /// Referrer host
        #[arg(long)]
        referrer: Option<String>,

        /// Event time (Unix seconds), defaults to now
        #[arg(long)]
        at: Option<i64>,
    },

    /// Show both series of an entity over a date range
    Logs {
        entity: String,

        /// First day (YYYY-MM-DD)
        from: String,

        /// Day after the last one (YYYY-MM-DD), defaults to from + 1 day
        to: Option<String>,

        /// hourly or daily
        #[arg(short, long, default_value = "hourly")]
        resolution: Resolution,

        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
    },

    /// Show range-wide sums of an entity
    Totals {
        entity: String,
        from: String,
        to: Option<String>,

        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
    },

    /// Backfill random demo traffic for every hour of a date range
    Seed {
        entity: String,
        from: String,
        to: Option<String>,

        /// Upper bound of events per hour
        #[arg(long, default_value_t = 100)]
        max_per_hour: u32,

        /// Seed for a reproducible run
        #[arg(long)]
        rng_seed: Option<u64>,
    },

    /// List the shard files of an entity
    Shards {
        entity: String,

        #[arg(long)]
        kind: Option<LogKind>,
    },

    /// Print the records of one shard
    Dump {
        entity: String,

        /// Month (YYYY-MM)
        month: Month,

        kind: LogKind,

        /// Print raw field values instead of typed records
        #[arg(long)]
        raw: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = StatsConfig::from_file(path)?;
            config.apply_env()?;
            config
        }
        None => StatsConfig::from_env()?,
    };
    if let Some(dir) = cli.dir {
        config.root_dir = dir;
    }

    let stats = Stats::open(config)?;

    match cli.command {
        Commands::Log {
            entity,
            visit,
            browser,
            referrer,
            at,
        } => {
            let analysis = Analysis {
                view: true,
                visit,
                browser_id: browser,
                referrer_host: referrer,
            };
            let report = match at {
                Some(time) => stats.log_at(&entity, time, &analysis)?,
                None => stats.log(&entity, &analysis)?,
            };

            println!("Logged {}", entity);
            if let Some(outcome) = report.counts {
                println!("  counts:     {:?}", outcome);
            }
            if let Some(outcome) = report.categories {
                println!("  categories: {:?}", outcome);
            }
        }

        Commands::Logs {
            entity,
            from,
            to,
            resolution,
            format,
        } => {
            let logs = stats.logs(&entity, &from, to.as_deref(), resolution)?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&logs)?),
                Format::Pretty => print_logs(&entity, resolution, &logs),
            }
        }

        Commands::Totals {
            entity,
            from,
            to,
            format,
        } => {
            let totals = stats.totals(&entity, &from, to.as_deref())?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&totals)?),
                Format::Pretty => print_totals(&entity, &totals),
            }
        }

        Commands::Seed {
            entity,
            from,
            to,
            max_per_hour,
            rng_seed,
        } => {
            let range = DateRange::parse(&from, to.as_deref())?;
            let store = stats.store(&entity)?;
            let seeder = Seeder {
                max_events_per_hour: max_per_hour,
                ..Default::default()
            };

            let report = match rng_seed {
                Some(seed) => seeder.seed(&store, &range, &mut StdRng::seed_from_u64(seed))?,
                None => seeder.seed(&store, &range, &mut rand::thread_rng())?,
            };
            println!(
                "Seeded {}: {} events, {} visits over {} hours",
                entity, report.events, report.visits, report.hours
            );
        }

        Commands::Shards { entity, kind } => {
            let store = existing_store(&stats, &entity)?;
            let shards = store.shards().list(kind)?;

            println!("{} shard(s) for {}:\n", shards.len(), entity);
            for shard in shards {
                println!(
                    "  {}  {:<10}  {:>8} bytes  {}",
                    shard.month,
                    shard.kind,
                    shard.size_bytes,
                    shard.path.display()
                );
            }
        }

        Commands::Dump {
            entity,
            month,
            kind,
            raw,
        } => {
            let store = existing_store(&stats, &entity)?;
            dump_shard(&store, month, kind, raw)?;
        }
    }

    Ok(())
}

fn existing_store(stats: &Stats, entity: &str) -> Result<MetricsStore, Box<dyn std::error::Error>> {
    stats
        .find_store(entity)?
        .ok_or_else(|| format!("no stats container for {:?}", entity).into())
}

fn dump_shard(
    store: &MetricsStore,
    month: Month,
    kind: LogKind,
    raw: bool,
) -> Result<(), StatsError> {
    match kind {
        LogKind::Counts => {
            let Some(log) = store.counts_log(month, false)? else {
                println!("No {} shard for {}", kind, month);
                return Ok(());
            };
            if raw {
                for row in log.read_raw(false)? {
                    println!("{}", serde_json::Value::Object(row));
                }
            } else {
                for record in log.read()? {
                    println!("{}", record::encode::<CountsRecord>(&record));
                }
            }
        }
        LogKind::Categories => {
            let Some(log) = store.categories_log(month, false)? else {
                println!("No {} shard for {}", kind, month);
                return Ok(());
            };
            if raw {
                for row in log.read_raw(false)? {
                    println!("{}", serde_json::Value::Object(row));
                }
            } else {
                for record in log.read()? {
                    println!("{}", record::encode::<CategoriesRecord>(&record));
                }
            }
        }
    }
    Ok(())
}

fn print_logs(entity: &str, resolution: Resolution, logs: &StatsLogs) {
    println!("Stats for {} ({})\n", entity, resolution);

    println!("───────────────────────────────────────────────────────────");
    println!("Counts ({} buckets)", logs.counts.len());
    println!("───────────────────────────────────────────────────────────\n");
    for (time, counts) in &logs.counts {
        println!(
            "{}  views: {:>6}  visits: {:>6}",
            format_time(*time),
            counts.views,
            counts.visits
        );
    }

    println!("\n───────────────────────────────────────────────────────────");
    println!("Categories ({} buckets)", logs.categories.len());
    println!("───────────────────────────────────────────────────────────\n");
    for (time, categories) in &logs.categories {
        println!("{}", format_time(*time));
        for (browser, count) in &categories.browsers {
            println!("   browser   {:<24} {:>6}", browser, count);
        }
        for (referrer, count) in &categories.referrers {
            println!("   referrer  {:<24} {:>6}", referrer, count);
        }
    }
    println!();
}

fn print_totals(entity: &str, totals: &Totals) {
    println!("Totals for {}\n", entity);
    println!("Views:   {}", totals.views);
    println!("Visits:  {}", totals.visits);

    if !totals.browsers.is_empty() {
        println!("\nBrowsers:");
        for (browser, count) in &totals.browsers {
            println!("  {:<24} {:>6}", browser, count);
        }
    }
    if !totals.referrers.is_empty() {
        println!("\nReferrers:");
        for (referrer, count) in &totals.referrers {
            println!("  {:<24} {:>6}", referrer, count);
        }
    }
}

fn format_time(time: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(time, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| time.to_string())
}
