//! playbill-scrape - scrape pass and operator commands
//!
//! Every subcommand opens (or creates) the database below the resolved root folder.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use playbill_common::config::{resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use playbill_common::db::{init_database, Company, ProductionStatus};
use playbill_common::CanonicalWork;
use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use playbill_scrape::db::productions::{self, ProductionFilter};
use playbill_scrape::db::{companies, sources};
use playbill_scrape::services::aggregator::DEFAULT_STALE_DAYS;
use playbill_scrape::services::review::DEFAULT_UNDO_WINDOW_MINUTES;
use playbill_scrape::services::{
    seed_default_companies, Aggregator, CatalogFilter, Maintenance, ReviewService, ScrapeRunner,
};

/// Command-line arguments for playbill-scrape
#[derive(Parser, Debug)]
#[command(name = "playbill-scrape")]
#[command(about = "Scrape, normalize, deduplicate and review theater productions")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, global = true, env = "PLAYBILL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the default companies and their sources
    Seed,

    /// Run every enabled source (or one company's sources)
    Scrape {
        /// Company slug
        #[arg(long)]
        company: Option<String>,
    },

    /// List REVIEW groups
    Review,

    /// Publish a company's REVIEW rows for a work
    Approve(GroupArgs),

    /// Archive a company's REVIEW rows for a work
    Reject(GroupArgs),

    /// Move a company's rows for a work back to REVIEW
    Revert {
        #[command(flatten)]
        group: GroupArgs,

        /// Status to move back (PUBLISHED or ARCHIVED)
        #[arg(long)]
        from: ProductionStatus,
    },

    /// Undo the last group action for a company and work
    Undo {
        #[command(flatten)]
        group: GroupArgs,

        /// Minutes after which an action can no longer be undone
        #[arg(long, default_value_t = DEFAULT_UNDO_WINDOW_MINUTES)]
        window_minutes: i64,
    },

    /// Replace the dates of a REVIEW group
    UpdateDates {
        #[command(flatten)]
        group: GroupArgs,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },

    /// Print the public catalog
    Catalog {
        /// Work code (e.g. HAMLET)
        #[arg(long)]
        work: Option<CanonicalWork>,

        /// Company slug
        #[arg(long)]
        company: Option<String>,

        /// Text matched against title and company name
        #[arg(long)]
        query: Option<String>,

        /// Runs playing on or after this day
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Runs starting on or before this day
        #[arg(long)]
        until: Option<NaiveDate>,

        /// Hide companies not scraped within this many days (defaults to the configured value)
        #[arg(long)]
        stale_days: Option<i64>,

        /// Include companies regardless of their last scrape
        #[arg(long, conflicts_with = "stale_days")]
        include_stale: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Page through stored productions
    Search {
        /// Work code (e.g. HAMLET)
        #[arg(long)]
        work: Option<CanonicalWork>,

        /// Company slug
        #[arg(long)]
        company: Option<String>,

        /// Text matched against title, company name and city
        #[arg(long)]
        query: Option<String>,

        /// Rows in this status (defaults to PUBLISHED)
        #[arg(long)]
        status: Option<ProductionStatus>,

        /// Page size
        #[arg(long)]
        limit: Option<u32>,

        /// Cursor printed by the previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Upcoming published productions per work
    Works,

    /// Per-company audit
    Report,

    /// Re-resolve published titles against the current catalog and aliases
    Renormalize,

    /// Delete rows stored without a known work
    PurgeOther,
}

#[derive(clap::Args, Debug)]
struct GroupArgs {
    /// Company slug
    #[arg(long)]
    company: String,

    /// Work code (e.g. HAMLET)
    #[arg(long)]
    work: CanonicalWork,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config)?;

    info!(
        "Starting playbill-scrape v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let db_path = config.database_file(&root_folder);
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path).await.context("Failed to open database")?;

    let today = Local::now().date_naive();

    match args.command {
        Command::Seed => {
            let report = seed_default_companies(&pool).await?;
            println!(
                "Created {} companies and {} sources",
                report.companies_created, report.sources_created
            );
        }

        Command::Scrape { company } => {
            let runner = ScrapeRunner::new(pool.clone(), &config.scraper)?;
            let summary = match company {
                Some(slug) => {
                    let company = company_by_slug(&pool, &slug).await?;
                    let sources = sources::list_sources_for_company(&pool, company.guid).await?;
                    runner.run_sources(sources).await
                }
                None => runner.run_all().await?,
            };
            println!(
                "{} sources: {} new, {} updated, {} rejected, {} failed, {} regressions",
                summary.sources, summary.new, summary.updated, summary.rejected, summary.failed, summary.regressions
            );
        }

        Command::Review => {
            let groups = Aggregator::new(pool.clone()).review_groups().await?;
            if groups.is_empty() {
                println!("Nothing to review");
            }
            for group in groups {
                println!(
                    "{} | {} | {} to {} | {} rows | confidence {:.2}-{:.2}",
                    group.company_name,
                    group.work.code(),
                    group.start_date,
                    group.end_date,
                    group.count,
                    group.confidence_min,
                    group.confidence_max
                );
                for title in &group.sample_titles {
                    println!("    {}", title);
                }
            }
        }

        Command::Approve(group) => {
            let company = company_by_slug(&pool, &group.company).await?;
            let report = ReviewService::new(pool.clone()).approve_group(company.guid, group.work).await?;
            println!("Published {} rows", report.affected());
        }

        Command::Reject(group) => {
            let company = company_by_slug(&pool, &group.company).await?;
            let report = ReviewService::new(pool.clone()).reject_group(company.guid, group.work).await?;
            println!("Archived {} rows", report.affected());
        }

        Command::Revert { group, from } => {
            let company = company_by_slug(&pool, &group.company).await?;
            let report = ReviewService::new(pool.clone())
                .revert_group(company.guid, group.work, from)
                .await?;
            println!("Moved {} rows back to REVIEW", report.affected());
        }

        Command::Undo { group, window_minutes } => {
            let company = company_by_slug(&pool, &group.company).await?;
            let report = ReviewService::new(pool.clone())
                .undo_last_group_action(company.guid, group.work, Duration::minutes(window_minutes))
                .await?;
            println!("Restored {} rows", report.affected());
        }

        Command::UpdateDates { group, start, end } => {
            let company = company_by_slug(&pool, &group.company).await?;
            let updated = ReviewService::new(pool.clone())
                .update_group_dates(company.guid, group.work, start, end)
                .await?;
            println!("Updated {} rows", updated);
        }

        Command::Catalog {
            work,
            company,
            query,
            from,
            until,
            stale_days,
            include_stale,
            json,
        } => {
            let company_id = match company {
                Some(slug) => Some(company_by_slug(&pool, &slug).await?.guid),
                None => None,
            };
            let stale_days = if include_stale {
                None
            } else {
                Some(stale_days.unwrap_or(if config.scraper.stale_days > 0 {
                    config.scraper.stale_days
                } else {
                    DEFAULT_STALE_DAYS
                }))
            };

            let filter = CatalogFilter {
                work,
                company_id,
                query,
                from,
                until,
                stale_days,
            };
            let rows = Aggregator::new(pool.clone()).public_catalog(today, &filter).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in rows {
                    println!(
                        "{} to {} | {} | {} ({})",
                        row.start_date,
                        row.end_date,
                        row.title,
                        row.company_name,
                        [row.city.as_deref(), row.region.as_deref()]
                            .into_iter()
                            .flatten()
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
            }
        }

        Command::Search {
            work,
            company,
            query,
            status,
            limit,
            cursor,
        } => {
            let company_id = match company {
                Some(slug) => Some(company_by_slug(&pool, &slug).await?.guid),
                None => None,
            };
            let filter = ProductionFilter {
                work,
                company_id,
                query,
                status,
                ..ProductionFilter::default()
            };
            let page = productions::search_productions(&pool, &filter, limit, cursor.as_deref()).await?;
            for production in &page.productions {
                println!(
                    "{} to {} | {} | {} | {:.2}",
                    production.start_date,
                    production.end_date,
                    production.work.code(),
                    production.title_raw,
                    production.confidence
                );
            }
            if let Some(next) = page.next_cursor {
                println!("Next page: --cursor {}", next);
            }
        }

        Command::Works => {
            for (work, count) in productions::upcoming_counts_by_work(&pool, today).await? {
                println!("{} {}", work.title(), count);
            }
        }

        Command::Report => {
            for report in Maintenance::new(pool.clone()).company_report().await? {
                println!(
                    "{}: {} published, {} in review, {} sources, last run {} ({})",
                    report.company.name,
                    report.published,
                    report.review,
                    report.sources,
                    report
                        .latest_run_at
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                    report.latest_status.as_deref().unwrap_or("no status")
                );
                for (work, count) in &report.published_by_work {
                    println!("    {} {}", work.title(), count);
                }
            }
        }

        Command::Renormalize => {
            let report = Maintenance::new(pool.clone()).renormalize_published().await?;
            println!(
                "Checked {} published rows: {} archived, {} retargeted",
                report.checked, report.archived, report.retargeted
            );
        }

        Command::PurgeOther => {
            let deleted = Maintenance::new(pool.clone()).purge_other().await?;
            println!("Deleted {} rows", deleted);
        }
    }

    pool.close().await;
    Ok(())
}

/// Install the fmt subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("playbill_scrape={0},playbill_common={0}", config.logging.level)));

    let (stderr_layer, file_layer) = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (
                None,
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                ),
            )
        }
        None => (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

async fn company_by_slug(pool: &SqlitePool, slug: &str) -> Result<Company> {
    companies::find_company_by_slug(pool, slug)
        .await?
        .with_context(|| format!("No company with slug '{}'", slug))
}
