// Batch runner entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config and credentials (fatal on error, before any writes)
// 3. Open database
// 4. Seed reference data (teams, prop-type aliases)
// 5. Build identity resolver and reconciler
// 6. Per league: ingest the odds feed, then the game-log feed
// 7. Recompute defense ranks
// 8. Recompute analytics records
// 9. Run the health report
// 10. Log the run summary

use std::path::Path;
use std::sync::Arc;

use propline_core::analytics::AnalyticsEngine;
use propline_core::config;
use propline_core::db::Database;
use propline_core::defense;
use propline_core::feed::game_logs::HttpGameLogFeed;
use propline_core::feed::odds::HttpOddsFeed;
use propline_core::feed::RecordFeed;
use propline_core::health::{HealthMonitor, Severity};
use propline_core::identity::aliases::load_alias_csv;
use propline_core::identity::props::display_label;
use propline_core::identity::teams::all_static_teams;
use propline_core::identity::IdentityResolver;
use propline_core::reconcile::{ReconcileSummary, Reconciler};

use anyhow::Context;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file)
    init_tracing()?;
    info!("propline run starting");

    // 2. Load config and credentials
    let config = config::load_config().context("failed to load configuration")?;
    let api_key = config.odds_api_key().context("cannot reach upstream feeds")?.to_string();
    info!(
        "Config loaded: leagues={:?}, season={}, sub_batch_size={}",
        config.leagues, config.upstream.season, config.reconcile.sub_batch_size
    );

    // 3. Open database
    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);

    // 4. Seed reference data
    let teams = db
        .seed_teams(&all_static_teams())
        .context("failed to seed teams")?;
    let aliases = load_alias_csv(Path::new(&config.data_paths.prop_type_aliases))
        .context("failed to load prop-type aliases")?;
    let alias_rows = db
        .seed_prop_aliases(&aliases)
        .context("failed to seed prop-type aliases")?;
    info!(teams, aliases = alias_rows, "reference data seeded");

    // 5. Build identity resolver and reconciler
    let resolver = IdentityResolver::load(&db).context("failed to load identity tables")?;
    let reconciler = Reconciler::new(Arc::clone(&db), resolver, config.reconcile.sub_batch_size);
    let settings = config.feed_settings();
    let season = config.upstream.season.clone();

    // 6. Per league: odds feed, then game-log feed
    let mut total = ReconcileSummary::default();
    let mut aborted_feeds = 0usize;
    for &league in &config.leagues {
        let odds = HttpOddsFeed::new(
            &config.upstream.odds_base_url,
            &api_key,
            league,
            &season,
            config.request_timeout(),
        )
        .context("failed to build odds feed")?;
        let logs = HttpGameLogFeed::new(
            &config.upstream.game_log_base_url,
            &api_key,
            league,
            &season,
            config.request_timeout(),
        )
        .context("failed to build game-log feed")?;

        let feeds: [&dyn RecordFeed; 2] = [&odds, &logs];
        for feed in feeds {
            let run = reconciler.run_feed(feed, &settings).await;
            info!(feed = feed.name(), pages = run.pages, "{}", run.summary);
            if let Some(e) = &run.aborted {
                aborted_feeds += 1;
                error!(feed = feed.name(), "feed stopped early: {e}");
            }
            total.merge(&run.summary);
        }
    }

    // 7. Recompute defense ranks
    for &league in &config.leagues {
        match defense::recompute_season(&db, league, &season) {
            Ok(n) => info!(league = %league, prop_types = n, "defense ranks ready"),
            Err(e) => error!(league = %league, "defense rank recompute failed: {e:#}"),
        }
    }

    // 8. Recompute analytics records
    let mut engine = AnalyticsEngine::new(&db, config.analytics.windows.clone());
    match engine.recompute_all(&config.analytics.season) {
        Ok(n) => info!(records = n, "analytics ready"),
        Err(e) => error!("analytics recompute failed: {e:#}"),
    }

    // 9. Run the health report
    let monitor = HealthMonitor::new(&db, config.health.stale_after_days, config.health.sample_limit);
    let today = chrono::Utc::now().date_naive();
    match monitor.run(today) {
        Ok(report) => {
            report.log();
            if report.worst() == Some(Severity::Critical) {
                warn!("health report has critical issues");
            }
        }
        Err(e) => error!("health report failed: {e:#}"),
    }

    // 10. Log the run summary
    info!(aborted_feeds, "run complete: {total}");
    for (category, count) in &total.by_category {
        info!(category = %category, count, "skip/error category");
    }
    for (prop_type, count) in &total.by_prop_type {
        info!(prop_type = %display_label(prop_type), count, "stored by prop type");
    }
    Ok(())
}

/// Initialize tracing to log to `logs/propline.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("propline.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("propline=info,propline_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
