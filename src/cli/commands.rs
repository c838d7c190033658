//! Command handlers for the screener binary

use anyhow::Result;
use chrono::{NaiveDate, Timelike, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::pipeline::ScreeningPipeline;

/// Run one screening cycle and exit
pub async fn once(config: &Config) -> Result<()> {
    let pipeline = ScreeningPipeline::new(config.clone());
    pipeline.init().await;

    match pipeline.run_screening_cycle().await {
        Ok(summary) => {
            info!(
                "Done: {} discovered, {} evaluated, {} notified",
                summary.discovered, summary.evaluated, summary.notified
            );
            Ok(())
        }
        Err(e) => {
            pipeline.report_cycle_error(&e).await;
            Err(e.into())
        }
    }
}

/// Run one realtime monitoring pass and exit
pub async fn realtime(config: &Config) -> Result<()> {
    let pipeline = ScreeningPipeline::new(config.clone());
    pipeline.init().await;
    pipeline.run_realtime_cycle().await;
    Ok(())
}

/// Send the daily summary and exit
pub async fn report(config: &Config) -> Result<()> {
    let pipeline = ScreeningPipeline::new(config.clone());
    pipeline.init().await;
    pipeline.run_daily_report().await;
    Ok(())
}

/// Show persisted state counters
pub async fn status(config: &Config) -> Result<()> {
    let pipeline = ScreeningPipeline::new(config.clone());
    pipeline.init().await;

    let notified = pipeline.state().notified_count().await;
    let scans = pipeline.state().history_len().await;
    let (scans_24h, found_24h) = pipeline
        .state()
        .scan_stats_since(Utc::now() - chrono::Duration::days(1))
        .await;

    println!("State:");
    println!("  notified tokens (7d window): {}", notified);
    println!("  scan history entries: {}", scans);
    println!("  last 24h: {} scans, {} candidates", scans_24h, found_24h);
    Ok(())
}

/// Show the loaded configuration with secrets masked
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Run all cycles on their schedules until interrupted
pub async fn daemon(config: &Config) -> Result<()> {
    let pipeline = ScreeningPipeline::new(config.clone());
    pipeline.init().await;

    if !pipeline.hub().has_enabled_channel() {
        info!("No notification channel configured; alerts will only be logged");
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_cancel.cancel();
        }
    });

    let mut scan_interval = tokio::time::interval(std::time::Duration::from_secs(
        config.schedule.scan_interval_minutes * 60,
    ));
    let mut realtime_interval = tokio::time::interval(std::time::Duration::from_secs(
        config.schedule.realtime_interval_minutes * 60,
    ));
    let mut daily_check = tokio::time::interval(std::time::Duration::from_secs(60));
    let mut last_report_day: Option<NaiveDate> = None;

    info!(
        "⏰ Daemon started: scan every {}min, realtime every {}min, report at {}:00",
        config.schedule.scan_interval_minutes,
        config.schedule.realtime_interval_minutes,
        config.schedule.daily_report_hour
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = scan_interval.tick() => {
                if let Err(e) = pipeline.run_screening_cycle().await {
                    error!("Screening cycle failed: {}", e);
                    pipeline.report_cycle_error(&e).await;
                }
            }

            _ = realtime_interval.tick() => {
                pipeline.run_realtime_cycle().await;
            }

            _ = daily_check.tick() => {
                let now = Utc::now();
                let today = now.date_naive();
                if now.hour() == config.schedule.daily_report_hour
                    && last_report_day != Some(today)
                {
                    pipeline.run_daily_report().await;
                    last_report_day = Some(today);
                }
            }
        }
    }

    info!("👋 Daemon stopped");
    Ok(())
}
