//! Long-running pipeline.

use anyhow::Context;
use console::style;

use crate::cli::icons::{info, success, warn};
use scorewatch::config::Config;
use scorewatch::stages::{build_scheduler, Services};

pub async fn cmd_run(config: &Config, prime: bool) -> anyhow::Result<()> {
    let services = Services::from_config(config)
        .await
        .context("Failed to set up scraper services")?;

    let handle = build_scheduler(config, &services)?.start()?;

    if prime {
        for stage in config.prime_stages()? {
            handle.run_once(stage).await?;
            eprintln!("{} Queued {}", info(), style(stage).cyan());
        }
    }

    for (stage, interval) in config.intervals()? {
        eprintln!(
            "{} {} every {}s",
            info(),
            style(stage).cyan(),
            interval.as_secs()
        );
    }
    eprintln!("{} Pipeline running. Press Ctrl-C to stop.", success());

    tokio::signal::ctrl_c().await?;
    eprintln!("{} Stopping; waiting for running stages to finish...", warn());

    handle.shutdown().await;

    eprintln!("{} Stopped", success());
    Ok(())
}
