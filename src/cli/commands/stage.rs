//! One-shot stage runs and the stage listing.

use anyhow::Context;
use console::style;

use crate::cli::icons::{dim_arrow, error, success};
use scorewatch::config::Config;
use scorewatch::pipeline::StageId;
use scorewatch::stages::{build_scheduler, Services};

pub async fn cmd_stage(
    config: &Config,
    stage: StageId,
    follow: bool,
    country: Option<String>,
) -> anyhow::Result<()> {
    // One-shot runs never start the periodic tickers.
    let mut config = config.clone();
    config.schedule.clear();

    let services = Services::from_config(&config)
        .await
        .context("Failed to set up scraper services")?;
    let handle = build_scheduler(&config, &services)?.start()?;

    let payload = match country {
        Some(country) => serde_json::json!({ "country": country }),
        None => serde_json::Value::Null,
    };
    if follow {
        handle.run_with(stage, payload).await?;
    } else {
        handle.run_alone_with(stage, payload).await?;
    }

    handle.wait_idle().await;

    let mut failed = false;
    for id in StageId::ALL {
        let stats = handle.stats(id).await?;
        if stats.completed + stats.failed == 0 {
            continue;
        }
        match (stats.last_error.as_ref(), stats.last_report.as_ref()) {
            (Some(err), _) if stats.failed > 0 => {
                failed = true;
                eprintln!("{} {}: {}", error(), style(id).cyan(), err);
            }
            (_, Some(report)) => {
                eprintln!(
                    "{} {}: {} records ({} tasks ok, {} failed)",
                    success(),
                    style(id).cyan(),
                    report.emitted,
                    report.succeeded,
                    report.failed
                );
            }
            _ => {}
        }
    }

    handle.shutdown().await;

    if failed {
        anyhow::bail!("stage run failed");
    }
    Ok(())
}

pub fn cmd_stages(config: &Config) -> anyhow::Result<()> {
    let graph = scorewatch::stages::STAGE_GRAPH;
    let intervals = config.intervals()?;
    let prime = config.prime_stages()?;

    println!("{}", style("Stages").bold());
    for (id, downstream) in graph {
        let interval = intervals
            .iter()
            .find(|(stage, _)| *stage == id)
            .map(|(_, d)| format!("every {}s", d.as_secs()))
            .unwrap_or_else(|| "on trigger".to_string());

        let mut line = format!("  {:<14} {}", id.as_str(), style(interval).dim());
        if prime.contains(&id) {
            line.push_str(&format!(" {}", style("[startup]").green()));
        }
        println!("{}", line);

        for next in downstream {
            println!("    {} {}", dim_arrow(), next);
        }
    }
    Ok(())
}
