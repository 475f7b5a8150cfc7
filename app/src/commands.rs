//! Subcommand implementations. Each returns whether the run counts as a
//! success for the exit code.

use crate::cli::{CheckArgs, RecheckArgs};
use crate::services::AppServices;
use futures::StreamExt;
use regscout_checker::{CheckRequest, QueryEvent};
use regscout_queue::{Job, JobState};
use std::io::Write;
use tracing::{debug, info};

fn request(domain: &str, providers: &[String], timeout_ms: Option<u64>) -> CheckRequest {
    let mut request = CheckRequest::new(domain);
    if !providers.is_empty() {
        request = request.with_providers(providers.iter().cloned());
    }
    if let Some(timeout_ms) = timeout_ms {
        request = request.with_timeout_ms(timeout_ms);
    }
    request
}

/// `regscout check`
pub async fn check<W: Write>(
    services: &AppServices,
    args: &CheckArgs,
    out: &mut W,
) -> anyhow::Result<bool> {
    let request = request(&args.domain, &args.providers, args.timeout_ms);

    if !args.stream {
        let report = services.aggregator.check(&request).await?;
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(report.ok);
    }

    let query = services.aggregator.resolve(&request)?;
    let mut events = services.aggregator.stream(query);
    let mut ok = false;
    while let Some(event) = events.next().await {
        out.write_all(event.to_sse().as_bytes())?;
        out.flush()?;
        if let QueryEvent::Done(summary) = event {
            ok = summary.ok;
        }
    }
    Ok(ok)
}

/// `regscout recheck`
pub async fn recheck<W: Write>(
    services: &AppServices,
    args: &RecheckArgs,
    out: &mut W,
) -> anyhow::Result<bool> {
    let request = request(&args.domain, &args.providers, args.timeout_ms);
    let ids = services.queue.enqueue_request(&request).await?;
    info!(jobs = ids.len(), domain = %args.domain, "queued rechecks");

    let handle = services.queue.start().await?;
    let drained = handle.drained().await;
    handle.shutdown().await;
    let counts = drained?;
    debug!(completed = counts.completed, failed = counts.failed, "queue drained");

    let mut jobs: Vec<Job> = Vec::with_capacity(ids.len());
    for id in ids {
        jobs.push(services.queue.get(id).await?);
    }
    serde_json::to_writer_pretty(&mut *out, &jobs)?;
    writeln!(out)?;

    Ok(jobs.iter().any(|job| job.state == JobState::Completed))
}

/// `regscout providers`
pub fn providers<W: Write>(services: &AppServices, out: &mut W) -> anyhow::Result<bool> {
    let registry = services.aggregator.registry();
    for id in registry.ids() {
        let kind = registry
            .kind_of(id)
            .map_or_else(String::new, |kind| kind.to_string());
        writeln!(out, "{:<12} {:<8} {}", id.as_str(), kind, id.display_name())?;
    }
    Ok(!registry.is_empty())
}
