use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use turnstile_config::TurnstileConfig;
use turnstile_core::{ChatKey, Event, EventBus, ExecutionFailure, JobPayload};
use turnstile_runtime::{JobOutcome, LaneScheduler, LaneSettings, Turn, TurnExecutor};

/// Stand-in for the LLM loop: sleeps, then reports what it was given.
struct SleepingExecutor {
    delay: Duration,
}

#[async_trait]
impl TurnExecutor for SleepingExecutor {
    type Output = String;

    async fn execute(&self, turn: Turn) -> Result<String, ExecutionFailure> {
        tokio::time::sleep(self.delay).await;
        Ok(format!(
            "round {} answered {} message(s): {}",
            turn.round,
            turn.jobs.len(),
            turn.combined_text().replace('\n', " | ")
        ))
    }
}

pub(super) async fn cmd_simulate(
    config: TurnstileConfig,
    keys: Vec<String>,
    delay_ms: u64,
    gap_ms: u64,
) -> turnstile_core::Result<()> {
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(Event::Shutdown) | Err(RecvError::Closed) => break,
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "event printer fell behind");
                    continue;
                }
            };
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
        }
    });

    let settings = LaneSettings::from(&config.lanes);
    info!(
        max_concurrency = settings.max_concurrency,
        correction_merge = settings.enable_correction_merge,
        jobs = keys.len(),
        "starting simulation"
    );
    let scheduler = LaneScheduler::with_events(
        SleepingExecutor {
            delay: Duration::from_millis(delay_ms),
        },
        settings,
        events.clone(),
    );

    let mut pending = Vec::with_capacity(keys.len());
    for (n, key) in keys.into_iter().enumerate() {
        let key = ChatKey::new(key);
        let payload = JobPayload::chat(key.channel(), format!("message #{}", n + 1));
        pending.push(scheduler.enqueue(key, payload));
        if gap_ms > 0 {
            tokio::time::sleep(Duration::from_millis(gap_ms)).await;
        }
    }

    for job in pending {
        let Ok(settlement) = job.settlement.await else {
            continue;
        };
        match &settlement.outcome {
            JobOutcome::Completed(reply) => {
                info!(job_id = %settlement.job_id, folded = settlement.folded.len(), reply = %reply, "job settled")
            }
            JobOutcome::Failed(failure) => {
                info!(job_id = %settlement.job_id, error = %failure, "job failed")
            }
            JobOutcome::Cancelled => info!(job_id = %settlement.job_id, "job cancelled"),
        }
    }

    events.publish(Event::Shutdown);
    let _ = printer.await;
    println!("{}", serde_json::to_string_pretty(&scheduler.stats())?);
    Ok(())
}
