use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::state::AppState;
use crate::tasks::{derivation, sweeper};

const DERIVATION_WORKER_CONCURRENCY: usize = 2;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(DERIVATION_WORKER_CONCURRENCY + 1);

    for _ in 0..DERIVATION_WORKER_CONCURRENCY {
        handles.push(tokio::spawn(derivation_worker(state.clone(), shutdown_rx.clone())));
    }

    handles.push(tokio::spawn(sweep_loop(state.clone(), shutdown_rx.clone())));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn derivation_worker(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let poll = Duration::from_secs(state.settings().exam().derivation_poll_seconds);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match derivation::process_next_fact(&state).await {
            Ok(Some(_)) => continue,
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "Failed to process finalized fact"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(poll) => {}
        }
    }
}

async fn sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(state.settings().exam().sweep_interval_seconds));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweeper::expire_stale_attempts(&state).await {
                    tracing::error!(error = %err, "expire_stale_attempts failed");
                }
            }
        }
    }
}
