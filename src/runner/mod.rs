//! Load runner.
//!
//! Spawns a fixed number of virtual users, each running the scenario loop
//! in its own task until the configured duration elapses, then gathers the
//! shared metrics into a [`RunReport`].

mod report;

pub use report::*;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::client::SecretsService;
use crate::config::{Config, LoadConfig};
use crate::error::Result;
use crate::metrics::RunMetrics;
use crate::scenario::{Credentials, VirtualUser};
use crate::types::{Operation, VuId};

/// Drives virtual users against a secrets service for a fixed duration.
pub struct LoadRunner {
    load: LoadConfig,
    target: String,
    transit_key: String,
    service: Arc<dyn SecretsService>,
    credentials: Arc<Credentials>,
    metrics: Arc<RunMetrics>,
    shutdown_tx: broadcast::Sender<()>,
}

impl LoadRunner {
    /// Create a runner with fresh metrics.
    pub fn new(
        config: &Config,
        service: Arc<dyn SecretsService>,
        credentials: Credentials,
    ) -> Result<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            load: config.load.clone(),
            target: config.vault.addr.clone(),
            transit_key: config.vault.transit_key.clone(),
            service,
            credentials: Arc::new(credentials),
            metrics: Arc::new(RunMetrics::new()?),
            shutdown_tx,
        })
    }

    /// Metrics shared by this run's virtual users.
    pub fn metrics(&self) -> Arc<RunMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Sender that stops the run early when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run all virtual users to completion.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started = tokio::time::Instant::now();
        let deadline = started + self.load.duration;

        info!(
            %run_id,
            vus = self.load.vus,
            duration = ?self.load.duration,
            target = %self.target,
            "Starting load run"
        );

        let mut tasks = JoinSet::new();

        for n in 1..=self.load.vus {
            let mut vu = VirtualUser::new(
                VuId(n),
                Arc::clone(&self.service),
                Arc::clone(&self.credentials),
                Arc::clone(&self.metrics),
            )
            .with_payload_len(self.load.payload_len);

            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let metrics = Arc::clone(&self.metrics);
            let think_time = self.load.think_time;

            tasks.spawn(async move {
                metrics.vus_active.inc();
                let iterations = vu.run_until(deadline, think_time, &mut shutdown_rx).await;
                metrics.vus_active.dec();
                (vu.id(), iterations)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, iterations)) => debug!(vu = %id, iterations, "Virtual user finished"),
                Err(e) => error!("Virtual user task failed: {}", e),
            }
        }

        let elapsed = started.elapsed();
        let counters = self.metrics.snapshot();

        info!(
            %run_id,
            iterations = counters.iterations,
            failures = counters.total_failures(),
            elapsed = ?elapsed,
            "Load run finished"
        );

        Ok(RunReport {
            run_id,
            target: self.target.clone(),
            transit_key: self.transit_key.clone(),
            vus: self.load.vus,
            duration: self.load.duration,
            elapsed,
            counters,
            latency: Operation::ALL
                .iter()
                .map(|&operation| OperationLatency {
                    operation,
                    latency: self.metrics.latency(operation),
                })
                .collect(),
        })
    }

    /// Stop all virtual users.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl std::fmt::Debug for LoadRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRunner")
            .field("load", &self.load)
            .field("target", &self.target)
            .field("transit_key", &self.transit_key)
            .finish_non_exhaustive()
    }
}
