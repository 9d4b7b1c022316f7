use anyhow::{Context, Result};
use binopt_core::SchedulerConfig;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::resolver::IdentifierResolver;
use crate::scanner::SettlementScanner;

/// Keeps a periodic task from overlapping itself.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    task: &'static str,
    running: Arc<Mutex<()>>,
}

impl SingleFlight {
    #[must_use]
    pub fn new(task: &'static str) -> Self {
        Self {
            task,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Drives `tick` unless a previous run is still in flight, in which case
    /// `tick` is dropped unpolled. Returns whether it ran.
    pub async fn run<F>(&self, tick: F) -> bool
    where
        F: Future<Output = ()>,
    {
        let Ok(_guard) = Arc::clone(&self.running).try_lock_owned() else {
            warn!(task = self.task, "Previous tick still running, skipping this firing");
            return false;
        };
        tick.await;
        true
    }
}

/// Runs the scanner and the resolver on fixed intervals.
pub struct SettlementScheduler {
    scanner: Arc<SettlementScanner>,
    resolver: Arc<IdentifierResolver>,
    config: SchedulerConfig,
}

impl SettlementScheduler {
    #[must_use]
    pub fn new(
        scanner: Arc<SettlementScanner>,
        resolver: Arc<IdentifierResolver>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            scanner,
            resolver,
            config,
        }
    }

    /// Registers both jobs and starts the scheduler.
    ///
    /// # Errors
    /// Returns an error if a job cannot be created or the scheduler fails to
    /// start.
    pub async fn start(&self) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;

        let scanner = Arc::clone(&self.scanner);
        let flight = SingleFlight::new("scanner");
        let scan_job = Job::new_repeated_async(
            Duration::from_secs(self.config.scan_interval_secs),
            move |_uuid, _lock| {
                let scanner = Arc::clone(&scanner);
                let flight = flight.clone();
                Box::pin(async move {
                    flight
                        .run(async {
                            if let Err(e) = scanner.tick(Utc::now()).await {
                                error!(error = %e, "Settlement tick failed");
                            }
                        })
                        .await;
                })
            },
        )
        .context("Failed to create scanner job")?;

        let resolver = Arc::clone(&self.resolver);
        let flight = SingleFlight::new("resolver");
        let resolve_job = Job::new_repeated_async(
            Duration::from_secs(self.config.resolve_interval_secs),
            move |_uuid, _lock| {
                let resolver = Arc::clone(&resolver);
                let flight = flight.clone();
                Box::pin(async move {
                    flight
                        .run(async {
                            if let Err(e) = resolver.tick().await {
                                error!(error = %e, "Resolver tick failed");
                            }
                        })
                        .await;
                })
            },
        )
        .context("Failed to create resolver job")?;

        scheduler.add(scan_job).await?;
        scheduler.add(resolve_job).await?;
        scheduler
            .start()
            .await
            .context("Failed to start job scheduler")?;

        info!(
            scan_interval_secs = self.config.scan_interval_secs,
            resolve_interval_secs = self.config.resolve_interval_secs,
            "Settlement scheduler started"
        );
        Ok(scheduler)
    }

    /// Runs until Ctrl-C, then stops the jobs.
    ///
    /// # Errors
    /// Returns an error if the scheduler fails to start or stop.
    pub async fn run_until_shutdown(&self) -> Result<()> {
        let mut scheduler = self.start().await?;

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("Shutdown signal received, stopping scheduler");

        scheduler
            .shutdown()
            .await
            .context("Failed to stop job scheduler")?;
        Ok(())
    }
}
