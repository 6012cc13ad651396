// Job registry. `reconcile` cancels every registered task and starts exactly one task per
// distinct job, so calling it on every start/upgrade never duplicates schedules.
// Each task sleeps until its next cron instant (UTC) and runs the job under a timeout.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ReportConfig, RollupConfig, ScheduleConfig};
use crate::report::{self, DocumentPublisher};
use crate::rollup;
use crate::sample_store::SampleStore;
use crate::sampler::Sampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Job {
    SampleQueue,
    BuildReport,
    RollupStorage,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::SampleQueue => "sample_queue",
            Job::BuildReport => "build_report",
            Job::RollupStorage => "rollup_storage",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job: Job,
    pub cron: String,
}

/// The three jobs this service runs.
pub fn desired_jobs(config: &ScheduleConfig) -> Vec<JobSpec> {
    vec![
        JobSpec {
            job: Job::SampleQueue,
            cron: config.sample_cron.clone(),
        },
        JobSpec {
            job: Job::BuildReport,
            cron: config.report_cron.clone(),
        },
        JobSpec {
            job: Job::RollupStorage,
            cron: config.rollup_cron.clone(),
        },
    ]
}

#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: Job, now: DateTime<Utc>) -> anyhow::Result<()>;
}

/// Runs the real jobs against the store.
pub struct ServiceJobs {
    pub sampler: Sampler,
    pub store: Arc<SampleStore>,
    pub publisher: Arc<dyn DocumentPublisher>,
    pub report: ReportConfig,
    pub rollup: RollupConfig,
}

#[async_trait]
impl JobRunner for ServiceJobs {
    async fn run(&self, job: Job, now: DateTime<Utc>) -> anyhow::Result<()> {
        match job {
            Job::SampleQueue => {
                self.sampler.run_once(now).await?;
            }
            Job::BuildReport => {
                report::run_report(&self.store, self.publisher.as_ref(), &self.report, now)
                    .await?;
            }
            Job::RollupStorage => {
                rollup::run_rollup(self.store.as_ref(), &self.rollup, now).await?;
            }
        }
        Ok(())
    }
}

struct Registered {
    spec: JobSpec,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    runner: Arc<dyn JobRunner>,
    timeout: Duration,
    tasks: BTreeMap<Job, Registered>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn JobRunner>, timeout: Duration) -> Self {
        Self {
            runner,
            timeout,
            tasks: BTreeMap::new(),
        }
    }

    /// Replaces the registry with `desired`. Every expression is parsed before anything is
    /// cancelled, so a bad one leaves the current registry running. Later duplicates win.
    pub fn reconcile(&mut self, desired: &[JobSpec]) -> anyhow::Result<()> {
        let mut parsed: BTreeMap<Job, (JobSpec, cron::Schedule)> = BTreeMap::new();
        for spec in desired {
            let schedule = cron::Schedule::from_str(&spec.cron).map_err(|e| {
                anyhow::anyhow!("invalid cron {:?} for {}: {}", spec.cron, spec.job, e)
            })?;
            parsed.insert(spec.job, (spec.clone(), schedule));
        }

        self.cancel_all();
        for (job, (spec, schedule)) in parsed {
            let handle = tokio::spawn(job_loop(
                self.runner.clone(),
                job,
                schedule,
                self.timeout,
            ));
            debug!(%job, cron = %spec.cron, "job registered");
            self.tasks.insert(job, Registered { spec, handle });
        }
        info!(jobs = self.tasks.len(), "schedule reconciled");
        Ok(())
    }

    pub fn registered(&self) -> Vec<JobSpec> {
        self.tasks.values().map(|r| r.spec.clone()).collect()
    }

    pub fn cancel_all(&mut self) {
        for (_, registered) in std::mem::take(&mut self.tasks) {
            registered.handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn job_loop(
    runner: Arc<dyn JobRunner>,
    job: Job,
    schedule: cron::Schedule,
    timeout: Duration,
) {
    loop {
        let now = Utc::now();
        let Some(next) = schedule.after(&now).next() else {
            warn!(%job, "schedule has no upcoming run; job stopped");
            return;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
        tokio::time::sleep(delay).await;

        match tokio::time::timeout(timeout, runner.run(job, Utc::now())).await {
            Ok(Ok(())) => debug!(%job, "job complete"),
            Ok(Err(e)) => warn!(%job, error = %e, "job failed"),
            Err(_) => warn!(
                %job,
                timeout_secs = timeout.as_secs(),
                "job exceeded its time budget; abandoned"
            ),
        }
    }
}
