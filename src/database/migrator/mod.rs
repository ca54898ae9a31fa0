// Startup schema migration: an ordered pipeline of idempotent steps.
//
// Steps run strictly in sequence, each under its own timeout. Only steps marked
// fatal abort startup; any other failure is logged, recorded in the report and
// the pipeline moves on. Running the pipeline twice is equivalent to running it once.

pub mod steps;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use super::manager::DatabaseError;
use crate::config;

/// What a step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied(String),
    Skipped(String),
}

/// Shared state threaded through the pipeline
pub struct MigrationContext {
    pub pool: PgPool,
    /// Set by the column step when `agents.company_id` had to be added in this run
    pub agents_company_id_added: bool,
    pub seed_baseline: bool,
    pub master_username: String,
    pub master_password: String,
    pub bcrypt_cost: u32,
}

impl MigrationContext {
    pub fn new(pool: PgPool) -> Self {
        let app = config::config();
        Self {
            pool,
            agents_company_id_added: false,
            seed_baseline: app.database.seed_baseline,
            master_username: app.bootstrap.master_username.clone(),
            master_password: app.bootstrap.master_password.clone(),
            bcrypt_cost: app.security.bcrypt_cost,
        }
    }
}

#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Stable name used in logs and reports
    fn name(&self) -> &'static str;

    /// A fatal step aborts the pipeline (and startup) when it fails
    fn is_fatal(&self) -> bool {
        false
    }

    /// Per-step override of the pipeline timeout
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError>;
}

pub type StepBox = Box<dyn MigrationStep>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: &'static str,
    pub status: StepStatus,
    pub detail: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub steps: Vec<StepReport>,
}

impl MigrationReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status == StepStatus::Failed)
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

pub struct MigrationPipeline {
    steps: Vec<StepBox>,
    step_timeout: Duration,
}

impl MigrationPipeline {
    pub fn new(step_timeout: Duration) -> Self {
        Self {
            steps: Vec::new(),
            step_timeout,
        }
    }

    pub fn with_step(mut self, step: StepBox) -> Self {
        self.steps.push(step);
        self
    }

    /// The production step order
    pub fn standard() -> Self {
        let step_timeout = Duration::from_secs(config::config().database.migration_step_timeout_secs);
        steps::standard_steps()
            .into_iter()
            .fold(Self::new(step_timeout), MigrationPipeline::with_step)
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order. Returns `Err` only when a fatal step fails.
    pub async fn run(&self, ctx: &mut MigrationContext) -> Result<MigrationReport, DatabaseError> {
        let mut report = MigrationReport::default();
        tracing::info!("Schema migration starting: steps={:?}", self.step_names());

        for step in &self.steps {
            let limit = step.timeout().unwrap_or(self.step_timeout);
            let started = Instant::now();
            let result = timeout(limit, step.apply(ctx)).await;
            let elapsed_ms = started.elapsed().as_millis();

            let (status, detail) = match result {
                Ok(Ok(StepOutcome::Applied(detail))) => {
                    tracing::info!("Migration step {} applied in {}ms: {}", step.name(), elapsed_ms, detail);
                    (StepStatus::Applied, detail)
                }
                Ok(Ok(StepOutcome::Skipped(detail))) => {
                    tracing::debug!("Migration step {} skipped: {}", step.name(), detail);
                    (StepStatus::Skipped, detail)
                }
                Ok(Err(error)) => (StepStatus::Failed, error.to_string()),
                Err(_elapsed) => (StepStatus::Failed, format!("timed out after {:?}", limit)),
            };

            if status == StepStatus::Failed {
                if step.is_fatal() {
                    tracing::error!("Fatal migration step {} failed: {}", step.name(), detail);
                    return Err(DatabaseError::MigrationStepFailed {
                        step: step.name(),
                        reason: detail,
                    });
                }
                tracing::warn!("Migration step {} failed, continuing: {}", step.name(), detail);
            }

            report.steps.push(StepReport {
                name: step.name(),
                status,
                detail,
                elapsed_ms,
            });
        }

        tracing::info!(
            "Schema migration finished: {} steps, {} failed",
            report.steps.len(),
            report.failures().count()
        );
        Ok(report)
    }
}

/// Run the standard pipeline against `pool` with configuration defaults
pub async fn run_startup_migration(pool: &PgPool) -> Result<MigrationReport, DatabaseError> {
    let mut ctx = MigrationContext::new(pool.clone());
    MigrationPipeline::standard().run(&mut ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        fatal: bool,
        behaviour: Behaviour,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[derive(Clone, Copy)]
    enum Behaviour {
        Apply,
        Skip,
        Fail,
        Hang,
    }

    #[async_trait]
    impl MigrationStep for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_fatal(&self) -> bool {
            self.fatal
        }

        async fn apply(&self, _ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
            self.log.lock().unwrap().push(self.name);
            match self.behaviour {
                Behaviour::Apply => Ok(StepOutcome::Applied("done".into())),
                Behaviour::Skip => Ok(StepOutcome::Skipped("nothing to do".into())),
                Behaviour::Fail => Err(DatabaseError::InvalidArgument("boom".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(StepOutcome::Applied("late".into()))
                }
            }
        }
    }

    fn ctx() -> MigrationContext {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        MigrationContext {
            pool,
            agents_company_id_added: false,
            seed_baseline: false,
            master_username: "master".into(),
            master_password: String::new(),
            bcrypt_cost: 4,
        }
    }

    fn pipeline(steps: &[(&'static str, bool, Behaviour)], log: &Arc<Mutex<Vec<&'static str>>>) -> MigrationPipeline {
        steps.iter().fold(MigrationPipeline::new(Duration::from_millis(50)), |p, &(name, fatal, behaviour)| {
            p.with_step(Box::new(Recorder {
                name,
                fatal,
                behaviour,
                log: log.clone(),
            }))
        })
    }

    #[tokio::test]
    async fn runs_steps_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let p = pipeline(&[("a", true, Behaviour::Apply), ("b", false, Behaviour::Skip), ("c", false, Behaviour::Apply)], &log);
        let report = p.run(&mut ctx()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(report.is_clean());
        assert_eq!(report.steps[1].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn non_fatal_failures_do_not_stop_the_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let p = pipeline(&[("a", false, Behaviour::Fail), ("b", false, Behaviour::Hang), ("c", false, Behaviour::Apply)], &log);
        let report = p.run(&mut ctx()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        let failed: Vec<_> = report.failures().map(|s| s.name).collect();
        assert_eq!(failed, vec!["a", "b"]);
        assert!(report.steps[1].detail.contains("timed out"));
    }

    #[tokio::test]
    async fn fatal_failure_aborts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let p = pipeline(&[("base", true, Behaviour::Fail), ("after", false, Behaviour::Apply)], &log);
        let err = p.run(&mut ctx()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::MigrationStepFailed { step: "base", .. }));
        assert_eq!(*log.lock().unwrap(), vec!["base"]);
    }

    #[test]
    fn standard_order_puts_index_work_before_provisioning() {
        let names = MigrationPipeline::standard().step_names();
        assert_eq!(names.first(), Some(&"create_base_tables"));
        let pos = |n: &str| names.iter().position(|s| *s == n).unwrap();
        assert!(pos("add_tenant_columns") < pos("backfill_sole_tenant"));
        assert!(pos("composite_agent_key") < pos("provision_tenant_tables"));
        assert!(pos("call_columns") < pos("provision_tenant_tables"));
        assert_eq!(names.last(), Some(&"seed_baseline"));
        assert_eq!(names.len(), 9);
    }
}
