use parking_lot::RwLock;
use sched_core::{CancelFlag, SolveEnvelope, SolveResult, Solver};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use types::SolveStatus;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, ToSchema)]
pub struct JobId(pub String);

/// Lifecycle of a timetabling job. A finished run lands in `Solved`,
/// `Infeasible` (best failed attempt attached) or `Cancelled`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, ToSchema)]
#[serde(tag = "status")]
pub enum JobStatus {
    Queued,
    Running,
    Solved { result: SolveResult },
    Infeasible { result: SolveResult },
    Cancelled { result: Option<SolveResult> },
    Failed { message: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn result(&self) -> Option<&SolveResult> {
        match self {
            JobStatus::Solved { result } | JobStatus::Infeasible { result } => Some(result),
            JobStatus::Cancelled { result } => result.as_ref(),
            _ => None,
        }
    }
}

impl From<SolveResult> for JobStatus {
    fn from(result: SolveResult) -> Self {
        match result.status {
            SolveStatus::Solved => JobStatus::Solved { result },
            SolveStatus::BestFailed => JobStatus::Infeasible { result },
            SolveStatus::Cancelled => JobStatus::Cancelled { result: Some(result) },
        }
    }
}

struct Entry {
    status: JobStatus,
    cancel: CancelFlag,
}

#[derive(Clone)]
pub struct InMemJobs<S: Solver> {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
    solver: Arc<S>,
}

impl<S: Solver> InMemJobs<S> {
    pub fn new(solver: S) -> Self {
        Self {
            inner: Default::default(),
            solver: Arc::new(solver),
        }
    }

    pub fn enqueue(&self, env: SolveEnvelope) -> JobId {
        let id = Uuid::new_v4().to_string();
        let cancel = CancelFlag::new();
        self.inner.write().insert(
            id.clone(),
            Entry {
                status: JobStatus::Queued,
                cancel: cancel.clone(),
            },
        );

        let map = self.inner.clone();
        let solver = self.solver.clone();
        let id_for_task = id.clone();

        tokio::spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            set_status(&map, &id_for_task, JobStatus::Running);
            let status = match solver.solve(env, cancel).await {
                Ok(res) => {
                    info!(job = %id_for_task, status = ?res.status, attempts = res.attempts, "job finished");
                    JobStatus::from(res)
                }
                Err(e) => {
                    error!(?e, job = %id_for_task, "job failed");
                    JobStatus::Failed { message: e.to_string() }
                }
            };
            set_status(&map, &id_for_task, status);
        });

        JobId(id)
    }

    pub fn get(&self, id: &str) -> Option<JobStatus> {
        self.inner.read().get(id).map(|e| e.status.clone())
    }

    /// Raises the job's cancel flag. A queued job is marked cancelled at
    /// once; a running one stops at its next attempt boundary. Returns
    /// `false` for unknown or already finished jobs.
    pub fn cancel(&self, id: &str) -> bool {
        let mut w = self.inner.write();
        let Some(entry) = w.get_mut(id) else {
            return false;
        };
        if entry.status.is_finished() {
            return false;
        }
        entry.cancel.cancel();
        if matches!(entry.status, JobStatus::Queued) {
            entry.status = JobStatus::Cancelled { result: None };
        }
        info!(job = %id, "cancellation requested");
        true
    }
}

fn set_status(map: &RwLock<HashMap<String, Entry>>, id: &str, status: JobStatus) {
    if let Some(entry) = map.write().get_mut(id) {
        entry.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use types::{Instance, RunParams, SolveParams};

    struct Stub(SolveStatus);

    #[async_trait]
    impl Solver for Stub {
        async fn solve(&self, _env: SolveEnvelope, cancel: CancelFlag) -> anyhow::Result<SolveResult> {
            while matches!(self.0, SolveStatus::Cancelled) && !cancel.is_cancelled() {
                tokio::task::yield_now().await;
            }
            Ok(SolveResult {
                status: self.0,
                schedules: vec![],
                best_failed: None,
                attempts: 1,
                combined_requirements: vec![],
                log: vec![],
                stats: serde_json::Value::Null,
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl Solver for Broken {
        async fn solve(&self, _env: SolveEnvelope, _cancel: CancelFlag) -> anyhow::Result<SolveResult> {
            anyhow::bail!("solver exploded")
        }
    }

    fn env() -> SolveEnvelope {
        SolveEnvelope {
            instance: Instance {
                params: RunParams::default(),
                teachers: vec![],
                requirements: vec![],
                cohort_clashes: vec![],
            },
            params: SolveParams::default(),
        }
    }

    async fn wait_finished<S: Solver>(jobs: &InMemJobs<S>, id: &str) -> JobStatus {
        for _ in 0..10_000 {
            if let Some(s) = jobs.get(id).filter(JobStatus::is_finished) {
                return s;
            }
            tokio::task::yield_now().await;
        }
        panic!("job {id} did not finish");
    }

    #[tokio::test]
    async fn finished_run_maps_to_status() {
        let jobs = InMemJobs::new(Stub(SolveStatus::Solved));
        let id = jobs.enqueue(env());
        assert!(matches!(wait_finished(&jobs, &id.0).await, JobStatus::Solved { .. }));

        let jobs = InMemJobs::new(Stub(SolveStatus::BestFailed));
        let id = jobs.enqueue(env());
        let status = wait_finished(&jobs, &id.0).await;
        assert!(matches!(status, JobStatus::Infeasible { .. }));
        assert_eq!(status.result().map(|r| r.attempts), Some(1));
        assert!(!jobs.cancel(&id.0));
    }

    #[tokio::test]
    async fn solver_errors_become_failed() {
        let jobs = InMemJobs::new(Broken);
        let id = jobs.enqueue(env());
        match wait_finished(&jobs, &id.0).await {
            JobStatus::Failed { message } => assert_eq!(message, "solver exploded"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_job_finishes_as_cancelled() {
        let jobs = InMemJobs::new(Stub(SolveStatus::Cancelled));
        let id = jobs.enqueue(env());
        assert!(jobs.cancel(&id.0));
        assert!(matches!(wait_finished(&jobs, &id.0).await, JobStatus::Cancelled { .. }));
        assert!(!jobs.cancel("missing"));
    }
}
