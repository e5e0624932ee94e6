pub mod anneal;
pub mod combine;
pub mod construct;
pub mod initial;
pub mod orchestrator;

use async_trait::async_trait;
use sched_core::{CancelFlag, SolveEnvelope, SolveResult, Solver};

pub use construct::AttemptError;
pub use orchestrator::run;

/// Timetable search: constructive placement, annealing, or both, driven by
/// the attempt orchestrator on a blocking thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeurSolver;

impl HeurSolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Solver for HeurSolver {
    async fn solve(&self, env: SolveEnvelope, cancel: CancelFlag) -> anyhow::Result<SolveResult> {
        let res = tokio::task::spawn_blocking(move || run(&env, &cancel)).await??;
        Ok(res)
    }
}
