use jobs::InMemJobs;
use solver_heur::HeurSolver;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<InMemJobs<HeurSolver>>,
}

impl AppState {
    pub fn new_default() -> Self {
        let jobs = InMemJobs::new(HeurSolver::new());
        Self { jobs: Arc::new(jobs) }
    }
}
