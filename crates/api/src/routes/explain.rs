use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use sched_core::{check_config, cost, evaluate, prepare, CapacityModel, CostBreakdown, RunLog};
use types::{AttemptMetrics, Grid, Instance, LogLine, PenaltyWeights};

#[derive(Deserialize, ToSchema)]
pub struct ExplainIn {
    pub instance: Instance,
    pub grid: Grid,
    #[serde(default)]
    pub weights: Option<PenaltyWeights>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplainOut {
    pub accepted: bool,
    pub metrics: AttemptMetrics,
    pub cost: Cost,
    pub log: Vec<LogLine>,
}

/// Wire form of the weighted cost breakdown.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cost {
    pub total: f64,
    pub double_booked: u32,
    pub unavailable: u32,
    pub unqualified: u32,
    pub not_violations: u32,
    pub cohort_clashes: u32,
    pub missing_prep_blocks: u32,
    pub unmet_coverage_slots: u32,
    pub unplaced_periods: u32,
    pub period_inconsistency: u32,
    pub credit_minutes_deviation: f64,
    pub off_preferred_days: u32,
    pub terms_missing_cree: u32,
}

impl From<CostBreakdown> for Cost {
    fn from(c: CostBreakdown) -> Self {
        Self {
            total: c.total,
            double_booked: c.double_booked,
            unavailable: c.unavailable,
            unqualified: c.unqualified,
            not_violations: c.not_violations,
            cohort_clashes: c.cohort_clashes,
            missing_prep_blocks: c.missing_prep_blocks,
            unmet_coverage_slots: c.unmet_coverage_slots,
            unplaced_periods: c.unplaced_periods,
            period_inconsistency: c.period_inconsistency,
            credit_minutes_deviation: c.credit_minutes_deviation,
            off_preferred_days: c.off_preferred_days,
            terms_missing_cree: c.terms_missing_cree,
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/explain",
    request_body = ExplainIn,
    responses(
    (status = 200, description = "Validation metrics and cost breakdown for a supplied grid", body = ExplainOut),
    (status = 400, description = "Bad run parameters or a grid of the wrong shape")
    )
)]
pub async fn explain(Json(input): Json<ExplainIn>) -> Result<Json<ExplainOut>, ApiError> {
    let p = &input.instance.params;
    check_config(p)?;
    let g = &input.grid;
    if !g.is_well_formed() || (g.terms(), g.periods(), g.tracks()) != (p.num_terms, p.periods_per_day, p.tracks_per_period)
    {
        return Err(ApiError::BadRequest(format!(
            "grid is {}x{}x{}, run parameters need {}x{}x{}",
            g.terms(),
            g.periods(),
            g.tracks(),
            p.num_terms,
            p.periods_per_day,
            p.tracks_per_period
        )));
    }

    let inst = prepare(&input.instance);
    let weights = input.weights.unwrap_or_default();
    let capacity = CapacityModel::build(&inst.teachers, &inst.params);
    let mut log = RunLog::new();
    let mut ev = evaluate(g, &inst, &capacity, &mut log);
    let breakdown = cost(g, &inst, &weights);
    ev.metrics.cost = Some(breakdown.total);

    Ok(Json(ExplainOut {
        accepted: ev.accepted,
        metrics: ev.metrics,
        cost: breakdown.into(),
        log: log.into_lines(),
    }))
}
