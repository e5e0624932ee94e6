//! Multi-attempt driver: retries, deduplication, best-failure tracking,
//! the combination fallback and final ranking.

use std::cmp::Ordering;
use std::collections::HashSet;

use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sched_core::{
    check_config, evaluate, fingerprint, prepare, validate, CancelFlag, CapacityModel, ConfigError, Evaluation,
    RunLog,
};
use tracing::instrument;
use types::{
    AttemptMetrics, Grid, Instance, ScheduleRecord, SchoolType, SearchMode, SolveEnvelope, SolveParams, SolveResult,
    SolveStatus,
};

use crate::anneal::anneal;
use crate::combine::{combine, default_pairs};
use crate::construct::construct;
use crate::initial::{complete, initial_grid};

const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// RNG seed of attempt `index`; attempt 0 uses the run seed as-is.
pub fn attempt_seed(base: u64, index: u32) -> u64 {
    base ^ u64::from(index).wrapping_mul(SEED_STRIDE)
}

struct AttemptOutcome {
    record: ScheduleRecord,
    accepted: bool,
}

fn to_record(index: u32, grid: Grid, ev: Evaluation) -> ScheduleRecord {
    ScheduleRecord {
        id: String::new(),
        attempt: index + 1,
        fingerprint: fingerprint(&grid),
        grid,
        metrics: ev.metrics,
        placements: ev.placements,
        combined: false,
        best: false,
        log: Vec::new(),
    }
}

fn aborted(inst: &Instance, index: u32) -> ScheduleRecord {
    let p = &inst.params;
    let grid = Grid::new(p.num_terms, p.periods_per_day, p.tracks_per_period);
    ScheduleRecord {
        id: String::new(),
        attempt: index + 1,
        fingerprint: fingerprint(&grid),
        grid,
        metrics: AttemptMetrics::aborted(),
        placements: Vec::new(),
        combined: false,
        best: false,
        log: Vec::new(),
    }
}

fn run_attempt(
    inst: &Instance,
    capacity: &CapacityModel,
    params: &SolveParams,
    index: u32,
    cancel: &CancelFlag,
) -> AttemptOutcome {
    let seed = attempt_seed(params.seed, index);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut log = RunLog::new();
    let n = index + 1;
    log.debug(format!("attempt {n}: seed {seed:#018x}"));

    let constructed = match params.mode {
        SearchMode::Annealing => None,
        SearchMode::Constructive | SearchMode::Hybrid => {
            match construct(inst, capacity, index > 0, &mut rng, &mut log) {
                Ok(grid) => Some(grid),
                Err(e) => {
                    log.error(format!("attempt {n} abandoned: {e}"));
                    let mut record = aborted(inst, index);
                    record.log = log.into_lines();
                    return AttemptOutcome {
                        record,
                        accepted: false,
                    };
                }
            }
        }
    };

    let (mut rec, accepted) = match (params.mode, constructed) {
        (SearchMode::Constructive, Some(grid)) => {
            let ev = evaluate(&grid, inst, capacity, &mut log);
            let accepted = ev.accepted;
            (to_record(index, grid, ev), accepted)
        }
        (SearchMode::Hybrid, Some(mut grid)) => {
            let ev = evaluate(&grid, inst, capacity, &mut log);
            if ev.accepted {
                (to_record(index, grid, ev), true)
            } else {
                log.info(format!("attempt {n}: completing the grid and annealing"));
                let stranded = complete(&mut grid, inst, &mut rng);
                if stranded > 0 {
                    log.warn(format!("attempt {n}: {stranded} periods have nowhere to go"));
                }
                let out = anneal(grid, inst, &params.anneal, &params.weights, &mut rng, cancel);
                let mut ev = evaluate(&out.grid, inst, capacity, &mut log);
                ev.metrics.cost = Some(out.cost.total);
                ev.metrics.iterations = Some(out.iterations);
                let accepted = ev.accepted;
                (to_record(index, out.grid, ev), accepted)
            }
        }
        _ => {
            let (grid, stranded) = initial_grid(inst, &mut rng);
            if stranded > 0 {
                log.warn(format!("attempt {n}: {stranded} periods have nowhere to go"));
            }
            let out = anneal(grid, inst, &params.anneal, &params.weights, &mut rng, cancel);
            let accepted = out.is_acceptable(&params.weights);
            log.info(format!(
                "attempt {n}: annealed to cost {:.1} after {} iterations",
                out.cost.total, out.iterations
            ));
            let mut ev = evaluate(&out.grid, inst, capacity, &mut log);
            ev.metrics.cost = Some(out.cost.total);
            ev.metrics.iterations = Some(out.iterations);
            (to_record(index, out.grid, ev), accepted)
        }
    };
    rec.log = log.into_lines();
    AttemptOutcome { record: rec, accepted }
}

/// Strictly better failure: fewer uncovered cells, then fewer teachers short
/// of prep, then higher completion.
fn better_failure(a: &AttemptMetrics, b: &AttemptMetrics) -> bool {
    (a.unmet_grade_slots, a.unmet_prep_teachers)
        .cmp(&(b.unmet_grade_slots, b.unmet_prep_teachers))
        .then_with(|| b.completion_ratio.total_cmp(&a.completion_ratio))
        == Ordering::Less
}

fn keep_better(current: Option<ScheduleRecord>, candidate: Option<ScheduleRecord>) -> Option<ScheduleRecord> {
    match (current, candidate) {
        (Some(c), Some(n)) if better_failure(&n.metrics, &c.metrics) => Some(n),
        (Some(c), _) => Some(c),
        (None, n) => n,
    }
}

#[derive(Default)]
struct Pass {
    accepted: Vec<ScheduleRecord>,
    best_failed: Option<ScheduleRecord>,
    attempts: u32,
    duplicates: u32,
    cancelled: bool,
}

/// One full attempt loop. `offset` keeps seeds of a second pass distinct.
fn run_pass(
    inst: &Instance,
    params: &SolveParams,
    cancel: &CancelFlag,
    offset: u32,
    seen: &mut HashSet<String>,
    log: &mut RunLog,
) -> Pass {
    let capacity = CapacityModel::build(&inst.teachers, &inst.params);
    let target = params.target_schedules.max(1) as usize;
    let workers = params.workers.max(1);
    let mut pass = Pass::default();
    let mut next = 0u32;

    while next < params.max_attempts && pass.accepted.len() < target {
        if cancel.is_cancelled() {
            log.warn(format!("cancelled after {} attempts", pass.attempts));
            pass.cancelled = true;
            break;
        }
        let batch: Vec<u32> = (next..next.saturating_add(workers).min(params.max_attempts)).collect();
        next += batch.len() as u32;

        let outcomes: Vec<AttemptOutcome> = if batch.len() == 1 {
            batch
                .iter()
                .map(|&i| run_attempt(inst, &capacity, params, offset + i, cancel))
                .collect()
        } else {
            let cap = &capacity;
            std::thread::scope(|s| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|&i| s.spawn(move || run_attempt(inst, cap, params, offset + i, cancel)))
                    .collect();
                handles
                    .into_iter()
                    .zip(&batch)
                    .map(|(h, &i)| {
                        h.join().unwrap_or_else(|_| {
                            let mut record = aborted(inst, offset + i);
                            record.log.push(types::LogLine {
                                level: types::LogLevel::Error,
                                message: format!("attempt {} panicked", offset + i + 1),
                            });
                            AttemptOutcome {
                                record,
                                accepted: false,
                            }
                        })
                    })
                    .collect()
            })
        };

        for outcome in outcomes {
            if pass.accepted.len() >= target {
                break;
            }
            pass.attempts += 1;
            let AttemptOutcome { record, accepted } = outcome;
            log.absorb(record.log.iter().cloned());
            let n = record.attempt;
            if accepted {
                if !seen.insert(record.fingerprint.clone()) {
                    pass.duplicates += 1;
                    log.info(format!("attempt {n}: duplicate of an accepted schedule"));
                    continue;
                }
                log.info(format!(
                    "attempt {n}: accepted with {:.1}% completion",
                    record.metrics.completion_ratio * 100.0
                ));
                pass.accepted.push(record);
            } else {
                log.warn(format!(
                    "attempt {n}: rejected ({} uncovered slots, {} teachers short of prep, {:.1}% completion)",
                    record.metrics.unmet_grade_slots,
                    record.metrics.unmet_prep_teachers,
                    record.metrics.completion_ratio * 100.0
                ));
                pass.best_failed = keep_better(pass.best_failed.take(), Some(record));
            }
        }
    }
    pass
}

fn rank_key(m: &AttemptMetrics) -> (bool, u32, bool, u32) {
    (m.g11_core_count >= 2, m.g11_core_count, m.g12_core_count >= 2, m.g12_core_count)
}

/// Stable sort by the secondary score, then ids and the `best` mark.
fn rank(records: &mut [ScheduleRecord]) {
    records.sort_by(|a, b| rank_key(&b.metrics).cmp(&rank_key(&a.metrics)));
    for (i, r) in records.iter_mut().enumerate() {
        r.id = if r.combined {
            format!("{}-combined", i + 1)
        } else {
            (i + 1).to_string()
        };
        r.best = i == 0;
    }
}

fn warn_capacity(inst: &Instance, capacity: &CapacityModel, log: &mut RunLog) {
    for id in capacity.overcommitted() {
        log.warn(format!(
            "{id} has {} available slots, fewer than the {} prep blocks; they will not be given classes",
            capacity.available(id),
            inst.params.min_prep_blocks
        ));
    }
    if !inst.teachers.is_empty() && !capacity.any_can_teach() {
        log.warn("no teacher has enough availability for teaching plus prep");
    }
}

/// Runs every attempt for `env`. Only bad run parameters are an error; every
/// other outcome, including total failure, is described by the result.
#[instrument(skip_all, fields(seed = env.params.seed, mode = ?env.params.mode))]
pub fn run(env: &SolveEnvelope, cancel: &CancelFlag) -> Result<SolveResult, ConfigError> {
    check_config(&env.instance.params)?;
    let params = &env.params;
    let inst = prepare(&env.instance);
    let mut log = RunLog::new();

    log.info(format!(
        "run started: {} teachers, {} requirements, {} terms, seed {}",
        inst.teachers.len(),
        inst.requirements.len(),
        inst.params.num_terms,
        params.seed
    ));
    if let Err(e) = validate(&inst) {
        log.warn(e.to_string());
    }
    warn_capacity(&inst, &CapacityModel::build(&inst.teachers, &inst.params), &mut log);

    let mut seen = HashSet::new();
    let first = run_pass(&inst, params, cancel, 0, &mut seen, &mut log);
    let mut accepted = first.accepted;
    let mut best_failed = first.best_failed;
    let mut attempts = first.attempts;
    let mut duplicates = first.duplicates;
    let mut cancelled = first.cancelled;
    let mut combined_requirements = Vec::new();

    if accepted.is_empty() && !cancelled && inst.params.school_type == SchoolType::Elementary {
        log.info("no attempt succeeded; elementary runs do not combine requirements");
    } else if accepted.is_empty() && !cancelled {
        let pairs = params.combinable_pairs.clone().unwrap_or_else(default_pairs);
        let combo = combine(&inst, &pairs, &mut log);
        if combo.merged.is_empty() {
            log.warn("no attempt succeeded and no requirements can be combined");
        } else {
            log.info(format!(
                "no attempt succeeded; retrying with {} combined requirements",
                combo.merged.len()
            ));
            let second = run_pass(&combo.instance, params, cancel, params.max_attempts, &mut seen, &mut log);
            accepted = second.accepted;
            for r in &mut accepted {
                r.combined = true;
            }
            let second_failed = second.best_failed.map(|mut r| {
                r.combined = true;
                r
            });
            best_failed = keep_better(best_failed, second_failed);
            attempts += second.attempts;
            duplicates += second.duplicates;
            cancelled |= second.cancelled;
            combined_requirements = combo.merged;
        }
    }

    rank(&mut accepted);
    if let Some(r) = best_failed.as_mut() {
        r.id = "best-failed".into();
    }

    let status = if !accepted.is_empty() {
        SolveStatus::Solved
    } else if cancelled {
        SolveStatus::Cancelled
    } else {
        SolveStatus::BestFailed
    };
    match status {
        SolveStatus::Solved => log.info(format!("{} schedules accepted after {attempts} attempts", accepted.len())),
        SolveStatus::Cancelled => log.warn(format!("run cancelled after {attempts} attempts")),
        SolveStatus::BestFailed => log.error(format!(
            "no schedule accepted after {attempts} attempts; returning the best failed attempt"
        )),
    }

    let stats = serde_json::json!({
        "mode": serde_json::to_value(params.mode).unwrap_or_default(),
        "seed": params.seed,
        "attempts": attempts,
        "accepted": accepted.len(),
        "duplicates": duplicates,
        "combined": !combined_requirements.is_empty(),
    });

    Ok(SolveResult {
        status,
        schedules: accepted,
        best_failed,
        attempts,
        combined_requirements,
        log: log.into_lines(),
        stats,
    })
}
