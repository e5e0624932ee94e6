pub mod capacity;
pub mod evaluate;
pub mod fingerprint;
pub mod parse;
pub mod runlog;
pub mod scoring;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use capacity::CapacityModel;
pub use evaluate::{evaluate, Evaluation};
pub use fingerprint::fingerprint;
pub use runlog::RunLog;
pub use scoring::{cost, CostBreakdown};
pub use types::{
    Grid, Instance, Requirement, RunParams, SolveEnvelope, SolveParams, SolveResult, Teacher,
};
use types::{DayOfWeek, SchoolType};

/// Largest timetable grid, in cells (terms x days x periods x tracks), a run accepts.
pub const MAX_GRID_CELLS: u64 = 100_000;

/// Run parameters that make any run meaningless. Checked before the first attempt.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("periods per day must be positive")]
    NoPeriods,
    #[error("tracks per period must be positive")]
    NoTracks,
    #[error("number of terms must be positive")]
    NoTerms,
    #[error("weeks per term must be positive")]
    NoWeeks,
    #[error("period length must be positive")]
    NoPeriodMinutes,
    #[error("minimum completion ratio {0} is outside [0, 1]")]
    CompletionRatio(f64),
    #[error("grid of {terms} terms x {periods} periods x {tracks} tracks exceeds {MAX_GRID_CELLS} cells")]
    GridTooLarge { terms: u32, periods: u32, tracks: u32 },
}

pub fn check_config(params: &RunParams) -> Result<(), ConfigError> {
    if params.periods_per_day == 0 {
        return Err(ConfigError::NoPeriods);
    }
    if params.tracks_per_period == 0 {
        return Err(ConfigError::NoTracks);
    }
    if params.num_terms == 0 {
        return Err(ConfigError::NoTerms);
    }
    if params.weeks_per_term == 0 {
        return Err(ConfigError::NoWeeks);
    }
    if params.period_minutes == 0 {
        return Err(ConfigError::NoPeriodMinutes);
    }
    if !(0.0..=1.0).contains(&params.min_completion_ratio) {
        return Err(ConfigError::CompletionRatio(params.min_completion_ratio));
    }
    let cells = u64::from(params.num_terms)
        .checked_mul(DayOfWeek::COUNT as u64)
        .and_then(|n| n.checked_mul(u64::from(params.periods_per_day)))
        .and_then(|n| n.checked_mul(u64::from(params.tracks_per_period)));
    if cells.map_or(true, |n| n > MAX_GRID_CELLS) {
        return Err(ConfigError::GridTooLarge {
            terms: params.num_terms,
            periods: params.periods_per_day,
            tracks: params.tracks_per_period,
        });
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid instance: {0}")]
    Msg(String),
}

/// Full input check: run parameters, id uniqueness and cross references.
pub fn validate(inst: &Instance) -> Result<(), ValidationError> {
    let mut errors: Vec<String> = Vec::new();

    if let Err(e) = check_config(&inst.params) {
        errors.push(e.to_string());
    }

    fn chk_unique<I: ToString>(name: &str, ids: impl Iterator<Item = I>, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for id in ids {
            let s = id.to_string();
            if !seen.insert(s.clone()) {
                errors.push(format!("duplicate {name} id: {s}"));
            }
        }
    }
    chk_unique("teacher", inst.teachers.iter().map(|x| &x.id.0), &mut errors);
    match inst.params.school_type {
        SchoolType::HighSchool => chk_unique("requirement", inst.requirements.iter().map(|x| &x.id.0), &mut errors),
        SchoolType::Elementary => chk_unique(
            "requirement",
            inst.requirements.iter().map(|x| format!("{} in term {}", x.id, x.term)),
            &mut errors,
        ),
    }

    let teachers: HashMap<_, _> = inst.teachers.iter().map(|t| (&t.id, t)).collect();
    let requirements: HashSet<_> = inst.requirements.iter().map(|r| &r.id).collect();
    let periods = inst.params.periods_per_day;

    for t in &inst.teachers {
        for slot in &t.availability.blocked {
            if slot.period >= periods {
                errors.push(format!(
                    "teacher {} blocks period {} beyond the day",
                    t.id, slot.period
                ));
            }
        }
    }

    for r in &inst.requirements {
        if r.term == 0 || r.term > inst.params.num_terms {
            errors.push(format!("requirement {} is in unknown term {}", r.id, r.term));
        }
        if r.periods_per_week == 0 && r.credits.is_none() {
            errors.push(format!("requirement {} has no periods and no credits", r.id));
        }
        if let Some(t) = &r.teacher {
            match (teachers.get(t), &r.subject) {
                (None, _) => errors.push(format!("requirement {} references missing teacher {}", r.id, t)),
                (Some(teacher), Some(subject)) if !teacher.is_qualified(subject) => errors.push(format!(
                    "requirement {} is bound to teacher {} who is not qualified for {}",
                    r.id, t, subject
                )),
                _ => {}
            }
        }
        if r.has_assign() && r.subject.is_none() {
            errors.push(format!("requirement {} has ASSIGN slots but no subject", r.id));
        }
        for c in &r.constraints {
            if c.period >= periods {
                errors.push(format!(
                    "requirement {} constrains period {} beyond the day",
                    r.id, c.period
                ));
            }
        }
    }

    for clash in &inst.cohort_clashes {
        for id in &clash.0 {
            if !requirements.contains(id) {
                errors.push(format!("cohort clash references missing requirement {id}"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Msg(errors.join("; ")))
    }
}

/// Folds free-text rules and availability into their structured fields,
/// drops repeated rules and derives weekly periods from credits where none
/// were given. Elementary runs with several terms get one copy of each
/// requirement per term. Idempotent.
pub fn prepare(inst: &Instance) -> Instance {
    let mut out = inst.clone();
    let p = &inst.params;

    for r in &mut out.requirements {
        let parsed = match &r.constraints_raw {
            Some(raw) => parse::parse_constraint(raw, p.periods_per_day),
            None => Vec::new(),
        };
        let mut merged = Vec::with_capacity(r.constraints.len() + parsed.len());
        for c in r.constraints.drain(..).chain(parsed) {
            if !merged.contains(&c) {
                merged.push(c);
            }
        }
        r.constraints = merged;
        if r.periods_per_week == 0 {
            if let Some(credits) = r.credits {
                r.periods_per_week =
                    parse::periods_for_credits(credits, p.period_minutes, p.weeks_per_term);
            }
        }
    }

    if p.school_type == SchoolType::Elementary && p.num_terms > 1 {
        let mut seen = HashSet::new();
        let once: Vec<Requirement> = out
            .requirements
            .drain(..)
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        out.requirements = once
            .into_iter()
            .flat_map(|r| (1..=p.num_terms).map(move |term| Requirement { term, ..r.clone() }))
            .collect();
    }

    for t in &mut out.teachers {
        if let Some(raw) = &t.availability_raw {
            for slot in parse::parse_availability(raw, p.periods_per_day).blocked {
                t.availability.block(slot.day, slot.period);
            }
        }
    }
    out
}

/// Cooperative cancellation shared between a job and the search it runs.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(&self, env: SolveEnvelope, cancel: CancelFlag) -> anyhow::Result<SolveResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{CohortClash, DayOfWeek, GradeLevel, RequirementId, TeacherId};

    fn inst() -> Instance {
        Instance {
            params: RunParams::default(),
            teachers: vec![Teacher::new("A", &["Math"])],
            requirements: vec![Requirement::new("Math10", "Math", GradeLevel::Grade(10), 3)],
            cohort_clashes: vec![],
        }
    }

    #[test]
    fn zero_periods_is_a_config_error() {
        let mut p = RunParams::default();
        p.periods_per_day = 0;
        assert_eq!(check_config(&p), Err(ConfigError::NoPeriods));
        p.periods_per_day = 5;
        p.min_completion_ratio = 1.5;
        assert_eq!(check_config(&p), Err(ConfigError::CompletionRatio(1.5)));
    }

    #[test]
    fn oversized_grid_is_a_config_error() {
        let mut p = RunParams::default();
        p.periods_per_day = u32::MAX;
        p.tracks_per_period = u32::MAX;
        p.num_terms = u32::MAX;
        assert_eq!(
            check_config(&p),
            Err(ConfigError::GridTooLarge {
                terms: u32::MAX,
                periods: u32::MAX,
                tracks: u32::MAX
            })
        );
        p.periods_per_day = 10;
        p.tracks_per_period = 40;
        p.num_terms = 50;
        assert_eq!(check_config(&p), Ok(()));
        p.num_terms = 51;
        assert!(check_config(&p).is_err());
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut i = inst();
        i.requirements.push(Requirement::new("Math10", "Math", GradeLevel::Grade(10), 3));
        i.requirements[0].teacher = Some(TeacherId::from("Ghost"));
        i.cohort_clashes.push(CohortClash(vec![RequirementId::from("Nope")]));
        let err = validate(&i).unwrap_err().to_string();
        assert!(err.contains("duplicate requirement id: Math10"));
        assert!(err.contains("missing teacher Ghost"));
        assert!(err.contains("missing requirement Nope"));
    }

    #[test]
    fn validate_accepts_clean_instance() {
        assert!(validate(&inst()).is_ok());
    }

    #[test]
    fn prepare_parses_raw_text_and_credits() {
        let mut i = inst();
        i.requirements[0].constraints_raw = Some("NOT Mon P1".into());
        i.requirements[0].periods_per_week = 0;
        i.requirements[0].credits = Some(5);
        i.teachers[0].availability_raw = Some("Fri unavailable".into());
        let p = prepare(&i);
        assert!(p.requirements[0].forbids(DayOfWeek::Mon, 0));
        assert_eq!(p.requirements[0].periods_per_week, 7);
        assert_eq!(p.teachers[0].availability.available_count(5), 20);
        // idempotent
        let again = prepare(&p);
        assert_eq!(again.requirements[0].constraints.len(), 1);
        assert_eq!(again.teachers[0].availability.blocked.len(), 5);
    }

    #[test]
    fn prepare_drops_repeated_structured_rules() {
        let mut i = inst();
        let mon = types::SlotConstraint::assign(DayOfWeek::Mon, 0);
        i.requirements[0].constraints = vec![mon, mon];
        i.requirements[0].constraints_raw = Some("ASSIGN Mon P1".into());
        let p = prepare(&i);
        assert_eq!(p.requirements[0].constraints, vec![mon]);
        assert_eq!(p.requirements[0].assign_slots().count(), 1);
    }

    #[test]
    fn elementary_requirements_run_every_term() {
        let mut i = inst();
        i.params.school_type = SchoolType::Elementary;
        i.params.num_terms = 3;
        i.requirements.push(Requirement::new("Cree4", "Cree", GradeLevel::Grade(4), 2));
        let p = prepare(&i);
        let placed: Vec<(String, u32)> = p.requirements.iter().map(|r| (r.id.0.clone(), r.term)).collect();
        assert_eq!(placed.len(), 6);
        assert_eq!(placed[0], ("Math10".to_string(), 1));
        assert_eq!(placed[2], ("Math10".to_string(), 3));
        assert_eq!(placed[5], ("Cree4".to_string(), 3));
        assert!(validate(&p).is_ok());
        assert_eq!(prepare(&p).requirements.len(), 6);

        i.params.school_type = SchoolType::HighSchool;
        assert_eq!(prepare(&i).requirements.len(), 2);
    }

    #[test]
    fn bound_teacher_must_be_qualified() {
        let mut i = inst();
        i.teachers.push(Teacher::new("B", &["English"]));
        i.requirements[0].teacher = Some(TeacherId::from("B"));
        let err = validate(&i).unwrap_err().to_string();
        assert!(err.contains("bound to teacher B who is not qualified for Math"));
        i.requirements[0].teacher = Some(TeacherId::from("A"));
        assert!(validate(&i).is_ok());
    }

    #[test]
    fn cancel_flag_is_shared() {
        let a = CancelFlag::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
