use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use types::{DayOfWeek, Grid, Instance, PenaltyWeights, Requirement, RequirementId, Teacher, TeacherId};

/// Per-rule violation counts and the weighted total.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
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
    pub total: f64,
}

impl CostBreakdown {
    pub fn hard_violations(&self) -> u32 {
        self.double_booked + self.unavailable + self.unqualified + self.not_violations + self.cohort_clashes
    }
}

/// Deviation, in periods, of `minutes` from the weekly target for `credits`.
fn credit_deviation(credits: u32, minutes: f64, period_minutes: f64) -> f64 {
    let off = match credits {
        1 => (minutes - 90.0).abs(),
        5 => (minutes - 450.0).abs(),
        3 if minutes < 180.0 => 180.0 - minutes,
        3 if minutes > 270.0 => minutes - 270.0,
        _ => 0.0,
    };
    off / period_minutes
}

/// Weighted penalty of `grid`. Recomputes every aggregate from scratch.
pub fn cost(grid: &Grid, inst: &Instance, weights: &PenaltyWeights) -> CostBreakdown {
    let p = &inst.params;
    let teachers: HashMap<&TeacherId, &Teacher> = inst.teachers.iter().map(|t| (&t.id, t)).collect();
    let requirements: HashMap<&RequirementId, &Requirement> =
        inst.requirements.iter().map(|r| (&r.id, r)).collect();

    let mut b = CostBreakdown::default();
    let mut busy: HashMap<(u32, DayOfWeek, u32), Vec<&TeacherId>> = HashMap::new();
    let mut taught: HashMap<(u32, &TeacherId), u32> = HashMap::new();
    let mut placed: HashMap<(u32, &RequirementId), u32> = HashMap::new();
    let mut offerings: BTreeMap<(u32, &RequirementId, &TeacherId), (u32, BTreeSet<u32>)> = BTreeMap::new();
    let mut cree_terms: BTreeSet<u32> = BTreeSet::new();

    for (c, o) in grid.occupied() {
        let here = busy.entry((c.term, c.day, c.period)).or_default();
        if here.contains(&&o.teacher) {
            b.double_booked += 1;
        }
        here.push(&o.teacher);

        let req = requirements.get(&o.requirement).copied();
        match teachers.get(&o.teacher) {
            None => {
                b.unavailable += 1;
                b.unqualified += 1;
            }
            Some(t) => {
                if !t.availability.is_available(c.day, c.period) {
                    b.unavailable += 1;
                }
                if let Some(subject) = req.and_then(|r| r.subject.as_ref()) {
                    if !t.is_qualified(subject) {
                        b.unqualified += 1;
                    }
                }
            }
        }
        if let Some(r) = req {
            b.not_violations += r
                .constraints
                .iter()
                .filter(|k| k.kind == types::ConstraintKind::Not && k.matches(c.day, c.period))
                .count() as u32;
            b.off_preferred_days += r.day_preference_misses(c.day);
            if r.is_cree() {
                cree_terms.insert(c.term);
            }
        }

        *taught.entry((c.term, &o.teacher)).or_default() += 1;
        *placed.entry((c.term, &o.requirement)).or_default() += 1;
        let off = offerings.entry((c.term, &o.requirement, &o.teacher)).or_default();
        off.0 += 1;
        off.1.insert(c.period);
    }

    for term in 1..=grid.terms() {
        if p.enforce_cree_per_term && !cree_terms.contains(&term) {
            b.terms_missing_cree += 1;
        }
        for day in DayOfWeek::ALL {
            for period in 0..grid.periods() {
                let present: Vec<&RequirementId> = grid.at(term, day, period).map(|o| &o.requirement).collect();
                if present.len() > 1 {
                    for clash in &inst.cohort_clashes {
                        let n = present.iter().filter(|id| clash.contains(id)).count() as u32;
                        b.cohort_clashes += n.saturating_sub(1);
                    }
                }
                for &grade in p.coverage_grades() {
                    let covered = present
                        .iter()
                        .any(|id| requirements.get(id).is_some_and(|r| r.grade.covers(grade)));
                    if !covered {
                        b.unmet_coverage_slots += 1;
                    }
                }
            }
        }

        for t in &inst.teachers {
            let available = t.availability.available_count(p.periods_per_day) as i64;
            let load = taught.get(&(term, &t.id)).copied().unwrap_or(0) as i64;
            let prep = available - load;
            if prep < p.min_prep_blocks as i64 {
                b.missing_prep_blocks += (p.min_prep_blocks as i64 - prep) as u32;
            }
        }
    }

    for r in &inst.requirements {
        if r.term == 0 || r.term > grid.terms() {
            continue;
        }
        let n = placed.get(&(r.term, &r.id)).copied().unwrap_or(0);
        b.unplaced_periods += r.periods_per_week.saturating_sub(n);
    }

    let pm = p.period_minutes.max(1) as f64;
    for ((_, req, _), (n, periods)) in &offerings {
        b.period_inconsistency += periods.len().saturating_sub(1) as u32;
        if let Some(credits) = requirements.get(req).and_then(|r| r.credits) {
            let dev = credit_deviation(credits, *n as f64 * pm, pm);
            if dev > 0.01 {
                b.credit_minutes_deviation += dev;
            }
        }
    }

    b.total = weights.double_booked * b.double_booked as f64
        + weights.unavailable * b.unavailable as f64
        + weights.unqualified * b.unqualified as f64
        + weights.not_violation * b.not_violations as f64
        + weights.cohort_clash * b.cohort_clashes as f64
        + weights.insufficient_prep * b.missing_prep_blocks as f64
        + weights.unmet_coverage_slot * b.unmet_coverage_slots as f64
        + weights.unplaced_period * b.unplaced_periods as f64
        + weights.period_inconsistency * b.period_inconsistency as f64
        + weights.credit_minutes_mismatch * b.credit_minutes_deviation
        + weights.off_preferred_day * b.off_preferred_days as f64
        + weights.missing_cree_term * b.terms_missing_cree as f64;
    b
}
