//! Pass/fail validation of a finished grid.

use std::collections::{BTreeSet, HashMap};

use types::{
    AttemptMetrics, DayOfWeek, Grid, Instance, PlacementCount, RequirementId, TeacherId,
};

use crate::capacity::CapacityModel;
use crate::runlog::RunLog;

#[derive(Clone, Debug)]
pub struct Evaluation {
    pub metrics: AttemptMetrics,
    pub placements: Vec<PlacementCount>,
    pub accepted: bool,
}

/// Whether some occupant at `(term, day, period)` serves `grade`.
pub fn grade_covered(grid: &Grid, inst: &Instance, term: u32, day: DayOfWeek, period: u32, grade: u8) -> bool {
    grid.at(term, day, period).any(|o| {
        inst.requirement(&o.requirement)
            .is_some_and(|r| r.grade.covers(grade))
    })
}

/// Distinct core-subject requirements of `grade` with at least one period on the grid.
pub fn core_offerings(grid: &Grid, inst: &Instance, grade: u8) -> u32 {
    let placed: BTreeSet<&RequirementId> = grid.occupied().map(|(_, o)| &o.requirement).collect();
    placed
        .into_iter()
        .filter_map(|id| inst.requirement(id))
        .filter(|r| r.grade.as_grade() == Some(grade))
        .filter(|r| r.subject.as_ref().is_some_and(|s| s.is_core()))
        .count() as u32
}

/// Per-requirement placed vs. required counts, in input order.
pub fn placements(grid: &Grid, inst: &Instance) -> Vec<PlacementCount> {
    let mut placed: HashMap<(u32, &RequirementId), (u32, Option<&TeacherId>)> = HashMap::new();
    for (c, o) in grid.occupied() {
        let e = placed.entry((c.term, &o.requirement)).or_insert((0, None));
        e.0 += 1;
        e.1.get_or_insert(&o.teacher);
    }
    inst.requirements
        .iter()
        .map(|r| {
            let (n, teacher) = placed.get(&(r.term, &r.id)).copied().unwrap_or((0, None));
            PlacementCount {
                requirement: r.id.clone(),
                term: r.term,
                teacher: teacher.or(r.teacher.as_ref()).cloned(),
                placed: n,
                required: r.periods_per_week,
            }
        })
        .collect()
}

/// Validation mode: completion per term, full-coverage cells and the prep
/// floor. Findings are written to `log`.
pub fn evaluate(grid: &Grid, inst: &Instance, capacity: &CapacityModel, log: &mut RunLog) -> Evaluation {
    let p = &inst.params;
    let placements = placements(grid, inst);
    let mut metrics = AttemptMetrics::default();
    let mut completion_ok = true;

    for term in 1..=p.num_terms {
        let (placed, required) = placements
            .iter()
            .filter(|pc| pc.term == term)
            .fold((0u32, 0u32), |(a, b), pc| (a + pc.placed.min(pc.required), b + pc.required));
        metrics.placed_periods += placed;
        metrics.required_periods += required;

        let ratio = if required == 0 {
            log.debug(format!("term {term}: nothing to schedule"));
            1.0
        } else {
            placed as f64 / required as f64
        };
        if ratio < p.min_completion_ratio {
            completion_ok = false;
            log.error(format!(
                "term {term}: completion {:.1}% below the {:.1}% minimum ({placed}/{required} periods)",
                ratio * 100.0,
                p.min_completion_ratio * 100.0
            ));
        } else {
            log.info(format!("term {term}: completion {:.1}% ({placed}/{required})", ratio * 100.0));
        }
        metrics.term_completion.push(ratio);
    }
    metrics.completion_ratio = if metrics.term_completion.is_empty() {
        1.0
    } else {
        metrics.term_completion.iter().sum::<f64>() / metrics.term_completion.len() as f64
    };

    for pc in placements.iter().filter(|pc| pc.placed < pc.required) {
        log.warn(format!(
            "{} (term {}): placed {} of {} periods",
            pc.requirement, pc.term, pc.placed, pc.required
        ));
    }

    for term in 1..=p.num_terms {
        if p.enforce_cree_per_term
            && !grid
                .occupied()
                .any(|(c, o)| c.term == term && inst.requirement(&o.requirement).is_some_and(|r| r.is_cree()))
        {
            log.warn(format!("term {term}: no Cree offering placed"));
        }
        for &grade in p.coverage_grades() {
            let mut missing = 0u32;
            for day in DayOfWeek::ALL {
                for period in 0..p.periods_per_day {
                    if !grade_covered(grid, inst, term, day, period, grade) {
                        missing += 1;
                        log.debug(format!("term {term}: grade {grade} has no class at {day} P{}", period + 1));
                    }
                }
            }
            if missing > 0 {
                log.error(format!("term {term}: grade {grade} is uncovered in {missing} slots"));
            }
            metrics.unmet_grade_slots += missing;
        }

        for t in &inst.teachers {
            let taught = grid.taught_count(term, &t.id);
            let available = capacity.available(&t.id);
            let short = if capacity.max_load(&t.id) < 0 && taught > 0 {
                true
            } else {
                (available as i64 - taught as i64) < p.min_prep_blocks as i64
            };
            if short {
                metrics.unmet_prep_teachers += 1;
                log.error(format!(
                    "term {term}: {} teaches {taught} of {available} available slots, under {} prep blocks",
                    t.id, p.min_prep_blocks
                ));
            }
        }
    }

    metrics.g11_core_count = core_offerings(grid, inst, 11);
    metrics.g12_core_count = core_offerings(grid, inst, 12);

    let accepted = completion_ok && metrics.unmet_grade_slots == 0 && metrics.unmet_prep_teachers == 0;
    Evaluation {
        metrics,
        placements,
        accepted,
    }
}
