//! Randomized greedy placement, one term at a time.
//!
//! Requirements with `ASSIGN` slots go first and must land exactly where
//! asked or the attempt is abandoned. Everything else is placed period by
//! period at the coordinate that fills the most uncovered full-coverage
//! cells, ties broken by the attempt's RNG.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use sched_core::evaluate::grade_covered;
use sched_core::{CapacityModel, RunLog};
use thiserror::Error;
use types::{Coord, DayOfWeek, Grid, Instance, Occupant, Requirement, RequirementId, Slot, Teacher, TeacherId};

/// Conditions that abandon a single attempt. They never escape the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttemptError {
    #[error("no teachers to schedule with")]
    NoTeachers,
    #[error("no requirements to schedule")]
    NoRequirements,
    #[error("{0} has ASSIGN slots but no subject")]
    MissingSubject(RequirementId),
    #[error("no teacher can take every ASSIGN slot of {0}")]
    NoAssignTeacher(RequirementId),
    #[error("{0}: ASSIGN {1} conflicts with its own NOT rule")]
    AssignForbidden(RequirementId, String),
    #[error("{0}: every track is taken at ASSIGN {1}")]
    NoFreeTrack(RequirementId, String),
    #[error("{0}: ASSIGN {1} clashes with a requirement sharing its students")]
    CohortBlocked(RequirementId, String),
    #[error("{0}: teacher {1} is already teaching at ASSIGN {2}")]
    TeacherBusy(RequirementId, TeacherId, String),
}

fn label(day: DayOfWeek, period: u32) -> String {
    format!("{day} P{}", period + 1)
}

/// Whether placing `id` at `(term, day, period)` would sit it next to a
/// requirement it shares a cohort with.
pub(crate) fn cohort_clash(
    grid: &Grid,
    inst: &Instance,
    term: u32,
    day: DayOfWeek,
    period: u32,
    id: &RequirementId,
) -> bool {
    inst.cohort_clashes
        .iter()
        .filter(|c| c.contains(id))
        .any(|c| {
            grid.at(term, day, period)
                .any(|o| &o.requirement != id && c.contains(&o.requirement))
        })
}

/// Attempt-local bookkeeping for one term.
struct TermState<'a> {
    term: u32,
    load: HashMap<&'a TeacherId, u32>,
    bound: HashMap<&'a RequirementId, &'a TeacherId>,
}

impl<'a> TermState<'a> {
    fn new(term: u32) -> Self {
        Self {
            term,
            load: HashMap::new(),
            bound: HashMap::new(),
        }
    }

    fn load(&self, id: &TeacherId) -> u32 {
        self.load.get(id).copied().unwrap_or(0)
    }
}

struct Builder<'a> {
    inst: &'a Instance,
    capacity: &'a CapacityModel,
    roster: Vec<&'a Teacher>,
    by_id: HashMap<&'a TeacherId, &'a Teacher>,
}

impl<'a> Builder<'a> {
    fn free_at(&self, st: &TermState<'a>, grid: &Grid, t: &Teacher, day: DayOfWeek, period: u32) -> bool {
        t.availability.is_available(day, period)
            && !grid.teacher_busy(st.term, day, period, &t.id)
            && self.capacity.has_room(&t.id, st.load(&t.id), 1)
    }

    fn put(&self, st: &mut TermState<'a>, grid: &mut Grid, r: &'a Requirement, t: &'a TeacherId, at: Coord) {
        grid.place(at, Occupant::new(&r.id, t));
        *st.load.entry(t).or_default() += 1;
        st.bound.insert(&r.id, t);
    }

    fn place_must_assign(
        &self,
        st: &mut TermState<'a>,
        grid: &mut Grid,
        r: &'a Requirement,
        log: &mut RunLog,
    ) -> Result<(), AttemptError> {
        let Some(subject) = r.subject.as_ref() else {
            return Err(AttemptError::MissingSubject(r.id.clone()));
        };
        let mut slots: Vec<Slot> = Vec::new();
        for s in r.assign_slots() {
            if !slots.contains(&s) {
                slots.push(s);
            }
        }
        if let Some(s) = slots.iter().find(|s| r.forbids(s.day, s.period)) {
            return Err(AttemptError::AssignForbidden(r.id.clone(), label(s.day, s.period)));
        }
        if slots.len() as u32 != r.periods_per_week {
            log.warn(format!(
                "{} asks for {} periods but lists {} ASSIGN slots",
                r.id,
                r.periods_per_week,
                slots.len()
            ));
        }

        let candidates: Vec<&'a Teacher> = match &r.teacher {
            Some(id) => self.by_id.get(id).copied().into_iter().collect(),
            None => self.roster.clone(),
        };
        let teacher = candidates
            .into_iter()
            .find(|t| {
                t.is_qualified(subject)
                    && self.capacity.has_room(&t.id, st.load(&t.id), slots.len() as u32)
                    && slots.iter().all(|s| {
                        t.availability.is_available(s.day, s.period)
                            && !grid.teacher_busy(st.term, s.day, s.period, &t.id)
                    })
            })
            .ok_or_else(|| AttemptError::NoAssignTeacher(r.id.clone()))?;

        for s in &slots {
            let Some(track) = grid.free_track(st.term, s.day, s.period) else {
                return Err(AttemptError::NoFreeTrack(r.id.clone(), label(s.day, s.period)));
            };
            if cohort_clash(grid, self.inst, st.term, s.day, s.period, &r.id) {
                return Err(AttemptError::CohortBlocked(r.id.clone(), label(s.day, s.period)));
            }
            if grid.teacher_busy(st.term, s.day, s.period, &teacher.id) {
                return Err(AttemptError::TeacherBusy(
                    r.id.clone(),
                    teacher.id.clone(),
                    label(s.day, s.period),
                ));
            }
            self.put(st, grid, r, &teacher.id, Coord::new(st.term, s.day, s.period, track));
        }
        log.debug(format!("{} pinned to {} slots with {}", r.id, slots.len(), teacher.id));
        Ok(())
    }

    fn pick_teacher(
        &self,
        st: &TermState<'a>,
        grid: &Grid,
        r: &'a Requirement,
        day: DayOfWeek,
        period: u32,
    ) -> Option<&'a Teacher> {
        if let Some(id) = st.bound.get(&r.id).copied().or(r.teacher.as_ref()) {
            return self.by_id.get(id).copied().filter(|t| {
                r.subject.as_ref().map_or(true, |s| t.is_qualified(s)) && self.free_at(st, grid, t, day, period)
            });
        }
        let subject = r.subject.as_ref()?;
        self.roster
            .iter()
            .copied()
            .find(|t| t.is_qualified(subject) && self.free_at(st, grid, t, day, period))
    }

    fn coverage_score(&self, grid: &Grid, term: u32, r: &Requirement, day: DayOfWeek, period: u32) -> u32 {
        self.inst
            .params
            .coverage_grades()
            .iter()
            .filter(|&&g| r.grade.covers(g) && !grade_covered(grid, self.inst, term, day, period, g))
            .count() as u32
    }

    fn place_flexible(
        &self,
        st: &mut TermState<'a>,
        grid: &mut Grid,
        r: &'a Requirement,
        rng: &mut ChaCha8Rng,
        log: &mut RunLog,
    ) {
        if r.subject.is_none() && r.teacher.is_none() {
            log.error(format!("{} has no subject and no teacher; skipped", r.id));
            return;
        }
        let p = &self.inst.params;
        let term = st.term;
        let already = grid.placed_count(term, &r.id);

        for k in already..r.periods_per_week {
            let mut candidates: Vec<(DayOfWeek, u32, &'a Teacher, u32)> = Vec::new();
            for day in DayOfWeek::ALL {
                if !p.allow_same_day_repeat
                    && (0..p.periods_per_day).any(|q| grid.at(term, day, q).any(|o| o.requirement == r.id))
                {
                    continue;
                }
                for period in 0..p.periods_per_day {
                    if r.forbids(day, period)
                        || grid.is_full(term, day, period)
                        || cohort_clash(grid, self.inst, term, day, period, &r.id)
                    {
                        continue;
                    }
                    let Some(t) = self.pick_teacher(st, grid, r, day, period) else {
                        continue;
                    };
                    let score = self.coverage_score(grid, term, r, day, period);
                    candidates.push((day, period, t, score));
                }
            }

            candidates.shuffle(rng);
            candidates.sort_by(|a, b| b.3.cmp(&a.3));
            let Some(&(day, period, t, _)) = candidates.first() else {
                log.warn(format!(
                    "{} (term {term}): no slot for period {} of {}",
                    r.id,
                    k + 1,
                    r.periods_per_week
                ));
                return;
            };
            let Some(track) = grid.free_track(term, day, period) else {
                return;
            };
            if !st.bound.contains_key(&r.id) {
                log.debug(format!("{} (term {term}) taught by {}", r.id, t.id));
            }
            self.put(st, grid, r, &t.id, Coord::new(term, day, period, track));
        }
    }
}

/// Builds one attempt's grid. `perturb` shuffles requirements within equal
/// priority so repeated attempts explore different orders.
pub fn construct(
    inst: &Instance,
    capacity: &CapacityModel,
    perturb: bool,
    rng: &mut ChaCha8Rng,
    log: &mut RunLog,
) -> Result<Grid, AttemptError> {
    if inst.teachers.is_empty() {
        return Err(AttemptError::NoTeachers);
    }
    if inst.requirements.is_empty() {
        return Err(AttemptError::NoRequirements);
    }

    let p = &inst.params;
    let mut roster: Vec<&Teacher> = inst.teachers.iter().collect();
    roster.shuffle(rng);
    let builder = Builder {
        inst,
        capacity,
        roster,
        by_id: inst.teachers.iter().map(|t| (&t.id, t)).collect(),
    };
    let mut grid = Grid::new(p.num_terms, p.periods_per_day, p.tracks_per_period);

    for term in 1..=p.num_terms {
        let mut st = TermState::new(term);
        let (must, mut flexible): (Vec<&Requirement>, Vec<&Requirement>) = inst
            .requirements_in_term(term)
            .filter(|r| r.periods_per_week > 0)
            .partition(|r| r.has_assign());

        for r in must {
            builder.place_must_assign(&mut st, &mut grid, r, log)?;
        }

        if perturb {
            flexible.shuffle(rng);
        }
        let covered = |r: &Requirement| r.grade.as_grade().is_some_and(|g| p.coverage_grades().contains(&g));
        flexible.sort_by(|a, b| (covered(b), b.periods_per_week).cmp(&(covered(a), a.periods_per_week)));

        for r in flexible {
            builder.place_flexible(&mut st, &mut grid, r, rng, log);
        }
    }
    Ok(grid)
}
