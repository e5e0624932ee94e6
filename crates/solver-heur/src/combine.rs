//! Merging of low-enrollment requirement pairs into shared offerings.

use sched_core::RunLog;
use types::{CombinablePair, GradeLevel, Instance, Requirement, RequirementId};

const DEFAULT_PAIRS: [(&str, &str); 10] = [
    ("English 10-2", "English 10-4"),
    ("English 20-2", "English 20-4"),
    ("English 30-2", "English 30-4"),
    ("Social Studies 10-2", "Social Studies 10-4"),
    ("Social Studies 20-2", "Social Studies 20-4"),
    ("Math 10-3", "Math 10-4"),
    ("Math 20-3", "Math 20-4"),
    ("Math 30-3", "Math 30-4"),
    ("Science 14", "Science 10-4"),
    ("Science 24", "Science 20-4"),
];

/// Built-in pairs used when a run does not bring its own table.
pub fn default_pairs() -> Vec<CombinablePair> {
    DEFAULT_PAIRS
        .iter()
        .map(|(a, b)| CombinablePair::new(a, b))
        .collect()
}

#[derive(Clone, Debug)]
pub struct Combination {
    pub instance: Instance,
    pub merged: Vec<RequirementId>,
}

fn merge(a: &Requirement, b: &Requirement) -> Requirement {
    let mut constraints = a.constraints.clone();
    for c in &b.constraints {
        if !constraints.contains(c) {
            constraints.push(*c);
        }
    }
    Requirement {
        id: RequirementId(format!("{} / {}", a.id, b.id)),
        subject: a.subject.clone().or_else(|| b.subject.clone()),
        grade: GradeLevel::Mixed,
        term: a.term,
        periods_per_week: a.periods_per_week.max(b.periods_per_week),
        credits: a.credits.max(b.credits),
        constraints,
        constraints_raw: None,
        teacher: a.teacher.clone().or_else(|| b.teacher.clone()),
    }
}

/// Applies every pair of `pairs` whose members both exist, share a term and
/// carry no ASSIGN slots. Cohort clash sets follow the merged names.
pub fn combine(inst: &Instance, pairs: &[CombinablePair], log: &mut RunLog) -> Combination {
    let mut out = inst.clone();
    let mut merged = Vec::new();

    for pair in pairs {
        let find = |id: &RequirementId| out.requirements.iter().position(|r| &r.id == id);
        let (Some(ia), Some(ib)) = (find(&pair.first), find(&pair.second)) else {
            continue;
        };
        if ia == ib {
            log.debug(format!("{} cannot be combined with itself", pair.first));
            continue;
        }
        let (a, b) = (&out.requirements[ia], &out.requirements[ib]);
        if a.term != b.term {
            log.debug(format!("{} and {} are in different terms", a.id, b.id));
            continue;
        }
        if a.has_assign() || b.has_assign() {
            log.info(format!("{} and {} have ASSIGN slots; not combined", a.id, b.id));
            continue;
        }

        let combined = merge(a, b);
        let new_id = combined.id.clone();
        out.requirements[ia] = combined;
        out.requirements.remove(ib);

        for clash in &mut out.cohort_clashes {
            let mut ids: Vec<RequirementId> = Vec::with_capacity(clash.0.len());
            for id in clash.0.drain(..) {
                let id = if id == pair.first || id == pair.second {
                    new_id.clone()
                } else {
                    id
                };
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            clash.0 = ids;
        }
        out.cohort_clashes.retain(|c| c.0.len() > 1);

        log.info(format!("combined {} and {} into {new_id}", pair.first, pair.second));
        merged.push(new_id);
    }

    Combination {
        instance: out,
        merged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{CohortClash, DayOfWeek, RunParams, SlotConstraint, Teacher};

    fn inst() -> Instance {
        let mut e2 = Requirement::new("English 10-2", "English", GradeLevel::Grade(10), 3);
        e2.constraints.push(SlotConstraint::not(Some(DayOfWeek::Mon), 0));
        let mut e4 = Requirement::new("English 10-4", "English", GradeLevel::Grade(10), 5);
        e4.constraints.push(SlotConstraint::not(None, 4));
        e4.credits = Some(5);
        Instance {
            params: RunParams::default(),
            teachers: vec![Teacher::new("A", &["English"])],
            requirements: vec![
                e2,
                Requirement::new("Math10", "Math", GradeLevel::Grade(10), 3),
                e4,
            ],
            cohort_clashes: vec![
                CohortClash(vec![RequirementId::from("English 10-2"), RequirementId::from("Math10")]),
                CohortClash(vec![
                    RequirementId::from("English 10-2"),
                    RequirementId::from("English 10-4"),
                ]),
            ],
        }
    }

    #[test]
    fn merges_a_listed_pair() {
        let mut log = RunLog::new();
        let c = combine(&inst(), &default_pairs(), &mut log);
        assert_eq!(c.merged, vec![RequirementId::from("English 10-2 / English 10-4")]);
        assert_eq!(c.instance.requirements.len(), 2);
        let m = &c.instance.requirements[0];
        assert_eq!(m.grade, GradeLevel::Mixed);
        assert_eq!(m.periods_per_week, 5);
        assert_eq!(m.credits, Some(5));
        assert_eq!(m.constraints.len(), 2);
        assert_eq!(m.subject.as_ref().map(|s| s.0.as_str()), Some("English"));
    }

    #[test]
    fn clash_sets_follow_the_new_name() {
        let c = combine(&inst(), &default_pairs(), &mut RunLog::new());
        assert_eq!(c.instance.cohort_clashes.len(), 1);
        assert_eq!(
            c.instance.cohort_clashes[0].0,
            vec![
                RequirementId::from("English 10-2 / English 10-4"),
                RequirementId::from("Math10")
            ]
        );
    }

    #[test]
    fn assign_or_split_terms_block_merging() {
        let mut i = inst();
        i.requirements[2].constraints.push(SlotConstraint::assign(DayOfWeek::Tue, 1));
        assert!(combine(&i, &default_pairs(), &mut RunLog::new()).merged.is_empty());

        let mut i = inst();
        i.requirements[2].term = 2;
        assert!(combine(&i, &default_pairs(), &mut RunLog::new()).merged.is_empty());
    }

    #[test]
    fn self_pair_keeps_the_requirement() {
        let pairs = vec![CombinablePair::new("Math10", "Math10")];
        let c = combine(&inst(), &pairs, &mut RunLog::new());
        assert!(c.merged.is_empty());
        assert_eq!(c.instance.requirements.len(), 3);
        assert!(c.instance.requirement(&RequirementId::from("Math10")).is_some());
    }

    #[test]
    fn custom_table_replaces_defaults() {
        let pairs = vec![CombinablePair::new("Math10", "English 10-4")];
        let c = combine(&inst(), &pairs, &mut RunLog::new());
        assert_eq!(c.merged, vec![RequirementId::from("Math10 / English 10-4")]);
    }
}
