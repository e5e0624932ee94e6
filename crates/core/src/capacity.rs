//! Per-teacher teaching ceilings derived from availability.
//!
//! A teacher's ceiling is the number of weekly slots they are available for
//! minus the protected preparation blocks. The ceiling may be negative, in
//! which case the teacher can never be given a class.

use std::collections::HashMap;

use types::{RunParams, Teacher, TeacherId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeacherCapacity {
    pub available: u32,
    pub max_load: i64,
}

#[derive(Clone, Debug, Default)]
pub struct CapacityModel {
    entries: HashMap<TeacherId, TeacherCapacity>,
}

impl CapacityModel {
    pub fn build(teachers: &[Teacher], params: &RunParams) -> Self {
        let entries = teachers
            .iter()
            .map(|t| {
                let available = t.availability.available_count(params.periods_per_day);
                let max_load = available as i64 - params.min_prep_blocks as i64;
                (t.id.clone(), TeacherCapacity { available, max_load })
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: &TeacherId) -> Option<TeacherCapacity> {
        self.entries.get(id).copied()
    }

    /// Available slots; zero for unknown teachers.
    pub fn available(&self, id: &TeacherId) -> u32 {
        self.get(id).map_or(0, |c| c.available)
    }

    /// Ceiling on weekly periods; unknown teachers get -1.
    pub fn max_load(&self, id: &TeacherId) -> i64 {
        self.get(id).map_or(-1, |c| c.max_load)
    }

    /// Whether `extra` more periods fit on top of `current`.
    pub fn has_room(&self, id: &TeacherId, current: u32, extra: u32) -> bool {
        let max = self.max_load(id);
        max >= 0 && current as i64 + extra as i64 <= max
    }

    /// Teachers who can never take a class, sorted by id.
    pub fn overcommitted(&self) -> Vec<&TeacherId> {
        let mut v: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, c)| c.max_load < 0)
            .map(|(id, _)| id)
            .collect();
        v.sort();
        v
    }

    pub fn any_can_teach(&self) -> bool {
        self.entries.values().any(|c| c.max_load > 0)
    }
}
