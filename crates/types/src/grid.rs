//! The term × day × period × track assignment grid.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{DayOfWeek, RequirementId, TeacherId};

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
pub struct Occupant {
    pub requirement: RequirementId,
    pub teacher: TeacherId,
}

impl Occupant {
    pub fn new(requirement: &RequirementId, teacher: &TeacherId) -> Self {
        Self {
            requirement: requirement.clone(),
            teacher: teacher.clone(),
        }
    }
}

/// A cell address. Terms are 1-based, periods and tracks 0-based.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
)]
pub struct Coord {
    pub term: u32,
    pub day: DayOfWeek,
    pub period: u32,
    pub track: u32,
}

impl Coord {
    pub fn new(term: u32, day: DayOfWeek, period: u32, track: u32) -> Self {
        Self {
            term,
            day,
            period,
            track,
        }
    }
}

/// Dense cell storage, laid out term-major then day, period, track.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
pub struct Grid {
    terms: u32,
    periods: u32,
    tracks: u32,
    cells: Vec<Option<Occupant>>,
}

impl Grid {
    /// Dimensions whose cell count overflows `usize` yield a grid with no
    /// cells; `is_well_formed` reports it.
    pub fn new(terms: u32, periods: u32, tracks: u32) -> Self {
        let len = Self::cell_count(terms, periods, tracks).unwrap_or(0);
        Self {
            terms,
            periods,
            tracks,
            cells: vec![None; len],
        }
    }

    /// `terms * 5 * periods * tracks`, or `None` on overflow.
    pub fn cell_count(terms: u32, periods: u32, tracks: u32) -> Option<usize> {
        (terms as usize)
            .checked_mul(DayOfWeek::COUNT)?
            .checked_mul(periods as usize)?
            .checked_mul(tracks as usize)
    }

    pub fn terms(&self) -> u32 {
        self.terms
    }

    pub fn periods(&self) -> u32 {
        self.periods
    }

    pub fn tracks(&self) -> u32 {
        self.tracks
    }

    /// False for a deserialized grid whose cell count disagrees with its dimensions.
    pub fn is_well_formed(&self) -> bool {
        Self::cell_count(self.terms, self.periods, self.tracks) == Some(self.cells.len())
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.term >= 1 && c.term <= self.terms && c.period < self.periods && c.track < self.tracks
    }

    fn index(&self, c: Coord) -> Option<usize> {
        if !self.contains(c) {
            return None;
        }
        let t = (c.term - 1) as usize;
        let p = self.periods as usize;
        let k = self.tracks as usize;
        let idx = (t * DayOfWeek::COUNT + c.day.index())
            .checked_mul(p)?
            .checked_add(c.period as usize)?
            .checked_mul(k)?
            .checked_add(c.track as usize)?;
        (idx < self.cells.len()).then_some(idx)
    }

    fn coord_at(&self, idx: usize) -> Coord {
        let k = self.tracks as usize;
        let p = self.periods as usize;
        let track = idx % k;
        let rest = idx / k;
        let period = rest % p;
        let rest = rest / p;
        let day = rest % DayOfWeek::COUNT;
        let term = rest / DayOfWeek::COUNT;
        Coord {
            term: term as u32 + 1,
            day: DayOfWeek::ALL[day],
            period: period as u32,
            track: track as u32,
        }
    }

    pub fn get(&self, c: Coord) -> Option<&Occupant> {
        self.index(c).and_then(|i| self.cells.get(i)).and_then(Option::as_ref)
    }

    pub fn is_empty_at(&self, c: Coord) -> bool {
        self.get(c).is_none()
    }

    /// Writes `occ` at `c`, returning whatever it displaced. Out-of-range
    /// coordinates are ignored and hand `occ` back.
    pub fn place(&mut self, c: Coord, occ: Occupant) -> Option<Occupant> {
        match self.index(c) {
            Some(i) => self.cells[i].replace(occ),
            None => Some(occ),
        }
    }

    pub fn take(&mut self, c: Coord) -> Option<Occupant> {
        self.index(c).and_then(|i| self.cells[i].take())
    }

    pub fn swap(&mut self, a: Coord, b: Coord) {
        if let (Some(i), Some(j)) = (self.index(a), self.index(b)) {
            self.cells.swap(i, j);
        }
    }

    /// Every coordinate of the grid, in storage order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.cells.len()).map(move |i| self.coord_at(i))
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Coord, &Occupant)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(i, cell)| cell.as_ref().map(|o| (self.coord_at(i), o)))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Occupants of every track at one (term, day, period).
    pub fn at(&self, term: u32, day: DayOfWeek, period: u32) -> impl Iterator<Item = &Occupant> + '_ {
        (0..self.tracks).filter_map(move |track| self.get(Coord::new(term, day, period, track)))
    }

    pub fn free_track(&self, term: u32, day: DayOfWeek, period: u32) -> Option<u32> {
        if term < 1 || term > self.terms || period >= self.periods {
            return None;
        }
        (0..self.tracks).find(|&track| self.is_empty_at(Coord::new(term, day, period, track)))
    }

    pub fn is_full(&self, term: u32, day: DayOfWeek, period: u32) -> bool {
        self.free_track(term, day, period).is_none()
    }

    pub fn teacher_busy(&self, term: u32, day: DayOfWeek, period: u32, teacher: &TeacherId) -> bool {
        self.at(term, day, period).any(|o| &o.teacher == teacher)
    }

    pub fn placed_count(&self, term: u32, requirement: &RequirementId) -> u32 {
        self.occupied()
            .filter(|(c, o)| c.term == term && &o.requirement == requirement)
            .count() as u32
    }

    pub fn taught_count(&self, term: u32, teacher: &TeacherId) -> u32 {
        self.occupied()
            .filter(|(c, o)| c.term == term && &o.teacher == teacher)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(r: &str, t: &str) -> Occupant {
        Occupant::new(&RequirementId::from(r), &TeacherId::from(t))
    }

    #[test]
    fn coordinates_round_trip_through_storage_order() {
        let g = Grid::new(2, 3, 2);
        let all: Vec<Coord> = g.coords().collect();
        assert_eq!(all.len(), 2 * 5 * 3 * 2);
        assert_eq!(all[0], Coord::new(1, DayOfWeek::Mon, 0, 0));
        assert_eq!(*all.last().unwrap(), Coord::new(2, DayOfWeek::Fri, 2, 1));
        for (i, c) in all.iter().enumerate() {
            assert_eq!(g.index(*c), Some(i));
        }
    }

    #[test]
    fn place_reports_displaced_occupant() {
        let mut g = Grid::new(1, 2, 1);
        let c = Coord::new(1, DayOfWeek::Tue, 1, 0);
        assert!(g.place(c, occ("Math10", "A")).is_none());
        let prev = g.place(c, occ("Eng10", "B"));
        assert_eq!(prev, Some(occ("Math10", "A")));
        assert_eq!(g.get(c), Some(&occ("Eng10", "B")));
        assert_eq!(g.occupied_count(), 1);
    }

    #[test]
    fn free_track_skips_occupied_tracks() {
        let mut g = Grid::new(1, 1, 2);
        g.place(Coord::new(1, DayOfWeek::Mon, 0, 0), occ("Math10", "A"));
        assert_eq!(g.free_track(1, DayOfWeek::Mon, 0), Some(1));
        g.place(Coord::new(1, DayOfWeek::Mon, 0, 1), occ("Eng10", "B"));
        assert!(g.is_full(1, DayOfWeek::Mon, 0));
        assert!(g.teacher_busy(1, DayOfWeek::Mon, 0, &TeacherId::from("B")));
        assert!(!g.teacher_busy(1, DayOfWeek::Tue, 0, &TeacherId::from("B")));
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let mut g = Grid::new(1, 1, 1);
        let bad = Coord::new(2, DayOfWeek::Mon, 0, 0);
        assert_eq!(g.place(bad, occ("X", "Y")), Some(occ("X", "Y")));
        assert!(g.get(bad).is_none());
        assert_eq!(g.free_track(0, DayOfWeek::Mon, 0), None);
    }

    #[test]
    fn swap_exchanges_cells() {
        let mut g = Grid::new(1, 2, 1);
        let a = Coord::new(1, DayOfWeek::Mon, 0, 0);
        let b = Coord::new(1, DayOfWeek::Fri, 1, 0);
        g.place(a, occ("Math10", "A"));
        g.swap(a, b);
        assert!(g.is_empty_at(a));
        assert_eq!(g.placed_count(1, &RequirementId::from("Math10")), 1);
        assert_eq!(g.taught_count(1, &TeacherId::from("A")), 1);
    }

    #[test]
    fn overflowing_dimensions_give_an_empty_malformed_grid() {
        assert_eq!(Grid::cell_count(u32::MAX, u32::MAX, u32::MAX), None);
        let mut g = Grid::new(u32::MAX, u32::MAX, u32::MAX);
        assert!(!g.is_well_formed());
        assert_eq!(g.coords().count(), 0);
        let c = Coord::new(u32::MAX, DayOfWeek::Fri, u32::MAX - 1, u32::MAX - 1);
        assert_eq!(g.place(c, occ("X", "Y")), Some(occ("X", "Y")));
        assert!(g.get(c).is_none());
    }
}
