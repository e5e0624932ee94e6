//! Forced completion of a grid, used as the annealer's starting point.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use types::{Coord, Grid, Instance, Occupant, Requirement, Teacher, TeacherId};

/// Stand-in teacher for periods nobody is qualified to teach.
pub const PLACEHOLDER_TEACHER: &str = "UNQUALIFIED";

fn choose_teacher(inst: &Instance, r: &Requirement, rng: &mut ChaCha8Rng) -> TeacherId {
    if let Some(id) = &r.teacher {
        let qualified = match (&r.subject, inst.teacher(id)) {
            (Some(s), Some(t)) => t.is_qualified(s),
            (None, _) => true,
            (Some(_), None) => false,
        };
        if qualified {
            return id.clone();
        }
    }
    let qualified: Vec<&Teacher> = match &r.subject {
        Some(s) => inst.teachers.iter().filter(|t| t.is_qualified(s)).collect(),
        None => Vec::new(),
    };
    if qualified.is_empty() {
        return TeacherId::from(PLACEHOLDER_TEACHER);
    }
    qualified[rng.gen_range(0..qualified.len())].id.clone()
}

/// Puts every missing required period somewhere on `grid`. ASSIGN slots are
/// tried first, then the first shuffled free cell of the right term where
/// the teacher is available and no NOT rule applies. Returns how many
/// periods could not be placed at all.
pub fn complete(grid: &mut Grid, inst: &Instance, rng: &mut ChaCha8Rng) -> u32 {
    let mut pending: Vec<&Requirement> = inst
        .requirements
        .iter()
        .filter(|r| r.term >= 1 && r.term <= grid.terms())
        .flat_map(|r| {
            let missing = r.periods_per_week.saturating_sub(grid.placed_count(r.term, &r.id));
            std::iter::repeat(r).take(missing as usize)
        })
        .collect();
    pending.shuffle(rng);
    pending.sort_by_key(|r| !r.has_assign());

    let mut cells: Vec<Coord> = grid.coords().collect();
    cells.shuffle(rng);

    let mut stranded = 0;
    for r in pending {
        let teacher = choose_teacher(inst, r, rng);
        let avail = inst.teacher(&teacher).map(|t| &t.availability);
        let occ = Occupant::new(&r.id, &teacher);

        let pinned = r.assign_slots().find_map(|s| {
            let taken = grid.at(r.term, s.day, s.period).any(|o| o.requirement == r.id);
            if taken {
                return None;
            }
            grid.free_track(r.term, s.day, s.period)
                .map(|k| Coord::new(r.term, s.day, s.period, k))
        });

        let spot = pinned.or_else(|| {
            cells.iter().copied().find(|c| {
                c.term == r.term
                    && grid.is_empty_at(*c)
                    && !r.forbids(c.day, c.period)
                    && avail.map_or(true, |a| a.is_available(c.day, c.period))
            })
        });

        match spot {
            Some(c) => {
                grid.place(c, occ);
            }
            None => stranded += 1,
        }
    }
    stranded
}

/// A fresh grid with every required period forced onto it.
pub fn initial_grid(inst: &Instance, rng: &mut ChaCha8Rng) -> (Grid, u32) {
    let p = &inst.params;
    let mut grid = Grid::new(p.num_terms, p.periods_per_day, p.tracks_per_period);
    let stranded = complete(&mut grid, inst, rng);
    (grid, stranded)
}
