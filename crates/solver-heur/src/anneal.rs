//! Simulated annealing over complete grids.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sched_core::{cost, CancelFlag, CostBreakdown};
use tracing::{debug, instrument};
use types::{AnnealParams, Coord, DayOfWeek, Grid, Instance, PenaltyWeights};

#[derive(Clone, Debug)]
pub struct AnnealOutcome {
    pub grid: Grid,
    pub cost: CostBreakdown,
    pub iterations: u64,
    pub cancelled: bool,
}

impl AnnealOutcome {
    /// Zero cost, or cheaper than a single unplaced period.
    pub fn is_acceptable(&self, weights: &PenaltyWeights) -> bool {
        self.cost.total == 0.0 || self.cost.total < weights.unplaced_period
    }
}

fn acceptance_prob(delta: f64, temp: f64) -> f64 {
    if delta < 0.0 {
        1.0
    } else if temp <= 0.0 {
        0.0
    } else {
        (-delta / temp).exp()
    }
}

/// Relocates one occupied cell to a random cell of the same term, or swaps
/// two occupied cells of one term. `None` when the grid offers no move at all.
fn neighbour(grid: &Grid, rng: &mut ChaCha8Rng) -> Option<Grid> {
    let occupied: Vec<Coord> = grid.occupied().map(|(c, _)| c).collect();
    if occupied.is_empty() {
        return None;
    }
    let mut next = grid.clone();
    let src = occupied[rng.gen_range(0..occupied.len())];

    if rng.gen_bool(0.5) {
        let partners: Vec<Coord> = occupied
            .iter()
            .copied()
            .filter(|c| c.term == src.term && *c != src)
            .collect();
        if !partners.is_empty() {
            next.swap(src, partners[rng.gen_range(0..partners.len())]);
            return Some(next);
        }
    }

    let cells = DayOfWeek::COUNT * grid.periods() as usize * grid.tracks() as usize;
    if cells < 2 {
        return None;
    }
    let dst = loop {
        let day = DayOfWeek::ALL[rng.gen_range(0..DayOfWeek::COUNT)];
        let period = rng.gen_range(0..grid.periods());
        let track = rng.gen_range(0..grid.tracks());
        let c = Coord::new(src.term, day, period, track);
        if c != src {
            break c;
        }
    };
    if let Some(occ) = next.take(src) {
        if let Some(displaced) = next.place(dst, occ) {
            next.place(src, displaced);
        }
    }
    Some(next)
}

/// Anneals from `start`, returning the cheapest grid seen. Cancellation is
/// checked before each temperature step.
#[instrument(skip_all, fields(start_cost, iterations))]
pub fn anneal(
    start: Grid,
    inst: &Instance,
    params: &AnnealParams,
    weights: &PenaltyWeights,
    rng: &mut ChaCha8Rng,
    cancel: &CancelFlag,
) -> AnnealOutcome {
    let mut current_cost = cost(&start, inst, weights);
    tracing::Span::current().record("start_cost", current_cost.total);
    let mut best = start.clone();
    let mut best_cost = current_cost.clone();
    let mut current = start;

    let mut temp = params.initial_temperature;
    let mut iterations = 0u64;
    let mut cancelled = false;

    'outer: while temp > params.min_temperature && iterations < params.max_iterations {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        for _ in 0..params.iterations_per_temperature {
            if iterations >= params.max_iterations || best_cost.total == 0.0 {
                break 'outer;
            }
            iterations += 1;
            let Some(cand) = neighbour(&current, rng) else {
                break 'outer;
            };
            let cand_cost = cost(&cand, inst, weights);
            let delta = cand_cost.total - current_cost.total;
            if rng.gen::<f64>() < acceptance_prob(delta, temp) {
                current = cand;
                current_cost = cand_cost;
                if current_cost.total < best_cost.total {
                    best = current.clone();
                    best_cost = current_cost.clone();
                }
            }
        }
        temp *= params.cooling_rate;
        debug!(temp, best = best_cost.total, current = current_cost.total, "cooled");
    }

    tracing::Span::current().record("iterations", iterations);
    AnnealOutcome {
        grid: best,
        cost: best_cost,
        iterations,
        cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::rand_core::SeedableRng;
    use types::{GradeLevel, Occupant, Requirement, RequirementId, RunParams, Teacher, TeacherId};

    fn inst() -> Instance {
        Instance {
            params: RunParams {
                periods_per_day: 2,
                full_coverage_grades: vec![],
                ..RunParams::default()
            },
            teachers: vec![Teacher::new("A", &["Math"]), Teacher::new("B", &["English"])],
            requirements: vec![
                Requirement::new("Math10", "Math", GradeLevel::Grade(10), 1),
                Requirement::new("English10", "English", GradeLevel::Grade(10), 1),
            ],
            cohort_clashes: vec![],
        }
    }

    #[test]
    fn acceptance_rule() {
        assert_eq!(acceptance_prob(-5.0, 10.0), 1.0);
        assert_eq!(acceptance_prob(5.0, 0.0), 0.0);
        assert!((acceptance_prob(10.0, 10.0) - (-1.0f64).exp()).abs() < 1e-12);
        assert_eq!(acceptance_prob(0.0, 3.0), 1.0);
    }

    #[test]
    fn neighbour_keeps_the_term() {
        let mut g = Grid::new(2, 2, 2);
        g.place(
            Coord::new(1, DayOfWeek::Mon, 0, 0),
            Occupant::new(&RequirementId::from("X1"), &TeacherId::from("A")),
        );
        g.place(
            Coord::new(2, DayOfWeek::Tue, 1, 1),
            Occupant::new(&RequirementId::from("X2"), &TeacherId::from("B")),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let n = neighbour(&g, &mut rng).unwrap();
            assert_eq!(n.occupied_count(), 2);
            assert_eq!(n.placed_count(1, &RequirementId::from("X1")), 1);
            assert_eq!(n.placed_count(2, &RequirementId::from("X2")), 1);
        }
        assert!(neighbour(&Grid::new(1, 2, 1), &mut rng).is_none());
    }

    #[test]
    fn neighbour_never_drops_an_occupant() {
        let mut g = Grid::new(1, 1, 1);
        for (i, d) in [DayOfWeek::Mon, DayOfWeek::Tue, DayOfWeek::Wed].into_iter().enumerate() {
            g.place(
                Coord::new(1, d, 0, 0),
                Occupant::new(&RequirementId(format!("R{i}")), &TeacherId::from("A")),
            );
        }
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut cur = g;
        for _ in 0..200 {
            cur = neighbour(&cur, &mut rng).unwrap();
            assert_eq!(cur.occupied_count(), 3);
        }
    }

    #[test]
    fn resolves_a_not_violation() {
        let mut i = inst();
        i.requirements[0].constraints.push(types::SlotConstraint::not(Some(DayOfWeek::Mon), 0));
        let mut g = Grid::new(1, 2, 1);
        g.place(
            Coord::new(1, DayOfWeek::Mon, 0, 0),
            Occupant::new(&RequirementId::from("Math10"), &TeacherId::from("A")),
        );
        g.place(
            Coord::new(1, DayOfWeek::Mon, 1, 0),
            Occupant::new(&RequirementId::from("English10"), &TeacherId::from("B")),
        );
        let weights = PenaltyWeights::default();
        assert!(cost(&g, &i, &weights).total >= 1000.0);

        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let out = anneal(g, &i, &AnnealParams::default(), &weights, &mut rng, &CancelFlag::new());
        assert_eq!(out.cost.total, 0.0);
        assert!(out.is_acceptable(&weights));
        assert!(out.iterations > 0);
    }

    #[test]
    fn cancelled_before_start_returns_input() {
        let i = inst();
        let g = Grid::new(1, 2, 1);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let out = anneal(g.clone(), &i, &AnnealParams::default(), &PenaltyWeights::default(), &mut rng, &cancel);
        assert!(out.cancelled);
        assert_eq!(out.iterations, 0);
        assert_eq!(out.grid, g);
        assert_eq!(out.cost.unplaced_periods, 2);
    }

    #[test]
    fn iteration_cap_is_honoured() {
        let i = inst();
        let mut g = Grid::new(1, 2, 2);
        // B is not qualified for Math and moves cannot change teachers
        g.place(
            Coord::new(1, DayOfWeek::Mon, 0, 0),
            Occupant::new(&RequirementId::from("Math10"), &TeacherId::from("B")),
        );
        let params = AnnealParams {
            max_iterations: 37,
            ..AnnealParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let out = anneal(g, &i, &params, &PenaltyWeights::default(), &mut rng, &CancelFlag::new());
        assert_eq!(out.iterations, 37);
    }
}
