use std::fmt::Write;

use types::Grid;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Stable content digest of a grid: dimensions plus every occupied cell in
/// storage order, so the order cells were filled in does not matter.
pub fn fingerprint(grid: &Grid) -> String {
    let mut canon = format!("{}x{}x{}", grid.terms(), grid.periods(), grid.tracks());
    for (c, o) in grid.occupied() {
        let _ = write!(
            canon,
            "|{}:{}:{}:{}={}@{}",
            c.term, c.day, c.period, c.track, o.requirement, o.teacher
        );
    }
    format!("{:016x}", fnv1a(canon.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Coord, DayOfWeek, Occupant, RequirementId, TeacherId};

    fn occ(r: &str, t: &str) -> Occupant {
        Occupant::new(&RequirementId::from(r), &TeacherId::from(t))
    }

    #[test]
    fn fill_order_does_not_matter() {
        let a = Coord::new(1, DayOfWeek::Mon, 0, 0);
        let b = Coord::new(1, DayOfWeek::Thu, 2, 1);
        let mut g1 = Grid::new(1, 3, 2);
        g1.place(a, occ("Math10", "A"));
        g1.place(b, occ("English10", "B"));
        let mut g2 = Grid::new(1, 3, 2);
        g2.place(b, occ("English10", "B"));
        g2.place(a, occ("Math10", "A"));
        assert_eq!(fingerprint(&g1), fingerprint(&g2));
        assert_eq!(fingerprint(&g1).len(), 16);
    }

    #[test]
    fn different_contents_differ() {
        let mut g1 = Grid::new(1, 3, 1);
        g1.place(Coord::new(1, DayOfWeek::Mon, 0, 0), occ("Math10", "A"));
        let mut g2 = Grid::new(1, 3, 1);
        g2.place(Coord::new(1, DayOfWeek::Mon, 1, 0), occ("Math10", "A"));
        assert_ne!(fingerprint(&g1), fingerprint(&g2));
        assert_ne!(fingerprint(&Grid::new(1, 3, 1)), fingerprint(&Grid::new(1, 4, 1)));
    }

    #[test]
    fn known_vector() {
        assert_eq!(fnv1a(b""), FNV_OFFSET);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
    }

    proptest::proptest! {
        #[test]
        fn any_fill_order_gives_one_digest(
            cells in proptest::collection::btree_map((0usize..5, 0u32..4, 0u32..2), 0u8..4, 0..12),
            rotate in 0usize..12,
        ) {
            let placed: Vec<(Coord, Occupant)> = cells
                .into_iter()
                .map(|((d, p, k), r)| (Coord::new(1, DayOfWeek::ALL[d], p, k), occ(&format!("R{r}"), "T")))
                .collect();
            let mut forward = Grid::new(1, 4, 2);
            for (c, o) in &placed {
                forward.place(*c, o.clone());
            }
            let mut shuffled = placed.clone();
            if !shuffled.is_empty() {
                let n = rotate % shuffled.len();
                shuffled.rotate_left(n);
                shuffled.reverse();
            }
            let mut backward = Grid::new(1, 4, 2);
            for (c, o) in shuffled {
                backward.place(c, o);
            }
            proptest::prop_assert_eq!(fingerprint(&forward), fingerprint(&backward));
        }
    }
}
