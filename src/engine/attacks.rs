//! Pre-computed attack tables for move generation.
//!
//! All tables are initialised once (via `OnceLock`) and live for the lifetime
//! of the process.  Sliding attacks are split into three line families
//! (rank, file, diagonal).  For each square and family we enumerate every
//! subset of the relevant occupancy mask and store the resulting attack set
//! at a magic index of that subset, so a lookup is `mask & occupied`, one
//! multiply and one shift.  The `ray` and `between` tables describe the full
//! line through two squares and the open segment between them.

use crate::engine::types::{Bitboard, Color, Square};
use crate::engine::zobrist::Xorshift64;
use std::sync::OnceLock;

// =========================================================================
// Public API
// =========================================================================

/// Get a reference to the global attack tables.
pub fn tables() -> &'static AttackTables {
    static TABLES: OnceLock<AttackTables> = OnceLock::new();
    TABLES.get_or_init(AttackTables::init)
}

/// Pre-computed attack/ray tables for every piece type.
pub struct AttackTables {
    pub knight: [Bitboard; 64],
    pub king: [Bitboard; 64],
    /// `pawn_attacks[color][square]`: squares a pawn on `square` attacks.
    pub pawn_attacks: [[Bitboard; 64]; 2],
    rank: LineTable,
    file: LineTable,
    diag: LineTable,
    /// `rays[a][b]`: full board line through `a` and `b` (both included).
    rays: Vec<[Bitboard; 64]>,
    /// `between[a][b]`: squares strictly between `a` and `b` on their line.
    between: Vec<[Bitboard; 64]>,
}

/// Magic lookup parameters for one square of a line family.
#[derive(Clone, Copy, Default)]
struct MagicEntry {
    /// Relevant occupancy (edges excluded).
    mask: u64,
    magic: u64,
    /// 64 minus the number of mask bits.
    shift: u32,
    /// Start of this square's slice in `LineTable::attacks`.
    offset: usize,
}

impl MagicEntry {
    #[inline]
    fn index(&self, occupied: u64) -> usize {
        self.offset + ((occupied & self.mask).wrapping_mul(self.magic) >> self.shift) as usize
    }
}

/// Sliding attacks for one line family, indexed by magic multiplication of
/// the occupancy subset.
struct LineTable {
    entries: [MagicEntry; 64],
    attacks: Vec<Bitboard>,
}

impl LineTable {
    #[inline]
    fn attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.attacks[self.entries[sq.index()].index(occupied.0)]
    }
}

impl AttackTables {
    // -------------------------------------------------------------------
    // Step lookups
    // -------------------------------------------------------------------

    /// Knight attacks from a square.
    #[inline]
    pub fn knight_attacks(&self, sq: Square) -> Bitboard {
        self.knight[sq.index()]
    }

    /// King attacks from a square.
    #[inline]
    pub fn king_attacks(&self, sq: Square) -> Bitboard {
        self.king[sq.index()]
    }

    /// Pawn attack squares for a given colour.
    #[inline]
    pub fn pawn_attacks(&self, color: Color, sq: Square) -> Bitboard {
        self.pawn_attacks[color.index()][sq.index()]
    }

    // -------------------------------------------------------------------
    // Slider lookups
    // -------------------------------------------------------------------

    /// Attacks along the rank of `sq`.
    #[inline]
    pub fn rank_attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.rank.attacks(sq, occupied)
    }

    /// Attacks along the file of `sq`.
    #[inline]
    pub fn file_attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.file.attacks(sq, occupied)
    }

    /// Attacks along both diagonals through `sq`.
    #[inline]
    pub fn diag_attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.diag.attacks(sq, occupied)
    }

    #[inline]
    pub fn rook_attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.rank_attacks(sq, occupied) | self.file_attacks(sq, occupied)
    }

    #[inline]
    pub fn bishop_attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.diag_attacks(sq, occupied)
    }

    /// Queen attacks = rook | bishop.
    #[inline]
    pub fn queen_attacks(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.rook_attacks(sq, occupied) | self.bishop_attacks(sq, occupied)
    }

    // -------------------------------------------------------------------
    // Lines
    // -------------------------------------------------------------------

    /// Full line through `a` and `b` including both, or empty if they are
    /// not on a common rank, file or diagonal.
    #[inline]
    pub fn ray(&self, a: Square, b: Square) -> Bitboard {
        self.rays[a.index()][b.index()]
    }

    /// Squares strictly between `a` and `b` on their common line.
    #[inline]
    pub fn between(&self, a: Square, b: Square) -> Bitboard {
        self.between[a.index()][b.index()]
    }
}

// =========================================================================
// Initialisation
// =========================================================================

impl AttackTables {
    fn init() -> Self {
        let knight = init_step_table(&KNIGHT_DELTAS);
        let king = init_step_table(&KING_DELTAS);
        let pawn_attacks = [
            init_step_table(&WHITE_PAWN_DELTAS),
            init_step_table(&BLACK_PAWN_DELTAS),
        ];
        let rank = init_line_table(&RANK_DELTAS);
        let file = init_line_table(&FILE_DELTAS);
        let diag = init_line_table(&DIAG_DELTAS);

        let mut tables = AttackTables {
            knight,
            king,
            pawn_attacks,
            rank,
            file,
            diag,
            rays: Vec::new(),
            between: Vec::new(),
        };
        let (rays, between) = init_lines(&tables);
        tables.rays = rays;
        tables.between = between;
        tables
    }
}

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const WHITE_PAWN_DELTAS: [(i8, i8); 2] = [(1, -1), (1, 1)];
const BLACK_PAWN_DELTAS: [(i8, i8); 2] = [(-1, -1), (-1, 1)];

const RANK_DELTAS: [(i8, i8); 2] = [(0, -1), (0, 1)];
const FILE_DELTAS: [(i8, i8); 2] = [(-1, 0), (1, 0)];
const DIAG_DELTAS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

// =========================================================================
// Step attacks (knight, king, pawn)
// =========================================================================

/// One table entry per square: every `(rank_delta, file_delta)` target
/// that stays on the board.
fn init_step_table(deltas: &[(i8, i8)]) -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    for sq in 0..64u8 {
        let file = (sq & 7) as i8;
        let rank = (sq >> 3) as i8;
        let mut bb = 0u64;
        for &(dr, df) in deltas {
            let r = rank + dr;
            let f = file + df;
            if (0..8).contains(&r) && (0..8).contains(&f) {
                bb |= 1u64 << (r * 8 + f);
            }
        }
        table[sq as usize] = Bitboard(bb);
    }
    table
}

// =========================================================================
// Sliding attacks
// =========================================================================

/// Enumerate all subsets of `mask` using the Carry-Rippler trick.
fn enumerate_subsets(mask: u64) -> Vec<u64> {
    let mut subsets = Vec::with_capacity(1 << mask.count_ones());
    let mut subset = 0u64;
    loop {
        subsets.push(subset);
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            break;
        }
    }
    subsets
}

/// Compute sliding attacks along rays from `sq`, using `blockers` as obstacles.
/// `deltas` lists the (rank_delta, file_delta) ray directions.
fn sliding_attacks(sq: u8, blockers: u64, deltas: &[(i8, i8)]) -> u64 {
    let file = (sq & 7) as i8;
    let rank = (sq >> 3) as i8;
    let mut attacks = 0u64;
    for &(dr, df) in deltas {
        let mut r = rank + dr;
        let mut f = file + df;
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let bit = 1u64 << (r * 8 + f);
            attacks |= bit;
            if blockers & bit != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

/// Board edges that never matter as blockers for a slider on `sq`: the
/// outer ranks and files, except the ones `sq` itself stands on.
fn edges(sq: u8) -> u64 {
    let rank = Bitboard::rank(sq >> 3).0;
    let file = Bitboard::file(sq & 7).0;
    ((Bitboard::RANK_1.0 | Bitboard::RANK_8.0) & !rank)
        | ((Bitboard::FILE_A.0 | Bitboard::FILE_H.0) & !file)
}

fn init_line_table(deltas: &[(i8, i8)]) -> LineTable {
    // Fixed seed, so the magics are the same every run.
    let mut rng = Xorshift64::new(0x9E37_79B9_7F4A_7C15);
    let mut entries = [MagicEntry::default(); 64];
    let mut attacks = Vec::new();

    for sq in 0..64u8 {
        let mask = sliding_attacks(sq, 0, deltas) & !edges(sq);
        let bits = mask.count_ones().max(1);
        let subsets: Vec<(u64, Bitboard)> = enumerate_subsets(mask)
            .into_iter()
            .map(|subset| (subset, Bitboard(sliding_attacks(sq, subset, deltas))))
            .collect();

        let shift = 64 - bits;
        let (magic, slots) = find_magic(&subsets, shift, &mut rng);
        entries[sq as usize] = MagicEntry {
            mask,
            magic,
            shift,
            offset: attacks.len(),
        };
        attacks.extend(slots);
    }

    LineTable { entries, attacks }
}

/// Search for a multiplier that maps every occupancy subset to a slot
/// holding its attack set.  Subsets with equal attacks may share a slot.
fn find_magic(subsets: &[(u64, Bitboard)], shift: u32, rng: &mut Xorshift64) -> (u64, Vec<Bitboard>) {
    let size = 1usize << (64 - shift);
    loop {
        // Sparse candidates succeed far more often.
        let magic = rng.next_u64() & rng.next_u64() & rng.next_u64();
        let mut slots: Vec<Option<Bitboard>> = vec![None; size];
        let fits = subsets.iter().all(|&(subset, attack)| {
            let index = (subset.wrapping_mul(magic) >> shift) as usize;
            match slots[index] {
                Some(existing) => existing == attack,
                None => {
                    slots[index] = Some(attack);
                    true
                }
            }
        });
        if fits {
            let slots = slots.into_iter().map(|slot| slot.unwrap_or(Bitboard::EMPTY)).collect();
            return (magic, slots);
        }
    }
}

// =========================================================================
// Rays and segments
// =========================================================================

fn init_lines(t: &AttackTables) -> (Vec<[Bitboard; 64]>, Vec<[Bitboard; 64]>) {
    let mut rays = vec![[Bitboard::EMPTY; 64]; 64];
    let mut between = vec![[Bitboard::EMPTY; 64]; 64];

    for a in Square::all() {
        let a_bb = Bitboard::from_square(a);
        let diag_a = t.diag_attacks(a, Bitboard::EMPTY);
        let rank_a = t.rank_attacks(a, Bitboard::EMPTY);
        let file_a = t.file_attacks(a, Bitboard::EMPTY);

        for b in Square::all() {
            let b_bb = Bitboard::from_square(b);
            // The segment is where each square's attacks meet when the
            // other square is the only blocker.
            let (ray, segment) = if diag_a.is_set(b) {
                (
                    (diag_a & t.diag_attacks(b, Bitboard::EMPTY)) | a_bb | b_bb,
                    t.diag_attacks(a, b_bb) & t.diag_attacks(b, a_bb),
                )
            } else if rank_a.is_set(b) {
                (
                    rank_a | a_bb,
                    t.rank_attacks(a, b_bb) & t.rank_attacks(b, a_bb),
                )
            } else if file_a.is_set(b) {
                (
                    file_a | a_bb,
                    t.file_attacks(a, b_bb) & t.file_attacks(b, a_bb),
                )
            } else {
                (Bitboard::EMPTY, Bitboard::EMPTY)
            };
            rays[a.index()][b.index()] = ray;
            between[a.index()][b.index()] = segment & ray;
        }
    }

    (rays, between)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn bb(names: &[&str]) -> Bitboard {
        names.iter().map(|n| sq(n)).collect()
    }

    // -------------------------------------------------------------------
    // Knight
    // -------------------------------------------------------------------

    #[test]
    fn knight_center_attacks() {
        let t = tables();
        assert_eq!(
            t.knight_attacks(sq("e4")),
            bb(&["d2", "f2", "c3", "g3", "c5", "g5", "d6", "f6"])
        );
    }

    #[test]
    fn knight_corner_and_edge_attacks() {
        let t = tables();
        assert_eq!(t.knight_attacks(sq("a1")), bb(&["b3", "c2"]));
        assert_eq!(t.knight_attacks(sq("a4")).pop_count(), 4);
        assert_eq!(t.knight_attacks(sq("h8")), bb(&["g6", "f7"]));
    }

    // -------------------------------------------------------------------
    // King
    // -------------------------------------------------------------------

    #[test]
    fn king_attacks_do_not_wrap() {
        let t = tables();
        assert_eq!(t.king_attacks(sq("e4")).pop_count(), 8);
        assert_eq!(t.king_attacks(sq("a1")), bb(&["a2", "b1", "b2"]));
        assert_eq!(t.king_attacks(sq("h4")), bb(&["g3", "g4", "g5", "h3", "h5"]));
    }

    // -------------------------------------------------------------------
    // Pawn attacks
    // -------------------------------------------------------------------

    #[test]
    fn pawn_attacks_by_color() {
        let t = tables();
        assert_eq!(t.pawn_attacks(Color::White, sq("e4")), bb(&["d5", "f5"]));
        assert_eq!(t.pawn_attacks(Color::Black, sq("e4")), bb(&["d3", "f3"]));
        assert_eq!(t.pawn_attacks(Color::White, sq("a2")), bb(&["b3"]));
        assert_eq!(t.pawn_attacks(Color::White, sq("h2")), bb(&["g3"]));
        assert!(t.pawn_attacks(Color::White, sq("e8")).is_empty());
        assert!(t.pawn_attacks(Color::Black, sq("e1")).is_empty());
    }

    // -------------------------------------------------------------------
    // Sliders
    // -------------------------------------------------------------------

    #[test]
    fn relevant_masks_skip_edges() {
        let t = tables();
        assert_eq!(Bitboard(t.rank.entries[sq("a1").index()].mask), bb(&["b1", "c1", "d1", "e1", "f1", "g1"]));
        assert_eq!(Bitboard(t.file.entries[sq("e4").index()].mask), bb(&["e2", "e3", "e5", "e6", "e7"]));
        let d4 = t.diag.entries[sq("d4").index()];
        assert_eq!(d4.mask.count_ones(), 9);
        assert_eq!(d4.shift, 64 - 9);
    }

    #[test]
    fn magic_lookup_matches_ray_walk_for_every_subset() {
        let t = tables();
        for (table, deltas) in [
            (&t.rank, &RANK_DELTAS[..]),
            (&t.file, &FILE_DELTAS[..]),
            (&t.diag, &DIAG_DELTAS[..]),
        ] {
            for sq in Square::all() {
                let entry = table.entries[sq.index()];
                for subset in enumerate_subsets(entry.mask) {
                    // Squares outside the mask must not change the result.
                    let occupied = Bitboard(subset | !entry.mask & 0x8100_0000_0000_0081);
                    assert_eq!(
                        table.attacks(sq, occupied),
                        Bitboard(sliding_attacks(sq.0, subset, deltas)),
                        "{sq} subset {subset:#x}"
                    );
                }
            }
        }
    }

    #[test]
    fn magic_slices_do_not_overlap() {
        let t = tables();
        for table in [&t.rank, &t.file, &t.diag] {
            let mut end = 0;
            for entry in &table.entries {
                assert_eq!(entry.offset, end);
                end += 1usize << (64 - entry.shift);
            }
            assert_eq!(end, table.attacks.len());
        }
    }

    #[test]
    fn rook_attacks_empty_and_blocked() {
        let t = tables();
        assert_eq!(t.rook_attacks(sq("e4"), Bitboard::EMPTY).pop_count(), 14);
        assert_eq!(t.rook_attacks(sq("a1"), Bitboard::EMPTY).pop_count(), 14);

        let attacks = t.rook_attacks(sq("e4"), bb(&["e6", "b4"]));
        assert!(attacks.is_set(sq("e6")));
        assert!(!attacks.is_set(sq("e7")));
        assert!(attacks.is_set(sq("b4")));
        assert!(!attacks.is_set(sq("a4")));
    }

    #[test]
    fn edge_blockers_do_not_change_attacks() {
        let t = tables();
        let open = t.rank_attacks(sq("d1"), Bitboard::EMPTY);
        assert_eq!(t.rank_attacks(sq("d1"), bb(&["a1", "h1"])), open);
    }

    #[test]
    fn bishop_attacks_empty_and_blocked() {
        let t = tables();
        assert_eq!(t.bishop_attacks(sq("e4"), Bitboard::EMPTY).pop_count(), 13);
        assert_eq!(t.bishop_attacks(sq("a1"), Bitboard::EMPTY).pop_count(), 7);

        let attacks = t.bishop_attacks(sq("e4"), bb(&["c6"]));
        assert!(attacks.is_set(sq("d5")));
        assert!(attacks.is_set(sq("c6")));
        assert!(!attacks.is_set(sq("b7")));
    }

    #[test]
    fn queen_attacks_empty_board() {
        let t = tables();
        assert_eq!(t.queen_attacks(sq("e4"), Bitboard::EMPTY).pop_count(), 27);
    }

    // -------------------------------------------------------------------
    // Rays
    // -------------------------------------------------------------------

    #[test]
    fn ray_covers_full_line() {
        let t = tables();
        assert_eq!(t.ray(sq("a1"), sq("c3")), bb(&["a1", "b2", "c3", "d4", "e5", "f6", "g7", "h8"]));
        assert_eq!(t.ray(sq("c1"), sq("f1")), Bitboard::RANK_1);
        assert_eq!(t.ray(sq("e2"), sq("e7")), Bitboard::file(4));
        assert!(t.ray(sq("a1"), sq("b3")).is_empty());
        assert_eq!(t.ray(sq("b3"), sq("e6")), t.ray(sq("e6"), sq("b3")));
    }

    #[test]
    fn between_is_open_segment() {
        let t = tables();
        assert_eq!(t.between(sq("a1"), sq("d4")), bb(&["b2", "c3"]));
        assert_eq!(t.between(sq("e1"), sq("h1")), bb(&["f1", "g1"]));
        assert_eq!(t.between(sq("e8"), sq("e2")), bb(&["e3", "e4", "e5", "e6", "e7"]));
        assert!(t.between(sq("e1"), sq("f1")).is_empty());
        assert!(t.between(sq("a1"), sq("b3")).is_empty());
        assert!(t.between(sq("c3"), sq("c3")).is_empty());
    }

    #[test]
    fn subset_enumeration_is_complete() {
        let mask = 0b1011_0000u64;
        let subsets = enumerate_subsets(mask);
        assert_eq!(subsets.len(), 8);
        assert!(subsets.iter().all(|s| s & !mask == 0));
    }
}
