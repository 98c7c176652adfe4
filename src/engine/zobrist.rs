//! Zobrist hashing for position identification.
//!
//! Each aspect of a position (piece on square, side to move, castling
//! right, en passant file) gets a random 64-bit key. The position hash is
//! the XOR of all applicable keys, so positions with equal
//! [`TranspositionKey`](crate::engine::game::TranspositionKey)s hash equal.

use std::sync::OnceLock;

use crate::engine::game::GameState;
use crate::engine::types::{Bitboard, Color, PieceType, Square};

// ---------------------------------------------------------------------------
// Table dimensions
// ---------------------------------------------------------------------------

/// One key per castling rook square: a1..h1 then a8..h8.
const CASTLING_KEYS: usize = 16;
/// 8 en-passant files (a..h). Only the file is hashed.
const EP_KEYS: usize = 8;

// ---------------------------------------------------------------------------
// ZobristKeys
// ---------------------------------------------------------------------------

/// Pre-computed Zobrist random keys (generated once via `OnceLock`).
pub struct ZobristKeys {
    /// piece\[color\]\[piece_type\]\[square\]
    piece: [[[u64; 64]; PieceType::COUNT]; 2],
    /// XOR this when it is Black's turn to move.
    side_to_move: u64,
    castling: [u64; CASTLING_KEYS],
    en_passant: [u64; EP_KEYS],
}

static ZOBRIST: OnceLock<ZobristKeys> = OnceLock::new();

/// The global Zobrist keys.
pub fn keys() -> &'static ZobristKeys {
    ZOBRIST.get_or_init(ZobristKeys::init)
}

impl ZobristKeys {
    /// Fixed seed, so hashes are reproducible across runs.
    fn init() -> Self {
        let mut rng = Xorshift64::new(0x3243_F6A8_885A_308D);

        let mut piece = [[[0u64; 64]; PieceType::COUNT]; 2];
        for color in &mut piece {
            for pt in color {
                for sq in pt {
                    *sq = rng.next_u64();
                }
            }
        }

        let side_to_move = rng.next_u64();
        let castling = std::array::from_fn(|_| rng.next_u64());
        let en_passant = std::array::from_fn(|_| rng.next_u64());

        ZobristKeys {
            piece,
            side_to_move,
            castling,
            en_passant,
        }
    }

    #[inline]
    pub fn piece_key(&self, color: Color, piece: PieceType, sq: Square) -> u64 {
        self.piece[color.index()][piece.index()][sq.index()]
    }

    #[inline]
    pub fn side_key(&self) -> u64 {
        self.side_to_move
    }

    /// Key for a castling right held by the rook on `rook`.  Squares off
    /// the back ranks have no key.
    #[inline]
    pub fn castling_key(&self, rook: Square) -> u64 {
        match rook.rank() {
            0 => self.castling[rook.file() as usize],
            7 => self.castling[8 + rook.file() as usize],
            _ => 0,
        }
    }

    #[inline]
    pub fn ep_key(&self, file: u8) -> u64 {
        self.en_passant[file as usize]
    }
}

impl GameState {
    /// 64-bit Zobrist hash of the position.
    ///
    /// Covers placement, side to move, usable castling rights and the en
    /// passant file when an en passant capture is legal; clocks and
    /// history are ignored.
    pub fn zobrist_hash(&self) -> u64 {
        let keys = keys();
        let mut hash = 0u64;

        for color in Color::ALL {
            for piece in PieceType::ALL {
                for sq in self.pieces_mask(piece, color).iter() {
                    hash ^= keys.piece_key(color, piece, sq);
                }
            }
        }

        if self.turn == Color::Black {
            hash ^= keys.side_key();
        }

        for rook in (self.clean_castling_rights() & Bitboard::BACKRANKS).iter() {
            hash ^= keys.castling_key(rook);
        }

        if let Some(ep) = self.ep_square.filter(|_| self.has_legal_en_passant()) {
            hash ^= keys.ep_key(ep.file());
        }

        hash
    }
}

// ---------------------------------------------------------------------------
// Deterministic PRNG (xorshift64)
// ---------------------------------------------------------------------------

/// Minimal xorshift64 PRNG: deterministic, fast, good enough for keys and
/// magic candidates.
pub(crate) struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    pub(crate) fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift.
        Xorshift64 {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
