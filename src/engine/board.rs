//! Piece placement without game state.
//!
//! `Board` stores six piece-type bitboards shared by both colours, one
//! occupancy bitboard per colour, the combined occupancy and a mask of
//! squares holding promoted pieces.  It answers placement, attack and pin
//! queries and owns the board part of FEN.  Turn, castling rights and move
//! history live one level up in [`GameState`](crate::engine::game::GameState).

use crate::engine::attacks;
use crate::engine::types::{Bitboard, ChessError, Color, Piece, PieceType, Square};
use std::fmt;

/// Board part of the standard starting FEN.
pub const STARTING_BOARD_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Piece placement in bitboard form.
///
/// Invariants: `all_occupied` is the union of the two colour masks, the
/// colour masks are disjoint, every occupied square has exactly one piece
/// type bit and `promoted` is a subset of `all_occupied`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Board {
    /// Piece bitboards indexed by `PieceType::index()`, both colours together.
    pub(crate) pieces: [Bitboard; PieceType::COUNT],

    /// Per-colour occupancy.
    pub(crate) occupied: [Bitboard; 2],

    /// Total occupancy (union of both colours).
    pub(crate) all_occupied: Bitboard,

    /// Squares holding a piece that reached its type by promotion.
    pub(crate) promoted: Bitboard,
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

impl Board {
    /// Create an empty board with no pieces.
    pub fn empty() -> Self {
        Board {
            pieces: [Bitboard::EMPTY; PieceType::COUNT],
            occupied: [Bitboard::EMPTY; 2],
            all_occupied: Bitboard::EMPTY,
            promoted: Bitboard::EMPTY,
        }
    }

    /// Standard starting placement.
    pub fn starting() -> Self {
        Board {
            pieces: [
                Bitboard(0x00ff_0000_0000_ff00),
                Bitboard(0x4200_0000_0000_0042),
                Bitboard(0x2400_0000_0000_0024),
                Bitboard(0x8100_0000_0000_0081),
                Bitboard(0x0800_0000_0000_0008),
                Bitboard(0x1000_0000_0000_0010),
            ],
            occupied: [Bitboard(0xffff), Bitboard(0xffff_0000_0000_0000)],
            all_occupied: Bitboard(0xffff_0000_0000_ffff),
            promoted: Bitboard::EMPTY,
        }
    }

    /// Parse the board part of a FEN.
    pub fn from_board_fen(fen: &str) -> Result<Self, ChessError> {
        let mut board = Board::empty();
        board.set_board_fen(fen)?;
        Ok(board)
    }

    /// Restore the starting placement.
    pub fn reset_board(&mut self) {
        *self = Board::starting();
    }

    /// Remove every piece.
    pub fn clear_board(&mut self) {
        *self = Board::empty();
    }

    // -----------------------------------------------------------------------
    // Bitboard accessors
    // -----------------------------------------------------------------------

    /// All pieces of one type, both colours.
    #[inline]
    pub fn pieces(&self, piece_type: PieceType) -> Bitboard {
        self.pieces[piece_type.index()]
    }

    /// All pieces of one type and colour.
    #[inline]
    pub fn pieces_mask(&self, piece_type: PieceType, color: Color) -> Bitboard {
        self.pieces[piece_type.index()] & self.occupied[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.all_occupied
    }

    #[inline]
    pub fn occupied_co(&self, color: Color) -> Bitboard {
        self.occupied[color.index()]
    }

    #[inline]
    pub fn promoted(&self) -> Bitboard {
        self.promoted
    }

    #[inline]
    pub(crate) fn rooks_and_queens(&self) -> Bitboard {
        self.pieces(PieceType::Rook) | self.pieces(PieceType::Queen)
    }

    #[inline]
    pub(crate) fn bishops_and_queens(&self) -> Bitboard {
        self.pieces(PieceType::Bishop) | self.pieces(PieceType::Queen)
    }

    // -----------------------------------------------------------------------
    // Square queries
    // -----------------------------------------------------------------------

    /// Piece type on `sq`, if any.
    ///
    /// Every type bitboard is tested explicitly, so a desynchronised square
    /// (occupied, no type bit) reads as empty rather than as a king.  Use
    /// [`Board::checked_piece_type_at`] to surface that case as an error.
    pub fn piece_type_at(&self, sq: Square) -> Option<PieceType> {
        if !self.all_occupied.is_set(sq) {
            return None;
        }
        PieceType::ALL
            .into_iter()
            .find(|pt| self.pieces[pt.index()].is_set(sq))
    }

    /// Like [`Board::piece_type_at`], but reports an occupied square without
    /// any piece type as [`ChessError::PieceTypeMismatch`].
    pub fn checked_piece_type_at(&self, sq: Square) -> Result<Option<PieceType>, ChessError> {
        if !self.all_occupied.is_set(sq) {
            return Ok(None);
        }
        self.piece_type_at(sq)
            .map(Some)
            .ok_or(ChessError::PieceTypeMismatch(sq))
    }

    /// Colour of the piece on `sq`, if any.
    pub fn color_at(&self, sq: Square) -> Option<Color> {
        if self.occupied[Color::White.index()].is_set(sq) {
            Some(Color::White)
        } else if self.occupied[Color::Black.index()].is_set(sq) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Piece on `sq`, if any.
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        let piece_type = self.piece_type_at(sq)?;
        let color = self.color_at(sq)?;
        Some(Piece::new(piece_type, color))
    }

    /// The king of `color`, ignoring promoted kings. `None` if there is no
    /// such king; with several, the highest square wins.
    pub fn king(&self, color: Color) -> Option<Square> {
        (self.pieces_mask(PieceType::King, color) & !self.promoted).msb()
    }

    // -----------------------------------------------------------------------
    // Attack queries
    // -----------------------------------------------------------------------

    /// Squares attacked by the piece on `sq`. Empty if `sq` is empty.
    pub fn attacks_mask(&self, sq: Square) -> Bitboard {
        let t = attacks::tables();
        match self.piece_at(sq) {
            None => Bitboard::EMPTY,
            Some(Piece {
                piece_type: PieceType::Pawn,
                color,
            }) => t.pawn_attacks(color, sq),
            Some(Piece {
                piece_type: PieceType::Knight,
                ..
            }) => t.knight_attacks(sq),
            Some(Piece {
                piece_type: PieceType::King,
                ..
            }) => t.king_attacks(sq),
            Some(Piece { piece_type, .. }) => {
                let mut attacks = Bitboard::EMPTY;
                if matches!(piece_type, PieceType::Bishop | PieceType::Queen) {
                    attacks |= t.diag_attacks(sq, self.all_occupied);
                }
                if matches!(piece_type, PieceType::Rook | PieceType::Queen) {
                    attacks |= t.rank_attacks(sq, self.all_occupied)
                        | t.file_attacks(sq, self.all_occupied);
                }
                attacks
            }
        }
    }

    /// Pieces of `color` attacking `sq` under a given occupancy.
    ///
    /// Passing an occupancy other than the real one lets castling checks
    /// probe squares with king and rook already moved.
    pub fn attackers_with_occupancy(
        &self,
        color: Color,
        sq: Square,
        occupied: Bitboard,
    ) -> Bitboard {
        let t = attacks::tables();
        let rooks_queens = self.rooks_and_queens();
        let bishops_queens = self.bishops_and_queens();

        let attackers = (t.king_attacks(sq) & self.pieces(PieceType::King))
            | (t.knight_attacks(sq) & self.pieces(PieceType::Knight))
            | (t.rank_attacks(sq, occupied) & rooks_queens)
            | (t.file_attacks(sq, occupied) & rooks_queens)
            | (t.diag_attacks(sq, occupied) & bishops_queens)
            | (t.pawn_attacks(!color, sq) & self.pieces(PieceType::Pawn));

        attackers & self.occupied[color.index()]
    }

    /// Pieces of `color` attacking `sq`.
    #[inline]
    pub fn attackers_mask(&self, color: Color, sq: Square) -> Bitboard {
        self.attackers_with_occupancy(color, sq, self.all_occupied)
    }

    /// Is `sq` attacked by any piece of colour `color`?
    #[inline]
    pub fn is_attacked_by(&self, color: Color, sq: Square) -> bool {
        self.attackers_mask(color, sq).is_not_empty()
    }

    /// The line a piece of `color` on `sq` is pinned to, or [`Bitboard::ALL`]
    /// if it is not pinned (or `color` has no king).
    ///
    /// Intersecting move targets with the result constrains a pinned piece
    /// to its pin line and leaves unpinned pieces alone.
    pub fn pin_mask(&self, color: Color, sq: Square) -> Bitboard {
        let Some(king) = self.king(color) else {
            return Bitboard::ALL;
        };
        let t = attacks::tables();
        let square_mask = Bitboard::from_square(sq);
        let rooks_queens = self.rooks_and_queens();
        let families = [
            (t.file_attacks(king, Bitboard::EMPTY), rooks_queens),
            (t.rank_attacks(king, Bitboard::EMPTY), rooks_queens),
            (t.diag_attacks(king, Bitboard::EMPTY), self.bishops_and_queens()),
        ];

        for (rays, sliders) in families {
            if (rays & square_mask).is_empty() {
                continue;
            }
            let snipers = rays & sliders & self.occupied[(!color).index()];
            for sniper in snipers.iter_rev() {
                if t.between(sniper, king) & (self.all_occupied | square_mask) == square_mask {
                    return t.ray(king, sniper);
                }
            }
            break;
        }

        Bitboard::ALL
    }

    /// Is the piece of `color` on `sq` absolutely pinned?
    #[inline]
    pub fn is_pinned(&self, color: Color, sq: Square) -> bool {
        self.pin_mask(color, sq) != Bitboard::ALL
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Put `piece` on `sq`, replacing whatever stood there.
    pub fn set_piece_at(&mut self, sq: Square, piece: Piece, promoted: bool) {
        self.remove_piece_at(sq);
        let mask = Bitboard::from_square(sq);
        self.pieces[piece.piece_type.index()] |= mask;
        self.occupied[piece.color.index()] |= mask;
        self.all_occupied ^= mask;
        if promoted {
            self.promoted |= mask;
        }
    }

    /// Clear `sq`, returning the piece that stood there.
    pub fn remove_piece_at(&mut self, sq: Square) -> Option<Piece> {
        let piece = self.piece_at(sq);
        let keep = !Bitboard::from_square(sq);
        for bb in &mut self.pieces {
            *bb &= keep;
        }
        for bb in &mut self.occupied {
            *bb &= keep;
        }
        self.all_occupied &= keep;
        self.promoted &= keep;
        piece
    }

    // -----------------------------------------------------------------------
    // Occupancy sanity check (debug builds)
    // -----------------------------------------------------------------------

    /// Verify that the redundant bitboards agree with each other.
    /// Available in debug builds and test builds.
    #[cfg(any(debug_assertions, test))]
    pub fn assert_consistent(&self) {
        let mut typed = Bitboard::EMPTY;
        for pt in PieceType::ALL {
            let bb = self.pieces[pt.index()];
            assert!((typed & bb).is_empty(), "{pt} bitboard overlaps another type");
            typed |= bb;
        }
        assert!(
            (self.occupied[0] & self.occupied[1]).is_empty(),
            "colour masks overlap",
        );
        assert_eq!(
            self.all_occupied,
            self.occupied[0] | self.occupied[1],
            "all_occupied mismatch",
        );
        assert_eq!(typed, self.all_occupied, "type bitboards disagree with occupancy");
        assert!(
            (self.promoted & !self.all_occupied).is_empty(),
            "promoted flag on empty square",
        );
    }

    // -----------------------------------------------------------------------
    // Board FEN
    // -----------------------------------------------------------------------

    /// Board part of a FEN, rank 8 first.  With `promoted`, pieces that
    /// reached their type by promotion are followed by `~`.
    pub fn board_fen(&self, promoted: bool) -> String {
        let mut fen = String::with_capacity(72);
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                let sq = Square::from_file_rank(file, rank);
                match self.piece_at(sq) {
                    None => empty += 1,
                    Some(piece) => {
                        if empty > 0 {
                            fen.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        fen.push(piece.symbol());
                        if promoted && self.promoted.is_set(sq) {
                            fen.push('~');
                        }
                    }
                }
            }
            if empty > 0 {
                fen.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                fen.push('/');
            }
        }
        fen
    }

    /// Replace the placement with the one described by a board FEN.
    /// On error the board is left unchanged.
    pub fn set_board_fen(&mut self, fen: &str) -> Result<(), ChessError> {
        let trimmed = fen.trim();
        if trimmed.contains(char::is_whitespace) {
            return Err(ChessError::fen(
                fen,
                "expected position part of fen, got multiple parts",
            ));
        }

        let rows: Vec<&str> = trimmed.split('/').collect();
        if rows.len() != 8 {
            return Err(ChessError::fen(
                fen,
                format!("expected 8 rows in position part of fen, got {}", rows.len()),
            ));
        }

        let mut board = Board::empty();
        for (row_idx, row) in rows.iter().enumerate() {
            let rank = 7 - row_idx as u8;
            let mut file = 0u32;
            let mut previous_was_digit = false;
            let mut previous_was_piece = false;

            for ch in row.chars() {
                if let Some(digit @ 1..=8) = ch.to_digit(10) {
                    if previous_was_digit {
                        return Err(ChessError::fen(
                            fen,
                            "two subsequent digits in position part of fen",
                        ));
                    }
                    file += digit;
                    previous_was_digit = true;
                    previous_was_piece = false;
                } else if ch == '~' {
                    if !previous_was_piece {
                        return Err(ChessError::fen(fen, "'~' not after piece in position part of fen"));
                    }
                    if let Some(last) = file.checked_sub(1).filter(|&f| f < 8) {
                        board.promoted.set(Square::from_file_rank(last as u8, rank));
                    }
                    previous_was_digit = false;
                    previous_was_piece = false;
                } else if let Ok(piece) = Piece::from_symbol(ch) {
                    if file < 8 {
                        board.set_piece_at(Square::from_file_rank(file as u8, rank), piece, false);
                    }
                    file += 1;
                    previous_was_digit = false;
                    previous_was_piece = true;
                } else {
                    return Err(ChessError::fen(
                        fen,
                        format!("invalid character {ch:?} in position part of fen"),
                    ));
                }
            }

            if file != 8 {
                return Err(ChessError::fen(
                    fen,
                    format!("expected 8 columns per row in position part of fen, row {} has {file}", row_idx + 1),
                ));
            }
        }

        *self = board;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Board display (8×8 text grid)
    // -----------------------------------------------------------------------

    /// Render the board as an 8-line string (rank 8 at top), useful for debugging.
    pub fn board_string(&self) -> String {
        let mut s = String::with_capacity(200);
        for rank in (0..8).rev() {
            s.push((b'1' + rank) as char);
            s.push(' ');
            for file in 0..8 {
                let sq = Square::from_file_rank(file, rank);
                s.push(self.piece_at(sq).map_or('.', Piece::symbol));
                if file < 7 {
                    s.push(' ');
                }
            }
            s.push('\n');
        }
        s.push_str("  a b c d e f g h");
        s
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::starting()
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.board_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
