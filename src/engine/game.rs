//! Game state on top of [`Board`].
//!
//! `GameState` adds side to move, castling rights, the en passant square,
//! both clocks and a move stack with one snapshot per applied move, so
//! `pop` restores the previous position exactly.  Repetition and draw
//! detection replay that stack.  Move generation lives in
//! [`movegen`](crate::engine::movegen), notation in the `fen`, `epd` and
//! `san` modules.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::attacks;
use crate::engine::board::Board;
use crate::engine::types::{Bitboard, ChessError, Color, Move, Piece, PieceType, Square};

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// =========================================================================
// Snapshot / TranspositionKey
// =========================================================================

/// Everything `pop` needs to restore the position before a move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Snapshot {
    board: Board,
    turn: Color,
    castling_rights: Bitboard,
    ep_square: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

/// Identity of a position for repetition purposes: placement, side to
/// move, cleaned castling rights and the en passant square if (and only
/// if) an en passant capture is legal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TranspositionKey {
    pieces: [Bitboard; PieceType::COUNT],
    occupied: [Bitboard; 2],
    turn: Color,
    castling_rights: Bitboard,
    ep_square: Option<Square>,
}

// =========================================================================
// Outcome
// =========================================================================

/// Why a game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    SeventyfiveMoves,
    FivefoldRepetition,
    FiftyMoves,
    ThreefoldRepetition,
}

/// End of a game: how it ended and who won (`None` for a draw).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    pub termination: Termination,
    pub winner: Option<Color>,
}

impl Outcome {
    /// `1-0`, `0-1` or `1/2-1/2`.
    pub fn result(&self) -> &'static str {
        match self.winner {
            Some(Color::White) => "1-0",
            Some(Color::Black) => "0-1",
            None => "1/2-1/2",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.result(), self.termination)
    }
}

// =========================================================================
// Status
// =========================================================================

/// A reason a position is not a valid chess position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Empty,
    NoWhiteKing,
    NoBlackKing,
    TooManyKings,
    PawnsOnBackrank,
    BadCastlingRights,
    InvalidEpSquare,
    /// The side not to move is in check.
    OppositeCheck,
    TooManyCheckers,
    /// The checkers could not have been produced by any last move.
    ImpossibleCheck,
}

// =========================================================================
// GameState
// =========================================================================

/// A position plus the move history that led to it.
#[derive(Clone, Debug)]
pub struct GameState {
    pub(crate) board: Board,

    /// Side to move.
    pub turn: Color,

    /// Rook squares whose castling right is still available.  Read it
    /// through [`GameState::clean_castling_rights`] when the raw value may
    /// have been set externally.
    pub castling_rights: Bitboard,

    /// Square a pawn skipped over on the last move, if any.
    pub ep_square: Option<Square>,

    /// Halfmoves since the last capture or pawn move.
    pub halfmove_clock: u32,

    /// Starts at 1, incremented after each Black move.
    pub fullmove_number: u32,

    /// Castling moves are encoded king-to-rook and X-FEN/Shredder-FEN
    /// castling letters are preferred.
    pub chess960: bool,

    pub(crate) move_stack: Vec<Move>,
    pub(crate) stack: Vec<Snapshot>,
}

impl GameState {
    // -----------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------

    /// The standard starting position.
    pub fn new() -> Self {
        GameState {
            board: Board::starting(),
            turn: Color::White,
            castling_rights: Bitboard::CORNERS,
            ep_square: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            chess960: false,
            move_stack: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// An empty board, White to move, no castling rights.
    pub fn empty() -> Self {
        GameState {
            board: Board::empty(),
            castling_rights: Bitboard::EMPTY,
            ..GameState::new()
        }
    }

    /// Chess960 starting position by Scharnagl number (0..960).
    /// Number 518 is the standard starting position.
    pub fn from_chess960_pos(scharnagl: u32) -> Result<Self, ChessError> {
        if scharnagl >= 960 {
            return Err(ChessError::InvalidChess960Position(scharnagl));
        }

        let n = scharnagl as usize;
        let (n, bw) = (n / 4, n % 4);
        let (n, bb) = (n / 4, n % 4);
        let (n, q) = (n / 6, n % 6);

        // Knight placement among the five remaining files.
        let (mut n1, mut n2) = (0..4i32)
            .map(|n1| (n1, n as i32 + (3 - n1) * (4 - n1) / 2 - 5))
            .find(|&(n1, n2)| n1 < n2 && (1..=4).contains(&n2))
            .unwrap_or((0, 1));

        let bw_file = bw * 2 + 1;
        let bb_file = bb * 2;
        let mut q_file = q;
        q_file += usize::from(bw_file.min(bb_file) <= q_file);
        q_file += usize::from(bw_file.max(bb_file) <= q_file);

        let mut back_rank = [None; 8];
        back_rank[bw_file] = Some(PieceType::Bishop);
        back_rank[bb_file] = Some(PieceType::Bishop);
        back_rank[q_file] = Some(PieceType::Queen);

        for slot in back_rank.iter_mut().filter(|slot| slot.is_none()) {
            if n1 == 0 || n2 == 0 {
                *slot = Some(PieceType::Knight);
            }
            n1 -= 1;
            n2 -= 1;
        }

        // The remaining three files take rook, king, rook in that order.
        let rkr = [PieceType::Rook, PieceType::King, PieceType::Rook];
        for (slot, piece_type) in back_rank.iter_mut().filter(|slot| slot.is_none()).zip(rkr) {
            *slot = Some(piece_type);
        }

        let mut board = Board::empty();
        for (file, piece_type) in back_rank.into_iter().enumerate() {
            let Some(piece_type) = piece_type else {
                continue;
            };
            let file = file as u8;
            board.set_piece_at(Square::from_file_rank(file, 0), Piece::new(piece_type, Color::White), false);
            board.set_piece_at(Square::from_file_rank(file, 7), Piece::new(piece_type, Color::Black), false);
            board.set_piece_at(Square::from_file_rank(file, 1), Piece::new(PieceType::Pawn, Color::White), false);
            board.set_piece_at(Square::from_file_rank(file, 6), Piece::new(PieceType::Pawn, Color::Black), false);
        }

        Ok(GameState {
            castling_rights: board.pieces(PieceType::Rook),
            board,
            chess960: true,
            ..GameState::new()
        })
    }

    /// A uniformly random Chess960 starting position.
    pub fn random_chess960<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let scharnagl = rng.gen_range(0..960);
        // In range by construction.
        Self::from_chess960_pos(scharnagl).unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // Placement proxies
    // -----------------------------------------------------------------

    /// The underlying piece placement.
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.board.piece_at(sq)
    }

    #[inline]
    pub fn piece_type_at(&self, sq: Square) -> Option<PieceType> {
        self.board.piece_type_at(sq)
    }

    #[inline]
    pub fn color_at(&self, sq: Square) -> Option<Color> {
        self.board.color_at(sq)
    }

    #[inline]
    pub fn king(&self, color: Color) -> Option<Square> {
        self.board.king(color)
    }

    #[inline]
    pub fn pieces_mask(&self, piece_type: PieceType, color: Color) -> Bitboard {
        self.board.pieces_mask(piece_type, color)
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.board.occupied()
    }

    #[inline]
    pub fn occupied_co(&self, color: Color) -> Bitboard {
        self.board.occupied_co(color)
    }

    #[inline]
    pub fn attackers_mask(&self, color: Color, sq: Square) -> Bitboard {
        self.board.attackers_mask(color, sq)
    }

    #[inline]
    pub fn is_attacked_by(&self, color: Color, sq: Square) -> bool {
        self.board.is_attacked_by(color, sq)
    }

    #[inline]
    pub fn pin_mask(&self, color: Color, sq: Square) -> Bitboard {
        self.board.pin_mask(color, sq)
    }

    #[inline]
    pub fn is_pinned(&self, color: Color, sq: Square) -> bool {
        self.board.is_pinned(color, sq)
    }

    // -----------------------------------------------------------------
    // Direct mutation (clears the move stack)
    // -----------------------------------------------------------------

    /// Put `piece` on `sq`.  Clears the move stack.
    pub fn set_piece_at(&mut self, sq: Square, piece: Piece, promoted: bool) {
        self.board.set_piece_at(sq, piece, promoted);
        self.clear_stack();
    }

    /// Clear `sq`, returning what stood there.  Clears the move stack.
    pub fn remove_piece_at(&mut self, sq: Square) -> Option<Piece> {
        let piece = self.board.remove_piece_at(sq);
        self.clear_stack();
        piece
    }

    /// Remove every piece, keeping turn and clocks.  Clears the move stack.
    pub fn clear_board(&mut self) {
        self.board.clear_board();
        self.clear_stack();
    }

    /// Empty board, White to move, no castling or en passant, clocks reset.
    pub fn clear(&mut self) {
        let chess960 = self.chess960;
        *self = GameState {
            chess960,
            ..GameState::empty()
        };
    }

    /// Back to the standard starting position.
    pub fn reset(&mut self) {
        let chess960 = self.chess960;
        *self = GameState {
            chess960,
            ..GameState::new()
        };
    }

    /// Forget the move history without changing the position.
    pub fn clear_stack(&mut self) {
        if !self.move_stack.is_empty() {
            debug!(moves = self.move_stack.len(), "move stack cleared");
        }
        self.move_stack.clear();
        self.stack.clear();
    }

    // -----------------------------------------------------------------
    // History
    // -----------------------------------------------------------------

    /// Moves applied since the stack was last cleared, oldest first.
    pub fn move_stack(&self) -> &[Move] {
        &self.move_stack
    }

    /// The last move applied.
    pub fn peek(&self) -> Result<Move, ChessError> {
        self.move_stack.last().copied().ok_or(ChessError::EmptyHistory)
    }

    /// Number of halfmoves since the start of the game, derived from the
    /// fullmove number and side to move.
    pub fn ply(&self) -> u32 {
        self.fullmove_number
            .saturating_sub(1)
            .saturating_mul(2)
            .saturating_add(u32::from(self.turn == Color::Black))
    }

    /// The position before the first move on the stack, without history.
    pub fn root(&self) -> Self {
        let mut root = self.copy_with_stack(0);
        if let Some(first) = self.stack.first() {
            root.restore(first.clone());
        }
        root
    }

    /// Clone keeping only the last `moves` entries of the move stack.
    pub fn copy_with_stack(&self, moves: usize) -> Self {
        let keep = moves.min(self.move_stack.len());
        GameState {
            board: self.board.clone(),
            turn: self.turn,
            castling_rights: self.castling_rights,
            ep_square: self.ep_square,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
            chess960: self.chess960,
            move_stack: self.move_stack[self.move_stack.len() - keep..].to_vec(),
            stack: self.stack[self.stack.len() - keep..].to_vec(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            board: self.board.clone(),
            turn: self.turn,
            castling_rights: self.castling_rights,
            ep_square: self.ep_square,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.board = snapshot.board;
        self.turn = snapshot.turn;
        self.castling_rights = snapshot.castling_rights;
        self.ep_square = snapshot.ep_square;
        self.halfmove_clock = snapshot.halfmove_clock;
        self.fullmove_number = snapshot.fullmove_number;
    }

    // -----------------------------------------------------------------
    // Push / pop
    // -----------------------------------------------------------------

    /// Apply a move.
    ///
    /// The move must be pseudo-legal or null; this is not checked.  Use
    /// [`GameState::is_legal`] or one of the parsing helpers first.
    pub fn push(&mut self, mv: Move) {
        let mv = self.to_chess960(mv);
        let snapshot = self.snapshot();
        let zeroing = self.is_zeroing(mv);
        self.castling_rights = self.clean_castling_rights();
        let recorded = self.from_chess960(self.chess960, mv);
        self.move_stack.push(recorded);
        self.stack.push(snapshot);

        let ep_square = self.ep_square.take();

        self.halfmove_clock = if zeroing { 0 } else { self.halfmove_clock.saturating_add(1) };
        if self.turn == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }

        if mv.is_null() {
            self.turn = !self.turn;
            return;
        }

        if let Some(drop) = mv.drop {
            self.board.set_piece_at(mv.to, Piece::new(drop, self.turn), false);
            self.turn = !self.turn;
            return;
        }

        let from_bb = Bitboard::from_square(mv.from);
        let to_bb = Bitboard::from_square(mv.to);

        let mut promoted = (self.board.promoted & from_bb).is_not_empty();
        let Some(moving) = self.board.remove_piece_at(mv.from) else {
            self.turn = !self.turn;
            return;
        };
        let mut piece_type = moving.piece_type;
        let captured = self.board.piece_type_at(mv.to);

        // Castling rights.
        self.castling_rights &= !to_bb & !from_bb;
        if piece_type == PieceType::King && !promoted {
            self.castling_rights &= !Bitboard::rank(self.turn.back_rank());
        } else if captured == Some(PieceType::King) && (self.board.promoted & to_bb).is_empty() {
            let their_back_rank = (!self.turn).back_rank();
            if mv.to.rank() == their_back_rank {
                self.castling_rights &= !Bitboard::rank(their_back_rank);
            }
        }

        // Double pushes and en passant captures.
        if piece_type == PieceType::Pawn {
            let diff = mv.to.0 as i16 - mv.from.0 as i16;
            if diff == 16 && mv.from.rank() == 1 {
                self.ep_square = Some(Square(mv.from.0 + 8));
            } else if diff == -16 && mv.from.rank() == 6 {
                self.ep_square = Some(Square(mv.from.0 - 8));
            } else if Some(mv.to) == ep_square && matches!(diff.abs(), 7 | 9) && captured.is_none() {
                let behind = match self.turn {
                    Color::White => mv.to.0.checked_sub(8),
                    Color::Black => Some(mv.to.0 + 8).filter(|&sq| sq < 64),
                };
                if let Some(behind) = behind {
                    self.board.remove_piece_at(Square(behind));
                }
            }
        }

        if let Some(promotion) = mv.promotion {
            promoted = true;
            piece_type = promotion;
        }

        // Castling is encoded as the king capturing its own rook.
        let castling = piece_type == PieceType::King && (self.board.occupied_co(self.turn) & to_bb).is_not_empty();
        if castling {
            let rank = self.turn.back_rank();
            let (king_file, rook_file) = if mv.to.file() < mv.from.file() { (2, 3) } else { (6, 5) };
            self.board.remove_piece_at(mv.to);
            self.board
                .set_piece_at(Square::from_file_rank(king_file, rank), Piece::new(PieceType::King, self.turn), false);
            self.board
                .set_piece_at(Square::from_file_rank(rook_file, rank), Piece::new(PieceType::Rook, self.turn), false);
        } else {
            self.board.set_piece_at(mv.to, Piece::new(piece_type, self.turn), promoted);
        }

        self.turn = !self.turn;
    }

    /// Undo the last move and return it.
    pub fn pop(&mut self) -> Result<Move, ChessError> {
        let mv = self.move_stack.pop().ok_or(ChessError::EmptyHistory)?;
        let snapshot = self.stack.pop().ok_or(ChessError::EmptyHistory)?;
        self.restore(snapshot);
        Ok(mv)
    }

    // -----------------------------------------------------------------
    // Chess960 encoding
    // -----------------------------------------------------------------

    /// Map king-to-rook castling back to king-to-destination unless
    /// `chess960` is set.
    pub(crate) fn from_chess960(&self, chess960: bool, mv: Move) -> Move {
        if chess960 || mv.promotion.is_some() || mv.drop.is_some() {
            return mv;
        }
        let kings = self.board.pieces(PieceType::King);
        for (king, rook_h, rook_a, to_h, to_a) in [
            (Square::E1, Square::H1, Square::A1, Square::G1, Square::C1),
            (Square::E8, Square::H8, Square::A8, Square::G8, Square::C8),
        ] {
            if mv.from == king && kings.is_set(king) {
                if mv.to == rook_h {
                    return Move::new(king, to_h);
                } else if mv.to == rook_a {
                    return Move::new(king, to_a);
                }
            }
        }
        mv
    }

    /// Map standard king-to-destination castling to the internal
    /// king-to-rook encoding.
    pub(crate) fn to_chess960(&self, mv: Move) -> Move {
        let kings = self.board.pieces(PieceType::King);
        let rooks = self.board.pieces(PieceType::Rook);
        for (king, to_g, to_c, rook_h, rook_a) in [
            (Square::E1, Square::G1, Square::C1, Square::H1, Square::A1),
            (Square::E8, Square::G8, Square::C8, Square::H8, Square::A8),
        ] {
            if mv.from == king && kings.is_set(king) {
                if mv.to == to_g && !rooks.is_set(to_g) {
                    return Move::new(king, rook_h);
                } else if mv.to == to_c && !rooks.is_set(to_c) {
                    return Move::new(king, rook_a);
                }
                return mv;
            }
        }
        mv
    }

    // -----------------------------------------------------------------
    // UCI in context
    // -----------------------------------------------------------------

    /// UCI text for `mv`, castling rendered the way this game encodes it.
    pub fn uci(&self, mv: Move) -> String {
        self.from_chess960(self.chess960, self.to_chess960(mv)).uci()
    }

    /// Parse UCI text into a legal move.  `0000` yields the null move.
    pub fn parse_uci(&self, uci: &str) -> Result<Move, ChessError> {
        let mv = Move::from_uci(uci)?;
        if mv.is_null() {
            return Ok(mv);
        }
        let mv = self.from_chess960(self.chess960, self.to_chess960(mv));
        if !self.is_legal(mv) {
            return Err(self.illegal(uci));
        }
        Ok(mv)
    }

    /// Parse UCI text and push the resulting move.
    pub fn push_uci(&mut self, uci: &str) -> Result<Move, ChessError> {
        let mv = self.parse_uci(uci)?;
        self.push(mv);
        Ok(mv)
    }

    pub(crate) fn illegal(&self, mv: &str) -> ChessError {
        ChessError::IllegalMove {
            mv: mv.to_string(),
            fen: self.fen(),
        }
    }

    // -----------------------------------------------------------------
    // Castling rights
    // -----------------------------------------------------------------

    /// Castling rights with every right removed that could not be used
    /// from this placement.
    ///
    /// While moves are on the stack the stored rights are returned as is,
    /// since `push` only ever removes rights.
    pub fn clean_castling_rights(&self) -> Bitboard {
        if !self.stack.is_empty() {
            return self.castling_rights;
        }
        self.cleaned_rights(self.chess960)
    }

    fn cleaned_rights(&self, chess960: bool) -> Bitboard {
        let castling = self.castling_rights & self.board.pieces(PieceType::Rook);
        Color::ALL
            .into_iter()
            .map(|color| {
                let back_rank = Bitboard::rank(color.back_rank());
                let ours = castling & back_rank & self.board.occupied_co(color);
                let king_mask =
                    self.board.pieces_mask(PieceType::King, color) & back_rank & !self.board.promoted;

                if !chess960 {
                    let corners = ours & Bitboard::CORNERS;
                    let king_home = if color == Color::White { Square::E1 } else { Square::E8 };
                    return if king_mask.is_set(king_home) { corners } else { Bitboard::EMPTY };
                }

                let (Some(king), Some(a_side), Some(h_side)) = (king_mask.msb(), ours.lsb(), ours.msb()) else {
                    return Bitboard::EMPTY;
                };
                let mut rights = Bitboard::EMPTY;
                if a_side < king {
                    rights.set(a_side);
                }
                if h_side > king {
                    rights.set(h_side);
                }
                rights
            })
            .fold(Bitboard::EMPTY, |acc, rights| acc | rights)
    }

    pub fn has_castling_rights(&self, color: Color) -> bool {
        (self.clean_castling_rights() & Bitboard::rank(color.back_rank())).is_not_empty()
    }

    pub fn has_kingside_castling_rights(&self, color: Color) -> bool {
        self.castling_rook_sides(color).1
    }

    pub fn has_queenside_castling_rights(&self, color: Color) -> bool {
        self.castling_rook_sides(color).0
    }

    /// (queenside, kingside) availability relative to the unpromoted king.
    fn castling_rook_sides(&self, color: Color) -> (bool, bool) {
        let back_rank = Bitboard::rank(color.back_rank());
        let king_mask = self.board.pieces_mask(PieceType::King, color) & back_rank & !self.board.promoted;
        let Some(king) = king_mask.lsb() else {
            return (false, false);
        };
        let rights = self.clean_castling_rights() & back_rank;
        let queenside = rights.iter().any(|rook| rook < king);
        let kingside = rights.iter().any(|rook| rook > king);
        (queenside, kingside)
    }

    /// Do the castling rights need Chess960 notation (a rook off the
    /// corners or a king off the e-file)?
    pub fn has_chess960_castling_rights(&self) -> bool {
        let rights = if self.stack.is_empty() {
            self.cleaned_rights(true)
        } else {
            self.castling_rights
        };
        if (rights & !Bitboard::CORNERS).is_not_empty() {
            return true;
        }
        let kings = self.board.pieces(PieceType::King);
        let white_king_home = (self.board.occupied_co(Color::White) & kings).is_set(Square::E1);
        let black_king_home = (self.board.occupied_co(Color::Black) & kings).is_set(Square::E8);
        ((rights & Bitboard::RANK_1).is_not_empty() && !white_king_home)
            || ((rights & Bitboard::RANK_8).is_not_empty() && !black_king_home)
    }

    /// Does `mv` remove a castling right that is still available?
    fn reduces_castling_rights(&self, mv: Move) -> bool {
        let rights = self.clean_castling_rights();
        let touched = Bitboard::from_square(mv.from) ^ Bitboard::from_square(mv.to);
        let unpromoted_kings = self.board.pieces(PieceType::King) & !self.board.promoted;
        (touched & rights).is_not_empty()
            || ((rights & Bitboard::RANK_1).is_not_empty()
                && (touched & unpromoted_kings & self.board.occupied_co(Color::White)).is_not_empty())
            || ((rights & Bitboard::RANK_8).is_not_empty()
                && (touched & unpromoted_kings & self.board.occupied_co(Color::Black)).is_not_empty())
    }

    // -----------------------------------------------------------------
    // Move classification
    // -----------------------------------------------------------------

    pub fn is_en_passant(&self, mv: Move) -> bool {
        let diff = (mv.to.0 as i16 - mv.from.0 as i16).abs();
        self.ep_square == Some(mv.to)
            && self.board.pieces(PieceType::Pawn).is_set(mv.from)
            && matches!(diff, 7 | 9)
            && !self.board.occupied().is_set(mv.to)
    }

    pub fn is_capture(&self, mv: Move) -> bool {
        let touched = Bitboard::from_square(mv.from) ^ Bitboard::from_square(mv.to);
        (touched & self.board.occupied_co(!self.turn)).is_not_empty() || self.is_en_passant(mv)
    }

    /// Pawn moves, captures and pawn drops reset the halfmove clock.
    pub fn is_zeroing(&self, mv: Move) -> bool {
        let touched = Bitboard::from_square(mv.from) ^ Bitboard::from_square(mv.to);
        (touched & self.board.pieces(PieceType::Pawn)).is_not_empty()
            || (touched & self.board.occupied_co(!self.turn)).is_not_empty()
            || mv.drop == Some(PieceType::Pawn)
    }

    /// Can no position before `mv` ever repeat after it?
    pub fn is_irreversible(&self, mv: Move) -> bool {
        self.is_zeroing(mv) || self.reduces_castling_rights(mv) || self.has_legal_en_passant()
    }

    pub fn is_castling(&self, mv: Move) -> bool {
        if !self.board.pieces(PieceType::King).is_set(mv.from) {
            return false;
        }
        let file_diff = (mv.from.file() as i8 - mv.to.file() as i8).abs();
        file_diff > 1 || self.board.pieces_mask(PieceType::Rook, self.turn).is_set(mv.to)
    }

    pub fn is_kingside_castling(&self, mv: Move) -> bool {
        self.is_castling(mv) && mv.to.file() > mv.from.file()
    }

    pub fn is_queenside_castling(&self, mv: Move) -> bool {
        self.is_castling(mv) && mv.to.file() < mv.from.file()
    }

    // -----------------------------------------------------------------
    // Repetition keys
    // -----------------------------------------------------------------

    pub fn transposition_key(&self) -> TranspositionKey {
        TranspositionKey {
            pieces: self.board.pieces,
            occupied: self.board.occupied,
            turn: self.turn,
            castling_rights: self.clean_castling_rights(),
            ep_square: if self.has_legal_en_passant() { self.ep_square } else { None },
        }
    }

    // -----------------------------------------------------------------
    // Validity
    // -----------------------------------------------------------------

    /// Every reason this position is not a valid chess position.  Empty
    /// for valid positions; reachability from the start is not checked.
    pub fn status(&self) -> Vec<Status> {
        let mut errors = Vec::new();
        let kings = self.board.pieces(PieceType::King);

        if self.board.occupied().is_empty() {
            errors.push(Status::Empty);
        }
        if (self.board.occupied_co(Color::White) & kings).is_empty() {
            errors.push(Status::NoWhiteKing);
        }
        if (self.board.occupied_co(Color::Black) & kings).is_empty() {
            errors.push(Status::NoBlackKing);
        }
        if kings.pop_count() > 2 {
            errors.push(Status::TooManyKings);
        }
        if (self.board.pieces(PieceType::Pawn) & Bitboard::BACKRANKS).is_not_empty() {
            errors.push(Status::PawnsOnBackrank);
        }
        if self.castling_rights != self.clean_castling_rights() {
            errors.push(Status::BadCastlingRights);
        }
        let valid_ep_square = self.valid_ep_square();
        if self.ep_square != valid_ep_square {
            errors.push(Status::InvalidEpSquare);
        }
        if self.was_into_check() {
            errors.push(Status::OppositeCheck);
        }

        let checkers = self.checkers_mask();
        let our_kings = self.board.pieces_mask(PieceType::King, self.turn) & !self.board.promoted;
        if checkers.is_not_empty() {
            if checkers.pop_count() > 2 {
                errors.push(Status::TooManyCheckers);
            }
            if let Some(ep) = valid_ep_square {
                // The check must have been given by the double push itself.
                let pushed_to = Square(ep.0 ^ 8);
                let pushed_from = Square(ep.0 ^ 24);
                let occupied_before =
                    (self.board.occupied() & !Bitboard::from_square(pushed_to)) | Bitboard::from_square(pushed_from);
                let checked_before_push = checkers.msb() != Some(pushed_to)
                    && self.attacked_for_king(our_kings, occupied_before);
                if checkers.pop_count() > 1 || checked_before_push {
                    errors.push(Status::ImpossibleCheck);
                }
            } else {
                let t = attacks::tables();
                let aligned_pair = match (checkers.pop_count(), checkers.lsb(), checkers.msb()) {
                    (2, Some(a), Some(b)) => (t.ray(a, b) & our_kings).is_not_empty(),
                    _ => false,
                };
                if checkers.pop_count() > 2 || aligned_pair {
                    errors.push(Status::ImpossibleCheck);
                }
            }
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.status().is_empty()
    }

    /// The en passant square if a double push could actually have created
    /// it: right rank, pushed pawn in front of it, it and the square
    /// behind it empty.
    pub(crate) fn valid_ep_square(&self) -> Option<Square> {
        let ep = self.ep_square?;
        let ep_bb = Bitboard::from_square(ep);
        let (ep_rank, pushed_pawn, origin) = match self.turn {
            Color::White => (5, ep_bb >> 8, ep_bb << 8),
            Color::Black => (2, ep_bb << 8, ep_bb >> 8),
        };

        if ep.rank() != ep_rank {
            return None;
        }
        if (self.board.pieces_mask(PieceType::Pawn, !self.turn) & pushed_pawn).is_empty() {
            return None;
        }
        if (self.board.occupied() & (ep_bb | origin)).is_not_empty() {
            return None;
        }
        Some(ep)
    }

    // -----------------------------------------------------------------
    // Game end
    // -----------------------------------------------------------------

    pub fn is_checkmate(&self) -> bool {
        self.is_check() && self.legal_moves().is_empty()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_check() && self.legal_moves().is_empty()
    }

    /// Neither side can possibly checkmate.
    pub fn is_insufficient_material(&self) -> bool {
        Color::ALL.into_iter().all(|color| self.has_insufficient_material(color))
    }

    /// `color` cannot checkmate by any sequence of legal moves.
    pub fn has_insufficient_material(&self, color: Color) -> bool {
        let b = &self.board;
        let ours = b.occupied_co(color);
        let heavy = b.pieces(PieceType::Pawn) | b.pieces(PieceType::Rook) | b.pieces(PieceType::Queen);
        if (ours & heavy).is_not_empty() {
            return false;
        }

        // A lone knight only mates against a blocking piece that is not a
        // queen.
        if (ours & b.pieces(PieceType::Knight)).is_not_empty() {
            let theirs = b.occupied_co(!color) & !b.pieces(PieceType::King) & !b.pieces(PieceType::Queen);
            return ours.pop_count() <= 2 && theirs.is_empty();
        }

        // Bishops all on one square colour, and no piece that could block.
        if (ours & b.pieces(PieceType::Bishop)).is_not_empty() {
            let bishops = b.pieces(PieceType::Bishop);
            let same_color =
                (bishops & Bitboard::DARK_SQUARES).is_empty() || (bishops & Bitboard::LIGHT_SQUARES).is_empty();
            return same_color && b.pieces(PieceType::Pawn).is_empty() && b.pieces(PieceType::Knight).is_empty();
        }

        true
    }

    fn is_halfmoves(&self, n: u32) -> bool {
        self.halfmove_clock >= n && !self.legal_moves().is_empty()
    }

    /// 75 moves without a capture or pawn move; ends the game.
    pub fn is_seventyfive_moves(&self) -> bool {
        self.is_halfmoves(150)
    }

    /// 50 moves without a capture or pawn move; claimable.
    pub fn is_fifty_moves(&self) -> bool {
        self.is_halfmoves(100)
    }

    pub fn is_fivefold_repetition(&mut self) -> bool {
        self.is_repetition(5)
    }

    /// The fifty-move rule applies now or after some legal non-zeroing move.
    pub fn can_claim_fifty_moves(&mut self) -> bool {
        if self.is_fifty_moves() {
            return true;
        }
        if self.halfmove_clock >= 99 {
            for mv in self.legal_moves() {
                if self.is_zeroing(mv) {
                    continue;
                }
                self.push(mv);
                let claimable = self.is_fifty_moves();
                self.pop().ok();
                if claimable {
                    debug!(mv = %mv, "fifty-move draw claimable");
                    return true;
                }
            }
        }
        false
    }

    /// The current position occurred three times, or some legal move
    /// reaches a position that occurred twice, counting back to the last
    /// irreversible move.
    pub fn can_claim_threefold_repetition(&mut self) -> bool {
        let current = self.transposition_key();
        let mut transpositions: HashMap<TranspositionKey, usize> = HashMap::new();
        *transpositions.entry(current).or_default() += 1;

        let mut switchyard = Vec::new();
        while let Ok(mv) = self.pop() {
            switchyard.push(mv);
            if self.is_irreversible(mv) {
                break;
            }
            *transpositions.entry(self.transposition_key()).or_default() += 1;
        }
        while let Some(mv) = switchyard.pop() {
            self.push(mv);
        }

        if transpositions.get(&current).copied().unwrap_or(0) >= 3 {
            debug!("threefold repetition claimable");
            return true;
        }

        for mv in self.legal_moves() {
            self.push(mv);
            let count = transpositions.get(&self.transposition_key()).copied().unwrap_or(0);
            self.pop().ok();
            if count >= 2 {
                debug!(mv = %mv, "threefold repetition claimable after move");
                return true;
            }
        }
        false
    }

    pub fn can_claim_draw(&mut self) -> bool {
        self.can_claim_fifty_moves() || self.can_claim_threefold_repetition()
    }

    /// Has the current position occurred at least `count` times since the
    /// last irreversible move?
    pub fn is_repetition(&mut self, count: usize) -> bool {
        // Cheap filter on occupancy alone.
        let occupied = self.board.occupied();
        let mut maybe_repetitions = 1;
        for snapshot in self.stack.iter().rev() {
            if snapshot.board.occupied() == occupied {
                maybe_repetitions += 1;
                if maybe_repetitions >= count {
                    break;
                }
            }
        }
        if maybe_repetitions < count {
            return false;
        }

        let current = self.transposition_key();
        let mut remaining = count;
        let mut switchyard = Vec::new();
        let mut repeated = false;
        loop {
            if remaining <= 1 {
                repeated = true;
                break;
            }
            if self.move_stack.len() < remaining - 1 {
                break;
            }
            let Ok(mv) = self.pop() else {
                break;
            };
            switchyard.push(mv);
            if self.is_irreversible(mv) {
                break;
            }
            if self.transposition_key() == current {
                remaining -= 1;
            }
        }
        while let Some(mv) = switchyard.pop() {
            self.push(mv);
        }
        repeated
    }

    /// How the game ended, if it did.  With `claim_draw`, claimable draws
    /// (fifty moves, threefold repetition) count as ended.
    pub fn outcome(&mut self, claim_draw: bool) -> Option<Outcome> {
        let draw = |termination| Some(Outcome { termination, winner: None });

        if self.is_checkmate() {
            return Some(Outcome {
                termination: Termination::Checkmate,
                winner: Some(!self.turn),
            });
        }
        if self.is_insufficient_material() {
            return draw(Termination::InsufficientMaterial);
        }
        if self.legal_moves().is_empty() {
            return draw(Termination::Stalemate);
        }
        if self.is_seventyfive_moves() {
            return draw(Termination::SeventyfiveMoves);
        }
        if self.is_fivefold_repetition() {
            return draw(Termination::FivefoldRepetition);
        }
        if claim_draw {
            if self.can_claim_fifty_moves() {
                return draw(Termination::FiftyMoves);
            }
            if self.can_claim_threefold_repetition() {
                return draw(Termination::ThreefoldRepetition);
            }
        }
        None
    }

    pub fn is_game_over(&mut self, claim_draw: bool) -> bool {
        self.outcome(claim_draw).is_some()
    }

    /// `1-0`, `0-1`, `1/2-1/2`, or `*` while the game is still running.
    pub fn result(&mut self, claim_draw: bool) -> &'static str {
        self.outcome(claim_draw).map_or("*", |outcome| outcome.result())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Positions are equal when clocks and transposition keys agree; the move
/// history is ignored.
impl PartialEq for GameState {
    fn eq(&self, other: &Self) -> bool {
        self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
            && self.transposition_key() == other.transposition_key()
    }
}

impl Eq for GameState {}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.board)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn state(fen: &str) -> GameState {
        GameState::from_fen(fen, false).unwrap()
    }

    fn play(g: &mut GameState, moves: &[&str]) {
        for uci in moves {
            g.push_uci(uci).unwrap();
        }
    }

    // -----------------------------------------------------------------
    // Push / pop
    // -----------------------------------------------------------------

    #[test]
    fn push_updates_clocks_and_ep() {
        let mut g = GameState::new();
        play(&mut g, &["e2e4"]);
        assert_eq!(g.turn, Color::Black);
        assert_eq!(g.ep_square, Some(sq("e3")));
        assert_eq!(g.halfmove_clock, 0);
        assert_eq!(g.fullmove_number, 1);

        play(&mut g, &["g8f6"]);
        assert_eq!(g.ep_square, None);
        assert_eq!(g.halfmove_clock, 1);
        assert_eq!(g.fullmove_number, 2);
    }

    #[test]
    fn pop_restores_exact_state() {
        let mut g = state("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let before = g.clone();
        for mv in g.legal_moves() {
            g.push(mv);
            assert_eq!(g.pop(), Ok(mv));
            assert_eq!(g.board, before.board);
            assert_eq!(g.castling_rights, before.castling_rights);
            assert_eq!(g.ep_square, before.ep_square);
            assert_eq!(g, before);
        }
    }

    #[test]
    fn pop_on_empty_stack() {
        let mut g = GameState::new();
        assert_eq!(g.pop(), Err(ChessError::EmptyHistory));
        assert_eq!(g.peek(), Err(ChessError::EmptyHistory));
    }

    #[test]
    fn en_passant_capture_removes_pawn() {
        let mut g = GameState::new();
        play(&mut g, &["e2e4", "a7a6", "e4e5", "d7d5", "e5d6"]);
        assert_eq!(g.piece_at(sq("d5")), None);
        assert_eq!(g.piece_at(sq("d6")), Some(Piece::new(PieceType::Pawn, Color::White)));
        assert_eq!(g.halfmove_clock, 0);
    }

    #[test]
    fn standard_castling_moves_king_and_rook() {
        let mut g = state("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        g.push_uci("e1g1").unwrap();
        assert_eq!(g.piece_at(sq("g1")), Some(Piece::new(PieceType::King, Color::White)));
        assert_eq!(g.piece_at(sq("f1")), Some(Piece::new(PieceType::Rook, Color::White)));
        assert_eq!(g.piece_at(sq("h1")), None);
        assert_eq!(g.peek(), Ok(Move::new(sq("e1"), sq("g1"))));
        assert!(!g.has_castling_rights(Color::White));
        assert!(g.has_castling_rights(Color::Black));

        g.push_uci("e8c8").unwrap();
        assert_eq!(g.piece_at(sq("c8")), Some(Piece::new(PieceType::King, Color::Black)));
        assert_eq!(g.piece_at(sq("d8")), Some(Piece::new(PieceType::Rook, Color::Black)));
        assert_eq!(g.castling_rights, Bitboard::EMPTY);
    }

    #[test]
    fn promotion_marks_piece_promoted() {
        let mut g = state("8/P3k3/8/8/8/8/8/4K3 w - - 0 1");
        g.push_uci("a7a8n").unwrap();
        assert_eq!(g.piece_at(sq("a8")), Some(Piece::new(PieceType::Knight, Color::White)));
        assert!(g.board().promoted().is_set(sq("a8")));
    }

    #[test]
    fn null_move_flips_turn_only() {
        let mut g = state("4k3/8/8/8/3pP3/8/8/4K3 b - e3 3 10");
        g.push(Move::null());
        assert_eq!(g.turn, Color::White);
        assert_eq!(g.ep_square, None);
        assert_eq!(g.halfmove_clock, 4);
        assert_eq!(g.fullmove_number, 11);
        assert_eq!(g.pop(), Ok(Move::null()));
        assert_eq!(g.ep_square, Some(sq("e3")));
    }

    #[test]
    fn pawn_drop_zeroes_clock() {
        let mut g = state("4k3/8/8/8/8/8/8/4K3 w - - 7 1");
        g.push(Move::new_drop(PieceType::Pawn, sq("d4")));
        assert_eq!(g.piece_at(sq("d4")), Some(Piece::new(PieceType::Pawn, Color::White)));
        assert_eq!(g.halfmove_clock, 0);
    }

    #[test]
    fn rook_capture_clears_castling_right() {
        let mut g = state("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        g.push_uci("a1a8").unwrap();
        assert!(!g.castling_rights.is_set(sq("a1")));
        assert!(!g.castling_rights.is_set(sq("a8")));
        assert!(g.castling_rights.is_set(sq("h8")));
    }

    // -----------------------------------------------------------------
    // History helpers
    // -----------------------------------------------------------------

    #[test]
    fn root_and_ply() {
        let mut g = GameState::new();
        play(&mut g, &["e2e4", "e7e5", "g1f3"]);
        assert_eq!(g.ply(), 3);
        let root = g.root();
        assert_eq!(root, GameState::new());
        assert!(root.move_stack().is_empty());
    }

    #[test]
    fn copy_with_limited_stack() {
        let mut g = GameState::new();
        play(&mut g, &["e2e4", "e7e5", "g1f3"]);
        let mut copy = g.copy_with_stack(1);
        assert_eq!(copy.move_stack().len(), 1);
        assert_eq!(copy.pop(), Ok(Move::new(sq("g1"), sq("f3"))));
        assert_eq!(copy.pop(), Err(ChessError::EmptyHistory));
    }

    #[test]
    fn direct_mutation_clears_stack() {
        let mut g = GameState::new();
        play(&mut g, &["e2e4"]);
        g.remove_piece_at(sq("a1"));
        assert!(g.move_stack().is_empty());
        assert_eq!(g.pop(), Err(ChessError::EmptyHistory));
    }

    // -----------------------------------------------------------------
    // Castling rights
    // -----------------------------------------------------------------

    #[test]
    fn clean_rights_drop_impossible_ones() {
        let mut g = GameState::empty();
        g.set_board_fen("r3k2r/8/8/8/8/8/8/R4K1R").unwrap();
        g.castling_rights = Bitboard::CORNERS;
        let clean = g.clean_castling_rights();
        assert!(clean.is_set(sq("a8")) && clean.is_set(sq("h8")));
        assert!((clean & Bitboard::RANK_1).is_empty());
        assert!(!g.is_valid());
        assert!(g.status().contains(&Status::BadCastlingRights));
    }

    #[test]
    fn kingside_and_queenside_rights() {
        let g = state("r3k2r/8/8/8/8/8/8/R3K2R w Kq - 0 1");
        assert!(g.has_kingside_castling_rights(Color::White));
        assert!(!g.has_queenside_castling_rights(Color::White));
        assert!(g.has_queenside_castling_rights(Color::Black));
        assert!(!g.has_kingside_castling_rights(Color::Black));
        assert!(!g.has_chess960_castling_rights());
    }

    #[test]
    fn chess960_rights_detected() {
        let g = GameState::from_fen("1r2k1r1/8/8/8/8/8/8/1R2K1R1 w GBgb - 0 1", true).unwrap();
        assert!(g.has_chess960_castling_rights());
        assert!(g.has_kingside_castling_rights(Color::White));
        assert!(g.has_queenside_castling_rights(Color::Black));
    }

    // -----------------------------------------------------------------
    // Move classification
    // -----------------------------------------------------------------

    #[test]
    fn classify_moves() {
        let g = state("r3k2r/8/8/3pP3/8/8/8/R3K2R w KQkq d6 0 1");
        let ep = Move::new(sq("e5"), sq("d6"));
        assert!(g.is_en_passant(ep));
        assert!(g.is_capture(ep));
        assert!(g.is_zeroing(ep));

        let castle = Move::new(sq("e1"), sq("g1"));
        assert!(g.is_castling(castle));
        assert!(g.is_kingside_castling(castle));
        assert!(!g.is_queenside_castling(castle));
        assert!(g.is_queenside_castling(Move::new(sq("e1"), sq("a1"))));

        let rook = Move::new(sq("h1"), sq("h5"));
        assert!(!g.is_capture(rook));
        assert!(!g.is_zeroing(rook));
        assert!(g.is_irreversible(rook));
    }

    // -----------------------------------------------------------------
    // Validity
    // -----------------------------------------------------------------

    #[test]
    fn starting_position_is_valid() {
        assert!(GameState::new().is_valid());
        assert!(!GameState::empty().is_valid());
        assert!(GameState::empty().status().contains(&Status::Empty));
    }

    #[test]
    fn invalid_positions_report_reason() {
        let g = state("4k3/8/8/8/8/8/8/4K2P w - - 0 1");
        assert_eq!(g.status(), vec![Status::PawnsOnBackrank]);

        let g = state("4k3/8/8/8/8/8/8/4K2R w - - 0 1");
        assert!(g.is_valid());

        // Black king in check with White to move.
        let g = state("4k3/8/8/8/8/8/8/4KR2 w - - 0 1");
        assert!(g.is_valid());
        let g = state("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        assert!(g.is_valid());
        let g = state("4k3/8/8/8/8/8/8/4R1K1 w - - 0 1");
        assert_eq!(g.status(), vec![Status::OppositeCheck]);
    }

    #[test]
    fn invalid_ep_square_reported() {
        let mut g = GameState::new();
        g.ep_square = Some(sq("e6"));
        assert_eq!(g.status(), vec![Status::InvalidEpSquare]);
        let g = state("rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2");
        assert!(g.is_valid());
    }

    #[test]
    fn check_must_come_from_the_double_push() {
        // d7d5 cannot have uncovered the rook on the open e-file.
        let g = state("4r2k/8/8/3p4/8/8/8/4K3 w - d6 0 1");
        assert_eq!(g.status(), vec![Status::ImpossibleCheck]);
        assert!(!g.is_valid());

        // Without the ep square the same check is fine.
        assert!(state("4r2k/8/8/3p4/8/8/8/4K3 w - - 0 1").is_valid());

        // d7d5 uncovering the c8 bishop is a real discovered check.
        let g = state("2b4k/8/4K3/3p4/8/8/8/8 w - d6 0 1");
        assert!(g.is_check());
        assert!(g.is_valid());

        // Check given directly by the pushed pawn.
        let g = state("7k/8/8/3p4/4K3/8/8/8 w - d6 0 1");
        assert!(g.is_check());
        assert!(g.is_valid());
    }

    // -----------------------------------------------------------------
    // Clock limits
    // -----------------------------------------------------------------

    #[test]
    fn clocks_saturate_instead_of_overflowing() {
        let mut g = state("4k3/8/8/8/8/8/8/R3K3 w - - 4294967295 1");
        g.push_san("Ra2").unwrap();
        assert_eq!(g.halfmove_clock, u32::MAX);
        g.pop().unwrap();
        assert_eq!(g.halfmove_clock, u32::MAX);

        let mut g = state("4k3/8/8/8/8/8/8/R3K3 b - - 0 4294967295");
        assert_eq!(g.ply(), u32::MAX);
        g.push_san("Kd7").unwrap();
        assert_eq!(g.fullmove_number, u32::MAX);
        assert_eq!(g.ply(), u32::MAX);
    }

    // -----------------------------------------------------------------
    // Chess960
    // -----------------------------------------------------------------

    #[test]
    fn scharnagl_518_is_standard() {
        let g = GameState::from_chess960_pos(518).unwrap();
        assert_eq!(g.board, Board::starting());
        assert_eq!(g.castling_rights, Bitboard::CORNERS);
        assert!(g.chess960);
    }

    #[test]
    fn scharnagl_zero() {
        let g = GameState::from_chess960_pos(0).unwrap();
        assert_eq!(g.board.board_fen(false), "bbqnnrkr/pppppppp/8/8/8/8/PPPPPPPP/BBQNNRKR");
        assert!(g.is_valid());
    }

    #[test]
    fn scharnagl_out_of_range() {
        assert_eq!(
            GameState::from_chess960_pos(960),
            Err(ChessError::InvalidChess960Position(960))
        );
    }

    #[test]
    fn random_chess960_is_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let g = GameState::random_chess960(&mut rng);
            assert!(g.is_valid());
            assert_eq!(g.castling_rights.pop_count(), 4);
            assert!(!g.legal_moves().is_empty());
        }
    }

    // -----------------------------------------------------------------
    // Draws
    // -----------------------------------------------------------------

    #[test]
    fn insufficient_material_cases() {
        assert!(state("4k3/8/8/8/8/8/8/4K3 w - - 0 1").is_insufficient_material());
        assert!(state("4k3/8/8/8/8/8/8/4KN2 w - - 0 1").is_insufficient_material());
        assert!(state("4k3/8/8/8/8/8/8/4KB2 w - - 0 1").is_insufficient_material());
        // Bishops on the same colour.
        assert!(state("4kb2/8/8/8/8/8/8/2B1K3 w - - 0 1").is_insufficient_material());
        // Bishops on opposite colours.
        assert!(!state("2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1").is_insufficient_material());
        // Knight against a blocking rook.
        let g = state("4k2r/8/8/8/8/8/8/4KN2 w - - 0 1");
        assert!(!g.has_insufficient_material(Color::White));
        assert!(!g.has_insufficient_material(Color::Black));
        assert!(!state("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").is_insufficient_material());
    }

    #[test]
    fn checkmate_outcome() {
        let mut g = GameState::new();
        play(&mut g, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert!(g.is_checkmate());
        assert!(!g.is_stalemate());
        let outcome = g.outcome(false).unwrap();
        assert_eq!(outcome.termination, Termination::Checkmate);
        assert_eq!(outcome.winner, Some(Color::Black));
        assert_eq!(g.result(false), "0-1");
    }

    #[test]
    fn stalemate_outcome() {
        let mut g = state("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1");
        assert!(g.is_stalemate());
        assert_eq!(
            g.outcome(false),
            Some(Outcome {
                termination: Termination::Stalemate,
                winner: None
            })
        );
        assert_eq!(g.result(false), "1/2-1/2");
    }

    #[test]
    fn running_game_has_no_result() {
        let mut g = GameState::new();
        assert_eq!(g.outcome(true), None);
        assert!(!g.is_game_over(true));
        assert_eq!(g.result(true), "*");
    }

    #[test]
    fn fifty_and_seventyfive_moves() {
        let mut g = state("4k3/8/8/8/8/8/8/R3K3 w - - 99 80");
        assert!(!g.is_fifty_moves());
        assert!(g.can_claim_fifty_moves());

        let g = state("4k3/8/8/8/8/8/8/R3K3 w - - 100 80");
        assert!(g.is_fifty_moves());
        assert!(!g.is_seventyfive_moves());

        let mut g = state("4k3/8/8/8/8/8/8/R3K3 w - - 150 80");
        assert!(g.is_seventyfive_moves());
        assert_eq!(g.outcome(false).map(|o| o.termination), Some(Termination::SeventyfiveMoves));
    }

    #[test]
    fn threefold_by_knight_shuffle() {
        let mut g = GameState::new();
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
        play(&mut g, &shuffle);
        assert!(!g.can_claim_threefold_repetition());
        play(&mut g, &shuffle[..3]);
        // Playing f6g8 now would repeat the start a third time.
        assert!(g.can_claim_threefold_repetition());
        play(&mut g, &shuffle[3..]);
        assert!(g.is_repetition(3));
        assert!(!g.is_fivefold_repetition());
        assert_eq!(g.move_stack().len(), 8);
        assert_eq!(
            g.outcome(true).map(|o| o.termination),
            Some(Termination::ThreefoldRepetition)
        );
    }

    #[test]
    fn fivefold_repetition_ends_game() {
        let mut g = GameState::new();
        for _ in 0..4 {
            play(&mut g, &["g1f3", "g8f6", "f3g1", "f6g8"]);
        }
        assert!(g.is_fivefold_repetition());
        assert_eq!(
            g.outcome(false).map(|o| o.termination),
            Some(Termination::FivefoldRepetition)
        );
    }

    #[test]
    fn irreversible_move_stops_repetition_count() {
        let mut g = GameState::new();
        play(&mut g, &["g1f3", "g8f6", "f3g1", "f6g8", "e2e4", "e7e5"]);
        play(&mut g, &["g1f3", "g8f6", "f3g1", "f6g8"]);
        assert!(!g.is_repetition(3));
        assert!(g.is_repetition(2));
    }

    #[test]
    fn equality_ignores_history() {
        let mut a = GameState::new();
        play(&mut a, &["g1f3", "g8f6", "f3g1", "f6g8"]);
        let b = state("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 4 3");
        assert_eq!(a, b);
        assert_ne!(a, GameState::new());
    }
}
