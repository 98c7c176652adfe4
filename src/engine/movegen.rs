//! Move generation and legality.
//!
//! Pseudo-legal moves come straight from the attack tables.  Legal moves
//! are filtered without making them: out of check, each move is tested
//! against the set of pieces shielding the king from a slider; in check,
//! only evasions are generated.  En passant gets a dedicated test for the
//! case where both pawns leave the king's rank.

use crate::engine::attacks;
use crate::engine::game::GameState;
use crate::engine::types::{Bitboard, ChessError, Color, Move, PieceType, Square};

impl GameState {
    // =================================================================
    // Pseudo-legal generation
    // =================================================================

    /// Moves that follow piece movement rules, ignoring checks, with
    /// origin in `from_mask` and target in `to_mask`.
    pub fn generate_pseudo_legal_moves(&self, from_mask: Bitboard, to_mask: Bitboard) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        self.push_pseudo_legal_moves(from_mask, to_mask, &mut moves);
        moves
    }

    fn push_pseudo_legal_moves(&self, from_mask: Bitboard, to_mask: Bitboard, moves: &mut Vec<Move>) {
        let b = &self.board;
        let t = attacks::tables();
        let ours = b.occupied_co(self.turn);

        // Pieces.
        let non_pawns = ours & !b.pieces(PieceType::Pawn) & from_mask;
        for from in non_pawns.iter_rev() {
            let targets = b.attacks_mask(from) & !ours & to_mask;
            moves.extend(targets.iter_rev().map(|to| Move::new(from, to)));
        }

        if (from_mask & b.pieces(PieceType::King)).is_not_empty() {
            moves.extend(self.generate_castling_moves(from_mask, to_mask));
        }

        let pawns = b.pieces_mask(PieceType::Pawn, self.turn) & from_mask;
        if pawns.is_empty() {
            return;
        }

        // Pawn captures.
        let theirs = b.occupied_co(!self.turn);
        for from in pawns.iter_rev() {
            let targets = t.pawn_attacks(self.turn, from) & theirs & to_mask;
            for to in targets.iter_rev() {
                push_pawn_move(from, to, moves);
            }
        }

        // Pawn advances.
        let empty = !b.occupied();
        let (single, double) = match self.turn {
            Color::White => {
                let single = (pawns << 8) & empty;
                (single, (single << 8) & empty & Bitboard::rank(3))
            }
            Color::Black => {
                let single = (pawns >> 8) & empty;
                (single, (single >> 8) & empty & Bitboard::rank(4))
            }
        };

        for to in (single & to_mask).iter_rev() {
            let from = match self.turn {
                Color::White => Square(to.0 - 8),
                Color::Black => Square(to.0 + 8),
            };
            push_pawn_move(from, to, moves);
        }
        for to in (double & to_mask).iter_rev() {
            let from = match self.turn {
                Color::White => Square(to.0 - 16),
                Color::Black => Square(to.0 + 16),
            };
            moves.push(Move::new(from, to));
        }

        if self.ep_square.is_some() {
            moves.extend(self.generate_pseudo_legal_ep(from_mask, to_mask));
        }
    }

    /// En passant captures, ignoring checks.
    pub fn generate_pseudo_legal_ep(&self, from_mask: Bitboard, to_mask: Bitboard) -> Vec<Move> {
        let Some(ep) = self.ep_square else {
            return Vec::new();
        };
        if !to_mask.is_set(ep) || self.board.occupied().is_set(ep) {
            return Vec::new();
        }
        let fifth_rank = match self.turn {
            Color::White => Bitboard::rank(4),
            Color::Black => Bitboard::rank(3),
        };
        let capturers = self.board.pieces_mask(PieceType::Pawn, self.turn)
            & from_mask
            & attacks::tables().pawn_attacks(!self.turn, ep)
            & fifth_rank;
        capturers.iter_rev().map(|from| Move::new(from, ep)).collect()
    }

    /// Pseudo-legal captures, en passant included.
    pub fn generate_pseudo_legal_captures(&self, from_mask: Bitboard, to_mask: Bitboard) -> Vec<Move> {
        let mut moves =
            self.generate_pseudo_legal_moves(from_mask, to_mask & self.board.occupied_co(!self.turn));
        moves.extend(self.generate_pseudo_legal_ep(from_mask, to_mask));
        moves
    }

    /// All pseudo-legal moves.
    pub fn pseudo_legal_moves(&self) -> Vec<Move> {
        self.generate_pseudo_legal_moves(Bitboard::ALL, Bitboard::ALL)
    }

    // =================================================================
    // Castling
    // =================================================================

    /// Legal castling moves, encoded as the game encodes them (king to
    /// destination in standard chess, king to rook in Chess960).
    /// `to_mask` selects rooks, not king destinations.
    pub fn generate_castling_moves(&self, from_mask: Bitboard, to_mask: Bitboard) -> Vec<Move> {
        let b = &self.board;
        let t = attacks::tables();
        let rank = self.turn.back_rank();
        let back_rank = Bitboard::rank(rank);

        let kings = b.pieces_mask(PieceType::King, self.turn) & !b.promoted() & back_rank & from_mask;
        let Some(king) = kings.lsb() else {
            return Vec::new();
        };
        let king_bb = Bitboard::from_square(king);

        let mut moves = Vec::new();
        for candidate in (self.clean_castling_rights() & back_rank & to_mask).iter_rev() {
            let rook_bb = Bitboard::from_square(candidate);
            let (king_to, rook_to) = if candidate < king {
                (Square::from_file_rank(2, rank), Square::from_file_rank(3, rank))
            } else {
                (Square::from_file_rank(6, rank), Square::from_file_rank(5, rank))
            };
            let king_to_bb = Bitboard::from_square(king_to);
            let rook_to_bb = Bitboard::from_square(rook_to);
            let king_path = t.between(king, king_to);
            let rook_path = t.between(candidate, rook_to);

            let obstructed = (b.occupied() ^ king_bb ^ rook_bb) & (king_path | rook_path | king_to_bb | rook_to_bb);
            if obstructed.is_not_empty()
                || self.attacked_for_king(king_path | king_bb, b.occupied() ^ king_bb)
                || self.attacked_for_king(king_to_bb, b.occupied() ^ king_bb ^ rook_bb ^ rook_to_bb)
            {
                continue;
            }
            moves.push(self.from_chess960(self.chess960, Move::new(king, candidate)));
        }
        moves
    }

    /// Is any square of `path` attacked by the opponent under `occupied`?
    pub(crate) fn attacked_for_king(&self, path: Bitboard, occupied: Bitboard) -> bool {
        path.iter_rev()
            .any(|sq| self.board.attackers_with_occupancy(!self.turn, sq, occupied).is_not_empty())
    }

    // =================================================================
    // Check
    // =================================================================

    /// Pieces giving check to the side to move.
    pub fn checkers_mask(&self) -> Bitboard {
        match self.board.king(self.turn) {
            Some(king) => self.board.attackers_mask(!self.turn, king),
            None => Bitboard::EMPTY,
        }
    }

    pub fn is_check(&self) -> bool {
        self.checkers_mask().is_not_empty()
    }

    /// Would `mv` check the opponent?  Pushes and pops the move.
    pub fn gives_check(&mut self, mv: Move) -> bool {
        self.push(mv);
        let check = self.is_check();
        self.pop().ok();
        check
    }

    /// Would the pseudo-legal move `mv` leave the mover's king attacked?
    pub fn is_into_check(&self, mv: Move) -> bool {
        let Some(king) = self.board.king(self.turn) else {
            return false;
        };
        let checkers = self.board.attackers_mask(!self.turn, king);
        if checkers.is_not_empty()
            && !self
                .generate_evasions(king, checkers, Bitboard::from_square(mv.from), Bitboard::from_square(mv.to))
                .contains(&mv)
        {
            return true;
        }
        !self.is_safe(king, self.slider_blockers(king), mv)
    }

    /// Is the side that just moved in check?
    pub fn was_into_check(&self) -> bool {
        self.board
            .king(!self.turn)
            .is_some_and(|king| self.board.is_attacked_by(self.turn, king))
    }

    // =================================================================
    // Legality
    // =================================================================

    /// Does `mv` follow the movement rules for the side to move?  Null
    /// moves and drops never do.
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_null() || mv.drop.is_some() {
            return false;
        }
        let Some(piece_type) = self.board.piece_type_at(mv.from) else {
            return false;
        };
        let from_mask = Bitboard::from_square(mv.from);
        let to_mask = Bitboard::from_square(mv.to);
        if (self.board.occupied_co(self.turn) & from_mask).is_empty() {
            return false;
        }

        if mv.promotion.is_some() {
            if piece_type != PieceType::Pawn {
                return false;
            }
            if mv.to.rank() != (!self.turn).back_rank() {
                return false;
            }
        }

        if piece_type == PieceType::King {
            let castle = self.from_chess960(self.chess960, Move::new(mv.from, mv.to));
            if self.generate_castling_moves(Bitboard::ALL, Bitboard::ALL).contains(&castle) {
                return true;
            }
        }

        if (self.board.occupied_co(self.turn) & to_mask).is_not_empty() {
            return false;
        }

        if piece_type == PieceType::Pawn {
            return self.generate_pseudo_legal_moves(from_mask, to_mask).contains(&mv);
        }

        (self.board.attacks_mask(mv.from) & to_mask).is_not_empty()
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        self.is_pseudo_legal(mv) && !self.is_into_check(mv)
    }

    /// Legal moves with origin in `from_mask` and target in `to_mask`.
    pub fn generate_legal_moves(&self, from_mask: Bitboard, to_mask: Bitboard) -> Vec<Move> {
        let king_mask = self.board.pieces_mask(PieceType::King, self.turn);
        let Some(king) = king_mask.msb() else {
            return self.generate_pseudo_legal_moves(from_mask, to_mask);
        };

        let blockers = self.slider_blockers(king);
        let checkers = self.board.attackers_mask(!self.turn, king);
        let candidates = if checkers.is_not_empty() {
            self.generate_evasions(king, checkers, from_mask, to_mask)
        } else {
            self.generate_pseudo_legal_moves(from_mask, to_mask)
        };
        candidates
            .into_iter()
            .filter(|&mv| self.is_safe(king, blockers, mv))
            .collect()
    }

    /// Legal en passant captures.
    pub fn generate_legal_ep(&self, from_mask: Bitboard, to_mask: Bitboard) -> Vec<Move> {
        self.generate_pseudo_legal_ep(from_mask, to_mask)
            .into_iter()
            .filter(|&mv| !self.is_into_check(mv))
            .collect()
    }

    /// Legal captures, en passant included.
    pub fn generate_legal_captures(&self, from_mask: Bitboard, to_mask: Bitboard) -> Vec<Move> {
        let mut moves = self.generate_legal_moves(from_mask, to_mask & self.board.occupied_co(!self.turn));
        moves.extend(self.generate_legal_ep(from_mask, to_mask));
        moves
    }

    /// All legal moves.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.generate_legal_moves(Bitboard::ALL, Bitboard::ALL)
    }

    pub fn has_pseudo_legal_en_passant(&self) -> bool {
        !self.generate_pseudo_legal_ep(Bitboard::ALL, Bitboard::ALL).is_empty()
    }

    pub fn has_legal_en_passant(&self) -> bool {
        !self.generate_legal_ep(Bitboard::ALL, Bitboard::ALL).is_empty()
    }

    /// The legal move from `from` to `to`.  Pawns reaching the last rank
    /// promote to a queen unless `promotion` says otherwise, and standard
    /// castling may be given as king-to-rook.
    pub fn find_move(&self, from: Square, to: Square, promotion: Option<PieceType>) -> Result<Move, ChessError> {
        let promotion = promotion.or_else(|| {
            let pawn_to_back_rank = self.board.pieces(PieceType::Pawn).is_set(from)
                && Bitboard::BACKRANKS.is_set(to);
            pawn_to_back_rank.then_some(PieceType::Queen)
        });

        let mv = Move {
            from,
            to,
            promotion,
            drop: None,
        };
        let mv = self.from_chess960(self.chess960, mv);
        if !self.is_legal(mv) {
            return Err(self.illegal(&mv.uci()));
        }
        Ok(mv)
    }

    // =================================================================
    // Safety tests
    // =================================================================

    /// Own pieces that are the only piece between the king and an enemy
    /// slider.
    pub(crate) fn slider_blockers(&self, king: Square) -> Bitboard {
        let b = &self.board;
        let t = attacks::tables();
        let rooks_queens = b.rooks_and_queens();
        let bishops_queens = b.bishops_and_queens();

        let snipers = (t.rank_attacks(king, Bitboard::EMPTY) & rooks_queens)
            | (t.file_attacks(king, Bitboard::EMPTY) & rooks_queens)
            | (t.diag_attacks(king, Bitboard::EMPTY) & bishops_queens);

        let mut blockers = Bitboard::EMPTY;
        for sniper in (snipers & b.occupied_co(!self.turn)).iter_rev() {
            let between = t.between(king, sniper) & b.occupied();
            if between.is_not_empty() && !between.more_than_one() {
                blockers |= between;
            }
        }
        blockers & b.occupied_co(self.turn)
    }

    /// Is the pseudo-legal (or evasion) move `mv` safe for the king?
    fn is_safe(&self, king: Square, blockers: Bitboard, mv: Move) -> bool {
        if mv.from == king {
            // Castling safety is checked during generation.
            self.is_castling(mv) || !self.board.is_attacked_by(!self.turn, mv.to)
        } else if self.is_en_passant(mv) {
            self.board.pin_mask(self.turn, mv.from).is_set(mv.to) && !self.ep_skewered(king, mv.from)
        } else {
            !blockers.is_set(mv.from) || attacks::tables().ray(mv.from, mv.to).is_set(king)
        }
    }

    /// Would capturing en passant from `capturer` clear a rank or
    /// diagonal between the king and an enemy slider?
    fn ep_skewered(&self, king: Square, capturer: Square) -> bool {
        let Some(ep) = self.ep_square else {
            return false;
        };
        let b = &self.board;
        let t = attacks::tables();
        let last_double = match self.turn {
            Color::White => ep.0.checked_sub(8),
            Color::Black => Some(ep.0 + 8).filter(|&sq| sq < 64),
        };
        let Some(last_double) = last_double.map(Square) else {
            return false;
        };
        let occupancy = (b.occupied() & !Bitboard::from_square(last_double) & !Bitboard::from_square(capturer))
            | Bitboard::from_square(ep);

        let theirs = b.occupied_co(!self.turn);
        (t.rank_attacks(king, occupancy) & theirs & b.rooks_and_queens()).is_not_empty()
            || (t.diag_attacks(king, occupancy) & theirs & b.bishops_and_queens()).is_not_empty()
    }

    /// Candidate moves out of check: king steps off the checking lines,
    /// and against a single checker, captures and interpositions.
    fn generate_evasions(&self, king: Square, checkers: Bitboard, from_mask: Bitboard, to_mask: Bitboard) -> Vec<Move> {
        let b = &self.board;
        let t = attacks::tables();
        let sliders = checkers & (b.pieces(PieceType::Bishop) | b.rooks_and_queens());

        // Squares behind the king on a checking line stay attacked.
        let mut attacked = Bitboard::EMPTY;
        for checker in sliders.iter_rev() {
            attacked |= t.ray(king, checker) & !Bitboard::from_square(checker);
        }

        let mut moves = Vec::new();
        if from_mask.is_set(king) {
            let targets = t.king_attacks(king) & !b.occupied_co(self.turn) & !attacked & to_mask;
            moves.extend(targets.iter_rev().map(|to| Move::new(king, to)));
        }

        let Some(checker) = checkers.msb() else {
            return moves;
        };
        if checkers.more_than_one() {
            return moves;
        }

        let target = t.between(king, checker) | checkers;
        self.push_pseudo_legal_moves(!b.pieces(PieceType::King) & from_mask, target & to_mask, &mut moves);

        // A checking pawn that just double-pushed can also be taken en
        // passant; skip it when the ep square is already a target.
        if let Some(ep) = self.ep_square
            && !target.is_set(ep)
        {
            let last_double = match self.turn {
                Color::White => ep.0.checked_sub(8),
                Color::Black => Some(ep.0 + 8),
            };
            if last_double == Some(checker.0) {
                moves.extend(self.generate_pseudo_legal_ep(from_mask, to_mask));
            }
        }
        moves
    }

    // =================================================================
    // Perft
    // =================================================================

    /// Number of leaf nodes of the legal move tree `depth` plies deep.
    pub fn perft(&mut self, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        let moves = self.legal_moves();
        if depth == 1 {
            return moves.len() as u64;
        }
        let mut nodes = 0;
        for mv in moves {
            self.push(mv);
            nodes += self.perft(depth - 1);
            self.pop().ok();
        }
        nodes
    }

    /// Perft split by root move, in generation order.
    pub fn divide(&mut self, depth: u32) -> Vec<(Move, u64)> {
        let mut counts = Vec::new();
        if depth == 0 {
            return counts;
        }
        for mv in self.legal_moves() {
            self.push(mv);
            counts.push((mv, self.perft(depth - 1)));
            self.pop().ok();
        }
        counts
    }
}

/// Push a pawn move, expanding it into the four promotions on the last rank.
fn push_pawn_move(from: Square, to: Square, moves: &mut Vec<Move>) {
    if Bitboard::BACKRANKS.is_set(to) {
        moves.extend(PieceType::PROMOTIONS.iter().map(|&promo| Move::with_promotion(from, to, promo)));
    } else {
        moves.push(Move::new(from, to));
    }
}

// =========================================================================
// Tests
// =========================================================================
