//! Standard Algebraic Notation (SAN), long algebraic notation and the
//! xboard move format.
//!
//! SAN examples: `e4`, `Nf3`, `Bxe5`, `O-O`, `e8=Q+`, `Raxd1#`.
//! Rendering needs the position before the move (for disambiguation) and
//! after it (for the check suffix), so the renderers push and pop.

use std::sync::OnceLock;

use regex::Regex;

use crate::engine::game::GameState;
use crate::engine::types::{Bitboard, ChessError, Color, Move, PieceType, Square};

fn san_regex() -> &'static Regex {
    static SAN: OnceLock<Regex> = OnceLock::new();
    SAN.get_or_init(|| {
        Regex::new(r"^([NBKRQ])?([a-h])?([1-8])?[\-x]?([a-h][1-8])(=?[nbrqkNBRQK])?[\+#]?$")
            .unwrap_or_else(|_| unreachable!())
    })
}

const KINGSIDE_CASTLING: [&str; 6] = ["O-O", "O-O+", "O-O#", "0-0", "0-0+", "0-0#"];
const QUEENSIDE_CASTLING: [&str; 6] = ["O-O-O", "O-O-O+", "O-O-O#", "0-0-0", "0-0-0+", "0-0-0#"];
const NULL_MOVES: [&str; 4] = ["--", "Z0", "0000", "@@@@"];

// =========================================================================
// SAN generation
// =========================================================================

impl GameState {
    /// SAN of a legal (or null) move, with `+`/`#` suffix.
    pub fn san(&mut self, mv: Move) -> Result<String, ChessError> {
        self.algebraic(mv, false, false)
    }

    /// Long algebraic notation: `e2-e4`, `Ng1xf3`, `O-O`.
    pub fn lan(&mut self, mv: Move) -> Result<String, ChessError> {
        self.algebraic(mv, true, false)
    }

    /// SAN of `mv`, leaving the move applied.
    pub fn san_and_push(&mut self, mv: Move) -> Result<String, ChessError> {
        self.algebraic(mv, false, true)
    }

    /// Render a line of play starting here, e.g. `1. e4 e5 2. Nf3`, or
    /// `37...Bg6 38. Kh1` when Black moves first.  Every move is checked
    /// for legality in turn; the position itself does not change.
    pub fn variation_san(&self, moves: &[Move]) -> Result<String, ChessError> {
        let mut board = self.copy_with_stack(0);
        let mut san = Vec::with_capacity(moves.len());

        for &mv in moves {
            if !board.is_legal(mv) {
                return Err(board.illegal(&mv.uci()));
            }
            let fullmove = board.fullmove_number;
            let turn = board.turn;
            let text = board.san_and_push(mv)?;
            san.push(match turn {
                Color::White => format!("{fullmove}. {text}"),
                Color::Black if san.is_empty() => format!("{fullmove}...{text}"),
                Color::Black => text,
            });
        }

        Ok(san.join(" "))
    }

    fn algebraic(&mut self, mv: Move, long: bool, keep: bool) -> Result<String, ChessError> {
        let mut san = self.algebraic_without_suffix(mv, long)?;

        // Look ahead for check or checkmate.
        self.push(mv);
        if !mv.is_null() && self.is_check() {
            san.push(if self.is_checkmate() { '#' } else { '+' });
        }
        if !keep {
            self.pop().ok();
        }
        Ok(san)
    }

    fn algebraic_without_suffix(&self, mv: Move, long: bool) -> Result<String, ChessError> {
        if mv.is_null() {
            return Ok("--".to_string());
        }

        if let Some(drop) = mv.drop {
            let mut san = String::with_capacity(4);
            if drop != PieceType::Pawn {
                san.push(drop.to_char(Color::White));
            }
            san.push('@');
            san.push_str(&mv.to.to_algebraic());
            return Ok(san);
        }

        if self.is_castling(mv) {
            return Ok(if mv.to.file() < mv.from.file() { "O-O-O" } else { "O-O" }.to_string());
        }

        let piece = self
            .board
            .piece_type_at(mv.from)
            .ok_or_else(|| self.illegal(&mv.uci()))?;
        let capture = self.is_capture(mv);

        let mut san = String::with_capacity(8);
        if piece != PieceType::Pawn {
            san.push(piece.to_char(Color::White));
        }

        if long {
            san.push_str(&mv.from.to_algebraic());
        } else if piece != PieceType::Pawn {
            san.push_str(&self.disambiguation(mv, piece));
        } else if capture {
            // Pawn captures keep the departure file: "exd5".
            san.push(mv.from.file_char());
        }

        if capture {
            san.push('x');
        } else if long {
            san.push('-');
        }

        san.push_str(&mv.to.to_algebraic());

        if let Some(promotion) = mv.promotion {
            san.push('=');
            san.push(promotion.to_char(Color::White));
        }

        Ok(san)
    }

    /// File, rank, both or neither, depending on which other pieces of
    /// the same type could also legally reach the target square.
    fn disambiguation(&self, mv: Move, piece: PieceType) -> String {
        let from_mask = self.board.pieces_mask(piece, self.turn) & !Bitboard::from_square(mv.from);
        let others: Bitboard = self
            .generate_legal_moves(from_mask, Bitboard::from_square(mv.to))
            .into_iter()
            .map(|candidate| candidate.from)
            .collect();

        if others.is_empty() {
            return String::new();
        }

        let same_file = (others & Bitboard::file(mv.from.file())).is_not_empty();
        let same_rank = (others & Bitboard::rank(mv.from.rank())).is_not_empty();

        match (same_file, same_rank) {
            // File alone is sufficient.
            (false, _) => mv.from.file_char().to_string(),
            // Rank alone is sufficient.
            (true, false) => mv.from.rank_char().to_string(),
            (true, true) => mv.from.to_algebraic(),
        }
    }

    // =====================================================================
    // SAN parsing
    // =====================================================================

    /// Parse SAN in the context of this position.
    ///
    /// Accepts `O-O`/`0-0` castling with optional suffix, the null move
    /// forms `--`, `Z0`, `0000` and `@@@@`, and fully specified
    /// coordinates such as `e2e4` for any piece.  Pawn captures must name
    /// the departure file.
    pub fn parse_san(&self, san: &str) -> Result<Move, ChessError> {
        let kingside = KINGSIDE_CASTLING.contains(&san);
        if kingside || QUEENSIDE_CASTLING.contains(&san) {
            return self
                .generate_castling_moves(Bitboard::ALL, Bitboard::ALL)
                .into_iter()
                .find(|&mv| {
                    if kingside {
                        self.is_kingside_castling(mv)
                    } else {
                        self.is_queenside_castling(mv)
                    }
                })
                .ok_or_else(|| self.illegal(san));
        }

        let Some(caps) = san_regex().captures(san) else {
            if NULL_MOVES.contains(&san) {
                return Ok(Move::null());
            }
            if san.contains(',') {
                return Err(ChessError::UnsupportedMove(san.to_string()));
            }
            return Err(ChessError::InvalidSan(san.to_string()));
        };

        let invalid = || ChessError::InvalidSan(san.to_string());

        // Own pieces are masked out so castling is never matched here.
        let to: Square = caps[4].parse().map_err(|_| invalid())?;
        let to_mask = Bitboard::from_square(to) & !self.board.occupied_co(self.turn);

        let promotion = match caps.get(5) {
            None => None,
            Some(group) => {
                let symbol = group.as_str().chars().last().ok_or_else(invalid)?;
                Some(PieceType::from_char(symbol).ok_or_else(invalid)?.1)
            }
        };

        let from_file = caps.get(2).and_then(|m| m.as_str().bytes().next()).map(|b| b - b'a');
        let from_rank = caps.get(3).and_then(|m| m.as_str().bytes().next()).map(|b| b - b'1');

        let mut from_mask = Bitboard::ALL;
        if let Some(file) = from_file {
            from_mask &= Bitboard::file(file);
        }
        if let Some(rank) = from_rank {
            from_mask &= Bitboard::rank(rank);
        }

        if let Some(piece) = caps.get(1) {
            let (_, piece) = piece.as_str().chars().next().and_then(PieceType::from_char).ok_or_else(invalid)?;
            from_mask &= self.board.pieces_mask(piece, self.turn);
        } else if let (Some(file), Some(rank)) = (from_file, from_rank) {
            // Fully specified moves are allowed for any piece, castling included.
            let mv = self.find_move(Square::from_file_rank(file, rank), to, promotion)?;
            if mv.promotion != promotion {
                return Err(self.illegal(san));
            }
            return Ok(mv);
        } else {
            from_mask &= self.board.pieces(PieceType::Pawn);
            // Pawn captures need an explicit file.
            if from_file.is_none() {
                from_mask &= Bitboard::file(to.file());
            }
        }

        let mut matched = None;
        for mv in self.generate_legal_moves(from_mask, to_mask) {
            if mv.promotion != promotion {
                continue;
            }
            if matched.is_some() {
                return Err(ChessError::AmbiguousMove {
                    mv: san.to_string(),
                    fen: self.fen(),
                });
            }
            matched = Some(mv);
        }

        matched.ok_or_else(|| self.illegal(san))
    }

    /// Parse SAN and push the resulting move.
    pub fn push_san(&mut self, san: &str) -> Result<Move, ChessError> {
        let mv = self.parse_san(san)?;
        self.push(mv);
        Ok(mv)
    }

    // =====================================================================
    // xboard
    // =====================================================================

    /// Move text for the xboard protocol: UCI coordinates, `@@@@` for the
    /// null move, and `O-O`/`O-O-O` for castling in Chess960.
    pub fn xboard(&self, mv: Move) -> String {
        if mv.is_null() {
            return "@@@@".to_string();
        }
        if !self.chess960 || !self.is_castling(mv) {
            return mv.uci();
        }
        if self.is_kingside_castling(mv) {
            "O-O".to_string()
        } else {
            "O-O-O".to_string()
        }
    }

    /// Parse an xboard move; both SAN and coordinate notation are accepted.
    pub fn parse_xboard(&self, xboard: &str) -> Result<Move, ChessError> {
        self.parse_san(xboard)
    }

    /// Parse an xboard move and push it.
    pub fn push_xboard(&mut self, xboard: &str) -> Result<Move, ChessError> {
        self.push_san(xboard)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
