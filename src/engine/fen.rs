//! FEN, X-FEN and Shredder-FEN for [`GameState`].
//!
//! Parsing is lenient about trailing fields (missing ones take their
//! starting-position defaults) but strict about everything present, and a
//! failed parse leaves the position untouched.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::engine::board::Board;
use crate::engine::game::GameState;
use crate::engine::types::{Bitboard, ChessError, Color, PieceType, Square};

/// When the en passant square is written to FEN/EPD output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EnPassantMode {
    /// Only if an en passant capture is legal.
    #[default]
    Legal,
    /// Whenever an en passant square is set.
    Fen,
    /// Only if an en passant capture is pseudo-legal.
    XFen,
}

fn castling_regex() -> &'static Regex {
    static CASTLING: OnceLock<Regex> = OnceLock::new();
    CASTLING.get_or_init(|| {
        Regex::new(r"^(?:-|[KQABCDEFGH]{0,2}[kqabcdefgh]{0,2})$").unwrap_or_else(|_| unreachable!())
    })
}

/// Castling rights described by an X-FEN/Shredder-FEN castling field,
/// resolved against `board`.
fn castling_rights_from_fen(board: &Board, castling_fen: &str) -> Result<Bitboard, ChessError> {
    if castling_fen.is_empty() || castling_fen == "-" {
        return Ok(Bitboard::EMPTY);
    }
    if !castling_regex().is_match(castling_fen) {
        return Err(ChessError::InvalidCastling(castling_fen.to_string()));
    }

    let mut rights = Bitboard::EMPTY;
    for flag in castling_fen.chars() {
        let color = if flag.is_ascii_uppercase() { Color::White } else { Color::Black };
        let back_rank = Bitboard::rank(color.back_rank());
        let rooks = board.pieces_mask(PieceType::Rook, color) & back_rank;
        let king = board.king(color);

        match flag.to_ascii_lowercase() {
            // Outermost rook on the a-side, else the a-file.
            'q' => match (king, rooks.lsb()) {
                (Some(king), Some(rook)) if rook < king => rights.set(rook),
                _ => rights |= Bitboard::FILE_A & back_rank,
            },
            // Outermost rook on the h-side, else the h-file.
            'k' => match (king, rooks.msb()) {
                (Some(king), Some(rook)) if rook > king => rights.set(rook),
                _ => rights |= Bitboard::FILE_H & back_rank,
            },
            file @ 'a'..='h' => rights |= Bitboard::file(file as u8 - b'a') & back_rank,
            _ => return Err(ChessError::InvalidCastling(castling_fen.to_string())),
        }
    }
    Ok(rights)
}

impl GameState {
    /// Parse a FEN.  With `chess960`, castling moves use king-to-rook
    /// encoding from then on.
    pub fn from_fen(fen: &str, chess960: bool) -> Result<Self, ChessError> {
        let mut state = GameState::empty();
        state.chess960 = chess960;
        state.set_fen(fen)?;
        Ok(state)
    }

    /// Replace the whole position with the one described by `fen` and
    /// clear the move stack.  Nothing changes if the FEN is rejected.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), ChessError> {
        let mut fields = fen.split_whitespace();

        // ----- Field 1: Piece placement -----
        let board_part = fields.next().ok_or_else(|| ChessError::fen(fen, "empty fen"))?;

        // ----- Field 2: Side to move -----
        let turn = match fields.next() {
            None | Some("w") => Color::White,
            Some("b") => Color::Black,
            Some(other) => {
                return Err(ChessError::fen(
                    fen,
                    format!("expected 'w' or 'b' for turn part of fen, got {other:?}"),
                ));
            }
        };

        // ----- Field 3: Castling availability -----
        let castling_part = fields.next().unwrap_or("-");
        if !castling_regex().is_match(castling_part) {
            return Err(ChessError::fen(fen, format!("invalid castling part in fen: {castling_part:?}")));
        }

        // ----- Field 4: En passant target square -----
        let ep_square = match fields.next() {
            None | Some("-") => None,
            Some(part) => Some(
                part.parse::<Square>()
                    .map_err(|_| ChessError::fen(fen, format!("invalid en passant part in fen: {part:?}")))?,
            ),
        };

        // ----- Field 5: Halfmove clock -----
        let halfmove_clock = match fields.next() {
            None => 0,
            Some(part) => part
                .parse::<u32>()
                .map_err(|_| ChessError::fen(fen, format!("invalid half-move clock in fen: {part:?}")))?,
        };

        // ----- Field 6: Fullmove number -----
        let fullmove_number = match fields.next() {
            None => 1,
            Some(part) => part
                .parse::<u32>()
                .map_err(|_| ChessError::fen(fen, format!("invalid fullmove number in fen: {part:?}")))?
                .max(1),
        };

        if fields.next().is_some() {
            return Err(ChessError::fen(fen, "fen string has more parts than expected"));
        }

        let board = Board::from_board_fen(board_part)?;
        let castling_rights = castling_rights_from_fen(&board, castling_part)?;

        self.board = board;
        self.turn = turn;
        self.castling_rights = castling_rights;
        self.ep_square = ep_square;
        self.halfmove_clock = halfmove_clock;
        self.fullmove_number = fullmove_number;
        self.clear_stack();
        debug!(fen, "position set from fen");
        Ok(())
    }

    /// Replace only the piece placement and clear the move stack.
    pub fn set_board_fen(&mut self, fen: &str) -> Result<(), ChessError> {
        self.board.set_board_fen(fen)?;
        self.clear_stack();
        Ok(())
    }

    /// Replace the castling rights with those of an X-FEN or
    /// Shredder-FEN castling field and clear the move stack.
    pub fn set_castling_fen(&mut self, castling_fen: &str) -> Result<(), ChessError> {
        self.castling_rights = castling_rights_from_fen(&self.board, castling_fen)?;
        self.clear_stack();
        Ok(())
    }

    // -----------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------

    /// FEN with X-FEN castling and the en passant square only when a
    /// legal en passant capture exists.
    pub fn fen(&self) -> String {
        self.fen_with(false, EnPassantMode::Legal, false)
    }

    /// FEN with Shredder-FEN castling (rook files instead of `KQkq`).
    pub fn shredder_fen(&self) -> String {
        self.fen_with(true, EnPassantMode::Legal, false)
    }

    /// FEN with explicit options.  `promoted` marks promoted pieces with `~`.
    pub fn fen_with(&self, shredder: bool, en_passant: EnPassantMode, promoted: bool) -> String {
        format!(
            "{} {} {}",
            self.epd_position(shredder, en_passant, promoted),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    /// The first four FEN fields.
    pub(crate) fn epd_position(&self, shredder: bool, en_passant: EnPassantMode, promoted: bool) -> String {
        let ep_square = match en_passant {
            EnPassantMode::Fen => self.ep_square,
            EnPassantMode::XFen => self.ep_square.filter(|_| self.has_pseudo_legal_en_passant()),
            EnPassantMode::Legal => self.ep_square.filter(|_| self.has_legal_en_passant()),
        };
        let castling = if shredder {
            self.castling_shredder_fen()
        } else {
            self.castling_xfen()
        };
        format!(
            "{} {} {} {}",
            self.board.board_fen(promoted),
            self.turn.fen_char(),
            castling,
            ep_square.map_or_else(|| "-".to_string(), |sq| sq.to_algebraic())
        )
    }

    /// Castling rights as rook files, White first, `-` if there are none.
    pub fn castling_shredder_fen(&self) -> String {
        let rights = self.clean_castling_rights();
        if rights.is_empty() {
            return "-".to_string();
        }
        let white = (rights & Bitboard::RANK_1)
            .iter_rev()
            .map(|sq| sq.file_char().to_ascii_uppercase());
        let black = (rights & Bitboard::RANK_8).iter_rev().map(|sq| sq.file_char());
        white.chain(black).collect()
    }

    /// Castling rights as `KQkq`, falling back to a rook file when another
    /// rook stands further out on the same side of the king.
    pub fn castling_xfen(&self) -> String {
        let rights = self.clean_castling_rights();
        let mut builder = String::new();

        for color in Color::ALL {
            let Some(king) = self.king(color) else {
                continue;
            };
            let back_rank = Bitboard::rank(color.back_rank());

            for rook in (rights & back_rank).iter_rev() {
                let a_side = rook.file() < king.file();
                let others =
                    self.board.pieces_mask(PieceType::Rook, color) & back_rank & !Bitboard::from_square(rook);
                let shadowed = others.iter().any(|other| (other.file() < rook.file()) == a_side);

                let flag = match (shadowed, a_side) {
                    (true, _) => rook.file_char(),
                    (false, true) => 'q',
                    (false, false) => 'k',
                };
                builder.push(if color == Color::White { flag.to_ascii_uppercase() } else { flag });
            }
        }

        if builder.is_empty() {
            "-".to_string()
        } else {
            builder
        }
    }
}

impl FromStr for GameState {
    type Err = ChessError;

    fn from_str(fen: &str) -> Result<Self, Self::Err> {
        GameState::from_fen(fen, false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::game::STARTING_FEN;

    #[test]
    fn starting_position_round_trip() {
        let g = GameState::from_fen(STARTING_FEN, false).unwrap();
        assert_eq!(g, GameState::new());
        assert_eq!(g.fen(), STARTING_FEN);
        assert_eq!(g.shredder_fen(), "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w HAha - 0 1");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let g = GameState::from_fen("8/8/8/8/8/8/8/K6k", false).unwrap();
        assert_eq!(g.turn, Color::White);
        assert!(g.castling_rights.is_empty());
        assert_eq!(g.ep_square, None);
        assert_eq!(g.halfmove_clock, 0);
        assert_eq!(g.fullmove_number, 1);
        assert_eq!(g.fen(), "8/8/8/8/8/8/8/K6k w - - 0 1");
    }

    #[test]
    fn fullmove_zero_becomes_one() {
        let g = GameState::from_fen("8/8/8/8/8/8/8/K6k b - - 3 0", false).unwrap();
        assert_eq!(g.fullmove_number, 1);
        assert_eq!(g.halfmove_clock, 3);
        assert_eq!(g.turn, Color::Black);
    }

    #[test]
    fn rejects_malformed_fields() {
        for fen in [
            "",
            "8/8/8/8/8/8/8/K6k x - - 0 1",
            "8/8/8/8/8/8/8/K6k w KQkqK - 0 1",
            "8/8/8/8/8/8/8/K6k w - e9 0 1",
            "8/8/8/8/8/8/8/K6k w - - -1 1",
            "8/8/8/8/8/8/8/K6k w - - 0 x",
            "8/8/8/8/8/8/8/K6k w - - 0 1 extra",
            "8/8/8/8/8/8/K6k w - - 0 1",
        ] {
            let err = GameState::from_fen(fen, false).unwrap_err();
            assert!(err.is_invalid_format(), "{fen:?} gave {err}");
        }
    }

    #[test]
    fn failed_set_fen_leaves_position_alone() {
        let mut g = GameState::new();
        g.push_uci("e2e4").unwrap();
        assert!(g.set_fen("8/8/8/8/8/8/8/K6k w - - 0 banana").is_err());
        assert_eq!(g.ply(), 1);
        assert_eq!(g.move_stack().len(), 1);
        assert_eq!(g.piece_type_at(Square(28)), Some(PieceType::Pawn));
    }

    #[test]
    fn set_fen_clears_stack() {
        let mut g = GameState::new();
        g.push_uci("g1f3").unwrap();
        g.set_fen(STARTING_FEN).unwrap();
        assert!(g.move_stack().is_empty());
        assert!(g.peek().is_err());
    }

    #[test]
    fn ep_square_written_only_when_capturable() {
        let mut g = GameState::new();
        g.push_uci("e2e4").unwrap();
        assert_eq!(g.ep_square, Some(Square(20)));
        assert_eq!(g.fen(), "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1");
        assert_eq!(
            g.fen_with(false, EnPassantMode::Fen, false),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert_eq!(
            g.fen_with(false, EnPassantMode::XFen, false),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );

        let fen = "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3";
        let g = GameState::from_fen(fen, false).unwrap();
        assert_eq!(g.fen(), fen);
    }

    #[test]
    fn pinned_ep_capture_only_in_xfen_mode() {
        // The e5 pawn cannot take on d6: the king on h5 would be exposed
        // along the fifth rank once both pawns leave it.
        let fen = "8/8/8/r2pP2K/8/8/8/7k w - d6 0 2";
        let g = GameState::from_fen(fen, false).unwrap();
        assert!(g.has_pseudo_legal_en_passant());
        assert!(!g.has_legal_en_passant());
        assert_eq!(g.fen(), "8/8/8/r2pP2K/8/8/8/7k w - - 0 2");
        assert_eq!(g.fen_with(false, EnPassantMode::XFen, false), fen);
    }

    #[test]
    fn promoted_marker() {
        let g = GameState::from_fen("4k3/8/8/8/8/8/8/Q~3K3 w - - 0 1", false).unwrap();
        assert!(g.board().promoted().is_set(Square::A1));
        assert_eq!(g.fen(), "4k3/8/8/8/8/8/8/Q3K3 w - - 0 1");
        assert_eq!(g.fen_with(false, EnPassantMode::Legal, true), "4k3/8/8/8/8/8/8/Q~3K3 w - - 0 1");
    }

    #[test]
    fn castling_letters_pick_outermost_rooks() {
        let g = GameState::from_fen("1r2k1r1/8/8/8/8/8/8/R3K2R w KQkq - 0 1", true).unwrap();
        assert_eq!(
            g.castling_rights,
            Bitboard::from_square(Square::A1)
                | Bitboard::from_square(Square::H1)
                | Bitboard::from_square(Square::B8)
                | Bitboard::from_square(Square::G8)
        );
        assert_eq!(g.castling_xfen(), "KQkq");
        assert_eq!(g.castling_shredder_fen(), "HAgb");
    }

    #[test]
    fn file_letters_and_shadowed_rooks() {
        // Two rooks on the h-side: the inner one needs its file letter.
        let g = GameState::from_fen("4k3/8/8/8/8/8/8/R1K2RR1 w F - 0 1", true).unwrap();
        assert_eq!(g.castling_rights, Bitboard::from_square(Square::F1));
        assert_eq!(g.castling_xfen(), "F");
        assert_eq!(g.castling_shredder_fen(), "F");

        let g = GameState::from_fen("4k3/8/8/8/8/8/8/R1K2RR1 w KQ - 0 1", true).unwrap();
        assert_eq!(g.castling_xfen(), "KQ");
        assert_eq!(g.castling_shredder_fen(), "GA");
    }

    #[test]
    fn unusable_rights_are_dropped_from_output() {
        let g = GameState::from_fen("4k3/8/8/8/8/8/8/4K3 w KQkq - 0 1", false).unwrap();
        assert_eq!(g.castling_xfen(), "-");
        assert_eq!(g.fen(), "4k3/8/8/8/8/8/8/4K3 w - - 0 1");
    }

    #[test]
    fn set_castling_fen_validates() {
        let mut g = GameState::new();
        g.set_castling_fen("Kq").unwrap();
        assert_eq!(g.castling_xfen(), "Kq");
        g.set_castling_fen("-").unwrap();
        assert_eq!(g.castling_xfen(), "-");
        assert!(matches!(g.set_castling_fen("KQkqX"), Err(ChessError::InvalidCastling(_))));
    }

    #[test]
    fn set_board_fen_keeps_other_fields() {
        let mut g = GameState::from_fen("8/8/8/8/8/8/8/K6k b - - 7 12", false).unwrap();
        g.set_board_fen("k7/8/8/8/8/8/8/7K").unwrap();
        assert_eq!(g.fen(), "k7/8/8/8/8/8/8/7K b - - 7 12");
        assert!(g.set_board_fen("k7/8/8/8/8/8/8/7K w").is_err());
    }

    #[test]
    fn parses_through_from_str() {
        let g: GameState = STARTING_FEN.parse().unwrap();
        assert!(!g.chess960);
        assert_eq!(g.fen(), STARTING_FEN);
    }
}
