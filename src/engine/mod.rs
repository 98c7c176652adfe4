pub mod attacks;
pub mod board;
pub mod epd;
pub mod fen;
pub mod game;
pub mod movegen;
pub mod san;
pub mod types;
pub mod zobrist;

pub use board::{Board, STARTING_BOARD_FEN};
pub use epd::{EpdOperand, EpdOperations};
pub use fen::EnPassantMode;
pub use game::{GameState, Outcome, STARTING_FEN, Status, Termination, TranspositionKey};
pub use types::*;
