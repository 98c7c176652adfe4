//! Bitboard chess position engine.
//!
//! [`engine::GameState`] holds a position with its move history and
//! provides legal move generation, make/unmake, draw detection and the
//! FEN, EPD, SAN and UCI codecs.  [`config`] configures the perft driver
//! binary.

pub mod config;
pub mod engine;
