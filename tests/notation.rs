//! FEN, EPD, SAN and UCI at the `GameState` level.

use bitchess::engine::{
    ChessError, EnPassantMode, EpdOperand, EpdOperations, GameState, Move, STARTING_FEN, Square,
};

fn position(fen: &str) -> GameState {
    GameState::from_fen(fen, false).unwrap()
}

fn sq(name: &str) -> Square {
    name.parse().unwrap()
}

// =====================================================================
// FEN
// =====================================================================

#[test]
fn opening_moves_render_san_and_fen() {
    let mut game = GameState::new();
    let e4 = game.parse_uci("e2e4").unwrap();
    assert_eq!(game.san(e4).unwrap(), "e4");
    game.push(e4);
    let e5 = game.parse_uci("e7e5").unwrap();
    assert_eq!(game.san(e5).unwrap(), "e5");
    game.push(e5);
    assert_eq!(game.fen(), "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2");
}

#[test]
fn fen_round_trips() {
    for fen in [
        STARTING_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        "4k3/8/8/8/8/8/8/4K3 b - - 42 117",
    ] {
        assert_eq!(position(fen).fen(), fen);
    }
}

#[test]
fn push_pop_restores_fen_everywhere() {
    let mut game = position("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
    let before = game.fen_with(true, EnPassantMode::Fen, true);
    for mv in game.legal_moves() {
        game.push(mv);
        for reply in game.legal_moves() {
            game.push(reply);
            game.pop().unwrap();
        }
        game.pop().unwrap();
        assert_eq!(game.fen_with(true, EnPassantMode::Fen, true), before, "after {mv}");
    }
}

#[test]
fn chess960_fen_uses_rook_files_when_needed() {
    let fen = "bqnb1rkr/pp3ppp/3ppn2/2p5/5P2/P2P4/NPP1P1PP/BQ1BNRKR w HFhf - 2 9";
    let game = GameState::from_fen(fen, true).unwrap();
    assert_eq!(game.shredder_fen(), fen);
    assert_eq!(game.fen(), "bqnb1rkr/pp3ppp/3ppn2/2p5/5P2/P2P4/NPP1P1PP/BQ1BNRKR w KQkq - 2 9");
    assert!(game.has_chess960_castling_rights());
}

#[test]
fn invalid_fen_is_an_invalid_format_error() {
    let err = GameState::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBN w KQkq - 0 1", false).unwrap_err();
    assert!(err.is_invalid_format());
    assert!(matches!(err, ChessError::InvalidFen { .. }));
}

// =====================================================================
// UCI
// =====================================================================

#[test]
fn uci_castling_follows_game_mode() {
    let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
    let standard = position(fen);
    let castle = standard.parse_uci("e1h1").unwrap();
    assert_eq!(castle, Move::new(sq("e1"), sq("g1")));
    assert_eq!(standard.uci(castle), "e1g1");

    let chess960 = GameState::from_fen(fen, true).unwrap();
    let castle = chess960.parse_uci("e1h1").unwrap();
    assert_eq!(castle, Move::new(sq("e1"), sq("h1")));
    assert_eq!(chess960.uci(castle), "e1h1");
    // King-to-destination input is still understood while the rook is home.
    assert_eq!(chess960.parse_uci("e1g1").unwrap(), castle);
}

#[test]
fn uci_rejects_garbage_and_illegal_moves() {
    let game = GameState::new();
    assert!(game.parse_uci("e2e5").unwrap_err().is_illegal_move());
    assert!(game.parse_uci("e2").unwrap_err().is_invalid_format());
    assert!(game.parse_uci("0000").unwrap().is_null());
}

#[test]
fn moves_serialize_as_uci() {
    let mv = Move::with_promotion(sq("a7"), sq("a8"), bitchess::engine::PieceType::Knight);
    assert_eq!(serde_json::to_string(&mv).unwrap(), "\"a7a8n\"");
    let back: Move = serde_json::from_str("\"a7a8n\"").unwrap();
    assert_eq!(back, mv);
}

// =====================================================================
// SAN / LAN
// =====================================================================

#[test]
fn san_and_lan_parse_back_in_position_5() {
    let mut game = position("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8");
    for mv in game.legal_moves() {
        let san = game.san(mv).unwrap();
        assert_eq!(game.parse_san(&san).unwrap(), mv, "san {san}");
        let lan = game.lan(mv).unwrap();
        assert_eq!(game.parse_san(&lan).unwrap(), mv, "lan {lan}");
    }
    assert!(game.move_stack().is_empty());
}

#[test]
fn promotions_render_with_piece() {
    let mut game = position("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8");
    let promote = game.parse_san("dxc8=Q").unwrap();
    assert_eq!(game.lan(promote).unwrap(), "d7xc8=Q");
    let underpromote = game.parse_san("dxc8=N").unwrap();
    assert_eq!(underpromote.promotion, Some(bitchess::engine::PieceType::Knight));
    assert_eq!(game.san(underpromote).unwrap(), "dxc8=N");
}

#[test]
fn variation_of_an_opening() {
    let game = GameState::new();
    let line: Vec<Move> = ["e2e4", "c7c5", "g1f3", "d7d6", "d2d4"]
        .iter()
        .map(|uci| uci.parse().unwrap())
        .collect();
    assert_eq!(game.variation_san(&line).unwrap(), "1. e4 c5 2. Nf3 d6 3. d4");
    assert_eq!(game.fen(), STARTING_FEN);
}

// =====================================================================
// EPD
// =====================================================================

#[test]
fn epd_operations_round_trip() {
    let mut game = position("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
    let mut operations = EpdOperations::new();
    operations.insert("bm".into(), EpdOperand::MoveList(vec![game.parse_san("Bb5").unwrap()]));
    operations.insert("pv".into(), EpdOperand::MoveList(vec![
        game.parse_san("Bb5").unwrap(),
        Move::new(sq("a7"), sq("a6")),
    ]));
    operations.insert("hmvc".into(), EpdOperand::Int(2));
    operations.insert("fmvn".into(), EpdOperand::Int(3));
    operations.insert("id".into(), EpdOperand::String("ruy lopez".into()));

    let epd = game.epd_with_operations(&operations).unwrap();
    assert_eq!(
        epd,
        "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - \
         bm Bb5; fmvn 3; hmvc 2; id \"ruy lopez\"; pv Bb5 a6;"
    );

    let parsed = game.set_epd(&epd).unwrap();
    assert_eq!(parsed, operations);
    assert_eq!(game.fen(), "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
}
