use std::time::Instant;

use bitchess::config::PerftConfig;
use bitchess::engine::GameState;

fn main() {
    // Initialize tracing (structured logging).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bitchess=info".into()),
        )
        .init();

    let config = PerftConfig::from_env();
    let mut game = match GameState::from_fen(&config.fen, config.chess960) {
        Ok(game) => game,
        Err(e) => {
            eprintln!("Invalid PERFT_FEN: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        fen = %config.fen,
        depth = config.depth,
        chess960 = config.chess960,
        "bitchess-perft v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let start = Instant::now();
    let nodes = if config.divide {
        let counts = game.divide(config.depth);
        for (mv, count) in &counts {
            println!("{}: {count}", game.uci(*mv));
        }
        counts.iter().map(|(_, count)| count).sum()
    } else {
        game.perft(config.depth)
    };
    let elapsed = start.elapsed();

    println!("nodes: {nodes}");
    tracing::info!(
        nodes,
        elapsed_ms = elapsed.as_millis() as u64,
        nps = (nodes as f64 / elapsed.as_secs_f64().max(1e-9)) as u64,
        "perft finished"
    );
}
