use crate::engine::STARTING_FEN;

/// Perft driver configuration parsed from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerftConfig {
    /// Position to search from.
    pub fen: String,
    /// Search depth in plies.
    pub depth: u32,
    /// Print node counts per root move.
    pub divide: bool,
    /// Parse the position with Chess960 castling rules.
    pub chess960: bool,
}

impl PerftConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = PerftConfig::default();
        PerftConfig {
            fen: var("PERFT_FEN").unwrap_or(defaults.fen),
            depth: var("PERFT_DEPTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.depth),
            divide: var("PERFT_DIVIDE").map_or(defaults.divide, |v| flag(&v)),
            chess960: var("CHESS960").map_or(defaults.chess960, |v| flag(&v)),
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Default for PerftConfig {
    fn default() -> Self {
        PerftConfig {
            fen: STARTING_FEN.to_string(),
            depth: 4,
            divide: false,
            chess960: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_config() {
        let config = PerftConfig::default();
        assert_eq!(config.fen, STARTING_FEN);
        assert_eq!(config.depth, 4);
        assert!(!config.divide);
        assert!(!config.chess960);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PERFT_FEN", "8/8/8/8/8/8/8/K6k w - - 0 1"),
            ("PERFT_DEPTH", "2"),
            ("PERFT_DIVIDE", "true"),
            ("CHESS960", "1"),
        ]);
        let config = PerftConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.fen, "8/8/8/8/8/8/8/K6k w - - 0 1");
        assert_eq!(config.depth, 2);
        assert!(config.divide);
        assert!(config.chess960);
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = PerftConfig::from_lookup(|key| match key {
            "PERFT_DEPTH" => Some("deep".to_string()),
            "PERFT_DIVIDE" => Some("nope".to_string()),
            _ => None,
        });
        assert_eq!(config.depth, 4);
        assert!(!config.divide);
    }
}
