//! Extended Position Description: the first four FEN fields followed by
//! `opcode operand;` operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::fen::EnPassantMode;
use crate::engine::game::GameState;
use crate::engine::types::{ChessError, Move};

/// Value attached to an EPD opcode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EpdOperand {
    /// Opcode without operand.
    None,
    String(String),
    Int(i64),
    /// Must be finite.
    Float(f64),
    /// Written and parsed as SAN.
    Move(Move),
    /// `pv` (a line of play), `am` and `bm` (alternatives).
    MoveList(Vec<Move>),
}

/// EPD operations keyed by opcode.
pub type EpdOperations = BTreeMap<String, EpdOperand>;

/// Operand for an opcode written without one.
fn empty_operand(opcode: &str) -> EpdOperand {
    if matches!(opcode, "pv" | "am" | "bm") {
        EpdOperand::MoveList(Vec::new())
    } else {
        EpdOperand::None
    }
}

fn escape(operand: &str) -> String {
    let mut out = String::with_capacity(operand.len() + 2);
    for ch in operand.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

impl GameState {
    /// EPD of the position without operations.
    pub fn epd(&self) -> String {
        self.epd_position(false, EnPassantMode::Legal, false)
    }

    /// EPD with operations appended in opcode order.
    ///
    /// Moves are written as SAN against this position; a `pv` list is a
    /// line of play, `am`/`bm` lists are alternatives and come out sorted.
    pub fn epd_with_operations(&self, operations: &EpdOperations) -> Result<String, ChessError> {
        let mut epd = self.epd();
        if operations.is_empty() {
            return Ok(epd);
        }

        let mut scratch = self.copy_with_stack(0);
        let mut ops = Vec::with_capacity(operations.len());

        for (opcode, operand) in operations {
            if opcode == "-" {
                return Err(ChessError::InvalidEpd("dash (-) is not a valid epd opcode".into()));
            }
            if opcode.is_empty() || opcode.contains([' ', '\n', '\t', '\r']) {
                return Err(ChessError::InvalidEpd(format!("invalid epd opcode: {opcode:?}")));
            }

            let mut op = opcode.clone();
            match operand {
                EpdOperand::None => {}
                EpdOperand::Move(mv) => {
                    op.push(' ');
                    op.push_str(&scratch.san(*mv)?);
                }
                EpdOperand::Int(n) => {
                    op.push(' ');
                    op.push_str(&n.to_string());
                }
                EpdOperand::Float(f) => {
                    if !f.is_finite() {
                        return Err(ChessError::InvalidEpd(format!(
                            "expected finite float for epd operation {opcode:?}, got {f}"
                        )));
                    }
                    op.push(' ');
                    op.push_str(&format!("{f:?}"));
                }
                EpdOperand::MoveList(moves) if opcode == "pv" => {
                    let mut line = scratch.copy_with_stack(0);
                    for &mv in moves {
                        op.push(' ');
                        op.push_str(&line.san_and_push(mv)?);
                    }
                }
                EpdOperand::MoveList(moves) => {
                    let mut sans = moves
                        .iter()
                        .map(|&mv| scratch.san(mv))
                        .collect::<Result<Vec<_>, _>>()?;
                    if matches!(opcode.as_str(), "am" | "bm") {
                        sans.sort();
                    }
                    for san in sans {
                        op.push(' ');
                        op.push_str(&san);
                    }
                }
                EpdOperand::String(text) => {
                    op.push_str(" \"");
                    op.push_str(&escape(text));
                    op.push('"');
                }
            }
            op.push(';');
            ops.push(op);
        }

        epd.push(' ');
        epd.push_str(&ops.join(" "));
        Ok(epd)
    }

    /// Parse an EPD.  `hmvc` and `fmvn` operations set the clocks.
    pub fn from_epd(epd: &str, chess960: bool) -> Result<(Self, EpdOperations), ChessError> {
        let mut state = GameState::empty();
        state.chess960 = chess960;
        let operations = state.set_epd(epd)?;
        Ok((state, operations))
    }

    /// Replace the position with the one described by `epd` and return
    /// its operations.  Nothing changes if the EPD is rejected.
    pub fn set_epd(&mut self, epd: &str) -> Result<EpdOperations, ChessError> {
        let epd = epd.trim();
        let epd = epd.strip_suffix(';').unwrap_or(epd);

        let mut parts: Vec<&str> = Vec::with_capacity(5);
        let mut rest = epd;
        while parts.len() < 4 {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            parts.push(&rest[..end]);
            rest = &rest[end..];
        }
        let rest = rest.trim_start();

        if rest.is_empty() {
            self.set_fen(epd)?;
            return Ok(EpdOperations::new());
        }

        let position = parts.join(" ");
        let operations = parse_operations(rest, || {
            GameState::from_fen(&format!("{position} 0 1"), self.chess960)
        })?;

        let clock = |opcode: &str, default: &str| -> Result<String, ChessError> {
            match operations.get(opcode) {
                None => Ok(default.to_string()),
                Some(EpdOperand::Int(n)) => Ok(n.to_string()),
                Some(EpdOperand::Float(f)) => Ok((f.trunc() as i64).to_string()),
                Some(EpdOperand::String(s)) => Ok(s.clone()),
                Some(other) => Err(ChessError::InvalidEpd(format!(
                    "invalid {opcode} operand: {other:?}"
                ))),
            }
        };
        let fen = format!("{position} {} {}", clock("hmvc", "0")?, clock("fmvn", "1")?);

        self.set_fen(&fen)?;
        debug!(epd, operations = operations.len(), "position set from epd");
        Ok(operations)
    }
}

#[derive(Clone, Copy)]
enum OpState {
    Opcode,
    AfterOpcode,
    Numeric,
    String,
    StringEscape,
    San,
}

/// Parse the operation section of an EPD.  `make_board` builds the
/// position SAN operands are resolved against, on first use.
fn parse_operations<F>(operation_part: &str, make_board: F) -> Result<EpdOperations, ChessError>
where
    F: Fn() -> Result<GameState, ChessError>,
{
    let mut operations = EpdOperations::new();
    let mut state = OpState::Opcode;
    let mut opcode = String::new();
    let mut operand = String::new();
    let mut position: Option<GameState> = None;

    for ch in operation_part.chars().map(Some).chain(std::iter::once(None)) {
        let at_end = matches!(ch, None | Some(';'));
        let blank = matches!(ch, Some(' ' | '\t' | '\r' | '\n'));

        match state {
            OpState::Opcode => {
                if blank || at_end {
                    if opcode == "-" {
                        opcode.clear();
                    } else if !opcode.is_empty() {
                        if blank {
                            state = OpState::AfterOpcode;
                        } else {
                            let operand = empty_operand(&opcode);
                            operations.insert(std::mem::take(&mut opcode), operand);
                        }
                    }
                } else if let Some(ch) = ch {
                    opcode.push(ch);
                }
            }
            OpState::AfterOpcode => match ch {
                _ if blank => {}
                Some('"') => state = OpState::String,
                None | Some(';') => {
                    let operand = empty_operand(&opcode);
                    operations.insert(std::mem::take(&mut opcode), operand);
                    state = OpState::Opcode;
                }
                Some(ch) if ch == '+' || ch == '-' || ch == '.' || ch.is_ascii_digit() => {
                    operand = ch.to_string();
                    state = OpState::Numeric;
                }
                Some(ch) => {
                    operand = ch.to_string();
                    state = OpState::San;
                }
            },
            OpState::Numeric => match ch {
                None | Some(';') => {
                    let value = parse_numeric(&opcode, &operand)?;
                    operations.insert(std::mem::take(&mut opcode), value);
                    operand.clear();
                    state = OpState::Opcode;
                }
                Some(ch) => operand.push(ch),
            },
            OpState::String => match ch {
                None | Some('"') => {
                    operations.insert(std::mem::take(&mut opcode), EpdOperand::String(std::mem::take(&mut operand)));
                    state = OpState::Opcode;
                }
                Some('\\') => state = OpState::StringEscape,
                Some(ch) => operand.push(ch),
            },
            OpState::StringEscape => match ch {
                None => {
                    operations.insert(std::mem::take(&mut opcode), EpdOperand::String(std::mem::take(&mut operand)));
                    state = OpState::Opcode;
                }
                Some(ch) => {
                    operand.push(match ch {
                        'r' => '\r',
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    state = OpState::String;
                }
            },
            OpState::San => match ch {
                None | Some(';') => {
                    let mut board = match position.take() {
                        Some(board) => board,
                        None => make_board()?,
                    };
                    let value = parse_san_operand(&mut board, &opcode, &operand);
                    position = Some(board);
                    let value = value?;
                    operations.insert(std::mem::take(&mut opcode), value);
                    operand.clear();
                    state = OpState::Opcode;
                }
                Some(ch) => operand.push(ch),
            },
        }
    }

    Ok(operations)
}

fn parse_numeric(opcode: &str, operand: &str) -> Result<EpdOperand, ChessError> {
    let invalid = || ChessError::InvalidEpd(format!("invalid numeric operand for epd operation {opcode:?}: {operand:?}"));
    let operand = operand.trim();

    if operand.contains(['.', 'e', 'E']) {
        let parsed: f64 = operand.parse().map_err(|_| invalid())?;
        if !parsed.is_finite() {
            return Err(invalid());
        }
        Ok(EpdOperand::Float(parsed))
    } else {
        Ok(EpdOperand::Int(operand.parse().map_err(|_| invalid())?))
    }
}

fn parse_san_operand(board: &mut GameState, opcode: &str, operand: &str) -> Result<EpdOperand, ChessError> {
    match opcode {
        "pv" => {
            let mut variation = Vec::new();
            let mut result = Ok(());
            for token in operand.split_whitespace() {
                match board.push_xboard(token) {
                    Ok(mv) => variation.push(mv),
                    Err(err) => {
                        result = Err(err);
                        break;
                    }
                }
            }
            // Back to the root position for the next operand.
            while board.pop().is_ok() {}
            result.map(|()| EpdOperand::MoveList(variation))
        }
        "am" | "bm" => operand
            .split_whitespace()
            .map(|token| board.parse_xboard(token))
            .collect::<Result<Vec<_>, _>>()
            .map(EpdOperand::MoveList),
        _ => board.parse_xboard(operand.trim()).map(EpdOperand::Move),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
