use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// The two sides in a chess game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Both colors, White first.
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    /// Index for array lookups: White=0, Black=1.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Rank index (0..7) of this side's back rank.
    #[inline]
    pub const fn back_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    /// FEN turn letter.
    pub fn fen_char(self) -> char {
        match self {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }
}

impl std::ops::Not for Color {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// PieceType
// ---------------------------------------------------------------------------

/// The six piece kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceType {
    /// All piece types in lookup priority order.
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    /// Promotion choices, strongest first.
    pub const PROMOTIONS: [PieceType; 4] = [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ];

    /// Number of piece types.
    pub const COUNT: usize = 6;

    /// Index for array lookups: Pawn=0 .. King=5.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase symbol, independent of color.
    pub fn symbol(self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }

    /// Single uppercase letter for white, lowercase for black.
    pub fn to_char(self, color: Color) -> char {
        let c = self.symbol();
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Parse a piece character; the case of the letter gives the color.
    pub fn from_char(c: char) -> Option<(Color, PieceType)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let piece = match c.to_ascii_lowercase() {
            'p' => PieceType::Pawn,
            'n' => PieceType::Knight,
            'b' => PieceType::Bishop,
            'r' => PieceType::Rook,
            'q' => PieceType::Queen,
            'k' => PieceType::King,
            _ => return None,
        };
        Some((color, piece))
    }

    /// Sliding pieces move along rays and can pin.
    #[inline]
    pub fn is_slider(self) -> bool {
        matches!(self, PieceType::Bishop | PieceType::Rook | PieceType::Queen)
    }
}

impl TryFrom<u8> for PieceType {
    type Error = ChessError;

    /// Index 0..5 in [`PieceType::ALL`] order.
    fn try_from(index: u8) -> Result<Self, Self::Error> {
        PieceType::ALL
            .get(index as usize)
            .copied()
            .ok_or(ChessError::InvalidPieceType(index))
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PieceType::Pawn => write!(f, "pawn"),
            PieceType::Knight => write!(f, "knight"),
            PieceType::Bishop => write!(f, "bishop"),
            PieceType::Rook => write!(f, "rook"),
            PieceType::Queen => write!(f, "queen"),
            PieceType::King => write!(f, "king"),
        }
    }
}

// ---------------------------------------------------------------------------
// Piece
// ---------------------------------------------------------------------------

/// A piece with its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub piece_type: PieceType,
    pub color: Color,
}

impl Piece {
    pub const fn new(piece_type: PieceType, color: Color) -> Self {
        Piece { piece_type, color }
    }

    /// FEN letter: uppercase for White, lowercase for Black.
    pub fn symbol(self) -> char {
        self.piece_type.to_char(self.color)
    }

    /// Inverse of [`Piece::symbol`]; only the twelve piece letters are valid.
    pub fn from_symbol(symbol: char) -> Result<Self, ChessError> {
        PieceType::from_char(symbol)
            .map(|(color, piece_type)| Piece { piece_type, color })
            .ok_or(ChessError::InvalidSymbol(symbol))
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Square
// ---------------------------------------------------------------------------

/// A square on the chess board (0..63, LERF: a1=0, h8=63).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square(pub u8);

impl Square {
    pub const NUM: usize = 64;

    pub const A1: Square = Square(0);
    pub const B1: Square = Square(1);
    pub const C1: Square = Square(2);
    pub const D1: Square = Square(3);
    pub const E1: Square = Square(4);
    pub const F1: Square = Square(5);
    pub const G1: Square = Square(6);
    pub const H1: Square = Square(7);
    pub const A8: Square = Square(56);
    pub const B8: Square = Square(57);
    pub const C8: Square = Square(58);
    pub const D8: Square = Square(59);
    pub const E8: Square = Square(60);
    pub const F8: Square = Square(61);
    pub const G8: Square = Square(62);
    pub const H8: Square = Square(63);

    #[inline]
    pub fn new(index: u8) -> Self {
        debug_assert!(index < 64, "Square index out of range: {index}");
        Square(index)
    }

    #[inline]
    pub fn file(self) -> u8 {
        self.0 & 7
    }

    #[inline]
    pub fn rank(self) -> u8 {
        self.0 >> 3
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_file_rank(file: u8, rank: u8) -> Self {
        debug_assert!(file < 8 && rank < 8);
        Square(rank * 8 + file)
    }

    /// Same file, rank mirrored (a1 <-> a8).
    #[inline]
    pub fn flip_vertical(self) -> Self {
        Square(self.0 ^ 0x38)
    }

    /// Chebyshev distance (king steps) between two squares.
    pub fn distance(self, other: Square) -> u8 {
        let df = (self.file() as i8 - other.file() as i8).unsigned_abs();
        let dr = (self.rank() as i8 - other.rank() as i8).unsigned_abs();
        df.max(dr)
    }

    /// All 64 squares, a1 first.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64u8).map(Square)
    }

    /// Parse algebraic notation like "e4".
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        if file < 8 && rank < 8 {
            Some(Square::from_file_rank(file, rank))
        } else {
            None
        }
    }

    /// Convert to algebraic notation like "e4".
    pub fn to_algebraic(self) -> String {
        format!("{}{}", self.file_char(), self.rank_char())
    }

    #[inline]
    pub fn file_char(self) -> char {
        (b'a' + self.file()) as char
    }

    #[inline]
    pub fn rank_char(self) -> char {
        (b'1' + self.rank()) as char
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

impl FromStr for Square {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Square::from_algebraic(s).ok_or_else(|| ChessError::InvalidSquare(s.to_string()))
    }
}

impl TryFrom<String> for Square {
    type Error = ChessError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Square> for String {
    fn from(sq: Square) -> String {
        sq.to_algebraic()
    }
}

// ---------------------------------------------------------------------------
// Bitboard
// ---------------------------------------------------------------------------

/// A 64-bit bitboard, one bit per square.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bitboard(pub u64);

impl Bitboard {
    pub const EMPTY: Bitboard = Bitboard(0);
    pub const ALL: Bitboard = Bitboard(!0u64);

    pub const FILE_A: Bitboard = Bitboard(0x0101_0101_0101_0101);
    pub const FILE_H: Bitboard = Bitboard(0x8080_8080_8080_8080);
    pub const RANK_1: Bitboard = Bitboard(0x0000_0000_0000_00ff);
    pub const RANK_8: Bitboard = Bitboard(0xff00_0000_0000_0000);
    pub const BACKRANKS: Bitboard = Bitboard(Self::RANK_1.0 | Self::RANK_8.0);
    pub const CORNERS: Bitboard = Bitboard(0x8100_0000_0000_0081);
    pub const LIGHT_SQUARES: Bitboard = Bitboard(0x55aa_55aa_55aa_55aa);
    pub const DARK_SQUARES: Bitboard = Bitboard(0xaa55_aa55_aa55_aa55);

    /// All squares on the given rank (0..7).
    #[inline]
    pub const fn rank(rank: u8) -> Bitboard {
        Bitboard(0xffu64 << (8 * rank as u32))
    }

    /// All squares on the given file (0..7).
    #[inline]
    pub const fn file(file: u8) -> Bitboard {
        Bitboard(Self::FILE_A.0 << file as u32)
    }

    #[inline]
    pub fn from_square(sq: Square) -> Self {
        Bitboard(1u64 << sq.0)
    }

    #[inline]
    pub fn is_set(self, sq: Square) -> bool {
        self.0 & (1u64 << sq.0) != 0
    }

    #[inline]
    pub fn set(&mut self, sq: Square) {
        self.0 |= 1u64 << sq.0;
    }

    #[inline]
    pub fn clear(&mut self, sq: Square) {
        self.0 &= !(1u64 << sq.0);
    }

    #[inline]
    pub fn pop_count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_not_empty(self) -> bool {
        self.0 != 0
    }

    /// True when at least two bits are set.
    #[inline]
    pub fn more_than_one(self) -> bool {
        self.0 & self.0.wrapping_sub(1) != 0
    }

    /// Least significant bit index (first set square).
    #[inline]
    pub fn lsb(self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            Some(Square(self.0.trailing_zeros() as u8))
        }
    }

    /// Most significant bit index (last set square).
    #[inline]
    pub fn msb(self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            Some(Square(63 - self.0.leading_zeros() as u8))
        }
    }

    /// Pop the least significant bit, returning the square.
    #[inline]
    pub fn pop_lsb(&mut self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            let sq = Square(self.0.trailing_zeros() as u8);
            self.0 &= self.0 - 1; // clear LSB
            Some(sq)
        }
    }

    /// Pop the most significant bit, returning the square.
    #[inline]
    pub fn pop_msb(&mut self) -> Option<Square> {
        let sq = self.msb()?;
        self.clear(sq);
        Some(sq)
    }

    /// Iterate over all set bit positions as `Square`s, a1 first.
    #[inline]
    pub fn iter(self) -> BitboardIter {
        BitboardIter(self)
    }

    /// Iterate over all set bit positions, h8 first.
    #[inline]
    pub fn iter_rev(self) -> BitboardRevIter {
        BitboardRevIter(self)
    }
}

/// Iterator over set bits in a `Bitboard`.
pub struct BitboardIter(Bitboard);

impl Iterator for BitboardIter {
    type Item = Square;

    #[inline]
    fn next(&mut self) -> Option<Square> {
        self.0.pop_lsb()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.0.pop_count() as usize;
        (count, Some(count))
    }
}

impl ExactSizeIterator for BitboardIter {}

/// Most-significant-first iterator over set bits.
pub struct BitboardRevIter(Bitboard);

impl Iterator for BitboardRevIter {
    type Item = Square;

    #[inline]
    fn next(&mut self) -> Option<Square> {
        self.0.pop_msb()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.0.pop_count() as usize;
        (count, Some(count))
    }
}

impl ExactSizeIterator for BitboardRevIter {}

impl From<Square> for Bitboard {
    #[inline]
    fn from(sq: Square) -> Self {
        Bitboard::from_square(sq)
    }
}

impl FromIterator<Square> for Bitboard {
    fn from_iter<I: IntoIterator<Item = Square>>(iter: I) -> Self {
        let mut bb = Bitboard::EMPTY;
        for sq in iter {
            bb.set(sq);
        }
        bb
    }
}

impl std::ops::BitAnd for Bitboard {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Bitboard(self.0 & rhs.0)
    }
}

impl std::ops::BitOr for Bitboard {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Bitboard(self.0 | rhs.0)
    }
}

impl std::ops::BitXor for Bitboard {
    type Output = Self;
    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Bitboard(self.0 ^ rhs.0)
    }
}

impl std::ops::Not for Bitboard {
    type Output = Self;
    #[inline]
    fn not(self) -> Self {
        Bitboard(!self.0)
    }
}

impl std::ops::Shl<u32> for Bitboard {
    type Output = Self;
    #[inline]
    fn shl(self, rhs: u32) -> Self {
        Bitboard(self.0 << rhs)
    }
}

impl std::ops::Shr<u32> for Bitboard {
    type Output = Self;
    #[inline]
    fn shr(self, rhs: u32) -> Self {
        Bitboard(self.0 >> rhs)
    }
}

impl std::ops::BitAndAssign for Bitboard {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl std::ops::BitOrAssign for Bitboard {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitXorAssign for Bitboard {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bitboard(0x{:016x})", self.0)?;
        for rank in (0..8).rev() {
            write!(f, "  {} ", rank + 1)?;
            for file in 0..8 {
                let sq = Square::from_file_rank(file, rank);
                write!(f, "{}", if self.is_set(sq) { '1' } else { '.' })?;
                if file < 7 {
                    write!(f, " ")?;
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "    a b c d e f g h")
    }
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// A move: from-square, to-square, optional promotion, optional drop.
///
/// Castling is stored king-to-destination (e1g1) in standard chess and
/// king-to-rook (e1h1) in Chess960. `Move::null()` (a1a1, nothing else set)
/// is the null move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>,
    pub drop: Option<PieceType>,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Move {
            from,
            to,
            promotion: None,
            drop: None,
        }
    }

    pub fn with_promotion(from: Square, to: Square, promotion: PieceType) -> Self {
        Move {
            from,
            to,
            promotion: Some(promotion),
            drop: None,
        }
    }

    /// A piece dropped onto `to` (from == to).
    pub fn new_drop(piece_type: PieceType, to: Square) -> Self {
        Move {
            from: to,
            to,
            promotion: None,
            drop: Some(piece_type),
        }
    }

    /// The null move, `0000` in UCI.
    pub const fn null() -> Self {
        Move {
            from: Square(0),
            to: Square(0),
            promotion: None,
            drop: None,
        }
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.from.0 == 0 && self.to.0 == 0 && self.promotion.is_none() && self.drop.is_none()
    }

    /// UCI text: `e2e4`, `e7e8q`, `N@f3` or `0000`.
    pub fn uci(self) -> String {
        if let Some(drop) = self.drop {
            format!("{}@{}", drop.to_char(Color::White), self.to)
        } else if let Some(promotion) = self.promotion {
            format!("{}{}{}", self.from, self.to, promotion.symbol())
        } else if self.is_null() {
            "0000".to_string()
        } else {
            format!("{}{}", self.from, self.to)
        }
    }

    /// Parse UCI text. Rejects `from == to` except for the literal `0000`.
    pub fn from_uci(uci: &str) -> Result<Self, ChessError> {
        let invalid = |reason: &str| ChessError::InvalidUci {
            uci: uci.to_string(),
            reason: reason.to_string(),
        };

        if uci == "0000" {
            return Ok(Move::null());
        }
        if !uci.is_ascii() {
            return Err(invalid("non-ascii characters"));
        }

        let bytes = uci.as_bytes();
        if bytes.len() == 4 && bytes[1] == b'@' {
            let (_, piece_type) = PieceType::from_char(bytes[0] as char)
                .ok_or_else(|| invalid("unknown drop piece"))?;
            let to = Square::from_algebraic(&uci[2..]).ok_or_else(|| invalid("bad square"))?;
            return Ok(Move::new_drop(piece_type, to));
        }

        if !(4..=5).contains(&bytes.len()) {
            return Err(invalid("expected 4 or 5 characters"));
        }
        let from = Square::from_algebraic(&uci[0..2]).ok_or_else(|| invalid("bad source square"))?;
        let to = Square::from_algebraic(&uci[2..4]).ok_or_else(|| invalid("bad target square"))?;
        let promotion = match bytes.get(4) {
            None => None,
            Some(&c) => match PieceType::from_char(c as char) {
                Some((Color::Black, pt)) if pt != PieceType::Pawn => Some(pt),
                _ => return Err(invalid("bad promotion piece")),
            },
        };
        if from == to {
            return Err(invalid("source equals target (use 0000 for null moves)"));
        }

        Ok(Move {
            from,
            to,
            promotion,
            drop: None,
        })
    }

    /// Compact key: `to | from << 6 | promotion << 12` (knight=1 .. king=5, 0 = none).
    pub fn encode(self) -> u16 {
        let promotion = self.promotion.map_or(0, |pt| pt.index() as u16);
        self.to.0 as u16 | (self.from.0 as u16) << 6 | promotion << 12
    }

    /// Inverse of [`Move::encode`].
    pub fn decode(raw: u16) -> Result<Self, ChessError> {
        let to = Square((raw & 0x3f) as u8);
        let from = Square(((raw >> 6) & 0x3f) as u8);
        let promotion = match ((raw >> 12) & 0x7) as u8 {
            0 => None,
            code => Some(PieceType::try_from(code)?),
        };
        // Only the all-zero key is the null move.
        if from == to && raw != 0 {
            return Err(ChessError::InvalidUci {
                uci: format!("{raw:#06x}"),
                reason: "source equals target (use 0 for null moves)".to_string(),
            });
        }
        Ok(Move {
            from,
            to,
            promotion,
            drop: None,
        })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uci())
    }
}

impl FromStr for Move {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Move::from_uci(s)
    }
}

impl TryFrom<String> for Move {
    type Error = ChessError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Move::from_uci(&s)
    }
}

impl From<Move> for String {
    fn from(mv: Move) -> String {
        mv.uci()
    }
}

// ---------------------------------------------------------------------------
// ChessError
// ---------------------------------------------------------------------------

/// Domain errors for the chess engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChessError {
    #[error("invalid piece symbol: {0:?}")]
    InvalidSymbol(char),

    #[error("invalid piece type index: {0}")]
    InvalidPieceType(u8),

    #[error("invalid square notation: {0}")]
    InvalidSquare(String),

    #[error("invalid uci {uci:?}: {reason}")]
    InvalidUci { uci: String, reason: String },

    #[error("invalid FEN {fen:?}: {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("invalid castling fen: {0:?}")]
    InvalidCastling(String),

    #[error("invalid EPD: {0}")]
    InvalidEpd(String),

    #[error("invalid san: {0:?}")]
    InvalidSan(String),

    #[error("chess960 position index out of range: {0}")]
    InvalidChess960Position(u32),

    #[error("illegal move {mv} in {fen}")]
    IllegalMove { mv: String, fen: String },

    #[error("ambiguous move {mv} in {fen}")]
    AmbiguousMove { mv: String, fen: String },

    #[error("unsupported multi-leg move: {0:?}")]
    UnsupportedMove(String),

    #[error("no moves on the stack")]
    EmptyHistory,

    #[error("occupied square {0} has no piece type")]
    PieceTypeMismatch(Square),
}

impl ChessError {
    pub(crate) fn fen(fen: &str, reason: impl Into<String>) -> Self {
        ChessError::InvalidFen {
            fen: fen.to_string(),
            reason: reason.into(),
        }
    }

    /// Malformed text input, rejected before any mutation.
    pub fn is_invalid_format(&self) -> bool {
        matches!(
            self,
            ChessError::InvalidSymbol(_)
                | ChessError::InvalidPieceType(_)
                | ChessError::InvalidSquare(_)
                | ChessError::InvalidUci { .. }
                | ChessError::InvalidFen { .. }
                | ChessError::InvalidCastling(_)
                | ChessError::InvalidEpd(_)
                | ChessError::InvalidSan(_)
                | ChessError::InvalidChess960Position(_)
        )
    }

    /// Well-formed move text that does not name exactly one legal move.
    pub fn is_illegal_move(&self) -> bool {
        matches!(
            self,
            ChessError::IllegalMove { .. }
                | ChessError::AmbiguousMove { .. }
                | ChessError::UnsupportedMove(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
