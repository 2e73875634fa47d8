//! Shared game vocabulary: identifiers, marks, board, statuses.
//!
//! These types are used by the match engine for its state and by the wire
//! structures in [`crate::message`], so they serialize to exactly the
//! strings clients see.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Prefix shared by every bot player id.
pub const BOT_ID_PREFIX: &str = "bot:";

/// A unique identifier for a player.
///
/// Ids are opaque strings minted by the server. Bot players use
/// `bot:<match id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id of the bot seated in `match_id`.
    pub fn bot_for(match_id: &MatchId) -> Self {
        Self(format!("{BOT_ID_PREFIX}{match_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_bot(&self) -> bool {
        self.0.starts_with(BOT_ID_PREFIX)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A unique identifier for a match: ten characters from `A-Z0-9`.
///
/// Players type these codes to join private matches, so lookups are
/// case-insensitive: [`MatchId::normalized`] upper-cases client input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    /// Length of server-minted match ids.
    pub const LEN: usize = 10;
    /// Characters server-minted match ids are drawn from.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds an id from client input, trimming and upper-casing it.
    pub fn normalized(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// Mark and Outcome
// ---------------------------------------------------------------------------

/// A player's symbol. `X` always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// The other mark.
    pub fn opponent(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mark {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Self::X),
            "O" => Ok(Self::O),
            other => Err(ProtocolError::InvalidValue {
                field: "mark",
                value: other.to_owned(),
            }),
        }
    }
}

/// How a finished match ended. Ties travel as `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win(Mark),
    Tie,
}

impl Outcome {
    pub const TIE_TOKEN: &'static str = "-";

    pub fn winner(self) -> Option<Mark> {
        match self {
            Self::Win(mark) => Some(mark),
            Self::Tie => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win(mark) => f.write_str(mark.as_str()),
            Self::Tie => f.write_str(Self::TIE_TOKEN),
        }
    }
}

impl FromStr for Outcome {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::TIE_TOKEN {
            return Ok(Self::Tie);
        }
        s.parse::<Mark>()
            .map(Self::Win)
            .map_err(|_| ProtocolError::InvalidValue {
                field: "winner",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// The 3x3 grid, indexed 0..9 row by row.
///
/// ```text
///  0 | 1 | 2
/// ---+---+---
///  3 | 4 | 5
/// ---+---+---
///  6 | 7 | 8
/// ```
///
/// On the wire a board is an array of nine strings, `""` for an empty
/// cell. [`FromStr`] accepts a compact nine-character form (`X`, `O`, and
/// `.` for empty) which is handy for fixtures: `"XX.OO...."`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Board([Option<Mark>; Board::CELLS]);

impl Board {
    pub const CELLS: usize = 9;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [Option<Mark>; Self::CELLS]) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[Option<Mark>; Self::CELLS] {
        &self.0
    }

    /// The content of `cell`, or `None` for an empty or out-of-range cell.
    pub fn get(&self, cell: usize) -> Option<Mark> {
        self.0.get(cell).copied().flatten()
    }

    pub fn is_free(&self, cell: usize) -> bool {
        cell < Self::CELLS && self.0[cell].is_none()
    }

    /// Writes `mark` into `cell`. Callers check range and occupancy first.
    pub fn place(&mut self, cell: usize, mark: Mark) {
        self.0[cell] = Some(mark);
    }

    pub fn free_cells(&self) -> impl Iterator<Item = usize> + '_ {
        (0..Self::CELLS).filter(|&i| self.0[i].is_none())
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }
}

impl TryFrom<Vec<String>> for Board {
    type Error = ProtocolError;

    fn try_from(raw: Vec<String>) -> Result<Self, Self::Error> {
        if raw.len() != Self::CELLS {
            return Err(ProtocolError::InvalidValue {
                field: "board",
                value: format!("{} cells", raw.len()),
            });
        }
        let mut cells = [None; Self::CELLS];
        for (slot, value) in cells.iter_mut().zip(&raw) {
            if !value.is_empty() {
                *slot = Some(value.parse()?);
            }
        }
        Ok(Self(cells))
    }
}

impl From<Board> for Vec<String> {
    fn from(board: Board) -> Self {
        board
            .0
            .iter()
            .map(|cell| cell.map(|m| m.as_str()).unwrap_or("").to_owned())
            .collect()
    }
}

impl FromStr for Board {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidValue {
            field: "board",
            value: s.to_owned(),
        };
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != Self::CELLS {
            return Err(invalid());
        }
        let mut cells = [None; Self::CELLS];
        for (slot, c) in cells.iter_mut().zip(chars) {
            *slot = match c {
                'X' => Some(Mark::X),
                'O' => Some(Mark::O),
                '.' => None,
                _ => return Err(invalid()),
            };
        }
        Ok(Self(cells))
    }
}

// ---------------------------------------------------------------------------
// MatchStatus, MatchKind, Difficulty
// ---------------------------------------------------------------------------

/// Lifecycle of a match.
///
/// ```text
/// Waiting ──(second seat filled)──► Ongoing ──(win or tie)──► Finished
/// ```
///
/// Matches created already full (bot matches, rematches) start in
/// `Ongoing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    Ongoing,
    Finished,
}

impl MatchStatus {
    /// Can a second player take a seat?
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Are moves accepted?
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Ongoing)
    }

    /// Returns the next status in the normal lifecycle.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Ongoing),
            Self::Ongoing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Checks if transitioning to `target` is valid.
    pub fn can_transition_to(&self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Ongoing => "ongoing",
            Self::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Who may join a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    /// Listed in the matchmaking queue.
    #[serde(rename = "public")]
    Public,
    /// Joined only by sharing the match id.
    #[serde(rename = "private")]
    Private,
    /// One human against the server's bot.
    #[serde(rename = "with-bot")]
    WithBot,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::WithBot => "with-bot",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "with-bot" => Ok(Self::WithBot),
            other => Err(ProtocolError::InvalidValue {
                field: "type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Bot strength. Only meaningful for [`MatchKind::WithBot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Hard,
    Invincible,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Easy => "easy",
            Self::Hard => "hard",
            Self::Invincible => "invincible",
        };
        f.write_str(s)
    }
}

impl FromStr for Difficulty {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "hard" => Ok(Self::Hard),
            "invincible" => Ok(Self::Invincible),
            other => Err(ProtocolError::InvalidValue {
                field: "difficulty",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Empty-string fields
// ---------------------------------------------------------------------------

/// Serde adapter for optional fields that travel as `""` when unset.
///
/// Use with `#[serde(default, with = "crate::types::empty_as_none")]`.
/// Reading accepts a missing field, `null`, or `""` as `None`.
pub(crate) mod empty_as_none {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some).map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_player_id_bot_for_match() {
        let id = PlayerId::bot_for(&MatchId::new("ABC123XYZ0"));
        assert_eq!(id.as_str(), "bot:ABC123XYZ0");
        assert!(id.is_bot());
        assert!(!PlayerId::new("human").is_bot());
    }

    #[test]
    fn test_match_id_normalized_uppercases_and_trims() {
        assert_eq!(MatchId::normalized(" ab12cd34ef "), MatchId::new("AB12CD34EF"));
    }

    // =====================================================================
    // Mark / Outcome
    // =====================================================================

    #[test]
    fn test_mark_opponent_flips() {
        assert_eq!(Mark::X.opponent(), Mark::O);
        assert_eq!(Mark::O.opponent(), Mark::X);
    }

    #[test]
    fn test_mark_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Mark::X).unwrap(), "\"X\"");
    }

    #[test]
    fn test_outcome_tie_displays_as_dash() {
        assert_eq!(Outcome::Tie.to_string(), "-");
        assert_eq!("-".parse::<Outcome>().unwrap(), Outcome::Tie);
        assert_eq!("O".parse::<Outcome>().unwrap(), Outcome::Win(Mark::O));
        assert!("Z".parse::<Outcome>().is_err());
    }

    // =====================================================================
    // Board
    // =====================================================================

    #[test]
    fn test_board_serializes_empty_cells_as_empty_strings() {
        let board: Board = "X...O....".parse().unwrap();
        let json = serde_json::to_value(board).unwrap();
        assert_eq!(json, serde_json::json!(["X", "", "", "", "O", "", "", "", ""]));
    }

    #[test]
    fn test_board_deserializes_from_wire_array() {
        let board: Board =
            serde_json::from_str(r#"["X","X","X","","O","","","O",""]"#).unwrap();
        assert_eq!(board, "XXX.O..O.".parse().unwrap());
    }

    #[test]
    fn test_board_rejects_wrong_cell_count() {
        let result: Result<Board, _> = serde_json::from_str(r#"["X",""]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_board_rejects_unknown_symbol() {
        let result: Result<Board, _> =
            serde_json::from_str(r#"["Q","","","","","","","",""]"#);
        assert!(result.is_err());
        assert!("XX?......".parse::<Board>().is_err());
    }

    #[test]
    fn test_board_free_cells_and_full() {
        let board: Board = "XOXOXOX..".parse().unwrap();
        assert_eq!(board.free_cells().collect::<Vec<_>>(), vec![7, 8]);
        assert!(!board.is_full());
        assert!(board.is_free(8));
        assert!(!board.is_free(0));
        assert!(!board.is_free(9));
        assert_eq!(board.get(0), Some(Mark::X));
        assert_eq!(board.get(42), None);
    }

    // =====================================================================
    // MatchStatus / MatchKind / Difficulty
    // =====================================================================

    #[test]
    fn test_match_status_lifecycle() {
        assert!(MatchStatus::Waiting.is_joinable());
        assert!(MatchStatus::Ongoing.is_active());
        assert!(MatchStatus::Waiting.can_transition_to(MatchStatus::Ongoing));
        assert!(MatchStatus::Ongoing.can_transition_to(MatchStatus::Finished));
        assert!(!MatchStatus::Finished.can_transition_to(MatchStatus::Waiting));
        assert!(!MatchStatus::Waiting.can_transition_to(MatchStatus::Finished));
        assert_eq!(MatchStatus::Finished.next(), None);
    }

    #[test]
    fn test_match_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MatchStatus::Ongoing).unwrap(), "\"ongoing\"");
    }

    #[test]
    fn test_match_kind_with_bot_uses_hyphen() {
        assert_eq!(serde_json::to_string(&MatchKind::WithBot).unwrap(), "\"with-bot\"");
        assert_eq!("with-bot".parse::<MatchKind>().unwrap(), MatchKind::WithBot);
        assert!("solo".parse::<MatchKind>().is_err());
    }

    #[test]
    fn test_difficulty_defaults_to_easy() {
        assert_eq!(Difficulty::default(), Difficulty::Easy);
        assert_eq!("invincible".parse::<Difficulty>().unwrap(), Difficulty::Invincible);
    }
}
