//! Game-session state: the live position, repetition tracking, and
//! transactional session persistence.

use std::collections::HashMap;

use thiserror::Error;

use crate::codec::{self, DecodeError, Reader};
use crate::render;
use crate::{GamePosition, Move, Player, Space};

/// A move submitted to [`GameModel::make_move`] that is not legal in the
/// current position.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("move is not legal in the current position")]
pub struct IllegalMove;

/// Tracks the number of times each game position has been reached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionTracker {
    counts: HashMap<u64, u32>,
}

impl PositionTracker {
    /// Number of times the position has been seen with `to_move` next.
    pub fn repetitions(&self, position: GamePosition, to_move: Player) -> u32 {
        self.counts
            .get(&Self::key(position, to_move))
            .copied()
            .unwrap_or(0)
    }

    /// Record a visit to the position.
    pub fn visit(&mut self, position: GamePosition, to_move: Player) {
        *self.counts.entry(Self::key(position, to_move)).or_insert(0) += 1;
    }

    /// Forget all visits, to start a new game.
    pub fn reset(&mut self) {
        self.counts.clear();
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        codec::put_u64(buf, self.counts.len() as u64);
        for (&key, &count) in &self.counts {
            codec::put_u64(buf, key);
            codec::put_u32(buf, count);
        }
    }

    fn decode(reader: &mut Reader) -> Result<PositionTracker, DecodeError> {
        let entries = reader.u64()?;
        let mut counts = HashMap::new();
        for _ in 0..entries {
            let key = reader.u64()?;
            let count = reader.u32()?;
            counts.insert(key, count);
        }
        Ok(PositionTracker { counts })
    }

    // The position id widened to 64 bits, with bit 32 marking black to move.
    fn key(position: GamePosition, to_move: Player) -> u64 {
        let mut key = position.id() as u64;
        if to_move == Player::Black {
            key |= 1 << 32;
        }
        key
    }
}

/// Tracks all the state associated with one game of Queah.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameModel {
    position: GamePosition,
    to_move: Player,
    tracker: PositionTracker,
    half_moves: u32,
}

impl GameModel {
    /// Start a new game. The starting position counts as visited.
    pub fn new() -> GameModel {
        let mut model = GameModel {
            position: GamePosition::START,
            to_move: Player::White,
            tracker: PositionTracker::default(),
            half_moves: 0,
        };
        model.tracker.visit(model.position, model.to_move);
        model
    }

    /// Current game position, relative to the side to move.
    pub fn position(&self) -> GamePosition {
        self.position
    }

    /// Next player to move.
    pub fn to_move(&self) -> Player {
        self.to_move
    }

    /// True if the game is over; the side to move has lost.
    pub fn is_over(&self) -> bool {
        self.position.is_over()
    }

    /// All legal moves in the current position.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.position.moves()
    }

    /// Number of times the current game position has occurred.
    pub fn repetitions(&self) -> u32 {
        self.repetitions_of(self.position, self.to_move)
    }

    /// Number of times an arbitrary game position has occurred.
    pub fn repetitions_of(&self, position: GamePosition, to_move: Player) -> u32 {
        self.tracker.repetitions(position, to_move)
    }

    /// Number of moves completed. Moves are counted like chess: one per
    /// white/black pair.
    pub fn moves_completed(&self) -> u32 {
        (self.half_moves + 1) / 2
    }

    /// The board spaces occupied by `player`'s pieces.
    pub fn pieces(&self, player: Player) -> Vec<Space> {
        let (white, black) = self.position.by_player(self.to_move);
        let state = match player {
            Player::White => white,
            Player::Black => black,
        };
        Space::all().filter(|&space| state.occupies(space)).collect()
    }

    /// The number of pieces `player` holds in reserve.
    pub fn reserve_count(&self, player: Player) -> u8 {
        let (white, black) = self.position.by_player(self.to_move);
        match player {
            Player::White => white.reserve_count(),
            Player::Black => black.reserve_count(),
        }
    }

    /// Validate and apply a move, returning the captured space if any.
    pub fn make_move(&mut self, mov: &Move) -> Result<Option<Space>, IllegalMove> {
        if !self.position.is_legal(mov) {
            return Err(IllegalMove);
        }
        self.position.make_move(mov);
        self.to_move = self.to_move.opponent();
        self.tracker.visit(self.position, self.to_move);
        self.half_moves += 1;
        Ok(mov.capturing)
    }

    /// Reset to the starting position and begin a new game.
    pub fn reset(&mut self) {
        *self = GameModel::new();
    }

    /// Render the current game state as text.
    pub fn to_text(&self) -> String {
        render::to_text(self.position, self.to_move)
    }

    /// Serialize the session to a byte buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        codec::put_u32(&mut buf, self.position.id());
        codec::put_u8(&mut buf, self.to_move as u8);
        self.tracker.encode(&mut buf);
        codec::put_u32(&mut buf, self.half_moves);
        buf
    }

    /// Restore a session from a byte buffer.
    ///
    /// Decoding is all-or-nothing: on malformed or truncated input the call
    /// fails and the receiver is left unmodified.
    pub fn decode(&mut self, buf: &[u8]) -> Result<(), DecodeError> {
        let mut reader = Reader::new(buf);
        let position = GamePosition::from_id(reader.u32()?);
        let to_move =
            Player::from_bits(reader.u8()?).ok_or(DecodeError::InvalidValue("side to move"))?;
        let tracker = PositionTracker::decode(&mut reader)?;
        let half_moves = reader.u32()?;
        reader.finish()?;

        *self = GameModel {
            position,
            to_move,
            tracker,
            half_moves,
        };
        Ok(())
    }
}

impl Default for GameModel {
    fn default() -> Self {
        Self::new()
    }
}
