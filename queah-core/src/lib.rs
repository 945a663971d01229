//! Queah game logic with bit-packed board representation.
//!
//! # Board
//!
//! Queah is played on the 13 dark squares of a 5x5 checkerboard:
//!
//! ```text
//! 12   11   10
//!    9    8
//!  7    6    5
//!    4    3
//!  2    1    0
//! ```
//!
//! Each space has up to four diagonal neighbors, indexed by direction:
//!
//! ```text
//!  2   3
//!    X
//!  1   0
//! ```
//!
//! # Player State Encoding (16-bit)
//!
//! ```text
//! Bits 0-12:  occupancy (one bit per space)
//! Bits 13-15: pieces in reserve (0-6)
//! ```
//!
//! # Position Encoding (32-bit)
//!
//! ```text
//! Bits 16-31: attacker (side to move) player state
//! Bits 0-15:  defender player state
//! ```
//!
//! A position is always stored relative to the side to move; applying a move
//! swaps the roles. The 32-bit id is the position's identity and sort key.

mod codec;
pub mod eval;
pub mod model;
pub mod render;

pub use codec::DecodeError;
pub use eval::{Evaluator, PositionValue, TableLoadError, Value, MAX_VALUE};
pub use model::{GameModel, IllegalMove, PositionTracker};

/// Number of spaces on the board.
pub const NUM_SPACES: usize = 13;
/// Number of move directions out of a space.
pub const NUM_DIRECTIONS: usize = 4;
/// Most pieces a player may have on the board at once.
pub const MAX_ON_BOARD: u32 = 4;
/// Pieces each player starts with in reserve.
pub const MAX_IN_RESERVE: u8 = 6;

const BOARD_MASK: u16 = (1u16 << NUM_SPACES) - 1;

// Starting occupancy: white holds the spaces nearest the bottom-right corner,
// black the point-symmetric spaces at the top.
const START_WHITE: u16 = 0b0000000011011; // spaces 0, 1, 3, 4
const START_BLACK: u16 = 0b1101100000000; // spaces 8, 9, 11, 12

/// Player identifier. White moves first.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Player {
    White = 0,
    Black = 1,
}

impl Player {
    /// Get the opponent player.
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::White => Player::Black,
            Player::Black => Player::White,
        }
    }

    /// Convert from u8 (0 or 1) to Player.
    #[inline]
    pub fn from_bits(bits: u8) -> Option<Player> {
        match bits {
            0 => Some(Player::White),
            1 => Some(Player::Black),
            _ => None,
        }
    }
}

/// One of the 13 board spaces.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Space(pub u8);

impl Space {
    /// Check if this is a valid space index (0-12).
    #[inline]
    pub fn is_valid(self) -> bool {
        (self.0 as usize) < NUM_SPACES
    }

    /// Iterate over all 13 spaces.
    pub fn all() -> impl Iterator<Item = Space> {
        (0..NUM_SPACES as u8).map(Space)
    }

    #[inline]
    fn bit(self) -> u16 {
        1 << self.0
    }
}

// ============================================================================
// BOARD GEOMETRY - Static adjacency, jump, and symmetry tables
// ============================================================================

/// The neighboring spaces of a space in one direction.
#[derive(Clone, Copy, Debug)]
pub struct Neighbor {
    /// The adjacent space, if the board continues in that direction.
    pub adjacent: Option<Space>,
    /// The space two steps away, landed on when jumping over `adjacent`.
    pub jump_to: Option<Space>,
}

const fn nb(adjacent: i8, jump_to: i8) -> Neighbor {
    Neighbor {
        adjacent: if adjacent < 0 { None } else { Some(Space(adjacent as u8)) },
        jump_to: if jump_to < 0 { None } else { Some(Space(jump_to as u8)) },
    }
}

/// Adjacent and jump spaces for every (space, direction) pair.
pub const NEIGHBORS: [[Neighbor; NUM_DIRECTIONS]; NUM_SPACES] = [
    [nb(-1, -1), nb(-1, -1), nb(3, 6), nb(-1, -1)],   //  0
    [nb(-1, -1), nb(-1, -1), nb(4, 7), nb(3, 5)],     //  1
    [nb(-1, -1), nb(-1, -1), nb(-1, -1), nb(4, 6)],   //  2
    [nb(0, -1), nb(1, -1), nb(6, 9), nb(5, -1)],      //  3
    [nb(1, -1), nb(2, -1), nb(7, -1), nb(6, 8)],      //  4
    [nb(-1, -1), nb(3, 1), nb(8, 11), nb(-1, -1)],    //  5
    [nb(3, 0), nb(4, 2), nb(9, 12), nb(8, 10)],       //  6
    [nb(4, 1), nb(-1, -1), nb(-1, -1), nb(9, 11)],    //  7
    [nb(5, -1), nb(6, 4), nb(11, -1), nb(10, -1)],    //  8
    [nb(6, 3), nb(7, -1), nb(12, -1), nb(11, -1)],    //  9
    [nb(-1, -1), nb(8, 6), nb(-1, -1), nb(-1, -1)],   // 10
    [nb(8, 5), nb(9, 7), nb(-1, -1), nb(-1, -1)],     // 11
    [nb(9, 6), nb(-1, -1), nb(-1, -1), nb(-1, -1)],   // 12
];

/// A 1:1 relabeling of the 13 spaces: `table[old] = new`.
pub type Relabeling = [u8; NUM_SPACES];

/// Reflect the board horizontally.
pub const MIRROR: Relabeling = [2, 1, 0, 4, 3, 7, 6, 5, 9, 8, 12, 11, 10];

/// Rotate the board a quarter turn clockwise.
pub const ROTATE: Relabeling = [10, 5, 0, 8, 3, 11, 6, 1, 9, 4, 12, 7, 2];

// ============================================================================
// PLAYER STATE
// ============================================================================

/// One player's pieces: occupancy bitboard plus reserve count, packed into
/// 16 bits.
///
/// The piece-mutating operations do NOT validate beyond `debug_assert!` -
/// move generation only ever proposes valid operations, and violating a
/// precondition is a programming error, not a recoverable condition.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct PlayerState(u16);

impl PlayerState {
    /// Create a state from an occupancy mask and a reserve count.
    pub const fn new(on_board: u16, in_reserve: u8) -> PlayerState {
        PlayerState(on_board | ((in_reserve as u16) << NUM_SPACES))
    }

    /// Rebuild from the packed 16-bit encoding.
    #[inline]
    pub const fn from_bits(bits: u16) -> PlayerState {
        PlayerState(bits)
    }

    /// The packed 16-bit encoding.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Occupancy mask, one bit per space.
    #[inline]
    pub const fn bitboard(self) -> u16 {
        self.0 & BOARD_MASK
    }

    /// Number of pieces on the board.
    #[inline]
    pub const fn board_count(self) -> u32 {
        self.bitboard().count_ones()
    }

    /// Number of pieces still in reserve.
    #[inline]
    pub const fn reserve_count(self) -> u8 {
        (self.0 >> NUM_SPACES) as u8
    }

    /// True if the player may drop a reserve piece onto the board.
    #[inline]
    pub fn can_drop(self) -> bool {
        self.board_count() < MAX_ON_BOARD && self.reserve_count() > 0
    }

    /// True if the player has a piece on `space`.
    #[inline]
    pub fn occupies(self, space: Space) -> bool {
        debug_assert!(space.is_valid());
        self.0 & space.bit() != 0
    }

    /// Move one of the player's pieces to `to`. `from == None` drops a piece
    /// from the reserve.
    pub fn move_piece(&mut self, from: Option<Space>, to: Space) {
        match from {
            None => {
                debug_assert!(self.reserve_count() > 0);
                self.0 -= 1 << NUM_SPACES;
            }
            Some(from) => self.remove(from),
        }
        self.place(to);
    }

    /// Remove the piece on `space`, when it is captured.
    pub fn remove(&mut self, space: Space) {
        debug_assert!(self.occupies(space));
        self.0 &= !space.bit();
    }

    /// Remap the occupancy through a space relabeling; the reserve count is
    /// unchanged.
    pub fn relabeled(self, table: &Relabeling) -> PlayerState {
        let mut dst = PlayerState::new(0, self.reserve_count());
        for space in Space::all() {
            if self.occupies(space) {
                dst.place(Space(table[space.0 as usize]));
            }
        }
        dst
    }

    fn place(&mut self, space: Space) {
        debug_assert!(space.is_valid());
        debug_assert!(!self.occupies(space));
        self.0 |= space.bit();
    }
}

// ============================================================================
// MOVES
// ============================================================================

/// A move in the game. `from == None` drops a piece from the reserve;
/// `capturing` names the defender piece removed by a jump, if any.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Move {
    pub from: Option<Space>,
    pub to: Space,
    pub capturing: Option<Space>,
}

// ============================================================================
// GAME POSITION
// ============================================================================

/// A position in the game, stored relative to the side to move.
///
/// Queah is symmetric with regard to player color, so a position is analyzed
/// as an (attacker, defender) pair without knowing which color moves next.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct GamePosition {
    attacker: PlayerState,
    defender: PlayerState,
}

impl GamePosition {
    /// Starting position: four pieces on the board and six in reserve for
    /// each side.
    pub const START: GamePosition = GamePosition {
        attacker: PlayerState::new(START_WHITE, MAX_IN_RESERVE),
        defender: PlayerState::new(START_BLACK, MAX_IN_RESERVE),
    };

    /// Create a position from the two player states.
    pub const fn new(attacker: PlayerState, defender: PlayerState) -> GamePosition {
        GamePosition { attacker, defender }
    }

    /// Rebuild from the 32-bit id.
    pub const fn from_id(id: u32) -> GamePosition {
        GamePosition {
            attacker: PlayerState::from_bits((id >> 16) as u16),
            defender: PlayerState::from_bits(id as u16),
        }
    }

    /// Integer uniquely identifying this position.
    #[inline]
    pub const fn id(self) -> u32 {
        ((self.attacker.bits() as u32) << 16) | self.defender.bits() as u32
    }

    /// The player with the next move.
    #[inline]
    pub const fn attacker(self) -> PlayerState {
        self.attacker
    }

    /// The player without the next move.
    #[inline]
    pub const fn defender(self) -> PlayerState {
        self.defender
    }

    /// The white and black states, given which color has the move.
    pub fn by_player(self, to_move: Player) -> (PlayerState, PlayerState) {
        match to_move {
            Player::White => (self.attacker, self.defender),
            Player::Black => (self.defender, self.attacker),
        }
    }

    /// True if the game is over: the side to move has no legal move and has
    /// lost.
    pub fn is_over(self) -> bool {
        self.moves().is_empty()
    }

    /// All legal moves from this position.
    ///
    /// Captures are forced: when any capture exists, simple moves are
    /// excluded entirely, though drops stay available alongside captures.
    pub fn moves(self) -> Vec<Move> {
        let mut moves = self.drops();
        let captures = self.captures();
        if captures.is_empty() {
            moves.extend(self.simple_moves());
        } else {
            moves.extend(captures);
        }
        moves
    }

    /// True if the move is allowed from this position.
    pub fn is_legal(self, mov: &Move) -> bool {
        self.moves().contains(mov)
    }

    /// Apply the move and swap roles, so the result is again relative to the
    /// side to move. Does NOT validate - the caller must only submit moves
    /// drawn from [`GamePosition::moves`].
    pub fn make_move(&mut self, mov: &Move) {
        self.attacker.move_piece(mov.from, mov.to);
        if let Some(capturing) = mov.capturing {
            self.defender.remove(capturing);
        }
        std::mem::swap(&mut self.attacker, &mut self.defender);
    }

    /// The result of a move, without changing the receiver.
    pub fn try_move(self, mov: &Move) -> GamePosition {
        let mut result = self;
        result.make_move(mov);
        result
    }

    /// The symmetry-minimal representative of the relabelings of this
    /// position, collapsing boards that are strategically identical under
    /// reflection and rotation. Idempotent.
    pub fn canonical(self) -> GamePosition {
        let mut result = self;
        let mut candidate = self;

        // The three other rotations.
        for _ in 1..NUM_DIRECTIONS {
            candidate = candidate.rotated();
            result = result.min(candidate);
        }

        // The mirror image and its three rotations.
        candidate = candidate.mirrored();
        result = result.min(candidate);
        for _ in 1..NUM_DIRECTIONS {
            candidate = candidate.rotated();
            result = result.min(candidate);
        }

        result
    }

    fn occupied(self, space: Space) -> bool {
        self.attacker.occupies(space) || self.defender.occupies(space)
    }

    // All legal non-capturing moves.
    fn simple_moves(self) -> Vec<Move> {
        let mut result = Vec::new();
        for space in Space::all() {
            if !self.attacker.occupies(space) {
                continue;
            }
            for neighbor in &NEIGHBORS[space.0 as usize] {
                if let Some(adjacent) = neighbor.adjacent {
                    if !self.occupied(adjacent) {
                        result.push(Move {
                            from: Some(space),
                            to: adjacent,
                            capturing: None,
                        });
                    }
                }
            }
        }
        result
    }

    // All legal capturing moves.
    fn captures(self) -> Vec<Move> {
        let mut result = Vec::new();
        for space in Space::all() {
            if !self.attacker.occupies(space) {
                continue;
            }
            for neighbor in &NEIGHBORS[space.0 as usize] {
                // Jump over an adjacent defender piece onto an empty space.
                if let (Some(adjacent), Some(jump_to)) = (neighbor.adjacent, neighbor.jump_to) {
                    if !self.occupied(jump_to) && self.defender.occupies(adjacent) {
                        result.push(Move {
                            from: Some(space),
                            to: jump_to,
                            capturing: Some(adjacent),
                        });
                    }
                }
            }
        }
        result
    }

    // All legal drops.
    fn drops(self) -> Vec<Move> {
        let mut result = Vec::new();
        if self.attacker.can_drop() {
            for space in Space::all() {
                if !self.occupied(space) {
                    result.push(Move {
                        from: None,
                        to: space,
                        capturing: None,
                    });
                }
            }
        }
        result
    }

    fn mirrored(self) -> GamePosition {
        GamePosition {
            attacker: self.attacker.relabeled(&MIRROR),
            defender: self.defender.relabeled(&MIRROR),
        }
    }

    fn rotated(self) -> GamePosition {
        GamePosition {
            attacker: self.attacker.relabeled(&ROTATE),
            defender: self.defender.relabeled(&ROTATE),
        }
    }
}
