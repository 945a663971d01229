//! Text rendering of the game state.

use crate::{GamePosition, Player, PlayerState, Space};

const WHITE_PIECE: &str = "O ";
const BLACK_PIECE: &str = "X ";
const EMPTY_SPACE: &str = "- ";
const BLANK_SQUARE: &str = "  ";

// Returns a character indicating whether the player is next to move.
fn move_indicator(player: Player, to_move: Player) -> char {
    if player == to_move {
        '*'
    } else {
        ' '
    }
}

// Returns the string representing one space on the board.
fn space_str(white: PlayerState, black: PlayerState, space: Space) -> &'static str {
    if white.occupies(space) {
        WHITE_PIECE
    } else if black.occupies(space) {
        BLACK_PIECE
    } else {
        EMPTY_SPACE
    }
}

/// Render a position as text, viewed from the white/black frame.
pub fn to_text(position: GamePosition, to_move: Player) -> String {
    let (white, black) = position.by_player(to_move);

    // Header line with reserve counts and an indicator of who moves next.
    let mut result = format!(
        "W:{}{} B:{}{}\n",
        white.reserve_count(),
        move_indicator(Player::White, to_move),
        black.reserve_count(),
        move_indicator(Player::Black, to_move),
    );

    // Although there are only 13 spaces in the game, the board prints as a
    // 5x5 checkerboard; the odd squares are always blank.
    for i in 0u8..25 {
        if i % 2 == 0 {
            result.push_str(space_str(white, black, Space((24 - i) / 2)));
        } else {
            result.push_str(BLANK_SQUARE);
        }
        if i % 5 == 4 {
            result.push('\n');
        }
    }

    result
}
