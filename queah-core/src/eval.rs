//! Runtime value table: a compact lookup from canonical positions to solved
//! outcome values, with best-move selection.
//!
//! # Value Table File
//!
//! ```text
//! u64 LE: row count
//! rows, 53 bytes each, sorted ascending by key:
//!   u32 LE: canonical occupancy key (attacker bitboard << 16 | defender)
//!   49 x i8: outcome values indexed by [attacker reserve][defender reserve]
//! ```
//!
//! Rows are keyed by board shape alone; the reserve counts form a small dense
//! index within each row.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use rand::Rng;
use thiserror::Error;

use crate::codec::{self, DecodeError, Reader};
use crate::model::GameModel;
use crate::{GamePosition, Move, MAX_IN_RESERVE};

/// Outcome of a position under perfect play, from the perspective of its side
/// to move. Positive means the attacker wins, negative the defender; zero is
/// a draw by endless repetition. The magnitude is `MAX_VALUE` minus the plies
/// remaining, so values nearer the extremes are faster outcomes.
pub type Value = i8;

/// Largest representable outcome magnitude; assigned to positions where the
/// side to move has already lost.
pub const MAX_VALUE: Value = Value::MAX;

// Reserve counts run 0..=6, giving a 7x7 grid per row.
const RESERVE_SLOTS: usize = MAX_IN_RESERVE as usize + 1;

/// Binds a canonical position to its solved value.
#[derive(Clone, Copy, Debug)]
pub struct PositionValue {
    pub position: GamePosition,
    pub value: Value,
}

/// Failure to load a value table file. This is a recoverable condition; the
/// caller decides fallback behavior.
#[derive(Debug, Error)]
pub enum TableLoadError {
    #[error("failed to read value table: {0}")]
    Io(#[from] io::Error),
    #[error("value table file is truncated or malformed")]
    Malformed,
}

impl From<DecodeError> for TableLoadError {
    fn from(_: DecodeError) -> TableLoadError {
        TableLoadError::Malformed
    }
}

// Stores all the values for one canonical occupancy pair.
#[derive(Clone, Copy)]
struct Row {
    key: u32,
    values: [[Value; RESERVE_SLOTS]; RESERVE_SLOTS],
}

impl Row {
    fn empty(key: u32) -> Row {
        Row {
            key,
            values: [[0; RESERVE_SLOTS]; RESERVE_SLOTS],
        }
    }
}

// Identifies the board shape alone: both bitboards, reserve counts ignored.
fn occupancy_key(position: GamePosition) -> u32 {
    ((position.attacker().bitboard() as u32) << 16) | position.defender().bitboard() as u32
}

// Possible move being evaluated for play.
#[derive(Clone, Copy)]
struct Candidate {
    mov: Move,
    value: Value,
    repetitions: u32,
}

impl Candidate {
    // Sorts from most to least desirable for the side to move.
    fn rank(&self) -> (Value, u32) {
        (self.value, self.repetitions)
    }
}

/// Evaluates positions and selects best moves from solved outcome values.
///
/// Rows are kept sorted by key so lookups can binary-search; compared to a
/// hash index this keeps the memory footprint small on constrained targets.
/// The table is immutable once built or loaded.
pub struct Evaluator {
    rows: Vec<Row>,
}

impl Evaluator {
    /// Build a table from solved values. Positions are assumed canonical.
    pub fn new(data: &[PositionValue]) -> Evaluator {
        // Coalesce the entries sharing an occupancy pair into one row.
        let mut by_key: HashMap<u32, Row> = HashMap::new();
        for pv in data {
            let key = occupancy_key(pv.position);
            let row = by_key.entry(key).or_insert_with(|| Row::empty(key));
            let attacker = pv.position.attacker().reserve_count() as usize;
            let defender = pv.position.defender().reserve_count() as usize;
            row.values[attacker][defender] = pv.value;
        }

        let mut rows: Vec<Row> = by_key.into_values().collect();
        rows.sort_by_key(|row| row.key);
        Evaluator { rows }
    }

    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `position`, from the perspective of its side to move.
    ///
    /// Every reachable position was solved offline, so the row is always
    /// present; a miss means the table was built against a different rule set
    /// and is a fatal internal-consistency violation.
    pub fn evaluate(&self, position: GamePosition) -> Value {
        let key = occupancy_key(position.canonical());
        let idx = self
            .rows
            .binary_search_by_key(&key, |row| row.key)
            .unwrap_or_else(|_| panic!("value table has no row for occupancy key {key:#010x}"));
        let attacker = position.attacker().reserve_count() as usize;
        let defender = position.defender().reserve_count() as usize;
        self.rows[idx].values[attacker][defender]
    }

    /// Choose a move for the model's side to move.
    ///
    /// Candidates are ranked by the value of the resulting position (the
    /// opponent's outlook, so lower is better for the mover), breaking ties
    /// toward positions repeated less often, then uniformly at random with
    /// the supplied generator. Must not be called once the game is over.
    pub fn best_move<R: Rng>(&self, model: &GameModel, rng: &mut R) -> Move {
        let other = model.to_move().opponent();
        let position = model.position();

        let mut candidates: Vec<Candidate> = position
            .moves()
            .into_iter()
            .map(|mov| {
                let next = position.try_move(&mov);
                Candidate {
                    mov,
                    value: self.evaluate(next),
                    repetitions: model.repetitions_of(next, other),
                }
            })
            .collect();
        assert!(!candidates.is_empty(), "no legal moves: the game is over");

        candidates.sort_by_key(Candidate::rank);
        let best = candidates[0].rank();
        let tied = candidates.iter().take_while(|c| c.rank() == best).count();
        candidates[rng.gen_range(0..tied)].mov
    }

    /// Write the table to `path` as one contiguous transfer.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut buf = Vec::with_capacity(8 + self.rows.len() * (4 + RESERVE_SLOTS * RESERVE_SLOTS));
        codec::put_u64(&mut buf, self.rows.len() as u64);
        for row in &self.rows {
            codec::put_u32(&mut buf, row.key);
            for attacker in 0..RESERVE_SLOTS {
                for defender in 0..RESERVE_SLOTS {
                    buf.push(row.values[attacker][defender] as u8);
                }
            }
        }
        fs::write(path, buf)
    }

    /// Read a table written by [`Evaluator::save`]. A short or oversized file
    /// fails the load; the result is never partially filled.
    pub fn load(path: &Path) -> Result<Evaluator, TableLoadError> {
        let buf = fs::read(path)?;
        let mut reader = Reader::new(&buf);

        let count = reader.u64()?;
        let mut rows = Vec::new();
        for _ in 0..count {
            let key = reader.u32()?;
            let mut values = [[0; RESERVE_SLOTS]; RESERVE_SLOTS];
            for row_values in values.iter_mut() {
                for value in row_values.iter_mut() {
                    *value = reader.u8()? as Value;
                }
            }
            rows.push(Row { key, values });
        }
        reader.finish()?;

        // Lookups binary-search, so the keys must be strictly increasing.
        if rows.windows(2).any(|pair| pair[0].key >= pair[1].key) {
            return Err(TableLoadError::Malformed);
        }
        Ok(Evaluator { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlayerState;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn bits(spaces: &[u8]) -> u16 {
        spaces.iter().fold(0, |acc, &s| acc | (1 << s))
    }

    fn position(att: &[u8], att_reserve: u8, def: &[u8], def_reserve: u8) -> GamePosition {
        GamePosition::new(
            PlayerState::new(bits(att), att_reserve),
            PlayerState::new(bits(def), def_reserve),
        )
    }

    // A table covering the start position and everything one move deep.
    fn start_neighborhood(value_for: impl Fn(usize) -> Value) -> Evaluator {
        let mut data = vec![PositionValue {
            position: GamePosition::START.canonical(),
            value: 1,
        }];
        for (i, mov) in GamePosition::START.moves().iter().enumerate() {
            data.push(PositionValue {
                position: GamePosition::START.try_move(mov).canonical(),
                value: value_for(i),
            });
        }
        Evaluator::new(&data)
    }

    #[test]
    fn test_evaluate_ignores_relabeling() {
        let pos = position(&[0, 4], 3, &[11], 2).canonical();
        let table = Evaluator::new(&[PositionValue {
            position: pos,
            value: 42,
        }]);
        assert_eq!(table.evaluate(pos), 42);
        // Any strategically identical relabeling evaluates the same.
        let mirrored = position(&[2, 3], 3, &[11], 2);
        assert_eq!(mirrored.canonical(), pos);
        assert_eq!(table.evaluate(mirrored), 42);
    }

    #[test]
    fn test_rows_share_occupancy_across_reserves() {
        let a = position(&[6], 1, &[3], 2).canonical();
        let b = position(&[6], 4, &[3], 0).canonical();
        let table = Evaluator::new(&[
            PositionValue {
                position: a,
                value: 10,
            },
            PositionValue {
                position: b,
                value: -10,
            },
        ]);
        // One row, two grid cells.
        assert_eq!(table.len(), 1);
        assert_eq!(table.evaluate(a), 10);
        assert_eq!(table.evaluate(b), -10);
    }

    #[test]
    #[should_panic(expected = "no row")]
    fn test_missing_row_is_fatal() {
        let table = Evaluator::new(&[]);
        table.evaluate(GamePosition::START);
    }

    #[test]
    fn test_best_move_picks_smallest_value() {
        // Give one successor a clearly better (more negative) outlook.
        let table = start_neighborhood(|i| if i == 2 { -50 } else { 20 });
        let model = GameModel::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let expected = GamePosition::START.moves()[2];
        for _ in 0..20 {
            assert_eq!(table.best_move(&model, &mut rng), expected);
        }
    }

    #[test]
    fn test_best_move_is_always_legal() {
        let table = start_neighborhood(|_| 0);
        let model = GameModel::new();
        let legal = model.legal_moves();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..50 {
            assert!(legal.contains(&table.best_move(&model, &mut rng)));
        }
    }

    #[test]
    fn test_best_move_tie_break_is_deterministic_per_seed() {
        let table = start_neighborhood(|_| 0);
        let model = GameModel::new();
        let first: Vec<Move> = {
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            (0..10).map(|_| table.best_move(&model, &mut rng)).collect()
        };
        let second: Vec<Move> = {
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            (0..10).map(|_| table.best_move(&model, &mut rng)).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = std::env::temp_dir();
        let path = dir.join("queah_eval_roundtrip.dat");

        let table = start_neighborhood(|i| i as Value - 2);
        table.save(&path).unwrap();
        let loaded = Evaluator::load(&path).unwrap();

        assert_eq!(loaded.len(), table.len());
        for mov in GamePosition::START.moves() {
            let next = GamePosition::START.try_move(&mov);
            assert_eq!(loaded.evaluate(next), table.evaluate(next));
        }

        // Saving the loaded table reproduces the file byte for byte.
        let copy = dir.join("queah_eval_roundtrip_copy.dat");
        loaded.save(&copy).unwrap();
        assert_eq!(fs::read(&path).unwrap(), fs::read(&copy).unwrap());

        fs::remove_file(&path).ok();
        fs::remove_file(&copy).ok();
    }

    #[test]
    fn test_load_rejects_truncated_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("queah_eval_truncated.dat");

        let table = start_neighborhood(|_| 1);
        table.save(&path).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes.pop();
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            Evaluator::load(&path),
            Err(TableLoadError::Malformed)
        ));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_rejects_trailing_bytes() {
        let dir = std::env::temp_dir();
        let path = dir.join("queah_eval_trailing.dat");

        let table = start_neighborhood(|_| 1);
        table.save(&path).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes.push(0);
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            Evaluator::load(&path),
            Err(TableLoadError::Malformed)
        ));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_reports_missing_file() {
        let path = std::env::temp_dir().join("queah_eval_does_not_exist.dat");
        assert!(matches!(
            Evaluator::load(&path),
            Err(TableLoadError::Io(_))
        ));
    }
}
