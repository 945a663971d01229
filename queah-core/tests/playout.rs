//! Random-playout integration tests.
//!
//! Drives whole games through the public API with a seeded generator and
//! checks the invariants that must hold across any legal game: move legality,
//! piece conservation, canonicalization stability, and session persistence.

use queah_core::{Evaluator, GameModel, GamePosition, Move, Player, PositionValue, Space};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const MAX_HALF_MOVES: usize = 300;

fn total_pieces(model: &GameModel, player: Player) -> usize {
    model.pieces(player).len() + model.reserve_count(player) as usize
}

fn play_random_game(seed: u64, mut on_move: impl FnMut(&GameModel)) -> GameModel {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut model = GameModel::new();

    for _ in 0..MAX_HALF_MOVES {
        let moves = model.legal_moves();
        if moves.is_empty() {
            assert!(model.is_over());
            break;
        }

        let mover = model.to_move();
        let opponent_before = total_pieces(&model, mover.opponent());
        let mov = moves[rng.gen_range(0..moves.len())];
        assert!(model.position().is_legal(&mov));

        let captured = model.make_move(&mov).expect("legal move was rejected");
        assert_eq!(captured, mov.capturing);

        // A capture removes exactly one opposing piece from the board and
        // never touches the reserve; anything else conserves both sides.
        let expected = if captured.is_some() {
            opponent_before - 1
        } else {
            opponent_before
        };
        assert_eq!(total_pieces(&model, mover.opponent()), expected);
        on_move(&model);
    }
    model
}

#[test]
fn test_random_games_stay_legal() {
    for seed in 0..25 {
        play_random_game(seed, |model| {
            if model.is_over() {
                assert!(model.legal_moves().is_empty());
            }
        });
    }
}

#[test]
fn test_canonicalization_is_stable_across_play() {
    for seed in 0..10 {
        play_random_game(seed, |model| {
            let canonical = model.position().canonical();
            assert_eq!(canonical.canonical(), canonical);
            assert!(canonical.id() <= model.position().id());
        });
    }
}

#[test]
fn test_session_roundtrip_mid_game() {
    for seed in [1, 17, 99] {
        let model = play_random_game(seed, |_| {});
        let buf = model.encode();

        let mut restored = GameModel::new();
        restored.decode(&buf).unwrap();
        assert_eq!(restored, model);
        assert_eq!(restored.encode(), buf);

        // Corrupting the length never leaves a half-written session behind.
        let mut broken = restored.clone();
        assert!(broken.decode(&buf[..buf.len() - 1]).is_err());
        assert_eq!(broken, restored);
    }
}

#[test]
fn test_best_move_avoids_repeated_positions() {
    fn simple(from: u8, to: u8) -> Move {
        Move {
            from: Some(Space(from)),
            to: Space(to),
            capturing: None,
        }
    }

    // Shuffle a piece out and back on each side, returning to the start
    // position. The position after 4->7 has now been seen once.
    let mut model = GameModel::new();
    for mov in [simple(4, 7), simple(8, 5), simple(7, 4), simple(5, 8)] {
        model.make_move(&mov).unwrap();
    }
    assert_eq!(model.position(), GamePosition::START);

    // Give every successor the same solved value, so repetition counts are
    // the only thing separating the candidates.
    let data: Vec<PositionValue> = GamePosition::START
        .moves()
        .iter()
        .map(|mov| PositionValue {
            position: GamePosition::START.try_move(mov).canonical(),
            value: 3,
        })
        .collect();
    let table = Evaluator::new(&data);

    let legal = model.legal_moves();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for _ in 0..40 {
        let mov = table.best_move(&model, &mut rng);
        assert!(legal.contains(&mov));
        assert_ne!(mov, simple(4, 7), "re-entered an already seen position");
    }
}
