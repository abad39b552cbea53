//! Seeded demo outcomes

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rf_spin::{Mutation, Outcome, Reevaluation, StickySymbol, SubOutcome};

const SYMBOLS: &[&str] = &["A", "K", "Q", "J", "10", "H1", "H2", "SC"];
const WILDS: &[&str] = &["WD", "TW"];

pub fn outcome(
    seed: u64,
    reels: usize,
    rows: usize,
    mutations: usize,
    respins: usize,
    bonus: bool,
) -> Outcome {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut outcome = Outcome {
        is_bonus: bonus,
        is_gifting: bonus && rng.random_bool(0.5),
        reel_matrix: Some(matrix(&mut rng, reels, rows)),
        ..Outcome::default()
    };
    for _ in 0..mutations {
        outcome.mutations.push(mutation(&mut rng, reels, rows));
    }
    for _ in 0..respins {
        outcome.reevaluations.push(respin(&mut rng, reels, rows));
    }

    let wins = rng.random_range(0..=3);
    outcome.sub_outcomes = (0..wins)
        .map(|i| SubOutcome {
            win_id: i + 1,
            credits: f64::from(rng.random_range(1..=50u32)) * 0.5,
            symbol_match_count: rng.random_range(3..=reels.max(3) as u32),
        })
        .collect();
    outcome
}

fn matrix(rng: &mut ChaCha8Rng, reels: usize, rows: usize) -> Vec<Vec<String>> {
    (0..reels)
        .map(|_| {
            (0..rows)
                .map(|_| SYMBOLS[rng.random_range(0..SYMBOLS.len())].to_string())
                .collect()
        })
        .collect()
}

fn mutation(rng: &mut ChaCha8Rng, reels: usize, rows: usize) -> Mutation {
    let wild = WILDS[rng.random_range(0..WILDS.len())];
    let names = (0..reels)
        .map(|_| {
            (0..rows)
                .map(|_| rng.random_bool(0.2).then(|| wild.to_string()))
                .collect()
        })
        .collect();
    Mutation {
        trigger_symbol_names: Some(names),
        ..Mutation::standard(&[])
    }
}

fn respin(rng: &mut ChaCha8Rng, reels: usize, rows: usize) -> Reevaluation {
    let reevaluated_matrix = matrix(rng, reels, rows);
    let sticky_symbols = if rng.random_bool(0.4) {
        let reel = rng.random_range(0..reels);
        let row = rng.random_range(0..rows);
        vec![StickySymbol {
            reel: reel as u32,
            position: row as u32,
            name: reevaluated_matrix[reel][row].clone(),
        }]
    } else {
        Vec::new()
    };
    Reevaluation {
        reevaluated_matrix,
        sticky_symbols,
        ..Reevaluation::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_outcome() {
        assert_eq!(outcome(7, 5, 3, 2, 3, true), outcome(7, 5, 3, 2, 3, true));
    }

    #[test]
    fn test_shapes_match_grid() {
        let spin = outcome(1, 4, 2, 3, 2, false);
        assert_eq!(spin.mutations.len(), 3);
        assert_eq!(spin.reevaluations.len(), 2);
        let names = spin.mutations[0].trigger_symbol_names.as_ref().unwrap();
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|reel| reel.len() == 2));
        assert!(!spin.is_gifting);
    }
}
