use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use thiserror::Error;

/// Ceiling on reshuffles. A random permutation is a derangement with
/// probability close to 1/e, so real draws finish in a handful of attempts.
pub const MAX_ATTEMPTS: usize = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerangementError {
    #[error("no derangement exists for {0} elements")]
    DegenerateInput(usize),
    #[error("no derangement found after {0} attempts")]
    AlgorithmicFailure(usize),
}

/// Random permutation of `0..n` with no fixed point, using the thread RNG.
pub fn derangement(n: usize) -> Result<Vec<usize>, DerangementError> {
    derangement_with_rng(n, &mut thread_rng())
}

pub fn derangement_with_rng<R: Rng + ?Sized>(
    n: usize,
    rng: &mut R,
) -> Result<Vec<usize>, DerangementError> {
    derangement_with_limit(n, rng, MAX_ATTEMPTS)
}

/// Shuffle-and-reject: reshuffle until no index maps to itself or
/// `max_attempts` shuffles have been tried.
pub fn derangement_with_limit<R: Rng + ?Sized>(
    n: usize,
    rng: &mut R,
    max_attempts: usize,
) -> Result<Vec<usize>, DerangementError> {
    if n < 2 {
        return Err(DerangementError::DegenerateInput(n));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    for _ in 0..max_attempts {
        indices.shuffle(rng);
        if !has_fixed_point(&indices) {
            return Ok(indices);
        }
    }

    Err(DerangementError::AlgorithmicFailure(max_attempts))
}

fn has_fixed_point(perm: &[usize]) -> bool {
    perm.iter().enumerate().any(|(i, &p)| i == p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn is_permutation(perm: &[usize]) -> bool {
        let mut seen = vec![false; perm.len()];
        for &p in perm {
            if p >= perm.len() || seen[p] {
                return false;
            }
            seen[p] = true;
        }
        true
    }

    #[test]
    fn rejects_zero_and_one() {
        assert_eq!(derangement(0), Err(DerangementError::DegenerateInput(0)));
        assert_eq!(derangement(1), Err(DerangementError::DegenerateInput(1)));
    }

    #[test]
    fn two_elements_swap() {
        assert_eq!(derangement(2).unwrap(), vec![1, 0]);
    }

    #[test]
    fn exhausted_budget_is_algorithmic_failure() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let err = derangement_with_limit(6, &mut rng, 0).unwrap_err();
        assert_eq!(err, DerangementError::AlgorithmicFailure(0));
    }

    #[test]
    fn same_seed_same_derangement() {
        let a = derangement_with_rng(12, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let b = derangement_with_rng(12, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_input_checked_before_budget() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(
            derangement_with_limit(1, &mut rng, 0),
            Err(DerangementError::DegenerateInput(1))
        );
    }

    proptest! {
        #[test]
        fn prop_no_fixed_points(n in 2usize..64, seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let perm = derangement_with_rng(n, &mut rng).unwrap();
            prop_assert_eq!(perm.len(), n);
            prop_assert!(is_permutation(&perm));
            for (i, &p) in perm.iter().enumerate() {
                prop_assert_ne!(i, p, "index {} maps to itself", i);
            }
        }
    }
}
