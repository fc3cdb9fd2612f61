//! Train/validation splitting

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Shuffle `samples` with a seeded RNG and cut them into
/// (train, validation) at `floor(train_fraction * len)`.
///
/// The same seed always yields the same split.
pub fn split_train_val<T: Clone>(
    samples: &[T],
    train_fraction: f64,
    seed: u64,
) -> (Vec<T>, Vec<T>) {
    let mut shuffled = samples.to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let fraction = train_fraction.clamp(0.0, 1.0);
    let train_len = (shuffled.len() as f64 * fraction).floor() as usize;
    let val = shuffled.split_off(train_len);

    (shuffled, val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let samples: Vec<usize> = (0..10).collect();
        let (train, val) = split_train_val(&samples, 0.8, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
    }

    #[test]
    fn test_split_is_a_partition() {
        let samples: Vec<usize> = (0..25).collect();
        let (train, val) = split_train_val(&samples, 0.8, 7);

        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort();
        assert_eq!(all, samples);
    }

    #[test]
    fn test_split_is_deterministic() {
        let samples: Vec<usize> = (0..50).collect();
        assert_eq!(
            split_train_val(&samples, 0.8, 42),
            split_train_val(&samples, 0.8, 42)
        );
    }

    #[test]
    fn test_split_floor_rounding() {
        let samples: Vec<usize> = (0..7).collect();
        let (train, val) = split_train_val(&samples, 0.8, 1);
        // floor(0.8 * 7) = 5
        assert_eq!(train.len(), 5);
        assert_eq!(val.len(), 2);
    }
}
