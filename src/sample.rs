use rand::Rng;

use crate::error::SampleError;

/// Largest expected count accepted; its ceiling still fits in a `u32`.
pub const MAX_EXPECTED_COUNT: f64 = (u32::MAX - 1) as f64;

pub(crate) fn is_valid_expected_count(expected_count: f64) -> bool {
    (0.0..=MAX_EXPECTED_COUNT).contains(&expected_count)
}

/// Draw an integer with expected value `expected_count`, always equal to
/// either its floor or its ceiling.
///
/// The integer part is counted off one step at a time, so this is slow
/// for very large counts. In practice they stay close to 1. Counts above
/// `MAX_EXPECTED_COUNT` are rejected.
pub fn get_count<R: Rng + ?Sized>(mut expected_count: f64, rng: &mut R) -> Result<u32, SampleError> {
    if !is_valid_expected_count(expected_count) {
        return Err(SampleError::InvalidExpectedCount(expected_count));
    }
    let mut count = 0;
    while expected_count > 1.0 {
        count += 1;
        expected_count -= 1.0;
    }
    if rng.random_bool(expected_count) {
        count += 1;
    }
    Ok(count)
}

/// Turns a keep proportion into a number of copies for each input item.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedCountSampler {
    keep_proportion: f64,
}

impl ExpectedCountSampler {
    pub fn new(keep_proportion: f64) -> Result<Self, SampleError> {
        if !is_valid_expected_count(keep_proportion) {
            return Err(SampleError::InvalidExpectedCount(keep_proportion));
        }
        Ok(Self { keep_proportion })
    }

    pub fn keep_proportion(&self) -> f64 {
        self.keep_proportion
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<u32, SampleError> {
        get_count(self.keep_proportion, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn it_never_keeps_at_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..1000 {
            assert_eq!(get_count(0.0, &mut rng).unwrap(), 0);
        }
    }

    #[test]
    fn it_always_keeps_integers() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_eq!(get_count(1.0, &mut rng).unwrap(), 1);
            assert_eq!(get_count(3.0, &mut rng).unwrap(), 3);
        }
    }

    #[test]
    fn it_rounds_to_floor_or_ceil() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let trials = 20_000;
        let mut total = 0u64;
        for _ in 0..trials {
            let count = get_count(2.3, &mut rng).unwrap();
            assert!(count == 2 || count == 3);
            total += count as u64;
        }
        let mean = total as f64 / trials as f64;
        assert!((mean - 2.3).abs() < 0.02, "mean was {}", mean);
    }

    #[test]
    fn it_rejects_negative_counts() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(matches!(
            get_count(-0.5, &mut rng),
            Err(SampleError::InvalidExpectedCount(_))
        ));
        assert!(get_count(f64::NAN, &mut rng).is_err());
        assert!(ExpectedCountSampler::new(-1.0).is_err());
    }

    #[test]
    fn it_rejects_counts_beyond_u32() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(matches!(
            get_count(4_294_967_296.0, &mut rng),
            Err(SampleError::InvalidExpectedCount(_))
        ));
        assert!(get_count(f64::INFINITY, &mut rng).is_err());
        assert!(ExpectedCountSampler::new(MAX_EXPECTED_COUNT + 1.0).is_err());
        assert!(ExpectedCountSampler::new(MAX_EXPECTED_COUNT).is_ok());
    }

    #[test]
    fn it_samples_with_the_keep_proportion() {
        let sampler = ExpectedCountSampler::new(0.5).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let kept: u32 = (0..10_000).map(|_| sampler.sample(&mut rng).unwrap()).sum();
        assert!((4_700..5_300).contains(&kept), "kept {}", kept);
    }
}
