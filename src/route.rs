use rand::Rng;

use crate::error::ConfigError;

/// Picks the output each kept copy goes to.
#[derive(Debug, Clone, Copy)]
pub struct OutputRouter {
    num_outputs: usize,
    random: bool,
}

impl OutputRouter {
    pub fn new(num_outputs: usize, random: bool) -> Result<Self, ConfigError> {
        if num_outputs == 0 {
            return Err(ConfigError::NoOutputs);
        }
        Ok(Self {
            num_outputs,
            random,
        })
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Round robin on the number of examples written so far, or uniform
    /// if random. Only the random case draws from `rng`.
    pub fn select<R: Rng + ?Sized>(&self, num_written: u64, rng: &mut R) -> usize {
        if self.random {
            rng.random_range(0..self.num_outputs)
        } else {
            (num_written % self.num_outputs as u64) as usize
        }
    }
}
