use crate::error::ConfigError;
use crate::lattice::ScalePair;
use crate::sample::is_valid_expected_count;

/// Options controlling how examples are copied.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyConfig {
    /// Expected number of copies of each input example. Below 1 this
    /// subsamples, above 1 it replicates.
    pub keep_proportion: f64,
    /// Send copies to a uniformly random output instead of round robin
    pub random: bool,
    /// Seed for the random number generator
    pub seed: u64,
    /// Write as a supervised example. Has no effect on the output.
    pub write_as_supervised: bool,
    /// Replace alignments by the lattice best path with posterior weights
    pub add_best_path_weights: bool,
    /// Scales applied to the lattice before the best path search
    pub scale: ScalePair,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            keep_proportion: 1.0,
            random: false,
            seed: 0,
            write_as_supervised: false,
            add_best_path_weights: false,
            scale: ScalePair::default(),
        }
    }
}

impl CopyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_expected_count(self.keep_proportion) {
            return Err(ConfigError::KeepProportion(self.keep_proportion));
        }
        for (name, value) in [
            ("acoustic scale", self.scale.acoustic_scale),
            ("lm scale", self.scale.lm_scale),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Scale { name, value });
            }
        }
        Ok(())
    }
}
