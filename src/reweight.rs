use rustfst::Label;

use crate::algorithms::{forward_backward, shortest_path, Posterior};
use crate::error::ReweightError;
use crate::example::Example;
use crate::lattice::ScalePair;

/// Replacement supervision for an example.
#[derive(Debug, Clone, PartialEq)]
pub struct Reweighted {
    /// Best path token per frame
    pub alignment: Vec<Label>,
    /// Posterior mass of the best path token per frame
    pub weights: Vec<f32>,
}

/// Replaces an example's alignment with the best path through its
/// lattice, weighting each frame by the lattice posterior of the chosen
/// token.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatticeReweighter {
    scale: ScalePair,
}

impl LatticeReweighter {
    pub fn new(scale: ScalePair) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> ScalePair {
        self.scale
    }

    pub fn reweight(&self, eg: &Example) -> Result<Reweighted, ReweightError> {
        let mut lattice = eg.lattice.clone();
        lattice.apply_scale(&self.scale);

        let best = shortest_path(&lattice)?;
        check_frames("best path", eg.num_frames, best.labels.len())?;

        let fb = forward_backward(&lattice)?;
        check_frames("posterior", eg.num_frames, fb.posterior.len())?;

        let weights = best_path_weights(&best.labels, &fb.posterior);
        Ok(Reweighted {
            alignment: best.labels,
            weights,
        })
    }

    /// Reweight in place. On failure the example is left untouched.
    pub fn apply(&self, eg: &mut Example) -> Result<(), ReweightError> {
        let Reweighted { alignment, weights } = self.reweight(eg)?;
        eg.alignment = alignment;
        eg.weights = weights;
        Ok(())
    }
}

fn check_frames(what: &'static str, expected: usize, found: usize) -> Result<(), ReweightError> {
    if expected == found {
        Ok(())
    } else {
        Err(ReweightError::FrameCountMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Sum of the posterior mass of `alignment[i]` at every frame `i`.
pub fn best_path_weights(alignment: &[Label], posterior: &Posterior) -> Vec<f32> {
    alignment
        .iter()
        .zip(posterior.iter())
        .map(|(&label, frame)| {
            frame
                .iter()
                .filter(|&&(l, _)| l == label)
                .map(|&(_, mass)| mass)
                .sum()
        })
        .collect()
}
