use rustfst::Label;
use serde::{Deserialize, Serialize};

use crate::lattice::Lattice;

/// One unsupervised discriminative training example.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Weight of the example as a whole (e.g. from sampling)
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Lattice of hypotheses for the utterance
    pub lattice: Lattice,
    /// Number of frames of supervision
    pub num_frames: usize,
    /// Token id per frame, empty when unset
    #[serde(default)]
    pub alignment: Vec<Label>,
    /// Training weight per frame, empty when unset
    #[serde(default)]
    pub weights: Vec<f32>,
    /// Input features, `num_frames` plus context rows
    #[serde(default)]
    pub input_frames: Vec<Vec<f32>>,
    /// Number of context frames on the left of `input_frames`
    #[serde(default)]
    pub left_context: u32,
    /// Speaker features, possibly empty
    #[serde(default)]
    pub spk_info: Vec<f32>,
}

fn default_weight() -> f32 {
    1.0
}

impl Example {
    pub fn new(lattice: Lattice, num_frames: usize) -> Self {
        Self {
            weight: default_weight(),
            lattice,
            num_frames,
            ..Default::default()
        }
    }

    /// Alignment and weights are either unset or cover every frame.
    pub fn is_consistent(&self) -> bool {
        let set = |len: usize| len == 0 || len == self.num_frames;
        set(self.alignment.len()) && set(self.weights.len())
    }
}
