use rustfst::fst_impls::VectorFst;
use rustfst::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::LatticeError;

/// Pair of costs (negated log scores) carried by every arc and final
/// state of a lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeWeight {
    /// Language model (graph) cost.
    pub graph_cost: f32,
    /// Acoustic cost.
    pub acoustic_cost: f32,
}

impl LatticeWeight {
    pub fn new(graph_cost: f32, acoustic_cost: f32) -> Self {
        Self {
            graph_cost,
            acoustic_cost,
        }
    }

    pub fn one() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Cost used when comparing paths
    pub fn total(&self) -> f32 {
        self.graph_cost + self.acoustic_cost
    }

    pub fn scaled(&self, scale: &ScalePair) -> Self {
        Self::new(
            scale_cost(self.graph_cost, scale.lm_scale),
            scale_cost(self.acoustic_cost, scale.acoustic_scale),
        )
    }
}

impl Default for LatticeWeight {
    fn default() -> Self {
        Self::one()
    }
}

// An infinite cost stays infinite, even under a zero scale.
fn scale_cost(cost: f32, scale: f32) -> f32 {
    if cost.is_infinite() {
        cost
    } else {
        cost * scale
    }
}

/// Factors applied to the two cost components before any path search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalePair {
    pub acoustic_scale: f32,
    pub lm_scale: f32,
}

impl ScalePair {
    pub fn new(acoustic_scale: f32, lm_scale: f32) -> Self {
        Self {
            acoustic_scale,
            lm_scale,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.acoustic_scale == 1.0 && self.lm_scale == 1.0
    }
}

impl Default for ScalePair {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// An arc of the lattice. Label `EPS_LABEL` consumes no frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeArc {
    /// Token id
    pub label: Label,
    /// Costs for this arc
    pub weight: LatticeWeight,
    /// ID of the destination state
    pub nextstate: StateId,
}

impl LatticeArc {
    pub fn new(label: Label, weight: LatticeWeight, nextstate: StateId) -> Self {
        Self {
            label,
            weight,
            nextstate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatticeState {
    /// Outgoing arcs
    #[serde(default)]
    pub arcs: Vec<LatticeArc>,
    /// Final weight, if this state is final
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_weight: Option<LatticeWeight>,
}

/// Weighted lattice of competing token hypotheses for one utterance,
/// stored as an arena of states indexed by `StateId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// ID of start state, `None` for an empty lattice
    #[serde(default)]
    start: Option<StateId>,
    /// States, with their outgoing arcs
    #[serde(default)]
    states: Vec<LatticeState>,
}

impl Lattice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a linear lattice with one arc per entry, starting at state 0
    /// and ending in a final state of weight one.
    pub fn linear(arcs: &[(Label, LatticeWeight)]) -> Self {
        let mut lat = Self::new();
        let mut state = lat.add_state();
        lat.start = Some(state);
        for &(label, weight) in arcs {
            let next = lat.add_state();
            lat.states[state as usize]
                .arcs
                .push(LatticeArc::new(label, weight, next));
            state = next;
        }
        lat.states[state as usize].final_weight = Some(LatticeWeight::one());
        lat
    }

    pub fn add_state(&mut self) -> StateId {
        let id = self.states.len() as StateId;
        self.states.push(LatticeState::default());
        id
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn start(&self) -> Option<StateId> {
        self.start
    }

    pub fn states(&self) -> &[LatticeState] {
        &self.states
    }

    pub fn set_start(&mut self, state: StateId) -> Result<(), LatticeError> {
        self.check_state(state)?;
        self.start = Some(state);
        Ok(())
    }

    pub fn set_final(&mut self, state: StateId, weight: LatticeWeight) -> Result<(), LatticeError> {
        self.check_state(state)?;
        self.states[state as usize].final_weight = Some(weight);
        Ok(())
    }

    pub fn add_arc(&mut self, state: StateId, arc: LatticeArc) -> Result<(), LatticeError> {
        self.check_state(state)?;
        self.check_state(arc.nextstate)?;
        self.states[state as usize].arcs.push(arc);
        Ok(())
    }

    fn check_state(&self, state: StateId) -> Result<(), LatticeError> {
        if (state as usize) < self.states.len() {
            Ok(())
        } else {
            Err(LatticeError::BadState {
                state,
                num_states: self.states.len(),
            })
        }
    }

    /// Scale the graph cost of every arc and final weight by `lm_scale`
    /// and the acoustic cost by `acoustic_scale`.
    pub fn apply_scale(&mut self, scale: &ScalePair) {
        if scale.is_identity() {
            return;
        }
        for state in self.states.iter_mut() {
            for arc in state.arcs.iter_mut() {
                arc.weight = arc.weight.scaled(scale);
            }
            if let Some(weight) = state.final_weight.as_mut() {
                *weight = weight.scaled(scale);
            }
        }
    }

    /// Convert to an acceptor over tokens whose weights are the total
    /// costs. State ids are preserved.
    pub fn to_fst<W: Semiring + From<f32>>(&self) -> Result<VectorFst<W>, LatticeError> {
        let mut fst = VectorFst::<W>::new();
        fst.add_states(self.states.len());
        for (s, state) in self.states.iter().enumerate() {
            let s = s as StateId;
            for arc in state.arcs.iter() {
                self.check_state(arc.nextstate)?;
                fst.add_tr(
                    s,
                    Tr::new(arc.label, arc.label, arc.weight.total(), arc.nextstate),
                )
                .map_err(LatticeError::fst)?;
            }
            if let Some(weight) = state.final_weight {
                fst.set_final(s, weight.total())
                    .map_err(LatticeError::fst)?;
            }
        }
        if let Some(start) = self.start {
            self.check_state(start)?;
            fst.set_start(start).map_err(LatticeError::fst)?;
        }
        Ok(fst)
    }

    pub fn to_tropical_fst(&self) -> Result<crate::StdVectorFst, LatticeError> {
        self.to_fst()
    }

    pub fn to_log_fst(&self) -> Result<crate::LogVectorFst, LatticeError> {
        self.to_fst()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(graph_cost: f32, acoustic_cost: f32) -> LatticeWeight {
        LatticeWeight::new(graph_cost, acoustic_cost)
    }

    #[test]
    fn it_builds_linear_lattices() {
        let lat = Lattice::linear(&[(3, w(1.0, 2.0)), (4, w(0.5, 0.5))]);
        assert_eq!(lat.num_states(), 3);
        assert_eq!(lat.start(), Some(0));
        assert_eq!(lat.states()[0].arcs[0].label, 3);
        assert_eq!(lat.states()[1].arcs[0].nextstate, 2);
        assert_eq!(lat.states()[2].final_weight, Some(LatticeWeight::one()));
    }

    #[test]
    fn it_scales_both_components() {
        let mut lat = Lattice::linear(&[(3, w(1.0, 2.0))]);
        lat.set_final(1, w(4.0, 8.0)).unwrap();
        lat.apply_scale(&ScalePair::new(0.5, 2.0));
        assert_eq!(lat.states()[0].arcs[0].weight, w(2.0, 1.0));
        assert_eq!(lat.states()[1].final_weight, Some(w(8.0, 4.0)));
    }

    #[test]
    fn it_keeps_infinite_costs_under_zero_scale() {
        let mut lat = Lattice::linear(&[(3, w(f32::INFINITY, 2.0))]);
        lat.apply_scale(&ScalePair::new(0.0, 0.0));
        let weight = lat.states()[0].arcs[0].weight;
        assert_eq!(weight.graph_cost, f32::INFINITY);
        assert_eq!(weight.acoustic_cost, 0.0);
    }

    #[test]
    fn it_rejects_bad_states() {
        let mut lat = Lattice::new();
        let s0 = lat.add_state();
        assert!(matches!(
            lat.add_arc(s0, LatticeArc::new(1, w(0.0, 0.0), 7)),
            Err(LatticeError::BadState { state: 7, .. })
        ));
        assert!(lat.set_start(2).is_err());
        assert!(lat.set_start(s0).is_ok());
    }

    #[test]
    fn it_converts_to_fst() {
        let lat = Lattice::linear(&[(3, w(1.0, 2.0)), (4, w(0.5, 0.25))]);
        let fst = lat.to_tropical_fst().unwrap();
        assert_eq!(fst.start(), Some(0));
        assert_eq!(fst.num_states(), 3);
        let trs = fst.get_trs(1).unwrap();
        let trs = trs.trs();
        assert_eq!(trs.len(), 1);
        assert_eq!(trs[0].ilabel, 4);
        assert_eq!(*trs[0].weight.value(), 0.75);
        assert!(fst.is_final(2).unwrap());
    }

    #[test]
    fn it_converts_empty_lattice_without_start() {
        let fst = Lattice::new().to_log_fst().unwrap();
        assert_eq!(fst.start(), None);
        assert_eq!(fst.num_states(), 0);
    }

    #[test]
    fn it_round_trips_through_json() {
        let lat = Lattice::linear(&[(3, w(1.0, 2.0))]);
        let json = serde_json::to_string(&lat).unwrap();
        let back: Lattice = serde_json::from_str(&json).unwrap();
        assert_eq!(lat, back);
    }
}
