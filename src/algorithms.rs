use ordered_float::OrderedFloat;
use rustfst::algorithms::shortest_path as fst_shortest_path;
use rustfst::algorithms::top_sort as fst_top_sort;
use rustfst::fst_impls::VectorFst;
use rustfst::prelude::*;
use rustfst::utils::decode_linear_fst;
use std::collections::HashMap;

use crate::error::LatticeError;
use crate::lattice::Lattice;
use crate::{LogVectorFst, StdVectorFst};

/// Per frame, the posterior mass of each token seen at that frame.
pub type Posterior = Vec<Vec<(Label, f32)>>;

/// Lowest-cost hypothesis through a lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct BestPath {
    /// Non-epsilon labels along the path, one per frame
    pub labels: Vec<Label>,
    /// Total cost of the path, final weight included
    pub cost: f32,
}

/// Result of a forward-backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardBackward {
    pub posterior: Posterior,
    /// Negated log of the total probability mass of the lattice
    pub total_cost: f64,
}

/// Find the best path through the lattice, with costs compared in the
/// tropical semiring on the sum of both components.
pub fn shortest_path(lattice: &Lattice) -> Result<BestPath, LatticeError> {
    if lattice.start().is_none() {
        return Err(LatticeError::NoPath);
    }
    let fst = lattice.to_tropical_fst()?;
    let best: StdVectorFst = fst_shortest_path(&fst).map_err(LatticeError::fst)?;
    // rustfst returns an empty FST when no final state is reachable
    if best.start().is_none() || best.num_states() == 0 {
        return Err(LatticeError::NoPath);
    }
    let path = decode_linear_fst(&best).map_err(LatticeError::fst)?;
    let cost = *path.weight.value();
    if !cost.is_finite() {
        return Err(LatticeError::NoPath);
    }
    let labels = path
        .ilabels
        .into_iter()
        .filter(|&label| label != EPS_LABEL)
        .collect();
    Ok(BestPath { labels, cost })
}

/// Sort states topologically, so that every transition goes from a lower
/// to a higher state ID.
pub fn top_sort<W: Semiring>(fst: &mut VectorFst<W>) -> Result<(), LatticeError> {
    fst_top_sort(fst).map_err(LatticeError::fst)?;
    // rustfst leaves a cyclic FST untouched, so check the result
    for s in fst.states_iter() {
        let trs = fst.get_trs(s).map_err(LatticeError::fst)?;
        if trs.trs().iter().any(|tr| tr.nextstate <= s) {
            return Err(LatticeError::Cyclic);
        }
    }
    Ok(())
}

/// Frame index of every state reachable from the start of a topologically
/// sorted FST, together with the number of frames of the lattice (the
/// latest frame at which a final state is reached).
pub fn state_times<W: Semiring>(
    fst: &VectorFst<W>,
) -> Result<(Vec<Option<usize>>, usize), LatticeError> {
    let mut times: Vec<Option<usize>> = vec![None; fst.num_states()];
    let start = fst.start().ok_or(LatticeError::NoPath)?;
    times[start as usize] = Some(0);
    let mut num_frames = 0;
    for s in fst.states_iter() {
        let time = match times[s as usize] {
            Some(time) => time,
            None => continue,
        };
        let trs = fst.get_trs(s).map_err(LatticeError::fst)?;
        for tr in trs.trs() {
            let next_time = if tr.ilabel == EPS_LABEL { time } else { time + 1 };
            let slot = &mut times[tr.nextstate as usize];
            match *slot {
                None => *slot = Some(next_time),
                Some(prev) if prev != next_time => {
                    return Err(LatticeError::InconsistentTimes {
                        state: tr.nextstate,
                        first: prev,
                        second: next_time,
                    })
                }
                Some(_) => {}
            }
        }
        if fst.is_final(s).map_err(LatticeError::fst)? {
            num_frames = num_frames.max(time);
        }
    }
    Ok((times, num_frames))
}

/// Log-add of two costs (negated logs): `-ln(e^-a + e^-b)`.
fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::INFINITY {
        return b;
    }
    if b == f64::INFINITY {
        return a;
    }
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    low - (low - high).exp().ln_1p()
}

/// Run forward-backward over the lattice in the log semiring and return
/// the per-frame token posteriors.
///
/// Masses of arcs carrying the same token at the same frame are summed.
/// Within a frame, entries are ordered by decreasing mass.
pub fn forward_backward(lattice: &Lattice) -> Result<ForwardBackward, LatticeError> {
    let mut fst: LogVectorFst = lattice.to_log_fst()?;
    if fst.start().is_none() {
        return Err(LatticeError::NoPath);
    }
    top_sort(&mut fst)?;
    let start = fst.start().ok_or(LatticeError::NoPath)? as usize;
    let (times, num_frames) = state_times(&fst)?;
    let num_states = fst.num_states();

    // Costs are accumulated in f64: summing f32 costs along thousands of
    // frames drifts far enough to push posteriors above 1.
    let mut alpha = vec![f64::INFINITY; num_states];
    alpha[start] = 0.0;
    for s in fst.states_iter() {
        let a = alpha[s as usize];
        if a == f64::INFINITY {
            continue;
        }
        let trs = fst.get_trs(s).map_err(LatticeError::fst)?;
        for tr in trs.trs() {
            let next = tr.nextstate as usize;
            alpha[next] = log_add(alpha[next], a + *tr.weight.value() as f64);
        }
    }

    let mut beta = vec![f64::INFINITY; num_states];
    for s in (0..num_states as StateId).rev() {
        let mut b = match fst.final_weight(s).map_err(LatticeError::fst)? {
            Some(weight) => *weight.value() as f64,
            None => f64::INFINITY,
        };
        let trs = fst.get_trs(s).map_err(LatticeError::fst)?;
        for tr in trs.trs() {
            b = log_add(b, *tr.weight.value() as f64 + beta[tr.nextstate as usize]);
        }
        beta[s as usize] = b;
    }

    let total_cost = beta[start];
    if !total_cost.is_finite() {
        return Err(LatticeError::NoPath);
    }

    let mut frames: Vec<HashMap<Label, f64>> = vec![HashMap::new(); num_frames];
    for s in fst.states_iter() {
        let time = match times[s as usize] {
            Some(time) => time,
            None => continue,
        };
        let a = alpha[s as usize];
        let trs = fst.get_trs(s).map_err(LatticeError::fst)?;
        for tr in trs.trs() {
            if tr.ilabel == EPS_LABEL || time >= num_frames {
                continue;
            }
            let cost =
                a + *tr.weight.value() as f64 + beta[tr.nextstate as usize] - total_cost;
            let mass = (-cost).exp();
            if mass > 0.0 {
                *frames[time].entry(tr.ilabel).or_insert(0.0) += mass;
            }
        }
    }

    let posterior = frames
        .into_iter()
        .map(|frame| {
            let mut entries: Vec<(Label, f32)> = frame
                .into_iter()
                .map(|(label, mass)| (label, mass as f32))
                .collect();
            entries.sort_by_key(|&(label, mass)| (std::cmp::Reverse(OrderedFloat(mass)), label));
            entries
        })
        .collect();
    Ok(ForwardBackward {
        posterior,
        total_cost,
    })
}
