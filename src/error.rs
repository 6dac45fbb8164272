use rustfst::StateId;
use thiserror::Error;

/// Failures of the per-lattice graph algorithms.
#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("lattice has no path from the start state to a final state")]
    NoPath,
    #[error("lattice is cyclic, cannot sort it topologically")]
    Cyclic,
    #[error("state {state} is reached at frames {first} and {second}")]
    InconsistentTimes {
        state: StateId,
        first: usize,
        second: usize,
    },
    #[error("state {state} out of range (lattice has {num_states} states)")]
    BadState { state: StateId, num_states: usize },
    #[error("FST operation failed: {0}")]
    Fst(#[source] anyhow::Error),
}

impl LatticeError {
    pub(crate) fn fst(err: anyhow::Error) -> Self {
        Self::Fst(err)
    }
}

/// Reasons an example could not be reweighted. All of these are
/// recoverable: the replica is skipped and the stream continues.
#[derive(Debug, Error)]
pub enum ReweightError {
    #[error(transparent)]
    Lattice(#[from] LatticeError),
    #[error("{what} has {found} frames, example has {expected}")]
    FrameCountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("expected count must be between 0 and 4294967294, got {0}")]
    InvalidExpectedCount(f64),
}

/// Faults of the example readers and writers. These abort the run.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad record at {location}: {source}")]
    Format {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("reader is exhausted")]
    Exhausted,
}

impl ArchiveError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn format(location: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Format {
            location: location.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("keep proportion must be between 0 and 4294967294, got {0}")]
    KeepProportion(f64),
    #[error("{name} must be finite, got {value}")]
    Scale { name: &'static str, value: f32 },
    #[error("need at least one output")]
    NoOutputs,
}
