use rustfst::fst_impls::VectorFst;
use rustfst::semirings::{LogWeight, TropicalWeight};

/// rustfst does not define this but we will
type StdVectorFst = VectorFst<TropicalWeight>;
/// Lattices converted for forward-backward
type LogVectorFst = VectorFst<LogWeight>;

/// Best path, topological sort and forward-backward over lattices
pub mod algorithms;
/// Keyed sequential readers and writers of examples
pub mod archive;
pub mod config;
pub mod error;
pub mod example;
/// Weighted lattices with separate graph and acoustic costs
pub mod lattice;
/// The copy loop: sample, route, reweight, write
pub mod pipeline;
/// Best path alignments with posterior weights
pub mod reweight;
/// Choose an output for each copy
pub mod route;
/// Stochastic rounding of the keep proportion
pub mod sample;

pub use algorithms::{forward_backward, shortest_path, BestPath, ForwardBackward, Posterior};
pub use archive::{
    ExampleReader, ExampleWriter, JsonLinesReader, JsonLinesWriter, MemoryReader, MemoryWriter,
};
pub use config::CopyConfig;
pub use error::{ArchiveError, ConfigError, LatticeError, ReweightError, SampleError};
pub use example::Example;
pub use lattice::{Lattice, LatticeArc, LatticeState, LatticeWeight, ScalePair};
pub use pipeline::{CopyStats, Pipeline, PipelineState};
pub use reweight::{LatticeReweighter, Reweighted};
pub use route::OutputRouter;
pub use sample::{get_count, ExpectedCountSampler, MAX_EXPECTED_COUNT};
