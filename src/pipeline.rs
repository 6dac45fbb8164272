use anyhow::{anyhow, Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::archive::{ExampleReader, ExampleWriter};
use crate::config::CopyConfig;
use crate::error::ReweightError;
use crate::example::Example;
use crate::reweight::LatticeReweighter;
use crate::route::OutputRouter;
use crate::sample::ExpectedCountSampler;

/// Where the pipeline is in the example stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Waiting for the next input example
    Reading,
    /// Drawing the number of copies of the current example
    Sampling,
    /// Writing copies of the current example
    Emitting,
    /// Input exhausted, outputs flushed
    Closed,
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub num_read: u64,
    pub num_written: u64,
    pub num_frames_written: u64,
    /// Copies dropped because reweighting failed
    pub num_failed: u64,
}

impl CopyStats {
    /// Process exit status: writing nothing at all counts as failure.
    pub fn exit_code(&self) -> u8 {
        if self.num_written == 0 {
            1
        } else {
            0
        }
    }
}

/// Copies examples from one reader to several writers, subsampling or
/// replicating them and optionally reweighting them from their lattices.
///
/// A single generator, seeded from the configuration, serves both the
/// copy count of each example and the random choice of output for each
/// copy, in that order.
#[derive(Debug)]
pub struct Pipeline {
    config: CopyConfig,
    sampler: ExpectedCountSampler,
    router: OutputRouter,
    reweighter: Option<LatticeReweighter>,
    rng: ChaCha8Rng,
    stats: CopyStats,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(config: CopyConfig, num_outputs: usize) -> Result<Self> {
        config.validate()?;
        let sampler = ExpectedCountSampler::new(config.keep_proportion)?;
        let router = OutputRouter::new(num_outputs, config.random)?;
        let reweighter = if config.add_best_path_weights {
            Some(LatticeReweighter::new(config.scale))
        } else {
            None
        };
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            sampler,
            router,
            reweighter,
            rng,
            stats: CopyStats::default(),
            state: PipelineState::Reading,
        })
    }

    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    pub fn stats(&self) -> CopyStats {
        self.stats
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Process the whole input, then close the writers in order.
    pub fn run<R, W>(&mut self, reader: &mut R, writers: &mut [W]) -> Result<CopyStats>
    where
        R: ExampleReader + ?Sized,
        W: ExampleWriter,
    {
        if writers.len() != self.router.num_outputs() {
            return Err(anyhow!(
                "pipeline was set up for {} outputs but got {}",
                self.router.num_outputs(),
                writers.len()
            ));
        }
        while !reader.done() {
            self.state = PipelineState::Reading;
            self.copy_current(reader, writers)?;
            reader.next().context("reading examples")?;
            self.stats.num_read += 1;
        }
        for (index, writer) in writers.iter_mut().enumerate() {
            writer
                .close()
                .with_context(|| format!("closing output {}", index))?;
        }
        self.state = PipelineState::Closed;
        info!(
            "Read {} discriminative unsupervised examples, wrote {}, consisting of {} frames.",
            self.stats.num_read, self.stats.num_written, self.stats.num_frames_written
        );
        if self.stats.num_failed > 0 {
            info!("Skipped {} copies whose best path failed.", self.stats.num_failed);
        }
        Ok(self.stats)
    }

    fn copy_current<R, W>(&mut self, reader: &R, writers: &mut [W]) -> Result<()>
    where
        R: ExampleReader + ?Sized,
        W: ExampleWriter,
    {
        let key = reader.key()?;
        let eg = reader.value()?;

        self.state = PipelineState::Sampling;
        let count = self.sampler.sample(&mut self.rng)?;

        self.state = PipelineState::Emitting;
        // Reweighting does not depend on the copy, so do it at most once
        let mut reweighted: Option<Result<Example, ReweightError>> = None;
        for _ in 0..count {
            let index = self.router.select(self.stats.num_written, &mut self.rng);
            let out: &Example = match &self.reweighter {
                None => eg,
                Some(reweighter) => {
                    let result = reweighted.get_or_insert_with(|| {
                        let mut copy = eg.clone();
                        reweighter.apply(&mut copy).map(|()| copy)
                    });
                    match result {
                        Ok(copy) => copy,
                        Err(err) => {
                            warn!("Best-path failed for key {}: {}", key, err);
                            self.stats.num_failed += 1;
                            continue;
                        }
                    }
                }
            };
            // Output keys are the running write count, unique over all outputs
            let out_key = self.stats.num_written.to_string();
            writers[index]
                .write(&out_key, out)
                .with_context(|| format!("writing {} to output {}", out_key, index))?;
            debug!("wrote {} as {} to output {}", key, out_key, index);
            self.stats.num_written += 1;
            self.stats.num_frames_written += eg.num_frames as u64;
        }
        self.state = PipelineState::Reading;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{MemoryReader, MemoryWriter};
    use crate::lattice::{Lattice, LatticeWeight};

    fn linear_eg(labels: &[u32]) -> Example {
        let arcs: Vec<_> = labels
            .iter()
            .map(|&label| (label, LatticeWeight::new(0.5, 0.5)))
            .collect();
        Example::new(Lattice::linear(&arcs), labels.len())
    }

    fn reader(egs: Vec<Example>) -> MemoryReader {
        MemoryReader::new(
            egs.into_iter()
                .enumerate()
                .map(|(i, eg)| (format!("utt{}", i), eg))
                .collect(),
        )
    }

    #[test]
    fn it_copies_everything_by_default() {
        let mut input = reader(vec![linear_eg(&[1, 2]), linear_eg(&[3])]);
        let mut outputs = vec![MemoryWriter::new()];
        let mut pipeline = Pipeline::new(CopyConfig::default(), 1).unwrap();
        let stats = pipeline.run(&mut input, &mut outputs).unwrap();
        assert_eq!(
            stats,
            CopyStats {
                num_read: 2,
                num_written: 2,
                num_frames_written: 3,
                num_failed: 0
            }
        );
        assert_eq!(pipeline.state(), PipelineState::Closed);
        assert!(outputs[0].is_closed());
        let keys: Vec<&str> = outputs[0].records().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["0", "1"]);
        assert_eq!(stats.exit_code(), 0);
    }

    #[test]
    fn it_skips_failed_copies() {
        let mut input = reader(vec![
            Example::new(Lattice::new(), 2),
            linear_eg(&[4, 5, 6]),
        ]);
        let mut outputs = vec![MemoryWriter::new(), MemoryWriter::new()];
        let config = CopyConfig {
            add_best_path_weights: true,
            keep_proportion: 2.0,
            ..Default::default()
        };
        let mut pipeline = Pipeline::new(config, 2).unwrap();
        let stats = pipeline.run(&mut input, &mut outputs).unwrap();
        assert_eq!(stats.num_read, 2);
        assert_eq!(stats.num_written, 2);
        assert_eq!(stats.num_failed, 2);
        assert_eq!(stats.num_frames_written, 6);
        // failed copies do not consume a key or an output slot
        assert_eq!(outputs[0].records()[0].0, "0");
        assert_eq!(outputs[1].records()[0].0, "1");
        assert_eq!(outputs[0].records()[0].1.alignment, vec![4, 5, 6]);
    }

    #[test]
    fn it_fails_when_nothing_is_written() {
        let mut input = reader(vec![linear_eg(&[1])]);
        let mut outputs = vec![MemoryWriter::new()];
        let config = CopyConfig {
            keep_proportion: 0.0,
            ..Default::default()
        };
        let stats = Pipeline::new(config, 1)
            .unwrap()
            .run(&mut input, &mut outputs)
            .unwrap();
        assert_eq!(stats.num_read, 1);
        assert_eq!(stats.num_written, 0);
        assert_eq!(stats.exit_code(), 1);
    }

    #[test]
    fn it_rejects_bad_setup() {
        let config = CopyConfig {
            keep_proportion: -1.0,
            ..Default::default()
        };
        assert!(Pipeline::new(config, 1).is_err());
        assert!(Pipeline::new(CopyConfig::default(), 0).is_err());
        let mut pipeline = Pipeline::new(CopyConfig::default(), 2).unwrap();
        let mut outputs = vec![MemoryWriter::new()];
        assert!(pipeline.run(&mut reader(vec![]), &mut outputs).is_err());
    }

    #[test]
    fn it_ignores_write_as_supervised() {
        let egs = vec![linear_eg(&[1, 2]), linear_eg(&[3])];
        let mut plain = vec![MemoryWriter::new()];
        let mut supervised = vec![MemoryWriter::new()];
        Pipeline::new(CopyConfig::default(), 1)
            .unwrap()
            .run(&mut reader(egs.clone()), &mut plain)
            .unwrap();
        let config = CopyConfig {
            write_as_supervised: true,
            ..Default::default()
        };
        Pipeline::new(config, 1)
            .unwrap()
            .run(&mut reader(egs), &mut supervised)
            .unwrap();
        assert_eq!(plain[0].records(), supervised[0].records());
    }
}
