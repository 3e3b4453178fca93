//! Problem instance generation
use cascade_core::{Oracle, ProblemInstance, StageParams};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Draws problem instances of one stage's size from the oracle.
#[derive(Clone, Copy)]
pub struct ProblemGenerator<'a> {
    oracle: &'a dyn Oracle,
}

impl<'a> ProblemGenerator<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self {
        Self { oracle }
    }

    /// Tree first, then input, both from the same stream.
    pub fn generate(&self, params: &StageParams, rng: &mut dyn RngCore) -> ProblemInstance {
        let tree = self.oracle.generate_tree(params.tree_height, rng);
        let input = self
            .oracle
            .generate_input(&tree, params.batch_size, params.rounds, rng);
        let mem = self.oracle.build_mem_image(&tree, &input);
        ProblemInstance { tree, input, mem }
    }

    /// The instances a stage will run, drawn one at a time.
    ///
    /// A seed makes the whole sequence reproducible. Without one each trial
    /// gets a freshly seeded generator.
    pub fn instances(&self, params: &StageParams, seed: Option<u64>) -> Instances<'a> {
        Instances {
            generator: *self,
            params: params.clone(),
            seeded: seed.map(StdRng::seed_from_u64),
            remaining: params.trials,
        }
    }
}

/// Lazy sequence of a stage's problem instances.
pub struct Instances<'a> {
    generator: ProblemGenerator<'a>,
    params: StageParams,
    seeded: Option<StdRng>,
    remaining: usize,
}

impl Iterator for Instances<'_> {
    type Item = ProblemInstance;

    fn next(&mut self) -> Option<ProblemInstance> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let instance = match self.seeded.as_mut() {
            Some(rng) => self.generator.generate(&self.params, rng),
            None => self.generator.generate(&self.params, &mut StdRng::from_entropy()),
        };
        Some(instance)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_testkit::ToyOracle;

    #[test]
    fn test_seeded_instances_repeat() {
        let oracle = ToyOracle::new();
        let generator = ProblemGenerator::new(&oracle);
        let params = StageParams::smoke();

        let a: Vec<_> = generator.instances(&params, Some(42)).collect();
        let b: Vec<_> = generator.instances(&params, Some(42)).collect();
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_instance_shape_follows_params() {
        let oracle = ToyOracle::new();
        let generator = ProblemGenerator::new(&oracle);
        let params = StageParams::smoke();
        let instance = generator.generate(&params, &mut StdRng::seed_from_u64(1));

        let kp = instance.kernel_params();
        assert_eq!(kp.tree_height, 5);
        assert_eq!(kp.value_count, 63);
        assert_eq!(kp.index_count, 64);
        assert_eq!(kp.round_count, 4);
        assert_eq!(instance.output_len(), 64);
    }

    #[test]
    fn test_unseeded_trials_differ() {
        let oracle = ToyOracle::new();
        let generator = ProblemGenerator::new(&oracle);
        let params = StageParams {
            trials: 2,
            ..StageParams::smoke()
        };
        let instances: Vec<_> = generator.instances(&params, None).collect();
        assert_eq!(instances.len(), 2);
        assert_ne!(instances[0].input.values, instances[1].input.values);
    }
}
