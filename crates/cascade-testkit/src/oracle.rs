//! Toy frozen problem: a perfect binary tree walk with a multiplicative hash.
//!
//! Memory layout follows the production problem's header convention so the
//! harness reads the output pointer from the same slot:
//!
//! | slot | meaning |
//! |---|---|
//! | 0 | rounds |
//! | 1 | node count |
//! | 2 | batch size |
//! | 3 | tree height |
//! | 4 | forest values pointer |
//! | 5 | input indices pointer |
//! | 6 | input values pointer |
//! | 7 | first free word |
use crate::machine::ToyMachine;
use cascade_core::{DebugInfo, Input, Instruction, Machine, Oracle, Tree, Word};
use rand::{Rng, RngCore};

pub const HEADER_WORDS: usize = 8;
pub const HASH_MUL: Word = 0x9E37_79B1;

/// One step of the walk: hash the value with the visited node.
pub fn mix(value: Word, node: Word) -> Word {
    let x = (value ^ node).wrapping_mul(HASH_MUL);
    x ^ (x >> 16)
}

/// Next index after visiting `idx` with the freshly hashed value.
pub fn step(idx: Word, value: Word, n_nodes: Word) -> Word {
    let next = idx.wrapping_mul(2).wrapping_add(1).wrapping_add(value & 1);
    if next < n_nodes {
        next
    } else {
        0
    }
}

#[derive(Debug, Default, Clone)]
pub struct ToyOracle {
    rounds_override: Option<usize>,
}

impl ToyOracle {
    pub const ID: &'static str = "toy_problem";
    pub const N_CORES: usize = 1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle whose reference transformation yields nothing at all.
    pub fn silent() -> Self {
        Self {
            rounds_override: Some(0),
        }
    }
}

impl Oracle for ToyOracle {
    fn id(&self) -> &str {
        Self::ID
    }

    fn n_cores(&self) -> usize {
        Self::N_CORES
    }

    fn generate_tree(&self, height: usize, rng: &mut dyn RngCore) -> Tree {
        let n_nodes = (1usize << (height + 1)) - 1;
        Tree {
            height,
            values: (0..n_nodes).map(|_| rng.gen::<Word>() >> 2).collect(),
        }
    }

    fn generate_input(
        &self,
        _tree: &Tree,
        batch_size: usize,
        rounds: usize,
        rng: &mut dyn RngCore,
    ) -> Input {
        Input {
            indices: vec![0; batch_size],
            values: (0..batch_size).map(|_| rng.gen::<Word>() >> 2).collect(),
            rounds,
        }
    }

    fn build_mem_image(&self, tree: &Tree, input: &Input) -> Vec<Word> {
        let forest_p = HEADER_WORDS;
        let indices_p = forest_p + tree.values.len();
        let values_p = indices_p + input.indices.len();
        let free_p = values_p + input.values.len();

        let mut mem = vec![
            input.rounds as Word,
            tree.values.len() as Word,
            input.indices.len() as Word,
            tree.height as Word,
            forest_p as Word,
            indices_p as Word,
            values_p as Word,
            free_p as Word,
        ];
        mem.extend_from_slice(&tree.values);
        mem.extend_from_slice(&input.indices);
        mem.extend_from_slice(&input.values);
        mem
    }

    fn reference_kernel<'a>(&'a self, mem: Vec<Word>) -> Box<dyn Iterator<Item = Vec<Word>> + 'a> {
        let rounds = self.rounds_override.unwrap_or(mem[0] as usize);
        Box::new(ReferenceRounds {
            mem,
            round: 0,
            rounds,
        })
    }

    fn machine(
        &self,
        mem: Vec<Word>,
        instrs: Vec<Instruction>,
        _debug_info: DebugInfo,
        n_cores: usize,
    ) -> anyhow::Result<Box<dyn Machine>> {
        Ok(Box::new(ToyMachine::new(mem, &instrs, n_cores)?))
    }
}

/// Lazy reference: yields the whole memory image after every round.
struct ReferenceRounds {
    mem: Vec<Word>,
    round: usize,
    rounds: usize,
}

impl Iterator for ReferenceRounds {
    type Item = Vec<Word>;

    fn next(&mut self) -> Option<Vec<Word>> {
        if self.round >= self.rounds {
            return None;
        }
        let n_nodes = self.mem[1];
        let batch = self.mem[2] as usize;
        let forest_p = self.mem[4] as usize;
        let indices_p = self.mem[5] as usize;
        let values_p = self.mem[6] as usize;

        for i in 0..batch {
            let idx = self.mem[indices_p + i];
            let value = mix(self.mem[values_p + i], self.mem[forest_p + idx as usize]);
            self.mem[values_p + i] = value;
            self.mem[indices_p + i] = step(idx, value, n_nodes);
        }
        self.round += 1;
        Some(self.mem.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::OUTPUT_POINTER_SLOT;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_layout_points_at_values() {
        let oracle = ToyOracle::new();
        let mut rng = StdRng::seed_from_u64(7);
        let tree = oracle.generate_tree(2, &mut rng);
        let input = oracle.generate_input(&tree, 4, 3, &mut rng);
        let mem = oracle.build_mem_image(&tree, &input);

        assert_eq!(tree.values.len(), 7);
        let values_p = mem[OUTPUT_POINTER_SLOT] as usize;
        assert_eq!(&mem[values_p..values_p + 4], input.values.as_slice());
    }

    #[test]
    fn test_reference_yields_once_per_round() {
        let oracle = ToyOracle::new();
        let mut rng = StdRng::seed_from_u64(7);
        let tree = oracle.generate_tree(3, &mut rng);
        let input = oracle.generate_input(&tree, 8, 5, &mut rng);
        let mem = oracle.build_mem_image(&tree, &input);
        assert_eq!(oracle.reference_kernel(mem.clone()).count(), 5);
        assert_eq!(ToyOracle::silent().reference_kernel(mem).count(), 0);
    }

    #[test]
    fn test_step_wraps_to_root() {
        assert_eq!(step(0, 2, 7), 1);
        assert_eq!(step(0, 3, 7), 2);
        assert_eq!(step(3, 1, 7), 0);
    }
}
