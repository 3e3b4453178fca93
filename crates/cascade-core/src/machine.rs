//! Oracle and machine contracts.
//!
//! The instruction-set machine and the reference transformation live outside
//! this workspace. The harness only needs the surface below: generate a
//! problem, build its memory image, run the reference to its terminal state,
//! and execute a candidate's instruction stream while reading back cycles and
//! memory.
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// One memory word of the simulated machine.
pub type Word = u32;

/// Slot in the oracle's memory image holding the output region pointer.
pub const OUTPUT_POINTER_SLOT: usize = 6;

/// Opaque instruction bundle; only the machine interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instruction(pub serde_json::Value);

/// Opaque debug metadata handed to the machine next to the instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugInfo(pub serde_json::Value);

/// Structural input of a problem instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub height: usize,
    pub values: Vec<Word>,
}

/// Value input of a problem instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub indices: Vec<Word>,
    pub values: Vec<Word>,
    pub rounds: usize,
}

/// Executes a compiled instruction stream against a memory image.
pub trait Machine {
    fn set_enable_pause(&mut self, enabled: bool);

    fn set_enable_debug(&mut self, enabled: bool);

    /// Run to completion.
    fn run(&mut self) -> anyhow::Result<()>;

    /// Cycle counter after `run`.
    fn cycle(&self) -> u64;

    fn mem(&self) -> &[Word];
}

/// The fixed, trusted reference module.
pub trait Oracle: Send + Sync {
    /// Identifier of the frozen problem (e.g. `frozen_problem@5452f74`).
    fn id(&self) -> &str;

    fn n_cores(&self) -> usize;

    fn generate_tree(&self, height: usize, rng: &mut dyn RngCore) -> Tree;

    fn generate_input(
        &self,
        tree: &Tree,
        batch_size: usize,
        rounds: usize,
        rng: &mut dyn RngCore,
    ) -> Input;

    fn build_mem_image(&self, tree: &Tree, input: &Input) -> Vec<Word>;

    /// Lazy reference transformation. Each item is an intermediate memory
    /// state; only the last one is meaningful to the harness.
    fn reference_kernel<'a>(&'a self, mem: Vec<Word>) -> Box<dyn Iterator<Item = Vec<Word>> + 'a>;

    fn machine(
        &self,
        mem: Vec<Word>,
        instrs: Vec<Instruction>,
        debug_info: DebugInfo,
        n_cores: usize,
    ) -> anyhow::Result<Box<dyn Machine>>;
}
