//! Kernel builders used as candidates in tests.
use crate::machine::Op;
use crate::oracle::HASH_MUL;
use anyhow::bail;
use cascade_core::{DebugInfo, Instruction, KernelBuilder, KernelParams};
use serde_json::json;

// Scratch register map shared by the builders below.
const R_TMP: usize = 0;
const R_FOREST: usize = 1;
const R_IDX_P: usize = 2;
const R_VAL_P: usize = 3;
const R_NODES: usize = 4;
const R_ONE: usize = 5;
const R_TWO: usize = 6;
const R_MUL: usize = 7;
const R_SHIFT: usize = 8;
const R_ZERO: usize = 9;
const R_I: usize = 10;
const R_ADDR_I: usize = 11;
const R_IDX: usize = 12;
const R_ADDR_V: usize = 13;
const R_VAL: usize = 14;
const R_ADDR_N: usize = 15;
const R_NODE: usize = 16;
const R_T: usize = 17;
const R_BIT: usize = 18;
const R_IN: usize = 19;

fn load_header(ops: &mut Vec<Op>, slot: u32, dst: usize) {
    ops.push(Op::Const { dst: R_TMP, imm: slot });
    ops.push(Op::Load { dst, addr: R_TMP });
}

/// Straight-line scalar kernel reproducing the toy oracle exactly.
///
/// Emits a leading `pause` and `debug_check`, so it only produces the right
/// answer when the harness turns both instrumentation flags off.
#[derive(Debug, Default, Clone)]
pub struct ReferenceKernel {
    instrs: Vec<Instruction>,
}

impl ReferenceKernel {
    pub fn ops(params: &KernelParams) -> Vec<Op> {
        let mut ops = vec![Op::Pause, Op::DebugCheck];
        load_header(&mut ops, 4, R_FOREST);
        load_header(&mut ops, 5, R_IDX_P);
        load_header(&mut ops, 6, R_VAL_P);
        load_header(&mut ops, 1, R_NODES);
        ops.extend([
            Op::Const { dst: R_ONE, imm: 1 },
            Op::Const { dst: R_TWO, imm: 2 },
            Op::Const { dst: R_MUL, imm: HASH_MUL },
            Op::Const { dst: R_SHIFT, imm: 16 },
            Op::Const { dst: R_ZERO, imm: 0 },
        ]);

        for _ in 0..params.round_count {
            for i in 0..params.index_count {
                ops.extend([
                    Op::Const { dst: R_I, imm: i as u32 },
                    Op::Add { dst: R_ADDR_I, a: R_IDX_P, b: R_I },
                    Op::Load { dst: R_IDX, addr: R_ADDR_I },
                    Op::Add { dst: R_ADDR_V, a: R_VAL_P, b: R_I },
                    Op::Load { dst: R_VAL, addr: R_ADDR_V },
                    Op::Add { dst: R_ADDR_N, a: R_FOREST, b: R_IDX },
                    Op::Load { dst: R_NODE, addr: R_ADDR_N },
                    Op::Xor { dst: R_VAL, a: R_VAL, b: R_NODE },
                    Op::Mul { dst: R_VAL, a: R_VAL, b: R_MUL },
                    Op::Shr { dst: R_T, a: R_VAL, b: R_SHIFT },
                    Op::Xor { dst: R_VAL, a: R_VAL, b: R_T },
                    Op::And { dst: R_BIT, a: R_VAL, b: R_ONE },
                    Op::Mul { dst: R_IDX, a: R_IDX, b: R_TWO },
                    Op::Add { dst: R_IDX, a: R_IDX, b: R_ONE },
                    Op::Add { dst: R_IDX, a: R_IDX, b: R_BIT },
                    Op::Lt { dst: R_IN, a: R_IDX, b: R_NODES },
                    Op::Select { dst: R_IDX, cond: R_IN, a: R_IDX, b: R_ZERO },
                    Op::Store { addr: R_ADDR_I, src: R_IDX },
                    Op::Store { addr: R_ADDR_V, src: R_VAL },
                ]);
            }
        }
        ops
    }

    /// Cycles the toy machine reports for this kernel.
    pub fn cycle_count(params: &KernelParams) -> u64 {
        Self::ops(params).iter().filter(|op| op.costs_cycle()).count() as u64
    }
}

impl KernelBuilder for ReferenceKernel {
    fn build_kernel(&mut self, params: &KernelParams) -> anyhow::Result<()> {
        self.instrs = Self::ops(params).into_iter().map(Op::to_instruction).collect();
        Ok(())
    }

    fn instrs(&self) -> &[Instruction] {
        &self.instrs
    }

    fn debug_info(&self) -> DebugInfo {
        DebugInfo(json!({ "kernel": "reference" }))
    }
}

/// Writes zeros over the output region.
#[derive(Debug, Default, Clone)]
pub struct ZeroKernel {
    instrs: Vec<Instruction>,
}

impl KernelBuilder for ZeroKernel {
    fn build_kernel(&mut self, params: &KernelParams) -> anyhow::Result<()> {
        let mut ops = Vec::new();
        load_header(&mut ops, 6, R_VAL_P);
        ops.push(Op::Const { dst: R_ZERO, imm: 0 });
        for i in 0..params.index_count {
            ops.extend([
                Op::Const { dst: R_I, imm: i as u32 },
                Op::Add { dst: R_ADDR_V, a: R_VAL_P, b: R_I },
                Op::Store { addr: R_ADDR_V, src: R_ZERO },
            ]);
        }
        self.instrs = ops.into_iter().map(Op::to_instruction).collect();
        Ok(())
    }

    fn instrs(&self) -> &[Instruction] {
        &self.instrs
    }

    fn debug_info(&self) -> DebugInfo {
        DebugInfo::default()
    }
}

/// Panics inside `build_kernel`.
#[derive(Debug, Default, Clone)]
pub struct PanickingKernel;

impl KernelBuilder for PanickingKernel {
    fn build_kernel(&mut self, _params: &KernelParams) -> anyhow::Result<()> {
        panic!("index out of range in build_kernel");
    }

    fn instrs(&self) -> &[Instruction] {
        &[]
    }

    fn debug_info(&self) -> DebugInfo {
        DebugInfo::default()
    }
}

/// Returns an error from `build_kernel`.
#[derive(Debug, Default, Clone)]
pub struct FailingKernel;

impl KernelBuilder for FailingKernel {
    fn build_kernel(&mut self, params: &KernelParams) -> anyhow::Result<()> {
        bail!("NameError: name 'VLEN' is not defined ({})", params)
    }

    fn instrs(&self) -> &[Instruction] {
        &[]
    }

    fn debug_info(&self) -> DebugInfo {
        DebugInfo::default()
    }
}

/// Kernel-file document compiling `builder` once per parameter set.
pub fn kernel_file_json(
    name: &str,
    builder: &mut dyn KernelBuilder,
    params: &[KernelParams],
) -> anyhow::Result<serde_json::Value> {
    let mut kernels = Vec::with_capacity(params.len());
    for p in params {
        builder.build_kernel(p)?;
        kernels.push(json!({
            "params": p,
            "instrs": builder.instrs(),
            "debug_info": builder.debug_info(),
        }));
    }
    Ok(json!({ "name": name, "kernels": kernels }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::ToyMachine;
    use crate::oracle::ToyOracle;
    use cascade_core::{Machine, Oracle, OUTPUT_POINTER_SLOT};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_reference_kernel_matches_oracle() {
        let oracle = ToyOracle::new();
        let mut rng = StdRng::seed_from_u64(42);
        let tree = oracle.generate_tree(3, &mut rng);
        let input = oracle.generate_input(&tree, 16, 5, &mut rng);
        let mem = oracle.build_mem_image(&tree, &input);
        let params = KernelParams {
            tree_height: 3,
            value_count: tree.values.len(),
            index_count: 16,
            round_count: 5,
        };

        let mut kb = ReferenceKernel::default();
        kb.build_kernel(&params).unwrap();
        let mut machine = ToyMachine::new(mem.clone(), kb.instrs(), 1).unwrap();
        machine.set_enable_pause(false);
        machine.set_enable_debug(false);
        machine.run().unwrap();

        let expected = oracle.reference_kernel(mem).last().unwrap();
        let p = expected[OUTPUT_POINTER_SLOT] as usize;
        assert_eq!(&machine.mem()[p..p + 16], &expected[p..p + 16]);
        assert_eq!(machine.cycle(), ReferenceKernel::cycle_count(&params));
    }

    #[test]
    fn test_cycle_count_formula() {
        let params = KernelParams {
            tree_height: 10,
            value_count: 2047,
            index_count: 256,
            round_count: 16,
        };
        assert_eq!(ReferenceKernel::cycle_count(&params), 13 + 16 * 256 * 19);
    }

    #[test]
    fn test_kernel_file_document() {
        let params = KernelParams {
            tree_height: 1,
            value_count: 3,
            index_count: 2,
            round_count: 1,
        };
        let doc = kernel_file_json("zero", &mut ZeroKernel::default(), &[params]).unwrap();
        assert_eq!(doc["kernels"].as_array().unwrap().len(), 1);
        assert_eq!(doc["kernels"][0]["params"]["index_count"], 2);
    }
}
