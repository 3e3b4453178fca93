//! Cascade Testkit: a deterministic stand-in for the frozen problem.
//!
//! The production oracle and machine live outside this workspace. Tests use
//! `ToyOracle`, which keeps the production memory-header convention (output
//! pointer in slot 6) and defaults both instrumentation flags to on, so the
//! harness has to switch them off like it would for the real machine.

pub mod kernels;
pub mod machine;
pub mod oracle;

pub use kernels::{kernel_file_json, FailingKernel, PanickingKernel, ReferenceKernel, ZeroKernel};
pub use machine::{Op, ToyMachine};
pub use oracle::ToyOracle;
