#[allow(clippy::module_inception)]
mod cpu;
mod decoder;
mod instruction;
mod operand;
mod register;

pub use cpu::{Cpu, CpuStatus, HaltReason, StepOutcome, HALTED_STEP_CYCLES};
pub use decoder::{Decoder, Instruction, PREFIX_BYTE};
pub use instruction::{Execution, HIGH_PAGE};
pub use operand::{resolve, Binding};
pub use register::{Flag, FlagRegister, Reg16, Reg8, Registers};
