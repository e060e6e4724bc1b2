pub mod catalog;
mod component;
pub mod cpu;
mod error;
mod memory;

pub use catalog::Catalog;
pub use component::{Address, Addressable};
pub use cpu::{Cpu, CpuStatus, HaltReason, StepOutcome};
pub use error::{CatalogError, Error, Result};
pub use memory::{MemoryBus, ADDRESS_SPACE_SIZE};
