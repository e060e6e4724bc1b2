use std::fmt;

use log::info;

use crate::catalog::Catalog;
use crate::component::Addressable;
use crate::cpu::decoder::Decoder;
use crate::cpu::register::Registers;
use crate::error::Result;
use crate::memory::MemoryBus;

/// T-cycles a halted CPU reports per step.
pub const HALTED_STEP_CYCLES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Halt,
    Stop,
    IllegalOpcode(u8),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Halt => write!(f, "HALT"),
            Self::Stop => write!(f, "STOP"),
            Self::IllegalOpcode(opcode) => write!(f, "illegal opcode {:#04x}", opcode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuStatus {
    Running,
    Halted(HaltReason),
}

/// Result of one `Cpu::step`: the T-cycles it took and the CPU status afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub cycles: u32,
    pub status: CpuStatus,
}

pub struct Cpu<B: Addressable = MemoryBus> {
    pub registers: Registers,
    pub bus: B,
    status: CpuStatus,
}

impl Cpu<MemoryBus> {
    /// A CPU over an empty 64 KiB bus with every register zero.
    pub fn new() -> Self {
        Self::with_bus(MemoryBus::new())
    }

    /// A CPU whose bus holds `image` from address 0.
    pub fn from_image(image: &[u8]) -> Result<Self> {
        Ok(Self::with_bus(MemoryBus::from_image(image)?))
    }
}

impl Default for Cpu<MemoryBus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Addressable> Cpu<B> {
    pub fn with_bus(bus: B) -> Self {
        Self {
            registers: Registers::default(),
            bus,
            status: CpuStatus::Running,
        }
    }

    /// Initialize the registers to post-bootrom values
    pub fn emulate_bootrom(&mut self) {
        self.registers.pc = 0x100;
        self.registers.a = 0x01;
        self.registers.f = 0xB0.into();
        self.registers.set_bc(0x0013);
        self.registers.set_de(0x00D8);
        self.registers.set_hl(0x014D);
        self.registers.sp = 0xFFFE;
    }

    pub fn status(&self) -> CpuStatus {
        self.status
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.status, CpuStatus::Halted(_))
    }

    /// Clears a halt so the next step executes at the current `PC`. After an illegal opcode
    /// `PC` still points at it, so the host moves `PC` first if it wants to skip the byte.
    pub fn resume(&mut self) {
        if let CpuStatus::Halted(reason) = self.status {
            info!("CPU resumed at {:#06x} after {}", self.registers.pc, reason);
        }
        self.status = CpuStatus::Running;
    }

    /// Zeroes the registers and clears any halt. The bus is left as it is.
    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.status = CpuStatus::Running;
    }

    /// Decodes and executes one instruction, then commits the new `PC`. On error nothing is
    /// committed and `PC` still points at the failing instruction.
    pub fn step(&mut self, catalog: &Catalog) -> Result<StepOutcome> {
        if self.is_halted() {
            return Ok(StepOutcome {
                cycles: HALTED_STEP_CYCLES,
                status: self.status,
            });
        }

        let instruction = Decoder::new(catalog).decode(&self.registers, &mut self.bus)?;
        let execution = self.execute_instruction(&instruction)?;

        self.registers.pc = execution.next_pc;
        if let Some(reason) = execution.halt {
            info!("CPU halted at {:#06x}: {}", instruction.address, reason);
            self.status = CpuStatus::Halted(reason);
        }

        Ok(StepOutcome {
            cycles: execution.cycles.into(),
            status: self.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cpu_is_zeroed() {
        let cpu = Cpu::new();
        assert_eq!(Registers::default(), cpu.registers);
        assert_eq!(CpuStatus::Running, cpu.status());
    }

    #[test]
    fn test_bootrom_state() {
        let mut cpu = Cpu::new();
        cpu.emulate_bootrom();
        assert_eq!(0x0100, cpu.registers.pc);
        assert_eq!(0xfffe, cpu.registers.sp);
        assert_eq!(0x01b0, cpu.registers.get_af());
        assert_eq!(0x0013, cpu.registers.get_bc());
        assert_eq!(0x00d8, cpu.registers.get_de());
        assert_eq!(0x014d, cpu.registers.get_hl());
    }

    #[test]
    fn test_step_commits_pc_once() {
        let catalog = Catalog::builtin().unwrap();
        let mut cpu = Cpu::from_image(&[0x01, 0x34, 0x12, 0x00]).unwrap();

        let outcome = cpu.step(&catalog).unwrap();
        assert_eq!(3, cpu.registers.pc);
        assert_eq!(0x1234, cpu.registers.get_bc());
        assert_eq!(12, outcome.cycles);
        assert_eq!(CpuStatus::Running, outcome.status);
    }

    #[test]
    fn test_halted_cpu_idles() {
        let catalog = Catalog::builtin().unwrap();
        let mut cpu = Cpu::from_image(&[0x76, 0x3e, 0x01]).unwrap();

        let outcome = cpu.step(&catalog).unwrap();
        assert_eq!(CpuStatus::Halted(HaltReason::Halt), outcome.status);
        assert_eq!(1, cpu.registers.pc);

        let outcome = cpu.step(&catalog).unwrap();
        assert_eq!(HALTED_STEP_CYCLES, outcome.cycles);
        assert_eq!(1, cpu.registers.pc);
        assert_eq!(0, cpu.registers.a);
    }

    #[test]
    fn test_resume_after_illegal_opcode() {
        let catalog = Catalog::builtin().unwrap();
        // ILLEGAL, LD A, $2A
        let mut cpu = Cpu::from_image(&[0xd3, 0x3e, 0x2a]).unwrap();

        let outcome = cpu.step(&catalog).unwrap();
        assert_eq!(CpuStatus::Halted(HaltReason::IllegalOpcode(0xd3)), outcome.status);
        assert_eq!(0, cpu.registers.pc);

        cpu.registers.pc += 1;
        cpu.resume();
        assert!(!cpu.is_halted());

        let outcome = cpu.step(&catalog).unwrap();
        assert_eq!(CpuStatus::Running, outcome.status);
        assert_eq!(0x2a, cpu.registers.a);
        assert_eq!(3, cpu.registers.pc);
    }

    #[test]
    fn test_reset_clears_halt_and_registers() {
        let catalog = Catalog::builtin().unwrap();
        // LD A, $07; HALT
        let mut cpu = Cpu::from_image(&[0x3e, 0x07, 0x76]).unwrap();
        cpu.step(&catalog).unwrap();
        cpu.step(&catalog).unwrap();
        assert!(cpu.is_halted());

        cpu.reset();
        assert_eq!(CpuStatus::Running, cpu.status());
        assert_eq!(Registers::default(), cpu.registers);
        assert_eq!(0x3e, cpu.bus.read_u8(0).unwrap());

        cpu.step(&catalog).unwrap();
        assert_eq!(0x07, cpu.registers.a);
    }

    #[test]
    fn test_failed_step_leaves_pc() {
        let catalog = Catalog::builtin().unwrap();
        // XOR A
        let mut cpu = Cpu::from_image(&[0xaf]).unwrap();
        assert!(cpu.step(&catalog).is_err());
        assert_eq!(0, cpu.registers.pc);
        assert_eq!(CpuStatus::Running, cpu.status());
    }
}
