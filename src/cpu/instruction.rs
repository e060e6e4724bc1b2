use log::{debug, warn};
use strum::IntoEnumIterator;

use crate::catalog::{FlagEffect, Mnemonic};
use crate::component::{Address, Addressable};
use crate::cpu::cpu::{Cpu, HaltReason};
use crate::cpu::decoder::Instruction;
use crate::cpu::operand::Binding;
use crate::cpu::register::{Flag, Reg16};
use crate::error::{Error, Result};

/// Start of the page addressed by `LDH`.
pub const HIGH_PAGE: Address = 0xFF00;

/// What executing one instruction did: its cost, where execution continues, and whether the CPU
/// stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    pub cycles: u8,
    pub next_pc: Address,
    pub halt: Option<HaltReason>,
}

fn shape_error(instruction: &Instruction) -> Error {
    let operands = instruction
        .operands
        .iter()
        .map(|binding| format!("{:?}", binding))
        .collect::<Vec<_>>()
        .join(", ");
    Error::OperandShape {
        mnemonic: instruction.mnemonic(),
        prefixed: instruction.prefixed,
        opcode: instruction.opcode,
        operands,
    }
}

fn unimplemented(instruction: &Instruction) -> Error {
    Error::UnimplementedInstruction {
        mnemonic: instruction.mnemonic(),
        prefixed: instruction.prefixed,
        opcode: instruction.opcode,
    }
}

/// Splits off a leading condition code. Unconditional forms always branch.
fn split_condition(operands: &[Binding], flags: impl Fn(Flag) -> bool) -> (bool, &[Binding]) {
    match operands {
        [Binding::Condition(condition), rest @ ..] => {
            (condition.holds(flags(condition.flag())), rest)
        }
        rest => (true, rest),
    }
}

impl<B: Addressable> Cpu<B> {
    fn read_byte(&mut self, instruction: &Instruction, binding: &Binding) -> Result<u8> {
        match binding {
            Binding::Register(reg) => Ok(self.registers.read8(*reg)),
            Binding::Memory { address, .. } => self.bus.read_u8(*address),
            Binding::Value8(value) => Ok(*value),
            _ => Err(shape_error(instruction)),
        }
    }

    fn write_byte(&mut self, instruction: &Instruction, binding: &Binding, value: u8) -> Result<()> {
        match binding {
            Binding::Register(reg) => {
                self.registers.write8(*reg, value);
                Ok(())
            }
            Binding::Memory { address, .. } => self.bus.write_u8(*address, value),
            _ => Err(shape_error(instruction)),
        }
    }

    pub fn push_word(&mut self, value: u16) -> Result<()> {
        self.registers.sp = self.registers.sp.wrapping_sub(2);
        self.bus.write_u16(self.registers.sp, value)
    }

    pub fn pop_word(&mut self) -> Result<u16> {
        let value = self.bus.read_u16(self.registers.sp)?;
        self.registers.sp = self.registers.sp.wrapping_add(2);
        Ok(value)
    }

    /// Applies `(HL+)`/`(HL-)` once the access through the binding is done.
    fn apply_post_adjust(&mut self, operands: &[Binding]) {
        for binding in operands {
            if let Binding::Memory {
                adjust: Some(adjust),
                ..
            } = binding
            {
                let hl = self.registers.get_hl();
                self.registers.set_hl(adjust.apply(hl));
            }
        }
    }

    /// Forces the flags the catalog marks as set or reset. Computed flags are left to the
    /// instruction family.
    fn apply_flag_effects(&mut self, instruction: &Instruction) {
        for flag in Flag::iter() {
            match instruction.spec.flags.get(flag) {
                FlagEffect::Set => self.registers.set_flag(flag, true),
                FlagEffect::Reset => self.registers.set_flag(flag, false),
                FlagEffect::Unaffected | FlagEffect::Computed => {}
            }
        }
    }

    fn execute_load(&mut self, instruction: &Instruction, operands: &[Binding]) -> Result<()> {
        match operands {
            [Binding::RegisterPair(Reg16::HL), Binding::RegisterPair(Reg16::SP), Binding::Displacement(displacement)] =>
            {
                let sp = self.registers.sp;
                let offset = *displacement as i16 as u16;
                let sum = sp.wrapping_add(offset);
                self.registers.set_hl(sum);

                self.registers.f.half_carry = (sp ^ offset ^ sum) & 0x10 == 0x10;
                self.registers.f.carry = (sp ^ offset ^ sum) & 0x100 == 0x100;
            }
            [Binding::RegisterPair(target), Binding::Value16(value)] => {
                self.registers.write16(*target, *value);
            }
            [Binding::RegisterPair(target), Binding::RegisterPair(source)] => {
                let value = self.registers.read16(*source);
                self.registers.write16(*target, value);
            }
            [Binding::Memory { address, .. }, Binding::RegisterPair(source)] => {
                let value = self.registers.read16(*source);
                self.bus.write_u16(*address, value)?;
            }
            [target, source] => {
                let value = self.read_byte(instruction, source)?;
                self.write_byte(instruction, target, value)?;
            }
            _ => return Err(shape_error(instruction)),
        }
        self.apply_post_adjust(operands);
        Ok(())
    }

    pub fn execute_instruction(&mut self, instruction: &Instruction) -> Result<Execution> {
        let fallthrough = instruction.fallthrough();
        let mut next_pc = fallthrough;
        let mut taken = true;
        let mut halt = None;

        let (condition_holds, operands) = {
            let registers = &self.registers;
            split_condition(&instruction.operands, |flag| registers.get_flag(flag))
        };

        match instruction.mnemonic() {
            Mnemonic::NOP => {}

            /* Loads */
            Mnemonic::LD => {
                if operands.iter().any(|binding| matches!(binding, Binding::HighPage(_))) {
                    return Err(shape_error(instruction));
                }
                self.execute_load(instruction, operands)?;
            }
            Mnemonic::LDH => {
                let operands: Vec<Binding> = operands
                    .iter()
                    .map(|binding| match binding {
                        Binding::HighPage(offset) => Binding::Memory {
                            address: HIGH_PAGE + Address::from(*offset),
                            adjust: None,
                        },
                        other => *other,
                    })
                    .collect();
                match operands.as_slice() {
                    [Binding::Memory { .. }, Binding::Register(_)]
                    | [Binding::Register(_), Binding::Memory { .. }] => {
                        self.execute_load(instruction, &operands)?
                    }
                    _ => return Err(shape_error(instruction)),
                }
            }

            /* Stack */
            Mnemonic::PUSH => match operands {
                [Binding::RegisterPair(pair)] => {
                    let value = self.registers.read16(*pair);
                    self.push_word(value)?;
                }
                _ => return Err(shape_error(instruction)),
            },
            Mnemonic::POP => match operands {
                [Binding::RegisterPair(pair)] => {
                    let value = self.pop_word()?;
                    self.registers.write16(*pair, value);
                }
                _ => return Err(shape_error(instruction)),
            },

            /* Control flow */
            Mnemonic::JP => {
                let target = match operands {
                    [Binding::Value16(target)] => *target,
                    [Binding::RegisterPair(Reg16::HL)] => self.registers.get_hl(),
                    _ => return Err(shape_error(instruction)),
                };
                taken = condition_holds;
                if taken {
                    next_pc = target;
                }
            }
            Mnemonic::JR => {
                let displacement = match operands {
                    [Binding::Displacement(displacement)] => *displacement,
                    _ => return Err(shape_error(instruction)),
                };
                taken = condition_holds;
                if taken {
                    next_pc = fallthrough.wrapping_add_signed(displacement.into());
                }
            }
            Mnemonic::CALL => {
                let target = match operands {
                    [Binding::Value16(target)] => *target,
                    _ => return Err(shape_error(instruction)),
                };
                taken = condition_holds;
                if taken {
                    self.push_word(fallthrough)?;
                    next_pc = target;
                }
            }
            Mnemonic::RET => {
                if !operands.is_empty() {
                    return Err(shape_error(instruction));
                }
                taken = condition_holds;
                if taken {
                    next_pc = self.pop_word()?;
                }
            }
            Mnemonic::RST => {
                let vector = match operands {
                    [Binding::Value16(vector)] => *vector,
                    _ => return Err(shape_error(instruction)),
                };
                self.push_word(fallthrough)?;
                next_pc = vector;
            }

            /* Halting */
            Mnemonic::HALT => halt = Some(HaltReason::Halt),
            Mnemonic::STOP => halt = Some(HaltReason::Stop),
            Mnemonic::ILLEGAL => {
                warn!(
                    "Illegal opcode {:#04x} at {:#06x}",
                    instruction.opcode, instruction.address
                );
                next_pc = instruction.address;
                halt = Some(HaltReason::IllegalOpcode(instruction.opcode));
            }

            // TODO: ALU and CB-prefixed families, DI/EI/RETI once interrupts exist
            _ => return Err(unimplemented(instruction)),
        }

        if instruction.spec.condition().is_some() {
            debug!(
                "{} at {:#06x} {}",
                instruction,
                instruction.address,
                if taken { "taken" } else { "not taken" }
            );
        }

        self.apply_flag_effects(instruction);

        Ok(Execution {
            cycles: instruction.spec.cycles.select(taken),
            next_pc,
            halt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::cpu::decoder::Decoder;
    use crate::cpu::register::Reg8;
    use crate::memory::MemoryBus;

    fn cpu_with(image: &[u8]) -> Cpu {
        Cpu::from_image(image).unwrap()
    }

    /// Decodes and executes the instruction at PC without committing PC.
    fn execute(cpu: &mut Cpu, catalog: &Catalog) -> Result<Execution> {
        let instruction = Decoder::new(catalog).decode(&cpu.registers, &mut cpu.bus)?;
        cpu.execute_instruction(&instruction)
    }

    #[test]
    fn test_ld_register_to_register() {
        let catalog = Catalog::builtin().unwrap();
        let order = [Reg8::B, Reg8::C, Reg8::D, Reg8::E, Reg8::H, Reg8::L, Reg8::F, Reg8::A];

        for target in 0..8u8 {
            for source in 0..8u8 {
                if target == 6 || source == 6 {
                    continue;
                }
                let opcode = 0x40 | target << 3 | source;
                let mut cpu = cpu_with(&[opcode]);
                for (i, reg) in order.iter().enumerate() {
                    if *reg != Reg8::F {
                        cpu.registers.write8(*reg, 0x10 + i as u8);
                    }
                }
                cpu.registers.write8(Reg8::F, 0xa0);

                let execution = execute(&mut cpu, &catalog).unwrap();

                let expected = 0x10 + source;
                let target = order[usize::from(target)];
                assert_eq!(expected, cpu.registers.read8(target), "{:#04x}", opcode);
                assert_eq!(0xa0, cpu.registers.read8(Reg8::F), "{:#04x}", opcode);
                assert_eq!(4, execution.cycles);
                assert_eq!(1, execution.next_pc);
            }
        }
    }

    #[test]
    fn test_ld_through_hl_adjusts_after_access() {
        let catalog = Catalog::builtin().unwrap();
        // LD (HL+), A; LD (HL-), A
        let mut cpu = cpu_with(&[0x22, 0x32]);
        cpu.registers.a = 0x99;
        cpu.registers.set_hl(0xc000);

        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x99, cpu.bus.read_u8(0xc000).unwrap());
        assert_eq!(0xc001, cpu.registers.get_hl());
        assert_eq!(8, execution.cycles);

        cpu.registers.pc = execution.next_pc;
        execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x99, cpu.bus.read_u8(0xc001).unwrap());
        assert_eq!(0xc000, cpu.registers.get_hl());
    }

    #[test]
    fn test_ld_a_from_hl_decrement() {
        let catalog = Catalog::builtin().unwrap();
        let mut cpu = cpu_with(&[0x3a]);
        cpu.registers.set_hl(0x0000);

        execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x3a, cpu.registers.a);
        assert_eq!(0xffff, cpu.registers.get_hl());
    }

    #[test]
    fn test_ld_sixteen_bit_forms() {
        let catalog = Catalog::builtin().unwrap();

        // LD SP, n16
        let mut cpu = cpu_with(&[0x31, 0xfe, 0xff]);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0xfffe, cpu.registers.sp);
        assert_eq!(3, execution.next_pc);

        // LD (a16), SP
        let mut cpu = cpu_with(&[0x08, 0x00, 0xc0]);
        cpu.registers.sp = 0xbeef;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0xbeef, cpu.bus.read_u16(0xc000).unwrap());
        assert_eq!(20, execution.cycles);

        // LD SP, HL
        let mut cpu = cpu_with(&[0xf9]);
        cpu.registers.set_hl(0x1234);
        execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x1234, cpu.registers.sp);
    }

    #[test]
    fn test_ld_hl_sp_offset_flags() {
        let catalog = Catalog::builtin().unwrap();

        let mut cpu = cpu_with(&[0xf8, 0x01]);
        cpu.registers.sp = 0x00ff;
        cpu.registers.write8(Reg8::F, 0xc0);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x0100, cpu.registers.get_hl());
        assert!(!cpu.registers.get_flag(Flag::Z));
        assert!(!cpu.registers.get_flag(Flag::N));
        assert!(cpu.registers.get_flag(Flag::H));
        assert!(cpu.registers.get_flag(Flag::C));
        assert_eq!(12, execution.cycles);

        let mut cpu = cpu_with(&[0xf8, 0xfe]);
        cpu.registers.sp = 0xc000;
        execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0xbffe, cpu.registers.get_hl());
        assert!(!cpu.registers.get_flag(Flag::H));
        assert!(!cpu.registers.get_flag(Flag::C));
    }

    #[test]
    fn test_ldh_uses_high_page() {
        let catalog = Catalog::builtin().unwrap();

        // LDH (a8), A
        let mut cpu = cpu_with(&[0xe0, 0x80]);
        cpu.registers.a = 0x5a;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x5a, cpu.bus.read_u8(0xff80).unwrap());
        assert_eq!(12, execution.cycles);
        assert_eq!(2, execution.next_pc);

        // LDH A, (C)
        let mut cpu = cpu_with(&[0xf2]);
        cpu.bus.write_u8(0xff44, 0x90).unwrap();
        cpu.registers.c = 0x44;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x90, cpu.registers.a);
        assert_eq!(8, execution.cycles);

        // LDH (C), A
        let mut cpu = cpu_with(&[0xe2]);
        cpu.registers.a = 0x3c;
        cpu.registers.c = 0x47;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x3c, cpu.bus.read_u8(0xff47).unwrap());
        assert_eq!(0, cpu.bus.read_u8(0x0047).unwrap());
        assert_eq!(8, execution.cycles);
        assert_eq!(1, execution.next_pc);
    }

    #[test]
    fn test_ld_hl_indirect_immediate() {
        let catalog = Catalog::builtin().unwrap();
        // LD (HL), $99
        let mut cpu = cpu_with(&[0x36, 0x99]);
        cpu.registers.set_hl(0xc010);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x99, cpu.bus.read_u8(0xc010).unwrap());
        assert_eq!(0xc010, cpu.registers.get_hl());
        assert_eq!(12, execution.cycles);
        assert_eq!(2, execution.next_pc);
    }

    #[test]
    fn test_jp_conditional() {
        let catalog = Catalog::builtin().unwrap();

        let mut cpu = cpu_with(&[0xc2, 0x50, 0x01]);
        cpu.registers.set_flag(Flag::Z, true);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(3, execution.next_pc);
        assert_eq!(12, execution.cycles);

        cpu.registers.set_flag(Flag::Z, false);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x0150, execution.next_pc);
        assert_eq!(16, execution.cycles);
    }

    #[test]
    fn test_jp_hl() {
        let catalog = Catalog::builtin().unwrap();
        let mut cpu = cpu_with(&[0xe9]);
        cpu.registers.set_hl(0x4000);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x4000, execution.next_pc);
        assert_eq!(4, execution.cycles);
    }

    #[test]
    fn test_jr_is_relative_to_next_instruction() {
        let catalog = Catalog::builtin().unwrap();

        let mut cpu = cpu_with(&[0x00, 0x00, 0x18, 0xfc]);
        cpu.registers.pc = 2;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0, execution.next_pc);
        assert_eq!(12, execution.cycles);

        // JR C, e8 not taken
        let mut cpu = cpu_with(&[0x38, 0x10]);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(2, execution.next_pc);
        assert_eq!(8, execution.cycles);
    }

    #[test]
    fn test_call_and_ret() {
        let catalog = Catalog::builtin().unwrap();
        let mut cpu = cpu_with(&[0xcd, 0x00, 0x02]);
        cpu.bus.write_u8(0x0200, 0xc9).unwrap();
        cpu.registers.sp = 0xfffe;

        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x0200, execution.next_pc);
        assert_eq!(24, execution.cycles);
        assert_eq!(0xfffc, cpu.registers.sp);
        assert_eq!(0x0003, cpu.bus.read_u16(0xfffc).unwrap());

        cpu.registers.pc = execution.next_pc;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x0003, execution.next_pc);
        assert_eq!(16, execution.cycles);
        assert_eq!(0xfffe, cpu.registers.sp);
    }

    #[test]
    fn test_conditional_call_not_taken_leaves_stack() {
        let catalog = Catalog::builtin().unwrap();
        // CALL C, a16 with carry clear
        let mut cpu = cpu_with(&[0xdc, 0x00, 0x02]);
        cpu.registers.sp = 0xfffe;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(3, execution.next_pc);
        assert_eq!(12, execution.cycles);
        assert_eq!(0xfffe, cpu.registers.sp);
    }

    #[test]
    fn test_rst_pushes_return_address() {
        let catalog = Catalog::builtin().unwrap();
        let mut cpu = cpu_with(&[0x00, 0xef]);
        cpu.registers.pc = 1;
        cpu.registers.sp = 0xd000;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0x0028, execution.next_pc);
        assert_eq!(0xcffe, cpu.registers.sp);
        assert_eq!(0x0002, cpu.bus.read_u16(0xcffe).unwrap());
    }

    #[test]
    fn test_push_pop() {
        let catalog = Catalog::builtin().unwrap();
        // PUSH BC; POP AF
        let mut cpu = cpu_with(&[0xc5, 0xf1]);
        cpu.registers.sp = 0xfffe;
        cpu.registers.set_bc(0x12ff);

        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0xfffc, cpu.registers.sp);
        assert_eq!(16, execution.cycles);
        assert_eq!(0xff, cpu.bus.read_u8(0xfffc).unwrap());
        assert_eq!(0x12, cpu.bus.read_u8(0xfffd).unwrap());

        cpu.registers.pc = execution.next_pc;
        execute(&mut cpu, &catalog).unwrap();
        assert_eq!(0xfffe, cpu.registers.sp);
        assert_eq!(0x12f0, cpu.registers.get_af());
    }

    #[test]
    fn test_illegal_opcode_halts_in_place() {
        let catalog = Catalog::builtin().unwrap();
        let mut cpu = cpu_with(&[0x00, 0xdd]);
        cpu.registers.pc = 1;
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(1, execution.next_pc);
        assert_eq!(Some(HaltReason::IllegalOpcode(0xdd)), execution.halt);
    }

    #[test]
    fn test_halt_and_stop() {
        let catalog = Catalog::builtin().unwrap();

        let mut cpu = cpu_with(&[0x76]);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(Some(HaltReason::Halt), execution.halt);
        assert_eq!(1, execution.next_pc);

        let mut cpu = cpu_with(&[0x10, 0x00]);
        let execution = execute(&mut cpu, &catalog).unwrap();
        assert_eq!(Some(HaltReason::Stop), execution.halt);
        assert_eq!(2, execution.next_pc);
    }

    #[test]
    fn test_alu_is_unimplemented() {
        let catalog = Catalog::builtin().unwrap();
        let mut cpu = cpu_with(&[0x80]);
        assert!(matches!(
            execute(&mut cpu, &catalog),
            Err(Error::UnimplementedInstruction {
                mnemonic: Mnemonic::ADD,
                prefixed: false,
                opcode: 0x80
            })
        ));

        let mut cpu = cpu_with(&[0xcb, 0x11]);
        assert!(matches!(
            execute(&mut cpu, &catalog),
            Err(Error::UnimplementedInstruction {
                mnemonic: Mnemonic::RL,
                prefixed: true,
                ..
            })
        ));
    }

    #[test]
    fn test_ld_rejects_high_page_operand() {
        let mut definitions = Catalog::builtin().unwrap().to_definitions();
        // Relabel LDH (C), A as a plain LD.
        definitions.unprefixed.get_mut("0xE2").unwrap().mnemonic = "LD".to_string();
        let catalog = Catalog::from_definitions(&definitions).unwrap();

        let mut cpu: Cpu<MemoryBus> = cpu_with(&[0xe2]);
        assert!(matches!(
            execute(&mut cpu, &catalog),
            Err(Error::OperandShape { opcode: 0xe2, .. })
        ));
    }
}
