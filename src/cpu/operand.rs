use crate::catalog::{Condition, OperandKind, OperandSpec, PostAdjust};
use crate::component::{Address, Addressable};
use crate::cpu::register::{Reg16, Reg8, Registers};
use crate::error::{Error, Result};

/// A concrete operand, resolved against the CPU state at the start of an instruction. Bindings
/// are plain values: memory operands carry the address computed at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Register(Reg8),
    RegisterPair(Reg16),
    /// A bus address. `adjust` is applied to `HL` once the access has been performed.
    Memory {
        address: Address,
        adjust: Option<PostAdjust>,
    },
    /// Offset into the high page, from `(C)` or `(a8)`. Only `LDH` turns it into an address.
    HighPage(u8),
    Value8(u8),
    Value16(u16),
    Displacement(i8),
    Bit(u8),
    Condition(Condition),
}

/// Reads an immediate at `base + offset`. The offset is fixed per operand, so decoding never
/// depends on where `PC` is.
fn immediate_u8<B: Addressable>(bus: &mut B, base: Address, offset: u8) -> Result<u8> {
    bus.read_u8(base.wrapping_add(offset.into()))
}

fn immediate_u16<B: Addressable>(bus: &mut B, base: Address, offset: u8) -> Result<u16> {
    bus.read_u16(base.wrapping_add(offset.into()))
}

/// Binds `spec` for the instruction whose first byte is at `base`. Neither the registers nor
/// the bus are modified.
pub fn resolve<B: Addressable>(
    spec: &OperandSpec,
    registers: &Registers,
    bus: &mut B,
    base: Address,
) -> Result<Binding> {
    let binding = match (spec.kind, spec.dereference) {
        (OperandKind::Register(reg), false) => Binding::Register(reg),
        (OperandKind::Register(reg), true) => Binding::HighPage(registers.read8(reg)),
        // `SP+` in `LD HL, SP+e8` is the register itself; the displacement is its own operand.
        (OperandKind::RegisterPair(reg), false) => Binding::RegisterPair(reg),
        (OperandKind::RegisterPair(reg), true) => Binding::Memory {
            address: registers.read16(reg),
            adjust: spec.adjust,
        },
        (OperandKind::Immediate8 { offset }, false) => {
            Binding::Value8(immediate_u8(bus, base, offset)?)
        }
        (OperandKind::Immediate16 { offset }, false) | (OperandKind::Address { offset }, false) => {
            Binding::Value16(immediate_u16(bus, base, offset)?)
        }
        (OperandKind::Address { offset }, true) => Binding::Memory {
            address: immediate_u16(bus, base, offset)?,
            adjust: None,
        },
        (OperandKind::HighAddress { offset }, true) => {
            Binding::HighPage(immediate_u8(bus, base, offset)?)
        }
        (OperandKind::HighAddress { offset }, false) => {
            Binding::Value8(immediate_u8(bus, base, offset)?)
        }
        (OperandKind::Relative { offset }, false) => {
            Binding::Displacement(immediate_u8(bus, base, offset)? as i8)
        }
        (OperandKind::Bit(bit), false) => Binding::Bit(bit),
        (OperandKind::Condition(condition), false) => Binding::Condition(condition),
        (OperandKind::Vector(vector), false) => Binding::Value16(vector.into()),
        (_, true) => {
            return Err(Error::InvalidOperand {
                operand: spec.to_string(),
            })
        }
    };
    Ok(binding)
}
