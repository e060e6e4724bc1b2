use std::fmt;

use log::trace;

use crate::catalog::{Catalog, InstructionSpec, Mnemonic, OperandKind};
use crate::component::{Address, Addressable};
use crate::cpu::operand::{resolve, Binding};
use crate::cpu::register::Registers;
use crate::error::Result;

/// Escape byte selecting the second opcode table.
pub const PREFIX_BYTE: u8 = 0xCB;

/// A fully resolved instruction. Built fresh for every step and dropped once executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction<'c> {
    /// Address of the first byte (the prefix byte, for CB instructions).
    pub address: Address,
    pub opcode: u8,
    pub prefixed: bool,
    pub spec: &'c InstructionSpec,
    pub operands: Vec<Binding>,
}

impl Instruction<'_> {
    pub fn mnemonic(&self) -> Mnemonic {
        self.spec.mnemonic
    }

    pub fn length(&self) -> u8 {
        self.spec.bytes
    }

    /// Address of the next instruction in memory.
    pub fn fallthrough(&self) -> Address {
        self.address.wrapping_add(self.length().into())
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec.mnemonic.as_ref())?;
        let mut separator = " ";
        for (operand, binding) in self.spec.operands.iter().zip(&self.operands) {
            f.write_str(separator)?;
            match (operand.kind, binding) {
                (OperandKind::Immediate8 { .. }, Binding::Value8(value)) => {
                    write!(f, "${:02X}", value)?
                }
                (OperandKind::Immediate16 { .. }, Binding::Value16(value))
                | (OperandKind::Address { .. }, Binding::Value16(value)) => {
                    write!(f, "${:04X}", value)?
                }
                (OperandKind::Address { .. }, Binding::Memory { address, .. }) => {
                    write!(f, "(${:04X})", address)?
                }
                (OperandKind::HighAddress { .. }, Binding::HighPage(offset)) => {
                    write!(f, "($FF{:02X})", offset)?
                }
                (OperandKind::Relative { .. }, Binding::Displacement(displacement))
                    if self.spec.mnemonic == Mnemonic::JR =>
                {
                    let target = self
                        .fallthrough()
                        .wrapping_add_signed(i16::from(*displacement));
                    write!(f, "${:04X}", target)?
                }
                (OperandKind::Relative { .. }, Binding::Displacement(displacement)) => {
                    write!(f, "${:02X}", *displacement as u8)?
                }
                _ => write!(f, "{}", operand)?,
            }
            separator = if !operand.dereference && operand.adjust.is_some() {
                ""
            } else {
                ", "
            };
        }
        Ok(())
    }
}

/// Turns the bytes at `PC` into an `Instruction`: fetch, optional prefix fetch, catalog lookup,
/// then operand resolution. Nothing it does moves `PC`.
pub struct Decoder<'c> {
    catalog: &'c Catalog,
}

impl<'c> Decoder<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    pub fn decode<B: Addressable>(
        &self,
        registers: &Registers,
        bus: &mut B,
    ) -> Result<Instruction<'c>> {
        let address = registers.pc;

        let mut opcode = bus.read_u8(address)?;
        let prefixed = opcode == PREFIX_BYTE;
        if prefixed {
            // One level only: CB CB is the prefixed opcode 0xCB.
            opcode = bus.read_u8(address.wrapping_add(1))?;
        }

        let spec = self.catalog.lookup(prefixed, opcode);

        let mut operands = Vec::with_capacity(spec.operands.len());
        for operand in &spec.operands {
            operands.push(resolve(operand, registers, bus, address)?);
        }

        let instruction = Instruction {
            address,
            opcode,
            prefixed,
            spec,
            operands,
        };
        trace!(
            "{:#06x}: {}{:02X} {}",
            address,
            if prefixed { "CB " } else { "" },
            opcode,
            instruction
        );
        Ok(instruction)
    }
}
