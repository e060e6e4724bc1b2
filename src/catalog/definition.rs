/*!
 * Serde model of the public Game Boy opcode metadata file: two sections, `unprefixed` and
 * `cbprefixed`, each keyed by hex opcode (`"0x3E"`). This is only the load/export format;
 * entries are converted into typed `InstructionSpec`s before anything executes them.
 */

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::entry::{
    Condition, Cycles, FlagEffect, FlagEffects, InstructionSpec, Mnemonic, OperandKind,
    OperandSpec, PostAdjust,
};
use crate::cpu::{Flag, Reg16, Reg8};
use crate::error::CatalogError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeDefinitions {
    pub unprefixed: BTreeMap<String, InstructionDefinition>,
    pub cbprefixed: BTreeMap<String, InstructionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDefinition {
    pub mnemonic: String,
    pub bytes: u8,
    pub cycles: Vec<u8>,
    #[serde(default)]
    pub operands: Vec<OperandDefinition>,
    #[serde(default = "default_true")]
    pub immediate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<FlagDefinitions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u8>,
    #[serde(default = "default_true")]
    pub immediate: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub increment: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub decrement: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinitions {
    #[serde(rename = "Z")]
    pub zero: String,
    #[serde(rename = "N")]
    pub subtract: String,
    #[serde(rename = "H")]
    pub half_carry: String,
    #[serde(rename = "C")]
    pub carry: String,
}

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl OpcodeDefinitions {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parses a section key such as `"0x3E"`.
pub fn parse_key(key: &str) -> Result<u8, CatalogError> {
    let digits = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .ok_or_else(|| CatalogError::InvalidKey(key.to_string()))?;
    u8::from_str_radix(digits, 16).map_err(|_| CatalogError::InvalidKey(key.to_string()))
}

pub fn format_key(opcode: u8) -> String {
    format!("0x{:02X}", opcode)
}

fn parse_mnemonic(key: &str, mnemonic: &str) -> Result<Mnemonic, CatalogError> {
    // Undefined opcodes are listed as ILLEGAL_D3, ILLEGAL_DB, ...
    if mnemonic.starts_with("ILLEGAL") {
        return Ok(Mnemonic::ILLEGAL);
    }
    Mnemonic::from_str(mnemonic).map_err(|_| CatalogError::UnknownMnemonic {
        key: key.to_string(),
        mnemonic: mnemonic.to_string(),
    })
}

fn operand_kind(name: &str, mnemonic: Mnemonic) -> Option<OperandKind> {
    if mnemonic.takes_condition() {
        if let Ok(condition) = Condition::from_str(name) {
            return Some(OperandKind::Condition(condition));
        }
    }

    let kind = match name {
        "n8" => OperandKind::Immediate8 { offset: 0 },
        "n16" => OperandKind::Immediate16 { offset: 0 },
        "a8" => OperandKind::HighAddress { offset: 0 },
        "a16" => OperandKind::Address { offset: 0 },
        "e8" => OperandKind::Relative { offset: 0 },
        _ => {
            if let Ok(reg) = Reg8::from_str(name) {
                OperandKind::Register(reg)
            } else if let Ok(reg) = Reg16::from_str(name) {
                OperandKind::RegisterPair(reg)
            } else if let Some(hex) = name.strip_prefix('$') {
                let vector = u8::from_str_radix(hex, 16).ok()?;
                if vector % 8 != 0 || vector > 0x38 {
                    return None;
                }
                OperandKind::Vector(vector)
            } else {
                let bit = name.parse::<u8>().ok()?;
                if bit > 7 {
                    return None;
                }
                OperandKind::Bit(bit)
            }
        }
    };
    Some(kind)
}

impl OperandDefinition {
    fn to_spec(&self, key: &str, mnemonic: Mnemonic) -> Result<OperandSpec, CatalogError> {
        let kind = operand_kind(&self.name, mnemonic).ok_or_else(|| CatalogError::UnknownOperand {
            key: key.to_string(),
            name: self.name.clone(),
        })?;

        if let Some(bytes) = self.bytes {
            if bytes != kind.width() {
                return Err(CatalogError::InvalidOperand {
                    key: key.to_string(),
                    reason: format!("{} declared {} bytes wide", self.name, bytes),
                });
            }
        }

        let adjust = match (self.increment, self.decrement) {
            (false, false) => None,
            (true, false) => Some(PostAdjust::Increment),
            (false, true) => Some(PostAdjust::Decrement),
            (true, true) => {
                return Err(CatalogError::InvalidOperand {
                    key: key.to_string(),
                    reason: format!("{} both increments and decrements", self.name),
                })
            }
        };

        Ok(OperandSpec {
            kind,
            dereference: !self.immediate,
            adjust,
        })
    }
}

impl From<&OperandSpec> for OperandDefinition {
    fn from(spec: &OperandSpec) -> Self {
        let width = spec.kind.width();
        Self {
            name: spec.name(),
            bytes: if width > 0 { Some(width) } else { None },
            immediate: !spec.dereference,
            increment: spec.adjust == Some(PostAdjust::Increment),
            decrement: spec.adjust == Some(PostAdjust::Decrement),
        }
    }
}

fn flag_effect(key: &str, flag: Flag, marker: &str) -> Result<FlagEffect, CatalogError> {
    let mut chars = marker.chars();
    let effect = match (chars.next(), chars.next()) {
        (Some(symbol), None) => FlagEffect::from_symbol(symbol, flag),
        _ => None,
    };
    effect.ok_or_else(|| CatalogError::InvalidFlag {
        key: key.to_string(),
        flag: flag.as_ref().chars().next().unwrap_or('?'),
        value: marker.to_string(),
    })
}

impl FlagDefinitions {
    fn to_effects(&self, key: &str) -> Result<FlagEffects, CatalogError> {
        Ok(FlagEffects {
            zero: flag_effect(key, Flag::Z, &self.zero)?,
            subtract: flag_effect(key, Flag::N, &self.subtract)?,
            half_carry: flag_effect(key, Flag::H, &self.half_carry)?,
            carry: flag_effect(key, Flag::C, &self.carry)?,
        })
    }
}

impl From<&FlagEffects> for FlagDefinitions {
    fn from(effects: &FlagEffects) -> Self {
        Self {
            zero: effects.zero.symbol(Flag::Z).to_string(),
            subtract: effects.subtract.symbol(Flag::N).to_string(),
            half_carry: effects.half_carry.symbol(Flag::H).to_string(),
            carry: effects.carry.symbol(Flag::C).to_string(),
        }
    }
}

impl InstructionDefinition {
    /// Resolves names into typed operands, lays out immediate offsets and validates the entry.
    pub fn to_spec(&self, key: &str, prefixed: bool) -> Result<InstructionSpec, CatalogError> {
        let mnemonic = parse_mnemonic(key, &self.mnemonic)?;

        let cycles = match self.cycles.as_slice() {
            [cycles] => Cycles::Fixed(*cycles),
            [taken, not_taken] => Cycles::Conditional {
                taken: *taken,
                not_taken: *not_taken,
            },
            _ => {
                return Err(CatalogError::InvalidCycles {
                    key: key.to_string(),
                    cycles: self.cycles.clone(),
                })
            }
        };

        let operands = self
            .operands
            .iter()
            .map(|operand| operand.to_spec(key, mnemonic))
            .collect::<Result<Vec<_>, _>>()?;

        let flags = match &self.flags {
            Some(flags) => flags.to_effects(key)?,
            None => FlagEffects::default(),
        };

        let mut spec = InstructionSpec::new(mnemonic, self.bytes, cycles, operands, flags);
        spec.assign_offsets(key, prefixed)?;
        spec.validate(key, prefixed)?;
        Ok(spec)
    }

    pub fn from_spec(spec: &InstructionSpec, opcode: u8) -> Self {
        let mnemonic = match spec.mnemonic {
            Mnemonic::ILLEGAL => format!("ILLEGAL_{:02X}", opcode),
            mnemonic => mnemonic.as_ref().to_string(),
        };
        Self {
            mnemonic,
            bytes: spec.bytes,
            cycles: spec.cycles.to_vec(),
            operands: spec.operands.iter().map(OperandDefinition::from).collect(),
            immediate: spec.operands.iter().all(|operand| !operand.dereference),
            flags: Some(FlagDefinitions::from(&spec.flags)),
        }
    }
}
