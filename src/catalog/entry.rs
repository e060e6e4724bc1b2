use std::fmt;

use strum_macros::{AsRefStr, EnumIter, EnumString};

use crate::cpu::{Flag, Reg16, Reg8};
use crate::error::CatalogError;

/// Semantic family of an instruction. The executor dispatches on this tag.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString, EnumIter)]
pub enum Mnemonic {
    NOP,
    STOP,
    HALT,
    LD,
    LDH,
    PUSH,
    POP,
    JP,
    JR,
    CALL,
    RET,
    RETI,
    RST,
    DI,
    EI,
    ADD,
    ADC,
    SUB,
    SBC,
    AND,
    XOR,
    OR,
    CP,
    INC,
    DEC,
    DAA,
    CPL,
    SCF,
    CCF,
    RLCA,
    RLA,
    RRCA,
    RRA,
    RLC,
    RRC,
    RL,
    RR,
    SLA,
    SRA,
    SWAP,
    SRL,
    BIT,
    RES,
    SET,
    PREFIX,
    ILLEGAL,
}

impl Mnemonic {
    /// Control-transfer families, the only ones whose `NZ`/`Z`/`NC`/`C` operands are conditions.
    pub fn takes_condition(self) -> bool {
        matches!(self, Self::JP | Self::JR | Self::CALL | Self::RET)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString, EnumIter)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
}

impl Condition {
    pub fn flag(self) -> Flag {
        match self {
            Self::NZ | Self::Z => Flag::Z,
            Self::NC | Self::C => Flag::C,
        }
    }

    /// Whether the condition holds given the current value of its flag.
    pub fn holds(self, flag_set: bool) -> bool {
        match self {
            Self::Z | Self::C => flag_set,
            Self::NZ | Self::NC => !flag_set,
        }
    }
}

/// ±1 applied to `HL` after the access that uses it: `(HL+)` and `(HL-)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostAdjust {
    Increment,
    Decrement,
}

impl PostAdjust {
    pub fn apply(self, value: u16) -> u16 {
        match self {
            Self::Increment => value.wrapping_add(1),
            Self::Decrement => value.wrapping_sub(1),
        }
    }
}

/// What an operand names. Immediates carry their byte offset from the first byte of the
/// instruction (the prefix byte, for CB instructions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Register(Reg8),
    RegisterPair(Reg16),
    /// `n8`
    Immediate8 { offset: u8 },
    /// `n16`
    Immediate16 { offset: u8 },
    /// `a8`, an offset into the high page.
    HighAddress { offset: u8 },
    /// `a16`
    Address { offset: u8 },
    /// `e8`
    Relative { offset: u8 },
    /// `u3`
    Bit(u8),
    Condition(Condition),
    /// `$00`, `$08`, ... `$38`
    Vector(u8),
}

impl OperandKind {
    /// Number of trailing instruction bytes this operand occupies.
    pub fn width(&self) -> u8 {
        match self {
            Self::Immediate8 { .. } | Self::HighAddress { .. } | Self::Relative { .. } => 1,
            Self::Immediate16 { .. } | Self::Address { .. } => 2,
            _ => 0,
        }
    }

    fn offset_mut(&mut self) -> Option<&mut u8> {
        match self {
            Self::Immediate8 { offset }
            | Self::Immediate16 { offset }
            | Self::HighAddress { offset }
            | Self::Address { offset }
            | Self::Relative { offset } => Some(offset),
            _ => None,
        }
    }

    pub fn offset(&self) -> Option<u8> {
        match self {
            Self::Immediate8 { offset }
            | Self::Immediate16 { offset }
            | Self::HighAddress { offset }
            | Self::Address { offset }
            | Self::Relative { offset } => Some(*offset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandSpec {
    pub kind: OperandKind,
    /// The operand's value is an address and the access goes to memory.
    pub dereference: bool,
    pub adjust: Option<PostAdjust>,
}

impl OperandSpec {
    pub fn new(kind: OperandKind) -> Self {
        Self {
            kind,
            dereference: false,
            adjust: None,
        }
    }

    pub fn dereferenced(kind: OperandKind) -> Self {
        Self {
            kind,
            dereference: true,
            adjust: None,
        }
    }

    pub fn with_adjust(mut self, adjust: PostAdjust) -> Self {
        self.adjust = Some(adjust);
        self
    }

    /// The name this operand has in the opcode definition schema.
    pub fn name(&self) -> String {
        match self.kind {
            OperandKind::Register(reg) => reg.as_ref().to_string(),
            OperandKind::RegisterPair(reg) => reg.as_ref().to_string(),
            OperandKind::Immediate8 { .. } => "n8".to_string(),
            OperandKind::Immediate16 { .. } => "n16".to_string(),
            OperandKind::HighAddress { .. } => "a8".to_string(),
            OperandKind::Address { .. } => "a16".to_string(),
            OperandKind::Relative { .. } => "e8".to_string(),
            OperandKind::Bit(bit) => bit.to_string(),
            OperandKind::Condition(condition) => condition.as_ref().to_string(),
            OperandKind::Vector(vector) => format!("${:02X}", vector),
        }
    }
}

impl fmt::Display for OperandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let adjust = match self.adjust {
            Some(PostAdjust::Increment) => "+",
            Some(PostAdjust::Decrement) => "-",
            None => "",
        };
        if self.dereference {
            write!(f, "({}{})", self.name(), adjust)
        } else {
            write!(f, "{}{}", self.name(), adjust)
        }
    }
}

/// Cycle cost in T-cycles. Conditional instructions cost more when the branch is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cycles {
    Fixed(u8),
    Conditional { taken: u8, not_taken: u8 },
}

impl Cycles {
    pub fn select(self, taken: bool) -> u8 {
        match self {
            Self::Fixed(cycles) => cycles,
            Self::Conditional {
                taken: taken_cycles,
                not_taken,
            } => {
                if taken {
                    taken_cycles
                } else {
                    not_taken
                }
            }
        }
    }

    pub fn to_vec(self) -> Vec<u8> {
        match self {
            Self::Fixed(cycles) => vec![cycles],
            Self::Conditional { taken, not_taken } => vec![taken, not_taken],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FlagEffect {
    #[default]
    Unaffected,
    Set,
    Reset,
    /// Derived from the result by the instruction family itself.
    Computed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagEffects {
    pub zero: FlagEffect,
    pub subtract: FlagEffect,
    pub half_carry: FlagEffect,
    pub carry: FlagEffect,
}

impl FlagEffect {
    /// Reads one position of the `ZNHC` notation: `-` unaffected, `0` reset, `1` set, or the
    /// flag's own letter for a computed result.
    pub fn from_symbol(symbol: char, flag: Flag) -> Option<Self> {
        match symbol {
            '-' => Some(Self::Unaffected),
            '0' => Some(Self::Reset),
            '1' => Some(Self::Set),
            c if flag.as_ref().starts_with(c) => Some(Self::Computed),
            _ => None,
        }
    }

    pub fn symbol(self, flag: Flag) -> char {
        match self {
            Self::Unaffected => '-',
            Self::Reset => '0',
            Self::Set => '1',
            Self::Computed => flag.as_ref().chars().next().unwrap_or('?'),
        }
    }
}

impl FlagEffects {
    /// Parses the compact `ZNHC` notation used by the opcode tables, e.g. `"Z0H-"`.
    pub fn parse(notation: &str) -> Option<Self> {
        let mut chars = notation.chars();
        let mut next = |flag| FlagEffect::from_symbol(chars.next()?, flag);
        let effects = Self {
            zero: next(Flag::Z)?,
            subtract: next(Flag::N)?,
            half_carry: next(Flag::H)?,
            carry: next(Flag::C)?,
        };
        if chars.next().is_some() {
            return None;
        }
        Some(effects)
    }

    pub fn get(&self, flag: Flag) -> FlagEffect {
        match flag {
            Flag::Z => self.zero,
            Flag::N => self.subtract,
            Flag::H => self.half_carry,
            Flag::C => self.carry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSpec {
    pub mnemonic: Mnemonic,
    /// Total length, counting the opcode, the CB prefix if any, and immediates.
    pub bytes: u8,
    pub cycles: Cycles,
    pub operands: Vec<OperandSpec>,
    pub flags: FlagEffects,
}

/// Opcode byte(s) plus immediates; nothing on the LR35902 is longer.
const MAX_INSTRUCTION_LENGTH: u8 = 3;

fn too_many_immediates(key: &str) -> CatalogError {
    CatalogError::InvalidOperand {
        key: key.to_string(),
        reason: "immediates do not fit in an instruction".to_string(),
    }
}

impl InstructionSpec {
    pub fn new(
        mnemonic: Mnemonic,
        bytes: u8,
        cycles: Cycles,
        operands: Vec<OperandSpec>,
        flags: FlagEffects,
    ) -> Self {
        Self {
            mnemonic,
            bytes,
            cycles,
            operands,
            flags,
        }
    }

    pub fn illegal() -> Self {
        Self::new(
            Mnemonic::ILLEGAL,
            1,
            Cycles::Fixed(4),
            Vec::new(),
            FlagEffects::default(),
        )
    }

    pub fn condition(&self) -> Option<Condition> {
        self.operands.iter().find_map(|operand| match operand.kind {
            OperandKind::Condition(condition) => Some(condition),
            _ => None,
        })
    }

    /// Lays immediates out back to back after the opcode byte(s), in operand order.
    pub(crate) fn assign_offsets(
        &mut self,
        key: &str,
        prefixed: bool,
    ) -> Result<(), CatalogError> {
        let mut next: u8 = if prefixed { 2 } else { 1 };
        for operand in self.operands.iter_mut() {
            let width = operand.kind.width();
            if let Some(offset) = operand.kind.offset_mut() {
                *offset = next;
                next = next
                    .checked_add(width)
                    .ok_or_else(|| too_many_immediates(key))?;
            }
        }
        Ok(())
    }

    /// Checks the entry is something the decoder and executor can rely on.
    pub(crate) fn validate(&self, key: &str, prefixed: bool) -> Result<(), CatalogError> {
        let header = if prefixed { 2 } else { 1 };
        let mut required = header;
        for operand in &self.operands {
            if let Some(offset) = operand.kind.offset() {
                let end = offset
                    .checked_add(operand.kind.width())
                    .ok_or_else(|| too_many_immediates(key))?;
                required = required.max(end);
            }
            let addressable = matches!(
                operand.kind,
                OperandKind::Register(Reg8::C)
                    | OperandKind::RegisterPair(_)
                    | OperandKind::HighAddress { .. }
                    | OperandKind::Address { .. }
            );
            if operand.dereference && !addressable {
                return Err(CatalogError::InvalidOperand {
                    key: key.to_string(),
                    reason: format!("{} cannot be dereferenced", operand),
                });
            }
            if let Some(adjust) = operand.adjust {
                let hl_access = operand.dereference
                    && operand.kind == OperandKind::RegisterPair(Reg16::HL);
                let sp_offset =
                    !operand.dereference && operand.kind == OperandKind::RegisterPair(Reg16::SP);
                if !(hl_access || (sp_offset && adjust == PostAdjust::Increment)) {
                    return Err(CatalogError::InvalidOperand {
                        key: key.to_string(),
                        reason: format!("post-access adjust not allowed on {}", operand),
                    });
                }
            }
        }
        if required > MAX_INSTRUCTION_LENGTH {
            return Err(too_many_immediates(key));
        }
        if self.bytes < required
            || self.bytes > MAX_INSTRUCTION_LENGTH
            || (self.mnemonic != Mnemonic::STOP && self.bytes != required)
        {
            return Err(CatalogError::InconsistentLength {
                key: key.to_string(),
                bytes: self.bytes,
                required,
            });
        }

        let conditional = self.condition().is_some();
        match self.cycles {
            Cycles::Fixed(0) => Err(CatalogError::InvalidCycles {
                key: key.to_string(),
                cycles: self.cycles.to_vec(),
            }),
            Cycles::Conditional { .. } if !conditional => Err(CatalogError::InvalidCycles {
                key: key.to_string(),
                cycles: self.cycles.to_vec(),
            }),
            Cycles::Fixed(_) if conditional => Err(CatalogError::InvalidCycles {
                key: key.to_string(),
                cycles: self.cycles.to_vec(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for InstructionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic.as_ref())?;
        let mut previous: Option<&OperandSpec> = None;
        for operand in &self.operands {
            let separator = match previous {
                None => " ",
                // `SP+` runs straight into its displacement: `SP+e8`
                Some(prev) if !prev.dereference && prev.adjust.is_some() => "",
                Some(_) => ", ",
            };
            write!(f, "{}{}", separator, operand)?;
            previous = Some(operand);
        }
        Ok(())
    }
}
