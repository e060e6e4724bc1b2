use std::fmt;

use strum_macros::{AsRefStr, EnumIter, EnumString};

/// The 8-bit registers, including the flag register `F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
pub enum Reg8 {
    A,
    F,
    B,
    C,
    D,
    E,
    H,
    L,
}

/// The 16-bit registers. `AF`, `BC`, `DE` and `HL` are views over two 8-bit registers; `SP`
/// and `PC` stand alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
pub enum Reg16 {
    AF,
    BC,
    DE,
    HL,
    SP,
    PC,
}

impl Reg16 {
    /// The (high, low) 8-bit registers backing this pair, if it is one.
    pub fn halves(self) -> Option<(Reg8, Reg8)> {
        match self {
            Self::AF => Some((Reg8::A, Reg8::F)),
            Self::BC => Some((Reg8::B, Reg8::C)),
            Self::DE => Some((Reg8::D, Reg8::E)),
            Self::HL => Some((Reg8::H, Reg8::L)),
            Self::SP | Self::PC => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, AsRefStr)]
pub enum Flag {
    Z,
    N,
    H,
    C,
}

/// The register file: eight 8-bit registers plus the stack pointer and program counter.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub f: FlagRegister,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

/// Macro to generate a function that gets the value in a join register.
macro_rules! get_joint_register {
    ($name:ident, $first:ident, $second:ident) => {
        #[doc = concat!("Gets the joint register ", stringify!($first), stringify!($second), ".")]
        pub fn $name(&self) -> u16 {
            (u8::from(self.$first) as u16) << 8 | (u8::from(self.$second) as u16)
        }
    };
}

/// Macro to generate a function that sets the value in a join register.
macro_rules! set_joint_register {
    ($name:ident, $first:ident, $second:ident) => {
        #[doc = concat!("Sets the joint register ", stringify!($first), stringify!($second), ".")]
        pub fn $name(&mut self, value: u16) {
            self.$first = (((value >> 8) & 0xff) as u8).into();
            self.$second = ((value & 0xff) as u8).into();
        }
    };
}

impl Registers {
    // AF
    get_joint_register!(get_af, a, f);
    set_joint_register!(set_af, a, f);

    // BC
    get_joint_register!(get_bc, b, c);
    set_joint_register!(set_bc, b, c);

    // DE
    get_joint_register!(get_de, d, e);
    set_joint_register!(set_de, d, e);

    // HL
    get_joint_register!(get_hl, h, l);
    set_joint_register!(set_hl, h, l);

    pub fn read8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::F => self.f.into(),
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
        }
    }

    /// Writes to `F` keep only the four flag bits; the low nibble always reads back as zero.
    pub fn write8(&mut self, reg: Reg8, value: u8) {
        match reg {
            Reg8::A => self.a = value,
            Reg8::F => self.f = value.into(),
            Reg8::B => self.b = value,
            Reg8::C => self.c = value,
            Reg8::D => self.d = value,
            Reg8::E => self.e = value,
            Reg8::H => self.h = value,
            Reg8::L => self.l = value,
        }
    }

    pub fn read16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AF => self.get_af(),
            Reg16::BC => self.get_bc(),
            Reg16::DE => self.get_de(),
            Reg16::HL => self.get_hl(),
            Reg16::SP => self.sp,
            Reg16::PC => self.pc,
        }
    }

    pub fn write16(&mut self, reg: Reg16, value: u16) {
        match reg {
            Reg16::AF => self.set_af(value),
            Reg16::BC => self.set_bc(value),
            Reg16::DE => self.set_de(value),
            Reg16::HL => self.set_hl(value),
            Reg16::SP => self.sp = value,
            Reg16::PC => self.pc = value,
        }
    }

    pub fn get_flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Z => self.f.zero,
            Flag::N => self.f.subtract,
            Flag::H => self.f.half_carry,
            Flag::C => self.f.carry,
        }
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::Z => self.f.zero = value,
            Flag::N => self.f.subtract = value,
            Flag::H => self.f.half_carry = value,
            Flag::C => self.f.carry = value,
        }
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AF={:04X} BC={:04X} DE={:04X} HL={:04X} SP={:04X} PC={:04X} [{}{}{}{}]",
            self.get_af(),
            self.get_bc(),
            self.get_de(),
            self.get_hl(),
            self.sp,
            self.pc,
            if self.f.zero { 'Z' } else { '-' },
            if self.f.subtract { 'N' } else { '-' },
            if self.f.half_carry { 'H' } else { '-' },
            if self.f.carry { 'C' } else { '-' },
        )
    }
}

/// The flag register has meanings assigned to its bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlagRegister {
    /// This bit is set when the result of a math op is zero or two values match when using the CP
    /// instruction.
    pub zero: bool,

    /// This bit is set if a subtraction was performed in the last math operation.
    pub subtract: bool,

    /// This bit is set if a carry occurred from the lower nibble in the last math operation.
    pub half_carry: bool,

    /// This bit is set if a carry occurred from the last math operation or if register A is the
    /// smaller value when executing the CP instruction.
    pub carry: bool,
}

const ZERO_FLAG_BYTE_POSITION: u8 = 7;
const SUBTRACT_FLAG_BYTE_POSITION: u8 = 6;
const HALF_CARRY_FLAG_BYTE_POSITION: u8 = 5;
const CARRY_FLAG_BYTE_POSITION: u8 = 4;

impl std::convert::From<FlagRegister> for u8 {
    fn from(flag: FlagRegister) -> u8 {
        u8::from(flag.zero) << ZERO_FLAG_BYTE_POSITION
            | u8::from(flag.subtract) << SUBTRACT_FLAG_BYTE_POSITION
            | u8::from(flag.half_carry) << HALF_CARRY_FLAG_BYTE_POSITION
            | u8::from(flag.carry) << CARRY_FLAG_BYTE_POSITION
    }
}

impl std::convert::From<u8> for FlagRegister {
    fn from(byte: u8) -> Self {
        let zero = ((byte >> ZERO_FLAG_BYTE_POSITION) & 0b1) == 1;
        let subtract = ((byte >> SUBTRACT_FLAG_BYTE_POSITION) & 0b1) == 1;
        let half_carry = ((byte >> HALF_CARRY_FLAG_BYTE_POSITION) & 0b1) == 1;
        let carry = ((byte >> CARRY_FLAG_BYTE_POSITION) & 0b1) == 1;

        Self {
            zero,
            subtract,
            half_carry,
            carry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_byte_writes_show_through_pairs() {
        for pair in Reg16::iter() {
            let Some((high, low)) = pair.halves() else {
                continue;
            };
            let mut registers = Registers::default();

            registers.write8(high, 0xa0);
            assert_eq!(0xa0, (registers.read16(pair) >> 8) as u8, "{}", pair.as_ref());

            registers.write8(low, 0x50);
            assert_eq!(0xa050, registers.read16(pair), "{}", pair.as_ref());
        }
    }

    #[test]
    fn test_pair_writes_show_through_bytes() {
        for pair in [Reg16::BC, Reg16::DE, Reg16::HL] {
            let (high, low) = pair.halves().unwrap();
            let mut registers = Registers::default();

            registers.write16(pair, 0x1234);
            assert_eq!(0x12, registers.read8(high));
            assert_eq!(0x34, registers.read8(low));
        }
    }

    #[test]
    fn test_af_drops_low_nibble_of_f() {
        let mut registers = Registers::default();
        registers.write16(Reg16::AF, 0x12ff);

        assert_eq!(0x12, registers.read8(Reg8::A));
        assert_eq!(0xf0, registers.read8(Reg8::F));
        assert_eq!(0x12f0, registers.read16(Reg16::AF));

        registers.write8(Reg8::F, 0x0f);
        assert_eq!(0x00, registers.read8(Reg8::F));
    }

    #[test]
    fn test_flag_bit_positions() {
        let mut registers = Registers::default();
        for (flag, bit) in Flag::iter().zip([7, 6, 5, 4]) {
            registers.write8(Reg8::F, 0);
            registers.set_flag(flag, true);
            assert_eq!(1 << bit, registers.read8(Reg8::F), "{}", flag.as_ref());
            assert!(registers.get_flag(flag));
        }
    }

    #[test]
    fn test_f_byte_sets_named_flags() {
        let mut registers = Registers::default();
        registers.write8(Reg8::F, 0b1010_0000);

        assert!(registers.get_flag(Flag::Z));
        assert!(!registers.get_flag(Flag::N));
        assert!(registers.get_flag(Flag::H));
        assert!(!registers.get_flag(Flag::C));
    }

    #[test]
    fn test_sp_and_pc_are_independent() {
        let mut registers = Registers::default();
        registers.write16(Reg16::SP, 0xfffe);
        registers.write16(Reg16::PC, 0x0100);

        assert_eq!(0xfffe, registers.sp);
        assert_eq!(0x0100, registers.pc);
        assert_eq!(0, registers.get_hl());
    }
}
