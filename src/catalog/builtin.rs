/*!
 * The complete LR35902 opcode table, compiled into the crate so a catalog can be built without
 * an external definition file. Cycle counts are T-cycles; conditional entries list the
 * branch-taken cost first.
 */

use crate::catalog::entry::{
    Condition, Cycles, FlagEffect, FlagEffects, InstructionSpec, Mnemonic, OperandKind,
    OperandSpec, PostAdjust,
};
use crate::cpu::{Reg16, Reg8};

use FlagEffect::{Computed as X, Reset as O, Set as I, Unaffected as U};
use Mnemonic::*;

const fn flags(
    zero: FlagEffect,
    subtract: FlagEffect,
    half_carry: FlagEffect,
    carry: FlagEffect,
) -> FlagEffects {
    FlagEffects {
        zero,
        subtract,
        half_carry,
        carry,
    }
}

const NO_FLAGS: FlagEffects = flags(U, U, U, U);
const INC_FLAGS: FlagEffects = flags(X, O, X, U);
const DEC_FLAGS: FlagEffects = flags(X, I, X, U);
const ROTATE_A_FLAGS: FlagEffects = flags(O, O, O, X);
const ADD_HL_FLAGS: FlagEffects = flags(U, O, X, X);
const SP_OFFSET_FLAGS: FlagEffects = flags(O, O, X, X);
const ALL_FLAGS: FlagEffects = flags(X, X, X, X);
const ROTATE_FLAGS: FlagEffects = flags(X, O, O, X);
const SWAP_FLAGS: FlagEffects = flags(X, O, O, O);
const BIT_FLAGS: FlagEffects = flags(X, O, I, U);

/// 8-bit operand order used by the opcode encoding; index 6 is `(HL)`.
const R8: [Reg8; 8] = [
    Reg8::B,
    Reg8::C,
    Reg8::D,
    Reg8::E,
    Reg8::H,
    Reg8::L,
    Reg8::F,
    Reg8::A,
];
const RP: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP];
const RP2: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::AF];
const CONDITIONS: [Condition; 4] = [Condition::NZ, Condition::Z, Condition::NC, Condition::C];
const ALU: [(Mnemonic, FlagEffects); 8] = [
    (ADD, flags(X, O, X, X)),
    (ADC, flags(X, O, X, X)),
    (SUB, flags(X, I, X, X)),
    (SBC, flags(X, I, X, X)),
    (AND, flags(X, O, I, O)),
    (XOR, flags(X, O, O, O)),
    (OR, flags(X, O, O, O)),
    (CP, flags(X, I, X, X)),
];
const ROTATES: [Mnemonic; 8] = [RLC, RRC, RL, RR, SLA, SRA, SWAP, SRL];

fn entry(
    mnemonic: Mnemonic,
    bytes: u8,
    cycles: Cycles,
    operands: Vec<OperandSpec>,
    flags: FlagEffects,
) -> InstructionSpec {
    InstructionSpec::new(mnemonic, bytes, cycles, operands, flags)
}

fn fixed(cycles: u8) -> Cycles {
    Cycles::Fixed(cycles)
}

fn branch(taken: u8, not_taken: u8) -> Cycles {
    Cycles::Conditional { taken, not_taken }
}

fn r8(index: u8) -> OperandSpec {
    match index {
        6 => hl_ind(),
        _ => reg(R8[usize::from(index)]),
    }
}

fn reg(reg: Reg8) -> OperandSpec {
    OperandSpec::new(OperandKind::Register(reg))
}

fn pair(reg: Reg16) -> OperandSpec {
    OperandSpec::new(OperandKind::RegisterPair(reg))
}

fn ind(reg: Reg16) -> OperandSpec {
    OperandSpec::dereferenced(OperandKind::RegisterPair(reg))
}

fn hl_ind() -> OperandSpec {
    ind(Reg16::HL)
}

fn n8() -> OperandSpec {
    OperandSpec::new(OperandKind::Immediate8 { offset: 0 })
}

fn n16() -> OperandSpec {
    OperandSpec::new(OperandKind::Immediate16 { offset: 0 })
}

fn e8() -> OperandSpec {
    OperandSpec::new(OperandKind::Relative { offset: 0 })
}

fn a16() -> OperandSpec {
    OperandSpec::new(OperandKind::Address { offset: 0 })
}

fn a16_ind() -> OperandSpec {
    OperandSpec::dereferenced(OperandKind::Address { offset: 0 })
}

fn a8_ind() -> OperandSpec {
    OperandSpec::dereferenced(OperandKind::HighAddress { offset: 0 })
}

fn cond(index: u8) -> OperandSpec {
    OperandSpec::new(OperandKind::Condition(CONDITIONS[usize::from(index & 3)]))
}

/// Cost of an 8-bit access that goes through `(HL)` instead of a register.
fn hl_cost(index: u8, register: u8, memory: u8) -> Cycles {
    fixed(if index == 6 { memory } else { register })
}

fn unprefixed(opcode: u8) -> InstructionSpec {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0b111;
    let z = opcode & 0b111;
    let p = usize::from(y >> 1);

    match opcode {
        0x00 => entry(NOP, 1, fixed(4), vec![], NO_FLAGS),
        0x08 => entry(LD, 3, fixed(20), vec![a16_ind(), pair(Reg16::SP)], NO_FLAGS),
        0x10 => entry(STOP, 2, fixed(4), vec![n8()], NO_FLAGS),
        0x18 => entry(JR, 2, fixed(12), vec![e8()], NO_FLAGS),
        0x20 | 0x28 | 0x30 | 0x38 => entry(JR, 2, branch(12, 8), vec![cond(y - 4), e8()], NO_FLAGS),
        0x01 | 0x11 | 0x21 | 0x31 => entry(LD, 3, fixed(12), vec![pair(RP[p]), n16()], NO_FLAGS),
        0x09 | 0x19 | 0x29 | 0x39 => entry(
            ADD,
            1,
            fixed(8),
            vec![pair(Reg16::HL), pair(RP[p])],
            ADD_HL_FLAGS,
        ),
        0x02 => entry(LD, 1, fixed(8), vec![ind(Reg16::BC), reg(Reg8::A)], NO_FLAGS),
        0x12 => entry(LD, 1, fixed(8), vec![ind(Reg16::DE), reg(Reg8::A)], NO_FLAGS),
        0x22 => entry(
            LD,
            1,
            fixed(8),
            vec![hl_ind().with_adjust(PostAdjust::Increment), reg(Reg8::A)],
            NO_FLAGS,
        ),
        0x32 => entry(
            LD,
            1,
            fixed(8),
            vec![hl_ind().with_adjust(PostAdjust::Decrement), reg(Reg8::A)],
            NO_FLAGS,
        ),
        0x0A => entry(LD, 1, fixed(8), vec![reg(Reg8::A), ind(Reg16::BC)], NO_FLAGS),
        0x1A => entry(LD, 1, fixed(8), vec![reg(Reg8::A), ind(Reg16::DE)], NO_FLAGS),
        0x2A => entry(
            LD,
            1,
            fixed(8),
            vec![reg(Reg8::A), hl_ind().with_adjust(PostAdjust::Increment)],
            NO_FLAGS,
        ),
        0x3A => entry(
            LD,
            1,
            fixed(8),
            vec![reg(Reg8::A), hl_ind().with_adjust(PostAdjust::Decrement)],
            NO_FLAGS,
        ),
        0x03 | 0x13 | 0x23 | 0x33 => entry(INC, 1, fixed(8), vec![pair(RP[p])], NO_FLAGS),
        0x0B | 0x1B | 0x2B | 0x3B => entry(DEC, 1, fixed(8), vec![pair(RP[p])], NO_FLAGS),
        0x07 => entry(RLCA, 1, fixed(4), vec![], ROTATE_A_FLAGS),
        0x0F => entry(RRCA, 1, fixed(4), vec![], ROTATE_A_FLAGS),
        0x17 => entry(RLA, 1, fixed(4), vec![], ROTATE_A_FLAGS),
        0x1F => entry(RRA, 1, fixed(4), vec![], ROTATE_A_FLAGS),
        0x27 => entry(DAA, 1, fixed(4), vec![], flags(X, U, O, X)),
        0x2F => entry(CPL, 1, fixed(4), vec![], flags(U, I, I, U)),
        0x37 => entry(SCF, 1, fixed(4), vec![], flags(U, O, O, I)),
        0x3F => entry(CCF, 1, fixed(4), vec![], flags(U, O, O, X)),
        _ if x == 0 && z == 4 => entry(INC, 1, hl_cost(y, 4, 12), vec![r8(y)], INC_FLAGS),
        _ if x == 0 && z == 5 => entry(DEC, 1, hl_cost(y, 4, 12), vec![r8(y)], DEC_FLAGS),
        _ if x == 0 && z == 6 => entry(LD, 2, hl_cost(y, 8, 12), vec![r8(y), n8()], NO_FLAGS),

        0x76 => entry(HALT, 1, fixed(4), vec![], NO_FLAGS),
        0x40..=0x7F => {
            let cycles = if y == 6 || z == 6 { 8 } else { 4 };
            entry(LD, 1, fixed(cycles), vec![r8(y), r8(z)], NO_FLAGS)
        }
        0x80..=0xBF => {
            let (mnemonic, flags) = ALU[usize::from(y)];
            entry(
                mnemonic,
                1,
                hl_cost(z, 4, 8),
                vec![reg(Reg8::A), r8(z)],
                flags,
            )
        }

        0xC0 | 0xC8 | 0xD0 | 0xD8 => entry(RET, 1, branch(20, 8), vec![cond(y)], NO_FLAGS),
        0xC9 => entry(RET, 1, fixed(16), vec![], NO_FLAGS),
        0xD9 => entry(RETI, 1, fixed(16), vec![], NO_FLAGS),
        0xF1 => entry(POP, 1, fixed(12), vec![pair(Reg16::AF)], ALL_FLAGS),
        0xC1 | 0xD1 | 0xE1 => entry(POP, 1, fixed(12), vec![pair(RP2[p])], NO_FLAGS),
        0xC5 | 0xD5 | 0xE5 | 0xF5 => entry(PUSH, 1, fixed(16), vec![pair(RP2[p])], NO_FLAGS),
        0xC2 | 0xCA | 0xD2 | 0xDA => {
            entry(JP, 3, branch(16, 12), vec![cond(y), a16()], NO_FLAGS)
        }
        0xC3 => entry(JP, 3, fixed(16), vec![a16()], NO_FLAGS),
        0xE9 => entry(JP, 1, fixed(4), vec![pair(Reg16::HL)], NO_FLAGS),
        0xC4 | 0xCC | 0xD4 | 0xDC => {
            entry(CALL, 3, branch(24, 12), vec![cond(y), a16()], NO_FLAGS)
        }
        0xCD => entry(CALL, 3, fixed(24), vec![a16()], NO_FLAGS),
        0xCB => entry(PREFIX, 1, fixed(4), vec![], NO_FLAGS),
        0xE0 => entry(LDH, 2, fixed(12), vec![a8_ind(), reg(Reg8::A)], NO_FLAGS),
        0xF0 => entry(LDH, 2, fixed(12), vec![reg(Reg8::A), a8_ind()], NO_FLAGS),
        0xE2 => entry(
            LDH,
            1,
            fixed(8),
            vec![OperandSpec::dereferenced(OperandKind::Register(Reg8::C)), reg(Reg8::A)],
            NO_FLAGS,
        ),
        0xF2 => entry(
            LDH,
            1,
            fixed(8),
            vec![reg(Reg8::A), OperandSpec::dereferenced(OperandKind::Register(Reg8::C))],
            NO_FLAGS,
        ),
        0xE8 => entry(ADD, 2, fixed(16), vec![pair(Reg16::SP), e8()], SP_OFFSET_FLAGS),
        0xF8 => entry(
            LD,
            2,
            fixed(12),
            vec![
                pair(Reg16::HL),
                pair(Reg16::SP).with_adjust(PostAdjust::Increment),
                e8(),
            ],
            SP_OFFSET_FLAGS,
        ),
        0xF9 => entry(LD, 1, fixed(8), vec![pair(Reg16::SP), pair(Reg16::HL)], NO_FLAGS),
        0xEA => entry(LD, 3, fixed(16), vec![a16_ind(), reg(Reg8::A)], NO_FLAGS),
        0xFA => entry(LD, 3, fixed(16), vec![reg(Reg8::A), a16_ind()], NO_FLAGS),
        0xF3 => entry(DI, 1, fixed(4), vec![], NO_FLAGS),
        0xFB => entry(EI, 1, fixed(4), vec![], NO_FLAGS),
        _ if x == 3 && z == 6 => {
            let (mnemonic, flags) = ALU[usize::from(y)];
            entry(mnemonic, 2, fixed(8), vec![reg(Reg8::A), n8()], flags)
        }
        _ if x == 3 && z == 7 => entry(
            RST,
            1,
            fixed(16),
            vec![OperandSpec::new(OperandKind::Vector(y * 8))],
            NO_FLAGS,
        ),
        // D3 DB DD E3 E4 EB EC ED F4 FC FD
        _ => InstructionSpec::illegal(),
    }
}

fn cbprefixed(opcode: u8) -> InstructionSpec {
    let y = (opcode >> 3) & 0b111;
    let z = opcode & 0b111;

    match opcode >> 6 {
        0 => {
            let mnemonic = ROTATES[usize::from(y)];
            let flags = if mnemonic == SWAP {
                SWAP_FLAGS
            } else {
                ROTATE_FLAGS
            };
            entry(mnemonic, 2, hl_cost(z, 8, 16), vec![r8(z)], flags)
        }
        1 => entry(
            BIT,
            2,
            hl_cost(z, 8, 12),
            vec![OperandSpec::new(OperandKind::Bit(y)), r8(z)],
            BIT_FLAGS,
        ),
        2 => entry(
            RES,
            2,
            hl_cost(z, 8, 16),
            vec![OperandSpec::new(OperandKind::Bit(y)), r8(z)],
            NO_FLAGS,
        ),
        _ => entry(
            SET,
            2,
            hl_cost(z, 8, 16),
            vec![OperandSpec::new(OperandKind::Bit(y)), r8(z)],
            NO_FLAGS,
        ),
    }
}

pub fn unprefixed_table() -> Vec<InstructionSpec> {
    (0..=u8::MAX).map(unprefixed).collect()
}

pub fn cbprefixed_table() -> Vec<InstructionSpec> {
    (0..=u8::MAX).map(cbprefixed).collect()
}
