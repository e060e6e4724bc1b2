use std::error::Error as StdError;

use crate::catalog::Mnemonic;

#[derive(Debug)]
pub enum Error {
    AddressingError {
        address: usize,
    },
    ImageTooLarge {
        size: usize,
    },
    OperandShape {
        mnemonic: Mnemonic,
        prefixed: bool,
        opcode: u8,
        operands: String,
    },
    UnimplementedInstruction {
        mnemonic: Mnemonic,
        prefixed: bool,
        opcode: u8,
    },
    /// An operand form the resolver has no binding for, such as a dereferenced bit index.
    InvalidOperand {
        operand: String,
    },
    Catalog(CatalogError),
}

fn opcode_label(prefixed: bool, opcode: u8) -> String {
    if prefixed {
        format!("0xCB {:#04x}", opcode)
    } else {
        format!("{:#04x}", opcode)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> core::result::Result<(), std::fmt::Error> {
        match self {
            Error::AddressingError { address } => write!(f, "AddressingError at {:x}", address),
            Error::ImageTooLarge { size } => write!(
                f,
                "memory image of {} bytes does not fit the 16-bit address space",
                size
            ),
            Error::OperandShape {
                mnemonic,
                prefixed,
                opcode,
                operands,
            } => write!(
                f,
                "{} ({}) cannot execute with operands [{}]",
                mnemonic.as_ref(),
                opcode_label(*prefixed, *opcode),
                operands
            ),
            Error::UnimplementedInstruction {
                mnemonic,
                prefixed,
                opcode,
            } => write!(
                f,
                "{} ({}) is not implemented",
                mnemonic.as_ref(),
                opcode_label(*prefixed, *opcode)
            ),
            Error::InvalidOperand { operand } => {
                write!(f, "operand {} cannot be dereferenced", operand)
            }
            Error::Catalog(err) => write!(f, "catalog error: {}", err),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Catalog(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn from_address(address: usize) -> Self {
        Error::AddressingError { address }
    }
}

impl From<CatalogError> for Error {
    fn from(value: CatalogError) -> Self {
        Error::Catalog(value)
    }
}

/// Problems found while turning opcode definitions into a `Catalog`. Any of these makes the
/// catalog unusable, so construction stops at the first one.
#[derive(Debug)]
pub enum CatalogError {
    MissingEntry {
        prefixed: bool,
        opcode: u8,
    },
    InvalidKey(String),
    UnknownMnemonic {
        key: String,
        mnemonic: String,
    },
    UnknownOperand {
        key: String,
        name: String,
    },
    InvalidOperand {
        key: String,
        reason: String,
    },
    InvalidCycles {
        key: String,
        cycles: Vec<u8>,
    },
    InvalidFlag {
        key: String,
        flag: char,
        value: String,
    },
    InconsistentLength {
        key: String,
        bytes: u8,
        required: u8,
    },
    Json(serde_json::Error),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> core::result::Result<(), std::fmt::Error> {
        match self {
            CatalogError::MissingEntry { prefixed, opcode } => {
                write!(f, "no definition for {}", opcode_label(*prefixed, *opcode))
            }
            CatalogError::InvalidKey(key) => write!(f, "invalid opcode key {:?}", key),
            CatalogError::UnknownMnemonic { key, mnemonic } => {
                write!(f, "{}: unknown mnemonic {:?}", key, mnemonic)
            }
            CatalogError::UnknownOperand { key, name } => {
                write!(f, "{}: unknown operand {:?}", key, name)
            }
            CatalogError::InvalidOperand { key, reason } => write!(f, "{}: {}", key, reason),
            CatalogError::InvalidCycles { key, cycles } => {
                write!(f, "{}: invalid cycle variants {:?}", key, cycles)
            }
            CatalogError::InvalidFlag { key, flag, value } => {
                write!(f, "{}: invalid effect {:?} for flag {}", key, value, flag)
            }
            CatalogError::InconsistentLength {
                key,
                bytes,
                required,
            } => write!(
                f,
                "{}: declared length {} but operands need {} bytes",
                key, bytes, required
            ),
            CatalogError::Json(err) => write!(f, "malformed definition file: {}", err),
        }
    }
}

impl StdError for CatalogError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            CatalogError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(value: serde_json::Error) -> Self {
        CatalogError::Json(value)
    }
}
