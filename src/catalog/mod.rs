/*!
 * The instruction catalog: one typed `InstructionSpec` for each of the 256 unprefixed and 256
 * CB-prefixed opcodes. A catalog is built once, either from the compiled-in table or from an
 * opcode definition file, and is read-only afterwards.
 */

mod builtin;
pub mod definition;
mod entry;

use log::{debug, info};

pub use definition::OpcodeDefinitions;
pub use entry::{
    Condition, Cycles, FlagEffect, FlagEffects, InstructionSpec, Mnemonic, OperandKind,
    OperandSpec, PostAdjust,
};

use crate::error::CatalogError;
use definition::{format_key, parse_key, InstructionDefinition};

const TABLE_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    unprefixed: Box<[InstructionSpec]>,
    cbprefixed: Box<[InstructionSpec]>,
}

impl Catalog {
    /// Builds the catalog from the compiled-in LR35902 table.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_tables(builtin::unprefixed_table(), builtin::cbprefixed_table())
    }

    /// Loads a catalog from opcode definition JSON. Both sections must define all 256 opcodes.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let definitions = OpcodeDefinitions::from_json(json)?;
        Self::from_definitions(&definitions)
    }

    pub fn from_definitions(definitions: &OpcodeDefinitions) -> Result<Self, CatalogError> {
        let unprefixed = Self::section_from_definitions(&definitions.unprefixed, false)?;
        let cbprefixed = Self::section_from_definitions(&definitions.cbprefixed, true)?;
        Self::from_tables(unprefixed, cbprefixed)
    }

    fn section_from_definitions<'a>(
        section: impl IntoIterator<Item = (&'a String, &'a InstructionDefinition)>,
        prefixed: bool,
    ) -> Result<Vec<InstructionSpec>, CatalogError> {
        let mut slots: Vec<Option<InstructionSpec>> = vec![None; TABLE_SIZE];
        for (key, definition) in section {
            let opcode = parse_key(key)?;
            let slot = &mut slots[usize::from(opcode)];
            if slot.is_some() {
                // "0x3e" and "0x3E" name the same opcode
                return Err(CatalogError::InvalidKey(key.clone()));
            }
            *slot = Some(definition.to_spec(key, prefixed)?);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(opcode, slot)| {
                slot.ok_or(CatalogError::MissingEntry {
                    prefixed,
                    opcode: opcode as u8,
                })
            })
            .collect()
    }

    fn from_tables(
        mut unprefixed: Vec<InstructionSpec>,
        mut cbprefixed: Vec<InstructionSpec>,
    ) -> Result<Self, CatalogError> {
        for (table, prefixed) in [(&mut unprefixed, false), (&mut cbprefixed, true)] {
            if table.len() != TABLE_SIZE {
                return Err(CatalogError::MissingEntry {
                    prefixed,
                    opcode: table.len().min(TABLE_SIZE - 1) as u8,
                });
            }
            for (opcode, spec) in table.iter_mut().enumerate() {
                let key = format_key(opcode as u8);
                spec.assign_offsets(&key, prefixed)?;
                spec.validate(&key, prefixed)?;
            }
        }

        let catalog = Self {
            unprefixed: unprefixed.into_boxed_slice(),
            cbprefixed: cbprefixed.into_boxed_slice(),
        };
        let illegal = catalog
            .iter()
            .filter(|(_, _, spec)| spec.mnemonic == Mnemonic::ILLEGAL)
            .count();
        debug!("{} opcodes are undefined", illegal);
        info!(
            "Built opcode catalog ({} unprefixed, {} CB-prefixed entries)",
            catalog.unprefixed.len(),
            catalog.cbprefixed.len()
        );
        Ok(catalog)
    }

    /// The entry for `opcode`. Total over both tables.
    pub fn lookup(&self, prefixed: bool, opcode: u8) -> &InstructionSpec {
        let table = if prefixed {
            &self.cbprefixed
        } else {
            &self.unprefixed
        };
        &table[usize::from(opcode)]
    }

    /// Every entry as `(prefixed, opcode, spec)`, unprefixed table first.
    pub fn iter(&self) -> impl Iterator<Item = (bool, u8, &InstructionSpec)> + '_ {
        let unprefixed = self
            .unprefixed
            .iter()
            .enumerate()
            .map(|(opcode, spec)| (false, opcode as u8, spec));
        let cbprefixed = self
            .cbprefixed
            .iter()
            .enumerate()
            .map(|(opcode, spec)| (true, opcode as u8, spec));
        unprefixed.chain(cbprefixed)
    }

    /// Exports the catalog in the opcode definition schema.
    pub fn to_definitions(&self) -> OpcodeDefinitions {
        let mut definitions = OpcodeDefinitions::default();
        for (prefixed, opcode, spec) in self.iter() {
            let section = if prefixed {
                &mut definitions.cbprefixed
            } else {
                &mut definitions.unprefixed
            };
            section.insert(
                format_key(opcode),
                InstructionDefinition::from_spec(spec, opcode),
            );
        }
        definitions
    }
}
