/*!
 * Flat memory bus backing the whole 16-bit address space. Memory-mapped regions (cartridge
 * banks, VRAM, I/O registers) are not modeled: every address is a plain byte of storage.
 */

use log::debug;

use crate::component::{Address, Addressable};
use crate::error::{Error, Result};

pub const ADDRESS_SPACE_SIZE: usize = 0x10000;

pub struct MemoryBus {
    pub data: Box<[u8]>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            data: vec![0; ADDRESS_SPACE_SIZE].into_boxed_slice(),
        }
    }

    /// Builds a bus with `image` copied in starting at address 0.
    pub fn from_image(image: &[u8]) -> Result<Self> {
        let mut memory_bus = Self::new();
        memory_bus.load_image(image)?;
        Ok(memory_bus)
    }

    /// Copies `image` into memory starting at address 0. Bytes past the image are untouched.
    pub fn load_image(&mut self, image: &[u8]) -> Result<()> {
        if image.len() > self.data.len() {
            return Err(Error::ImageTooLarge { size: image.len() });
        }
        self.data[..image.len()].copy_from_slice(image);
        debug!("Loaded {} byte image", image.len());
        Ok(())
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Addressable for MemoryBus {
    fn read_u8(&mut self, address: Address) -> Result<u8> {
        match self.data.get(usize::from(address)) {
            Some(byte) => Ok(*byte),
            None => Err(Error::from_address(address.into())),
        }
    }

    fn write_u8(&mut self, address: Address, value: u8) -> Result<()> {
        match self.data.get_mut(usize::from(address)) {
            Some(entry) => {
                *entry = value;
                Ok(())
            }
            None => Err(Error::from_address(address.into())),
        }
    }
}
