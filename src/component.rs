use crate::error::Result;

pub type Address = u16;

/// Anything the CPU can fetch from and store to. Word accesses are little-endian: the low byte
/// lives at `address`, the high byte at `address + 1` (wrapping at the top of the space).
pub trait Addressable {
    fn read_u8(&mut self, address: Address) -> Result<u8>;

    fn write_u8(&mut self, address: Address, data: u8) -> Result<()>;

    fn read_u16(&mut self, address: Address) -> Result<u16> {
        let bytes = [
            self.read_u8(address)?,
            self.read_u8(address.wrapping_add(1))?,
        ];
        Ok(u16::from_le_bytes(bytes))
    }

    fn write_u16(&mut self, address: Address, data: u16) -> Result<()> {
        let bytes = data.to_le_bytes();
        self.write_u8(address, bytes[0])?;
        self.write_u8(address.wrapping_add(1), bytes[1])
    }
}
