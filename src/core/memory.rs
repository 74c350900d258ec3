use crate::error::VmError;

/// Flat 64 KiB address space holding the loaded program.
///
/// The program may read and write its own bytes, so every access is
/// bounds-checked here rather than by the caller.
pub struct AddressSpace {
    ram: Vec<u8>,
    program_len: usize,
}

impl AddressSpace {
    pub const SIZE: usize = 0x10000; // 64 KiB

    /// Copy `program` into a fresh, zero-filled address space.
    pub fn new(program: &[u8]) -> Result<Self, VmError> {
        if program.is_empty() {
            return Err(VmError::EmptyProgram);
        }
        if program.len() > Self::SIZE {
            return Err(VmError::ProgramTooLarge {
                len: program.len(),
                max: Self::SIZE,
            });
        }

        let mut ram = vec![0; Self::SIZE];
        ram[..program.len()].copy_from_slice(program);
        Ok(Self {
            ram,
            program_len: program.len(),
        })
    }

    /// Number of bytes the program occupied when loaded.
    pub fn program_len(&self) -> usize {
        self.program_len
    }

    /// Read a byte from the address space
    pub fn read_byte(&self, addr: usize) -> Result<u8, VmError> {
        self.ram
            .get(addr)
            .copied()
            .ok_or(VmError::AddressOutOfRange {
                address: addr,
                size: Self::SIZE,
            })
    }

    /// Write a byte to the address space
    pub fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), VmError> {
        let slot = self.ram.get_mut(addr).ok_or(VmError::AddressOutOfRange {
            address: addr,
            size: Self::SIZE,
        })?;
        *slot = value;
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst`, one byte at a time in ascending
    /// order. Overlapping ranges see bytes already written by this copy.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) -> Result<(), VmError> {
        self.check_range(src, len)?;
        self.check_range(dst, len)?;
        for i in 0..len {
            self.ram[dst + i] = self.ram[src + i];
        }
        Ok(())
    }

    fn check_range(&self, start: usize, len: usize) -> Result<(), VmError> {
        match start.checked_add(len) {
            Some(end) if end <= Self::SIZE => Ok(()),
            _ => Err(VmError::AddressOutOfRange {
                address: start.saturating_add(len),
                size: Self::SIZE,
            }),
        }
    }
}

/// Reassemble a two-byte operand.
pub fn decode_u16(lo: u8, hi: u8) -> u16 {
    lo as u16 + 256 * hi as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_is_copied_and_rest_is_zero() {
        let mem = AddressSpace::new(&[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(mem.read_byte(0).unwrap(), 0x01);
        assert_eq!(mem.read_byte(2).unwrap(), 0x03);
        assert_eq!(mem.read_byte(3).unwrap(), 0x00);
        assert_eq!(mem.read_byte(0xFFFF).unwrap(), 0x00);
        assert_eq!(mem.program_len(), 3);
    }

    #[test]
    fn rejects_empty_and_oversized_programs() {
        assert_eq!(AddressSpace::new(&[]).err(), Some(VmError::EmptyProgram));

        let big = vec![0u8; AddressSpace::SIZE + 1];
        assert_eq!(
            AddressSpace::new(&big).err(),
            Some(VmError::ProgramTooLarge {
                len: AddressSpace::SIZE + 1,
                max: AddressSpace::SIZE,
            })
        );

        let exact = vec![0u8; AddressSpace::SIZE];
        assert!(AddressSpace::new(&exact).is_ok());
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut mem = AddressSpace::new(&[0x00]).unwrap();
        assert_eq!(
            mem.read_byte(0x10000),
            Err(VmError::AddressOutOfRange {
                address: 0x10000,
                size: AddressSpace::SIZE,
            })
        );
        assert!(mem.write_byte(0x10000, 1).is_err());
        assert!(mem.write_byte(0xFFFF, 1).is_ok());
    }

    #[test]
    fn two_byte_operands_are_low_then_high() {
        assert_eq!(decode_u16(0x34, 0x12), 0x1234);
        assert_eq!(decode_u16(0x34, 0x12), 4660);
        assert_eq!(decode_u16(0xFF, 0xFF), 0xFFFF);
    }

    #[test]
    fn copy_within_moves_bytes_and_checks_both_ranges() {
        let mut mem = AddressSpace::new(b"abcdef").unwrap();
        mem.copy_within(0, 0x100, 3).unwrap();
        assert_eq!(mem.read_byte(0x100).unwrap(), b'a');
        assert_eq!(mem.read_byte(0x102).unwrap(), b'c');

        assert!(mem.copy_within(0xFFFE, 0, 4).is_err());
        assert!(mem.copy_within(0, 0xFFFE, 4).is_err());
        assert!(mem.copy_within(0xFFFC, 0, 4).is_ok());
    }

    #[test]
    fn overlapping_copy_is_ascending() {
        let mut mem = AddressSpace::new(b"ab").unwrap();
        // Forward overlap smears the first byte across the range.
        mem.copy_within(0, 1, 3).unwrap();
        assert_eq!(mem.read_byte(1).unwrap(), b'a');
        assert_eq!(mem.read_byte(2).unwrap(), b'a');
        assert_eq!(mem.read_byte(3).unwrap(), b'a');
    }
}
