/*++

Licensed under the Apache-2.0 license.

File Name:

    flash_model.rs

Abstract:

    File contains an in-memory NOR flash model with write fault injection.

--*/

use fwupdate_engine::FlashAccess;
use fwupdate_error::{FwuError, FwuResult};

pub const FLASH_BLOCK_SIZE: usize = 4096;

/// In-memory NOR flash. Erases fill whole blocks with 0xFF; programming can
/// only clear bits. A write budget simulates power loss partway through a
/// program operation.
pub struct FlashModel {
    data: Vec<u8>,
    write_budget: Option<usize>,
}

impl FlashModel {
    pub fn new(size: usize) -> Self {
        assert_eq!(size % FLASH_BLOCK_SIZE, 0);
        Self {
            data: vec![0xFF; size],
            write_budget: None,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes of a region, for asserting on programmed contents
    pub fn region(&self, offset: u32, len: usize) -> &[u8] {
        &self.data[offset as usize..offset as usize + len]
    }

    /// Accept `bytes` more programmed bytes, then fail every write. Models
    /// power loss in the middle of a program operation.
    pub fn fail_writes_after(&mut self, bytes: usize) {
        self.write_budget = Some(bytes);
    }

    /// The "reboot": the device itself is healthy again
    pub fn clear_write_fault(&mut self) {
        self.write_budget = None;
    }

    fn check_range(&self, offset: u32, len: usize) -> FwuResult<usize> {
        let offset = offset as usize;
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(offset),
            _ => Err(FwuError::FWU_FLASH_OUT_OF_BOUNDS),
        }
    }
}

impl FlashAccess for FlashModel {
    fn block_size(&self) -> usize {
        FLASH_BLOCK_SIZE
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> FwuResult<()> {
        let offset = self.check_range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn erase(&mut self, offset: u32, len: usize) -> FwuResult<()> {
        if offset as usize % FLASH_BLOCK_SIZE != 0 || len % FLASH_BLOCK_SIZE != 0 {
            return Err(FwuError::FWU_FLASH_ERASE_FAILURE);
        }
        let offset = self.check_range(offset, len)?;
        self.data[offset..offset + len].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> FwuResult<()> {
        let offset = self.check_range(offset, data.len())?;
        let allowed = match self.write_budget {
            Some(budget) => budget.min(data.len()),
            None => data.len(),
        };
        for (dst, src) in self.data[offset..offset + allowed]
            .iter_mut()
            .zip(&data[..allowed])
        {
            *dst &= src;
        }
        if let Some(budget) = &mut self.write_budget {
            *budget -= allowed;
            if allowed < data.len() {
                return Err(FwuError::FWU_FLASH_WRITE_FAILURE);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nor_semantics() {
        let mut flash = FlashModel::new(FLASH_BLOCK_SIZE);
        flash.write(0, &[0x0F]).unwrap();
        // Programming can clear bits but never set them
        flash.write(0, &[0xF0]).unwrap();
        assert_eq!(flash.data()[0], 0x00);
        flash.erase(0, FLASH_BLOCK_SIZE).unwrap();
        assert_eq!(flash.data()[0], 0xFF);
    }

    #[test]
    fn test_write_fault_injection() {
        let mut flash = FlashModel::new(FLASH_BLOCK_SIZE);
        flash.fail_writes_after(2);
        assert_eq!(
            flash.write(0, &[0, 0, 0, 0]).err(),
            Some(FwuError::FWU_FLASH_WRITE_FAILURE)
        );
        // The first two bytes landed before the power went out
        assert_eq!(&flash.data()[..4], &[0, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn test_bounds() {
        let mut flash = FlashModel::new(FLASH_BLOCK_SIZE);
        let mut buf = [0u8; 8];
        assert_eq!(
            flash.read(FLASH_BLOCK_SIZE as u32 - 4, &mut buf).err(),
            Some(FwuError::FWU_FLASH_OUT_OF_BOUNDS)
        );
    }
}
