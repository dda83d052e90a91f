/*++

Licensed under the Apache-2.0 license.

File Name:

    flash.rs

Abstract:

    File contains the flash access seam and region programming helpers.

--*/

use fwupdate_error::{FwuError, FwuResult};
use fwupdate_types::FlashMapEntry;

/// Access to the SPI flash device backing the update regions.
///
/// Erases operate on whole blocks; writes may only program erased bytes
/// (clear bits, never set them).
pub trait FlashAccess {
    /// Erase block size in bytes. Erase offsets and lengths are multiples.
    fn block_size(&self) -> usize;

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> FwuResult<()>;

    fn erase(&mut self, offset: u32, len: usize) -> FwuResult<()>;

    fn write(&mut self, offset: u32, data: &[u8]) -> FwuResult<()>;
}

/// A named region of the flash device, resolved from the flash map
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashRegion {
    pub offset: u32,
    pub size: u32,
}

impl FlashRegion {
    pub fn from_map_entry(entry: &FlashMapEntry) -> Self {
        Self {
            offset: entry.offset,
            size: entry.size,
        }
    }
}

const READBACK_CHUNK_SIZE: usize = 256;

/// Erase `region`, program `data` into it and verify the readback.
pub fn program_region<F: FlashAccess>(
    flash: &mut F,
    region: FlashRegion,
    data: &[u8],
) -> FwuResult<()> {
    if data.len() > region.size as usize {
        return Err(FwuError::FWU_FLASH_OUT_OF_BOUNDS);
    }

    let block_size = flash.block_size();
    let erase_len = data.len().div_ceil(block_size) * block_size;
    if erase_len > region.size as usize {
        return Err(FwuError::FWU_FLASH_OUT_OF_BOUNDS);
    }

    flash.erase(region.offset, erase_len)?;
    flash.write(region.offset, data)?;

    // Readback verify; flash that programs silently wrong bits must not pass
    let mut buf = [0u8; READBACK_CHUNK_SIZE];
    let mut done = 0usize;
    while done < data.len() {
        let len = READBACK_CHUNK_SIZE.min(data.len() - done);
        flash.read(region.offset + done as u32, &mut buf[..len])?;
        if buf[..len] != data[done..done + len] {
            return Err(FwuError::FWU_FLASH_VERIFY_FAILURE);
        }
        done += len;
    }

    Ok(())
}
