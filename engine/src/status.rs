/*++

Licensed under the Apache-2.0 license.

File Name:

    status.rs

Abstract:

    File contains the persistent firmware update status store.

--*/

use core::mem::size_of;

use fwupdate_error::{FwuError, FwuResult};
use fwupdate_types::{
    FwUpdateCompStatus, FwUpdateStatus, FW_UPDATE_COMP_STATUS_BYTE_SIZE,
    FW_UPDATE_STATUS_BYTE_SIZE,
};
use zerocopy::{FromBytes, IntoBytes};

use crate::flash::{FlashAccess, FlashRegion};
use crate::MAX_FW_COMPONENTS;

/// Bytes of the region actually used: the status record followed by the
/// per-component slots.
pub const STATUS_REGION_DATA_LEN: usize =
    FW_UPDATE_STATUS_BYTE_SIZE + MAX_FW_COMPONENTS * FW_UPDATE_COMP_STATUS_BYTE_SIZE;

/// Durable storage of `FwUpdateStatus` and the component status slots in the
/// reserved flash region tagged 'FWUP'.
///
/// Every save rewrites the full region with the 4-byte signature word
/// written last, so a save interrupted by power loss reads back without a
/// valid signature and loads as the Init default. The record is never seen
/// valid but internally torn.
#[derive(Clone, Copy)]
pub struct PersistentStatusStore {
    region: FlashRegion,
}

impl PersistentStatusStore {
    pub fn new<F: FlashAccess>(flash: &F, region: FlashRegion) -> FwuResult<Self> {
        let block_size = flash.block_size();
        if region.offset as usize % block_size != 0 {
            return Err(FwuError::FWU_STATUS_STORE_REGION_MISALIGNED);
        }
        if (region.size as usize) < Self::erase_len(block_size) {
            return Err(FwuError::FWU_STATUS_STORE_REGION_TOO_SMALL);
        }
        Ok(Self { region })
    }

    const fn erase_len(block_size: usize) -> usize {
        STATUS_REGION_DATA_LEN.div_ceil(block_size) * block_size
    }

    /// Load the status record.
    ///
    /// A region without the record marker (erased flash included) loads as
    /// the Init-state default; progress is never fabricated. A marked record
    /// with a bad version or length is corrupt and the caller must fall back
    /// to Init itself.
    pub fn load<F: FlashAccess>(&self, flash: &mut F) -> FwuResult<FwUpdateStatus> {
        let mut buf = [0u8; FW_UPDATE_STATUS_BYTE_SIZE];
        flash.read(self.region.offset, &mut buf)?;
        let status = FwUpdateStatus::read_from_bytes(&buf)
            .map_err(|_| FwuError::FWU_STATUS_STORE_CORRUPT)?;
        if !status.has_signature() {
            return Ok(FwUpdateStatus::default());
        }
        status.validate()?;
        Ok(status)
    }

    /// Persist the status record, preserving the component slots.
    pub fn save<F: FlashAccess>(&self, flash: &mut F, status: &FwUpdateStatus) -> FwuResult<()> {
        self.rewrite(flash, |buf| {
            buf[..FW_UPDATE_STATUS_BYTE_SIZE].copy_from_slice(status.as_bytes());
        })
    }

    /// Load one component status slot. A never-written slot loads as the
    /// no-update-pending default.
    pub fn load_comp_status<F: FlashAccess>(
        &self,
        flash: &mut F,
        idx: usize,
    ) -> FwuResult<FwUpdateCompStatus> {
        let offset = self.comp_offset(idx)?;
        let mut buf = [0u8; FW_UPDATE_COMP_STATUS_BYTE_SIZE];
        flash.read(offset, &mut buf)?;
        if buf.iter().all(|byte| *byte == 0xFF) {
            return Ok(FwUpdateCompStatus::default());
        }
        FwUpdateCompStatus::read_from_bytes(&buf).map_err(|_| FwuError::FWU_STATUS_STORE_CORRUPT)
    }

    /// Persist one component status slot, preserving everything else.
    pub fn save_comp_status<F: FlashAccess>(
        &self,
        flash: &mut F,
        idx: usize,
        comp: &FwUpdateCompStatus,
    ) -> FwuResult<()> {
        self.comp_offset(idx)?;
        let slot = FW_UPDATE_STATUS_BYTE_SIZE + idx * FW_UPDATE_COMP_STATUS_BYTE_SIZE;
        self.rewrite(flash, |buf| {
            buf[slot..slot + FW_UPDATE_COMP_STATUS_BYTE_SIZE].copy_from_slice(comp.as_bytes());
        })
    }

    fn comp_offset(&self, idx: usize) -> FwuResult<u32> {
        if idx >= MAX_FW_COMPONENTS {
            return Err(FwuError::FWU_STATUS_STORE_COMP_INDEX_OUT_OF_BOUNDS);
        }
        Ok(self.region.offset
            + (FW_UPDATE_STATUS_BYTE_SIZE + idx * FW_UPDATE_COMP_STATUS_BYTE_SIZE) as u32)
    }

    /// Read-modify-write of the whole region. The signature word goes last.
    fn rewrite<F: FlashAccess, M: FnOnce(&mut [u8])>(
        &self,
        flash: &mut F,
        mutate: M,
    ) -> FwuResult<()> {
        let mut buf = [0xFFu8; STATUS_REGION_DATA_LEN];
        flash.read(self.region.offset, &mut buf)?;
        mutate(&mut buf);

        flash.erase(self.region.offset, Self::erase_len(flash.block_size()))?;
        let sig_len = size_of::<u32>();
        flash.write(self.region.offset + sig_len as u32, &buf[sig_len..])?;
        flash.write(self.region.offset, &buf[..sig_len])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwupdate_types::{CompUpdateState, UpdateState, FW_UPDATE_STATUS_SIGNATURE};

    const BLOCK_SIZE: usize = 4096;

    struct TestFlash {
        data: Vec<u8>,
    }

    impl TestFlash {
        fn new() -> Self {
            Self {
                data: vec![0xFF; BLOCK_SIZE],
            }
        }
    }

    impl FlashAccess for TestFlash {
        fn block_size(&self) -> usize {
            BLOCK_SIZE
        }

        fn read(&mut self, offset: u32, buf: &mut [u8]) -> FwuResult<()> {
            let offset = offset as usize;
            buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
            Ok(())
        }

        fn erase(&mut self, offset: u32, len: usize) -> FwuResult<()> {
            let offset = offset as usize;
            self.data[offset..offset + len].fill(0xFF);
            Ok(())
        }

        fn write(&mut self, offset: u32, data: &[u8]) -> FwuResult<()> {
            let offset = offset as usize;
            for (dst, src) in self.data[offset..offset + data.len()].iter_mut().zip(data) {
                // NOR programming can only clear bits
                *dst &= src;
            }
            Ok(())
        }
    }

    fn test_store(flash: &TestFlash) -> PersistentStatusStore {
        PersistentStatusStore::new(
            flash,
            FlashRegion {
                offset: 0,
                size: BLOCK_SIZE as u32,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_erased_region_loads_as_init() {
        let mut flash = TestFlash::new();
        let store = test_store(&flash);
        let status = store.load(&mut flash).unwrap();
        assert_eq!(status.state().unwrap(), UpdateState::Init);
        assert_eq!(status.retry_count, 0);
        assert_eq!(status.csme_reset(), fwupdate_types::CsmeResetState::Init);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut flash = TestFlash::new();
        let store = test_store(&flash);

        let mut status = FwUpdateStatus::default();
        status.set_state(UpdateState::PartB);
        status.retry_count = 2;
        status.capsule_sig = [0x5A; 256];
        store.save(&mut flash, &status).unwrap();

        let loaded = store.load(&mut flash).unwrap();
        assert_eq!(loaded.as_bytes(), status.as_bytes());
    }

    #[test]
    fn test_comp_status_round_trip_preserves_main_record() {
        let mut flash = TestFlash::new();
        let store = test_store(&flash);

        let mut status = FwUpdateStatus::default();
        status.set_state(UpdateState::CapProcessing);
        store.save(&mut flash, &status).unwrap();

        let mut comp = FwUpdateCompStatus::default();
        comp.firmware_id = [7; 16];
        comp.last_attempt_version = 42;
        comp.set_pending(CompUpdateState::Processing);
        store.save_comp_status(&mut flash, 1, &comp).unwrap();

        let loaded = store.load_comp_status(&mut flash, 1).unwrap();
        assert_eq!(loaded.as_bytes(), comp.as_bytes());
        // Untouched slot still reads as the default
        assert_eq!(
            store.load_comp_status(&mut flash, 0).unwrap().pending(),
            CompUpdateState::None
        );
        // Main record survived the component rewrite
        let status = store.load(&mut flash).unwrap();
        assert_eq!(status.state().unwrap(), UpdateState::CapProcessing);
    }

    #[test]
    fn test_comp_index_bounds() {
        let mut flash = TestFlash::new();
        let store = test_store(&flash);
        assert_eq!(
            store.load_comp_status(&mut flash, MAX_FW_COMPONENTS).err(),
            Some(FwuError::FWU_STATUS_STORE_COMP_INDEX_OUT_OF_BOUNDS)
        );
    }

    #[test]
    fn test_bad_version_is_corrupt() {
        let mut flash = TestFlash::new();
        let store = test_store(&flash);

        let mut status = FwUpdateStatus::default();
        status.version = 9;
        store.save(&mut flash, &status).unwrap();
        assert_eq!(
            store.load(&mut flash).err(),
            Some(FwuError::FWU_STATUS_STORE_UNSUPPORTED_VERSION)
        );
    }

    #[test]
    fn test_unrecognized_signature_is_never_initialized() {
        let mut flash = TestFlash::new();
        // Garbage that is not the record marker
        flash.data[..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let store = test_store(&flash);
        let status = store.load(&mut flash).unwrap();
        assert_eq!(status.signature, FW_UPDATE_STATUS_SIGNATURE);
        assert_eq!(status.state().unwrap(), UpdateState::Init);
    }

    #[test]
    fn test_region_constraints() {
        let flash = TestFlash::new();
        assert_eq!(
            PersistentStatusStore::new(
                &flash,
                FlashRegion {
                    offset: 0,
                    size: 16
                }
            )
            .err(),
            Some(FwuError::FWU_STATUS_STORE_REGION_TOO_SMALL)
        );
        assert_eq!(
            PersistentStatusStore::new(
                &flash,
                FlashRegion {
                    offset: 100,
                    size: BLOCK_SIZE as u32
                }
            )
            .err(),
            Some(FwuError::FWU_STATUS_STORE_REGION_MISALIGNED)
        );
    }
}
