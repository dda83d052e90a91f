/*++

Licensed under the Apache-2.0 license.

File Name:

    esrt.rs

Abstract:

    File contains the ESRT export built from the persisted component
    status records.

--*/

use fwupdate_error::FwuResult;
use fwupdate_types::{EsrtFirmwareEntry, LastAttemptStatus};

use crate::flash::FlashAccess;
use crate::registry::{ComponentKind, ComponentRegistry};
use crate::status::PersistentStatusStore;
use crate::MAX_FW_COMPONENTS;

/// Snapshot of the OS-visible firmware resources.
///
/// Built once per boot from the persisted records; the command-request
/// pseudo-component is not a firmware resource and is excluded. Callers must
/// treat the snapshot as read-only and never re-read the store to
/// revalidate it within the same boot.
pub struct EsrtTable {
    entries: [EsrtFirmwareEntry; MAX_FW_COMPONENTS],
    count: usize,
}

impl EsrtTable {
    pub fn from_status<F: FlashAccess>(
        store: &PersistentStatusStore,
        flash: &mut F,
        registry: &ComponentRegistry,
    ) -> FwuResult<Self> {
        let mut entries = [EsrtFirmwareEntry::default(); MAX_FW_COMPONENTS];
        let mut count = 0;
        for desc in registry.descriptors() {
            if desc.kind == ComponentKind::CommandRequest {
                continue;
            }
            let comp = store.load_comp_status(flash, desc.slot)?;
            let succeeded = comp.last_attempt_status == u32::from(LastAttemptStatus::Success);
            entries[count] = EsrtFirmwareEntry {
                fw_class: desc.firmware_id,
                fw_type: desc.esrt_fw_type,
                // Version tracking is attempt-based; the running version is
                // only known after a successful attempt
                fw_version: if succeeded {
                    comp.last_attempt_version
                } else {
                    0
                },
                lowest_supported_fw_version: 0,
                capsule_flags: 0,
                last_attempt_version: comp.last_attempt_version,
                last_attempt_status: comp.last_attempt_status,
            };
            count += 1;
        }
        Ok(Self { entries, count })
    }

    pub fn entries(&self) -> &[EsrtFirmwareEntry] {
        &self.entries[..self.count]
    }
}
