/*++

Licensed under the Apache-2.0 license.

File Name:

    registry.rs

Abstract:

    File contains the static component registry.

--*/

use fwupdate_error::{FwuError, FwuResult};
use fwupdate_types::*;

use crate::flash::FlashRegion;
use crate::MAX_FW_COMPONENTS;

/// Fixed component status slot assignment
pub const COMP_SLOT_BIOS: usize = 0;
pub const COMP_SLOT_CSME: usize = 1;
pub const COMP_SLOT_CSMD: usize = 2;
pub const COMP_SLOT_CMDI: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    BiosRegion,
    CsmeRegion,
    CsmeDriver,
    CommandRequest,
}

/// Everything the state machine needs to process one component kind
#[derive(Clone, Copy)]
pub struct ComponentDescriptor {
    pub signature: u32,
    pub kind: ComponentKind,
    pub firmware_id: Guid,
    /// Key-hash store usage checked by the verifier; empty means the capsule
    /// entry digest is authoritative (it is covered by the capsule signature)
    pub usage: HashUsage,
    /// Destination flash region; None for components applied over HECI only
    pub dest: Option<FlashRegion>,
    pub slot: usize,
    pub esrt_fw_type: u32,
}

/// Registry of the updatable components.
///
/// Descriptors are compiled once from the flash map; there is no runtime
/// registration.
pub struct ComponentRegistry {
    descriptors: [ComponentDescriptor; MAX_FW_COMPONENTS],
}

impl ComponentRegistry {
    pub fn from_flash_map(map: &[FlashMapEntry]) -> Self {
        let find = |sig: u32| {
            map.iter()
                .find(|entry| entry.signature == sig)
                .map(FlashRegion::from_map_entry)
        };
        Self {
            descriptors: [
                ComponentDescriptor {
                    signature: COMP_SIG_BIOS,
                    kind: ComponentKind::BiosRegion,
                    firmware_id: BIOS_REGION_FW_GUID,
                    usage: HashUsage::FIRMWARE_UPDATE,
                    dest: find(FLASH_MAP_SIG_BIOS),
                    slot: COMP_SLOT_BIOS,
                    esrt_fw_type: ESRT_FW_TYPE_SYSTEM_FIRMWARE,
                },
                ComponentDescriptor {
                    signature: COMP_SIG_CSME,
                    kind: ComponentKind::CsmeRegion,
                    firmware_id: CSME_REGION_FW_GUID,
                    usage: HashUsage::empty(),
                    dest: find(FLASH_MAP_SIG_CSME),
                    slot: COMP_SLOT_CSME,
                    esrt_fw_type: ESRT_FW_TYPE_DEVICE_FIRMWARE,
                },
                ComponentDescriptor {
                    signature: COMP_SIG_CSMD,
                    kind: ComponentKind::CsmeDriver,
                    firmware_id: CSME_DRIVER_FW_GUID,
                    usage: HashUsage::empty(),
                    dest: find(FLASH_MAP_SIG_CSMD),
                    slot: COMP_SLOT_CSMD,
                    esrt_fw_type: ESRT_FW_TYPE_DEVICE_FIRMWARE,
                },
                ComponentDescriptor {
                    signature: COMP_SIG_CMDI,
                    kind: ComponentKind::CommandRequest,
                    firmware_id: CMD_REQUEST_FW_GUID,
                    usage: HashUsage::empty(),
                    dest: None,
                    slot: COMP_SLOT_CMDI,
                    esrt_fw_type: ESRT_FW_TYPE_DEVICE_FIRMWARE,
                },
            ],
        }
    }

    /// Resolve a capsule component signature. An unknown signature means a
    /// malformed capsule; it is reported, never retried.
    pub fn resolve(&self, signature: u32) -> FwuResult<&ComponentDescriptor> {
        self.descriptors
            .iter()
            .find(|desc| desc.signature == signature)
            .ok_or(FwuError::FWU_REGISTRY_COMPONENT_NOT_FOUND)
    }

    pub fn descriptors(&self) -> &[ComponentDescriptor] {
        &self.descriptors
    }
}
