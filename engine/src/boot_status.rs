/*++

Licensed under the Apache-2.0 license.

File Name:

    boot_status.rs

Abstract:

    Firmware update progress status codes.

--*/

use crate::cprintln;
use crate::printer::HexWord;

const CAPSULE_BOOT_STATUS_BASE: u32 = 0x600;
const COMPONENT_BOOT_STATUS_BASE: u32 = 0x640;
const CSME_BOOT_STATUS_BASE: u32 = 0x680;
const RECOVERY_BOOT_STATUS_BASE: u32 = 0x6C0;

/// Statuses used by the update engine to log progress across boots.
#[repr(u32)]
pub enum FwuBootStatus {
    // Capsule statuses
    CapsuleDetected = CAPSULE_BOOT_STATUS_BASE,
    CapsuleVerifyComplete = CAPSULE_BOOT_STATUS_BASE + 1,
    CapsuleProcessingComplete = CAPSULE_BOOT_STATUS_BASE + 2,

    // Component statuses
    ComponentVerifyComplete = COMPONENT_BOOT_STATUS_BASE,
    ComponentApplyComplete = COMPONENT_BOOT_STATUS_BASE + 1,
    UpdateComplete = COMPONENT_BOOT_STATUS_BASE + 2,

    // CSME statuses
    CsmeResetRequested = CSME_BOOT_STATUS_BASE,
    CsmeResetConfirmComplete = CSME_BOOT_STATUS_BASE + 1,

    // Recovery statuses
    RecoveryStarted = RECOVERY_BOOT_STATUS_BASE,
    RecoveryApplyComplete = RECOVERY_BOOT_STATUS_BASE + 1,
}

impl From<FwuBootStatus> for u32 {
    /// Converts to this type from the input type.
    fn from(status: FwuBootStatus) -> u32 {
        status as u32
    }
}

/// Report an update progress status to the debug log.
pub fn report_update_status(status: FwuBootStatus) {
    cprintln!("[fwu] status 0x{}", HexWord(status.into()));
}
