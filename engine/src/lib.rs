/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Firmware update engine: persistent status store, component registry,
    update state machine and reset coordination.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

pub mod boot_status;
pub mod esrt;
pub mod flash;
pub mod heci;
pub mod printer;
pub mod registry;
pub mod reset;
pub mod state_machine;
pub mod status;

pub use boot_status::{report_update_status, FwuBootStatus};
pub use esrt::EsrtTable;
pub use flash::{program_region, FlashAccess, FlashRegion};
pub use heci::{CsmeService, SUBCMD_DUMP_CSE_STATUS, SUBCMD_ENTER_DNX_MODE};
pub use registry::{ComponentDescriptor, ComponentKind, ComponentRegistry};
pub use reset::{ResetOutcome, ResetReasonCoordinator, ResetService, ResetType};
pub use state_machine::{
    BootDecision, UpdateContext, UpdateStateMachine, MAX_RECOVERY_RETRIES, MAX_UPDATE_RETRIES,
};
pub use status::PersistentStatusStore;

/// Number of component status slots in the reserved flash region
pub const MAX_FW_COMPONENTS: usize = 4;
