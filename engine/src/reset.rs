/*++

Licensed under the Apache-2.0 license.

File Name:

    reset.rs

Abstract:

    File contains reset types and the reset reason coordinator for the
    update flow.

--*/

use fwupdate_error::FwuResult;
use fwupdate_types::{CsmeResetState, FwUpdateStatus};

use crate::boot_status::{report_update_status, FwuBootStatus};
use crate::cprintln;
use crate::flash::FlashAccess;
use crate::heci::CsmeService;
use crate::status::PersistentStatusStore;

/// Reset Type
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ResetType {
    /// Cold Reset
    Cold,

    /// Warm Reset
    Warm,

    /// S3 Suspend
    S3,

    /// S4 Suspend
    S4,

    /// Global Reset
    Global,
}

/// Platform reset service.
///
/// On hardware `reset_system` does not return on success; the Ok path only
/// exists for models and tests.
pub trait ResetService {
    fn reset_system(&mut self, reset_type: ResetType) -> FwuResult<()>;
}

/// Outcome of the boot-time CSME reset check
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ResetOutcome {
    /// No CSME reset was pending
    NotPending,

    /// CSME confirmed completion over HECI
    CsmeDone,

    /// CSME did not confirm; the dependent state must not advance
    CsmeInvalid,
}

/// Records why a reset is needed and performs staged resets for the update
/// flow, distinct from the general platform reset reasons.
pub struct ResetReasonCoordinator;

impl ResetReasonCoordinator {
    /// Persist the pending marker and request a warm reset so the CSME can
    /// apply its staged update. Falls back to a cold reset if the warm
    /// request is refused; continuing with an un-reset CSME would violate
    /// the CSME update postcondition.
    pub fn request_csme_reset<F: FlashAccess, R: ResetService>(
        store: &PersistentStatusStore,
        flash: &mut F,
        status: &mut FwUpdateStatus,
        reset: &mut R,
    ) -> FwuResult<()> {
        status.set_csme_reset(CsmeResetState::Pending);
        store.save(flash, status)?;
        report_update_status(FwuBootStatus::CsmeResetRequested);
        request_reset(reset, ResetType::Warm)
    }

    /// On the boot after a requested reset, query the CSME for completion
    /// and record the outcome before the state machine may proceed.
    pub fn on_boot_check_csme_reset<F: FlashAccess, C: CsmeService>(
        store: &PersistentStatusStore,
        flash: &mut F,
        status: &mut FwUpdateStatus,
        csme: &mut C,
    ) -> FwuResult<ResetOutcome> {
        if status.csme_reset() != CsmeResetState::Pending {
            return Ok(ResetOutcome::NotPending);
        }

        let outcome = match csme.update_complete() {
            Ok(true) => {
                status.set_csme_reset(CsmeResetState::Done);
                report_update_status(FwuBootStatus::CsmeResetConfirmComplete);
                ResetOutcome::CsmeDone
            }
            Ok(false) | Err(_) => {
                cprintln!("[fwu] csme did not confirm update completion");
                status.set_csme_reset(CsmeResetState::Invalid);
                ResetOutcome::CsmeInvalid
            }
        };
        store.save(flash, status)?;
        Ok(outcome)
    }
}

/// Request a platform reset, falling back to the generic cold path when the
/// requested one is unavailable.
pub fn request_reset<R: ResetService>(reset: &mut R, reset_type: ResetType) -> FwuResult<()> {
    if reset.reset_system(reset_type).is_ok() {
        return Ok(());
    }
    cprintln!("[fwu] reset request refused, falling back to cold reset");
    reset.reset_system(ResetType::Cold)
}
