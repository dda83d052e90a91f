/*++

Licensed under the Apache-2.0 license.

File Name:

    state_machine.rs

Abstract:

    File contains the implementation of the firmware update state machine.

--*/

use fwupdate_error::{FwuError, FwuResult};
use fwupdate_types::{
    CapsuleSignature, CompUpdateState, CsmeResetState, FwUpdateStatus, HashAlg, HashUsage,
    LastAttemptStatus, UpdateState, CAPSULE_SIG_COPY_BYTE_SIZE, CAPSULE_TRAILER_BYTE_SIZE,
    COMP_SIG_BIOS, COMP_SIG_CMDI, COMP_SIG_CSMD, COMP_SIG_CSME,
};
use fwupdate_verify::{CapsuleInfo, CapsuleVerificationEnv, IntegrityVerifier};
use zerocopy::FromBytes;

use crate::boot_status::{report_update_status, FwuBootStatus};
use crate::cprintln;
use crate::flash::{program_region, FlashAccess};
use crate::heci::CsmeService;
use crate::printer::HexWord;
use crate::registry::{ComponentDescriptor, ComponentKind, ComponentRegistry};
use crate::reset::{request_reset, ResetReasonCoordinator, ResetService, ResetType};
use crate::status::PersistentStatusStore;

/// Apply attempts allowed per state before routing to recovery
pub const MAX_UPDATE_RETRIES: u8 = 3;

/// Recovery apply attempts allowed before handing off to the platform
/// recovery payload
pub const MAX_RECOVERY_RETRIES: u8 = 3;

/// What the boot flow must do after the state machine ran
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BootDecision {
    /// Proceed to normal boot
    ContinueBoot,

    /// A platform reset was requested; do not continue to the OS
    ResetPending(ResetType),

    /// Recovery attempts are exhausted; hand control to the platform
    /// recovery payload
    RecoveryHandoff,
}

/// Platform services and capsule sources for one boot-time run.
///
/// Explicit context instead of process-wide singletons; each seam has one
/// implementation per platform.
pub struct UpdateContext<'a, F, C, R, V> {
    pub flash: &'a mut F,
    pub csme: &'a mut C,
    pub reset: &'a mut R,
    pub venv: &'a mut V,
    /// Capsule bytes if the boot medium carries one
    pub capsule: Option<&'a [u8]>,
    /// Platform recovery image for the BIOS region
    pub recovery_image: Option<&'a [u8]>,
}

enum StepOutcome {
    Complete,
    ResetRequired,
}

enum ApplyOutcome {
    Applied,
    ResetRequired,
}

/// The firmware update state machine, driven once per boot.
///
/// Every state transition is persisted before a side-effecting flash write
/// begins, so a power loss at any point resumes at a well-defined state
/// instead of blindly re-applying a partially written component.
pub struct UpdateStateMachine<'a> {
    store: PersistentStatusStore,
    registry: &'a ComponentRegistry,
}

impl<'a> UpdateStateMachine<'a> {
    pub fn new(store: PersistentStatusStore, registry: &'a ComponentRegistry) -> Self {
        Self { store, registry }
    }

    /// Execute one boot-time pass and decide how the boot continues.
    pub fn run_to_decision<F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'_, F, C, R, V>,
    ) -> FwuResult<BootDecision>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        cprintln!("[fwu] ++");

        let mut status = match self.store.load(ctx.flash) {
            Ok(status) => status,
            Err(err) => {
                // A corrupt record must never fabricate progress
                cprintln!(
                    "[fwu] status record corrupt, err 0x{}, treating as initial",
                    HexWord(err.into())
                );
                FwUpdateStatus::default()
            }
        };

        // Settle CSME reset bookkeeping before any state may advance
        if status.csme_reset() == CsmeResetState::Pending {
            ResetReasonCoordinator::on_boot_check_csme_reset(
                &self.store,
                ctx.flash,
                &mut status,
                ctx.csme,
            )?;
        }

        loop {
            let state = match status.state() {
                Ok(state) => state,
                Err(_) => {
                    // Marked valid but with an unknown state byte; recover
                    self.enter_recovery(ctx, &mut status)?;
                    continue;
                }
            };

            match state {
                UpdateState::Init => {
                    let Some(capsule) = ctx.capsule else {
                        cprintln!("[fwu] no capsule, continue normal boot");
                        return Ok(BootDecision::ContinueBoot);
                    };
                    report_update_status(FwuBootStatus::CapsuleDetected);
                    match self.start_update(ctx, capsule) {
                        Ok(fresh) => status = fresh,
                        Err(err) => {
                            cprintln!("[fwu] capsule rejected, err 0x{}", HexWord(err.into()));
                            return Ok(BootDecision::ContinueBoot);
                        }
                    }
                }

                UpdateState::CapProcessing => match self.classify_capsule(ctx, &status) {
                    Ok(next) => {
                        status.set_state(next);
                        status.retry_count = 0;
                        self.store.save(ctx.flash, &status)?;
                        report_update_status(FwuBootStatus::CapsuleProcessingComplete);
                    }
                    Err(err) => {
                        if let Some(decision) = self.handle_part_failure(ctx, &mut status, err)? {
                            return Ok(decision);
                        }
                    }
                },

                UpdateState::PartA | UpdateState::PartB | UpdateState::PartAB => {
                    match self.process_part(ctx, &mut status, state) {
                        Ok(StepOutcome::Complete) => {
                            status.set_state(UpdateState::Done);
                            status.retry_count = 0;
                            self.store.save(ctx.flash, &status)?;
                            report_update_status(FwuBootStatus::UpdateComplete);
                        }
                        Ok(StepOutcome::ResetRequired) => {
                            return Ok(BootDecision::ResetPending(ResetType::Warm));
                        }
                        Err(err) => {
                            if let Some(decision) =
                                self.handle_part_failure(ctx, &mut status, err)?
                            {
                                return Ok(decision);
                            }
                        }
                    }
                }

                UpdateState::Recovery => {
                    if status.retry_count >= MAX_RECOVERY_RETRIES {
                        // Persisted recovery-stuck state; no silent retry loop
                        cprintln!(
                            "[fwu] recovery stuck, err 0x{}",
                            HexWord(FwuError::FWU_UPDATE_SM_RECOVERY_STUCK.into())
                        );
                        return Ok(BootDecision::RecoveryHandoff);
                    }
                    match self.process_recovery(ctx) {
                        Ok(()) => {
                            status.set_state(UpdateState::Done);
                            status.retry_count = 0;
                            self.store.save(ctx.flash, &status)?;
                            report_update_status(FwuBootStatus::RecoveryApplyComplete);
                        }
                        Err(err) => {
                            cprintln!("[fwu] recovery failed, err 0x{}", HexWord(err.into()));
                            status.retry_count = status.retry_count.saturating_add(1);
                            self.store.save(ctx.flash, &status)?;
                            if status.retry_count >= MAX_RECOVERY_RETRIES {
                                return Ok(BootDecision::RecoveryHandoff);
                            }
                            request_reset(ctx.reset, ResetType::Warm)?;
                            return Ok(BootDecision::ResetPending(ResetType::Warm));
                        }
                    }
                }

                UpdateState::Done => {
                    if let Some(capsule) = ctx.capsule {
                        if Self::is_new_capsule(capsule, &status) {
                            cprintln!("[fwu] new capsule detected");
                            status = FwUpdateStatus::default();
                            self.store.save(ctx.flash, &status)?;
                            continue;
                        }
                    }
                    cprintln!("[fwu] --");
                    return Ok(BootDecision::ContinueBoot);
                }
            }
        }
    }

    /// Verify a freshly detected capsule and set up the new update cycle.
    fn start_update<'c, F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'c, F, C, R, V>,
        capsule: &'c [u8],
    ) -> FwuResult<FwUpdateStatus>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        let info = IntegrityVerifier::new(&mut *ctx.venv).verify_capsule(capsule)?;
        report_update_status(FwuBootStatus::CapsuleVerifyComplete);

        let sig = info.signature().sig_bytes()?;
        if sig.len() != CAPSULE_SIG_COPY_BYTE_SIZE {
            // Capsule-level signing is RSA2048 so the status record retains
            // the signature verbatim
            return Err(FwuError::FWU_VERIFY_UNSUPPORTED_SIG_TYPE);
        }

        let mut fresh = FwUpdateStatus::default();
        fresh.capsule_sig.copy_from_slice(sig);
        fresh.set_state(UpdateState::CapProcessing);

        for entry in info.entries() {
            // Unknown signatures are classified (and routed to recovery) in
            // the CapProcessing state
            let Ok(desc) = self.registry.resolve(entry.signature) else {
                continue;
            };
            let mut comp = self.store.load_comp_status(ctx.flash, desc.slot)?;
            comp.firmware_id = desc.firmware_id;
            comp.hardware_instance = entry.hardware_instance;
            comp.last_attempt_version = entry.version;
            comp.set_pending(CompUpdateState::Pending);
            self.store.save_comp_status(ctx.flash, desc.slot, &comp)?;
        }

        // Persist the transition before any component work begins
        self.store.save(ctx.flash, &fresh)?;
        Ok(fresh)
    }

    /// Re-authenticate the capsule source on a (possibly resumed) boot and
    /// check it is still the capsule this update cycle was started for.
    fn authenticate_capsule<'c, F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'c, F, C, R, V>,
        status: &FwUpdateStatus,
    ) -> FwuResult<CapsuleInfo<'c>>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        let capsule = ctx
            .capsule
            .ok_or(FwuError::FWU_UPDATE_SM_CAPSULE_MISSING)?;
        let info = IntegrityVerifier::new(&mut *ctx.venv).verify_capsule(capsule)?;
        let sig = info.signature().sig_bytes()?;
        if sig.len() != CAPSULE_SIG_COPY_BYTE_SIZE || sig != &status.capsule_sig[..] {
            return Err(FwuError::FWU_UPDATE_SM_CAPSULE_CHANGED);
        }
        Ok(info)
    }

    /// Decide which part states the capsule requires.
    fn classify_capsule<F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'_, F, C, R, V>,
        status: &FwUpdateStatus,
    ) -> FwuResult<UpdateState>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        let info = self.authenticate_capsule(ctx, status)?;
        let mut has_bios = false;
        let mut has_csme = false;
        for entry in info.entries() {
            let desc = self.registry.resolve(entry.signature)?;
            match desc.kind {
                ComponentKind::BiosRegion => has_bios = true,
                _ => has_csme = true,
            }
        }
        if has_bios && has_csme {
            Ok(UpdateState::PartAB)
        } else if has_bios {
            Ok(UpdateState::PartA)
        } else {
            Ok(UpdateState::PartB)
        }
    }

    /// Process every component belonging to the current part state.
    fn process_part<F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'_, F, C, R, V>,
        status: &mut FwUpdateStatus,
        state: UpdateState,
    ) -> FwuResult<StepOutcome>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        let info = self.authenticate_capsule(ctx, status)?;

        // CSME-side components go first; the BIOS region is always last so
        // a failed CSME cycle cannot strand half-updated host firmware
        const PROCESS_ORDER: [u32; 4] =
            [COMP_SIG_CMDI, COMP_SIG_CSME, COMP_SIG_CSMD, COMP_SIG_BIOS];

        for sig in PROCESS_ORDER {
            let in_part = match state {
                UpdateState::PartA => sig == COMP_SIG_BIOS,
                UpdateState::PartB => sig != COMP_SIG_BIOS,
                _ => true,
            };
            if !in_part {
                continue;
            }
            let Some(entry) = info.find_component(sig) else {
                continue;
            };
            let entry = *entry;
            let desc = *self.registry.resolve(sig)?;
            let mut comp = self.store.load_comp_status(ctx.flash, desc.slot)?;
            match comp.pending() {
                CompUpdateState::None | CompUpdateState::Done => continue,
                CompUpdateState::Pending | CompUpdateState::Processing => {}
            }

            let data = info.component_data(&entry)?;
            if comp.pending() == CompUpdateState::Pending {
                comp.set_pending(CompUpdateState::Processing);
                self.store.save_comp_status(ctx.flash, desc.slot, &comp)?;
            }

            match self.apply_component(ctx, status, &desc, &entry, data) {
                Ok(ApplyOutcome::Applied) => {
                    comp.set_pending(CompUpdateState::Done);
                    comp.last_attempt_status = LastAttemptStatus::Success.into();
                    comp.last_attempt_version = entry.version;
                    self.store.save_comp_status(ctx.flash, desc.slot, &comp)?;
                    report_update_status(FwuBootStatus::ComponentApplyComplete);
                }
                Ok(ApplyOutcome::ResetRequired) => return Ok(StepOutcome::ResetRequired),
                Err(err) => {
                    comp.last_attempt_status = esrt_status_for(err).into();
                    self.store.save_comp_status(ctx.flash, desc.slot, &comp)?;
                    return Err(err);
                }
            }
        }

        Ok(StepOutcome::Complete)
    }

    /// Verify and apply one component.
    fn apply_component<F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'_, F, C, R, V>,
        status: &mut FwUpdateStatus,
        desc: &ComponentDescriptor,
        entry: &fwupdate_types::CapsuleComponentEntry,
        data: &[u8],
    ) -> FwuResult<ApplyOutcome>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        // Authenticate the payload before anything touches flash or the CSME
        IntegrityVerifier::new(&mut *ctx.venv).verify_hash(
            data,
            HashAlg::Sha256,
            desc.usage,
            Some(&entry.digest),
        )?;
        report_update_status(FwuBootStatus::ComponentVerifyComplete);

        match desc.kind {
            ComponentKind::BiosRegion => {
                let dest = desc
                    .dest
                    .ok_or(FwuError::FWU_REGISTRY_FLASH_MAP_ENTRY_MISSING)?;
                program_region(ctx.flash, dest, data)?;
                Ok(ApplyOutcome::Applied)
            }
            ComponentKind::CsmeRegion | ComponentKind::CsmeDriver => {
                self.apply_csme_component(ctx, status, desc, data)
            }
            ComponentKind::CommandRequest => {
                for word in data.chunks_exact(4) {
                    let subcmd = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                    ctx.csme.simple_command(subcmd)?;
                }
                Ok(ApplyOutcome::Applied)
            }
        }
    }

    /// CSME-side components need a platform reset between staging and
    /// finalizing; `csme_need_reset` tracks where in that cycle we are.
    fn apply_csme_component<F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'_, F, C, R, V>,
        status: &mut FwUpdateStatus,
        desc: &ComponentDescriptor,
        data: &[u8],
    ) -> FwuResult<ApplyOutcome>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        match status.csme_reset() {
            CsmeResetState::Init => {
                // Stage the image, tell the CSME, then reset so it can apply
                if let Some(dest) = desc.dest {
                    program_region(ctx.flash, dest, data)?;
                }
                ctx.csme.prepare_for_update()?;
                ResetReasonCoordinator::request_csme_reset(
                    &self.store,
                    ctx.flash,
                    status,
                    ctx.reset,
                )?;
                Ok(ApplyOutcome::ResetRequired)
            }
            CsmeResetState::Pending => {
                // The requested reset never happened; ask again
                ResetReasonCoordinator::request_csme_reset(
                    &self.store,
                    ctx.flash,
                    status,
                    ctx.reset,
                )?;
                Ok(ApplyOutcome::ResetRequired)
            }
            CsmeResetState::Done => {
                // Reset confirmed over HECI; the staged image is live and
                // was just re-verified, nothing is re-sent
                status.set_csme_reset(CsmeResetState::Init);
                self.store.save(ctx.flash, status)?;
                Ok(ApplyOutcome::Applied)
            }
            CsmeResetState::Invalid => {
                status.set_csme_reset(CsmeResetState::Init);
                self.store.save(ctx.flash, status)?;
                Err(FwuError::FWU_CSME_UPDATE_INCOMPLETE)
            }
        }
    }

    /// Apply the platform recovery image to the BIOS region.
    fn process_recovery<F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'_, F, C, R, V>,
    ) -> FwuResult<()>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        report_update_status(FwuBootStatus::RecoveryStarted);
        let image = ctx
            .recovery_image
            .ok_or(FwuError::FWU_UPDATE_SM_RECOVERY_IMAGE_MISSING)?;

        // The recovery image is trusted via the provisioned store, never
        // via the capsule that just failed
        IntegrityVerifier::new(&mut *ctx.venv).verify_hash(
            image,
            HashAlg::Sha256,
            HashUsage::FIRMWARE_UPDATE,
            None,
        )?;

        let desc = self.registry.resolve(COMP_SIG_BIOS)?;
        let dest = desc
            .dest
            .ok_or(FwuError::FWU_REGISTRY_FLASH_MAP_ENTRY_MISSING)?;
        program_region(ctx.flash, dest, image)?;

        let mut comp = self.store.load_comp_status(ctx.flash, desc.slot)?;
        comp.firmware_id = desc.firmware_id;
        comp.set_pending(CompUpdateState::Done);
        comp.last_attempt_status = LastAttemptStatus::Success.into();
        self.store.save_comp_status(ctx.flash, desc.slot, &comp)?;
        Ok(())
    }

    /// Per-state retry policy: transient classes burn one retry per boot,
    /// malformed-capsule classes go straight to recovery.
    fn handle_part_failure<F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'_, F, C, R, V>,
        status: &mut FwUpdateStatus,
        err: FwuError,
    ) -> FwuResult<Option<BootDecision>>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        cprintln!("[fwu] update step failed, err 0x{}", HexWord(err.into()));
        if err.is_not_found() {
            self.enter_recovery(ctx, status)?;
            return Ok(None);
        }
        status.retry_count = status.retry_count.saturating_add(1);
        if status.retry_count >= MAX_UPDATE_RETRIES {
            self.enter_recovery(ctx, status)?;
            return Ok(None);
        }
        self.store.save(ctx.flash, status)?;
        request_reset(ctx.reset, ResetType::Warm)?;
        Ok(Some(BootDecision::ResetPending(ResetType::Warm)))
    }

    fn enter_recovery<F, C, R, V>(
        &self,
        ctx: &mut UpdateContext<'_, F, C, R, V>,
        status: &mut FwUpdateStatus,
    ) -> FwuResult<()>
    where
        F: FlashAccess,
        C: CsmeService,
        R: ResetService,
        V: CapsuleVerificationEnv,
    {
        cprintln!("[fwu] entering recovery");
        status.set_state(UpdateState::Recovery);
        status.retry_count = 0;
        self.store.save(ctx.flash, status)
    }

    /// A capsule whose signature differs from the completed cycle's starts
    /// a new one. No verification here; the Init state does that.
    fn is_new_capsule(capsule: &[u8], status: &FwUpdateStatus) -> bool {
        let Some(trailer_at) = capsule.len().checked_sub(CAPSULE_TRAILER_BYTE_SIZE) else {
            return false;
        };
        let Ok((sig, _)) = CapsuleSignature::read_from_prefix(&capsule[trailer_at..]) else {
            return false;
        };
        let Ok(bytes) = sig.sig_bytes() else {
            return false;
        };
        bytes.len() == CAPSULE_SIG_COPY_BYTE_SIZE && bytes != &status.capsule_sig[..]
    }
}

fn esrt_status_for(err: FwuError) -> LastAttemptStatus {
    if err.is_security_violation() {
        LastAttemptStatus::AuthError
    } else if err.is_not_found() {
        LastAttemptStatus::InvalidFormat
    } else {
        LastAttemptStatus::Unsuccessful
    }
}
