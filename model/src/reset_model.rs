/*++

Licensed under the Apache-2.0 license.

File Name:

    reset_model.rs

Abstract:

    File contains a reset service model recording requested resets.

--*/

use fwupdate_engine::{ResetService, ResetType};
use fwupdate_error::{FwuError, FwuResult};

/// Records reset requests instead of performing them; the test harness is
/// the "power cycle".
#[derive(Default)]
pub struct ResetModel {
    requests: Vec<ResetType>,
    pub refuse_warm: bool,
}

impl ResetModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[ResetType] {
        &self.requests
    }
}

impl ResetService for ResetModel {
    fn reset_system(&mut self, reset_type: ResetType) -> FwuResult<()> {
        if self.refuse_warm && reset_type == ResetType::Warm {
            return Err(FwuError::FWU_RESET_SERVICE_UNAVAILABLE);
        }
        self.requests.push(reset_type);
        Ok(())
    }
}
