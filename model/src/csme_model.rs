/*++

Licensed under the Apache-2.0 license.

File Name:

    csme_model.rs

Abstract:

    File contains a CSME model answering the HECI service seam.

--*/

use fwupdate_engine::CsmeService;
use fwupdate_error::{FwuError, FwuResult};

/// Scripted CSME. Tests flip `complete_after_reset` to model the CSME
/// finishing its internal update across the requested platform reset.
#[derive(Default)]
pub struct CsmeModel {
    commands: Vec<u32>,
    prepare_count: usize,
    pub complete_after_reset: bool,
    pub fail_commands: bool,
}

impl CsmeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simple commands received, in order
    pub fn commands(&self) -> &[u32] {
        &self.commands
    }

    /// How many prepare-for-update requests were received
    pub fn prepare_count(&self) -> usize {
        self.prepare_count
    }
}

impl CsmeService for CsmeModel {
    fn simple_command(&mut self, subcmd: u32) -> FwuResult<u32> {
        if self.fail_commands {
            return Err(FwuError::FWU_CSME_DEVICE_ERROR);
        }
        self.commands.push(subcmd);
        Ok(0)
    }

    fn prepare_for_update(&mut self) -> FwuResult<()> {
        if self.fail_commands {
            return Err(FwuError::FWU_CSME_DEVICE_ERROR);
        }
        self.prepare_count += 1;
        Ok(())
    }

    fn update_complete(&mut self) -> FwuResult<bool> {
        if self.fail_commands {
            return Err(FwuError::FWU_CSME_COMMAND_TIMEOUT);
        }
        Ok(self.complete_after_reset)
    }
}
