/*++

Licensed under the Apache-2.0 license.

File Name:

    heci.rs

Abstract:

    File contains the HECI service seam used to talk to the CSME.

--*/

use fwupdate_error::FwuResult;

/// HECI simple command sub-opcodes
pub const SUBCMD_ENTER_DNX_MODE: u32 = 0x01;
pub const SUBCMD_DUMP_CSE_STATUS: u32 = 0x02;

/// Poll budget for a single HECI command. Implementations poll in
/// `CSME_CMD_TIMEOUT_UNIT_US` steps and give up after
/// `CSME_CMD_TIMEOUT_CNT` of them; a command never blocks indefinitely.
pub const CSME_CMD_TIMEOUT_UNIT_US: u32 = 1_000;
pub const CSME_CMD_TIMEOUT_CNT: u32 = 1_000;

/// Communication channel to the CSME.
///
/// The wire format is owned by the platform HECI driver; the update engine
/// only interprets success, failure and timeout. Every method returns a
/// definite outcome within the poll budget above.
pub trait CsmeService {
    /// Issue a simple HECI command and return its response word.
    fn simple_command(&mut self, subcmd: u32) -> FwuResult<u32>;

    /// Send the IFWI prepare-for-update request. After this succeeds the
    /// CSME expects a platform reset to pick up its staged firmware.
    fn prepare_for_update(&mut self) -> FwuResult<()>;

    /// Whether the CSME finished applying its staged update. Queried on the
    /// boot following the requested reset.
    fn update_complete(&mut self) -> FwuResult<bool>;
}
