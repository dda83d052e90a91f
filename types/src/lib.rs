/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the bit-exact data structures persisted by the firmware
    update engine and the capsule container layout.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

use core::mem::size_of;

use bitflags::bitflags;
use fwupdate_error::{FwuError, FwuResult};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
use zeroize::Zeroize;

/// 'FWUS' - marker of the persisted update status record
pub const FW_UPDATE_STATUS_SIGNATURE: u32 = u32::from_le_bytes(*b"FWUS");
pub const FW_UPDATE_STATUS_VERSION: u16 = 1;

/// 'FWCP' - marker of the update capsule container
pub const CAPSULE_MARKER: u32 = u32::from_le_bytes(*b"FWCP");

/// 'FWUP' - flash map tag of the reserved status region
pub const FLASH_MAP_SIG_FWUPDATE: u32 = u32::from_le_bytes(*b"FWUP");
/// 'BIOS' - flash map tag of the BIOS region
pub const FLASH_MAP_SIG_BIOS: u32 = u32::from_le_bytes(*b"BIOS");
/// 'CSME' - flash map tag of the CSME region
pub const FLASH_MAP_SIG_CSME: u32 = u32::from_le_bytes(*b"CSME");
/// 'CSMD' - flash map tag of the CSME operational driver region
pub const FLASH_MAP_SIG_CSMD: u32 = u32::from_le_bytes(*b"CSMD");

/// Capsule component signatures
pub const COMP_SIG_BIOS: u32 = u32::from_le_bytes(*b"BIOS");
pub const COMP_SIG_CSME: u32 = u32::from_le_bytes(*b"CSME");
pub const COMP_SIG_CSMD: u32 = u32::from_le_bytes(*b"CSMD");
pub const COMP_SIG_CMDI: u32 = u32::from_le_bytes(*b"CMDI");

pub const SHA256_DIGEST_BYTE_SIZE: usize = 32;
pub const SHA384_DIGEST_BYTE_SIZE: usize = 48;

pub const RSA2048_SIG_BYTE_SIZE: usize = 256;
pub const RSA3072_SIG_BYTE_SIZE: usize = 384;
pub const RSA_MAX_SIG_BYTE_SIZE: usize = RSA3072_SIG_BYTE_SIZE;
pub const RSA_MAX_MOD_BYTE_SIZE: usize = RSA3072_SIG_BYTE_SIZE;

/// Capsule signature flavors
pub const SIG_TYPE_RSA2048_SHA256: u32 = 0;
pub const SIG_TYPE_RSA3072_SHA384: u32 = 1;

/// Size of the capsule signature copy retained in the status record. The
/// capsule itself is always signed RSA2048/SHA-256 so the copy is verbatim.
pub const CAPSULE_SIG_COPY_BYTE_SIZE: usize = RSA2048_SIG_BYTE_SIZE;

/// Maximum number of component entries a capsule may carry
pub const MAX_CAPSULE_COMPONENT_COUNT: usize = 8;

pub type Guid = [u8; 16];

/// ESRT firmware class GUIDs of the updatable units
pub const BIOS_REGION_FW_GUID: Guid = [
    0x3d, 0x94, 0x2a, 0x61, 0x7e, 0xc4, 0x4e, 0xb0, 0x82, 0x3c, 0x10, 0x5f, 0x3e, 0x09, 0xa1, 0x4d,
];
pub const CSME_REGION_FW_GUID: Guid = [
    0x8e, 0x21, 0xb3, 0x5d, 0x0c, 0x5e, 0x40, 0x92, 0x9f, 0x71, 0x64, 0x8a, 0x2c, 0xd3, 0x58, 0x02,
];
pub const CSME_DRIVER_FW_GUID: Guid = [
    0xc1, 0x06, 0x5f, 0x27, 0x9a, 0x18, 0x4c, 0xf6, 0xb0, 0x3e, 0x57, 0xdd, 0x12, 0x4a, 0x96, 0xee,
];
pub const CMD_REQUEST_FW_GUID: Guid = [
    0x5a, 0x70, 0x11, 0xf8, 0x63, 0x2b, 0x45, 0x1a, 0x8d, 0x0f, 0x3c, 0x81, 0x79, 0x25, 0xcb, 0x33,
];

/// Update state machine states.
///
/// The raw encodings use descending bit patterns so that more remaining set
/// bits means more progress remains, and erased flash (0xFF) reads as the
/// initial state. The encodings are part of the on-flash format; do not
/// renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Init,
    CapProcessing,
    PartA,
    PartB,
    PartAB,
    Recovery,
    Done,
}

impl UpdateState {
    pub const fn into_raw(self) -> u8 {
        match self {
            UpdateState::Init => 0xFF,
            UpdateState::CapProcessing => 0x7F,
            UpdateState::PartA => 0x7E,
            UpdateState::PartB => 0x7D,
            UpdateState::PartAB => 0x7C,
            UpdateState::Recovery => 0x7B,
            UpdateState::Done => 0x77,
        }
    }

    pub const fn from_raw(raw: u8) -> FwuResult<Self> {
        match raw {
            0xFF => Ok(UpdateState::Init),
            0x7F => Ok(UpdateState::CapProcessing),
            0x7E => Ok(UpdateState::PartA),
            0x7D => Ok(UpdateState::PartB),
            0x7C => Ok(UpdateState::PartAB),
            0x7B => Ok(UpdateState::Recovery),
            0x77 => Ok(UpdateState::Done),
            _ => Err(FwuError::FWU_UPDATE_SM_INVALID_STATE),
        }
    }
}

/// CSME reset bookkeeping, tri-state plus the erased initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsmeResetState {
    Init,
    Pending,
    Done,
    Invalid,
}

impl CsmeResetState {
    pub const fn into_raw(self) -> u8 {
        match self {
            CsmeResetState::Init => 0xFF,
            CsmeResetState::Pending => 0xFE,
            CsmeResetState::Done => 0xFC,
            CsmeResetState::Invalid => 0xF8,
        }
    }

    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0xFF => CsmeResetState::Init,
            0xFE => CsmeResetState::Pending,
            0xFC => CsmeResetState::Done,
            // Anything else was torn or written by a newer schema; treat it
            // as invalid so the state machine never advances past it.
            _ => CsmeResetState::Invalid,
        }
    }
}

/// Per-component progress, same descending-bitmask convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompUpdateState {
    None,
    Pending,
    Processing,
    Done,
}

impl CompUpdateState {
    pub const fn into_raw(self) -> u8 {
        match self {
            CompUpdateState::None => 0xFF,
            CompUpdateState::Pending => 0xFE,
            CompUpdateState::Processing => 0xFC,
            CompUpdateState::Done => 0xF8,
        }
    }

    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0xFE => CompUpdateState::Pending,
            0xFC => CompUpdateState::Processing,
            0xF8 => CompUpdateState::Done,
            _ => CompUpdateState::None,
        }
    }
}

/// ESRT-compatible last attempt status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LastAttemptStatus {
    Success = 0,
    Unsuccessful = 1,
    InsufficientResources = 2,
    IncorrectVersion = 3,
    InvalidFormat = 4,
    AuthError = 5,
    PowerEventAc = 6,
    PowerEventBattery = 7,
    UnsatisfiedDependencies = 8,
}

impl From<LastAttemptStatus> for u32 {
    fn from(status: LastAttemptStatus) -> u32 {
        status as u32
    }
}

/// The persisted update status record. Field order is load-bearing: the
/// signature word is written last so a torn save is never seen as a valid
/// record.
#[repr(C)]
#[derive(Clone, FromBytes, IntoBytes, Immutable, KnownLayout, Zeroize)]
pub struct FwUpdateStatus {
    pub signature: u32,
    pub version: u16,
    pub length: u16,
    /// Copy of the capsule signature, retained so a resumed boot can match
    /// the capsule source against the in-progress update without trusting it.
    pub capsule_sig: [u8; CAPSULE_SIG_COPY_BYTE_SIZE],
    pub state_machine: u8,
    pub retry_count: u8,
    pub csme_need_reset: u8,
    reserved: [u8; 5],
}

pub const FW_UPDATE_STATUS_BYTE_SIZE: usize = size_of::<FwUpdateStatus>();

impl Default for FwUpdateStatus {
    fn default() -> Self {
        Self {
            signature: FW_UPDATE_STATUS_SIGNATURE,
            version: FW_UPDATE_STATUS_VERSION,
            length: FW_UPDATE_STATUS_BYTE_SIZE as u16,
            capsule_sig: [0; CAPSULE_SIG_COPY_BYTE_SIZE],
            state_machine: UpdateState::Init.into_raw(),
            retry_count: 0,
            csme_need_reset: CsmeResetState::Init.into_raw(),
            reserved: [0xFF; 5],
        }
    }
}

impl FwUpdateStatus {
    /// Whether the record carries the 'FWUS' marker at all. A region that
    /// does not (erased flash included) was never initialized.
    pub fn has_signature(&self) -> bool {
        self.signature == FW_UPDATE_STATUS_SIGNATURE
    }

    /// Validate version and length of a record that carries the marker.
    pub fn validate(&self) -> FwuResult<()> {
        if !self.has_signature() {
            return Err(FwuError::FWU_STATUS_STORE_CORRUPT);
        }
        if self.version != FW_UPDATE_STATUS_VERSION {
            return Err(FwuError::FWU_STATUS_STORE_UNSUPPORTED_VERSION);
        }
        if self.length as usize != FW_UPDATE_STATUS_BYTE_SIZE {
            return Err(FwuError::FWU_STATUS_STORE_CORRUPT);
        }
        Ok(())
    }

    pub fn state(&self) -> FwuResult<UpdateState> {
        UpdateState::from_raw(self.state_machine)
    }

    pub fn set_state(&mut self, state: UpdateState) {
        self.state_machine = state.into_raw();
    }

    pub fn csme_reset(&self) -> CsmeResetState {
        CsmeResetState::from_raw(self.csme_need_reset)
    }

    pub fn set_csme_reset(&mut self, state: CsmeResetState) {
        self.csme_need_reset = state.into_raw();
    }
}

/// Per-component persisted status; ESRT reads these fields verbatim.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Zeroize)]
pub struct FwUpdateCompStatus {
    pub firmware_id: Guid,
    pub hardware_instance: u64,
    pub last_attempt_version: u32,
    pub last_attempt_status: u32,
    pub update_pending: u8,
    reserved: [u8; 7],
}

pub const FW_UPDATE_COMP_STATUS_BYTE_SIZE: usize = size_of::<FwUpdateCompStatus>();

impl Default for FwUpdateCompStatus {
    fn default() -> Self {
        Self {
            firmware_id: [0; 16],
            hardware_instance: 0,
            last_attempt_version: 0,
            last_attempt_status: LastAttemptStatus::Success.into(),
            update_pending: CompUpdateState::None.into_raw(),
            reserved: [0xFF; 7],
        }
    }
}

impl FwUpdateCompStatus {
    pub fn pending(&self) -> CompUpdateState {
        CompUpdateState::from_raw(self.update_pending)
    }

    pub fn set_pending(&mut self, state: CompUpdateState) {
        self.update_pending = state.into_raw();
    }
}

/// Hash algorithm identifiers used by the key-hash store and capsule entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum HashAlg {
    Sha256 = 1,
    Sha384 = 2,
}

impl HashAlg {
    pub const fn digest_size(self) -> usize {
        match self {
            HashAlg::Sha256 => SHA256_DIGEST_BYTE_SIZE,
            HashAlg::Sha384 => SHA384_DIGEST_BYTE_SIZE,
        }
    }

    pub const fn from_raw(raw: u16) -> FwuResult<Self> {
        match raw {
            1 => Ok(HashAlg::Sha256),
            2 => Ok(HashAlg::Sha384),
            _ => Err(FwuError::FWU_VERIFY_UNSUPPORTED_HASH_ALG),
        }
    }
}

bitflags! {
    /// Component-usage mask of a key-hash store entry. Entries are looked up
    /// by mask intersection, so one trusted hash may cover several usages.
    pub struct HashUsage: u32 {
        const STAGE_1B = 1 << 0;
        const STAGE_2 = 1 << 1;
        const PAYLOAD = 1 << 2;
        const FIRMWARE_UPDATE = 1 << 3;
        const PUB_KEY_CFG_DATA = 1 << 4;
        const PUB_KEY_FWU = 1 << 5;
        const PUB_KEY_OS = 1 << 6;
        const PAYLOAD_DYNAMIC = 1 << 7;
    }
}

/// One entry of the provisioned key-hash store
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct HashStoreEntry {
    pub usage: u32,
    pub hash_alg: u16,
    pub digest_len: u16,
    pub digest: [u8; SHA384_DIGEST_BYTE_SIZE],
}

impl HashStoreEntry {
    pub fn new(usage: HashUsage, alg: HashAlg, digest: &[u8]) -> Self {
        let mut entry = Self {
            usage: usage.bits(),
            hash_alg: alg as u16,
            digest_len: digest.len().min(SHA384_DIGEST_BYTE_SIZE) as u16,
            digest: [0; SHA384_DIGEST_BYTE_SIZE],
        };
        let len = entry.digest_len as usize;
        entry.digest[..len].copy_from_slice(&digest[..len]);
        entry
    }

    pub fn usage(&self) -> HashUsage {
        HashUsage::from_bits_truncate(self.usage)
    }

    pub fn digest_bytes(&self) -> &[u8] {
        &self.digest[..(self.digest_len as usize).min(SHA384_DIGEST_BYTE_SIZE)]
    }
}

/// Read-only view over the provisioned hash store table
#[derive(Clone, Copy)]
pub struct HashStore<'a> {
    entries: &'a [HashStoreEntry],
}

impl<'a> HashStore<'a> {
    pub fn new(entries: &'a [HashStoreEntry]) -> Self {
        Self { entries }
    }

    /// Look up the first entry whose usage mask intersects `usage`.
    pub fn find(&self, usage: HashUsage) -> Option<&'a HashStoreEntry> {
        self.entries
            .iter()
            .find(|entry| entry.usage().intersects(usage))
    }
}

/// One entry of the platform flash map. The map itself is built and owned
/// elsewhere; this subsystem only resolves regions by tag.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, PartialEq, Eq)]
pub struct FlashMapEntry {
    pub signature: u32,
    pub offset: u32,
    pub size: u32,
    pub flags: u32,
}

/// Capsule container header. Followed by `image_count` component entries,
/// the component payloads, then the signature + public key trailer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct CapsuleHeader {
    pub marker: u32,
    /// Total capsule size including the trailer
    pub size: u32,
    /// Size of this header plus the component entry table
    pub header_size: u32,
    pub sig_type: u32,
    pub version: u32,
    pub image_count: u32,
}

pub const CAPSULE_HEADER_BYTE_SIZE: usize = size_of::<CapsuleHeader>();

/// One component entry in the capsule table of contents
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct CapsuleComponentEntry {
    pub signature: u32,
    /// Payload offset from the start of the capsule
    pub offset: u32,
    pub size: u32,
    pub version: u32,
    pub hardware_instance: u64,
    /// SHA-256 of the component payload
    pub digest: [u8; SHA256_DIGEST_BYTE_SIZE],
}

pub const CAPSULE_COMPONENT_ENTRY_BYTE_SIZE: usize = size_of::<CapsuleComponentEntry>();

impl Default for CapsuleComponentEntry {
    fn default() -> Self {
        Self {
            signature: 0,
            offset: 0,
            size: 0,
            version: 0,
            hardware_instance: 0,
            digest: [0; SHA256_DIGEST_BYTE_SIZE],
        }
    }
}

/// Capsule signature trailer
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct CapsuleSignature {
    pub sig_size: u32,
    reserved: u32,
    pub sig: [u8; RSA_MAX_SIG_BYTE_SIZE],
}

pub const CAPSULE_SIGNATURE_BYTE_SIZE: usize = size_of::<CapsuleSignature>();

impl Default for CapsuleSignature {
    fn default() -> Self {
        Self {
            sig_size: 0,
            reserved: 0,
            sig: [0; RSA_MAX_SIG_BYTE_SIZE],
        }
    }
}

impl CapsuleSignature {
    pub fn new(sig: &[u8]) -> FwuResult<Self> {
        if sig.len() > RSA_MAX_SIG_BYTE_SIZE {
            return Err(FwuError::FWU_VERIFY_INVALID_PARAM);
        }
        let mut this = Self {
            sig_size: sig.len() as u32,
            ..Self::default()
        };
        this.sig[..sig.len()].copy_from_slice(sig);
        Ok(this)
    }

    pub fn sig_bytes(&self) -> FwuResult<&[u8]> {
        self.sig
            .get(..self.sig_size as usize)
            .ok_or(FwuError::FWU_VERIFY_INVALID_PARAM)
    }
}

/// Capsule public key trailer; modulus is big-endian
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct CapsulePubKey {
    pub key_size: u32,
    pub exponent: u32,
    pub modulus: [u8; RSA_MAX_MOD_BYTE_SIZE],
}

pub const CAPSULE_PUB_KEY_BYTE_SIZE: usize = size_of::<CapsulePubKey>();

impl Default for CapsulePubKey {
    fn default() -> Self {
        Self {
            key_size: 0,
            exponent: 0,
            modulus: [0; RSA_MAX_MOD_BYTE_SIZE],
        }
    }
}

impl CapsulePubKey {
    pub fn new(modulus: &[u8], exponent: u32) -> FwuResult<Self> {
        if modulus.len() > RSA_MAX_MOD_BYTE_SIZE {
            return Err(FwuError::FWU_VERIFY_INVALID_PARAM);
        }
        let mut this = Self {
            key_size: modulus.len() as u32,
            exponent,
            modulus: [0; RSA_MAX_MOD_BYTE_SIZE],
        };
        this.modulus[..modulus.len()].copy_from_slice(modulus);
        Ok(this)
    }

    pub fn modulus_bytes(&self) -> FwuResult<&[u8]> {
        self.modulus
            .get(..self.key_size as usize)
            .ok_or(FwuError::FWU_VERIFY_INVALID_PARAM)
    }
}

/// Size of the trailer appended after the signed region
pub const CAPSULE_TRAILER_BYTE_SIZE: usize =
    CAPSULE_SIGNATURE_BYTE_SIZE + CAPSULE_PUB_KEY_BYTE_SIZE;

/// ESRT firmware types
pub const ESRT_FW_TYPE_SYSTEM_FIRMWARE: u32 = 1;
pub const ESRT_FW_TYPE_DEVICE_FIRMWARE: u32 = 2;

/// One ESRT entry in UEFI layout, built from the persisted component records
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct EsrtFirmwareEntry {
    pub fw_class: Guid,
    pub fw_type: u32,
    pub fw_version: u32,
    pub lowest_supported_fw_version: u32,
    pub capsule_flags: u32,
    pub last_attempt_version: u32,
    pub last_attempt_status: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        // On-flash layouts are bit-exact; a size change is a schema change.
        assert_eq!(FW_UPDATE_STATUS_BYTE_SIZE, 272);
        assert_eq!(FW_UPDATE_COMP_STATUS_BYTE_SIZE, 40);
        assert_eq!(CAPSULE_HEADER_BYTE_SIZE, 24);
        assert_eq!(CAPSULE_COMPONENT_ENTRY_BYTE_SIZE, 56);
        assert_eq!(CAPSULE_SIGNATURE_BYTE_SIZE, 392);
        assert_eq!(CAPSULE_PUB_KEY_BYTE_SIZE, 392);
        assert_eq!(size_of::<HashStoreEntry>(), 56);
        assert_eq!(size_of::<FlashMapEntry>(), 16);
        assert_eq!(size_of::<EsrtFirmwareEntry>(), 40);
    }

    #[test]
    fn test_erased_flash_reads_as_init() {
        let erased = [0xFFu8; FW_UPDATE_STATUS_BYTE_SIZE];
        let status = FwUpdateStatus::read_from_bytes(&erased).unwrap();
        assert!(!status.has_signature());
        assert_eq!(status.state().unwrap(), UpdateState::Init);
        assert_eq!(status.csme_reset(), CsmeResetState::Init);
    }

    #[test]
    fn test_state_sentinels_round_trip() {
        for state in [
            UpdateState::Init,
            UpdateState::CapProcessing,
            UpdateState::PartA,
            UpdateState::PartB,
            UpdateState::PartAB,
            UpdateState::Recovery,
            UpdateState::Done,
        ] {
            assert_eq!(UpdateState::from_raw(state.into_raw()).unwrap(), state);
        }
        assert_eq!(
            UpdateState::from_raw(0x00),
            Err(FwuError::FWU_UPDATE_SM_INVALID_STATE)
        );
    }

    #[test]
    fn test_state_sentinel_values() {
        assert_eq!(UpdateState::Init.into_raw(), 0xFF);
        assert_eq!(UpdateState::CapProcessing.into_raw(), 0x7F);
        assert_eq!(UpdateState::PartA.into_raw(), 0x7E);
        assert_eq!(UpdateState::PartB.into_raw(), 0x7D);
        assert_eq!(UpdateState::PartAB.into_raw(), 0x7C);
        assert_eq!(UpdateState::Recovery.into_raw(), 0x7B);
        assert_eq!(UpdateState::Done.into_raw(), 0x77);
        assert_eq!(CsmeResetState::Pending.into_raw(), 0xFE);
        assert_eq!(CsmeResetState::Done.into_raw(), 0xFC);
        assert_eq!(CsmeResetState::Invalid.into_raw(), 0xF8);
        assert_eq!(CompUpdateState::Pending.into_raw(), 0xFE);
        assert_eq!(CompUpdateState::Processing.into_raw(), 0xFC);
        assert_eq!(CompUpdateState::Done.into_raw(), 0xF8);
    }

    #[test]
    fn test_status_validate() {
        let mut status = FwUpdateStatus::default();
        status.validate().unwrap();

        status.length = 10;
        assert_eq!(
            status.validate(),
            Err(FwuError::FWU_STATUS_STORE_CORRUPT)
        );

        let mut status = FwUpdateStatus::default();
        status.version = 2;
        assert_eq!(
            status.validate(),
            Err(FwuError::FWU_STATUS_STORE_UNSUPPORTED_VERSION)
        );

        let mut status = FwUpdateStatus::default();
        status.signature = 0;
        assert_eq!(status.validate(), Err(FwuError::FWU_STATUS_STORE_CORRUPT));
    }

    #[test]
    fn test_hash_store_lookup_by_mask() {
        let entries = [
            HashStoreEntry::new(HashUsage::PUB_KEY_FWU, HashAlg::Sha256, &[0xAA; 32]),
            HashStoreEntry::new(
                HashUsage::FIRMWARE_UPDATE | HashUsage::STAGE_2,
                HashAlg::Sha256,
                &[0xBB; 32],
            ),
        ];
        let store = HashStore::new(&entries);

        // Shared entries match any intersecting usage, not just exact type
        let entry = store.find(HashUsage::STAGE_2).unwrap();
        assert_eq!(entry.digest_bytes(), &[0xBB; 32]);
        let entry = store.find(HashUsage::FIRMWARE_UPDATE).unwrap();
        assert_eq!(entry.digest_bytes(), &[0xBB; 32]);
        assert!(store.find(HashUsage::PUB_KEY_OS).is_none());
    }

    #[test]
    fn test_capsule_trailer_accessors() {
        let sig = CapsuleSignature::new(&[0x5A; RSA2048_SIG_BYTE_SIZE]).unwrap();
        assert_eq!(sig.sig_bytes().unwrap().len(), RSA2048_SIG_BYTE_SIZE);

        let key = CapsulePubKey::new(&[0x11; RSA2048_SIG_BYTE_SIZE], 65537).unwrap();
        assert_eq!(key.modulus_bytes().unwrap().len(), RSA2048_SIG_BYTE_SIZE);
        assert!(CapsulePubKey::new(&[0; RSA_MAX_MOD_BYTE_SIZE + 1], 3).is_err());
    }
}
