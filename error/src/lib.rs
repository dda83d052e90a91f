/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains API and macros used by the firmware update crates for error handling

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Firmware Update Error Type
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FwuError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: FwuError = FwuError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl FwuError {
    /// Create a firmware update error; intended to only be used from const
    /// contexts, as we don't want runtime panics if val is zero. The preferred
    /// way to get a FwuError from a u32 is to use `FwuError::try_from()` from
    /// the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("FwuError cannot be 0"),
        }
    }

    // Use the macro to define all error constants
    define_error_constants![
        // Persistent status store errors
        (
            FWU_STATUS_STORE_CORRUPT,
            0x00010001,
            "Status record fails self validation"
        ),
        (
            FWU_STATUS_STORE_REGION_TOO_SMALL,
            0x00010002,
            "Reserved flash region too small for status records"
        ),
        (
            FWU_STATUS_STORE_UNSUPPORTED_VERSION,
            0x00010003,
            "Status record schema version not supported"
        ),
        (
            FWU_STATUS_STORE_COMP_INDEX_OUT_OF_BOUNDS,
            0x00010004,
            "Component status index out of bounds"
        ),
        (
            FWU_STATUS_STORE_REGION_MISALIGNED,
            0x00010005,
            "Status region not aligned to the flash erase block"
        ),
        // Component registry errors
        (
            FWU_REGISTRY_COMPONENT_NOT_FOUND,
            0x00020001,
            "Unknown component signature in capsule"
        ),
        (
            FWU_REGISTRY_FLASH_MAP_ENTRY_MISSING,
            0x00020002,
            "Flash map has no destination entry for component"
        ),
        // Integrity verifier errors
        (
            FWU_VERIFY_INVALID_PARAM,
            0x00030001,
            "Invalid verification parameter"
        ),
        (
            FWU_VERIFY_TRUSTED_DIGEST_NOT_FOUND,
            0x00030002,
            "No trusted digest in the hash store for usage"
        ),
        (
            FWU_VERIFY_UNSUPPORTED_HASH_ALG,
            0x00030003,
            "Unsupported hash algorithm"
        ),
        (
            FWU_VERIFY_DIGEST_MISMATCH,
            0x00030004,
            "Computed digest does not match trusted digest"
        ),
        (
            FWU_VERIFY_UNSUPPORTED_SIG_TYPE,
            0x00030005,
            "Unsupported signature type"
        ),
        (
            FWU_VERIFY_SIGNATURE_INVALID,
            0x00030006,
            "Signature verification failed"
        ),
        (
            FWU_VERIFY_PUB_KEY_DIGEST_MISMATCH,
            0x00030007,
            "Public key digest does not match pinned digest"
        ),
        (
            FWU_VERIFY_CAPSULE_MARKER_MISMATCH,
            0x00030008,
            "Capsule marker mismatch"
        ),
        (
            FWU_VERIFY_CAPSULE_SIZE_MISMATCH,
            0x00030009,
            "Capsule size fields inconsistent with buffer"
        ),
        (
            FWU_VERIFY_CAPSULE_TOO_MANY_COMPONENTS,
            0x0003000A,
            "Capsule component count exceeds maximum"
        ),
        (
            FWU_VERIFY_CAPSULE_ENTRY_OUT_OF_BOUNDS,
            0x0003000B,
            "Capsule component entry outside signed region"
        ),
        (
            FWU_VERIFY_DIGEST_FAILURE,
            0x0003000C,
            "Digest computation failed"
        ),
        // Update state machine errors
        (
            FWU_UPDATE_SM_INVALID_STATE,
            0x00040001,
            "Persisted state machine byte is not a valid state"
        ),
        (
            FWU_UPDATE_SM_CAPSULE_MISSING,
            0x00040002,
            "Update in progress but no capsule source available"
        ),
        (
            FWU_UPDATE_SM_CAPSULE_CHANGED,
            0x00040003,
            "Capsule signature changed while update in progress"
        ),
        (
            FWU_UPDATE_SM_RECOVERY_IMAGE_MISSING,
            0x00040004,
            "Recovery requested but no recovery image available"
        ),
        (
            FWU_UPDATE_SM_RECOVERY_STUCK,
            0x00040005,
            "Recovery retries exhausted"
        ),
        // CSME / HECI errors
        (
            FWU_CSME_COMMAND_TIMEOUT,
            0x00050001,
            "HECI command timed out"
        ),
        (
            FWU_CSME_DEVICE_ERROR,
            0x00050002,
            "HECI command failed"
        ),
        (
            FWU_CSME_UPDATE_INCOMPLETE,
            0x00050003,
            "CSME did not complete its update across the reset"
        ),
        // Reset coordinator errors
        (
            FWU_RESET_SERVICE_UNAVAILABLE,
            0x00060001,
            "Platform reset service unavailable"
        ),
        // Flash access errors
        (
            FWU_FLASH_READ_FAILURE,
            0x00070001,
            "Flash read failed"
        ),
        (
            FWU_FLASH_WRITE_FAILURE,
            0x00070002,
            "Flash write failed"
        ),
        (
            FWU_FLASH_ERASE_FAILURE,
            0x00070003,
            "Flash erase failed"
        ),
        (
            FWU_FLASH_OUT_OF_BOUNDS,
            0x00070004,
            "Flash access outside region bounds"
        ),
        (
            FWU_FLASH_VERIFY_FAILURE,
            0x00070005,
            "Flash readback does not match programmed data"
        ),
        // Software crypto errors
        (
            FWU_CRYPTO_RSA_KEY_INVALID,
            0x00080001,
            "RSA public key rejected"
        ),
    ];

    const SUBSYSTEM_VERIFY: u32 = 0x0003;
    const SUBSYSTEM_CSME: u32 = 0x0005;
    const SUBSYSTEM_FLASH: u32 = 0x0007;

    const fn subsystem(self) -> u32 {
        self.0.get() >> 16
    }

    /// Verification failed; the artifact must never be applied.
    pub const fn is_security_violation(self) -> bool {
        let val = self.0.get();
        val == Self::FWU_VERIFY_DIGEST_MISMATCH.0.get()
            || val == Self::FWU_VERIFY_SIGNATURE_INVALID.0.get()
            || val == Self::FWU_VERIFY_PUB_KEY_DIGEST_MISMATCH.0.get()
    }

    /// Malformed capsule or missing trust anchor; not a transient condition.
    pub const fn is_not_found(self) -> bool {
        let val = self.0.get();
        val == Self::FWU_REGISTRY_COMPONENT_NOT_FOUND.0.get()
            || val == Self::FWU_VERIFY_TRUSTED_DIGEST_NOT_FOUND.0.get()
            || val == Self::FWU_VERIFY_CAPSULE_MARKER_MISMATCH.0.get()
            || val == Self::FWU_VERIFY_CAPSULE_SIZE_MISMATCH.0.get()
            || val == Self::FWU_VERIFY_CAPSULE_TOO_MANY_COMPONENTS.0.get()
            || val == Self::FWU_VERIFY_CAPSULE_ENTRY_OUT_OF_BOUNDS.0.get()
    }

    /// HECI/CSME communication failure.
    pub const fn is_device_error(self) -> bool {
        self.subsystem() == Self::SUBSYSTEM_CSME
    }

    /// Flash I/O failure.
    pub const fn is_io_error(self) -> bool {
        self.subsystem() == Self::SUBSYSTEM_FLASH
    }

    /// A verification-subsystem error of any kind.
    pub const fn is_verify_error(self) -> bool {
        self.subsystem() == Self::SUBSYSTEM_VERIFY
    }
}

impl From<FwuError> for u32 {
    fn from(val: FwuError) -> Self {
        val.0.get()
    }
}

impl From<FwuError> for NonZeroU32 {
    fn from(val: FwuError) -> Self {
        val.0
    }
}

impl TryFrom<u32> for FwuError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(FwuError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type FwuResult<T> = Result<T, FwuError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_error_codes_unique() {
        let mut seen: HashMap<u32, &'static str> = HashMap::new();
        for (name, value) in FwuError::all_constants() {
            if let Some(other) = seen.insert(value, name) {
                panic!("duplicate error code {value:#010x}: {name} and {other}");
            }
        }
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(FwuError::try_from(0u32).is_err());
        assert_eq!(
            FwuError::try_from(0x00010001u32).unwrap(),
            FwuError::FWU_STATUS_STORE_CORRUPT
        );
    }

    #[test]
    fn test_classification() {
        assert!(FwuError::FWU_VERIFY_DIGEST_MISMATCH.is_security_violation());
        assert!(!FwuError::FWU_VERIFY_DIGEST_MISMATCH.is_not_found());
        assert!(FwuError::FWU_REGISTRY_COMPONENT_NOT_FOUND.is_not_found());
        assert!(FwuError::FWU_CSME_COMMAND_TIMEOUT.is_device_error());
        assert!(FwuError::FWU_FLASH_WRITE_FAILURE.is_io_error());
        assert!(!FwuError::FWU_FLASH_WRITE_FAILURE.is_device_error());
    }
}
