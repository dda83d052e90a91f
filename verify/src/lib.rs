/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Capsule integrity verification library.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

mod verifier;

use fwupdate_error::{FwuError, FwuResult};
use fwupdate_types::*;

pub use verifier::IntegrityVerifier;

/// Capsule Verification Environment
///
/// The crypto seams of the verifier. Platforms provide one implementation;
/// the software one lives in `fwupdate-crypto`.
pub trait CapsuleVerificationEnv {
    /// Calculate SHA-256 digest
    fn sha256_digest(&mut self, data: &[u8]) -> FwuResult<[u8; SHA256_DIGEST_BYTE_SIZE]>;

    /// Calculate SHA-384 digest
    fn sha384_digest(&mut self, data: &[u8]) -> FwuResult<[u8; SHA384_DIGEST_BYTE_SIZE]>;

    /// Perform RSA PKCS#1 v1.5 verification of `digest` against `sig`
    fn rsa_pkcs1v15_verify(
        &mut self,
        pub_key: &CapsulePubKey,
        sig_type: u32,
        digest: &[u8],
        sig: &[u8],
    ) -> FwuResult<bool>;

    /// Look up a trusted digest in the provisioned key-hash store
    fn trusted_entry(&self, usage: HashUsage) -> Option<HashStoreEntry>;
}

impl<T: CapsuleVerificationEnv> CapsuleVerificationEnv for &mut T {
    fn sha256_digest(&mut self, data: &[u8]) -> FwuResult<[u8; SHA256_DIGEST_BYTE_SIZE]> {
        (**self).sha256_digest(data)
    }

    fn sha384_digest(&mut self, data: &[u8]) -> FwuResult<[u8; SHA384_DIGEST_BYTE_SIZE]> {
        (**self).sha384_digest(data)
    }

    fn rsa_pkcs1v15_verify(
        &mut self,
        pub_key: &CapsulePubKey,
        sig_type: u32,
        digest: &[u8],
        sig: &[u8],
    ) -> FwuResult<bool> {
        (**self).rsa_pkcs1v15_verify(pub_key, sig_type, digest, sig)
    }

    fn trusted_entry(&self, usage: HashUsage) -> Option<HashStoreEntry> {
        (**self).trusted_entry(usage)
    }
}

/// Verified capsule information
///
/// Produced by `IntegrityVerifier::verify_capsule` after structural and
/// signature checks pass. Component payloads stay borrowed from the capsule
/// buffer; headers and trailers are copied out since the buffer carries no
/// alignment guarantee.
pub struct CapsuleInfo<'a> {
    bytes: &'a [u8],
    header: CapsuleHeader,
    entries: [CapsuleComponentEntry; MAX_CAPSULE_COMPONENT_COUNT],
    entry_count: usize,
    signature: CapsuleSignature,
    pub_key: CapsulePubKey,
    signed_len: usize,
}

impl<'a> CapsuleInfo<'a> {
    pub fn header(&self) -> &CapsuleHeader {
        &self.header
    }

    pub fn entries(&self) -> &[CapsuleComponentEntry] {
        &self.entries[..self.entry_count]
    }

    pub fn signature(&self) -> &CapsuleSignature {
        &self.signature
    }

    pub fn pub_key(&self) -> &CapsulePubKey {
        &self.pub_key
    }

    /// The region covered by the capsule signature
    pub fn signed_region(&self) -> &'a [u8] {
        &self.bytes[..self.signed_len]
    }

    pub fn find_component(&self, sig: u32) -> Option<&CapsuleComponentEntry> {
        self.entries().iter().find(|entry| entry.signature == sig)
    }

    pub fn has_component(&self, sig: u32) -> bool {
        self.find_component(sig).is_some()
    }

    /// Payload bytes of a component entry
    pub fn component_data(&self, entry: &CapsuleComponentEntry) -> FwuResult<&'a [u8]> {
        let err = FwuError::FWU_VERIFY_CAPSULE_ENTRY_OUT_OF_BOUNDS;
        self.bytes
            .get(entry.offset as usize..)
            .ok_or(err)?
            .get(..entry.size as usize)
            .ok_or(err)
    }

    pub(crate) fn new(
        bytes: &'a [u8],
        header: CapsuleHeader,
        entries: [CapsuleComponentEntry; MAX_CAPSULE_COMPONENT_COUNT],
        entry_count: usize,
        signature: CapsuleSignature,
        pub_key: CapsulePubKey,
        signed_len: usize,
    ) -> Self {
        Self {
            bytes,
            header,
            entries,
            entry_count,
            signature,
            pub_key,
            signed_len,
        }
    }
}
