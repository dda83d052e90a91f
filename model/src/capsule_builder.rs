/*++

Licensed under the Apache-2.0 license.

File Name:

    capsule_builder.rs

Abstract:

    File contains a builder for signed update capsules used by tests.

--*/

use fwupdate_crypto::sha256;
use fwupdate_types::{
    CapsuleComponentEntry, CapsuleHeader, CapsulePubKey, CapsuleSignature, HashAlg,
    HashStoreEntry, HashUsage, CAPSULE_COMPONENT_ENTRY_BYTE_SIZE, CAPSULE_HEADER_BYTE_SIZE,
    CAPSULE_MARKER, SIG_TYPE_RSA2048_SHA256,
};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::Sha256;
use zerocopy::IntoBytes;

struct BuilderComponent {
    signature: u32,
    version: u32,
    hardware_instance: u64,
    data: Vec<u8>,
}

/// Builds capsules in the container layout the engine consumes, signed
/// RSA2048/SHA-256 with the key the test provisioned.
#[derive(Default)]
pub struct CapsuleBuilder {
    components: Vec<BuilderComponent>,
}

impl CapsuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(mut self, signature: u32, version: u32, data: &[u8]) -> Self {
        self.components.push(BuilderComponent {
            signature,
            version,
            hardware_instance: 0,
            data: data.to_vec(),
        });
        self
    }

    pub fn build(self, key: &RsaPrivateKey) -> Vec<u8> {
        let count = self.components.len();
        let header_size = CAPSULE_HEADER_BYTE_SIZE + count * CAPSULE_COMPONENT_ENTRY_BYTE_SIZE;
        let payload_len: usize = self.components.iter().map(|comp| comp.data.len()).sum();
        let signed_len = header_size + payload_len;
        let total = signed_len
            + core::mem::size_of::<CapsuleSignature>()
            + core::mem::size_of::<CapsulePubKey>();

        let header = CapsuleHeader {
            marker: CAPSULE_MARKER,
            size: total as u32,
            header_size: header_size as u32,
            sig_type: SIG_TYPE_RSA2048_SHA256,
            version: 1,
            image_count: count as u32,
        };

        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(header.as_bytes());

        let mut offset = header_size;
        for comp in &self.components {
            let entry = CapsuleComponentEntry {
                signature: comp.signature,
                offset: offset as u32,
                size: comp.data.len() as u32,
                version: comp.version,
                hardware_instance: comp.hardware_instance,
                digest: sha256(&comp.data),
            };
            bytes.extend_from_slice(entry.as_bytes());
            offset += comp.data.len();
        }
        for comp in &self.components {
            bytes.extend_from_slice(&comp.data);
        }

        let digest = sha256(&bytes);
        let sig = key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .expect("rsa signing failed");

        let signature = CapsuleSignature::new(&sig).expect("signature too large");
        let pub_key = capsule_pub_key(key);
        bytes.extend_from_slice(signature.as_bytes());
        bytes.extend_from_slice(pub_key.as_bytes());
        bytes
    }
}

/// A throwaway RSA-2048 signing key
pub fn generate_signing_key() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("rsa keygen failed")
}

/// The capsule trailer form of a signing key's public half
pub fn capsule_pub_key(key: &RsaPrivateKey) -> CapsulePubKey {
    let public = key.to_public_key();
    let modulus = public.n().to_bytes_be();
    let mut exponent: u32 = 0;
    for byte in public.e().to_bytes_be() {
        exponent = (exponent << 8) | byte as u32;
    }
    CapsulePubKey::new(&modulus, exponent).expect("modulus too large")
}

/// Provision entry pinning the signing key, digest over modulus then
/// exponent as the verifier computes it.
pub fn pub_key_digest_entry(key: &RsaPrivateKey) -> HashStoreEntry {
    let pub_key = capsule_pub_key(key);
    let modulus = pub_key.modulus_bytes().expect("bad key size");
    let mut material = modulus.to_vec();
    material.extend_from_slice(&pub_key.exponent.to_le_bytes());
    HashStoreEntry::new(HashUsage::PUB_KEY_FWU, HashAlg::Sha256, &sha256(&material))
}

/// Provision entry trusting a component image for `usage`
pub fn component_digest_entry(usage: HashUsage, data: &[u8]) -> HashStoreEntry {
    HashStoreEntry::new(usage, HashAlg::Sha256, &sha256(data))
}
