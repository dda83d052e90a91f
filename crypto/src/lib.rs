/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Software implementations of the crypto operations consumed by the
    capsule verifier. Boot firmware builds substitute the platform crypto
    library behind the same `CapsuleVerificationEnv` trait.

--*/

use fwupdate_error::{FwuError, FwuResult};
use fwupdate_types::{
    CapsulePubKey, HashStore, HashStoreEntry, HashUsage, SHA256_DIGEST_BYTE_SIZE,
    SHA384_DIGEST_BYTE_SIZE, SIG_TYPE_RSA2048_SHA256, SIG_TYPE_RSA3072_SHA384,
};
use fwupdate_verify::CapsuleVerificationEnv;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384};

/// SHA-256 digest of `data`
pub fn sha256(data: &[u8]) -> [u8; SHA256_DIGEST_BYTE_SIZE] {
    let mut digest = Sha256::new();
    digest.update(data);
    digest.finalize().into()
}

/// SHA-384 digest of `data`
pub fn sha384(data: &[u8]) -> [u8; SHA384_DIGEST_BYTE_SIZE] {
    let mut digest = Sha384::new();
    digest.update(data);
    digest.finalize().into()
}

/// RSA PKCS#1 v1.5 verification of a precomputed `digest` against `sig`.
///
/// Returns `Ok(false)` on a well-formed but invalid signature; key material
/// that cannot form a public key at all is an error.
pub fn rsa_pkcs1v15_verify(
    pub_key: &CapsulePubKey,
    sig_type: u32,
    digest: &[u8],
    sig: &[u8],
) -> FwuResult<bool> {
    let modulus = pub_key.modulus_bytes()?;
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(modulus),
        BigUint::from(pub_key.exponent),
    )
    .map_err(|_| FwuError::FWU_CRYPTO_RSA_KEY_INVALID)?;

    let scheme = match sig_type {
        SIG_TYPE_RSA2048_SHA256 => Pkcs1v15Sign::new::<Sha256>(),
        SIG_TYPE_RSA3072_SHA384 => Pkcs1v15Sign::new::<Sha384>(),
        _ => return Err(FwuError::FWU_VERIFY_UNSUPPORTED_SIG_TYPE),
    };

    Ok(key.verify(scheme, digest, sig).is_ok())
}

/// Capsule verification environment backed by the software crypto above and
/// a borrowed hash store table.
pub struct SwCapsuleVerificationEnv<'a> {
    hash_store: HashStore<'a>,
}

impl<'a> SwCapsuleVerificationEnv<'a> {
    pub fn new(entries: &'a [HashStoreEntry]) -> Self {
        Self {
            hash_store: HashStore::new(entries),
        }
    }
}

impl CapsuleVerificationEnv for SwCapsuleVerificationEnv<'_> {
    fn sha256_digest(&mut self, data: &[u8]) -> FwuResult<[u8; SHA256_DIGEST_BYTE_SIZE]> {
        Ok(sha256(data))
    }

    fn sha384_digest(&mut self, data: &[u8]) -> FwuResult<[u8; SHA384_DIGEST_BYTE_SIZE]> {
        Ok(sha384(data))
    }

    fn rsa_pkcs1v15_verify(
        &mut self,
        pub_key: &CapsulePubKey,
        sig_type: u32,
        digest: &[u8],
        sig: &[u8],
    ) -> FwuResult<bool> {
        rsa_pkcs1v15_verify(pub_key, sig_type, digest, sig)
    }

    fn trusted_entry(&self, usage: HashUsage) -> Option<HashStoreEntry> {
        self.hash_store.find(usage).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPrivateKey;

    #[test]
    fn test_sha256_vector() {
        // FIPS 180-2 "abc" vector
        let digest = sha256(b"abc");
        assert_eq!(
            digest[..8],
            [0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea]
        );
    }

    #[test]
    fn test_sha384_vector() {
        let digest = sha384(b"abc");
        assert_eq!(
            digest[..8],
            [0xcb, 0x00, 0x75, 0x3f, 0x45, 0xa3, 0x5e, 0x8b]
        );
    }

    #[test]
    fn test_rsa_sign_verify_round_trip() {
        let mut rng = rand::thread_rng();
        let priv_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let modulus = priv_key.to_public_key().n().to_bytes_be();
        let pub_key = CapsulePubKey::new(&modulus, 65537).unwrap();

        let digest = sha256(b"capsule body");
        let sig = priv_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .unwrap();

        assert!(rsa_pkcs1v15_verify(&pub_key, SIG_TYPE_RSA2048_SHA256, &digest, &sig).unwrap());

        let other_digest = sha256(b"tampered body");
        assert!(
            !rsa_pkcs1v15_verify(&pub_key, SIG_TYPE_RSA2048_SHA256, &other_digest, &sig).unwrap()
        );
    }

    #[test]
    fn test_rsa_unknown_sig_type() {
        let pub_key = CapsulePubKey::new(&[1; 256], 65537).unwrap();
        assert_eq!(
            rsa_pkcs1v15_verify(&pub_key, 99, &[0; 32], &[0; 256]),
            Err(FwuError::FWU_VERIFY_UNSUPPORTED_SIG_TYPE)
        );
    }
}
