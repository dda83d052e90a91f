/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    In-memory models of the platform services consumed by the firmware
    update engine, to be called from tests.

--*/

mod capsule_builder;
mod csme_model;
mod flash_model;
mod reset_model;

pub use capsule_builder::{
    capsule_pub_key, component_digest_entry, generate_signing_key, pub_key_digest_entry,
    CapsuleBuilder,
};
pub use csme_model::CsmeModel;
pub use flash_model::{FlashModel, FLASH_BLOCK_SIZE};
pub use reset_model::ResetModel;
