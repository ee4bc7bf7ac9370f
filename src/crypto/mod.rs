// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Crypto primitives this core needs for frame security and key derivation
//! (`SPEC_FULL.md` §4.3): AES-128 ECB, AES-CCM, SHA-256, and HMAC. Every
//! primitive here is a thin, `no_std` wrapper over the RustCrypto family
//! already used by the donor's `aes_gcm`/`aes_ctr`/`ecdsa_sw`/`rsa_sw`
//! capsules (`examples/tock-tock/capsules/{aes_gcm,aes_ctr}`); this crate
//! just picks the specific members (`aes`, `ccm`, `sha2`, `hmac`) that match
//! the 802.15.4 and Thread wire formats.

pub mod aes;
pub mod ccm;
pub mod hmac;
pub mod sha256;

pub use aes::AesEcb;
pub use ccm::{CcmContext, TagLength};
pub use hmac::hmac_sha256;
pub use sha256::Sha256;
