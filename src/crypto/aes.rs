// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! AES-128 ECB single-block encrypt (`SPEC_FULL.md` §4.3). Built on the
//! `aes` crate's software implementation, the same RustCrypto family
//! `examples/tock-tock/capsules/aes_ctr` and `.../aes_gcm` use for their
//! software fallback (`ctr::Ctr128LE<aes::Aes128>`, `aes_gcm::Aes128Gcm`).
//!
//! Decrypt is not exposed: [`crate::crypto::ccm`] uses ECB-encrypt for both
//! directions of AES-CCM, so this crate never needs `aes::Aes128`'s decrypt
//! path.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// A key-scheduled AES-128 block cipher, ready for single-block ECB encrypt.
pub struct AesEcb {
    cipher: Aes128,
}

impl AesEcb {
    pub fn new(key: &[u8; 16]) -> Self {
        Self {
            cipher: Aes128::new(key.into()),
        }
    }

    /// Encrypts exactly one 16-byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8; 16]) {
        self.cipher.encrypt_block(block.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 test vector.
    #[test]
    fn matches_fips197_test_vector() {
        let key: [u8; 16] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let mut block: [u8; 16] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let expected: [u8; 16] = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];
        let cipher = AesEcb::new(&key);
        cipher.encrypt_block(&mut block);
        assert_eq!(block, expected);
    }

    #[test]
    fn same_key_and_block_are_deterministic() {
        let key = [0x5a; 16];
        let cipher = AesEcb::new(&key);
        let mut b1 = [0x11; 16];
        let mut b2 = [0x11; 16];
        cipher.encrypt_block(&mut b1);
        cipher.encrypt_block(&mut b2);
        assert_eq!(b1, b2);
    }
}
