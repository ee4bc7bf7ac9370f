// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IEEE 802.15.4-2006 frame header construction and parsing
//! (`SPEC_FULL.md` §4.4): FCF + sequence number + addressing + auxiliary
//! security header. FCS generation/validation is left to the radio, as in
//! `capsules_extra::ieee802154::mac::Framer`
//! (`examples/tock-tock/capsules/extra/src/ieee802154/framer.rs`: "FCS
//! generation and authentication ... handled in hardware for performance
//! purposes"), so this module's PSDU does not include trailing FCS bytes.

use crate::error::{Result, ThreadError};
use crate::net::mac_address::MacAddress;

/// MAC header wire layout, not including FCS (`SPEC_FULL.md` §4.4).
pub const MAX_HEADER_LEN: usize = 2 + 1 + 2 + 8 + 2 + 8 + 1 + 4 + 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameType {
    Beacon,
    Data,
    Ack,
    MacCommand,
}

impl FrameType {
    fn as_u8(self) -> u8 {
        match self {
            FrameType::Beacon => 0,
            FrameType::Data => 1,
            FrameType::Ack => 2,
            FrameType::MacCommand => 3,
        }
    }

    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(FrameType::Beacon),
            1 => Ok(FrameType::Data),
            2 => Ok(FrameType::Ack),
            3 => Ok(FrameType::MacCommand),
            _ => Err(ThreadError::Parse),
        }
    }
}

/// IEEE 802.15.4-2006 security levels. Levels 4 and above require
/// encryption in addition to authentication.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecurityLevel {
    None = 0,
    Mic32 = 1,
    Mic64 = 2,
    Mic128 = 3,
    Enc = 4,
    EncMic32 = 5,
    EncMic64 = 6,
    EncMic128 = 7,
}

impl SecurityLevel {
    pub fn encryption_needed(self) -> bool {
        (self as u8) >= 4
    }

    pub fn mic_len(self) -> usize {
        match self {
            SecurityLevel::None | SecurityLevel::Enc => 0,
            SecurityLevel::Mic32 | SecurityLevel::EncMic32 => 4,
            SecurityLevel::Mic64 | SecurityLevel::EncMic64 => 8,
            SecurityLevel::Mic128 | SecurityLevel::EncMic128 => 16,
        }
    }

    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(SecurityLevel::None),
            1 => Ok(SecurityLevel::Mic32),
            2 => Ok(SecurityLevel::Mic64),
            3 => Ok(SecurityLevel::Mic128),
            4 => Ok(SecurityLevel::Enc),
            5 => Ok(SecurityLevel::EncMic32),
            6 => Ok(SecurityLevel::EncMic64),
            7 => Ok(SecurityLevel::EncMic128),
            _ => Err(ThreadError::Parse),
        }
    }
}

/// How the key used to secure this frame is identified (IEEE 802.15.4-2006
/// §7.6.2.3, Key Identifier Mode).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyId {
    Implicit,
    Index(u8),
}

impl KeyId {
    fn mode(self) -> u8 {
        match self {
            KeyId::Implicit => 0,
            KeyId::Index(_) => 1,
        }
    }

    fn encoded_len(self) -> usize {
        match self {
            KeyId::Implicit => 0,
            KeyId::Index(_) => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Security {
    pub level: SecurityLevel,
    pub key_id: KeyId,
    pub frame_counter: u32,
}

/// Generates the 13-byte AES-CCM* nonce `ext_address || frame_counter ||
/// security_level` (`SPEC_FULL.md` §4.4), following
/// `get_ccm_nonce` in `framer.rs`.
pub fn ccm_nonce(ext_address: &[u8; 8], frame_counter: u32, level: SecurityLevel) -> [u8; 13] {
    let mut nonce = [0u8; 13];
    nonce[0..8].copy_from_slice(ext_address);
    nonce[8..12].copy_from_slice(&frame_counter.to_be_bytes());
    nonce[12] = level as u8;
    nonce
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub frame_type: FrameType,
    pub security: Option<Security>,
    pub frame_pending: bool,
    pub ack_requested: bool,
    pub sequence_number: u8,
    pub dst_pan: Option<u16>,
    pub dst_addr: Option<MacAddress>,
    pub src_pan: Option<u16>,
    pub src_addr: Option<MacAddress>,
}

fn addressing_mode(addr: Option<MacAddress>) -> u16 {
    match addr {
        None => 0,
        Some(MacAddress::Short(_)) => 2,
        Some(MacAddress::Extended(_)) => 3,
    }
}

impl Header {
    /// Encodes the header into `out`, returning the number of bytes
    /// written. Does not include FCS.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize> {
        if out.len() < MAX_HEADER_LEN {
            return Err(ThreadError::NoBufs);
        }
        let pan_id_compression = matches!((self.dst_pan, self.src_pan), (Some(a), Some(b)) if a == b)
            && self.dst_addr.is_some()
            && self.src_addr.is_some();

        let mut fcf: u16 = self.frame_type.as_u8() as u16;
        if self.security.is_some() {
            fcf |= 1 << 3;
        }
        if self.frame_pending {
            fcf |= 1 << 4;
        }
        if self.ack_requested {
            fcf |= 1 << 5;
        }
        if pan_id_compression {
            fcf |= 1 << 6;
        }
        fcf |= addressing_mode(self.dst_addr) << 10;
        fcf |= 1u16 << 12; // frame version 2006
        fcf |= addressing_mode(self.src_addr) << 14;

        let mut offset = 0;
        out[offset..offset + 2].copy_from_slice(&fcf.to_le_bytes());
        offset += 2;
        out[offset] = self.sequence_number;
        offset += 1;

        if let Some(pan) = self.dst_pan {
            out[offset..offset + 2].copy_from_slice(&pan.to_le_bytes());
            offset += 2;
        }
        match self.dst_addr {
            Some(MacAddress::Short(a)) => {
                out[offset..offset + 2].copy_from_slice(&a.to_le_bytes());
                offset += 2;
            }
            Some(MacAddress::Extended(a)) => {
                let mut rev = a;
                rev.reverse();
                out[offset..offset + 8].copy_from_slice(&rev);
                offset += 8;
            }
            None => {}
        }
        if !pan_id_compression {
            if let Some(pan) = self.src_pan {
                out[offset..offset + 2].copy_from_slice(&pan.to_le_bytes());
                offset += 2;
            }
        }
        match self.src_addr {
            Some(MacAddress::Short(a)) => {
                out[offset..offset + 2].copy_from_slice(&a.to_le_bytes());
                offset += 2;
            }
            Some(MacAddress::Extended(a)) => {
                let mut rev = a;
                rev.reverse();
                out[offset..offset + 8].copy_from_slice(&rev);
                offset += 8;
            }
            None => {}
        }

        if let Some(security) = self.security {
            out[offset] = (security.level as u8) | (security.key_id.mode() << 3);
            offset += 1;
            out[offset..offset + 4].copy_from_slice(&security.frame_counter.to_le_bytes());
            offset += 4;
            if let KeyId::Index(idx) = security.key_id {
                out[offset] = idx;
                offset += 1;
            }
        }

        Ok(offset)
    }

    /// Parses a header from the front of `buf`, returning the header and
    /// the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 3 {
            return Err(ThreadError::Parse);
        }
        let fcf = u16::from_le_bytes([buf[0], buf[1]]);
        let frame_type = FrameType::from_u8((fcf & 0x7) as u8)?;
        let security_enabled = fcf & (1 << 3) != 0;
        let frame_pending = fcf & (1 << 4) != 0;
        let ack_requested = fcf & (1 << 5) != 0;
        let pan_id_compression = fcf & (1 << 6) != 0;
        let dst_mode = (fcf >> 10) & 0x3;
        let src_mode = (fcf >> 14) & 0x3;
        let sequence_number = buf[2];
        let mut offset = 3;

        let mut dst_pan = None;
        if dst_mode != 0 {
            dst_pan = Some(read_u16(buf, &mut offset)?);
        }
        let dst_addr = read_addr(buf, &mut offset, dst_mode)?;

        let mut src_pan = None;
        if pan_id_compression {
            src_pan = dst_pan;
        } else if src_mode != 0 {
            src_pan = Some(read_u16(buf, &mut offset)?);
        }
        let src_addr = read_addr(buf, &mut offset, src_mode)?;

        let security = if security_enabled {
            if offset >= buf.len() {
                return Err(ThreadError::Parse);
            }
            let control = buf[offset];
            offset += 1;
            let level = SecurityLevel::from_u8(control & 0x7)?;
            let key_mode = (control >> 3) & 0x3;
            let frame_counter = read_u32(buf, &mut offset)?;
            let key_id = match key_mode {
                0 => KeyId::Implicit,
                _ => {
                    if offset >= buf.len() {
                        return Err(ThreadError::Parse);
                    }
                    let idx = buf[offset];
                    offset += 1;
                    KeyId::Index(idx)
                }
            };
            Some(Security {
                level,
                key_id,
                frame_counter,
            })
        } else {
            None
        };

        Ok((
            Header {
                frame_type,
                security,
                frame_pending,
                ack_requested,
                sequence_number,
                dst_pan,
                dst_addr,
                src_pan,
                src_addr,
            },
            offset,
        ))
    }
}

fn read_u16(buf: &[u8], offset: &mut usize) -> Result<u16> {
    if *offset + 2 > buf.len() {
        return Err(ThreadError::Parse);
    }
    let v = u16::from_le_bytes([buf[*offset], buf[*offset + 1]]);
    *offset += 2;
    Ok(v)
}

fn read_u32(buf: &[u8], offset: &mut usize) -> Result<u32> {
    if *offset + 4 > buf.len() {
        return Err(ThreadError::Parse);
    }
    let v = u32::from_le_bytes([
        buf[*offset],
        buf[*offset + 1],
        buf[*offset + 2],
        buf[*offset + 3],
    ]);
    *offset += 4;
    Ok(v)
}

fn read_addr(buf: &[u8], offset: &mut usize, mode: u16) -> Result<Option<MacAddress>> {
    match mode {
        0 => Ok(None),
        2 => Ok(Some(MacAddress::Short(read_u16(buf, offset)?))),
        3 => {
            if *offset + 8 > buf.len() {
                return Err(ThreadError::Parse);
            }
            let mut a = [0u8; 8];
            a.copy_from_slice(&buf[*offset..*offset + 8]);
            a.reverse();
            *offset += 8;
            Ok(Some(MacAddress::Extended(a)))
        }
        _ => Err(ThreadError::Parse),
    }
}
