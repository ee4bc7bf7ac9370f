// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CoAP 1.0 (RFC 7252) header and option codec (`SPEC_FULL.md` §4.7).
//! Field names and constants follow `coap_header.hpp`
//! (`examples/original_source/include/coap/`): version mask `0xc0`, type
//! nibble `0x00/0x10/0x20/0x30`, code values `0x01..0x04` and `0x44/0x45`,
//! token length mask `0x0f`, max token length 8.

use crate::error::{Result, ThreadError};

pub const MAX_TOKEN_LEN: usize = 8;
pub const MAX_OPTIONS: usize = 12;
pub const MAX_OPTION_VALUE_LEN: usize = 16;
/// `coap_header.hpp`'s `kMaxHeaderLength`.
pub const MAX_HEADER_LEN: usize = 128;
pub const MAX_URI_PATH_LEN: usize = 32;

pub const OPTION_URI_PATH: u16 = 11;
pub const OPTION_CONTENT_FORMAT: u16 = 12;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoapType {
    Confirmable,
    NonConfirmable,
    Acknowledgement,
    Reset,
}

impl CoapType {
    fn nibble(self) -> u8 {
        match self {
            CoapType::Confirmable => 0,
            CoapType::NonConfirmable => 1,
            CoapType::Acknowledgement => 2,
            CoapType::Reset => 3,
        }
    }

    fn from_nibble(n: u8) -> Self {
        match n {
            0 => CoapType::Confirmable,
            1 => CoapType::NonConfirmable,
            2 => CoapType::Acknowledgement,
            _ => CoapType::Reset,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoapCode {
    Get,
    Post,
    Put,
    Delete,
    Changed,
    Content,
    Other(u8),
}

impl CoapCode {
    fn as_u8(self) -> u8 {
        match self {
            CoapCode::Get => 0x01,
            CoapCode::Post => 0x02,
            CoapCode::Put => 0x03,
            CoapCode::Delete => 0x04,
            CoapCode::Changed => 0x44,
            CoapCode::Content => 0x45,
            CoapCode::Other(v) => v,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0x01 => CoapCode::Get,
            0x02 => CoapCode::Post,
            0x03 => CoapCode::Put,
            0x04 => CoapCode::Delete,
            0x44 => CoapCode::Changed,
            0x45 => CoapCode::Content,
            other => CoapCode::Other(other),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoapOption {
    pub number: u16,
    len: u8,
    value: [u8; MAX_OPTION_VALUE_LEN],
}

impl CoapOption {
    pub fn new(number: u16, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_OPTION_VALUE_LEN {
            return Err(ThreadError::NoBufs);
        }
        let mut value = [0u8; MAX_OPTION_VALUE_LEN];
        value[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            number,
            len: bytes.len() as u8,
            value,
        })
    }

    pub fn value(&self) -> &[u8] {
        &self.value[..self.len as usize]
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub version: u8,
    pub msg_type: CoapType,
    pub code: CoapCode,
    pub message_id: u16,
    token_len: u8,
    token: [u8; MAX_TOKEN_LEN],
}

impl Header {
    pub fn new(msg_type: CoapType, code: CoapCode, message_id: u16) -> Self {
        Self {
            version: 1,
            msg_type,
            code,
            message_id,
            token_len: 0,
            token: [0u8; MAX_TOKEN_LEN],
        }
    }

    pub fn set_token(&mut self, token: &[u8]) -> Result<()> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(ThreadError::InvalidArgs);
        }
        self.token[..token.len()].copy_from_slice(token);
        self.token_len = token.len() as u8;
        Ok(())
    }

    pub fn token(&self) -> &[u8] {
        &self.token[..self.token_len as usize]
    }

    /// Encodes the 4-byte fixed header plus token into `out`, returning the
    /// number of bytes written.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize> {
        if out.len() < 4 + self.token_len as usize {
            return Err(ThreadError::NoBufs);
        }
        out[0] = (self.version << 6) | (self.msg_type.nibble() << 4) | self.token_len;
        out[1] = self.code.as_u8();
        out[2..4].copy_from_slice(&self.message_id.to_be_bytes());
        out[4..4 + self.token_len as usize].copy_from_slice(self.token());
        Ok(4 + self.token_len as usize)
    }

    /// Parses the fixed header and token, returning the header and the
    /// number of bytes consumed (where the option stream begins).
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 4 {
            return Err(ThreadError::Parse);
        }
        let version = buf[0] >> 6;
        if version != 1 {
            return Err(ThreadError::Parse);
        }
        let msg_type = CoapType::from_nibble((buf[0] >> 4) & 0x3);
        let token_len = buf[0] & 0x0f;
        if token_len as usize > MAX_TOKEN_LEN || buf.len() < 4 + token_len as usize {
            return Err(ThreadError::Parse);
        }
        let code = CoapCode::from_u8(buf[1]);
        let message_id = u16::from_be_bytes([buf[2], buf[3]]);
        let mut token = [0u8; MAX_TOKEN_LEN];
        token[..token_len as usize].copy_from_slice(&buf[4..4 + token_len as usize]);
        Ok((
            Self {
                version,
                msg_type,
                code,
                message_id,
                token_len,
                token,
            },
            4 + token_len as usize,
        ))
    }
}

fn encode_delta_or_length(value: u16, out: &mut heapless::Vec<u8, MAX_HEADER_LEN>) -> Result<u8> {
    if value < 13 {
        Ok(value as u8)
    } else if value < 269 {
        out.push((value - 13) as u8).map_err(|_| ThreadError::NoBufs)?;
        Ok(13)
    } else {
        let ext = value - 269;
        out.extend_from_slice(&ext.to_be_bytes())
            .map_err(|_| ThreadError::NoBufs)?;
        Ok(14)
    }
}

/// Encodes `options` (must already be sorted ascending by `number`, as CoAP
/// requires) as a delta-coded option stream, appended to `out`.
/// `SPEC_FULL.md` §4.7: "Options are delta-coded, length-coded (13/14
/// extensions), and must appear in numeric order."
pub fn encode_options(options: &[CoapOption], out: &mut heapless::Vec<u8, MAX_HEADER_LEN>) -> Result<()> {
    let mut prev_number = 0u16;
    for opt in options {
        if opt.number < prev_number {
            return Err(ThreadError::InvalidArgs);
        }
        let delta = opt.number - prev_number;
        prev_number = opt.number;

        let mut ext = heapless::Vec::<u8, MAX_HEADER_LEN>::new();
        let delta_nibble = encode_delta_or_length(delta, &mut ext)?;
        let length_nibble = encode_delta_or_length(opt.value().len() as u16, &mut ext)?;
        out.push((delta_nibble << 4) | length_nibble)
            .map_err(|_| ThreadError::NoBufs)?;
        out.extend_from_slice(&ext).map_err(|_| ThreadError::NoBufs)?;
        out.extend_from_slice(opt.value())
            .map_err(|_| ThreadError::NoBufs)?;
    }
    Ok(())
}

fn decode_ext(buf: &[u8], offset: &mut usize, nibble: u8) -> Result<u16> {
    match nibble {
        0..=12 => Ok(nibble as u16),
        13 => {
            if *offset >= buf.len() {
                return Err(ThreadError::Parse);
            }
            let v = 13 + buf[*offset] as u16;
            *offset += 1;
            Ok(v)
        }
        14 => {
            if *offset + 2 > buf.len() {
                return Err(ThreadError::Parse);
            }
            let v = 269 + u16::from_be_bytes([buf[*offset], buf[*offset + 1]]);
            *offset += 2;
            Ok(v)
        }
        _ => Err(ThreadError::Parse),
    }
}

/// Decodes the delta-coded option stream starting at `buf[0]` up to (not
/// including) the `0xff` payload marker or end of buffer. Malformed or
/// out-of-order option encodings are rejected (§4.7: "Unknown or malformed
/// options short-circuit dispatch").
pub fn decode_options(buf: &[u8]) -> Result<heapless::Vec<CoapOption, MAX_OPTIONS>> {
    let mut options = heapless::Vec::new();
    let mut offset = 0;
    let mut number = 0u16;
    while offset < buf.len() {
        if buf[offset] == 0xff {
            break;
        }
        let byte = buf[offset];
        offset += 1;
        let delta_nibble = byte >> 4;
        let length_nibble = byte & 0x0f;
        let delta = decode_ext(buf, &mut offset, delta_nibble)?;
        let len = decode_ext(buf, &mut offset, length_nibble)? as usize;
        if offset + len > buf.len() {
            return Err(ThreadError::Parse);
        }
        number += delta;
        let opt = CoapOption::new(number, &buf[offset..offset + len])?;
        offset += len;
        options.push(opt).map_err(|_| ThreadError::Parse)?;
    }
    Ok(options)
}

/// Reconstructs a slash-joined URI path from the (already in-order)
/// Uri-Path options, capped at `MAX_URI_PATH_LEN`.
pub fn reconstruct_uri_path(options: &[CoapOption]) -> Result<heapless::Vec<u8, MAX_URI_PATH_LEN>> {
    let mut path = heapless::Vec::new();
    let mut first = true;
    for opt in options.iter().filter(|o| o.number == OPTION_URI_PATH) {
        if !first {
            path.push(b'/').map_err(|_| ThreadError::NoBufs)?;
        }
        first = false;
        path.extend_from_slice(opt.value()).map_err(|_| ThreadError::NoBufs)?;
    }
    Ok(path)
}
