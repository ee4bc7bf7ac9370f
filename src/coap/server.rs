// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CoAP resource dispatch by URI path (`SPEC_FULL.md` §4.7), grounded on
//! `coap_server.hpp`'s `Resource`/`Server` split
//! (`examples/original_source/include/coap/coap_server.hpp`): a flat list
//! of registered resources, each keyed by a URI path, searched on receipt
//! of a datagram.

use crate::coap::message::{decode_options, reconstruct_uri_path, Header};
use crate::error::{Result, ThreadError};
use crate::net::address::Ipv6Addr;

pub const MAX_RESOURCES: usize = 8;
pub const MAX_URI_PATH_LEN: usize = 32;

/// Thread's well-known CoAP resource URIs (`SPEC_FULL.md` §6).
pub mod uri {
    pub const ADDRESS_QUERY: &[u8] = b"a/aq";
    pub const ADDRESS_NOTIFY: &[u8] = b"a/an";
    pub const ADDRESS_ERROR: &[u8] = b"a/ae";
    pub const ADDRESS_SOLICIT: &[u8] = b"a/as";
    pub const ADDRESS_RELEASE: &[u8] = b"a/ar";
    pub const SERVER_DATA: &[u8] = b"n/sd";
}

/// Implemented by whatever handles one registered resource's requests.
pub trait CoapResourceHandler {
    fn handle(&self, header: &Header, payload: &[u8], src: Ipv6Addr, src_port: u16);
}

struct Resource<'a> {
    uri_path: &'a [u8],
    handler: &'a dyn CoapResourceHandler,
}

/// Dispatches inbound CoAP datagrams to the resource matching their
/// reconstructed URI path.
pub struct CoapServer<'a> {
    resources: heapless::Vec<Resource<'a>, MAX_RESOURCES>,
}

impl<'a> CoapServer<'a> {
    pub const fn new() -> Self {
        Self {
            resources: heapless::Vec::new(),
        }
    }

    pub fn add_resource(&mut self, uri_path: &'a [u8], handler: &'a dyn CoapResourceHandler) -> Result<()> {
        if uri_path.len() > MAX_URI_PATH_LEN {
            return Err(ThreadError::InvalidArgs);
        }
        self.resources
            .push(Resource { uri_path, handler })
            .map_err(|_| ThreadError::NoBufs)
    }

    /// Parses `datagram` as a CoAP message, reconstructs its URI path, and
    /// dispatches to the matching resource. Malformed options or an
    /// unmatched path fail without invoking any handler (§4.7: "Unknown or
    /// malformed options short-circuit dispatch").
    pub fn dispatch(&self, datagram: &[u8], src: Ipv6Addr, src_port: u16) -> Result<()> {
        let (header, consumed) = Header::decode(datagram)?;
        let rest = &datagram[consumed..];
        let options = decode_options(rest)?;
        let path = reconstruct_uri_path(&options)?;

        let payload_marker = rest.iter().position(|&b| b == 0xff);
        let payload = match payload_marker {
            Some(pos) => options_consumed_len(rest, pos),
            None => &[][..],
        };

        match self
            .resources
            .iter()
            .find(|r| r.uri_path == path.as_slice())
        {
            Some(resource) => {
                resource.handler.handle(&header, payload, src, src_port);
                Ok(())
            }
            None => Err(ThreadError::NotReceiving),
        }
    }
}

fn options_consumed_len(rest: &[u8], marker_pos: usize) -> &[u8] {
    &rest[marker_pos + 1..]
}

impl<'a> Default for CoapServer<'a> {
    fn default() -> Self {
        Self::new()
    }
}
