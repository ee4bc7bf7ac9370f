// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stateless UDP demultiplexing by destination port (`SPEC_FULL.md` §4.6).
//! Header field names follow `capsules_extra::net::udp::UDPHeader`
//! (`examples/tock-tock/capsules/extra/src/net/udp/mod.rs` re-exports it;
//! the submodule itself was not retrieved, so the 8-byte RFC 768 layout is
//! used directly).

use crate::error::{Result, ThreadError};
use crate::net::ip6::PseudoHeaderChecksum;
use crate::net::address::Ipv6Addr;

pub const UDP_HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub fn encode(&self, out: &mut [u8]) -> Result<()> {
        if out.len() < UDP_HEADER_LEN {
            return Err(ThreadError::NoBufs);
        }
        out[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        out[2..4].copy_from_slice(&self.dst_port.to_be_bytes());
        out[4..6].copy_from_slice(&self.length.to_be_bytes());
        out[6..8].copy_from_slice(&self.checksum.to_be_bytes());
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < UDP_HEADER_LEN {
            return Err(ThreadError::Parse);
        }
        Ok(Self {
            src_port: u16::from_be_bytes([buf[0], buf[1]]),
            dst_port: u16::from_be_bytes([buf[2], buf[3]]),
            length: u16::from_be_bytes([buf[4], buf[5]]),
            checksum: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }
}

/// Computes the UDP checksum over the pseudo-header, the UDP header (with
/// the checksum field treated as zero), and the payload.
pub fn checksum(src: &Ipv6Addr, dst: &Ipv6Addr, header: &UdpHeader, payload: &[u8]) -> u16 {
    let mut csum = PseudoHeaderChecksum::new(src, dst, header.length as u32, 17);
    let mut header_bytes = [0u8; UDP_HEADER_LEN];
    let zeroed = UdpHeader {
        checksum: 0,
        ..*header
    };
    zeroed.encode(&mut header_bytes).unwrap();
    csum.add_bytes(&header_bytes);
    csum.add_bytes(payload);
    let result = csum.finalize();
    if result == 0 {
        0xffff
    } else {
        result
    }
}

/// One bound local port (`SPEC_FULL.md` §4.6: "stateless socket
/// demultiplexing by destination port"). The core hands matching datagrams
/// to whatever registered the port; it does not itself model a socket
/// buffer or blocking receive (that is the embedder's concern).
pub trait UdpClient {
    fn receive(&self, src: Ipv6Addr, src_port: u16, payload: &[u8]);
}

pub const MAX_BOUND_PORTS: usize = 8;

struct Binding<'a> {
    port: u16,
    client: &'a dyn UdpClient,
}

/// Demultiplexes inbound UDP datagrams to whichever client bound the
/// destination port.
pub struct UdpPortTable<'a> {
    bindings: heapless::Vec<Binding<'a>, MAX_BOUND_PORTS>,
}

impl<'a> UdpPortTable<'a> {
    pub const fn new() -> Self {
        Self {
            bindings: heapless::Vec::new(),
        }
    }

    pub fn bind(&mut self, port: u16, client: &'a dyn UdpClient) -> Result<()> {
        if self.bindings.iter().any(|b| b.port == port) {
            return Err(ThreadError::InvalidState);
        }
        self.bindings
            .push(Binding { port, client })
            .map_err(|_| ThreadError::NoBufs)
    }

    pub fn unbind(&mut self, port: u16) -> bool {
        if let Some(pos) = self.bindings.iter().position(|b| b.port == port) {
            self.bindings.remove(pos);
            true
        } else {
            false
        }
    }

    /// Dispatches `payload` to the client bound to `dst_port`, if any.
    /// Returns `Drop` (silently, per §7) if no socket is bound.
    pub fn dispatch(
        &self,
        src: Ipv6Addr,
        src_port: u16,
        dst_port: u16,
        payload: &[u8],
    ) -> Result<()> {
        match self.bindings.iter().find(|b| b.port == dst_port) {
            Some(binding) => {
                binding.client.receive(src, src_port, payload);
                Ok(())
            }
            None => Err(ThreadError::Drop),
        }
    }
}

impl<'a> Default for UdpPortTable<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    #[test]
    fn header_round_trips() {
        let header = UdpHeader {
            src_port: 1234,
            dst_port: 19788,
            length: 16,
            checksum: 0xabcd,
        };
        let mut buf = [0u8; UDP_HEADER_LEN];
        header.encode(&mut buf).unwrap();
        assert_eq!(UdpHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn checksum_nonzero_result_maps_zero_to_all_ones() {
        let src = Ipv6Addr::new([0; 16]);
        let dst = Ipv6Addr::new([0; 16]);
        let header = UdpHeader {
            src_port: 0,
            dst_port: 0,
            length: 8,
            checksum: 0,
        };
        let sum = checksum(&src, &dst, &header, &[]);
        assert_ne!(sum, 0);
    }

    struct Recorder<'a> {
        got: &'a RefCell<heapless::Vec<u8, 32>>,
    }
    impl<'a> UdpClient for Recorder<'a> {
        fn receive(&self, _src: Ipv6Addr, _src_port: u16, payload: &[u8]) {
            self.got.borrow_mut().extend_from_slice(payload).ok();
        }
    }

    #[test]
    fn dispatch_routes_by_destination_port() {
        let got = RefCell::new(heapless::Vec::<u8, 32>::new());
        let client = Recorder { got: &got };
        let mut table = UdpPortTable::new();
        table.bind(19788, &client).unwrap();

        assert!(table
            .dispatch(Ipv6Addr::new([0; 16]), 1, 19788, b"mle")
            .is_ok());
        assert_eq!(got.borrow().as_slice(), b"mle");

        assert_eq!(
            table.dispatch(Ipv6Addr::new([0; 16]), 1, 5683, b"coap"),
            Err(ThreadError::Drop)
        );
    }

    #[test]
    fn double_bind_same_port_rejected() {
        let got = RefCell::new(heapless::Vec::<u8, 32>::new());
        let client = Recorder { got: &got };
        let mut table = UdpPortTable::new();
        table.bind(100, &client).unwrap();
        assert_eq!(table.bind(100, &client), Err(ThreadError::InvalidState));
    }
}
