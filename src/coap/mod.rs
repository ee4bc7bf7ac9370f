// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CoAP 1.0 message codec and server-side resource dispatch
//! (`SPEC_FULL.md` §4.7). Grounded on `coap_header.hpp`/`coap_server.hpp`
//! (`examples/original_source/include/coap/`).

pub mod message;
pub mod server;

pub use message::{CoapCode, CoapOption, CoapType, Header as CoapHeader};
pub use server::{uri, CoapResourceHandler, CoapServer};
