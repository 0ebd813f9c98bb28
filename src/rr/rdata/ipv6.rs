// Copyright 2023 Quiver Contributors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! AAAA RDATA ([RFC 3596]).
//!
//! [RFC 3596]: https://datatracker.ietf.org/doc/html/rfc3596

use std::net::Ipv6Addr;

use crate::wire::Reader;

/// Reads the sixteen-octet AAAA RDATA; a short window zero-fills, per
/// the window model.
pub(super) fn read_aaaa(reader: &mut Reader) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    let available = reader.read_bytes(16);
    octets[..available.len()].copy_from_slice(available);
    Ipv6Addr::from(octets)
}
