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

//! Positioned read and write windows over DNS message buffers.
//!
//! A [`Reader`] or [`Writer`] frames a region of an octet buffer with a
//! cursor and an exclusive end. Sub-windows derived from a window share
//! the underlying buffer but carry their own bounds, which is how
//! RDLENGTH-delimited RDATA is handed to the per-type codecs while
//! compression pointers can still reach back to the start of the
//! message.
//!
//! The windows deliberately do not fail on exhaustion: reading past the
//! end of a [`Reader`] yields zero-valued fields, and writing past the
//! end of a [`Writer`] sets its overflow flag and discards the data.
//! Malformed input therefore decodes into structurally valid but
//! semantically empty values; callers treat unexpected shapes as
//! protocol errors. The only hard decoding failures are structural
//! violations in compressed names, reported as [`Error`].

use std::fmt;

mod reader;
mod writer;
pub use reader::Reader;
pub use writer::{Mark, Writer};

/// The largest DNS message that fits in a single UDP datagram without
/// EDNS(0) ([RFC 1035 § 2.3.4]).
///
/// [RFC 1035 § 2.3.4]: https://datatracker.ietf.org/doc/html/rfc1035#section-2.3.4
pub const MAX_UDP_MESSAGE: usize = 512;

/// The largest DNS message that can be framed with the two-octet length
/// prefix used over TCP ([RFC 1035 § 4.2.2]).
///
/// [RFC 1035 § 4.2.2]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.2.2
pub const MAX_TCP_MESSAGE: usize = 65535;

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors that arise when decoding a compressed on-the-wire name.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// A compression pointer does not point strictly backward.
    /// According to [RFC 1035 § 4.1.4], pointers point to a *prior*
    /// occurrence of the name; importantly, this prevents loops.
    ///
    /// [RFC 1035 § 4.1.4]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.4
    InvalidPointer,

    /// A label starts with the reserved `01` or `10` bit patterns.
    ReservedLabelType,

    /// The reassembled name exceeds 255 octets.
    NameTooLong,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidPointer => f.write_str("compression pointer does not point backward"),
            Self::ReservedLabelType => f.write_str("reserved label type"),
            Self::NameTooLong => f.write_str("name exceeds 255 octets"),
        }
    }
}

impl std::error::Error for Error {}
