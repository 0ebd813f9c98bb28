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

//! Implementation of the [`Rdata`] type and DNS RDATA processing.
//!
//! RDATA is decoded into typed values: the service-discovery layer
//! consumes the targets of PTR and SRV answers directly, so the codec
//! eagerly interprets the wire form rather than preserving validated
//! octet blobs. RDATA of types this crate does not recognize is kept
//! as an opaque octet blob tagged with the numeric type and written
//! back verbatim ([RFC 3597 § 3]).
//!
//! [RFC 3597 § 3]: https://datatracker.ietf.org/doc/html/rfc3597#section-3

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::name::Name;
use crate::wire::{self, Reader, Writer};

use super::Type;

// Implementations of RR types.
mod ipv6;
mod opt;
mod srv;
mod std13;
mod tsig;
pub use opt::OptOption;
pub use srv::Srv;
pub use std13::{Mx, Soa};
pub use tsig::Tsig;

////////////////////////////////////////////////////////////////////////
// RDATA TYPE                                                         //
////////////////////////////////////////////////////////////////////////

/// The typed RDATA of a resource record.
///
/// One variant exists per RR type the crate understands; everything
/// else is preserved in [`Rdata::Unknown`]. The [`Rdata::Any`] variant
/// is the empty RDATA of a type-ANY record, which UPDATE messages use
/// to mean "delete all RRsets at a name" ([RFC 2136 § 2.5.3]).
///
/// [RFC 2136 § 2.5.3]: https://datatracker.ietf.org/doc/html/rfc2136#section-2.5.3
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Rdata {
    A(Ipv4Addr),
    Ns(Name),
    Cname(Name),
    Soa(Soa),
    Ptr(Name),
    Mx(Mx),
    Txt(Vec<Vec<u8>>),
    Aaaa(Ipv6Addr),
    Srv(Srv),
    Dname(Name),
    Opt(Vec<OptOption>),
    Tsig(Tsig),
    Any,
    Unknown(Type, Vec<u8>),
}

impl Rdata {
    /// Returns the RR type this RDATA belongs to.
    pub fn rr_type(&self) -> Type {
        match self {
            Self::A(_) => Type::A,
            Self::Ns(_) => Type::NS,
            Self::Cname(_) => Type::CNAME,
            Self::Soa(_) => Type::SOA,
            Self::Ptr(_) => Type::PTR,
            Self::Mx(_) => Type::MX,
            Self::Txt(_) => Type::TXT,
            Self::Aaaa(_) => Type::AAAA,
            Self::Srv(_) => Type::SRV,
            Self::Dname(_) => Type::DNAME,
            Self::Opt(_) => Type::OPT,
            Self::Tsig(_) => Type::TSIG,
            Self::Any => Type::ANY,
            Self::Unknown(rr_type, _) => *rr_type,
        }
    }

    /// Reads RDATA of type `rr_type` from an RDLENGTH-bounded window.
    ///
    /// The window must be derived from the message reader (see
    /// [`Reader::sub`]) so that compressed names inside the RDATA can
    /// reach back into the message.
    pub fn read(rr_type: Type, reader: &mut Reader) -> Result<Self, wire::Error> {
        match rr_type {
            Type::A => Ok(Self::A(Ipv4Addr::from(reader.read_u32()))),
            Type::NS => Ok(Self::Ns(reader.read_name()?)),
            Type::CNAME => Ok(Self::Cname(reader.read_name()?)),
            Type::SOA => Ok(Self::Soa(Soa::read(reader)?)),
            Type::PTR => Ok(Self::Ptr(reader.read_name()?)),
            Type::MX => Ok(Self::Mx(Mx::read(reader)?)),
            Type::TXT => Ok(Self::Txt(reader.read_character_strings())),
            Type::AAAA => Ok(Self::Aaaa(ipv6::read_aaaa(reader))),
            Type::SRV => Ok(Self::Srv(Srv::read(reader)?)),
            Type::DNAME => Ok(Self::Dname(reader.read_name()?)),
            Type::OPT => Ok(Self::Opt(opt::read_options(reader))),
            Type::TSIG => Ok(Self::Tsig(Tsig::read(reader)?)),
            Type::ANY => Ok(Self::Any),
            _ => {
                let octets = reader.read_bytes(reader.remaining()).to_vec();
                Ok(Self::Unknown(rr_type, octets))
            }
        }
    }

    /// Writes the wire form of the RDATA (RDLENGTH not included).
    pub fn write(&self, writer: &mut Writer) {
        match self {
            Self::A(addr) => writer.write_u32((*addr).into()),
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) | Self::Dname(name) => {
                writer.write_name(name)
            }
            Self::Soa(soa) => soa.write(writer),
            Self::Mx(mx) => mx.write(writer),
            Self::Txt(strings) => {
                for string in strings {
                    writer.write_character_string(string);
                }
            }
            Self::Aaaa(addr) => writer.write_bytes(&addr.octets()),
            Self::Srv(srv) => srv.write(writer),
            Self::Opt(options) => {
                for option in options {
                    option.write(writer);
                }
            }
            Self::Tsig(tsig) => tsig.write(writer),
            Self::Any => (),
            Self::Unknown(_, octets) => writer.write_bytes(octets),
        }
    }

    /// Returns the exact number of octets [`Rdata::write`] will emit.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::A(_) => 4,
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) | Self::Dname(name) => {
                name.wire_len()
            }
            Self::Soa(soa) => soa.encoded_len(),
            Self::Mx(mx) => mx.encoded_len(),
            Self::Txt(strings) => strings.iter().map(|s| 1 + s.len()).sum(),
            Self::Aaaa(_) => 16,
            Self::Srv(srv) => srv.encoded_len(),
            Self::Opt(options) => options.iter().map(OptOption::encoded_len).sum(),
            Self::Tsig(tsig) => tsig.encoded_len(),
            Self::Any => 0,
            Self::Unknown(_, octets) => octets.len(),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(rdata: &Rdata) -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        let mut writer = Writer::new(&mut buf);
        rdata.write(&mut writer);
        assert!(!writer.overflowed());
        assert_eq!(writer.offset(), rdata.encoded_len());
        let len = writer.offset();
        buf.truncate(len);
        buf
    }

    fn decode(rr_type: Type, octets: &[u8]) -> Rdata {
        let mut reader = Reader::new(octets);
        let mut window = reader.sub(octets.len());
        Rdata::read(rr_type, &mut window).unwrap()
    }

    #[test]
    fn srv_encodes_to_expected_octets() {
        let rdata = Rdata::Srv(Srv {
            priority: 100,
            weight: 200,
            port: 300,
            target: "epsilon.arrowhead.org.".parse().unwrap(),
        });
        assert_eq!(
            encode(&rdata),
            b"\x00\x64\x00\xc8\x01\x2c\x07epsilon\x09arrowhead\x03org\x00",
        );
    }

    #[test]
    fn soa_encodes_escaped_dot_label() {
        let rdata = Rdata::Soa(Soa {
            mname: "arrowhead.org.".parse().unwrap(),
            rname: "mail\\.dns.arrowhead.org.".parse().unwrap(),
            serial: 1000,
            refresh: 3600,
            retry: 30,
            expire: 7200,
            minimum: 1800,
        });
        let octets = encode(&rdata);
        let expected: &[u8] = b"\x09arrowhead\x03org\x00\
              \x08mail.dns\x09arrowhead\x03org\x00\
              \x00\x00\x03\xe8\x00\x00\x0e\x10\x00\x00\x00\x1e\
              \x00\x00\x1c\x20\x00\x00\x07\x08";
        assert_eq!(octets, expected);
        assert_eq!(decode(Type::SOA, &octets), rdata);
    }

    #[test]
    fn a_and_aaaa_round_trip() {
        let a = Rdata::A("192.0.2.1".parse().unwrap());
        assert_eq!(encode(&a), b"\xc0\x00\x02\x01");
        assert_eq!(decode(Type::A, b"\xc0\x00\x02\x01"), a);

        let aaaa = Rdata::Aaaa("2001:db8::1".parse().unwrap());
        let octets = encode(&aaaa);
        assert_eq!(octets.len(), 16);
        assert_eq!(decode(Type::AAAA, &octets), aaaa);
    }

    #[test]
    fn name_types_round_trip() {
        for (rr_type, rdata) in [
            (Type::NS, Rdata::Ns("ns.arrowhead.org.".parse().unwrap())),
            (
                Type::CNAME,
                Rdata::Cname("alias.arrowhead.org.".parse().unwrap()),
            ),
            (
                Type::PTR,
                Rdata::Ptr("alpha.arrowhead.org.".parse().unwrap()),
            ),
            (
                Type::DNAME,
                Rdata::Dname("tree.arrowhead.org.".parse().unwrap()),
            ),
        ] {
            assert_eq!(decode(rr_type, &encode(&rdata)), rdata);
        }
    }

    #[test]
    fn txt_round_trips_multiple_strings() {
        let rdata = Rdata::Txt(vec![b"path=/sr".to_vec(), b"proto=http".to_vec()]);
        let octets = encode(&rdata);
        assert_eq!(octets, b"\x08path=/sr\x0aproto=http");
        assert_eq!(decode(Type::TXT, &octets), rdata);
    }

    #[test]
    fn mx_round_trips() {
        let rdata = Rdata::Mx(Mx {
            preference: 10,
            exchange: "mx.arrowhead.org.".parse().unwrap(),
        });
        assert_eq!(decode(Type::MX, &encode(&rdata)), rdata);
    }

    #[test]
    fn opt_round_trips_options() {
        let rdata = Rdata::Opt(vec![
            OptOption {
                code: 10,
                data: b"\x01\x02\x03".to_vec(),
            },
            OptOption {
                code: 11,
                data: Vec::new(),
            },
        ]);
        assert_eq!(decode(Type::OPT, &encode(&rdata)), rdata);
    }

    #[test]
    fn any_is_empty() {
        let rdata = Rdata::Any;
        assert_eq!(encode(&rdata), b"");
        assert_eq!(decode(Type::ANY, b""), rdata);
    }

    #[test]
    fn unknown_types_are_preserved() {
        let rdata = Rdata::Unknown(Type::from(4242), b"\xde\xad\xbe\xef".to_vec());
        assert_eq!(encode(&rdata), b"\xde\xad\xbe\xef");
        assert_eq!(decode(Type::from(4242), b"\xde\xad\xbe\xef"), rdata);
    }

    #[test]
    fn compressed_names_decode_inside_rdata() {
        // A PTR record whose RDATA points back to a name at the start
        // of the (mock) message.
        let message = b"\x04test\x00\x07example\xc0\x00";
        let mut reader = Reader::new(message);
        let _ = reader.read_bytes(6);
        let mut window = reader.sub(10);
        let rdata = Rdata::read(Type::PTR, &mut window).unwrap();
        assert_eq!(rdata, Rdata::Ptr("example.test.".parse().unwrap()));
    }
}
