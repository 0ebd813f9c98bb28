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

//! DNS messages: the header, the four record sections, and their wire
//! form ([RFC 1035 § 4.1]).
//!
//! [RFC 1035 § 4.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1

use crate::rr::Record;
use crate::wire::{self, Reader, Writer};

mod opcode;
mod rcode;
pub mod tsig;
mod update;
pub use opcode::Opcode;
pub use rcode::{ExtendedRcode, Rcode};
pub use tsig::{TsigError, TsigSigner};
pub use update::{MissingZoneError, UpdateBuilder};

/// The size of the DNS message header.
const HEADER_LEN: usize = 12;

////////////////////////////////////////////////////////////////////////
// HEADER FLAGS                                                       //
////////////////////////////////////////////////////////////////////////

/// The decomposed flag word of the DNS message header.
///
/// On the wire the word is packed
/// `[qr:1][opcode:4][aa:1][tc:1][rd:1][ra:1][z:3][rcode:4]`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Flags {
    /// Whether the message is a response.
    pub qr: bool,
    /// The kind of query.
    pub opcode: Opcode,
    /// Whether the responder is authoritative for the queried name.
    pub aa: bool,
    /// Whether the response was truncated to fit the transport.
    pub tc: bool,
    /// Whether recursive service is requested.
    pub rd: bool,
    /// Whether recursive service is available.
    pub ra: bool,
    /// The reserved bits, kept verbatim.
    pub z: u8,
    /// The response code.
    pub rcode: Rcode,
}

impl Flags {
    /// Returns the flags of a plain query: everything clear, opcode
    /// QUERY, RCODE NOERROR.
    pub fn query() -> Self {
        Self {
            qr: false,
            opcode: Opcode::QUERY,
            aa: false,
            tc: false,
            rd: false,
            ra: false,
            z: 0,
            rcode: Rcode::NoError,
        }
    }

    /// Unpacks the flag word.
    fn from_wire(raw: u16) -> Self {
        Self {
            qr: raw & 0x8000 != 0,
            // The masks bound both values below 16, so the conversions
            // cannot fail.
            opcode: Opcode::try_from(((raw >> 11) & 0xf) as u8).unwrap(),
            aa: raw & 0x0400 != 0,
            tc: raw & 0x0200 != 0,
            rd: raw & 0x0100 != 0,
            ra: raw & 0x0080 != 0,
            z: ((raw >> 4) & 0x7) as u8,
            rcode: Rcode::try_from((raw & 0xf) as u8).unwrap(),
        }
    }

    /// Packs the flag word.
    fn to_wire(self) -> u16 {
        (u16::from(self.qr) << 15)
            | (u16::from(u8::from(self.opcode)) << 11)
            | (u16::from(self.aa) << 10)
            | (u16::from(self.tc) << 9)
            | (u16::from(self.rd) << 8)
            | (u16::from(self.ra) << 7)
            | (u16::from(self.z & 0x7) << 4)
            | u16::from(u8::from(self.rcode))
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::query()
    }
}

////////////////////////////////////////////////////////////////////////
// MESSAGES                                                           //
////////////////////////////////////////////////////////////////////////

/// A DNS message.
///
/// The section counts of the header are not stored; they derive from
/// the section vectors when the message is written and govern how many
/// records are read when one is parsed.
///
/// A message may carry a [`TsigSigner`]. When it does and the opcode
/// is UPDATE, [`Message::write`] signs the serialized octets, appends
/// the TSIG RR, and bumps the ARCOUNT on the wire to
/// `additionals.len() + 1` ([RFC 2845 § 3.4.1]). The signer itself
/// never appears on the wire and takes no part in equality.
///
/// [RFC 2845 § 3.4.1]: https://datatracker.ietf.org/doc/html/rfc2845#section-3.4.1
#[derive(Clone, Debug, Default)]
pub struct Message {
    pub id: u16,
    pub flags: Flags,
    pub questions: Vec<Record>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
    pub signer: Option<TsigSigner>,
}

impl Message {
    /// Creates an empty message with the given ID and query flags.
    pub fn new(id: u16) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Creates a single-question query.
    pub fn query(id: u16, question: Record) -> Self {
        Self {
            id,
            questions: vec![question],
            ..Self::default()
        }
    }

    /// Parses a message from its wire form.
    pub fn read(octets: &[u8]) -> Result<Self, wire::Error> {
        let mut reader = Reader::new(octets);
        let id = reader.read_u16();
        let flags = Flags::from_wire(reader.read_u16());
        let qdcount = reader.read_u16();
        let ancount = reader.read_u16();
        let nscount = reader.read_u16();
        let arcount = reader.read_u16();

        let mut read_section = |count: u16, in_question: bool| -> Result<Vec<Record>, wire::Error> {
            let mut records = Vec::with_capacity(count.into());
            for _ in 0..count {
                records.push(Record::read(&mut reader, in_question)?);
            }
            Ok(records)
        };
        Ok(Self {
            id,
            flags,
            questions: read_section(qdcount, true)?,
            answers: read_section(ancount, false)?,
            authorities: read_section(nscount, false)?,
            additionals: read_section(arcount, false)?,
            signer: None,
        })
    }

    /// Serializes the message into `writer`.
    ///
    /// Section counts derive from the section vectors. If a signer is
    /// attached and the opcode is UPDATE, the octets written so far
    /// are signed, the TSIG RR is appended, and the ARCOUNT field is
    /// incremented in place.
    pub fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.id);
        writer.write_u16(self.flags.to_wire());
        writer.write_u16(self.questions.len() as u16);
        writer.write_u16(self.answers.len() as u16);
        writer.write_u16(self.authorities.len() as u16);
        let arcount = writer.mark();
        writer.write_u16(self.additionals.len() as u16);

        for question in &self.questions {
            question.write(writer, true);
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            record.write(writer, false);
        }

        if let Some(signer) = &self.signer {
            if self.flags.opcode == Opcode::UPDATE && !writer.overflowed() {
                let record = signer.sign(self.id, writer.buffer());
                record.write(writer, false);
                writer.patch_u16(arcount, self.additionals.len() as u16 + 1);
            }
        }
    }

    /// Returns the exact number of octets [`Message::write`] will
    /// emit, including the TSIG RR if the message will be signed.
    pub fn encoded_len(&self) -> usize {
        let mut len = HEADER_LEN;
        len += self
            .questions
            .iter()
            .map(|q| q.encoded_len(true))
            .sum::<usize>();
        len += self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
            .map(|r| r.encoded_len(false))
            .sum::<usize>();
        if let Some(signer) = &self.signer {
            if self.flags.opcode == Opcode::UPDATE {
                len += signer.record_len();
            }
        }
        len
    }

    /// Serializes the message into a fresh buffer. This is a
    /// convenience for callers that do not manage their own windows;
    /// the transports write into their scratch buffers directly.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        let mut writer = Writer::new(&mut buf);
        self.write(&mut writer);
        let len = writer.offset();
        buf.truncate(len);
        buf
    }
}

/// Equality covers the wire-visible parts of the message; an attached
/// signer takes no part.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.flags == other.flags
            && self.questions == other.questions
            && self.answers == other.answers
            && self.authorities == other.authorities
            && self.additionals == other.additionals
    }
}

impl Eq for Message {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use crate::class::Class;
    use crate::rr::{Rdata, Record, Type};

    use super::*;

    /// The serialized form of a PTR query for alpha.arrowhead.org.
    /// with ID 12345 and RD set.
    const PTR_QUERY: &[u8] =
        b"\x30\x39\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
          \x05alpha\x09arrowhead\x03org\x00\x00\x0c\x00\x01";

    fn ptr_query() -> Message {
        let mut message = Message::query(
            12345,
            Record::question(
                "alpha.arrowhead.org.".parse().unwrap(),
                Type::PTR,
                Class::IN,
            ),
        );
        message.flags.rd = true;
        message
    }

    #[test]
    fn ptr_query_encodes_to_expected_octets() {
        assert_eq!(ptr_query().to_wire(), PTR_QUERY);
    }

    #[test]
    fn ptr_query_decodes_to_equal_message() {
        assert_eq!(Message::read(PTR_QUERY).unwrap(), ptr_query());
    }

    #[test]
    fn flags_pack_and_unpack() {
        let flags = Flags {
            qr: true,
            opcode: Opcode::UPDATE,
            aa: true,
            tc: true,
            rd: true,
            ra: true,
            z: 0b101,
            rcode: Rcode::Refused,
        };
        let raw = flags.to_wire();
        assert_eq!(raw, 0xafd5);
        assert_eq!(Flags::from_wire(raw), flags);
    }

    #[test]
    fn truncation_bit_survives_round_trip() {
        let mut message = ptr_query();
        message.flags.qr = true;
        message.flags.tc = true;
        let decoded = Message::read(&message.to_wire()).unwrap();
        assert!(decoded.flags.tc);
    }

    #[test]
    fn multi_section_message_round_trips() {
        let mut message = Message::new(0x0747);
        message.flags.qr = true;
        message.flags.ra = true;
        message.questions.push(Record::question(
            "alpha.arrowhead.org.".parse().unwrap(),
            Type::SRV,
            Class::IN,
        ));
        message.answers.push(Record::new(
            "alpha.arrowhead.org.".parse().unwrap(),
            Type::SRV,
            Class::IN,
            120,
            Rdata::Srv(crate::rr::rdata::Srv {
                priority: 10,
                weight: 0,
                port: 8443,
                target: "host.arrowhead.org.".parse().unwrap(),
            }),
        ));
        message.authorities.push(Record::new(
            "arrowhead.org.".parse().unwrap(),
            Type::NS,
            Class::IN,
            3600,
            Rdata::Ns("ns.arrowhead.org.".parse().unwrap()),
        ));
        message.additionals.push(Record::new(
            "host.arrowhead.org.".parse().unwrap(),
            Type::A,
            Class::IN,
            120,
            Rdata::A("192.0.2.4".parse().unwrap()),
        ));

        let octets = message.to_wire();
        assert_eq!(octets.len(), message.encoded_len());
        assert_eq!(Message::read(&octets).unwrap(), message);
    }

    #[test]
    fn compressed_response_decodes() {
        // A response that compresses the answer's owner name with a
        // pointer to the question.
        let octets: &[u8] =
            b"\x30\x39\x81\x80\x00\x01\x00\x01\x00\x00\x00\x00\
              \x05alpha\x09arrowhead\x03org\x00\x00\x0c\x00\x01\
              \xc0\x0c\x00\x0c\x00\x01\x00\x00\x00\x78\x00\x02\xc0\x12";
        let message = Message::read(octets).unwrap();
        assert_eq!(message.answers.len(), 1);
        assert_eq!(
            message.answers[0].name,
            "alpha.arrowhead.org.".parse().unwrap()
        );
        assert_eq!(
            message.answers[0].rdata,
            Some(Rdata::Ptr("arrowhead.org.".parse().unwrap()))
        );
    }

    #[test]
    fn signed_update_bumps_arcount_and_verifies() {
        use base64::Engine;

        let secret = base64::engine::general_purpose::STANDARD
            .decode("VQEOSuLEGcsnJqjOJKnjbA==")
            .unwrap();
        let signer = TsigSigner::new("key.arrowhead.org.".parse().unwrap(), secret)
            .with_fudge(300)
            .with_time_signed(1506594227);

        let message = UpdateBuilder::new(0x91e8)
            .zone("beta.arrowhead.org.".parse().unwrap())
            .sign(signer.clone())
            .build()
            .unwrap();
        let octets = message.to_wire();
        assert_eq!(octets.len(), message.encoded_len());

        // The ARCOUNT on the wire counts the appended TSIG RR.
        assert_eq!(u16::from_be_bytes([octets[10], octets[11]]), 1);

        // The trailing record is a type-250 RR for the key name, and
        // its MAC verifies over the octets it covers: the message as
        // written before the TSIG RR was appended, i.e. with the
        // original ARCOUNT.
        let decoded = Message::read(&octets).unwrap();
        assert_eq!(decoded.additionals.len(), 1);
        let tsig_rr = &decoded.additionals[0];
        assert_eq!(tsig_rr.rr_type, Type::TSIG);

        let prior_len = octets.len() - tsig_rr.encoded_len(false);
        let mut prior = octets[..prior_len].to_vec();
        prior[10..12].copy_from_slice(&0u16.to_be_bytes());
        assert_eq!(signer.verify(&prior, tsig_rr, 1506594227), Ok(()));
    }

    #[test]
    fn unsigned_query_ignores_signer() {
        // A signer on a non-UPDATE message does not change the wire
        // form.
        let mut message = ptr_query();
        message.signer = Some(TsigSigner::new(
            "key.arrowhead.org.".parse().unwrap(),
            b"secret".to_vec(),
        ));
        assert_eq!(message.to_wire(), PTR_QUERY);
        assert_eq!(message.encoded_len(), PTR_QUERY.len());
    }
}
