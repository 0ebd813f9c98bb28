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

//! A builder for DNS UPDATE messages ([RFC 2136]).
//!
//! [RFC 2136]: https://datatracker.ietf.org/doc/html/rfc2136

use std::fmt;

use crate::class::Class;
use crate::name::Name;
use crate::rr::{Record, Type};

use super::tsig::TsigSigner;
use super::{Flags, Message, Opcode};

////////////////////////////////////////////////////////////////////////
// UPDATE BUILDER                                                     //
////////////////////////////////////////////////////////////////////////

/// Assembles an UPDATE message through chained calls.
///
/// The zone section of an UPDATE holds exactly one SOA question naming
/// the zone to modify; [`UpdateBuilder::zone`] sets it and
/// [`UpdateBuilder::build`] fails without it. Prerequisites go into
/// the answer-section slot and update records into the
/// authority-section slot, as [RFC 2136 § 2] assigns them.
///
/// ```
/// use quiver::message::UpdateBuilder;
/// use quiver::rr::{Rdata, Record, Type};
/// use quiver::class::Class;
///
/// let message = UpdateBuilder::new(0x1234)
///     .zone("arrowhead.org.".parse().unwrap())
///     .present("printer.arrowhead.org.".parse().unwrap())
///     .update(Record::new(
///         "printer.arrowhead.org.".parse().unwrap(),
///         Type::A,
///         Class::IN,
///         3600,
///         Rdata::A("192.0.2.9".parse().unwrap()),
///     ))
///     .build()
///     .unwrap();
/// assert_eq!(message.questions.len(), 1);
/// ```
///
/// [RFC 2136 § 2]: https://datatracker.ietf.org/doc/html/rfc2136#section-2
#[derive(Clone, Debug, Default)]
pub struct UpdateBuilder {
    id: u16,
    zone: Option<Name>,
    prerequisites: Vec<Record>,
    updates: Vec<Record>,
    signer: Option<TsigSigner>,
}

impl UpdateBuilder {
    /// Starts an UPDATE message with the given ID.
    pub fn new(id: u16) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Names the zone to update. The zone appears as the single SOA/IN
    /// question of the message.
    pub fn zone(mut self, zone: Name) -> Self {
        self.zone = Some(zone);
        self
    }

    /// Adds the prerequisite that `name` owns at least one RR
    /// ([RFC 2136 § 2.4.4]): class ANY, type ANY, TTL zero, empty
    /// RDATA.
    ///
    /// [RFC 2136 § 2.4.4]: https://datatracker.ietf.org/doc/html/rfc2136#section-2.4.4
    pub fn present(mut self, name: Name) -> Self {
        self.prerequisites
            .push(prerequisite(name, Class::ANY));
        self
    }

    /// Adds the prerequisite that `name` owns no RRs
    /// ([RFC 2136 § 2.4.5]): class NONE, type ANY, TTL zero, empty
    /// RDATA.
    ///
    /// [RFC 2136 § 2.4.5]: https://datatracker.ietf.org/doc/html/rfc2136#section-2.4.5
    pub fn absent(mut self, name: Name) -> Self {
        self.prerequisites
            .push(prerequisite(name, Class::NONE));
        self
    }

    /// Appends a record to the update section. Per [RFC 2136 § 2.5],
    /// the record's class selects the operation: IN adds the record,
    /// NONE deletes the specific RR, and ANY deletes an RRset (or,
    /// with type ANY, every RRset at the name).
    ///
    /// [RFC 2136 § 2.5]: https://datatracker.ietf.org/doc/html/rfc2136#section-2.5
    pub fn update(mut self, record: Record) -> Self {
        self.updates.push(record);
        self
    }

    /// Attaches a transaction signer. The message is signed when it is
    /// serialized.
    pub fn sign(mut self, signer: TsigSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Builds the [`Message`]. Fails if no zone was named.
    pub fn build(self) -> Result<Message, MissingZoneError> {
        let zone = self.zone.ok_or(MissingZoneError)?;
        Ok(Message {
            id: self.id,
            flags: Flags {
                opcode: Opcode::UPDATE,
                ..Flags::query()
            },
            questions: vec![Record::question(zone, Type::SOA, Class::IN)],
            answers: self.prerequisites,
            authorities: self.updates,
            additionals: Vec::new(),
            signer: self.signer,
        })
    }
}

/// Builds one of the two empty-RDATA prerequisite forms.
fn prerequisite(name: Name, class: Class) -> Record {
    Record {
        name,
        rr_type: Type::ANY,
        class,
        ttl: 0,
        rdata: None,
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that [`UpdateBuilder::build`] was called without
/// a zone.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MissingZoneError;

impl fmt::Display for MissingZoneError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("UPDATE message has no zone")
    }
}

impl std::error::Error for MissingZoneError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use crate::rr::Rdata;

    use super::*;

    #[test]
    fn build_requires_a_zone() {
        assert_eq!(
            UpdateBuilder::new(1).build().unwrap_err(),
            MissingZoneError,
        );
    }

    #[test]
    fn sections_are_assigned_per_rfc2136() {
        let message = UpdateBuilder::new(0x2b67)
            .zone("arrowhead.org.".parse().unwrap())
            .present("alpha.arrowhead.org.".parse().unwrap())
            .absent("omega.arrowhead.org.".parse().unwrap())
            .update(Record::new(
                "alpha.arrowhead.org.".parse().unwrap(),
                Type::SRV,
                Class::IN,
                120,
                Rdata::Srv(crate::rr::rdata::Srv {
                    priority: 0,
                    weight: 0,
                    port: 8443,
                    target: "host.arrowhead.org.".parse().unwrap(),
                }),
            ))
            .build()
            .unwrap();

        assert_eq!(message.flags.opcode, Opcode::UPDATE);
        assert_eq!(message.questions.len(), 1);
        assert_eq!(message.questions[0].rr_type, Type::SOA);
        assert_eq!(message.questions[0].class, Class::IN);

        assert_eq!(message.answers.len(), 2);
        assert_eq!(message.answers[0].class, Class::ANY);
        assert_eq!(message.answers[0].rr_type, Type::ANY);
        assert_eq!(message.answers[0].ttl, 0);
        assert!(message.answers[0].rdata.is_none());
        assert_eq!(message.answers[1].class, Class::NONE);

        assert_eq!(message.authorities.len(), 1);
        assert_eq!(message.authorities[0].class, Class::IN);
        assert!(message.additionals.is_empty());
    }
}
