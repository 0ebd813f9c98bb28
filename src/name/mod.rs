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

//! Implementation of data structures related to domain names.

use std::fmt;
use std::str::FromStr;

mod error;
mod label;
pub use error::Error;
pub use label::Label;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
pub(crate) const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
pub(crate) const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A domain name: a sequence of [`Label`]s.
///
/// A `Name` stores its labels in order from the leftmost (the host
/// part) to the rightmost (just under the root). The root itself is
/// represented implicitly; the root name has zero labels.
///
/// `Name`s are constructed through the [`FromStr`] implementation
/// (which supports the escape sequences of [RFC 4343 § 2.1] and treats
/// a trailing dot as idempotent), through [`Name::from_labels`], or by
/// decoding from the wire via [`Reader::read_name`]. Constructors
/// enforce the limits of [RFC 1035 § 3.1]: labels of at most 63 octets
/// and a total wire form of at most 255 octets.
///
/// Comparison and hashing of names are ASCII-case-insensitive; case is
/// preserved in memory but lowercased when the name is written to the
/// wire.
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
/// [`Reader::read_name`]: crate::wire::Reader::read_name
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Name {
    labels: Vec<Label>,
}

impl Name {
    /// Returns the DNS root name `.`.
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Returns whether this `Name` is the DNS root `.`.
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Builds a `Name` from the given labels, checking that the total
    /// wire form does not exceed 255 octets.
    pub fn from_labels(labels: Vec<Label>) -> Result<Self, Error> {
        let name = Self { labels };
        if name.wire_len() > MAX_WIRE_LEN {
            Err(Error::NameTooLong)
        } else {
            Ok(name)
        }
    }

    /// Returns the labels of this `Name`, leftmost first. The implicit
    /// null label of the root is not included.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Returns the number of (non-null) labels in this `Name`.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns whether the `Name` has no labels, i.e. whether it is the
    /// root.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the length of the uncompressed on-the-wire form of this
    /// `Name`, including the null terminator.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Returns the uncompressed on-the-wire form of this `Name`, with
    /// ASCII letters lowercased. This is the canonical form used for
    /// TSIG digests ([RFC 2845 § 3.4.2]).
    ///
    /// [RFC 2845 § 3.4.2]: https://datatracker.ietf.org/doc/html/rfc2845#section-3.4.2
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.wire_len());
        for label in &self.labels {
            wire.push(label.len() as u8);
            wire.extend(label.octets().iter().map(u8::to_ascii_lowercase));
        }
        wire.push(0);
        wire
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            f.write_str(".")
        } else {
            for label in &self.labels {
                write!(f, "{}.", label)?;
            }
            Ok(())
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Allows for conversion of a Rust [`str`] into a [`Name`]. The passed
/// string must be strictly ASCII. Escape sequences as defined by
/// [RFC 4343 § 2.1] are supported. A trailing dot is accepted but not
/// required: `alpha.arrowhead.org` and `alpha.arrowhead.org.` parse to
/// the same `Name`.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::StrEmpty);
        } else if s == "." {
            return Ok(Name::root());
        }

        let mut remaining_octets: &[u8] = s.as_ref();
        let mut labels = Vec::new();
        let mut current = Vec::new();

        // NOTE: to check that the string is ASCII, it suffices to check
        // that each octet is ASCII as we go. This is because all
        // multi-byte characters start with an octet that is not ASCII.
        while let Some(&octet) = remaining_octets.first() {
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                current.push(value);
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                labels.push(Label::try_from(std::mem::take(&mut current))?);
                remaining_octets = &remaining_octets[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                current.push(octet);
                remaining_octets = &remaining_octets[1..];
            }
        }

        // A trailing dot leaves current empty; anything else is the
        // final label.
        if !current.is_empty() {
            labels.push(Label::try_from(current)?);
        }
        Name::from_labels(labels)
    }
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    if remaining_octets.is_empty() {
        Err(Error::InvalidEscape)
    } else if remaining_octets[0].is_ascii_digit() {
        if remaining_octets.len() < 3
            || !remaining_octets[1].is_ascii_digit()
            || !remaining_octets[2].is_ascii_digit()
        {
            Err(Error::InvalidEscape)
        } else {
            let hundreds = (remaining_octets[0] - b'0') as usize;
            let tens = (remaining_octets[1] - b'0') as usize;
            let ones = (remaining_octets[2] - b'0') as usize;
            let value = 100 * hundreds + 10 * tens + ones;
            if value > 255 {
                Err(Error::InvalidEscape)
            } else {
                Ok((value as u8, 3))
            }
        }
    } else {
        Ok((remaining_octets[0], 1))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_root() {
        assert!(Name::root().is_root());
        assert_eq!(Name::root().wire_len(), 1);
        assert_eq!(Name::root().to_wire(), b"\x00");
    }

    #[test]
    fn fromstr_works() {
        let name: Name = "example.test.".parse().unwrap();
        assert_eq!(name.to_wire(), b"\x07example\x04test\x00");
    }

    #[test]
    fn fromstr_works_for_root() {
        let name: Name = ".".parse().unwrap();
        assert!(name.is_root());
    }

    #[test]
    fn fromstr_trailing_dot_is_idempotent() {
        let with: Name = "alpha.arrowhead.org.".parse().unwrap();
        let without: Name = "alpha.arrowhead.org".parse().unwrap();
        assert_eq!(with, without);
        assert_eq!(with.to_wire(), without.to_wire());
    }

    #[test]
    fn fromstr_rejects_empty() {
        assert_eq!("".parse::<Name>(), Err(Error::StrEmpty));
    }

    #[test]
    fn fromstr_rejects_non_ascii() {
        assert_eq!("✈.aero.".parse::<Name>(), Err(Error::StrNotAscii));
    }

    #[test]
    fn fromstr_rejects_null_non_terminal() {
        assert_eq!("a.b..c.".parse::<Name>(), Err(Error::EmptyNonTerminal));
    }

    #[test]
    fn fromstr_accepts_63_octet_label() {
        let label = "x".repeat(63);
        let name: Name = format!("{}.test.", label).parse().unwrap();
        assert_eq!(name.labels()[0].len(), 63);
    }

    #[test]
    fn fromstr_rejects_64_octet_label() {
        let label = "x".repeat(64);
        assert_eq!(
            format!("{}.test.", label).parse::<Name>(),
            Err(Error::LabelTooLong)
        );
    }

    #[test]
    fn fromstr_rejects_long_name() {
        let long = "x.".repeat(128);
        assert_eq!(long.parse::<Name>(), Err(Error::NameTooLong));
    }

    #[test]
    fn fromstr_escaping_works() {
        let escaped: Name = "mail\\.dns.arrowhead.org.".parse().unwrap();
        assert_eq!(escaped.labels()[0].octets(), b"mail.dns");
        assert_eq!(escaped.to_wire(), b"\x08mail.dns\x09arrowhead\x03org\x00");

        let decimal: Name = "\\000.\\\\\\..".parse().unwrap();
        assert_eq!(decimal.to_wire(), b"\x01\x00\x02\\.\x00");
    }

    #[test]
    fn fromstr_rejects_invalid_escapes() {
        assert_eq!("\\00".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\00x.".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\256.".parse::<Name>(), Err(Error::InvalidEscape));
    }

    #[test]
    fn display_round_trips_escapes() {
        let name: Name = "mail\\.dns.arrowhead.org.".parse().unwrap();
        assert_eq!(name.to_string(), "mail\\.dns.arrowhead.org.");
        let reparsed: Name = name.to_string().parse().unwrap();
        assert_eq!(name, reparsed);
    }

    #[test]
    fn comparison_is_case_insensitive() {
        let upper: Name = "ALPHA.Arrowhead.ORG.".parse().unwrap();
        let lower: Name = "alpha.arrowhead.org.".parse().unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn to_wire_lowercases() {
        let name: Name = "Alpha.Arrowhead.Org.".parse().unwrap();
        assert_eq!(name.to_wire(), b"\x05alpha\x09arrowhead\x03org\x00");
    }
}
