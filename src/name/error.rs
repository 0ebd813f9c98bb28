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

//! Implementation of the error type for domain name processing.

use std::fmt;

/// Errors that arise when constructing or parsing a domain name.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// An escape sequence in a textual domain name is invalid.
    InvalidEscape,

    /// A label exceeds 63 octets.
    LabelTooLong,

    /// The uncompressed wire form of the name exceeds 255 octets.
    NameTooLong,

    /// A textual domain name contains an empty interior label (e.g.
    /// `a..b.`).
    EmptyNonTerminal,

    /// A textual domain name is the empty string.
    StrEmpty,

    /// A textual domain name contains non-ASCII characters.
    StrNotAscii,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidEscape => f.write_str("invalid escape sequence"),
            Self::LabelTooLong => f.write_str("label exceeds 63 octets"),
            Self::NameTooLong => f.write_str("name exceeds 255 octets"),
            Self::EmptyNonTerminal => f.write_str("empty non-terminal label"),
            Self::StrEmpty => f.write_str("domain name is empty"),
            Self::StrNotAscii => f.write_str("domain name is not ASCII"),
        }
    }
}

impl std::error::Error for Error {}
