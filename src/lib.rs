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

//! A DNS toolkit for service registration and discovery.
//!
//! `quiver` provides the DNS plumbing a service-registry client needs
//! to talk to a DNS-SD-capable name server:
//!
//! * the binary message codec of [RFC 1035] — messages, resource
//!   records, domain names with compression-pointer decoding, and
//!   typed RDATA for the record types service discovery traffics in
//!   ([`message`], [`rr`], [`name`], [`wire`]);
//! * dynamic updates per [RFC 2136], built with
//!   [`message::UpdateBuilder`] and authenticated with the TSIG
//!   transaction signatures of [RFC 2845] ([`message::tsig`]); and
//! * a [`resolver::ResolverSocket`] that multiplexes requests to one
//!   server across a UDP and a TCP transport, with retries,
//!   truncation fallback, and idle connection teardown.
//!
//! What it deliberately does not do: recursion, answer caching, DNSSEC
//! validation, zone files, or authoritative serving.
//!
//! [RFC 1035]: https://datatracker.ietf.org/doc/html/rfc1035
//! [RFC 2136]: https://datatracker.ietf.org/doc/html/rfc2136
//! [RFC 2845]: https://datatracker.ietf.org/doc/html/rfc2845

pub mod class;
pub mod message;
pub mod name;
pub mod resolver;
pub mod rr;
pub mod wire;

mod util;
