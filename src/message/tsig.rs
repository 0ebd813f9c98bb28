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

//! Secret Key Transaction Authentication for DNS (TSIG), as specified
//! by [RFC 2845].
//!
//! A [`TsigSigner`] holds the key material and parameters shared with
//! the server. Its [`sign`](TsigSigner::sign) method computes the MAC
//! over a serialized message and returns the TSIG pseudo-RR to append
//! to the additional section; [`Message::write`] calls it
//! automatically for UPDATE messages when a signer is attached. The
//! [`verify`](TsigSigner::verify) method checks a received TSIG RR
//! against the same key.
//!
//! The default algorithm is the legacy `hmac-md5.sig-alg.reg.int` of
//! [RFC 2845 § 6]; the HMAC-SHA family is also supported. Modern
//! deployments should prefer `hmac-sha256.`.
//!
//! [RFC 2845]: https://datatracker.ietf.org/doc/html/rfc2845
//! [RFC 2845 § 6]: https://datatracker.ietf.org/doc/html/rfc2845#section-6
//! [`Message::write`]: super::Message::write

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::digest::{MacError, OutputSizeUser};
use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::class::Class;
use crate::name::Name;
use crate::rr::rdata::Tsig;
use crate::rr::{Record, Type};

use super::ExtendedRcode;

/// The default fudge, in seconds ([RFC 2845 § 6]).
///
/// [RFC 2845 § 6]: https://datatracker.ietf.org/doc/html/rfc2845#section-6
const DEFAULT_FUDGE: u16 = 300;

/// The "time signed" field is 48 bits on the wire.
const TIME_SIGNED_MASK: u64 = (1 << 48) - 1;

////////////////////////////////////////////////////////////////////////
// TSIG ALGORITHMS                                                    //
////////////////////////////////////////////////////////////////////////

lazy_static! {
    static ref HMAC_MD5_NAME: Name = "hmac-md5.sig-alg.reg.int.".parse().unwrap();
    static ref HMAC_SHA1_NAME: Name = "hmac-sha1.".parse().unwrap();
    static ref HMAC_SHA224_NAME: Name = "hmac-sha224.".parse().unwrap();
    static ref HMAC_SHA256_NAME: Name = "hmac-sha256.".parse().unwrap();
    static ref HMAC_SHA384_NAME: Name = "hmac-sha384.".parse().unwrap();
    static ref HMAC_SHA512_NAME: Name = "hmac-sha512.".parse().unwrap();
    static ref ALGORITHMS_BY_NAME: HashMap<&'static Name, Algorithm> = HashMap::from([
        (&*HMAC_MD5_NAME, Algorithm::HmacMd5),
        (&*HMAC_SHA1_NAME, Algorithm::HmacSha1),
        (&*HMAC_SHA224_NAME, Algorithm::HmacSha224),
        (&*HMAC_SHA256_NAME, Algorithm::HmacSha256),
        (&*HMAC_SHA384_NAME, Algorithm::HmacSha384),
        (&*HMAC_SHA512_NAME, Algorithm::HmacSha512),
    ]);
}

/// A supported TSIG algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Algorithm {
    HmacMd5,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl Algorithm {
    /// Returns the name assigned to identify this algorithm.
    pub fn name(&self) -> &'static Name {
        match self {
            Self::HmacMd5 => &HMAC_MD5_NAME,
            Self::HmacSha1 => &HMAC_SHA1_NAME,
            Self::HmacSha224 => &HMAC_SHA224_NAME,
            Self::HmacSha256 => &HMAC_SHA256_NAME,
            Self::HmacSha384 => &HMAC_SHA384_NAME,
            Self::HmacSha512 => &HMAC_SHA512_NAME,
        }
    }

    /// Returns the size of the MAC produced by this algorithm.
    pub fn output_size(&self) -> usize {
        match self {
            Self::HmacMd5 => Hmac::<Md5>::output_size(),
            Self::HmacSha1 => Hmac::<Sha1>::output_size(),
            Self::HmacSha224 => Hmac::<Sha224>::output_size(),
            Self::HmacSha256 => Hmac::<Sha256>::output_size(),
            Self::HmacSha384 => Hmac::<Sha384>::output_size(),
            Self::HmacSha512 => Hmac::<Sha512>::output_size(),
        }
    }

    /// Finds an algorithm by its name. Matching is case-insensitive on
    /// the canonical form. This returns `None` if the algorithm is not
    /// defined or not supported by this implementation.
    pub fn from_name(name: &Name) -> Option<Self> {
        ALGORITHMS_BY_NAME.get(name).copied()
    }

    /// Creates a MAC authenticator to compute a MAC with this algorithm
    /// and the given key.
    fn make_authenticator(&self, key: &[u8]) -> Box<dyn Authenticator> {
        // new_from_slice accepts keys of any length for HMAC, so the
        // unwraps cannot fail.
        match self {
            Self::HmacMd5 => Box::new(Hmac::<Md5>::new_from_slice(key).unwrap()),
            Self::HmacSha1 => Box::new(Hmac::<Sha1>::new_from_slice(key).unwrap()),
            Self::HmacSha224 => Box::new(Hmac::<Sha224>::new_from_slice(key).unwrap()),
            Self::HmacSha256 => Box::new(Hmac::<Sha256>::new_from_slice(key).unwrap()),
            Self::HmacSha384 => Box::new(Hmac::<Sha384>::new_from_slice(key).unwrap()),
            Self::HmacSha512 => Box::new(Hmac::<Sha512>::new_from_slice(key).unwrap()),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// MAC COMPUTATION HELPERS                                            //
////////////////////////////////////////////////////////////////////////

/// An abstraction over different MAC implementations. Basically, this
/// wraps the `digest` crate's [`Mac`] trait to give us an object-safe
/// trait (so that we can use `Box<dyn Authenticator>`).
trait Authenticator {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
    fn verify(self: Box<Self>, tag: &[u8]) -> Result<(), MacError>;
}

impl<M> Authenticator for M
where
    M: Mac,
{
    fn update(&mut self, data: &[u8]) {
        <Self as Mac>::update(self, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        <Self as Mac>::finalize(*self).into_bytes().to_vec()
    }

    fn verify(self: Box<Self>, tag: &[u8]) -> Result<(), MacError> {
        <Self as Mac>::verify_slice(*self, tag)
    }
}

/// Adds the TSIG variables specified by [RFC 2845 § 3.4.2] to a MAC:
/// the canonical key name, class ANY, TTL zero, the algorithm name,
/// the timers, the error, and the other data.
///
/// [RFC 2845 § 3.4.2]: https://datatracker.ietf.org/doc/html/rfc2845#section-3.4.2
fn add_tsig_variables(
    authenticator: &mut dyn Authenticator,
    key_name: &Name,
    algorithm: &Name,
    time_signed: u64,
    fudge: u16,
    error: ExtendedRcode,
    other: &[u8],
) {
    authenticator.update(&key_name.to_wire());
    authenticator.update(b"\x00\xff\x00\x00\x00\x00");
    authenticator.update(&algorithm.to_wire());
    authenticator.update(&time_signed.to_be_bytes()[2..]);
    authenticator.update(&fudge.to_be_bytes());
    authenticator.update(&u16::from(error).to_be_bytes());
    authenticator.update(&(other.len() as u16).to_be_bytes());
    authenticator.update(other);
}

////////////////////////////////////////////////////////////////////////
// TSIG SIGNER                                                        //
////////////////////////////////////////////////////////////////////////

/// The key material and parameters for signing and verifying messages
/// with TSIG.
///
/// A signer is configured with the key name and shared secret, and
/// optionally a non-default algorithm, fudge, or a fixed signing time
/// (the system clock is sampled at each signing otherwise; fixing the
/// time is chiefly for tests and replay scenarios).
#[derive(Clone)]
pub struct TsigSigner {
    key_name: Name,
    secret: Vec<u8>,
    algorithm: Algorithm,
    fudge: u16,
    time_signed: Option<u64>,
}

impl TsigSigner {
    /// Creates a signer for the given key, with the default algorithm
    /// ([`Algorithm::HmacMd5`]) and fudge (300 seconds).
    pub fn new(key_name: Name, secret: Vec<u8>) -> Self {
        Self {
            key_name,
            secret,
            algorithm: Algorithm::HmacMd5,
            fudge: DEFAULT_FUDGE,
            time_signed: None,
        }
    }

    /// Replaces the algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Replaces the fudge.
    pub fn with_fudge(mut self, fudge: u16) -> Self {
        self.fudge = fudge;
        self
    }

    /// Fixes the "time signed" field instead of sampling the system
    /// clock at each signing.
    pub fn with_time_signed(mut self, time_signed: u64) -> Self {
        self.time_signed = Some(time_signed);
        self
    }

    /// Returns the key name.
    pub fn key_name(&self) -> &Name {
        &self.key_name
    }

    /// Returns the algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The "time signed" value for a signing happening now.
    fn time_signed(&self) -> u64 {
        let time = self.time_signed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });
        time & TIME_SIGNED_MASK
    }

    /// Signs a serialized message, returning the TSIG RR to append.
    ///
    /// The passed buffer must hold the complete message *without* the
    /// TSIG RR — in particular, with an ARCOUNT that does not include
    /// it. The caller appends the returned RR and increments the
    /// ARCOUNT afterwards, as [RFC 2845 § 3.4.1] prescribes;
    /// [`Message::write`](super::Message::write) does both when a
    /// signer is attached.
    pub fn sign(&self, original_id: u16, message: &[u8]) -> Record {
        let time_signed = self.time_signed();
        let mut authenticator = self.algorithm.make_authenticator(&self.secret);
        authenticator.update(message);
        add_tsig_variables(
            authenticator.as_mut(),
            &self.key_name,
            self.algorithm.name(),
            time_signed,
            self.fudge,
            ExtendedRcode::NOERROR,
            &[],
        );
        let mac = authenticator.finalize();
        Record::new(
            self.key_name.clone(),
            Type::TSIG,
            Class::ANY,
            0,
            crate::rr::Rdata::Tsig(Tsig {
                algorithm: self.algorithm.name().clone(),
                time_signed,
                fudge: self.fudge,
                mac,
                original_id,
                error: ExtendedRcode::NOERROR,
                other: Vec::new(),
            }),
        )
    }

    /// Verifies a received TSIG RR against this signer's key.
    ///
    /// The passed buffer must hold the message octets the MAC covers:
    /// everything up to, but not including, the TSIG RR, with the
    /// ARCOUNT not counting it. `now` is the verifier's clock in
    /// seconds since the Unix epoch.
    ///
    /// Checks run in the order prescribed by [RFC 2845 § 4.5]: the key
    /// and algorithm names first ([`TsigError::BadKey`]), then the MAC
    /// ([`TsigError::BadSig`]), then the timers
    /// ([`TsigError::BadTime`]).
    ///
    /// [RFC 2845 § 4.5]: https://datatracker.ietf.org/doc/html/rfc2845#section-4.5
    pub fn verify(&self, message: &[u8], record: &Record, now: u64) -> Result<(), TsigError> {
        let tsig = match (record.rr_type, &record.rdata) {
            (Type::TSIG, Some(crate::rr::Rdata::Tsig(tsig))) => tsig,
            _ => return Err(TsigError::BadKey),
        };
        if record.name != self.key_name {
            return Err(TsigError::BadKey);
        }
        match Algorithm::from_name(&tsig.algorithm) {
            Some(algorithm) if algorithm == self.algorithm => (),
            _ => return Err(TsigError::BadKey),
        }

        let mut authenticator = self.algorithm.make_authenticator(&self.secret);
        authenticator.update(message);
        add_tsig_variables(
            authenticator.as_mut(),
            &self.key_name,
            &tsig.algorithm,
            tsig.time_signed,
            tsig.fudge,
            tsig.error,
            &tsig.other,
        );
        authenticator
            .verify(&tsig.mac)
            .or(Err(TsigError::BadSig))?;

        let skew = now.abs_diff(tsig.time_signed);
        if skew > u64::from(tsig.fudge) {
            return Err(TsigError::BadTime);
        }
        Ok(())
    }

    /// Returns the number of octets the TSIG RR produced by
    /// [`TsigSigner::sign`] occupies on the wire.
    pub(crate) fn record_len(&self) -> usize {
        // Name + type/class/TTL/RDLENGTH + RDATA (algorithm, timers,
        // MAC length and MAC, original ID, error, other length).
        self.key_name.wire_len()
            + 10
            + self.algorithm.name().wire_len()
            + 16
            + self.algorithm.output_size()
    }
}

/// The secret is deliberately left out of the debug output.
impl fmt::Debug for TsigSigner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TsigSigner")
            .field("key_name", &self.key_name)
            .field("algorithm", &self.algorithm)
            .field("fudge", &self.fudge)
            .field("time_signed", &self.time_signed)
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors that arise during TSIG verification.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum TsigError {
    /// MAC verification failed.
    BadSig,

    /// The key or algorithm does not match, or the record is not a
    /// well-formed TSIG RR.
    BadKey,

    /// The time signed deviates from the local clock by more than the
    /// fudge.
    BadTime,
}

impl TsigError {
    /// Returns the extended RCODE assigned to this outcome by
    /// [RFC 2845 § 1.7].
    ///
    /// [RFC 2845 § 1.7]: https://datatracker.ietf.org/doc/html/rfc2845#section-1.7
    pub fn rcode(&self) -> ExtendedRcode {
        match self {
            Self::BadSig => ExtendedRcode::BADSIG,
            Self::BadKey => ExtendedRcode::BADKEY,
            Self::BadTime => ExtendedRcode::BADTIME,
        }
    }
}

impl fmt::Display for TsigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadSig => f.write_str("BADSIG"),
            Self::BadKey => f.write_str("BADKEY"),
            Self::BadTime => f.write_str("BADTIME"),
        }
    }
}

impl std::error::Error for TsigError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
