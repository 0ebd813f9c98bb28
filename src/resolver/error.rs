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

//! The error type of the resolver socket.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::message::TsigError;

////////////////////////////////////////////////////////////////////////
// ERROR KINDS                                                        //
////////////////////////////////////////////////////////////////////////

/// The failure classes a request submitted to a
/// [`ResolverSocket`](super::ResolverSocket) can settle with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// A request with the same message ID is already in flight on the
    /// same transport.
    RequestIdInUse,

    /// The encoded request exceeds what both transports can carry.
    RequestTooLong,

    /// The request timed out after exhausting its retries, or the
    /// transport reported an idle timeout.
    RequestUnanswered,

    /// A decoded response did not match any in-flight request. Never
    /// user-facing; reported through the `on_ignored_error` hook.
    ResponseIdUnexpected,

    /// Received octets did not decode as a DNS message.
    ResponseMalformed,

    /// TSIG verification failed: the MAC did not check out.
    TsigBadSig,

    /// TSIG verification failed: unknown key or algorithm.
    TsigBadKey,

    /// TSIG verification failed: the time signed is outside the fudge.
    TsigBadTime,

    /// An underlying I/O error.
    Other,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::RequestIdInUse => "request ID already in use",
            Self::RequestTooLong => "request too long for any transport",
            Self::RequestUnanswered => "request unanswered",
            Self::ResponseIdUnexpected => "response ID matches no request",
            Self::ResponseMalformed => "response malformed",
            Self::TsigBadSig => "TSIG signature verification failed",
            Self::TsigBadKey => "TSIG key unknown",
            Self::TsigBadTime => "TSIG time outside fudge",
            Self::Other => "resolver error",
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error produced by the resolver socket.
///
/// Errors are cheaply cloneable so that one transport failure can
/// settle every task bound to the transport.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates an error of the given kind with no underlying cause.
    pub(super) fn new(kind: ErrorKind) -> Self {
        Self { kind, cause: None }
    }

    /// Creates an error of the given kind wrapping an underlying
    /// cause.
    pub(super) fn with_cause<E>(kind: ErrorKind, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            cause: Some(Arc::new(cause)),
        }
    }

    /// Wraps an I/O error.
    pub(super) fn io(cause: io::Error) -> Self {
        Self::with_cause(ErrorKind::Other, cause)
    }

    /// Creates an [`ErrorKind::Other`] error with a plain message.
    pub(super) fn other(message: &'static str) -> Self {
        Self::with_cause(ErrorKind::Other, io::Error::new(io::ErrorKind::Other, message))
    }

    /// Returns the failure class.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.kind.as_str(), cause),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<TsigError> for Error {
    fn from(err: TsigError) -> Self {
        Self::new(match err {
            TsigError::BadSig => ErrorKind::TsigBadSig,
            TsigError::BadKey => ErrorKind::TsigBadKey,
            TsigError::BadTime => ErrorKind::TsigBadTime,
        })
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
