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

//! The TCP transport of the resolver socket.
//!
//! Messages over TCP are framed with a two-octet big-endian length
//! prefix ([RFC 1035 § 4.2.2]). The receive side is a two-state
//! parser: accumulate two octets of length, accumulate that many
//! octets of body, decode, repeat; octets trailing a frame in the same
//! read re-enter the parser immediately.
//!
//! [RFC 1035 § 4.2.2]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.2.2

use std::net::SocketAddr;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::message::Message;
use crate::wire::{Writer, MAX_TCP_MESSAGE};

use super::worker::{Event, SendOutcome};
use super::{Error, ErrorKind};

/// The length prefix plus the largest framable message.
const SCRATCH_LEN: usize = 2 + MAX_TCP_MESSAGE;

////////////////////////////////////////////////////////////////////////
// TCP TRANSPORT                                                      //
////////////////////////////////////////////////////////////////////////

/// A stream endpoint talking to one server address.
///
/// Opening connects (bounded by the configured timeout) and spawns a
/// receive task; the write half stays with the transport for sends.
/// Requests are encoded at offset 2 of the transport's scratch buffer
/// and the length prefix is filled in at offset 0, so each send is a
/// single vectored write of the framed message.
pub(super) struct TcpTransport {
    server: SocketAddr,
    timeout: Duration,
    writer: Option<OwnedWriteHalf>,
    receiver: Option<JoinHandle<()>>,
    scratch: Box<[u8]>,
}

impl TcpTransport {
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        Self {
            server,
            timeout,
            writer: None,
            receiver: None,
            scratch: vec![0; SCRATCH_LEN].into_boxed_slice(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Connects and starts the receive task. Emits [`Event::Opened`]
    /// on success.
    pub async fn open(&mut self, events: &mpsc::UnboundedSender<Event>) -> Result<(), Error> {
        let stream = match timeout(self.timeout, TcpStream::connect(self.server)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(Error::io(e)),
            Err(_) => return Err(Error::other("connect timed out")),
        };
        debug!("tcp: connected to {}", self.server);

        let (read_half, write_half) = stream.into_split();
        self.writer = Some(write_half);
        self.receiver = Some(tokio::spawn(receive_loop(
            read_half,
            self.timeout,
            events.clone(),
        )));
        let _ = events.send(Event::Opened);
        Ok(())
    }

    /// Encodes, frames, and transmits one request.
    pub async fn send(&mut self, request: &Message) -> SendOutcome {
        let mut writer = Writer::new(&mut self.scratch[2..]);
        request.write(&mut writer);
        if writer.overflowed() {
            return SendOutcome::Overflow {
                size: request.encoded_len(),
            };
        }
        let len = writer.offset();
        self.scratch[..2].copy_from_slice(&(len as u16).to_be_bytes());
        let stream = match &mut self.writer {
            Some(stream) => stream,
            None => return SendOutcome::Failed(Error::other("transport is not open")),
        };
        match stream.write_all(&self.scratch[..2 + len]).await {
            Ok(()) => SendOutcome::Sent,
            Err(e) => SendOutcome::Failed(Error::io(e)),
        }
    }

    /// Ends the receive task and shuts the stream down.
    pub fn close(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
        if self.writer.take().is_some() {
            debug!("tcp: closed");
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

////////////////////////////////////////////////////////////////////////
// RECEIVING                                                          //
////////////////////////////////////////////////////////////////////////

/// Reads frames until the server closes the stream, the connection
/// idles past the timeout, or a frame fails to decode.
async fn receive_loop(
    mut stream: OwnedReadHalf,
    idle: Duration,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = vec![0u8; 4096];
    loop {
        let read = match timeout(idle, stream.read(&mut buf)).await {
            // Socket-level inactivity is reported distinctly from
            // request timeouts.
            Err(_) => {
                let _ = events.send(Event::Timeout);
                return;
            }
            Ok(Ok(0)) => {
                let _ = events.send(Event::Closed { graceful: true });
                return;
            }
            Ok(Ok(read)) => read,
            Ok(Err(e)) => {
                let _ = events.send(Event::Error(Error::io(e)));
                return;
            }
        };
        pending.extend_from_slice(&buf[..read]);

        // Drain every complete frame the chunk produced.
        loop {
            if pending.len() < 2 {
                break;
            }
            let body = usize::from(u16::from_be_bytes([pending[0], pending[1]]));
            if pending.len() < 2 + body {
                break;
            }
            match Message::read(&pending[2..2 + body]) {
                Ok(message) => {
                    if events.send(Event::Response(message)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    // A frame that does not decode destroys the
                    // connection.
                    let _ = events.send(Event::Error(Error::with_cause(
                        ErrorKind::ResponseMalformed,
                        e,
                    )));
                    return;
                }
            }
            pending.drain(..2 + body);
        }
    }
}
