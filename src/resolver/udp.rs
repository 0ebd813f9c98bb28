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

//! The UDP transport of the resolver socket.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::message::Message;
use crate::wire::{Writer, MAX_UDP_MESSAGE};

use super::worker::{Event, SendOutcome};
use super::{Error, ErrorKind};

////////////////////////////////////////////////////////////////////////
// UDP TRANSPORT                                                      //
////////////////////////////////////////////////////////////////////////

/// A datagram endpoint talking to one server address.
///
/// Opening binds an unbound socket of the server's address family and
/// spawns a receive task that decodes every datagram from the server
/// into a [`Message`] and forwards it to the worker as an event. The
/// scratch encode buffer is owned by the transport and reused across
/// sends; a request that does not fit the 512-octet datagram limit is
/// reported as [`SendOutcome::Overflow`] for the worker to hand over
/// to TCP.
pub(super) struct UdpTransport {
    server: SocketAddr,
    socket: Option<Arc<UdpSocket>>,
    receiver: Option<JoinHandle<()>>,
    scratch: Box<[u8]>,
}

impl UdpTransport {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            socket: None,
            receiver: None,
            scratch: vec![0; MAX_UDP_MESSAGE].into_boxed_slice(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Binds the socket and starts the receive task. Emits
    /// [`Event::Opened`] on success.
    pub async fn open(&mut self, events: &mpsc::UnboundedSender<Event>) -> Result<(), Error> {
        let local: SocketAddr = if self.server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = Arc::new(UdpSocket::bind(local).await.map_err(Error::io)?);
        debug!("udp: bound for {}", self.server);

        self.socket = Some(socket.clone());
        self.receiver = Some(tokio::spawn(receive_loop(
            socket,
            self.server,
            events.clone(),
        )));
        let _ = events.send(Event::Opened);
        Ok(())
    }

    /// Encodes and transmits one request.
    pub async fn send(&mut self, request: &Message) -> SendOutcome {
        let mut writer = Writer::new(&mut self.scratch);
        request.write(&mut writer);
        if writer.overflowed() {
            return SendOutcome::Overflow {
                size: request.encoded_len(),
            };
        }
        let len = writer.offset();
        let socket = match &self.socket {
            Some(socket) => socket,
            None => return SendOutcome::Failed(Error::other("transport is not open")),
        };
        match socket.send_to(&self.scratch[..len], self.server).await {
            Ok(_) => SendOutcome::Sent,
            Err(e) => SendOutcome::Failed(Error::io(e)),
        }
    }

    /// Ends the receive task and drops the socket.
    pub fn close(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
        if self.socket.take().is_some() {
            debug!("udp: closed");
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Receives datagrams until the socket fails or the worker goes away.
async fn receive_loop(
    socket: Arc<UdpSocket>,
    server: SocketAddr,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut buf = vec![0u8; MAX_UDP_MESSAGE];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                if from != server {
                    warn!("udp: dropping datagram from unexpected source {}", from);
                    continue;
                }
                match Message::read(&buf[..len]) {
                    Ok(message) => {
                        if events.send(Event::Response(message)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        // A datagram that does not decode takes down
                        // every task outstanding on this transport.
                        let _ = events.send(Event::Error(Error::with_cause(
                            ErrorKind::ResponseMalformed,
                            e,
                        )));
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = events.send(Event::Error(Error::io(e)));
                return;
            }
        }
    }
}
