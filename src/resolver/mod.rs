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

//! The resolver socket: a dual-transport DNS request multiplexer.
//!
//! A [`ResolverSocket`] speaks to one configured server over UDP and
//! TCP at once. Each transport is driven by its own worker task;
//! submitting a message selects a transport by opcode and
//! encoded size, and the returned future settles when a response with
//! a matching ID arrives, retries are exhausted, or the transport
//! fails. Requests that outgrow UDP — by size up front, or by a
//! truncated response after the fact — migrate to TCP transparently.
//!
//! The socket also carries the thin typed query helpers the
//! service-discovery layer is built on: [`ResolverSocket::resolve_ptr`]
//! and friends issue a single-question query and pick the matching
//! RDATA out of the answer section.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};

use crate::class::Class;
use crate::message::{Message, Opcode};
use crate::name::{Label, Name};
use crate::rr::rdata::Srv;
use crate::rr::{Rdata, Record, Type};
use crate::wire::{MAX_TCP_MESSAGE, MAX_UDP_MESSAGE};

mod error;
mod task;
mod tcp;
mod udp;
mod worker;
pub use error::{Error, ErrorKind};

use task::Task;
use tcp::TcpTransport;
use udp::UdpTransport;
use worker::{Command, Transport, Worker};

/// The default server port.
const DEFAULT_PORT: u16 = 53;

/// How long an idle transport is kept open, by default.
const DEFAULT_KEEP_OPEN: Duration = Duration::from_millis(3000);

/// How long a request may stay unanswered, by default.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10000);

/// How many times an unanswered UDP request is retransmitted.
const UDP_RETRIES: u8 = 2;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION                                                      //
////////////////////////////////////////////////////////////////////////

/// Configuration for a [`ResolverSocket`].
///
/// The server address must be an IPv4 or IPv6 literal; resolving
/// hostnames is not this crate's business, so they are rejected at
/// construction.
pub struct ResolverConfig {
    server: IpAddr,
    port: u16,
    keep_open: Duration,
    timeout: Duration,
    on_ignored_error: Option<Arc<dyn Fn(&Error) + Send + Sync>>,
}

impl ResolverConfig {
    /// Creates a configuration for the given server address literal
    /// with all other settings at their defaults.
    pub fn new(address: &str) -> Result<Self, std::net::AddrParseError> {
        Ok(Self {
            server: address.parse()?,
            port: DEFAULT_PORT,
            keep_open: DEFAULT_KEEP_OPEN,
            timeout: DEFAULT_TIMEOUT,
            on_ignored_error: None,
        })
    }

    /// Replaces the server port (default 53).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replaces how long an idle transport stays open (default 3
    /// seconds).
    pub fn keep_open(mut self, keep_open: Duration) -> Self {
        self.keep_open = keep_open;
        self
    }

    /// Replaces the request timeout (default 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Installs a hook for errors that cannot be attributed to any
    /// request, such as a response whose ID matches nothing in flight.
    /// The default hook logs them at warn level.
    pub fn on_ignored_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_ignored_error = Some(Arc::new(hook));
        self
    }
}

////////////////////////////////////////////////////////////////////////
// RESOLVER SOCKET                                                    //
////////////////////////////////////////////////////////////////////////

/// A dual-transport DNS request multiplexer bound to one server.
///
/// Dropping the socket (or calling [`ResolverSocket::close`]) tears
/// both workers down and rejects everything outstanding.
///
/// This type must be created within a Tokio runtime, since it spawns
/// the worker tasks.
pub struct ResolverSocket {
    udp: mpsc::UnboundedSender<Command>,
    tcp: mpsc::UnboundedSender<Command>,
}

impl ResolverSocket {
    /// Creates the socket and spawns its two transport workers.
    pub fn new(config: ResolverConfig) -> Self {
        let server = SocketAddr::new(config.server, config.port);
        let ignored = config
            .on_ignored_error
            .unwrap_or_else(|| Arc::new(|e: &Error| warn!("ignoring resolver event: {}", e)));

        let tcp = Worker::spawn(
            "tcp",
            Transport::Tcp(TcpTransport::new(server, config.timeout)),
            None,
            ignored.clone(),
            config.timeout,
            config.keep_open,
        );
        let udp = Worker::spawn(
            "udp",
            Transport::Udp(UdpTransport::new(server)),
            Some(tcp.clone()),
            ignored,
            config.timeout,
            config.keep_open,
        );
        Self { udp, tcp }
    }

    /// Submits a request and awaits its response.
    ///
    /// The transport is selected by the request itself: UPDATE
    /// messages go over TCP; anything else goes over UDP with two
    /// retries when it fits a datagram, over TCP when it fits a
    /// stream frame, and fails with [`ErrorKind::RequestTooLong`]
    /// otherwise.
    pub async fn send(&self, request: Message) -> Result<Message, Error> {
        let (responder, settled) = oneshot::channel();
        self.submit(request, responder)?;
        settled
            .await
            .unwrap_or_else(|_| Err(Error::other("resolver socket closed")))
    }

    /// Submits every message, then awaits them all; each entry settles
    /// independently. The fan-out happens before the first await, so
    /// the requests travel concurrently.
    pub async fn send_all(&self, requests: Vec<Message>) -> Vec<Result<Message, Error>> {
        let pending: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let (responder, settled) = oneshot::channel();
                self.submit(request, responder).map(|()| settled)
            })
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for entry in pending {
            results.push(match entry {
                Ok(settled) => settled
                    .await
                    .unwrap_or_else(|_| Err(Error::other("resolver socket closed"))),
                Err(e) => Err(e),
            });
        }
        results
    }

    /// Tears both transports down. Outstanding requests are rejected.
    pub fn close(&self) {
        let _ = self.udp.send(Command::Close);
        let _ = self.tcp.send(Command::Close);
    }

    /// Routes a request to a worker.
    fn submit(
        &self,
        request: Message,
        responder: oneshot::Sender<Result<Message, Error>>,
    ) -> Result<(), Error> {
        let (queue, retries) = if request.flags.opcode == Opcode::UPDATE {
            (&self.tcp, 0)
        } else {
            let size = request.encoded_len();
            if size <= MAX_UDP_MESSAGE {
                (&self.udp, UDP_RETRIES)
            } else if size <= MAX_TCP_MESSAGE {
                (&self.tcp, 0)
            } else {
                return Err(Error::new(ErrorKind::RequestTooLong));
            }
        };
        queue
            .send(Command::Enqueue(Task::new(request, responder, retries)))
            .map_err(|_| Error::other("resolver socket closed"))
    }

    ////////////////////////////////////////////////////////////////////
    // QUERY HELPERS                                                  //
    ////////////////////////////////////////////////////////////////////

    /// Queries for the PTR records at `name` and returns their
    /// targets. This is the browse primitive of DNS-SD.
    pub async fn resolve_ptr(&self, name: Name) -> Result<Vec<Name>, Error> {
        let response = self.query(name, Type::PTR).await?;
        Ok(answers(response, |rdata| match rdata {
            Rdata::Ptr(target) => Some(target),
            _ => None,
        }))
    }

    /// Queries for the SRV records at `name`.
    pub async fn resolve_srv(&self, name: Name) -> Result<Vec<Srv>, Error> {
        let response = self.query(name, Type::SRV).await?;
        Ok(answers(response, |rdata| match rdata {
            Rdata::Srv(srv) => Some(srv),
            _ => None,
        }))
    }

    /// Queries for the TXT records at `name` and returns their
    /// character strings, in answer order.
    pub async fn resolve_txt(&self, name: Name) -> Result<Vec<Vec<u8>>, Error> {
        let response = self.query(name, Type::TXT).await?;
        let mut strings = Vec::new();
        for record in response.answers {
            if let Some(Rdata::Txt(mut texts)) = record.rdata {
                strings.append(&mut texts);
            }
        }
        Ok(strings)
    }

    /// Looks up the names an address reverse-maps to, via the
    /// `in-addr.arpa.` or `ip6.arpa.` tree ([RFC 1035 § 3.5],
    /// [RFC 3596 § 2.5]).
    ///
    /// [RFC 1035 § 3.5]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.5
    /// [RFC 3596 § 2.5]: https://datatracker.ietf.org/doc/html/rfc3596#section-2.5
    pub async fn reverse(&self, address: IpAddr) -> Result<Vec<Name>, Error> {
        self.resolve_ptr(reverse_name(address)).await
    }

    /// Issues a single-question recursion-desired query with a random
    /// ID.
    async fn query(&self, name: Name, rr_type: Type) -> Result<Message, Error> {
        let mut request = Message::query(
            rand::thread_rng().gen(),
            Record::question(name, rr_type, Class::IN),
        );
        request.flags.rd = true;
        self.send(request).await
    }
}

impl Drop for ResolverSocket {
    fn drop(&mut self) {
        self.close();
    }
}

/// Extracts the matching RDATA values from a response's answer
/// section.
fn answers<T>(response: Message, select: impl Fn(Rdata) -> Option<T>) -> Vec<T> {
    response
        .answers
        .into_iter()
        .filter_map(|record| record.rdata.and_then(&select))
        .collect()
}

/// Builds the reverse-lookup name for an address.
fn reverse_name(address: IpAddr) -> Name {
    fn label(text: String) -> Label {
        // Reverse-map labels are short ASCII, so the conversion cannot
        // fail.
        Label::try_from(text.into_bytes()).unwrap()
    }

    let mut labels = Vec::new();
    match address {
        IpAddr::V4(v4) => {
            for octet in v4.octets().iter().rev() {
                labels.push(label(octet.to_string()));
            }
            labels.push(label("in-addr".to_string()));
        }
        IpAddr::V6(v6) => {
            for octet in v6.octets().iter().rev() {
                labels.push(label(format!("{:x}", octet & 0xf)));
                labels.push(label(format!("{:x}", octet >> 4)));
            }
            labels.push(label("ip6".to_string()));
        }
    }
    labels.push(label("arpa".to_string()));
    // Well under the wire-length limit for either family.
    Name::from_labels(labels).unwrap()
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, UdpSocket};

    use super::*;

    fn ptr_answer(request: &Message, target: &str) -> Message {
        let mut response = Message::new(request.id);
        response.flags.qr = true;
        response.questions = request.questions.clone();
        response.answers.push(Record::new(
            request.questions[0].name.clone(),
            Type::PTR,
            Class::IN,
            120,
            Rdata::Ptr(target.parse().unwrap()),
        ));
        response
    }

    fn socket_for(port: u16, timeout: Duration) -> ResolverSocket {
        ResolverSocket::new(
            ResolverConfig::new("127.0.0.1")
                .unwrap()
                .port(port)
                .timeout(timeout)
                .keep_open(Duration::from_millis(500)),
        )
    }

    /// Serves exactly one UDP request with the given responder.
    async fn serve_udp_once(
        server: UdpSocket,
        respond: impl FnOnce(&Message) -> Option<Message>,
    ) -> Message {
        let mut buf = [0u8; 512];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        let request = Message::read(&buf[..len]).unwrap();
        if let Some(response) = respond(&request) {
            server.send_to(&response.to_wire(), from).await.unwrap();
        }
        request
    }

    #[tokio::test]
    async fn udp_request_resolves_with_matching_response() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let serving =
            tokio::spawn(
                async move { serve_udp_once(server, |q| Some(ptr_answer(q, "alpha.arrowhead.org."))).await },
            );

        let socket = socket_for(port, Duration::from_secs(2));
        let mut request = Message::query(
            0x0101,
            Record::question("_http._tcp.arrowhead.org.".parse().unwrap(), Type::PTR, Class::IN),
        );
        request.flags.rd = true;

        let response = socket.send(request).await.unwrap();
        assert!(response.flags.qr);
        assert_eq!(response.answers.len(), 1);
        serving.await.unwrap();
    }

    #[tokio::test]
    async fn resolve_ptr_returns_typed_targets() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            serve_udp_once(server, |q| Some(ptr_answer(q, "printer.arrowhead.org."))).await
        });

        let socket = socket_for(port, Duration::from_secs(2));
        let targets = socket
            .resolve_ptr("_ipp._tcp.arrowhead.org.".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(targets, vec!["printer.arrowhead.org.".parse().unwrap()]);
    }

    #[tokio::test]
    async fn unanswered_udp_request_times_out_after_retries() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let socket = socket_for(port, Duration::from_millis(100));
        let request = Message::query(
            0x0202,
            Record::question("alpha.arrowhead.org.".parse().unwrap(), Type::A, Class::IN),
        );

        let started = std::time::Instant::now();
        let result = socket.send(request).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RequestUnanswered);
        // Three attempts at 100 ms each, plus tick slop.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "settled after {:?}", elapsed);

        // The server saw the original transmission and both retries.
        let mut buf = [0u8; 512];
        let mut attempts = 0;
        while let Ok(Ok(_)) =
            tokio::time::timeout(Duration::from_millis(50), server.recv_from(&mut buf)).await
        {
            attempts += 1;
        }
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn truncated_udp_response_retries_over_tcp() {
        let udp_server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = udp_server.local_addr().unwrap().port();
        let tcp_server = TcpListener::bind(("127.0.0.1", port)).await.unwrap();

        // UDP answers with the truncation bit and nothing else.
        let udp_serving = tokio::spawn(async move {
            serve_udp_once(udp_server, |q| {
                let mut response = Message::new(q.id);
                response.flags.qr = true;
                response.flags.tc = true;
                response.questions = q.questions.clone();
                Some(response)
            })
            .await
        });

        // TCP answers properly, with framing.
        let tcp_serving = tokio::spawn(async move {
            let (mut stream, _) = tcp_server.accept().await.unwrap();
            let mut len = [0u8; 2];
            stream.read_exact(&mut len).await.unwrap();
            let mut frame = vec![0u8; usize::from(u16::from_be_bytes(len))];
            stream.read_exact(&mut frame).await.unwrap();
            let request = Message::read(&frame).unwrap();

            let response = ptr_answer(&request, "gamma.arrowhead.org.").to_wire();
            let mut framed = Vec::with_capacity(2 + response.len());
            framed.extend_from_slice(&(response.len() as u16).to_be_bytes());
            framed.extend_from_slice(&response);
            stream.write_all(&framed).await.unwrap();
            request
        });

        let socket = socket_for(port, Duration::from_secs(2));
        let targets = socket
            .resolve_ptr("_coap._udp.arrowhead.org.".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(targets, vec!["gamma.arrowhead.org.".parse().unwrap()]);

        // Exactly one request over each transport.
        let udp_request = udp_serving.await.unwrap();
        let tcp_request = tcp_serving.await.unwrap();
        assert_eq!(udp_request.id, tcp_request.id);
    }

    #[tokio::test]
    async fn large_request_travels_over_tcp() {
        let tcp_server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = tcp_server.local_addr().unwrap().port();

        let serving = tokio::spawn(async move {
            let (mut stream, _) = tcp_server.accept().await.unwrap();
            let mut len = [0u8; 2];
            stream.read_exact(&mut len).await.unwrap();
            let mut frame = vec![0u8; usize::from(u16::from_be_bytes(len))];
            stream.read_exact(&mut frame).await.unwrap();
            let request = Message::read(&frame).unwrap();

            let mut response = Message::new(request.id);
            response.flags.qr = true;
            response.questions = request.questions.clone();
            let octets = response.to_wire();
            let mut framed = Vec::with_capacity(2 + octets.len());
            framed.extend_from_slice(&(octets.len() as u16).to_be_bytes());
            framed.extend_from_slice(&octets);
            stream.write_all(&framed).await.unwrap();
            request.encoded_len()
        });

        let socket = socket_for(port, Duration::from_secs(2));
        let mut request = Message::query(
            0x0303,
            Record::question("big.arrowhead.org.".parse().unwrap(), Type::TXT, Class::IN),
        );
        // Pad past the datagram limit with TXT additionals.
        request.additionals.push(Record::new(
            "big.arrowhead.org.".parse().unwrap(),
            Type::TXT,
            Class::IN,
            0,
            Rdata::Txt(vec![vec![b'x'; 255], vec![b'y'; 255], vec![b'z'; 255]]),
        ));
        assert!(request.encoded_len() > MAX_UDP_MESSAGE);

        let response = socket.send(request).await.unwrap();
        assert!(response.flags.qr);
        assert!(serving.await.unwrap() > MAX_UDP_MESSAGE);
    }

    #[tokio::test]
    async fn oversized_request_fails_fast() {
        let socket = socket_for(1, Duration::from_millis(100));
        let mut request = Message::query(
            0x0404,
            Record::question("huge.arrowhead.org.".parse().unwrap(), Type::TXT, Class::IN),
        );
        // 300 strings of 255 octets put the message past 65,535.
        for _ in 0..300 {
            request.additionals.push(Record::new(
                "huge.arrowhead.org.".parse().unwrap(),
                Type::TXT,
                Class::IN,
                0,
                Rdata::Txt(vec![vec![b'x'; 255]]),
            ));
        }
        assert!(request.encoded_len() > MAX_TCP_MESSAGE);
        let result = socket.send(request).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RequestTooLong);
    }

    #[tokio::test]
    async fn idle_tcp_connection_closes_after_keep_open() {
        let tcp_server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = tcp_server.local_addr().unwrap().port();

        let serving = tokio::spawn(async move {
            let (mut stream, _) = tcp_server.accept().await.unwrap();
            let mut len = [0u8; 2];
            stream.read_exact(&mut len).await.unwrap();
            let mut frame = vec![0u8; usize::from(u16::from_be_bytes(len))];
            stream.read_exact(&mut frame).await.unwrap();
            let request = Message::read(&frame).unwrap();

            let mut response = Message::new(request.id);
            response.flags.qr = true;
            response.questions = request.questions.clone();
            let octets = response.to_wire();
            let mut framed = Vec::new();
            framed.extend_from_slice(&(octets.len() as u16).to_be_bytes());
            framed.extend_from_slice(&octets);
            stream.write_all(&framed).await.unwrap();

            // The client worker should close the connection once it
            // has idled past keep_open; we see that as EOF.
            let closed_at = std::time::Instant::now();
            let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut len)).await;
            assert_eq!(read.expect("connection never closed").unwrap(), 0);
            closed_at.elapsed()
        });

        let socket = socket_for(port, Duration::from_secs(2));
        let mut request = Message::query(
            0x0505,
            Record::question("big.arrowhead.org.".parse().unwrap(), Type::TXT, Class::IN),
        );
        request.additionals.push(Record::new(
            "big.arrowhead.org.".parse().unwrap(),
            Type::TXT,
            Class::IN,
            0,
            Rdata::Txt(vec![vec![b'x'; 255], vec![b'y'; 255], vec![b'z'; 255]]),
        ));
        socket.send(request).await.unwrap();

        let idle_before_close = serving.await.unwrap();
        // keep_open is 500 ms here; allow scheduling slop but make
        // sure the close was neither immediate nor unbounded.
        assert!(idle_before_close >= Duration::from_millis(400));
        assert!(idle_before_close < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn send_all_settles_each_request() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        // Answer two requests, whatever order they arrive in.
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            for _ in 0..2 {
                let (len, from) = server.recv_from(&mut buf).await.unwrap();
                let request = Message::read(&buf[..len]).unwrap();
                let response = ptr_answer(&request, "delta.arrowhead.org.");
                server.send_to(&response.to_wire(), from).await.unwrap();
            }
        });

        let socket = socket_for(port, Duration::from_secs(2));
        let question = |id| {
            Message::query(
                id,
                Record::question("svc.arrowhead.org.".parse().unwrap(), Type::PTR, Class::IN),
            )
        };
        let results = socket.send_all(vec![question(0x0601), question(0x0602)]).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn close_rejects_outstanding_requests() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let socket = socket_for(port, Duration::from_secs(30));
        let request = Message::query(
            0x0707,
            Record::question("alpha.arrowhead.org.".parse().unwrap(), Type::A, Class::IN),
        );
        let pending = socket.send(request);
        socket.close();
        let result = pending.await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Other);
    }

    #[test]
    fn hostnames_are_rejected_at_construction() {
        assert!(ResolverConfig::new("dns.arrowhead.org").is_err());
        assert!(ResolverConfig::new("127.0.0.1").is_ok());
        assert!(ResolverConfig::new("::1").is_ok());
    }

    #[test]
    fn reverse_names_cover_both_families() {
        assert_eq!(
            reverse_name("192.0.2.7".parse().unwrap()),
            "7.2.0.192.in-addr.arpa.".parse().unwrap(),
        );
        assert_eq!(
            reverse_name("2001:db8::567:89ab".parse().unwrap()),
            "b.a.9.8.7.6.5.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa."
                .parse()
                .unwrap(),
        );
    }
}
