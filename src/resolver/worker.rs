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

//! The per-transport worker of the resolver socket.
//!
//! A worker owns one transport and multiplexes requests over it. All
//! of its state — the outbound queue, the inbound map, the transport
//! itself — lives in a single task; commands from callers and events
//! from the transport arrive over typed channels and are consumed
//! serially, so no lock is ever taken.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::message::Message;
use crate::wire::MAX_TCP_MESSAGE;

use super::task::Task;
use super::tcp::TcpTransport;
use super::udp::UdpTransport;
use super::{Error, ErrorKind};

/// The lower bound on the timeout-scan interval.
const MIN_TICK: Duration = Duration::from_millis(50);

/// The number of scan intervals per request timeout.
const TICKS_PER_TIMEOUT: u32 = 20;

////////////////////////////////////////////////////////////////////////
// COMMANDS AND EVENTS                                                //
////////////////////////////////////////////////////////////////////////

/// What callers ask of a worker.
#[derive(Debug)]
pub(super) enum Command {
    /// Take ownership of a task and see it settled.
    Enqueue(Task),

    /// Tear the transport down and reject everything outstanding.
    Close,
}

/// What a transport tells its worker.
#[derive(Debug)]
pub(super) enum Event {
    /// The transport finished opening.
    Opened,

    /// The transport closed; `graceful` distinguishes an orderly close
    /// from a failure.
    Closed { graceful: bool },

    /// A message arrived and decoded.
    Response(Message),

    /// The connection idled past the configured timeout (TCP only).
    Timeout,

    /// The transport failed; pending tasks cannot complete.
    Error(Error),
}

/// The immediate outcome of handing a request to a transport.
#[derive(Debug)]
pub(super) enum SendOutcome {
    Sent,
    /// The request does not fit this transport's limit; `size` is its
    /// full encoded length.
    Overflow { size: usize },
    Failed(Error),
}

/// The hook stray events are reported through.
pub(super) type IgnoredErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

////////////////////////////////////////////////////////////////////////
// TRANSPORT VARIANTS                                                 //
////////////////////////////////////////////////////////////////////////

/// The two endpoints a worker can drive, as a tagged variant.
pub(super) enum Transport {
    Udp(UdpTransport),
    Tcp(TcpTransport),
}

impl Transport {
    fn is_open(&self) -> bool {
        match self {
            Self::Udp(udp) => udp.is_open(),
            Self::Tcp(tcp) => tcp.is_open(),
        }
    }

    async fn open(&mut self, events: &mpsc::UnboundedSender<Event>) -> Result<(), Error> {
        match self {
            Self::Udp(udp) => udp.open(events).await,
            Self::Tcp(tcp) => tcp.open(events).await,
        }
    }

    async fn send(&mut self, request: &Message) -> SendOutcome {
        match self {
            Self::Udp(udp) => udp.send(request).await,
            Self::Tcp(tcp) => tcp.send(request).await,
        }
    }

    fn close(&mut self) {
        match self {
            Self::Udp(udp) => udp.close(),
            Self::Tcp(tcp) => tcp.close(),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// WORKER                                                             //
////////////////////////////////////////////////////////////////////////

/// One transport-owning state machine.
pub(super) struct Worker {
    label: &'static str,
    transport: Transport,

    /// Tasks accepted but not yet written to the transport, in FIFO
    /// order.
    outbound: VecDeque<Task>,

    /// Tasks awaiting a response, by message ID.
    inbound: HashMap<u16, Task>,

    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<Event>,

    /// Kept so transports always have a live event channel to clone.
    event_tx: mpsc::UnboundedSender<Event>,

    /// Where truncated or oversized requests go — the TCP worker, on a
    /// UDP worker only.
    fallback: Option<mpsc::UnboundedSender<Command>>,

    ignored: IgnoredErrorHook,
    timeout: Duration,
    keep_open: Duration,

    /// When the deferred close fires; armed whenever both queues are
    /// empty.
    close_at: Option<Instant>,
}

impl Worker {
    /// Spawns a worker task and returns the channel commands go to.
    pub fn spawn(
        label: &'static str,
        transport: Transport,
        fallback: Option<mpsc::UnboundedSender<Command>>,
        ignored: IgnoredErrorHook,
        timeout: Duration,
        keep_open: Duration,
    ) -> mpsc::UnboundedSender<Command> {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let worker = Self {
            label,
            transport,
            outbound: VecDeque::new(),
            inbound: HashMap::new(),
            commands,
            events,
            event_tx,
            fallback,
            ignored,
            timeout,
            keep_open,
            close_at: None,
        };
        tokio::spawn(worker.run());
        command_tx
    }

    /// The worker loop. Commands, transport events, and timer ticks
    /// all run serially here.
    async fn run(mut self) {
        /// What woke the loop up.
        enum Step {
            Command(Option<Command>),
            Event(Event),
            Tick,
        }

        let tick = (self.timeout / TICKS_PER_TIMEOUT).max(MIN_TICK);
        let mut interval = time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                command = self.commands.recv() => Step::Command(command),
                Some(event) = self.events.recv() => Step::Event(event),
                _ = interval.tick() => Step::Tick,
            };
            match step {
                Step::Command(Some(Command::Enqueue(task))) => self.enqueue(task).await,
                Step::Command(Some(Command::Close)) | Step::Command(None) => {
                    self.shut_down();
                    return;
                }
                Step::Event(event) => self.handle_event(event).await,
                Step::Tick => self.on_tick().await,
            }
        }
    }

    /// Accepts a task, rejecting duplicate message IDs, and tries to
    /// drain the queue.
    async fn enqueue(&mut self, task: Task) {
        let id = task.id();
        if self.inbound.contains_key(&id) || self.outbound.iter().any(|t| t.id() == id) {
            debug!("{}: rejecting duplicate ID {}", self.label, id);
            task.reject(Error::new(ErrorKind::RequestIdInUse));
            return;
        }
        self.outbound.push_back(task);
        self.close_at = None;
        self.poll().await;
    }

    /// Sends everything in the outbound queue, opening the transport
    /// first if necessary. The [`Event::Opened`] a successful open
    /// queues brings us back here, so an open followed by a drain
    /// needs no special casing.
    async fn poll(&mut self) {
        if self.outbound.is_empty() {
            self.arm_close_if_idle();
            return;
        }
        if !self.transport.is_open() {
            debug!("{}: opening transport", self.label);
            if let Err(e) = self.transport.open(&self.event_tx).await {
                warn!("{}: open failed: {}", self.label, e);
                self.fail_all(e);
            }
            return;
        }
        while let Some(mut task) = self.outbound.pop_front() {
            if task.is_cancelled() {
                debug!("{}: dropping cancelled task {}", self.label, task.id());
                continue;
            }
            match self.transport.send(&task.request).await {
                SendOutcome::Sent => {
                    task.time_sent = Some(Instant::now());
                    self.inbound.insert(task.id(), task);
                }
                SendOutcome::Overflow { size } => self.fall_back(task, size),
                SendOutcome::Failed(e) => {
                    warn!("{}: send failed: {}", self.label, e);
                    self.outbound.push_front(task);
                    self.transport.close();
                    self.fail_all(e);
                    return;
                }
            }
        }
        self.arm_close_if_idle();
    }

    /// Hands a task that cannot travel over this transport to the
    /// fallback worker, or rejects it when there is none (or it would
    /// not fit there either).
    fn fall_back(&mut self, mut task: Task, size: usize) {
        match &self.fallback {
            Some(fallback) if size <= MAX_TCP_MESSAGE => {
                debug!(
                    "{}: request {} ({} octets) falls back to tcp",
                    self.label,
                    task.id(),
                    size,
                );
                task.retries_left = 0;
                task.time_sent = None;
                if let Err(returned) = fallback.send(Command::Enqueue(task)) {
                    if let Command::Enqueue(task) = returned.0 {
                        task.reject(Error::other("fallback transport is gone"));
                    }
                }
            }
            _ => task.reject(Error::new(ErrorKind::RequestTooLong)),
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Opened => {
                debug!("{}: transport open", self.label);
                self.poll().await;
            }
            Event::Response(response) => {
                self.on_response(response);
            }
            Event::Closed { graceful } => self.on_closed(graceful).await,
            Event::Timeout => {
                debug!("{}: transport idle timeout", self.label);
                self.transport.close();
                self.fail_all(Error::new(ErrorKind::RequestUnanswered));
            }
            Event::Error(e) => {
                warn!("{}: transport error: {}", self.label, e);
                self.transport.close();
                self.fail_all(e);
            }
        }
    }

    /// Matches a response to its task by message ID. A truncated
    /// response on a worker with a fallback re-issues the request over
    /// TCP exactly once instead of resolving.
    fn on_response(&mut self, response: Message) {
        match self.inbound.remove(&response.id) {
            Some(task) => {
                if response.flags.tc && self.fallback.is_some() {
                    debug!(
                        "{}: response {} truncated, retrying over tcp",
                        self.label, response.id,
                    );
                    let size = task.request.encoded_len();
                    self.fall_back(task, size);
                } else {
                    task.resolve(response);
                }
            }
            None => {
                let e = Error::new(ErrorKind::ResponseIdUnexpected);
                (self.ignored)(&e);
            }
        }
        self.arm_close_if_idle();
    }

    /// Reacts to the transport closing. After an orderly close
    /// (a server dropping its side of a keep-alive connection),
    /// in-flight tasks move back to the head of the outbound queue to
    /// be retransmitted on the next connection.
    async fn on_closed(&mut self, graceful: bool) {
        debug!("{}: transport closed (graceful: {})", self.label, graceful);
        self.transport.close();
        if graceful {
            let mut in_flight: Vec<Task> = self.inbound.drain().map(|(_, task)| task).collect();
            in_flight.sort_by_key(|task| task.time_sent);
            for mut task in in_flight.into_iter().rev() {
                task.time_sent = None;
                self.outbound.push_front(task);
            }
            self.poll().await;
        } else {
            self.fail_all(Error::other("transport closed"));
        }
    }

    /// The periodic scan: expire in-flight tasks, retransmit or reject
    /// them, and fire the deferred close.
    async fn on_tick(&mut self) {
        let now = Instant::now();

        let expired: Vec<u16> = self
            .inbound
            .iter()
            .filter(|(_, task)| {
                task.time_sent
                    .map_or(false, |sent| now.duration_since(sent) >= self.timeout)
            })
            .map(|(&id, _)| id)
            .collect();
        for id in expired {
            if let Some(mut task) = self.inbound.remove(&id) {
                if task.retries_left > 0 {
                    task.retries_left -= 1;
                    task.time_sent = None;
                    debug!(
                        "{}: request {} timed out, {} retries left",
                        self.label, id, task.retries_left,
                    );
                    self.outbound.push_back(task);
                } else {
                    debug!("{}: request {} unanswered", self.label, id);
                    task.reject(Error::new(ErrorKind::RequestUnanswered));
                }
            }
        }
        if !self.outbound.is_empty() {
            self.poll().await;
        }

        if let Some(at) = self.close_at {
            if now >= at {
                self.close_at = None;
                if self.inbound.is_empty() && self.outbound.is_empty() {
                    if self.transport.is_open() {
                        debug!("{}: idle for {:?}, closing", self.label, self.keep_open);
                        self.transport.close();
                    }
                } else {
                    self.arm_close_if_idle();
                }
            }
        }
    }

    /// Rejects every task bound to this worker with the given error.
    fn fail_all(&mut self, error: Error) {
        for (_, task) in self.inbound.drain() {
            task.reject(error.clone());
        }
        while let Some(task) = self.outbound.pop_front() {
            task.reject(error.clone());
        }
        self.arm_close_if_idle();
    }

    /// Arms the deferred close whenever both queues are empty; any new
    /// work disarms it.
    fn arm_close_if_idle(&mut self) {
        if self.inbound.is_empty() && self.outbound.is_empty() {
            if self.close_at.is_none() {
                self.close_at = Some(Instant::now() + self.keep_open);
            }
        } else {
            self.close_at = None;
        }
    }

    /// Final teardown on [`Command::Close`] or when the socket handle
    /// is dropped.
    fn shut_down(&mut self) {
        debug!("{}: shutting down", self.label);
        self.transport.close();
        self.fail_all(Error::other("resolver socket closed"));
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::sync::oneshot;

    use crate::class::Class;
    use crate::message::Message;
    use crate::rr::{Rdata, Record, Type};

    use super::*;

    fn nowhere() -> SocketAddr {
        // RFC 5737 TEST-NET-1; nothing should answer.
        "192.0.2.1:53".parse().unwrap()
    }

    fn ignore_hook() -> IgnoredErrorHook {
        Arc::new(|_| ())
    }

    fn oversized_query(id: u16, strings: usize) -> Message {
        let mut message = Message::query(
            id,
            Record::question("big.arrowhead.org.".parse().unwrap(), Type::TXT, Class::IN),
        );
        let strings = vec![vec![b'x'; 255]; strings];
        message.answers.push(Record::new(
            "big.arrowhead.org.".parse().unwrap(),
            Type::TXT,
            Class::IN,
            0,
            Rdata::Txt(strings),
        ));
        message
    }

    /// A UDP worker that cannot encode a request hands it to its
    /// fallback with its retries stripped.
    #[tokio::test]
    async fn udp_overflow_falls_back_to_tcp_queue() {
        let (fallback_tx, mut fallback_rx) = mpsc::unbounded_channel();
        let commands = Worker::spawn(
            "udp",
            Transport::Udp(UdpTransport::new(nowhere())),
            Some(fallback_tx),
            ignore_hook(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );

        // Three 255-octet strings put the message well past 512 but
        // within the TCP limit.
        let request = oversized_query(77, 3);
        assert!(request.encoded_len() > 512);
        let (responder, _settled) = oneshot::channel();
        commands
            .send(Command::Enqueue(Task::new(request, responder, 2)))
            .unwrap();

        match fallback_rx.recv().await {
            Some(Command::Enqueue(task)) => {
                assert_eq!(task.id(), 77);
                assert_eq!(task.retries_left, 0);
            }
            other => panic!("expected fallback enqueue, got {:?}", other),
        }
    }

    /// With no fallback (the TCP worker itself), an oversized request
    /// is rejected outright.
    #[tokio::test]
    async fn overflow_without_fallback_is_too_long() {
        let commands = Worker::spawn(
            "udp",
            Transport::Udp(UdpTransport::new(nowhere())),
            None,
            ignore_hook(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );

        let request = oversized_query(78, 3);
        let (responder, settled) = oneshot::channel();
        commands
            .send(Command::Enqueue(Task::new(request, responder, 2)))
            .unwrap();

        let result = settled.await.unwrap();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RequestTooLong);
    }

    /// Two concurrent requests with the same ID: the second is
    /// rejected fast, whether the first is still queued or already in
    /// flight.
    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        // A live socket that never answers stands in for the server,
        // so the first request stays in flight.
        let server = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let commands = Worker::spawn(
            "udp",
            Transport::Udp(UdpTransport::new(server.local_addr().unwrap())),
            None,
            ignore_hook(),
            Duration::from_secs(5),
            Duration::from_millis(200),
        );

        let question =
            Record::question("alpha.arrowhead.org.".parse().unwrap(), Type::A, Class::IN);
        let (first_responder, _first) = oneshot::channel();
        let (second_responder, second) = oneshot::channel();
        commands
            .send(Command::Enqueue(Task::new(
                Message::query(42, question.clone()),
                first_responder,
                2,
            )))
            .unwrap();
        commands
            .send(Command::Enqueue(Task::new(
                Message::query(42, question),
                second_responder,
                2,
            )))
            .unwrap();

        let result = second.await.unwrap();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RequestIdInUse);
    }
}
