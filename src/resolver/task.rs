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

//! The in-flight state of one `send` invocation.

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::message::Message;

use super::Error;

/// One submitted request.
///
/// A task lives in exactly one place at a time: a worker's outbound
/// queue, a worker's inbound map, or — once settled — the caller's
/// future. Settling consumes the task, so double resolution is ruled
/// out by construction.
#[derive(Debug)]
pub(super) struct Task {
    /// The request message, kept for retransmission and fallback.
    pub request: Message,

    /// Remaining retransmissions after a timeout.
    pub retries_left: u8,

    /// When the request was last handed to a transport; [`None`] while
    /// it waits in an outbound queue.
    pub time_sent: Option<Instant>,

    responder: oneshot::Sender<Result<Message, Error>>,
}

impl Task {
    pub fn new(
        request: Message,
        responder: oneshot::Sender<Result<Message, Error>>,
        retries_left: u8,
    ) -> Self {
        Self {
            request,
            retries_left,
            time_sent: None,
            responder,
        }
    }

    /// The message ID requests are matched to responses by.
    pub fn id(&self) -> u16 {
        self.request.id
    }

    /// Returns whether the caller has dropped its future. Cancelled
    /// tasks are discarded when next encountered.
    pub fn is_cancelled(&self) -> bool {
        self.responder.is_closed()
    }

    /// Settles the task with a response. A response arriving after the
    /// caller cancelled is dropped silently.
    pub fn resolve(self, response: Message) {
        let _ = self.responder.send(Ok(response));
    }

    /// Settles the task with an error.
    pub fn reject(self, error: Error) {
        let _ = self.responder.send(Err(error));
    }
}
