use std::collections::{HashMap, VecDeque};
use std::future::Future;

use minesweeper_common::{
    models::Pos,
    protocol::{
        Command, NewStatus, OpenOutcome, RawMap, Request, Response, parse_body, split_batch,
        split_frame,
    },
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportEvent};
use crate::{Error, Result, websocket};

/// Connection state published by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Closed,
}

type Reply = oneshot::Sender<Result<Response>>;

/// Bookkeeping behind the dispatcher: lines waiting to go out, callers
/// waiting per command kind, and whether a request is in flight.
///
/// Responses carry no request id, so the k-th response of a kind resolves
/// the k-th still-pending caller of that kind.
#[derive(Debug, Default)]
pub struct CommandQueue {
    outgoing: VecDeque<String>,
    pending: HashMap<Command, VecDeque<Reply>>,
    busy: bool,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: &Request, reply: Reply) {
        self.outgoing.push_back(request.to_line());
        self.pending
            .entry(request.command())
            .or_default()
            .push_back(reply);
    }

    /// Takes the next line to write, unless one is already in flight.
    pub fn next_line(&mut self) -> Option<String> {
        if self.busy {
            return None;
        }
        let line = self.outgoing.pop_front()?;
        self.busy = true;
        Some(line)
    }

    /// Handles one inbound message. Any message frees the in-flight slot,
    /// even one that matches no pending caller.
    pub fn receive(&mut self, text: &str) {
        self.busy = false;
        for chunk in split_batch(text) {
            self.resolve(chunk);
        }
    }

    fn resolve(&mut self, chunk: &str) {
        let (command, body) = match split_frame(chunk) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping message: {}", e);
                return;
            }
        };

        let Some(reply) = self
            .pending
            .get_mut(&command)
            .and_then(VecDeque::pop_front)
        else {
            warn!("Dropping unsolicited {} response", command);
            return;
        };

        let _ = reply.send(parse_body(command, body).map_err(Error::from));
    }

    /// Rejects every pending caller with `error` and forgets queued lines.
    /// Returns how many callers were rejected.
    pub fn fail_all(&mut self, error: &Error) -> usize {
        self.outgoing.clear();
        self.busy = false;

        let mut rejected = 0;
        for (_, replies) in self.pending.drain() {
            for reply in replies {
                let _ = reply.send(Err(error.clone()));
                rejected += 1;
            }
        }
        rejected
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn queued(&self) -> usize {
        self.outgoing.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }
}

enum ActorMessage {
    Dispatch { request: Request, reply: Reply },
    Close,
}

/// Handle to the dispatcher task.
///
/// Every request is queued the moment it is dispatched and written one at a
/// time: the next line goes out only after some message came back for the
/// previous one. Cloning shares the same connection.
#[derive(Clone)]
pub struct Dispatcher {
    requests: mpsc::UnboundedSender<ActorMessage>,
    state: watch::Receiver<ConnectionState>,
}

impl Dispatcher {
    /// Start a dispatcher over `transport`. Must be called from within a
    /// Tokio runtime; the task ends when the last handle is dropped.
    pub fn spawn(transport: Transport) -> Self {
        let (outgoing, events) = transport.into_parts();
        let (requests, receiver) = mpsc::unbounded_channel();
        let (state_sender, state) = watch::channel(ConnectionState::Connecting);

        let actor = DispatcherActor {
            queue: CommandQueue::new(),
            outgoing: Some(outgoing),
            events,
            requests: receiver,
            state: state_sender,
            open: false,
            ended: false,
        };
        tokio::spawn(actor.run());

        Self { requests, state }
    }

    /// Connect to a WebSocket game server and start a dispatcher for it
    pub fn connect(url: &str) -> Self {
        Self::spawn(websocket::connect(url))
    }

    /// Queue `command` with optional `args`. The request is enqueued before
    /// this returns; the future resolves with the matching response.
    pub fn dispatch(
        &self,
        command: Command,
        args: Option<String>,
    ) -> impl Future<Output = Result<Response>> + Send + 'static {
        self.send_request(Request::new(command, args))
    }

    pub fn send_request(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response>> + Send + 'static {
        let (reply, response) = oneshot::channel();
        // A failed send drops `reply`, which resolves the future as closed
        let _ = self
            .requests
            .send(ActorMessage::Dispatch { request, reply });

        async move { response.await.unwrap_or(Err(Error::Closed)) }
    }

    /// Start a new game at `level`
    pub fn new_game(
        &self,
        level: u8,
    ) -> impl Future<Output = Result<NewStatus>> + Send + 'static {
        let response = self.send_request(Request::new_game(level));
        async move {
            match response.await? {
                Response::New(status) => Ok(status),
                other => Err(unexpected(Command::New, &other)),
            }
        }
    }

    /// Open the cell at `pos`
    pub fn open(&self, pos: Pos) -> impl Future<Output = Result<OpenOutcome>> + Send + 'static {
        let response = self.send_request(Request::open(pos));
        async move {
            match response.await? {
                Response::Open(outcome) => Ok(outcome),
                other => Err(unexpected(Command::Open, &other)),
            }
        }
    }

    /// Fetch the current board
    pub fn map(&self) -> impl Future<Output = Result<RawMap>> + Send + 'static {
        let response = self.send_request(Request::map());
        async move {
            match response.await? {
                Response::Map(map) => Ok(map),
                other => Err(unexpected(Command::Map, &other)),
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every connection state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the connection. Pending and later requests fail with
    /// [`Error::Closed`].
    pub fn close(&self) {
        let _ = self.requests.send(ActorMessage::Close);
    }
}

fn unexpected(expected: Command, response: &Response) -> Error {
    Error::UnexpectedResponse {
        expected,
        got: response.command(),
    }
}

struct DispatcherActor {
    queue: CommandQueue,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    requests: mpsc::UnboundedReceiver<ActorMessage>,
    state: watch::Sender<ConnectionState>,
    /// Socket reported open and not closed since
    open: bool,
    /// No further traffic is possible
    ended: bool,
}

impl DispatcherActor {
    async fn run(mut self) {
        let mut events_done = false;

        loop {
            tokio::select! {
                biased;

                event = self.events.recv(), if !events_done => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        events_done = true;
                        self.end(Error::Closed);
                    }
                },
                message = self.requests.recv() => match message {
                    Some(ActorMessage::Dispatch { request, reply }) => self.dispatch(request, reply),
                    Some(ActorMessage::Close) => {
                        info!("Closing connection");
                        self.outgoing = None;
                        self.end(Error::Closed);
                    }
                    None => break,
                },
            }
        }

        debug!("Dispatcher stopped");
    }

    fn dispatch(&mut self, request: Request, reply: Reply) {
        if self.ended {
            let _ = reply.send(Err(Error::Closed));
            return;
        }
        debug!("Queueing request: {}", request.to_line());
        self.queue.push(&request, reply);
        self.flush();
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                if self.ended {
                    return;
                }
                self.open = true;
                self.set_state(ConnectionState::Connected);
                self.flush();
            }
            TransportEvent::Message(text) => {
                if self.open {
                    self.set_state(ConnectionState::Connected);
                }
                self.queue.receive(&text);
                self.flush();
            }
            TransportEvent::Error(reason) => {
                warn!("Transport error: {}", reason);
                let rejected = self.queue.fail_all(&Error::Transport(reason));
                if rejected > 0 {
                    debug!("Rejected {} pending requests", rejected);
                }
                self.set_state(ConnectionState::Closed);
            }
            TransportEvent::Close => self.end(Error::Closed),
        }
    }

    fn end(&mut self, error: Error) {
        self.open = false;
        self.ended = true;
        self.queue.fail_all(&error);
        self.set_state(ConnectionState::Closed);
    }

    fn flush(&mut self) {
        if !self.open {
            return;
        }
        let Some(outgoing) = &self.outgoing else {
            return;
        };
        let Some(line) = self.queue.next_line() else {
            return;
        };

        debug!("Sending request: {}", line);
        if outgoing.send(line).is_err() {
            warn!("Transport writer is gone");
            self.end(Error::Closed);
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            info!("Connection state: {:?} -> {:?}", state, next);
            *state = next;
            true
        });
    }
}
