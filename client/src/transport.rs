use tokio::sync::mpsc;

/// Lifecycle and traffic of the socket as the dispatcher sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Error(String),
    Close,
}

/// Both directions of one ordered connection: lines go out through
/// `outgoing`, everything the socket reports comes back through `events`.
/// Dropping `outgoing` closes the socket.
pub struct Transport {
    outgoing: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Transport {
    pub fn new(
        outgoing: mpsc::UnboundedSender<String>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outgoing, events }
    }

    /// An in-process connection whose far end is driven by hand.
    pub fn loopback() -> (Self, TransportPeer) {
        let (outgoing, lines) = mpsc::unbounded_channel();
        let (events, receiver) = mpsc::unbounded_channel();
        (Self::new(outgoing, receiver), TransportPeer { lines, events })
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        (self.outgoing, self.events)
    }
}

/// Server side of [`Transport::loopback`].
pub struct TransportPeer {
    lines: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportPeer {
    /// Each emitter returns `false` once the dispatcher side is gone.
    pub fn open(&self) -> bool {
        self.emit(TransportEvent::Open)
    }

    pub fn reply(&self, text: impl Into<String>) -> bool {
        self.emit(TransportEvent::Message(text.into()))
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error(reason.into()))
    }

    pub fn close(&self) -> bool {
        self.emit(TransportEvent::Close)
    }

    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Next line written by the client; `None` once the client closed the
    /// connection.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    pub fn try_next_line(&mut self) -> Option<String> {
        self.lines.try_recv().ok()
    }
}
