use futures_util::{SinkExt, StreamExt, stream::SplitStream};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsReader = SplitStream<WsStream>;

/// Opens a WebSocket to the game server.
///
/// Returns at once; the handshake runs in a background task and is reported
/// as [`TransportEvent::Open`] (or `Error` followed by `Close`). Lines sent
/// before that are held in the outgoing channel. Must be called from within
/// a Tokio runtime.
pub fn connect(url: &str) -> Transport {
    let (outgoing, lines) = mpsc::unbounded_channel::<String>();
    let (events, receiver) = mpsc::unbounded_channel();
    let url = url.to_string();

    tokio::spawn(async move {
        info!("Connecting to WebSocket: {}", url);

        let ws_stream = match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                warn!("Failed to connect to {}: {}", url, e);
                let _ = events.send(TransportEvent::Error(e.to_string()));
                let _ = events.send(TransportEvent::Close);
                return;
            }
        };
        info!("WebSocket connected successfully");
        let _ = events.send(TransportEvent::Open);

        let (writer, mut reader) = ws_stream.split();

        // Writer task drains every outgoing line; dropping the sender side
        // ends it and closes the socket.
        let writer_events = events.clone();
        let mut lines = lines;
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(line) = lines.recv().await {
                debug!("Sending message: {}", line);
                if let Err(e) = writer.send(Message::Text(line.into())).await {
                    warn!("Failed to send WebSocket message: {}", e);
                    let _ = writer_events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            }

            let _ = writer.close().await;
        });

        read_messages(&mut reader, &events).await;

        writer_task.abort();
        let _ = events.send(TransportEvent::Close);
    });

    Transport::new(outgoing, receiver)
}

async fn read_messages(reader: &mut WsReader, events: &mpsc::UnboundedSender<TransportEvent>) {
    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!("Received message: {}", text.as_str());
                if events
                    .send(TransportEvent::Message(text.as_str().to_owned()))
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket connection closed");
                break;
            }
            // Ping/pong and binary frames carry nothing for us
            Ok(_) => {}
            Err(e) => {
                warn!("Error receiving WebSocket message: {}", e);
                let _ = events.send(TransportEvent::Error(e.to_string()));
                break;
            }
        }
    }
}
