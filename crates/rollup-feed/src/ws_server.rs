//! WebSocket Feed Server
//!
//! Each connection registers with the hub and pumps its queue to the socket.
//! The server pings on a fixed cadence; a connection that does not answer
//! within the pong wait, whose socket fails, or whose writes stall for longer
//! than the pong wait, is unregistered.

use crate::{
    hub::{BroadcastHub, FeedMessage},
    FeedConfig, FeedError,
};
use futures::{Sink, SinkExt, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::{interval_at, sleep, timeout, Instant},
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{self, Message},
    WebSocketStream,
};

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// WebSocket feed server
pub struct FeedServer {
    hub: Arc<BroadcastHub>,
    config: FeedConfig,
}

impl FeedServer {
    /// Create a new feed server
    pub fn new(hub: Arc<BroadcastHub>, config: FeedConfig) -> Self {
        Self { hub, config }
    }

    /// Bind and run the feed server
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Feed server listening on {}", addr);
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Feed accept failed: {}", e);
                    sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            let hub = self.hub.clone();
            let config = self.config.clone();

            tokio::spawn(async move {
                match handle_connection(stream, hub, config).await {
                    Ok(()) => tracing::debug!("Feed connection from {} closed", peer_addr),
                    Err(e) => tracing::warn!("Feed connection from {} ended: {}", peer_addr, e),
                }
            });
        }
    }
}

/// Handle a single subscriber connection
async fn handle_connection(
    stream: TcpStream,
    hub: Arc<BroadcastHub>,
    config: FeedConfig,
) -> Result<(), FeedError> {
    let ws_stream = accept_async(stream).await?;
    let subscription = hub.register()?;
    let id = subscription.id;

    let result = pump(ws_stream, subscription.receiver, &config).await;

    hub.unregister(id);
    result
}

async fn pump(
    ws_stream: WebSocketStream<TcpStream>,
    mut queue: mpsc::Receiver<FeedMessage>,
    config: &FeedConfig,
) -> Result<(), FeedError> {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let ping_interval = config.ping_interval();
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
    let deadline = sleep(config.pong_wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            message = queue.recv() => match message {
                Some(text) => {
                    send_bounded(&mut ws_sender, Message::Text(text.to_string()), config.pong_wait).await?
                }
                None => {
                    // Hub released us; close politely and stop
                    let _ = send_bounded(&mut ws_sender, Message::Close(None), config.pong_wait).await;
                    return Ok(());
                }
            },

            _ = ping.tick() => {
                send_bounded(&mut ws_sender, Message::Ping(Vec::new()), config.pong_wait).await?
            }

            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Pong(_))) => {
                    deadline.as_mut().reset(Instant::now() + config.pong_wait);
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },

            _ = &mut deadline => return Err(FeedError::PongTimeout(config.pong_wait)),
        }
    }
}

/// Write one frame, failing if the peer stops draining the socket
async fn send_bounded<S>(sink: &mut S, message: Message, limit: Duration) -> Result<(), FeedError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    match timeout(limit, sink.send(message)).await {
        Ok(result) => result.map_err(FeedError::from),
        Err(_) => Err(FeedError::WriteTimeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio_tungstenite::connect_async;

    async fn start(config: FeedConfig) -> (Arc<BroadcastHub>, String) {
        let hub = Arc::new(BroadcastHub::new(config.queue_capacity));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        tokio::spawn(FeedServer::new(hub.clone(), config).serve(listener));
        (hub, url)
    }

    async fn wait_for_subscribers(hub: &BroadcastHub, count: usize) {
        timeout(Duration::from_secs(5), async {
            while hub.subscriber_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_receives_broadcast() {
        let (hub, url) = start(FeedConfig::default()).await;
        let (mut client, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        hub.broadcast(r#"[{"sender":"a","message":"hi","priority":1}]"#);

        let frame = timeout(Duration::from_secs(5), client.next()).await.unwrap();
        assert_eq!(
            frame.unwrap().unwrap(),
            Message::Text(r#"[{"sender":"a","message":"hi","priority":1}]"#.to_string())
        );

        client.close(None).await.unwrap();
        wait_for_subscribers(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_silent_client_is_dropped() {
        let config = FeedConfig {
            pong_wait: Duration::from_millis(200),
            ..Default::default()
        };
        let (hub, url) = start(config).await;

        // Never polled, so pings go unanswered
        let (_client, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_subscribers(&hub, 1).await;
        wait_for_subscribers(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_responsive_client_stays_registered() {
        let config = FeedConfig {
            pong_wait: Duration::from_secs(1),
            ..Default::default()
        };
        let (hub, url) = start(config).await;
        let (mut client, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        // Reading drives the automatic pong replies
        let reader = tokio::spawn(async move {
            let mut pings = 0;
            while let Some(Ok(frame)) = client.next().await {
                if frame.is_ping() {
                    pings += 1;
                }
            }
            pings
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(hub.subscriber_count(), 1);

        hub.close();
        let pings = timeout(Duration::from_secs(5), reader).await.unwrap().unwrap();
        assert!(pings >= 2);
    }

    #[tokio::test]
    async fn test_stalled_reader_is_dropped() {
        let config = FeedConfig {
            pong_wait: Duration::from_millis(500),
            queue_capacity: 4,
        };
        let (hub, url) = start(config).await;

        // Handshake completes, then the socket is never read again
        let (_client, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        let large = "x".repeat(4 * 1024 * 1024);
        for _ in 0..40 {
            hub.broadcast(&large);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        wait_for_subscribers(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_failed_handshake_does_not_stop_server() {
        let (hub, url) = start(FeedConfig::default()).await;
        let addr = url.trim_start_matches("ws://").to_string();

        let mut raw = TcpStream::connect(addr.as_str()).await.unwrap();
        raw.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        drop(raw);

        let (mut client, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        hub.broadcast("[]");
        let frame = timeout(Duration::from_secs(5), client.next()).await.unwrap();
        assert_eq!(frame.unwrap().unwrap(), Message::Text("[]".to_string()));
    }
}
