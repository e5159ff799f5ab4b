//! Background polling of the server's health endpoint.

use crate::client::ChatClient;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

/// Connectivity as seen by the chat front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No health check has completed yet.
    Connecting,
    /// The server has never been reachable; it probably needs to be started.
    Setup,
    /// The server is up and the model is available.
    Connected,
    /// The server was reachable before but is not any more.
    Disconnected,
}

impl ConnectionState {
    /// State after a health check reporting `available`.
    pub fn advance(self, available: bool) -> Self {
        if available {
            return ConnectionState::Connected;
        }
        match self {
            ConnectionState::Connecting | ConnectionState::Setup => ConnectionState::Setup,
            ConnectionState::Connected | ConnectionState::Disconnected => {
                ConnectionState::Disconnected
            }
        }
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Polls the health endpoint on a fixed interval and publishes the
/// resulting [`ConnectionState`].
///
/// The poll loop stops when the monitor is shut down or dropped.
pub struct HealthMonitor {
    state: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
}

impl HealthMonitor {
    /// Start polling with the client's configured interval.
    pub fn spawn(client: ChatClient) -> Self {
        let period = Duration::from_millis(client.config().poll_interval_ms);
        let (tx, rx) = watch::channel(ConnectionState::Connecting);
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = interval(period);

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let available = client.is_available().await;
                let next = tx.borrow().advance(available);

                tx.send_if_modified(|state| {
                    if *state == next {
                        return false;
                    }
                    tracing::debug!(from = ?*state, to = ?next, "connection state changed");
                    *state = next;
                    true
                });

                if tx.is_closed() {
                    break;
                }
            }
        });

        Self {
            state: rx,
            shutdown,
        }
    }

    /// Latest published state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// The current state followed by every change, as a stream.
    pub fn updates(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.state.clone())
    }

    /// Stop polling.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatConfig;
    use tokio_stream::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn health(available: bool) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "model": "apple-on-device",
            "available": available
        }))
    }

    fn client_for(uri: String) -> ChatClient {
        ChatClient::with_config(
            ChatConfig::new()
                .base_url(uri)
                .poll_interval_ms(20)
                .health_timeout_ms(200),
        )
        .unwrap()
    }

    async fn wait_for(monitor: &HealthMonitor, expected: ConnectionState) {
        let mut rx = monitor.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| *state == expected))
            .await
            .expect("timed out waiting for state")
            .unwrap();
    }

    #[test]
    fn test_advance_from_connecting() {
        assert_eq!(
            ConnectionState::Connecting.advance(true),
            ConnectionState::Connected
        );
        assert_eq!(
            ConnectionState::Connecting.advance(false),
            ConnectionState::Setup
        );
    }

    #[test]
    fn test_advance_after_connecting_once() {
        assert_eq!(
            ConnectionState::Connected.advance(false),
            ConnectionState::Disconnected
        );
        assert_eq!(
            ConnectionState::Disconnected.advance(false),
            ConnectionState::Disconnected
        );
        assert_eq!(
            ConnectionState::Disconnected.advance(true),
            ConnectionState::Connected
        );
    }

    #[test]
    fn test_setup_until_first_connection() {
        assert_eq!(ConnectionState::Setup.advance(false), ConnectionState::Setup);
        assert_eq!(ConnectionState::Setup.advance(true), ConnectionState::Connected);
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Setup.is_connected());
    }

    #[tokio::test]
    async fn test_monitor_connects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(health(true))
            .mount(&server)
            .await;

        let monitor = HealthMonitor::spawn(client_for(server.uri()));
        wait_for(&monitor, ConnectionState::Connected).await;
        assert!(monitor.state().is_connected());
    }

    #[tokio::test]
    async fn test_monitor_reports_setup_when_unreachable() {
        let monitor = HealthMonitor::spawn(client_for("http://127.0.0.1:9".to_string()));
        wait_for(&monitor, ConnectionState::Setup).await;
    }

    #[tokio::test]
    async fn test_monitor_detects_lost_connection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(health(true))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(health(false))
            .mount(&server)
            .await;

        let monitor = HealthMonitor::spawn(client_for(server.uri()));
        let mut updates = monitor.updates();

        assert_eq!(updates.next().await, Some(ConnectionState::Connecting));
        assert_eq!(updates.next().await, Some(ConnectionState::Connected));
        assert_eq!(updates.next().await, Some(ConnectionState::Disconnected));
    }

    #[tokio::test]
    async fn test_shutdown_stops_polling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(health(true))
            .mount(&server)
            .await;

        let monitor = HealthMonitor::spawn(client_for(server.uri()));
        wait_for(&monitor, ConnectionState::Connected).await;
        monitor.shutdown();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = server.received_requests().await.unwrap().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let after = server.received_requests().await.unwrap().len();
        assert_eq!(before, after);
    }
}
