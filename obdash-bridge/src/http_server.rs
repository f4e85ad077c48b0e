//! Telemetry HTTP endpoint
//!
//! Minimal on purpose: any request on the port, regardless of method or
//! path, gets the current snapshot as JSON and the connection is closed.
//! Request handling never touches the transport, so there is no timeout.

use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::store::TelemetryStore;

/// Accept connections until shutdown is signalled. The listener is bound by
/// the caller so a bind failure refuses startup instead of surfacing here.
pub async fn run(
    listener: TcpListener,
    store: TelemetryStore,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("HTTP client connected: {peer}");
                    let store = store.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, &store).await {
                            debug!("HTTP client error: {e}");
                        }
                    });
                }
                Err(e) => warn!("Accept error: {e}"),
            },
            _ = shutdown.changed() => {
                info!("HTTP server shutting down");
                return;
            }
        }
    }
}

/// Read (and ignore) the request, answer with the current snapshot
async fn handle_client(mut stream: TcpStream, store: &TelemetryStore) -> std::io::Result<()> {
    // Only the request's arrival matters; method and path do not
    let mut request = [0u8; 1024];
    let _ = stream.read(&mut request).await?;

    let body = serde_json::to_string(&store.snapshot()).map_err(std::io::Error::other)?;
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use obdash_elm327_lib::{Pid, Sample};
    use std::net::SocketAddr;
    use std::time::Duration;

    async fn start_server(store: TelemetryStore) -> (SocketAddr, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(listener, store, shutdown_rx));
        (addr, shutdown_tx)
    }

    async fn fetch(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_zero_defaults_before_any_sample() {
        let (addr, _shutdown) = start_server(TelemetryStore::new()).await;

        let response = fetch(addr, "GET / HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: application/json"));
        assert!(response.contains("Access-Control-Allow-Origin: *"));
        assert!(response.ends_with(r#"{"rpm":0,"speed":0,"temperature":0,"fuel":0}"#));
    }

    #[tokio::test]
    async fn test_serves_latest_snapshot_for_any_method_and_path() {
        let store = TelemetryStore::new();
        store.apply(Sample {
            pid: Pid::EngineSpeed,
            value: 1726,
        });
        store.apply(Sample {
            pid: Pid::FuelLevel,
            value: 63,
        });
        let (addr, _shutdown) = start_server(store).await;

        let response = fetch(addr, "POST /anything/at/all HTTP/1.1\r\n\r\n").await;
        assert!(response.contains(r#""rpm":1726"#));
        assert!(response.contains(r#""fuel":63"#));
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let (addr, shutdown) = start_server(TelemetryStore::new()).await;

        // Server is up
        let response = fetch(addr, "GET / HTTP/1.1\r\n\r\n").await;
        assert!(response.contains("200 OK"));

        shutdown.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
