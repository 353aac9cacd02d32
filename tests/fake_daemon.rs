//! The client against a scripted daemon listening on a real Unix socket.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio_test::{assert_err, assert_ok};

use supla_core::config::ServerConfig;
use supla_core::server::{ChannelRef, PeerKind, SuplaServer};

/// Serve one connection, answering each line from `script`, and return the
/// lines received.
fn spawn_daemon(path: &Path, script: &[(&str, &str)]) -> JoinHandle<Vec<String>> {
    let listener = UnixListener::bind(path).unwrap();
    let script: HashMap<String, String> = script
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(stream);
        let mut received = Vec::new();
        loop {
            let mut line = String::new();
            if stream.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let command = line.trim_end().to_string();
            let reply = script
                .get(&command)
                .cloned()
                .unwrap_or_else(|| "ERR\n".to_string());
            received.push(command);
            stream.get_mut().write_all(reply.as_bytes()).await.unwrap();
        }
        received
    })
}

fn config(path: &Path) -> ServerConfig {
    ServerConfig {
        socket_path: path.to_path_buf(),
        timeout_ms: 1000,
    }
}

#[tokio::test]
async fn test_session_against_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("supla-server-ctrl.sock");
    let daemon = spawn_daemon(
        &path,
        &[
            ("OAUTH:secret", "AUTH_OK:1\n"),
            ("GET-TEMPERATURE-VALUE:1,2,3", "VALUE:19.5\n"),
            ("GET-RGBW-VALUE:1,2,4", "VALUE:65280,100,0\n"),
            ("SET-RGBW-VALUE:1,2,4,65280,0,0", "OK:4\n"),
        ],
    );

    let mut server = SuplaServer::from_config(&config(&path));
    assert!(server.oauth_authorize(1, "secret").await);
    assert_eq!(
        server
            .get_temperature_value(&ChannelRef::new(1, 2, 3))
            .await
            .unwrap(),
        19.5
    );
    let rgbw = assert_ok!(server.get_rgbw_value(&ChannelRef::new(1, 2, 4)).await);
    assert_eq!(rgbw.color, "0x00FF00");
    assert_eq!(rgbw.color_brightness, 100);
    assert!(server.set_rgbw_value(&ChannelRef::new(1, 2, 4), -1, 300, -5).await);
    assert!(!server.reconnect_user(1).await);
    drop(server);

    let received = daemon.await.unwrap();
    assert_eq!(
        received,
        vec![
            "OAUTH:secret",
            "GET-TEMPERATURE-VALUE:1,2,3",
            "GET-RGBW-VALUE:1,2,4",
            "SET-RGBW-VALUE:1,2,4,65280,0,0",
            "USER-RECONNECT:1",
        ]
    );
}

#[tokio::test]
async fn test_injected_command_does_not_desync_replies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("supla-server-ctrl.sock");
    let daemon = spawn_daemon(
        &path,
        &[
            ("OAUTH:tok", "AUTH_OK:1\n"),
            ("IS-IODEV-CONNECTED:1,5", "CONNECTED:5\n"),
            ("IS-IODEV-CONNECTED:1,7", "DISCONNECTED:7\n"),
        ],
    );

    let mut server = SuplaServer::from_config(&config(&path));
    assert!(!server.oauth_authorize(1, "tok\nIS-IODEV-CONNECTED:1,5").await);
    assert!(!server.is_device_connected(1, 7, PeerKind::Device).await);
    assert!(server.is_device_connected(1, 5, PeerKind::Device).await);
    drop(server);

    let received = daemon.await.unwrap();
    assert_eq!(
        received,
        vec!["IS-IODEV-CONNECTED:1,7", "IS-IODEV-CONNECTED:1,5"]
    );
}

#[tokio::test]
async fn test_device_check_uses_one_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("supla-server-ctrl.sock");
    let daemon = spawn_daemon(
        &path,
        &[
            ("IS-IODEV-CONNECTED:7,1", "CONNECTED:1\n"),
            ("IS-IODEV-CONNECTED:7,3", "CONNECTED:3\n"),
        ],
    );

    let mut server = SuplaServer::from_config(&config(&path));
    let connected = server.check_devices_connected(7, &[1, 2, 3]).await;
    assert_eq!(connected, vec![1, 3]);
    assert!(!server.is_connected());

    let received = tokio::time::timeout(Duration::from_secs(1), daemon)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn test_missing_daemon_degrades_to_negative_results() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = SuplaServer::from_config(&config(&dir.path().join("absent.sock")));

    assert_err!(server.connect().await);
    assert!(!server.is_alive().await);
    assert!(!server.is_device_connected(1, 1, PeerKind::Device).await);
    assert!(server.check_devices_connected(1, &[1, 2]).await.is_empty());
    assert!(!server.oauth_authorize(1, "token").await);
    assert!(server.get_char_value(&ChannelRef::new(1, 1, 1)).await.is_err());
    assert!(!server.set_char_value(&ChannelRef::new(1, 1, 1), 1).await);
}
