//! Integration tests for the Bluetooth-serial emulator
//!
//! These tests drive [`BluetoothSerial`] handles end to end:
//! - Local emulation with the processing hook on a paused clock
//! - Bridged mode against a scripted host over an in-memory stream
//! - Not-implemented operations and transport shutdown

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use btserial_emu::{
    builtin_catalog, BluetoothSerial, Channel, EchoHook, EmulatorConfig, ScriptedHook,
    SerialError, TransportMode,
};
use btserial_protocol::{encode_message, BridgeEvent, BridgeRequest};
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::time::sleep;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub const TICK: Duration = Duration::from_millis(100);

    /// Local handle with the default 100 ms tick
    pub fn local() -> BluetoothSerial {
        BluetoothSerial::local(&EmulatorConfig::default())
    }

    /// Collects subscription deliveries
    pub fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(T) + Send + 'static)
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |item| sink.lock().unwrap().push(item))
    }

    /// Host side of an in-memory bridge connection
    pub struct ScriptedHost {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl ScriptedHost {
        /// Next request sent by the client
        pub async fn expect_request(&mut self) -> BridgeRequest {
            let line = self
                .lines
                .next_line()
                .await
                .unwrap()
                .expect("client closed the bridge");
            serde_json::from_str(&line).unwrap()
        }

        /// Send an event to the client
        pub async fn send(&mut self, event: BridgeEvent) {
            let line = encode_message(&event).unwrap();
            self.writer.write_all(&line).await.unwrap();
        }

        /// Send a pre-formatted line to the client
        pub async fn send_line(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }
    }

    /// Bridged handle wired to a scripted host
    pub fn bridged() -> (BluetoothSerial, ScriptedHost) {
        let (client, host) = tokio::io::duplex(4096);
        let serial = BluetoothSerial::bridged(client, &EmulatorConfig::default());
        let (read, writer) = tokio::io::split(host);
        let host = ScriptedHost {
            lines: BufReader::new(read).lines(),
            writer,
        };
        (serial, host)
    }

    /// Let the transport task process everything queued so far
    pub async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

use helpers::*;

// ============================================================================
// Local Emulation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_write_is_echoed_after_a_tick() {
    let serial = local();
    serial.register(EchoHook::new()).await.unwrap();

    serial.write("A").await.unwrap();
    assert_eq!(serial.available().await.unwrap(), 0);

    sleep(TICK + Duration::from_millis(10)).await;
    assert_eq!(serial.available().await.unwrap(), 1);
    assert_eq!(serial.read().await.unwrap(), "A");
    assert_eq!(serial.read().await.unwrap(), "");
}

#[tokio::test(start_paused = true)]
async fn test_hook_runs_once_per_interval() {
    let serial = local();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    serial
        .register(move |_: &mut Channel| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    sleep(Duration::from_millis(350)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_hook() {
    let serial = local();
    serial.connect(builtin_catalog().remove(1)).await.unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    serial
        .register(move |_: &mut Channel| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    sleep(Duration::from_millis(250)).await;
    serial.disconnect().await.unwrap();
    let before = count.load(Ordering::SeqCst);
    assert_eq!(before, 2);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(count.load(Ordering::SeqCst), before);
    assert!(matches!(
        serial.is_connected().await,
        Err(SerialError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_subscription_delivers_one_frame_per_tick() {
    let serial = local();
    let (seen, callback) = recorder::<String>();
    serial.subscribe("\n", callback).await.unwrap();
    serial
        .register(ScriptedHook::new("\r").respond("AT", "a\nb\n"))
        .await
        .unwrap();

    serial.write("AT\r").await.unwrap();

    sleep(TICK + Duration::from_millis(50)).await;
    assert_eq!(*seen.lock().unwrap(), vec!["a\n"]);

    sleep(TICK).await;
    assert_eq!(*seen.lock().unwrap(), vec!["a\n", "b\n"]);
    assert_eq!(serial.available().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_register_replaces_hook_and_keeps_buffers() {
    let serial = local();
    serial
        .register(|c: &mut Channel| c.push_output("first"))
        .await
        .unwrap();
    sleep(TICK + Duration::from_millis(10)).await;

    serial.register(EchoHook::with_terminator("!")).await.unwrap();
    serial.write("B").await.unwrap();
    sleep(TICK + Duration::from_millis(10)).await;

    assert_eq!(serial.read().await.unwrap(), "firstB!");
}

#[tokio::test(start_paused = true)]
async fn test_read_until_and_clear() {
    let serial = local();
    serial
        .register(ScriptedHook::new("\r").respond("ver", "v1.0\r\nOK\r\n"))
        .await
        .unwrap();
    serial.write("ver\r").await.unwrap();
    sleep(TICK + Duration::from_millis(10)).await;

    assert_eq!(serial.read_until("\r\n").await.unwrap(), "v1.0\r\n");
    assert_eq!(serial.read_until("#").await.unwrap(), "");
    assert_eq!(serial.available().await.unwrap(), 4);

    serial.clear().await.unwrap();
    assert_eq!(serial.available().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_local_raw_subscription_never_fires() {
    let serial = local();
    let (raw, callback) = recorder::<Vec<u8>>();
    serial.subscribe_raw_data(callback).await.unwrap();
    serial
        .register(|c: &mut Channel| c.push_output("x"))
        .await
        .unwrap();

    sleep(TICK * 3 + Duration::from_millis(10)).await;

    assert!(raw.lock().unwrap().is_empty());
    assert_eq!(serial.available().await.unwrap(), 3);
}

#[tokio::test]
async fn test_local_connection_queries() {
    let serial = local();
    assert_eq!(serial.mode(), TransportMode::Local);

    assert!(serial.is_enabled().await.is_ok());
    assert!(serial.enable().await.is_ok());
    assert!(serial.is_connected().await.is_err());

    let devices = serial.list().await.unwrap();
    assert_eq!(devices, builtin_catalog());

    serial.connect(devices[0].clone()).await.unwrap();
    assert!(serial.is_connected().await.is_ok());
}

#[tokio::test]
async fn test_not_implemented_operations() {
    let serial = local();
    assert!(matches!(
        serial.read_rssi().await,
        Err(SerialError::NotImplemented("readRSSI"))
    ));
    assert!(matches!(
        serial.show_bluetooth_settings().await,
        Err(SerialError::NotImplemented(_))
    ));
    assert!(matches!(
        serial.discover_unpaired().await,
        Err(SerialError::NotImplemented(_))
    ));
}

#[tokio::test]
async fn test_shutdown_closes_every_clone() {
    let serial = local();
    let other = serial.clone();

    serial.shutdown().await.unwrap();
    settle().await;

    assert!(matches!(
        other.available().await,
        Err(SerialError::TransportClosed)
    ));
}

#[tokio::test]
async fn test_open_without_bridge_is_local() {
    let serial = BluetoothSerial::open(&EmulatorConfig::default())
        .await
        .unwrap();
    assert_eq!(serial.mode(), TransportMode::Local);
}

// ============================================================================
// Bridged Mode
// ============================================================================

#[tokio::test]
async fn test_bridged_connect_waits_for_ack() {
    let (serial, mut host) = bridged();
    assert_eq!(serial.mode(), TransportMode::Bridged);
    let device = builtin_catalog().remove(1);

    let client = serial.clone();
    let target = device.clone();
    let pending = tokio::spawn(async move { client.connect(target).await });

    assert_eq!(host.expect_request().await, BridgeRequest::Connect(device));
    settle().await;
    assert!(!pending.is_finished());

    host.send(BridgeEvent::Connected(None)).await;
    pending.await.unwrap().unwrap();
    assert!(serial.is_connected().await.is_ok());
}

#[tokio::test]
async fn test_bridged_connect_failure_is_forwarded() {
    let (serial, mut host) = bridged();

    let client = serial.clone();
    let pending =
        tokio::spawn(async move { client.connect(builtin_catalog().remove(0)).await });

    host.expect_request().await;
    host.send_line(r#"{"event":"bl~connected","payload":"device not found"}"#)
        .await;

    match pending.await.unwrap() {
        Err(SerialError::Bridge(msg)) => assert_eq!(msg, "device not found"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(serial.is_connected().await.is_err());
}

#[tokio::test]
async fn test_bridged_write_and_list() {
    let (serial, mut host) = bridged();

    let client = serial.clone();
    let write = tokio::spawn(async move { client.write("AT\r").await });
    assert_eq!(
        host.expect_request().await,
        BridgeRequest::Write("AT\r".into())
    );
    host.send(BridgeEvent::Written(None)).await;
    write.await.unwrap().unwrap();

    let client = serial.clone();
    let list = tokio::spawn(async move { client.list().await });
    assert_eq!(host.expect_request().await, BridgeRequest::List);
    host.send(BridgeEvent::Devices(builtin_catalog())).await;
    assert_eq!(list.await.unwrap().unwrap(), builtin_catalog());
}

#[tokio::test]
async fn test_bridged_overlapping_writes_supersede() {
    let (serial, mut host) = bridged();

    let client = serial.clone();
    let first = tokio::spawn(async move { client.write("one").await });
    host.expect_request().await;

    let client = serial.clone();
    let second = tokio::spawn(async move { client.write("two").await });
    host.expect_request().await;

    assert!(matches!(
        first.await.unwrap(),
        Err(SerialError::Superseded("written"))
    ));

    host.send(BridgeEvent::Written(None)).await;
    second.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bridged_data_reaches_subscriber_and_buffer() {
    let (serial, mut host) = bridged();
    let (seen, callback) = recorder::<String>();

    serial.subscribe("\n", callback).await.unwrap();
    assert_eq!(host.expect_request().await, BridgeRequest::Subscribe);

    host.send_line(r#"{"event":"bl~data","payload":"hello\n"}"#)
        .await;
    host.send(BridgeEvent::Data("world".into())).await;

    // Both events land before this query is answered; the latest payload
    // replaces the buffer
    settle().await;
    assert_eq!(*seen.lock().unwrap(), vec!["hello\n", "world"]);
    assert_eq!(serial.available().await.unwrap(), 5);
    assert_eq!(serial.read().await.unwrap(), "world");
}

#[tokio::test]
async fn test_bridged_events_flow_while_host_is_not_reading() {
    let (client, host) = tokio::io::duplex(64);
    let serial = BluetoothSerial::bridged(client, &EmulatorConfig::default());
    let (_read, mut writer) = tokio::io::split(host);

    // Far larger than the stream buffer; stays queued while the host is busy
    let sender = serial.clone();
    let write = tokio::spawn(async move { sender.write("x".repeat(4096)).await });
    settle().await;

    let line = encode_message(&BridgeEvent::Data("ok".into())).unwrap();
    writer.write_all(&line).await.unwrap();
    settle().await;

    let available = tokio::time::timeout(Duration::from_secs(1), serial.available())
        .await
        .expect("transport stalled on a full stream");
    assert_eq!(available.unwrap(), 2);
    assert!(!write.is_finished());
}

#[tokio::test]
async fn test_bridged_raw_data() {
    let (serial, mut host) = bridged();
    let (seen, callback) = recorder::<Vec<u8>>();

    serial.subscribe_raw_data(callback).await.unwrap();
    assert_eq!(host.expect_request().await, BridgeRequest::SubscribeRaw);

    host.send(BridgeEvent::DataRaw("\u{1}\u{ff}A".into())).await;
    settle().await;

    assert_eq!(*seen.lock().unwrap(), vec![vec![0x01, 0xff, b'A']]);
    assert_eq!(serial.available().await.unwrap(), 0);

    serial.unsubscribe_raw_data().await.unwrap();
    assert_eq!(host.expect_request().await, BridgeRequest::UnsubscribeRaw);
}

#[tokio::test]
async fn test_bridged_register_is_ignored() {
    let (serial, mut host) = bridged();

    serial.register(EchoHook::new()).await.unwrap();
    serial.unsubscribe().await.unwrap();

    // Register sends nothing; the next line on the wire is the unsubscribe
    assert_eq!(host.expect_request().await, BridgeRequest::Unsubscribe);
}

#[tokio::test]
async fn test_bridged_host_disconnect_fails_pending() {
    let (serial, mut host) = bridged();

    let client = serial.clone();
    let pending = tokio::spawn(async move { client.disconnect().await });
    assert_eq!(host.expect_request().await, BridgeRequest::Disconnect);

    drop(host);
    assert!(matches!(
        pending.await.unwrap(),
        Err(SerialError::TransportClosed)
    ));
    assert!(matches!(
        serial.is_enabled().await,
        Err(SerialError::TransportClosed)
    ));
}

#[tokio::test]
async fn test_bridged_malformed_lines_are_skipped() {
    let (serial, mut host) = bridged();

    let client = serial.clone();
    let pending = tokio::spawn(async move { client.disconnect().await });
    host.expect_request().await;

    host.send_line("not json").await;
    host.send_line(r#"{"event":"bl~unknown"}"#).await;
    host.send(BridgeEvent::Disconnected).await;

    pending.await.unwrap().unwrap();
}

// ============================================================================
// Property Tests
// ============================================================================

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn echo_preserves_writes_in_order(
            chunks in prop::collection::vec("[a-zA-Z0-9 ]{0,8}", 1..8)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .unwrap();

            let output = rt.block_on(async {
                let serial = local();
                serial.register(EchoHook::new()).await.unwrap();
                for chunk in &chunks {
                    serial.write(chunk.as_str()).await.unwrap();
                }
                sleep(TICK + Duration::from_millis(10)).await;
                serial.read().await.unwrap()
            });

            prop_assert_eq!(output, chunks.concat());
        }
    }
}
