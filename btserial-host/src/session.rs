//! Bridge session
//!
//! Serves one bridge client. The session uses a `select!` loop to:
//! - Decode [`BridgeRequest`] lines from the client and answer them
//! - Forward bytes read from the open device as `data` (and, while
//!   raw-subscribed, `data_raw`) events
//! - Drain queued event lines to the client and queued writes to the device
//!
//! Neither stream is written from inside another branch, so a slow device
//! never stalls the client and a client that stops reading never stalls the
//! device. A `written` event is sent once the device has taken every byte of
//! that write.
//!
//! `data` events are sent whether or not the client subscribed so bridged
//! reads see every inbound byte.

use std::collections::VecDeque;

use btserial_protocol::{
    encode_message, from_raw_bytes, to_raw_bytes, BridgeEvent, BridgeRequest, MessageCodec,
    RequestCodec,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::{debug, info, warn};

use crate::backend::{Backend, BoxedDevice};
use crate::error::HostError;

/// Write side of the open device
struct DeviceWriter {
    half: WriteHalf<BoxedDevice>,
    /// Bytes accepted from the client but not yet taken by the device
    queued: Vec<u8>,
    /// Remaining byte count of each unacknowledged write, oldest first
    unacked: VecDeque<usize>,
}

impl DeviceWriter {
    fn new(half: WriteHalf<BoxedDevice>) -> Self {
        Self {
            half,
            queued: Vec::new(),
            unacked: VecDeque::new(),
        }
    }

    /// Queue one write; returns false if it completed without any bytes
    fn enqueue(&mut self, bytes: &[u8]) -> bool {
        if bytes.is_empty() && self.unacked.is_empty() {
            return false;
        }
        self.queued.extend_from_slice(bytes);
        self.unacked.push_back(bytes.len());
        true
    }

    /// Account for `n` bytes taken by the device
    ///
    /// Returns how many writes are now complete.
    fn consume(&mut self, mut n: usize) -> usize {
        self.queued.drain(..n);
        let mut done = 0;
        while let Some(remaining) = self.unacked.front_mut() {
            if *remaining > n {
                *remaining -= n;
                break;
            }
            n -= *remaining;
            self.unacked.pop_front();
            done += 1;
        }
        done
    }
}

/// State of one client connection
pub struct Session<'a> {
    backend: &'a Backend,
    reader: Option<ReadHalf<BoxedDevice>>,
    writer: Option<DeviceWriter>,
    /// Set while the client holds a raw subscription
    raw: bool,
    /// Encoded event lines not yet taken by the client
    outbound: Vec<u8>,
}

impl<'a> Session<'a> {
    pub fn new(backend: &'a Backend) -> Self {
        Self {
            backend,
            reader: None,
            writer: None,
            raw: false,
            outbound: Vec::new(),
        }
    }

    /// Serve `client` until it disconnects
    pub async fn run<C>(mut self, client: C) -> Result<(), HostError>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut client_rx, mut client_tx) = tokio::io::split(client);
        let mut codec = RequestCodec::new();
        let mut client_buf = [0u8; 1024];
        let mut device_buf = [0u8; 1024];

        loop {
            let device_busy = self.writer.as_ref().is_some_and(|w| !w.queued.is_empty());

            tokio::select! {
                result = client_rx.read(&mut client_buf) => {
                    let n = result?;
                    if n == 0 {
                        info!("Bridge client disconnected");
                        break;
                    }
                    codec.push_bytes(&client_buf[..n]);
                    while let Some(request) = codec.next_message() {
                        for event in self.handle_request(request) {
                            self.queue_event(&event)?;
                        }
                    }
                }

                result = client_tx.write(&self.outbound), if !self.outbound.is_empty() => {
                    let n = result?;
                    if n == 0 {
                        info!("Bridge client stopped reading");
                        break;
                    }
                    self.outbound.drain(..n);
                }

                result = write_device(&mut self.writer), if device_busy => {
                    let events = match result {
                        Ok(0) => {
                            warn!("Device stopped accepting data");
                            self.close_device("device stopped accepting data")
                        }
                        Ok(n) => {
                            let done = self.writer.as_mut().map_or(0, |w| w.consume(n));
                            vec![BridgeEvent::Written(None); done]
                        }
                        Err(e) => {
                            warn!("Device write failed: {}", e);
                            self.close_device(&e.to_string())
                        }
                    };
                    for event in events {
                        self.queue_event(&event)?;
                    }
                }

                result = read_device(&mut self.reader, &mut device_buf) => {
                    let events = match result {
                        Ok(n) if n > 0 => self.inbound_events(&device_buf[..n]),
                        Ok(_) => {
                            warn!("Device closed the connection");
                            self.close_device("device closed the connection")
                        }
                        Err(e) => {
                            warn!("Device read failed: {}", e);
                            self.close_device(&e.to_string())
                        }
                    };
                    for event in events {
                        self.queue_event(&event)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Answer one request; returns the events to send back
    fn handle_request(&mut self, request: BridgeRequest) -> Vec<BridgeEvent> {
        debug!("Bridge request: {:?}", request);

        match request {
            BridgeRequest::Connect(device) => {
                let mut events = self.close_device("device disconnected");
                match self.backend.open(&device) {
                    Ok(stream) => {
                        info!("Connected to {}", device.address);
                        self.attach(stream);
                        events.push(BridgeEvent::Connected(None));
                    }
                    Err(e) => {
                        warn!("Connect to {} failed: {}", device.address, e);
                        events.push(BridgeEvent::Connected(Some(e.to_string())));
                    }
                }
                events
            }
            BridgeRequest::Disconnect => {
                let mut events = self.close_device("device disconnected");
                events.push(BridgeEvent::Disconnected);
                events
            }
            BridgeRequest::Write(data) => match self.writer.as_mut() {
                Some(writer) => {
                    if writer.enqueue(&to_raw_bytes(&data)) {
                        Vec::new()
                    } else {
                        vec![BridgeEvent::Written(None)]
                    }
                }
                None => vec![BridgeEvent::Written(Some(
                    HostError::NotConnected.to_string(),
                ))],
            },
            BridgeRequest::List => {
                let devices = self.backend.list().unwrap_or_else(|e| {
                    warn!("Listing devices failed: {}", e);
                    Vec::new()
                });
                vec![BridgeEvent::Devices(devices)]
            }
            BridgeRequest::Subscribe | BridgeRequest::Unsubscribe => {
                debug!("Device data is forwarded regardless of text subscriptions");
                Vec::new()
            }
            BridgeRequest::SubscribeRaw => {
                self.raw = true;
                Vec::new()
            }
            BridgeRequest::UnsubscribeRaw => {
                self.raw = false;
                Vec::new()
            }
        }
    }

    fn attach(&mut self, stream: BoxedDevice) {
        let (reader, writer) = tokio::io::split(stream);
        self.reader = Some(reader);
        self.writer = Some(DeviceWriter::new(writer));
    }

    /// Drop the open device, failing writes it never finished
    fn close_device(&mut self, reason: &str) -> Vec<BridgeEvent> {
        self.reader = None;
        let Some(writer) = self.writer.take() else {
            return Vec::new();
        };
        info!("Device disconnected");

        if !writer.unacked.is_empty() {
            warn!(
                "Failing {} unfinished writes: {}",
                writer.unacked.len(),
                reason
            );
        }
        vec![BridgeEvent::Written(Some(reason.to_string())); writer.unacked.len()]
    }

    /// Events for bytes read from the device
    fn inbound_events(&self, bytes: &[u8]) -> Vec<BridgeEvent> {
        let payload = from_raw_bytes(bytes);
        debug!("Device data: {:?} (raw: {})", payload, self.raw);

        let mut events = Vec::with_capacity(2);
        if self.raw {
            events.push(BridgeEvent::DataRaw(payload.clone()));
        }
        events.push(BridgeEvent::Data(payload));
        events
    }

    fn queue_event(&mut self, event: &BridgeEvent) -> Result<(), HostError> {
        let line = encode_message(event)?;
        self.outbound.extend_from_slice(&line);
        Ok(())
    }
}

/// Read from the device, or wait forever when none is open
async fn read_device(
    reader: &mut Option<ReadHalf<BoxedDevice>>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(half) => half.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Hand queued bytes to the device, or wait forever when none is open
async fn write_device(writer: &mut Option<DeviceWriter>) -> std::io::Result<usize> {
    match writer {
        Some(w) => w.half.write(&w.queued).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btserial_protocol::{builtin_catalog, DeviceDescriptor, EventCodec};
    use tokio::io::DuplexStream;

    fn echo() -> Backend {
        Backend::Echo {
            terminator: "\n".to_string(),
        }
    }

    /// Client side of a session under test
    struct TestClient {
        stream: DuplexStream,
        codec: EventCodec,
    }

    impl TestClient {
        fn start(backend: Backend) -> Self {
            Self::start_with(backend, None)
        }

        /// Start a session that already has `device` open
        fn start_with(backend: Backend, device: Option<BoxedDevice>) -> Self {
            let (client, host) = tokio::io::duplex(4096);
            tokio::spawn(async move {
                let mut session = Session::new(&backend);
                if let Some(device) = device {
                    session.attach(device);
                }
                session.run(host).await
            });
            Self {
                stream: client,
                codec: EventCodec::new(),
            }
        }

        async fn send(&mut self, request: BridgeRequest) {
            let line = encode_message(&request).unwrap();
            self.stream.write_all(&line).await.unwrap();
        }

        async fn next_event(&mut self) -> BridgeEvent {
            let mut buf = [0u8; 256];
            loop {
                if let Some(event) = self.codec.next_message() {
                    return event;
                }
                let n = self.stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "session closed");
                self.codec.push_bytes(&buf[..n]);
            }
        }
    }

    #[tokio::test]
    async fn test_echo_connect_write_and_data() {
        let mut client = TestClient::start(echo());

        client
            .send(BridgeRequest::Connect(builtin_catalog()[1].clone()))
            .await;
        assert_eq!(client.next_event().await, BridgeEvent::Connected(None));

        client.send(BridgeRequest::Write("AT".into())).await;
        assert_eq!(client.next_event().await, BridgeEvent::Written(None));
        assert_eq!(client.next_event().await, BridgeEvent::Data("AT\n".into()));
    }

    #[tokio::test]
    async fn test_write_without_device_reports_error() {
        let mut client = TestClient::start(echo());

        client.send(BridgeRequest::Write("AT".into())).await;
        assert_eq!(
            client.next_event().await,
            BridgeEvent::Written(Some("no device connected".into()))
        );
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let mut client = TestClient::start(Backend::Serial {
            baud_rate: 9600,
            scanner: Default::default(),
        });

        client
            .send(BridgeRequest::Connect(DeviceDescriptor::new(
                0,
                "/dev/btserial-does-not-exist",
                "missing",
            )))
            .await;
        match client.next_event().await {
            BridgeEvent::Connected(Some(err)) => {
                assert!(err.contains("/dev/btserial-does-not-exist"))
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_and_disconnect() {
        let mut client = TestClient::start(echo());

        client.send(BridgeRequest::List).await;
        assert_eq!(
            client.next_event().await,
            BridgeEvent::Devices(builtin_catalog())
        );

        client.send(BridgeRequest::Disconnect).await;
        assert_eq!(client.next_event().await, BridgeEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_raw_subscription_adds_raw_event() {
        let mut client = TestClient::start(echo());

        client.send(BridgeRequest::SubscribeRaw).await;
        client
            .send(BridgeRequest::Connect(builtin_catalog()[0].clone()))
            .await;
        assert_eq!(client.next_event().await, BridgeEvent::Connected(None));

        client.send(BridgeRequest::Write("\u{1}".into())).await;
        assert_eq!(client.next_event().await, BridgeEvent::Written(None));
        assert_eq!(
            client.next_event().await,
            BridgeEvent::DataRaw("\u{1}\n".into())
        );
        assert_eq!(
            client.next_event().await,
            BridgeEvent::Data("\u{1}\n".into())
        );
    }

    #[tokio::test]
    async fn test_stalled_device_does_not_block_client() {
        // The far end never reads, so the device takes only 8 bytes
        let (near, _far) = tokio::io::duplex(8);
        let mut client = TestClient::start_with(echo(), Some(Box::new(near) as BoxedDevice));

        client.send(BridgeRequest::Write("x".repeat(64))).await;
        client.send(BridgeRequest::List).await;
        assert_eq!(
            client.next_event().await,
            BridgeEvent::Devices(builtin_catalog())
        );

        client.send(BridgeRequest::Disconnect).await;
        assert_eq!(
            client.next_event().await,
            BridgeEvent::Written(Some("device disconnected".into()))
        );
        assert_eq!(client.next_event().await, BridgeEvent::Disconnected);
    }

    #[test]
    fn test_writes_complete_in_order() {
        let (near, _far) = tokio::io::duplex(64);
        let (_, half) = tokio::io::split(Box::new(near) as BoxedDevice);
        let mut writer = DeviceWriter::new(half);

        assert!(!writer.enqueue(b""));
        assert!(writer.enqueue(b"abc"));
        assert!(writer.enqueue(b""));
        assert!(writer.enqueue(b"de"));

        assert_eq!(writer.consume(2), 0);
        assert_eq!(writer.consume(2), 2);
        assert_eq!(writer.consume(1), 1);
        assert!(writer.queued.is_empty());
        assert!(writer.unacked.is_empty());
    }

    #[test]
    fn test_inbound_events_respect_raw_flag() {
        let backend = echo();
        let mut session = Session::new(&backend);
        assert_eq!(
            session.inbound_events(&[0xff]),
            vec![BridgeEvent::Data("\u{ff}".into())]
        );

        session.raw = true;
        assert_eq!(session.inbound_events(b"x").len(), 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn device_bytes_survive_the_wire(
                bytes in prop::collection::vec(any::<u8>(), 1..256)
            ) {
                let backend = echo();
                let mut session = Session::new(&backend);
                session.raw = true;

                for event in session.inbound_events(&bytes) {
                    session.queue_event(&event).unwrap();
                }
                let mut codec = EventCodec::new();
                codec.push_bytes(&session.outbound);

                let mut decoded = Vec::new();
                while let Some(event) = codec.next_message() {
                    match event {
                        BridgeEvent::Data(payload) | BridgeEvent::DataRaw(payload) => {
                            decoded.push(to_raw_bytes(&payload))
                        }
                        other => prop_assert!(false, "unexpected event: {:?}", other),
                    }
                }
                prop_assert_eq!(decoded, vec![bytes.clone(), bytes]);
            }
        }
    }
}
