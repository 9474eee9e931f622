//! Bridged transport
//!
//! Forwards operations to a bridge host over any byte stream (TCP in
//! practice, `tokio::io::duplex` in tests). The task uses a `select!` loop to:
//! - Turn operations into [`BridgeRequest`] lines, parking their replies in
//!   single-slot acknowledgement registries
//! - Decode [`BridgeEvent`] lines from the host, resolving parked replies and
//!   delivering inbound data
//!
//! The processing hook never runs in this mode. Each inbound `data` event
//! replaces the output buffer, so `read`/`available` report the latest host
//! payload and unread bytes never pile up under a subscription.
//!
//! Requests are queued and written by their own `select!` branch, so a host
//! that stops reading never blocks event handling.
//!
//! Each acknowledgement kind has one slot. A second request of the same kind
//! issued before the first is acknowledged takes over the slot; the earlier
//! caller fails with [`SerialError::Superseded`]. There is no timeout: a
//! request whose acknowledgement never arrives stays pending until the
//! transport stops.

use btserial_protocol::{
    encode_message, AckKind, BridgeEvent, BridgeRequest, DeviceDescriptor, EventCodec,
    MessageCodec,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::{Reply, SerialCommand};
use crate::emulator::Emulator;
use crate::error::SerialError;
use crate::transport::{SerialTransport, TransportMode};

/// Replies waiting for a bridge acknowledgement, one slot per kind
#[derive(Default)]
struct PendingAcks {
    connected: Option<Reply<()>>,
    disconnected: Option<Reply<()>>,
    written: Option<Reply<()>>,
    devices: Option<Reply<Vec<DeviceDescriptor>>>,
}

impl PendingAcks {
    /// Park `reply` in `slot`, failing whichever caller held it before
    fn park<T>(slot: &mut Option<Reply<T>>, reply: Reply<T>, kind: AckKind) {
        if let Some(previous) = slot.replace(reply) {
            warn!(
                "Overlapping {} requests; earlier caller will not be acknowledged",
                kind.name()
            );
            let _ = previous.send(Err(SerialError::Superseded(kind.name())));
        }
    }

    /// Slot for a unit reply; device lists have their own typed slot
    fn unit_slot(&mut self, kind: AckKind) -> Option<&mut Option<Reply<()>>> {
        match kind {
            AckKind::Connected => Some(&mut self.connected),
            AckKind::Disconnected => Some(&mut self.disconnected),
            AckKind::Written => Some(&mut self.written),
            AckKind::Devices => None,
        }
    }

    /// Hold `reply` until the acknowledgement `request` expects arrives
    ///
    /// Requests without an acknowledgement are answered at once.
    fn track(&mut self, request: &BridgeRequest, reply: Reply<()>) {
        if let Some(kind) = request.expected_ack() {
            if let Some(slot) = self.unit_slot(kind) {
                Self::park(slot, reply, kind);
                return;
            }
        }
        let _ = reply.send(Ok(()));
    }

    /// Answer the unit reply waiting for `kind`, if any
    fn resolve(&mut self, kind: AckKind, result: Result<(), SerialError>) {
        if let Some(reply) = self.unit_slot(kind).and_then(Option::take) {
            let _ = reply.send(result);
        }
    }

    fn is_waiting(&self, kind: AckKind) -> bool {
        match kind {
            AckKind::Connected => self.connected.is_some(),
            AckKind::Disconnected => self.disconnected.is_some(),
            AckKind::Written => self.written.is_some(),
            AckKind::Devices => self.devices.is_some(),
        }
    }

    fn is_empty(&self) -> bool {
        self.connected.is_none()
            && self.disconnected.is_none()
            && self.written.is_none()
            && self.devices.is_none()
    }
}

/// Map an acknowledgement's error payload to a reply
fn ack_result(error: Option<String>) -> Result<(), SerialError> {
    error.map_or(Ok(()), |e| Err(SerialError::Bridge(e)))
}

/// Connection state mirrored on the client side of the bridge
#[derive(Default)]
struct BridgeSession {
    emulator: Emulator,
    pending: PendingAcks,
}

impl BridgeSession {
    /// Apply one operation
    ///
    /// Returns the request to forward to the host, if any. Replies for
    /// acknowledged requests are parked before the request is returned.
    fn handle_command(&mut self, cmd: SerialCommand) -> Option<BridgeRequest> {
        debug!("Bridged transport handling {:?}", cmd);
        let emu = &mut self.emulator;

        let (request, reply) = match cmd {
            SerialCommand::Connect { device, reply } => (BridgeRequest::Connect(device), reply),
            SerialCommand::Disconnect { reply } => (BridgeRequest::Disconnect, reply),
            SerialCommand::Write { data, reply } => (BridgeRequest::Write(data), reply),
            SerialCommand::List { reply } => {
                PendingAcks::park(&mut self.pending.devices, reply, AckKind::Devices);
                return Some(BridgeRequest::List);
            }
            SerialCommand::Subscribe {
                delimiter,
                callback,
                reply,
            } => {
                emu.subscribe(&delimiter, callback);
                (BridgeRequest::Subscribe, reply)
            }
            SerialCommand::Unsubscribe { reply } => {
                emu.unsubscribe();
                (BridgeRequest::Unsubscribe, reply)
            }
            SerialCommand::SubscribeRaw { callback, reply } => {
                emu.subscribe_raw(callback);
                (BridgeRequest::SubscribeRaw, reply)
            }
            SerialCommand::UnsubscribeRaw { reply } => {
                emu.unsubscribe_raw();
                (BridgeRequest::UnsubscribeRaw, reply)
            }
            SerialCommand::Register { reply, .. } => {
                warn!("Processing hook ignored: the bridge host emulates the device");
                let _ = reply.send(Ok(()));
                return None;
            }
            SerialCommand::Available { reply } => {
                let _ = reply.send(Ok(emu.available()));
                return None;
            }
            SerialCommand::Read { reply } => {
                let _ = reply.send(Ok(emu.read()));
                return None;
            }
            SerialCommand::ReadUntil { delimiter, reply } => {
                let _ = reply.send(Ok(emu.read_until(&delimiter)));
                return None;
            }
            SerialCommand::Clear { reply } => {
                emu.clear();
                let _ = reply.send(Ok(()));
                return None;
            }
            SerialCommand::IsConnected { reply } => {
                let _ = reply.send(emu.is_connected());
                return None;
            }
            SerialCommand::IsEnabled { reply } => {
                let _ = reply.send(emu.is_enabled());
                return None;
            }
            SerialCommand::Enable { reply } => {
                emu.enable();
                let _ = reply.send(Ok(()));
                return None;
            }
            SerialCommand::Shutdown => return None,
        };

        self.pending.track(&request, reply);
        Some(request)
    }

    /// Apply one event from the host
    fn handle_event(&mut self, event: BridgeEvent) {
        if let Some(kind) = event.ack_kind() {
            if !self.pending.is_waiting(kind) {
                debug!("Ignoring unsolicited {} acknowledgement", kind.name());
                return;
            }
        }

        match event {
            BridgeEvent::Connected(error) => {
                match &error {
                    Some(e) => warn!("Bridge connect failed: {}", e),
                    None => info!("Bridge connected"),
                }
                self.emulator.set_connected(error.is_none());
                self.pending.resolve(AckKind::Connected, ack_result(error));
            }
            BridgeEvent::Disconnected => {
                info!("Bridge disconnected");
                self.emulator.set_connected(false);
                self.pending.resolve(AckKind::Disconnected, Ok(()));
            }
            BridgeEvent::Written(error) => {
                self.pending.resolve(AckKind::Written, ack_result(error));
            }
            BridgeEvent::Devices(devices) => {
                if let Some(reply) = self.pending.devices.take() {
                    let _ = reply.send(Ok(devices));
                }
            }
            BridgeEvent::Data(data) => {
                debug!("Bridge data: {:?}", data);
                self.emulator.channel_mut().replace_output(&data);
                self.emulator.subscriptions_mut().deliver_text(&data);
            }
            BridgeEvent::DataRaw(data) => {
                debug!("Bridge raw data: {} chars", data.chars().count());
                self.emulator.subscriptions_mut().deliver_raw(&data);
            }
        }
    }
}

/// Transport that forwards operations to a bridge host
pub struct BridgedTransport<S> {
    stream: S,
    session: BridgeSession,
}

impl<S> std::fmt::Debug for BridgedTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgedTransport")
            .field("stream", &"<stream>")
            .field("emulator", &self.session.emulator)
            .finish()
    }
}

impl<S> BridgedTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Create a transport over a connected stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            session: BridgeSession::default(),
        }
    }
}

impl<S> SerialTransport for BridgedTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn mode(&self) -> TransportMode {
        TransportMode::Bridged
    }

    async fn run(self, mut cmd_rx: mpsc::Receiver<SerialCommand>) {
        let Self {
            stream,
            mut session,
        } = self;
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut codec = EventCodec::new();
        let mut buf = [0u8; 1024];
        // Encoded request lines not yet accepted by the stream
        let mut outbound: Vec<u8> = Vec::new();

        info!("Starting bridged transport");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let cmd = match cmd {
                        Some(SerialCommand::Shutdown) => {
                            info!("Shutdown requested for bridged transport");
                            break;
                        }
                        Some(cmd) => cmd,
                        None => {
                            debug!("All handles dropped, stopping bridged transport");
                            break;
                        }
                    };

                    let Some(request) = session.handle_command(cmd) else {
                        continue;
                    };
                    match encode_message(&request) {
                        Ok(line) => outbound.extend_from_slice(&line),
                        Err(e) => warn!("Failed to encode {:?}: {}", request, e),
                    }
                }

                result = writer.write(&outbound), if !outbound.is_empty() => {
                    match result {
                        Ok(0) => {
                            warn!("Bridge host stopped accepting requests");
                            break;
                        }
                        Ok(n) => {
                            outbound.drain(..n);
                        }
                        Err(e) => {
                            warn!("Failed to forward requests to bridge: {}", e);
                            break;
                        }
                    }
                }

                result = reader.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            info!("Bridge host closed the connection");
                            break;
                        }
                        Ok(n) => {
                            codec.push_bytes(&buf[..n]);
                            while let Some(event) = codec.next_message() {
                                session.handle_event(event);
                            }
                        }
                        Err(e) => {
                            warn!("Bridge stream error: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        if !outbound.is_empty() {
            debug!("Dropping {} unsent request bytes", outbound.len());
        }
        if !session.pending.is_empty() {
            debug!("Dropping unacknowledged bridge requests");
        }
        info!("Bridged transport ended");
    }
}
