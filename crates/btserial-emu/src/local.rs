//! Local emulated transport
//!
//! The transport task owns an [`Emulator`] and uses a `select!` loop to:
//! - Apply operations received from [`BluetoothSerial`](crate::BluetoothSerial) handles
//! - Run the processing hook on every timer tick while a hook timer is live

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::command::SerialCommand;
use crate::config::EmulatorConfig;
use crate::emulator::Emulator;
use crate::state::TimerHandle;
use crate::transport::{SerialTransport, TransportMode};

/// In-process transport backed by a byte channel and a processing hook
#[derive(Debug)]
pub struct LocalEmulatedTransport {
    emulator: Emulator,
    tick_interval: Duration,
}

impl LocalEmulatedTransport {
    /// Create a transport with a fresh emulator
    pub fn new(config: &EmulatorConfig) -> Self {
        Self::with_emulator(Emulator::new(), config.tick_interval())
    }

    /// Create a transport around a pre-populated emulator
    pub fn with_emulator(emulator: Emulator, tick_interval: Duration) -> Self {
        Self {
            emulator,
            tick_interval,
        }
    }

    /// Apply one operation to the emulator
    fn handle_command(&mut self, cmd: SerialCommand) {
        debug!("Local transport handling {:?}", cmd);
        let emu = &mut self.emulator;

        // Reply send errors mean the caller stopped waiting; nothing to do
        match cmd {
            SerialCommand::Connect { device, reply } => {
                emu.connect(&device);
                let _ = reply.send(Ok(()));
            }
            SerialCommand::Disconnect { reply } => {
                emu.disconnect();
                let _ = reply.send(Ok(()));
            }
            SerialCommand::Register { hook, reply } => {
                let timer = emu.register_boxed(hook);
                info!("Processing hook registered ({})", timer);
                let _ = reply.send(Ok(()));
            }
            SerialCommand::Write { data, reply } => {
                emu.write(&data);
                let _ = reply.send(Ok(()));
            }
            SerialCommand::Available { reply } => {
                let _ = reply.send(Ok(emu.available()));
            }
            SerialCommand::Read { reply } => {
                let _ = reply.send(Ok(emu.read()));
            }
            SerialCommand::ReadUntil { delimiter, reply } => {
                let _ = reply.send(Ok(emu.read_until(&delimiter)));
            }
            SerialCommand::Subscribe {
                delimiter,
                callback,
                reply,
            } => {
                emu.subscribe(&delimiter, callback);
                let _ = reply.send(Ok(()));
            }
            SerialCommand::Unsubscribe { reply } => {
                emu.unsubscribe();
                let _ = reply.send(Ok(()));
            }
            SerialCommand::SubscribeRaw { callback, reply } => {
                // No local driver feeds the raw path
                emu.subscribe_raw(callback);
                let _ = reply.send(Ok(()));
            }
            SerialCommand::UnsubscribeRaw { reply } => {
                emu.unsubscribe_raw();
                let _ = reply.send(Ok(()));
            }
            SerialCommand::Clear { reply } => {
                emu.clear();
                let _ = reply.send(Ok(()));
            }
            SerialCommand::List { reply } => {
                let _ = reply.send(Ok(emu.list()));
            }
            SerialCommand::IsConnected { reply } => {
                let _ = reply.send(emu.is_connected());
            }
            SerialCommand::IsEnabled { reply } => {
                let _ = reply.send(emu.is_enabled());
            }
            SerialCommand::Enable { reply } => {
                emu.enable();
                let _ = reply.send(Ok(()));
            }
            SerialCommand::Shutdown => {}
        }
    }
}

impl SerialTransport for LocalEmulatedTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Local
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SerialCommand>) {
        info!(
            "Starting local emulated transport (tick every {:?})",
            self.tick_interval
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut armed: Option<TimerHandle> = self.emulator.timer();
        if armed.is_some() {
            ticker.reset();
        }

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SerialCommand::Shutdown) => {
                            info!("Shutdown requested for local transport");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            debug!("All handles dropped, stopping local transport");
                            break;
                        }
                    }

                    // A new registration restarts the period from now
                    let timer = self.emulator.timer();
                    if timer != armed {
                        if timer.is_some() {
                            ticker.reset();
                        }
                        armed = timer;
                    }
                }

                _ = ticker.tick(), if armed.is_some() => {
                    self.emulator.tick();
                }
            }
        }

        info!("Local emulated transport ended");
    }
}
