//! In-memory serial transport with a scripted fake joystick.
//!
//! # Why a fake device?
//!
//! The real joystick needs hardware, a USB-serial adapter, and a few seconds
//! of wall-clock time per handshake.  [`FakeDevice`] reproduces the firmware's
//! observable behaviour instead:
//!
//! - `'0'` is answered with `HELLO\r\n` (unless the device is mute).
//! - `'1'` switches it into streaming mode; from then on every read returns
//!   the next scripted chunk.
//! - `'2'` is recorded as a heartbeat.
//! - When the script runs out the device either goes silent, starts failing
//!   reads, or keeps repeating the last chunk.
//!
//! Every byte the host writes is recorded, and the device state is shared
//! through an `Arc`, so tests can inspect it after the link is dropped.
//!
//! # Exclusivity
//!
//! Like a real port, a fake device can be open at most once.  A second
//! `open` while a link is alive fails with [`TransportError::Open`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use joypointer_core::{HostCommand, HANDSHAKE_MARKER};

use super::transport::{SerialLink, SerialTransport, TransportError};

/// What the device does once its scripted chunks are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterScript {
    /// Reads wait out their bounded wait and return nothing.
    GoSilent,
    /// Reads fail with a transport error, as if the cable was pulled.
    FailReads,
    /// Reads keep returning the last scripted chunk.
    RepeatLast,
}

#[derive(Debug)]
struct DeviceState {
    answers_probe: bool,
    busy: bool,
    noise_on_open: Vec<u8>,
    script: VecDeque<Vec<u8>>,
    last_chunk: Vec<u8>,
    after_script: AfterScript,
    streaming: bool,
    pending: VecDeque<u8>,
    writes: Vec<u8>,
    opens: usize,
    open_links: usize,
    max_open_links: usize,
}

/// A scripted joystick behind a fake serial port.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeDevice {
    fn with_probe_reply(answers_probe: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                answers_probe,
                busy: false,
                noise_on_open: Vec::new(),
                script: VecDeque::new(),
                last_chunk: Vec::new(),
                after_script: AfterScript::GoSilent,
                streaming: false,
                pending: VecDeque::new(),
                writes: Vec::new(),
                opens: 0,
                open_links: 0,
                max_open_links: 0,
            })),
        }
    }

    /// A device that answers the probe with `HELLO`.
    pub fn joystick() -> Self {
        Self::with_probe_reply(true)
    }

    /// A device that opens fine but never answers.
    pub fn mute() -> Self {
        Self::with_probe_reply(false)
    }

    /// Chunks returned one per read once streaming has started.
    pub fn with_stream<I, B>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        {
            let mut state = self.lock();
            state.script = chunks.into_iter().map(|c| c.as_ref().to_vec()).collect();
            state.last_chunk = state.script.back().cloned().unwrap_or_default();
        }
        self
    }

    pub fn then(self, after: AfterScript) -> Self {
        self.lock().after_script = after;
        self
    }

    /// Bytes already waiting in the receive buffer when the port is opened.
    pub fn with_noise_on_open(self, noise: &[u8]) -> Self {
        self.lock().noise_on_open = noise.to_vec();
        self
    }

    /// Makes every `open` fail as if another process held the port.
    pub fn busy(self) -> Self {
        self.lock().busy = true;
        self
    }

    /// Every byte the host has written, in order.
    pub fn writes(&self) -> Vec<u8> {
        self.lock().writes.clone()
    }

    /// Number of times the host wrote `command`.
    pub fn count_of(&self, command: HostCommand) -> usize {
        self.lock()
            .writes
            .iter()
            .filter(|&&b| b == command.byte())
            .count()
    }

    /// Successful opens so far.
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    /// Links currently open.
    pub fn open_links(&self) -> usize {
        self.lock().open_links
    }

    /// Highest number of simultaneously open links ever observed.
    pub fn max_open_links(&self) -> usize {
        self.lock().max_open_links
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [`SerialTransport`] over a fixed set of fake devices.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    devices: HashMap<String, FakeDevice>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `device` at `port`.
    pub fn with_device(mut self, port: &str, device: FakeDevice) -> Self {
        self.devices.insert(port.to_string(), device);
        self
    }
}

impl SerialTransport for MockTransport {
    fn open(&self, port: &str) -> Result<Box<dyn SerialLink>, TransportError> {
        let open_err = |reason: &str| TransportError::Open {
            port: port.to_string(),
            reason: reason.to_string(),
        };

        let device = self.devices.get(port).ok_or_else(|| open_err("no such device"))?;
        {
            let mut state = device.lock();
            if state.busy || state.open_links > 0 {
                return Err(open_err("device or resource busy"));
            }
            state.opens += 1;
            state.open_links += 1;
            state.max_open_links = state.max_open_links.max(state.open_links);
            state.streaming = false;
            let noise = state.noise_on_open.clone();
            state.pending = noise.into_iter().collect();
        }

        Ok(Box::new(FakeLink {
            port: port.to_string(),
            device: device.clone(),
        }))
    }
}

struct FakeLink {
    port: String,
    device: FakeDevice,
}

impl FakeLink {
    fn read_err(&self) -> TransportError {
        TransportError::Read {
            port: self.port.clone(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device unplugged"),
        }
    }
}

impl SerialLink for FakeLink {
    fn port(&self) -> &str {
        &self.port
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.device.lock().pending.clear();
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.device.lock();
        for &byte in bytes {
            state.writes.push(byte);
            match HostCommand::from_byte(byte) {
                Some(HostCommand::Probe) if state.answers_probe => {
                    let reply = format!("{HANDSHAKE_MARKER}\r\n");
                    state.pending.extend(reply.bytes());
                }
                Some(HostCommand::StartStreaming) => state.streaming = true,
                _ => {}
            }
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, TransportError> {
        let mut state = self.device.lock();

        if state.pending.is_empty() && state.streaming {
            if let Some(chunk) = state.script.pop_front() {
                state.pending.extend(chunk);
            } else {
                match state.after_script {
                    AfterScript::GoSilent => {}
                    AfterScript::FailReads => return Err(self.read_err()),
                    AfterScript::RepeatLast => {
                        let chunk = state.last_chunk.clone();
                        state.pending.extend(chunk);
                    }
                }
            }
        }

        if state.pending.is_empty() {
            drop(state);
            std::thread::sleep(wait);
            return Ok(0);
        }

        let n = buf.len().min(state.pending.len());
        for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Drop for FakeLink {
    fn drop(&mut self) {
        let mut state = self.device.lock();
        state.open_links = state.open_links.saturating_sub(1);
    }
}
