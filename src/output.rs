//! Audio transports and the output stage.
//!
//! The output stage re-sends the newest parameter snapshot at a fixed rate
//! whether or not it changed, so the sound engine never starves while the
//! gesture side is slow or idle.

use crate::latch::Latch;
use crate::params::{AudioParameters, ParamValue};
use crate::stage::StageTask;
use crate::{Error, Result};
use log::{debug, info};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Sink for audio parameter snapshots
pub trait Transport: Send {
    /// Open the channel to the sound engine
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached or resolved
    fn connect(&mut self) -> Result<()>;

    /// Send one full snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot could not be encoded or sent
    fn transmit(&mut self, audio_params: &AudioParameters) -> Result<()>;

    /// Close the channel
    fn cleanup(&mut self);

    /// Get transport name
    fn name(&self) -> &str;
}

/// OSC route for a parameter name
#[must_use]
pub fn osc_address(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

/// Build the OSC message for one parameter
///
/// # Errors
///
/// Returns an error for an empty name or a non-finite value
pub fn osc_message(name: &str, value: ParamValue) -> Result<OscMessage> {
    if name.trim_start_matches('/').is_empty() {
        return Err(Error::ParameterShape("Empty parameter name".to_string()));
    }
    let arg = match value {
        ParamValue::Bool(b) => OscType::Bool(b),
        ParamValue::Int(i) => OscType::Int(i),
        ParamValue::Float(f) if f.is_finite() => OscType::Float(f as f32),
        ParamValue::Float(f) => {
            return Err(Error::ParameterShape(format!("{name} is not finite: {f}")));
        }
    };
    Ok(OscMessage {
        addr: osc_address(name),
        args: vec![arg],
    })
}

/// Sends every parameter as its own OSC message over UDP
pub struct OscTransport {
    host: String,
    port: u16,
    target: Option<SocketAddr>,
    socket: Option<UdpSocket>,
}

impl OscTransport {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            target: None,
            socket: None,
        }
    }
}

impl Transport for OscTransport {
    fn connect(&mut self) -> Result<()> {
        let target = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| Error::Transport(format!("Cannot resolve {}:{}: {e}", self.host, self.port)))?
            .next()
            .ok_or_else(|| Error::Transport(format!("No address for {}:{}", self.host, self.port)))?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| Error::Transport(format!("Cannot bind OSC socket: {e}")))?;

        info!("Sending OSC to {target}");
        self.target = Some(target);
        self.socket = Some(socket);
        Ok(())
    }

    fn transmit(&mut self, audio_params: &AudioParameters) -> Result<()> {
        let (Some(socket), Some(target)) = (&self.socket, self.target) else {
            return Err(Error::Transport("OSC transport is not connected".to_string()));
        };
        for (name, value) in audio_params.iter() {
            let packet = OscPacket::Message(osc_message(name, value)?);
            let data = encoder::encode(&packet)
                .map_err(|e| Error::ParameterShape(format!("Cannot encode {name}: {e:?}")))?;
            socket
                .send_to(&data, target)
                .map_err(|e| Error::Transport(format!("Send to {target} failed: {e}")))?;
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        self.socket = None;
        self.target = None;
    }

    fn name(&self) -> &str {
        "osc"
    }
}

/// Logs snapshots instead of sending them
#[derive(Debug, Default)]
pub struct LogTransport {
    sent: u64,
}

impl LogTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for LogTransport {
    fn connect(&mut self) -> Result<()> {
        info!("Audio output goes to the log");
        Ok(())
    }

    fn transmit(&mut self, audio_params: &AudioParameters) -> Result<()> {
        self.sent += 1;
        debug!("Audio parameters #{}: {audio_params}", self.sent);
        Ok(())
    }

    fn cleanup(&mut self) {
        info!("Log transport sent {} snapshots", self.sent);
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Consumer stage: retransmits the latest parameters at a fixed rate
pub struct OutputStage {
    transport: Box<dyn Transport>,
    audio_params: Arc<Latch<AudioParameters>>,
    period: Duration,
    next_send: Instant,
}

impl OutputStage {
    /// # Errors
    ///
    /// Returns an error if `rate_hz` is not a positive finite rate
    pub fn new(
        transport: Box<dyn Transport>,
        audio_params: Arc<Latch<AudioParameters>>,
        rate_hz: f64,
    ) -> Result<Self> {
        let period = Some(rate_hz)
            .filter(|r| *r > 0.0)
            .and_then(|r| Duration::try_from_secs_f64(1.0 / r).ok())
            .ok_or_else(|| Error::InvalidInput(format!("Invalid output rate: {rate_hz}")))?;
        Ok(Self {
            transport,
            audio_params,
            period,
            next_send: Instant::now(),
        })
    }

    fn pace(&mut self) {
        let now = Instant::now();
        if self.next_send > now {
            thread::sleep(self.next_send - now);
        }
        // A late cycle does not trigger a burst of catch-up sends
        self.next_send = self.next_send.max(now) + self.period;
    }
}

impl StageTask for OutputStage {
    fn name(&self) -> &str {
        "output"
    }

    fn configure(&mut self) -> Result<()> {
        info!(
            "Connecting {} transport, sending every {:?}",
            self.transport.name(),
            self.period
        );
        self.transport.connect()?;
        self.next_send = Instant::now();
        Ok(())
    }

    fn perform_cycle(&mut self) -> Result<()> {
        self.pace();
        let snapshot = self.audio_params.read();
        if snapshot.is_empty() {
            return Ok(());
        }
        self.transport.transmit(&snapshot)
    }

    fn cleanup(&mut self) {
        self.transport.cleanup();
    }
}
