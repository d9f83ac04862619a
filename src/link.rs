//! `MidiLink` - the entry point owning the backend and connection defaults.

use crate::backend::{MidiBackend, PortDescriptor, PortDirection};
use crate::catalog::PortCatalog;
use crate::error::Result;
use crate::event::{InboundMessage, MidiEvent};
use crate::loopback::{virtual_name, VirtualLoopback};
use crate::monitor::{
    ConnectionCore, EventSink, LinkStatus, MonitorConfig, RawPolicy, StatusSink,
    DEFAULT_POLL_INTERVAL,
};
use std::sync::Arc;
use std::time::Duration;

/// Owns the transport backend, the shared virtual loopback pair, and the
/// defaults every connection inherits. Clone is cheap (Arc internally).
///
/// # Example
///
/// ```ignore
/// let link = MidiLink::builder().build()?;
///
/// let output = link.output("Synth 1").connect();
/// output.send(&MidiEvent::note_on(1, 60, 100))?;
///
/// let _input = link
///     .input("Keyboard")
///     .events(|msg| println!("{msg:?}"))
///     .status(|status| println!("{status:?}"))
///     .connect();
/// ```
#[derive(Clone)]
pub struct MidiLink {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    backend: Arc<dyn MidiBackend>,
    loopback: Arc<VirtualLoopback>,
    poll_interval: Duration,
    raw_policy: RawPolicy,
}

impl MidiLink {
    pub fn builder() -> MidiLinkBuilder {
        MidiLinkBuilder::default()
    }

    /// Port names for UI population: the live catalog plus the reserved
    /// virtual name for the direction. A catalog port already carrying the
    /// reserved name is not listed twice.
    pub fn list_ports(&self, direction: PortDirection) -> Result<Vec<String>> {
        let mut names = self.catalog().names(direction)?;
        let reserved = virtual_name(direction);
        if !names.iter().any(|name| name == reserved) {
            names.push(reserved.to_string());
        }
        Ok(names)
    }

    pub fn catalog(&self) -> PortCatalog {
        PortCatalog::new(self.inner.backend.clone())
    }

    /// Start building an input connection bound by logical name.
    pub fn input(&self, desired_name: impl Into<String>) -> InputBuilder {
        InputBuilder {
            link: self.clone(),
            desired_name: desired_name.into(),
            filter: None,
            event_sink: None,
            status_sink: None,
        }
    }

    /// Start building an output connection bound by logical name.
    pub fn output(&self, desired_name: impl Into<String>) -> OutputBuilder {
        OutputBuilder {
            link: self.clone(),
            desired_name: desired_name.into(),
            status_sink: None,
        }
    }

    fn spawn(
        &self,
        direction: PortDirection,
        desired_name: String,
        filter: Option<Vec<u8>>,
        event_sink: Option<Arc<EventSink>>,
        status_sink: Option<Arc<StatusSink>>,
    ) -> ConnectionCore {
        ConnectionCore::spawn(MonitorConfig {
            backend: self.inner.backend.clone(),
            loopback: self.inner.loopback.clone(),
            direction,
            desired_name,
            poll_interval: self.inner.poll_interval,
            raw_policy: self.inner.raw_policy,
            filter,
            event_sink,
            status_sink,
        })
    }
}

impl std::fmt::Debug for MidiLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiLink")
            .field("poll_interval", &self.inner.poll_interval)
            .field("raw_policy", &self.inner.raw_policy)
            .finish_non_exhaustive()
    }
}

pub struct MidiLinkBuilder {
    backend: Option<Arc<dyn MidiBackend>>,
    client_name: String,
    poll_interval: Duration,
    raw_policy: RawPolicy,
}

impl Default for MidiLinkBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            client_name: "midilink".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            raw_policy: RawPolicy::default(),
        }
    }
}

impl MidiLinkBuilder {
    /// Supply a transport backend. Without one, `build` uses the midir
    /// backend (requires the `midi-io` feature).
    pub fn backend(mut self, backend: Arc<dyn MidiBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Client name the default backend registers with the OS MIDI system.
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Health-check cadence for every connection (default 2000 ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Policy for undecodable (system/realtime) inbound messages.
    pub fn raw_policy(mut self, policy: RawPolicy) -> Self {
        self.raw_policy = policy;
        self
    }

    pub fn build(self) -> Result<MidiLink> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => Self::default_backend(&self.client_name)?,
        };
        Ok(MidiLink {
            inner: Arc::new(LinkInner {
                backend,
                loopback: VirtualLoopback::new(),
                poll_interval: self.poll_interval,
                raw_policy: self.raw_policy,
            }),
        })
    }

    #[cfg(feature = "midi-io")]
    fn default_backend(client_name: &str) -> Result<Arc<dyn MidiBackend>> {
        let backend: Arc<dyn MidiBackend> = Arc::new(crate::io::MidirBackend::new(client_name));
        Ok(backend)
    }

    #[cfg(not(feature = "midi-io"))]
    fn default_backend(_client_name: &str) -> Result<Arc<dyn MidiBackend>> {
        Err(crate::error::Error::Backend(
            "no MIDI backend configured (enable the midi-io feature or call .backend())".into(),
        ))
    }
}

pub struct InputBuilder {
    link: MidiLink,
    desired_name: String,
    filter: Option<Vec<u8>>,
    event_sink: Option<Arc<EventSink>>,
    status_sink: Option<Arc<StatusSink>>,
}

impl InputBuilder {
    /// Deliver only messages whose wire bytes equal `bytes` exactly;
    /// everything else is dropped before decoding.
    pub fn filter(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.filter = Some(bytes.into());
        self
    }

    /// Sink receiving every decoded event (and raw pass-throughs, per the
    /// link's [`RawPolicy`]). Called synchronously on the device
    /// notification thread.
    pub fn events(mut self, sink: impl Fn(InboundMessage) + Send + Sync + 'static) -> Self {
        self.event_sink = Some(Arc::new(sink));
        self
    }

    /// Edge-triggered status callback.
    pub fn status(mut self, sink: impl Fn(LinkStatus) + Send + Sync + 'static) -> Self {
        self.status_sink = Some(Arc::new(sink));
        self
    }

    /// Spawn the connection monitor. The returned connection starts
    /// Disconnected and binds as soon as a health check finds the port.
    pub fn connect(self) -> InputConnection {
        InputConnection {
            core: self.link.spawn(
                PortDirection::Input,
                self.desired_name,
                self.filter,
                self.event_sink,
                self.status_sink,
            ),
        }
    }
}

pub struct OutputBuilder {
    link: MidiLink,
    desired_name: String,
    status_sink: Option<Arc<StatusSink>>,
}

impl OutputBuilder {
    /// Edge-triggered status callback.
    pub fn status(mut self, sink: impl Fn(LinkStatus) + Send + Sync + 'static) -> Self {
        self.status_sink = Some(Arc::new(sink));
        self
    }

    pub fn connect(self) -> OutputConnection {
        OutputConnection {
            core: self.link.spawn(
                PortDirection::Output,
                self.desired_name,
                None,
                None,
                self.status_sink,
            ),
        }
    }
}

/// A monitored input connection. Events arrive at the sink registered via
/// [`InputBuilder::events`]; dropping (or [`close`](Self::close)) tears the
/// monitor down.
pub struct InputConnection {
    core: ConnectionCore,
}

impl InputConnection {
    pub fn desired_name(&self) -> &str {
        &self.core.shared().desired_name
    }

    pub fn direction(&self) -> PortDirection {
        self.core.shared().direction
    }

    pub fn is_connected(&self) -> bool {
        self.core.shared().is_connected()
    }

    /// The port currently bound, with the name the catalog reported for it
    /// (which may differ from the desired name after a replug).
    pub fn bound_port(&self) -> Option<PortDescriptor> {
        self.core.shared().bound_port()
    }

    /// Idempotent teardown: cancels the pending health check, then closes
    /// the handle.
    pub fn close(&self) {
        self.core.close();
    }
}

/// A monitored output connection accepting structured events or raw bytes.
pub struct OutputConnection {
    core: ConnectionCore,
}

impl OutputConnection {
    pub fn desired_name(&self) -> &str {
        &self.core.shared().desired_name
    }

    pub fn direction(&self) -> PortDirection {
        self.core.shared().direction
    }

    pub fn is_connected(&self) -> bool {
        self.core.shared().is_connected()
    }

    pub fn bound_port(&self) -> Option<PortDescriptor> {
        self.core.shared().bound_port()
    }

    /// Encode and send. Encoding errors (`InvalidChannel`) surface here
    /// synchronously; transport happens on the monitor thread.
    pub fn send(&self, event: &MidiEvent) -> Result<()> {
        let bytes = event.encode()?;
        self.core.send_bytes(bytes)
    }

    /// Send pre-encoded bytes unchanged (SysEx pass-through and the like).
    pub fn send_raw(&self, bytes: Vec<u8>) -> Result<()> {
        self.core.send_bytes(bytes)
    }

    pub fn close(&self) {
        self.core.close();
    }
}
