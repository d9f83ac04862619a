//! Connection health monitoring and reattach-by-name.
//!
//! Each logical connection owns one monitor thread. The thread's command
//! loop doubles as the health-check scheduler: `recv_timeout` on the
//! command channel is the poll tick, so checks never overlap and outgoing
//! sends are serialized with rebinding. Teardown sends a shutdown command
//! (cancelling the pending tick), the thread closes the handle and exits,
//! then the owner joins it.

use crate::backend::{
    InputCallback, InputHandle, MidiBackend, OutputHandle, PortDescriptor, PortDirection,
};
use crate::error::{Error, Result};
use crate::event::{InboundMessage, MidiEvent};
use crate::loopback::{virtual_name, LoopbackGuard, VirtualLoopback};
use crate::resolver;
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Connection state as reported to status callbacks. Edge-triggered: a
/// callback fires on transitions only, never once per poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// What to do with wire messages the codec refuses to structure
/// (system/realtime status bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawPolicy {
    /// Deliver them as [`InboundMessage::Raw`].
    #[default]
    Forward,
    /// Drop them silently.
    Drop,
}

pub(crate) type EventSink = dyn Fn(InboundMessage) + Send + Sync;
pub(crate) type StatusSink = dyn Fn(LinkStatus) + Send + Sync;

enum Command {
    Send(Vec<u8>),
    Shutdown,
}

/// State readable from the consumer side without touching the monitor
/// thread: lock-free snapshots of the binding and the connected flag.
pub(crate) struct Shared {
    pub(crate) direction: PortDirection,
    pub(crate) desired_name: String,
    bound: ArcSwap<Option<PortDescriptor>>,
    connected: AtomicBool,
}

impl Shared {
    fn new(direction: PortDirection, desired_name: String) -> Arc<Self> {
        Arc::new(Shared {
            direction,
            desired_name,
            bound: ArcSwap::from_pointee(None),
            connected: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn bound_port(&self) -> Option<PortDescriptor> {
        self.bound.load().as_ref().clone()
    }
}

pub(crate) struct MonitorConfig {
    pub(crate) backend: Arc<dyn MidiBackend>,
    pub(crate) loopback: Arc<VirtualLoopback>,
    pub(crate) direction: PortDirection,
    pub(crate) desired_name: String,
    pub(crate) poll_interval: Duration,
    pub(crate) raw_policy: RawPolicy,
    pub(crate) filter: Option<Vec<u8>>,
    pub(crate) event_sink: Option<Arc<EventSink>>,
    pub(crate) status_sink: Option<Arc<StatusSink>>,
}

/// Consumer-side half of a logical connection: shared state plus the
/// command channel into the monitor thread.
pub(crate) struct ConnectionCore {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionCore {
    pub(crate) fn spawn(config: MonitorConfig) -> Self {
        let shared = Shared::new(config.direction, config.desired_name.clone());
        let (commands, command_rx) = bounded(1024);
        let monitor = Monitor::new(config, shared.clone());
        let thread = std::thread::Builder::new()
            .name(format!("midilink-{}", shared.desired_name))
            .spawn(move || monitor.run(command_rx))
            .expect("Failed to spawn connection monitor thread");
        ConnectionCore {
            shared,
            commands,
            thread: Mutex::new(Some(thread)),
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Hand already-encoded bytes to the monitor thread for dispatch.
    pub(crate) fn send_bytes(&self, bytes: Vec<u8>) -> Result<()> {
        match self.commands.try_send(Command::Send(bytes)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("MIDI send queue full, message dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::ConnectionClosed),
        }
    }

    /// Cancel the pending health check, close the handle, stop the thread.
    /// Idempotent and safe to call mid-check: the monitor finishes its
    /// current tick before seeing the shutdown command.
    pub(crate) fn close(&self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.lock().take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ConnectionCore {
    fn drop(&mut self) {
        self.close();
    }
}

enum PortHandle {
    Input(#[allow(dead_code)] Box<dyn InputHandle>),
    Output(Box<dyn OutputHandle>),
}

/// The monitor-thread side: owns the port handle and runs the two-state
/// machine. `handle` is `Some` exactly when a physical port is bound.
struct Monitor {
    backend: Arc<dyn MidiBackend>,
    loopback: Arc<VirtualLoopback>,
    shared: Arc<Shared>,
    poll_interval: Duration,
    raw_policy: RawPolicy,
    filter: Option<Vec<u8>>,
    event_sink: Option<Arc<EventSink>>,
    status_sink: Option<Arc<StatusSink>>,
    handle: Option<PortHandle>,
    loopback_guard: Option<LoopbackGuard>,
    /// Desired name is the reserved loopback name for this direction.
    is_virtual: bool,
}

impl Monitor {
    fn new(config: MonitorConfig, shared: Arc<Shared>) -> Self {
        let is_virtual = config.desired_name == virtual_name(config.direction);
        Monitor {
            backend: config.backend,
            loopback: config.loopback,
            shared,
            poll_interval: config.poll_interval,
            raw_policy: config.raw_policy,
            filter: config.filter,
            event_sink: config.event_sink,
            status_sink: config.status_sink,
            handle: None,
            loopback_guard: None,
            is_virtual,
        }
    }

    fn run(mut self, commands: Receiver<Command>) {
        self.startup();
        loop {
            match commands.recv_timeout(self.poll_interval) {
                Ok(Command::Send(bytes)) => self.dispatch(&bytes),
                Ok(Command::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => self.health_check(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.shutdown();
    }

    /// Bind the loopback for virtual names, then run the first health
    /// check immediately so a present device attaches without waiting a
    /// full poll interval.
    fn startup(&mut self) {
        if self.is_virtual {
            let guard = match self.shared.direction {
                PortDirection::Input => {
                    let callback = make_input_callback(
                        self.event_sink.clone(),
                        self.raw_policy,
                        self.filter.clone(),
                    );
                    self.loopback.acquire_reader(callback)
                }
                PortDirection::Output => self.loopback.acquire_writer(),
            };
            self.loopback_guard = Some(guard);
            debug!(name = %self.shared.desired_name, "bound to virtual loopback");
            self.transition(LinkStatus::Connected);
        }
        self.health_check();
    }

    /// One periodic re-validation pass.
    ///
    /// Virtual connections stay Connected regardless; for a virtual output
    /// the catalog pass manages the optional physical co-binding under the
    /// same name ("send to both" routing). A virtual input is loopback-only,
    /// so a hardware port carrying the reserved name never feeds a second
    /// stream into the sink.
    fn health_check(&mut self) {
        if self.is_virtual && self.shared.direction == PortDirection::Input {
            return;
        }
        let snapshot = match self.backend.enumerate(self.shared.direction) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Transient enumeration failure is not evidence of an
                // unplug; keep the current binding and retry next poll.
                trace!("port enumeration failed: {e}");
                return;
            }
        };

        if self.handle.is_some() && !self.binding_valid(&snapshot) {
            // Close before re-resolving
            self.handle = None;
            self.shared.bound.store(Arc::new(None));
            if self.is_virtual {
                debug!(name = %self.shared.desired_name, "physical co-binding lost");
            } else {
                debug!(name = %self.shared.desired_name, "device binding lost");
                self.transition(LinkStatus::Disconnected);
            }
        }

        if self.handle.is_none() {
            self.try_bind(&snapshot);
        }
    }

    /// A binding survives the check when its index is still in range and
    /// the catalog's name at that index is the name recorded at bind time.
    fn binding_valid(&self, snapshot: &[PortDescriptor]) -> bool {
        match self.shared.bound_port() {
            Some(bound) => snapshot
                .get(bound.index)
                .is_some_and(|current| current.name == bound.name),
            None => false,
        }
    }

    fn try_bind(&mut self, snapshot: &[PortDescriptor]) {
        let Some(descriptor) = resolver::resolve_in(snapshot, &self.shared.desired_name) else {
            // Device absent: expected steady state, keep polling
            return;
        };
        let descriptor = descriptor.clone();
        match self.open(descriptor.index) {
            Ok(handle) => {
                debug!(
                    port = %descriptor.name,
                    index = descriptor.index,
                    "bound to device"
                );
                self.handle = Some(handle);
                // Record the name the catalog reports, not the search
                // string: the next check compares against the device's
                // self-reported name.
                self.shared.bound.store(Arc::new(Some(descriptor)));
                if !self.is_virtual {
                    self.transition(LinkStatus::Connected);
                }
            }
            Err(e) => {
                warn!(port = %descriptor.name, "device open failed, will retry: {e}");
            }
        }
    }

    fn open(&self, index: usize) -> Result<PortHandle> {
        match self.shared.direction {
            PortDirection::Input => {
                let callback = make_input_callback(
                    self.event_sink.clone(),
                    self.raw_policy,
                    self.filter.clone(),
                );
                Ok(PortHandle::Input(self.backend.open_input(index, callback)?))
            }
            PortDirection::Output => Ok(PortHandle::Output(self.backend.open_output(index)?)),
        }
    }

    fn transition(&self, status: LinkStatus) {
        let now_connected = status == LinkStatus::Connected;
        let was_connected = self.shared.connected.swap(now_connected, Ordering::AcqRel);
        if was_connected != now_connected {
            if let Some(sink) = &self.status_sink {
                sink(status);
            }
        }
    }

    /// Write encoded bytes out. A virtual-output connection publishes to
    /// the loopback and, when a physical port of the same name is also
    /// bound, to that device as well.
    fn dispatch(&mut self, bytes: &[u8]) {
        let mut delivered = false;
        if self.is_virtual && self.shared.direction == PortDirection::Output {
            delivered |= self.loopback.publish(bytes);
        }
        if let Some(PortHandle::Output(handle)) = self.handle.as_mut() {
            match handle.send(bytes) {
                Ok(()) => delivered = true,
                Err(e) => warn!("device send failed: {e}"),
            }
        }
        if !delivered {
            debug!("cannot send MIDI message: nothing bound");
        }
    }

    fn shutdown(&mut self) {
        self.handle = None;
        self.loopback_guard = None;
        // Intentional teardown: no Disconnected callback, the consumer is
        // going away
        self.shared.connected.store(false, Ordering::Release);
        self.shared.bound.store(Arc::new(None));
    }
}

/// Decode-and-forward closure handed to the backend (or the loopback) when
/// a port opens. Runs on the device notification; no queueing. A filter, if
/// set, compares the wire bytes before any decoding: only exact matches go
/// through.
fn make_input_callback(
    event_sink: Option<Arc<EventSink>>,
    raw_policy: RawPolicy,
    filter: Option<Vec<u8>>,
) -> InputCallback {
    Box::new(move |delta_time, bytes| {
        let Some(sink) = event_sink.as_ref() else {
            return;
        };
        if let Some(wanted) = &filter {
            if bytes != wanted.as_slice() {
                trace!("inbound message filtered out");
                return;
            }
        }
        match MidiEvent::decode(bytes, delta_time) {
            Ok(event) => sink(InboundMessage::Event(event)),
            Err(Error::UnsupportedStatus(_)) if raw_policy == RawPolicy::Forward => {
                sink(InboundMessage::Raw {
                    delta_time,
                    bytes: bytes.to_vec(),
                })
            }
            Err(e) => trace!("inbound message dropped: {e}"),
        }
    })
}
