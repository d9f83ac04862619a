//! A scriptable transport backend for integration tests: ports appear and
//! disappear on demand, inbound messages are injected by hand, outbound
//! bytes are captured.

#![allow(dead_code)]

use midilink::{
    Error, InputCallback, InputHandle, MidiBackend, OutputHandle, PortDescriptor, PortDirection,
    Result,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct FakeBackend {
    inputs: Mutex<Vec<String>>,
    outputs: Mutex<Vec<String>>,
    listeners: Arc<Mutex<Vec<(u64, InputCallback)>>>,
    next_listener_id: AtomicU64,
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_ports(&self, direction: PortDirection, names: &[&str]) {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        match direction {
            PortDirection::Input => *self.inputs.lock() = names,
            PortDirection::Output => *self.outputs.lock() = names,
        }
    }

    /// Simulate a device notification on every open input port.
    pub fn inject(&self, delta_time: f64, bytes: &[u8]) {
        for (_, callback) in self.listeners.lock().iter_mut() {
            callback(delta_time, bytes);
        }
    }
}

struct FakeInputHandle {
    listeners: Arc<Mutex<Vec<(u64, InputCallback)>>>,
    id: u64,
}

impl Drop for FakeInputHandle {
    fn drop(&mut self) {
        self.listeners.lock().retain(|(id, _)| *id != self.id);
    }
}

impl InputHandle for FakeInputHandle {}

struct FakeOutputHandle {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl OutputHandle for FakeOutputHandle {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent.lock().push(bytes.to_vec());
        Ok(())
    }
}

impl MidiBackend for FakeBackend {
    fn enumerate(&self, direction: PortDirection) -> Result<Vec<PortDescriptor>> {
        let names = match direction {
            PortDirection::Input => self.inputs.lock().clone(),
            PortDirection::Output => self.outputs.lock().clone(),
        };
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(index, name)| PortDescriptor { index, name })
            .collect())
    }

    fn open_input(&self, index: usize, callback: InputCallback) -> Result<Box<dyn InputHandle>> {
        if index >= self.inputs.lock().len() {
            return Err(Error::DeviceOpen(format!("no input port at index {index}")));
        }
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, callback));
        Ok(Box::new(FakeInputHandle {
            listeners: self.listeners.clone(),
            id,
        }))
    }

    fn open_output(&self, index: usize) -> Result<Box<dyn OutputHandle>> {
        if index >= self.outputs.lock().len() {
            return Err(Error::DeviceOpen(format!(
                "no output port at index {index}"
            )));
        }
        Ok(Box::new(FakeOutputHandle {
            sent: self.sent.clone(),
        }))
    }
}
