//! The in-process virtual loopback pair.
//!
//! A fixed pair of software-only pseudo-ports under reserved names, used to
//! inject host-originated MIDI into the flow and to capture MIDI addressed
//! to the host. Always available, never backed by hardware. The pair is
//! reference-counted across every connection bound to it: opened on first
//! acquire, closed when the last guard drops, never in between.

use crate::backend::PortDirection;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Reserved name of the virtual input a downstream consumer reads.
pub const VIRTUAL_INPUT_NAME: &str = "to Host";

/// Reserved name of the virtual output nodes write host-bound MIDI to.
pub const VIRTUAL_OUTPUT_NAME: &str = "from Host";

/// The reserved loopback name for a direction.
pub fn virtual_name(direction: PortDirection) -> &'static str {
    match direction {
        PortDirection::Input => VIRTUAL_INPUT_NAME,
        PortDirection::Output => VIRTUAL_OUTPUT_NAME,
    }
}

type ReaderCallback = Box<dyn FnMut(f64, &[u8]) + Send + 'static>;

struct Reader {
    id: u64,
    callback: ReaderCallback,
}

struct Inner {
    refcount: usize,
    open: bool,
    next_reader_id: u64,
    last_publish: Option<Instant>,
    readers: Vec<Reader>,
}

/// The shared loopback pair. One instance per [`MidiLink`].
///
/// One mutex serializes the refcount, the open/close transition, and
/// delivery. Reader callbacks run under that lock and must not call back
/// into the loopback.
///
/// [`MidiLink`]: crate::MidiLink
pub struct VirtualLoopback {
    inner: Mutex<Inner>,
}

impl VirtualLoopback {
    pub fn new() -> Arc<Self> {
        Arc::new(VirtualLoopback {
            inner: Mutex::new(Inner {
                refcount: 0,
                open: false,
                next_reader_id: 0,
                last_publish: None,
                readers: Vec::new(),
            }),
        })
    }

    /// Acquire the pair for writing. Opens it if this is the first holder.
    pub fn acquire_writer(self: &Arc<Self>) -> LoopbackGuard {
        self.acquire(None)
    }

    /// Acquire the pair for reading; `callback` receives every published
    /// message until the guard drops.
    pub fn acquire_reader(
        self: &Arc<Self>,
        callback: impl FnMut(f64, &[u8]) + Send + 'static,
    ) -> LoopbackGuard {
        self.acquire(Some(Box::new(callback)))
    }

    fn acquire(self: &Arc<Self>, callback: Option<ReaderCallback>) -> LoopbackGuard {
        let mut inner = self.inner.lock();
        inner.refcount += 1;
        if inner.refcount == 1 {
            inner.open = true;
            tracing::debug!("virtual loopback pair opened");
        }
        let reader_id = callback.map(|callback| {
            let id = inner.next_reader_id;
            inner.next_reader_id += 1;
            inner.readers.push(Reader { id, callback });
            id
        });
        LoopbackGuard {
            loopback: Arc::clone(self),
            reader_id,
        }
    }

    /// Deliver `bytes` synchronously to every reader. Returns `false` when
    /// the pair has no holders (nothing bound to it).
    pub fn publish(&self, bytes: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        if !inner.open {
            return false;
        }
        let now = Instant::now();
        let delta_time = inner
            .last_publish
            .map(|prev| now.duration_since(prev).as_secs_f64())
            .unwrap_or(0.0);
        inner.last_publish = Some(now);
        for reader in inner.readers.iter_mut() {
            (reader.callback)(delta_time, bytes);
        }
        true
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    pub fn refcount(&self) -> usize {
        self.inner.lock().refcount
    }

    fn release(&self, reader_id: Option<u64>) {
        let mut inner = self.inner.lock();
        if let Some(id) = reader_id {
            inner.readers.retain(|r| r.id != id);
        }
        inner.refcount -= 1;
        if inner.refcount == 0 {
            inner.open = false;
            inner.last_publish = None;
            tracing::debug!("virtual loopback pair closed");
        }
    }
}

impl std::fmt::Debug for VirtualLoopback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("VirtualLoopback")
            .field("refcount", &inner.refcount)
            .field("open", &inner.open)
            .field("readers", &inner.readers.len())
            .finish()
    }
}

/// Keeps the pair open while held. Dropping releases the holder's count
/// and removes its reader subscription, if any.
pub struct LoopbackGuard {
    loopback: Arc<VirtualLoopback>,
    reader_id: Option<u64>,
}

impl Drop for LoopbackGuard {
    fn drop(&mut self) {
        self.loopback.release(self.reader_id);
    }
}
