use super::{Handle, Scalar, ScalarKind, Status, Transport, TransportResult};
use bytes::{Bytes, BytesMut};
use std::{
    collections::HashMap,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::trace;

/// Buffer size given to tags that were never seeded.
///
/// Large enough for every scalar kind and for a string tag.
pub const DEFAULT_TAG_SIZE: usize = 88;

/// Transport primitives, used to address call counters and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Destroy,
    Read,
    Write,
    Lock,
    Unlock,
    GetScalar,
    SetScalar,
    Size,
}

struct HandleEntry {
    tag: String,
    local: BytesMut,
    locked: bool,
}

#[derive(Default)]
struct State {
    next_id: i32,
    handles: HashMap<Handle, HandleEntry>,
    /// Controller side image of every tag, keyed by tag name.
    remote: HashMap<String, Bytes>,
    faults: HashMap<Operation, Status>,
    calls: HashMap<Operation, usize>,
    created: Vec<String>,
}

impl State {
    fn enter(&mut self, op: Operation) -> TransportResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.remove(&op) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn entry(&mut self, handle: Handle) -> TransportResult<&mut HandleEntry> {
        self.handles
            .get_mut(&handle)
            .ok_or(Status::ERR_NOT_FOUND)
    }
}

/// In-process tag engine that simulates a controller.
///
/// Every handle owns a local buffer; `read` copies the controller image of the
/// tag into it and `write` copies it back, so scalar accesses between the two
/// only touch local state, as with a networked engine. Locks are real: a second
/// `lock` on a locked handle blocks until `unlock`, and `read`/`write` wait for
/// a held lock to be released, so buffer transfers never land inside another
/// caller's locked section.
///
/// Each primitive is counted and can be made to fail once with
/// [`MemoryTransport::fail_next`].
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
    unlocked: Condvar,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `handle` is not locked.
    fn wait_unlocked<'a>(
        &self,
        mut state: MutexGuard<'a, State>,
        handle: Handle,
    ) -> TransportResult<MutexGuard<'a, State>> {
        while state.entry(handle)?.locked {
            state = self
                .unlocked
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(state)
    }

    /// Replace the controller image of `tag`.
    pub fn seed(&self, tag: &str, data: impl Into<Bytes>) {
        self.state().remote.insert(tag.to_string(), data.into());
    }

    /// Controller image of `tag`, if it was seeded or written.
    pub fn remote(&self, tag: &str) -> Option<Bytes> {
        self.state().remote.get(tag).cloned()
    }

    /// Make the next call of `op` fail with `status`.
    pub fn fail_next(&self, op: Operation, status: Status) {
        self.state().faults.insert(op, status);
    }

    /// Number of times `op` was invoked, failed calls included.
    pub fn calls(&self, op: Operation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or_default()
    }

    /// Attribute strings passed to `create`, in call order.
    pub fn created_attributes(&self) -> Vec<String> {
        self.state().created.clone()
    }

    /// Handles created and not yet destroyed.
    pub fn open_handles(&self) -> usize {
        self.state().handles.len()
    }
}

fn tag_name(attributes: &str) -> Option<&str> {
    attributes
        .split('&')
        .find_map(|pair| pair.strip_prefix("name="))
        .filter(|name| !name.is_empty())
}

fn bounds(len: usize, offset: usize, width: usize) -> TransportResult<std::ops::Range<usize>> {
    let end = offset.checked_add(width).ok_or(Status::ERR_OUT_OF_BOUNDS)?;
    if end > len {
        return Err(Status::ERR_OUT_OF_BOUNDS);
    }
    Ok(offset..end)
}

impl Transport for MemoryTransport {
    fn create(&self, attributes: &str, _timeout: Duration) -> TransportResult<Handle> {
        let mut state = self.state();
        state.enter(Operation::Create)?;
        let tag = tag_name(attributes).ok_or(Status::ERR_BAD_PARAM)?.to_string();

        let size = state
            .remote
            .entry(tag.clone())
            .or_insert_with(|| Bytes::from(vec![0u8; DEFAULT_TAG_SIZE]))
            .len();

        state.next_id += 1;
        let handle = Handle::new(state.next_id);
        state.created.push(attributes.to_string());
        state.handles.insert(
            handle,
            HandleEntry {
                tag,
                local: BytesMut::zeroed(size),
                locked: false,
            },
        );
        trace!(%handle, attributes, "memory transport created handle");
        Ok(handle)
    }

    fn destroy(&self, handle: Handle) -> TransportResult<()> {
        let mut state = self.state();
        state.enter(Operation::Destroy)?;
        state.handles.remove(&handle).ok_or(Status::ERR_NOT_FOUND)?;
        drop(state);
        self.unlocked.notify_all();
        Ok(())
    }

    fn read(&self, handle: Handle, _timeout: Duration) -> TransportResult<()> {
        let mut state = self.state();
        state.enter(Operation::Read)?;
        let mut state = self.wait_unlocked(state, handle)?;
        let tag = state.entry(handle)?.tag.clone();
        let image = state.remote.get(&tag).cloned().unwrap_or_default();
        let entry = state.entry(handle)?;
        entry.local.clear();
        entry.local.extend_from_slice(&image);
        Ok(())
    }

    fn write(&self, handle: Handle, _timeout: Duration) -> TransportResult<()> {
        let mut state = self.state();
        state.enter(Operation::Write)?;
        let mut state = self.wait_unlocked(state, handle)?;
        let entry = state.entry(handle)?;
        let tag = entry.tag.clone();
        let image = Bytes::copy_from_slice(&entry.local);
        state.remote.insert(tag, image);
        Ok(())
    }

    fn lock(&self, handle: Handle) -> TransportResult<()> {
        let mut state = self.state();
        state.enter(Operation::Lock)?;
        loop {
            let entry = state.entry(handle)?;
            if !entry.locked {
                entry.locked = true;
                return Ok(());
            }
            state = self
                .unlocked
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn unlock(&self, handle: Handle) -> TransportResult<()> {
        let mut state = self.state();
        state.enter(Operation::Unlock)?;
        let entry = state.entry(handle)?;
        if !entry.locked {
            return Err(Status::ERR_MUTEX_UNLOCK);
        }
        entry.locked = false;
        drop(state);
        self.unlocked.notify_all();
        Ok(())
    }

    fn get_scalar(
        &self,
        handle: Handle,
        offset: usize,
        kind: ScalarKind,
    ) -> TransportResult<Scalar> {
        let mut state = self.state();
        state.enter(Operation::GetScalar)?;
        let entry = state.entry(handle)?;
        let range = bounds(entry.local.len(), offset, kind.width())?;
        Scalar::from_le_bytes(kind, &entry.local[range]).ok_or(Status::ERR_BAD_DATA)
    }

    fn set_scalar(&self, handle: Handle, offset: usize, value: Scalar) -> TransportResult<()> {
        let mut state = self.state();
        state.enter(Operation::SetScalar)?;
        let entry = state.entry(handle)?;
        let raw = value.to_le_bytes();
        let range = bounds(entry.local.len(), offset, raw.len())?;
        entry.local[range].copy_from_slice(&raw);
        Ok(())
    }

    fn size(&self, handle: Handle) -> TransportResult<usize> {
        let mut state = self.state();
        state.enter(Operation::Size)?;
        Ok(state.entry(handle)?.local.len())
    }
}
