use crate::{
    error::{Error, Result},
    transport::{Handle, Transport},
};
use dashmap::DashMap;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tracing::{debug, warn};

/// Handle of one name, `None` until creation succeeds.
type Slot = Arc<Mutex<Option<Handle>>>;

/// Name to handle map with lazy creation.
///
/// Each name owns a slot whose mutex is held while its handle is created, so
/// callers racing on the first access to a name share a single handle. The map
/// itself is only locked to find or insert the slot; a slow creation blocks
/// callers of that name only.
pub struct HandleCache {
    connection: String,
    timeout: Duration,
    slots: DashMap<String, Slot>,
}

impl HandleCache {
    pub fn new(connection: impl Into<String>, timeout: Duration) -> Self {
        Self {
            connection: connection.into(),
            timeout,
            slots: DashMap::new(),
        }
    }

    /// Attribute string used to create the handle of `name`.
    #[inline]
    pub fn attributes(&self, name: &str) -> String {
        format!("{}&name={}", self.connection, name)
    }

    fn slot(&self, name: &str) -> Slot {
        if let Some(slot) = self.slots.get(name) {
            return Arc::clone(&slot);
        }
        Arc::clone(&self.slots.entry(name.to_string()).or_default())
    }

    pub fn get_or_create(&self, transport: &dyn Transport, name: &str) -> Result<Handle> {
        let slot = self.slot(name);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = *guard {
            return Ok(handle);
        }

        let attributes = self.attributes(name);
        let handle = transport
            .create(&attributes, self.timeout)
            .map_err(|status| Error::HandleCreationFailed {
                name: name.to_string(),
                status,
            })?;
        debug!(tag = name, %handle, "created tag handle");
        *guard = Some(handle);
        Ok(handle)
    }

    /// Number of handles created and not yet released.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|e| e.value().lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every cached handle.
    ///
    /// All handles are attempted even after a failure; the first failure is
    /// returned. The cache is empty afterwards either way.
    pub fn close(&self, transport: &dyn Transport) -> Result<()> {
        let slots: Vec<(String, Slot)> = self
            .slots
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        self.slots.clear();

        let mut first_err = None;
        for (name, slot) in slots {
            let taken = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            let Some(handle) = taken else {
                continue;
            };
            if let Err(status) = transport.destroy(handle) {
                warn!(tag = %name, %handle, %status, "failed to destroy tag handle");
                if first_err.is_none() {
                    first_err = Some(Error::DestroyFailed {
                        name,
                        handle,
                        status,
                    });
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
