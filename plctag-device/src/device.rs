use crate::{
    cache::HandleCache,
    codec::{self, TagCodec},
    error::Result,
    listing::{self, TagListDecoder},
    transport::Transport,
    types::{TagListing, TagValue, Value, ValueKind},
};
use plctag_common::DeviceSettings;
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument};

/// Name based access to the tags of one controller.
///
/// A device may be shared between threads. Each tag name gets one transport
/// handle on first use; all of them are released by [`Device::close`].
pub struct Device {
    transport: Arc<dyn Transport>,
    cache: HandleCache,
    timeout: Duration,
}

impl Device {
    /// `connection` is the attribute string common to every tag, e.g.
    /// `protocol=ab-eip&gateway=10.0.0.5&path=1,0&plc=ControlLogix`.
    pub fn new(
        transport: Arc<dyn Transport>,
        connection: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            cache: HandleCache::new(connection, timeout),
            timeout,
        }
    }

    pub fn from_settings(transport: Arc<dyn Transport>, settings: &DeviceSettings) -> Self {
        Self::new(transport, settings.connection.clone(), settings.timeout())
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of tag handles currently held.
    #[inline]
    pub fn open_handles(&self) -> usize {
        self.cache.len()
    }

    fn codec<'a>(&'a self, name: &'a str) -> Result<TagCodec<'a>> {
        let handle = self.cache.get_or_create(self.transport.as_ref(), name)?;
        Ok(TagCodec::new(
            self.transport.as_ref(),
            handle,
            name,
            self.timeout,
        ))
    }

    #[instrument(name = "read-tag", skip(self))]
    pub fn read_tag(&self, name: &str, kind: ValueKind) -> Result<Value> {
        self.codec(name)?.read(kind)
    }

    /// Read `name` as the Rust type `T`.
    pub fn read<T: TagValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.read_tag(name, T::KIND)?)
    }

    /// Read `name` into `out`, picking the kind from the type of `out`.
    pub fn read_into<T: TagValue>(&self, name: &str, out: &mut T) -> Result<()> {
        *out = self.read(name)?;
        Ok(())
    }

    #[instrument(name = "write-tag", skip(self))]
    pub fn write_tag(&self, name: &str, value: &Value) -> Result<()> {
        codec::check_capacity(name, value)?;
        self.codec(name)?.write(value)
    }

    pub fn write<T: TagValue>(&self, name: &str, value: T) -> Result<()> {
        self.write_tag(name, &value.into_value())
    }

    /// Read `name` as the kind called `kind`, e.g. `"DINT"` or `"float32"`.
    ///
    /// Unknown kind names fail before any handle is created.
    pub fn read_tag_as(&self, name: &str, kind: &str) -> Result<Value> {
        let kind: ValueKind = kind.parse()?;
        self.read_tag(name, kind)
    }

    /// Parse `text` as the kind called `kind` and write it to `name`.
    pub fn write_tag_as(&self, name: &str, kind: &str, text: &str) -> Result<()> {
        let kind: ValueKind = kind.parse()?;
        let value = Value::parse(kind, text)?;
        self.write_tag(name, &value)
    }

    /// List the tags of `list_name` (the controller scope when empty).
    ///
    /// `prefix` is prepended to every returned name, separated by a dot, before
    /// entries are classified: a prefix starting with `Program:` files every
    /// entry under programs.
    #[instrument(name = "get-list", skip(self))]
    pub fn get_list(&self, list_name: &str, prefix: &str) -> Result<TagListing> {
        let query = listing::query_name(list_name);
        let handle = self.cache.get_or_create(self.transport.as_ref(), &query)?;
        TagListDecoder::new(self.transport.as_ref(), handle, &query, self.timeout).decode(prefix)
    }

    /// List controller scope tags followed by the tags of every program.
    ///
    /// Program tags are named `Program:<name>.<tag>`.
    #[instrument(name = "list-all-tags", skip(self))]
    pub fn list_all_tags(&self) -> Result<TagListing> {
        let mut all = self.get_list("", "")?;
        for program in all.programs.clone() {
            let scoped = self.get_list(&program, "")?;
            debug!(program = %program, tags = scoped.tags.len(), "listed program tags");
            all.tags.extend(scoped.tags.into_iter().map(|mut tag| {
                tag.name = format!("{program}.{}", tag.name);
                tag
            }));
        }
        Ok(all)
    }

    /// Release every handle this device created.
    ///
    /// Every handle is attempted; the first failure is returned. Calling it
    /// again is harmless.
    #[instrument(name = "device-close", skip(self))]
    pub fn close(&self) -> Result<()> {
        debug!(handles = self.cache.len(), "closing device");
        self.cache.close(self.transport.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        transport::{MemoryTransport, Operation},
    };

    fn device() -> (Arc<MemoryTransport>, Device) {
        let transport = Arc::new(MemoryTransport::new());
        let device = Device::new(
            transport.clone(),
            "protocol=ab-eip&gateway=127.0.0.1",
            Duration::from_millis(100),
        );
        (transport, device)
    }

    #[test]
    fn test_from_settings() {
        let transport = Arc::new(MemoryTransport::new());
        let settings = DeviceSettings {
            connection: "protocol=ab-eip&gateway=10.0.0.5".into(),
            timeout_ms: 250,
        };
        let device = Device::from_settings(transport.clone(), &settings);
        assert_eq!(device.timeout(), Duration::from_millis(250));

        device.read::<i32>("X").unwrap();
        assert_eq!(
            transport.created_attributes(),
            vec!["protocol=ab-eip&gateway=10.0.0.5&name=X".to_string()]
        );
    }

    #[test]
    fn test_read_into() {
        let (_, device) = device();
        device.write("Speed", 12.5f32).unwrap();
        let mut speed = 0f32;
        device.read_into("Speed", &mut speed).unwrap();
        assert_eq!(speed, 12.5);
    }

    #[test]
    fn test_unknown_kind_name_creates_nothing() {
        let (transport, device) = device();
        assert!(matches!(
            device.read_tag_as("T", "TIMER"),
            Err(Error::UnsupportedValueKind { .. })
        ));
        assert!(matches!(
            device.write_tag_as("T", "COUNTER", "1"),
            Err(Error::UnsupportedValueKind { .. })
        ));
        assert_eq!(transport.calls(Operation::Create), 0);
        assert_eq!(transport.calls(Operation::Read), 0);
        assert_eq!(transport.calls(Operation::Write), 0);
    }

    #[test]
    fn test_write_tag_as() {
        let (_, device) = device();
        device.write_tag_as("Count", "DINT", "-42").unwrap();
        assert_eq!(
            device.read_tag_as("Count", "int32").unwrap(),
            Value::Int32(-42)
        );
        assert!(matches!(
            device.write_tag_as("Count", "DINT", "forty-two"),
            Err(Error::InvalidValue { .. })
        ));
    }
}
