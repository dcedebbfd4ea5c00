#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use plctag_device::{Device, MemoryTransport};
use std::{
    sync::{Arc, Once},
    time::Duration,
};
use tracing::Level;

pub const CONNECTION: &str = "protocol=ab-eip&gateway=127.0.0.1&path=1,0&plc=ControlLogix";
pub const TIMEOUT: Duration = Duration::from_millis(500);

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

/// Device over a fresh in-memory transport.
pub fn memory_device() -> (Arc<MemoryTransport>, Device) {
    init_tracing();
    let transport = Arc::new(MemoryTransport::new());
    let device = Device::new(transport.clone(), CONNECTION, TIMEOUT);
    (transport, device)
}

/// Builder for raw `@tags` directory buffers.
#[derive(Default)]
pub struct DirectoryBuilder {
    buf: BytesMut,
}

impl DirectoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, tag_type: u16, element_size: u16, dims: [u32; 3], name: &str) -> Self {
        self.buf.put_u32_le(0);
        self.buf.put_u16_le(tag_type);
        self.buf.put_u16_le(element_size);
        for dim in dims {
            self.buf.put_u32_le(dim);
        }
        self.buf.put_u16_le(name.len() as u16);
        self.buf.put_slice(name.as_bytes());
        self
    }

    pub fn build(self) -> Bytes {
        self.buf.freeze()
    }
}
