//! Decoder for the controller tag directory (`@tags`).
//!
//! Record layout, little-endian:
//!
//! ```text
//! [4 reserved][2 tag type][2 element size][4 dim0][4 dim1][4 dim2][2 name len][name]
//! ```

use crate::{
    error::{Error, Result},
    transport::{Handle, Scalar, ScalarKind, Status, Transport},
    types::{TagDescriptor, TagListing, TagType},
};
use std::time::Duration;
use tracing::{debug, trace};

pub const DIRECTORY_SUFFIX: &str = "@tags";
pub const PROGRAM_PREFIX: &str = "Program:";

/// Bytes of a record before the name.
pub const RECORD_HEADER_LEN: usize = 4 + 2 + 2 + 4 * 3 + 2;

/// Pseudo tag holding the directory of `list_name`, the controller scope when
/// empty.
pub fn query_name(list_name: &str) -> String {
    if list_name.is_empty() {
        DIRECTORY_SUFFIX.to_string()
    } else {
        format!("{list_name}.{DIRECTORY_SUFFIX}")
    }
}

/// Forward-only reader over a handle's buffer.
struct Cursor<'a> {
    transport: &'a dyn Transport,
    handle: Handle,
    list: &'a str,
    offset: usize,
}

impl Cursor<'_> {
    fn skip(&mut self, n: usize) {
        self.offset += n;
    }

    fn error(&self, offset: usize, status: Status) -> Error {
        Error::AccessFailed {
            name: self.list.to_string(),
            offset,
            status,
        }
    }

    fn scalar(&mut self, kind: ScalarKind) -> Result<(usize, Scalar)> {
        let at = self.offset;
        let value = self
            .transport
            .get_scalar(self.handle, at, kind)
            .map_err(|status| self.error(at, status))?;
        self.offset += kind.width();
        Ok((at, value))
    }

    fn u8(&mut self) -> Result<u8> {
        match self.scalar(ScalarKind::U8)? {
            (_, Scalar::U8(v)) => Ok(v),
            (at, _) => Err(self.error(at, Status::ERR_BAD_DATA)),
        }
    }

    fn u16(&mut self) -> Result<u16> {
        match self.scalar(ScalarKind::U16)? {
            (_, Scalar::U16(v)) => Ok(v),
            (at, _) => Err(self.error(at, Status::ERR_BAD_DATA)),
        }
    }

    fn u32(&mut self) -> Result<u32> {
        match self.scalar(ScalarKind::U32)? {
            (_, Scalar::U32(v)) => Ok(v),
            (at, _) => Err(self.error(at, Status::ERR_BAD_DATA)),
        }
    }
}

pub struct TagListDecoder<'a> {
    transport: &'a dyn Transport,
    handle: Handle,
    query: &'a str,
    timeout: Duration,
}

impl<'a> TagListDecoder<'a> {
    /// `query` is the directory tag the handle was created for, see
    /// [`query_name`].
    pub fn new(
        transport: &'a dyn Transport,
        handle: Handle,
        query: &'a str,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            handle,
            query,
            timeout,
        }
    }

    /// Read the directory and split it into user tags and program names.
    ///
    /// Names get `prefix.` prepended when `prefix` is not empty; names
    /// starting with `Program:` after that go to the program list. The first
    /// malformed record aborts the whole listing.
    pub fn decode(&self, prefix: &str) -> Result<TagListing> {
        self.transport
            .read(self.handle, self.timeout)
            .map_err(|status| Error::TransportReadFailed {
                name: self.query.to_string(),
                status,
            })?;
        let size = self
            .transport
            .size(self.handle)
            .map_err(|status| Error::TransportReadFailed {
                name: self.query.to_string(),
                status,
            })?;

        let mut cursor = Cursor {
            transport: self.transport,
            handle: self.handle,
            list: self.query,
            offset: 0,
        };
        let mut listing = TagListing::default();
        let mut system = 0usize;

        while cursor.offset < size {
            let start = cursor.offset;
            cursor.skip(4);

            let tag_type = TagType::from_raw(cursor.u16()?);
            let element_size = cursor.u16()?;
            let dims = [cursor.u32()?, cursor.u32()?, cursor.u32()?];

            let name_len = cursor.u16()? as usize;
            if start + RECORD_HEADER_LEN + name_len > size {
                return Err(Error::NameTooLong {
                    list: self.query.to_string(),
                    offset: start,
                    len: name_len,
                    size,
                });
            }
            let mut raw_name = Vec::with_capacity(name_len);
            for _ in 0..name_len {
                raw_name.push(cursor.u8()?);
            }
            let raw_name = String::from_utf8(raw_name).map_err(|source| Error::InvalidName {
                list: self.query.to_string(),
                offset: start,
                source,
            })?;

            let name = if prefix.is_empty() {
                raw_name
            } else {
                format!("{prefix}.{raw_name}")
            };

            if name.starts_with(PROGRAM_PREFIX) {
                listing.programs.push(name);
                continue;
            }
            if tag_type.is_system_tag() {
                trace!(tag = %name, "skipping system tag");
                system += 1;
                continue;
            }

            let mut tag = TagDescriptor::new(name, tag_type, element_size);
            for dim in dims {
                tag.add_dimension(dim);
            }
            let declared = tag_type.dimension_count();
            if declared != tag.dimensions.len() {
                return Err(Error::DimensionCountMismatch {
                    name: tag.name,
                    declared,
                    actual: tag.dimensions.len(),
                });
            }
            listing.tags.push(tag);
        }

        debug!(
            list = self.query,
            size,
            tags = listing.tags.len(),
            programs = listing.programs.len(),
            system,
            "decoded tag directory"
        );
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use bytes::{BufMut, BytesMut};

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn record(buf: &mut BytesMut, tag_type: u16, element_size: u16, dims: [u32; 3], name: &str) {
        buf.put_u32_le(0);
        buf.put_u16_le(tag_type);
        buf.put_u16_le(element_size);
        for d in dims {
            buf.put_u32_le(d);
        }
        buf.put_u16_le(name.len() as u16);
        buf.put_slice(name.as_bytes());
    }

    fn decode(buf: BytesMut, prefix: &str) -> Result<TagListing> {
        let transport = MemoryTransport::new();
        transport.seed("@tags", buf.freeze());
        let h = transport.create("name=@tags", TIMEOUT).unwrap();
        TagListDecoder::new(&transport, h, "@tags", TIMEOUT).decode(prefix)
    }

    #[test]
    fn test_query_name() {
        assert_eq!(query_name(""), "@tags");
        assert_eq!(query_name("Program:Main"), "Program:Main.@tags");
    }

    #[test]
    fn test_program_and_tag() {
        let mut buf = BytesMut::new();
        record(&mut buf, 0x0068, 0, [0, 0, 0], "Program:Main");
        record(&mut buf, 0x20C4, 4, [10, 0, 0], "Counter1");

        let listing = decode(buf, "").unwrap();
        assert_eq!(listing.programs, vec!["Program:Main".to_string()]);
        assert_eq!(listing.tags.len(), 1);
        let tag = &listing.tags[0];
        assert_eq!(tag.name, "Counter1");
        assert_eq!(tag.dimensions, vec![10]);
        assert_eq!(tag.element_size, 4);
        assert_eq!(tag.type_code(), 0xC4);
    }

    #[test]
    fn test_classification_uses_prefixed_name() {
        let mut buf = BytesMut::new();
        record(&mut buf, 0x00C4, 4, [0, 0, 0], "Local");
        let listing = decode(buf, "Program:Main").unwrap();
        assert!(listing.tags.is_empty());
        assert_eq!(listing.programs, vec!["Program:Main.Local".to_string()]);

        let mut buf = BytesMut::new();
        record(&mut buf, 0x00C4, 4, [0, 0, 0], "Program:X");
        let listing = decode(buf, "Ctl").unwrap();
        assert!(listing.programs.is_empty());
        assert_eq!(listing.tags[0].name, "Ctl.Program:X");
    }

    #[test]
    fn test_system_tags_are_dropped() {
        let mut buf = BytesMut::new();
        record(&mut buf, 0x10C1, 1, [0, 0, 0], "__Sys");
        record(&mut buf, 0x00C1, 1, [0, 0, 0], "Run");

        let listing = decode(buf, "").unwrap();
        assert_eq!(listing.tags.len(), 1);
        assert_eq!(listing.tags[0].name, "Run");
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut buf = BytesMut::new();
        record(&mut buf, 0x40C4, 4, [5, 0, 0], "Grid");

        match decode(buf, "") {
            Err(Error::DimensionCountMismatch {
                name,
                declared,
                actual,
            }) => {
                assert_eq!(name, "Grid");
                assert_eq!(declared, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("expected DimensionCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_buffer() {
        let listing = decode(BytesMut::new(), "").unwrap();
        assert!(listing.tags.is_empty());
        assert!(listing.programs.is_empty());
    }

    #[test]
    fn test_name_past_end() {
        let mut buf = BytesMut::new();
        record(&mut buf, 0x00C4, 4, [0, 0, 0], "Counter1");
        buf.truncate(buf.len() - 3);

        assert!(matches!(
            decode(buf, ""),
            Err(Error::NameTooLong {
                offset: 0,
                len: 8,
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let mut buf = BytesMut::new();
        record(&mut buf, 0x00C4, 4, [0, 0, 0], "A");
        buf.put_u32_le(0);
        buf.put_u16_le(0x00C4);

        assert!(matches!(
            decode(buf, ""),
            Err(Error::AccessFailed {
                status: Status::ERR_OUT_OF_BOUNDS,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_name() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(0);
        buf.put_u16_le(0x00C4);
        buf.put_u16_le(4);
        buf.put_bytes(0, 12);
        buf.put_u16_le(2);
        buf.put_slice(&[0xFF, 0xFE]);

        assert!(matches!(decode(buf, ""), Err(Error::InvalidName { .. })));
    }
}
