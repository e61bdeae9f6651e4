//! Fixed-width field access with a per-format byte order.

use txlog_types::StoreIdentity;

/// Why a field could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The buffer ends before the field does.
    Short,
    /// The bytes are present but do not form a valid value.
    Malformed(String),
}

pub type FieldResult<T> = Result<T, FieldError>;

/// Cursor over a byte slice.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> FieldReader<'a> {
    pub const fn new(buf: &'a [u8], little_endian: bool) -> Self {
        Self {
            buf,
            pos: 0,
            little_endian,
        }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    fn take<const N: usize>(&mut self) -> FieldResult<[u8; N]> {
        let end = self.pos.checked_add(N).ok_or(FieldError::Short)?;
        let slice = self.buf.get(self.pos..end).ok_or(FieldError::Short)?;
        self.pos = end;
        let mut out = [0_u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub fn u8(&mut self) -> FieldResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn u16(&mut self) -> FieldResult<u16> {
        let raw = self.take::<2>()?;
        Ok(if self.little_endian {
            u16::from_le_bytes(raw)
        } else {
            u16::from_be_bytes(raw)
        })
    }

    pub fn u32(&mut self) -> FieldResult<u32> {
        let raw = self.take::<4>()?;
        Ok(if self.little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    }

    pub fn i32(&mut self) -> FieldResult<i32> {
        let raw = self.take::<4>()?;
        Ok(if self.little_endian {
            i32::from_le_bytes(raw)
        } else {
            i32::from_be_bytes(raw)
        })
    }

    pub fn u64(&mut self) -> FieldResult<u64> {
        let raw = self.take::<8>()?;
        Ok(if self.little_endian {
            u64::from_le_bytes(raw)
        } else {
            u64::from_be_bytes(raw)
        })
    }

    pub fn i64(&mut self) -> FieldResult<i64> {
        let raw = self.take::<8>()?;
        Ok(if self.little_endian {
            i64::from_le_bytes(raw)
        } else {
            i64::from_be_bytes(raw)
        })
    }

    pub fn bytes(&mut self, len: usize) -> FieldResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(FieldError::Short)?;
        let slice = self.buf.get(self.pos..end).ok_or(FieldError::Short)?;
        self.pos = end;
        Ok(slice)
    }

    /// `u16` length prefix followed by UTF-8 bytes.
    pub fn string(&mut self) -> FieldResult<String> {
        let len = usize::from(self.u16()?);
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|err| FieldError::Malformed(format!("invalid UTF-8 string: {err}")))
    }

    pub fn store_identity(&mut self) -> FieldResult<StoreIdentity> {
        let creation_time = self.i64()?;
        let random = self.i64()?;
        let major_version = self.u16()?;
        let minor_version = self.u16()?;
        let storage_engine = self.string()?;
        let format_family = self.string()?;
        Ok(StoreIdentity {
            creation_time,
            random,
            storage_engine,
            format_family,
            major_version,
            minor_version,
        })
    }
}

/// Appends fields to a byte vector.
pub struct FieldWriter<'a> {
    out: &'a mut Vec<u8>,
    little_endian: bool,
}

impl<'a> FieldWriter<'a> {
    pub fn new(out: &'a mut Vec<u8>, little_endian: bool) -> Self {
        Self { out, little_endian }
    }

    pub fn u8(&mut self, value: u8) {
        self.out.push(value);
    }

    pub fn u16(&mut self, value: u16) {
        if self.little_endian {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.out.extend_from_slice(&value.to_be_bytes());
        }
    }

    pub fn u32(&mut self, value: u32) {
        if self.little_endian {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.out.extend_from_slice(&value.to_be_bytes());
        }
    }

    pub fn i32(&mut self, value: i32) {
        if self.little_endian {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.out.extend_from_slice(&value.to_be_bytes());
        }
    }

    pub fn u64(&mut self, value: u64) {
        if self.little_endian {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.out.extend_from_slice(&value.to_be_bytes());
        }
    }

    pub fn i64(&mut self, value: i64) {
        if self.little_endian {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.out.extend_from_slice(&value.to_be_bytes());
        }
    }

    pub fn bytes(&mut self, value: &[u8]) {
        self.out.extend_from_slice(value);
    }

    /// Returns `false` when the string does not fit a `u16` length prefix.
    pub fn string(&mut self, value: &str) -> bool {
        let Ok(len) = u16::try_from(value.len()) else {
            return false;
        };
        self.u16(len);
        self.bytes(value.as_bytes());
        true
    }

    pub fn store_identity(&mut self, id: &StoreIdentity) -> bool {
        self.i64(id.creation_time);
        self.i64(id.random);
        self.u16(id.major_version);
        self.u16(id.minor_version);
        self.string(&id.storage_engine) && self.string(&id.format_family)
    }
}
