//! Storage record framing
//!
//! The storage file is a sequence of checksummed records after the
//! header:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, total including this field)
//! +------------------+
//! | Kind             | (u8: 0 = put, 1 = delete, 2 = commit)
//! +------------------+
//! | Type Name        | (length-prefixed string)
//! +------------------+
//! | Object ID        | (length-prefixed string)
//! +------------------+
//! | Payload          | (length-prefixed bytes, JSON document)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! The checksum covers everything except itself. Put and delete
//! records only take effect once a commit record follows them: the
//! loader applies op batches at commit boundaries, which is what makes
//! a multi-record write transaction atomic across a crash.

use std::io;

use super::checksum::compute_checksum;

/// Minimum possible encoded record size (empty strings and payload).
pub const MIN_RECORD_SIZE: usize = 4 + 1 + 4 + 4 + 4 + 4;

/// What a record does when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Upsert of a full object payload
    Put = 0,
    /// Tombstone for an object id
    Delete = 1,
    /// Transaction boundary; ops since the previous commit take effect
    Commit = 2,
}

impl RecordKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RecordKind::Put),
            1 => Some(RecordKind::Delete),
            2 => Some(RecordKind::Commit),
            _ => None,
        }
    }
}

/// One framed storage record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    /// Record kind
    pub kind: RecordKind,
    /// Object type name (empty for commit markers)
    pub type_name: String,
    /// Object identifier (empty for commit markers)
    pub object_id: String,
    /// Serialized object payload (empty for deletes and commits)
    pub payload: Vec<u8>,
}

impl StorageRecord {
    /// Create an upsert record.
    pub fn put(
        type_name: impl Into<String>,
        object_id: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            kind: RecordKind::Put,
            type_name: type_name.into(),
            object_id: object_id.into(),
            payload,
        }
    }

    /// Create a tombstone record.
    pub fn delete(type_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Delete,
            type_name: type_name.into(),
            object_id: object_id.into(),
            payload: Vec::new(),
        }
    }

    /// Create a commit marker.
    pub fn commit() -> Self {
        Self {
            kind: RecordKind::Commit,
            type_name: String::new(),
            object_id: String::new(),
            payload: Vec::new(),
        }
    }

    /// Serialize the record body (everything between length prefix and
    /// checksum).
    fn serialize_body(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            1 + 4 + self.type_name.len() + 4 + self.object_id.len() + 4 + self.payload.len(),
        );

        buf.push(self.kind as u8);

        buf.extend_from_slice(&(self.type_name.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.type_name.as_bytes());

        buf.extend_from_slice(&(self.object_id.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.object_id.as_bytes());

        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        buf
    }

    /// Serialize the complete record, including framing and checksum.
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.serialize_body();
        let record_length = (4 + body.len() + 4) as u32;

        let mut checksum_data = Vec::with_capacity(4 + body.len());
        checksum_data.extend_from_slice(&record_length.to_le_bytes());
        checksum_data.extend_from_slice(&body);
        let checksum = compute_checksum(&checksum_data);

        let mut record = Vec::with_capacity(record_length as usize);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.extend_from_slice(&body);
        record.extend_from_slice(&checksum.to_le_bytes());

        record
    }

    /// Deserialize one record from the start of `data`, verifying the
    /// checksum.
    ///
    /// Returns the record and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// - `UnexpectedEof` when `data` ends before the record does (a
    ///   torn tail for the caller to classify)
    /// - `InvalidData` for framing violations and checksum mismatches
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Record too short",
            ));
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if record_length < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid record length: {}", record_length),
            ));
        }

        if data.len() < record_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Record truncated: expected {} bytes, got {}",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = record_length - 4;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        if compute_checksum(&data[0..checksum_offset]) != stored_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Record checksum mismatch",
            ));
        }

        let mut cursor = 4;

        let kind_byte = data[cursor];
        cursor += 1;
        let kind = RecordKind::from_u8(kind_byte).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown record kind: {}", kind_byte),
            )
        })?;

        let type_name = Self::read_string(data, &mut cursor, checksum_offset)?;
        let object_id = Self::read_string(data, &mut cursor, checksum_offset)?;
        let payload = Self::read_bytes(data, &mut cursor, checksum_offset)?;

        Ok((
            Self {
                kind,
                type_name,
                object_id,
                payload,
            },
            record_length,
        ))
    }

    fn read_bytes(data: &[u8], cursor: &mut usize, limit: usize) -> io::Result<Vec<u8>> {
        if *cursor + 4 > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Field length prefix out of bounds",
            ));
        }
        let len = u32::from_le_bytes([
            data[*cursor],
            data[*cursor + 1],
            data[*cursor + 2],
            data[*cursor + 3],
        ]) as usize;
        *cursor += 4;

        if *cursor + len > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Field extends past record end",
            ));
        }
        let bytes = data[*cursor..*cursor + len].to_vec();
        *cursor += len;
        Ok(bytes)
    }

    fn read_string(data: &[u8], cursor: &mut usize, limit: usize) -> io::Result<String> {
        let bytes = Self::read_bytes(data, cursor, limit)?;
        String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e)))
    }
}
