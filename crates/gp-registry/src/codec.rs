// codec.rs — Binary reader/writer for the Registry.pol format.
//
// Layout:
//
//   header   u32 LE signature 0x67655250 ("PReg") + u32 LE version 1
//   entry    [key;value;type;size;data]
//
// Every delimiter is one UTF-16LE code unit. Key and value names are
// UTF-16LE strings terminated by a NUL code unit. `type` and `size` are u32
// LE. `data` is `size` raw bytes. The reader is strict: anything that does not
// match exactly is a format error carrying the byte offset.

use crate::error::RegistryError;
use crate::value::utf16_units;

/// "PReg" read as a little-endian u32.
pub const SIGNATURE: u32 = 0x6765_5250;
pub const VERSION: u32 = 1;

/// One raw record of a policy file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolEntry {
    pub key: String,
    pub value_name: String,
    pub kind: u32,
    pub data: Vec<u8>,
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn malformed(&self, reason: impl Into<String>) -> RegistryError {
        RegistryError::Malformed {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], RegistryError> {
        if self.bytes.len() - self.offset < n {
            return Err(self.malformed(format!(
                "truncated: needed {n} bytes, {} left",
                self.bytes.len() - self.offset
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, RegistryError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, RegistryError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn expect(&mut self, delimiter: char) -> Result<(), RegistryError> {
        let start = self.offset;
        let unit = self.u16()?;
        if unit != delimiter as u16 {
            return Err(RegistryError::Malformed {
                offset: start,
                reason: format!("expected '{delimiter}', found {unit:#06x}"),
            });
        }
        Ok(())
    }

    fn name(&mut self) -> Result<String, RegistryError> {
        let mut units = Vec::new();
        loop {
            match self.u16()? {
                0 => break,
                u => units.push(u),
            }
        }
        String::from_utf16(&units).map_err(|_| self.malformed("name is not valid UTF-16"))
    }
}

/// Parse a complete policy file.
pub fn parse(bytes: &[u8]) -> Result<Vec<PolEntry>, RegistryError> {
    let mut reader = Reader { bytes, offset: 0 };
    let signature = reader.u32()?;
    if signature != SIGNATURE {
        return Err(RegistryError::BadSignature { found: signature });
    }
    let version = reader.u32()?;
    if version != VERSION {
        return Err(RegistryError::UnsupportedVersion { found: version });
    }

    let mut entries = Vec::new();
    while !reader.at_end() {
        reader.expect('[')?;
        let key = reader.name()?;
        reader.expect(';')?;
        let value_name = reader.name()?;
        reader.expect(';')?;
        let kind = reader.u32()?;
        reader.expect(';')?;
        let size = reader.u32()? as usize;
        reader.expect(';')?;
        let data = reader.take(size)?.to_vec();
        reader.expect(']')?;
        entries.push(PolEntry {
            key,
            value_name,
            kind,
            data,
        });
    }
    Ok(entries)
}

fn push_delimiter(out: &mut Vec<u8>, delimiter: char) {
    out.extend_from_slice(&(delimiter as u16).to_le_bytes());
}

fn push_name(out: &mut Vec<u8>, name: &str) {
    out.extend(utf16_units(name));
    out.extend_from_slice(&[0, 0]);
}

/// Serialize entries in the order given.
pub fn serialize<'a>(entries: impl IntoIterator<Item = &'a PolEntry>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&SIGNATURE.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    for entry in entries {
        push_delimiter(&mut out, '[');
        push_name(&mut out, &entry.key);
        push_delimiter(&mut out, ';');
        push_name(&mut out, &entry.value_name);
        push_delimiter(&mut out, ';');
        out.extend_from_slice(&entry.kind.to_le_bytes());
        push_delimiter(&mut out, ';');
        out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        push_delimiter(&mut out, ';');
        out.extend_from_slice(&entry.data);
        push_delimiter(&mut out, ']');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::kind;

    fn entry(key: &str, value_name: &str, kind: u32, data: &[u8]) -> PolEntry {
        PolEntry {
            key: key.to_string(),
            value_name: value_name.to_string(),
            kind,
            data: data.to_vec(),
        }
    }

    #[test]
    fn header_only_file_has_no_entries() {
        let bytes = serialize(std::iter::empty());
        assert_eq!(bytes, b"PReg\x01\x00\x00\x00");
        assert!(parse(&bytes).unwrap().is_empty());
    }

    #[test]
    fn single_entry_layout() {
        let bytes = serialize(&[entry("K", "V", kind::DWORD, &[1, 0, 0, 0])]);
        let mut expected = b"PReg\x01\x00\x00\x00".to_vec();
        expected.extend_from_slice(&[b'[', 0, b'K', 0, 0, 0, b';', 0]);
        expected.extend_from_slice(&[b'V', 0, 0, 0, b';', 0]);
        expected.extend_from_slice(&[4, 0, 0, 0, b';', 0]);
        expected.extend_from_slice(&[4, 0, 0, 0, b';', 0]);
        expected.extend_from_slice(&[1, 0, 0, 0, b']', 0]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn rejects_bad_signature() {
        let err = parse(b"GReP\x01\x00\x00\x00").unwrap_err();
        assert!(matches!(err, RegistryError::BadSignature { .. }));
        assert!(err.is_format());
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = parse(b"PReg\x02\x00\x00\x00").unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedVersion { found: 2 }));
    }

    #[test]
    fn rejects_truncated_data() {
        let mut bytes = serialize(&[entry("K", "V", kind::BINARY, &[1, 2, 3, 4])]);
        bytes.truncate(bytes.len() - 4);
        let err = parse(&bytes).unwrap_err();
        assert!(matches!(err, RegistryError::Malformed { .. }));
    }

    #[test]
    fn rejects_wrong_delimiter_with_offset() {
        let mut bytes = serialize(&[entry("K", "V", kind::DWORD, &[0; 4])]);
        let close = bytes.len() - 2;
        bytes[close] = b')';
        match parse(&bytes).unwrap_err() {
            RegistryError::Malformed { offset, .. } => assert_eq!(offset, close),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_extra_nul_before_delimiter() {
        let mut bytes = b"PReg\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&[b'[', 0, b'K', 0, 0, 0, 0, 0, b';', 0]);
        assert!(parse(&bytes).is_err());
    }

    #[test]
    fn unknown_kinds_survive_a_round_trip() {
        let entries = vec![entry("K", "Odd", 42, &[7, 7, 7])];
        assert_eq!(parse(&serialize(&entries)).unwrap(), entries);
    }
}
