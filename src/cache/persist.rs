//! Binary sidecar persistence format for the cache store.
//!
//! ```text
//! file    := magic(4) version(u16) entry*
//! magic   := b"CGC1"
//! entry   := u32 keyLen | keyLen bytes UTF-8 key
//!          | u32 headersLen | headersLen bytes UTF-8 headers
//!          | i32 status
//!          | u32 bodyLen | bodyLen bytes body
//! ```
//!
//! Header encoding is `name:value` lines separated by `\n`. Best-effort
//! warm-start only — a truncated or corrupt file yields an empty load
//! rather than a hard error, since losing the sidecar must never prevent
//! startup.

use crate::cache::entry::CachedEntry;
use bytes::Bytes;

const MAGIC: &[u8; 4] = b"CGC1";
const VERSION: u16 = 1;

pub fn dump(entries: &[(String, CachedEntry)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());

    for (key, entry) in entries {
        let key_bytes = key.as_bytes();
        out.extend_from_slice(&(key_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(key_bytes);

        let headers = encode_headers(&entry.headers);
        let header_bytes = headers.as_bytes();
        out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(header_bytes);

        out.extend_from_slice(&(entry.status as i32).to_le_bytes());

        out.extend_from_slice(&(entry.body.len() as u32).to_le_bytes());
        out.extend_from_slice(&entry.body);
    }

    out
}

pub fn load(bytes: &[u8]) -> Vec<(String, CachedEntry)> {
    let mut entries = Vec::new();
    let mut cursor = 0usize;

    if bytes.len() < 6 || &bytes[0..4] != MAGIC {
        return entries;
    }
    cursor += 6; // magic + version, version currently unused beyond presence

    loop {
        let Some(key) = read_len_prefixed_string(bytes, &mut cursor) else {
            break;
        };
        let Some(header_blob) = read_len_prefixed_string(bytes, &mut cursor) else {
            break;
        };
        let Some(status) = read_i32(bytes, &mut cursor) else {
            break;
        };
        let Some(body) = read_len_prefixed_bytes(bytes, &mut cursor) else {
            break;
        };

        entries.push((
            key,
            CachedEntry {
                status: status.clamp(0, u16::MAX as i32) as u16,
                headers: decode_headers(&header_blob),
                body: Bytes::from(body),
            },
        ));
    }

    entries
}

fn encode_headers(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_headers(blob: &str) -> Vec<(String, String)> {
    if blob.is_empty() {
        return Vec::new();
    }
    blob.split('\n')
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Option<u32> {
    let end = *cursor + 4;
    let slice = bytes.get(*cursor..end)?;
    *cursor = end;
    Some(u32::from_le_bytes(slice.try_into().ok()?))
}

fn read_i32(bytes: &[u8], cursor: &mut usize) -> Option<i32> {
    let end = *cursor + 4;
    let slice = bytes.get(*cursor..end)?;
    *cursor = end;
    Some(i32::from_le_bytes(slice.try_into().ok()?))
}

fn read_len_prefixed_bytes(bytes: &[u8], cursor: &mut usize) -> Option<Vec<u8>> {
    let len = read_u32(bytes, cursor)? as usize;
    let end = cursor.checked_add(len)?;
    let slice = bytes.get(*cursor..end)?;
    *cursor = end;
    Some(slice.to_vec())
}

fn read_len_prefixed_string(bytes: &[u8], cursor: &mut usize) -> Option<String> {
    let raw = read_len_prefixed_bytes(bytes, cursor)?;
    String::from_utf8(raw).ok()
}
