//! Codec pool: brotli / gzip / deflate / identity compress & decompress.
//!
//! Native libraries only (`brotli`, `flate2`) — no subprocess, no temp
//! files. Brotli availability is probed once at process startup by round-
//! tripping an empty buffer through the encoder/decoder.

use crate::error::GatewayError;
use std::io::{Read, Write};
use std::sync::OnceLock;

/// Content-coding token, exactly as it appears in the `content-encoding`
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Br,
    Gzip,
    Deflate,
    Identity,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Br => "br",
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
            Encoding::Identity => "identity",
        }
    }

    pub fn parse(s: &str) -> Option<Encoding> {
        match s.trim().to_ascii_lowercase().as_str() {
            "br" => Some(Encoding::Br),
            "gzip" | "x-gzip" => Some(Encoding::Gzip),
            "deflate" => Some(Encoding::Deflate),
            "identity" => Some(Encoding::Identity),
            _ => None,
        }
    }
}

static BROTLI_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Probe brotli availability once. Cheap: brotli is a pure-Rust crate
/// linked into the binary, so this only guards against encoder/decoder
/// round-trip regressions rather than a missing shared library — but the
/// shape mirrors a real capability probe so a future swap to an external
/// brotli binding only changes this function.
pub fn probe_brotli() -> bool {
    *BROTLI_AVAILABLE.get_or_init(|| match compress_br(b"") {
        Ok(buf) => decompress_br(&buf).is_ok(),
        Err(_) => false,
    })
}

/// Whether brotli is currently usable (after `probe_brotli` has run once).
pub fn brotli_available() -> bool {
    BROTLI_AVAILABLE.get().copied().unwrap_or(false)
}

/// Preferred store-encoding order, brotli first when available.
pub fn preferred_order() -> &'static [Encoding] {
    if brotli_available() {
        &[Encoding::Br, Encoding::Gzip, Encoding::Deflate, Encoding::Identity]
    } else {
        &[Encoding::Gzip, Encoding::Deflate, Encoding::Identity]
    }
}

pub fn compress(bytes: &[u8], enc: Encoding) -> Result<Vec<u8>, GatewayError> {
    match enc {
        Encoding::Identity => Ok(bytes.to_vec()),
        Encoding::Gzip => compress_gzip(bytes),
        Encoding::Deflate => compress_deflate(bytes),
        Encoding::Br => compress_br(bytes),
    }
}

pub fn decompress(bytes: &[u8], enc: Encoding) -> Result<Vec<u8>, GatewayError> {
    match enc {
        Encoding::Identity => Ok(bytes.to_vec()),
        Encoding::Gzip => decompress_gzip(bytes),
        Encoding::Deflate => decompress_deflate(bytes),
        Encoding::Br => decompress_br(bytes),
    }
}

/// Above this many bytes, `compress`/`decompress` are CPU-bound enough to
/// starve the async runtime's worker threads, so the call is moved onto
/// the blocking pool instead of running inline.
const SPAWN_BLOCKING_THRESHOLD: usize = 8192;

/// `compress`, dispatched to `tokio::task::spawn_blocking` once the input
/// crosses `SPAWN_BLOCKING_THRESHOLD`; small inputs run inline to avoid
/// the task-spawn overhead outweighing the work itself.
pub async fn compress_async(bytes: Vec<u8>, enc: Encoding) -> Result<Vec<u8>, GatewayError> {
    if bytes.len() < SPAWN_BLOCKING_THRESHOLD {
        return compress(&bytes, enc);
    }
    tokio::task::spawn_blocking(move || compress(&bytes, enc))
        .await
        .map_err(|e| codec_err("spawn_blocking", e))?
}

/// `decompress`, dispatched to `tokio::task::spawn_blocking` once the
/// input crosses `SPAWN_BLOCKING_THRESHOLD`.
pub async fn decompress_async(bytes: Vec<u8>, enc: Encoding) -> Result<Vec<u8>, GatewayError> {
    if bytes.len() < SPAWN_BLOCKING_THRESHOLD {
        return decompress(&bytes, enc);
    }
    tokio::task::spawn_blocking(move || decompress(&bytes, enc))
        .await
        .map_err(|e| codec_err("spawn_blocking", e))?
}

fn compress_gzip(bytes: &[u8]) -> Result<Vec<u8>, GatewayError> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(9));
    encoder.write_all(bytes).map_err(|e| codec_err("gzip", e))?;
    encoder.finish().map_err(|e| codec_err("gzip", e))
}

fn decompress_gzip(bytes: &[u8]) -> Result<Vec<u8>, GatewayError> {
    use flate2::read::GzDecoder;

    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| codec_err("gzip", e))?;
    Ok(out)
}

fn compress_deflate(bytes: &[u8]) -> Result<Vec<u8>, GatewayError> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(9));
    encoder.write_all(bytes).map_err(|e| codec_err("deflate", e))?;
    encoder.finish().map_err(|e| codec_err("deflate", e))
}

fn decompress_deflate(bytes: &[u8]) -> Result<Vec<u8>, GatewayError> {
    use flate2::read::DeflateDecoder;

    let mut decoder = DeflateDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| codec_err("deflate", e))?;
    Ok(out)
}

fn compress_br(bytes: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let params = brotli::enc::BrotliEncoderParams {
        quality: 11,
        ..Default::default()
    };
    let mut out = Vec::new();
    let mut input = bytes;
    brotli::BrotliCompress(&mut input, &mut out, &params).map_err(|e| codec_err("br", e))?;
    Ok(out)
}

fn decompress_br(bytes: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let mut out = Vec::new();
    let mut input = bytes;
    brotli::BrotliDecompress(&mut input, &mut out).map_err(|e| codec_err("br", e))?;
    Ok(out)
}

fn codec_err(encoding: &'static str, e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Codec {
        encoding,
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_gzip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let compressed = compress(&data, Encoding::Gzip).unwrap();
        assert!(compressed.len() < data.len());
        let out = decompress(&compressed, Encoding::Gzip).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_deflate() {
        let data = b"hello world hello world hello world".to_vec();
        let compressed = compress(&data, Encoding::Deflate).unwrap();
        let out = decompress(&compressed, Encoding::Deflate).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_brotli() {
        let data = b"stale-while-revalidate".repeat(10);
        let compressed = compress(&data, Encoding::Br).unwrap();
        let out = decompress(&compressed, Encoding::Br).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_identity() {
        let data = b"raw bytes, no transformation".to_vec();
        let compressed = compress(&data, Encoding::Identity).unwrap();
        assert_eq!(compressed, data);
        let out = decompress(&compressed, Encoding::Identity).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_empty_input_all_encodings() {
        for enc in [Encoding::Br, Encoding::Gzip, Encoding::Deflate, Encoding::Identity] {
            let compressed = compress(&[], enc).unwrap();
            let out = decompress(&compressed, enc).unwrap();
            assert_eq!(out, Vec::<u8>::new());
        }
    }

    #[test]
    fn parse_encoding_tokens() {
        assert_eq!(Encoding::parse("br"), Some(Encoding::Br));
        assert_eq!(Encoding::parse(" GZIP "), Some(Encoding::Gzip));
        assert_eq!(Encoding::parse("deflate"), Some(Encoding::Deflate));
        assert_eq!(Encoding::parse("bogus"), None);
    }

    #[test]
    fn probe_brotli_reports_available() {
        assert!(probe_brotli());
        assert!(brotli_available());
        assert_eq!(preferred_order()[0], Encoding::Br);
    }

    #[tokio::test]
    async fn compress_async_roundtrips_below_threshold() {
        let data = b"small payload".to_vec();
        assert!(data.len() < SPAWN_BLOCKING_THRESHOLD);
        let compressed = compress_async(data.clone(), Encoding::Gzip).await.unwrap();
        let out = decompress_async(compressed, Encoding::Gzip).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn compress_async_roundtrips_above_threshold() {
        let data = b"x".repeat(SPAWN_BLOCKING_THRESHOLD + 1);
        let compressed = compress_async(data.clone(), Encoding::Gzip).await.unwrap();
        let out = decompress_async(compressed, Encoding::Gzip).await.unwrap();
        assert_eq!(out, data);
    }
}
