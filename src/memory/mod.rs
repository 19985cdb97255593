//! Free-system-memory probe used to size the cache's default byte budget
//! (70% of free memory at startup).

use crate::error::GatewayError;
use sysinfo::System;

pub const DEFAULT_FRACTION: f64 = 0.7;

/// Probe free system memory and return 70% of it, in bytes. Raises
/// `UnsupportedPlatform` if the host OS can't be read at all (an empty
/// `System` refresh with zero total memory is treated as unsupported
/// rather than silently handing back a zero-byte cache).
pub fn default_cache_bytes() -> Result<u64, GatewayError> {
    let mut sys = System::new();
    sys.refresh_memory();

    if sys.total_memory() == 0 {
        return Err(GatewayError::UnsupportedPlatform);
    }

    let free_bytes = sys.available_memory();
    Ok((free_bytes as f64 * DEFAULT_FRACTION) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_bytes_is_positive_on_this_host() {
        // Exercises the happy path only; CI runners always report nonzero
        // total memory.
        let bytes = default_cache_bytes().unwrap();
        assert!(bytes > 0);
    }
}
