use std::fmt;

/// The single error enum crossing component boundaries.
///
/// Library code returns these directly; `anyhow` is reserved for the
/// bootstrap boundary in `main.rs` / `server::bootstrap`.
#[derive(Debug)]
pub enum GatewayError {
    /// Raised by the proxy handler on a non-2xx upstream response or an
    /// upstream connect/read failure. Carries the status to send to the
    /// downstream client and an optional captured body for diagnostics.
    Route {
        status_code: u16,
        response_text: Option<String>,
    },
    /// Router URL construction was asked to fill a mandatory `:name`
    /// segment that wasn't supplied.
    ParamMissing(String),
    /// A codec failed to compress or decompress; carries the encoding name.
    Codec { encoding: &'static str, reason: String },
    /// `transcode` could not produce any of the requested target encodings.
    EncodingUnavailable,
    /// The memory-probe collaborator doesn't recognize the host OS.
    UnsupportedPlatform,
    /// The cache singleton was queried before `GatewayState` finished
    /// initializing.
    CacheAbsent,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Route { status_code, response_text } => {
                write!(f, "upstream route error: status={}", status_code)?;
                if let Some(text) = response_text {
                    write!(f, ", body={}", text)?;
                }
                Ok(())
            }
            GatewayError::ParamMissing(name) => {
                write!(f, "missing required route parameter: {}", name)
            }
            GatewayError::Codec { encoding, reason } => {
                write!(f, "codec error ({}): {}", encoding, reason)
            }
            GatewayError::EncodingUnavailable => write!(f, "no acceptable encoding available"),
            GatewayError::UnsupportedPlatform => {
                write!(f, "unsupported platform for memory probe")
            }
            GatewayError::CacheAbsent => write!(f, "cache queried before initialization"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl GatewayError {
    /// HTTP status to report to the client for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Route { status_code, .. } => *status_code,
            GatewayError::ParamMissing(_) => 500,
            GatewayError::Codec { .. } => 500,
            GatewayError::EncodingUnavailable => 500,
            GatewayError::UnsupportedPlatform => 500,
            GatewayError::CacheAbsent => 500,
        }
    }

    /// Machine-readable error code for the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Route { .. } => "ROUTE_ERROR",
            GatewayError::ParamMissing(_) => "PARAM_MISSING",
            GatewayError::Codec { .. } => "CODEC_ERROR",
            GatewayError::EncodingUnavailable => "ENCODING_UNAVAILABLE",
            GatewayError::UnsupportedPlatform => "UNSUPPORTED_PLATFORM",
            GatewayError::CacheAbsent => "CACHE_ABSENT",
        }
    }

    pub fn response_text(&self) -> Option<&str> {
        match self {
            GatewayError::Route { response_text, .. } => response_text.as_deref(),
            _ => None,
        }
    }
}
