use thiserror::Error;

/// Typed errors for the wxbridge boundary.
///
/// Leaf/channel code uses `anyhow::Result`; the `Internal` variant converts
/// seamlessly via `?`. Transport failures never appear here — the connection
/// loop recovers them locally and they are not surfaced to callers.
#[derive(Debug, Error)]
pub enum WxBridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
