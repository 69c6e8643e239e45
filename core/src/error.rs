//! Error types for discovery bridges

use thiserror::Error;

/// Error type for bridge operations
///
/// This is what a bridge reports back through its completion when `start`
/// or `stop` fails, and what the publishing seam returns when a record can't
/// be published or removed. The coordinator attributes every one of these to
/// the bridge that produced it.
///
/// # Example
///
/// ```
/// use majakka_core::BridgeError;
///
/// fn connect_to_backend() -> Result<(), BridgeError> {
///     Err(BridgeError::Connection("refused".to_string()))
/// }
///
/// match connect_to_backend() {
///     Ok(_) => println!("Connected!"),
///     Err(BridgeError::Connection(msg)) => println!("Connection failed: {}", msg),
///     Err(e) => println!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Initialization failed
    ///
    /// Returned when a bridge can't start.
    /// Examples: missing credentials, backend rejected the session.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Invalid bridge configuration
    ///
    /// Examples: required key missing, value of the wrong type.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Publishing a record failed
    #[error("publish failed: {0}")]
    Publish(String),

    /// Connection error
    ///
    /// Examples: DNS lookup failed, connection refused, TLS handshake error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Unknown registration
    ///
    /// Returned when unpublishing a record that doesn't exist or that
    /// belongs to another bridge.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Shutdown error
    ///
    /// Examples: failed to deregister watches, timeout closing a client.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}
