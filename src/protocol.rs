//! The wire contract shared by the producer and the consumer
//!
//! Both sides import these constants rather than repeating the literals,
//! so the placeholder code and the trailer name cannot drift apart.

/// Reserved placeholder status code meaning "real status not yet known;
/// see the trailer."
pub const DEFERRED_STATUS_CODE: u16 = 208;

/// Reason phrase accompanying the placeholder code
pub const DEFERRED_STATUS_REASON: &str = "Trailing Status";

/// Trailer field whose value is the real status line
pub const DEFERRED_STATUS_TRAILER: &str = "X-Deferred-Status";

/// How many bytes the encoder reads from the child per chunk, at most
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;
