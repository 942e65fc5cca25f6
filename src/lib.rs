//! Stream a command's output as an HTTP response whose real status
//! arrives only after the body.
//!
//! A process whose success is unknown until it finishes can still produce
//! a well-formed, incrementally delivered response: the producer half runs
//! a child process and frames its stdout as an HTTP/1.1 chunked body under
//! a reserved placeholder status line, and once the child exits the true
//! outcome is attached as a trailer field:
//!
//! ```text
//! HTTP/1.1 208 Trailing Status\r\n
//! Transfer-Encoding: chunked\r\n
//! Trailer: X-Deferred-Status\r\n
//! \r\n
//! d\r\n
//! hello, world\n\r\n
//! 0\r\n
//! X-Deferred-Status: 200 OK\r\n
//! \r\n
//! ```
//!
//! The consumer half wraps any reader that can produce a status line and a
//! trailer sequence, withholds the placeholder from its caller, and
//! resolves the real status once the trailer arrives. The two halves never
//! talk to each other directly; the constants in [`protocol`] are the
//! whole contract.

pub mod child;
pub mod config;
pub mod encoder;
pub mod errors;
pub mod http;
pub mod log_util;
pub mod protocol;
pub mod reader;
pub mod status;
