//! The consumer: resolve a deferred status from response trailers
//!
//! A `DeferredStatusReader` wraps anything that can produce a status line
//! and a trailer sequence. When the status line carries the reserved
//! placeholder code, the caller is told "not yet known" instead of being
//! fed the placeholder, and the real status is extracted from the
//! `X-Deferred-Status` trailer once the body has been consumed.

use crate::errors::{Error, Result};
use crate::http::Headers;
use crate::log_util::ascii_escape;
use crate::protocol;
use crate::status::{parser, Status};

use log::warn;

/// The two reads a wrapped response reader must offer
///
/// Composition, not inheritance: any value with these two capabilities
/// can be wrapped, not just one particular HTTP client.
pub trait RawResponse {
    /// Reads the status line and headers.
    fn read_status_line(&mut self) -> Result<(u16, String, Headers)>;

    /// Reads the trailer fields following the terminal chunk, in wire
    /// order.
    fn read_trailers(&mut self) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Where a response stands in status resolution
#[derive(Debug, Clone, PartialEq, Eq)]
enum StatusState {
    /// Headers not yet read
    Unresolved,
    /// Placeholder seen; the real status is in the trailers
    Deferred,
    /// Status known, and never changing again
    Resolved(Status),
}

/// Wraps a response reader and withholds the placeholder status until
/// the trailer resolves it.
pub struct DeferredStatusReader<R: RawResponse> {
    inner: R,
    state: StatusState,
}

impl<R: RawResponse> DeferredStatusReader<R> {
    pub fn new(inner: R) -> DeferredStatusReader<R> {
        DeferredStatusReader {
            inner,
            state: StatusState::Unresolved,
        }
    }

    /// Access to the wrapped reader, for consuming the body between the
    /// header and trailer phases.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Reads the status line and headers.
    ///
    /// A placeholder status line comes back as `None`: the caller is
    /// explicitly told "not yet known", never handed the placeholder as
    /// if it were real.
    pub fn read_response_headers(&mut self) -> Result<(Option<Status>, Headers)> {
        let (code, reason, headers) = self.inner.read_status_line()?;

        if code == protocol::DEFERRED_STATUS_CODE {
            self.state = StatusState::Deferred;
            Ok((None, headers))
        } else {
            let status = Status { code, reason };
            self.state = StatusState::Resolved(status.clone());
            Ok((Some(status), headers))
        }
    }

    /// Reads the trailers and, if the status is still deferred, resolves
    /// it from the first `X-Deferred-Status` field.
    ///
    /// A deferred response whose trailers lack that field is a protocol
    /// violation, not something to ignore: the placeholder status line
    /// was already consumed and there is no second chance at a status.
    pub fn read_trailers(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        let trailers = self.inner.read_trailers()?;

        if self.state == StatusState::Deferred {
            let found = trailers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(protocol::DEFERRED_STATUS_TRAILER));

            match found {
                Some((_, value)) => match parser::status(value) {
                    Ok((_, status)) => self.state = StatusState::Resolved(status),
                    Err(_) => {
                        warn!(
                            "malformed deferred status in trailer: \"{}\"",
                            ascii_escape(value)
                        );
                        return Err(Error::MalformedTrailerStatus);
                    }
                },
                None => return Err(Error::MissingDeferredStatus),
            }
        }

        Ok(trailers)
    }

    /// The resolved status, or `None` while the trailer is still pending.
    ///
    /// Calling this before the headers have been read at all is an
    /// ordering mistake in the caller, not a protocol state.
    pub fn status(&self) -> Result<Option<&Status>> {
        match self.state {
            StatusState::Unresolved => Err(Error::PrematureStatusQuery),
            StatusState::Deferred => Ok(None),
            StatusState::Resolved(ref status) => Ok(Some(status)),
        }
    }
}

#[cfg(test)]
struct Scripted {
    code: u16,
    reason: &'static str,
    trailers: Vec<(String, Vec<u8>)>,
}

#[cfg(test)]
impl Scripted {
    fn new(code: u16, reason: &'static str) -> Scripted {
        Scripted {
            code,
            reason,
            trailers: Vec::new(),
        }
    }

    fn trailer(mut self, name: &str, value: &[u8]) -> Scripted {
        self.trailers.push((String::from(name), Vec::from(value)));
        self
    }
}

#[cfg(test)]
impl RawResponse for Scripted {
    fn read_status_line(&mut self) -> Result<(u16, String, Headers)> {
        Ok((self.code, String::from(self.reason), Headers::new()))
    }

    fn read_trailers(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self.trailers.clone())
    }
}

#[test]
fn normal_status_resolves_immediately() {
    let mut reader = DeferredStatusReader::new(Scripted::new(200, "OK"));

    let (status, _) = reader.read_response_headers().unwrap();
    assert_eq!(status, Some(Status::ok()));
    assert_eq!(reader.status().unwrap(), Some(&Status::ok()));
}

#[test]
fn normal_status_ignores_trailer_fields() {
    // Even a stray X-Deferred-Status must not overwrite a resolved status.
    let mut reader = DeferredStatusReader::new(
        Scripted::new(200, "OK").trailer("X-Deferred-Status", b"404 Not Found"),
    );

    reader.read_response_headers().unwrap();
    let trailers = reader.read_trailers().unwrap();
    assert_eq!(trailers.len(), 1);
    assert_eq!(reader.status().unwrap(), Some(&Status::ok()));
}

#[test]
fn placeholder_defers_then_resolves() {
    let mut reader = DeferredStatusReader::new(
        Scripted::new(208, "Trailing Status").trailer("X-Deferred-Status", b"404 Not Found"),
    );

    let (status, _) = reader.read_response_headers().unwrap();
    assert_eq!(status, None);
    assert_eq!(reader.status().unwrap(), None);

    reader.read_trailers().unwrap();
    let resolved = reader.status().unwrap().unwrap();
    assert_eq!(resolved.code, 404);
    assert_eq!(resolved.reason, "Not Found");
}

#[test]
fn trailer_name_is_case_insensitive() {
    let mut reader = DeferredStatusReader::new(
        Scripted::new(208, "Trailing Status").trailer("x-deferred-status", b"201 Created"),
    );

    reader.read_response_headers().unwrap();
    reader.read_trailers().unwrap();
    assert_eq!(reader.status().unwrap().map(|s| s.code), Some(201));
}

#[test]
fn first_deferred_trailer_wins() {
    let mut reader = DeferredStatusReader::new(
        Scripted::new(208, "Trailing Status")
            .trailer("X-Deferred-Status", b"200 OK")
            .trailer("X-Deferred-Status", b"500 Internal Server Error"),
    );

    reader.read_response_headers().unwrap();
    let trailers = reader.read_trailers().unwrap();
    assert_eq!(trailers.len(), 2);
    assert_eq!(reader.status().unwrap(), Some(&Status::ok()));
}

#[test]
fn missing_deferred_trailer_is_fatal() {
    let mut reader =
        DeferredStatusReader::new(Scripted::new(208, "Trailing Status").trailer("Expires", b"never"));

    reader.read_response_headers().unwrap();
    match reader.read_trailers() {
        Err(Error::MissingDeferredStatus) => (),
        other => panic!("{:?}", other),
    }
}

#[test]
fn malformed_deferred_trailer_is_fatal() {
    let mut reader = DeferredStatusReader::new(
        Scripted::new(208, "Trailing Status").trailer("X-Deferred-Status", b"fine I guess"),
    );

    reader.read_response_headers().unwrap();
    match reader.read_trailers() {
        Err(Error::MalformedTrailerStatus) => (),
        other => panic!("{:?}", other),
    }
}

#[test]
fn status_before_headers_is_a_caller_error() {
    let reader = DeferredStatusReader::new(Scripted::new(200, "OK"));

    match reader.status() {
        Err(Error::PrematureStatusQuery) => (),
        other => panic!("{:?}", other),
    }
}
