//! Error handling for the deferred-status protocol

use std::io;

/// A Result for internal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors which might arise within the application
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Parse(httparse::Error),
    /// The child command could not be started at all
    Launch(io::Error),
    /// Reading the child's output failed somewhere other than end-of-stream
    ReadFailure(io::Error),
    /// A chunk-size line was not valid chunked encoding
    InvalidChunkSize,
    /// Chunk data was not followed by CRLF
    MalformedChunk,
    /// The stream ended before the response did
    ResponseIncomplete,
    /// The deferred-status trailer value did not begin with three digits
    MalformedTrailerStatus,
    /// A deferred response ended its trailers without the status trailer
    MissingDeferredStatus,
    /// The status was queried before the response headers were read
    PrematureStatusQuery,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<httparse::Error> for Error {
    fn from(e: httparse::Error) -> Error {
        Error::Parse(e)
    }
}
