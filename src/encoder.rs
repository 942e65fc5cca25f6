//! The producer: stream a child's output as a chunked response body and
//! emit its exit status as a trailer
//!
//! The wire order is preamble, data chunks, terminal chunk, trailer. The
//! `Fresh`/`Streaming` type parameter pins the first transition; the rest
//! is enforced by `finish` consuming the encoder.

use crate::child::ChildProcess;
use crate::errors::{Error, Result};
use crate::protocol;
use crate::status::Status;

use log::{debug, warn};
use mime::Mime;

use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::process::ChildStdout;

/// Options for one streamed response
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Content-Type header to announce, if any
    pub content_type: Option<Mime>,
    /// How CGI-style header lines in the child's output are treated
    pub cgi_headers: CgiHeaderMode,
    /// Upper bound on bytes read from the child per chunk
    pub block_size: usize,
}

impl Default for EncoderOptions {
    fn default() -> EncoderOptions {
        EncoderOptions {
            content_type: None,
            cgi_headers: CgiHeaderMode::Raw,
            block_size: protocol::DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Treatment of CGI-style headers at the start of the child's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgiHeaderMode {
    /// The child's output is an opaque byte stream, forwarded untouched
    Raw,
    /// Reserved for merging the child's CGI headers into the response.
    /// Currently identical to `Raw`; the separate name keeps the
    /// pass-through from being mistaken for an implemented merge.
    MergeUnimplemented,
}

/// A marker for `StreamEncoder`, indicating nothing has been sent yet
pub enum Fresh {}

/// A marker for `StreamEncoder`, indicating the preamble has been sent
/// and body chunks may follow
pub enum Streaming {}

/// Streams one child process into one response sink.
///
/// There is exactly one writer per response, and its writes are strictly
/// sequential, so the sink needs no external synchronization. The output
/// side is any `Read`; in production it is the child's `ChildStdout`.
pub struct StreamEncoder<W: Write, R: Read, State> {
    sink: W,
    child: ChildProcess,
    output: R,
    options: EncoderOptions,
    read_failed: bool,
    _state: PhantomData<State>,
}

impl<W: Write> StreamEncoder<W, ChildStdout, Fresh> {
    /// Launches the child; nothing is written to the sink yet, so a
    /// `Launch` error leaves room for an ordinary error response.
    pub fn start<S, I, A>(
        command: S,
        args: I,
        options: EncoderOptions,
        sink: W,
    ) -> Result<StreamEncoder<W, ChildStdout, Fresh>>
    where
        S: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let (child, output) = ChildProcess::spawn(command, args)?;
        Ok(StreamEncoder::new(child, output, options, sink))
    }
}

impl<W: Write, R: Read> StreamEncoder<W, R, Fresh> {
    /// Wraps an already-spawned child and whatever stream its output
    /// arrives on.
    pub fn new(
        child: ChildProcess,
        output: R,
        options: EncoderOptions,
        sink: W,
    ) -> StreamEncoder<W, R, Fresh> {
        if options.cgi_headers == CgiHeaderMode::MergeUnimplemented {
            warn!(
                "CGI header merging is not implemented; \
                 the child's output passes through unmodified"
            );
        }

        StreamEncoder {
            sink,
            child,
            output,
            options,
            read_failed: false,
            _state: PhantomData,
        }
    }

    /// Writes the placeholder status line and the headers announcing the
    /// chunked body and its trailer, then flushes so the client sees them
    /// before the child produces anything.
    pub fn write_preamble(mut self) -> Result<StreamEncoder<W, R, Streaming>> {
        write!(
            self.sink,
            "HTTP/1.1 {} {}\r\n",
            protocol::DEFERRED_STATUS_CODE,
            protocol::DEFERRED_STATUS_REASON
        )?;
        self.sink.write_all(b"Transfer-Encoding: chunked\r\n")?;
        write!(
            self.sink,
            "Trailer: {}\r\n",
            protocol::DEFERRED_STATUS_TRAILER
        )?;
        if let Some(ref mime) = self.options.content_type {
            write!(self.sink, "Content-Type: {}\r\n", mime)?;
        }
        self.sink.write_all(b"\r\n")?;
        self.sink.flush()?;

        let StreamEncoder {
            sink,
            child,
            output,
            options,
            read_failed,
            ..
        } = self;

        Ok(StreamEncoder {
            sink,
            child,
            output,
            options,
            read_failed,
            _state: PhantomData,
        })
    }
}

impl<W: Write, R: Read> StreamEncoder<W, R, Streaming> {
    /// Forwards the child's output, one chunk frame per successful read,
    /// until end-of-stream.
    ///
    /// Nothing accumulates: each block is written and released before the
    /// next read, so the pipe alone provides backpressure end to end.
    pub fn pump_body(&mut self) -> Result<()> {
        let mut block = vec![0u8; self.options.block_size];

        loop {
            let read = match self.output.read(&mut block) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                // A signal delivered to this process is not a failure of
                // the stream; try the read again.
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.read_failed = true;
                    return Err(Error::ReadFailure(e));
                }
            };

            write_chunk_raw(&mut self.sink, &block[..read])?;
        }
    }

    /// Writes the terminal chunk, reaps the child, and emits the trailer.
    ///
    /// The child is waited on only here, after its output was drained or
    /// abandoned; reaping earlier could race with unflushed output. A
    /// response that saw a read failure gets a failure trailer no matter
    /// how the child then exited.
    pub fn finish(self) -> Result<Status> {
        let StreamEncoder {
            mut sink,
            mut child,
            output,
            read_failed,
            ..
        } = self;

        sink.write_all(b"0\r\n")?;

        // Close the read end first: a child still writing sees a closed
        // pipe instead of blocking the wait below forever.
        drop(output);

        // The announced trailer must follow the terminal chunk no matter
        // what; even a failed reap resolves to a failure status rather
        // than leaving the response without its trailer.
        let status = match child.wait() {
            Ok(outcome) if !read_failed => {
                debug!("child terminated: {:?}", outcome);
                outcome.http_status()
            }
            Ok(_) => Status::internal_error(),
            Err(e) => {
                warn!("could not reap the child: {:?}", e);
                Status::internal_error()
            }
        };

        write!(
            sink,
            "{}: {}\r\n\r\n",
            protocol::DEFERRED_STATUS_TRAILER,
            status
        )?;
        sink.flush()?;

        Ok(status)
    }
}

/// Writes a single chunk in the chunked transfer-encoding.
fn write_chunk_raw<W: Write>(sink: &mut W, chunk_content: &[u8]) -> io::Result<()> {
    write!(sink, "{:x}\r\n", chunk_content.len())?;
    sink.write_all(chunk_content)?;
    sink.write_all(b"\r\n")?;
    sink.flush()
}

/// Runs the whole producer sequence: spawn, preamble, body, trailer.
///
/// A read failure still gets its terminal chunk and failure trailer
/// before the error surfaces; only a broken sink aborts the response
/// outright, since nothing more can be written to it.
pub fn run<W, S, I, A>(command: S, args: I, options: EncoderOptions, sink: W) -> Result<Status>
where
    W: Write,
    S: AsRef<OsStr>,
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let encoder = StreamEncoder::start(command, args, options, sink)?;
    let mut encoder = encoder.write_preamble()?;

    match encoder.pump_body() {
        Ok(()) => encoder.finish(),
        Err(e @ Error::ReadFailure(_)) => {
            encoder.finish()?;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// The ordinary response for a child that never started: no body bytes
/// have been committed, so a plain 500 can still be sent instead of the
/// chunked preamble.
pub fn launch_failure_response<W: Write>(mut sink: W) -> io::Result<()> {
    sink.write_all(b"HTTP/1.1 500 Internal Server Error\r\n")?;
    sink.write_all(b"Content-Type: text/plain\r\n")?;
    write!(sink, "Content-Length: {}\r\n\r\n", LAUNCH_FAILURE_BODY.len())?;
    sink.write_all(LAUNCH_FAILURE_BODY)?;
    sink.flush()
}

const LAUNCH_FAILURE_BODY: &[u8] = b"The command behind this endpoint could not be started.\n";

#[test]
fn chunk_frame_matches_length() {
    let mut sink = Vec::new();
    write_chunk_raw(&mut sink, b"hello, world\n").unwrap();
    assert_eq!(sink, b"d\r\nhello, world\n\r\n");
}

#[test]
fn chunk_frame_sizes_are_hex() {
    let mut sink = Vec::new();
    write_chunk_raw(&mut sink, &[0u8; 26]).unwrap();
    assert!(sink.starts_with(b"1a\r\n"));
    assert_eq!(sink.len(), 4 + 26 + 2);
}

#[test]
fn preamble_announces_trailer() {
    let mut sink = Vec::new();
    let options = EncoderOptions {
        content_type: Some(mime::TEXT_PLAIN),
        ..Default::default()
    };

    let encoder = StreamEncoder::start("/bin/sh", ["-c", "exit 0"], options, &mut sink).unwrap();
    let mut encoder = encoder.write_preamble().unwrap();
    encoder.pump_body().unwrap();
    let status = encoder.finish().unwrap();

    assert_eq!(status, Status::ok());
    assert!(sink.starts_with(
        b"HTTP/1.1 208 Trailing Status\r\n\
          Transfer-Encoding: chunked\r\n\
          Trailer: X-Deferred-Status\r\n\
          Content-Type: text/plain\r\n\
          \r\n"
    ));
}

/// A stream that yields its data and then fails instead of reaching
/// end-of-stream
#[cfg(test)]
struct BrokenStream {
    data: &'static [u8],
    pos: usize,
}

#[cfg(test)]
impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.data.len() {
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        } else {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream broke"))
        }
    }
}

#[test]
fn read_failure_still_emits_failure_trailer() {
    let mut sink = Vec::new();
    let (child, stdout) = ChildProcess::spawn("/bin/sh", ["-c", "exit 0"]).unwrap();
    drop(stdout);

    let broken = BrokenStream {
        data: b"partial",
        pos: 0,
    };
    let encoder = StreamEncoder::new(child, broken, EncoderOptions::default(), &mut sink);
    let mut encoder = encoder.write_preamble().unwrap();

    match encoder.pump_body() {
        Err(Error::ReadFailure(_)) => (),
        other => panic!("{:?}", other),
    }

    // The clean exit above must not win: once a read failed, the trailer
    // reports failure.
    let status = encoder.finish().unwrap();
    assert_eq!(status, Status::internal_error());
    assert!(sink.ends_with(
        b"0\r\n\
          X-Deferred-Status: 500 Internal Server Error\r\n\
          \r\n"
    ));
}

/// A stream whose first read is interrupted, as by a signal
#[cfg(test)]
struct InterruptedStream {
    interrupted: bool,
    data: &'static [u8],
    pos: usize,
}

#[cfg(test)]
impl Read for InterruptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.interrupted {
            self.interrupted = true;
            return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
        }

        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn interrupted_read_is_retried_not_fatal() {
    let mut sink = Vec::new();
    let (child, stdout) = ChildProcess::spawn("/bin/sh", ["-c", "exit 0"]).unwrap();
    drop(stdout);

    let stream = InterruptedStream {
        interrupted: false,
        data: b"steady",
        pos: 0,
    };
    let encoder = StreamEncoder::new(child, stream, EncoderOptions::default(), &mut sink);
    let mut encoder = encoder.write_preamble().unwrap();

    encoder.pump_body().unwrap();
    let status = encoder.finish().unwrap();

    assert_eq!(status, Status::ok());
    let wire = String::from_utf8(sink).unwrap();
    assert!(wire.contains("6\r\nsteady\r\n"));
    assert!(wire.ends_with("X-Deferred-Status: 200 OK\r\n\r\n"));
}

#[test]
fn launch_failure_response_is_a_plain_500() {
    let mut sink = Vec::new();
    launch_failure_response(&mut sink).unwrap();
    assert!(sink.starts_with(b"HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(sink.ends_with(LAUNCH_FAILURE_BODY));
}
