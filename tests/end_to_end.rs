//! Whole-pipeline tests: a real child process through the encoder, and
//! the resulting bytes back through the response reader.

use trailer_status::encoder::{self, EncoderOptions};
use trailer_status::errors::Error;
use trailer_status::http::HttpResponseReader;
use trailer_status::reader::DeferredStatusReader;
use trailer_status::status::Status;

fn encode_shell(script: &str, options: EncoderOptions) -> (Result<Status, Error>, Vec<u8>) {
    let mut wire = Vec::new();
    let result = encoder::run("/bin/sh", ["-c", script], options, &mut wire);
    (result, wire)
}

#[test]
fn hello_world_wire_format() {
    let (status, wire) = encode_shell("printf 'hello, world\\n'", EncoderOptions::default());
    assert_eq!(status.unwrap(), Status::ok());

    let expected: &[u8] = b"HTTP/1.1 208 Trailing Status\r\n\
                            Transfer-Encoding: chunked\r\n\
                            Trailer: X-Deferred-Status\r\n\
                            \r\n\
                            d\r\n\
                            hello, world\n\r\n\
                            0\r\n\
                            X-Deferred-Status: 200 OK\r\n\
                            \r\n";
    assert_eq!(wire.as_slice(), expected);
}

#[test]
fn failing_command_gets_failure_trailer() {
    let (status, wire) = encode_shell("printf nope; exit 3", EncoderOptions::default());
    assert_eq!(status.unwrap(), Status::internal_error());
    assert!(wire.ends_with(b"X-Deferred-Status: 500 Internal Server Error\r\n\r\n"));
}

#[test]
fn signaled_command_gets_failure_trailer() {
    let (status, _) = encode_shell("kill -KILL $$", EncoderOptions::default());
    assert_eq!(status.unwrap(), Status::internal_error());
}

#[test]
fn silent_child_produces_empty_body() {
    let (status, wire) = encode_shell("exit 0", EncoderOptions::default());
    assert_eq!(status.unwrap(), Status::ok());

    let mut reader = DeferredStatusReader::new(HttpResponseReader::new(wire.as_slice()));
    reader.read_response_headers().unwrap();
    assert_eq!(reader.get_mut().read_body().unwrap(), b"");
    reader.read_trailers().unwrap();
    assert_eq!(reader.status().unwrap(), Some(&Status::ok()));
}

#[test]
fn dechunked_body_reproduces_child_output() {
    // Tiny blocks force many chunk frames; reassembly must not depend on
    // where the block boundaries fell.
    let options = EncoderOptions {
        block_size: 7,
        ..Default::default()
    };
    let (status, wire) = encode_shell("seq 1 100", options);
    assert_eq!(status.unwrap(), Status::ok());

    let mut reader = DeferredStatusReader::new(HttpResponseReader::new(wire.as_slice()));
    let (pending, _) = reader.read_response_headers().unwrap();
    assert_eq!(pending, None);

    let body = reader.get_mut().read_body().unwrap();
    let expected: String = (1..=100).map(|n| format!("{}\n", n)).collect();
    assert_eq!(body, expected.as_bytes());

    reader.read_trailers().unwrap();
    assert_eq!(reader.status().unwrap(), Some(&Status::ok()));
}

#[test]
fn reader_round_trip_resolves_deferred_status() {
    let (_, wire) = encode_shell("printf streamed; exit 9", EncoderOptions::default());

    let mut reader = DeferredStatusReader::new(HttpResponseReader::new(wire.as_slice()));

    let (pending, headers) = reader.read_response_headers().unwrap();
    assert_eq!(pending, None);
    assert_eq!(
        headers.get("Transfer-Encoding").map(Vec::as_slice),
        Some(&b"chunked"[..])
    );
    assert_eq!(
        headers.get("Trailer").map(Vec::as_slice),
        Some(&b"X-Deferred-Status"[..])
    );

    assert_eq!(reader.get_mut().read_body().unwrap(), b"streamed");

    reader.read_trailers().unwrap();
    assert_eq!(reader.status().unwrap(), Some(&Status::internal_error()));
}

#[test]
fn content_type_is_announced_when_configured() {
    let options = EncoderOptions {
        content_type: Some(mime::TEXT_PLAIN),
        ..Default::default()
    };
    let (_, wire) = encode_shell("exit 0", options);

    let mut reader = DeferredStatusReader::new(HttpResponseReader::new(wire.as_slice()));
    let (_, headers) = reader.read_response_headers().unwrap();
    assert_eq!(
        headers.get("Content-Type").map(Vec::as_slice),
        Some(&b"text/plain"[..])
    );
}

#[test]
fn missing_command_fails_before_any_bytes() {
    let mut wire = Vec::new();
    let result = encoder::run(
        "/no/such/binary",
        Vec::<&str>::new(),
        EncoderOptions::default(),
        &mut wire,
    );

    match result {
        Err(Error::Launch(_)) => (),
        other => panic!("{:?}", other),
    }
    assert!(wire.is_empty());
}
