//! A minimal HTTP/1.1 response reader
//!
//! Just enough of the client side to consume one chunked response: status
//! line and headers via `httparse`, chunk framing via
//! `httparse::parse_chunk_size`, trailers via `httparse::parse_headers`.
//! It speaks only what the deferred-status protocol needs; there is no
//! request side and no connection reuse.

use crate::errors::{Error, Result};
use crate::reader::RawResponse;

use std::collections::hash_map::{self, Entry, HashMap};
use std::io::{BufRead, BufReader, Read};

const MAX_HEADERS: usize = 100;

/// A map of HTTP headers
///
/// This is just a newtype wrapper around a `HashMap<String, Vec<u8>>`,
/// but the keys are case-normalized on input. The first word, and any
/// words after a hyphen, are capitalized, with all other letters
/// lowercased. Duplicate fields are comma-joined.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    map: HashMap<String, Vec<u8>>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers {
            map: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: &str, mut value: Vec<u8>) {
        match self.map.entry(normalize_header_name(key)) {
            Entry::Vacant(e) => {
                e.insert(value);
            }
            Entry::Occupied(mut e) => {
                let entry = e.get_mut();
                entry.reserve(value.len() + 1);
                entry.push(b',');
                entry.append(&mut value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Vec<u8>> {
        self.map.get(&normalize_header_name(key))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a String, &'a Vec<u8>);
    type IntoIter = hash_map::Iter<'a, String, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

fn normalize_header_name(name: &str) -> String {
    let lowercased = name.to_ascii_lowercase();
    let mut lower_chars = lowercased.chars();

    let mut normalized = String::with_capacity(lowercased.len());
    match lower_chars.next() {
        Some(ch) => normalized.push(ch.to_ascii_uppercase()),
        None => return normalized,
    }

    let mut after_hyphen = false;
    for ch in lower_chars {
        if ch == '-' {
            after_hyphen = true;
            normalized.push(ch);
        } else if after_hyphen {
            normalized.push(ch.to_ascii_uppercase());
            after_hyphen = false;
        } else {
            normalized.push(ch);
        }
    }

    normalized
}

#[test]
fn normalize_content_type() {
    let expected = "Content-Type";
    assert_eq!(expected, &normalize_header_name("Content-Type"));
    assert_eq!(expected, &normalize_header_name("content-type"));
    assert_eq!(expected, &normalize_header_name("CONTENT-TYPE"));
    assert_eq!(expected, &normalize_header_name("cOnTeNt-TyPe"));
}

#[test]
fn duplicate_headers_comma_join() {
    let mut headers = Headers::new();
    headers.insert("Set-Cookie", Vec::from(&b"a=1"[..]));
    headers.insert("set-cookie", Vec::from(&b"b=2"[..]));
    assert_eq!(
        headers.get("Set-Cookie").map(Vec::as_slice),
        Some(&b"a=1,b=2"[..])
    );
    assert_eq!(headers.len(), 1);
}

/// Reads one response from an underlying byte stream.
///
/// The phases must be consumed in wire order: status line, body,
/// trailers. The reader keeps a cursor, not a copy, so nothing is
/// re-readable.
pub struct HttpResponseReader<R> {
    reader: BufReader<R>,
}

impl<R: Read> HttpResponseReader<R> {
    pub fn new(stream: R) -> HttpResponseReader<R> {
        HttpResponseReader {
            reader: BufReader::new(stream),
        }
    }

    /// Reads and dechunks the whole body, through the terminal chunk.
    pub fn read_body(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();

        loop {
            let size = self.read_chunk_size()?;
            if size == 0 {
                return Ok(body);
            }

            let mut remaining = size;
            while remaining > 0 {
                let take = {
                    let chunk = self.reader.fill_buf()?;
                    if chunk.is_empty() {
                        return Err(Error::ResponseIncomplete);
                    }
                    let take = chunk.len().min(remaining);
                    body.extend_from_slice(&chunk[..take]);
                    take
                };
                self.reader.consume(take);
                remaining -= take;
            }

            // Chunk data carries its own CRLF, outside the declared size.
            let mut crlf = [0u8; 2];
            self.reader.read_exact(&mut crlf)?;
            if &crlf != b"\r\n" {
                return Err(Error::MalformedChunk);
            }
        }
    }

    fn read_chunk_size(&mut self) -> Result<usize> {
        let mut line: Vec<u8> = Vec::new();

        loop {
            let (parsed, fresh) = {
                let chunk = self.reader.fill_buf()?;
                if chunk.is_empty() {
                    return Err(Error::ResponseIncomplete);
                }
                line.extend_from_slice(chunk);
                (httparse::parse_chunk_size(&line), chunk.len())
            };

            match parsed {
                Ok(httparse::Status::Complete((consumed, size))) => {
                    let already = line.len() - fresh;
                    self.reader.consume(consumed - already);
                    return Ok(size as usize);
                }
                Ok(httparse::Status::Partial) => self.reader.consume(fresh),
                Err(_) => return Err(Error::InvalidChunkSize),
            }
        }
    }
}

impl<R: Read> RawResponse for HttpResponseReader<R> {
    fn read_status_line(&mut self) -> Result<(u16, String, Headers)> {
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let (parsed, fresh) = {
                let chunk = self.reader.fill_buf()?;
                if chunk.is_empty() {
                    return Err(Error::ResponseIncomplete);
                }
                buf.extend_from_slice(chunk);
                (parse_response_head(&buf)?, chunk.len())
            };

            match parsed {
                Some((consumed, code, reason, headers)) => {
                    let already = buf.len() - fresh;
                    self.reader.consume(consumed - already);
                    return Ok((code, reason, headers));
                }
                None => self.reader.consume(fresh),
            }
        }
    }

    fn read_trailers(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let (parsed, fresh) = {
                let chunk = self.reader.fill_buf()?;
                // Even an empty trailer section ends with CRLF, so
                // end-of-stream here means a truncated response.
                if chunk.is_empty() {
                    return Err(Error::ResponseIncomplete);
                }
                buf.extend_from_slice(chunk);
                (parse_trailer_fields(&buf)?, chunk.len())
            };

            match parsed {
                Some((consumed, trailers)) => {
                    let already = buf.len() - fresh;
                    self.reader.consume(consumed - already);
                    return Ok(trailers);
                }
                None => self.reader.consume(fresh),
            }
        }
    }
}

fn parse_response_head(buf: &[u8]) -> Result<Option<(usize, u16, String, Headers)>> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut header_storage);

    match response.parse(buf)? {
        httparse::Status::Complete(consumed) => {
            let (code, reason) = match (response.code, response.reason) {
                (Some(code), Some(reason)) => (code, String::from(reason)),
                _ => return Err(Error::ResponseIncomplete),
            };

            let mut headers = Headers::new();
            for header in response.headers.iter() {
                headers.insert(header.name, Vec::from(header.value));
            }

            Ok(Some((consumed, code, reason, headers)))
        }
        httparse::Status::Partial => Ok(None),
    }
}

fn parse_trailer_fields(buf: &[u8]) -> Result<Option<(usize, Vec<(String, Vec<u8>)>)>> {
    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];

    match httparse::parse_headers(buf, &mut header_storage)? {
        httparse::Status::Complete((consumed, parsed)) => {
            let trailers = parsed
                .iter()
                .map(|h| (String::from(h.name), Vec::from(h.value)))
                .collect();
            Ok(Some((consumed, trailers)))
        }
        httparse::Status::Partial => Ok(None),
    }
}

#[test]
fn reads_status_line_and_headers() {
    let response: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n";
    let mut reader = HttpResponseReader::new(response);

    let (code, reason, headers) = reader.read_status_line().unwrap();
    assert_eq!(code, 200);
    assert_eq!(reason, "OK");
    assert!(!headers.is_empty());
    assert_eq!(
        headers.get("content-type").map(Vec::as_slice),
        Some(&b"text/plain"[..])
    );
}

#[test]
fn accumulates_across_short_reads() {
    let response: &[u8] = b"HTTP/1.1 404 Not Found\r\nServer: toy\r\n\r\n";
    let mut reader = HttpResponseReader {
        reader: BufReader::with_capacity(3, response),
    };

    let (code, reason, headers) = reader.read_status_line().unwrap();
    assert_eq!(code, 404);
    assert_eq!(reason, "Not Found");
    assert_eq!(headers.len(), 1);
}

#[test]
fn dechunks_body() {
    let response: &[u8] = b"HTTP/1.1 208 Trailing Status\r\n\
                            Transfer-Encoding: chunked\r\n\r\n\
                            5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n";
    let mut reader = HttpResponseReader::new(response);

    reader.read_status_line().unwrap();
    assert_eq!(reader.read_body().unwrap(), b"hello, world");
    assert!(reader.read_trailers().unwrap().is_empty());
}

#[test]
fn reads_trailers_in_wire_order() {
    let response: &[u8] = b"HTTP/1.1 208 Trailing Status\r\n\
                            Transfer-Encoding: chunked\r\n\r\n\
                            0\r\n\
                            X-Deferred-Status: 200 OK\r\n\
                            Server-Timing: total;dur=1\r\n\r\n";
    let mut reader = HttpResponseReader::new(response);

    reader.read_status_line().unwrap();
    reader.read_body().unwrap();

    let trailers = reader.read_trailers().unwrap();
    assert_eq!(trailers.len(), 2);
    assert_eq!(
        trailers[0],
        (String::from("X-Deferred-Status"), Vec::from(&b"200 OK"[..]))
    );
}

#[test]
fn rejects_bad_chunk_size() {
    let response: &[u8] = b"HTTP/1.1 200 OK\r\n\r\nzz\r\nhello\r\n0\r\n\r\n";
    let mut reader = HttpResponseReader::new(response);

    reader.read_status_line().unwrap();
    match reader.read_body() {
        Err(Error::InvalidChunkSize) => (),
        other => panic!("{:?}", other),
    }
}

#[test]
fn rejects_missing_chunk_terminator() {
    let response: &[u8] = b"HTTP/1.1 200 OK\r\n\r\n5\r\nhelloXX0\r\n\r\n";
    let mut reader = HttpResponseReader::new(response);

    reader.read_status_line().unwrap();
    match reader.read_body() {
        Err(Error::MalformedChunk) => (),
        other => panic!("{:?}", other),
    }
}

#[test]
fn truncated_head_is_incomplete() {
    let response: &[u8] = b"HTTP/1.1 200 OK\r\nConte";
    let mut reader = HttpResponseReader::new(response);

    match reader.read_status_line() {
        Err(Error::ResponseIncomplete) => (),
        other => panic!("{:?}", other),
    }
}
