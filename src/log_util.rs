//! Smol utilities for logging

use std::ascii;

/// Make an Ascii-safe string
pub fn ascii_escape(s: &[u8]) -> String {
    s.iter()
        .flat_map(|&b| ascii::escape_default(b))
        .map(char::from)
        .collect()
}

#[test]
fn escapes_control_bytes() {
    assert_eq!(ascii_escape(b"ok\r\n"), "ok\\r\\n");
}

#[test]
fn passes_printable_bytes_through() {
    assert_eq!(ascii_escape(b"200 OK"), "200 OK");
}
