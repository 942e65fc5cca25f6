//! Parser for the status line carried in the deferred-status trailer
//!
//! The grammar is the CGI `Status:` value: three ASCII digits, an optional
//! space, then a reason phrase running to the end of the line.

use crate::status::Status;

use nom::bytes::complete::{tag, take, take_till};
use nom::combinator::{map, map_res, opt, verify};
use nom::sequence::tuple;
use nom::IResult;

use std::str::{self, FromStr};

pub fn status(input: &[u8]) -> IResult<&[u8], Status> {
    map(
        tuple((code, opt(tag(" ")), map_res(text, str::from_utf8))),
        |(code, _, phrase)| Status {
            code,
            reason: String::from(phrase),
        },
    )(input)
}

fn code(input: &[u8]) -> IResult<&[u8], u16> {
    map_res(
        map_res(
            verify(take(3usize), |digits: &[u8]| {
                digits.iter().all(|b| b.is_ascii_digit())
            }),
            str::from_utf8,
        ),
        u16::from_str,
    )(input)
}

fn text(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_till(cr_or_lf)(input)
}

fn cr_or_lf(x: u8) -> bool {
    x == b'\n' || x == b'\r'
}

#[test]
fn parses_code_and_reason() {
    let (rest, parsed) = status(b"404 Not Found").unwrap();
    assert_eq!(
        parsed,
        Status {
            code: 404,
            reason: String::from("Not Found")
        }
    );
    assert_eq!(rest, b"");
}

#[test]
fn stops_at_line_end() {
    let (rest, parsed) = status(b"200 OK\r\n").unwrap();
    assert_eq!(parsed, Status::ok());
    assert_eq!(rest, b"\r\n");
}

#[test]
fn reason_may_be_empty() {
    let (_, parsed) = status(b"204").unwrap();
    assert_eq!(parsed.code, 204);
    assert_eq!(parsed.reason, "");
}

#[test]
fn rejects_short_code() {
    assert!(status(b"20 OK").is_err());
}

#[test]
fn rejects_non_digits() {
    assert!(status(b"2x4 Huh").is_err());
    assert!(status(b"Not a status").is_err());
}
