//! Resolved HTTP status lines
//!
//! The trailer carries an ordinary status line; both the exit-outcome
//! mapping and the consumer-side parse produce this type.

pub mod parser;

use std::fmt;

/// A status line
///
/// Immutable once constructed; the reader's state machine guarantees a
/// resolved status is never replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub reason: String,
}

impl Status {
    /// The status for a child that exited cleanly
    pub fn ok() -> Status {
        Status {
            code: 200,
            reason: String::from("OK"),
        }
    }

    /// The status for every other termination
    pub fn internal_error() -> Status {
        Status {
            code: 500,
            reason: String::from("Internal Server Error"),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

#[test]
fn displays_as_a_status_line() {
    assert_eq!(Status::ok().to_string(), "200 OK");
    assert_eq!(
        Status::internal_error().to_string(),
        "500 Internal Server Error"
    );
}
