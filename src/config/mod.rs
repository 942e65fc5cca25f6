pub mod parser;

use crate::protocol;

use mime::Mime;

/// A holder for app configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Content-Type announced in the preamble, if any
    pub content_type: Option<Mime>,
    /// Bytes read from the child per chunk, at most
    pub block_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            content_type: None,
            block_size: protocol::DEFAULT_BLOCK_SIZE,
        }
    }
}
