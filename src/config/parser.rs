use super::Config;

use mime::Mime;
use toml::Value;

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub fn parse_file<P: AsRef<Path>>(conf: P) -> Result<Config, Error> {
    let mut raw = String::new();
    {
        let mut f = File::open(conf)?;
        f.read_to_string(&mut raw)?;
    }

    let table: Value = raw.parse().map_err(Error::Parse)?;
    config_from_value(table)
}

fn config_from_value(table: Value) -> Result<Config, Error> {
    let mut config: Config = Default::default();

    match table.get("response").and_then(|r| r.get("content-type")) {
        Some(&Value::String(ref media)) => {
            config.content_type = Some(media.parse::<Mime>().map_err(|_| {
                Error::Validation(format!("\"{}\" is not a valid media type", media))
            })?);
        }
        Some(val) => {
            return Err(Error::Validation(format!(
                "Expected the content type to be a string, got a {}",
                val.type_str()
            )))
        }
        None => (),
    }

    match table.get("stream").and_then(|s| s.get("block-size")) {
        Some(&Value::Integer(size)) if size > 0 => config.block_size = size as usize,
        Some(&Value::Integer(size)) => {
            return Err(Error::Validation(format!(
                "The block size {} is out of range",
                size
            )))
        }
        Some(val) => {
            return Err(Error::Validation(format!(
                "Expected the block size to be an integer, got a {}",
                val.type_str()
            )))
        }
        None => (),
    }

    Ok(config)
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Parse(toml::de::Error),
    Validation(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

#[test]
fn parses_both_sections() {
    let config = config_from_value(
        "[response]\ncontent-type = \"text/plain\"\n\n[stream]\nblock-size = 4096\n"
            .parse()
            .unwrap(),
    )
    .unwrap();

    assert_eq!(config.block_size, 4096);
    assert_eq!(config.content_type, Some(mime::TEXT_PLAIN));
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let config = config_from_value("".parse().unwrap()).unwrap();
    assert_eq!(config.block_size, crate::protocol::DEFAULT_BLOCK_SIZE);
    assert!(config.content_type.is_none());
}

#[test]
fn rejects_nonpositive_block_size() {
    match config_from_value("[stream]\nblock-size = 0\n".parse().unwrap()) {
        Err(Error::Validation(_)) => (),
        other => panic!("{:?}", other),
    }
}

#[test]
fn rejects_bogus_content_type() {
    match config_from_value("[response]\ncontent-type = \"not a mime\"\n".parse().unwrap()) {
        Err(Error::Validation(_)) => (),
        other => panic!("{:?}", other),
    }
}

#[test]
fn rejects_wrongly_typed_keys() {
    match config_from_value("[stream]\nblock-size = \"lots\"\n".parse().unwrap()) {
        Err(Error::Validation(_)) => (),
        other => panic!("{:?}", other),
    }
}
