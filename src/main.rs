//! Run a command and publish its output as an HTTP response whose real
//! status arrives in a trailer.
//!
//! Call it like this:
//!
//!     trailer-status run --content-type text/plain -- some-command --with args
//!
//! The response goes to stdout: a `208 Trailing Status` placeholder line,
//! the command's output as a chunked body, and finally an
//! `X-Deferred-Status` trailer of `200 OK` or `500 Internal Server Error`
//! depending on how the command exited. The wrapper's own exit code is
//! not part of the HTTP contract; the wrapped command's exit status
//! drives the trailer.
//!
//! Defaults can come from a TOML file passed with `-f`:
//!
//! ```toml
//! [response]
//! content-type = "text/plain"
//!
//! [stream]
//! block-size = 65536
//! ```
//!
//! Logging goes to stderr (stdout belongs to the response) and is
//! controlled by the `TRAILER_LOG` environment variable.

use trailer_status::config::{parser, Config};
use trailer_status::encoder::{self, CgiHeaderMode, EncoderOptions};
use trailer_status::errors::Error;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{error, info};

use std::ffi::OsString;
use std::io::{self, stderr, BufWriter, Write};
use std::path::PathBuf;
use std::process::exit;

fn main() {
    let env = env_logger::Env::new().filter_or("TRAILER_LOG", "info");
    match env_logger::Builder::from_env(env).try_init() {
        Ok(()) => (),
        Err(e) => {
            writeln!(
                stderr(),
                "trailer-status: Error when initializing logging: {}",
                e
            )
            .ok();
            exit(1);
        }
    }

    let matches = Command::new("trailer-status")
        .version("0.1")
        .about("Stream a command as a chunked HTTP response with a trailer-borne status")
        .arg(
            Arg::new("config_file")
                .short('f')
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("TOML file with response defaults"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Run COMMAND and stream it as a deferred-status response")
                .arg(
                    Arg::new("content_type")
                        .long("content-type")
                        .value_name("TYPE")
                        .help("Content-Type header to announce"),
                )
                .arg(
                    Arg::new("cgi_mode")
                        .long("cgi-mode")
                        .action(ArgAction::SetTrue)
                        .help("Reserved: merge CGI headers from the command's output"),
                )
                .arg(
                    Arg::new("command")
                        .value_name("COMMAND")
                        .required(true)
                        .value_parser(value_parser!(OsString)),
                )
                .arg(
                    Arg::new("args")
                        .value_name("ARGS")
                        .num_args(0..)
                        .value_parser(value_parser!(OsString))
                        .allow_hyphen_values(true)
                        .trailing_var_arg(true),
                ),
        )
        .get_matches();

    let config = match matches.get_one::<PathBuf>("config_file") {
        Some(path) => match parser::parse_file(path) {
            Ok(c) => c,
            Err(parser::Error::Io(e)) => {
                error!("Error opening config file {:?}: {}", path, e);
                exit(1);
            }
            Err(parser::Error::Parse(e)) => {
                error!("Error parsing config file {:?}: {}", path, e);
                exit(1);
            }
            Err(parser::Error::Validation(message)) => {
                error!("Error in config file: {}", message);
                exit(1);
            }
        },
        None => Default::default(),
    };

    match matches.subcommand() {
        Some(("run", sub)) => run(sub, config),
        _ => unreachable!("a subcommand is required"),
    }
}

fn run(matches: &ArgMatches, config: Config) -> ! {
    let mut options = EncoderOptions {
        content_type: config.content_type,
        cgi_headers: CgiHeaderMode::Raw,
        block_size: config.block_size,
    };

    if let Some(media) = matches.get_one::<String>("content_type") {
        match media.parse::<mime::Mime>() {
            Ok(media) => options.content_type = Some(media),
            Err(_) => {
                error!("\"{}\" is not a valid media type", media);
                exit(1);
            }
        }
    }

    if matches.get_flag("cgi_mode") {
        options.cgi_headers = CgiHeaderMode::MergeUnimplemented;
    }

    let command = matches
        .get_one::<OsString>("command")
        .expect("COMMAND is required");
    let args: Vec<OsString> = matches
        .get_many::<OsString>("args")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let stdout = io::stdout();
    let mut sink = BufWriter::new(stdout.lock());

    match encoder::run(command, &args, options, &mut sink) {
        Ok(status) => {
            info!("Command finished; trailer status {}", status);
            exit(0);
        }
        Err(Error::Launch(e)) => {
            error!("Could not start the command: {}", e);
            // Nothing has hit the wire yet, so an ordinary error response
            // is still possible.
            if let Err(e) = encoder::launch_failure_response(&mut sink) {
                error!("Could not send the failure response either: {}", e);
            }
            exit(1);
        }
        Err(e) => {
            error!("Streaming failed: {:?}", e);
            exit(1);
        }
    }
}
