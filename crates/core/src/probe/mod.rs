//! Media inspection through ffprobe.

mod parse;
mod prober;
mod types;

pub use parse::{parse_integer_response, parse_probe_output};
pub use prober::{duration_args, packet_count_args, probe_args, Prober};
pub use types::{AudioStream, FileInformation, StreamInformation, StreamKind, VideoStream};
