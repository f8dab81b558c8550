//! Reader for flow files.
//!
//! The format is a `count=<N>` header followed by `N` flow lines:
//!
//! ```text
//! count=2
//! 1 10.0.0.1 10.0.0.2 1500 12 10 0.25
//! 2 10.0.0.3 10.0.0.4 900 4 3 0.10
//! ```
//!
//! Each flow line holds `<flowID> <srcIP> <dstIP> <totalBytes> <flowDuration> <packetCount>
//! <avgInterarrivalTime>`. The average packet length is derived as `totalBytes / packetCount`.

use crate::error::InputFormatError;
use crate::flow::{FlowId, FlowRecord};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

const COUNT_PREFIX: &str = "count=";
const FIELDS_PER_FLOW: usize = 7;
/// Upper bound on memory reserved up front from the untrusted count header.
const INITIAL_CAPACITY_LIMIT: usize = 1 << 16;

/// Reads all flows from a file.
pub fn read_flows_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<FlowRecord>, InputFormatError> {
    let file = File::open(path)?;
    read_flows(BufReader::new(file))
}

/// Reads the count header and exactly that many flows.
///
/// Blank lines are skipped. Lines after the last declared flow are ignored.
///
/// # Errors
///
/// Any malformed header or flow line, or fewer flows than declared, is an
/// [`InputFormatError`] naming the offending line.
pub fn read_flows<R: BufRead>(reader: R) -> Result<Vec<FlowRecord>, InputFormatError> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(index, line)| line.map(|line| (index + 1, line)))
        .filter(|line| !matches!(line, Ok((_, text)) if text.trim().is_empty()));

    let expected = match lines.next() {
        Some(line) => parse_count_line(&line?.1)?,
        None => return Err(InputFormatError::MissingCountLine),
    };

    let mut flows = Vec::with_capacity(expected.min(INITIAL_CAPACITY_LIMIT));
    while flows.len() < expected {
        let Some(line) = lines.next() else {
            return Err(InputFormatError::FlowCountMismatch {
                expected,
                actual: flows.len(),
            });
        };
        let (line_number, text) = line?;
        flows.push(parse_flow_line(line_number, &text)?);
    }

    let trailing = lines.count();
    if trailing > 0 {
        log::warn!("Ignoring {trailing} lines after the {expected} declared flows");
    }
    log::info!("Read {} flows", flows.len());
    Ok(flows)
}

fn parse_count_line(line: &str) -> Result<usize, InputFormatError> {
    line.trim()
        .strip_prefix(COUNT_PREFIX)
        .and_then(|count| count.trim().parse().ok())
        .ok_or_else(|| InputFormatError::MalformedCountLine {
            line: line.to_string(),
        })
}

/// Parses one flow line, validating both endpoint addresses.
pub fn parse_flow_line(line_number: usize, line: &str) -> Result<FlowRecord, InputFormatError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FIELDS_PER_FLOW {
        return Err(InputFormatError::MalformedFlowLine {
            line_number,
            reason: format!("expected {FIELDS_PER_FLOW} fields, found {}", fields.len()),
        });
    }

    let id = parse_flow_id(line_number, fields[0])?;

    for address in &fields[1..3] {
        if !is_valid_ipv4(address) {
            return Err(InputFormatError::InvalidIpAddress {
                line_number,
                address: address.to_string(),
            });
        }
    }

    let total_bytes: u64 = parse_field(line_number, "total bytes", fields[3])?;
    let duration: u64 = parse_field(line_number, "flow duration", fields[4])?;
    let packet_count: u64 = parse_field(line_number, "packet count", fields[5])?;
    let avg_inter_time: f64 = parse_field(line_number, "average inter-arrival time", fields[6])?;
    if !avg_inter_time.is_finite() {
        return Err(InputFormatError::MalformedFlowLine {
            line_number,
            reason: format!("average inter-arrival time {avg_inter_time} is not finite"),
        });
    }

    FlowRecord::from_counters(id, total_bytes, duration, packet_count, avg_inter_time).ok_or(
        InputFormatError::ZeroPacketCount {
            line_number,
            flow_id: id,
        },
    )
}

/// Flow ids span the whole `u64` range; a leading `-` is reported as a negative id.
fn parse_flow_id(line_number: usize, value: &str) -> Result<FlowId, InputFormatError> {
    if !value.starts_with('-') {
        return parse_field(line_number, "flow id", value);
    }
    let id: i64 = parse_field(line_number, "flow id", value)?;
    if id < 0 {
        return Err(InputFormatError::NegativeFlowId { line_number, id });
    }
    Ok(id.unsigned_abs())
}

fn parse_field<T: FromStr>(
    line_number: usize,
    name: &str,
    value: &str,
) -> Result<T, InputFormatError> {
    value
        .parse()
        .map_err(|_| InputFormatError::MalformedFlowLine {
            line_number,
            reason: format!("{name} {value:?} is not a valid number"),
        })
}

/// Four dot-separated decimal octets, each in `0..=255`.
fn is_valid_ipv4(address: &str) -> bool {
    let octets: Vec<&str> = address.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|octet| {
            !octet.is_empty()
                && octet.bytes().all(|byte| byte.is_ascii_digit())
                && octet.parse::<u8>().is_ok()
        })
}
