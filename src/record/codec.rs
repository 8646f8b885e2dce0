//! Conversion between [`Record`]s and dnsmasq configuration lines.
//!
//! Each managed file holds the lines for exactly one record:
//!
//! ```text
//! address=/app.example.com/192.168.1.10
//! address=/app.example.com/192.168.1.11
//! ```
//!
//! ```text
//! txt-record=app.example.com,"heritage=external-dns"
//! ```
//!
//! ```text
//! cname=www.example.com,app.example.com
//! ```
//!
//! TXT values are written verbatim between double quotes. A value that itself contains a double
//! quote is not escaped. [`decode`] still reads it back unchanged, because the value runs to the
//! last quote on the line, but dnsmasq may split it differently.

use crate::record::{is_valid_ipv4, Record, RecordKind};

const ADDRESS_PREFIX: &str = "address=/";
const TXT_PREFIX: &str = "txt-record=";
const CNAME_PREFIX: &str = "cname=";

/// Render a record as the contents of its managed file. The output always ends with a newline.
pub fn encode(record: &Record) -> String {
    let name = &record.dns_name;
    let mut out: String = record
        .targets
        .iter()
        .map(|target| match record.record_type {
            RecordKind::A => format!("{ADDRESS_PREFIX}{name}/{target}"),
            RecordKind::Txt => format!("{TXT_PREFIX}{name},\"{target}\""),
            RecordKind::Cname => format!("{CNAME_PREFIX}{name},{target}"),
        })
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// Recover a record of the given kind from the contents of a managed file.
///
/// The name is taken from the first line that matches the kind's format. Lines that don't match,
/// and address lines whose IP doesn't validate, are skipped. Returns `None` when no usable target
/// remains, in which case the file is treated as if it didn't exist.
pub fn decode(kind: RecordKind, contents: &str, ttl: u32) -> Option<Record> {
    let mut name: Option<&str> = None;
    let mut targets = Vec::new();

    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        let Some((line_name, target)) = parse_line(kind, line) else {
            continue;
        };
        name.get_or_insert(line_name);
        if kind == RecordKind::A && !is_valid_ipv4(target) {
            tracing::debug!(line, "skipping address line with invalid IPv4 target");
            continue;
        }
        targets.push(target.to_string());
    }

    match (name, targets.is_empty()) {
        (Some(name), false) => Some(Record::new(name, kind, targets, ttl)),
        _ => None,
    }
}

fn parse_line(kind: RecordKind, line: &str) -> Option<(&str, &str)> {
    match kind {
        RecordKind::A => {
            let (name, ip) = line.strip_prefix(ADDRESS_PREFIX)?.split_once('/')?;
            (!name.is_empty() && !ip.is_empty() && !ip.contains('/')).then_some((name, ip))
        }
        RecordKind::Txt => {
            let (name, rest) = line.strip_prefix(TXT_PREFIX)?.split_once(',')?;
            let quoted = rest.strip_prefix('"')?;
            let value = &quoted[..quoted.rfind('"')?];
            (!name.is_empty()).then_some((name, value))
        }
        RecordKind::Cname => {
            let (name, target) = line.strip_prefix(CNAME_PREFIX)?.split_once(',')?;
            (!name.is_empty() && !target.is_empty()).then_some((name, target))
        }
    }
}
