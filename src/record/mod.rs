//! DNS records as exchanged with external-dns and persisted for dnsmasq.
//!
//! A [`Record`] is the unit of synchronization: one name, one [`RecordKind`], and one or more
//! targets. On the wire it uses the external-dns endpoint shape:
//!
//! ```json
//! { "dnsName": "app.example.com", "targets": ["192.168.1.10"], "recordType": "A", "recordTTL": 300 }
//! ```
//!
//! The TTL is never persisted. Records read back from the managed directory carry the
//! configured [`Config::dns_ttl`][`crate::config::Config::dns_ttl`].

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

pub mod codec;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// The record types the webhook can manage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    /// IPv4 address record, written as `address=/<name>/<ip>` lines.
    A,
    /// Text record, written as `txt-record=<name>,"<value>"` lines.
    Txt,
    /// Alias record, written as a single `cname=<name>,<target>` line.
    Cname,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::A => f.write_str("A"),
            RecordKind::Txt => f.write_str("TXT"),
            RecordKind::Cname => f.write_str("CNAME"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub dns_name: String,
    pub targets: Vec<String>,
    pub record_type: RecordKind,
    #[serde(rename = "recordTTL", default)]
    pub record_ttl: u32,
}

impl Record {
    pub fn new(
        dns_name: impl Into<String>,
        record_type: RecordKind,
        targets: Vec<String>,
        record_ttl: u32,
    ) -> Self {
        Self {
            dns_name: dns_name.into(),
            targets,
            record_type,
            record_ttl,
        }
    }

    /// Check the record's name, its targets, and the per-kind target rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        validate_name(&self.dns_name)?;

        if self.targets.is_empty() {
            return Err(Error::validation(&self.dns_name, "no targets"));
        }

        match self.record_type {
            RecordKind::A => {
                if let Some(bad) = self.targets.iter().find(|t| !is_valid_ipv4(t)) {
                    return Err(Error::validation(
                        &self.dns_name,
                        format!("\"{bad}\" is not an IPv4 address"),
                    ));
                }
            }
            RecordKind::Txt => {
                if self.targets.iter().any(String::is_empty) {
                    return Err(Error::validation(&self.dns_name, "empty TXT value"));
                }
                if self.targets.iter().any(|t| t.contains(['\n', '\r'])) {
                    return Err(Error::validation(
                        &self.dns_name,
                        "TXT value contains a line break",
                    ));
                }
            }
            RecordKind::Cname => {
                if self.targets.len() != 1 {
                    return Err(Error::validation(
                        &self.dns_name,
                        format!("CNAME needs exactly one target, found {}", self.targets.len()),
                    ));
                }
                if !is_valid_dns_name(&self.targets[0]) {
                    return Err(Error::validation(
                        &self.dns_name,
                        format!("\"{}\" is not a valid CNAME target", self.targets[0]),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Check a record name on its own, as needed for deletes where targets don't matter.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the name is empty, contains a path traversal sequence, or
/// isn't a syntactically valid DNS name.
pub fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::validation(name, "empty name"));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(Error::validation(name, "name contains a path traversal sequence"));
    }
    if !is_valid_dns_name(name) {
        return Err(Error::validation(name, "not a valid DNS name"));
    }
    Ok(())
}

/// Returns true for names made of letter-digit-hyphen labels, optionally prefixed by a `*.`
/// wildcard and optionally ending with the root dot.
pub fn is_valid_dns_name(name: &str) -> bool {
    let name = name.strip_prefix("*.").unwrap_or(name);
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    name.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= MAX_LABEL_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

/// Returns true for dotted-quad IPv4 addresses written in canonical form: four decimal octets
/// without leading zeros.
pub fn is_valid_ipv4(ip: &str) -> bool {
    let canonical_octets = ip
        .split('.')
        .all(|octet| octet.len() == 1 || !octet.starts_with('0'));
    canonical_octets && ip.parse::<Ipv4Addr>().is_ok()
}
