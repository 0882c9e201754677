//! CLI surface (§6), parsed with `clap`'s derive API.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

use crate::error::ConfigError;
use crate::translator::Vendor;

/// RFServer co-ordinates RFClient and RFProxy instances, listens for route
/// updates, and configures flow tables.
#[derive(Debug, Parser)]
#[command(name = "rfcoordinatord", about, long_about = None)]
pub struct Cli {
    /// VM-VS-DP mapping configuration file.
    pub configfile: PathBuf,

    /// ISL mapping configuration file.
    #[arg(short = 'i', long = "islconfig")]
    pub islconfig: Option<PathBuf>,

    /// Comma list of datapaths ("dpid/vendor") that support multiple tables.
    #[arg(short = 'm', long = "multitabledps", default_value = "")]
    pub multitabledps: String,

    /// Comma list of datapaths that default-forward to their ISL peer.
    #[arg(short = 's', long = "satellitedps", default_value = "")]
    pub satellitedps: String,

    /// Fastpath link configuration file.
    #[arg(short = 'f', long = "fastpaths")]
    pub fastpaths: Option<PathBuf>,
}

/// Parses the `-m` spec into a vendor override map. A single unparseable
/// entry is logged and skipped rather than aborting startup (§7, §8
/// scenario 8) — the rest of the spec is still honored.
pub fn parse_multitabledps(raw: &str) -> HashMap<u64, Vendor> {
    let mut map = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match parse_one_vendor_entry(entry) {
            Ok((dp_id, vendor)) => {
                map.insert(dp_id, vendor);
            }
            Err(err) => warn!(entry, %err, "skipping unparseable -m entry, falling back to default selection"),
        }
    }
    map
}

fn parse_one_vendor_entry(entry: &str) -> Result<(u64, Vendor), ConfigError> {
    let (dp_id, name) = entry
        .split_once('/')
        .ok_or_else(|| ConfigError::MalformedVendorSpec { raw: entry.to_string() })?;
    let dp_id = u64::from_str_radix(dp_id.trim(), 16)
        .map_err(|_| ConfigError::MalformedVendorSpec { raw: entry.to_string() })?;
    let vendor = Vendor::from_name(name.trim()).ok_or_else(|| ConfigError::UnknownVendor {
        raw: entry.to_string(),
        name: name.trim().to_string(),
    })?;
    Ok((dp_id, vendor))
}

/// Parses the `-s` spec: hex datapath ids to treat as satellites. A
/// malformed entry here is startup-fatal — unlike `-m`, §7/§8 carve out no
/// recoverable path for it.
pub fn parse_satellitedps(raw: &str) -> Result<HashSet<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            u64::from_str_radix(s, 16).map_err(|_| ConfigError::MalformedSatelliteSpec { raw: s.to_string() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multitabledps_parses_valid_entries_and_skips_bad_ones() {
        let map = parse_multitabledps("a/noviflow,bogus,b/corsa-v3");
        assert_eq!(map.get(&0xa), Some(&Vendor::NoviFlow));
        assert_eq!(map.get(&0xb), Some(&Vendor::CorsaV3));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn empty_multitabledps_spec_yields_empty_map() {
        assert!(parse_multitabledps("").is_empty());
    }

    #[test]
    fn satellitedps_rejects_non_hex_entries() {
        assert!(parse_satellitedps("a,b,zz").is_err());
        assert_eq!(parse_satellitedps("a,b").unwrap().len(), 2);
    }
}
