//! CSV loading (C9, §6, §10.4): three typed tables, each parsed the same
//! way — strip the header, truncate comments, skip blanks, hand the rest to
//! `csv::Reader`, then parse each column out of its row struct.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::tables::{RfConfig, RfConfigEntry, RfFpConf, RfFpConfEntry, RfIslConf, RfIslConfEntry};
use rf_types::MacAddress;

fn read_preprocessed(path: &Path) -> Result<String, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let body = raw
        .lines()
        .skip(1) // header
        .map(|line| line.split('#').next().unwrap_or(""))
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(body)
}

fn rows<T: for<'de> Deserialize<'de>>(path: &Path, body: &str) -> Result<Vec<(usize, T)>, ConfigError> {
    let mut reader = ::csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(body.as_bytes());
    let mut out = Vec::new();
    for (i, result) in reader.deserialize::<T>().enumerate() {
        let row: T = result.map_err(|_| ConfigError::MalformedLine {
            file: path.display().to_string(),
            line: i + 2, // header occupied line 1
            expected: "",
        })?;
        out.push((i + 2, row));
    }
    Ok(out)
}

fn parse_hex_u64(s: &str, path: &Path, line: usize, expected: &'static str) -> Result<u64, ConfigError> {
    u64::from_str_radix(s.trim(), 16)
        .map_err(|_| ConfigError::MalformedLine { file: path.display().to_string(), line, expected })
}

fn parse_dec<T: std::str::FromStr>(s: &str, path: &Path, line: usize, expected: &'static str) -> Result<T, ConfigError> {
    s.trim()
        .parse()
        .map_err(|_| ConfigError::MalformedLine { file: path.display().to_string(), line, expected })
}

fn parse_mac(s: &str, path: &Path, line: usize, expected: &'static str) -> Result<MacAddress, ConfigError> {
    s.trim()
        .parse()
        .map_err(|_| ConfigError::MalformedLine { file: path.display().to_string(), line, expected })
}

#[derive(Debug, Deserialize)]
struct ConfigRow(String, String, String, String, String);

const CONFIG_EXPECTED: &str = "vm_id(hex),vm_port(dec),ct_id(dec),dp_id(hex),dp_port(dec)";

/// Loads `config.csv` (§6). Startup-fatal on any malformed row.
pub fn load_config(path: &Path) -> Result<RfConfig, ConfigError> {
    let body = read_preprocessed(path)?;
    let mut entries = Vec::new();
    for (line, ConfigRow(a, b, c, d, e)) in rows::<ConfigRow>(path, &body)? {
        entries.push(RfConfigEntry {
            vm_id: parse_hex_u64(&a, path, line, CONFIG_EXPECTED)?,
            vm_port: parse_dec(&b, path, line, CONFIG_EXPECTED)?,
            ct_id: parse_dec(&c, path, line, CONFIG_EXPECTED)?,
            dp_id: parse_hex_u64(&d, path, line, CONFIG_EXPECTED)?,
            dp_port: parse_dec(&e, path, line, CONFIG_EXPECTED)?,
            fp_label: None,
        });
    }
    Ok(RfConfig::new(entries))
}

#[derive(Debug, Deserialize)]
struct IslConfRow(String, String, String, String, String, String, String, String, String);

const ISLCONF_EXPECTED: &str =
    "vm_id(hex),ct_id(dec),dp_id(hex),dp_port(dec),eth_addr,rem_ct(dec),rem_id(hex),rem_port(dec),rem_eth_addr";

/// Loads `islconf.csv` (§6). A missing or empty file is valid — no ISLs
/// declared — matching the original's "default to no ISL config" fallback.
pub fn load_islconf(path: &Path) -> Result<RfIslConf, ConfigError> {
    if !path.exists() {
        return Ok(RfIslConf::default());
    }
    let body = read_preprocessed(path)?;
    let mut entries = Vec::new();
    for (line, IslConfRow(a, b, c, d, e, f, g, h, i)) in rows::<IslConfRow>(path, &body)? {
        entries.push(RfIslConfEntry {
            vm_id: parse_hex_u64(&a, path, line, ISLCONF_EXPECTED)?,
            ct_id: parse_dec(&b, path, line, ISLCONF_EXPECTED)?,
            dp_id: parse_hex_u64(&c, path, line, ISLCONF_EXPECTED)?,
            dp_port: parse_dec(&d, path, line, ISLCONF_EXPECTED)?,
            eth_addr: parse_mac(&e, path, line, ISLCONF_EXPECTED)?,
            rem_ct: parse_dec(&f, path, line, ISLCONF_EXPECTED)?,
            rem_id: parse_hex_u64(&g, path, line, ISLCONF_EXPECTED)?,
            rem_port: parse_dec(&h, path, line, ISLCONF_EXPECTED)?,
            rem_eth_addr: parse_mac(&i, path, line, ISLCONF_EXPECTED)?,
            fp_master: None,
            fast_paths: Vec::new(),
        });
    }
    Ok(RfIslConf::new(entries))
}

#[derive(Debug, Deserialize)]
struct FpConfRow(String, String, String, String);

const FPCONF_EXPECTED: &str = "ct_id(dec),dp_id(hex),dp_port(dec),dp0_port(dec)";

/// Loads `fastpaths.csv` (§6). A missing path means fastpath is disabled
/// (§9 "fastpath enablement is exactly `!rffpconf.is_empty()`").
pub fn load_fpconf(path: Option<&Path>) -> Result<RfFpConf, ConfigError> {
    let Some(path) = path else { return Ok(RfFpConf::default()) };
    if !path.exists() {
        return Ok(RfFpConf::default());
    }
    let body = read_preprocessed(path)?;
    let mut entries = Vec::new();
    for (line, FpConfRow(a, b, c, d)) in rows::<FpConfRow>(path, &body)? {
        entries.push(RfFpConfEntry {
            ct_id: parse_dec(&a, path, line, FPCONF_EXPECTED)?,
            dp_id: parse_hex_u64(&b, path, line, FPCONF_EXPECTED)?,
            dp_port: parse_dec(&c, path, line, FPCONF_EXPECTED)?,
            dp0_port: parse_dec(&d, path, line, FPCONF_EXPECTED)?,
            fp_master: None,
            fast_paths: Vec::new(),
        });
    }
    Ok(RfFpConf::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile_stub::TempFile {
        tempfile_stub::TempFile::new(contents)
    }

    // A tiny self-contained stand-in for a temp-file crate: the workspace
    // has no `tempfile` dependency, and one file's worth of CSV fixtures
    // doesn't warrant adding one.
    mod tempfile_stub {
        use std::io::Write;
        use std::path::{Path, PathBuf};

        pub struct TempFile(PathBuf);

        impl TempFile {
            pub fn new(contents: &str) -> Self {
                let path = std::env::temp_dir().join(format!(
                    "rfcoordinatord-test-{}-{}.csv",
                    std::process::id(),
                    contents.len()
                ));
                let mut f = std::fs::File::create(&path).unwrap();
                f.write_all(contents.as_bytes()).unwrap();
                TempFile(path)
            }

            pub fn path(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempFile {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }
    }

    #[test]
    fn config_csv_parses_header_comments_and_blanks() {
        let f = write_temp("vm_id,vm_port,ct_id,dp_id,dp_port\na,1,0,ff,2 # comment\n\n");
        let cfg = load_config(f.path()).unwrap();
        let entry = cfg.find_by_vm(0xa, 1).unwrap();
        assert_eq!(entry.dp_id, 0xff);
        assert_eq!(entry.dp_port, 2);
    }

    #[test]
    fn malformed_config_line_names_expected_columns() {
        let f = write_temp("vm_id,vm_port,ct_id,dp_id,dp_port\na,1,0\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { .. }));
    }

    #[test]
    fn missing_islconf_defaults_to_empty() {
        let islconf = load_islconf(Path::new("/nonexistent/islconf.csv")).unwrap();
        assert!(islconf.is_empty());
    }

    #[test]
    fn absent_fastpath_path_disables_fastpath() {
        let fpconf = load_fpconf(None).unwrap();
        assert!(fpconf.is_empty());
    }

    #[test]
    fn islconf_row_round_trips_hex_and_mac_fields() {
        let f = write_temp(
            "vm_id,ct_id,dp_id,dp_port,eth_addr,rem_ct,rem_id,rem_port,rem_eth_addr\n\
             1,0,a,1,00:00:00:00:00:01,0,b,2,00:00:00:00:00:02\n",
        );
        let islconf = load_islconf(f.path()).unwrap();
        let entry = islconf.iter().next().unwrap();
        assert_eq!(entry.dp_id, 0xa);
        assert_eq!(entry.rem_id, 0xb);
        assert_eq!(entry.eth_addr, MacAddress::new([0, 0, 0, 0, 0, 1]));
    }
}
