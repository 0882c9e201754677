//! Configuration loading (C9, §6, §10.4): CLI parsing plus the three CSV
//! tables, assembled into the static configuration the coordinator loop
//! runs against for its entire lifetime.

mod cli;
mod csv;

pub use cli::{parse_multitabledps, parse_satellitedps, Cli};
pub use csv::{load_config, load_fpconf, load_islconf};

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::fastpath::FastpathAllocator;
use crate::tables::{RfConfig, RfFpConf, RfIslConf};
use crate::translator::Vendor;

/// Everything loaded once at startup and held read-only by the dispatch
/// loop thereafter (§5 "the entity tables are accessed only from the
/// coordinator dispatch thread").
pub struct StaticConfig {
    pub config: RfConfig,
    pub islconf: RfIslConf,
    pub fpconf: RfFpConf,
    pub multitabledps: HashMap<u64, Vendor>,
    pub satellitedps: HashSet<u64>,
    pub fastpath_enabled: bool,
}

/// Runs the full startup sequence (§6, §9): load the three CSVs, parse the
/// vendor overrides, and — if any fastpath link was declared — run the
/// allocator once over the whole topology before the coordinator accepts
/// its first message. Both the CSV errors and a label-exhaustion failure
/// from the allocator are startup-fatal (§7, §10.2), so this returns a
/// plain `anyhow::Result` for `main` to report and exit on.
pub fn load(cli: &Cli) -> anyhow::Result<StaticConfig> {
    let mut config = load_config(&cli.configfile)?;
    let islconf_path = cli.islconfig.clone().unwrap_or_else(|| cli.configfile.with_file_name("islconf.csv"));
    let mut islconf = load_islconf(&islconf_path)?;
    let mut fpconf = load_fpconf(cli.fastpaths.as_deref())?;
    let multitabledps = parse_multitabledps(&cli.multitabledps);
    let satellitedps = parse_satellitedps(&cli.satellitedps)?;

    let fastpath_enabled = !fpconf.is_empty();
    if fastpath_enabled {
        info!(links = fpconf.iter().count(), "fastpath enabled, computing labels");
        let mut allocator = FastpathAllocator::new();
        allocator.compute(&mut fpconf, &mut islconf, &mut config)?;
    }

    Ok(StaticConfig { config, islconf, fpconf, multitabledps, satellitedps, fastpath_enabled })
}
