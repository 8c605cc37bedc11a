//! Domain list parsing.
//!
//! Accepts plain lists (one domain per line) and hosts-file style lists
//! (`0.0.0.0 ads.example.com`). Address tokens, blank lines and `#`
//! comments are skipped, as are the self entries hosts files carry
//! (`127.0.0.1 localhost`). Entries are returned as written; the matcher
//! validates and normalizes them.

use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use tracing::info;

/// Names a hosts file maps to itself. Blocking them breaks the local host.
const HOSTS_SELF_ENTRIES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
];

fn is_hosts_self_entry(token: &str) -> bool {
    let name = token.strip_suffix('.').unwrap_or(token);
    HOSTS_SELF_ENTRIES.iter().any(|entry| entry.eq_ignore_ascii_case(name))
}

/// Extract domain entries from the text of a list.
pub fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        })
        .flat_map(str::split_whitespace)
        .filter(|token| token.parse::<IpAddr>().is_err() && !is_hosts_self_entry(token))
        .map(str::to_string)
        .collect()
}

/// Read and parse a list from a local file.
pub fn load_file(path: &Path) -> io::Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let domains = parse(&text);
    info!(path = %path.display(), entries = domains.len(), "loaded domain list");

    Ok(domains)
}

/// Read and concatenate several lists. Fails on the first unreadable file.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> io::Result<Vec<String>> {
    let mut domains = Vec::new();
    for path in paths {
        domains.extend(load_file(path.as_ref())?);
    }

    Ok(domains)
}
