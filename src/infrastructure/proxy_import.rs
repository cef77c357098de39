use crate::domain::entities::proxy::{ProxyEndpoint, ProxyKind};
use crate::domain::errors::ProxyImportError;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, warn};

/// Result of parsing one proxy list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: Vec<ProxyEndpoint>,
    pub skipped: usize,
}

/// Parse a proxy list, one proxy per row.
///
/// Row format is `address<sep>port[<sep>kind]` where the separator is any
/// run of whitespace, `;`, `:` or `,`. The kind defaults to `http` when
/// omitted. Blank rows and rows starting with `#` or `//` are ignored.
/// Malformed rows are logged with their line number and counted, never
/// fatal.
pub fn parse_proxy_list(text: &str) -> ImportOutcome {
    let mut imported = Vec::new();
    let mut skipped = 0usize;

    for (index, raw) in text.lines().enumerate() {
        let row = raw.trim();
        if row.is_empty() || row.starts_with('#') || row.starts_with("//") {
            continue;
        }
        match parse_row(row) {
            Ok(endpoint) => imported.push(endpoint),
            Err(e) => {
                skipped += 1;
                warn!(line = index + 1, error = %e, "Skipping malformed proxy row");
            }
        }
    }

    debug!(imported = imported.len(), skipped, "Proxy list parsed");
    ImportOutcome { imported, skipped }
}

/// Parse one row. Addresses must be IP literals; the separator set makes
/// hostnames and IPv6 literals unrepresentable in this format.
pub fn parse_row(row: &str) -> Result<ProxyEndpoint, ProxyImportError> {
    let fields: Vec<&str> = row
        .split(|c: char| c.is_whitespace() || matches!(c, ';' | ':' | ','))
        .filter(|field| !field.is_empty())
        .collect();

    let (addr_raw, port_raw, kind_raw) = match fields.as_slice() {
        [addr, port] => (*addr, *port, None),
        [addr, port, kind] => (*addr, *port, Some(*kind)),
        other => {
            return Err(ProxyImportError::WrongFieldCount {
                fields: other.len(),
            })
        }
    };

    let ip: IpAddr = addr_raw
        .parse()
        .map_err(|_| ProxyImportError::BadAddress(addr_raw.to_string()))?;
    let port: u16 = port_raw
        .parse()
        .map_err(|_| ProxyImportError::BadPort(port_raw.to_string()))?;
    if port == 0 {
        return Err(ProxyImportError::BadPort(port_raw.to_string()));
    }
    let kind = match kind_raw {
        Some(raw) => {
            ProxyKind::parse(raw).ok_or_else(|| ProxyImportError::BadKind(raw.to_string()))?
        }
        None => ProxyKind::Http,
    };

    Ok(ProxyEndpoint::new(kind, SocketAddr::new(ip, port)))
}
