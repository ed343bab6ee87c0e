// Node list parsing: one CSV line per node, `name,_,ip,_,_,port`.

use std::path::Path;

/// Path appended to a node's base URL to fetch its snapshot.
pub const TELEMETRY_PATH: &str = "/telematics/snapshot";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoint {
    pub name: String,
    /// `http://ip:port`
    pub base_url: String,
}

impl NodeEndpoint {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }

    pub fn telemetry_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), TELEMETRY_PATH)
    }
}

pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Vec<NodeEndpoint>> {
    let s = std::fs::read_to_string(path)?;
    parse(&s)
}

/// Blank lines and `#` comments are skipped. Duplicate names are rejected.
pub fn parse(s: &str) -> anyhow::Result<Vec<NodeEndpoint>> {
    let mut nodes: Vec<NodeEndpoint> = Vec::new();
    for (idx, line) in s.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        anyhow::ensure!(
            cols.len() >= 6,
            "node list line {}: expected at least 6 comma-separated fields, got {}",
            idx + 1,
            cols.len()
        );
        let (name, ip, port) = (cols[0], cols[2], cols[5]);
        anyhow::ensure!(!name.is_empty(), "node list line {}: empty node name", idx + 1);
        let port: u16 = port
            .parse()
            .map_err(|e| anyhow::anyhow!("node list line {}: bad port {:?}: {}", idx + 1, port, e))?;
        anyhow::ensure!(
            !nodes.iter().any(|n| n.name == name),
            "node list line {}: duplicate node {}",
            idx + 1,
            name
        );
        nodes.push(NodeEndpoint::new(name, format!("http://{}:{}", ip, port)));
    }
    anyhow::ensure!(!nodes.is_empty(), "node list is empty");
    Ok(nodes)
}
