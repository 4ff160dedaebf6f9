//! TCP reachability probe.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;
use url::{Host, Url};

/// Why a backend did not answer a probe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("backend url {0} has no host")]
    MissingHost(Url),

    #[error("backend url {0} has no known port")]
    MissingPort(Url),

    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}

/// Host and port to dial for a backend URL.
pub fn probe_target(endpoint: &Url) -> Result<(String, u16), ProbeError> {
    let host = match endpoint.host() {
        Some(Host::Domain(d)) => d.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(ProbeError::MissingHost(endpoint.clone())),
    };
    let port = endpoint
        .port_or_known_default()
        .ok_or_else(|| ProbeError::MissingPort(endpoint.clone()))?;
    Ok((host, port))
}

/// Open and immediately drop a TCP connection to the backend.
pub async fn probe_tcp(endpoint: &Url, timeout: Duration) -> Result<(), ProbeError> {
    let (host, port) = probe_target(endpoint)?;
    match time::timeout(timeout, TcpStream::connect((host.as_str(), port))).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(ProbeError::Connect(e)),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}
