//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PublicIpError {
    #[error("failed to construct http client")]
    Client(#[source] reqwest::Error),
    #[error("no public IP service returned a usable address ({attempted} attempted)")]
    AllServicesFailed { attempted: usize },
}

/// Discover the host's public IPv4 address by querying echo-IP services in
/// order and accepting the first response that parses as IPv4.
pub async fn discover(
    service_urls: &[String],
    timeout: Duration,
) -> Result<Ipv4Addr, PublicIpError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(PublicIpError::Client)?;

    for url in service_urls {
        let body = match client.get(url).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    warn!(service_url = %url, error = %err, "failed to read public IP response body");
                    continue;
                }
            },
            Err(err) => {
                warn!(service_url = %url, error = %err, "public IP service unreachable");
                continue;
            }
        };

        match sanitize_ip(&body) {
            Some(ip) => {
                debug!(service_url = %url, ip = %ip, "public IP discovered");
                return Ok(ip);
            }
            None => {
                warn!(service_url = %url, "public IP service returned no valid IPv4 address");
            }
        }
    }

    Err(PublicIpError::AllServicesFailed {
        attempted: service_urls.len(),
    })
}

/// First line of the body, trimmed and dequoted, parsed as IPv4.
fn sanitize_ip(body: &str) -> Option<Ipv4Addr> {
    let candidate = body
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .trim_matches('\'');
    candidate.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_address() {
        assert_eq!(sanitize_ip("203.0.113.9"), Some(Ipv4Addr::new(203, 0, 113, 9)));
    }

    #[test]
    fn takes_first_line_and_strips_noise() {
        assert_eq!(
            sanitize_ip("  \"203.0.113.9\"  \nsecond line"),
            Some(Ipv4Addr::new(203, 0, 113, 9))
        );
        assert_eq!(
            sanitize_ip("'198.51.100.1'\n"),
            Some(Ipv4Addr::new(198, 51, 100, 1))
        );
    }

    #[test]
    fn rejects_non_ipv4_bodies() {
        assert_eq!(sanitize_ip(""), None);
        assert_eq!(sanitize_ip("not an ip"), None);
        assert_eq!(sanitize_ip("2001:db8::1"), None);
    }

    #[tokio::test]
    async fn empty_service_list_fails() {
        let err = discover(&[], Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(
            err,
            PublicIpError::AllServicesFailed { attempted: 0 }
        ));
    }
}
