// ABOUTME: Guarded HTTP GET for page and stylesheet loads.
// ABOUTME: Blocks private-network targets, caps body size and decodes bodies to UTF-8 text.

use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};

use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use url::Url;

use crate::error::FetchError;

/// Largest body a navigation will accept (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

const OP: &str = "Navigate";

static PRIVATE_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "127.0.0.0/8", "169.254.0.0/16"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

static PRIVATE_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    ["fc00::/7", "fe80::/10"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
}

/// A fetched body with the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub final_url: Url,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Fetched {
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Loopback, link-local and private ranges.
pub(crate) fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => PRIVATE_V4.iter().any(|net| net.contains(ip)),
        IpAddr::V6(ip) => ip.is_loopback() || PRIVATE_V6.iter().any(|net| net.contains(ip)),
    }
}

/// Builds the redirect policy that refuses hops into private networks.
pub(crate) fn redirect_policy(allow_private: bool) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if allow_private {
            return attempt.follow();
        }
        let next = attempt.url();
        let Some(host) = next.host_str() else {
            return attempt.follow();
        };
        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return attempt.error("redirect to private IP blocked");
            }
            return attempt.follow();
        }
        // The policy is synchronous, so resolve with the blocking resolver.
        let port = next.port_or_known_default().unwrap_or(80);
        match (host, port).to_socket_addrs() {
            Ok(mut addrs) => {
                if addrs.any(|sa| is_private_ip(&sa.ip())) {
                    attempt.error("redirect to private IP blocked")
                } else {
                    attempt.follow()
                }
            }
            Err(_) => attempt.error("DNS lookup failed during redirect"),
        }
    })
}

/// Fails with an SSRF error when `url` points into a private network.
async fn check_public(url: &Url, origin: &str) -> Result<(), FetchError> {
    let Some(host) = url.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(FetchError::ssrf(
                origin,
                OP,
                Some(anyhow::anyhow!("private IP addresses are not allowed")),
            ));
        }
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        FetchError::fetch(origin, OP, Some(anyhow::anyhow!("DNS lookup failed: {}", e)))
    })?;
    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(FetchError::ssrf(
                origin,
                OP,
                Some(anyhow::anyhow!("{} resolves to a private address", host)),
            ));
        }
    }
    Ok(())
}

/// GETs `url`. Only 2xx responses are returned.
pub async fn fetch(
    client: &reqwest::Client,
    url: &Url,
    opts: &FetchOptions,
) -> Result<Fetched, FetchError> {
    let origin = url.as_str();
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(FetchError::invalid_url(
            origin,
            OP,
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    if !opts.allow_private_networks {
        check_public(url, origin).await?;
    }

    let mut request = client.get(url.clone());
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| request_error(origin, e))?;

    if !opts.allow_private_networks && response.url() != url {
        check_public(response.url(), origin).await?;
    }

    if let Some(len) = response.content_length() {
        if len as usize > MAX_CONTENT_LENGTH {
            return Err(FetchError::fetch(
                origin,
                OP,
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    let status = response.status().as_u16();
    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_lowercase);

    let body = response.bytes().await.map_err(|e| request_error(origin, e))?;
    if body.len() > MAX_CONTENT_LENGTH {
        return Err(FetchError::fetch(
            origin,
            OP,
            Some(anyhow::anyhow!("content too large")),
        ));
    }

    if !(200..300).contains(&status) {
        return Err(FetchError::fetch(
            origin,
            OP,
            Some(anyhow::anyhow!("HTTP status {}", status)),
        ));
    }

    Ok(Fetched {
        status,
        final_url,
        content_type,
        body,
    })
}

fn request_error(origin: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::timeout(origin, OP, Some(err.into()))
    } else {
        FetchError::fetch(origin, OP, Some(anyhow::anyhow!("request failed: {}", err)))
    }
}

/// Decodes a body using the declared charset, or a detected one when absent.
pub(crate) fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(extract_charset)
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()));

    let encoding = declared.unwrap_or_else(|| {
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(body, true);
        detector.guess(None, true)
    });
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type.to_lowercase().split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|c| c.trim_matches(|q| q == '"' || q == '\'').to_string())
    })
}
