use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Why a URL was refused as a channel source.
#[derive(Error, Debug)]
pub enum ChannelUrlError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL before it is stored as a channel.
///
/// Channels are added by operators (CLI or OPML import) and then polled
/// forever by the crawler, so anything that could point the crawler at
/// internal infrastructure is rejected up front:
/// - non-HTTP(S) schemes (e.g. `file://`, `ftp://`)
/// - localhost (`localhost`, `127.0.0.1`, `::1`)
/// - private, link-local and unspecified addresses
///
/// # Examples
///
/// ```
/// use feedcrawl::util::validate_channel_url;
///
/// let url = validate_channel_url(" https://example.com/feed.xml ").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_channel_url("http://localhost/feed").is_err());
/// assert!(validate_channel_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_channel_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_channel_url(url_str: &str) -> Result<Url, ChannelUrlError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(ChannelUrlError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(ChannelUrlError::Localhost);
        }

        let host_for_parse = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(ChannelUrlError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(ChannelUrlError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

/// True when an item link is an absolute http(s) URL with a host.
///
/// Items failing this check are dropped by the crawler before a dedup key
/// is derived.
pub fn is_item_link(link: &str) -> bool {
    match Url::parse(link.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
