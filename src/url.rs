//! Stream and playlist URLs on top of the `url` crate

use ::url::{Host, Url};

use crate::error::{RadioError, Result};

/// A stream URL split into the parts the transport needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamUrl {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl StreamUrl {
    /// Splits `scheme://host[:port][/path]`.
    ///
    /// A missing scheme is treated as `http://`. Ports default to 80/443 and
    /// the path to `/`.
    pub fn resolve(url: &str) -> Result<Self> {
        let parsed = parse(url)?;
        let invalid = || RadioError::InvalidUrl(url.trim().to_string());

        let tls = match parsed.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(invalid()),
        };
        let host = match parsed.host() {
            Some(Host::Domain(name)) if !name.is_empty() => name.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(invalid()),
        };
        let port = parsed.port_or_known_default().ok_or_else(invalid)?;

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self { tls, host, port, path })
    }

    /// Value for the `Host` request header
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let default_port = if self.tls { 443 } else { 80 };
        if self.port == default_port {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

// Scheme-less input is taken as http. An empty authority is rejected here
// because the parser would otherwise read `http:///x` as host `x`.
fn parse(url: &str) -> Result<Url> {
    let url = url.trim();
    let invalid = || RadioError::InvalidUrl(url.to_string());

    let with_scheme = match url.find("://") {
        Some(at) => {
            let authority = &url[at + 3..];
            if authority.is_empty() || authority.starts_with(&['/', '?', '#'][..]) {
                return Err(invalid());
            }
            url.to_string()
        }
        None => format!("http://{url}"),
    };
    Url::parse(&with_scheme).map_err(|_| invalid())
}

/// `.m3u8` suffix, or `.m3u8` anywhere (query-string playlists)
pub fn is_hls(url: &str) -> bool {
    url.to_ascii_lowercase().contains(".m3u8")
}

/// Resolves a reference (absolute, scheme-relative, root-relative, relative
/// or query-only) against the URL of the document it came from.
pub fn join(base: &str, reference: &str) -> Result<String> {
    let reference = reference.trim();
    let joined = match parse(base) {
        Ok(base) => base.join(reference),
        Err(_) => Url::parse(reference),
    };
    joined
        .map(String::from)
        .map_err(|_| RadioError::InvalidUrl(reference.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(url: &str) -> (bool, String, u16, String) {
        let u = StreamUrl::resolve(url).unwrap();
        (u.tls, u.host, u.port, u.path)
    }

    #[test]
    fn resolve_all_combinations() {
        for (scheme, tls, default_port) in [("http", false, 80), ("https", true, 443)] {
            for port in [None, Some(8000u16)] {
                for path in [None, Some("/live/stream.mp3")] {
                    let mut url = format!("{scheme}://radio.example.org");
                    if let Some(p) = port {
                        url.push_str(&format!(":{p}"));
                    }
                    if let Some(p) = path {
                        url.push_str(p);
                    }
                    let (t, host, p, pth) = parts(&url);
                    assert_eq!(t, tls, "{url}");
                    assert_eq!(host, "radio.example.org", "{url}");
                    assert_eq!(p, port.unwrap_or(default_port), "{url}");
                    assert_eq!(pth, path.unwrap_or("/"), "{url}");
                }
            }
        }
    }

    #[test]
    fn scheme_is_case_insensitive_and_optional() {
        assert!(parts("HTTPS://a.b/x").0);
        assert_eq!(parts("a.b:81/x"), (false, "a.b".into(), 81, "/x".into()));
    }

    #[test]
    fn query_without_path() {
        assert_eq!(parts("http://a.b?sid=1").3, "/?sid=1");
    }

    #[test]
    fn empty_host_is_invalid() {
        assert!(matches!(
            StreamUrl::resolve("http:///stream"),
            Err(RadioError::InvalidUrl(_))
        ));
        assert!(StreamUrl::resolve("http://:8000/").is_err());
        assert!(StreamUrl::resolve("http://host:notaport/").is_err());
        assert!(StreamUrl::resolve("ftp://host/file").is_err());
    }

    #[test]
    fn ipv6_host() {
        let u = StreamUrl::resolve("http://[::1]:8000/live").unwrap();
        assert_eq!(u.host, "::1");
        assert_eq!(u.host_header(), "[::1]:8000");
    }

    #[test]
    fn host_header_omits_default_port() {
        assert_eq!(StreamUrl::resolve("http://a.b/").unwrap().host_header(), "a.b");
        assert_eq!(
            StreamUrl::resolve("https://a.b:8443/").unwrap().host_header(),
            "a.b:8443"
        );
    }

    #[test]
    fn hls_detection() {
        assert!(is_hls("http://a.b/live.m3u8"));
        assert!(is_hls("http://a.b/live.M3U8?token=1"));
        assert!(!is_hls("http://a.b/live.mp3"));
    }

    #[test]
    fn join_references() {
        let base = "https://cdn.example.com/radio/hls/live.m3u8";
        let cases = [
            ("seg1.ts", "https://cdn.example.com/radio/hls/seg1.ts"),
            ("/abs/seg1.ts", "https://cdn.example.com/abs/seg1.ts"),
            ("http://other/seg.aac", "http://other/seg.aac"),
            ("//edge2.example.com/seg1.ts", "https://edge2.example.com/seg1.ts"),
            ("../aac/seg1.ts", "https://cdn.example.com/radio/aac/seg1.ts"),
            ("?t=2", "https://cdn.example.com/radio/hls/live.m3u8?t=2"),
        ];
        for (reference, expected) in cases {
            assert_eq!(join(base, reference).unwrap(), expected, "{reference}");
        }
    }

    #[test]
    fn join_against_query_playlist_and_schemeless_base() {
        assert_eq!(
            join("http://a.b/hls/master.m3u8?t=/x", "low/index.m3u8").unwrap(),
            "http://a.b/hls/low/index.m3u8"
        );
        assert_eq!(join("a.b/stream", "/moved").unwrap(), "http://a.b/moved");
    }
}
