mod common;

use common::{fast_config, serve, Reply};
use netradio::{http, RadioError};

/// `/hop/N` redirects to `/hop/N+1` until `hops`, then answers
fn chain(hops: usize) -> u16 {
    serve(move |req| {
        let n: usize = req
            .path
            .strip_prefix("/hop/")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        if n < hops {
            // alternate relative and root-relative locations
            if n % 2 == 0 {
                Reply::redirect(&format!("/hop/{}", n + 1))
            } else {
                Reply::redirect(&format!("{}", n + 1))
            }
        } else {
            Reply::ok("text/plain", "arrived")
        }
    })
}

#[test]
fn five_redirects_are_followed() {
    let port = chain(5);
    let fetched = http::fetch(&format!("http://127.0.0.1:{port}/hop/0"), &fast_config(), 1024).unwrap();
    assert_eq!(fetched.body, b"arrived");
    assert!(fetched.url.ends_with("/hop/5"));
    assert_eq!(fetched.content_type.as_deref(), Some("text/plain"));
}

#[test]
fn sixth_redirect_fails() {
    let port = chain(6);
    let err = http::fetch(&format!("http://127.0.0.1:{port}/hop/0"), &fast_config(), 1024).unwrap_err();
    assert!(matches!(err, RadioError::TooManyRedirects));
}

#[test]
fn body_is_capped() {
    let port = serve(|_| Reply::ok("application/octet-stream", vec![7u8; 10_000]));
    let fetched = http::fetch(&format!("http://127.0.0.1:{port}/"), &fast_config(), 4096).unwrap();
    assert_eq!(fetched.body.len(), 4096);
}
