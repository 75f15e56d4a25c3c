//! Base image acquisition tests against a throwaway local HTTP server.

mod helpers;

use helpers::{assert_absent, assert_file_exists};
use ove_builder::download::ensure_base_image;
use ove_builder::workspace::partial_path;
use ove_builder::PipelineError;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use tempfile::TempDir;

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

/// Serve exactly one HTTP response and return the URL to request.
fn serve_once(status: &'static str, body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body);
        }
    });

    format!("http://{}/rhcos.iso", addr)
}

#[test]
fn test_downloads_missing_image() {
    let temp = TempDir::new().unwrap();
    let iso = temp.path().join("rhcos.iso");
    let url = serve_once("200 OK", b"hello");

    ensure_base_image(&iso, Some(&url), None).unwrap();

    assert_file_exists(&iso);
    assert_eq!(fs::read(&iso).unwrap(), b"hello");
    assert_absent(&partial_path(&iso));
}

#[test]
fn test_download_verifies_checksum() {
    let temp = TempDir::new().unwrap();
    let iso = temp.path().join("rhcos.iso");
    let url = serve_once("200 OK", b"hello");

    ensure_base_image(&iso, Some(&url), Some(HELLO_SHA256)).unwrap();

    assert_file_exists(&iso);
}

#[test]
fn test_checksum_mismatch_leaves_nothing() {
    let temp = TempDir::new().unwrap();
    let iso = temp.path().join("rhcos.iso");
    let url = serve_once("200 OK", b"tampered");

    let err = ensure_base_image(&iso, Some(&url), Some(HELLO_SHA256)).unwrap_err();

    assert!(matches!(err, PipelineError::FetchFailed { .. }));
    assert_absent(&iso);
    assert_absent(&partial_path(&iso));
}

#[test]
fn test_http_error_is_fetch_failure() {
    let temp = TempDir::new().unwrap();
    let iso = temp.path().join("rhcos.iso");
    let url = serve_once("404 Not Found", b"");

    let err = ensure_base_image(&iso, Some(&url), None).unwrap_err();

    assert!(matches!(err, PipelineError::FetchFailed { .. }));
    assert!(err.to_string().contains("404"));
    assert_absent(&iso);
    assert_absent(&partial_path(&iso));
}

#[test]
fn test_unreachable_url_is_fetch_failure() {
    let temp = TempDir::new().unwrap();
    let iso = temp.path().join("rhcos.iso");

    let err = ensure_base_image(&iso, Some("http://127.0.0.1:1/rhcos.iso"), None).unwrap_err();

    assert!(matches!(err, PipelineError::FetchFailed { .. }));
    assert_eq!(err.stage(), "acquire");
    assert_absent(&iso);
    assert_absent(&partial_path(&iso));
}

#[test]
fn test_existing_image_is_not_fetched() {
    let temp = TempDir::new().unwrap();
    let iso = temp.path().join("rhcos.iso");
    fs::write(&iso, b"cached").unwrap();

    // Unreachable URL: any fetch attempt would fail.
    ensure_base_image(&iso, Some("http://127.0.0.1:1/rhcos.iso"), Some(HELLO_SHA256)).unwrap();

    assert_eq!(fs::read(&iso).unwrap(), b"cached");
}

#[test]
fn test_missing_source_creates_nothing() {
    let temp = TempDir::new().unwrap();
    let iso = temp.path().join("rhcos.iso");

    for url in [None, Some(""), Some("   ")] {
        let err = ensure_base_image(&iso, url, None).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSource { .. }));
    }
    assert_absent(&iso);
    assert_absent(&partial_path(&iso));
}

#[test]
fn test_stale_partial_is_replaced() {
    let temp = TempDir::new().unwrap();
    let iso = temp.path().join("rhcos.iso");
    fs::write(partial_path(&iso), b"half a downl").unwrap();
    let url = serve_once("200 OK", b"hello");

    ensure_base_image(&iso, Some(&url), None).unwrap();

    assert_eq!(fs::read(&iso).unwrap(), b"hello");
    assert_absent(&partial_path(&iso));
}
