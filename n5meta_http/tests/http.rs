#![allow(missing_docs)]

use std::{
    error::Error,
    io::{BufRead, BufReader, Write},
    net::TcpListener,
    sync::mpsc,
    thread::JoinHandle,
};

use n5meta::{AttributesSource, SourceError};
use n5meta_http::{HttpSource, HttpSourceOptions};
use serde_json::json;

/// Serve one canned response per entry of `responses`, sending each request head (lowercased) to the returned channel.
fn serve(
    responses: Vec<(&'static str, &'static str)>,
) -> Result<(String, mpsc::Receiver<String>, JoinHandle<()>), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}/", listener.local_addr()?);
    let (sender, receiver) = mpsc::channel();
    let handle = std::thread::spawn(move || {
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                head.push_str(&line.to_lowercase());
            }
            sender.send(head).unwrap();
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
        }
    });
    Ok((url, receiver, handle))
}

fn options() -> HttpSourceOptions {
    let mut options = HttpSourceOptions::default();
    options.proxy(false);
    options
}

#[test]
fn http_get_attributes() -> Result<(), Box<dyn Error>> {
    let (url, requests, handle) = serve(vec![("200 OK", r#"{"resolution": [4, 4, 40]}"#)])?;
    let source = HttpSource::new(&url, &options())?;
    let attributes = source.get_attributes("/group/")?;
    assert_eq!(attributes.get("resolution"), Some(&json!([4, 4, 40])));

    let request = requests.recv()?;
    assert!(request.starts_with("get /group/attributes.json http/1.1\r\n"));
    assert!(!request.contains("authorization"));
    handle.join().unwrap();
    Ok(())
}

#[test]
fn http_basic_auth() -> Result<(), Box<dyn Error>> {
    let (url, requests, handle) = serve(vec![("200 OK", "{}"), ("200 OK", "{}")])?;
    let mut options = options();
    options.basic_auth(Some("user:pass".parse()?));
    let source = HttpSource::new(&url, &options)?;
    source.get_attributes("group")?;
    source.get_attributes("group/s0")?;

    for _ in 0..2 {
        let request = requests.recv()?;
        assert!(request.contains("authorization: basic dxnlcjpwyxnz\r\n"));
    }
    handle.join().unwrap();
    Ok(())
}

#[test]
fn http_not_found() -> Result<(), Box<dyn Error>> {
    let (url, _requests, handle) = serve(vec![("404 Not Found", "")])?;
    let source = HttpSource::new(&url, &options())?;
    assert!(matches!(
        source.get_attributes("missing"),
        Err(SourceError::Remote { .. })
    ));
    handle.join().unwrap();
    Ok(())
}

#[test]
fn http_not_an_object() -> Result<(), Box<dyn Error>> {
    let (url, _requests, handle) = serve(vec![("200 OK", "[1, 2, 3]")])?;
    let source = HttpSource::new(&url, &options())?;
    assert!(matches!(
        source.get_attributes("group"),
        Err(SourceError::NotAnObject { .. })
    ));
    handle.join().unwrap();
    Ok(())
}
