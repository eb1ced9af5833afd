//! Shared fixtures: a canned-response HTTP server and zip builders.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A response served for one path.
#[derive(Clone)]
pub struct Canned {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Canned {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}

/// Serve `routes` on an ephemeral localhost port until the runtime shuts
/// down. Unknown paths answer 404. Returns the base URL.
pub async fn serve(routes: Vec<(&str, Canned)>) -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    let routes: Arc<HashMap<String, Canned>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, canned)| (path.to_string(), canned))
            .collect(),
    );

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let _ = respond(stream, &routes).await;
            });
        }
    });

    Ok(base)
}

async fn respond(mut stream: TcpStream, routes: &HashMap<String, Canned>) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }

    let request = String::from_utf8_lossy(&request);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");
    let canned = routes.get(path).cloned().unwrap_or(Canned::status(404));

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        canned.status,
        reason(canned.status),
        canned.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&canned.body).await?;
    stream.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Build a zip archive in memory from `(name, content)` pairs.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in files {
        if let Err(e) = writer.start_file(*name, options) {
            panic!("Failed to add {name}: {e}");
        }
        if let Err(e) = writer.write_all(content) {
            panic!("Failed to write {name}: {e}");
        }
    }
    match writer.finish() {
        Ok(cursor) => cursor.into_inner(),
        Err(e) => panic!("Failed to finish zip: {e}"),
    }
}

/// A latest-release document listing `assets` as `(name, url, digest)`.
pub fn release_json(tag: &str, assets: &[(&str, String, Option<String>)]) -> Vec<u8> {
    let assets: Vec<serde_json::Value> = assets
        .iter()
        .map(|(name, url, digest)| {
            serde_json::json!({
                "name": name,
                "browser_download_url": url,
                "digest": digest,
            })
        })
        .collect();
    serde_json::json!({ "tag_name": tag, "assets": assets })
        .to_string()
        .into_bytes()
}
