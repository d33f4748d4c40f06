//! Lazy supply of input lines from gzipped byte streams

use crate::Result;
use anyhow::Context;
use async_compression::tokio::bufread::GzipDecoder;
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Response;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncRead, BufReader, Lines},
};
use tokio_util::io::StreamReader;

/// Forward-only supply of text lines consumed by the reduction pipeline
///
/// Only the pipeline's producer reads from a source, so implementations need
/// no internal synchronization.
#[async_trait]
pub trait LineSource: Send {
    /// Produce the next line, or `None` once the source is exhausted
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Compressed byte stream of unknown origin
type GzBytes = Box<dyn AsyncRead + Send + Unpin>;

/// Lines decoded on the fly from a gzipped byte stream
pub struct GzipLineSource {
    lines: Lines<BufReader<GzipDecoder<BufReader<GzBytes>>>>,
}
//
impl GzipLineSource {
    /// Read a local gzipped data file
    pub async fn open_file(path: &Path) -> Result<Self> {
        log::info!("processing file {}", path.display());
        let file = File::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::from_bytes(Box::new(file)))
    }

    /// Stream a gzipped data file over HTTP(S) without buffering it whole
    pub async fn open_url(client: &reqwest::Client, url: &str) -> Result<Self> {
        log::info!("processing URL {url}");
        let response = client
            .get(url)
            .send()
            .await
            .and_then(Response::error_for_status)
            .with_context(|| format!("initiating download of {url}"))?;

        // Translate reqwest errors into I/O errors
        let gz_bytes = StreamReader::new(
            response
                .bytes_stream()
                .map(|res| res.map_err(|e| io::Error::new(ErrorKind::Other, Box::new(e)))),
        );
        Ok(Self::from_bytes(Box::new(gz_bytes)))
    }

    /// Apply gzip decoding and line splitting to compressed bytes
    fn from_bytes(bytes: GzBytes) -> Self {
        let mut decoder = GzipDecoder::new(BufReader::new(bytes));
        // Large data files are often concatenations of gzip members
        decoder.multiple_members(true);
        Self {
            lines: BufReader::new(decoder).lines(),
        }
    }
}
//
#[async_trait]
impl LineSource for GzipLineSource {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self
            .lines
            .next_line()
            .await
            .context("reading the next input line")?)
    }
}

/// Enumerate the gzipped data files of a directory, in sorted order
///
/// Directories without a single `*.gz` file are rejected as a likely
/// misconfiguration.
pub fn gzip_files_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    log::info!("processing directory {}", dir.display());
    let context = || format!("listing {}", dir.display());
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(context)? {
        let path = entry.with_context(context)?.path();
        if path.extension().is_some_and(|ext| ext == "gz") {
            files.push(path);
        }
    }
    anyhow::ensure!(
        !files.is_empty(),
        "no *.gz files found in {} directory",
        dir.display()
    );
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    fn gzip_bytes(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn gzipped_files_stream_line_by_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.gz");
        std::fs::write(&path, gzip_bytes("first\tline\nsecond\tline\n")).unwrap();

        let mut source = GzipLineSource::open_file(&path).await.unwrap();
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("first\tline"));
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("second\tline"));
        assert_eq!(source.next_line().await.unwrap(), None);
    }

    #[test]
    fn directory_enumeration_wants_gz_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(gzip_files_in_dir(dir.path()).is_err());

        std::fs::write(dir.path().join("b.gz"), b"").unwrap();
        std::fs::write(dir.path().join("a.gz"), b"").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), b"").unwrap();
        let files = gzip_files_in_dir(dir.path()).unwrap();
        let names = files
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a.gz", "b.gz"]);
    }
}
