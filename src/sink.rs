//! Where finished records go once parsing and filtering are done

use crate::{
    record::{NgramRecord, REDUCED_HEADER},
    Result,
};
use anyhow::Context;
use async_compression::tokio::write::GzipEncoder;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{
    fs,
    io::{AsyncWriteExt, BufWriter},
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::Duration,
};

/// Capacity of the record queue between workers and the writer task
const RECORD_QUEUE_CAPACITY: usize = 2131;

/// How long a record submission waits for queue space before re-checking
/// that the writer task is still alive
const SEND_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Consumer of finished, filtered records
///
/// Lifecycle: `init()`, then zero or more `process()` calls, then `end()`.
/// `process` may be called concurrently by any number of workers; sinks
/// whose underlying resource cannot take that must serialize internally.
/// A sink whose internal machinery fails asynchronously must surface the
/// failure on the next `process` interaction, or at `end()` at the latest.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Prepare the sink for incoming records
    async fn init(&self) -> Result<()>;

    /// Consume one record
    async fn process(&self, record: NgramRecord) -> Result<()>;

    /// Signal that no more records are coming and flush everything out
    async fn end(&self) -> Result<()>;
}

/// Writes reduced records into a gzipped TSV file
///
/// Records are handed over a bounded queue to one dedicated writer task, so
/// that compression throughput never throttles the workers directly and the
/// output file sees a single writer. The writer produces `<output>.tmp` and
/// only renames it over the output path once the whole run has succeeded.
pub struct TsvFileSink {
    output_path: PathBuf,
    sender: Mutex<Option<mpsc::Sender<NgramRecord>>>,
    receiver: Mutex<Option<mpsc::Receiver<NgramRecord>>>,
    writer: Mutex<Option<JoinHandle<Result<()>>>>,
}
//
impl TsvFileSink {
    /// Set up a sink writing to the given path
    pub fn new(output_path: PathBuf) -> Self {
        let (sender, receiver) = mpsc::channel(RECORD_QUEUE_CAPACITY);
        Self {
            output_path,
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            writer: Mutex::new(None),
        }
    }

    /// Re-raise the writer task's failure to the caller
    ///
    /// The first caller gets the actual error; later callers learn that the
    /// failure was already reported.
    async fn writer_failure(&self) -> anyhow::Error {
        let handle = self.writer.lock().await.take();
        match handle {
            Some(handle) => match handle.await {
                Ok(Ok(())) => anyhow::format_err!("writer task stopped before the sink was closed"),
                Ok(Err(error)) => error,
                Err(join_error) => {
                    anyhow::Error::new(join_error).context("joining the writer task")
                }
            },
            None => anyhow::format_err!("writer task is not running"),
        }
    }
}
//
#[async_trait]
impl RecordSink for TsvFileSink {
    async fn init(&self) -> Result<()> {
        let receiver = self
            .receiver
            .lock()
            .await
            .take()
            .context("sink initialized twice")?;
        let writer = tokio::spawn(write_reduced_file(self.output_path.clone(), receiver));
        *self.writer.lock().await = Some(writer);
        Ok(())
    }

    async fn process(&self, record: NgramRecord) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .context("sink already closed")?;
        let mut record = record;
        loop {
            record = match sender.send_timeout(record, SEND_RETRY_INTERVAL).await {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendTimeoutError::Timeout(record)) => {
                    // The queue is full: make sure the writer is still
                    // draining it before waiting any longer
                    let writer_finished = self
                        .writer
                        .lock()
                        .await
                        .as_ref()
                        .map_or(true, JoinHandle::is_finished);
                    if writer_finished {
                        return Err(self.writer_failure().await);
                    }
                    record
                }
                Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                    return Err(self.writer_failure().await);
                }
            };
        }
    }

    async fn end(&self) -> Result<()> {
        // Dropping the last sender tells the writer to drain and finish
        self.sender.lock().await.take();
        let writer = self
            .writer
            .lock()
            .await
            .take()
            .context("sink closed twice or never initialized")?;
        writer.await.context("joining the writer task")??;
        Ok(())
    }
}

/// Writer task: drain the record queue into the output file
async fn write_reduced_file(
    output_path: PathBuf,
    mut records: mpsc::Receiver<NgramRecord>,
) -> Result<()> {
    let temp_path = temp_output_path(&output_path);
    log::info!("creating temporary output file {}", temp_path.display());
    let result = write_records(&temp_path, &mut records).await;
    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
        return result;
    }
    log::info!(
        "moving output file from {} to {}",
        temp_path.display(),
        output_path.display()
    );
    fs::rename(&temp_path, &output_path)
        .await
        .with_context(|| format!("moving {} into place", temp_path.display()))
}

/// Write the header and all incoming records into the temporary file
async fn write_records(
    temp_path: &Path,
    records: &mut mpsc::Receiver<NgramRecord>,
) -> Result<()> {
    let file = fs::File::create(temp_path)
        .await
        .with_context(|| format!("creating {}", temp_path.display()))?;
    let mut encoder = GzipEncoder::new(BufWriter::new(file));
    encoder.write_all(REDUCED_HEADER.as_bytes()).await?;
    encoder.write_all(b"\n").await?;
    while let Some(record) = records.recv().await {
        encoder.write_all(record.to_reduced_line().as_bytes()).await?;
        encoder.write_all(b"\n").await?;
    }
    encoder
        .shutdown()
        .await
        .context("finalizing the compressed output stream")?;
    Ok(())
}

/// Temporary sibling of the output file, renamed into place on success
fn temp_output_path(output_path: &Path) -> PathBuf {
    let mut temp = output_path.as_os_str().to_owned();
    temp.push(".tmp");
    temp.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parse::parse_line,
        source::{GzipLineSource, LineSource},
    };
    use tokio::time::sleep;

    async fn read_back(path: &Path) -> Vec<String> {
        let mut source = GzipLineSource::open_file(path).await.unwrap();
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn written_file_starts_with_the_header_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reduced.gz");
        let sink = TsvFileSink::new(path.clone());
        sink.init().await.unwrap();
        sink.process(parse_line("Happy_ADJ Squirrel_NOUN _END_\t1930,1,2").unwrap())
            .await
            .unwrap();
        sink.process(parse_line("Wltebsky_NOUN\t1930,1,1\t1932,1,1").unwrap())
            .await
            .unwrap();
        sink.end().await.unwrap();

        assert_eq!(
            read_back(&path).await,
            [
                REDUCED_HEADER,
                "Happy Squirrel \tJNE\t1\t2\t1930\t1930\t1\t1930\t1",
                "Wltebsky\tN\t2\t2\t1930\t1932\t2\t1930\t1",
            ]
        );
    }

    #[tokio::test]
    async fn empty_runs_still_produce_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gz");
        let sink = TsvFileSink::new(path.clone());
        sink.init().await.unwrap();
        sink.end().await.unwrap();
        assert_eq!(read_back(&path).await, [REDUCED_HEADER]);
    }

    #[tokio::test]
    async fn temp_file_is_not_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reduced.gz");
        let sink = TsvFileSink::new(path.clone());
        sink.init().await.unwrap();
        sink.end().await.unwrap();
        assert!(path.exists());
        assert!(!temp_output_path(&path).exists());
    }

    #[tokio::test]
    async fn writer_failure_surfaces_on_process_and_end() {
        let dir = tempfile::tempdir().unwrap();
        // The parent directory of the output file does not exist
        let path = dir.path().join("missing").join("reduced.gz");
        let sink = TsvFileSink::new(path);
        sink.init().await.unwrap();
        // Give the writer task time to fail at file creation
        sleep(Duration::from_millis(100)).await;
        let record = parse_line("word\t1930,1,1").unwrap();
        assert!(sink.process(record).await.is_err());
        assert!(sink.end().await.is_err());
    }
}
