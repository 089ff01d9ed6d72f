// Task result download.
//
// The archive is streamed to disk in fixed-size chunks so memory stays
// bounded whatever the archive size.

use crate::error::{ensure_status, network, Error, Expected, Result, Step};
use crate::params::{DataSource, Endpoints, TaskReference};
use indicatif::ProgressBar;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_LENGTH;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

/// Read size used while streaming a result archive.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Results view requested from classic GNPS.
pub const LEGACY_VIEW: &str = "download_clustered_spectra";

/// Blocking client without a request timeout; result archives can be
/// several gigabytes.
pub fn client() -> Result<Client> {
    Client::builder()
        .timeout(None::<std::time::Duration>)
        .build()
        .map_err(Error::Client)
}

/// The download request for a task. Classic GNPS serves results through a
/// POST on its `DownloadResult` view; GNPS2 through a GET on `taskzip`.
pub fn task_request(client: &Client, endpoints: &Endpoints, task: &TaskReference) -> RequestBuilder {
    match task.source {
        DataSource::Legacy => client
            .post(format!("{}/ProteoSAFe/DownloadResult", endpoints.gnps_legacy))
            .query(&[("task", task.task_id.as_str()), ("view", LEGACY_VIEW)]),
        DataSource::Gnps2 => client
            .get(format!("{}/taskzip", endpoints.gnps2))
            .query(&[("task", task.task_id.as_str())]),
    }
}

/// Copy `reader` into `writer` reading at most `chunk_size` bytes at a
/// time. Returns the number of bytes written.
pub fn stream_to<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    progress: &ProgressBar,
) -> io::Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
        progress.inc(n as u64);
    }
    writer.flush()?;
    Ok(total)
}

/// Download the result archive of `task` into `output`.
///
/// `make_progress` receives the announced length (0 when the server sends
/// none). If streaming fails the partial output file is removed.
pub fn fetch(
    client: &Client,
    endpoints: &Endpoints,
    task: &TaskReference,
    output: &Path,
    make_progress: impl FnOnce(u64) -> ProgressBar,
) -> Result<u64> {
    let step = Step::Fetch;
    let res = task_request(client, endpoints, task)
        .send()
        .map_err(network(step))?;
    let mut res = ensure_status(step, res, Expected::Success)?;

    let total = res
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    tracing::info!(task_id = %task.task_id, total, output = %output.display(), "downloading task result");

    let progress = make_progress(total);
    save_to(&mut res, output, &progress)
}

/// Stream `reader` into a new file at `output`. A file that could not be
/// created is left alone; a file we created is removed when streaming fails.
pub fn save_to<R: Read>(reader: &mut R, output: &Path, progress: &ProgressBar) -> Result<u64> {
    let file = match File::create(output) {
        Ok(file) => file,
        Err(e) => {
            progress.abandon();
            return Err(Error::Io(e));
        }
    };

    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    match stream_to(reader, &mut writer, CHUNK_SIZE, progress) {
        Ok(bytes) => {
            progress.finish();
            Ok(bytes)
        }
        Err(e) => {
            progress.abandon();
            drop(writer);
            if let Err(rm) = std::fs::remove_file(output) {
                tracing::warn!(error = %rm, output = %output.display(), "could not remove partial download");
            }
            Err(Error::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader handing out its data in pieces of fixed size.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        piece: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = (self.pos + self.piece).min(self.data.len());
            let n = (end - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn payload() -> Vec<u8> {
        (0..10_000u32).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn output_matches_input_for_any_chunk_size() {
        let data = payload();
        for chunk_size in [1, 7, 1000, 4096, CHUNK_SIZE] {
            for piece in [1, 333, 10_000] {
                let mut reader = Trickle { data: data.clone(), pos: 0, piece };
                let mut out = Vec::new();
                let bar = ProgressBar::hidden();
                let n = stream_to(&mut reader, &mut out, chunk_size, &bar).unwrap();
                assert_eq!(n, data.len() as u64);
                assert_eq!(out, data, "chunk_size={} piece={}", chunk_size, piece);
                assert_eq!(bar.position(), data.len() as u64);
            }
        }
    }

    #[test]
    fn empty_body_writes_nothing() {
        let mut reader = io::empty();
        let mut out = Vec::new();
        let n = stream_to(&mut reader, &mut out, CHUNK_SIZE, &ProgressBar::hidden()).unwrap();
        assert_eq!(n, 0);
        assert!(out.is_empty());
    }

    /// Hands out `good` bytes, then fails.
    struct Broken {
        good: usize,
    }

    impl Read for Broken {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.good == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            let n = self.good.min(buf.len());
            buf[..n].fill(7);
            self.good -= n;
            Ok(n)
        }
    }

    #[test]
    fn partial_output_is_removed_when_stream_breaks() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("task.zip");
        let bar = ProgressBar::hidden();

        let err = save_to(&mut Broken { good: 5000 }, &output, &bar).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
        assert_eq!(bar.position(), 5000);
        assert!(!output.exists());
    }

    #[test]
    fn output_that_cannot_be_created_is_left_in_place() {
        // A directory at the output path makes `File::create` fail even as root.
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("task.zip");
        std::fs::create_dir(&output).unwrap();
        std::fs::write(output.join("keep"), b"user data").unwrap();

        let err = save_to(&mut io::empty(), &output, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(std::fs::read(output.join("keep")).unwrap(), b"user data");
    }

    #[test]
    fn saved_file_matches_stream() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("task.zip");
        let data = payload();
        let mut reader = Trickle { data: data.clone(), pos: 0, piece: 777 };
        let n = save_to(&mut reader, &output, &ProgressBar::hidden()).unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(std::fs::read(&output).unwrap(), data);
    }

    #[test]
    fn requests_per_data_source() {
        let client = Client::new();
        let endpoints = Endpoints::default();

        let gnps2 = TaskReference { task_id: "t1".into(), source: DataSource::Gnps2 };
        let req = task_request(&client, &endpoints, &gnps2).build().unwrap();
        assert_eq!(req.method(), reqwest::Method::GET);
        assert_eq!(req.url().as_str(), "https://gnps2.org/taskzip?task=t1");

        let legacy = TaskReference { task_id: "t2".into(), source: DataSource::Legacy };
        let req = task_request(&client, &endpoints, &legacy).build().unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(
            req.url().as_str(),
            "https://gnps.ucsd.edu/ProteoSAFe/DownloadResult?task=t2&view=download_clustered_spectra"
        );
    }
}
