//! # Snapshot Recorder
//!
//! Samples the latest published snapshot and appends it to JSONL files.
//!
//! Files are named `snapshots_NNNNNN.jsonl`. After `max_records_per_file`
//! lines the recorder rotates to the next index and deletes the oldest files
//! beyond `max_files_to_keep`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::snapshot::TelemetrySnapshot;
use crate::config::RecordingConfig;
use crate::error::Result;

const FILE_PREFIX: &str = "snapshots_";
const FILE_SUFFIX: &str = ".jsonl";

/// Rotating JSONL writer for telemetry snapshots
pub struct SnapshotRecorder {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    file_index: u64,
    records_in_file: usize,
    writer: Option<BufWriter<File>>,
}

impl std::fmt::Debug for SnapshotRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotRecorder")
            .field("dir", &self.dir)
            .field("file_index", &self.file_index)
            .field("records_in_file", &self.records_in_file)
            .finish_non_exhaustive()
    }
}

impl SnapshotRecorder {
    /// Create the recording directory and continue numbering after any
    /// files already in it.
    pub fn new(config: &RecordingConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;

        let file_index = recorded_files(&dir)?
            .last()
            .and_then(|(index, _)| index.checked_add(1))
            .unwrap_or(1);

        info!("Recording snapshots to {} (starting at file {})", dir.display(), file_index);

        Ok(Self {
            dir,
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            file_index,
            records_in_file: 0,
            writer: None,
        })
    }

    /// Append one snapshot as a JSON line
    pub fn record(&mut self, snapshot: &TelemetrySnapshot) -> Result<()> {
        if self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        if self.writer.is_none() {
            self.writer = Some(self.open_current()?);
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, snapshot).map_err(std::io::Error::from)?;
            writer.write_all(b"\n")?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    /// Flush buffered lines to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn open_current(&self) -> Result<BufWriter<File>> {
        let path = self.dir.join(file_name(self.file_index));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Opened recording file {}", path.display());

        self.prune()?;
        Ok(BufWriter::new(file))
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;
        self.writer = None;
        self.file_index += 1;
        self.records_in_file = 0;
        Ok(())
    }

    fn prune(&self) -> Result<()> {
        let files = recorded_files(&self.dir)?;
        let excess = files.len().saturating_sub(self.max_files_to_keep);
        for (_, path) in files.into_iter().take(excess) {
            debug!("Removing old recording {}", path.display());
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn file_name(index: u64) -> String {
    format!("{}{:06}{}", FILE_PREFIX, index, FILE_SUFFIX)
}

/// Recording files in `dir`, oldest first
pub(crate) fn recorded_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let index = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(FILE_PREFIX))
            .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            .and_then(|digits| digits.parse::<u64>().ok());
        if let Some(index) = index {
            files.push((index, path));
        }
    }
    files.sort_by_key(|(index, _)| *index);
    Ok(files)
}

/// Record a new line every `period` while the snapshot keeps changing.
///
/// File writes run on the blocking pool so a slow disk never stalls the
/// runtime. The task ends when `stop` flips to true or its sender is dropped.
pub fn spawn_recorder(
    recorder: SnapshotRecorder,
    snapshots: watch::Receiver<TelemetrySnapshot>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Sequence 0 is the untouched default snapshot
        let mut last_sequence = 0;
        let mut recorder = recorder;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = snapshots.borrow().clone();
                    if snapshot.sequence == last_sequence {
                        continue;
                    }
                    last_sequence = snapshot.sequence;
                    recorder = match off_runtime(recorder, move |r| r.record(&snapshot)).await {
                        Some(recorder) => recorder,
                        None => return,
                    };
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        if off_runtime(recorder, SnapshotRecorder::flush).await.is_some() {
            debug!("Snapshot recorder stopped");
        }
    })
}

/// Run one recorder operation on the blocking pool and hand the recorder back.
///
/// A failed operation is logged and the recorder is kept. `None` means the
/// worker itself died and the recorder is gone.
async fn off_runtime<F>(mut recorder: SnapshotRecorder, op: F) -> Option<SnapshotRecorder>
where
    F: FnOnce(&mut SnapshotRecorder) -> Result<()> + Send + 'static,
{
    let worker = tokio::task::spawn_blocking(move || {
        let result = op(&mut recorder);
        (recorder, result)
    });

    match worker.await {
        Ok((recorder, result)) => {
            if let Err(e) = result {
                warn!("Snapshot recording failed: {}", e);
            }
            Some(recorder)
        }
        Err(e) => {
            warn!("Snapshot recorder worker failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::aggregator::SnapshotSink;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir, per_file: usize, keep: usize) -> RecordingConfig {
        RecordingConfig {
            enabled: true,
            log_dir: dir.path().to_string_lossy().to_string(),
            max_records_per_file: per_file,
            max_files_to_keep: keep,
            interval_ms: 10,
        }
    }

    fn lines_in(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_file_name_is_zero_padded() {
        assert_eq!(file_name(7), "snapshots_000007.jsonl");
    }

    #[test]
    fn test_records_json_lines() {
        let dir = TempDir::new().unwrap();
        let mut recorder = SnapshotRecorder::new(&config_in(&dir, 100, 10)).unwrap();

        recorder.record(&TelemetrySnapshot { sequence: 1, ..Default::default() }).unwrap();
        recorder.record(&TelemetrySnapshot { sequence: 2, armed: true, ..Default::default() }).unwrap();
        recorder.flush().unwrap();

        let lines = lines_in(&dir.path().join("snapshots_000001.jsonl"));
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second["sequence"], 2);
        assert_eq!(second["armed"], true);
    }

    #[test]
    fn test_rotates_and_prunes() {
        let dir = TempDir::new().unwrap();
        let mut recorder = SnapshotRecorder::new(&config_in(&dir, 2, 2)).unwrap();

        for sequence in 1..=7 {
            recorder.record(&TelemetrySnapshot { sequence, ..Default::default() }).unwrap();
        }
        recorder.flush().unwrap();

        let files = recorded_files(dir.path()).unwrap();
        let indices: Vec<u64> = files.iter().map(|(index, _)| *index).collect();
        assert_eq!(indices, vec![3, 4]);
        assert_eq!(lines_in(&files[0].1).len(), 2);
        assert_eq!(lines_in(&files[1].1).len(), 1);
    }

    #[test]
    fn test_continues_numbering_after_existing_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("snapshots_000004.jsonl"), "{}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut recorder = SnapshotRecorder::new(&config_in(&dir, 10, 10)).unwrap();
        recorder.record(&TelemetrySnapshot::default()).unwrap();
        recorder.flush().unwrap();

        assert!(dir.path().join("snapshots_000005.jsonl").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_spawned_recorder_skips_unchanged_snapshots() {
        let dir = TempDir::new().unwrap();
        let recorder = SnapshotRecorder::new(&config_in(&dir, 100, 10)).unwrap();
        let (sink, rx) = SnapshotSink::channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = spawn_recorder(recorder, rx, Duration::from_millis(5), stop_rx);

        sink.publish(TelemetrySnapshot { sequence: 1, ..Default::default() });
        tokio::time::sleep(Duration::from_millis(60)).await;
        sink.publish(TelemetrySnapshot { sequence: 2, ..Default::default() });
        tokio::time::sleep(Duration::from_millis(60)).await;

        stop_tx.send(true).unwrap();
        tokio_test::assert_ok!(handle.await);

        let lines = lines_in(&dir.path().join("snapshots_000001.jsonl"));
        let sequences: Vec<u64> = lines
            .iter()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["sequence"].as_u64().unwrap())
            .collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_recorder_survives_failed_write() {
        let dir = TempDir::new().unwrap();
        let recorder = SnapshotRecorder::new(&config_in(&dir, 100, 10)).unwrap();
        fs::remove_dir(dir.path()).unwrap();

        let failing = TelemetrySnapshot { sequence: 1, ..Default::default() };
        let recorder = off_runtime(recorder, move |r| r.record(&failing)).await;
        let recorder = recorder.expect("expected Some");

        fs::create_dir(dir.path()).unwrap();
        let written = TelemetrySnapshot { sequence: 2, ..Default::default() };
        let recorder = off_runtime(recorder, move |r| r.record(&written)).await.unwrap();
        off_runtime(recorder, SnapshotRecorder::flush).await.expect("expected Some");

        let lines = lines_in(&dir.path().join("snapshots_000001.jsonl"));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"sequence\":2"));
    }
}
