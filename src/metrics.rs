use crate::actor::{loaded_region_estimate, ActorProbe};
use crate::config::MetricsConfig;
use crate::error::HarnessError;
use chrono::Utc;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Fixed column set consumed by the offline tooling.
const CSV_HEADER: &str = "timestamp,fps,frameTime,mspt,playerX,playerY,playerZ,loadedChunks";

/// f64 published through an atomic word; last write wins.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    const fn zero() -> Self {
        Self(AtomicU64::new(0))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Latest telemetry scalars pushed from host callbacks. Render-thread pushes
/// never contend with the sampler; only the running stats take a lock.
#[derive(Debug)]
struct TelemetryBus {
    fps: AtomicF64,
    frame_time_ms: AtomicF64,
    mspt_ms: AtomicF64,
}

impl TelemetryBus {
    const fn new() -> Self {
        Self { fps: AtomicF64::zero(), frame_time_ms: AtomicF64::zero(), mspt_ms: AtomicF64::zero() }
    }
}

/// Streaming min/mean/max over one telemetry channel. The mean is updated
/// incrementally, never recomputed from history.
#[derive(Debug, Clone, Copy)]
pub struct RunningStat {
    count: u64,
    mean: f64,
    min: f64,
    max: f64,
}

impl RunningStat {
    pub const fn new() -> Self {
        Self { count: 0, mean: 0.0, min: f64::INFINITY, max: f64::NEG_INFINITY }
    }

    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min
        }
    }

    pub fn max(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.max
        }
    }
}

impl Default for RunningStat {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel aggregates for one collection session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelStats {
    pub fps: RunningStat,
    pub frame_time: RunningStat,
    pub mspt: RunningStat,
}

#[derive(Debug)]
struct CollectorShared {
    telemetry: TelemetryBus,
    stats: Mutex<ChannelStats>,
    rows_written: AtomicU64,
}

impl CollectorShared {
    fn push_fps(&self, fps: f64) {
        if !fps.is_finite() {
            return;
        }
        self.telemetry.fps.store(fps);
        if let Ok(mut stats) = self.stats.lock() {
            stats.fps.push(fps);
        }
    }

    fn push_frame_time(&self, frame_time_ms: f64) {
        if !frame_time_ms.is_finite() {
            return;
        }
        self.telemetry.frame_time_ms.store(frame_time_ms);
        if let Ok(mut stats) = self.stats.lock() {
            stats.frame_time.push(frame_time_ms);
        }
    }

    fn push_mspt(&self, mspt_ms: f64) {
        if !mspt_ms.is_finite() {
            return;
        }
        self.telemetry.mspt_ms.store(mspt_ms);
        if let Ok(mut stats) = self.stats.lock() {
            stats.mspt.push(mspt_ms);
        }
    }
}

/// Cloneable push surface for host telemetry callbacks. Lives on whatever
/// thread the host calls from; pushes publish atomically and only the
/// running-stat update takes the stats lock.
#[derive(Clone)]
pub struct TelemetryHandle {
    shared: Arc<CollectorShared>,
}

impl TelemetryHandle {
    pub fn update_fps(&self, fps: f64) {
        self.shared.push_fps(fps);
    }

    pub fn update_frame_time(&self, frame_time_ms: f64) {
        self.shared.push_frame_time(frame_time_ms);
    }

    pub fn update_mspt(&self, mspt_ms: f64) {
        self.shared.push_mspt(mspt_ms);
    }
}

struct SamplerHandle {
    cancel: Sender<()>,
    thread: JoinHandle<()>,
    output_path: PathBuf,
}

/// Result of one collection session, reported when it stops.
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub output_path: PathBuf,
    pub rows_written: u64,
    pub stats: ChannelStats,
}

impl CollectionSummary {
    fn report(&self) {
        println!(
            "[metrics] collection stopped: {} rows -> {}",
            self.rows_written,
            self.output_path.display()
        );
        let channels =
            [("fps", &self.stats.fps), ("frameTime", &self.stats.frame_time), ("mspt", &self.stats.mspt)];
        for (label, stat) in channels {
            println!(
                "[metrics]   {:<9} min {:>8.2}  mean {:>8.2}  max {:>8.2}  ({} samples)",
                label,
                stat.min(),
                stat.mean(),
                stat.max(),
                stat.count()
            );
        }
    }
}

/// Timer-driven sampling/aggregation/export pipeline. Telemetry is pushed in
/// from host callbacks at arbitrary cadence; an independent sampler thread
/// appends one CSV row per interval and flushes it before the next fire.
pub struct MetricsCollector {
    config: MetricsConfig,
    shared: Arc<CollectorShared>,
    sampler: Option<SamplerHandle>,
}

impl MetricsCollector {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            shared: Arc::new(CollectorShared {
                telemetry: TelemetryBus::new(),
                stats: Mutex::new(ChannelStats::default()),
                rows_written: AtomicU64::new(0),
            }),
            sampler: None,
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.sampler.is_some()
    }

    /// Path of the file being written, while collecting.
    pub fn output_path(&self) -> Option<&Path> {
        self.sampler.as_ref().map(|sampler| sampler.output_path.as_path())
    }

    /// Opens a fresh timestamped CSV file and starts the sampler thread. The
    /// first sample fires after one full interval. On failure nothing is
    /// spawned and the collector stays idle.
    pub fn start_collection(&mut self, probe: Arc<dyn ActorProbe>) -> Result<(), HarnessError> {
        if self.sampler.is_some() {
            eprintln!("[metrics] collection already running; ignoring start request");
            return Ok(());
        }

        let dir = self.config.output_directory.clone();
        fs::create_dir_all(&dir).map_err(|source| HarnessError::Io {
            context: "create output directory",
            path: dir.clone(),
            source,
        })?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("perf_{stamp}.csv"));
        let mut file = File::create(&path).map_err(|source| HarnessError::Io {
            context: "create metrics file",
            path: path.clone(),
            source,
        })?;
        file.write_all(format!("{CSV_HEADER}\n").as_bytes()).map_err(|source| HarnessError::Io {
            context: "write csv header",
            path: path.clone(),
            source,
        })?;

        if let Ok(mut stats) = self.shared.stats.lock() {
            *stats = ChannelStats::default();
        }
        self.shared.rows_written.store(0, Ordering::Relaxed);

        let interval = Duration::from_secs(self.config.sample_interval_secs.max(1));
        let (cancel, wakeup) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let worker_path = path.clone();
        let thread = thread::Builder::new()
            .name("metrics-sampler".to_string())
            .spawn(move || sampler_loop(file, worker_path, shared, probe, wakeup, interval))
            .map_err(|source| HarnessError::Io {
                context: "spawn sampler thread",
                path: path.clone(),
                source,
            })?;

        println!("[metrics] collecting to {} every {}s", path.display(), interval.as_secs());
        self.sampler = Some(SamplerHandle { cancel, thread, output_path: path });
        Ok(())
    }

    /// Push surface for callbacks on other threads; clones share this
    /// collector's channels.
    pub fn telemetry_handle(&self) -> TelemetryHandle {
        TelemetryHandle { shared: Arc::clone(&self.shared) }
    }

    pub fn update_fps(&self, fps: f64) {
        self.shared.push_fps(fps);
    }

    pub fn update_frame_time(&self, frame_time_ms: f64) {
        self.shared.push_frame_time(frame_time_ms);
    }

    pub fn update_mspt(&self, mspt_ms: f64) {
        self.shared.push_mspt(mspt_ms);
    }

    /// Cancels the sampler, joins it, and reports the per-channel summary.
    /// The worker drops the file handle after its final in-flight fire, so no
    /// write can land after close. Returns `None` when not collecting.
    pub fn stop_collection(&mut self) -> Option<CollectionSummary> {
        let sampler = self.sampler.take()?;
        let _ = sampler.cancel.send(());
        if sampler.thread.join().is_err() {
            eprintln!("[metrics] sampler thread panicked");
        }
        let stats = self.shared.stats.lock().map(|stats| *stats).unwrap_or_default();
        let summary = CollectionSummary {
            output_path: sampler.output_path,
            rows_written: self.shared.rows_written.load(Ordering::Relaxed),
            stats,
        };
        summary.report();
        Some(summary)
    }
}

impl Drop for MetricsCollector {
    fn drop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            let _ = sampler.cancel.send(());
            let _ = sampler.thread.join();
        }
    }
}

fn sampler_loop(
    mut file: File,
    path: PathBuf,
    shared: Arc<CollectorShared>,
    probe: Arc<dyn ActorProbe>,
    wakeup: Receiver<()>,
    interval: Duration,
) {
    loop {
        match wakeup.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let row = match build_row(&shared, probe.as_ref()) {
            Ok(row) => row,
            // Actor not present (loading screen, respawn); skip this fire.
            Err(HarnessError::ActorUnavailable) => continue,
            Err(err) => {
                eprintln!("[metrics] sample skipped: {err}");
                continue;
            }
        };
        match file.write_all(row.as_bytes()).and_then(|()| file.flush()) {
            Ok(()) => {
                shared.rows_written.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                eprintln!("[metrics] failed to append row to {}: {err}", path.display());
            }
        }
    }
}

/// Formats one complete CSV row from the current telemetry and actor state.
/// The row is written in a single call downstream; a torn row must never
/// reach disk.
fn build_row(shared: &CollectorShared, probe: &dyn ActorProbe) -> Result<String, HarnessError> {
    let position = probe.position().ok_or(HarnessError::ActorUnavailable)?;
    let loaded = probe
        .loaded_region_count()
        .unwrap_or_else(|_| loaded_region_estimate(probe.view_distance()));
    Ok(format!(
        "{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{}\n",
        Utc::now().timestamp_millis(),
        shared.telemetry.fps.load(),
        shared.telemetry.frame_time_ms.load(),
        shared.telemetry.mspt_ms.load(),
        position.x,
        position.y,
        position.z,
        loaded,
    ))
}
