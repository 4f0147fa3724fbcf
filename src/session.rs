use crate::actor::{ActorHandle, ActorProbe};
use crate::config::HarnessConfig;
use crate::metrics::{CollectionSummary, MetricsCollector, TelemetryHandle};
use crate::motion::MotionController;
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

/// One bounded benchmark run: motion and metrics started and stopped together.
///
/// The session is an explicit context object; the host registers plain
/// callbacks that forward into it. Its simulation-step hook calls
/// [`Session::on_simulation_step`], a tick-cost hook calls
/// [`Session::on_telemetry_tick`], and the shutdown path calls
/// [`Session::on_shutdown`]. Motion and metrics fail independently: a metrics
/// fault never stalls the simulation step, and motion faults never abort
/// collection.
pub struct Session {
    id: Uuid,
    config: HarnessConfig,
    motion: MotionController,
    metrics: MetricsCollector,
    started_at_ms: Option<u64>,
    summary: Option<CollectionSummary>,
}

impl Session {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            motion: MotionController::new(config.motion.clone()),
            metrics: MetricsCollector::new(config.metrics.clone()),
            config,
            started_at_ms: None,
            summary: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }

    /// Summary of the last completed collection, once the session has ended.
    pub fn summary(&self) -> Option<&CollectionSummary> {
        self.summary.as_ref()
    }

    /// Starts metrics collection, then activates motion. A collection failure
    /// aborts the start; motion is never activated against a dead collector.
    /// No-op if the session is already running.
    pub fn begin(&mut self, probe: Arc<dyn ActorProbe>, now_ms: u64) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.metrics.start_collection(probe)?;
        self.motion.activate(now_ms);
        self.started_at_ms = Some(now_ms);
        self.summary = None;
        println!("[session] {} started", self.id);
        Ok(())
    }

    /// Host simulation-step hook: pushes the host-reported frame rate (and the
    /// frame time derived from it), advances the motion controller, and ends
    /// the session once the configured duration has elapsed.
    pub fn on_simulation_step(&mut self, actor: &mut dyn ActorHandle, now_ms: u64) {
        let Some(started_at) = self.started_at_ms else { return };

        let fps = actor.current_fps();
        if fps > 0.0 {
            self.metrics.update_fps(fps);
            self.metrics.update_frame_time(1_000.0 / fps);
        }

        self.motion.tick(actor, now_ms);

        let duration_ms = self.config.test_duration_secs.saturating_mul(1_000);
        if duration_ms > 0 && now_ms.saturating_sub(started_at) >= duration_ms {
            println!(
                "[session] {} reached configured duration ({}s)",
                self.id, self.config.test_duration_secs
            );
            self.end(Some(actor));
        }
    }

    /// Host tick-cost hook; may arrive from a different execution context than
    /// the simulation step.
    pub fn on_telemetry_tick(&self, mspt_ms: f64) {
        self.metrics.update_mspt(mspt_ms);
    }

    /// Cloneable push surface for hosts that report telemetry from threads
    /// other than the simulation step (render callbacks, server tick timers).
    pub fn telemetry_handle(&self) -> TelemetryHandle {
        self.metrics.telemetry_handle()
    }

    /// Graceful teardown; safe to call more than once.
    pub fn on_shutdown(&mut self, actor: Option<&mut dyn ActorHandle>) {
        self.end(actor);
    }

    fn end(&mut self, actor: Option<&mut dyn ActorHandle>) {
        if self.started_at_ms.take().is_none() {
            return;
        }
        self.motion.deactivate(actor);
        self.summary = self.metrics.stop_collection();
        println!("[session] {} ended", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::SimActor;
    use crate::config::{ActuationMode, MovementPattern};
    use glam::DVec3;

    fn session_config(dir: &std::path::Path) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.motion.pattern = MovementPattern::StraightLine;
        config.motion.actuation = ActuationMode::FreeFlight;
        config.metrics.output_directory = dir.to_path_buf();
        config.test_duration_secs = 2;
        config
    }

    #[test]
    fn step_before_begin_is_a_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(session_config(dir.path()));
        let mut actor = SimActor::new(DVec3::new(0.0, 64.0, 0.0));
        session.on_simulation_step(&mut actor, 100);
        assert!(!session.is_running());
        assert_eq!(actor.position(), DVec3::new(0.0, 64.0, 0.0));
    }

    #[test]
    fn duration_expiry_ends_the_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(session_config(dir.path()));
        let mut actor = SimActor::new(DVec3::new(0.0, 64.0, 0.0));
        actor.set_fps(60.0);

        session.begin(actor.probe(), 0).expect("begin session");
        assert!(session.is_running());

        session.on_simulation_step(&mut actor, 50);
        assert!(session.is_running());
        session.on_simulation_step(&mut actor, 2_000);
        assert!(!session.is_running(), "session must end at the configured duration");
        assert!(session.summary().is_some());

        // Steps after the end no longer move the actor.
        let resting = actor.position();
        session.on_simulation_step(&mut actor, 3_000);
        assert_eq!(actor.position(), resting);
    }

    #[test]
    fn begin_while_running_is_a_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = session_config(dir.path());
        config.test_duration_secs = 0;
        let mut session = Session::new(config);
        let actor = SimActor::new(DVec3::ZERO);

        session.begin(actor.probe(), 0).expect("first begin");
        session.begin(actor.probe(), 500).expect("second begin");
        session.on_shutdown(None);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read output dir")
            .filter_map(|entry| entry.ok())
            .collect();
        assert_eq!(files.len(), 1, "re-begin must not open a second output file");
    }

    #[test]
    fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(session_config(dir.path()));
        let mut actor = SimActor::new(DVec3::ZERO);
        session.begin(actor.probe(), 0).expect("begin session");
        session.on_shutdown(Some(&mut actor));
        let first = session.summary().map(|summary| summary.output_path.clone());
        session.on_shutdown(Some(&mut actor));
        let second = session.summary().map(|summary| summary.output_path.clone());
        assert_eq!(first, second, "second shutdown must not produce a new summary");
    }

    #[test]
    fn metrics_failure_leaves_motion_idle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not_a_directory");
        std::fs::write(&blocker, b"occupied").expect("create blocking file");

        let mut config = session_config(dir.path());
        config.metrics.output_directory = blocker;
        let mut session = Session::new(config);
        let mut actor = SimActor::new(DVec3::new(0.0, 64.0, 0.0));

        assert!(session.begin(actor.probe(), 0).is_err());
        assert!(!session.is_running());
        session.on_simulation_step(&mut actor, 50);
        assert_eq!(actor.position(), DVec3::new(0.0, 64.0, 0.0), "motion must stay idle");
    }
}
