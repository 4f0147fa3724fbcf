use crate::actor::ActorHandle;
use crate::config::{ActuationMode, MotionConfig, MovementPattern};
use crate::wrap_degrees;
use glam::DVec3;
use rand::Rng;
use std::f64::consts::TAU;

/// Velocity scale applied to grounded movement.
const GROUNDED_SPEED_SCALE: f64 = 0.2;
/// Per-tick displacement scale applied to free-flight movement.
const FLIGHT_STEP_SCALE: f64 = 0.05;
/// Window between random heading re-draws.
const HEADING_REDRAW_MS: u64 = 5_000;
/// Fixed period of one full orbit in the circular pattern.
const ORBIT_PERIOD_MS: u64 = 20_000;
/// Orbit radius per unit of configured speed.
const ORBIT_RADIUS_PER_SPEED: f64 = 20.0;
/// Downward camera tilt while orbiting in free flight.
const ORBIT_PITCH_DEG: f32 = 15.0;

/// Mutable trajectory state; exists only while the controller is active.
#[derive(Debug)]
struct MotionState {
    phase_start_ms: u64,
    /// Captured on the first tick, after the free-flight lift if any.
    origin: Option<DVec3>,
    /// Unit horizontal heading applied between random re-draws.
    heading: DVec3,
    yaw_deg: f32,
}

/// Drives the actor along the configured trajectory, one simulation step at a
/// time. `tick` runs inside the host's simulation step and must stay cheap:
/// no I/O, no locking, no blocking waits.
pub struct MotionController {
    config: MotionConfig,
    state: Option<MotionState>,
}

impl MotionController {
    pub fn new(config: MotionConfig) -> Self {
        Self { config, state: None }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Idle -> Active; no-op if already active.
    pub fn activate(&mut self, now_ms: u64) {
        if self.state.is_some() {
            return;
        }
        self.state = Some(MotionState {
            phase_start_ms: now_ms,
            origin: None,
            heading: DVec3::Z,
            yaw_deg: 0.0,
        });
        println!(
            "[motion] activated: pattern {}, {} actuation",
            self.config.pattern.label(),
            self.config.actuation.label()
        );
    }

    /// Active -> Idle; no-op if already idle. Grounded actuation stops
    /// horizontal drift (vertical velocity preserved); free flight writes
    /// positions directly and needs no stop.
    pub fn deactivate(&mut self, actor: Option<&mut dyn ActorHandle>) {
        if self.state.take().is_none() {
            return;
        }
        if self.config.actuation == ActuationMode::Grounded {
            if let Some(actor) = actor {
                let vertical = actor.velocity().y;
                actor.set_velocity(DVec3::new(0.0, vertical, 0.0));
            }
        }
        println!("[motion] deactivated");
    }

    /// Advances the actor one simulation step. No-op while idle.
    pub fn tick(&mut self, actor: &mut dyn ActorHandle, now_ms: u64) {
        let Some(state) = self.state.as_mut() else { return };
        let speed = self.config.speed.max(0.0);

        if state.origin.is_none() {
            let mut origin = actor.position();
            if self.config.actuation == ActuationMode::FreeFlight {
                origin = DVec3::new(origin.x, self.config.fly_height, origin.z);
                actor.set_position(origin);
            }
            state.origin = Some(origin);
        }

        let elapsed_ms = now_ms.saturating_sub(state.phase_start_ms);
        match self.config.pattern {
            MovementPattern::StraightLine => match self.config.actuation {
                ActuationMode::Grounded => {
                    let look = actor.look_direction();
                    apply_grounded_velocity(actor, look, speed);
                }
                ActuationMode::FreeFlight => {
                    let position = actor.position();
                    actor.set_position(position + DVec3::Z * (speed * FLIGHT_STEP_SCALE));
                    if self.config.auto_rotate_camera {
                        state.yaw_deg =
                            wrap_degrees(state.yaw_deg + self.config.rotation_speed_deg_per_tick);
                        actor.set_yaw(state.yaw_deg);
                    }
                }
            },
            MovementPattern::Random => {
                if elapsed_ms >= HEADING_REDRAW_MS {
                    state.phase_start_ms = now_ms;
                    let angle = rand::thread_rng().gen_range(0.0..TAU);
                    state.heading = DVec3::new(angle.sin(), 0.0, angle.cos());
                    state.yaw_deg =
                        wrap_degrees(state.heading.x.atan2(state.heading.z).to_degrees() as f32);
                    actor.set_yaw(state.yaw_deg);
                    println!("[motion] heading changed to {:.1} deg", state.yaw_deg);
                }
                match self.config.actuation {
                    ActuationMode::Grounded => {
                        let heading = state.heading;
                        apply_grounded_velocity(actor, heading, speed);
                    }
                    ActuationMode::FreeFlight => {
                        let position = actor.position();
                        actor.set_position(position + state.heading * (speed * FLIGHT_STEP_SCALE));
                    }
                }
            }
            MovementPattern::Circular => {
                let phase = (elapsed_ms % ORBIT_PERIOD_MS) as f64 / ORBIT_PERIOD_MS as f64 * TAU;
                match self.config.actuation {
                    ActuationMode::Grounded => {
                        state.yaw_deg = wrap_degrees(phase.to_degrees() as f32);
                        actor.set_yaw(state.yaw_deg);
                        let look = actor.look_direction();
                        apply_grounded_velocity(actor, look, speed);
                    }
                    ActuationMode::FreeFlight => {
                        let Some(origin) = state.origin else { return };
                        let radius = ORBIT_RADIUS_PER_SPEED * speed;
                        let offset = DVec3::new(phase.sin() * radius, 0.0, phase.cos() * radius);
                        actor.set_position(origin + offset);
                        // Face the orbit center, tilted down at the scene.
                        state.yaw_deg = wrap_degrees(phase.to_degrees() as f32 + 180.0);
                        actor.set_yaw(state.yaw_deg);
                        actor.set_pitch(ORBIT_PITCH_DEG);
                    }
                }
            }
        }
    }
}

/// Writes a horizontal velocity along `direction`, normalized before scaling
/// so speed never drifts with the look vector's tilt. Vertical velocity is
/// preserved to leave jumps and falls undisturbed.
fn apply_grounded_velocity(actor: &mut dyn ActorHandle, direction: DVec3, speed: f64) {
    let horizontal = DVec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
    let movement = horizontal * (speed * GROUNDED_SPEED_SCALE);
    let vertical = actor.velocity().y;
    actor.set_velocity(DVec3::new(movement.x, vertical, movement.z));
}
