use crate::error::HarnessError;
use glam::DVec3;
use std::sync::{Arc, Mutex};

/// Simulation-thread surface of the controllable actor, consumed by the motion
/// controller. Narrow by intent so hosts can adapt whatever avatar or camera
/// rig they expose without leaking internals.
pub trait ActorHandle {
    fn position(&self) -> DVec3;
    fn set_position(&mut self, position: DVec3);
    fn velocity(&self) -> DVec3;
    fn set_velocity(&mut self, velocity: DVec3);
    /// Horizontal facing angle in degrees, `[0, 360)`.
    fn set_yaw(&mut self, yaw_deg: f32);
    /// Vertical tilt in degrees; positive tilts the view downward.
    fn set_pitch(&mut self, pitch_deg: f32);
    /// Unit vector the actor is facing. Yaw convention: `(sin yaw, 0, cos yaw)`
    /// at zero pitch.
    fn look_direction(&self) -> DVec3;
    /// Host-reported instantaneous frame rate; zero or negative while unknown.
    fn current_fps(&self) -> f64;
}

/// Thread-safe read view of the actor used by the metrics sampler, which runs
/// off the simulation thread.
pub trait ActorProbe: Send + Sync {
    /// Current actor position, or `None` while the actor is unavailable
    /// (loading screen, respawn). A `None` skips the sample, it is not an error.
    fn position(&self) -> Option<DVec3>;

    /// Configured view distance, in regions.
    fn view_distance(&self) -> u32;

    /// Host-reported count of loaded regions. Hosts without that introspection
    /// leave the default; callers fall back to [`loaded_region_estimate`].
    fn loaded_region_count(&self) -> Result<u32, HarnessError> {
        Err(HarnessError::CapabilityProbe { what: "loaded region count" })
    }
}

/// Analytic estimate of the loaded-region count: the square of loaded regions
/// around the actor at the configured view distance.
pub fn loaded_region_estimate(view_distance: u32) -> u32 {
    let side = 2 * view_distance + 1;
    side * side
}

#[derive(Debug)]
struct SimActorState {
    position: DVec3,
    velocity: DVec3,
    yaw_deg: f32,
    pitch_deg: f32,
    fps: f64,
    view_distance: u32,
    available: bool,
}

/// In-memory actor over shared state: the same core backs the `&mut`
/// simulation surface and the cloneable sampler-side probe. Integration tests
/// drive it directly; embedders can use it as a wiring template for their own
/// adapters.
#[derive(Clone)]
pub struct SimActor {
    state: Arc<Mutex<SimActorState>>,
}

impl SimActor {
    pub fn new(position: DVec3) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimActorState {
                position,
                velocity: DVec3::ZERO,
                yaw_deg: 0.0,
                pitch_deg: 0.0,
                fps: 0.0,
                view_distance: 12,
                available: true,
            })),
        }
    }

    /// Sampler-side view sharing this actor's state.
    pub fn probe(&self) -> Arc<dyn ActorProbe> {
        Arc::new(SimActorProbe { state: Arc::clone(&self.state) })
    }

    pub fn set_fps(&self, fps: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.fps = fps;
        }
    }

    pub fn set_view_distance(&self, view_distance: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.view_distance = view_distance;
        }
    }

    /// Marks the actor present or absent, as a host would during level loads.
    pub fn set_available(&self, available: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.available = available;
        }
    }

    pub fn yaw(&self) -> f32 {
        self.state.lock().map(|state| state.yaw_deg).unwrap_or(0.0)
    }

    pub fn pitch(&self) -> f32 {
        self.state.lock().map(|state| state.pitch_deg).unwrap_or(0.0)
    }
}

impl ActorHandle for SimActor {
    fn position(&self) -> DVec3 {
        self.state.lock().map(|state| state.position).unwrap_or(DVec3::ZERO)
    }

    fn set_position(&mut self, position: DVec3) {
        if let Ok(mut state) = self.state.lock() {
            state.position = position;
        }
    }

    fn velocity(&self) -> DVec3 {
        self.state.lock().map(|state| state.velocity).unwrap_or(DVec3::ZERO)
    }

    fn set_velocity(&mut self, velocity: DVec3) {
        if let Ok(mut state) = self.state.lock() {
            state.velocity = velocity;
        }
    }

    fn set_yaw(&mut self, yaw_deg: f32) {
        if let Ok(mut state) = self.state.lock() {
            state.yaw_deg = yaw_deg;
        }
    }

    fn set_pitch(&mut self, pitch_deg: f32) {
        if let Ok(mut state) = self.state.lock() {
            state.pitch_deg = pitch_deg;
        }
    }

    fn look_direction(&self) -> DVec3 {
        let (yaw_deg, pitch_deg) = match self.state.lock() {
            Ok(state) => (state.yaw_deg, state.pitch_deg),
            Err(_) => (0.0, 0.0),
        };
        let yaw = f64::from(yaw_deg).to_radians();
        let pitch = f64::from(pitch_deg).to_radians();
        DVec3::new(yaw.sin() * pitch.cos(), -pitch.sin(), yaw.cos() * pitch.cos())
    }

    fn current_fps(&self) -> f64 {
        self.state.lock().map(|state| state.fps).unwrap_or(0.0)
    }
}

struct SimActorProbe {
    state: Arc<Mutex<SimActorState>>,
}

impl ActorProbe for SimActorProbe {
    fn position(&self) -> Option<DVec3> {
        let state = self.state.lock().ok()?;
        state.available.then_some(state.position)
    }

    fn view_distance(&self) -> u32 {
        self.state.lock().map(|state| state.view_distance).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_estimate_squares_the_loaded_span() {
        assert_eq!(loaded_region_estimate(0), 1);
        assert_eq!(loaded_region_estimate(8), 289);
        assert_eq!(loaded_region_estimate(12), 625);
    }

    #[test]
    fn look_direction_follows_yaw_convention() {
        let mut actor = SimActor::new(DVec3::ZERO);
        actor.set_yaw(0.0);
        let forward = actor.look_direction();
        assert!((forward.x).abs() < 1e-9 && (forward.z - 1.0).abs() < 1e-9);

        actor.set_yaw(90.0);
        let east = actor.look_direction();
        assert!((east.x - 1.0).abs() < 1e-9 && east.z.abs() < 1e-9);
    }

    #[test]
    fn pitched_look_direction_stays_unit_length() {
        let mut actor = SimActor::new(DVec3::ZERO);
        actor.set_yaw(37.0);
        actor.set_pitch(25.0);
        let look = actor.look_direction();
        assert!((look.length() - 1.0).abs() < 1e-9);
        assert!(look.y < 0.0, "positive pitch tilts the view down");
    }

    #[test]
    fn probe_reports_none_while_unavailable() {
        let actor = SimActor::new(DVec3::new(1.0, 2.0, 3.0));
        let probe = actor.probe();
        assert_eq!(probe.position(), Some(DVec3::new(1.0, 2.0, 3.0)));
        actor.set_available(false);
        assert_eq!(probe.position(), None);
        assert!(matches!(
            probe.loaded_region_count(),
            Err(HarnessError::CapabilityProbe { .. })
        ));
    }
}
