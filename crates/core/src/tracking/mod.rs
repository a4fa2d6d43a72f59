//! Position animation along a route.
//!
//! Interpolates a marker along a driving path over a target duration,
//! publishing `{coordinate, heading}` on a fixed tick. Externally reported
//! live positions override the simulated output immediately; the simulation
//! keeps ticking underneath as the fallback for when live data goes quiet.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use geo::Point;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::warn;

use crate::geometry;
use crate::routing::Route;

/// Simulated marker update cadence.
pub const TICK_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerPosition {
    pub coordinate: Point,
    /// Degrees clockwise from north, in [0, 360).
    pub heading: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationState {
    Idle,
    Running,
    Completed,
    Stopped,
}

pub struct MarkerAnimator {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    state: Mutex<AnimationState>,
    live: Mutex<Option<MarkerPosition>>,
    simulated: Mutex<Option<MarkerPosition>>,
    output: watch::Sender<Option<MarkerPosition>>,
}

impl Shared {
    fn set_state(&self, state: AnimationState) {
        *self.state.lock().unwrap() = state;
    }

    fn publish_simulated(&self, position: MarkerPosition) {
        *self.simulated.lock().unwrap() = Some(position);
        // Live fixes win; the simulation only shows through without one.
        if self.live.lock().unwrap().is_none() {
            self.output.send_replace(Some(position));
        }
    }
}

impl MarkerAnimator {
    pub fn new() -> Self {
        let (output, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(AnimationState::Idle),
                live: Mutex::new(None),
                simulated: Mutex::new(None),
                output,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> AnimationState {
        *self.shared.state.lock().unwrap()
    }

    /// Latest published position, live or simulated.
    pub fn position(&self) -> Option<MarkerPosition> {
        *self.shared.output.borrow()
    }

    /// Watch the marker; the map reads this on each render tick.
    pub fn subscribe(&self) -> watch::Receiver<Option<MarkerPosition>> {
        self.shared.output.subscribe()
    }

    /// Begin animating `route` over `total_duration`, restarting from time
    /// zero if already running. A route with fewer than two usable points
    /// is refused and the engine goes idle.
    pub fn start(&self, route: Arc<Route>, total_duration: Duration) {
        self.cancel_task();

        if !route.is_drivable() {
            warn!(points = route.coordinates.len(), "refusing to animate an undrivable route");
            self.shared.set_state(AnimationState::Idle);
            return;
        }

        *self.shared.simulated.lock().unwrap() = None;
        self.shared.set_state(AnimationState::Running);

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = time::interval(TICK_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let segments = route.segment_count();
            loop {
                ticker.tick().await;

                let ratio = if total_duration.is_zero() {
                    1.0
                } else {
                    (started.elapsed().as_secs_f64() / total_duration.as_secs_f64()).clamp(0.0, 1.0)
                };

                let segment_progress = ratio * segments as f64;
                let segment_index = segment_progress.floor() as usize;

                if segment_index >= segments {
                    // Snap to the end exactly once, then stop ticking.
                    let last = route.coordinates[route.coordinates.len() - 1];
                    let prev = route.coordinates[route.coordinates.len() - 2];
                    shared.publish_simulated(MarkerPosition {
                        coordinate: last,
                        heading: geometry::bearing_deg(prev, last),
                    });
                    shared.set_state(AnimationState::Completed);
                    break;
                }

                let from = route.coordinates[segment_index];
                let to = route.coordinates[segment_index + 1];
                shared.publish_simulated(MarkerPosition {
                    coordinate: geometry::lerp(from, to, segment_progress - segment_index as f64),
                    heading: geometry::bearing_deg(from, to),
                });
            }
        });

        *self.task.lock().unwrap() = Some(handle);
    }

    /// Cancel the pending tick. Idempotent; no simulated update is emitted
    /// after this returns.
    pub fn stop(&self) {
        self.cancel_task();

        let mut state = self.shared.state.lock().unwrap();
        if *state == AnimationState::Running {
            *state = AnimationState::Stopped;
        }
    }

    /// Publish a position reported by the real responder. Takes precedence
    /// over the simulation immediately; the timer keeps running so the
    /// simulation can take back over if live data stops.
    pub fn report_live_position(&self, position: MarkerPosition) {
        if !geometry::is_usable(position.coordinate) || !position.heading.is_finite() {
            return;
        }
        let position = MarkerPosition {
            coordinate: position.coordinate,
            heading: position.heading.rem_euclid(360.0),
        };

        *self.shared.live.lock().unwrap() = Some(position);
        self.shared.output.send_replace(Some(position));
    }

    /// Forget the live fix and fall back to the simulated marker.
    pub fn clear_live_position(&self) {
        *self.shared.live.lock().unwrap() = None;
        let simulated = *self.shared.simulated.lock().unwrap();
        self.shared.output.send_replace(simulated);
    }

    fn cancel_task(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl Default for MarkerAnimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MarkerAnimator {
    fn drop(&mut self) {
        self.cancel_task();
    }
}
