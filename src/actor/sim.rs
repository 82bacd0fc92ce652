//! Headless stand-ins for the engine collaborators.
//!
//! Used by the `pomo-sim` binary and by tests. The navigator walks in a
//! straight line across a tile grid at a fixed speed, measuring elapsed time
//! on tokio's clock so paused-time tests stay deterministic. The animator and
//! dialogue display record what they were told and log it at `trace`.

use super::{AnimationTrigger, Animator, DialogueDisplay, Navigator, PathStatus, Point};
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Rectangular field of unit tiles, some of which are blocked.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    blocked: HashSet<(i32, i32)>,
}

impl Grid {
    /// A fully walkable `width` x `height` field anchored at the origin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            blocked: HashSet::new(),
        }
    }

    /// Mark a tile as occupied (a crop bed, a fence).
    pub fn block(mut self, x: i32, y: i32) -> Self {
        self.blocked.insert((x, y));
        self
    }

    /// Whether the tile containing `point` can be stood on.
    pub fn is_walkable(&self, point: Point) -> bool {
        if !point.x.is_finite() || !point.y.is_finite() {
            return false;
        }
        let tile = (point.x.floor() as i32, point.y.floor() as i32);
        tile.0 >= 0
            && tile.1 >= 0
            && (tile.0 as u32) < self.width
            && (tile.1 as u32) < self.height
            && !self.blocked.contains(&tile)
    }
}

#[derive(Debug)]
struct Leg {
    to: Point,
    started: Instant,
}

#[derive(Debug)]
struct NavState {
    origin: Point,
    leg: Option<Leg>,
}

/// Straight-line navigator over a [`Grid`].
#[derive(Debug)]
pub struct SimNavigator {
    grid: Grid,
    speed: f32,
    stopping_distance: f32,
    state: Mutex<NavState>,
}

impl SimNavigator {
    /// Place an agent at `start` moving at `speed` units per second.
    pub fn new(grid: Grid, start: Point, speed: f32) -> Self {
        Self {
            grid,
            speed: speed.max(f32::EPSILON),
            stopping_distance: 0.05,
            state: Mutex::new(NavState {
                origin: start,
                leg: None,
            }),
        }
    }

    /// The field this agent walks on.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    fn progress(&self, state: &NavState) -> (Point, f32) {
        match &state.leg {
            Some(leg) => {
                let total = state.origin.distance(leg.to);
                let travelled = (self.speed * leg.started.elapsed().as_secs_f32()).min(total);
                let dir = (leg.to - state.origin).normalized();
                (state.origin + dir * travelled, total - travelled)
            }
            None => (state.origin, 0.0),
        }
    }
}

impl Navigator for SimNavigator {
    fn calculate_path(&self, destination: Point) -> PathStatus {
        if self.grid.is_walkable(destination) {
            PathStatus::Complete
        } else {
            PathStatus::Invalid
        }
    }

    fn set_destination(&self, destination: Point) {
        if self.calculate_path(destination) != PathStatus::Complete {
            trace!(?destination, "ignoring unreachable destination");
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (here, _) = self.progress(&state);
        state.origin = here;
        state.leg = Some(Leg {
            to: destination,
            started: Instant::now(),
        });
    }

    fn reset_path(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (here, _) = self.progress(&state);
        state.origin = here;
        state.leg = None;
    }

    fn position(&self) -> Point {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.progress(&state).0
    }

    fn remaining_distance(&self) -> f32 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.progress(&state).1
    }

    fn stopping_distance(&self) -> f32 {
        self.stopping_distance
    }

    fn path_pending(&self) -> bool {
        false
    }

    fn has_path(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.leg.is_some()
    }

    fn velocity(&self) -> Point {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &state.leg {
            Some(leg) if self.progress(&state).1 > 0.0 => {
                (leg.to - state.origin).normalized() * self.speed
            }
            _ => Point::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct AnimatorState {
    moving: bool,
    axes: (f32, f32),
    triggers: Vec<AnimationTrigger>,
}

/// Animator that remembers the parameters it was given.
#[derive(Debug, Default)]
pub struct SimAnimator {
    state: Mutex<AnimatorState>,
}

impl SimAnimator {
    /// Create an animator at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current "is moving" flag.
    pub fn is_moving(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).moving
    }

    /// Last movement-axis values.
    pub fn axes(&self) -> (f32, f32) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).axes
    }

    /// Every trigger fired so far, oldest first.
    pub fn triggers(&self) -> Vec<AnimationTrigger> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .triggers
            .clone()
    }
}

impl Animator for SimAnimator {
    fn set_moving(&self, moving: bool) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).moving = moving;
    }

    fn set_axes(&self, x: f32, y: f32) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).axes = (x, y);
    }

    fn trigger(&self, trigger: AnimationTrigger) {
        trace!(?trigger, "animation trigger");
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .triggers
            .push(trigger);
    }
}

#[derive(Debug, Default)]
struct BubbleState {
    visible: bool,
    text: String,
    shown: usize,
}

/// Dialogue bubble that keeps its text in memory.
#[derive(Debug, Default)]
pub struct SimDialogue {
    state: Mutex<BubbleState>,
}

impl SimDialogue {
    /// Create a hidden, empty bubble.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the container is open.
    pub fn is_visible(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).visible
    }

    /// Currently displayed text.
    pub fn text(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .text
            .clone()
    }

    /// How many times the container has been opened.
    pub fn times_shown(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).shown
    }
}

impl DialogueDisplay for SimDialogue {
    fn show(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.visible = true;
        state.shown += 1;
    }

    fn hide(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.visible && !state.text.is_empty() {
            trace!(text = %state.text, "dialogue closed");
        }
        state.visible = false;
    }

    fn append(&self, text: &str) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .text
            .push_str(text);
    }

    fn clear(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .text
            .clear();
    }
}
