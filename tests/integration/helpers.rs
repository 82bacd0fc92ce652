//! Shared helpers for integration tests.

use pomo::actor::sim::{Grid, SimAnimator, SimDialogue, SimNavigator};
use pomo::actor::{ActorContext, Point};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Simulated collaborators, kept alongside the context that shares them.
pub(crate) struct SimRig {
    pub(crate) ctx: ActorContext,
    pub(crate) navigator: Arc<SimNavigator>,
    pub(crate) animator: Arc<SimAnimator>,
    pub(crate) dialogue: Arc<SimDialogue>,
}

/// A 20x20 open field with the actor at `start`, walking 2 units per second.
pub(crate) fn sim_rig(start: Point) -> SimRig {
    let navigator = Arc::new(SimNavigator::new(Grid::new(20, 20), start, 2.0));
    let animator = Arc::new(SimAnimator::new());
    let dialogue = Arc::new(SimDialogue::new());
    let ctx = ActorContext::new(navigator.clone(), animator.clone(), dialogue.clone());
    SimRig {
        ctx,
        navigator,
        animator,
        dialogue,
    }
}

/// Drain all pending events from the broadcast receiver into a Vec.
pub(crate) fn drain_events<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}

/// Let virtual time run forward.
pub(crate) async fn run_for(duration: Duration) {
    tokio::time::sleep(duration).await;
}
