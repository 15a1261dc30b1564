//! Clock ticker task.

use crate::manager::SessionSlot;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, trace, warn};

/// Spawns a task charging one second to the running clock every `period`.
///
/// The period restarts whenever the running clock changes hands, so a side
/// is first charged a full period after its turn began. The task holds only
/// a weak reference to the slot and exits when the slot is gone or the
/// session leaves InProgress. Returns `None` outside a Tokio runtime.
pub(crate) fn spawn(slot: &Arc<SessionSlot>, period: Duration) -> Option<AbortHandle> {
    let Ok(handle) = Handle::try_current() else {
        warn!("No Tokio runtime, session clock will not run");
        return None;
    };
    let weak = Arc::downgrade(slot);
    let turn_changed = slot.turn_changed();

    let task = handle.spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                biased;
                _ = turn_changed.notified() => {
                    trace!("Turn changed, restarting clock period");
                    interval.reset();
                    continue;
                }
                _ = interval.tick() => {}
            }
            let Some(slot) = weak.upgrade() else {
                break;
            };
            if !slot.tick() {
                break;
            }
        }
        debug!("Clock ticker exited");
    });
    Some(task.abort_handle())
}
