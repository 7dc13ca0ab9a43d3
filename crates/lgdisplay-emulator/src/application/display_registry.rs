//! DisplayRegistry: owns every emulated display.
//!
//! The registry is the only component that touches a [`Display`].  Every
//! operation takes the write lock, runs one state-machine method, and on
//! success moves the display's queued events onto the [`EventBus`].
//!
//! # Error policy
//!
//! Real displays silently ignore out-of-sequence commands, and so does the
//! registry: unknown ids, illegal transitions, and redundant input changes
//! are logged at `warn` and reported to the caller only as `false`.
//!
//! # Event ordering
//!
//! Events are handed to the bus before the write lock is released, so two
//! concurrent operations on the same display publish in the order they were
//! applied.  Handing over only enqueues; subscriber callbacks run on their
//! own tasks and never hold the lock.
//!
//! # Restart completion
//!
//! A restarting display comes back on by itself once its reboot duration has
//! elapsed.  [`run_sweep`] polls for that on a fixed interval and completes
//! each due restart under its own short lock acquisition.

use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use lgdisplay_core::{
    Display, DisplayError, DisplayId, DisplaySnapshot, InputSource, REBOOT_DURATION,
};

use crate::application::event_bus::EventBus;

/// Registry operations used by the two client-facing producers (the control
/// port and the dashboard hub).
///
/// Mutating methods return `true` when the display accepted the operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisplayService: Send + Sync {
    /// Adds a display and returns its id.
    async fn create_display(&self) -> DisplayId;
    async fn power_on(&self, id: DisplayId) -> bool;
    async fn power_off(&self, id: DisplayId) -> bool;
    async fn restart(&self, id: DisplayId) -> bool;
    async fn set_input(&self, id: DisplayId, input: InputSource) -> bool;
    async fn get_display(&self, id: DisplayId) -> Option<DisplaySnapshot>;
    /// All displays, ordered by id.
    async fn list_displays(&self) -> Vec<DisplaySnapshot>;
}

/// In-memory collection of displays behind a single read/write lock.
pub struct DisplayRegistry {
    displays: RwLock<BTreeMap<DisplayId, Display>>,
    bus: Arc<EventBus>,
    reboot_duration: Duration,
}

impl DisplayRegistry {
    /// Creates an empty registry publishing on `bus`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_reboot_duration(bus, REBOOT_DURATION)
    }

    /// Creates an empty registry whose displays take `reboot_duration` to
    /// restart.
    pub fn with_reboot_duration(bus: Arc<EventBus>, reboot_duration: Duration) -> Self {
        Self {
            displays: RwLock::new(BTreeMap::new()),
            bus,
            reboot_duration,
        }
    }

    /// Adds a powered-off display under the smallest unused positive id.
    pub async fn create_display(&self) -> DisplayId {
        let mut displays = self.displays.write().await;
        let id = smallest_unused_id(&displays);
        let mut new_display = Display::with_reboot_duration(id, self.reboot_duration);
        info!("created display {id} (serial {})", new_display.serial());
        self.publish_events(&mut new_display);
        displays.insert(id, new_display);
        id
    }

    pub async fn power_on_display(&self, id: DisplayId) -> bool {
        self.apply(id, "power on", Display::power_on).await
    }

    pub async fn power_off_display(&self, id: DisplayId) -> bool {
        self.apply(id, "power off", Display::power_off).await
    }

    pub async fn restart_display(&self, id: DisplayId) -> bool {
        self.apply(id, "restart", Display::restart).await
    }

    pub async fn set_display_input(&self, id: DisplayId, input: InputSource) -> bool {
        self.apply(id, "set input", |display| display.set_input(input))
            .await
    }

    pub async fn get_display(&self, id: DisplayId) -> Option<DisplaySnapshot> {
        self.displays.read().await.get(&id).map(Display::snapshot)
    }

    pub async fn list_displays(&self) -> Vec<DisplaySnapshot> {
        self.displays
            .read()
            .await
            .values()
            .map(Display::snapshot)
            .collect()
    }

    /// Turns every display whose restart has finished back on.
    ///
    /// Returns the number of displays completed.  Each completion takes the
    /// write lock on its own, so a long sweep never starves other callers.
    pub async fn complete_restarts(&self) -> usize {
        let due: Vec<DisplayId> = self
            .displays
            .read()
            .await
            .values()
            .filter(|display| display.restart_finished())
            .map(Display::id)
            .collect();

        let mut completed = 0;
        for id in due {
            let mut displays = self.displays.write().await;
            let Some(restarting) = displays.get_mut(&id) else {
                continue;
            };
            // Re-check: the state may have moved since the read lock was dropped.
            if !restarting.restart_finished() {
                continue;
            }
            match restarting.power_on_after_restart() {
                Ok(()) => {
                    info!("display {id} finished restarting");
                    self.publish_events(restarting);
                    completed += 1;
                }
                Err(e) => warn!("display {id}: {e}"),
            }
        }
        completed
    }

    /// Runs one state-machine operation on display `id`.
    async fn apply<F>(&self, id: DisplayId, action: &str, op: F) -> bool
    where
        F: FnOnce(&mut Display) -> Result<(), DisplayError>,
    {
        let mut displays = self.displays.write().await;
        let Some(target) = displays.get_mut(&id) else {
            warn!("{action}: display {id} not found");
            return false;
        };
        match op(target) {
            Ok(()) => {
                debug!(
                    "display {id}: {action} applied (power={}, input={})",
                    target.power(),
                    target.input()
                );
                self.publish_events(target);
                true
            }
            Err(e) => {
                warn!("display {id}: {e}");
                false
            }
        }
    }

    fn publish_events(&self, display: &mut Display) {
        for event in display.take_events() {
            self.bus.publish(event);
        }
    }
}

#[async_trait]
impl DisplayService for DisplayRegistry {
    async fn create_display(&self) -> DisplayId {
        DisplayRegistry::create_display(self).await
    }

    async fn power_on(&self, id: DisplayId) -> bool {
        self.power_on_display(id).await
    }

    async fn power_off(&self, id: DisplayId) -> bool {
        self.power_off_display(id).await
    }

    async fn restart(&self, id: DisplayId) -> bool {
        self.restart_display(id).await
    }

    async fn set_input(&self, id: DisplayId, input: InputSource) -> bool {
        self.set_display_input(id, input).await
    }

    async fn get_display(&self, id: DisplayId) -> Option<DisplaySnapshot> {
        DisplayRegistry::get_display(self, id).await
    }

    async fn list_displays(&self) -> Vec<DisplaySnapshot> {
        DisplayRegistry::list_displays(self).await
    }
}

/// Completes due restarts every `period` until `running` is cleared.
///
/// Ticks that fall behind are delayed rather than bunched up, so a stalled
/// runtime never produces a burst of back-to-back sweeps.
///
/// # Parameters
///
/// - `registry` – Registry whose restarting displays are checked.
/// - `period`   – Time between sweeps; must be non-zero.
/// - `running`  – Shared flag; the sweep exits when this is set to `false`.
pub async fn run_sweep(registry: Arc<DisplayRegistry>, period: Duration, running: Arc<AtomicBool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("restart sweep running every {period:?}");

    loop {
        ticker.tick().await;
        if !running.load(Ordering::Relaxed) {
            debug!("shutdown flag set; stopping restart sweep");
            break;
        }
        let completed = registry.complete_restarts().await;
        if completed > 0 {
            debug!("sweep completed {completed} restart(s)");
        }
    }
}

/// Smallest positive id not present in `displays`.
fn smallest_unused_id<V>(displays: &BTreeMap<DisplayId, V>) -> DisplayId {
    let mut candidate = 1;
    for &id in displays.keys() {
        if id == candidate {
            candidate += 1;
        } else if id > candidate {
            break;
        }
    }
    candidate
}

// ── Tests ─────────────────────────────────────────────────────────────────────
