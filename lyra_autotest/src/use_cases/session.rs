use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::domain::{AutomationDriver, By, EntityId, RemoteEntity};
use crate::frameworks::config::AutotestConfig;

// Poll interval used when waiting for a named object to appear.
pub const WAIT_FOR_OBJECT_POLL: Duration = Duration::from_millis(500);

/// Rate limit for chatty diagnostics inside polling loops.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True at most once per interval; the first call always passes.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Throttles {
    pub candidates: LogThrottle,
    pub raw_elements: LogThrottle,
    pub controller_pawn: LogThrottle,
}

impl Default for Throttles {
    fn default() -> Self {
        Self {
            candidates: LogThrottle::new(Duration::from_secs(1)),
            raw_elements: LogThrottle::new(Duration::from_secs(1)),
            controller_pawn: LogThrottle::new(Duration::from_secs(2)),
        }
    }
}

/// Per-run context threaded through every use case: the driver, the
/// configuration and the handles cached between calls. Caches are dropped and
/// re-resolved as soon as a lookup against them fails.
pub struct Session<D> {
    pub(crate) driver: D,
    pub(crate) config: Arc<AutotestConfig>,
    pub(crate) controller: Option<RemoteEntity>,
    pub(crate) subsystem: Option<RemoteEntity>,
    pub(crate) aim_frames: u64,
    pub(crate) look_input_fallback_logged: bool,
    pub(crate) throttles: Throttles,
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    pub fn new(driver: D, config: Arc<AutotestConfig>) -> Self {
        Self {
            driver,
            config,
            controller: None,
            subsystem: None,
            aim_frames: 0,
            look_input_fallback_logged: false,
            throttles: Throttles::default(),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &AutotestConfig {
        &self.config
    }

    pub fn aim_frames(&self) -> u64 {
        self.aim_frames
    }

    /// Forgets everything cached by the previous scenario.
    pub fn reset(&mut self) {
        self.controller = None;
        self.subsystem = None;
        self.aim_frames = 0;
        self.look_input_fallback_logged = false;
        self.throttles = Throttles::default();
    }

    pub(crate) async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            sleep(duration).await;
        }
    }

    // Lookup helpers. A failed query reads as "nothing found"; callers retry.

    pub(crate) async fn all_elements(&self, enabled: bool) -> Vec<RemoteEntity> {
        match self.driver.all_elements(enabled).await {
            Ok(list) => list,
            Err(err) => {
                debug!(enabled, error = %err, "all_elements failed");
                Vec::new()
            }
        }
    }

    pub(crate) async fn find_all_named(&self, name: &str, enabled: bool) -> Vec<RemoteEntity> {
        self.driver
            .find_objects(By::Name, name, enabled)
            .await
            .unwrap_or_default()
    }

    pub(crate) async fn find_all_containing(&self, name: &str, enabled: bool) -> Vec<RemoteEntity> {
        match self
            .driver
            .find_objects_containing(By::Name, name, enabled)
            .await
        {
            Ok(list) => list,
            Err(err) => {
                debug!(name, enabled, error = %err, "find_objects_containing failed");
                Vec::new()
            }
        }
    }

    pub(crate) async fn find_named(&self, name: &str, enabled: bool) -> Option<RemoteEntity> {
        self.driver
            .find_object(By::Name, name, enabled)
            .await
            .ok()
            .flatten()
    }

    pub(crate) async fn find_containing(&self, name: &str, enabled: bool) -> Option<RemoteEntity> {
        self.driver
            .find_object_containing(By::Name, name, enabled)
            .await
            .ok()
            .flatten()
    }

    /// Exact name first, then substring; enabled objects before disabled ones
    /// when `enabled_first` is set.
    pub(crate) async fn find_by_any_name(
        &self,
        names: &[String],
        enabled_first: bool,
    ) -> Option<RemoteEntity> {
        let passes = if enabled_first {
            [true, false]
        } else {
            [false, true]
        };
        for name in names {
            for enabled in passes {
                if let Some(found) = self.find_named(name, enabled).await {
                    return Some(found);
                }
                if let Some(found) = self.find_containing(name, enabled).await {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Live object by id, checking enabled objects first.
    pub async fn entity_by_id(&self, id: EntityId) -> Option<RemoteEntity> {
        self.lookup_id(id, [true, false]).await
    }

    /// Live object by id, checking disabled objects first. Ids returned by
    /// remote calls are resolved this way.
    pub async fn resolve_id(&self, id: EntityId) -> Option<RemoteEntity> {
        self.lookup_id(id, [false, true]).await
    }

    async fn lookup_id(&self, id: EntityId, passes: [bool; 2]) -> Option<RemoteEntity> {
        if id == 0 {
            return None;
        }
        for enabled in passes {
            if let Ok(Some(found)) = self.driver.find_by_id(id, enabled).await {
                return Some(found);
            }
        }
        None
    }

    /// Polls for an object with exactly this name until `timeout`.
    pub(crate) async fn wait_for_object(
        &self,
        name: &str,
        timeout: Duration,
        enabled: bool,
    ) -> Option<RemoteEntity> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.find_named(name, enabled).await {
                return Some(found);
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(WAIT_FOR_OBJECT_POLL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn throttle_passes_once_per_interval() {
        let mut throttle = LogThrottle::new(Duration::from_secs(2));
        assert!(throttle.ready());
        assert!(!throttle.ready());
        sleep(Duration::from_millis(1500)).await;
        assert!(!throttle.ready());
        sleep(Duration::from_millis(600)).await;
        assert!(throttle.ready());
    }
}
