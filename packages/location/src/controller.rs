//! The location capture controller and its state machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use pollution_map_geo_models::{
    Coordinate, FixConfidence, LocationFix, PRECISE_ZOOM, SelectedPin, ViewportState,
};

use crate::{FLY_DURATION, GeolocationProvider, MapEvent, PositionError, PositionOptions};

/// Where the controller is on the locate axis.
///
/// Pin selection is orthogonal to this: a pin may be selected in any of
/// these phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatePhase {
    /// No fix requested yet; default viewport shown.
    Idle,
    /// A geolocation request is in flight.
    Locating,
    /// A fix was applied to the viewport.
    Located,
    /// The last request failed; viewport reverted to default.
    LocationFailed,
}

/// How the renderer should move the viewport to its new state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportTransition {
    /// Animate over the given duration.
    Fly {
        /// Animation duration.
        duration: Duration,
    },
    /// Snap instantly.
    Jump,
}

/// Outcome of a geolocation request, delivered asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationUpdate {
    /// A fix was applied to the viewport.
    Applied {
        /// The updated viewport.
        viewport: ViewportState,
        /// Non-blocking imprecision warning, when the fix accuracy was
        /// worse than the threshold.
        warning: Option<String>,
        /// Fly-to animation for the renderer.
        transition: ViewportTransition,
    },
    /// The request failed; the viewport was reverted to the default.
    Failed {
        /// Why the request failed.
        error: PositionError,
        /// Dismissible message for the user.
        message: String,
        /// The reverted viewport.
        viewport: ViewportState,
    },
    /// A newer request (or re-center) superseded this one, or the
    /// controller was detached before it resolved. Nothing was mutated.
    Stale,
}

struct Inner {
    viewport: ViewportState,
    pin: Option<SelectedPin>,
    phase: LocatePhase,
}

/// Owns the viewport and selected pin, and serializes geolocation fixes
/// onto them by request identity (last-issued request wins).
pub struct LocationController {
    provider: Arc<dyn GeolocationProvider>,
    inner: Mutex<Inner>,
    /// Sequence number of the most recently issued viewport-mutating
    /// request. Completions carrying an older number are discarded.
    latest_seq: AtomicU64,
    /// Cleared on teardown; late completions then become no-ops.
    attached: AtomicBool,
}

impl LocationController {
    /// Creates a controller showing the default viewport.
    #[must_use]
    pub fn new(provider: Arc<dyn GeolocationProvider>) -> Self {
        Self {
            provider,
            inner: Mutex::new(Inner {
                viewport: ViewportState::default_viewport(),
                pin: None,
                phase: LocatePhase::Idle,
            }),
            latest_seq: AtomicU64::new(0),
            attached: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("location controller state poisoned")
    }

    /// Read-only snapshot of the current viewport.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn viewport(&self) -> ViewportState {
        self.lock().viewport
    }

    /// Current locate phase.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn phase(&self) -> LocatePhase {
        self.lock().phase
    }

    /// The currently selected pin, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn selected_pin(&self) -> Option<SelectedPin> {
        self.lock().pin
    }

    /// Selects a pin at the clicked coordinate.
    ///
    /// Always succeeds, is idempotent under repeated identical input, and
    /// unconditionally replaces any prior selection. Does not touch the
    /// viewport or the locate phase.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn select_pin(&self, coordinate: Coordinate) -> SelectedPin {
        let pin = SelectedPin { coordinate };
        self.lock().pin = Some(pin);
        pin
    }

    /// Clears the selected pin, on navigation away or draft confirmation.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear_pin(&self) {
        self.lock().pin = None;
    }

    /// Switches the active base layer.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_base_layer(&self, layer: pollution_map_geo_models::BaseLayer) {
        self.lock().viewport.active_base_layer = layer;
    }

    /// Re-centers the viewport on the default location.
    ///
    /// Counts as a viewport mutation, so any in-flight geolocation request
    /// becomes stale and its completion is discarded.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn recenter(&self) -> ViewportState {
        self.latest_seq.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        let layer = inner.viewport.active_base_layer;
        inner.viewport = ViewportState {
            active_base_layer: layer,
            ..ViewportState::default_viewport()
        };
        inner.phase = LocatePhase::Idle;
        inner.viewport
    }

    /// Marks the consuming view as torn down.
    ///
    /// Any geolocation completion arriving afterwards is discarded without
    /// mutating state.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    /// Handles a map surface event.
    ///
    /// A click selects a pin and returns immediately; a locate request
    /// runs a full geolocation round trip and returns its outcome.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub async fn handle_map_event(&self, event: MapEvent) -> Option<LocationUpdate> {
        match event {
            MapEvent::Click(coordinate) => {
                self.select_pin(coordinate);
                None
            }
            MapEvent::LocateRequested => Some(self.request_location().await),
        }
    }

    /// Issues one geolocation request and reconciles its result into the
    /// viewport.
    ///
    /// Never fails synchronously: an absent capability, a provider error,
    /// and a timeout all come back through the returned [`LocationUpdate`],
    /// with the viewport reverted to the default center and zoom.
    ///
    /// At most the most recently issued request is applied; see
    /// [`LocationUpdate::Stale`].
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub async fn request_location(&self) -> LocationUpdate {
        if !self.provider.supported() {
            let seq = self.latest_seq.fetch_add(1, Ordering::SeqCst) + 1;
            return self.fail(seq, PositionError::Unsupported);
        }

        let seq = self.latest_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().phase = LocatePhase::Locating;

        let result = self.provider.current_position(PositionOptions::default()).await;

        match result {
            Ok(fix) => self.apply_fix(seq, fix),
            Err(error) => self.fail(seq, error),
        }
    }

    /// Checks, under the `inner` lock, that a completion carrying `seq`
    /// may still mutate state. Staleness must be decided under the same
    /// lock as the viewport write, or a newer request (or `recenter`)
    /// could slip in between the check and the write.
    fn completion_is_current(&self, _inner: &MutexGuard<'_, Inner>, seq: u64) -> bool {
        if !self.attached.load(Ordering::SeqCst) {
            log::debug!("discarding geolocation completion after teardown");
            return false;
        }
        if seq != self.latest_seq.load(Ordering::SeqCst) {
            log::debug!("discarding stale geolocation completion (seq {seq})");
            return false;
        }
        true
    }

    fn apply_fix(&self, seq: u64, fix: LocationFix) -> LocationUpdate {
        let mut inner = self.lock();
        if !self.completion_is_current(&inner, seq) {
            return LocationUpdate::Stale;
        }
        inner.viewport.center = fix.coordinate;
        inner.viewport.zoom = PRECISE_ZOOM;
        inner.phase = LocatePhase::Located;

        let warning = match fix.confidence {
            FixConfidence::Imprecise => Some(format!(
                "Location may be imprecise (accuracy: {:.0}m)",
                fix.accuracy_meters
            )),
            FixConfidence::Precise => None,
        };

        log::info!(
            "applied geolocation fix at {} (accuracy {:.0}m)",
            fix.coordinate,
            fix.accuracy_meters
        );

        LocationUpdate::Applied {
            viewport: inner.viewport,
            warning,
            transition: ViewportTransition::Fly {
                duration: FLY_DURATION,
            },
        }
    }

    fn fail(&self, seq: u64, error: PositionError) -> LocationUpdate {
        let mut inner = self.lock();
        if !self.completion_is_current(&inner, seq) {
            return LocationUpdate::Stale;
        }
        let layer = inner.viewport.active_base_layer;
        inner.viewport = ViewportState {
            active_base_layer: layer,
            ..ViewportState::default_viewport()
        };
        inner.phase = LocatePhase::LocationFailed;

        log::warn!("geolocation request failed: {error}");

        LocationUpdate::Failed {
            error,
            message: error.user_message().to_string(),
            viewport: inner.viewport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollution_map_geo_models::BaseLayer;
    use tokio::sync::{mpsc, oneshot};

    type FixResult = Result<LocationFix, PositionError>;

    /// A provider the test drives by hand: every `current_position` call
    /// sends a oneshot back to the test and waits on it.
    struct ScriptedProvider {
        calls: mpsc::UnboundedSender<oneshot::Sender<FixResult>>,
        supported: bool,
    }

    #[async_trait::async_trait]
    impl GeolocationProvider for ScriptedProvider {
        fn supported(&self) -> bool {
            self.supported
        }

        async fn current_position(&self, _options: PositionOptions) -> FixResult {
            let (tx, rx) = oneshot::channel();
            self.calls.send(tx).expect("test dropped call receiver");
            rx.await.expect("test dropped response sender")
        }
    }

    fn scripted() -> (
        Arc<LocationController>,
        mpsc::UnboundedReceiver<oneshot::Sender<FixResult>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(ScriptedProvider {
            calls: tx,
            supported: true,
        });
        (Arc::new(LocationController::new(provider)), rx)
    }

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[tokio::test]
    async fn precise_fix_flies_to_location_without_warning() {
        let (controller, mut calls) = scripted();
        assert_eq!(controller.phase(), LocatePhase::Idle);

        let c = controller.clone();
        let task = tokio::spawn(async move { c.request_location().await });

        let respond = calls.recv().await.unwrap();
        assert_eq!(controller.phase(), LocatePhase::Locating);
        respond
            .send(Ok(LocationFix::new(coord(9.02, 38.80), 50.0)))
            .unwrap();

        let update = task.await.unwrap();
        match update {
            LocationUpdate::Applied {
                viewport,
                warning,
                transition,
            } => {
                assert_eq!(viewport.center, coord(9.02, 38.80));
                assert_eq!(viewport.zoom, PRECISE_ZOOM);
                assert!(warning.is_none());
                assert_eq!(
                    transition,
                    ViewportTransition::Fly {
                        duration: FLY_DURATION
                    }
                );
            }
            other => panic!("expected Applied, got {other:?}"),
        }
        assert_eq!(controller.phase(), LocatePhase::Located);
    }

    #[tokio::test]
    async fn imprecise_fix_still_applies_but_warns() {
        let (controller, mut calls) = scripted();

        let c = controller.clone();
        let task = tokio::spawn(async move { c.request_location().await });
        let respond = calls.recv().await.unwrap();
        respond
            .send(Ok(LocationFix::new(coord(9.02, 38.80), 1500.0)))
            .unwrap();

        match task.await.unwrap() {
            LocationUpdate::Applied { viewport, warning, .. } => {
                assert_eq!(viewport.center, coord(9.02, 38.80));
                let warning = warning.expect("1500m fix should warn");
                assert!(warning.contains("imprecise"), "{warning}");
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_reverts_to_default_viewport() {
        let (controller, mut calls) = scripted();

        let c = controller.clone();
        let task = tokio::spawn(async move { c.request_location().await });
        let respond = calls.recv().await.unwrap();
        respond.send(Err(PositionError::Timeout)).unwrap();

        match task.await.unwrap() {
            LocationUpdate::Failed {
                error,
                message,
                viewport,
            } => {
                assert_eq!(error, PositionError::Timeout);
                assert_eq!(viewport, ViewportState::default_viewport());
                assert!(message.contains("default center"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(controller.phase(), LocatePhase::LocationFailed);
    }

    #[tokio::test]
    async fn unsupported_device_fails_without_issuing_a_request() {
        let (tx, mut calls) = mpsc::unbounded_channel();
        let provider = Arc::new(ScriptedProvider {
            calls: tx,
            supported: false,
        });
        let controller = LocationController::new(provider);

        match controller.request_location().await {
            LocationUpdate::Failed { error, viewport, .. } => {
                assert_eq!(error, PositionError::Unsupported);
                assert_eq!(viewport, ViewportState::default_viewport());
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(calls.try_recv().is_err(), "no provider call expected");
    }

    #[tokio::test]
    async fn stale_completion_is_discarded() {
        let (controller, mut calls) = scripted();

        let c1 = controller.clone();
        let first = tokio::spawn(async move { c1.request_location().await });
        let respond_first = calls.recv().await.unwrap();

        let c2 = controller.clone();
        let second = tokio::spawn(async move { c2.request_location().await });
        let respond_second = calls.recv().await.unwrap();

        // The newer request resolves first and wins.
        respond_second
            .send(Ok(LocationFix::new(coord(9.10, 38.90), 30.0)))
            .unwrap();
        match second.await.unwrap() {
            LocationUpdate::Applied { viewport, .. } => {
                assert_eq!(viewport.center, coord(9.10, 38.90));
            }
            other => panic!("expected Applied, got {other:?}"),
        }

        // The older request resolves late; its fix must not be applied.
        respond_first
            .send(Ok(LocationFix::new(coord(5.00, 30.00), 30.0)))
            .unwrap();
        assert_eq!(first.await.unwrap(), LocationUpdate::Stale);
        assert_eq!(controller.viewport().center, coord(9.10, 38.90));
    }

    #[tokio::test]
    async fn recenter_supersedes_an_in_flight_request() {
        let (controller, mut calls) = scripted();

        let c = controller.clone();
        let task = tokio::spawn(async move { c.request_location().await });
        let respond = calls.recv().await.unwrap();

        controller.recenter();
        respond
            .send(Ok(LocationFix::new(coord(9.10, 38.90), 30.0)))
            .unwrap();

        assert_eq!(task.await.unwrap(), LocationUpdate::Stale);
        assert_eq!(controller.viewport(), ViewportState::default_viewport());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn recenter_racing_a_resolving_fix_never_keeps_the_stale_fix() {
        // Whichever order the fix completion and the recenter interleave,
        // the recenter is issued later and must win: either the fix lands
        // first and the recenter resets it, or the fix is discarded as
        // stale. The viewport always ends at the default.
        for _ in 0..500 {
            let (controller, mut calls) = scripted();

            let c = controller.clone();
            let request = tokio::spawn(async move { c.request_location().await });
            let respond = calls.recv().await.unwrap();

            let c = controller.clone();
            let recenter = tokio::spawn(async move { c.recenter() });
            respond
                .send(Ok(LocationFix::new(coord(9.10, 38.90), 30.0)))
                .unwrap();

            let update = request.await.unwrap();
            recenter.await.unwrap();

            if update != LocationUpdate::Stale {
                assert!(matches!(update, LocationUpdate::Applied { .. }));
            }
            assert_eq!(controller.viewport(), ViewportState::default_viewport());
            assert_eq!(controller.phase(), LocatePhase::Idle);
        }
    }

    #[tokio::test]
    async fn detached_controller_ignores_late_completions() {
        let (controller, mut calls) = scripted();

        let c = controller.clone();
        let task = tokio::spawn(async move { c.request_location().await });
        let respond = calls.recv().await.unwrap();

        controller.detach();
        respond
            .send(Ok(LocationFix::new(coord(9.10, 38.90), 30.0)))
            .unwrap();

        assert_eq!(task.await.unwrap(), LocationUpdate::Stale);
        assert_eq!(controller.viewport(), ViewportState::default_viewport());
    }

    #[tokio::test]
    async fn select_pin_is_idempotent_and_last_write_wins() {
        let (controller, _calls) = scripted();

        let a = coord(9.05, 38.77);
        let first = controller.select_pin(a);
        let again = controller.select_pin(a);
        assert_eq!(first, again);
        assert_eq!(controller.selected_pin(), Some(first));

        let b = coord(9.06, 38.78);
        controller.select_pin(b);
        assert_eq!(controller.selected_pin().unwrap().coordinate, b);

        controller.clear_pin();
        assert_eq!(controller.selected_pin(), None);
    }

    #[tokio::test]
    async fn pin_selection_is_orthogonal_to_locating() {
        let (controller, mut calls) = scripted();

        let c = controller.clone();
        let task = tokio::spawn(async move { c.request_location().await });
        let respond = calls.recv().await.unwrap();

        // Clicking while a request is in flight selects the pin without
        // cancelling the request.
        let pin = coord(9.05, 38.77);
        let outcome = controller.handle_map_event(MapEvent::Click(pin)).await;
        assert!(outcome.is_none());
        assert_eq!(controller.selected_pin().unwrap().coordinate, pin);

        respond
            .send(Ok(LocationFix::new(coord(9.10, 38.90), 30.0)))
            .unwrap();
        assert!(matches!(
            task.await.unwrap(),
            LocationUpdate::Applied { .. }
        ));
        assert_eq!(controller.selected_pin().unwrap().coordinate, pin);
    }

    #[tokio::test]
    async fn base_layer_toggle_survives_failure_revert() {
        let (controller, mut calls) = scripted();
        controller.set_base_layer(BaseLayer::Satellite);

        let c = controller.clone();
        let task = tokio::spawn(async move { c.request_location().await });
        calls.recv().await.unwrap().send(Err(PositionError::Denied)).unwrap();
        task.await.unwrap();

        assert_eq!(
            controller.viewport().active_base_layer,
            BaseLayer::Satellite
        );
    }
}
