//! Journey progress along a selected route.
//!
//! The tracker is the only writer of [`JourneyState`]; everybody else holds a
//! `watch::Receiver` snapshot. Advancement is driven by an injected [`Ticker`]
//! so tests can step the journey without real delays.
//!
//! ```text
//! Idle ──select──▶ Active ──advance──▶ Active ... ──advance──▶ Complete
//!                    ▲                                            │
//!                    └─────────────────select─────────────────────┘
//! ```

use crate::route::{Route, RouteTable};
use crate::error::CoreResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JourneyPhase {
    /// No route selected yet.
    #[default]
    Idle,
    Active,
    /// Final destination reached. Terminal until a new route is selected.
    Complete,
}

/// Read-only view of where the journey is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JourneyState {
    route: Option<Route>,
    current_index: usize,
    phase: JourneyPhase,
}

impl JourneyState {
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn phase(&self) -> JourneyPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == JourneyPhase::Active
    }

    pub fn current_location(&self) -> Option<&str> {
        self.route.as_ref().and_then(|r| r.get(self.current_index))
    }

    /// `(from, to)` of the segment being travelled, if any remain.
    pub fn current_segment(&self) -> Option<(&str, &str)> {
        let route = self.route.as_ref()?;
        Some((route.get(self.current_index)?, route.get(self.current_index + 1)?))
    }

    /// Segments after the current one, rendered `from → to`.
    pub fn upcoming_segments(&self) -> Vec<String> {
        let Some(route) = self.route.as_ref() else {
            return Vec::new();
        };
        let stops = route.stops();
        (self.current_index + 1..stops.len().saturating_sub(1))
            .map(|i| format!("{} → {}", stops[i], stops[i + 1]))
            .collect()
    }

    /// Two-line progress summary used in prompts. Empty when no route is selected.
    pub fn progress_text(&self) -> String {
        if self.route.is_none() {
            return String::new();
        }
        let segment = match self.current_segment() {
            Some((from, to)) => format!("{} → {}", from, to),
            None => "Journey Complete".to_string(),
        };
        let upcoming = self.upcoming_segments();
        let upcoming = if upcoming.is_empty() {
            "No more upcoming locations.".to_string()
        } else {
            upcoming.join(", ")
        };
        format!("Current Segment: {}\nUpcoming Locations: {}", segment, upcoming)
    }
}

/// Receives segment notifications from the tracker.
pub trait SegmentListener: Send + Sync {
    /// A new location was reached while travelling `from → to`.
    fn segment_started(&self, from: &str, to: &str);

    /// The journey became complete.
    fn journey_completed(&self);
}

/// Result of a single [`JourneyProgressTracker::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved onto a location not seen before.
    Reached { from: String, to: String },
    /// Index advanced but the location was already recorded.
    Repeated { location: String },
    /// Nothing to advance: idle, or already at the destination.
    Finished,
}

/// Owns and advances the [`JourneyState`].
pub struct JourneyProgressTracker {
    state_tx: watch::Sender<JourneyState>,
    last_location: Option<String>,
    listener: Option<Arc<dyn SegmentListener>>,
}

impl Default for JourneyProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JourneyProgressTracker {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(JourneyState::default());
        Self {
            state_tx,
            last_location: None,
            listener: None,
        }
    }

    /// Register the component to notify on new segments (normally the conversation session).
    pub fn with_listener(mut self, listener: Arc<dyn SegmentListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Read-only handle on the journey state.
    pub fn subscribe(&self) -> watch::Receiver<JourneyState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> JourneyState {
        self.state_tx.borrow().clone()
    }

    /// Start a new journey at index 0, replacing whatever was there.
    pub fn start(&mut self, route: Route) {
        info!(route = %route.joined(), "Journey started");
        self.last_location = None;
        self.state_tx.send_replace(JourneyState {
            route: Some(route),
            current_index: 0,
            phase: JourneyPhase::Active,
        });
    }

    /// Look up the route in `table` and start it. Fails with `RouteNotFound`
    /// without touching the current journey.
    pub fn select(&mut self, table: &RouteTable, origin: &str, destination: &str) -> CoreResult<Route> {
        let route = table.require_route(origin, destination)?;
        self.start(route.clone());
        Ok(route)
    }

    /// Move one location forward.
    pub fn advance(&mut self) -> AdvanceOutcome {
        let (from, to, complete) = {
            let state = self.state_tx.borrow();
            let Some(route) = state.route.as_ref() else {
                return AdvanceOutcome::Finished;
            };
            if !state.is_active() || state.current_index + 1 >= route.len() {
                drop(state);
                self.finish();
                return AdvanceOutcome::Finished;
            }
            let next = state.current_index + 1;
            (
                route.stops()[state.current_index].clone(),
                route.stops()[next].clone(),
                next + 1 == route.len(),
            )
        };

        self.state_tx.send_modify(|state| {
            state.current_index += 1;
            if complete {
                state.phase = JourneyPhase::Complete;
            }
        });

        let outcome = if self.last_location.as_deref() == Some(to.as_str()) {
            debug!(location = %to, "Location already recorded");
            AdvanceOutcome::Repeated { location: to }
        } else {
            info!(from = %from, to = %to, "Progressing to next segment");
            self.last_location = Some(to.clone());
            if let Some(listener) = &self.listener {
                listener.segment_started(&from, &to);
            }
            AdvanceOutcome::Reached { from, to }
        };

        if complete {
            info!("Journey completed");
            if let Some(listener) = &self.listener {
                listener.journey_completed();
            }
        }
        outcome
    }

    fn finish(&mut self) {
        let mut transitioned = false;
        self.state_tx.send_if_modified(|state| {
            if state.phase == JourneyPhase::Active {
                state.phase = JourneyPhase::Complete;
                transitioned = true;
            }
            transitioned
        });
        if transitioned {
            info!("Journey completed");
            if let Some(listener) = &self.listener {
                listener.journey_completed();
            }
        }
    }

    /// Advance once per tick until the journey finishes or the ticker runs dry.
    pub async fn drive<T: Ticker + ?Sized>(&mut self, ticker: &mut T) {
        while self.state_tx.borrow().is_active() {
            if !ticker.tick().await {
                debug!("Ticker exhausted");
                break;
            }
            if self.advance() == AdvanceOutcome::Finished {
                break;
            }
        }
    }
}

/// Source of "advance now" signals for the tracker.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. Returns `false` when no more ticks will come.
    async fn tick(&mut self) -> bool;
}

/// Real-time ticker: one tick per segment interval, first tick after one full period.
pub struct IntervalTicker {
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker fed from a channel; each message is one tick. Closing the sender ends the journey drive.
pub struct ChannelTicker {
    rx: tokio::sync::mpsc::UnboundedReceiver<()>,
}

impl ChannelTicker {
    pub fn new() -> (tokio::sync::mpsc::UnboundedSender<()>, Self) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl Ticker for ChannelTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
