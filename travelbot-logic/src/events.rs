use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::movement::RouteState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Overview of a route when guidance starts
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_s: f64,
    pub steps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Where we are along the active route
pub struct NavigationProgress {
    /// Index of the step we're heading towards
    pub current_step: usize,
    /// Meters to that step's maneuver
    pub distance_to_step: f64,
    pub remaining_distance_m: f64,
    pub remaining_duration_s: f64,
    /// How much of the route is done, 0 to 100
    pub progress_percent: f64,
}

/// An event produced by the location pipeline for the UI and speech output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CompanionEvent {
    /// The movement classification changed
    RouteChanged {
        previous: RouteState,
        current: RouteState,
    },
    /// Guidance started on a new route
    NavigationStarted(RouteSummary),
    /// Something navigation wants said out loud, takes priority over observations
    NavigationInstruction(String),
    /// Per-fix progress along the active route
    NavigationProgress(NavigationProgress),
    /// The last step of the route was reached
    Arrived,
    /// Guidance was stopped by the user
    NavigationStopped,
    /// Ambient commentary about the surroundings
    Observation(String),
}

impl CompanionEvent {
    /// Whether this event came from navigation (instructions, progress, lifecycle)
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::NavigationStarted(_)
                | Self::NavigationInstruction(_)
                | Self::NavigationProgress(_)
                | Self::Arrived
                | Self::NavigationStopped
        )
    }
}

/// Consumer of [CompanionEvent]s, implemented by whatever renders or speaks them
pub trait EventSender: Send + Sync {
    fn send_event(&self, event: CompanionEvent);
}

impl EventSender for mpsc::UnboundedSender<CompanionEvent> {
    fn send_event(&self, event: CompanionEvent) {
        // Receiver gone means nobody is listening anymore, nothing to do
        self.send(event).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sender_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send_event(CompanionEvent::Arrived);
        assert_eq!(rx.try_recv().ok(), Some(CompanionEvent::Arrived));

        drop(rx);
        // Nobody listening is fine
        tx.send_event(CompanionEvent::NavigationStopped);
    }

    #[test]
    fn navigation_events() {
        assert!(CompanionEvent::Arrived.is_navigation());
        assert!(CompanionEvent::NavigationInstruction("Nu sla linksaf".to_string()).is_navigation());
        assert!(!CompanionEvent::Observation("Kijk".to_string()).is_navigation());
        assert!(
            !CompanionEvent::RouteChanged {
                previous: RouteState::Detecting,
                current: RouteState::Straight
            }
            .is_navigation()
        );
    }
}
