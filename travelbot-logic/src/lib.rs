mod events;
pub mod geodesy;
mod location;
mod movement;
mod navigation;
mod observation;
mod pipeline;
mod providers;
mod route;
mod settings;
#[cfg(test)]
mod tests;

pub use events::{CompanionEvent, EventSender, NavigationProgress, RouteSummary};
pub use location::{Coordinate, FixError, LocationComponent, LocationFix, Millis};
pub use movement::{MovementSample, MovementTracker, RouteChange, RouteState};
pub use navigation::{NavigationSession, NavigationStatus};
pub use observation::{
    CommentaryTemplates, ObservationArbiter, ObservationContext, ObservationEntry,
    ObservationHistory, ObservationTrigger, RandomSource, RoadInfo, RoadKind, SeededRandom,
    SkipReason, TriggerTag, analyze_road,
};
pub use pipeline::{LocationPipeline, NavigationError};
pub use providers::{
    Address, GeocodingProvider, PoiProvider, PointOfInterest, ProviderError, RoutingProvider,
    with_timeout,
};
pub use route::{ManeuverKind, ProviderStep, RouteError, RouteResponse, RouteStep};
pub use settings::{CompanionSettings, MovementConfig, NavigationConfig, ObservationConfig};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
