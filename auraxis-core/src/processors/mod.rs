//! Event processors of the ingestion pipeline.
//!
//! - `ReloginSuppressor`: Receives raw game events, forwards them minus
//!   logout/login flicker
//! - `CharacterLoader`: Resolves character identities in cached batches
//! - `PresenceTracker`: Receives game events, tracks who is online and where
//! - `FacilityTracker`: Receives game events, tracks facility owners and
//!   alerts, emits `TrackerEvent`
//! - `OutfitMembersSynchronizer`: Polls outfit rosters, emits `TrackerEvent`

pub mod character_loader;
pub mod facility_tracker;
pub mod outfit_members;
pub mod presence_tracker;
pub mod relogin_suppressor;

pub use character_loader::{
    CharacterLoader, CharacterLoaderHandle, CharacterResolver, LoadError, ResolveError,
};
pub use facility_tracker::{
    AlertKey, AlertWindow, FacilityOwner, FacilityTracker, GetActiveAlerts,
    GetWorldTerritoryControl, TerritoryControl, ZoneControl,
};
pub use outfit_members::{OutfitMembersLoader, OutfitMembersSynchronizer};
pub use presence_tracker::{
    GetDetailedWorldPopulation, GetTrackableOnlineEntities, GetWorldsPopulation, PresenceTracker,
    TrackableOnlineEntities, TrackingSettings, WorldPopulation, WorldPopulationDetail,
    ZonePopulation,
};
pub use relogin_suppressor::ReloginSuppressor;
