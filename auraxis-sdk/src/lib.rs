//! Wire types and clients for the PlanetSide 2 push event service.
//!
//! - [`objects`] holds the typed protocol messages, game event payloads and
//!   subscription commands shared by every crate in the workspace.
//! - `client` (behind the `client` feature) holds the websocket streaming
//!   client and the Census REST client.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
