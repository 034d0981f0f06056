//! Census-backed identity sources.

use async_trait::async_trait;
use auraxis_core::processors::{CharacterResolver, OutfitMembersLoader, ResolveError};
use auraxis_sdk::client::{CensusClient, ClientError};
use auraxis_sdk::objects::{Character, Platform};
use compact_str::CompactString;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The Census queries the resolver needs from one namespace.
#[async_trait]
trait CensusDirectory: Send + Sync {
    async fn characters(&self, ids: &[CompactString]) -> Result<Vec<Character>, ClientError>;

    async fn outfit_member_ids(&self, outfit_id: &str) -> Result<Vec<CompactString>, ClientError>;
}

#[async_trait]
impl CensusDirectory for CensusClient {
    async fn characters(&self, ids: &[CompactString]) -> Result<Vec<Character>, ClientError> {
        CensusClient::characters(self, ids).await
    }

    async fn outfit_member_ids(&self, outfit_id: &str) -> Result<Vec<CompactString>, ClientError> {
        CensusClient::outfit_member_ids(self, outfit_id).await
    }
}

/// Resolves characters and outfit rosters through Census.
///
/// Each platform has its own namespace. Lookups go to the namespaces in
/// configuration order and only ids still missing are asked of the next one.
/// A namespace that fails is skipped; the lookup only fails when none of
/// them answered.
pub struct CensusResolver {
    clients: Vec<(Platform, Arc<dyn CensusDirectory>)>,
}

impl CensusResolver {
    pub fn new(service_id: &str, base_url: Option<&str>, platforms: &[Platform]) -> Self {
        let clients = platforms
            .iter()
            .map(|platform| {
                let client = CensusClient::new(service_id, *platform);
                let client = match base_url {
                    Some(url) => client.with_base_url(url),
                    None => client,
                };
                (*platform, Arc::new(client) as Arc<dyn CensusDirectory>)
            })
            .collect();
        Self { clients }
    }
}

fn resolve_error(e: ClientError) -> ResolveError {
    match e {
        ClientError::Json(e) => ResolveError::InvalidResponse(e.to_string()),
        ClientError::Census(message) => ResolveError::InvalidResponse(message),
        other => ResolveError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl CharacterResolver for CensusResolver {
    #[tracing::instrument(skip_all, name = "CensusResolver::resolve_characters", fields(count = ids.len()))]
    async fn resolve_characters(
        &self,
        ids: &[CompactString],
    ) -> Result<HashMap<CompactString, Character>, ResolveError> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut missing = ids.to_vec();
        let mut answered = false;
        let mut last_error = None;
        for (platform, client) in &self.clients {
            if missing.is_empty() {
                break;
            }
            match client.characters(&missing).await {
                Ok(characters) => {
                    answered = true;
                    debug!(%platform, found = characters.len(), "Resolved characters");
                    found.extend(characters.into_iter().map(|c| (c.id.clone(), c)));
                    missing.retain(|id| !found.contains_key(id));
                }
                Err(e) => {
                    warn!(%platform, error = %e, "Character lookup failed, skipping namespace");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if !answered => Err(resolve_error(e)),
            _ => Ok(found),
        }
    }
}

#[async_trait]
impl OutfitMembersLoader for CensusResolver {
    async fn outfit_member_ids(&self, outfit_id: &str) -> Result<Vec<CompactString>, ResolveError> {
        let mut answered = false;
        let mut last_error = None;
        for (platform, client) in &self.clients {
            match client.outfit_member_ids(outfit_id).await {
                Ok(members) if !members.is_empty() => {
                    debug!(%platform, %outfit_id, members = members.len(), "Loaded outfit roster");
                    return Ok(members);
                }
                Ok(_) => answered = true,
                Err(e) => {
                    warn!(%platform, %outfit_id, error = %e, "Outfit roster lookup failed, skipping namespace");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if !answered => Err(resolve_error(e)),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auraxis_sdk::objects::FactionId;

    /// Namespace answering from a fixed set of characters, or failing.
    struct FakeDirectory {
        characters: Vec<Character>,
        fail: bool,
    }

    impl FakeDirectory {
        fn knowing(ids: &[&str]) -> Arc<dyn CensusDirectory> {
            Arc::new(Self {
                characters: ids
                    .iter()
                    .map(|id| Character {
                        id: (*id).into(),
                        name: format!("Char{id}").into(),
                        faction: FactionId::VS,
                        world: None,
                        outfit: None,
                    })
                    .collect(),
                fail: false,
            })
        }

        fn failing() -> Arc<dyn CensusDirectory> {
            Arc::new(Self {
                characters: Vec::new(),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl CensusDirectory for FakeDirectory {
        async fn characters(&self, ids: &[CompactString]) -> Result<Vec<Character>, ClientError> {
            if self.fail {
                return Err(ClientError::Census("Service Unavailable".into()));
            }
            Ok(self
                .characters
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect())
        }

        async fn outfit_member_ids(&self, _outfit_id: &str) -> Result<Vec<CompactString>, ClientError> {
            if self.fail {
                return Err(ClientError::Closed);
            }
            Ok(self.characters.iter().map(|c| c.id.clone()).collect())
        }
    }

    fn resolver(clients: Vec<(Platform, Arc<dyn CensusDirectory>)>) -> CensusResolver {
        CensusResolver { clients }
    }

    #[test]
    fn test_client_errors_map_to_resolve_errors() {
        assert!(matches!(
            resolve_error(ClientError::Census("No data found.".into())),
            ResolveError::InvalidResponse(_)
        ));
        assert!(matches!(
            resolve_error(ClientError::Closed),
            ResolveError::Unavailable(_)
        ));
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(
            resolve_error(ClientError::Json(json)),
            ResolveError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_one_client_per_platform() {
        let resolver = CensusResolver::new("s:example", None, &[Platform::Pc, Platform::Ps4Eu]);
        let platforms: Vec<_> = resolver.clients.iter().map(|(p, _)| *p).collect();
        assert_eq!(platforms, vec![Platform::Pc, Platform::Ps4Eu]);
    }

    #[tokio::test]
    async fn test_failing_namespace_keeps_earlier_results() {
        let resolver = resolver(vec![
            (Platform::Pc, FakeDirectory::knowing(&["1"])),
            (Platform::Ps4Eu, FakeDirectory::failing()),
            (Platform::Ps4Us, FakeDirectory::knowing(&["3"])),
        ]);

        let found = resolver
            .resolve_characters(&["1".into(), "2".into(), "3".into()])
            .await
            .unwrap();
        let mut ids: Vec<&str> = found.keys().map(CompactString::as_str).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_every_namespace_failing_is_an_error() {
        let resolver = resolver(vec![
            (Platform::Pc, FakeDirectory::failing()),
            (Platform::Ps4Eu, FakeDirectory::failing()),
        ]);

        let result = resolver.resolve_characters(&["1".into()]).await;
        assert!(matches!(result, Err(ResolveError::InvalidResponse(_))));

        let roster = resolver.outfit_member_ids("37509488620604883").await;
        assert!(matches!(roster, Err(ResolveError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_roster_falls_through_failing_namespace() {
        let resolver = resolver(vec![
            (Platform::Pc, FakeDirectory::failing()),
            (Platform::Ps4Eu, FakeDirectory::knowing(&["7", "8"])),
        ]);
        let roster = resolver.outfit_member_ids("1").await.unwrap();
        assert_eq!(roster, vec![CompactString::from("7"), "8".into()]);
    }
}
