//! Census REST client for character and outfit lookups.
//!
//! Census returns every number as a string and reports failures inside a 200
//! response (`{"error": "..."}` or `{"errorCode": ..., "errorMessage": ...}`),
//! so responses go through lenient raw structs before being converted.

use super::ClientError;
use crate::objects::{Character, FactionId, OutfitRef, Platform, WorldId};
use compact_str::CompactString;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const CENSUS_HOST: &str = "https://census.daybreakgames.com";

/// Census rejects very long query strings, so id lists are chunked.
const MAX_IDS_PER_QUERY: usize = 100;

/// Whole-request timeout of the default HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Typed HTTP client for the Census query API.
#[derive(Debug, Clone)]
pub struct CensusClient {
    http: Client,
    service_id: CompactString,
    namespace: &'static str,
    base_url: CompactString,
}

impl CensusClient {
    /// * `service_id` – the `s:` prefixed service id registered with Daybreak.
    pub fn new(service_id: impl Into<CompactString>, platform: Platform) -> Self {
        Self {
            http: Client::builder()
                .timeout(DEFAULT_REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            service_id: service_id.into(),
            namespace: platform.namespace(),
            base_url: CompactString::const_new(CENSUS_HOST),
        }
    }

    /// Replace the default `reqwest::Client` (timeouts, proxy, ...).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Point the client at another host, e.g. a caching proxy.
    pub fn with_base_url(mut self, base_url: impl Into<CompactString>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn collection_url(&self, collection: &str, query: &str) -> String {
        format!(
            "{}/{}/get/{}/{collection}/?{query}",
            self.base_url.trim_end_matches('/'),
            self.service_id,
            self.namespace,
        )
    }

    /// Fetch characters with their outfit resolved.
    ///
    /// Ids unknown to Census are simply missing from the result.
    pub async fn characters(&self, ids: &[CompactString]) -> Result<Vec<Character>, ClientError> {
        let mut characters = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let joined = chunk
                .iter()
                .map(CompactString::as_str)
                .collect::<Vec<_>>()
                .join(",");
            let url = self.collection_url(
                "character",
                &format!(
                    "character_id={joined}&c:show=character_id,name.first,faction_id&c:resolve=outfit,world&c:limit={}",
                    chunk.len()
                ),
            );
            let list: CharacterList = self.get(&url).await?;
            characters.extend(list.character_list.into_iter().filter_map(RawCharacter::into_character));
        }
        debug!(requested = ids.len(), found = characters.len(), "Fetched characters from Census");
        Ok(characters)
    }

    /// Ids of every current member of an outfit.
    pub async fn outfit_member_ids(
        &self,
        outfit_id: &str,
    ) -> Result<Vec<CompactString>, ClientError> {
        let url = self.collection_url(
            "outfit_member",
            &format!("outfit_id={outfit_id}&c:show=character_id&c:limit=10000"),
        );
        let list: OutfitMemberList = self.get(&url).await?;
        Ok(list
            .outfit_member_list
            .into_iter()
            .map(|member| member.character_id)
            .filter(|id| !id.is_empty())
            .collect())
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        let bytes = resp.bytes().await?;
        parse_census(&bytes)
    }
}

fn parse_census<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ClientError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if let Some(error) = value.get("error").and_then(serde_json::Value::as_str) {
        return Err(ClientError::Census(error.to_owned()));
    }
    if let Some(error) = value.get("errorMessage").and_then(serde_json::Value::as_str) {
        return Err(ClientError::Census(error.to_owned()));
    }
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Deserialize)]
struct CharacterList {
    #[serde(default)]
    character_list: Vec<RawCharacter>,
}

#[derive(Debug, Deserialize)]
struct RawCharacter {
    character_id: CompactString,
    #[serde(default)]
    name: Option<RawName>,
    #[serde(default)]
    faction_id: Option<CompactString>,
    #[serde(default)]
    world_id: Option<CompactString>,
    #[serde(default)]
    outfit: Option<RawOutfit>,
}

#[derive(Debug, Deserialize)]
struct RawName {
    #[serde(default)]
    first: CompactString,
}

#[derive(Debug, Deserialize)]
struct RawOutfit {
    outfit_id: CompactString,
    #[serde(default)]
    alias: CompactString,
    #[serde(default)]
    name: CompactString,
}

impl RawCharacter {
    fn into_character(self) -> Option<Character> {
        if self.character_id.is_empty() {
            return None;
        }
        let faction = self
            .faction_id
            .as_deref()
            .and_then(|id| id.parse::<FactionId>().ok())
            .unwrap_or(FactionId::NONE);
        let world = self.world_id.as_deref().and_then(|id| id.parse::<WorldId>().ok());
        let outfit = self
            .outfit
            .filter(|outfit| !outfit.outfit_id.is_empty() && outfit.outfit_id != "0")
            .map(|outfit| OutfitRef {
                id: outfit.outfit_id,
                tag: outfit.alias,
                name: outfit.name,
            });
        Some(Character {
            id: self.character_id,
            name: self.name.map(|name| name.first).unwrap_or_default(),
            faction,
            world,
            outfit,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OutfitMemberList {
    #[serde(default)]
    outfit_member_list: Vec<RawOutfitMember>,
}

#[derive(Debug, Deserialize)]
struct RawOutfitMember {
    character_id: CompactString,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_url() {
        let client = CensusClient::new("s:example", Platform::Ps4Us);
        assert_eq!(
            client.collection_url("character", "character_id=1"),
            "https://census.daybreakgames.com/s:example/get/ps2ps4us:v2/character/?character_id=1"
        );
    }

    #[test]
    fn test_parse_character_list() {
        let body = json!({
            "character_list": [
                {
                    "character_id": "5428010618035323201",
                    "name": {"first": "Alpha", "first_lower": "alpha"},
                    "faction_id": "2",
                    "world_id": "10",
                    "outfit": {"outfit_id": "37509488620604883", "name": "Outfit Name", "alias": "TAG"}
                },
                {
                    "character_id": "5428010618035323202",
                    "name": {"first": "Bravo"},
                    "faction_id": "4"
                }
            ],
            "returned": 2
        });
        let list: CharacterList = parse_census(body.to_string().as_bytes()).unwrap();
        let characters: Vec<Character> = list
            .character_list
            .into_iter()
            .filter_map(RawCharacter::into_character)
            .collect();

        assert_eq!(characters.len(), 2);
        assert_eq!(characters[0].name, "Alpha");
        assert_eq!(characters[0].faction, FactionId::NC);
        assert_eq!(characters[0].world, Some(WorldId::MILLER));
        assert_eq!(characters[0].outfit_id().map(|id| id.as_str()), Some("37509488620604883"));
        assert_eq!(characters[0].outfit.as_ref().map(|o| o.tag.as_str()), Some("TAG"));
        assert_eq!(characters[1].faction, FactionId::NSO);
        assert!(characters[1].outfit.is_none());
        assert!(characters[1].world.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_census_request_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept the connection and never answer.
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let client = CensusClient::new("s:example", Platform::Pc).with_base_url(format!("http://{addr}"));
        let result = client.characters(&["5428010618035323201".into()]).await;
        assert!(matches!(result, Err(ClientError::Http(e)) if e.is_timeout()));
    }

    #[test]
    fn test_parse_census_error_document() {
        let body = json!({"error": "Missing Service ID."});
        let result: Result<CharacterList, _> = parse_census(body.to_string().as_bytes());
        assert!(matches!(result, Err(ClientError::Census(msg)) if msg == "Missing Service ID."));

        let body = json!({"errorCode": "SERVER_ERROR", "errorMessage": "timeout"});
        let result: Result<CharacterList, _> = parse_census(body.to_string().as_bytes());
        assert!(matches!(result, Err(ClientError::Census(msg)) if msg == "timeout"));
    }

    #[test]
    fn test_parse_outfit_members() {
        let body = json!({
            "outfit_member_list": [
                {"character_id": "1"},
                {"character_id": "2"}
            ]
        });
        let list: OutfitMemberList = parse_census(body.to_string().as_bytes()).unwrap();
        let ids: Vec<_> = list.outfit_member_list.into_iter().map(|m| m.character_id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
