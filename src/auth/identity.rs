//! Authenticated identity and the session pairing it with its token.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_AVATAR_URL;

/// Identity record returned by the provider's current-user endpoint.
///
/// Unknown provider fields are dropped on deserialization, so the
/// persisted form only ever carries these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    #[serde(rename = "avatar", default, skip_serializing_if = "Option::is_none")]
    pub avatar_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            avatar_hash: None,
            global_name: None,
            discriminator: None,
        }
    }

    pub fn with_avatar(mut self, hash: impl Into<String>) -> Self {
        self.avatar_hash = Some(hash.into());
        self
    }

    /// Name to show on the identity card.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }

    /// Avatar image URL, falling back to the fixed default asset.
    pub fn avatar_url(&self, cdn_base_url: &str) -> String {
        match self.avatar_hash.as_deref().filter(|h| !h.is_empty()) {
            Some(hash) => format!(
                "{}/avatars/{}/{}.png",
                cdn_base_url.trim_end_matches('/'),
                self.id,
                hash
            ),
            None => DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

/// An authenticated session: the bearer token and the identity it fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub identity: Identity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn avatar_url_uses_cdn_when_hash_present() {
        let identity = Identity::new("80351110224678912", "nelly").with_avatar("8342729096ea3675442027381ff50dfe");
        assert_eq!(
            identity.avatar_url("https://cdn.discordapp.com/"),
            "https://cdn.discordapp.com/avatars/80351110224678912/8342729096ea3675442027381ff50dfe.png"
        );
    }

    #[test]
    fn avatar_url_falls_back_to_default_asset() {
        let identity = Identity::new("1", "alice");
        assert_eq!(identity.avatar_url("https://cdn.discordapp.com"), DEFAULT_AVATAR_URL);
    }

    #[test]
    fn empty_avatar_hash_is_treated_as_absent() {
        let mut identity = Identity::new("1", "alice");
        identity.avatar_hash = Some(String::new());
        assert_eq!(identity.avatar_url("https://cdn.discordapp.com"), DEFAULT_AVATAR_URL);
    }

    #[test]
    fn deserializes_provider_payload_and_ignores_unknown_fields() {
        let identity: Identity = serde_json::from_value(serde_json::json!({
            "id": "1",
            "username": "alice",
            "avatar": null,
            "global_name": "Alice",
            "discriminator": "0",
            "locale": "en-US",
            "mfa_enabled": false
        }))
        .unwrap();
        assert_eq!(
            identity,
            Identity {
                id: "1".into(),
                username: "alice".into(),
                avatar_hash: None,
                global_name: Some("Alice".into()),
                discriminator: Some("0".into()),
            }
        );
        assert_eq!(identity.display_name(), "Alice");
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let json = serde_json::to_value(Identity::new("1", "alice")).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "1", "username": "alice" }));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let identity = Identity::new("1", "alice");
        assert_eq!(identity.display_name(), "alice");
    }
}
