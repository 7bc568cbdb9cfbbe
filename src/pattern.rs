//! Dispatch patterns — typed RPC intents addressed by role and command.
//!
//! A pattern is the unit the mesh routes on: a command name, a target role,
//! optional routing fields (entity, type, action, by) and a JSON payload
//! under `data`. Handlers build one fresh per dispatch, either from a bare
//! command name or from the per-request [`PatternSeed`] carrying the
//! caller's identity. Building never mutates the seed, so one request can
//! derive any number of patterns from the same seed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Downstream service category a pattern is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Location,
    Notifications,
}

/// Per-request base for patterns that must carry caller identity.
///
/// Constructed once from the caller context; routing fields are set with
/// the consuming builder methods before [`PatternSeed::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSeed {
    pub requesting_user_id: String,
    pub requesting_device_id: String,
    pub role: Option<Role>,
    pub entity: Option<String>,
    pub kind: Option<String>,
    pub action: Option<String>,
    pub by: Option<String>,
}

impl PatternSeed {
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        PatternSeed {
            requesting_user_id: user_id.into(),
            requesting_device_id: device_id.into(),
            role: None,
            entity: None,
            kind: None,
            action: None,
            by: None,
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Serialized as `type` on the wire.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn by(mut self, by: impl Into<String>) -> Self {
        self.by = Some(by.into());
        self
    }

    /// Build a pattern from this seed. The seed's own fields win on
    /// conflict: `role` is taken from the seed when set, and the caller
    /// identity fields always come from the seed.
    pub fn build(&self, cmd: &str, data: Value, role: Role) -> Pattern {
        Pattern {
            cmd: cmd.to_string(),
            role: self.role.unwrap_or(role),
            entity: self.entity.clone(),
            kind: self.kind.clone(),
            action: self.action.clone(),
            by: self.by.clone(),
            requesting_user_id: Some(self.requesting_user_id.clone()),
            requesting_device_id: Some(self.requesting_device_id.clone()),
            data,
        }
    }
}

/// A fully built dispatch pattern. Serializes flat, omitting unset fields,
/// so a minimal pattern is exactly `{cmd, role, data}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub cmd: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requesting_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requesting_device_id: Option<String>,
    pub data: Value,
}

/// Build a pattern from a bare command name, without caller identity.
/// Used by operations whose payload already names the acting user.
pub fn build(cmd: &str, data: Value, role: Role) -> Pattern {
    Pattern {
        cmd: cmd.to_string(),
        role,
        entity: None,
        kind: None,
        action: None,
        by: None,
        requesting_user_id: None,
        requesting_device_id: None,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_command_serializes_minimal() {
        let pattern = build("register", json!({"mail": "a@b.de"}), Role::User);
        let wire = serde_json::to_value(&pattern).unwrap();
        assert_eq!(
            wire,
            json!({
                "cmd": "register",
                "role": "user",
                "data": {"mail": "a@b.de"},
            })
        );
    }

    #[test]
    fn seed_build_carries_identity_and_routing_fields() {
        let seed = PatternSeed::new("u1", "d1").entity("location").kind("image");
        let pattern = seed.build("addimpression", json!({"x": 1}), Role::Location);

        let wire = serde_json::to_value(&pattern).unwrap();
        assert_eq!(
            wire,
            json!({
                "cmd": "addimpression",
                "role": "location",
                "entity": "location",
                "type": "image",
                "requesting_user_id": "u1",
                "requesting_device_id": "d1",
                "data": {"x": 1},
            })
        );
    }

    #[test]
    fn seed_is_unchanged_by_build() {
        let seed = PatternSeed::new("u1", "d1").entity("location").by("userId");
        let before = seed.clone();

        let _first = seed.build("count", json!({"user_id": "u2"}), Role::Location);
        let _second = seed.build("getUserById", json!({"user_id": "u1"}), Role::User);

        assert_eq!(seed, before);
    }

    #[test]
    fn seed_role_wins_over_build_argument() {
        let seed = PatternSeed::new("u1", "d1").role(Role::Notifications);
        let pattern = seed.build("notify", json!({}), Role::User);
        assert_eq!(pattern.role, Role::Notifications);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Role::Notifications).unwrap(),
            json!("notifications")
        );
    }
}
