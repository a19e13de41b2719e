// Leadership record documents as stored in the leaders collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a server claiming leadership of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    pub id: String,
    pub version: String,
}

/// The leadership record for one policy.
///
/// The policy ID is the document's `_id` in the store, not a body field.
/// `server` and the freshness timestamp are only ever written together, by
/// whichever server most recently took leadership. The record itself never
/// decides whether a lease is stale; callers compare the timestamp against
/// their own check interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyLeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerMetadata>,

    /// When leadership was last asserted (or deliberately back-dated on
    /// release). RFC3339 UTC on the wire.
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl PolicyLeader {
    pub fn new(server_id: &str, server_version: &str, now: DateTime<Utc>) -> Self {
        Self {
            server: Some(ServerMetadata {
                id: server_id.to_string(),
                version: server_version.to_string(),
            }),
            timestamp: now,
        }
    }

    /// Overwrite the recorded owner with the given server identity.
    pub fn set_owner(&mut self, server_id: &str, server_version: &str) {
        let server = self.server.get_or_insert_with(|| ServerMetadata {
            id: String::new(),
            version: String::new(),
        });
        server.id = server_id.to_string();
        server.version = server_version.to_string();
    }

    pub fn set_time(&mut self, time: DateTime<Utc>) {
        self.timestamp = time;
    }

    #[must_use]
    pub fn time(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
