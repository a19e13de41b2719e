// Per-policy leader election over the shared document store.
//
// One document per policy is the whole coordination state: taking leadership
// writes the caller's identity and a fresh timestamp, releasing back-dates
// the timestamp instead of deleting, and the store's version-conditioned
// writes arbitrate every race. The engine holds no locks of its own.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::PolicyLeader;
use crate::query::TermsQuery;
use crate::store::{DocumentStore, RequestOpts};
use crate::{FIELD_ID, POLICIES_LEADER_INDEX};

/// Partial-update envelope expected by the store's merge update.
#[derive(Serialize)]
struct PartialDoc<'a> {
    doc: &'a PolicyLeader,
}

/// Leader election engine for a fleet of servers sharing one document store.
///
/// Construct once per process and share; the compiled search template is the
/// only process-wide state and is initialized lazily on first lookup.
pub struct PolicyLeaders<S> {
    store: S,
    index: String,
    search_tmpl: OnceCell<TermsQuery>,
}

impl<S: DocumentStore> PolicyLeaders<S> {
    pub fn new(store: S) -> Self {
        Self::with_index(store, POLICIES_LEADER_INDEX)
    }

    /// Use a non-default leadership collection. Mainly for tests that need
    /// an isolated index per case.
    pub fn with_index(store: S, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
            search_tmpl: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Current leaders for the given policies.
    ///
    /// Policies with no leadership record are absent from the result. A
    /// leadership collection that has never been created (no policy has ever
    /// been claimed in this deployment) yields an empty map, not an error.
    pub async fn search_leaders(&self, ids: &[String]) -> Result<HashMap<String, PolicyLeader>> {
        // get_or_try_init does not cache a failed compile; the next caller
        // re-attempts instead of seeing a poisoned cell.
        let tmpl = self
            .search_tmpl
            .get_or_try_init(|| async { TermsQuery::compile(FIELD_ID) })
            .await?;
        let query = tmpl.render(ids);

        let hits = match self.store.search(&self.index, &query).await {
            Ok(hits) => hits,
            Err(Error::IndexNotFound) => {
                debug!(index = %self.index, "leadership index not found");
                return Ok(HashMap::new());
            }
            Err(err) => return Err(err),
        };

        let mut leaders = HashMap::with_capacity(hits.len());
        for hit in hits {
            let leader: PolicyLeader = serde_json::from_slice(&hit.source)?;
            leaders.insert(hit.id, leader);
        }
        Ok(leaders)
    }

    /// Take (or keep) leadership of a policy.
    ///
    /// Takeover is unconditional: deciding whether to attempt it (typically
    /// because the current record's timestamp looks stale) is the caller's
    /// job, so no ownership check happens here. Losing a race surfaces
    /// as [`Error::VersionConflict`]; the loser should treat it as "another
    /// server just became leader" and retry only on its own schedule (e.g.
    /// the next coordination cycle), never in a tight loop.
    pub async fn take_leadership(
        &self,
        policy_id: &str,
        server_id: &str,
        server_version: &str,
    ) -> Result<()> {
        let opts = RequestOpts::new().refresh();

        match self.store.read(&self.index, policy_id, opts).await {
            Ok(doc) => {
                let mut leader: PolicyLeader = serde_json::from_slice(&doc.body)?;
                leader.set_owner(server_id, server_version);
                leader.set_time(Utc::now());

                let body = serde_json::to_vec(&PartialDoc { doc: &leader })?;
                self.store
                    .update(&self.index, policy_id, body, doc.version, opts)
                    .await
            }
            Err(Error::NotFound) => {
                // First claim ever for this policy. Create-if-absent lets
                // exactly one concurrent creator win.
                let leader = PolicyLeader::new(server_id, server_version, Utc::now());
                let body = serde_json::to_vec(&leader)?;
                self.store.create(&self.index, policy_id, body, opts).await
            }
            Err(err) => Err(err),
        }
    }

    /// Voluntarily give up leadership of a policy before it would go stale.
    ///
    /// The record is never deleted; its timestamp is back-dated by
    /// `release_interval` so any freshness check using a smaller interval
    /// sees the lease as already expired. Releasing a policy this server
    /// does not own, or one that was concurrently taken over, is a no-op.
    pub async fn release_leadership(
        &self,
        policy_id: &str,
        server_id: &str,
        release_interval: Duration,
    ) -> Result<()> {
        let opts = RequestOpts::new().refresh();

        let doc = match self.store.read(&self.index, policy_id, opts).await {
            Ok(doc) => doc,
            // Nothing to release.
            Err(Error::NotFound) => return Ok(()),
            Err(err) => return Err(err),
        };

        let mut leader: PolicyLeader = serde_json::from_slice(&doc.body)?;
        match &leader.server {
            Some(server) if server.id == server_id => {}
            // Not the leader anymore; nothing to do.
            _ => return Ok(()),
        }

        leader.set_time(Utc::now() - release_interval);
        let body = serde_json::to_vec(&PartialDoc { doc: &leader })?;
        match self
            .store
            .update(&self.index, policy_id, body, doc.version, opts)
            .await
        {
            // Another server already took over; the desired end state holds.
            Err(Error::VersionConflict) => Ok(()),
            other => other,
        }
    }
}
