//! Presence status endpoint

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use wisp_core::{PresenceState, Status, Timestamp, UserId, WispError, WispResult};
use wisp_stream::PresenceStream;

/// Body of `PUT /presence/{userId}/status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub presence: Option<PresenceState>,
    #[serde(default)]
    pub status_msg: Option<String>,
}

impl StatusRequest {
    /// Parse and validate a request body; at least one field is required
    pub fn parse(body: &[u8]) -> WispResult<Self> {
        let request: StatusRequest =
            serde_json::from_slice(body).map_err(|e| WispError::malformed(e.to_string()))?;
        if request.presence.is_none() && request.status_msg.is_none() {
            return Err(WispError::malformed("empty request"));
        }
        Ok(request)
    }
}

/// Body of a `GET /presence/{userId}/status` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub presence: PresenceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,
    /// Milliseconds since the user last changed presence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_ago: Option<i64>,
}

impl StatusResponse {
    pub fn new(status: Status, now: Timestamp) -> Self {
        StatusResponse {
            presence: status.presence,
            status_msg: status.status_msg,
            last_active_ago: status.last_active.map(|at| now.millis_since(at)),
        }
    }
}

/// Handlers behind the presence status routes
pub struct PresenceEndpoint {
    presences: Arc<PresenceStream>,
}

impl PresenceEndpoint {
    pub fn new(presences: Arc<PresenceStream>) -> Self {
        PresenceEndpoint { presences }
    }

    #[instrument(skip(self, authed), fields(authed = %authed))]
    pub fn get_status(&self, authed: &UserId, user_param: &str) -> WispResult<StatusResponse> {
        let user = UserId::parse(user_param)?;
        Ok(StatusResponse::new(
            self.presences.status(&user),
            Timestamp::now(),
        ))
    }

    #[instrument(skip(self, authed, body), fields(authed = %authed))]
    pub fn set_status(&self, authed: &UserId, user_param: &str, body: &[u8]) -> WispResult<()> {
        let user = UserId::parse(user_param)?;
        let request = StatusRequest::parse(body)?;

        let event = self
            .presences
            .update_status(&user, request.presence, request.status_msg)?;
        debug!(user = %user, index = event.index, "status updated");
        Ok(())
    }
}
