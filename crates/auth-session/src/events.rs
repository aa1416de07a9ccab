//! Session-wide events broadcast by the HTTP client.

use serde::{Deserialize, Serialize};

/// Capacity of the event broadcast channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A request hit an expired access token and was not completed.
    ///
    /// `tokens_refreshed` tells the UI whether fresh tokens are already
    /// stored (re-issue the action) or the user must log in again.
    SessionExpired { tokens_refreshed: bool },
}
