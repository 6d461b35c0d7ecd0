//! Cross-context message shapes.
//!
//! All messages are JSON objects discriminated by an `action` field, so
//! they stay wire-compatible with what the settings UI and page scripts
//! already send.

use serde::{Deserialize, Serialize};

use crate::types::PipReason;

/// Orchestrator → Decision Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Directive {
    #[serde(rename = "tryPiP")]
    TryPip {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<PipReason>,
    },
    /// Liveness probe; a live engine answers `{pong: true}`.
    #[serde(rename = "ping")]
    Ping,
}

impl Directive {
    pub fn try_pip(reason: PipReason) -> Self {
        Self::TryPip {
            reason: Some(reason),
        }
    }

    /// Effective reason for a `tryPiP` directive.
    pub fn reason(&self) -> Option<PipReason> {
        match self {
            Self::TryPip { reason } => Some(reason.unwrap_or(PipReason::Background)),
            Self::Ping => None,
        }
    }
}

/// Decision Engine → Orchestrator. Advisory; delivery is never awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Notification {
    #[serde(rename = "pipEntered")]
    PipEntered { reason: PipReason },
    #[serde(rename = "pipExited")]
    PipExited,
}

/// Page or settings UI → Orchestrator request expecting a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Query {
    #[serde(rename = "isVivaldi")]
    IsVivaldi,
}

/// Anything the Orchestrator's runtime-wide listener may receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrchestratorInbound {
    Notification(Notification),
    Query(Query),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityReply {
    pub is_vivaldi: bool,
    pub is_panel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Pong { pong: bool },
    Ack { success: bool },
    Capability(CapabilityReply),
}

impl Reply {
    pub fn pong() -> Self {
        Self::Pong { pong: true }
    }

    pub fn ack() -> Self {
        Self::Ack { success: true }
    }

    pub fn is_pong(&self) -> bool {
        matches!(self, Self::Pong { pong: true })
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn try_pip_wire_shape() {
        let value = serde_json::to_value(Directive::try_pip(PipReason::TabSwitch)).expect("ser");
        assert_eq!(value, json!({"action": "tryPiP", "reason": "tabSwitch"}));
    }

    #[test]
    fn try_pip_without_reason_defaults_to_background() {
        let directive: Directive = serde_json::from_value(json!({"action": "tryPiP"})).expect("de");
        assert_eq!(directive.reason(), Some(PipReason::Background));
        assert_eq!(Directive::Ping.reason(), None);
    }

    #[test]
    fn ping_and_pong_shapes() {
        let ping: Directive = serde_json::from_value(json!({"action": "ping"})).expect("de");
        assert_eq!(ping, Directive::Ping);
        assert_eq!(serde_json::to_value(Reply::pong()).expect("ser"), json!({"pong": true}));
    }

    #[test]
    fn inbound_distinguishes_notifications_from_queries() {
        let exited: OrchestratorInbound =
            serde_json::from_value(json!({"action": "pipExited"})).expect("de");
        assert_eq!(
            exited,
            OrchestratorInbound::Notification(Notification::PipExited)
        );
        let query: OrchestratorInbound =
            serde_json::from_value(json!({"action": "isVivaldi"})).expect("de");
        assert_eq!(query, OrchestratorInbound::Query(Query::IsVivaldi));
    }

    #[test]
    fn capability_reply_uses_camel_case_keys() {
        let reply = Reply::Capability(CapabilityReply {
            is_vivaldi: true,
            is_panel: false,
        });
        assert_eq!(
            serde_json::to_value(reply).expect("ser"),
            json!({"isVivaldi": true, "isPanel": false})
        );
    }

    #[test]
    fn ack_reply_decodes() {
        let reply: Reply = serde_json::from_value(json!({"success": true})).expect("de");
        assert_eq!(reply, Reply::ack());
        assert!(!reply.is_pong());
    }
}
