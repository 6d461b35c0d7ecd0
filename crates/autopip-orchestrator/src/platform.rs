//! Tab and window surface of the browser, as seen by the Orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use autopip_core::error::{DeliveryError, InjectError, TabError};
use autopip_core::protocol::{Directive, Reply};
use autopip_core::types::{TabId, WindowId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    #[default]
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    pub window_id: WindowId,
    pub url: Option<String>,
    #[serde(default)]
    pub status: TabStatus,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Vendor side data (`vivExtData`), a JSON string or an object.
    #[serde(default, rename = "vivExtData")]
    pub side_data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[async_trait]
pub trait TabPlatform: Send + Sync {
    async fn get_tab(&self, tab: TabId) -> Result<TabInfo, TabError>;
    async fn get_window(&self, window: WindowId) -> Result<WindowInfo, TabError>;
    /// Deliver `directive` to the tab's engine. `Ok(None)` when the engine
    /// took the message without answering.
    async fn send(&self, tab: TabId, directive: Directive) -> Result<Option<Reply>, DeliveryError>;
    /// Load the Decision Engine into the tab.
    async fn inject_engine(&self, tab: TabId) -> Result<(), InjectError>;

    fn user_agent(&self) -> String;
    fn has_vendor_object(&self) -> bool;
}
