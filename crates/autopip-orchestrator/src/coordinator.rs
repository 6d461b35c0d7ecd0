//! Tab coordinator: forwards a tab-switch directive to the tab just left.
//!
//! The gesture that switched tabs lands in the new tab, but PiP has to
//! start in the old one, which learns about the switch only from this
//! message. Every step is best effort: a tab that closed or navigated away
//! mid-flight ends the dispatch quietly.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use autopip_core::cache::ConfigCache;
use autopip_core::config::{Config, Feature, host_of};
use autopip_core::error::DeliveryError;
use autopip_core::panel;
use autopip_core::ports::{Clock, ConfigSource};
use autopip_core::protocol::{
    CapabilityReply, Directive, Notification, OrchestratorInbound, Query, Reply,
};
use autopip_core::types::{PipReason, TabId};

use crate::platform::{TabPlatform, TabStatus};

/// Named event channels into the coordinator.
#[derive(Debug)]
pub enum OrchestratorEvent {
    TabActivated(TabId),
    TabUpdated { tab: TabId, status: TabStatus },
    TabRemoved(TabId),
    Message {
        sender: Option<TabId>,
        message: OrchestratorInbound,
        reply: Option<oneshot::Sender<Reply>>,
    },
    ConfigChanged(Map<String, Value>),
}

/// How a tab activation was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// No earlier tab, or the same tab re-activated.
    NoPrevious,
    Disabled,
    SiteDisabled(TabId),
    Unreachable(TabId),
    Dispatched(TabId),
}

pub struct TabCoordinator {
    platform: Arc<dyn TabPlatform>,
    config_source: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
    config_cache: ConfigCache,
    last_active: Option<TabId>,
    /// Tabs known to run an engine. Best-effort.
    injected: HashSet<TabId>,
    is_vivaldi: bool,
}

impl TabCoordinator {
    pub fn new(
        platform: Arc<dyn TabPlatform>,
        config_source: Arc<dyn ConfigSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let is_vivaldi = panel::is_vivaldi(&platform.user_agent(), platform.has_vendor_object());
        Self {
            platform,
            config_source,
            clock,
            config_cache: ConfigCache::default(),
            last_active: None,
            injected: HashSet::new(),
            is_vivaldi,
        }
    }

    pub fn last_active(&self) -> Option<TabId> {
        self.last_active
    }

    pub fn is_injected(&self, tab: TabId) -> bool {
        self.injected.contains(&tab)
    }

    pub fn is_vivaldi(&self) -> bool {
        self.is_vivaldi
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<OrchestratorEvent>) {
        info!(vivaldi = self.is_vivaldi, "orchestrator started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("orchestrator stopped");
    }

    pub async fn handle(&mut self, event: OrchestratorEvent) {
        match event {
            OrchestratorEvent::TabActivated(tab) => {
                self.on_tab_activated(tab).await;
            }
            OrchestratorEvent::TabUpdated { tab, status } => self.on_tab_updated(tab, status),
            OrchestratorEvent::TabRemoved(tab) => self.on_tab_removed(tab),
            OrchestratorEvent::Message {
                sender,
                message,
                reply,
            } => {
                let answer = self.on_message(sender, message).await;
                if let (Some(answer), Some(reply)) = (answer, reply) {
                    if reply.send(answer).is_err() {
                        trace!("query sender went away before the reply");
                    }
                }
            }
            OrchestratorEvent::ConfigChanged(delta) => {
                self.config_cache.invalidate();
                debug!(keys = ?delta.keys().collect::<Vec<_>>(), "config changed");
            }
        }
    }

    pub async fn on_tab_activated(&mut self, tab: TabId) -> Activation {
        let previous = self.last_active.replace(tab);
        let Some(previous) = previous.filter(|p| *p != tab) else {
            return Activation::NoPrevious;
        };

        let cfg = self.config().await;
        if !cfg.enabled {
            trace!("disabled; not dispatching");
            return Activation::Disabled;
        }

        let info = match self.platform.get_tab(previous).await {
            Ok(info) => info,
            Err(err) => {
                debug!(tab = %previous, error = %err, "previous tab unavailable");
                return Activation::Unreachable(previous);
            }
        };
        let site_enabled = info
            .url
            .as_deref()
            .and_then(host_of)
            .is_some_and(|host| cfg.site_enabled(&host, Feature::TabSwitch));
        if !site_enabled {
            debug!(tab = %previous, url = ?info.url, "tab switching disabled for this site");
            return Activation::SiteDisabled(previous);
        }

        let cached = self.injected.contains(&previous);
        if !self.ensure_engine(previous).await {
            return Activation::Unreachable(previous);
        }

        match self.send_try_pip(previous).await {
            Err(DeliveryError::NoReceiver) if cached => {
                // The cached engine went away without a reload; probe again.
                debug!(tab = %previous, "cached engine gone");
                if !self.ensure_engine(previous).await {
                    return Activation::Unreachable(previous);
                }
                let retried = self.send_try_pip(previous).await;
                Self::outcome(previous, retried)
            }
            result => Self::outcome(previous, result),
        }
    }

    fn outcome(tab: TabId, result: Result<(), DeliveryError>) -> Activation {
        match result {
            Ok(()) => {
                debug!(%tab, "tryPiP sent");
                Activation::Dispatched(tab)
            }
            Err(err) => {
                debug!(%tab, error = %err, "could not send tryPiP");
                Activation::Unreachable(tab)
            }
        }
    }

    /// Send `tryPiP`; a failed delivery drops the tab from the engine cache.
    async fn send_try_pip(&mut self, tab: TabId) -> Result<(), DeliveryError> {
        let sent = self
            .platform
            .send(tab, Directive::try_pip(PipReason::TabSwitch))
            .await;
        if sent.is_err() {
            self.injected.remove(&tab);
        }
        sent.map(|_| ())
    }

    /// A fresh load replaces the page and its engine.
    pub fn on_tab_updated(&mut self, tab: TabId, status: TabStatus) {
        if status == TabStatus::Loading && self.injected.remove(&tab) {
            trace!(%tab, "engine cache cleared on load");
        }
    }

    pub fn on_tab_removed(&mut self, tab: TabId) {
        self.injected.remove(&tab);
        if self.last_active == Some(tab) {
            self.last_active = None;
        }
    }

    pub async fn on_message(
        &mut self,
        sender: Option<TabId>,
        message: OrchestratorInbound,
    ) -> Option<Reply> {
        match message {
            OrchestratorInbound::Notification(Notification::PipEntered { reason }) => {
                info!(tab = ?sender, %reason, "PiP entered in tab");
                None
            }
            OrchestratorInbound::Notification(Notification::PipExited) => {
                info!(tab = ?sender, "PiP exited in tab");
                None
            }
            OrchestratorInbound::Query(Query::IsVivaldi) => {
                let is_panel = match sender {
                    Some(tab) if self.is_vivaldi => self.is_panel(tab).await,
                    _ => false,
                };
                Some(Reply::Capability(CapabilityReply {
                    is_vivaldi: self.is_vivaldi,
                    is_panel,
                }))
            }
        }
    }

    /// Probe with `ping`; inject when nothing answers.
    async fn ensure_engine(&mut self, tab: TabId) -> bool {
        if self.injected.contains(&tab) {
            return true;
        }
        match self.platform.send(tab, Directive::Ping).await {
            Ok(Some(reply)) if reply.is_pong() => {
                self.injected.insert(tab);
                return true;
            }
            Ok(_) => trace!(%tab, "ping unanswered"),
            Err(err) => trace!(%tab, error = %err, "ping failed"),
        }
        match self.platform.inject_engine(tab).await {
            Ok(()) => {
                info!(%tab, "engine injected");
                self.injected.insert(tab);
                true
            }
            Err(err) => {
                debug!(%tab, error = %err, "could not inject engine");
                false
            }
        }
    }

    async fn is_panel(&self, tab: TabId) -> bool {
        let Ok(info) = self.platform.get_tab(tab).await else {
            return false;
        };
        let window_width = match self.platform.get_window(info.window_id).await {
            Ok(window) => window.width,
            Err(_) => None,
        };
        panel::detect_panel(info.side_data.as_ref(), info.width, window_width)
    }

    async fn config(&mut self) -> Config {
        let now = self.clock.now_ms();
        if let Some(cfg) = self.config_cache.get(now) {
            return cfg.clone();
        }
        match self.config_source.get().await {
            Ok(cfg) => {
                self.config_cache.store(cfg.clone(), now);
                cfg
            }
            Err(err) => {
                debug!(error = %err, "config read failed; using defaults");
                Config::default()
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
