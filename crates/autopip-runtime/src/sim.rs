//! Deterministic in-memory browser.
//!
//! Hosts the real [`TabCoordinator`] and one [`DecisionEngine`] per tab on a
//! virtual clock. Cross-context messages go through FIFO inboxes drained
//! between steps, so a scenario always produces the same trace.
//!
//! The platform half models only what the engine depends on: a gesture
//! requirement for entering PiP (transient activation after a click in the
//! page), a single PiP window per browser, and per-tab visibility.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use autopip_core::config::{Config, host_of};
use autopip_core::error::{ConfigError, DeliveryError, InjectError, PipError, TabError};
use autopip_core::ports::{Clock, ConfigSource, ManualClock};
use autopip_core::protocol::{Directive, Notification, OrchestratorInbound, Reply};
use autopip_core::recovery::BannerKind;
use autopip_core::selector::{FrameAccess, MediaState, ReadyState, VideoDocument, VideoProbe};
use autopip_core::types::{Rect, TabId, VideoId, Viewport, Visibility, WindowId};
use autopip_engine::{
    DecisionEngine, EngineEvent, EnginePorts, InteractionKind, Notifier, PageSurface, RecoverySurface,
};
use autopip_orchestrator::{OrchestratorEvent, TabCoordinator, TabInfo, TabPlatform, TabStatus, WindowInfo};

/// Virtual epoch of every simulation (2026-02-25T12:00:00Z).
pub const SIM_EPOCH_MS: u64 = 1_772_020_800_000;
/// How long a click in the page lets it start PiP.
pub const TRANSIENT_ACTIVATION_MS: u64 = 5_000;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const WINDOW: WindowId = WindowId(1);
const WINDOW_WIDTH: u32 = 1600;
const WINDOW_HEIGHT: u32 = 900;
const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1280,
    height: 720,
};

// ─── Trace ────────────────────────────────────────────────────────

/// Platform-visible effect observed during a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum TraceEvent {
    Injected {
        tab: TabId,
    },
    DirectiveSent {
        tab: TabId,
        directive: Directive,
    },
    PipRequested {
        tab: TabId,
        video: VideoId,
        granted: bool,
    },
    PipExited {
        tab: TabId,
    },
    BannerShown {
        tab: TabId,
        kind: BannerKind,
    },
    BannerHidden {
        tab: TabId,
    },
    ToastShown {
        tab: TabId,
        text: String,
    },
    ToastHidden {
        tab: TabId,
    },
    Notified {
        tab: TabId,
        notification: Notification,
    },
    ActionHandler {
        tab: TabId,
        registered: bool,
    },
}

impl TraceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Injected { .. } => "injected",
            Self::DirectiveSent { .. } => "directiveSent",
            Self::PipRequested { .. } => "pipRequested",
            Self::PipExited { .. } => "pipExited",
            Self::BannerShown { .. } => "bannerShown",
            Self::BannerHidden { .. } => "bannerHidden",
            Self::ToastShown { .. } => "toastShown",
            Self::ToastHidden { .. } => "toastHidden",
            Self::Notified { .. } => "notified",
            Self::ActionHandler { .. } => "actionHandler",
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Injected { tab } => write!(f, "tab {tab}: engine injected"),
            Self::DirectiveSent { tab, directive } => match directive {
                Directive::Ping => write!(f, "tab {tab}: ping"),
                Directive::TryPip { .. } => {
                    let reason = directive.reason().map(|r| r.as_str()).unwrap_or_default();
                    write!(f, "tab {tab}: tryPiP ({reason})")
                }
            },
            Self::PipRequested {
                tab,
                video,
                granted,
            } => {
                let outcome = if *granted { "granted" } else { "rejected: no user gesture" };
                write!(f, "tab {tab}: requestPictureInPicture({video}) {outcome}")
            }
            Self::PipExited { tab } => write!(f, "tab {tab}: exitPictureInPicture"),
            Self::BannerShown { tab, kind } => write!(f, "tab {tab}: banner \"{}\"", kind.message()),
            Self::BannerHidden { tab } => write!(f, "tab {tab}: banner hidden"),
            Self::ToastShown { tab, text } => write!(f, "tab {tab}: toast \"{text}\""),
            Self::ToastHidden { tab } => write!(f, "tab {tab}: toast hidden"),
            Self::Notified { tab, notification } => match notification {
                Notification::PipEntered { reason } => write!(f, "tab {tab}: notify pipEntered ({reason})"),
                Notification::PipExited => write!(f, "tab {tab}: notify pipExited"),
            },
            Self::ActionHandler { tab, registered } => {
                let verb = if *registered { "registered" } else { "unregistered" };
                write!(f, "tab {tab}: media-session PiP handler {verb}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    /// Milliseconds since the simulation started.
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: TraceEvent,
}

// ─── World ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SimVideo {
    id: VideoId,
    media: MediaState,
    rect: Rect,
    /// Matched by the site's primary-player selector.
    player: bool,
}

#[derive(Debug)]
struct SimTab {
    url: String,
    status: TabStatus,
    visibility: Visibility,
    viewport: Viewport,
    videos: Vec<SimVideo>,
    /// Element currently shown in the browser's PiP window.
    pip: Option<VideoId>,
    last_activation_ms: Option<u64>,
    /// Whether a live engine listens in this tab.
    engine_live: bool,
    /// Whether the page loads the engine by itself on load.
    auto_engine: bool,
    injectable: bool,
    banner: Option<BannerKind>,
    action_handler: bool,
}

#[derive(Debug, Default)]
struct World {
    tabs: BTreeMap<TabId, SimTab>,
    active: Option<TabId>,
    user_agent: String,
    has_vendor_object: bool,
    engine_inbox: Vec<(TabId, EngineEvent)>,
    orchestrator_inbox: Vec<(TabId, Notification)>,
    /// Tabs whose engine must be constructed before the next dispatch.
    pending_engines: Vec<TabId>,
    trace: Vec<TraceEntry>,
}

#[derive(Clone)]
struct Shared {
    world: Arc<Mutex<World>>,
    clock: ManualClock,
}

impl Shared {
    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: TraceEvent) {
        let at_ms = self.clock.now_ms().saturating_sub(SIM_EPOCH_MS);
        self.world().trace.push(TraceEntry { at_ms, event });
    }
}

// ─── Settings store ───────────────────────────────────────────────

/// In-memory settings store shared by every context.
pub struct SharedConfig {
    current: Mutex<Config>,
}

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self {
            current: Mutex::new(config),
        }
    }

    pub fn apply(&self, delta: &Map<String, Value>) -> Vec<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_changes(delta)
    }
}

#[async_trait]
impl ConfigSource for SharedConfig {
    async fn get(&self) -> Result<Config, ConfigError> {
        Ok(self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

// ─── Page ports ───────────────────────────────────────────────────

struct SimPage {
    tab: TabId,
    shared: Shared,
}

impl SimPage {
    fn read<T: Default>(&self, f: impl FnOnce(&SimTab) -> T) -> T {
        self.shared.world().tabs.get(&self.tab).map(f).unwrap_or_default()
    }
}

impl VideoDocument for SimPage {
    fn videos(&self) -> Vec<VideoProbe> {
        self.read(|tab| tab.videos.iter().map(probe).collect())
    }

    fn query_video(&self, _selector: &str) -> Option<VideoProbe> {
        self.read(|tab| tab.videos.iter().find(|v| v.player).map(probe))
    }

    fn frame_count(&self) -> usize {
        0
    }

    fn frame(&self, _index: usize) -> FrameAccess {
        FrameAccess::CrossOrigin
    }
}

fn probe(video: &SimVideo) -> VideoProbe {
    VideoProbe {
        id: video.id,
        media: Some(video.media),
        rect: Some(video.rect),
    }
}

#[async_trait]
impl PageSurface for SimPage {
    fn host(&self) -> String {
        self.read(|tab| host_of(&tab.url).unwrap_or_default())
    }

    fn user_agent(&self) -> String {
        self.shared.world().user_agent.clone()
    }

    fn has_vendor_object(&self) -> bool {
        self.shared.world().has_vendor_object
    }

    fn visual_viewport(&self) -> Option<Viewport> {
        Some(self.layout_viewport())
    }

    fn layout_viewport(&self) -> Viewport {
        self.shared
            .world()
            .tabs
            .get(&self.tab)
            .map_or(DEFAULT_VIEWPORT, |tab| tab.viewport)
    }

    fn visibility(&self) -> Visibility {
        self.read(|tab| tab.visibility)
    }

    fn pip_active(&self) -> bool {
        self.read(|tab| tab.pip.is_some())
    }

    async fn request_pip(&self, video: VideoId) -> Result<(), PipError> {
        let now = self.shared.clock.now_ms();
        let granted = {
            let mut world = self.shared.world();
            let Some(tab) = world.tabs.get(&self.tab) else {
                return Err(PipError::InvalidState("document detached".into()));
            };
            if !tab.videos.iter().any(|v| v.id == video) {
                return Err(PipError::InvalidState(format!("{video} not in document")));
            }
            let granted = tab
                .last_activation_ms
                .is_some_and(|at| now.saturating_sub(at) < TRANSIENT_ACTIVATION_MS);
            if granted {
                // One PiP window per browser: opening one closes any other.
                let mut displaced = Vec::new();
                for (id, other) in world.tabs.iter_mut() {
                    if other.pip.take().is_some() {
                        displaced.push(*id);
                    }
                }
                for id in displaced {
                    world.engine_inbox.push((id, EngineEvent::PipLeft));
                }
                if let Some(tab) = world.tabs.get_mut(&self.tab) {
                    tab.pip = Some(video);
                }
                world.engine_inbox.push((self.tab, EngineEvent::PipEntered));
            }
            granted
        };
        self.shared.record(TraceEvent::PipRequested {
            tab: self.tab,
            video,
            granted,
        });
        if granted {
            Ok(())
        } else {
            Err(PipError::NoUserGesture)
        }
    }

    async fn exit_pip(&self) -> Result<(), PipError> {
        let left = {
            let mut world = self.shared.world();
            let left = world
                .tabs
                .get_mut(&self.tab)
                .and_then(|tab| tab.pip.take())
                .is_some();
            if left {
                world.engine_inbox.push((self.tab, EngineEvent::PipLeft));
            }
            left
        };
        if !left {
            return Err(PipError::InvalidState("no picture-in-picture element".into()));
        }
        self.shared.record(TraceEvent::PipExited { tab: self.tab });
        Ok(())
    }

    fn supports_pip_action(&self) -> bool {
        true
    }

    fn set_pip_action_handler(&self, registered: bool) {
        if let Some(tab) = self.shared.world().tabs.get_mut(&self.tab) {
            tab.action_handler = registered;
        }
        self.shared.record(TraceEvent::ActionHandler {
            tab: self.tab,
            registered,
        });
    }
}

struct SimUi {
    tab: TabId,
    shared: Shared,
}

impl SimUi {
    fn set_banner(&self, banner: Option<BannerKind>) {
        if let Some(tab) = self.shared.world().tabs.get_mut(&self.tab) {
            tab.banner = banner;
        }
    }
}

impl RecoverySurface for SimUi {
    fn show_banner(&self, kind: BannerKind) {
        self.set_banner(Some(kind));
        self.shared
            .record(TraceEvent::BannerShown { tab: self.tab, kind });
    }

    fn hide_banner(&self) {
        self.set_banner(None);
        self.shared.record(TraceEvent::BannerHidden { tab: self.tab });
    }

    fn show_toast(&self, text: &str) {
        self.shared.record(TraceEvent::ToastShown {
            tab: self.tab,
            text: text.to_string(),
        });
    }

    fn hide_toast(&self) {
        self.shared.record(TraceEvent::ToastHidden { tab: self.tab });
    }
}

struct SimNotifier {
    tab: TabId,
    shared: Shared,
}

#[async_trait]
impl Notifier for SimNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DeliveryError> {
        self.shared.record(TraceEvent::Notified {
            tab: self.tab,
            notification,
        });
        self.shared
            .world()
            .orchestrator_inbox
            .push((self.tab, notification));
        Ok(())
    }
}

// ─── Tab platform ─────────────────────────────────────────────────

struct SimTabs {
    shared: Shared,
}

#[async_trait]
impl TabPlatform for SimTabs {
    async fn get_tab(&self, tab: TabId) -> Result<TabInfo, TabError> {
        let world = self.shared.world();
        let sim = world.tabs.get(&tab).ok_or(TabError::NotFound(tab))?;
        Ok(TabInfo {
            id: tab,
            window_id: WINDOW,
            url: Some(sim.url.clone()),
            status: sim.status,
            width: Some(sim.viewport.width),
            height: Some(sim.viewport.height),
            side_data: None,
        })
    }

    async fn get_window(&self, window: WindowId) -> Result<WindowInfo, TabError> {
        if window != WINDOW {
            return Err(TabError::Platform(format!("no window {}", window.0)));
        }
        Ok(WindowInfo {
            id: WINDOW,
            width: Some(WINDOW_WIDTH),
            height: Some(WINDOW_HEIGHT),
        })
    }

    async fn send(&self, tab: TabId, directive: Directive) -> Result<Option<Reply>, DeliveryError> {
        {
            let mut world = self.shared.world();
            let sim = world.tabs.get(&tab).ok_or(DeliveryError::TabClosed)?;
            if !sim.engine_live {
                return Err(DeliveryError::NoReceiver);
            }
            if matches!(directive, Directive::TryPip { .. }) {
                world
                    .engine_inbox
                    .push((tab, EngineEvent::directive(directive)));
            }
        }
        self.shared
            .record(TraceEvent::DirectiveSent { tab, directive });
        Ok(Some(DecisionEngine::reply_to(&directive)))
    }

    async fn inject_engine(&self, tab: TabId) -> Result<(), InjectError> {
        {
            let mut world = self.shared.world();
            let sim = world.tabs.get_mut(&tab).ok_or(InjectError::TabClosed)?;
            if !sim.injectable {
                return Err(InjectError::Denied(format!("cannot script {}", sim.url)));
            }
            sim.engine_live = true;
            world.pending_engines.push(tab);
        }
        self.shared.record(TraceEvent::Injected { tab });
        Ok(())
    }

    fn user_agent(&self) -> String {
        self.shared.world().user_agent.clone()
    }

    fn has_vendor_object(&self) -> bool {
        self.shared.world().has_vendor_object
    }
}

// ─── Scenario steps ───────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_video_width() -> f64 {
    640.0
}

fn default_video_height() -> f64 {
    360.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    /// Open a background tab. Its page loads the engine unless `engine` is false.
    #[serde(rename_all = "camelCase")]
    Open {
        tab: u64,
        url: String,
        #[serde(default = "default_true")]
        engine: bool,
        #[serde(default = "default_true")]
        injectable: bool,
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Add a paused video element.
    #[serde(rename_all = "camelCase")]
    AddVideo {
        tab: u64,
        video: u64,
        #[serde(default = "default_video_width")]
        width: f64,
        #[serde(default = "default_video_height")]
        height: f64,
        #[serde(default)]
        top: f64,
        #[serde(default)]
        player: bool,
    },
    /// Start playback, adding the element first if needed.
    Play { tab: u64, video: u64 },
    Pause { tab: u64, video: u64 },
    /// Focus a tab.
    Activate { tab: u64 },
    /// Click inside the page.
    Click { tab: u64 },
    Resize { tab: u64, width: u32, height: u32 },
    ClickBanner { tab: u64 },
    CloseBanner { tab: u64 },
    /// Platform media controls invoke the registered enter-PiP handler.
    MediaAction { tab: u64 },
    Navigate { tab: u64, url: String },
    Close { tab: u64 },
    SetConfig { changes: Map<String, Value> },
    /// Only let time pass.
    Wait,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Milliseconds since the simulation started.
    pub at: u64,
    #[serde(flatten)]
    pub action: Action,
}

// ─── Simulation ───────────────────────────────────────────────────

pub struct Simulation {
    shared: Shared,
    store: Arc<SharedConfig>,
    orchestrator: TabCoordinator,
    engines: BTreeMap<TabId, DecisionEngine>,
}

impl Simulation {
    pub fn new(config: Config, user_agent: &str) -> Self {
        let clock = ManualClock::new(SIM_EPOCH_MS);
        let world = World {
            user_agent: user_agent.to_string(),
            ..World::default()
        };
        let shared = Shared {
            world: Arc::new(Mutex::new(world)),
            clock: clock.clone(),
        };
        let store = Arc::new(SharedConfig::new(config));
        let orchestrator = TabCoordinator::new(
            Arc::new(SimTabs {
                shared: shared.clone(),
            }),
            store.clone(),
            Arc::new(clock),
        );
        Self {
            shared,
            store,
            orchestrator,
            engines: BTreeMap::new(),
        }
    }

    /// Milliseconds since the simulation started.
    pub fn elapsed_ms(&self) -> u64 {
        self.shared.clock.now_ms().saturating_sub(SIM_EPOCH_MS)
    }

    pub fn trace(&self) -> Vec<TraceEntry> {
        self.shared.world().trace.clone()
    }

    pub async fn run(&mut self, steps: &[Step]) {
        for step in steps {
            self.advance_to(step.at).await;
            self.apply(&step.action).await;
        }
    }

    /// Let virtual time pass up to `at` (relative), firing every deadline
    /// in order.
    pub async fn advance_to(&mut self, at: u64) {
        let target = SIM_EPOCH_MS.saturating_add(at);
        loop {
            let next = self
                .engines
                .values()
                .filter_map(DecisionEngine::next_deadline)
                .min()
                .filter(|next| *next <= target);
            let Some(next) = next else { break };
            if next > self.shared.clock.now_ms() {
                self.shared.clock.set(next);
            }
            let now = self.shared.clock.now_ms();
            let due: Vec<TabId> = self
                .engines
                .iter()
                .filter(|(_, engine)| engine.next_deadline().is_some_and(|at| at <= now))
                .map(|(tab, _)| *tab)
                .collect();
            for tab in due {
                if let Some(engine) = self.engines.get_mut(&tab) {
                    engine.fire_due().await;
                }
            }
            self.settle().await;
        }
        if target > self.shared.clock.now_ms() {
            self.shared.clock.set(target);
        }
    }

    pub async fn apply(&mut self, action: &Action) {
        debug!(at_ms = self.elapsed_ms(), ?action, "step");
        match action {
            Action::Open {
                tab,
                url,
                engine,
                injectable,
                width,
                height,
            } => {
                let tab = TabId(*tab);
                let viewport = Viewport::new(
                    width.unwrap_or(DEFAULT_VIEWPORT.width),
                    height.unwrap_or(DEFAULT_VIEWPORT.height),
                );
                {
                    let mut world = self.shared.world();
                    world.tabs.insert(
                        tab,
                        SimTab {
                            url: url.clone(),
                            status: TabStatus::Complete,
                            visibility: Visibility::Hidden,
                            viewport,
                            videos: Vec::new(),
                            pip: None,
                            last_activation_ms: None,
                            engine_live: *engine,
                            auto_engine: *engine,
                            injectable: *injectable,
                            banner: None,
                            action_handler: false,
                        },
                    );
                    if *engine {
                        world.pending_engines.push(tab);
                    }
                }
                self.settle().await;
            }
            Action::AddVideo {
                tab,
                video,
                width,
                height,
                top,
                player,
            } => {
                let tab = TabId(*tab);
                let added = SimVideo {
                    id: VideoId(*video),
                    media: MediaState::paused(ReadyState::HaveMetadata),
                    rect: Rect::new(0.0, *top, *width, *height),
                    player: *player,
                };
                self.with_tab(tab, |sim| sim.videos.push(added));
                self.send(tab, EngineEvent::VideoAdded).await;
            }
            Action::Play { tab, video } => {
                let tab = TabId(*tab);
                let id = VideoId(*video);
                let mut added = false;
                self.with_tab(tab, |sim| match sim.videos.iter_mut().find(|v| v.id == id) {
                    Some(existing) => existing.media = MediaState::playing(ReadyState::HaveEnoughData),
                    None => {
                        added = true;
                        sim.videos.push(SimVideo {
                            id,
                            media: MediaState::playing(ReadyState::HaveEnoughData),
                            rect: Rect::new(0.0, 0.0, default_video_width(), default_video_height()),
                            player: false,
                        });
                    }
                });
                let event = if added {
                    EngineEvent::VideoAdded
                } else {
                    EngineEvent::MediaStateChanged
                };
                self.send(tab, event).await;
            }
            Action::Pause { tab, video } => {
                let tab = TabId(*tab);
                let id = VideoId(*video);
                self.with_tab(tab, |sim| {
                    if let Some(existing) = sim.videos.iter_mut().find(|v| v.id == id) {
                        existing.media = MediaState::paused(ReadyState::HaveEnoughData);
                    }
                });
                self.send(tab, EngineEvent::MediaStateChanged).await;
            }
            Action::Activate { tab } => self.activate(TabId(*tab)).await,
            Action::Click { tab } => {
                let tab = TabId(*tab);
                self.click(tab);
                self.settle().await;
            }
            Action::Resize { tab, width, height } => {
                let tab = TabId(*tab);
                let viewport = Viewport::new(*width, *height);
                self.with_tab(tab, |sim| sim.viewport = viewport);
                self.send(tab, EngineEvent::ViewportResized).await;
            }
            Action::ClickBanner { tab } => {
                let tab = TabId(*tab);
                if !self.banner_shown(tab) {
                    debug!(%tab, "no banner to click");
                    return;
                }
                self.click(tab);
                self.send(tab, EngineEvent::BannerClicked).await;
            }
            Action::CloseBanner { tab } => {
                let tab = TabId(*tab);
                if !self.banner_shown(tab) {
                    return;
                }
                self.click(tab);
                self.send(tab, EngineEvent::BannerClosed).await;
            }
            Action::MediaAction { tab } => {
                let tab = TabId(*tab);
                let now = self.shared.clock.now_ms();
                let mut registered = false;
                self.with_tab(tab, |sim| {
                    registered = sim.action_handler;
                    if registered {
                        // Platform-originated: the media controls carry the gesture.
                        sim.last_activation_ms = Some(now);
                    }
                });
                if registered {
                    self.send(tab, EngineEvent::MediaSessionAction).await;
                }
            }
            Action::Navigate { tab, url } => self.navigate(TabId(*tab), url).await,
            Action::Close { tab } => {
                let tab = TabId(*tab);
                self.engines.remove(&tab);
                {
                    let mut world = self.shared.world();
                    world.tabs.remove(&tab);
                    if world.active == Some(tab) {
                        world.active = None;
                    }
                }
                self.orchestrator
                    .handle(OrchestratorEvent::TabRemoved(tab))
                    .await;
            }
            Action::SetConfig { changes } => {
                let applied = self.store.apply(changes);
                debug!(?applied, "settings changed");
                let tabs: Vec<TabId> = self.engines.keys().copied().collect();
                for tab in tabs {
                    self.queue(tab, EngineEvent::ConfigChanged(changes.clone()));
                }
                self.orchestrator
                    .handle(OrchestratorEvent::ConfigChanged(changes.clone()))
                    .await;
                self.settle().await;
            }
            Action::Wait => {}
        }
    }

    async fn activate(&mut self, tab: TabId) {
        let previous = {
            let mut world = self.shared.world();
            if !world.tabs.contains_key(&tab) {
                return;
            }
            let previous = world.active.replace(tab).filter(|p| *p != tab);
            if let Some(prev) = previous {
                if let Some(sim) = world.tabs.get_mut(&prev) {
                    sim.visibility = Visibility::Hidden;
                }
                world
                    .engine_inbox
                    .push((prev, EngineEvent::VisibilityChanged(Visibility::Hidden)));
            }
            let became_visible = world
                .tabs
                .get_mut(&tab)
                .map(|sim| std::mem::replace(&mut sim.visibility, Visibility::Visible))
                == Some(Visibility::Hidden);
            if became_visible {
                world
                    .engine_inbox
                    .push((tab, EngineEvent::VisibilityChanged(Visibility::Visible)));
            }
            previous
        };
        self.settle().await;
        debug!(%tab, previous = ?previous, "tab activated");
        self.orchestrator
            .handle(OrchestratorEvent::TabActivated(tab))
            .await;
        self.settle().await;
    }

    async fn navigate(&mut self, tab: TabId, url: &str) {
        self.engines.remove(&tab);
        let auto_engine = {
            let mut world = self.shared.world();
            let Some(sim) = world.tabs.get_mut(&tab) else {
                return;
            };
            sim.url = url.to_string();
            sim.status = TabStatus::Loading;
            sim.videos.clear();
            sim.pip = None;
            sim.banner = None;
            sim.action_handler = false;
            sim.engine_live = false;
            sim.auto_engine
        };
        self.orchestrator
            .handle(OrchestratorEvent::TabUpdated {
                tab,
                status: TabStatus::Loading,
            })
            .await;
        {
            let mut world = self.shared.world();
            if let Some(sim) = world.tabs.get_mut(&tab) {
                sim.status = TabStatus::Complete;
                sim.engine_live = auto_engine;
            }
            if auto_engine {
                world.pending_engines.push(tab);
            }
        }
        self.orchestrator
            .handle(OrchestratorEvent::TabUpdated {
                tab,
                status: TabStatus::Complete,
            })
            .await;
        self.settle().await;
    }

    /// A mouse click: mousedown then click, and transient activation.
    fn click(&self, tab: TabId) {
        let now = self.shared.clock.now_ms();
        self.with_tab(tab, |sim| sim.last_activation_ms = Some(now));
        self.queue(tab, EngineEvent::Interaction(InteractionKind::MouseDown));
        self.queue(tab, EngineEvent::Interaction(InteractionKind::Click));
    }

    fn banner_shown(&self, tab: TabId) -> bool {
        self.shared
            .world()
            .tabs
            .get(&tab)
            .is_some_and(|sim| sim.banner.is_some())
    }

    fn with_tab(&self, tab: TabId, f: impl FnOnce(&mut SimTab)) {
        if let Some(sim) = self.shared.world().tabs.get_mut(&tab) {
            f(sim);
        }
    }

    fn queue(&self, tab: TabId, event: EngineEvent) {
        self.shared.world().engine_inbox.push((tab, event));
    }

    async fn send(&mut self, tab: TabId, event: EngineEvent) {
        self.queue(tab, event);
        self.settle().await;
    }

    /// Drain every inbox until no context has work left.
    async fn settle(&mut self) {
        loop {
            let (pending, events, notes) = {
                let mut world = self.shared.world();
                (
                    std::mem::take(&mut world.pending_engines),
                    std::mem::take(&mut world.engine_inbox),
                    std::mem::take(&mut world.orchestrator_inbox),
                )
            };
            if pending.is_empty() && events.is_empty() && notes.is_empty() {
                break;
            }
            for tab in pending {
                self.load_engine(tab).await;
            }
            for (tab, event) in events {
                match self.engines.get_mut(&tab) {
                    Some(engine) => engine.handle(event).await,
                    None => debug!(%tab, channel = event.channel(), "no engine; event dropped"),
                }
            }
            for (tab, notification) in notes {
                self.orchestrator
                    .handle(OrchestratorEvent::Message {
                        sender: Some(tab),
                        message: OrchestratorInbound::Notification(notification),
                        reply: None,
                    })
                    .await;
            }
        }
    }

    async fn load_engine(&mut self, tab: TabId) {
        let ports = EnginePorts {
            page: Arc::new(SimPage {
                tab,
                shared: self.shared.clone(),
            }),
            ui: Arc::new(SimUi {
                tab,
                shared: self.shared.clone(),
            }),
            notifier: Arc::new(SimNotifier {
                tab,
                shared: self.shared.clone(),
            }),
            config: self.store.clone(),
            clock: Arc::new(self.shared.clock.clone()),
        };
        let mut engine = DecisionEngine::new(ports);
        engine.start().await;
        self.engines.insert(tab, engine);
    }
}

// ─── Tests ────────────────────────────────────────────────────────
