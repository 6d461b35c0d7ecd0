//! Decision Engine: one instance per page, dropped with it.
//!
//! Every input arrives as an [`EngineEvent`] or as a due timer. Handlers
//! never fail outward; platform refusals end in a logged no-op or in the
//! recovery banner.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use autopip_core::attempt::{AttemptSkip, Effect, FailureKind, Session};
use autopip_core::cache::{ConfigCache, FreshCache, VIDEO_LIST_FRESHNESS_MS, VIEWPORT_FRESHNESS_MS};
use autopip_core::config::{Config, Feature};
use autopip_core::panel;
use autopip_core::ports::{Clock, ConfigSource};
use autopip_core::protocol::{Directive, Notification, Reply};
use autopip_core::recovery::{
    self, BANNER_AUTO_HIDE_MS, BANNER_INTERACTION_HIDE_MS, BannerKind, RecoveryUi, TOAST_LINGER_MS,
};
use autopip_core::selector::{self, VideoProbe};
use autopip_core::types::{PipReason, VideoId, Viewport, Visibility};
use autopip_core::viewport::{
    CollapseThresholds, CollapseTracker, Debounce, Transition, ViewportPoller, is_collapsed,
};

use crate::events::{EngineEvent, InteractionKind};
use crate::platform::{Notifier, PageSurface, RecoverySurface};
use crate::timers::{Timer, TimerSet};

// ─── Constants ────────────────────────────────────────────────────

pub const INITIAL_RECHECK_MS: u64 = 2_000;
pub const VIDEO_RECHECK_MS: u64 = 500;
pub const NAVIGATION_RECHECK_MS: u64 = 1_000;

// ─── Types ────────────────────────────────────────────────────────

/// What asked for a collapse check. Only the latest one survives the
/// debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSource {
    Start,
    Recheck,
    Resize,
    Fullscreen,
    Visibility,
    Poll,
}

impl CheckSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Recheck => "recheck",
            Self::Resize => "resize",
            Self::Fullscreen => "fullscreen",
            Self::Visibility => "visibility",
            Self::Poll => "poll",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Entered,
    Failed(FailureKind),
    Skipped(AttemptSkip),
}

/// Collaborators of one engine.
#[derive(Clone)]
pub struct EnginePorts {
    pub page: Arc<dyn PageSurface>,
    pub ui: Arc<dyn RecoverySurface>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<dyn ConfigSource>,
    pub clock: Arc<dyn Clock>,
}

enum Wake {
    Event(Option<EngineEvent>),
    Timer,
}

// ─── Engine ───────────────────────────────────────────────────────

pub struct DecisionEngine {
    page: Arc<dyn PageSurface>,
    ui: Arc<dyn RecoverySurface>,
    notifier: Arc<dyn Notifier>,
    config_source: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,

    host: String,
    /// Panel-collapse detection runs only on the vendor that has panels.
    collapse_monitor: bool,

    session: Session,
    recovery: RecoveryUi,
    collapse: CollapseTracker,
    collapse_check: Debounce<CheckSource>,
    poller: ViewportPoller,
    timers: TimerSet,

    config_cache: ConfigCache,
    viewport_cache: FreshCache<Viewport>,
    video_cache: FreshCache<Vec<VideoProbe>>,

    last_visibility: Visibility,
    pip_action_registered: bool,
    inert: bool,
}

impl DecisionEngine {
    pub fn new(ports: EnginePorts) -> Self {
        let host = ports.page.host();
        let collapse_monitor =
            panel::is_vivaldi(&ports.page.user_agent(), ports.page.has_vendor_object());
        let last_visibility = ports.page.visibility();
        Self {
            page: ports.page,
            ui: ports.ui,
            notifier: ports.notifier,
            config_source: ports.config,
            clock: ports.clock,
            host,
            collapse_monitor,
            session: Session::new(),
            recovery: RecoveryUi::new(),
            collapse: CollapseTracker::new(),
            collapse_check: Debounce::new(),
            poller: ViewportPoller::new(),
            timers: TimerSet::new(),
            config_cache: ConfigCache::default(),
            viewport_cache: FreshCache::new(VIEWPORT_FRESHNESS_MS),
            video_cache: FreshCache::new(VIDEO_LIST_FRESHNESS_MS),
            last_visibility,
            pip_action_registered: false,
            inert: false,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn recovery(&self) -> &RecoveryUi {
        &self.recovery
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn collapse_monitor(&self) -> bool {
        self.collapse_monitor
    }

    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// Immediate answer to a directive, sent before any attempt runs.
    pub fn reply_to(directive: &Directive) -> Reply {
        match directive {
            Directive::Ping => Reply::pong(),
            Directive::TryPip { .. } => Reply::ack(),
        }
    }

    /// Earliest pending deadline, `None` when idle or inert.
    pub fn next_deadline(&self) -> Option<u64> {
        if self.inert {
            return None;
        }
        match (self.timers.next_deadline(), self.collapse_check.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Start-up: media-session registration, poll, initial check and its
    /// delayed recheck.
    pub async fn start(&mut self) {
        let cfg = self.config().await;
        self.sync_pip_action(&cfg);

        if !self.collapse_monitor {
            debug!(host = %self.host, "collapse monitor off");
            return;
        }
        let now = self.clock.now_ms();
        let viewport = self.viewport(now);
        self.poller.observe(viewport);
        debug!(host = %self.host, %viewport, "collapse monitor on");
        self.schedule_poll(now);
        self.request_collapse_check(CheckSource::Start).await;
        self.timers
            .schedule(Timer::InitialRecheck, now.saturating_add(INITIAL_RECHECK_MS));
    }

    /// Drive the engine from `events` until the channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        self.start().await;
        loop {
            let wait_ms = self
                .next_deadline()
                .map(|at| at.saturating_sub(self.clock.now_ms()));
            let clock = Arc::clone(&self.clock);
            let wake = tokio::select! {
                event = events.recv() => Wake::Event(event),
                () = async move {
                    match wait_ms {
                        Some(ms) => clock.sleep_ms(ms).await,
                        None => std::future::pending::<()>().await,
                    }
                } => Wake::Timer,
            };
            match wake {
                Wake::Event(Some(event)) => self.handle(event).await,
                Wake::Event(None) => break,
                Wake::Timer => self.fire_due().await,
            }
        }
        debug!(host = %self.host, "engine stopped");
    }

    pub async fn handle(&mut self, event: EngineEvent) {
        if self.inert {
            if matches!(event, EngineEvent::BannerClicked | EngineEvent::BannerClosed) {
                self.hide_toast();
                self.hide_banner();
            }
            return;
        }
        trace!(host = %self.host, channel = event.channel(), "event");

        match event {
            EngineEvent::VisibilityChanged(visibility) => self.on_visibility(visibility).await,
            EngineEvent::ViewportResized => {
                self.viewport_cache.invalidate();
                self.request_collapse_check(CheckSource::Resize).await;
            }
            EngineEvent::FullscreenChanged => {
                self.viewport_cache.invalidate();
                self.request_collapse_check(CheckSource::Fullscreen).await;
            }
            EngineEvent::Interaction(kind) => self.on_interaction(kind),
            EngineEvent::PipEntered => {
                self.session.platform_entered();
                debug!(host = %self.host, "PiP entered (platform)");
            }
            EngineEvent::PipLeft => {
                self.session.platform_left();
                debug!(host = %self.host, "PiP left (platform)");
            }
            EngineEvent::VideoAdded => {
                self.video_cache.invalidate();
                self.schedule_recheck(Timer::VideoRecheck, VIDEO_RECHECK_MS);
            }
            EngineEvent::MediaStateChanged => self.video_cache.invalidate(),
            EngineEvent::SiteNavigated => {
                self.video_cache.invalidate();
                self.schedule_recheck(Timer::NavigationRecheck, NAVIGATION_RECHECK_MS);
            }
            EngineEvent::Directive { directive, reply } => {
                self.on_directive(directive, reply).await;
            }
            EngineEvent::BannerClicked => self.on_banner_clicked().await,
            EngineEvent::BannerClosed => self.hide_banner(),
            EngineEvent::MediaSessionAction => {
                let cfg = self.config().await;
                if cfg.enabled {
                    self.attempt(PipReason::MediaSession, &cfg).await;
                }
            }
            EngineEvent::ConfigChanged(delta) => self.on_config_changed(&delta).await,
            EngineEvent::ContextInvalidated => {
                info!(host = %self.host, "extension context invalidated; engine inert");
                self.inert = true;
                self.timers.clear();
                self.collapse_check.cancel();
            }
        }
    }

    /// Fire every timer whose deadline has passed, earliest first.
    pub async fn fire_due(&mut self) {
        while !self.inert {
            let now = self.clock.now_ms();
            let timer_due = self.timers.next_deadline().filter(|at| *at <= now);
            let check_due = self.collapse_check.deadline().filter(|at| *at <= now);
            let check_first = match (timer_due, check_due) {
                (None, None) => break,
                (Some(timer_at), Some(check_at)) => check_at <= timer_at,
                (None, Some(_)) => true,
                (Some(_), None) => false,
            };

            if check_first {
                if let Some(source) = self.collapse_check.take_due(now) {
                    self.run_collapse_check(source).await;
                }
            } else if let Some(timer) = self.timers.pop_due(now) {
                self.fire(timer).await;
            }
        }
    }

    // ─── Event handlers ───────────────────────────────────────────

    async fn on_visibility(&mut self, visibility: Visibility) {
        let previous = std::mem::replace(&mut self.last_visibility, visibility);
        let cfg = self.config().await;
        let now = self.clock.now_ms();

        if cfg.enabled {
            match (previous, visibility) {
                (Visibility::Visible, Visibility::Hidden) => {
                    if cfg.site_enabled(&self.host, Feature::TabSwitch) {
                        let at = now.saturating_add(cfg.tab_switch_delay);
                        self.timers.schedule(Timer::TabSwitchAttempt, at);
                        debug!(host = %self.host, delay_ms = cfg.tab_switch_delay, "page hidden; attempt scheduled");
                    } else {
                        debug!(host = %self.host, "tab switching disabled for this site");
                    }
                }
                (Visibility::Hidden, Visibility::Visible) => {
                    self.timers.cancel(Timer::TabSwitchAttempt);
                    debug!(host = %self.host, "page visible again");
                    self.maybe_exit(&cfg).await;
                }
                _ => {}
            }
        }

        if self.collapse_monitor && self.timers.is_pending(Timer::Poll) {
            self.schedule_poll(now);
        }
        self.request_collapse_check(CheckSource::Visibility).await;
    }

    fn on_interaction(&mut self, kind: InteractionKind) {
        let now = self.clock.now_ms();
        self.session.record_interaction(now);
        if kind.dismisses_banner() && self.recovery.note_interaction() {
            self.timers.schedule(
                Timer::BannerHide,
                now.saturating_add(BANNER_INTERACTION_HIDE_MS),
            );
            debug!(host = %self.host, "interaction while banner shown");
        }
    }

    async fn on_directive(&mut self, directive: Directive, reply: Option<oneshot::Sender<Reply>>) {
        if let Some(reply) = reply {
            if reply.send(Self::reply_to(&directive)).is_err() {
                trace!(host = %self.host, "directive sender went away before the reply");
            }
        }
        if let Some(reason) = directive.reason() {
            debug!(host = %self.host, %reason, "tryPiP directive");
            let cfg = self.config().await;
            self.attempt(reason, &cfg).await;
        }
    }

    /// Banner body click: arm, confirm with a toast, retry under the click's
    /// own gesture.
    async fn on_banner_clicked(&mut self) {
        let cfg = self.config().await;
        let now = self.clock.now_ms();
        self.session.arm(now, cfg.arm_duration_ms());
        info!(host = %self.host, minutes = cfg.arm_minutes, "armed");
        self.show_toast(recovery::armed_toast_trying(cfg.arm_minutes));

        match self.attempt(PipReason::Armed, &cfg).await {
            AttemptOutcome::Entered => {}
            AttemptOutcome::Failed(_) => {
                self.show_toast(recovery::armed_toast_retry_later(cfg.arm_minutes));
                self.schedule_toast_hide();
            }
            AttemptOutcome::Skipped(_) => self.schedule_toast_hide(),
        }
    }

    async fn on_config_changed(&mut self, delta: &Map<String, Value>) {
        self.config_cache.invalidate();
        debug!(host = %self.host, keys = ?delta.keys().collect::<Vec<_>>(), "config changed");
        let cfg = self.config().await;
        self.sync_pip_action(&cfg);
    }

    async fn fire(&mut self, timer: Timer) {
        match timer {
            Timer::TabSwitchAttempt => {
                let cfg = self.config().await;
                if cfg.enabled && cfg.site_enabled(&self.host, Feature::TabSwitch) {
                    self.attempt(PipReason::TabSwitch, &cfg).await;
                }
            }
            Timer::Poll => self.poll().await,
            Timer::InitialRecheck | Timer::VideoRecheck | Timer::NavigationRecheck => {
                self.request_collapse_check(CheckSource::Recheck).await;
            }
            Timer::BannerHide => {
                if self.recovery.hide_banner() {
                    self.ui.hide_banner();
                }
            }
            Timer::ToastHide => {
                if self.recovery.hide_toast() {
                    self.ui.hide_toast();
                }
            }
        }
    }

    // ─── Collapse monitor ─────────────────────────────────────────

    async fn request_collapse_check(&mut self, source: CheckSource) {
        if !self.collapse_monitor {
            return;
        }
        let cfg = self.config().await;
        if !cfg.enabled {
            return;
        }
        if !cfg.site_enabled(&self.host, Feature::PanelCollapse) {
            trace!(host = %self.host, "panel collapse disabled for this site");
            return;
        }
        let now = self.clock.now_ms();
        let deadline = self.collapse_check.schedule(source, now, cfg.debounce_ms);
        trace!(host = %self.host, source = source.as_str(), deadline, "collapse check deferred");
    }

    async fn run_collapse_check(&mut self, source: CheckSource) {
        let cfg = self.config().await;
        if !cfg.enabled || !cfg.site_enabled(&self.host, Feature::PanelCollapse) {
            return;
        }
        let now = self.clock.now_ms();
        let viewport = self.viewport(now);
        let collapsed = is_collapsed(viewport, CollapseThresholds::from(&cfg));

        match self.collapse.observe(collapsed) {
            Some(Transition::Collapsed) => {
                debug!(host = %self.host, %viewport, source = source.as_str(), "transitioned to collapsed");
                self.attempt(PipReason::Collapse, &cfg).await;
            }
            Some(Transition::Expanded) => {
                debug!(host = %self.host, %viewport, source = source.as_str(), "transitioned to expanded");
                self.hide_toast();
                self.maybe_exit(&cfg).await;
            }
            None => {}
        }
    }

    async fn poll(&mut self) {
        let now = self.clock.now_ms();
        let viewport = self.viewport(now);
        if self.poller.observe(viewport) {
            debug!(host = %self.host, %viewport, "viewport changed");
            self.request_collapse_check(CheckSource::Poll).await;
        }
        self.schedule_poll(now);
    }

    fn schedule_poll(&mut self, now: u64) {
        let interval = ViewportPoller::interval_ms(self.last_visibility);
        self.timers
            .schedule(Timer::Poll, now.saturating_add(interval));
    }

    fn schedule_recheck(&mut self, timer: Timer, delay_ms: u64) {
        if self.collapse_monitor {
            let now = self.clock.now_ms();
            self.timers.schedule(timer, now.saturating_add(delay_ms));
        }
    }

    /// Visual viewport when available, else the layout viewport.
    fn viewport(&mut self, now: u64) -> Viewport {
        if let Some(viewport) = self.viewport_cache.get(now) {
            return *viewport;
        }
        let viewport = self
            .page
            .visual_viewport()
            .unwrap_or_else(|| self.page.layout_viewport());
        self.viewport_cache.store(viewport, now);
        viewport
    }

    // ─── Attempts ─────────────────────────────────────────────────

    fn best_video(&mut self, now: u64) -> Option<VideoId> {
        let layout = self.page.layout_viewport();
        if self.video_cache.get(now).is_none() {
            let found = selector::discover(self.page.as_ref(), &self.host);
            self.video_cache.store(found, now);
        }
        let candidates = self
            .video_cache
            .get(now)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let best = selector::select_best(candidates, layout);
        trace!(host = %self.host, candidates = candidates.len(), ?best, "video selection");
        best
    }

    async fn attempt(&mut self, reason: PipReason, cfg: &Config) -> AttemptOutcome {
        let now = self.clock.now_ms();
        // The arm click carries its own gesture and is never throttled.
        let begun = if reason == PipReason::Armed {
            self.session.begin_unthrottled(now);
            Ok(())
        } else {
            self.session.begin(now)
        };
        if let Err(skip) = begun {
            debug!(host = %self.host, %reason, ?skip, "attempt throttled");
            return AttemptOutcome::Skipped(skip);
        }

        let Some(video) = self.best_video(now) else {
            self.session.abandon(AttemptSkip::NoCandidate);
            debug!(host = %self.host, %reason, "no video found for PiP");
            return AttemptOutcome::Skipped(AttemptSkip::NoCandidate);
        };

        if self.page.pip_active() {
            self.session.abandon(AttemptSkip::AlreadyInPip);
            debug!(host = %self.host, %reason, "already in PiP");
            return AttemptOutcome::Skipped(AttemptSkip::AlreadyInPip);
        }

        let gesture = self.session.assess_gesture(reason, now);
        debug!(
            host = %self.host,
            %reason,
            %video,
            armed = gesture.armed,
            recent_interaction = gesture.recent_interaction,
            since_interaction_ms = ?gesture.since_interaction_ms,
            fail_count = self.session.tab_switch_fail_count(),
            "attempting PiP"
        );
        if gesture.wait_ms > 0 {
            self.clock.sleep_ms(gesture.wait_ms).await;
        }

        match self.page.request_pip(video).await {
            Ok(()) => {
                info!(host = %self.host, %reason, %video, "entered PiP");
                let effects = self.session.entered(reason);
                self.apply(effects, cfg).await;
                AttemptOutcome::Entered
            }
            Err(err) => {
                let now = self.clock.now_ms();
                let (kind, banner) = self.session.failed(reason, &err, now);
                match kind {
                    FailureKind::GestureRejected => debug!(
                        host = %self.host,
                        %reason,
                        fail_count = self.session.tab_switch_fail_count(),
                        "PiP blocked: no user gesture"
                    ),
                    FailureKind::Other => {
                        warn!(host = %self.host, %reason, error = %err, "PiP request failed");
                    }
                }
                if let Some(kind) = banner {
                    self.apply(vec![Effect::ShowBanner(kind)], cfg).await;
                }
                AttemptOutcome::Failed(kind)
            }
        }
    }

    /// Exit PiP on expand or return. A no-op when nothing is in PiP.
    async fn maybe_exit(&mut self, cfg: &Config) {
        if !cfg.exit_on_expand {
            debug!(host = %self.host, "exitOnExpand disabled; staying in PiP");
            return;
        }
        if !self.page.pip_active() {
            trace!(host = %self.host, "no PiP element to exit from");
            return;
        }
        match self.page.exit_pip().await {
            Ok(()) => {
                info!(host = %self.host, "exited PiP");
                let effects = self.session.exited();
                self.apply(effects, cfg).await;
            }
            Err(err) => debug!(host = %self.host, error = %err, "exit PiP failed"),
        }
    }

    // ─── Effects ──────────────────────────────────────────────────

    async fn apply(&mut self, effects: Vec<Effect>, cfg: &Config) {
        for effect in effects {
            match effect {
                Effect::HideToast => self.hide_toast(),
                Effect::HideBanner => self.hide_banner(),
                Effect::ShowBanner(kind) => self.show_banner(kind, cfg),
                Effect::Notify(notification) => self.notify(notification).await,
            }
        }
    }

    fn show_banner(&mut self, kind: BannerKind, cfg: &Config) {
        if self.recovery.request_banner(kind, cfg.show_block_alerts) {
            let now = self.clock.now_ms();
            self.ui.show_banner(kind);
            self.timers
                .schedule(Timer::BannerHide, now.saturating_add(BANNER_AUTO_HIDE_MS));
            debug!(host = %self.host, ?kind, "interaction banner shown");
        } else if !cfg.show_block_alerts {
            debug!(host = %self.host, "block alerts disabled");
        } else {
            debug!(host = %self.host, "banner already showing");
        }
    }

    fn hide_banner(&mut self) {
        self.timers.cancel(Timer::BannerHide);
        if self.recovery.hide_banner() {
            self.ui.hide_banner();
        }
    }

    fn show_toast(&mut self, text: String) {
        self.timers.cancel(Timer::ToastHide);
        self.ui.show_toast(&text);
        self.recovery.show_toast(text);
    }

    fn hide_toast(&mut self) {
        self.timers.cancel(Timer::ToastHide);
        if self.recovery.hide_toast() {
            self.ui.hide_toast();
        }
    }

    fn schedule_toast_hide(&mut self) {
        let now = self.clock.now_ms();
        self.timers
            .schedule(Timer::ToastHide, now.saturating_add(TOAST_LINGER_MS));
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.notify(notification).await {
            debug!(host = %self.host, error = %err, "could not notify orchestrator");
        }
    }

    // ─── Config ───────────────────────────────────────────────────

    /// Cached snapshot; built-in defaults when the store cannot be read.
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
                debug!(host = %self.host, error = %err, "config read failed; using defaults");
                Config::default()
            }
        }
    }

    /// Keep the native PiP action handler registered exactly while the
    /// tab-switch feature is on for this host.
    fn sync_pip_action(&mut self, cfg: &Config) {
        if !self.page.supports_pip_action() {
            return;
        }
        let wanted = cfg.enabled && cfg.site_enabled(&self.host, Feature::TabSwitch);
        if wanted != self.pip_action_registered {
            self.page.set_pip_action_handler(wanted);
            self.pip_action_registered = wanted;
            debug!(host = %self.host, registered = wanted, "media-session PiP action handler");
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
