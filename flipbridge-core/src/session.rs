//! The viewer session state machine.
//!
//! [`SessionController`] is the only writer of [`ViewerSession`]. Every
//! transition returns the [`Effect`]s the driver has to carry out (mounting a
//! surface, posting commands, playing the page-turn cue, arming timers), so
//! the controller itself never performs I/O and can be exercised directly.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::message::{Direction, OutboundCommand};
use crate::surface::{viewer_url, InstanceId};

pub const TIMEOUT_MESSAGE: &str = "Loading timed out. The PDF may be too large or there might be connection issues. Please try again or use a different viewer.";
pub const MISSING_URL_MESSAGE: &str = "No PDF URL provided";
/// Upper bound on the pages a single repeated navigation may turn.
pub const MAX_NAVIGATION_STEPS: u32 = 500;
pub const DEFAULT_FAILURE_MESSAGE: &str = "Could not load PDF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone)]
pub struct ViewerSession {
    document_url: String,
    attempt: u32,
    status: Status,
    current_page: u32,
    total_pages: u32,
    audio_enabled: bool,
    is_fullscreen: bool,
    error_message: Option<String>,
    instance: InstanceId,
    pending_pages: VecDeque<u32>,
}

impl ViewerSession {
    fn new(document_url: String, audio_enabled: bool) -> Self {
        Self {
            document_url,
            attempt: 0,
            status: Status::Idle,
            current_page: 1,
            total_pages: 0,
            audio_enabled,
            is_fullscreen: false,
            error_message: None,
            instance: InstanceId::fresh(),
            pending_pages: VecDeque::new(),
        }
    }

    pub fn document_url(&self) -> &str {
        &self.document_url
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Zero while the page count is unknown.
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// The latest page set by an optimistic navigation that the surface has
    /// not yet confirmed.
    pub fn pending_page(&self) -> Option<u32> {
        self.pending_pages.back().copied()
    }

    pub fn unconfirmed_flips(&self) -> usize {
        self.pending_pages.len()
    }

    pub fn surface_mounted(&self) -> bool {
        matches!(self.status, Status::Loading | Status::Ready)
    }

    fn reset_attempt_scope(&mut self) {
        self.current_page = 1;
        self.total_pages = 0;
        self.pending_pages.clear();
        self.is_fullscreen = false;
    }

    fn clamp_page(&self, page: u32) -> u32 {
        if self.total_pages > 0 {
            page.clamp(1, self.total_pages)
        } else {
            page.max(1)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Mount {
        instance: InstanceId,
        viewer_url: String,
    },
    Unmount,
    Post(OutboundCommand),
    PlayCue {
        url: String,
        volume: f32,
    },
    ArmTimer {
        token: TimerToken,
        after: Duration,
    },
    CancelTimer {
        token: TimerToken,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StatusChanged {
        from: Status,
        to: Status,
    },
    PageChanged {
        current: u32,
        total: u32,
    },
    LoadFailed {
        attempt: u32,
        message: String,
        announce: bool,
    },
    FullscreenChanged(bool),
    AudioChanged(bool),
}

pub struct SessionController {
    session: ViewerSession,
    config: BridgeConfig,
    next_token: u64,
    armed: Option<TimerToken>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl SessionController {
    pub fn new(document_url: impl Into<String>, config: BridgeConfig) -> Self {
        let session = ViewerSession::new(document_url.into(), config.audio_enabled);
        Self {
            session,
            config,
            next_token: 0,
            armed: None,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<Mutex<Vec<SessionEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn armed_timer(&self) -> Option<TimerToken> {
        self.armed
    }

    pub fn start(&mut self) -> Vec<Effect> {
        if self.session.status != Status::Idle {
            warn!(status = ?self.session.status, "session already started");
            return Vec::new();
        }
        if self.session.document_url.trim().is_empty() {
            let mut effects = Vec::new();
            self.fail(MISSING_URL_MESSAGE.to_string(), true, &mut effects);
            return effects;
        }
        self.begin_attempt()
    }

    /// Fails the session before any surface is mounted.
    pub fn fail_preflight(&mut self, message: impl Into<String>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.session.status != Status::Idle {
            debug!("pre-flight result arrived after start; ignoring");
            return effects;
        }
        self.fail(message.into(), true, &mut effects);
        effects
    }

    /// Called once the surface for the current instance is mounted.
    pub fn surface_attached(&mut self) -> Vec<Effect> {
        if !self.session.surface_mounted() {
            return Vec::new();
        }
        let mut effects = vec![Effect::Post(OutboundCommand::Ping)];
        if self.session.attempt > 0 {
            effects.push(Effect::Post(OutboundCommand::InitAttempt {
                attempt: self.session.attempt,
            }));
        }
        effects
    }

    pub fn mark_ready(&mut self, pages: Option<u32>) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.session.status {
            Status::Loading => {
                self.disarm(&mut effects);
                self.set_status(Status::Ready);
                info!(
                    attempt = self.session.attempt,
                    document = %self.session.document_url,
                    "viewer ready"
                );
                effects.push(Effect::Post(OutboundCommand::SetAudio {
                    enabled: self.session.audio_enabled,
                }));
                effects.push(Effect::Post(OutboundCommand::InitNavigation));
            }
            Status::Ready => {}
            Status::Idle | Status::Error => {
                debug!(status = ?self.session.status, "ignoring readiness signal");
                return effects;
            }
        }
        if let Some(pages) = pages.filter(|&pages| pages > 0) {
            self.set_total_pages(pages);
        }
        effects
    }

    pub fn record_flip(&mut self, page: u32, total_pages: Option<u32>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.session.surface_mounted() {
            debug!(page, "ignoring page flip while no surface is mounted");
            return effects;
        }
        if let Some(total) = total_pages.filter(|&total| total > 0) {
            self.session.total_pages = total;
        }
        let page = self.session.clamp_page(page);
        // Confirmations arrive in the order the host navigated.
        let confirms_own_flip = self.session.pending_pages.front() == Some(&page);
        if confirms_own_flip {
            self.session.pending_pages.pop_front();
            if self.session.pending_pages.is_empty() {
                self.session.current_page = page;
            }
        } else {
            self.session.pending_pages.clear();
            self.session.current_page = page;
        }
        self.publish_pages();
        if self.session.audio_enabled && !confirms_own_flip {
            effects.push(self.cue());
        }
        effects
    }

    pub fn record_failure(&mut self, message: impl Into<String>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.session.surface_mounted() {
            debug!(status = ?self.session.status, "ignoring failure report");
            return effects;
        }
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        warn!(attempt = self.session.attempt, %message, "viewer reported failure");
        self.fail(message, true, &mut effects);
        effects
    }

    pub fn record_fullscreen(&mut self, is_fullscreen: bool) -> Vec<Effect> {
        if self.session.surface_mounted() && self.session.is_fullscreen != is_fullscreen {
            self.session.is_fullscreen = is_fullscreen;
            self.publish(SessionEvent::FullscreenChanged(is_fullscreen));
        }
        Vec::new()
    }

    pub fn on_timeout(&mut self, token: TimerToken) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.armed != Some(token) {
            debug!(?token, "ignoring stale load timer");
            return effects;
        }
        self.armed = None;
        if self.session.status != Status::Loading {
            return effects;
        }
        let announce = self
            .config
            .timeout_reporting
            .announces(self.session.attempt);
        warn!(
            attempt = self.session.attempt,
            timeout = ?self.config.load_timeout,
            "viewer loading timed out"
        );
        self.fail(TIMEOUT_MESSAGE.to_string(), announce, &mut effects);
        effects
    }

    pub fn retry(&mut self) -> Vec<Effect> {
        if self.session.status != Status::Error {
            debug!(status = ?self.session.status, "retry ignored outside of error state");
            return Vec::new();
        }
        self.session.attempt += 1;
        self.session.instance = InstanceId::fresh();
        info!(attempt = self.session.attempt, "retrying viewer");
        self.begin_attempt()
    }

    pub fn navigate(&mut self, direction: Direction) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.session.status != Status::Ready {
            return effects;
        }
        let current = self.session.current_page;
        let total = self.session.total_pages;
        let target = match direction {
            Direction::Prev if current > 1 => Some(current - 1),
            Direction::Next if total == 0 || current < total => current.checked_add(1),
            _ => None,
        };
        let Some(target) = target else {
            debug!(?direction, current, total, "navigation out of range");
            return effects;
        };
        self.session.current_page = target;
        self.session.pending_pages.push_back(target);
        self.publish_pages();
        effects.push(Effect::Post(OutboundCommand::Navigate { direction }));
        if self.session.audio_enabled {
            effects.push(self.cue());
        }
        effects
    }

    /// Navigates up to `count` pages in one direction, stopping at the first
    /// step that is out of range. The cue plays at most once.
    pub fn navigate_by(&mut self, direction: Direction, count: u32) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mut cued = false;
        for _ in 0..count.min(MAX_NAVIGATION_STEPS) {
            let step = self.navigate(direction);
            if step.is_empty() {
                break;
            }
            for effect in step {
                if matches!(effect, Effect::PlayCue { .. }) {
                    if cued {
                        continue;
                    }
                    cued = true;
                }
                effects.push(effect);
            }
        }
        effects
    }

    pub fn set_audio(&mut self, enabled: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.session.audio_enabled == enabled {
            return effects;
        }
        self.session.audio_enabled = enabled;
        self.publish(SessionEvent::AudioChanged(enabled));
        if self.session.surface_mounted() {
            effects.push(Effect::Post(OutboundCommand::SetAudio { enabled }));
        }
        effects
    }

    pub fn request_fullscreen(&mut self) -> Vec<Effect> {
        if !self.session.surface_mounted() {
            return Vec::new();
        }
        self.session.is_fullscreen = !self.session.is_fullscreen;
        self.publish(SessionEvent::FullscreenChanged(self.session.is_fullscreen));
        vec![Effect::Post(OutboundCommand::RequestFullscreen)]
    }

    /// Releases the timer and the surface. The session keeps its last state.
    pub fn teardown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.disarm(&mut effects);
        if self.session.surface_mounted() {
            effects.push(Effect::Unmount);
        }
        effects
    }

    fn begin_attempt(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.disarm(&mut effects);
        self.session.reset_attempt_scope();
        self.session.error_message = None;
        self.set_status(Status::Loading);
        self.publish_pages();
        self.arm(&mut effects);
        effects.push(Effect::Mount {
            instance: self.session.instance,
            viewer_url: viewer_url(
                &self.config.viewer_base,
                &self.session.document_url,
                self.session.instance,
            ),
        });
        effects
    }

    fn fail(&mut self, message: String, announce: bool, effects: &mut Vec<Effect>) {
        self.disarm(effects);
        if self.session.surface_mounted() {
            effects.push(Effect::Unmount);
        }
        self.session.pending_pages.clear();
        self.session.error_message = Some(message.clone());
        self.set_status(Status::Error);
        self.publish(SessionEvent::LoadFailed {
            attempt: self.session.attempt,
            message,
            announce,
        });
    }

    fn arm(&mut self, effects: &mut Vec<Effect>) {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.armed = Some(token);
        effects.push(Effect::ArmTimer {
            token,
            after: self.config.load_timeout,
        });
    }

    fn disarm(&mut self, effects: &mut Vec<Effect>) {
        if let Some(token) = self.armed.take() {
            effects.push(Effect::CancelTimer { token });
        }
    }

    fn set_total_pages(&mut self, pages: u32) {
        self.session.total_pages = pages;
        self.session.current_page = self.session.clamp_page(self.session.current_page);
        let pending: VecDeque<u32> = self
            .session
            .pending_pages
            .iter()
            .map(|&page| self.session.clamp_page(page))
            .collect();
        self.session.pending_pages = pending;
        self.publish_pages();
    }

    fn set_status(&mut self, to: Status) {
        let from = self.session.status;
        if from != to {
            self.session.status = to;
            self.publish(SessionEvent::StatusChanged { from, to });
        }
    }

    fn cue(&self) -> Effect {
        Effect::PlayCue {
            url: self.config.page_turn_sound.clone(),
            volume: self.config.volume,
        }
    }

    fn publish_pages(&self) {
        self.publish(SessionEvent::PageChanged {
            current: self.session.current_page,
            total: self.session.total_pages,
        });
    }

    fn publish(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}
