//! Single-task driver that joins surface messages, host intents and the load
//! timer, and carries out the effects requested by the session controller.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::audio::{AudioCache, AudioSink};
use crate::emitter::{self, HostIntent};
use crate::probe::{ProbeOutcome, ResourceProbe};
use crate::router;
use crate::session::{Effect, SessionController, SessionEvent, TimerToken, ViewerSession};
use crate::surface::{Envelope, SurfaceTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeInput {
    Surface(Envelope),
    Intent(HostIntent),
    Deadline(TimerToken),
}

pub struct Bridge<T: SurfaceTransport, S: AudioSink> {
    controller: SessionController,
    transport: T,
    audio: AudioCache<S>,
    inbound: UnboundedReceiver<Envelope>,
    intents: UnboundedReceiver<HostIntent>,
    deadline: Option<(TimerToken, Instant)>,
    inbound_open: bool,
    finished: bool,
}

impl<T: SurfaceTransport, S: AudioSink> Bridge<T, S> {
    pub fn new(
        controller: SessionController,
        transport: T,
        audio: AudioCache<S>,
        inbound: UnboundedReceiver<Envelope>,
        intents: UnboundedReceiver<HostIntent>,
    ) -> Self {
        Self {
            controller,
            transport,
            audio,
            inbound,
            intents,
            deadline: None,
            inbound_open: true,
            finished: false,
        }
    }

    pub fn session(&self) -> &ViewerSession {
        self.controller.session()
    }

    pub fn events(&self) -> Arc<Mutex<Vec<SessionEvent>>> {
        self.controller.events()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn audio(&self) -> &AudioCache<S> {
        &self.audio
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Runs the pre-flight probe and starts the session.
    #[instrument(skip_all, fields(document = %self.controller.session().document_url()))]
    pub async fn start(&mut self, probe: &dyn ResourceProbe) -> Result<()> {
        if self.controller.session().audio_enabled() {
            let cue = self.controller.config().page_turn_sound.clone();
            self.audio.preload([cue.as_str()]);
        }
        let document = self.controller.session().document_url().to_string();
        if !document.trim().is_empty() {
            match probe.probe(&document).await {
                ProbeOutcome::Accessible => {}
                ProbeOutcome::Indeterminate(reason) => {
                    debug!(%reason, "could not verify document before loading");
                }
                ProbeOutcome::Inaccessible(reason) => {
                    warn!(%reason, "document failed pre-flight check");
                    let effects = self
                        .controller
                        .fail_preflight(format!("PDF file not accessible ({reason})"));
                    return self.execute(effects).await;
                }
            }
        }
        let effects = self.controller.start();
        self.execute(effects).await
    }

    /// Waits for the next thing that needs handling. Returns `None` once the
    /// host has shut down or dropped its intent channel.
    pub async fn next_input(&mut self) -> Option<BridgeInput> {
        if self.finished {
            return None;
        }
        loop {
            let deadline = self.deadline.map(|(_, at)| at);
            tokio::select! {
                biased;
                envelope = self.inbound.recv(), if self.inbound_open => match envelope {
                    Some(envelope) => return Some(BridgeInput::Surface(envelope)),
                    None => {
                        debug!("surface channel closed");
                        self.inbound_open = false;
                    }
                },
                intent = self.intents.recv() => match intent {
                    Some(intent) => return Some(BridgeInput::Intent(intent)),
                    None => return None,
                },
                _ = sleep_until(deadline) => {
                    if let Some((token, _)) = self.deadline.take() {
                        return Some(BridgeInput::Deadline(token));
                    }
                }
            }
        }
    }

    pub async fn handle(&mut self, input: BridgeInput) -> Result<()> {
        let effects = match input {
            BridgeInput::Surface(envelope) => router::route(&mut self.controller, &envelope),
            BridgeInput::Intent(intent) => {
                if intent == HostIntent::Shutdown {
                    self.finished = true;
                }
                emitter::emit(&mut self.controller, intent)
            }
            BridgeInput::Deadline(token) => self.controller.on_timeout(token),
        };
        self.execute(effects).await?;
        if self.finished {
            self.audio.stop_all();
            info!("viewer bridge shut down");
        }
        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        while let Some(input) = self.next_input().await {
            self.handle(input).await?;
        }
        if !self.finished {
            self.handle(BridgeInput::Intent(HostIntent::Shutdown))
                .await?;
        }
        Ok(())
    }

    async fn execute(&mut self, effects: Vec<Effect>) -> Result<()> {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Mount {
                    instance,
                    viewer_url,
                } => match self.transport.mount(instance, &viewer_url).await {
                    Ok(()) => queue.extend(self.controller.surface_attached()),
                    Err(err) => {
                        warn!(?err, %instance, "failed to mount surface");
                        queue.extend(
                            self.controller
                                .record_failure(format!("failed to start viewer: {err:#}")),
                        );
                    }
                },
                Effect::Unmount => {
                    if let Err(err) = self.transport.unmount().await {
                        warn!(?err, "failed to unmount surface");
                    }
                }
                Effect::Post(command) => {
                    if let Err(err) = self.transport.post(&command).await {
                        warn!(?err, ?command, "failed to deliver command to surface");
                    }
                }
                Effect::PlayCue { url, volume } => {
                    self.audio.play(&url, volume);
                }
                Effect::ArmTimer { token, after } => {
                    self.deadline = Some((token, Instant::now() + after));
                }
                Effect::CancelTimer { token } => {
                    if matches!(self.deadline, Some((armed, _)) if armed == token) {
                        self.deadline = None;
                    }
                }
            }
        }
        Ok(())
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
