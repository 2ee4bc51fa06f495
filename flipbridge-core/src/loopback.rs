//! An in-process rendering surface that behaves like a flipbook widget with
//! a fixed number of pages. Used by the demo mode and by tests.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::message::{Direction, InboundMessage, OutboundCommand};
use crate::surface::{Envelope, InstanceId, SurfaceTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopbackBehavior {
    /// Reports initialization and the page count as soon as it is mounted.
    Responsive,
    /// Never answers, so the host's load timer runs out.
    Silent,
    /// Reports a load failure with the given message.
    Fail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceRecord {
    Mounted {
        instance: InstanceId,
        viewer_url: String,
    },
    Posted(OutboundCommand),
    Unmounted,
}

struct MountedBook {
    instance: InstanceId,
    behavior: LoopbackBehavior,
    page: u32,
    fullscreen: bool,
}

pub struct LoopbackSurface {
    outbox: UnboundedSender<Envelope>,
    pages: u32,
    behaviors: VecDeque<LoopbackBehavior>,
    mounted: Option<MountedBook>,
    journal: Arc<Mutex<Vec<SurfaceRecord>>>,
}

impl LoopbackSurface {
    pub fn new(outbox: UnboundedSender<Envelope>, pages: u32) -> Self {
        Self {
            outbox,
            pages,
            behaviors: VecDeque::new(),
            mounted: None,
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// One behavior per mount; the last one repeats.
    pub fn with_behaviors(mut self, behaviors: impl IntoIterator<Item = LoopbackBehavior>) -> Self {
        self.behaviors = behaviors.into_iter().collect();
        self
    }

    pub fn journal(&self) -> Arc<Mutex<Vec<SurfaceRecord>>> {
        Arc::clone(&self.journal)
    }

    fn next_behavior(&mut self) -> LoopbackBehavior {
        if self.behaviors.len() > 1 {
            self.behaviors
                .pop_front()
                .unwrap_or(LoopbackBehavior::Responsive)
        } else {
            self.behaviors
                .front()
                .cloned()
                .unwrap_or(LoopbackBehavior::Responsive)
        }
    }

    fn send(&self, instance: InstanceId, message: InboundMessage) -> Result<()> {
        let envelope = Envelope::encode(instance, &message)?;
        self.outbox
            .send(envelope)
            .map_err(|_| anyhow!("host stopped listening to the surface"))
    }
}

#[async_trait]
impl SurfaceTransport for LoopbackSurface {
    async fn mount(&mut self, instance: InstanceId, viewer_url: &str) -> Result<()> {
        self.journal.lock().push(SurfaceRecord::Mounted {
            instance,
            viewer_url: viewer_url.to_string(),
        });
        let behavior = self.next_behavior();
        debug!(%instance, ?behavior, "loopback surface mounted");
        match &behavior {
            LoopbackBehavior::Responsive => {
                self.send(instance, InboundMessage::Initialized)?;
                self.send(instance, InboundMessage::Loaded { pages: self.pages })?;
            }
            LoopbackBehavior::Silent => {}
            LoopbackBehavior::Fail(message) => {
                self.send(
                    instance,
                    InboundMessage::Error {
                        message: message.clone(),
                    },
                )?;
            }
        }
        self.mounted = Some(MountedBook {
            instance,
            behavior,
            page: 1,
            fullscreen: false,
        });
        Ok(())
    }

    async fn post(&mut self, command: &OutboundCommand) -> Result<()> {
        self.journal
            .lock()
            .push(SurfaceRecord::Posted(command.clone()));
        let pages = self.pages;
        let Some(book) = self.mounted.as_mut() else {
            return Err(anyhow!("no surface mounted"));
        };
        if book.behavior != LoopbackBehavior::Responsive {
            return Ok(());
        }
        let reply = match command {
            OutboundCommand::Navigate { direction } => {
                let next = match direction {
                    Direction::Prev => book.page.saturating_sub(1).max(1),
                    Direction::Next => (book.page + 1).min(pages.max(1)),
                };
                if next == book.page {
                    None
                } else {
                    book.page = next;
                    Some(InboundMessage::PageFlipped {
                        page: next,
                        total_pages: Some(pages),
                    })
                }
            }
            OutboundCommand::RequestFullscreen => {
                book.fullscreen = !book.fullscreen;
                Some(InboundMessage::FullscreenChanged {
                    is_fullscreen: book.fullscreen,
                })
            }
            _ => None,
        };
        let instance = book.instance;
        if let Some(reply) = reply {
            self.send(instance, reply)?;
        }
        Ok(())
    }

    async fn unmount(&mut self) -> Result<()> {
        if self.mounted.take().is_some() {
            self.journal.lock().push(SurfaceRecord::Unmounted);
        }
        Ok(())
    }
}
