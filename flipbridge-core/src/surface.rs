use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use url::form_urlencoded;
use uuid::Uuid;

use crate::message::{encode_inbound, InboundMessage, OutboundCommand, WireError};

/// Identity of one mounted rendering surface. A new one is minted for every
/// load attempt so that messages from a torn-down surface can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A raw inbound payload tagged with the surface instance that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub instance: InstanceId,
    pub payload: String,
}

impl Envelope {
    pub fn new(instance: InstanceId, payload: impl Into<String>) -> Self {
        Self {
            instance,
            payload: payload.into(),
        }
    }

    pub fn encode(instance: InstanceId, message: &InboundMessage) -> Result<Self, WireError> {
        Ok(Self::new(instance, encode_inbound(message)?))
    }
}

pub fn viewer_url(viewer_base: &str, document_url: &str, instance: InstanceId) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("file", document_url)
        .append_pair("instance", &instance.to_string())
        .finish();
    let separator = if viewer_base.contains('?') { '&' } else { '?' };
    format!("{viewer_base}{separator}{query}")
}

/// The host's handle on a rendering surface.
///
/// Delivery is fire-and-forget: an `Ok` from `post` only means the command
/// left the host.
#[async_trait]
pub trait SurfaceTransport: Send {
    async fn mount(&mut self, instance: InstanceId, viewer_url: &str) -> Result<()>;
    async fn post(&mut self, command: &OutboundCommand) -> Result<()>;
    async fn unmount(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_url_encodes_document_and_instance() {
        let instance = InstanceId::fresh();
        let url = viewer_url(
            "/pdf-viewer/custom-viewer.html",
            "/docs/Spring Issue.pdf",
            instance,
        );
        assert_eq!(
            url,
            format!(
                "/pdf-viewer/custom-viewer.html?file=%2Fdocs%2FSpring+Issue.pdf&instance={}",
                instance
            )
        );
    }

    #[test]
    fn viewer_url_extends_existing_query() {
        let instance = InstanceId::fresh();
        let url = viewer_url("viewer.html?theme=dark", "a.pdf", instance);
        assert!(url.starts_with("viewer.html?theme=dark&file=a.pdf&instance="));
    }

    #[test]
    fn fresh_instances_differ() {
        assert_ne!(InstanceId::fresh(), InstanceId::fresh());
    }
}
