use tracing::{debug, instrument, warn};

use crate::message::{decode_inbound, InboundMessage};
use crate::session::{Effect, SessionController};
use crate::surface::Envelope;

/// Decodes an envelope from the surface and applies it to the session.
///
/// Envelopes from a previous surface instance and payloads that fail to
/// decode are dropped without touching session state.
#[instrument(skip_all, fields(instance = %envelope.instance))]
pub fn route(controller: &mut SessionController, envelope: &Envelope) -> Vec<Effect> {
    if envelope.instance != controller.session().instance() {
        debug!("dropping message from stale surface instance");
        return Vec::new();
    }
    let message = match decode_inbound(&envelope.payload) {
        Ok(message) => message,
        Err(err) => {
            warn!(%err, payload = %envelope.payload, "ignoring malformed surface message");
            return Vec::new();
        }
    };
    debug!(?message, "surface message");
    dispatch(controller, message)
}

pub fn dispatch(controller: &mut SessionController, message: InboundMessage) -> Vec<Effect> {
    match message {
        InboundMessage::Initialized => controller.mark_ready(None),
        InboundMessage::Loaded { pages } => controller.mark_ready(Some(pages)),
        InboundMessage::PageFlipped { page, total_pages } => {
            controller.record_flip(page, total_pages)
        }
        InboundMessage::Error { message } => controller.record_failure(message),
        InboundMessage::FullscreenChanged { is_fullscreen } => {
            controller.record_fullscreen(is_fullscreen)
        }
        InboundMessage::Unknown => {
            debug!("ignoring surface message with unrecognized type");
            Vec::new()
        }
    }
}
