//! Host-side bridge to an isolated document rendering surface.
//!
//! The surface is reachable only through asynchronous messages. The bridge
//! loads a document into it, bounds loading with a timer, relays page-turn,
//! audio and fullscreen events, and offers retry when an attempt fails.

pub mod audio;
pub mod bridge;
pub mod config;
pub mod emitter;
pub mod loopback;
pub mod message;
pub mod probe;
pub mod router;
pub mod session;
pub mod surface;

pub use audio::{AudioCache, AudioSink};
pub use bridge::{Bridge, BridgeInput};
pub use config::{BridgeConfig, ConfigError, TimeoutReporting};
pub use emitter::HostIntent;
pub use loopback::{LoopbackBehavior, LoopbackSurface, SurfaceRecord};
pub use message::{Direction, InboundMessage, OutboundCommand, WireError};
pub use probe::{LocalProbe, ProbeOutcome, ResourceProbe};
pub use session::{
    Effect, SessionController, SessionEvent, Status, TimerToken, ViewerSession,
    MAX_NAVIGATION_STEPS,
};
pub use surface::{viewer_url, Envelope, InstanceId, SurfaceTransport};
