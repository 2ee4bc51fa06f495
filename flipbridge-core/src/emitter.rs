use tracing::debug;

use crate::message::Direction;
use crate::session::{Effect, SessionController};

/// A user-facing request from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostIntent {
    Navigate(Direction),
    /// Repeated navigation, e.g. from a numeric prefix.
    NavigateBy { direction: Direction, count: u32 },
    ToggleAudio,
    SetAudio(bool),
    ToggleFullscreen,
    Retry,
    Shutdown,
}

pub fn emit(controller: &mut SessionController, intent: HostIntent) -> Vec<Effect> {
    debug!(?intent, "host intent");
    match intent {
        HostIntent::Navigate(direction) => controller.navigate(direction),
        HostIntent::NavigateBy { direction, count } => controller.navigate_by(direction, count),
        HostIntent::ToggleAudio => {
            let enabled = !controller.session().audio_enabled();
            controller.set_audio(enabled)
        }
        HostIntent::SetAudio(enabled) => controller.set_audio(enabled),
        HostIntent::ToggleFullscreen => controller.request_fullscreen(),
        HostIntent::Retry => controller.retry(),
        HostIntent::Shutdown => controller.teardown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::message::OutboundCommand;

    fn ready(pages: u32) -> SessionController {
        let mut controller = SessionController::new("doc.pdf", BridgeConfig::default());
        controller.start();
        controller.mark_ready(Some(pages));
        controller
    }

    #[test]
    fn navigate_next_sends_command_and_plays_cue() {
        let mut controller = ready(42);
        let effects = emit(&mut controller, HostIntent::Navigate(Direction::Next));
        assert_eq!(
            effects,
            vec![
                Effect::Post(OutboundCommand::Navigate {
                    direction: Direction::Next
                }),
                Effect::PlayCue {
                    url: "/audio/page-turn.mp3".into(),
                    volume: 0.5
                },
            ]
        );
    }

    #[test]
    fn navigate_prev_at_first_page_sends_nothing() {
        let mut controller = ready(42);
        assert!(emit(&mut controller, HostIntent::Navigate(Direction::Prev)).is_empty());
        assert_eq!(controller.session().current_page(), 1);
    }

    #[test]
    fn repeated_navigation_moves_by_count() {
        let mut controller = ready(42);
        emit(
            &mut controller,
            HostIntent::NavigateBy {
                direction: Direction::Next,
                count: 12,
            },
        );
        assert_eq!(controller.session().current_page(), 13);
        assert_eq!(controller.session().unconfirmed_flips(), 12);
    }

    #[test]
    fn toggle_audio_flips_local_preference() {
        let mut controller = ready(2);
        let effects = emit(&mut controller, HostIntent::ToggleAudio);
        assert_eq!(
            effects,
            vec![Effect::Post(OutboundCommand::SetAudio { enabled: false })]
        );
        assert!(!controller.session().audio_enabled());
        emit(&mut controller, HostIntent::ToggleAudio);
        assert!(controller.session().audio_enabled());
    }

    #[test]
    fn audio_preference_changes_without_surface_are_local() {
        let mut controller = SessionController::new("doc.pdf", BridgeConfig::default());
        assert!(emit(&mut controller, HostIntent::SetAudio(false)).is_empty());
        assert!(!controller.session().audio_enabled());
    }
}
