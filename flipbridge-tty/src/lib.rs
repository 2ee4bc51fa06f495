use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use flipbridge_core::{
    AudioSink, Direction, HostIntent, Status, ViewerSession, MAX_NAVIGATION_STEPS,
};
use tracing::trace;

/// Plays cues by ringing the terminal bell.
pub struct TerminalBell<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> TerminalBell<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }
}

impl<W: Write + Send> AudioSink for TerminalBell<W> {
    type Clip = ();

    fn load(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    fn play(&mut self, _clip: &mut (), volume: f32) -> Result<()> {
        if volume > 0.0 {
            self.writer.write_all(b"\x07")?;
            self.writer.flush()?;
        }
        Ok(())
    }

    fn stop(&mut self, _clip: &mut ()) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Navigate { direction: Direction, count: usize },
    Intent(HostIntent),
    Quit,
    None,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                kind: KeyEventKind::Release,
                ..
            }) => UiEvent::None,
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                    self.reset_count();
                    UiEvent::Quit
                }
                (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                    if let Some(digit) = c.to_digit(10) {
                        self.push_digit(digit as usize);
                    }
                    UiEvent::None
                }
                (KeyCode::Char('j'), KeyModifiers::NONE)
                | (KeyCode::Char('l'), KeyModifiers::NONE)
                | (KeyCode::Char(' '), KeyModifiers::NONE)
                | (KeyCode::Right, _)
                | (KeyCode::Down, _)
                | (KeyCode::PageDown, _) => self.navigate(Direction::Next),
                (KeyCode::Char('k'), KeyModifiers::NONE)
                | (KeyCode::Char('h'), KeyModifiers::NONE)
                | (KeyCode::Left, _)
                | (KeyCode::Up, _)
                | (KeyCode::PageUp, _)
                | (KeyCode::Backspace, _) => self.navigate(Direction::Prev),
                (KeyCode::Char('a'), _) | (KeyCode::Char('s'), _) => {
                    self.reset_count();
                    UiEvent::Intent(HostIntent::ToggleAudio)
                }
                (KeyCode::Char('f'), _) | (KeyCode::F(11), _) => {
                    self.reset_count();
                    UiEvent::Intent(HostIntent::ToggleFullscreen)
                }
                (KeyCode::Char('r'), _) => {
                    self.reset_count();
                    UiEvent::Intent(HostIntent::Retry)
                }
                (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => {
                    self.reset_count();
                    UiEvent::Quit
                }
                other => {
                    trace!(?other, "unmapped key");
                    self.reset_count();
                    UiEvent::None
                }
            },
            _ => UiEvent::None,
        }
    }

    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }

    fn navigate(&mut self, direction: Direction) -> UiEvent {
        let count = self.take_count();
        UiEvent::Navigate { direction, count }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current
            .saturating_mul(10)
            .saturating_add(digit)
            .min(MAX_NAVIGATION_STEPS as usize);
        self.pending_count = Some(next);
        self.pending_digits = next.to_string();
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }
}

fn document_label(document_url: &str) -> &str {
    let trimmed = document_url
        .split(['?', '#'])
        .next()
        .unwrap_or(document_url);
    Path::new(trimmed)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("<document>")
}

pub fn format_status(session: &ViewerSession) -> String {
    let label = document_label(session.document_url());
    match session.status() {
        Status::Idle => format!("{label} | idle"),
        Status::Loading if session.attempt() == 0 => format!("{label} | loading flipbook..."),
        Status::Loading => format!(
            "{label} | loading flipbook (attempt {})...",
            session.attempt() + 1
        ),
        Status::Ready => {
            let mut status = if session.total_pages() > 0 {
                format!(
                    "{label} | page {} of {}",
                    session.current_page(),
                    session.total_pages()
                )
            } else {
                format!("{label} | page {}", session.current_page())
            };
            status.push_str(if session.audio_enabled() {
                " | sound on"
            } else {
                " | sound off"
            });
            if session.is_fullscreen() {
                status.push_str(" | fullscreen");
            }
            status
        }
        Status::Error => format!(
            "{label} | error: {} | r: retry",
            session.error_message().unwrap_or("unknown failure")
        ),
    }
}

/// Lines shown when a failure is announced: the message, a hint, and the
/// document location as a direct fallback.
pub fn failure_notice(message: &str, document_url: &str) -> Vec<String> {
    vec![
        "Error Loading PDF".to_string(),
        message.to_string(),
        "Try again with r, or open the PDF directly:".to_string(),
        document_url.to_string(),
    ]
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use flipbridge_core::{BridgeConfig, SessionController};

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn event_mapper_uses_numeric_prefix_for_next_page() {
        let mut mapper = EventMapper::new();
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('1'))), UiEvent::None);
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('2'))), UiEvent::None);
        assert_eq!(mapper.pending_input().as_deref(), Some("12"));

        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('l'))),
            UiEvent::Navigate {
                direction: Direction::Next,
                count: 12
            }
        );
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn event_mapper_caps_huge_prefix() {
        let mut mapper = EventMapper::new();
        for _ in 0..11 {
            mapper.map_event(key_event(KeyCode::Char('9')));
        }
        let limit = MAX_NAVIGATION_STEPS as usize;
        assert_eq!(mapper.pending_input(), Some(limit.to_string()));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('l'))),
            UiEvent::Navigate {
                direction: Direction::Next,
                count: limit
            }
        );
    }

    #[test]
    fn event_mapper_resets_prefix_after_use() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('3')));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Left)),
            UiEvent::Navigate {
                direction: Direction::Prev,
                count: 3
            }
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Left)),
            UiEvent::Navigate {
                direction: Direction::Prev,
                count: 1
            }
        );
    }

    #[test]
    fn event_mapper_drops_prefix_on_other_command() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('4')));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('a'))),
            UiEvent::Intent(HostIntent::ToggleAudio)
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char(' '))),
            UiEvent::Navigate {
                direction: Direction::Next,
                count: 1
            }
        );
    }

    #[test]
    fn event_mapper_maps_session_controls() {
        let mut mapper = EventMapper::new();
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('f'))),
            UiEvent::Intent(HostIntent::ToggleFullscreen)
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('r'))),
            UiEvent::Intent(HostIntent::Retry)
        );
        assert_eq!(mapper.map_event(key_event(KeyCode::Esc)), UiEvent::Quit);
        assert_eq!(
            mapper.map_event(key_event_with_modifiers(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL
            )),
            UiEvent::Quit
        );
    }

    #[test]
    fn event_mapper_ignores_key_release() {
        let mut mapper = EventMapper::new();
        let release = Event::Key(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(mapper.map_event(release), UiEvent::None);
    }

    #[test]
    fn terminal_bell_rings_unless_silent() {
        let mut bell = TerminalBell::new(Vec::new());
        let mut clip = bell.load("/audio/page-turn.mp3").unwrap();
        bell.play(&mut clip, 0.5).unwrap();
        bell.play(&mut clip, 0.0).unwrap();
        assert_eq!(bell.writer().as_slice(), b"\x07");
    }

    #[test]
    fn status_reflects_session_lifecycle() {
        let mut controller =
            SessionController::new("/docs/kronicles.pdf?v=2", BridgeConfig::default());
        assert_eq!(format_status(controller.session()), "kronicles.pdf | idle");

        controller.start();
        assert_eq!(
            format_status(controller.session()),
            "kronicles.pdf | loading flipbook..."
        );

        controller.mark_ready(Some(42));
        controller.record_flip(5, None);
        assert_eq!(
            format_status(controller.session()),
            "kronicles.pdf | page 5 of 42 | sound on"
        );

        controller.record_failure("corrupt file");
        assert_eq!(
            format_status(controller.session()),
            "kronicles.pdf | error: corrupt file | r: retry"
        );

        controller.retry();
        assert_eq!(
            format_status(controller.session()),
            "kronicles.pdf | loading flipbook (attempt 2)..."
        );
    }

    #[test]
    fn failure_notice_offers_direct_link() {
        let notice = failure_notice("corrupt file", "https://example.org/a.pdf");
        assert_eq!(notice[1], "corrupt file");
        assert_eq!(notice.last().unwrap(), "https://example.org/a.pdf");
    }
}
