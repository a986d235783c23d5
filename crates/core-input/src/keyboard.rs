//! Keyboard adapter over the crossterm event stream.
//!
//! Runs as one task that maps terminal key events into bus events until
//! the stream ends, the bus side shuts it down, or the stream errors.
//! The exit reason is logged either way; a stream error never escalates
//! past this adapter.

use core_events::{Event, EventBus, KeyCode, KeyInput, KeyModifiers};
use crossterm::event::{
    Event as CEvent, EventStream, KeyCode as CKeyCode, KeyEventKind as CKind,
    KeyModifiers as CModifiers,
};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{info, trace, warn};

#[derive(Clone, Debug)]
pub struct KeyboardShutdown {
    notify: Arc<Notify>,
}

impl KeyboardShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    ShutdownSignal,
    StreamEnded,
    StreamError,
}

impl ExitReason {
    fn as_str(self) -> &'static str {
        match self {
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::StreamError => "stream_error",
        }
    }
}

/// Spawn the keyboard task. The returned shutdown handle stops it
/// cooperatively during teardown.
pub fn spawn_keyboard_task(bus: Arc<EventBus>) -> (JoinHandle<()>, KeyboardShutdown) {
    let notify = Arc::new(Notify::new());
    let shutdown = KeyboardShutdown {
        notify: notify.clone(),
    };
    let handle = tokio::spawn(async move {
        info!(target: "input.keyboard", "keyboard_task_started");
        let mut stream = EventStream::new();
        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = notify.notified() => break ExitReason::ShutdownSignal,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(CEvent::Key(key))) => {
                    if !matches!(key.kind, CKind::Press | CKind::Repeat) {
                        continue;
                    }
                    let Some(input) = map_key(key.code, key.modifiers) else {
                        continue;
                    };
                    trace!(target: "input.keyboard", key = %input, "key_pressed");
                    bus.publish(Event::KeyPressed { key: input }).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(target: "input.keyboard", error = %e, "keyboard_stream_error");
                    break ExitReason::StreamError;
                }
                None => break ExitReason::StreamEnded,
            }
        };
        info!(target: "input.keyboard", reason = reason.as_str(), "keyboard_task_stopped");
    });
    (handle, shutdown)
}

fn map_key(code: CKeyCode, mods: CModifiers) -> Option<KeyInput> {
    let code = match code {
        CKeyCode::Char(c) => KeyCode::Char(c),
        CKeyCode::Enter => KeyCode::Enter,
        CKeyCode::Esc => KeyCode::Esc,
        CKeyCode::Tab => KeyCode::Tab,
        CKeyCode::Up => KeyCode::Up,
        CKeyCode::Down => KeyCode::Down,
        CKeyCode::Left => KeyCode::Left,
        CKeyCode::Right => KeyCode::Right,
        _ => return None,
    };
    let mut modifiers = KeyModifiers::empty();
    if mods.contains(CModifiers::CONTROL) {
        modifiers |= KeyModifiers::CTRL;
    }
    if mods.contains(CModifiers::ALT) {
        modifiers |= KeyModifiers::ALT;
    }
    if mods.contains(CModifiers::SHIFT) {
        modifiers |= KeyModifiers::SHIFT;
    }
    Some(KeyInput {
        code,
        mods: modifiers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_printable_and_named_keys() {
        let input = map_key(CKeyCode::Char('h'), CModifiers::NONE).unwrap();
        assert_eq!(input.code, KeyCode::Char('h'));
        assert!(input.mods.is_empty());

        let input = map_key(CKeyCode::Up, CModifiers::CONTROL | CModifiers::SHIFT).unwrap();
        assert_eq!(input.code, KeyCode::Up);
        assert!(input.mods.contains(KeyModifiers::CTRL));
        assert!(input.mods.contains(KeyModifiers::SHIFT));
        assert!(!input.mods.contains(KeyModifiers::ALT));
    }

    #[test]
    fn unmapped_keys_are_dropped() {
        assert!(map_key(CKeyCode::F(5), CModifiers::NONE).is_none());
    }
}
