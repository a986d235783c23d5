//! Keyboard → control command mapping.
//!
//! The keyboard is a convenience surface: most keys are translated into
//! the same synthetic encoder/button events the hardware produces, so
//! every downstream path is exercised identically. Only scheduler
//! inspection (pause/step) and shutdown have dedicated commands.

use crate::Services;
use core_events::{
    EncoderSource, Event, EventKind, HandlerError, KeyCode, KeyInput, KeyModifiers,
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    Selector(i32),
    Modulator(i32),
    Button(&'static str),
    EditModeOff,
    ToggleFrameByFrame,
    StepFrame,
    Shutdown,
}

/// Pure key → command map.
pub fn map_key(key: &KeyInput) -> Option<KeyCommand> {
    if key.mods.contains(KeyModifiers::CTRL) {
        return match key.code {
            KeyCode::Char('c') => Some(KeyCommand::Shutdown),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Up => Some(KeyCommand::Selector(1)),
        KeyCode::Down => Some(KeyCommand::Selector(-1)),
        KeyCode::Right => Some(KeyCommand::Modulator(1)),
        KeyCode::Left => Some(KeyCommand::Modulator(-1)),
        KeyCode::Enter => Some(KeyCommand::Button("selector:push")),
        KeyCode::Tab => Some(KeyCommand::Button("modulator:push")),
        KeyCode::Char(' ') => Some(KeyCommand::Button("power")),
        KeyCode::Char('m') => Some(KeyCommand::Button("mode")),
        KeyCode::Char('w') => Some(KeyCommand::Button("lamp_white")),
        KeyCode::Esc => Some(KeyCommand::EditModeOff),
        KeyCode::Char('p') => Some(KeyCommand::ToggleFrameByFrame),
        KeyCode::Char('s') => Some(KeyCommand::StepFrame),
        KeyCode::Char('q') => Some(KeyCommand::Shutdown),
        _ => None,
    }
}

pub fn register(services: &Services, _lighting: &std::sync::Arc<crate::LightingController>) {
    let handler = {
        let services = services.clone();
        move |event: Event| {
            let services = services.clone();
            async move {
                let Event::KeyPressed { key } = event else {
                    return Ok(());
                };
                let Some(command) = map_key(&key) else {
                    return Ok(());
                };
                debug!(target: "control", key = %key, ?command, "key_command");
                match command {
                    KeyCommand::Selector(delta) => {
                        services
                            .bus
                            .publish(Event::EncoderRotated {
                                encoder: EncoderSource::Selector,
                                delta,
                            })
                            .await;
                    }
                    KeyCommand::Modulator(delta) => {
                        services
                            .bus
                            .publish(Event::EncoderRotated {
                                encoder: EncoderSource::Modulator,
                                delta,
                            })
                            .await;
                    }
                    KeyCommand::Button(button) => {
                        services
                            .bus
                            .publish(Event::ButtonPressed {
                                button: button.to_string(),
                            })
                            .await;
                    }
                    KeyCommand::EditModeOff => {
                        services.zones.set_edit_mode(false).await;
                    }
                    KeyCommand::ToggleFrameByFrame => {
                        let paused = !services.zones.app_state().frame_by_frame;
                        services.zones.set_frame_by_frame(paused);
                        if paused {
                            services.sink.pause();
                        } else {
                            services.sink.resume();
                        }
                        info!(target: "control", paused, "frame_by_frame_toggled");
                    }
                    KeyCommand::StepFrame => {
                        services.sink.step();
                    }
                    KeyCommand::Shutdown => {
                        services
                            .bus
                            .publish(Event::ShutdownRequested {
                                reason: "keyboard".to_string(),
                            })
                            .await;
                    }
                }
                Ok::<(), HandlerError>(())
            }
        }
    };
    services
        .bus
        .subscribe_async("keymap", EventKind::KeyPressed, 10, handler);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_map_to_encoders() {
        assert_eq!(
            map_key(&KeyInput::plain(KeyCode::Up)),
            Some(KeyCommand::Selector(1))
        );
        assert_eq!(
            map_key(&KeyInput::plain(KeyCode::Left)),
            Some(KeyCommand::Modulator(-1))
        );
    }

    #[test]
    fn ctrl_c_and_q_both_shut_down() {
        assert_eq!(
            map_key(&KeyInput {
                code: KeyCode::Char('c'),
                mods: KeyModifiers::CTRL,
            }),
            Some(KeyCommand::Shutdown)
        );
        assert_eq!(
            map_key(&KeyInput::plain(KeyCode::Char('q'))),
            Some(KeyCommand::Shutdown)
        );
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        assert_eq!(map_key(&KeyInput::plain(KeyCode::Char('z'))), None);
        assert_eq!(
            map_key(&KeyInput {
                code: KeyCode::Char('x'),
                mods: KeyModifiers::CTRL,
            }),
            None
        );
    }
}
