use crate::types::DeviceId;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    /// CC64 sustain / CC67 soft; value 0..=127
    Control { controller: u8, value: u8 },
}

/// Raw input from a physical controller, not yet mapped onto the roll clock.
#[derive(Clone, Copy, Debug)]
pub struct InputEvent {
    pub at: Instant,
    pub message: MidiMessage,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiInputDevice {
    pub id: DeviceId,
    pub name: String,
    pub is_available: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// MIDI input stream handle: drop closes it.
pub trait MidiInputStream: Send {
    fn close(self: Box<Self>);
}

pub type InputEventCallback = Arc<dyn Fn(InputEvent) + Send + Sync + 'static>;

pub trait MidiInputPort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError>;

    /// Open input stream: implementation should invoke cb from a background thread/callback.
    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: InputEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError>;
}

/// Optional sink echoing synthesized note/pedal gestures to hardware.
pub trait MidiOutputPort: Send {
    fn send(&mut self, message: MidiMessage) -> Result<(), MidiError>;
}
