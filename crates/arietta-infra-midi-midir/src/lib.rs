use arietta_ports::midi::{
    InputEvent, InputEventCallback, MidiError, MidiInputDevice, MidiInputPort, MidiInputStream,
    MidiMessage, MidiOutputPort,
};
use arietta_ports::sequencer::{SOFT_CONTROLLER, SUSTAIN_CONTROLLER};
use arietta_ports::types::DeviceId;
use midir::{Ignore, MidiInput, MidiOutput, MidiOutputConnection};
use std::time::Instant;

pub struct MidirMidiInputPort {
    client_name: String,
}

impl MidirMidiInputPort {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn create_midi_in(&self) -> Result<MidiInput, MidiError> {
        let midi_in =
            MidiInput::new(&self.client_name).map_err(|e| MidiError::Backend(e.to_string()))?;
        Ok(midi_in)
    }

    fn device_id(index: usize, name: &str) -> DeviceId {
        DeviceId(format!("midir:{}:{}", index, name))
    }

    fn parse_message(message: &[u8]) -> Option<MidiMessage> {
        if message.len() < 3 {
            return None;
        }
        let status = message[0] & 0xF0;
        match status {
            0x80 => Some(MidiMessage::NoteOff { note: message[1] }),
            0x90 => {
                let note = message[1];
                let velocity = message[2];
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { note })
                } else {
                    Some(MidiMessage::NoteOn { note, velocity })
                }
            }
            0xB0 => {
                let controller = message[1];
                if controller == SUSTAIN_CONTROLLER || controller == SOFT_CONTROLLER {
                    Some(MidiMessage::Control {
                        controller,
                        value: message[2],
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl Default for MidirMidiInputPort {
    fn default() -> Self {
        Self::new("Arietta")
    }
}

pub struct MidirMidiInputStream {
    connection: Option<midir::MidiInputConnection<InputEventCallback>>,
}

impl MidiInputStream for MidirMidiInputStream {
    fn close(mut self: Box<Self>) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
    }
}

impl MidiInputPort for MidirMidiInputPort {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        let midi_in = self.create_midi_in()?;
        let ports = midi_in.ports();
        let mut devices = Vec::new();

        for (index, port) in ports.iter().enumerate() {
            let name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| "Unknown Input".to_string());
            devices.push(MidiInputDevice {
                id: Self::device_id(index, &name),
                name,
                is_available: true,
            });
        }

        Ok(devices)
    }

    fn open_input(
        &self,
        device_id: &DeviceId,
        cb: InputEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        let mut midi_in = self.create_midi_in()?;
        midi_in.ignore(Ignore::None);

        let ports = midi_in.ports();
        let mut selected = None;
        for (index, port) in ports.iter().enumerate() {
            let name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| "Unknown Input".to_string());
            let id = Self::device_id(index, &name);
            if &id == device_id {
                selected = Some(port.clone());
                break;
            }
        }

        let port = selected.ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;

        let connection = midi_in
            .connect(
                &port,
                "arietta-midi-input",
                move |_stamp, message, callback| {
                    if let Some(message) = Self::parse_message(message) {
                        let event = InputEvent {
                            at: Instant::now(),
                            message,
                        };
                        (callback.as_ref())(event);
                    }
                },
                cb,
            )
            .map_err(|e| MidiError::Backend(e.to_string()))?;

        Ok(Box::new(MidirMidiInputStream {
            connection: Some(connection),
        }))
    }
}

/// Hardware echo sink: note and pedal gestures re-encoded as raw channel 1
/// messages.
pub struct MidirMidiOutputPort {
    connection: MidiOutputConnection,
}

impl MidirMidiOutputPort {
    pub fn list_outputs(client_name: &str) -> Result<Vec<(DeviceId, String)>, MidiError> {
        let midi_out =
            MidiOutput::new(client_name).map_err(|e| MidiError::Backend(e.to_string()))?;
        let mut devices = Vec::new();
        for (index, port) in midi_out.ports().iter().enumerate() {
            let name = midi_out
                .port_name(port)
                .unwrap_or_else(|_| "Unknown Output".to_string());
            devices.push((DeviceId(format!("midir:{}:{}", index, name)), name));
        }
        Ok(devices)
    }

    pub fn connect(client_name: &str, device_id: &DeviceId) -> Result<Self, MidiError> {
        let midi_out =
            MidiOutput::new(client_name).map_err(|e| MidiError::Backend(e.to_string()))?;
        let ports = midi_out.ports();
        let mut selected = None;
        for (index, port) in ports.iter().enumerate() {
            let name = midi_out
                .port_name(port)
                .unwrap_or_else(|_| "Unknown Output".to_string());
            if &DeviceId(format!("midir:{}:{}", index, name)) == device_id {
                selected = Some(port.clone());
                break;
            }
        }
        let port = selected.ok_or_else(|| MidiError::DeviceNotFound(device_id.to_string()))?;
        let connection = midi_out
            .connect(&port, "arietta-midi-echo")
            .map_err(|e| MidiError::Backend(e.to_string()))?;
        Ok(Self { connection })
    }

    fn encode(message: MidiMessage) -> [u8; 3] {
        match message {
            MidiMessage::NoteOn { note, velocity } => [0x90, note, velocity],
            MidiMessage::NoteOff { note } => [0x80, note, 0],
            MidiMessage::Control { controller, value } => [0xB0, controller, value],
        }
    }
}

impl MidiOutputPort for MidirMidiOutputPort {
    fn send(&mut self, message: MidiMessage) -> Result<(), MidiError> {
        let bytes = Self::encode(message);
        self.connection
            .send(&bytes)
            .map_err(|e| MidiError::Backend(e.to_string()))
    }
}
