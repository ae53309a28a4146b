//! MIDI note number / note name conversions for labels and key tooltips.

const SHARP_NAMES: [&str; 12] = [
    "C", "C♯", "D", "D♯", "E", "F", "F♯", "G", "G♯", "A", "A♯", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "D♭", "D", "E♭", "E", "F", "G♭", "G", "A♭", "A", "B♭", "B",
];

/// Octave numbering follows the MIDI convention: 60 is C4, 21 is A0.
pub fn note_name(note: u8) -> String {
    note_name_with(note, &SHARP_NAMES)
}

pub fn note_name_flat(note: u8) -> String {
    note_name_with(note, &FLAT_NAMES)
}

fn note_name_with(note: u8, names: &[&str; 12]) -> String {
    let octave = (note as i32 / 12) - 1;
    format!("{}{}", names[note as usize % 12], octave)
}

/// Inverse of `note_name`/`note_name_flat`. Accepts `#`/`b` as ASCII
/// spellings of the accidental signs.
pub fn note_number(name: &str) -> Option<u8> {
    let name = name.trim();
    let (pitch, octave) = split_octave(name)?;
    let octave: i32 = octave.parse().ok()?;
    let normalized = pitch.replace('#', "♯").replace('b', "♭");
    let class = SHARP_NAMES
        .iter()
        .position(|n| *n == normalized)
        .or_else(|| FLAT_NAMES.iter().position(|n| *n == normalized))?;
    let number = (octave + 1) * 12 + class as i32;
    u8::try_from(number).ok()
}

fn split_octave(name: &str) -> Option<(&str, &str)> {
    let split = name.find(|c: char| c.is_ascii_digit() || c == '-')?;
    if split == 0 {
        return None;
    }
    Some((&name[..split], &name[split..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_midi_octaves() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(21), "A0");
        assert_eq!(note_name(108), "C8");
        assert_eq!(note_name(61), "C♯4");
        assert_eq!(note_name_flat(61), "D♭4");
    }

    #[test]
    fn numbers_round_trip_both_spellings() {
        for note in 21..=108 {
            assert_eq!(note_number(&note_name(note)), Some(note));
            assert_eq!(note_number(&note_name_flat(note)), Some(note));
        }
    }

    #[test]
    fn ascii_accidentals_are_accepted() {
        assert_eq!(note_number("C#4"), Some(61));
        assert_eq!(note_number("Db4"), Some(61));
        assert_eq!(note_number("A0"), Some(21));
    }

    #[test]
    fn nonsense_is_rejected() {
        assert_eq!(note_number("H3"), None);
        assert_eq!(note_number("42"), None);
        assert_eq!(note_number(""), None);
    }
}
