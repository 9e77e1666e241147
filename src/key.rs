//! Keys of the 88-key keyboard and their note names.

use std::fmt;

use crate::error::{Error, Result};

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Number of keys on the keyboard.
pub const KEY_COUNT: usize = 88;
/// MIDI note of the lowest key (A0).
pub const MIDI_START: u8 = 21;
/// MIDI note of the highest key (C8).
pub const MIDI_END: u8 = 108;
/// MIDI note of the reference pitch (A4).
pub const A4_MIDI: u8 = 69;

/// Position of a key on the keyboard, `0` being A0 and `87` being C8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyIndex(u8);

impl KeyIndex {
    pub const LOWEST: KeyIndex = KeyIndex(0);
    pub const HIGHEST: KeyIndex = KeyIndex(87);
    /// A4, the key the reference pitch is defined on.
    pub const REFERENCE: KeyIndex = KeyIndex(A4_MIDI - MIDI_START);

    pub fn new(index: usize) -> Result<Self> {
        if index < KEY_COUNT {
            Ok(Self(index as u8))
        } else {
            Err(Error::KeyOutOfRange(index as i64))
        }
    }

    pub fn from_midi(note: u8) -> Result<Self> {
        if (MIDI_START..=MIDI_END).contains(&note) {
            Ok(Self(note - MIDI_START))
        } else {
            Err(Error::KeyOutOfRange(note as i64))
        }
    }

    /// Resolves a note name such as `A4`, `c#3` or `F-1`.
    pub fn from_name(name: &str) -> Option<Self> {
        let midi = name_to_midi(name)?;
        u8::try_from(midi).ok().and_then(|m| Self::from_midi(m).ok())
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn midi(self) -> u8 {
        self.0 + MIDI_START
    }

    pub fn is_black(self) -> bool {
        matches!(self.midi() % 12, 1 | 3 | 6 | 8 | 10)
    }

    /// Mirror image across the keyboard midpoint (0 <-> 87).
    pub fn mirrored(self) -> Self {
        Self(87 - self.0)
    }

    pub fn all() -> impl Iterator<Item = KeyIndex> {
        (0..KEY_COUNT as u8).map(KeyIndex)
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let midi = self.midi() as i32;
        write!(f, "{}{}", NOTE_NAMES[(midi % 12) as usize], midi / 12 - 1)
    }
}

/// Parses `<letter>[#]<octave>` into a MIDI note number. Flats are not accepted.
pub fn name_to_midi(name: &str) -> Option<i32> {
    let name = name.trim().to_ascii_uppercase();
    let mut chars = name.chars();
    let letter = chars.next().filter(|c| ('A'..='G').contains(c))?;
    let rest = chars.as_str();
    let (sharp, octave) = match rest.strip_prefix('#') {
        Some(octave) => (true, octave),
        None => (false, rest),
    };

    let digits = octave.strip_prefix('-').unwrap_or(octave);
    if digits.len() != 1 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let octave: i32 = octave.parse().ok()?;

    let mut pitch = letter.to_string();
    if sharp {
        pitch.push('#');
    }
    let class = NOTE_NAMES.iter().position(|n| *n == pitch)? as i32;
    Some((octave + 1) * 12 + class)
}

/// Computer-keyboard layout covering one octave from C4.
pub fn qwerty_to_midi(key: char) -> Option<u8> {
    let midi = match key.to_ascii_uppercase() {
        'A' => 60,
        'W' => 61,
        'S' => 62,
        'E' => 63,
        'D' => 64,
        'F' => 65,
        'T' => 66,
        'G' => 67,
        'Y' => 68,
        'H' => 69,
        'U' => 70,
        'J' => 71,
        _ => return None,
    };
    Some(midi)
}
