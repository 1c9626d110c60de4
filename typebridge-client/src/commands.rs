//! Typewriter command words
//!
//! Every command is a 16-bit word sent as two bytes, high byte first. The
//! bridge forwards them untouched; this module only knows how the
//! typewriter interprets them.
//!
//! | Command        | Word                                      |
//! |----------------|-------------------------------------------|
//! | Move           | `0xC000 \| dir << 12 \| distance`         |
//! | Home position  | `0x8200 \| carriage << 8 \| ...`          |
//! | Character width| `0x8000 \| width`                         |
//! | Print          | `letter << 8 \| feed << 6 \| thickness`   |
//! | Space          | `0x8300 \| n`                             |
//! | Backspace      | `0x8400 \| n`                             |
//! | Control        | `0xA000..=0xA400`                         |

use typebridge_protocol::Command;

use crate::error::{ClientError, Result};

/// Largest distance a single move can cover, in steps
pub const MAX_DISTANCE: u16 = 0x0FFF;

/// Largest print thickness
pub const MAX_THICKNESS: u8 = 0x3F;

/// Print thickness used by [`TypewriterCommand::print`]
pub const DEFAULT_THICKNESS: u8 = 42;

/// Characters on the type wheel, in wheel order
///
/// A character's code is its position plus one. The apostrophe appears
/// twice; the first position is used.
pub const LETTERS: [char; 100] = [
    '.', ',', '-', 'v', 'l', 'm', 'j', 'w', '²', 'µ', 'f', '^', '>', '´', '+', '1', '2', '3', '4',
    '5', '6', '7', '8', '9', '0', 'E', '£', 'B', 'F', 'P', 'S', 'Z', 'V', '&', 'Y', 'A', 'T', 'L',
    '$', 'R', '*', 'C', '\'', 'D', '?', 'N', 'I', 'U', ')', 'W', '_', '=', ';', ':', 'M', '\'',
    'H', '(', 'K', '/', 'O', '!', 'X', '§', 'Q', 'J', '%', '³', 'G', '°', 'Ü', '`', 'Ö', '<', 'Ä',
    '#', 't', 'x', 'q', 'ß', 'ü', 'ö', 'ä', 'y', 'k', 'p', 'h', 'c', 'g', 'n', 'r', 's', 'e', 'a',
    'i', 'd', 'u', 'b', 'o', 'z',
];

/// Code printed for characters missing from the wheel
pub const FALLBACK_LETTER: u8 = 1;

/// Wheel code of `c`, or [`FALLBACK_LETTER`] if the wheel lacks it
pub fn letter_code(c: char) -> u8 {
    LETTERS
        .iter()
        .position(|&l| l == c)
        .map_or(FALLBACK_LETTER, |i| i as u8 + 1)
}

/// Head movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    fn bits(self) -> u16 {
        match self {
            Direction::Right => 0b00,
            Direction::Down => 0b01,
            Direction::Left => 0b10,
            Direction::Up => 0b11,
        }
    }
}

/// Carriage advance after printing a character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Left,
    Right,
}

impl From<Feed> for Direction {
    fn from(feed: Feed) -> Self {
        match feed {
            Feed::Left => Direction::Left,
            Feed::Right => Direction::Right,
        }
    }
}

/// Session control words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Clear,
    Start,
    Stx,
    Etx,
    Enq,
}

impl Control {
    fn word(self) -> u16 {
        match self {
            Control::Clear => 0xA000,
            Control::Start => 0xA100,
            Control::Stx => 0xA200,
            Control::Etx => 0xA300,
            Control::Enq => 0xA400,
        }
    }
}

/// One typewriter command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypewriterCommand {
    Move {
        direction: Direction,
        distance: u16,
    },
    HomePosition {
        carriage: bool,
        color_tape: bool,
        type_wheel: bool,
    },
    SetCharWidth(u8),
    PrintChar {
        letter: u8,
        feed: Option<Feed>,
        thickness: u8,
    },
    Space(u8),
    Backspace(u8),
    Control(Control),
}

/// Puts the typewriter in remote mode
pub const ONLINE: [TypewriterCommand; 4] = [
    TypewriterCommand::Control(Control::Clear),
    TypewriterCommand::Control(Control::Start),
    TypewriterCommand::Control(Control::Enq),
    TypewriterCommand::Control(Control::Stx),
];

/// Returns the typewriter to local mode
pub const OFFLINE: [TypewriterCommand; 2] = [
    TypewriterCommand::Control(Control::Etx),
    TypewriterCommand::Control(Control::Clear),
];

impl TypewriterCommand {
    pub fn move_by(direction: Direction, distance: u16) -> Self {
        TypewriterCommand::Move {
            direction,
            distance,
        }
    }

    /// Print `c` with an explicit thickness and feed
    pub fn print_with(c: char, thickness: u8, feed: Option<Feed>) -> Self {
        TypewriterCommand::PrintChar {
            letter: letter_code(c),
            feed,
            thickness,
        }
    }

    /// Print `c` at the default thickness, advancing right
    pub fn print(c: char) -> Self {
        Self::print_with(c, DEFAULT_THICKNESS, Some(Feed::Right))
    }

    /// Command word
    pub fn word(&self) -> Result<u16> {
        let word = match *self {
            TypewriterCommand::Move {
                direction,
                distance,
            } => {
                if distance > MAX_DISTANCE {
                    return Err(ClientError::DistanceOutOfRange(distance.into()));
                }
                0xC000 | direction.bits() << 12 | distance
            }
            TypewriterCommand::HomePosition {
                carriage,
                color_tape,
                type_wheel,
            } => {
                0x8200
                    | u16::from(carriage) << 8
                    | u16::from(color_tape) << 9
                    | u16::from(type_wheel) << 10
            }
            TypewriterCommand::SetCharWidth(width) => 0x8000 | u16::from(width),
            TypewriterCommand::PrintChar {
                letter,
                feed,
                thickness,
            } => {
                if thickness > MAX_THICKNESS {
                    return Err(ClientError::ThicknessOutOfRange(thickness));
                }
                let feed = match feed {
                    None => 0b00,
                    Some(Feed::Right) => 0b10,
                    Some(Feed::Left) => 0b11,
                };
                u16::from(letter) << 8 | feed << 6 | u16::from(thickness)
            }
            TypewriterCommand::Space(n) => 0x8300 | u16::from(n),
            TypewriterCommand::Backspace(n) => 0x8400 | u16::from(n),
            TypewriterCommand::Control(control) => control.word(),
        };
        Ok(word)
    }

    /// Command as sent through the bridge
    pub fn encode(&self) -> Result<Command> {
        self.word().map(Command::from_word)
    }
}

impl TryFrom<TypewriterCommand> for Command {
    type Error = ClientError;

    fn try_from(cmd: TypewriterCommand) -> Result<Self> {
        cmd.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(cmd: TypewriterCommand) -> u16 {
        cmd.word().unwrap()
    }

    #[test]
    fn test_move_words() {
        assert_eq!(word(TypewriterCommand::move_by(Direction::Right, 12)), 0xC00C);
        assert_eq!(word(TypewriterCommand::move_by(Direction::Down, 16)), 0xD010);
        assert_eq!(word(TypewriterCommand::move_by(Direction::Left, 0x123)), 0xE123);
        assert_eq!(word(TypewriterCommand::move_by(Direction::Up, 0xFFF)), 0xFFFF);
    }

    #[test]
    fn test_move_distance_bounded() {
        let err = TypewriterCommand::move_by(Direction::Left, 4096).word();
        assert!(matches!(err, Err(ClientError::DistanceOutOfRange(4096))));
    }

    #[test]
    fn test_home_position_bits() {
        let all = TypewriterCommand::HomePosition {
            carriage: true,
            color_tape: true,
            type_wheel: true,
        };
        assert_eq!(word(all), 0x8700);
        let carriage = TypewriterCommand::HomePosition {
            carriage: true,
            color_tape: false,
            type_wheel: false,
        };
        assert_eq!(word(carriage), 0x8300);
    }

    #[test]
    fn test_simple_words() {
        assert_eq!(word(TypewriterCommand::SetCharWidth(12)), 0x800C);
        assert_eq!(word(TypewriterCommand::Space(0)), 0x8300);
        assert_eq!(word(TypewriterCommand::Backspace(2)), 0x8402);
        assert_eq!(word(TypewriterCommand::Control(Control::Enq)), 0xA400);
    }

    #[test]
    fn test_backspace_distinct_from_char_width() {
        for n in 0..=u8::MAX {
            let backspace = word(TypewriterCommand::Backspace(n));
            for width in 0..=u8::MAX {
                assert_ne!(backspace, word(TypewriterCommand::SetCharWidth(width)));
            }
        }
    }

    #[test]
    fn test_print_words() {
        // 'a' is the 94th wheel position
        assert_eq!(letter_code('a'), 94);
        assert_eq!(word(TypewriterCommand::print('a')), 94 << 8 | 0b10 << 6 | 42);
        assert_eq!(
            word(TypewriterCommand::print_with('.', 20, Some(Feed::Left))),
            0x0100 | 0b11 << 6 | 20
        );
        assert_eq!(word(TypewriterCommand::print_with('.', 15, None)), 0x010F);
    }

    #[test]
    fn test_print_thickness_bounded() {
        let err = TypewriterCommand::print_with('a', 64, None).word();
        assert!(matches!(err, Err(ClientError::ThicknessOutOfRange(64))));
    }

    #[test]
    fn test_letter_codes() {
        assert_eq!(letter_code('.'), 1);
        assert_eq!(letter_code('1'), 16);
        assert_eq!(letter_code('z'), 100);
        // First of the two apostrophes
        assert_eq!(letter_code('\''), 43);
        // Missing from the wheel
        assert_eq!(letter_code('~'), FALLBACK_LETTER);
    }

    #[test]
    fn test_control_sequences() {
        let online: Vec<u16> = ONLINE.iter().map(|c| c.word().unwrap()).collect();
        assert_eq!(online, vec![0xA000, 0xA100, 0xA400, 0xA200]);
        let offline: Vec<u16> = OFFLINE.iter().map(|c| c.word().unwrap()).collect();
        assert_eq!(offline, vec![0xA300, 0xA000]);
    }

    #[test]
    fn test_encode_splits_word() {
        let cmd = TypewriterCommand::Control(Control::Start).encode().unwrap();
        assert_eq!(cmd, Command::new(0xA1, 0x00));
    }
}
