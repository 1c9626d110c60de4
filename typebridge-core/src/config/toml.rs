//! Minimal TOML parser for `bridge.toml`
//!
//! Handles only the subset the bridge needs:
//! - `[section]` headers
//! - `key = value` pairs with quoted string and integer values (`_` separators allowed)
//! - Comments (`# ...`), whole-line and trailing
//!
//! Unknown sections and keys are errors so a typo cannot silently fall back
//! to a default.

use heapless::String;

use super::BridgeConfig;
use crate::link::ResetPolicy;
use typebridge_protocol::InboundMode;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection { line: u16 },
    /// Key not known in its section, or a key outside any section
    UnknownKey { line: u16 },
    /// Line is neither a header nor `key = value`
    InvalidLine { line: u16 },
    /// Value has the wrong type or is out of range
    InvalidValue { line: u16 },
    /// String longer than its field
    TooLong { line: u16 },
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Network,
    Link,
    Keyboard,
    Protocol,
    Session,
}

/// Parse `bridge.toml` contents on top of the defaults
pub fn parse_config(input: &str) -> Result<BridgeConfig, ParseError> {
    let mut config = BridgeConfig::default();
    let mut section = Section::Root;

    for (index, line) in input.lines().enumerate() {
        let line_no = u16::try_from(index + 1).unwrap_or(u16::MAX);
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let header = strip_comment(line);
            if !header.ends_with(']') {
                return Err(ParseError::InvalidSection { line: line_no });
            }
            section = parse_section_header(&header[1..header.len() - 1])
                .ok_or(ParseError::InvalidSection { line: line_no })?;
            continue;
        }

        let (key, value) =
            parse_key_value(line).ok_or(ParseError::InvalidLine { line: line_no })?;
        apply_value(section, key, value, &mut config).map_err(|e| e.at(line_no))?;
    }

    Ok(config)
}

/// Error kind before the line number is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueError {
    UnknownKey,
    Invalid,
    TooLong,
}

impl ValueError {
    fn at(self, line: u16) -> ParseError {
        match self {
            Self::UnknownKey => ParseError::UnknownKey { line },
            Self::Invalid => ParseError::InvalidValue { line },
            Self::TooLong => ParseError::TooLong { line },
        }
    }
}

fn parse_section_header(header: &str) -> Option<Section> {
    match header.trim() {
        "network" => Some(Section::Network),
        "link" => Some(Section::Link),
        "keyboard" => Some(Section::Keyboard),
        "protocol" => Some(Section::Protocol),
        "session" => Some(Section::Session),
        _ => None,
    }
}

/// Drop a trailing comment that is not inside a string
fn strip_comment(value: &str) -> &str {
    let mut in_string = false;
    for (pos, c) in value.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return value[..pos].trim(),
            _ => {}
        }
    }
    value.trim()
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = strip_comment(&line[eq_pos + 1..]);

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a quoted string value
fn parse_string(value: &str) -> Result<&str, ValueError> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        Ok(&value[1..value.len() - 1])
    } else {
        Err(ValueError::Invalid)
    }
}

fn parse_bounded<const N: usize>(value: &str) -> Result<String<N>, ValueError> {
    String::try_from(parse_string(value)?).map_err(|_| ValueError::TooLong)
}

/// Parse an integer value, allowing `_` separators
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ValueError> {
    let mut digits: String<24> = String::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ValueError::Invalid)?;
    }
    digits.parse().map_err(|_| ValueError::Invalid)
}

/// Parse a nonzero integer value
fn parse_nonzero(value: &str) -> Result<u32, ValueError> {
    match parse_int(value)? {
        0 => Err(ValueError::Invalid),
        n => Ok(n),
    }
}

fn parse_reset_policy(value: &str) -> Result<ResetPolicy, ValueError> {
    match parse_string(value)? {
        "always" => Ok(ResetPolicy::Always),
        "response_only" => Ok(ResetPolicy::ResponseOnly),
        _ => Err(ValueError::Invalid),
    }
}

fn parse_mode(value: &str) -> Result<InboundMode, ValueError> {
    match parse_string(value)? {
        "explicit" => Ok(InboundMode::Explicit),
        "implicit" => Ok(InboundMode::Implicit),
        _ => Err(ValueError::Invalid),
    }
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut BridgeConfig,
) -> Result<(), ValueError> {
    match section {
        Section::Root => return Err(ValueError::UnknownKey),
        Section::Network => {
            let n = &mut config.network;
            match key {
                "ssid" => n.ssid = parse_bounded(value)?,
                "password" => n.password = parse_bounded(value)?,
                "port" => {
                    n.port = match parse_int(value)? {
                        0 => return Err(ValueError::Invalid),
                        port => port,
                    }
                }
                _ => return Err(ValueError::UnknownKey),
            }
        }
        Section::Link => {
            let l = &mut config.link;
            match key {
                "handshake_timeout_us" => l.handshake_timeout_us = parse_nonzero(value)?,
                "response_timeout_us" => l.response_timeout_us = parse_nonzero(value)?,
                "poll_interval_us" => l.poll_interval_us = parse_nonzero(value)?,
                "continuation_window_us" => l.continuation_window_us = parse_nonzero(value)?,
                "reset_pulse_us" => l.reset_pulse_us = parse_nonzero(value)?,
                "reset_policy" => l.reset_policy = parse_reset_policy(value)?,
                _ => return Err(ValueError::UnknownKey),
            }
        }
        Section::Keyboard => match key {
            "settle_us" => config.keyboard.settle_us = parse_int(value)?,
            _ => return Err(ValueError::UnknownKey),
        },
        Section::Protocol => match key {
            "mode" => config.session.mode = parse_mode(value)?,
            "scan_interval_ms" => config.session.scan_interval_ms = parse_nonzero(value)?,
            _ => return Err(ValueError::UnknownKey),
        },
        Section::Session => match key {
            "idle_poll_us" => config.session.idle_poll_us = parse_int(value)?,
            _ => return Err(ValueError::UnknownKey),
        },
    }
    Ok(())
}
