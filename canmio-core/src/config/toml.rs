//! Simple TOML parser for module configuration
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! CANMIO line configuration. It does NOT support the full TOML spec.
//!
//! Supported features:
//! - Key = value pairs (string, integer)
//! - [module] section for module-wide settings
//! - [io.N] section headers, one per configured line
//! - Integer arrays on one line: positions = [32, 96, 160]
//! - Comments (# ...)
//!
//! NOT supported:
//! - Multi-line strings or arrays
//! - Inline tables
//! - Dotted keys outside section headers
//!
//! Lines without a section keep the factory type (input).

use heapless::Vec;

use super::types::{
    ChannelConfig, ModuleConfig, MultiConfig, ServoConfig, MAX_MULTI_POSITIONS, NUM_IO,
};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Invalid or out-of-range section header
    InvalidSection,
    /// Key not valid for the section's line type
    UnknownKey,
    /// Invalid value type or out of range
    InvalidValue,
    /// Section without a `type` key
    MissingType,
    /// Too many items (exceeded heapless capacity)
    TooManyItems,
}

/// Line type named by the `type` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Input,
    Output,
    Servo,
    Bounce,
    Multi,
}

/// Keys collected for one `[io.N]` section
#[derive(Debug, Default)]
struct LineDraft {
    io: usize,
    kind: Option<LineKind>,
    travel: ServoConfig,
    positions: Vec<u8, MAX_MULTI_POSITIONS>,
    speed: Option<u8>,
}

impl LineDraft {
    fn new(io: usize) -> Self {
        Self {
            io,
            ..Default::default()
        }
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ParseError> {
        match key {
            "type" => self.kind = Some(parse_kind(value)?),
            "start_pos" => self.travel.start_pos = parse_int(value)?,
            "end_pos" => self.travel.end_pos = parse_int(value)?,
            "on_speed" => self.travel.on_speed = parse_int(value)?,
            "off_speed" => self.travel.off_speed = parse_int(value)?,
            "positions" => self.positions = parse_int_array(value)?,
            "speed" => self.speed = Some(parse_int(value)?),
            _ => return Err(ParseError::UnknownKey),
        }
        Ok(())
    }

    fn finish(self) -> Result<(usize, ChannelConfig), ParseError> {
        let kind = self.kind.ok_or(ParseError::MissingType)?;
        let has_multi_keys = !self.positions.is_empty() || self.speed.is_some();

        let channel = match kind {
            LineKind::Multi => {
                let speed = self.speed.unwrap_or(MultiConfig::default().speed);
                ChannelConfig::Multi(
                    MultiConfig::new(&self.positions, speed).ok_or(ParseError::InvalidValue)?,
                )
            }
            _ if has_multi_keys => return Err(ParseError::UnknownKey),
            LineKind::Servo => ChannelConfig::Servo(self.travel),
            LineKind::Bounce => ChannelConfig::Bounce(self.travel),
            LineKind::Output => ChannelConfig::Output,
            LineKind::Input => ChannelConfig::Input,
        };
        Ok((self.io, channel))
    }
}

/// Section currently being parsed
#[derive(Debug)]
enum Section {
    /// Before the first header, where no keys are allowed
    Root,
    Module,
    Line(LineDraft),
}

/// Parse TOML configuration into ModuleConfig
pub fn parse_config(input: &str) -> Result<ModuleConfig, ParseError> {
    let mut config = ModuleConfig::new();
    let mut current = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            finish_section(&mut config, current)?;
            current = parse_section_header(&line[1..line.len() - 1])?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            match &mut current {
                Section::Root => return Err(ParseError::InvalidSection),
                Section::Module => apply_module_key(&mut config, key, value)?,
                Section::Line(draft) => draft.apply(key, value)?,
            }
        }
    }

    finish_section(&mut config, current)?;
    Ok(config)
}

fn finish_section(config: &mut ModuleConfig, section: Section) -> Result<(), ParseError> {
    if let Section::Line(draft) = section {
        let (io, channel) = draft.finish()?;
        config.channels[io] = channel;
    }
    Ok(())
}

fn apply_module_key(config: &mut ModuleConfig, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "sod_delay" => config.sod_delay = parse_int(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

/// Parse section header like "io.3" or "module"
fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    let header = header.trim();
    if header == "module" {
        return Ok(Section::Module);
    }
    let (section_type, index) = header
        .split_once('.')
        .ok_or(ParseError::InvalidSection)?;
    if section_type.trim() != "io" {
        return Err(ParseError::InvalidSection);
    }
    let io: usize = index
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidSection)?;
    if io >= NUM_IO {
        return Err(ParseError::InvalidSection);
    }
    Ok(Section::Line(LineDraft::new(io)))
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = if let Some(hash_pos) = value.find('#') {
        // Make sure # is not inside a string
        let quote_count = value[..hash_pos].matches('"').count();
        if quote_count % 2 == 0 {
            value[..hash_pos].trim()
        } else {
            value
        }
    } else {
        value
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

/// Parse an integer value
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

/// Parse an integer array like "[32, 96, 160]"
fn parse_int_array<const N: usize>(value: &str) -> Result<Vec<u8, N>, ParseError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(ParseError::InvalidValue)?;

    let mut items = Vec::new();
    for item in inner.split(',') {
        let item = item.trim();
        // Trailing comma
        if item.is_empty() {
            continue;
        }
        items
            .push(parse_int(item)?)
            .map_err(|_| ParseError::TooManyItems)?;
    }
    Ok(items)
}

/// Parse line type
fn parse_kind(value: &str) -> Result<LineKind, ParseError> {
    match parse_string(value) {
        "input" | "INPUT" => Ok(LineKind::Input),
        "output" | "OUTPUT" => Ok(LineKind::Output),
        "servo" | "SERVO" => Ok(LineKind::Servo),
        "bounce" | "BOUNCE" => Ok(LineKind::Bounce),
        "multi" | "MULTI" => Ok(LineKind::Multi),
        _ => Err(ParseError::InvalidValue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canmio_protocol::IoType;

    fn line_of(header: &str) -> Option<usize> {
        match parse_section_header(header) {
            Ok(Section::Line(draft)) => Some(draft.io),
            _ => None,
        }
    }

    #[test]
    fn test_parse_section_header() {
        assert_eq!(line_of("io.0"), Some(0));
        assert_eq!(line_of(" io.15 "), Some(15));
        assert!(matches!(parse_section_header(" module "), Ok(Section::Module)));
        assert!(matches!(
            parse_section_header("io.16"),
            Err(ParseError::InvalidSection)
        ));
        assert!(matches!(
            parse_section_header("servo.1"),
            Err(ParseError::InvalidSection)
        ));
        assert!(matches!(
            parse_section_header("io"),
            Err(ParseError::InvalidSection)
        ));
    }

    #[test]
    fn test_parse_int_array() {
        let items: Vec<u8, 4> = parse_int_array("[32, 96,160 ]").unwrap();
        assert_eq!(items.as_slice(), &[32, 96, 160]);

        let items: Vec<u8, 4> = parse_int_array("[1, 2,]").unwrap();
        assert_eq!(items.as_slice(), &[1, 2]);

        assert_eq!(
            parse_int_array::<4>("[1, 2, 3, 4, 5]"),
            Err(ParseError::TooManyItems)
        );
        assert_eq!(parse_int_array::<4>("1, 2"), Err(ParseError::InvalidValue));
        assert_eq!(parse_int_array::<4>("[1, 300]"), Err(ParseError::InvalidValue));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config_str = r#"
# Two turnouts and a semaphore
[io.0]
type = "servo"
start_pos = 0
end_pos = 200   # full throw
on_speed = 5
off_speed = 2

[io.1]
type = "bounce"

[io.4]
type = "multi"
positions = [32, 96, 160, 224]
speed = 3

[io.8]
type = "output"
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(
            config.channels[0],
            ChannelConfig::Servo(ServoConfig {
                start_pos: 0,
                end_pos: 200,
                on_speed: 5,
                off_speed: 2,
            })
        );
        assert_eq!(
            config.channels[1],
            ChannelConfig::Bounce(ServoConfig::default())
        );
        match config.channels[4] {
            ChannelConfig::Multi(multi) => {
                assert_eq!(multi.positions(), &[32, 96, 160, 224]);
                assert_eq!(multi.speed, 3);
            }
            other => panic!("Wrong line type: {:?}", other),
        }
        assert_eq!(config.channels[8].io_type(), IoType::Output);
        assert_eq!(config.channels[2].io_type(), IoType::Input);
        assert_eq!(config.servo_count(), 3);
    }

    #[test]
    fn test_empty_config_is_all_inputs() {
        assert_eq!(parse_config("# nothing\n"), Ok(ModuleConfig::new()));
    }

    #[test]
    fn test_missing_type() {
        let config_str = "[io.2]\nstart_pos = 10\n";
        assert_eq!(parse_config(config_str), Err(ParseError::MissingType));
    }

    #[test]
    fn test_multi_needs_two_positions() {
        let config_str = "[io.3]\ntype = \"multi\"\npositions = [40]\n";
        assert_eq!(parse_config(config_str), Err(ParseError::InvalidValue));
    }

    #[test]
    fn test_positions_rejected_on_servo() {
        let config_str = "[io.3]\ntype = \"servo\"\npositions = [40, 50]\n";
        assert_eq!(parse_config(config_str), Err(ParseError::UnknownKey));
    }

    #[test]
    fn test_unknown_key() {
        let config_str = "[io.3]\ntype = \"servo\"\nangle = 4\n";
        assert_eq!(parse_config(config_str), Err(ParseError::UnknownKey));
    }

    #[test]
    fn test_module_section() {
        let config_str = "[module]\nsod_delay = 30  # 3 s\n\n[io.0]\ntype = \"servo\"\n";
        let config = parse_config(config_str).unwrap();
        assert_eq!(config.sod_delay, 30);
        assert_eq!(config.startup_hold_ms(), 5000);
        assert_eq!(config.channels[0].io_type(), IoType::Servo);

        assert_eq!(
            parse_config("[module]\nnode = 5\n"),
            Err(ParseError::UnknownKey)
        );
        assert_eq!(
            parse_config("[module]\nsod_delay = 300\n"),
            Err(ParseError::InvalidValue)
        );
    }

    #[test]
    fn test_root_key_rejected() {
        assert_eq!(parse_config("node = 5\n"), Err(ParseError::InvalidSection));
    }

    #[test]
    fn test_out_of_range_position() {
        let config_str = "[io.0]\ntype = \"servo\"\nend_pos = 256\n";
        assert_eq!(parse_config(config_str), Err(ParseError::InvalidValue));
    }
}
