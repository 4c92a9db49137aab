//! Frame types for the device → host telemetry stream.
//!
//! Wire format:
//! ```text
//! legacy:   S<axisX>:<axisY>:<joystickSwitch>E
//! extended: S<axisX>:<axisY>:<joystickSwitch>:<leftSwitch>:<rightSwitch>E
//! ```
//! Axis values are signed decimal integers (`+12`, `-3`, `0`).  Switch values
//! are single digits, `0` (released) or `1` (pressed).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::input::ButtonRole;

/// Marks the beginning of a telemetry frame.
pub const FRAME_START: char = 'S';
/// Marks the end of a telemetry frame.
pub const FRAME_END: char = 'E';
/// Separates the fields inside a frame.
pub const FIELD_SEPARATOR: char = ':';

/// Errors produced when a structurally delimited frame does not fit the
/// active schema.
///
/// A `FrameFormatError` never ends a connection: the offending frame is
/// dropped and decoding continues with the next one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameFormatError {
    /// The text does not start with `S` and end with `E`.
    #[error("frame is not delimited by 'S'…'E': {frame:?}")]
    MissingDelimiters { frame: String },

    /// The number of fields differs from what the schema requires.
    #[error("{schema} frame needs {expected} fields, found {found}")]
    FieldCount {
        schema: FrameSchema,
        expected: usize,
        found: usize,
    },

    /// A field is empty, non-numeric, or does not fit in an `i32`.
    #[error("field {index} is not a signed integer: {field:?}")]
    InvalidField { index: usize, field: String },

    /// A switch field holds something other than 0 or 1.
    #[error("switch field {index} must be 0 or 1, got {value}")]
    SwitchOutOfRange { index: usize, value: i32 },
}

/// Returned when a schema name cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown frame schema {0:?}, expected \"legacy\" or \"extended\"")]
pub struct UnknownSchema(pub String);

// ── FrameSchema ───────────────────────────────────────────────────────────────

/// The fixed positional layout a session commits to at startup.
///
/// All frames decoded during one process lifetime are parsed against the same
/// schema; frames with a different field count are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSchema {
    /// Three fields: axisX, axisY, joystickSwitch.
    Legacy,
    /// Five fields: axisX, axisY, joystickSwitch, leftSwitch, rightSwitch.
    #[default]
    Extended,
}

impl FrameSchema {
    /// Number of axis fields at the front of every frame.
    pub const AXIS_COUNT: usize = 2;

    /// Total number of fields between the delimiters.
    pub const fn field_count(self) -> usize {
        Self::AXIS_COUNT + self.switch_count()
    }

    /// Number of switch fields following the two axes.
    pub const fn switch_count(self) -> usize {
        match self {
            FrameSchema::Legacy => 1,
            FrameSchema::Extended => 3,
        }
    }

    /// Button roles in switch-index order.
    ///
    /// Index 0 is always the joystick switch, mapped to the primary button.
    pub fn roles(self) -> &'static [ButtonRole] {
        match self {
            FrameSchema::Legacy => &[ButtonRole::Primary],
            FrameSchema::Extended => &[
                ButtonRole::Primary,
                ButtonRole::Secondary,
                ButtonRole::Tertiary,
            ],
        }
    }

    /// Lowercase name used in config files and on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            FrameSchema::Legacy => "legacy",
            FrameSchema::Extended => "extended",
        }
    }
}

impl fmt::Display for FrameSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FrameSchema {
    type Err = UnknownSchema;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(FrameSchema::Legacy),
            "extended" => Ok(FrameSchema::Extended),
            _ => Err(UnknownSchema(s.to_string())),
        }
    }
}

// ── RawFrame ──────────────────────────────────────────────────────────────────

/// One delimited `S…E` substring pulled out of the decode buffer.
///
/// The decoder only guarantees the *structure* (delimiters, signed-integer
/// fields); whether the field count fits the schema is decided by
/// [`parse_frame`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawFrame(String);

impl RawFrame {
    /// Returns the frame text including both delimiters.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the frame and returns its text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for RawFrame {
    fn from(text: &str) -> Self {
        RawFrame(text.to_string())
    }
}

impl From<String> for RawFrame {
    fn from(text: String) -> Self {
        RawFrame(text)
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── ParsedFrame ───────────────────────────────────────────────────────────────

/// State of one physical switch as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwitchState {
    #[default]
    Released,
    Pressed,
}

impl SwitchState {
    /// Converts a wire value (`0`/`1`) into a switch state.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(SwitchState::Released),
            1 => Some(SwitchState::Pressed),
            _ => None,
        }
    }

    pub fn is_pressed(self) -> bool {
        self == SwitchState::Pressed
    }
}

/// An immutable, schema-checked telemetry frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    schema: FrameSchema,
    axis_x: i32,
    axis_y: i32,
    switches: Vec<SwitchState>,
}

impl ParsedFrame {
    /// Builds a frame, checking that `switches` has exactly the number of
    /// entries `schema` requires.
    ///
    /// # Errors
    ///
    /// Returns [`FrameFormatError::FieldCount`] on a count mismatch.
    pub fn new(
        schema: FrameSchema,
        axis_x: i32,
        axis_y: i32,
        switches: Vec<SwitchState>,
    ) -> Result<Self, FrameFormatError> {
        if switches.len() != schema.switch_count() {
            return Err(FrameFormatError::FieldCount {
                schema,
                expected: schema.field_count(),
                found: FrameSchema::AXIS_COUNT + switches.len(),
            });
        }
        Ok(Self {
            schema,
            axis_x,
            axis_y,
            switches,
        })
    }

    pub fn schema(&self) -> FrameSchema {
        self.schema
    }

    /// Horizontal movement delta.
    pub fn axis_x(&self) -> i32 {
        self.axis_x
    }

    /// Vertical movement delta.
    pub fn axis_y(&self) -> i32 {
        self.axis_y
    }

    /// Switch states in wire order.
    pub fn switches(&self) -> &[SwitchState] {
        &self.switches
    }
}

/// Parses a delimited frame against `schema`.
///
/// Strips the `S`/`E` delimiters, splits on `:`, checks the field count, and
/// parses every field as a signed integer.  Switch fields must be 0 or 1.
///
/// # Errors
///
/// Returns a [`FrameFormatError`] describing the first problem found.
///
/// # Examples
///
/// ```rust
/// use joypointer_core::protocol::frame::{parse_frame, FrameSchema, RawFrame, SwitchState};
///
/// let frame = parse_frame(&RawFrame::from("S+4:-2:1E"), FrameSchema::Legacy).unwrap();
/// assert_eq!((frame.axis_x(), frame.axis_y()), (4, -2));
/// assert_eq!(frame.switches(), &[SwitchState::Pressed]);
/// ```
pub fn parse_frame(raw: &RawFrame, schema: FrameSchema) -> Result<ParsedFrame, FrameFormatError> {
    let body = raw
        .as_str()
        .strip_prefix(FRAME_START)
        .and_then(|rest| rest.strip_suffix(FRAME_END))
        .ok_or_else(|| FrameFormatError::MissingDelimiters {
            frame: raw.as_str().to_string(),
        })?;

    let fields: Vec<&str> = body.split(FIELD_SEPARATOR).collect();
    if fields.len() != schema.field_count() {
        return Err(FrameFormatError::FieldCount {
            schema,
            expected: schema.field_count(),
            found: fields.len(),
        });
    }

    let mut values = Vec::with_capacity(fields.len());
    for (index, field) in fields.iter().enumerate() {
        let value = field
            .parse::<i32>()
            .map_err(|_| FrameFormatError::InvalidField {
                index,
                field: (*field).to_string(),
            })?;
        values.push(value);
    }

    let switches = values[FrameSchema::AXIS_COUNT..]
        .iter()
        .enumerate()
        .map(|(offset, &value)| {
            SwitchState::from_value(value).ok_or(FrameFormatError::SwitchOutOfRange {
                index: FrameSchema::AXIS_COUNT + offset,
                value,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    ParsedFrame::new(schema, values[0], values[1], switches)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
