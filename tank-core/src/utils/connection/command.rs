//! Text command grammar for the drive link.
//!
//! One command per newline-terminated line, case-insensitive:
//!
//! - `hello` answers `ack` and changes nothing.
//! - `<left>,<right>` sets both wheel targets (steps/second) and answers with
//!   the values actually applied.
//!
//! Anything else answers `USAGE_REPLY`.

use core::fmt::Write;

/// Answer to the liveness handshake.
pub const HANDSHAKE_REPLY: &str = "ack";
/// Answer to any line that is not a valid command.
pub const USAGE_REPLY: &str = "Err: use 'L,R' or 'hello'";

/// Outgoing reply text, without line terminator.
pub type Reply = heapless::String<96>;

/// Parsed drive command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Hello,
    SetTargets { left: f32, right: f32 },
}

/// Why an incoming line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Not `hello` and not two finite comma-separated numbers.
    Malformed,
    /// The line did not fit in the line buffer.
    Overflow,
}

/// Parse one line (terminator already removed).
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("hello") {
        return Ok(Command::Hello);
    }

    let (left, right) = line.split_once(',').ok_or(CommandError::Malformed)?;
    Ok(Command::SetTargets {
        left: parse_speed(left)?,
        right: parse_speed(right)?,
    })
}

fn parse_speed(field: &str) -> Result<f32, CommandError> {
    match field.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CommandError::Malformed),
    }
}

/// Build a reply from fixed text.
pub fn text_reply(text: &str) -> Reply {
    let mut reply = Reply::new();
    let _ = reply.push_str(text);
    reply
}

/// Build the reply echoing the applied left/right targets.
pub fn targets_reply(
    left: f32,
    right: f32,
) -> Reply {
    let mut reply = Reply::new();
    let _ = write!(reply, "{},{}", left, right);
    reply
}
