//! Fixed-capacity buffering between the serial link and the control loop.
//!
//! Raw bytes are queued as they arrive; each control tick pulls at most one
//! complete line out of the queue. Partial lines stay buffered until their
//! newline arrives. Nothing here allocates.
//!
//! A line that loses bytes because the queue was full is never parsed; it is
//! reported as `CommandError::Overflow` once its newline is consumed.

use heapless::{Deque, Vec};

use super::command::{parse_command, Command, CommandError};

/// Raw bytes held between ticks.
pub const RX_CAPACITY: usize = 256;
/// Longest accepted command line, terminator excluded.
pub const LINE_CAPACITY: usize = 64;

/// Result of assembling one line.
pub type Inbound = Result<Command, CommandError>;

/// Byte queue plus line assembler for the command link.
pub struct CommandChannel {
    rx: Deque<u8, RX_CAPACITY>,
    line: Vec<u8, LINE_CAPACITY>,
    overflowed: bool,
    dropped: u32,
    /// Newlines queued so far (wrapping); numbers the line open at the tail.
    queued_lines: u32,
    /// Newlines consumed so far (wrapping); numbers the line being assembled.
    taken_lines: u32,
    /// Inclusive range of line numbers that lost bytes to a full queue.
    damaged: Option<(u32, u32)>,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel {
    pub const fn new() -> Self {
        Self {
            rx: Deque::new(),
            line: Vec::new(),
            overflowed: false,
            dropped: 0,
            queued_lines: 0,
            taken_lines: 0,
            damaged: None,
        }
    }

    /// Queue incoming bytes. Returns how many fit; the rest are dropped.
    ///
    /// Dropping marks the affected line as damaged. If the queue overflows
    /// again before that line is consumed, every line up to the new damage is
    /// rejected as well.
    pub fn push(
        &mut self,
        bytes: &[u8],
    ) -> usize {
        let mut accepted = 0;
        for &b in bytes {
            if self.rx.push_back(b).is_err() {
                break;
            }
            if b == b'\n' {
                self.queued_lines = self.queued_lines.wrapping_add(1);
            }
            accepted += 1;
        }

        let lost = &bytes[accepted..];
        if !lost.is_empty() {
            self.dropped = self.dropped.saturating_add(lost.len() as u32);
            self.mark_damaged(lost);
            tracing::warn!(lost = lost.len(), "command queue full, bytes dropped");
        }
        accepted
    }

    fn mark_damaged(
        &mut self,
        lost: &[u8],
    ) {
        // the queue is full here, so its last byte decides whether a line is open
        let tail_open = self.rx.back() != Some(&b'\n');
        // whole lines lost behind a line boundary leave nothing to reject
        if !tail_open && lost.last() == Some(&b'\n') {
            return;
        }
        let line = self.queued_lines;
        self.damaged = Some(match self.damaged {
            Some((first, _)) => (first, line),
            None => (line, line),
        });
    }

    /// Whether line number `line` lost bytes; consumes its mark.
    fn take_damage(
        &mut self,
        line: u32,
    ) -> bool {
        match self.damaged {
            Some((first, last)) if first == line => {
                self.damaged = if first == last {
                    None
                } else {
                    Some((first.wrapping_add(1), last))
                };
                true
            }
            _ => false,
        }
    }

    /// Bytes dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Bytes queued but not yet assembled into a line.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Assemble and parse at most one complete line.
    ///
    /// Blank lines are skipped. A line longer than `LINE_CAPACITY`, or one that
    /// lost bytes to a full queue, is discarded up to its newline and reported
    /// as `CommandError::Overflow`.
    pub fn next_line(&mut self) -> Option<Inbound> {
        while let Some(byte) = self.rx.pop_front() {
            if byte != b'\n' {
                if !self.overflowed && self.line.push(byte).is_err() {
                    self.overflowed = true;
                }
                continue;
            }

            let line = self.taken_lines;
            self.taken_lines = self.taken_lines.wrapping_add(1);
            let too_long = core::mem::take(&mut self.overflowed);
            let truncated = self.take_damage(line);

            let inbound = if too_long || truncated {
                Some(Err(CommandError::Overflow))
            } else {
                match core::str::from_utf8(&self.line) {
                    Ok(text) if text.trim().is_empty() => None,
                    Ok(text) => Some(parse_command(text)),
                    Err(_) => Some(Err(CommandError::Malformed)),
                }
            };
            self.line.clear();

            if inbound.is_some() {
                return inbound;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_line_waits_for_newline() {
        let mut ch = CommandChannel::new();
        ch.push(b"hel");
        assert_eq!(ch.next_line(), None);
        ch.push(b"lo\r\n");
        assert_eq!(ch.next_line(), Some(Ok(Command::Hello)));
        assert_eq!(ch.next_line(), None);
    }

    #[test]
    fn one_line_per_call() {
        let mut ch = CommandChannel::new();
        ch.push(b"1,2\nhello\n");
        assert_eq!(
            ch.next_line(),
            Some(Ok(Command::SetTargets {
                left: 1.0,
                right: 2.0
            }))
        );
        assert_eq!(ch.pending(), 6);
        assert_eq!(ch.next_line(), Some(Ok(Command::Hello)));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut ch = CommandChannel::new();
        ch.push(b"\n \r\n\nhello\n");
        assert_eq!(ch.next_line(), Some(Ok(Command::Hello)));
    }

    #[test]
    fn long_line_is_rejected_and_buffer_recovers() {
        let mut ch = CommandChannel::new();
        let long = [b'9'; LINE_CAPACITY + 10];
        ch.push(&long);
        ch.push(b"\n");
        assert_eq!(ch.next_line(), Some(Err(CommandError::Overflow)));
        ch.push(b"5,5\n");
        assert_eq!(
            ch.next_line(),
            Some(Ok(Command::SetTargets {
                left: 5.0,
                right: 5.0
            }))
        );
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut ch = CommandChannel::new();
        ch.push(&[0xff, 0xfe, b'\n']);
        assert_eq!(ch.next_line(), Some(Err(CommandError::Malformed)));
    }

    #[test]
    fn full_queue_drops_excess() {
        let mut ch = CommandChannel::new();
        let flood = [b'x'; RX_CAPACITY + 4];
        assert_eq!(ch.push(&flood), RX_CAPACITY);
        assert_eq!(ch.dropped(), 4);
    }

    /// Fill all but four bytes of the queue with complete `1,1` lines.
    fn nearly_full() -> CommandChannel {
        let mut ch = CommandChannel::new();
        for _ in 0..(RX_CAPACITY - 4) / 4 {
            assert_eq!(ch.push(b"1,1\n"), 4);
        }
        ch
    }

    fn drain_ones(ch: &mut CommandChannel) {
        for _ in 0..(RX_CAPACITY - 4) / 4 {
            assert_eq!(
                ch.next_line(),
                Some(Ok(Command::SetTargets {
                    left: 1.0,
                    right: 1.0
                }))
            );
        }
    }

    #[test]
    fn cut_line_is_rejected_not_truncated() {
        let mut ch = nearly_full();
        assert_eq!(ch.push(b"7,200"), 4);
        assert_eq!(ch.dropped(), 1);
        drain_ones(&mut ch);

        assert_eq!(ch.next_line(), None);
        ch.push(b"\n");
        assert_eq!(ch.next_line(), Some(Err(CommandError::Overflow)));

        ch.push(b"5,5\n");
        assert_eq!(
            ch.next_line(),
            Some(Ok(Command::SetTargets {
                left: 5.0,
                right: 5.0
            }))
        );
    }

    #[test]
    fn line_cut_after_a_lost_newline_is_rejected() {
        let mut ch = nearly_full();
        // "7,20" is queued; "0\n3," is lost, so "4" arrives without its head
        assert_eq!(ch.push(b"7,200\n3,"), 4);
        drain_ones(&mut ch);
        ch.push(b"4\n");
        assert_eq!(ch.next_line(), Some(Err(CommandError::Overflow)));
        assert_eq!(ch.next_line(), None);
    }

    #[test]
    fn line_cut_at_its_start_is_rejected() {
        let mut ch = nearly_full();
        assert_eq!(ch.push(b"9,9\n7,2"), 4);
        drain_ones(&mut ch);
        assert_eq!(
            ch.next_line(),
            Some(Ok(Command::SetTargets {
                left: 9.0,
                right: 9.0
            }))
        );
        ch.push(b"00\n8,8\n");
        assert_eq!(ch.next_line(), Some(Err(CommandError::Overflow)));
        assert_eq!(
            ch.next_line(),
            Some(Ok(Command::SetTargets {
                left: 8.0,
                right: 8.0
            }))
        );
    }

    #[test]
    fn whole_lines_lost_leave_the_next_line_intact() {
        let mut ch = nearly_full();
        assert_eq!(ch.push(b"9,9\n7,200\n"), 4);
        assert_eq!(ch.dropped(), 6);
        drain_ones(&mut ch);
        ch.next_line();
        ch.push(b"8,8\n");
        assert_eq!(
            ch.next_line(),
            Some(Ok(Command::SetTargets {
                left: 8.0,
                right: 8.0
            }))
        );
    }
}
