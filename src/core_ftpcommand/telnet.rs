//! TELNET control filtering for the FTP control channel.
//!
//! RFC 959 runs the control connection over a TELNET NVT, so clients may embed
//! `IAC` sequences in the command stream. Only two matter to us: Interrupt
//! Process (sent before `ABOR`) and Data Mark (the Synch). Option negotiation is
//! swallowed and never answered.

use crate::constants::{DATA_MARK, DO, DONT, IAC, INTERRUPT_PROCESS, WILL, WONT};

/// One unit of filtered input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    Data(Vec<u8>),
    Abort,
    Sync,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Data,
    Iac,
    Negotiate,
}

/// Stateful IAC filter; an escape split across two reads is completed on the next call.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: State,
}

impl TelnetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters one chunk. Payload runs are coalesced; an abort or sync splits them.
    pub fn filter(&mut self, chunk: &[u8]) -> Vec<TelnetEvent> {
        let mut events = Vec::new();
        let mut data = Vec::with_capacity(chunk.len());

        for &b in chunk {
            match self.state {
                State::Data => {
                    if b == IAC {
                        self.state = State::Iac;
                    } else {
                        data.push(b);
                    }
                }
                State::Iac => {
                    self.state = State::Data;
                    match b {
                        IAC => data.push(IAC),
                        INTERRUPT_PROCESS => {
                            flush(&mut data, &mut events);
                            events.push(TelnetEvent::Abort);
                        }
                        DATA_MARK => {
                            flush(&mut data, &mut events);
                            events.push(TelnetEvent::Sync);
                        }
                        WILL | WONT | DO | DONT => self.state = State::Negotiate,
                        // NOP, GA, AYT and friends carry nothing for us.
                        _ => {}
                    }
                }
                State::Negotiate => {
                    // Option code; refused silently.
                    self.state = State::Data;
                }
            }
        }

        flush(&mut data, &mut events);
        events
    }
}

fn flush(data: &mut Vec<u8>, events: &mut Vec<TelnetEvent>) {
    if !data.is_empty() {
        events.push(TelnetEvent::Data(std::mem::take(data)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_plain_data() {
        let mut f = TelnetFilter::new();
        assert_eq!(f.filter(b"NOOP\r\n"), vec![TelnetEvent::Data(b"NOOP\r\n".to_vec())]);
    }

    #[test]
    fn escaped_iac_is_literal() {
        let mut f = TelnetFilter::new();
        assert_eq!(f.filter(&[b'a', IAC, IAC, b'b']), vec![TelnetEvent::Data(vec![b'a', IAC, b'b'])]);
    }

    #[test]
    fn interrupt_process_splits_payload() {
        let mut f = TelnetFilter::new();
        let events = f.filter(&[b'x', IAC, INTERRUPT_PROCESS, IAC, DATA_MARK, b'y']);
        assert_eq!(
            events,
            vec![
                TelnetEvent::Data(vec![b'x']),
                TelnetEvent::Abort,
                TelnetEvent::Sync,
                TelnetEvent::Data(vec![b'y']),
            ]
        );
    }

    #[test]
    fn negotiation_is_swallowed() {
        let mut f = TelnetFilter::new();
        let events = f.filter(&[IAC, DO, 1, IAC, WILL, 3, b'z']);
        assert_eq!(events, vec![TelnetEvent::Data(vec![b'z'])]);
    }

    #[test]
    fn escape_split_across_reads() {
        let mut f = TelnetFilter::new();
        assert!(f.filter(&[IAC]).is_empty());
        assert_eq!(f.filter(&[INTERRUPT_PROCESS, b'A']), vec![TelnetEvent::Abort, TelnetEvent::Data(vec![b'A'])]);

        assert!(f.filter(&[IAC, DONT]).is_empty());
        assert_eq!(f.filter(&[24, b'B']), vec![TelnetEvent::Data(vec![b'B'])]);
    }
}
