use crate::constants::{CR, DEFAULT_MAX_COMMAND_LENGTH, LF};
use crate::core_ftpcommand::command::FtpCommand;
use crate::core_ftpcommand::encoding::TextEncoding;
use crate::core_ftpcommand::telnet::{TelnetEvent, TelnetFilter};
use log::{debug, trace};

/// Output of [`CommandCollector::collect`], in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    Command(FtpCommand),
    /// TELNET Interrupt Process.
    Abort,
    /// TELNET Data Mark.
    Sync,
    /// A line exceeded the length limit and was dropped up to its terminator.
    Overlong,
}

/// Turns raw control-channel reads into commands.
///
/// A command is terminated by CR; an LF directly after the CR belongs to the same
/// terminator, even when the CR and LF arrive in different reads. Unterminated
/// bytes stay buffered for the next call.
#[derive(Debug)]
pub struct CommandCollector {
    telnet: TelnetFilter,
    buffer: Vec<u8>,
    skip_lf: bool,
    discarding: bool,
    max_line: usize,
    encoding: TextEncoding,
}

impl Default for CommandCollector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMMAND_LENGTH)
    }
}

impl CommandCollector {
    pub fn new(max_line: usize) -> Self {
        Self {
            telnet: TelnetFilter::new(),
            buffer: Vec::new(),
            skip_lf: false,
            discarding: false,
            max_line,
            encoding: TextEncoding::default(),
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Applies to lines completed by later calls, including any partial line still buffered.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    pub fn has_partial_line(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn collect(&mut self, bytes: &[u8]) -> impl Iterator<Item = Collected> {
        let mut out = Vec::new();
        for event in self.telnet.filter(bytes) {
            match event {
                TelnetEvent::Data(data) => self.frame(&data, &mut out),
                TelnetEvent::Abort => out.push(Collected::Abort),
                TelnetEvent::Sync => out.push(Collected::Sync),
            }
        }
        out.into_iter()
    }

    fn frame(&mut self, data: &[u8], out: &mut Vec<Collected>) {
        for &b in data {
            if self.skip_lf {
                self.skip_lf = false;
                if b == LF {
                    continue;
                }
            }

            if b == CR {
                self.skip_lf = true;
                self.finish_line(out);
                continue;
            }

            if self.discarding {
                continue;
            }

            self.buffer.push(b);
            if self.buffer.len() > self.max_line {
                debug!("Command line exceeds {} bytes, discarding", self.max_line);
                self.buffer.clear();
                self.discarding = true;
            }
        }
    }

    fn finish_line(&mut self, out: &mut Vec<Collected>) {
        if self.discarding {
            self.discarding = false;
            out.push(Collected::Overlong);
            return;
        }

        let line = std::mem::take(&mut self.buffer);
        let text = self.encoding.decode(&line);
        match FtpCommand::parse(&text) {
            Some(command) => {
                trace!("Collected command {}", command);
                out.push(Collected::Command(command));
            }
            None => trace!("Skipping empty command line"),
        }
    }
}
