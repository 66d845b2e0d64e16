use std::fmt;

/// A single command line received on the control connection.
///
/// The name is upper-cased on parse; the argument is kept verbatim (minus the
/// separating whitespace) and defaults to an empty string.
#[derive(Clone, PartialEq, Eq)]
pub struct FtpCommand {
    pub name: String,
    pub argument: String,
}

impl FtpCommand {
    pub fn new(name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            argument: argument.into(),
        }
    }

    /// Splits a decoded line on the first run of spaces or tabs.
    ///
    /// Returns `None` for a line that carries no command name at all.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_start_matches([' ', '\t']);
        if line.is_empty() {
            return None;
        }

        match line.find([' ', '\t']) {
            Some(idx) => {
                let (name, rest) = line.split_at(idx);
                let argument = rest.trim_start_matches([' ', '\t']);
                Some(Self::new(name, argument))
            }
            None => Some(Self::new(line, "")),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Log-safe rendering: the argument of `PASS` is masked.
impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.argument.is_empty() {
            write!(f, "{}", self.name)
        } else if self.is("PASS") {
            write!(f, "{} ********", self.name)
        } else {
            write!(f, "{} {}", self.name, self.argument)
        }
    }
}

impl fmt::Debug for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let argument = if self.is("PASS") && !self.argument.is_empty() {
            "********"
        } else {
            self.argument.as_str()
        };
        f.debug_struct("FtpCommand")
            .field("name", &self.name)
            .field("argument", &argument)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_whitespace_run() {
        let cmd = FtpCommand::parse("stor  my file.txt").unwrap();
        assert_eq!(cmd.name, "STOR");
        assert_eq!(cmd.argument, "my file.txt");
    }

    #[test]
    fn tab_separates_name_and_argument() {
        let cmd = FtpCommand::parse("TYPE\tI").unwrap();
        assert_eq!(cmd, FtpCommand::new("TYPE", "I"));
    }

    #[test]
    fn missing_argument_defaults_to_empty() {
        let cmd = FtpCommand::parse("NOOP").unwrap();
        assert_eq!(cmd.argument, "");
    }

    #[test]
    fn blank_line_is_not_a_command() {
        assert!(FtpCommand::parse("").is_none());
        assert!(FtpCommand::parse("  \t").is_none());
    }

    #[test]
    fn display_masks_password_but_keeps_argument() {
        let cmd = FtpCommand::parse("PASS hunter2").unwrap();
        assert_eq!(cmd.argument, "hunter2");
        assert_eq!(cmd.to_string(), "PASS ********");
        assert_eq!(FtpCommand::new("USER", "bob").to_string(), "USER bob");
    }

    #[test]
    fn debug_masks_password() {
        let cmd = FtpCommand::parse("PASS hunter2").unwrap();
        let printed = format!("{:?}", cmd);
        assert!(!printed.contains("hunter2"), "{}", printed);
        assert!(printed.contains("********"));
        assert!(format!("{:?}", FtpCommand::new("USER", "bob")).contains("bob"));
    }
}
