use std::fmt;
use std::iter::Peekable;

/// Body of a reply.
pub enum ResponseBody {
    Single(String),
    Lines(Vec<String>),
    /// Produced while the reply is being written, e.g. a listing of registered commands.
    Lazy(Box<dyn Iterator<Item = String> + Send>),
}

/// One logical FTP reply.
pub struct Response {
    pub code: u16,
    pub body: ResponseBody,
}

impl Response {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            body: ResponseBody::Single(message.into()),
        }
    }

    pub fn lines(code: u16, lines: Vec<String>) -> Self {
        Self {
            code,
            body: ResponseBody::Lines(lines),
        }
    }

    pub fn lazy<I>(code: u16, lines: I) -> Self
    where
        I: Iterator<Item = String> + Send + 'static,
    {
        Self {
            code,
            body: ResponseBody::Lazy(Box::new(lines)),
        }
    }

    /// `421` replies always precede closing the control connection.
    pub fn is_fatal(&self) -> bool {
        self.code == 421
    }

    /// Renders the reply as wire lines without the trailing CRLF.
    ///
    /// Single line: `DDD text`. Multi-line: `DDD-first`, then intermediate lines
    /// prefixed with one space, then `DDD last`.
    pub fn render(self) -> Rendered {
        let lines: Box<dyn Iterator<Item = String> + Send> = match self.body {
            ResponseBody::Single(line) => Box::new(std::iter::once(line)),
            ResponseBody::Lines(lines) => Box::new(lines.into_iter()),
            ResponseBody::Lazy(lines) => lines,
        };
        Rendered {
            code: self.code,
            lines: lines.peekable(),
            first: true,
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            ResponseBody::Single(line) => line.clone(),
            ResponseBody::Lines(lines) => lines.join(" | "),
            ResponseBody::Lazy(_) => "<lazy>".to_string(),
        };
        write!(f, "{} {}", self.code, body)
    }
}

pub struct Rendered {
    code: u16,
    lines: Peekable<Box<dyn Iterator<Item = String> + Send>>,
    first: bool,
}

impl Iterator for Rendered {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let first = std::mem::replace(&mut self.first, false);
        let line = match self.lines.next() {
            Some(line) => line,
            // An empty body still yields one line so every reply carries its code.
            None if first => String::new(),
            None => return None,
        };
        let last = self.lines.peek().is_none();

        Some(if last {
            format!("{} {}", self.code, line)
        } else if first {
            format!("{}-{}", self.code, line)
        } else {
            format!(" {}", line)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_reply() {
        let lines: Vec<String> = Response::new(200, "Command okay.").render().collect();
        assert_eq!(lines, vec!["200 Command okay."]);
    }

    #[test]
    fn multi_line_reply_marks_first_and_last() {
        let r = Response::lines(211, vec!["Features:".into(), "EPSV".into(), "UTF8".into(), "End".into()]);
        let lines: Vec<String> = r.render().collect();
        assert_eq!(lines, vec!["211-Features:", " EPSV", " UTF8", "211 End"]);
    }

    #[test]
    fn two_line_reply() {
        let lines: Vec<String> = Response::lines(220, vec!["Hello".into(), "Ready".into()]).render().collect();
        assert_eq!(lines, vec!["220-Hello", "220 Ready"]);
    }

    #[test]
    fn lazy_reply_is_rendered_on_demand() {
        let r = Response::lazy(214, ["A", "B", "C"].into_iter().map(String::from));
        let lines: Vec<String> = r.render().collect();
        assert_eq!(lines, vec!["214-A", " B", "214 C"]);
    }

    #[test]
    fn empty_body_still_carries_code() {
        let lines: Vec<String> = Response::lines(226, Vec::new()).render().collect();
        assert_eq!(lines, vec!["226 "]);
    }
}
