//! Table-driven status machine gating which commands are legal.

use crate::core_ftpcommand::command::FtpCommand;
use crate::core_ftpcommand::response::Response;
use log::{debug, error};
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Marker bound for status enums.
pub trait Status: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Status for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionTableError {
    #[error("Transitions {first} and {second} both match {command} with the same reply code")]
    Ambiguous {
        first: String,
        second: String,
        command: String,
    },

    #[error("Transition {0} starts from a status that can never be reached")]
    UnreachableSource(String),

    #[error("Transition {0} has an empty command or code set")]
    Empty(String),
}

/// `(source, commands, reply codes) -> target`.
#[derive(Debug, Clone)]
pub struct Transition<S> {
    source: S,
    target: S,
    commands: Vec<String>,
    codes: RangeInclusive<u16>,
}

impl<S: Status> Transition<S> {
    pub fn new(source: S, target: S, commands: &[&str], codes: RangeInclusive<u16>) -> Self {
        Self {
            source,
            target,
            commands: commands.iter().map(|c| c.to_ascii_uppercase()).collect(),
            codes,
        }
    }

    /// Exactly one reply code.
    pub fn on_code(source: S, target: S, commands: &[&str], code: u16) -> Self {
        Self::new(source, target, commands, code..=code)
    }

    /// Any 4xx or 5xx reply.
    pub fn on_failure(source: S, target: S, commands: &[&str]) -> Self {
        Self::new(source, target, commands, 400..=599)
    }

    pub fn source(&self) -> S {
        self.source
    }

    pub fn target(&self) -> S {
        self.target
    }

    pub fn matches_command(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn matches_code(&self, code: u16) -> bool {
        self.codes.contains(&code)
    }

    fn overlaps(&self, other: &Self) -> Option<String> {
        if self.source != other.source {
            return None;
        }
        let codes_overlap =
            self.codes.start() <= other.codes.end() && other.codes.start() <= self.codes.end();
        if !codes_overlap {
            return None;
        }
        self.commands
            .iter()
            .find(|c| other.matches_command(c))
            .cloned()
    }

    fn describe(&self) -> String {
        format!(
            "{:?} -[{} {}..={}]-> {:?}",
            self.source,
            self.commands.join("|"),
            self.codes.start(),
            self.codes.end(),
            self.target
        )
    }
}

/// No transition accepts a reply code; the connection must be closed.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("No transition from {status} for {command} with reply {code}")]
pub struct NoTransition {
    pub status: String,
    pub command: String,
    pub code: u16,
}

pub fn bad_sequence() -> Response {
    Response::new(503, "Bad sequence of commands.")
}

pub fn service_not_available() -> Response {
    Response::new(421, "Service not available, closing control connection.")
}

#[derive(Debug, Clone)]
pub struct StateMachine<S> {
    initial: S,
    status: S,
    transitions: Vec<Transition<S>>,
}

impl<S: Status> StateMachine<S> {
    /// Validates the table: no two transitions from one source may match the same
    /// command and reply code, and every source must be reachable from `initial`.
    pub fn new(initial: S, transitions: Vec<Transition<S>>) -> Result<Self, TransitionTableError> {
        for t in &transitions {
            if t.commands.is_empty() || t.codes.is_empty() {
                return Err(TransitionTableError::Empty(t.describe()));
            }
        }

        for (i, first) in transitions.iter().enumerate() {
            for second in &transitions[i + 1..] {
                if let Some(command) = first.overlaps(second) {
                    return Err(TransitionTableError::Ambiguous {
                        first: first.describe(),
                        second: second.describe(),
                        command,
                    });
                }
            }
        }

        let mut reachable = HashSet::from([initial]);
        let mut queue = VecDeque::from([initial]);
        while let Some(status) = queue.pop_front() {
            for t in transitions.iter().filter(|t| t.source == status) {
                if reachable.insert(t.target) {
                    queue.push_back(t.target);
                }
            }
        }
        if let Some(t) = transitions.iter().find(|t| !reachable.contains(&t.source)) {
            return Err(TransitionTableError::UnreachableSource(t.describe()));
        }

        Ok(Self {
            initial,
            status: initial,
            transitions,
        })
    }

    pub fn status(&self) -> S {
        self.status
    }

    pub fn reset(&mut self) {
        self.status = self.initial;
    }

    /// Whether any transition, from any status, names this command.
    pub fn handles(&self, name: &str) -> bool {
        self.transitions.iter().any(|t| t.matches_command(name))
    }

    /// Whether the command is legal in the current status.
    pub fn accepts(&self, name: &str) -> bool {
        self.possible().any(|t| t.matches_command(name))
    }

    fn possible(&self) -> impl Iterator<Item = &Transition<S>> {
        self.transitions.iter().filter(move |t| t.source == self.status)
    }

    /// Moves to the target of the transition matching `(name, code)`.
    pub fn apply(&mut self, name: &str, code: u16) -> Result<S, NoTransition> {
        let target = self
            .possible()
            .find(|t| t.matches_command(name) && t.matches_code(code))
            .map(Transition::target);

        match target {
            Some(target) => {
                debug!("Status {:?} -> {:?} after {} ({})", self.status, target, name, code);
                self.status = target;
                Ok(target)
            }
            None => Err(NoTransition {
                status: format!("{:?}", self.status),
                command: name.to_string(),
                code,
            }),
        }
    }

    /// Runs `run` only if the command is legal now, then follows the reply code.
    ///
    /// Returns `503` without running anything when the command is out of sequence,
    /// and `421` when the reply matches no transition.
    pub async fn execute<F, Fut>(&mut self, command: &FtpCommand, run: F) -> Response
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Response>,
    {
        if !self.accepts(&command.name) {
            return bad_sequence();
        }

        let response = run().await;
        match self.apply(&command.name, response.code) {
            Ok(_) => response,
            Err(e) => {
                error!("{}", e);
                service_not_available()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Phase {
        Begin,
        Login,
        Done,
    }

    fn table() -> Vec<Transition<Phase>> {
        vec![
            Transition::on_code(Phase::Begin, Phase::Login, &["USER"], 331),
            Transition::on_failure(Phase::Begin, Phase::Begin, &["USER"]),
            Transition::new(Phase::Login, Phase::Done, &["PASS"], 200..=299),
            Transition::on_failure(Phase::Login, Phase::Begin, &["PASS"]),
        ]
    }

    #[tokio::test]
    async fn follows_reply_codes() {
        let mut sm = StateMachine::new(Phase::Begin, table()).unwrap();
        let r = sm
            .execute(&FtpCommand::new("USER", "bob"), || async { Response::new(331, "pw") })
            .await;
        assert_eq!(r.code, 331);
        assert_eq!(sm.status(), Phase::Login);

        let r = sm
            .execute(&FtpCommand::new("PASS", "x"), || async { Response::new(530, "no") })
            .await;
        assert_eq!(r.code, 530);
        assert_eq!(sm.status(), Phase::Begin);
    }

    #[tokio::test]
    async fn out_of_sequence_command_never_runs() {
        let mut sm = StateMachine::new(Phase::Begin, table()).unwrap();
        let calls = AtomicUsize::new(0);
        let r = sm
            .execute(&FtpCommand::new("PASS", "x"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Response::new(230, "ok")
            })
            .await;
        assert_eq!(r.code, 503);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sm.status(), Phase::Begin);
    }

    #[tokio::test]
    async fn unmatched_reply_code_is_fatal() {
        let mut sm = StateMachine::new(Phase::Begin, table()).unwrap();
        let r = sm
            .execute(&FtpCommand::new("USER", "bob"), || async { Response::new(230, "??") })
            .await;
        assert_eq!(r.code, 421);
        assert_eq!(sm.status(), Phase::Begin);
    }

    #[tokio::test]
    async fn every_status_and_command_yields_a_legal_outcome() {
        let commands = ["USER", "PASS", "NOOP", "QUIT"];
        let codes = [200, 230, 331, 421, 500, 530];
        for start in [Phase::Begin, Phase::Login] {
            for name in commands {
                for code in codes {
                    let mut sm = StateMachine::new(Phase::Begin, table()).unwrap();
                    if start == Phase::Login {
                        sm.apply("USER", 331).unwrap();
                    }
                    let legal = sm.accepts(name);
                    let r = sm
                        .execute(&FtpCommand::new(name, ""), || async move { Response::new(code, "") })
                        .await;
                    if !legal {
                        assert_eq!(r.code, 503);
                    } else {
                        assert!(r.code == code || r.code == 421);
                    }
                }
            }
        }
    }

    #[test]
    fn reset_restores_initial_status() {
        let mut sm = StateMachine::new(Phase::Begin, table()).unwrap();
        sm.apply("USER", 331).unwrap();
        sm.reset();
        assert_eq!(sm.status(), Phase::Begin);
    }

    #[test]
    fn ambiguous_table_is_rejected() {
        let mut transitions = table();
        transitions.push(Transition::new(Phase::Begin, Phase::Done, &["user"], 300..=399));
        assert!(matches!(
            StateMachine::new(Phase::Begin, transitions),
            Err(TransitionTableError::Ambiguous { .. })
        ));
    }

    #[test]
    fn same_codes_from_different_sources_are_fine() {
        let transitions = vec![
            Transition::on_code(Phase::Begin, Phase::Login, &["USER"], 331),
            Transition::on_code(Phase::Login, Phase::Login, &["USER"], 331),
        ];
        assert!(StateMachine::new(Phase::Begin, transitions).is_ok());
    }

    #[test]
    fn unreachable_source_is_rejected() {
        let transitions = vec![
            Transition::on_code(Phase::Begin, Phase::Login, &["USER"], 331),
            Transition::on_code(Phase::Done, Phase::Begin, &["REIN"], 220),
        ];
        assert!(matches!(
            StateMachine::new(Phase::Begin, transitions),
            Err(TransitionTableError::UnreachableSource(_))
        ));
    }

    #[test]
    fn empty_code_range_is_rejected() {
        #[allow(clippy::reversed_empty_ranges)]
        let transitions = vec![Transition::new(Phase::Begin, Phase::Login, &["USER"], 300..=200)];
        assert!(matches!(
            StateMachine::new(Phase::Begin, transitions),
            Err(TransitionTableError::Empty(_))
        ));
    }
}
