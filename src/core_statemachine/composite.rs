use crate::core_ftpcommand::command::FtpCommand;
use crate::core_ftpcommand::response::Response;
use crate::core_statemachine::machine::{bad_sequence, service_not_available, StateMachine, Status};
use log::error;
use std::future::Future;
use std::sync::Arc;

pub type StatusSelector<S> = Arc<dyn Fn(&[S]) -> S + Send + Sync>;

/// Several independently configured machines driven by one command stream.
///
/// A command runs once; its reply code is then fed to every sub-machine that
/// accepted it. The overall status is chosen from the sub-machine statuses by
/// the selector.
#[derive(Clone)]
pub struct CompositeStateMachine<S> {
    machines: Vec<StateMachine<S>>,
    select: StatusSelector<S>,
}

impl<S: Status> CompositeStateMachine<S> {
    pub fn new(machines: Vec<StateMachine<S>>, select: StatusSelector<S>) -> Self {
        Self { machines, select }
    }

    pub fn status(&self) -> S {
        let statuses: Vec<S> = self.machines.iter().map(StateMachine::status).collect();
        (self.select)(&statuses)
    }

    pub fn handles(&self, name: &str) -> bool {
        self.machines.iter().any(|m| m.handles(name))
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.machines.iter().any(|m| m.accepts(name))
    }

    pub fn reset(&mut self) {
        self.machines.iter_mut().for_each(StateMachine::reset);
    }

    pub async fn execute<F, Fut>(&mut self, command: &FtpCommand, run: F) -> Response
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Response>,
    {
        let accepting: Vec<usize> = self
            .machines
            .iter()
            .enumerate()
            .filter(|(_, m)| m.accepts(&command.name))
            .map(|(i, _)| i)
            .collect();
        if accepting.is_empty() {
            return bad_sequence();
        }

        let response = run().await;
        if response.is_fatal() {
            return response;
        }

        for i in accepting {
            if let Err(e) = self.machines[i].apply(&command.name, response.code) {
                error!("{}", e);
                return service_not_available();
            }
        }
        response
    }
}
