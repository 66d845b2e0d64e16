use crate::core_statemachine::composite::CompositeStateMachine;
use crate::core_statemachine::machine::{StateMachine, Transition, TransitionTableError};
use std::sync::Arc;

/// Login and security status of a control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityStatus {
    Unauthenticated,
    /// A security mechanism was accepted (AUTH).
    Authenticated,
    NeedSecurityData,
    NeedPassword,
    NeedAccount,
    Authorized,
}

impl SecurityStatus {
    fn rank(&self) -> u8 {
        match self {
            SecurityStatus::Unauthenticated => 0,
            SecurityStatus::Authenticated => 1,
            SecurityStatus::NeedSecurityData => 2,
            SecurityStatus::NeedPassword => 3,
            SecurityStatus::NeedAccount => 4,
            SecurityStatus::Authorized => 5,
        }
    }

    /// The most advanced of the sub-machine statuses.
    pub fn most_advanced(statuses: &[SecurityStatus]) -> SecurityStatus {
        statuses
            .iter()
            .copied()
            .max_by_key(SecurityStatus::rank)
            .unwrap_or(SecurityStatus::Unauthenticated)
    }
}

pub type SecurityStateMachine = CompositeStateMachine<SecurityStatus>;

/// USER / PASS / ACCT.
pub fn login_transitions() -> Vec<Transition<SecurityStatus>> {
    use SecurityStatus::*;
    vec![
        Transition::on_code(Unauthenticated, NeedPassword, &["USER"], 331),
        Transition::on_code(Unauthenticated, Authorized, &["USER"], 230),
        Transition::on_failure(Unauthenticated, Unauthenticated, &["USER"]),
        Transition::on_code(NeedPassword, NeedPassword, &["USER"], 331),
        Transition::on_code(NeedPassword, Authorized, &["USER"], 230),
        Transition::on_failure(NeedPassword, Unauthenticated, &["USER"]),
        Transition::on_code(NeedPassword, Authorized, &["PASS"], 230),
        Transition::on_code(NeedPassword, NeedAccount, &["PASS"], 332),
        Transition::on_failure(NeedPassword, Unauthenticated, &["PASS"]),
        Transition::new(NeedAccount, Authorized, &["ACCT"], 200..=299),
        Transition::on_failure(NeedAccount, Unauthenticated, &["ACCT"]),
        Transition::on_code(Authorized, NeedPassword, &["USER"], 331),
        Transition::on_code(Authorized, Authorized, &["USER"], 230),
        Transition::on_failure(Authorized, Authorized, &["USER"]),
    ]
}

/// AUTH / ADAT / PBSZ / PROT.
pub fn mechanism_transitions() -> Vec<Transition<SecurityStatus>> {
    use SecurityStatus::*;
    vec![
        Transition::on_code(Unauthenticated, Authenticated, &["AUTH"], 234),
        Transition::on_code(Unauthenticated, NeedSecurityData, &["AUTH"], 334),
        Transition::on_failure(Unauthenticated, Unauthenticated, &["AUTH"]),
        Transition::on_code(NeedSecurityData, Authenticated, &["ADAT"], 235),
        Transition::on_code(NeedSecurityData, NeedSecurityData, &["ADAT"], 335),
        Transition::on_failure(NeedSecurityData, Unauthenticated, &["ADAT"]),
        Transition::new(Authenticated, Authenticated, &["PBSZ", "PROT"], 200..=299),
        Transition::on_failure(Authenticated, Authenticated, &["PBSZ", "PROT"]),
    ]
}

/// The composite machine built from `login_transitions` and `mechanism_transitions`.
pub fn default_security_machine() -> Result<SecurityStateMachine, TransitionTableError> {
    security_machine(vec![login_transitions(), mechanism_transitions()])
}

/// One sub-machine per table, all starting `Unauthenticated`.
pub fn security_machine(
    tables: Vec<Vec<Transition<SecurityStatus>>>,
) -> Result<SecurityStateMachine, TransitionTableError> {
    let machines = tables
        .into_iter()
        .map(|t| StateMachine::new(SecurityStatus::Unauthenticated, t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompositeStateMachine::new(
        machines,
        Arc::new(SecurityStatus::most_advanced),
    ))
}
