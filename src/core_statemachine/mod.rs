// Command sequencing: the generic transition-table engine and the security status built on it
pub mod composite;
pub mod machine;
pub mod security;

pub use composite::CompositeStateMachine;
pub use machine::{StateMachine, Transition, TransitionTableError};
pub use security::{SecurityStateMachine, SecurityStatus};
