use crate::core_ftpcommand::handler::HandlerResult;
use log::debug;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// An abortable command running next to the control loop.
struct BackgroundCommand {
    name: String,
    cancel: CancellationToken,
    handle: JoinHandle<HandlerResult>,
}

/// Outcome of a background command that ran to completion.
pub struct Finished {
    pub name: String,
    pub result: Result<HandlerResult, JoinError>,
}

#[derive(Debug, thiserror::Error)]
#[error("Parallel commands aren't allowed")]
pub struct SlotBusy;

/// Holds at most one background command per connection.
#[derive(Default)]
pub struct BackgroundSlot {
    current: Option<BackgroundCommand>,
}

impl BackgroundSlot {
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.name.as_str())
    }

    pub fn start(
        &mut self,
        name: &str,
        cancel: CancellationToken,
        handle: JoinHandle<HandlerResult>,
    ) -> Result<(), SlotBusy> {
        if self.current.is_some() {
            handle.abort();
            return Err(SlotBusy);
        }
        debug!("Background command {} started", name);
        self.current = Some(BackgroundCommand {
            name: name.to_string(),
            cancel,
            handle,
        });
        Ok(())
    }

    /// Signals cancellation without waiting; the command still occupies the slot
    /// until it finishes.
    pub fn interrupt(&self) {
        if let Some(current) = &self.current {
            debug!("Interrupting background command {}", current.name);
            current.cancel.cancel();
        }
    }

    /// Resolves when the running command finishes and empties the slot. Never
    /// resolves while the slot is empty. Dropping the future keeps the command.
    pub async fn wait(&mut self) -> Finished {
        let Some(current) = self.current.as_mut() else {
            return std::future::pending().await;
        };
        let result = (&mut current.handle).await;
        let name = current.name.clone();
        self.current = None;
        Finished { name, result }
    }

    /// Cancels the running command and waits for it. The outcome is returned
    /// as is; a command may have completed before it saw the cancellation.
    /// `None` if nothing was running.
    pub async fn abort(&mut self) -> Option<Finished> {
        let current = self.current.take()?;
        current.cancel.cancel();
        let result = current.handle.await;
        debug!("Background command {} aborted", current.name);
        Some(Finished {
            name: current.name,
            result,
        })
    }

    /// Cancels and forgets the running command.
    pub fn dispose(&mut self) {
        if let Some(current) = self.current.take() {
            current.cancel.cancel();
            current.handle.abort();
        }
    }
}

impl Drop for BackgroundSlot {
    fn drop(&mut self) {
        self.dispose();
    }
}
