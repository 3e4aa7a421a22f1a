use crate::hooks::HookPhase;
use std::any::Any;
use std::io;

/// Errors returned by worker lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The operating system refused to create the worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// A panic that escaped one of the worker's hooks. The worker still resets
/// itself to stopped, but the panic is resumed on the worker thread after the
/// fault has been reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{phase} hook panicked: {message}")]
pub struct HookFault {
    phase: HookPhase,
    message: String,
}

impl HookFault {
    pub(crate) fn from_panic(
        phase: HookPhase,
        payload: &(dyn Any + Send),
    ) -> HookFault {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        HookFault { phase, message }
    }

    /// The hook that panicked
    pub fn phase(&self) -> HookPhase {
        self.phase
    }

    /// The panic message, if the payload was a string
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_message_from_payloads() {
        let fault = HookFault::from_panic(HookPhase::Step, &"boom");
        assert_eq!(fault.message(), "boom");
        assert_eq!(fault.phase(), HookPhase::Step);
        assert_eq!(fault.to_string(), "step hook panicked: boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let fault = HookFault::from_panic(HookPhase::Setup, owned.as_ref());
        assert_eq!(fault.to_string(), "setup hook panicked: owned");

        let fault = HookFault::from_panic(HookPhase::Teardown, &42_u32);
        assert_eq!(fault.message(), "non-string panic payload");
    }
}
