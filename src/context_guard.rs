use crate::lifecycle::Shared;

/// Marks a worker running for as long as it lives. Dropping it resets the
/// lifecycle to stopped, which also happens when the context unwinds.
pub(crate) struct ContextGuard<'a> {
    owner: &'a Shared,
    id: u64,
}

impl<'a> ContextGuard<'a> {
    pub(crate) fn enter(owner: &'a Shared, id: u64) -> ContextGuard<'a> {
        owner.mark_running(id);

        tracing::debug!(worker = owner.name(), context = id, "worker running");

        ContextGuard { owner, id }
    }
}

impl<'a> Drop for ContextGuard<'a> {
    fn drop(&mut self) {
        self.owner.mark_stopped(self.id);

        tracing::debug!(
            worker = self.owner.name(),
            context = self.id,
            "worker stopped"
        );
    }
}
