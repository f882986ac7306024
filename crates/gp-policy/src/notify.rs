// notify.rs — Post-mutation change notification.
//
// After a successful write the editor tells the outside world that policy
// settings changed (on Windows: a settings-changed broadcast and a policy
// refresh). Delivery is best effort; a failing notifier is logged and never
// fails the mutation.

use tracing::info;

use crate::editor::Scope;

/// Receives a callback after every successful apply.
pub trait ChangeNotifier {
    fn policy_changed(&self, scope: Scope, policy_id: &str) -> Result<(), String>;
}

/// Notifier that only records the change in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl ChangeNotifier for LoggingNotifier {
    fn policy_changed(&self, scope: Scope, policy_id: &str) -> Result<(), String> {
        info!(%scope, policy = policy_id, "policy settings changed");
        Ok(())
    }
}
