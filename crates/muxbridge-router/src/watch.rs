use std::io;
use std::path::Path;

/// Receives filesystem watch registrations from `fswatch1` channels.
///
/// Change notification delivery is owned by the collaborator; the bridge
/// only registers interest.
pub trait PathWatcher: Send + Sync {
    fn watch(&self, path: &Path) -> io::Result<()>;
}

/// Watcher that accepts every registration and never notifies.
pub struct NullWatcher;

impl PathWatcher for NullWatcher {
    fn watch(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}
