use crate::error::EXIT_INTERRUPTED;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// No interactive step owns the interrupt; the process should exit.
    Exit,
    /// The innermost interactive step was asked to cancel.
    Cancelled,
}

/// Process-wide interrupt routing.
///
/// Outside any scope an interrupt terminates the process. While an [`InterruptScope`]
/// is alive the interrupt is routed to that scope instead, and dropping the scope
/// restores whatever routing was in place before it.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    current: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl Interrupts {
    /// Listens for Ctrl-C for the rest of the process. Must be called inside a tokio runtime.
    pub fn install() -> Self {
        let interrupts = Self::default();
        let handle = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if handle.deliver() == InterruptAction::Exit {
                    std::process::exit(EXIT_INTERRUPTED);
                }
            }
        });
        interrupts
    }

    pub fn deliver(&self) -> InterruptAction {
        match self.lock().as_ref() {
            Some(notify) => {
                debug!("interrupt routed to interactive step");
                notify.notify_one();
                InterruptAction::Cancelled
            }
            None => InterruptAction::Exit,
        }
    }

    pub fn scoped(&self) -> InterruptScope {
        let notify = Arc::new(Notify::new());
        let prior = self.lock().replace(Arc::clone(&notify));
        InterruptScope {
            owner: self.clone(),
            notify,
            prior,
        }
    }

    pub fn is_scoped(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<Notify>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct InterruptScope {
    owner: Interrupts,
    notify: Arc<Notify>,
    prior: Option<Arc<Notify>>,
}

impl InterruptScope {
    /// Resolves once an interrupt is delivered to this scope.
    pub async fn cancelled(&self) {
        self.notify.notified().await
    }
}

impl Drop for InterruptScope {
    fn drop(&mut self) {
        *self.owner.lock() = self.prior.take();
    }
}
