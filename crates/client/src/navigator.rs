//! Current-view tracking on top of the pure routing guards.
//!
//! The navigator owns which view is active. It applies [`route`] to every
//! navigation request and runs the global removed-watcher: whenever the
//! session becomes `removed`, the active view is forced to the
//! account-removed view no matter what was on screen.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use warden_auth::{AuthorizationExplanation, Screen, Session, View, explain, menu, route};

use crate::session_store::SessionStore;

#[derive(Debug)]
pub struct Navigator {
    store: Arc<SessionStore>,
    view: watch::Sender<View>,
}

impl Navigator {
    pub fn new(store: Arc<SessionStore>) -> Self {
        let (view, _rx) = watch::channel(View::Home);
        Self { store, view }
    }

    pub fn current(&self) -> View {
        *self.view.borrow()
    }

    /// Receive every change of the active view.
    pub fn subscribe(&self) -> watch::Receiver<View> {
        self.view.subscribe()
    }

    /// Guard and apply a navigation request.
    ///
    /// `Screen::Login` keeps the requested view active underneath the prompt.
    pub fn navigate(&self, target: View) -> Screen {
        let session = self.store.snapshot();
        let screen = route(&session, target);
        let next = match screen {
            Screen::Render(v) | Screen::Redirect(v) => v,
            Screen::Login => target,
        };
        self.view.send_replace(next);
        tracing::debug!(
            ?target,
            ?screen,
            reason = %explain(&session, target.required_role()).reason,
            "navigation"
        );
        screen
    }

    /// Why the gate answers the way it does for `target` right now.
    pub fn explain(&self, target: View) -> AuthorizationExplanation {
        explain(&self.store.snapshot(), target.required_role())
    }

    pub fn open(&self, path: &str) -> Screen {
        self.navigate(View::from_path(path))
    }

    /// Views the current session may pick from the menu.
    pub fn menu(&self) -> Vec<View> {
        menu(&self.store.snapshot())
    }

    /// Leave the account-removed view and show the login prompt again.
    pub fn acknowledge_removed(&self) -> Screen {
        self.store.acknowledge_removed();
        self.navigate(View::Home)
    }

    /// Apply the removed override for `session`. Returns true if it forced
    /// a navigation.
    pub fn apply_session(&self, session: &Session) -> bool {
        if !session.is_removed() || self.current() == View::AccountRemoved {
            return false;
        }
        tracing::info!(from = ?self.current(), "session removed, forcing account-removed view");
        self.view.send_replace(View::AccountRemoved);
        true
    }

    /// Spawn the global removed-watcher.
    ///
    /// The task runs until aborted.
    pub fn spawn_removed_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut rx = self.store.subscribe();
        tokio::spawn(async move {
            this.apply_session(&rx.borrow_and_update().clone());
            while rx.changed().await.is_ok() {
                let session = rx.borrow_and_update().clone();
                this.apply_session(&session);
            }
        })
    }
}
