//! Routing guards: which view a session may render.
//!
//! Every view carries the capability it requires; `route` turns a navigation
//! request into the screen the caller should show. Side effects (actually
//! switching views, rendering the login form) stay with the caller.

use serde::Serialize;

use crate::{Decision, RequiredRole, Session, decide};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Home,
    AccountRemoved,
    Dashboard,
    About,
    Settings,
    AdminUsers,
    DeletedUsers,
}

impl View {
    /// Landing view for authenticated identities and target of `RedirectDefault`.
    pub const DEFAULT_LANDING: View = View::Dashboard;

    pub const ALL: [View; 7] = [
        View::Home,
        View::AccountRemoved,
        View::Dashboard,
        View::About,
        View::Settings,
        View::AdminUsers,
        View::DeletedUsers,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            View::Home => "/",
            View::AccountRemoved => "/deleted",
            View::Dashboard => "/dashboard",
            View::About => "/about",
            View::Settings => "/settings",
            View::AdminUsers => "/admin/users",
            View::DeletedUsers => "/admin/deleted-users",
        }
    }

    /// Resolve a path; unknown paths land on the default view.
    pub fn from_path(path: &str) -> View {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            other => other,
        };
        View::ALL
            .into_iter()
            .find(|v| v.path() == normalized)
            .unwrap_or(View::DEFAULT_LANDING)
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::Home => "Home",
            View::AccountRemoved => "Account Deleted",
            View::Dashboard => "Dashboard",
            View::About => "About",
            View::Settings => "Settings",
            View::AdminUsers => "Manage Users",
            View::DeletedUsers => "Deleted Users",
        }
    }

    pub fn required_role(&self) -> RequiredRole {
        match self {
            View::Home | View::AccountRemoved => RequiredRole::Public,
            View::Dashboard | View::About | View::Settings => RequiredRole::Authenticated,
            View::AdminUsers | View::DeletedUsers => RequiredRole::Privileged,
        }
    }
}

/// What the caller should put on screen for a navigation request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "view", rename_all = "snake_case")]
pub enum Screen {
    Render(View),
    Login,
    Redirect(View),
}

/// Guard a navigation request.
///
/// A removed session overrides every guard decision and forces the
/// account-removed view.
pub fn route(session: &Session, target: View) -> Screen {
    if session.is_removed() && target != View::AccountRemoved {
        return Screen::Redirect(View::AccountRemoved);
    }

    match decide(session, target.required_role()) {
        Decision::Allow => Screen::Render(target),
        Decision::ShowLogin => Screen::Login,
        Decision::RedirectDefault => Screen::Redirect(View::DEFAULT_LANDING),
    }
}

/// Navigation entries reachable from `session`, in menu order.
pub fn menu(session: &Session) -> Vec<View> {
    if !session.is_authenticated() {
        return Vec::new();
    }

    [
        View::Dashboard,
        View::About,
        View::Settings,
        View::AdminUsers,
        View::DeletedUsers,
    ]
    .into_iter()
    .filter(|v| decide(session, v.required_role()) == Decision::Allow)
    .collect()
}
