//! Auth-gated navigation targets.

use std::fmt;

/// A navigable screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Sign-in screen.
    Auth,
    /// Task list.
    Todos,
    /// One task, by document id.
    TodoDetail(String),
}

impl Route {
    /// Parses an app path. Unknown paths yield `None`.
    ///
    /// `/` is the sign-in screen and `/login` an alias for it; the guard
    /// sends signed-in users on to the task list.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        match path {
            "" | "/login" => Some(Self::Auth),
            "/todos" => Some(Self::Todos),
            _ => path
                .strip_prefix("/todos/")
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Self::TodoDetail(id.to_string())),
        }
    }

    /// Returns `true` for screens that require a signed-in user.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        !matches!(self, Self::Auth)
    }

    /// Canonical path of the route.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Auth => "/".to_string(),
            Self::Todos => "/todos".to_string(),
            Self::TodoDetail(id) => format!("/todos/{id}"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Resolves where navigation to `target` actually lands.
///
/// Signed-out users are sent to [`Route::Auth`]; signed-in users asking for
/// the sign-in screen go to [`Route::Todos`].
///
/// Only call this once `SessionManager::ready` has resolved. Before that
/// `is_authenticated` is `false` for everyone, including a user whose
/// session is about to be restored.
#[must_use]
pub fn guard(target: Route, is_authenticated: bool) -> Route {
    match (target, is_authenticated) {
        (Route::Auth, true) => Route::Todos,
        (target, false) if target.is_protected() => Route::Auth,
        (target, _) => target,
    }
}
