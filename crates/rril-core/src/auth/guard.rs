//! Route guard and logout helpers for the admin pages.

use tracing::{debug, info};

use super::{Session, SessionStore};
use crate::error::SessionError;

/// Anonymous-accessible login page
pub const LOGIN_ROUTE: &str = "/admin-login";

pub const DASHBOARD_ROUTE: &str = "/admin/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted(Session),
    Redirect(&'static str),
}

/// Gate a protected page on an authenticated session.
pub fn require_session(store: &SessionStore) -> Access {
    match store.current() {
        Ok(session) if session.is_authenticated => Access::Granted(session),
        Ok(_) => Access::Redirect(LOGIN_ROUTE),
        Err(e) => {
            debug!(error = %e, "Session unreadable, redirecting to login");
            Access::Redirect(LOGIN_ROUTE)
        }
    }
}

/// Where the login page should send a user who is already signed in.
pub fn redirect_if_authenticated(store: &SessionStore) -> Option<&'static str> {
    store.is_valid().then_some(DASHBOARD_ROUTE)
}

/// Clear the session and return the route to redirect to.
pub fn logout(store: &SessionStore) -> Result<&'static str, SessionError> {
    store.clear()?;
    info!("Logged out");
    Ok(LOGIN_ROUTE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_is_redirected() {
        let store = SessionStore::in_memory();
        assert_eq!(require_session(&store), Access::Redirect(LOGIN_ROUTE));
        assert_eq!(redirect_if_authenticated(&store), None);
    }

    #[test]
    fn test_authenticated_is_granted() {
        let store = SessionStore::in_memory();
        store.establish("tok", "admin@rril.com", Some("Admin User")).unwrap();

        match require_session(&store) {
            Access::Granted(session) => {
                assert_eq!(session.display_name(), Some("Admin User"));
            }
            other => panic!("expected access, got {:?}", other),
        }
        assert_eq!(redirect_if_authenticated(&store), Some(DASHBOARD_ROUTE));
    }

    #[test]
    fn test_logout_clears_and_redirects() {
        let store = SessionStore::in_memory();
        store.establish("tok", "admin@rril.com", None).unwrap();

        assert_eq!(logout(&store).unwrap(), LOGIN_ROUTE);
        assert!(!store.is_valid());
        assert_eq!(require_session(&store), Access::Redirect(LOGIN_ROUTE));

        // Logging out twice is fine
        assert_eq!(logout(&store).unwrap(), LOGIN_ROUTE);
    }
}
