//! Screen route state.
//!
//! The API layer needs to know which screen is current so a session
//! expiry can send the user back to the login screen without bouncing
//! when they are already there.

use std::sync::{Arc, Mutex};

/// Client screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Chat,
    Admin,
}

/// Shared current-route handle.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: Arc<Mutex<Route>>,
}

impl Navigator {
    /// Navigator starting at the given route.
    #[must_use]
    pub fn new(initial: Route) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }

    /// The current route.
    #[must_use]
    pub fn current(&self) -> Route {
        self.current.lock().map(|r| *r).unwrap_or(Route::Login)
    }

    /// Switch to a route.
    pub fn goto(&self, route: Route) {
        if let Ok(mut current) = self.current.lock() {
            *current = route;
        }
    }

    /// Send the user to the login screen unless they are already there.
    pub fn goto_login(&self) {
        if self.current() != Route::Login {
            self.goto(Route::Login);
        }
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Login)
    }
}
