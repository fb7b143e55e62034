use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Agent,
    Login,
    Signup,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Agent => "/agent",
            Route::Login => "/login",
            Route::Signup => "/signup",
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Home | Route::Agent)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Entries of the navigation bar, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavItem {
    Home,
    Agent,
    Docs,
    Settings,
}

impl NavItem {
    pub const ALL: [NavItem; 4] = [NavItem::Home, NavItem::Agent, NavItem::Docs, NavItem::Settings];

    pub fn label(&self) -> &'static str {
        match self {
            NavItem::Home => "Home",
            NavItem::Agent => "Agent",
            NavItem::Docs => "Docs",
            NavItem::Settings => "Settings",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|item| item.label().eq_ignore_ascii_case(label.trim()))
    }

    pub fn target(&self) -> Route {
        match self {
            NavItem::Home => Route::Home,
            NavItem::Agent => Route::Agent,
            NavItem::Docs => Route::Login,
            NavItem::Settings => Route::Signup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Allow(Route),
    /// Sent to login; `from` is where to continue after logging in.
    Redirect { to: Route, from: Route },
}

/// Gates protected routes on the presence of a stored token. The token is
/// never validated.
#[derive(Debug, Clone, Copy)]
pub struct AuthGate {
    authenticated: bool,
}

impl AuthGate {
    pub fn new(authenticated: bool) -> Self {
        Self { authenticated }
    }

    pub fn from_token(token: Option<&str>) -> Self {
        Self::new(token.is_some_and(|t| !t.trim().is_empty()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    pub fn resolve(&self, requested: Route) -> Navigation {
        if requested.is_protected() && !self.authenticated {
            Navigation::Redirect {
                to: Route::Login,
                from: requested,
            }
        } else {
            Navigation::Allow(requested)
        }
    }

    pub fn after_login(from: Option<Route>) -> Route {
        match from {
            Some(route) if route != Route::Login && route != Route::Signup => route,
            _ => Route::Home,
        }
    }
}
