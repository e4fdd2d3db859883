//! Named screens and the authentication guard in front of them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Login,
    Register,
    Main,
    Profile,
    Alert,
    Forbidden,
    NotFound,
}

impl RouteName {
    pub const ALL: [RouteName; 7] = [
        RouteName::Login,
        RouteName::Register,
        RouteName::Main,
        RouteName::Profile,
        RouteName::Alert,
        RouteName::Forbidden,
        RouteName::NotFound,
    ];

    /// Path the route is mounted on. `NotFound` catches everything else and
    /// has no path of its own.
    pub fn path(&self) -> Option<&'static str> {
        match self {
            RouteName::Login => Some("/"),
            RouteName::Register => Some("/register"),
            RouteName::Main => Some("/main"),
            RouteName::Profile => Some("/profile"),
            RouteName::Alert => Some("/alert"),
            RouteName::Forbidden => Some("/forbidden"),
            RouteName::NotFound => None,
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            RouteName::Main | RouteName::Profile | RouteName::Alert
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            RouteName::Login => "login",
            RouteName::Register => "register",
            RouteName::Main => "main",
            RouteName::Profile => "profile",
            RouteName::Alert => "alert",
            RouteName::Forbidden => "forbidden",
            RouteName::NotFound => "not-found",
        }
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a path to its route. Query strings, fragments and a trailing slash
/// are ignored.
pub fn resolve(path: &str) -> RouteName {
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    let normalized = if trimmed.is_empty() { "/" } else { trimmed };

    RouteName::ALL
        .into_iter()
        .find(|route| route.path() == Some(normalized))
        .unwrap_or(RouteName::NotFound)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Proceed(RouteName),
    Redirect(RouteName),
}

impl Navigation {
    /// Route that ends up displayed.
    pub fn target(&self) -> RouteName {
        match self {
            Navigation::Proceed(route) | Navigation::Redirect(route) => *route,
        }
    }
}

pub fn guard(route: RouteName, authenticated: bool) -> Navigation {
    if route.requires_auth() && !authenticated {
        return Navigation::Redirect(RouteName::Forbidden);
    }
    if authenticated && matches!(route, RouteName::Login | RouteName::Register) {
        return Navigation::Redirect(RouteName::Main);
    }
    Navigation::Proceed(route)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_paths() {
        assert_eq!(resolve("/"), RouteName::Login);
        assert_eq!(resolve(""), RouteName::Login);
        assert_eq!(resolve("/main/"), RouteName::Main);
        assert_eq!(resolve("/profile?tab=likes"), RouteName::Profile);
        assert_eq!(resolve("/alert#top"), RouteName::Alert);
        assert_eq!(resolve("/nowhere"), RouteName::NotFound);
    }

    #[test]
    fn protected_routes_need_a_session() {
        for route in [RouteName::Main, RouteName::Profile, RouteName::Alert] {
            assert_eq!(guard(route, false), Navigation::Redirect(RouteName::Forbidden));
            assert_eq!(guard(route, true), Navigation::Proceed(route));
        }
    }

    #[test]
    fn signed_in_users_skip_login_and_register() {
        assert_eq!(guard(RouteName::Login, true), Navigation::Redirect(RouteName::Main));
        assert_eq!(guard(RouteName::Register, true), Navigation::Redirect(RouteName::Main));
        assert_eq!(guard(RouteName::Login, false), Navigation::Proceed(RouteName::Login));
    }

    #[test]
    fn open_routes_always_proceed() {
        for authenticated in [true, false] {
            assert_eq!(
                guard(RouteName::Forbidden, authenticated).target(),
                RouteName::Forbidden
            );
            assert_eq!(
                guard(RouteName::NotFound, authenticated).target(),
                RouteName::NotFound
            );
        }
    }
}
