// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Namespaced cache keys.
//!
//! Format: `<app>::<view>::<user>[::<scope>]`. Components are validated on
//! construction so no two distinct (view, user, scope) triples can render to
//! the same string.

use std::fmt;

use compass_core::UserId;
use thiserror::Error;

/// Separator between key components.
pub const SEPARATOR: &str = "::";

/// Why a key component or raw key string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("cache key component `{component}` is empty")]
    Empty { component: &'static str },

    #[error("cache key component `{component}` contains or borders on `{SEPARATOR}`: {value:?}")]
    ContainsSeparator {
        component: &'static str,
        value: String,
    },

    #[error("malformed cache key: {0:?}")]
    Malformed(String),
}

/// A validated cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    app: String,
    view: String,
    user: UserId,
    scope: Option<String>,
    rendered: String,
}

fn check(component: &'static str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() {
        return Err(KeyError::Empty { component });
    }
    // A boundary ':' would merge with the separator into ":::".
    if value.contains(SEPARATOR) || value.starts_with(':') || value.ends_with(':') {
        return Err(KeyError::ContainsSeparator {
            component,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl CacheKey {
    pub fn new(
        app: &str,
        view: &str,
        user: &UserId,
        scope: Option<&str>,
    ) -> Result<Self, KeyError> {
        check("app", app)?;
        check("view", view)?;
        check("user", user.as_str())?;
        if let Some(scope) = scope {
            check("scope", scope)?;
        }

        let mut rendered = format!("{app}{SEPARATOR}{view}{SEPARATOR}{user}");
        if let Some(scope) = scope {
            rendered.push_str(SEPARATOR);
            rendered.push_str(scope);
        }

        Ok(Self {
            app: app.to_string(),
            view: view.to_string(),
            user: user.clone(),
            scope: scope.map(str::to_string),
            rendered,
        })
    }

    /// Parses a rendered key back into its components.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        match parts.as_slice() {
            [app, view, user] => Self::new(app, view, &UserId::new(*user), None),
            [app, view, user, scope] => Self::new(app, view, &UserId::new(*user), Some(scope)),
            _ => Err(KeyError::Malformed(raw.to_string())),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Whether this key belongs to `user` under the `app` namespace.
    pub fn belongs_to(&self, app: &str, user: &UserId) -> bool {
        self.app == app && &self.user == user
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}
