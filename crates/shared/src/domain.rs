use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(QueryId);
id_newtype!(UserId);

/// Named subset of the catalog a list view targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    All,
    Mine,
    Favorites,
    Archived,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::All, Scope::Mine, Scope::Favorites, Scope::Archived];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::Mine => "mine",
            Scope::Favorites => "favorites",
            Scope::Archived => "archived",
        }
    }

    /// Key used by routes and the sidebar menu.
    pub fn route_key(self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::Mine => "my",
            Scope::Favorites => "favorites",
            Scope::Archived => "archive",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown scope '{0}'")]
pub struct UnknownScope(pub String);

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Scope::All),
            "mine" | "my" => Ok(Scope::Mine),
            "favorites" | "favourites" => Ok(Scope::Favorites),
            "archived" | "archive" => Ok(Scope::Archived),
            other => Err(UnknownScope(other.to_string())),
        }
    }
}
