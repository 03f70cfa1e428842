use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id! {
    /// Top-level tenant scope in the time tracking service.
    WorkspaceId
}

string_id! {
    /// A project identifier, e.g. "5b641568b0798c1d1c01b723".
    ProjectId
}

string_id! {
    /// A task identifier; tasks are always scoped to a project.
    TaskId
}

string_id! {
    /// A workspace-global tag identifier.
    TagId
}

string_id! {
    /// A time entry identifier.
    EntryId
}

string_id! {
    /// The identifier of the user owning the entries.
    UserId
}
