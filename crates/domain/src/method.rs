//! Methods a service may support.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ArgumentError;

/// HTTP-like method of a [`Request`](crate::request::Request).
///
/// Each method indexes one slot of a service's action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
}

impl Method {
    /// Number of methods, i.e. the size of an action table.
    pub const COUNT: usize = 2;

    /// All methods in table order.
    pub const ALL: [Self; Self::COUNT] = [Self::Get, Self::Put];

    /// Position of this method in an action table.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Get => 0,
            Self::Put => 1,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("GET") {
            Ok(Self::Get)
        } else if s.eq_ignore_ascii_case("PUT") {
            Ok(Self::Put)
        } else {
            Err(ArgumentError::UnknownMethod(s.to_string()))
        }
    }
}
