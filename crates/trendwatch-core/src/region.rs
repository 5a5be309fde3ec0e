//! Marketplace regions and their best-seller category catalogs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A best-seller category within a region: display name plus the listing
/// path relative to the region's base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub name: &'static str,
    pub path: &'static str,
}

const US_CATEGORIES: &[Category] = &[
    Category {
        name: "Home",
        path: "/gp/bestsellers/home-garden/",
    },
    Category {
        name: "Electronics",
        path: "/gp/bestsellers/electronics/",
    },
    Category {
        name: "Fashion",
        path: "/gp/bestsellers/fashion/",
    },
    Category {
        name: "Beauty",
        path: "/gp/bestsellers/beauty/",
    },
    Category {
        name: "Sports",
        path: "/gp/bestsellers/sporting-goods/",
    },
];

const UK_CATEGORIES: &[Category] = &[
    Category {
        name: "Home",
        path: "/gp/bestsellers/kitchen/",
    },
    Category {
        name: "Electronics",
        path: "/gp/bestsellers/electronics/",
    },
    Category {
        name: "Fashion",
        path: "/gp/bestsellers/fashion/",
    },
    Category {
        name: "Beauty",
        path: "/gp/bestsellers/beauty/",
    },
    Category {
        name: "Sports",
        path: "/gp/bestsellers/sports/",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Us,
    Uk,
}

impl Region {
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Region::Us => "https://www.amazon.com",
            Region::Uk => "https://www.amazon.co.uk",
        }
    }

    #[must_use]
    pub fn accept_language(self) -> &'static str {
        match self {
            Region::Us => "en-US,en;q=0.9",
            Region::Uk => "en-GB,en;q=0.9,en-US;q=0.8",
        }
    }

    /// Two-letter geo code passed to the search-interest provider.
    #[must_use]
    pub fn geo(self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Uk => "GB",
        }
    }

    #[must_use]
    pub fn categories(self) -> &'static [Category] {
        match self {
            Region::Us => US_CATEGORIES,
            Region::Uk => UK_CATEGORIES,
        }
    }

    /// Looks up a category by name, ignoring ASCII case.
    #[must_use]
    pub fn category(self, name: &str) -> Option<Category> {
        self.categories()
            .iter()
            .copied()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Us => write!(f, "US"),
            Region::Uk => write!(f, "UK"),
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "UK" | "GB" => Ok(Region::Uk),
            other => Err(format!("unknown region '{other}'; expected US or UK")),
        }
    }
}
