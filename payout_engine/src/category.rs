//! Payee categorisation.
//!
//! A payee's category selects the compensation formula that applies and
//! the currency the payout is naturally expressed in.  The mapping is a
//! pure lookup on role and department text.

use crate::models::Currency;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declaration order is the display order of payout lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Chatter,
    Manager,
    Va,
    Model,
    Affiliate,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chatter => "chatter",
            Self::Manager => "manager",
            Self::Va => "va",
            Self::Model => "model",
            Self::Affiliate => "affiliate",
        }
    }

    /// Currency the category's formula produces.
    pub fn native_currency(&self) -> Currency {
        match self {
            Self::Chatter | Self::Model | Self::Affiliate => Currency::Usd,
            Self::Manager | Self::Va => Currency::Eur,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a payee's role and department to its category.
///
/// The affiliate department wins over any role text, then a role mentioning
/// "manager".  Anything unrecognised falls back to [`Category::Va`].
pub fn categorize(role: &str, department: &str) -> Category {
    let role = role.trim().to_lowercase();
    let department = department.trim().to_lowercase();

    if department == "affiliate" || department == "affiliates" {
        return Category::Affiliate;
    }
    if role.contains("manager") {
        return Category::Manager;
    }
    match role.as_str() {
        "chatter" => return Category::Chatter,
        "model" | "creator" => return Category::Model,
        "affiliate" => return Category::Affiliate,
        "va" | "virtual assistant" | "assistant" => return Category::Va,
        _ => {}
    }
    match department.as_str() {
        "chatting" | "chatters" => Category::Chatter,
        "models" | "creators" => Category::Model,
        _ => Category::Va,
    }
}
