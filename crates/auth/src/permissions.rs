use serde::{Deserialize, Serialize};

/// Capability checked by the authorization policy.
///
/// Actions are named `"<area>.<verb>"` on the wire and in logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "stock.adjust")]
    StockAdjust,
    #[serde(rename = "stock.read")]
    StockRead,
    #[serde(rename = "products.read")]
    ProductsRead,
    #[serde(rename = "products.write")]
    ProductsWrite,
    #[serde(rename = "users.read")]
    UsersRead,
    #[serde(rename = "users.write")]
    UsersWrite,
    #[serde(rename = "roles.read")]
    RolesRead,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::StockAdjust,
        Action::StockRead,
        Action::ProductsRead,
        Action::ProductsWrite,
        Action::UsersRead,
        Action::UsersWrite,
        Action::RolesRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::StockAdjust => "stock.adjust",
            Action::StockRead => "stock.read",
            Action::ProductsRead => "products.read",
            Action::ProductsWrite => "products.write",
            Action::UsersRead => "users.read",
            Action::UsersWrite => "users.write",
            Action::RolesRead => "roles.read",
        }
    }

    /// Back-office actions are only available to users who verified their email.
    pub fn requires_verified_email(&self) -> bool {
        !matches!(self, Action::ProductsRead)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
