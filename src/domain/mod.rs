//! Strongly typed identifiers and the extraction pair primitives.
//!
//! Categories, products and templates all use `i32` primary keys in the
//! store. Wrapping them in newtypes keeps a template id from ever being
//! passed where a product id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[derive(Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                debug_assert!(id >= 0, concat!(stringify!($name), " should be non-negative"));
                Self(id)
            }

            #[must_use]
            pub const fn value(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self::new(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a product category.
    CategoryId
);

entity_id!(
    /// Identifier of a product the extraction worker searches for.
    ProductId
);

entity_id!(
    /// Identifier of a search URL template.
    TemplateId
);

/// A (product, template) combination, the atomic unit of extraction work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PairKey {
    pub product_id: ProductId,
    pub template_id: TemplateId,
}

impl PairKey {
    #[must_use]
    pub const fn new(product_id: ProductId, template_id: TemplateId) -> Self {
        Self {
            product_id,
            template_id,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "product {} / template {}", self.product_id, self.template_id)
    }
}

/// Ledger state of a pair.
///
/// `Unseen -> Failed -> Succeeded` and `Unseen -> Succeeded` are the only
/// transitions; `Succeeded` never moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    Unseen,
    Failed,
    Succeeded,
}

impl PairState {
    #[must_use]
    pub const fn from_success(success: bool) -> Self {
        if success { Self::Succeeded } else { Self::Failed }
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unseen, Self::Failed | Self::Succeeded)
                | (Self::Failed, Self::Failed | Self::Succeeded)
        )
    }
}
