//! Sort specification and header toggle state machine.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::entity::Entity;

/// A sortable column of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Asset id (numeric).
    Id,
    /// Asset name (lexicographic).
    AssetName,
    /// Price (numeric).
    Price,
    /// Asset class (lexicographic).
    #[serde(rename = "type")]
    Type,
}

impl SortField {
    /// All columns in display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Id, Self::AssetName, Self::Price, Self::Type]
    }

    /// Wire name of the column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::AssetName => "assetName",
            Self::Price => "price",
            Self::Type => "type",
        }
    }

    /// Compare two entities by this column's natural order.
    #[must_use]
    pub fn compare(self, a: &Entity, b: &Entity) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::AssetName => a.asset_name.cmp(&b.asset_name),
            Self::Price => a.price.cmp(&b.price),
            Self::Type => a.asset_type.cmp(&b.asset_type),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown column name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort field: {0}")]
pub struct UnknownSortField(pub String);

impl FromStr for SortField {
    type Err = UnknownSortField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "assetname" | "asset_name" | "name" => Ok(Self::AssetName),
            "price" => Ok(Self::Price),
            "type" => Ok(Self::Type),
            other => Err(UnknownSortField(other.to_string())),
        }
    }
}

/// Direction indicator for a column header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Current sort of the board. `field == None` means no explicit sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Column to sort by.
    pub field: Option<SortField>,
    /// Flip the comparison.
    pub descending: bool,
}

impl SortSpec {
    /// No explicit sort.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            field: None,
            descending: false,
        }
    }

    /// Ascending sort on `field`.
    #[must_use]
    pub const fn ascending(field: SortField) -> Self {
        Self {
            field: Some(field),
            descending: false,
        }
    }

    /// Descending sort on `field`.
    #[must_use]
    pub const fn descending(field: SortField) -> Self {
        Self {
            field: Some(field),
            descending: true,
        }
    }

    /// Next spec after the header for `field` is clicked.
    ///
    /// Clicking the column currently sorted ascending flips it to descending;
    /// any other click sorts ascending on the clicked column.
    #[must_use]
    pub fn select(self, field: SortField) -> Self {
        match self.field {
            Some(current) if current == field && !self.descending => {
                Self::descending(field)
            }
            _ => Self::ascending(field),
        }
    }

    /// Header indicator for `field` under this spec.
    #[must_use]
    pub fn direction_of(self, field: SortField) -> Option<SortDirection> {
        match self.field {
            Some(current) if current == field => Some(if self.descending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            }),
            _ => None,
        }
    }

    /// Compare two entities under this spec. Equal when no field is set.
    #[must_use]
    pub fn compare(self, a: &Entity, b: &Entity) -> Ordering {
        let Some(field) = self.field else {
            return Ordering::Equal;
        };

        let ordering = field.compare(a, b);
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use test_case::test_case;

    use super::*;

    #[test_case("id", SortField::Id)]
    #[test_case("assetName", SortField::AssetName)]
    #[test_case("asset_name", SortField::AssetName)]
    #[test_case("NAME", SortField::AssetName)]
    #[test_case(" price ", SortField::Price)]
    #[test_case("type", SortField::Type)]
    fn parse_sort_field(input: &str, expected: SortField) {
        assert_eq!(input.parse::<SortField>().unwrap(), expected);
    }

    #[test]
    fn parse_unknown_field_fails() {
        assert_eq!(
            "volume".parse::<SortField>().unwrap_err(),
            UnknownSortField("volume".to_string())
        );
    }

    #[test]
    fn field_names_round_trip() {
        for field in SortField::all() {
            assert_eq!(field.as_str().parse::<SortField>().unwrap(), *field);
        }
    }

    #[test_case(SortSpec::none(), SortField::Price, SortSpec::ascending(SortField::Price); "initial click sorts ascending")]
    #[test_case(SortSpec::ascending(SortField::Price), SortField::Price, SortSpec::descending(SortField::Price); "second click flips to descending")]
    #[test_case(SortSpec::descending(SortField::Price), SortField::Price, SortSpec::ascending(SortField::Price); "third click returns to ascending")]
    #[test_case(SortSpec::ascending(SortField::Price), SortField::Id, SortSpec::ascending(SortField::Id); "other field resets to ascending")]
    #[test_case(SortSpec::descending(SortField::Price), SortField::Type, SortSpec::ascending(SortField::Type); "other field from descending")]
    fn header_click_transitions(current: SortSpec, clicked: SortField, expected: SortSpec) {
        assert_eq!(current.select(clicked), expected);
    }

    #[test]
    fn direction_indicator() {
        let spec = SortSpec::descending(SortField::Price);
        assert_eq!(
            spec.direction_of(SortField::Price),
            Some(SortDirection::Descending)
        );
        assert_eq!(spec.direction_of(SortField::Id), None);
        assert_eq!(SortSpec::none().direction_of(SortField::Id), None);
    }

    #[test]
    fn price_compares_numerically() {
        let cheap = Entity::new(1, "A", Decimal::new(9, 0), "x");
        let dear = Entity::new(2, "B", Decimal::new(10, 0), "x");

        assert_eq!(SortField::Price.compare(&cheap, &dear), Ordering::Less);
        assert_eq!(
            SortSpec::descending(SortField::Price).compare(&cheap, &dear),
            Ordering::Greater
        );
    }

    #[test]
    fn text_compares_lexicographically() {
        let a = Entity::new(1, "Zinc", Decimal::ONE, "x");
        let b = Entity::new(2, "apple", Decimal::ONE, "x");

        // Byte order: uppercase sorts before lowercase.
        assert_eq!(SortField::AssetName.compare(&a, &b), Ordering::Less);
    }
}
