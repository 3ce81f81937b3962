use core::fmt;

/// Number of fixed columns at the front of every grid.
///
/// Column indices `0..STATIC_COLUMN_COUNT` are reserved for the sample
/// fields carried directly on each row and never appear in a row's sparse
/// cell list.
pub const STATIC_COLUMN_COUNT: u32 = 5;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(u32);

        impl $name {
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            pub const fn get(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(index: u32) -> Self {
                Self(index)
            }
        }

        impl From<$name> for u32 {
            fn from(index: $name) -> u32 {
                index.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_type!(
    /// Unique index of a sample row within one dataset.
    RowIndex,
    "Row"
);
index_type!(
    /// Globally unique, monotonic column index.
    ColumnIndex,
    "Col"
);
index_type!(
    /// Index of a service item (analyte panel).
    ServiceItemIndex,
    "Si"
);
index_type!(
    /// Index of an analyte.
    AnalyteIndex,
    "Analyte"
);

impl ColumnIndex {
    /// True for the five fixed sample columns.
    pub const fn is_static(self) -> bool {
        self.0 < STATIC_COLUMN_COUNT
    }

    /// Field name used for this column in projected grid rows.
    pub fn grid_key(self) -> String {
        format!("col_{}", self.0)
    }
}

/// The five fixed sample columns, in grid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticField {
    SeqNo,
    SampleName,
    TravelerNo,
    MaterialType,
    ControlType,
}

impl StaticField {
    pub const ALL: [StaticField; 5] = [
        StaticField::SeqNo,
        StaticField::SampleName,
        StaticField::TravelerNo,
        StaticField::MaterialType,
        StaticField::ControlType,
    ];

    pub fn from_column(column: ColumnIndex) -> Option<Self> {
        Self::ALL.get(column.get() as usize).copied()
    }

    pub fn column(self) -> ColumnIndex {
        ColumnIndex::new(self as u32)
    }
}
