//! Various unsorted geometrical and logical operators.

pub use self::center::center;
pub use self::sorted_pair::SortedPair;

pub(crate) use self::sort::sort3;
pub(crate) use self::weighted_value::WeightedValue;

mod center;
mod sort;
mod sorted_pair;
mod weighted_value;
