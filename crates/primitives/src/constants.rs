//! Constants shared by every crate in the workspace.

use crate::types::Timestamp;

/// Width of an amount column in storage. Wider values are saturated, see
/// [`Amount::clamped`](crate::amount::Amount::clamped).
pub const MAX_AMOUNT_DIGITS: usize = 64;

/// Latest representable timestamp. Storage keeps unsigned values in signed 64-bit columns, so
/// time windows are capped here.
pub const MAX_TIMESTAMP: Timestamp = i64::MAX as Timestamp;
