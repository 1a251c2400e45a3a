//! This module contains the types used to interact with the SQLite database at a column-level.
//!
//! These types are used to map the custom Rust types to SQLite types by implementing the necessary
//! serialization and deserialization logic.

use std::{ops::Deref, str::FromStr};

use relay_indexer_primitives::{
    amount::Amount,
    ledger::WrapperStatus,
    token::MapProperty,
    types::normalize_hash,
};
use sqlx::{sqlite::SqliteValueRef, Sqlite};

use super::errors::StorageError;

/// An unsigned 64-bit value stored as SQLite's `INTEGER`.
///
/// SQLite only knows signed integers. Values above [`i64::MAX`] are refused when encoded and
/// negative values are refused when decoded, so stored values keep their numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbU64(u64);

impl Deref for DbU64 {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u64> for DbU64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbU64 {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <i64 as sqlx::Type<Sqlite>>::type_info()
    }
}

impl sqlx::Decode<'_, Sqlite> for DbU64 {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let value: i64 = sqlx::decode::Decode::<'_, Sqlite>::decode(value)?;
        let value = u64::try_from(value).map_err(|_| {
            StorageError::MismatchedTypes(format!("negative value {value} in an unsigned column"))
        })?;

        Ok(Self(value))
    }
}

impl sqlx::Encode<'_, Sqlite> for DbU64 {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'_>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let value = i64::try_from(self.0).map_err(|_| {
            StorageError::MismatchedTypes(format!("{} does not fit in a signed column", self.0))
        })?;

        sqlx::Encode::<'_, Sqlite>::encode_by_ref(&value, buf)
    }
}

/// Converts the half-open range `[min, max)` over an unsigned column into inclusive bounds for a
/// `BETWEEN`-style comparison.
///
/// Stored values never exceed [`i64::MAX`], so an upper bound past it is saturated. Returns `None`
/// when no stored value can fall in the range.
pub(super) fn inclusive_range(min: u64, max: u64) -> Option<(i64, i64)> {
    let last = max.checked_sub(1)?;
    if min > last {
        return None;
    }

    let min = i64::try_from(min).ok()?;

    Some((min, i64::try_from(last).unwrap_or(i64::MAX)))
}

/// An [`Amount`] stored as a plain decimal `TEXT` of at most 64 characters.
///
/// Amounts that do not fit are saturated when encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DbAmount(Amount);

impl Deref for DbAmount {
    type Target = Amount;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Amount> for DbAmount {
    fn from(value: Amount) -> Self {
        Self(value)
    }
}

impl From<&Amount> for DbAmount {
    fn from(value: &Amount) -> Self {
        Self(value.clone())
    }
}

impl From<DbAmount> for Amount {
    fn from(value: DbAmount) -> Self {
        value.0
    }
}

impl sqlx::Type<Sqlite> for DbAmount {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl sqlx::Decode<'_, Sqlite> for DbAmount {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount: String = sqlx::decode::Decode::<'_, Sqlite>::decode(value)?;
        let amount = Amount::from_str(&amount)
            .map_err(|e| StorageError::InvalidData(format!("invalid amount {amount}: {e}")))?;

        Ok(Self(amount))
    }
}

impl sqlx::Encode<'_, Sqlite> for DbAmount {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'_>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let amount = self.0.to_storage_string();

        sqlx::Encode::<'_, Sqlite>::encode_by_ref(&amount, buf)
    }
}

/// A token hash stored lower-cased as `TEXT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DbTokenHash(String);

impl Deref for DbTokenHash {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for DbTokenHash {
    fn from(value: &str) -> Self {
        Self(normalize_hash(value))
    }
}

impl From<DbTokenHash> for String {
    fn from(value: DbTokenHash) -> Self {
        value.0
    }
}

impl sqlx::Type<Sqlite> for DbTokenHash {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }
}

impl sqlx::Decode<'_, Sqlite> for DbTokenHash {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let hash: String = sqlx::decode::Decode::<'_, Sqlite>::decode(value)?;

        Ok(Self(normalize_hash(&hash)))
    }
}

impl sqlx::Encode<'_, Sqlite> for DbTokenHash {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'_>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        sqlx::Encode::<'_, Sqlite>::encode_by_ref(&self.0, buf)
    }
}

/// A [`WrapperStatus`] stored as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbWrapperStatus(WrapperStatus);

impl Deref for DbWrapperStatus {
    type Target = WrapperStatus;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<WrapperStatus> for DbWrapperStatus {
    fn from(value: WrapperStatus) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbWrapperStatus {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <i64 as sqlx::Type<Sqlite>>::type_info()
    }
}

impl sqlx::Decode<'_, Sqlite> for DbWrapperStatus {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let code: i64 = sqlx::decode::Decode::<'_, Sqlite>::decode(value)?;
        let code = u64::try_from(code).map_err(|_| {
            StorageError::MismatchedTypes(format!("negative wrapper status {code}"))
        })?;
        let status = WrapperStatus::try_from(code)?;

        Ok(Self(status))
    }
}

impl sqlx::Encode<'_, Sqlite> for DbWrapperStatus {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'_>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let code = u64::from(self.0) as i64;

        sqlx::Encode::<'_, Sqlite>::encode_by_ref(&code, buf)
    }
}

/// A [`MapProperty`] stored as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DbMapProperty(MapProperty);

impl Deref for DbMapProperty {
    type Target = MapProperty;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<MapProperty> for DbMapProperty {
    fn from(value: MapProperty) -> Self {
        Self(value)
    }
}

impl sqlx::Type<Sqlite> for DbMapProperty {
    fn type_info() -> <Sqlite as sqlx::Database>::TypeInfo {
        <i64 as sqlx::Type<Sqlite>>::type_info()
    }
}

impl sqlx::Decode<'_, Sqlite> for DbMapProperty {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
        let code: i64 = sqlx::decode::Decode::<'_, Sqlite>::decode(value)?;

        Ok(Self(MapProperty::from(code)))
    }
}

impl sqlx::Encode<'_, Sqlite> for DbMapProperty {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'_>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let code = i64::from(self.0);

        sqlx::Encode::<'_, Sqlite>::encode_by_ref(&code, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_is_lowercased() {
        let hash = DbTokenHash::from(" 0xAbCd ");

        assert_eq!(hash.as_str(), "0xabcd");
    }

    #[test]
    fn test_inclusive_range() {
        assert_eq!(inclusive_range(10, 20), Some((10, 19)));
        assert_eq!(inclusive_range(0, u64::MAX), Some((0, i64::MAX)));
        assert_eq!(inclusive_range(0, i64::MAX as u64 + 1), Some((0, i64::MAX)));

        assert_eq!(inclusive_range(5, 5), None, "empty range");
        assert_eq!(inclusive_range(0, 0), None, "empty range");
        assert_eq!(
            inclusive_range(i64::MAX as u64 + 1, u64::MAX),
            None,
            "nothing stored lies above i64::MAX"
        );
    }
}
