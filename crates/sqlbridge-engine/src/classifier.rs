//! Type classification

use sqlbridge_catalog::SqlType;
use sqlbridge_core::LdmType;

/// Map a driver-reported column type to its analytical role
///
/// Character and integer columns are attributes, floating point and
/// fixed-point columns are facts, dates and timestamps are dates. Any other
/// type defaults to an attribute.
pub fn classify(sql_type: &SqlType) -> LdmType {
    match sql_type {
        SqlType::Char | SqlType::Varchar => LdmType::Attribute,
        SqlType::Integer | SqlType::BigInt => LdmType::Attribute,
        SqlType::Real | SqlType::Float | SqlType::Double => LdmType::Fact,
        SqlType::Decimal | SqlType::Numeric => LdmType::Fact,
        SqlType::Date | SqlType::Timestamp => LdmType::Date,
        _ => LdmType::Attribute,
    }
}
