//! JSON record codec.
//!
//! # Invariants
//! - `decode_record(encode_record(r)) == r` for every valid `r`.
//! - Missing fields decode to their defaults (entities use `#[serde(default)]`).
//! - Values that fail [`Entity::validate`] are neither written nor returned.

use crate::model::{Entity, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum CodecError {
    Invalid(ValidationError),
    Json(serde_json::Error),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<ValidationError> for CodecError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

pub fn encode_record<E: Entity>(record: &E) -> Result<Vec<u8>, CodecError> {
    record.validate()?;
    Ok(serde_json::to_vec(record)?)
}

pub fn decode_record<E: Entity>(bytes: &[u8]) -> Result<E, CodecError> {
    let record: E = serde_json::from_slice(bytes)?;
    record.validate()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::{decode_record, encode_record, CodecError};
    use crate::model::customer::Customer;
    use crate::model::product::Product;

    #[test]
    fn missing_fields_decode_to_defaults() {
        let product: Product = decode_record(br#"{"product_id":9,"product_name":"Lamp"}"#).unwrap();
        assert_eq!(product.product_id, 9);
        assert_eq!(product.product_name, "Lamp");
        assert_eq!(product.price, 0);
        assert_eq!(product.category.category_id, 0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let customer: Customer =
            decode_record(br#"{"customer_id":3,"name":"Bo","loyalty_tier":"gold"}"#).unwrap();
        assert_eq!(customer.customer_id, 3);
        assert_eq!(customer.name, "Bo");
    }

    #[test]
    fn invalid_email_fails_encode_and_decode() {
        let customer = Customer {
            customer_id: 1,
            email: "not-an-address".to_string(),
            ..Customer::default()
        };
        assert!(matches!(encode_record(&customer), Err(CodecError::Invalid(_))));

        let stored = br#"{"customer_id":1,"email":"not-an-address"}"#;
        assert!(matches!(
            decode_record::<Customer>(stored),
            Err(CodecError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(
            decode_record::<Product>(b"{\"product_id\":"),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            decode_record::<Product>(b"\"just text\""),
            Err(CodecError::Json(_))
        ));
    }
}
