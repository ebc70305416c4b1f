use crate::core::ValidationError;
use serde::{Deserialize, Serialize};

/// Raw billing address as entered by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressForm {
    pub label: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    #[serde(default)]
    pub state: Option<String>,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// An address that passed local validation; fields are trimmed, optional
/// blanks are `None` and the country code is upper-case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidAddress {
    pub label: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub state: Option<String>,
    pub country: String,
    pub is_default: bool,
}

fn required(field: &'static str, value: &str, message: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, message));
    }
    Ok(trimmed.to_string())
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// ISO 3166-1 alpha-2 shape check (two ASCII letters)
fn is_country_code(value: &str) -> bool {
    let value = value.trim();
    value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic())
}

impl AddressForm {
    /// Check fields in form order and stop at the first failure
    pub fn validate(&self) -> Result<ValidAddress, ValidationError> {
        let label = required("label", self.label.as_str(), "Label is required")?;

        if !is_country_code(&self.country) {
            return Err(ValidationError::new("country", "Select a country"));
        }
        let country = self.country.trim();

        let line1 = required("line1", self.line1.as_str(), "Address line 1 is required")?;
        let postal_code = required("postalCode", self.postal_code.as_str(), "Postal code is required")?;
        let city = required("city", self.city.as_str(), "City is required")?;

        Ok(ValidAddress {
            label,
            line1,
            line2: optional(&self.line2),
            city,
            postal_code,
            state: optional(&self.state),
            country: country.to_ascii_uppercase(),
            is_default: self.is_default,
        })
    }

    /// Every failing field, for inline display next to each input
    pub fn errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Err(err) = required("label", self.label.as_str(), "Label is required") {
            errors.push(err);
        }
        if !is_country_code(&self.country) {
            errors.push(ValidationError::new("country", "Select a country"));
        }
        let checks: [(&'static str, &str, &str); 3] = [
            ("line1", self.line1.as_str(), "Address line 1 is required"),
            ("postalCode", self.postal_code.as_str(), "Postal code is required"),
            ("city", self.city.as_str(), "City is required"),
        ];
        for (field, value, message) in checks {
            if let Err(err) = required(field, value, message) {
                errors.push(err);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> AddressForm {
        AddressForm {
            label: "Office".to_string(),
            line1: " Hauptstraße 1 ".to_string(),
            line2: Some("   ".to_string()),
            city: "Berlin".to_string(),
            postal_code: "10115".to_string(),
            state: None,
            country: "de".to_string(),
            is_default: true,
        }
    }

    #[test]
    fn test_valid_address_is_normalized() {
        let address = valid_form().validate().unwrap();
        assert_eq!(address.line1, "Hauptstraße 1");
        assert_eq!(address.line2, None);
        assert_eq!(address.country, "DE");
        assert!(address.is_default);
    }

    #[test]
    fn test_missing_city() {
        let mut form = valid_form();
        form.city = "  ".to_string();
        let err = form.validate().unwrap_err();
        assert_eq!(err.field, "city");
        assert_eq!(err.message, "City is required");
    }

    #[test]
    fn test_country_must_be_two_letters() {
        for bad in ["", "D", "DEU", "1A"] {
            let mut form = valid_form();
            form.country = bad.to_string();
            assert_eq!(form.validate().unwrap_err().message, "Select a country");
        }
    }

    #[test]
    fn test_errors_lists_every_field() {
        let errors = AddressForm::default().errors();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["label", "country", "line1", "postalCode", "city"]);
        assert!(valid_form().errors().is_empty());
    }
}
