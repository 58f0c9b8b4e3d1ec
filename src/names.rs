//! Naming rules the provisioning service enforces, applied before anything
//! leaves the machine.

use crate::error::SynthError;

// A stack name can contain only alphanumeric characters (case sensitive) and
// hyphens. It must start with an alphabetical character and can't be longer
// than 128 characters.
const STACK_NAME_RULES: &str = "must consist of alphanumeric characters and hyphens, \
    must start with an alphabetic character, and cannot be longer than 128 characters";

const LOGICAL_ID_RULES: &str =
    "must contain only alphanumeric characters [A-Za-z0-9], at least 1 and at most 255";

pub fn validate_stack_name(name: &str) -> Result<(), SynthError> {
    let invalid = || SynthError::InvalidStackName {
        name: name.to_string(),
        reason: STACK_NAME_RULES,
    };
    if name.is_empty() || name.len() > 128 {
        return Err(invalid());
    }
    for (i, c) in name.chars().enumerate() {
        if i == 0 && !c.is_ascii_alphabetic() {
            return Err(invalid());
        }
        if !c.is_ascii_alphanumeric() && c != '-' {
            return Err(invalid());
        }
    }
    Ok(())
}

pub fn validate_logical_id(id: &str) -> Result<(), SynthError> {
    if id.is_empty() || id.len() > 255 || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SynthError::InvalidLogicalId {
            id: id.to_string(),
            reason: LOGICAL_ID_RULES,
        });
    }
    Ok(())
}

/// Derive a logical id from a construct identifier: drop every character the
/// provisioning service rejects and capitalize the start of each run, so
/// `items` becomes `Items` and `{id}` becomes `Id`.
pub fn logical_id(prefix: &str, raw: &str) -> String {
    let mut cleaned = String::with_capacity(prefix.len() + raw.len());
    cleaned.push_str(prefix);
    let mut upper_next = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if upper_next {
                cleaned.extend(c.to_uppercase());
                upper_next = false;
            } else {
                cleaned.push(c);
            }
        } else {
            upper_next = true;
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_names_follow_the_service_rules() {
        assert!(validate_stack_name("items-api").is_ok());
        assert!(validate_stack_name("a").is_ok());
        assert!(validate_stack_name("").is_err());
        assert!(validate_stack_name("9items").is_err());
        assert!(validate_stack_name("-items").is_err());
        assert!(validate_stack_name("items_api").is_err());
        assert!(validate_stack_name(&"a".repeat(129)).is_err());
        assert!(validate_stack_name(&"a".repeat(128)).is_ok());
    }

    #[test]
    fn logical_ids_are_alphanumeric_and_bounded() {
        assert!(validate_logical_id("TableItems").is_ok());
        assert!(validate_logical_id("").is_err());
        assert!(validate_logical_id("Table-Items").is_err());
        assert!(validate_logical_id(&"A".repeat(256)).is_err());
    }

    #[test]
    fn derivation_strips_and_capitalizes() {
        assert_eq!(logical_id("Table", "items"), "TableItems");
        assert_eq!(logical_id("Lambda", "getOneItem"), "LambdaGetOneItem");
        assert_eq!(logical_id("Lambda", "get_one_item"), "LambdaGetOneItem");
        assert_eq!(logical_id("", "{id}"), "Id");
        assert_eq!(logical_id("RestApiSampleApi", "/items/{id}"), "RestApiSampleApiItemsId");
        assert_eq!(logical_id("", "GET"), "GET");
    }
}
