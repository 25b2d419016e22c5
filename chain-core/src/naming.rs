use crate::error::{BlockchainError, ChainError};

/// Chain and contract names are 3–19 characters, each in `[a-z0-9_]`.
pub fn validate_name(name: &str) -> Result<(), BlockchainError> {
    let len = name.len();
    let valid = (3..=19).contains(&len) && name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(ChainError::InvalidName(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_boundary_valid_names() {
        assert!(validate_name("abc").is_ok());
        assert!(validate_name("a_1").is_ok());
        assert!(validate_name("name_19_chars_ok12").is_ok());
        assert!(validate_name("a234567890123456789").is_ok());
        assert_eq!("a234567890123456789".len(), 19);
    }

    #[test]
    fn rejects_twenty_characters() {
        assert!(validate_name("a2345678901234567890").is_err());
    }

    #[test]
    fn rejects_too_short() {
        assert!(validate_name("ab").is_err());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(validate_name("ABC").is_err());
    }

    #[test]
    fn rejects_dash() {
        assert!(validate_name("name-with-dash").is_err());
    }

    #[test]
    fn rejects_too_long() {
        assert!(validate_name("this_name_is_definitely_too_long").is_err());
    }
}
