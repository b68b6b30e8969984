use uuid::Uuid;

/// Prefix of every user and bucket the fixtures create.
pub const PREFIX: &str = "s3f-";

/// Returns `s3f-` followed by 16 random lowercase hex digits.
///
/// The result is a valid bucket name and a valid user display name.
#[must_use]
pub fn random_name() -> String {
    let id = Uuid::new_v4();
    format!("{PREFIX}{}", hex::encode(&id.as_bytes()[8..]))
}

#[must_use]
pub fn random_bucket_name() -> String {
    random_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape() {
        let name = random_name();
        assert_eq!(name.len(), PREFIX.len() + 16);
        let suffix = name.strip_prefix(PREFIX).unwrap();
        assert!(suffix.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn distinct() {
        assert_ne!(random_bucket_name(), random_bucket_name());
    }
}
