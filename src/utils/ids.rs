use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deterministic child id (UUID v5) for records that both the device and the
/// server derive from the same parent, e.g. the stock adjustment written when
/// a delivery item is processed. Same parent + purpose always yields the same id.
pub fn derive_id(parent: &str, purpose: &str) -> String {
    let namespace = Uuid::parse_str(parent).unwrap_or(Uuid::NAMESPACE_OID);
    Uuid::new_v5(&namespace, format!("{}:{}", parent, purpose).as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_id_is_stable() {
        let parent = new_id();
        assert_eq!(
            derive_id(&parent, "stock-adjustment"),
            derive_id(&parent, "stock-adjustment")
        );
        assert_ne!(
            derive_id(&parent, "stock-adjustment"),
            derive_id(&parent, "stock-alert")
        );
    }

    #[test]
    fn test_derive_id_accepts_non_uuid_parent() {
        let id = derive_id("not-a-uuid", "x");
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
