//! Proptest generators for property-based testing.

use proptest::prelude::*;

use opsgate_core::{ApprovalType, ItemType, SECRET_LEN};
use opsgate_perms::{Capability, Role};

/// Generate a role.
pub fn role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.as_slice())
}

/// Generate a capability.
pub fn capability() -> impl Strategy<Value = Capability> {
    prop::sample::select(Capability::ALL.as_slice())
}

/// Generate an approval type.
pub fn approval_type() -> impl Strategy<Value = ApprovalType> {
    prop::sample::select(ApprovalType::ALL.as_slice())
}

/// Generate a deletable item type.
pub fn item_type() -> impl Strategy<Value = ItemType> {
    prop::sample::select(ItemType::ALL.as_slice())
}

/// Generate a well-formed secret.
pub fn secret() -> impl Strategy<Value = String> {
    prop::collection::vec(0u8..10, SECRET_LEN)
        .prop_map(|digits| digits.iter().map(|d| (b'0' + d) as char).collect())
}

/// Generate a string that is never a well-formed secret.
pub fn malformed_secret() -> impl Strategy<Value = String> {
    prop_oneof![
        // Wrong length.
        prop::collection::vec(0u8..10, 0..SECRET_LEN)
            .prop_map(|d| d.iter().map(|x| (b'0' + x) as char).collect()),
        // Right length, non-digit content.
        "[a-zA-Z]{6}".prop_map(String::from),
    ]
}

/// Generate a user id.
pub fn user_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_core::is_well_formed;

    proptest! {
        #[test]
        fn prop_secret_generator_is_well_formed(s in secret()) {
            prop_assert!(is_well_formed(&s, SECRET_LEN));
        }

        #[test]
        fn prop_malformed_generator_never_is(s in malformed_secret()) {
            prop_assert!(!is_well_formed(&s, SECRET_LEN));
        }
    }
}
