//! Property-based checks on the pure core: identity determinism and
//! attachment-hash stability.

use proptest::prelude::*;

use pipeline_core::attachments::hash_attachments;
use pipeline_core::identity::{
    extract_banana_from_matter_id, generate_matter_id, generate_meeting_id, validate_matter_id,
};
use pipeline_core::models::records::{Attachment, AttachmentKind};

fn banana_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,12}[A-Z]{2}"
}

fn identifier_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9-]{1,24}"
}

fn attachment_strategy() -> impl Strategy<Value = Attachment> {
    ("[a-z0-9/._-]{1,40}", "[A-Za-z0-9 ]{0,20}").prop_map(|(path, name)| Attachment {
        name,
        url: format!("https://city.gov/{path}"),
        kind: AttachmentKind::Pdf,
    })
}

proptest! {
    #[test]
    fn matter_ids_are_deterministic(
        banana in banana_strategy(),
        file in identifier_strategy(),
        vendor in proptest::option::of(identifier_strategy()),
    ) {
        let first = generate_matter_id(&banana, Some(&file), vendor.as_deref(), None).unwrap();
        let second = generate_matter_id(&banana, Some(&file), vendor.as_deref(), None).unwrap();
        prop_assert_eq!(first.clone(), second);

        let id = first.unwrap();
        prop_assert!(validate_matter_id(&id));
        prop_assert_eq!(extract_banana_from_matter_id(&id), Some(banana.as_str()));
    }

    #[test]
    fn matter_ids_never_collide_across_cities(
        banana_a in banana_strategy(),
        banana_b in banana_strategy(),
        file in identifier_strategy(),
    ) {
        prop_assume!(banana_a != banana_b);
        let id_a = generate_matter_id(&banana_a, Some(&file), None, None).unwrap().unwrap();
        let id_b = generate_matter_id(&banana_b, Some(&file), None, None).unwrap().unwrap();
        prop_assert_ne!(id_a, id_b);
    }

    #[test]
    fn attachment_hash_ignores_order(mut attachments in proptest::collection::vec(attachment_strategy(), 1..8)) {
        let forward = hash_attachments(&attachments);
        attachments.reverse();
        let reversed = hash_attachments(&attachments);
        prop_assert_eq!(forward, reversed);
    }

    #[test]
    fn attachment_hash_is_stable(attachments in proptest::collection::vec(attachment_strategy(), 0..8)) {
        prop_assert_eq!(hash_attachments(&attachments), hash_attachments(&attachments));
    }

    #[test]
    fn meeting_ids_are_deterministic_and_well_formed(
        banana in banana_strategy(),
        vendor_id in identifier_strategy(),
        title in "[A-Za-z ]{1,40}",
    ) {
        let first = generate_meeting_id(&banana, &vendor_id, None, &title);
        let second = generate_meeting_id(&banana, &vendor_id, None, &title);
        prop_assert_eq!(&first, &second);
        let expected_prefix = format!("{}_", banana);
        prop_assert!(first.starts_with(&expected_prefix));
        prop_assert_eq!(first.len(), banana.len() + 1 + 8);
    }
}
