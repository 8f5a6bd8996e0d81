use proptest::prelude::*;
use std::collections::BTreeSet;
use telemetry_dashboard::dashboard::accepts;
use telemetry_dashboard::table::TypeTag;

const TAGS: [TypeTag; 6] = [
    TypeTag::Boolean,
    TypeTag::Number,
    TypeTag::String,
    TypeTag::BooleanArray,
    TypeTag::NumberArray,
    TypeTag::StringArray,
];

fn tag_set() -> impl Strategy<Value = BTreeSet<TypeTag>> {
    proptest::collection::vec(any::<bool>(), TAGS.len()).prop_map(|mask| {
        TAGS.iter()
            .zip(mask)
            .filter(|(_, keep)| *keep)
            .map(|(tag, _)| *tag)
            .collect::<BTreeSet<TypeTag>>()
    })
}

proptest! {
    #[test]
    fn acceptance_is_empty_or_intersecting(observed in tag_set(), accepted in tag_set()) {
        let expected = observed.is_empty() || observed.iter().any(|t| accepted.contains(t));
        prop_assert_eq!(accepts(&observed, &accepted), expected);
    }

    #[test]
    fn empty_observation_is_always_accepted(accepted in tag_set()) {
        prop_assert!(accepts(&BTreeSet::new(), &accepted));
    }
}

#[test]
fn widget_with_no_accepted_types_only_takes_empty_roots() {
    let none = BTreeSet::new();
    assert!(accepts(&BTreeSet::new(), &none));
    assert!(!accepts(&BTreeSet::from([TypeTag::Number]), &none));
}
