use xlabel::conversion::{convert_from_canonical, convert_to_canonical, ConvertOptions, Format};
use proptest::prelude::*;

mod proptest_helpers;

fn coco_roundtrip(set: &xlabel::ir::AnnotationSet) -> xlabel::ir::AnnotationSet {
    let opts = ConvertOptions::default();
    let json = convert_from_canonical(Format::Coco, set, &opts).expect("serialize coco");
    convert_to_canonical(Format::Coco, &json, &opts).expect("parse coco")
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn coco_roundtrip_preserves_annotation_semantics(set in proptest_helpers::arb_annotation_set(5, 20)) {
        let restored = coco_roundtrip(&set);

        prop_assert_eq!(&restored.class_names, &set.class_names);
        prop_assert_eq!(&restored.image_properties, &set.image_properties);
        let res = proptest_helpers::assert_annotations_equivalent(
            &set,
            &restored,
            proptest_helpers::EPS_COCO,
        );
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
        let attrs = proptest_helpers::assert_custom_attributes_equal(&set, &restored);
        prop_assert!(attrs.is_ok(), "{}", attrs.unwrap_err());
    }

    #[test]
    fn coco_roundtrip_keeps_segmentation_and_attributes_verbatim(
        set in proptest_helpers::arb_annotation_set_with_extras(4, 12),
    ) {
        let restored = coco_roundtrip(&set);

        let attrs = proptest_helpers::assert_custom_attributes_equal(&set, &restored);
        prop_assert!(attrs.is_ok(), "{}", attrs.unwrap_err());
        for (original, back) in set.annotations.iter().zip(&restored.annotations) {
            prop_assert_eq!(&original.segmentation, &back.segmentation);
        }
    }

    #[test]
    fn coco_roundtrip_is_semantically_idempotent(set in proptest_helpers::arb_annotation_set(5, 20)) {
        let first = coco_roundtrip(&set);
        let second = coco_roundtrip(&first);

        let res = proptest_helpers::assert_annotations_equivalent(
            &first,
            &second,
            proptest_helpers::EPS_COCO,
        );
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
    }

    #[test]
    fn coco_score_roundtrip_preserves_values(set in proptest_helpers::arb_annotation_set_with_scores(5, 20)) {
        let restored = coco_roundtrip(&set);

        for (original, back) in set.annotations.iter().zip(&restored.annotations) {
            let (a, b) = (original.score.unwrap_or(0.0), back.score.unwrap_or(-1.0));
            prop_assert!((a - b).abs() <= proptest_helpers::EPS_COCO, "score {} came back as {}", a, b);
        }
    }
}
