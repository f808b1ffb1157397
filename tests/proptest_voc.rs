use xlabel::conversion::{
    build_conversion_report, convert_from_canonical, convert_to_canonical, ConversionIssueCode,
    ConvertOptions, Format,
};
use proptest::prelude::*;

mod proptest_helpers;

fn voc_roundtrip(set: &xlabel::ir::AnnotationSet) -> xlabel::ir::AnnotationSet {
    let xml = convert_from_canonical(Format::Voc, set, &ConvertOptions::default())
        .expect("write voc");
    // Export order is authoritative, so seed the re-import with it.
    let opts = ConvertOptions::default().with_class_names(set.class_names.clone());
    convert_to_canonical(Format::Voc, &xml, &opts).expect("read voc")
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn voc_roundtrip_preserves_annotation_semantics(set in proptest_helpers::arb_annotation_set(5, 20)) {
        let restored = voc_roundtrip(&set);

        prop_assert_eq!(&restored.class_names, &set.class_names);
        prop_assert_eq!(&restored.image_properties, &set.image_properties);
        let res = proptest_helpers::assert_annotations_equivalent(
            &set,
            &restored,
            proptest_helpers::EPS_VOC,
        );
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
        prop_assert!(restored.annotations.iter().all(|ann| ann.custom_attributes.is_none()));
    }

    #[test]
    fn voc_roundtrip_is_semantically_idempotent(set in proptest_helpers::arb_annotation_set(5, 20)) {
        let first = voc_roundtrip(&set);
        let second = voc_roundtrip(&first);

        let res = proptest_helpers::assert_annotations_equivalent(
            &first,
            &second,
            proptest_helpers::EPS_VOC,
        );
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
    }

    #[test]
    fn voc_report_flags_scores_as_lossy(set in proptest_helpers::arb_annotation_set_with_scores(5, 20)) {
        let report = build_conversion_report(&set, Format::Voc, &ConvertOptions::default());

        prop_assert_eq!(
            report.has_code(ConversionIssueCode::DropScores),
            !set.annotations.is_empty()
        );
        let restored = voc_roundtrip(&set);
        prop_assert!(restored.annotations.iter().all(|ann| ann.score.is_none()));
    }

    #[test]
    fn lossy_voc_export_drops_segmentation_and_foreign_attributes(
        set in proptest_helpers::arb_annotation_set_with_extras(4, 12),
    ) {
        let lossy = ConvertOptions::default().allow_lossy(true);
        let xml = convert_from_canonical(Format::Voc, &set, &lossy).expect("write voc");
        let opts = ConvertOptions::default().with_class_names(set.class_names.clone());
        let restored = convert_to_canonical(Format::Voc, &xml, &opts).expect("read voc");

        prop_assert!(restored.annotations.iter().all(|ann| ann.segmentation.is_none()));
        prop_assert!(restored.annotations.iter().all(|ann| ann.custom_attributes.is_none()));
        let res = proptest_helpers::assert_annotations_equivalent(
            &set,
            &restored,
            proptest_helpers::EPS_VOC,
        );
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
    }
}
