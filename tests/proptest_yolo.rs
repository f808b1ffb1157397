use xlabel::conversion::{convert_from_canonical, convert_to_canonical, ConvertOptions, Format};
use xlabel::ir::AnnotationSet;
use proptest::prelude::*;

mod proptest_helpers;

fn yolo_roundtrip(set: &AnnotationSet) -> AnnotationSet {
    let text = convert_from_canonical(Format::Yolo, set, &ConvertOptions::default())
        .expect("write yolo");
    let props = &set.image_properties;
    let opts = ConvertOptions::default()
        .with_image_dims(props.width, props.height)
        .with_image_filename(props.filename.clone())
        .with_class_names(set.class_names.clone());
    convert_to_canonical(Format::Yolo, &text, &opts).expect("read yolo")
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn yolo_roundtrip_preserves_annotation_semantics(set in proptest_helpers::arb_annotation_set(3, 10)) {
        let restored = yolo_roundtrip(&set);

        prop_assert_eq!(&restored.class_names, &set.class_names);
        let eps = proptest_helpers::eps_yolo(set.image_properties.width, set.image_properties.height);
        let res = proptest_helpers::assert_annotations_equivalent(&set, &restored, eps);
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
        prop_assert!(restored.annotations.iter().all(|ann| ann.custom_attributes.is_none()));
    }

    #[test]
    fn yolo_roundtrip_is_semantically_idempotent(set in proptest_helpers::arb_annotation_set(3, 10)) {
        let first = yolo_roundtrip(&set);
        let second = yolo_roundtrip(&first);

        let eps = proptest_helpers::eps_yolo(first.image_properties.width, first.image_properties.height);
        let res = proptest_helpers::assert_annotations_equivalent(&first, &second, eps);
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
    }

    #[test]
    fn yolo_scores_survive_within_precision(set in proptest_helpers::arb_annotation_set_with_scores(3, 10)) {
        let restored = yolo_roundtrip(&set);

        for (original, back) in set.annotations.iter().zip(&restored.annotations) {
            let (a, b) = (original.score.unwrap_or(0.0), back.score.unwrap_or(-1.0));
            prop_assert!((a - b).abs() <= 1e-6, "score {} came back as {}", a, b);
        }
    }

    #[test]
    fn lossy_yolo_export_drops_segmentation_and_attributes(
        set in proptest_helpers::arb_annotation_set_with_extras(3, 10),
    ) {
        let lossy = ConvertOptions::default().allow_lossy(true);
        let text = convert_from_canonical(Format::Yolo, &set, &lossy).expect("write yolo");
        let props = &set.image_properties;
        let opts = ConvertOptions::default()
            .with_image_dims(props.width, props.height)
            .with_class_names(set.class_names.clone());
        let restored = convert_to_canonical(Format::Yolo, &text, &opts).expect("read yolo");

        prop_assert!(restored.annotations.iter().all(|ann| ann.segmentation.is_none()));
        prop_assert!(restored.annotations.iter().all(|ann| ann.custom_attributes.is_none()));
        let eps = proptest_helpers::eps_yolo(props.width, props.height);
        let res = proptest_helpers::assert_annotations_equivalent(&set, &restored, eps);
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
    }
}
