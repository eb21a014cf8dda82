use crate::{
    AttachmentData, Error, MeshVertices, PositionMode, RotateMode, SkeletonData, SpacingMode,
};

const MINIMAL: &str = r#"
{
  "skeleton": { "spine": "4.2.43", "referenceScale": 50 },
  "bones": [
    { "name": "root" },
    { "name": "b", "parent": "root", "x": 1, "y": 2, "length": 3, "inherit": "noScale" }
  ],
  "slots": [
    { "name": "pathSlot", "bone": "root", "attachment": "p" }
  ],
  "skins": [
    {
      "name": "default",
      "attachments": {
        "pathSlot": {
          "p": {
            "type": "path",
            "vertexCount": 6,
            "vertices": [ 0, 0, 0, 0, 1, 0, 2, 0, 3, 0, 3, 0 ],
            "lengths": [ 3 ]
          }
        }
      }
    }
  ],
  "path": [
    { "name": "pc", "bones": ["b"], "target": "pathSlot", "position": 4, "spacing": 5, "mixX": 0.3 }
  ]
}
"#;

fn with_constraint(constraint: &str) -> String {
    format!(
        r#"{{
  "bones": [ {{ "name": "root" }}, {{ "name": "b", "parent": "root" }} ],
  "slots": [ {{ "name": "pathSlot", "bone": "root" }} ],
  "path": [ {constraint} ]
}}"#
    )
}

fn with_attachment(attachment: &str) -> String {
    format!(
        r#"{{
  "bones": [ {{ "name": "root" }} ],
  "slots": [ {{ "name": "pathSlot", "bone": "root" }} ],
  "skins": [ {{ "name": "default", "attachments": {{ "pathSlot": {{ "a": {attachment} }} }} }} ]
}}"#
    )
}

#[test]
fn path_constraint_defaults_follow_spine() {
    let data = SkeletonData::from_json_str(MINIMAL).unwrap();
    let c = &data.path_constraints[0];
    assert_eq!(c.position_mode, PositionMode::Percent);
    assert_eq!(c.spacing_mode, SpacingMode::Length);
    assert_eq!(c.rotate_mode, RotateMode::Tangent);
    assert_eq!(c.mix_rotate, 1.0);
    assert_eq!(c.mix_x, 0.3);
    assert_eq!(c.mix_y, 0.3);
    assert_eq!(c.offset_rotation, 0.0);
    assert_eq!(c.order, 0);
    assert!(!c.skin_required);
    assert_eq!(c.bones, vec![1]);
    assert_eq!(c.target, 0);

    let Some(AttachmentData::Path(path)) = data.skin("default").unwrap().attachment(0, "p") else {
        panic!("expected path attachment");
    };
    assert!(path.constant_speed);
    assert!(!path.closed);
    assert_eq!(path.vertices.len(), 6);

    assert_eq!(data.spine_version.as_deref(), Some("4.2.43"));
    assert_eq!(data.reference_scale, 50.0);
    assert_eq!(data.bones[1].inherit, crate::Inherit::NoScale);
}

#[test]
fn scale_applies_to_length_like_values() {
    let data = SkeletonData::from_json_str_with_scale(MINIMAL, 2.0).unwrap();
    assert_eq!(data.reference_scale, 100.0);
    assert_eq!(data.bones[1].x, 2.0);
    assert_eq!(data.bones[1].y, 4.0);
    assert_eq!(data.bones[1].length, 6.0);

    let c = &data.path_constraints[0];
    // Percent position is a fraction; length spacing is a distance.
    assert_eq!(c.position, 4.0);
    assert_eq!(c.spacing, 10.0);

    let Some(AttachmentData::Path(path)) = data.skin("default").unwrap().attachment(0, "p") else {
        panic!("expected path attachment");
    };
    assert_eq!(path.lengths, vec![6.0]);
    let MeshVertices::Unweighted(v) = &path.vertices else {
        panic!("expected unweighted vertices");
    };
    assert_eq!(v[4], [6.0, 0.0]);

    let fixed = with_constraint(
        r#"{ "name": "pc", "bones": ["b"], "target": "pathSlot", "positionMode": "fixed",
             "spacingMode": "percent", "position": 4, "spacing": 0.5 }"#,
    );
    let data = SkeletonData::from_json_str_with_scale(&fixed, 2.0).unwrap();
    assert_eq!(data.path_constraints[0].position, 8.0);
    assert_eq!(data.path_constraints[0].spacing, 0.5);
}

#[test]
fn unified_constraints_array_assigns_order_and_skips_other_kinds() {
    let json = r#"
{
  "bones": [ { "name": "root" }, { "name": "b", "parent": "root" } ],
  "slots": [ { "name": "pathSlot", "bone": "root" } ],
  "constraints": [
    { "type": "ik", "name": "aim", "bones": ["b"], "target": "root" },
    { "type": "path", "name": "pc", "bones": ["b"], "slot": "pathSlot", "rotateMode": "chainScale" },
    { "type": "transform", "name": "copy", "bones": ["b"], "target": "root" }
  ]
}
"#;
    let data = SkeletonData::from_json_str(json).unwrap();
    assert_eq!(data.path_constraints.len(), 1);
    assert_eq!(data.path_constraints[0].order, 1);
    assert_eq!(data.path_constraints[0].rotate_mode, RotateMode::ChainScale);
    assert_eq!(data.find_path_constraint("pc"), Some(0));
}

#[test]
fn skins_map_form_and_membership_lists() {
    let map_form = r#"
{
  "bones": [ { "name": "root" } ],
  "slots": [ { "name": "s", "bone": "root" } ],
  "skins": { "default": { "s": { "pt": { "type": "point", "x": 1, "y": 2, "rotation": 45 } } } }
}
"#;
    let data = SkeletonData::from_json_str(map_form).unwrap();
    let Some(AttachmentData::Point(point)) = data.skin("default").unwrap().attachment(0, "pt")
    else {
        panic!("expected point attachment");
    };
    assert_eq!((point.x, point.y, point.rotation), (1.0, 2.0, 45.0));

    let membership = r#"
{
  "bones": [ { "name": "root" }, { "name": "b", "parent": "root", "skin": true } ],
  "slots": [ { "name": "pathSlot", "bone": "root" } ],
  "skins": [ { "name": "extra", "bones": ["b"], "path": ["pc"] } ],
  "path": [ { "name": "pc", "skin": true, "bones": ["b"], "target": "pathSlot" } ]
}
"#;
    let data = SkeletonData::from_json_str(membership).unwrap();
    let skin = data.skin("extra").unwrap();
    assert_eq!(skin.bones, vec![1]);
    assert_eq!(skin.path_constraints, vec![0]);
    assert!(data.bones[1].skin_required);
    assert!(data.path_constraints[0].skin_required);
}

#[test]
fn weighted_path_vertices_are_decoded() {
    let json = r#"
{
  "bones": [ { "name": "root" }, { "name": "b", "parent": "root" } ],
  "slots": [ { "name": "pathSlot", "bone": "root" } ],
  "skins": [ { "name": "default", "attachments": { "pathSlot": { "p": {
    "type": "path",
    "vertexCount": 3,
    "vertices": [ 1, 0, 1, 2, 1,  2, 0, 0, 0, 0.5, 1, 4, 0, 0.5,  1, 1, 3, 3, 1 ],
    "lengths": [ 1 ]
  } } } } ]
}
"#;
    let data = SkeletonData::from_json_str_with_scale(json, 2.0).unwrap();
    let Some(AttachmentData::Path(path)) = data.skin("default").unwrap().attachment(0, "p") else {
        panic!("expected path attachment");
    };
    let MeshVertices::Weighted(v) = &path.vertices else {
        panic!("expected weighted vertices");
    };
    assert_eq!(v.len(), 3);
    assert_eq!(v[0].len(), 1);
    assert_eq!((v[0][0].bone, v[0][0].x, v[0][0].y), (0, 2.0, 4.0));
    assert_eq!(v[1].len(), 2);
    assert_eq!((v[1][1].bone, v[1][1].x, v[1][1].weight), (1, 8.0, 0.5));
    assert_eq!(v[2][0].bone, 1);
    assert_eq!(path.vertices.world_vertices_length(), 6);
}

#[test]
fn invalid_documents_are_rejected() {
    assert!(matches!(
        SkeletonData::from_json_str("{ not json"),
        Err(Error::JsonParse { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(r#"{ "skeleton": { "spine": "3.8.99" } }"#),
        Err(Error::JsonSpineVersion { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(
            r#"{ "bones": [ { "name": "a", "parent": "b" }, { "name": "b" } ] }"#
        ),
        Err(Error::JsonUnknownBoneParent { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(
            r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "x" } ] }"#
        ),
        Err(Error::JsonUnknownSlotBone { .. })
    ));
}

#[test]
fn unresolvable_path_constraints_are_rejected() {
    let unknown_bone =
        with_constraint(r#"{ "name": "pc", "bones": ["missing"], "target": "pathSlot" }"#);
    match SkeletonData::from_json_str(&unknown_bone) {
        Err(Error::JsonUnknownPathConstraintBone { constraint, bone }) => {
            assert_eq!(constraint, "pc");
            assert_eq!(bone, "missing");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let unknown_target = with_constraint(r#"{ "name": "pc", "bones": ["b"], "target": "nope" }"#);
    assert!(matches!(
        SkeletonData::from_json_str(&unknown_target),
        Err(Error::JsonUnknownPathConstraintTargetSlot { .. })
    ));

    for (field, value) in [
        ("positionMode", "middle"),
        ("spacingMode", "even"),
        ("rotateMode", "spin"),
    ] {
        let json = with_constraint(&format!(
            r#"{{ "name": "pc", "bones": ["b"], "target": "pathSlot", "{field}": "{value}" }}"#
        ));
        match SkeletonData::from_json_str(&json) {
            Err(Error::JsonUnsupportedPathConstraintMode {
                field: f, value: v, ..
            }) => {
                assert_eq!(f, field);
                assert_eq!(v, value);
            }
            other => panic!("unexpected result for {field}: {other:?}"),
        }
    }
}

#[test]
fn unsupported_or_broken_attachments_are_rejected() {
    let mesh = with_attachment(r#"{ "type": "mesh", "uvs": [], "vertices": [], "triangles": [] }"#);
    match SkeletonData::from_json_str(&mesh) {
        Err(Error::JsonUnsupportedAttachmentType {
            attachment_type, ..
        }) => assert_eq!(attachment_type, "mesh"),
        other => panic!("unexpected result: {other:?}"),
    }

    let region = with_attachment(r#"{ "width": 10, "height": 10 }"#);
    assert!(matches!(
        SkeletonData::from_json_str(&region),
        Err(Error::JsonUnsupportedAttachmentType { .. })
    ));

    let missing_count = with_attachment(r#"{ "type": "path", "vertices": [0, 0] }"#);
    assert!(matches!(
        SkeletonData::from_json_str(&missing_count),
        Err(Error::JsonInvalidPathData { .. })
    ));

    let bad_weights =
        with_attachment(r#"{ "type": "path", "vertexCount": 1, "vertices": [1, 5, 0, 0, 1] }"#);
    assert!(matches!(
        SkeletonData::from_json_str(&bad_weights),
        Err(Error::JsonInvalidPathData { .. })
    ));

    let trailing =
        with_attachment(r#"{ "type": "path", "vertexCount": 1, "vertices": [1, 0, 0, 0, 1, 9] }"#);
    assert!(matches!(
        SkeletonData::from_json_str(&trailing),
        Err(Error::JsonInvalidPathData { .. })
    ));
}

#[test]
fn unknown_skin_references_are_rejected() {
    let unknown_slot = r#"
{
  "bones": [ { "name": "root" } ],
  "skins": [ { "name": "default", "attachments": { "ghost": {} } } ]
}
"#;
    assert!(matches!(
        SkeletonData::from_json_str(unknown_slot),
        Err(Error::JsonUnknownSkinSlot { .. })
    ));

    let unknown_bone = r#"{ "bones": [ { "name": "root" } ], "skins": [ { "name": "s", "bones": ["x"] } ] }"#;
    assert!(matches!(
        SkeletonData::from_json_str(unknown_bone),
        Err(Error::JsonUnknownSkinBone { .. })
    ));

    let unknown_constraint =
        r#"{ "bones": [ { "name": "root" } ], "skins": [ { "name": "s", "path": ["pc"] } ] }"#;
    assert!(matches!(
        SkeletonData::from_json_str(unknown_constraint),
        Err(Error::JsonUnknownSkinConstraint { .. })
    ));
}
