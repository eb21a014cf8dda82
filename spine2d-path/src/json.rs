use crate::{
    AttachmentData, BoneData, Error, MeshVertices, PathAttachmentData, PathConstraintData,
    PointAttachmentData, PositionMode, RotateMode, SkeletonData, SkinData, SlotData, SpacingMode,
    is_supported_spine_version,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ConstraintDef {
    #[serde(rename = "path")]
    Path(PathConstraintDef),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Root {
    skeleton: Option<SkeletonHeader>,
    bones: Option<Vec<BoneDef>>,
    slots: Option<Vec<SlotDef>>,
    skins: Option<SkinsDef>,
    #[serde(default)]
    constraints: Option<Vec<ConstraintDef>>,
    path: Option<Vec<PathConstraintDef>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkinsDef {
    Map(BTreeMap<String, BTreeMap<String, BTreeMap<String, AttachmentDef>>>),
    Array(Vec<SkinDef>),
}

#[derive(Debug, Deserialize)]
struct SkinDef {
    name: String,
    #[serde(default)]
    attachments: BTreeMap<String, BTreeMap<String, AttachmentDef>>,
    #[serde(default)]
    bones: Vec<String>,
    #[serde(default)]
    path: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SkeletonHeader {
    spine: Option<String>,
    #[serde(default, rename = "referenceScale")]
    reference_scale: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    length: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default, rename = "shearX")]
    shear_x: f32,
    #[serde(default, rename = "shearY")]
    shear_y: f32,
    #[serde(default, alias = "transform")]
    inherit: Option<String>,
    #[serde(default, rename = "skin")]
    skin_required: bool,
}

#[derive(Debug, Deserialize)]
struct SlotDef {
    name: String,
    bone: String,
    #[serde(default)]
    attachment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PathConstraintDef {
    name: String,
    #[serde(default)]
    order: i32,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    bones: Vec<String>,
    #[serde(alias = "slot")]
    target: String,
    #[serde(default, rename = "positionMode")]
    position_mode: Option<String>,
    #[serde(default, rename = "spacingMode")]
    spacing_mode: Option<String>,
    #[serde(default, rename = "rotateMode")]
    rotate_mode: Option<String>,
    #[serde(default, rename = "rotation")]
    offset_rotation: f32,
    #[serde(default)]
    position: f32,
    #[serde(default)]
    spacing: f32,
    #[serde(default = "default_one", rename = "mixRotate")]
    mix_rotate: f32,
    #[serde(default = "default_one", rename = "mixX")]
    mix_x: f32,
    #[serde(default, rename = "mixY")]
    mix_y: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct AttachmentDef {
    #[serde(default, rename = "type")]
    attachment_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default)]
    vertices: Option<Vec<f32>>,
    #[serde(default, rename = "closed")]
    closed: bool,
    #[serde(default = "default_true", rename = "constantSpeed")]
    constant_speed: bool,
    #[serde(default, rename = "vertexCount")]
    vertex_count: Option<usize>,
    #[serde(default)]
    lengths: Option<Vec<f32>>,
}

impl SkeletonData {
    pub fn from_json_str(input: &str) -> Result<Arc<Self>, Error> {
        Self::from_json_str_with_scale(input, 1.0)
    }

    /// Parses a Spine JSON export, multiplying every length-like value by `scale`.
    ///
    /// Only bones, slots, path and point attachments and path constraints are read. Other
    /// constraint kinds in the `constraints` array are ignored; any other attachment type is an
    /// error.
    pub fn from_json_str_with_scale(input: &str, scale: f32) -> Result<Arc<Self>, Error> {
        let root: Root = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;

        let (spine_version, reference_scale_raw) = match root.skeleton {
            Some(s) => (s.spine, s.reference_scale.unwrap_or(100.0)),
            None => (None, 100.0),
        };
        if let Some(v) = spine_version.as_deref() {
            if !is_supported_spine_version(v) {
                return Err(Error::JsonSpineVersion {
                    value: v.to_string(),
                });
            }
        }

        let scale = if scale.is_finite() { scale } else { 1.0 };
        let reference_scale = reference_scale_raw * scale;

        let mut bones = Vec::new();
        let mut bone_index = HashMap::<String, usize>::new();
        for bone in root.bones.unwrap_or_default() {
            let parent = match bone.parent.as_deref() {
                None => None,
                Some(parent_name) => {
                    Some(bone_index.get(parent_name).copied().ok_or_else(|| {
                        Error::JsonUnknownBoneParent {
                            bone: bone.name.clone(),
                            parent: parent_name.to_string(),
                        }
                    })?)
                }
            };

            let index = bones.len();
            bone_index.insert(bone.name.clone(), index);
            bones.push(BoneData {
                name: bone.name,
                parent,
                length: bone.length * scale,
                x: bone.x * scale,
                y: bone.y * scale,
                rotation: bone.rotation,
                scale_x: bone.scale_x,
                scale_y: bone.scale_y,
                shear_x: bone.shear_x,
                shear_y: bone.shear_y,
                inherit: parse_inherit(bone.inherit.as_deref()),
                skin_required: bone.skin_required,
            });
        }

        let mut slots = Vec::new();
        let mut slot_index = HashMap::<String, usize>::new();
        for slot in root.slots.unwrap_or_default() {
            let bone =
                bone_index
                    .get(&slot.bone)
                    .copied()
                    .ok_or_else(|| Error::JsonUnknownSlotBone {
                        slot: slot.name.clone(),
                        bone: slot.bone.clone(),
                    })?;
            slot_index.insert(slot.name.clone(), slots.len());
            slots.push(SlotData {
                name: slot.name,
                bone,
                attachment: slot.attachment,
            });
        }

        let skin_defs = match root.skins {
            None => Vec::new(),
            Some(SkinsDef::Array(skins)) => skins,
            Some(SkinsDef::Map(map)) => map
                .into_iter()
                .map(|(name, attachments)| SkinDef {
                    name,
                    attachments,
                    bones: Vec::new(),
                    path: Vec::new(),
                })
                .collect(),
        };

        let mut skins = HashMap::<String, SkinData>::new();
        let mut pending_skin_constraints: Vec<(String, Vec<String>)> = Vec::new();
        for skin_def in skin_defs {
            let mut skin = SkinData::new(skin_def.name.clone(), slots.len());
            for (slot_name, slot_attachments) in skin_def.attachments {
                let s_index =
                    *slot_index
                        .get(&slot_name)
                        .ok_or_else(|| Error::JsonUnknownSkinSlot {
                            skin: skin_def.name.clone(),
                            slot: slot_name.clone(),
                        })?;
                for (attachment_name, attachment_def) in slot_attachments {
                    let attachment = parse_attachment(
                        attachment_def,
                        AttachmentContext {
                            skin: &skin_def.name,
                            slot: &slot_name,
                            attachment: &attachment_name,
                            bone_count: bones.len(),
                            scale,
                        },
                    )?;
                    skin.set_attachment(s_index, attachment_name, attachment);
                }
            }

            for bone_name in &skin_def.bones {
                let bone = *bone_index
                    .get(bone_name)
                    .ok_or_else(|| Error::JsonUnknownSkinBone {
                        skin: skin_def.name.clone(),
                        bone: bone_name.clone(),
                    })?;
                skin.bones.push(bone);
            }
            if !skin_def.path.is_empty() {
                pending_skin_constraints.push((skin_def.name.clone(), skin_def.path));
            }
            skins.insert(skin_def.name, skin);
        }

        let path_defs = match root.constraints {
            Some(constraints) => {
                let mut path = Vec::new();
                for (order, c) in constraints.into_iter().enumerate() {
                    if let ConstraintDef::Path(mut d) = c {
                        d.order = order as i32;
                        path.push(d);
                    }
                }
                path
            }
            None => root.path.unwrap_or_default(),
        };

        let mut path_constraints = Vec::with_capacity(path_defs.len());
        for c in path_defs {
            path_constraints.push(parse_path_constraint(c, &bone_index, &slot_index, scale)?);
        }
        let path_constraint_index = path_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect::<HashMap<_, _>>();

        for (skin_name, constraint_names) in pending_skin_constraints {
            let Some(skin) = skins.get_mut(&skin_name) else {
                continue;
            };
            for constraint_name in constraint_names {
                let idx = *path_constraint_index.get(&constraint_name).ok_or_else(|| {
                    Error::JsonUnknownSkinConstraint {
                        skin: skin_name.clone(),
                        constraint: constraint_name.clone(),
                    }
                })?;
                skin.path_constraints.push(idx);
            }
        }

        Ok(Arc::new(SkeletonData {
            spine_version,
            reference_scale,
            bones,
            slots,
            skins,
            path_constraints,
        }))
    }
}

fn parse_inherit(raw: Option<&str>) -> crate::Inherit {
    match raw.unwrap_or("normal") {
        "onlyTranslation" => crate::Inherit::OnlyTranslation,
        "noRotationOrReflection" => crate::Inherit::NoRotationOrReflection,
        "noScale" => crate::Inherit::NoScale,
        "noScaleOrReflection" => crate::Inherit::NoScaleOrReflection,
        _ => crate::Inherit::Normal,
    }
}

#[derive(Clone, Copy)]
struct AttachmentContext<'a> {
    skin: &'a str,
    slot: &'a str,
    attachment: &'a str,
    bone_count: usize,
    scale: f32,
}

impl AttachmentContext<'_> {
    fn invalid_path(&self, message: impl Into<String>) -> Error {
        Error::JsonInvalidPathData {
            skin: self.skin.to_string(),
            slot: self.slot.to_string(),
            attachment: self.attachment.to_string(),
            message: message.into(),
        }
    }
}

fn parse_attachment(def: AttachmentDef, cx: AttachmentContext<'_>) -> Result<AttachmentData, Error> {
    let scale = cx.scale;
    let internal_name = def.name.unwrap_or_else(|| cx.attachment.to_string());
    match def.attachment_type.as_deref().unwrap_or("region") {
        "point" => Ok(AttachmentData::Point(PointAttachmentData {
            name: internal_name,
            x: def.x * scale,
            y: def.y * scale,
            rotation: def.rotation,
        })),
        "path" => {
            let vertex_count = def
                .vertex_count
                .ok_or_else(|| cx.invalid_path("missing 'vertexCount'"))?;
            let vertices = def
                .vertices
                .ok_or_else(|| cx.invalid_path("missing 'vertices'"))?;

            let packed_vertices = if vertices.len() == vertex_count * 2 {
                MeshVertices::Unweighted(
                    vertices
                        .chunks_exact(2)
                        .map(|v| [v[0] * scale, v[1] * scale])
                        .collect(),
                )
            } else {
                MeshVertices::Weighted(parse_weighted_vertices(&vertices, vertex_count, cx)?)
            };

            Ok(AttachmentData::Path(PathAttachmentData {
                name: internal_name,
                vertices: packed_vertices,
                lengths: def
                    .lengths
                    .unwrap_or_default()
                    .into_iter()
                    .map(|v| v * scale)
                    .collect(),
                closed: def.closed,
                constant_speed: def.constant_speed,
            }))
        }
        other => Err(Error::JsonUnsupportedAttachmentType {
            skin: cx.skin.to_string(),
            slot: cx.slot.to_string(),
            attachment: cx.attachment.to_string(),
            attachment_type: other.to_string(),
        }),
    }
}

fn parse_path_constraint(
    c: PathConstraintDef,
    bone_index: &HashMap<String, usize>,
    slot_index: &HashMap<String, usize>,
    scale: f32,
) -> Result<PathConstraintData, Error> {
    let mut bones = Vec::with_capacity(c.bones.len());
    for bone_name in c.bones {
        let Some(&idx) = bone_index.get(&bone_name) else {
            return Err(Error::JsonUnknownPathConstraintBone {
                constraint: c.name.clone(),
                bone: bone_name,
            });
        };
        bones.push(idx);
    }

    let target = *slot_index.get(&c.target).ok_or_else(|| {
        Error::JsonUnknownPathConstraintTargetSlot {
            constraint: c.name.clone(),
            slot: c.target.clone(),
        }
    })?;

    let unsupported = |field: &str, value: &str| Error::JsonUnsupportedPathConstraintMode {
        constraint: c.name.clone(),
        field: field.to_string(),
        value: value.to_string(),
    };

    let position_mode = match c.position_mode.as_deref().unwrap_or("percent") {
        "fixed" => PositionMode::Fixed,
        "percent" => PositionMode::Percent,
        other => return Err(unsupported("positionMode", other)),
    };

    let spacing_mode = match c.spacing_mode.as_deref().unwrap_or("length") {
        "length" => SpacingMode::Length,
        "fixed" => SpacingMode::Fixed,
        "percent" => SpacingMode::Percent,
        "proportional" => SpacingMode::Proportional,
        other => return Err(unsupported("spacingMode", other)),
    };

    let rotate_mode = match c.rotate_mode.as_deref().unwrap_or("tangent") {
        "tangent" => RotateMode::Tangent,
        "chain" => RotateMode::Chain,
        "chainScale" => RotateMode::ChainScale,
        other => return Err(unsupported("rotateMode", other)),
    };

    let position = if position_mode == PositionMode::Fixed {
        c.position * scale
    } else {
        c.position
    };
    let spacing = if matches!(spacing_mode, SpacingMode::Length | SpacingMode::Fixed) {
        c.spacing * scale
    } else {
        c.spacing
    };

    Ok(PathConstraintData {
        mix_y: c.mix_y.unwrap_or(c.mix_x),
        name: c.name,
        order: c.order,
        bones,
        target,
        position_mode,
        spacing_mode,
        rotate_mode,
        offset_rotation: c.offset_rotation,
        position,
        spacing,
        mix_rotate: c.mix_rotate,
        mix_x: c.mix_x,
        skin_required: c.skin_required,
    })
}

/// Decodes `[boneCount, (bone, x, y, weight) * boneCount]` records, one per vertex.
fn parse_weighted_vertices(
    raw: &[f32],
    vertex_count: usize,
    cx: AttachmentContext<'_>,
) -> Result<Vec<Vec<crate::VertexWeight>>, Error> {
    fn expect_int(value: f32) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        let rounded = value.round();
        if (value - rounded).abs() > 1.0e-4 || rounded < 0.0 {
            return None;
        }
        Some(rounded as usize)
    }

    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let Some(&n_raw) = raw.get(cursor) else {
            return Err(cx.invalid_path("unexpected end of weighted vertices"));
        };
        cursor += 1;
        let n = expect_int(n_raw)
            .ok_or_else(|| cx.invalid_path("invalid bone count in weighted vertices"))?;

        let mut weights = Vec::with_capacity(n);
        for _ in 0..n {
            let slice = raw
                .get(cursor..cursor + 4)
                .ok_or_else(|| cx.invalid_path("unexpected end of weighted vertices"))?;
            cursor += 4;

            let bone = expect_int(slice[0])
                .ok_or_else(|| cx.invalid_path("invalid bone index in weighted vertices"))?;
            if bone >= cx.bone_count {
                return Err(cx.invalid_path("bone index out of range in weighted vertices"));
            }
            weights.push(crate::VertexWeight {
                bone,
                x: slice[1] * cx.scale,
                y: slice[2] * cx.scale,
                weight: slice[3],
            });
        }
        out.push(weights);
    }

    if cursor != raw.len() {
        return Err(cx.invalid_path("unexpected extra data in weighted vertices"));
    }

    Ok(out)
}

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}
