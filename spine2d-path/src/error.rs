use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("unknown parent bone {parent} for bone '{bone}'")]
    UnknownBoneParent { bone: String, parent: usize },

    #[error("parent bone {parent} of bone '{bone}' (index {index}) must precede its child")]
    BoneParentOrder {
        bone: String,
        index: usize,
        parent: usize,
    },

    #[error("unknown bone {bone} referenced by slot '{slot}'")]
    UnknownSlotBone { slot: String, bone: usize },

    #[error("unknown bone {bone} referenced by path constraint '{constraint}'")]
    UnknownPathConstraintBone { constraint: String, bone: usize },

    #[error("unknown target slot {slot} referenced by path constraint '{constraint}'")]
    UnknownPathConstraintTargetSlot { constraint: String, slot: usize },

    #[cfg(feature = "json")]
    #[error("failed to parse Spine JSON: {message}")]
    JsonParse { message: String },

    #[cfg(feature = "json")]
    #[error("unsupported or invalid Spine version string: {value}")]
    JsonSpineVersion { value: String },

    #[cfg(feature = "json")]
    #[error("unknown parent bone '{parent}' for bone '{bone}'")]
    JsonUnknownBoneParent { bone: String, parent: String },

    #[cfg(feature = "json")]
    #[error("unknown bone '{bone}' referenced by slot '{slot}'")]
    JsonUnknownSlotBone { slot: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unknown slot '{slot}' referenced by skin '{skin}'")]
    JsonUnknownSkinSlot { skin: String, slot: String },

    #[cfg(feature = "json")]
    #[error("unknown bone '{bone}' referenced by skin '{skin}'")]
    JsonUnknownSkinBone { skin: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unknown path constraint '{constraint}' referenced by skin '{skin}'")]
    JsonUnknownSkinConstraint { skin: String, constraint: String },

    #[cfg(feature = "json")]
    #[error(
        "unsupported attachment type '{attachment_type}' for skin '{skin}', slot '{slot}', attachment '{attachment}'"
    )]
    JsonUnsupportedAttachmentType {
        skin: String,
        slot: String,
        attachment: String,
        attachment_type: String,
    },

    #[cfg(feature = "json")]
    #[error(
        "invalid path data for skin '{skin}', slot '{slot}', attachment '{attachment}': {message}"
    )]
    JsonInvalidPathData {
        skin: String,
        slot: String,
        attachment: String,
        message: String,
    },

    #[cfg(feature = "json")]
    #[error("unknown path constraint bone '{bone}' referenced by path constraint '{constraint}'")]
    JsonUnknownPathConstraintBone { constraint: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unknown target slot '{slot}' referenced by path constraint '{constraint}'")]
    JsonUnknownPathConstraintTargetSlot { constraint: String, slot: String },

    #[cfg(feature = "json")]
    #[error("unsupported path constraint {field} '{value}' for constraint '{constraint}'")]
    JsonUnsupportedPathConstraintMode {
        constraint: String,
        field: String,
        value: String,
    },
}
