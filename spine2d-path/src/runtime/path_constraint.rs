use crate::runtime::path_sampler::{
    PathSampling, SampleBuffers, ensure_capacity, is_shared_point, sample_path,
};
use crate::runtime::skeleton::{Skeleton, slot_attachment};
use crate::{AttachmentData, Error, PathConstraintData, RotateMode, SkeletonData, SpacingMode};
use std::sync::Arc;

const EPSILON: f32 = 1.0e-5;

/// Runtime state of a path constraint.
///
/// The scalar fields start at the setup values and may be changed by the caller (eg. an
/// animation system) before [`Skeleton::update_path_constraint`] or
/// [`Skeleton::update_world_transform`] runs.
#[derive(Clone, Debug)]
pub struct PathConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    /// Slot index.
    pub target: usize,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub active: bool,
    scratch: PathConstraintScratch,
}

/// The driving scalars of one update, copied out so the skeleton can be borrowed mutably.
#[derive(Copy, Clone, Debug)]
struct PathConstraintPose {
    position: f32,
    spacing: f32,
    mix_rotate: f32,
    mix_x: f32,
    mix_y: f32,
}

#[derive(Clone, Debug, Default)]
struct PathConstraintScratch {
    spaces: Vec<f32>,
    lengths: Vec<f32>,
    sample: SampleBuffers,
}

impl PathConstraint {
    /// Resolves `data` against the skeleton definition.
    ///
    /// Fails when a chain bone or the target slot index is out of range.
    pub fn new(
        data_index: usize,
        data: &PathConstraintData,
        skeleton_data: &SkeletonData,
    ) -> Result<Self, Error> {
        if let Some(&bone) = data
            .bones
            .iter()
            .find(|&&bone| bone >= skeleton_data.bones.len())
        {
            return Err(Error::UnknownPathConstraintBone {
                constraint: data.name.clone(),
                bone,
            });
        }
        if data.target >= skeleton_data.slots.len() {
            return Err(Error::UnknownPathConstraintTargetSlot {
                constraint: data.name.clone(),
                slot: data.target,
            });
        }

        // Size scratch for the largest path the target slot can show so steady-state updates
        // do not allocate.
        let bone_count = data.bones.len();
        let (max_world_floats, max_curves) =
            estimate_path_attachment_scratch_capacities(skeleton_data, data.target);
        let mut scratch = PathConstraintScratch::default();
        ensure_capacity(&mut scratch.spaces, bone_count + 1);
        ensure_capacity(&mut scratch.lengths, bone_count);
        scratch
            .sample
            .reserve(bone_count + 1, max_world_floats, max_curves);

        Ok(Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            position: data.position,
            spacing: data.spacing,
            mix_rotate: data.mix_rotate,
            mix_x: data.mix_x,
            mix_y: data.mix_y,
            active: true,
            scratch,
        })
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    /// Whether the constraint takes part in posing for the current skin.
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn pose(&self) -> PathConstraintPose {
        PathConstraintPose {
            position: self.position,
            spacing: self.spacing,
            mix_rotate: self.mix_rotate,
            mix_x: self.mix_x,
            mix_y: self.mix_y,
        }
    }
}

fn estimate_path_attachment_scratch_capacities(
    data: &SkeletonData,
    target_slot_index: usize,
) -> (usize, usize) {
    let mut max_world_floats = 8usize;
    let mut max_curves = 0usize;

    for skin in data.skins.values() {
        let Some(slot_map) = skin.attachments.get(target_slot_index) else {
            continue;
        };
        for attachment in slot_map.values() {
            let AttachmentData::Path(path) = attachment else {
                continue;
            };
            let vertices_length = path.vertices.world_vertices_length();
            if vertices_length < 6 || !path.constant_speed {
                continue;
            }
            let (world_floats, curves) = if path.closed {
                (vertices_length + 2, vertices_length / 6)
            } else {
                (vertices_length - 4, vertices_length / 6 - 1)
            };
            max_world_floats = max_world_floats.max(world_floats);
            max_curves = max_curves.max(curves);
        }
    }

    (max_world_floats, max_curves)
}

/// Setup length of a chain bone and the length of that bone under its current world transform.
fn bone_lengths(skeleton: &Skeleton, bone_index: usize) -> (f32, f32) {
    let setup_length = skeleton
        .data
        .bones
        .get(bone_index)
        .map(|b| b.length)
        .unwrap_or(0.0);
    let Some(bone) = skeleton.bones.get(bone_index) else {
        return (setup_length, 0.0);
    };
    let x = setup_length * bone.a;
    let y = setup_length * bone.c;
    (setup_length, (x * x + y * y).sqrt())
}

/// Fills `spaces` with the arc-length gap before each sample and, when `lengths` is non-empty,
/// each bone's current length for chain scaling.
///
/// `spaces[0]` is always zero: the first sample sits at the constraint position. Bones shorter
/// than epsilon contribute the raw `spacing` and a zero scale length.
pub(crate) fn resolve_spaces(
    skeleton: &Skeleton,
    bones: &[usize],
    spacing_mode: SpacingMode,
    spacing: f32,
    spaces: &mut [f32],
    lengths: &mut [f32],
) {
    let spaces_count = spaces.len();
    spaces.fill(0.0);
    lengths.fill(0.0);
    let chain = bones.iter().copied().take(spaces_count.saturating_sub(1));

    match spacing_mode {
        SpacingMode::Percent => {
            if !lengths.is_empty() {
                for (i, bone_index) in chain.enumerate() {
                    let (setup_length, length) = bone_lengths(skeleton, bone_index);
                    if let Some(out) = lengths.get_mut(i) {
                        *out = if setup_length < EPSILON { 0.0 } else { length };
                    }
                }
            }
            for space in spaces.iter_mut().skip(1) {
                *space = spacing;
            }
        }
        SpacingMode::Proportional => {
            let mut sum = 0.0f32;
            for (i, bone_index) in chain.enumerate() {
                let (setup_length, length) = bone_lengths(skeleton, bone_index);
                if setup_length < EPSILON {
                    spaces[i + 1] = spacing;
                    sum += spacing;
                    continue;
                }
                if let Some(out) = lengths.get_mut(i) {
                    *out = length;
                }
                spaces[i + 1] = length;
                sum += length;
            }
            if sum > 0.0 {
                let scale = spaces_count as f32 / sum * spacing;
                for space in spaces.iter_mut().skip(1) {
                    *space *= scale;
                }
            }
        }
        SpacingMode::Length | SpacingMode::Fixed => {
            let length_spacing = spacing_mode == SpacingMode::Length;
            for (i, bone_index) in chain.enumerate() {
                let (setup_length, length) = bone_lengths(skeleton, bone_index);
                if setup_length < EPSILON {
                    spaces[i + 1] = spacing;
                    continue;
                }
                if let Some(out) = lengths.get_mut(i) {
                    *out = length;
                }
                let gap = if length_spacing {
                    setup_length + spacing
                } else {
                    spacing
                };
                spaces[i + 1] = gap * length / setup_length;
            }
        }
    }
}

impl Skeleton {
    /// Runs one path constraint against the current world transforms.
    ///
    /// Returns `false` without touching any bone when all mixes are zero, the chain is empty or
    /// the target slot does not currently show a path attachment.
    pub fn update_path_constraint(&mut self, constraint_index: usize) -> bool {
        self.apply_path_constraint(constraint_index)
    }

    pub(crate) fn apply_path_constraint(&mut self, constraint_index: usize) -> bool {
        let Some(c) = self.path_constraints.get(constraint_index) else {
            return false;
        };
        let (data_index, target, bone_count) = (c.data_index, c.target, c.bones.len());
        let pose = c.pose();

        let skeleton_data = Arc::clone(&self.data);
        let Some(data) = skeleton_data.path_constraints.get(data_index) else {
            return false;
        };
        if pose.mix_rotate == 0.0 && pose.mix_x == 0.0 && pose.mix_y == 0.0 {
            log::trace!("path constraint '{}' skipped: all mixes are zero", data.name);
            return false;
        }
        if bone_count == 0 {
            return false;
        }
        let Some(slot) = self.slots.get(target) else {
            return false;
        };
        let Some(AttachmentData::Path(path)) =
            slot_attachment(&skeleton_data, self.skin.as_deref(), target, slot)
        else {
            log::trace!(
                "path constraint '{}' skipped: target slot has no path attachment",
                data.name
            );
            return false;
        };

        let tangents = data.rotate_mode == RotateMode::Tangent;
        let scale = data.rotate_mode == RotateMode::ChainScale;
        let spaces_count = if tangents { bone_count } else { bone_count + 1 };

        let bones = std::mem::take(&mut self.path_constraints[constraint_index].bones);
        let mut scratch = std::mem::take(&mut self.path_constraints[constraint_index].scratch);

        scratch.spaces.resize(spaces_count, 0.0);
        scratch
            .lengths
            .resize(if scale { bone_count } else { 0 }, 0.0);
        resolve_spaces(
            self,
            &bones,
            data.spacing_mode,
            pose.spacing,
            &mut scratch.spaces,
            &mut scratch.lengths,
        );

        let sampling = PathSampling {
            slot_index: target,
            path,
            position_mode: data.position_mode,
            spacing_mode: data.spacing_mode,
            spaces: &scratch.spaces,
            tangents,
            position: pose.position,
        };
        let positions = sample_path(self, &sampling, &mut scratch.sample);

        let applied = if positions.len() < 2 {
            false
        } else {
            self.blend_path_positions(
                data,
                target,
                &bones,
                positions,
                &scratch.spaces,
                &scratch.lengths,
                pose,
            )
        };

        let c = &mut self.path_constraints[constraint_index];
        c.scratch = scratch;
        c.bones = bones;
        applied
    }

    /// Moves and rotates each chain bone toward its sampled position.
    #[allow(clippy::too_many_arguments)]
    fn blend_path_positions(
        &mut self,
        data: &PathConstraintData,
        target_slot_index: usize,
        bones: &[usize],
        positions: &[f32],
        spaces: &[f32],
        lengths: &[f32],
        pose: PathConstraintPose,
    ) -> bool {
        let PathConstraintPose {
            mix_rotate,
            mix_x,
            mix_y,
            ..
        } = pose;
        let tangents = data.rotate_mode == RotateMode::Tangent;
        let scale = data.rotate_mode == RotateMode::ChainScale;

        let mut bone_x = positions[0];
        let mut bone_y = positions[1];
        let mut offset_rotation = data.offset_rotation;
        let tip = if offset_rotation == 0.0 {
            data.rotate_mode == RotateMode::Chain
        } else {
            // A reflected path bone flips the direction of the offset.
            let Some(parent) = self
                .slots
                .get(target_slot_index)
                .and_then(|slot| self.bones.get(slot.bone))
            else {
                return false;
            };
            let deg_rad = std::f32::consts::PI / 180.0;
            offset_rotation *= if parent.a * parent.d - parent.b * parent.c > 0.0 {
                deg_rad
            } else {
                -deg_rad
            };
            false
        };

        let mut applied = false;
        let mut p = 3usize;
        for (i, &bone_index) in bones.iter().enumerate() {
            if bone_index >= self.bones.len() {
                p += 3;
                continue;
            }

            {
                let bone = &mut self.bones[bone_index];
                bone.world_x += (bone_x - bone.world_x) * mix_x;
                bone.world_y += (bone_y - bone.world_y) * mix_y;
            }

            let x = positions.get(p).copied().unwrap_or(bone_x);
            let y = positions.get(p + 1).copied().unwrap_or(bone_y);
            let dx = x - bone_x;
            let dy = y - bone_y;

            if scale {
                let length = lengths.get(i).copied().unwrap_or(0.0);
                if length >= EPSILON {
                    let s = ((dx * dx + dy * dy).sqrt() / length - 1.0) * mix_rotate + 1.0;
                    let bone = &mut self.bones[bone_index];
                    bone.a *= s;
                    bone.c *= s;
                }
            }

            bone_x = x;
            bone_y = y;

            if mix_rotate > 0.0 {
                let (a, b, c, d) = {
                    let bone = &self.bones[bone_index];
                    (bone.a, bone.b, bone.c, bone.d)
                };
                let mut r = if tangents {
                    positions.get(p - 1).copied().unwrap_or(0.0)
                } else if is_shared_point(spaces.get(i + 1).copied().unwrap_or(0.0)) {
                    // Shared point: the sampler stored the next sample's tangent.
                    positions.get(p + 2).copied().unwrap_or(0.0)
                } else {
                    dy.atan2(dx)
                };
                r -= c.atan2(a);
                if tip {
                    let cos = r.cos();
                    let sin = r.sin();
                    let length = self
                        .data
                        .bones
                        .get(bone_index)
                        .map(|b| b.length)
                        .unwrap_or(0.0);
                    bone_x += (length * (cos * a - sin * c) - dx) * mix_rotate;
                    bone_y += (length * (sin * a + cos * c) - dy) * mix_rotate;
                } else {
                    r += offset_rotation;
                }

                r = wrap_pi(r) * mix_rotate;
                let cos = r.cos();
                let sin = r.sin();
                let bone = &mut self.bones[bone_index];
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
            }

            self.update_applied_transform(bone_index);
            applied = true;
            p += 3;
        }

        applied
    }
}

pub(crate) fn wrap_pi(mut radians: f32) -> f32 {
    const PI: f32 = std::f32::consts::PI;
    const PI2: f32 = 2.0 * std::f32::consts::PI;
    if radians > PI {
        radians -= PI2;
    } else if radians < -PI {
        radians += PI2;
    }
    radians
}
