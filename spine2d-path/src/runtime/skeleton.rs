use crate::runtime::path_constraint::PathConstraint;
use crate::{AttachmentData, Error, MeshVertices, SkeletonData};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub inherit: crate::Inherit,
    pub active: bool,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    pub ax: f32,
    pub ay: f32,
    pub arotation: f32,
    pub ascale_x: f32,
    pub ascale_y: f32,
    pub ashear_x: f32,
    pub ashear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl Bone {
    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    /// World rotation of the bone's x axis, in degrees.
    pub fn world_rotation_x(&self) -> f32 {
        self.c.atan2(self.a).to_degrees()
    }

    /// Length of the bone's x axis in world space.
    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn local_to_world(&self, local_x: f32, local_y: f32) -> [f32; 2] {
        [
            self.a * local_x + self.b * local_y + self.world_x,
            self.c * local_x + self.d * local_y + self.world_y,
        ]
    }
}

#[cfg(feature = "glam")]
impl Bone {
    pub fn world_position(&self) -> glam::Vec2 {
        glam::Vec2::new(self.world_x, self.world_y)
    }

    pub fn world_matrix(&self) -> glam::Affine2 {
        glam::Affine2::from_cols(
            glam::Vec2::new(self.a, self.c),
            glam::Vec2::new(self.b, self.d),
            glam::Vec2::new(self.world_x, self.world_y),
        )
    }
}

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    pub attachment: Option<String>,
    pub(crate) attachment_skin: Option<String>,
    /// Local-space vertex offsets for the current attachment. Empty means none.
    pub deform: Vec<f32>,
}

impl Slot {
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

impl crate::PointAttachmentData {
    pub fn compute_world_position(&self, bone: &Bone) -> [f32; 2] {
        bone.local_to_world(self.x, self.y)
    }

    pub fn compute_world_rotation(&self, bone: &Bone) -> f32 {
        bone.c.atan2(bone.a).to_degrees() + self.rotation
    }
}

#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    bone_children: Vec<Vec<usize>>,
    pub slots: Vec<Slot>,
    pub skin: Option<String>,
    pub path_constraints: Vec<PathConstraint>,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    update_cache: Vec<UpdateCacheItem>,
}

#[derive(Copy, Clone, Debug)]
enum UpdateCacheItem {
    Bone(usize),
    Path(usize),
}

impl Skeleton {
    /// Creates a skeleton instance in its setup pose.
    ///
    /// Fails when a bone parent, slot bone, path constraint bone or path constraint target
    /// does not resolve against `data`.
    pub fn new(data: Arc<SkeletonData>) -> Result<Self, Error> {
        for (index, bone) in data.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= data.bones.len() {
                    return Err(Error::UnknownBoneParent {
                        bone: bone.name.clone(),
                        parent,
                    });
                }
                // Parents must precede children so a single forward pass can pose the tree.
                if parent >= index {
                    return Err(Error::BoneParentOrder {
                        bone: bone.name.clone(),
                        index,
                        parent,
                    });
                }
            }
        }
        for slot in &data.slots {
            if slot.bone >= data.bones.len() {
                return Err(Error::UnknownSlotBone {
                    slot: slot.name.clone(),
                    bone: slot.bone,
                });
            }
        }

        let bones = data
            .bones
            .iter()
            .enumerate()
            .map(|(data_index, bone)| Bone {
                data_index,
                parent: bone.parent,
                inherit: bone.inherit,
                active: !bone.skin_required,
                x: bone.x,
                y: bone.y,
                rotation: bone.rotation,
                scale_x: bone.scale_x,
                scale_y: bone.scale_y,
                shear_x: bone.shear_x,
                shear_y: bone.shear_y,
                ax: bone.x,
                ay: bone.y,
                arotation: bone.rotation,
                ascale_x: bone.scale_x,
                ascale_y: bone.scale_y,
                ashear_x: bone.shear_x,
                ashear_y: bone.shear_y,
                a: 1.0,
                b: 0.0,
                c: 0.0,
                d: 1.0,
                world_x: 0.0,
                world_y: 0.0,
            })
            .collect::<Vec<_>>();

        let bone_children = build_bone_children_indices(&bones);

        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(data_index, slot)| Slot {
                data_index,
                bone: slot.bone,
                attachment: slot.attachment.clone(),
                attachment_skin: None,
                deform: Vec::new(),
            })
            .collect::<Vec<_>>();

        let path_constraints = data
            .path_constraints
            .iter()
            .enumerate()
            .map(|(data_index, c)| PathConstraint::new(data_index, c, &data))
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Self {
            data,
            bones,
            bone_children,
            slots,
            // Skeletons start with no skin; "default" is only a fallback for lookups.
            skin: None,
            path_constraints,
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            update_cache: Vec::new(),
        };
        out.set_to_setup_pose();
        out.update_cache();
        Ok(out)
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.data.find_bone(name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.data.find_slot(name)
    }

    pub fn find_path_constraint(&self, name: &str) -> Option<usize> {
        self.data.find_path_constraint(name)
    }

    /// Recomputes bone and constraint activation for the current skin and rebuilds the order
    /// in which bones and constraints are updated.
    pub fn update_cache(&mut self) {
        // Bones: active unless skinRequired, then only active if included by the current skin
        // (plus all parents of included bones).
        for (i, bone) in self.bones.iter_mut().enumerate() {
            let required = self
                .data
                .bones
                .get(i)
                .map(|b| b.skin_required)
                .unwrap_or(false);
            bone.active = !required;
        }

        let skin = self.skin.as_deref().and_then(|n| self.data.skin(n));
        if let Some(skin) = skin {
            for &bone_index in &skin.bones {
                let mut cur = Some(bone_index);
                while let Some(i) = cur {
                    if i >= self.bones.len() {
                        break;
                    }
                    self.bones[i].active = true;
                    cur = self.bones[i].parent;
                }
            }
        }

        for c in &mut self.path_constraints {
            let skin_required = self
                .data
                .path_constraints
                .get(c.data_index())
                .map(|d| d.skin_required)
                .unwrap_or(false);
            let in_skin = skin
                .map(|s| s.path_constraints.contains(&c.data_index()))
                .unwrap_or(false);
            let target_bone_active = self
                .slots
                .get(c.target)
                .and_then(|s| self.bones.get(s.bone))
                .map(|b| b.active)
                .unwrap_or(false);
            c.active = target_bone_active && (!skin_required || in_skin);
        }

        self.rebuild_update_cache();
        log::debug!(
            "rebuilt update cache: {} items, skin {:?}",
            self.update_cache.len(),
            self.skin
        );
    }

    /// Human-readable update order, eg. `["bone root", "path chain", "bone tip"]`.
    pub fn update_cache_names(&self) -> Vec<String> {
        self.update_cache
            .iter()
            .map(|item| match *item {
                UpdateCacheItem::Bone(index) => {
                    let name = self
                        .data
                        .bones
                        .get(index)
                        .map(|b| b.name.as_str())
                        .unwrap_or("<unknown>");
                    format!("bone {name}")
                }
                UpdateCacheItem::Path(index) => {
                    let name = self
                        .path_constraints
                        .get(index)
                        .and_then(|c| self.data.path_constraints.get(c.data_index()))
                        .map(|d| d.name.as_str())
                        .unwrap_or("<unknown>");
                    format!("path {name}")
                }
            })
            .collect()
    }

    fn rebuild_update_cache(&mut self) {
        fn sort_reset(skeleton: &Skeleton, bone_index: usize, sorted: &mut [bool]) {
            if bone_index >= sorted.len() {
                return;
            }
            if !skeleton
                .bones
                .get(bone_index)
                .map(|b| b.active)
                .unwrap_or(false)
            {
                return;
            }
            if !sorted[bone_index] {
                return;
            }

            if let Some(children) = skeleton.bone_children.get(bone_index) {
                for &child in children {
                    sort_reset(skeleton, child, sorted);
                }
            }
            sorted[bone_index] = false;
        }

        fn sort_reset_children(skeleton: &Skeleton, bone_index: usize, sorted: &mut [bool]) {
            let Some(children) = skeleton.bone_children.get(bone_index) else {
                return;
            };
            for &child in children {
                sort_reset(skeleton, child, sorted);
            }
        }

        fn sort_bone(
            skeleton: &Skeleton,
            bone_index: usize,
            sorted: &mut [bool],
            out: &mut Vec<UpdateCacheItem>,
        ) {
            if bone_index >= sorted.len() || sorted[bone_index] {
                return;
            }
            let Some(bone) = skeleton.bones.get(bone_index) else {
                return;
            };
            if !bone.active {
                sorted[bone_index] = true;
                return;
            }
            if let Some(parent) = bone.parent {
                sort_bone(skeleton, parent, sorted, out);
            }
            sorted[bone_index] = true;
            out.push(UpdateCacheItem::Bone(bone_index));
        }

        fn sort_path_attachment(
            skeleton: &Skeleton,
            attachment: &AttachmentData,
            slot_bone_index: usize,
            sorted: &mut [bool],
            out: &mut Vec<UpdateCacheItem>,
        ) {
            let AttachmentData::Path(path) = attachment else {
                return;
            };
            match &path.vertices {
                MeshVertices::Unweighted(_) => {
                    sort_bone(skeleton, slot_bone_index, sorted, out);
                }
                MeshVertices::Weighted(vertices) => {
                    for weights in vertices {
                        for w in weights {
                            sort_bone(skeleton, w.bone, sorted, out);
                        }
                    }
                }
            }
        }

        fn sort_path_slot(
            skeleton: &Skeleton,
            skin: &crate::SkinData,
            slot_index: usize,
            slot_bone_index: usize,
            sorted: &mut [bool],
            out: &mut Vec<UpdateCacheItem>,
        ) {
            let Some(slot_map) = skin.attachments.get(slot_index) else {
                return;
            };
            for attachment in slot_map.values() {
                sort_path_attachment(skeleton, attachment, slot_bone_index, sorted, out);
            }
        }

        let out = {
            let skeleton: &Skeleton = &*self;
            let bone_count = skeleton.bones.len();
            let mut out = Vec::<UpdateCacheItem>::with_capacity(
                bone_count + skeleton.path_constraints.len(),
            );
            let mut sorted = skeleton
                .bones
                .iter()
                .map(|b| !b.active)
                .collect::<Vec<_>>();

            let current_skin_name = skeleton.skin.as_deref();
            let current_skin = current_skin_name.and_then(|n| skeleton.data.skin(n));
            let default_skin = if current_skin_name != Some("default") {
                skeleton.data.skin("default")
            } else {
                None
            };

            let mut ordered = skeleton
                .path_constraints
                .iter()
                .enumerate()
                .filter(|(_, c)| c.active)
                .map(|(index, c)| {
                    let order = skeleton
                        .data
                        .path_constraints
                        .get(c.data_index())
                        .map(|d| d.order)
                        .unwrap_or(0);
                    (order, index)
                })
                .collect::<Vec<_>>();
            ordered.sort_by_key(|&(order, _)| order);

            for (_, index) in ordered {
                let c = &skeleton.path_constraints[index];
                let Some(slot) = skeleton.slots.get(c.target) else {
                    continue;
                };
                let slot_bone_index = slot.bone;

                // Every path the slot could show must be posed before the constraint runs.
                if let Some(skin) = current_skin {
                    sort_path_slot(
                        skeleton,
                        skin,
                        c.target,
                        slot_bone_index,
                        &mut sorted,
                        &mut out,
                    );
                }
                if let Some(default_skin) = default_skin {
                    sort_path_slot(
                        skeleton,
                        default_skin,
                        c.target,
                        slot_bone_index,
                        &mut sorted,
                        &mut out,
                    );
                }
                if let Some(att) = skeleton.slot_attachment_data(c.target) {
                    sort_path_attachment(skeleton, att, slot_bone_index, &mut sorted, &mut out);
                }

                for &bone_index in &c.bones {
                    sort_bone(skeleton, bone_index, &mut sorted, &mut out);
                }
                out.push(UpdateCacheItem::Path(index));
                for &bone_index in &c.bones {
                    sort_reset_children(skeleton, bone_index, &mut sorted);
                }
                for &bone_index in &c.bones {
                    if bone_index < sorted.len() {
                        sorted[bone_index] = true;
                    }
                }
            }

            for bone_index in 0..bone_count {
                sort_bone(skeleton, bone_index, &mut sorted, &mut out);
            }

            out
        };

        self.update_cache = out;
    }

    pub fn set_skin(&mut self, skin_name: Option<&str>) -> Result<(), Error> {
        let old_skin = self.skin.clone();
        match skin_name {
            None => {
                self.skin = None;
            }
            Some(name) => {
                if !self.data.skins.contains_key(name) {
                    return Err(Error::UnknownSkin {
                        name: name.to_string(),
                    });
                }
                self.skin = Some(name.to_string());
            }
        }
        log::debug!("skin changed: {:?} -> {:?}", old_skin, self.skin);
        let new_skin = self.skin.as_deref().and_then(|n| self.data.skin(n));

        if old_skin.is_none() {
            // From no skin: setup attachments present in the new skin are attached.
            if let Some(new_skin) = new_skin {
                for (slot_index, slot) in self.slots.iter_mut().enumerate() {
                    let setup_name = self
                        .data
                        .slots
                        .get(slot_index)
                        .and_then(|s| s.attachment.as_deref());
                    let Some(setup_name) = setup_name else {
                        continue;
                    };
                    if new_skin.attachment(slot_index, setup_name).is_some() {
                        slot.attachment = Some(setup_name.to_string());
                        slot.attachment_skin = self.skin.clone();
                        slot.deform.clear();
                    }
                }
            }
        } else if let (Some(old_skin_name), Some(new_skin_name), Some(new_skin)) =
            (old_skin.as_deref(), self.skin.as_deref(), new_skin)
        {
            // Skin to skin: attachments sourced from the old skin are swapped for the new
            // skin's attachment with the same key, when it has one.
            for (slot_index, slot) in self.slots.iter_mut().enumerate() {
                let Some(current_key) = slot.attachment.as_deref() else {
                    continue;
                };
                if slot.attachment_skin.as_deref() != Some(old_skin_name) {
                    continue;
                }
                if new_skin.attachment(slot_index, current_key).is_some() {
                    slot.attachment_skin = Some(new_skin_name.to_string());
                    slot.deform.clear();
                }
            }
        }

        self.update_cache();
        Ok(())
    }

    /// Sets the slot's current attachment by key, resolving it through the current skin and
    /// the default skin. Returns `false` (and leaves the slot unchanged) when the key does not
    /// resolve.
    pub fn set_attachment(&mut self, slot_index: usize, attachment_name: Option<&str>) -> bool {
        if slot_index >= self.slots.len() {
            return false;
        }
        let Some(name) = attachment_name else {
            let slot = &mut self.slots[slot_index];
            slot.attachment = None;
            slot.attachment_skin = None;
            slot.deform.clear();
            return true;
        };
        let source_skin = match self.skin.as_deref() {
            Some(skin_name)
                if self
                    .data
                    .skin(skin_name)
                    .and_then(|s| s.attachment(slot_index, name))
                    .is_some() =>
            {
                Some(skin_name.to_string())
            }
            _ => {
                if self
                    .data
                    .skin("default")
                    .and_then(|s| s.attachment(slot_index, name))
                    .is_none()
                {
                    return false;
                }
                Some("default".to_string())
            }
        };
        let slot = &mut self.slots[slot_index];
        if slot.attachment.as_deref() != Some(name) || slot.attachment_skin != source_skin {
            slot.deform.clear();
        }
        slot.attachment = Some(name.to_string());
        slot.attachment_skin = source_skin;
        true
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    pub fn set_bones_to_setup_pose(&mut self) {
        for (i, bone) in self.bones.iter_mut().enumerate() {
            let Some(data) = self.data.bones.get(i) else {
                continue;
            };
            bone.inherit = data.inherit;
            bone.x = data.x;
            bone.y = data.y;
            bone.rotation = data.rotation;
            bone.scale_x = data.scale_x;
            bone.scale_y = data.scale_y;
            bone.shear_x = data.shear_x;
            bone.shear_y = data.shear_y;

            bone.ax = data.x;
            bone.ay = data.y;
            bone.arotation = data.rotation;
            bone.ascale_x = data.scale_x;
            bone.ascale_y = data.scale_y;
            bone.ashear_x = data.shear_x;
            bone.ashear_y = data.shear_y;
        }

        for c in &mut self.path_constraints {
            if let Some(data) = self.data.path_constraints.get(c.data_index()) {
                c.position = data.position;
                c.spacing = data.spacing;
                c.mix_rotate = data.mix_rotate;
                c.mix_x = data.mix_x;
                c.mix_y = data.mix_y;
            }
        }
    }

    pub fn set_slots_to_setup_pose(&mut self) {
        let skin_name = self.skin.as_deref();
        let skin = skin_name.and_then(|n| self.data.skin(n));
        let default_skin = if skin_name != Some("default") {
            self.data.skin("default")
        } else {
            None
        };

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let Some(data) = self.data.slots.get(i) else {
                continue;
            };
            slot.bone = data.bone;
            slot.deform.clear();

            let resolved = data.attachment.as_deref().and_then(|name| {
                if skin.and_then(|s| s.attachment(i, name)).is_some() {
                    Some((name.to_string(), skin_name.map(|n| n.to_string())))
                } else if default_skin.and_then(|s| s.attachment(i, name)).is_some() {
                    Some((name.to_string(), Some("default".to_string())))
                } else {
                    None
                }
            });
            match resolved {
                Some((key, source_skin)) => {
                    slot.attachment = Some(key);
                    slot.attachment_skin = source_skin;
                }
                None => {
                    slot.attachment = None;
                    slot.attachment_skin = None;
                }
            }
        }
    }

    /// Looks up an attachment by key in the current skin, falling back to the default skin.
    pub fn attachment(&self, slot_index: usize, attachment_name: &str) -> Option<&AttachmentData> {
        lookup_attachment(
            &self.data,
            self.skin.as_deref(),
            slot_index,
            attachment_name,
        )
    }

    pub fn slot_attachment_data(&self, slot_index: usize) -> Option<&AttachmentData> {
        let slot = self.slots.get(slot_index)?;
        slot_attachment(&self.data, self.skin.as_deref(), slot_index, slot)
    }

    /// World-space vertices of the slot's current path attachment, or `None` when the slot
    /// does not show a path.
    pub fn slot_path_world_vertices(&self, slot_index: usize) -> Option<Vec<f32>> {
        let AttachmentData::Path(path) = self.slot_attachment_data(slot_index)? else {
            return None;
        };
        let world_vertices_length = path.vertices.world_vertices_length();
        let mut out = vec![0.0f32; world_vertices_length];
        self.compute_world_vertices(
            slot_index,
            &path.vertices,
            0,
            world_vertices_length,
            &mut out,
            0,
            2,
        );
        Some(out)
    }

    /// Poses every active bone and applies active path constraints in update-cache order.
    pub fn update_world_transform(&mut self) {
        self.reset_applied_transforms();

        let cache = std::mem::take(&mut self.update_cache);
        for item in cache.iter().copied() {
            match item {
                UpdateCacheItem::Bone(bone_index) => self.update_bone_world_transform(bone_index),
                UpdateCacheItem::Path(index) => {
                    self.apply_path_constraint(index);
                }
            }
        }
        self.update_cache = cache;
    }

    fn reset_applied_transforms(&mut self) {
        for bone in &mut self.bones {
            bone.ax = bone.x;
            bone.ay = bone.y;
            bone.arotation = bone.rotation;
            bone.ascale_x = bone.scale_x;
            bone.ascale_y = bone.scale_y;
            bone.ashear_x = bone.shear_x;
            bone.ashear_y = bone.shear_y;
        }
    }

    fn update_bone_world_transform(&mut self, bone_index: usize) {
        if bone_index >= self.bones.len() || !self.bones[bone_index].active {
            return;
        }

        let parent_index = self.bones[bone_index].parent;
        if let Some(parent_index) = parent_index {
            if parent_index >= self.bones.len() || !self.bones[parent_index].active {
                return;
            }

            let parent = {
                let p = &self.bones[parent_index];
                ParentTransform {
                    a: p.a,
                    b: p.b,
                    c: p.c,
                    d: p.d,
                    world_x: p.world_x,
                    world_y: p.world_y,
                }
            };
            update_world_transform_child(
                &mut self.bones[bone_index],
                self.scale_x,
                self.scale_y,
                &parent,
            );
        } else {
            update_world_transform_root(
                &mut self.bones[bone_index],
                self.x,
                self.y,
                self.scale_x,
                self.scale_y,
            );
        }
    }

    /// Recomputes a bone's applied (local) transform from its current world transform.
    ///
    /// Called after a constraint writes world values directly so later bones see a consistent
    /// local pose.
    pub fn update_applied_transform(&mut self, bone_index: usize) {
        if bone_index >= self.bones.len() {
            return;
        }

        let bone_count = self.bones.len();
        let parent = self.bones[bone_index].parent.filter(|&p| p < bone_count);
        let Some(parent_index) = parent else {
            let (a, b, c0, d, wx, wy) = {
                let bone = &self.bones[bone_index];
                (bone.a, bone.b, bone.c, bone.d, bone.world_x, bone.world_y)
            };
            let bone = &mut self.bones[bone_index];
            bone.ax = wx - self.x;
            bone.ay = wy - self.y;
            bone.arotation = c0.atan2(a).to_degrees();
            bone.ascale_x = (a * a + c0 * c0).sqrt();
            bone.ascale_y = (b * b + d * d).sqrt();
            bone.ashear_x = 0.0;
            bone.ashear_y = (a * b + c0 * d).atan2(a * d - b * c0).to_degrees();
            return;
        };

        let (pa, mut pb, pc, mut pd, pwx, pwy) = {
            let p = &self.bones[parent_index];
            (p.a, p.b, p.c, p.d, p.world_x, p.world_y)
        };
        let det = pa * pd - pb * pc;
        let mut pid = 1.0 / det;
        let mut ia = pd * pid;
        let mut ib = pb * pid;
        let mut ic = pc * pid;
        let mut id = pa * pid;

        let (a, b, c0, d, wx, wy, inherit, applied_rotation_deg) = {
            let bone = &self.bones[bone_index];
            (
                bone.a,
                bone.b,
                bone.c,
                bone.d,
                bone.world_x,
                bone.world_y,
                bone.inherit,
                bone.arotation,
            )
        };

        let dx = wx - pwx;
        let dy = wy - pwy;
        let ax = dx * ia - dy * ib;
        let ay = dy * id - dx * ic;

        let (ra, rb, rc, rd) = if inherit == crate::Inherit::OnlyTranslation {
            (a, b, c0, d)
        } else {
            match inherit {
                crate::Inherit::NoRotationOrReflection => {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc);
                    pb = -pc * self.scale_x * s / self.scale_y;
                    pd = pa * self.scale_y * s / self.scale_x;
                    pid = 1.0 / (pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                }
                crate::Inherit::NoScale | crate::Inherit::NoScaleOrReflection => {
                    let r = applied_rotation_deg.to_radians();
                    let cos = r.cos();
                    let sin = r.sin();
                    let mut pa = (pa * cos + pb * sin) / self.scale_x;
                    let mut pc = (pc * cos + pd * sin) / self.scale_y;
                    let mut s = (pa * pa + pc * pc).sqrt();
                    if s > 1.0e-5 {
                        s = 1.0 / s;
                    }
                    pa *= s;
                    pc *= s;
                    s = (pa * pa + pc * pc).sqrt();
                    if inherit == crate::Inherit::NoScale {
                        let flip = (det < 0.0) != ((self.scale_x < 0.0) != (self.scale_y < 0.0));
                        if flip {
                            s = -s;
                        }
                    }
                    let r = std::f32::consts::FRAC_PI_2 + pc.atan2(pa);
                    pb = r.cos() * s;
                    pd = r.sin() * s;
                    pid = 1.0 / (pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                    ic = pc * pid;
                    id = pa * pid;
                }
                _ => {}
            }

            (
                ia * a - ib * c0,
                ia * b - ib * d,
                id * c0 - ic * a,
                id * d - ic * b,
            )
        };

        let mut ascale_x = (ra * ra + rc * rc).sqrt();
        let (arotation, ascale_y, ashear_y) = if ascale_x > 1.0e-4 {
            let det2 = ra * rd - rb * rc;
            let ascale_y = det2 / ascale_x;
            let ashear_y = -(ra * rb + rc * rd).atan2(det2).to_degrees();
            let arotation = rc.atan2(ra).to_degrees();
            (arotation, ascale_y, ashear_y)
        } else {
            ascale_x = 0.0;
            let ascale_y = (rb * rb + rd * rd).sqrt();
            let arotation = 90.0 - rd.atan2(rb).to_degrees();
            (arotation, ascale_y, 0.0)
        };

        let bone = &mut self.bones[bone_index];
        bone.ax = ax;
        bone.ay = ay;
        bone.arotation = arotation;
        bone.ascale_x = ascale_x;
        bone.ascale_y = ascale_y;
        bone.ashear_x = 0.0;
        bone.ashear_y = ashear_y;
    }

    /// Transforms `count` floats of `vertices`, starting at float `start`, into world space.
    ///
    /// Output is written at `offset` with `stride` floats per vertex. Unweighted vertices use
    /// the slot bone (and the slot's deform offsets when present); weighted vertices blend
    /// their bones.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn compute_world_vertices(
        &self,
        slot_index: usize,
        vertices: &MeshVertices,
        start: usize,
        count: usize,
        world_vertices: &mut Vec<f32>,
        offset: usize,
        stride: usize,
    ) {
        let Some(slot) = self.slots.get(slot_index) else {
            return;
        };
        let Some(bone) = self.bones.get(slot.bone) else {
            return;
        };

        let start_vertex = start / 2;
        let vertex_count = count / 2;
        let out_end = offset + vertex_count * stride;
        if world_vertices.len() < out_end {
            world_vertices.resize(out_end, 0.0);
        }

        match vertices {
            MeshVertices::Unweighted(v) => {
                if start_vertex >= v.len() {
                    return;
                }
                let n = vertex_count.min(v.len() - start_vertex);
                let deform = slot.deform.as_slice();
                let use_deform = deform.len() >= v.len() * 2;
                for i in 0..n {
                    let vi = start_vertex + i;
                    let (vx, vy) = if use_deform {
                        (deform[vi * 2], deform[vi * 2 + 1])
                    } else {
                        (v[vi][0], v[vi][1])
                    };
                    let w = offset + i * stride;
                    world_vertices[w] = vx * bone.a + vy * bone.b + bone.world_x;
                    world_vertices[w + 1] = vx * bone.c + vy * bone.d + bone.world_y;
                }
            }
            MeshVertices::Weighted(v) => {
                if start_vertex >= v.len() {
                    return;
                }
                let n = vertex_count.min(v.len() - start_vertex);

                let skip_weights = v[..start_vertex].iter().map(|w| w.len()).sum::<usize>();
                let mut f = skip_weights * 2;
                let deform = slot.deform.as_slice();

                for i in 0..n {
                    let mut wx = 0.0f32;
                    let mut wy = 0.0f32;
                    for wgt in &v[start_vertex + i] {
                        let dx = deform.get(f).copied().unwrap_or(0.0);
                        let dy = deform.get(f + 1).copied().unwrap_or(0.0);
                        f += 2;
                        let Some(b) = self.bones.get(wgt.bone) else {
                            continue;
                        };
                        let [x, y] = b.local_to_world(wgt.x + dx, wgt.y + dy);
                        wx += x * wgt.weight;
                        wy += y * wgt.weight;
                    }
                    let w = offset + i * stride;
                    world_vertices[w] = wx;
                    world_vertices[w + 1] = wy;
                }
            }
        }
    }
}

/// Resolves a slot's current attachment without borrowing the whole skeleton, so callers can
/// keep the result while mutating bones.
pub(crate) fn slot_attachment<'a>(
    data: &'a SkeletonData,
    skin_name: Option<&str>,
    slot_index: usize,
    slot: &Slot,
) -> Option<&'a AttachmentData> {
    let key = slot.attachment.as_deref()?;

    if let Some(source_skin) = slot.attachment_skin.as_deref() {
        if let Some(att) = data
            .skin(source_skin)
            .and_then(|skin| skin.attachment(slot_index, key))
        {
            return Some(att);
        }
    }

    lookup_attachment(data, skin_name, slot_index, key)
}

fn lookup_attachment<'a>(
    data: &'a SkeletonData,
    skin_name: Option<&str>,
    slot_index: usize,
    attachment_name: &str,
) -> Option<&'a AttachmentData> {
    if let Some(att) = skin_name
        .and_then(|n| data.skin(n))
        .and_then(|skin| skin.attachment(slot_index, attachment_name))
    {
        return Some(att);
    }
    if skin_name == Some("default") {
        return None;
    }
    data.skin("default")
        .and_then(|skin| skin.attachment(slot_index, attachment_name))
}

#[derive(Copy, Clone, Debug)]
struct ParentTransform {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    world_x: f32,
    world_y: f32,
}

fn update_world_transform_root(bone: &mut Bone, x: f32, y: f32, scale_x: f32, scale_y: f32) {
    let rotation_x = (bone.arotation + bone.ashear_x).to_radians();
    let rotation_y = (bone.arotation + 90.0 + bone.ashear_y).to_radians();
    let la = rotation_x.cos() * bone.ascale_x;
    let lb = rotation_y.cos() * bone.ascale_y;
    let lc = rotation_x.sin() * bone.ascale_x;
    let ld = rotation_y.sin() * bone.ascale_y;

    bone.a = la * scale_x;
    bone.b = lb * scale_x;
    bone.c = lc * scale_y;
    bone.d = ld * scale_y;
    bone.world_x = bone.ax * scale_x + x;
    bone.world_y = bone.ay * scale_y + y;
}

fn update_world_transform_child(
    bone: &mut Bone,
    skeleton_scale_x: f32,
    skeleton_scale_y: f32,
    parent: &ParentTransform,
) {
    let mut pa = parent.a;
    let mut pb = parent.b;
    let mut pc = parent.c;
    let mut pd = parent.d;

    bone.world_x = pa * bone.ax + pb * bone.ay + parent.world_x;
    bone.world_y = pc * bone.ax + pd * bone.ay + parent.world_y;

    match bone.inherit {
        crate::Inherit::Normal => {
            let rotation_x = (bone.arotation + bone.ashear_x).to_radians();
            let rotation_y = (bone.arotation + 90.0 + bone.ashear_y).to_radians();
            let la = rotation_x.cos() * bone.ascale_x;
            let lb = rotation_y.cos() * bone.ascale_y;
            let lc = rotation_x.sin() * bone.ascale_x;
            let ld = rotation_y.sin() * bone.ascale_y;

            bone.a = pa * la + pb * lc;
            bone.b = pa * lb + pb * ld;
            bone.c = pc * la + pd * lc;
            bone.d = pc * lb + pd * ld;
        }
        crate::Inherit::OnlyTranslation => {
            let rotation_x = (bone.arotation + bone.ashear_x).to_radians();
            let rotation_y = (bone.arotation + 90.0 + bone.ashear_y).to_radians();
            bone.a = rotation_x.cos() * bone.ascale_x * skeleton_scale_x;
            bone.b = rotation_y.cos() * bone.ascale_y * skeleton_scale_x;
            bone.c = rotation_x.sin() * bone.ascale_x * skeleton_scale_y;
            bone.d = rotation_y.sin() * bone.ascale_y * skeleton_scale_y;
        }
        crate::Inherit::NoRotationOrReflection => {
            let sx = if skeleton_scale_x.abs() > 1.0e-12 {
                1.0 / skeleton_scale_x
            } else {
                0.0
            };
            let sy = if skeleton_scale_y.abs() > 1.0e-12 {
                1.0 / skeleton_scale_y
            } else {
                0.0
            };
            pa *= sx;
            pc *= sy;

            let mut s = pa * pa + pc * pc;
            let prx;
            if s > 1.0e-4 {
                s = (pa * pd * sy - pb * sx * pc).abs() / s;
                pb = pc * s;
                pd = pa * s;
                prx = pc.atan2(pa).to_degrees();
            } else {
                pa = 0.0;
                pc = 0.0;
                prx = 90.0 - pd.atan2(pb).to_degrees();
            }

            let rotation_x = (bone.arotation + bone.ashear_x - prx).to_radians();
            let rotation_y = (bone.arotation + bone.ashear_y - prx + 90.0).to_radians();
            let la = rotation_x.cos() * bone.ascale_x;
            let lb = rotation_y.cos() * bone.ascale_y;
            let lc = rotation_x.sin() * bone.ascale_x;
            let ld = rotation_y.sin() * bone.ascale_y;

            bone.a = (pa * la - pb * lc) * skeleton_scale_x;
            bone.b = (pa * lb - pb * ld) * skeleton_scale_x;
            bone.c = (pc * la + pd * lc) * skeleton_scale_y;
            bone.d = (pc * lb + pd * ld) * skeleton_scale_y;
        }
        crate::Inherit::NoScale | crate::Inherit::NoScaleOrReflection => {
            let mut rotation = bone.arotation.to_radians();
            let cos = rotation.cos();
            let sin = rotation.sin();

            let za = (pa * cos + pb * sin) / skeleton_scale_x;
            let zc = (pc * cos + pd * sin) / skeleton_scale_y;
            let mut s = (za * za + zc * zc).sqrt();
            if s > 1.0e-5 {
                s = 1.0 / s;
            }
            let za = za * s;
            let zc = zc * s;

            let mut s2 = (za * za + zc * zc).sqrt();
            if bone.inherit == crate::Inherit::NoScale {
                let det = pa * pd - pb * pc;
                let flip = (det < 0.0) != ((skeleton_scale_x < 0.0) != (skeleton_scale_y < 0.0));
                if flip {
                    s2 = -s2;
                }
            }

            rotation = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
            let zb = rotation.cos() * s2;
            let zd = rotation.sin() * s2;

            let shear_x = bone.ashear_x.to_radians();
            let shear_y = (90.0 + bone.ashear_y).to_radians();
            let la = shear_x.cos() * bone.ascale_x;
            let lb = shear_y.cos() * bone.ascale_y;
            let lc = shear_x.sin() * bone.ascale_x;
            let ld = shear_y.sin() * bone.ascale_y;

            bone.a = (za * la + zb * lc) * skeleton_scale_x;
            bone.b = (za * lb + zb * ld) * skeleton_scale_x;
            bone.c = (zc * la + zd * lc) * skeleton_scale_y;
            bone.d = (zc * lb + zd * ld) * skeleton_scale_y;
        }
    }
}

fn build_bone_children_indices(bones: &[Bone]) -> Vec<Vec<usize>> {
    let mut children = vec![Vec::<usize>::new(); bones.len()];
    for (index, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent {
            if parent < children.len() {
                children[parent].push(index);
            }
        }
    }
    children
}
