//! Per-entity local transforms with lazily cached world matrices.
//!
//! Local setters only mark the entity's subtree dirty. The world matrix is
//! rebuilt on read, walking up to the nearest clean ancestor and composing
//! back down, so repeated reads of an unchanged hierarchy cost nothing.

use smallvec::SmallVec;

use crate::ecs::{Entity, World};
use crate::error::EcsResult;
use crate::math::{euler_from_quat, quat_from_euler, Mat4, Quat, Vec3};

/// Local position/rotation/scale plus the cached world matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityTransform {
    pub(crate) position: Vec3,
    pub(crate) rotation: Quat,
    pub(crate) scale: Vec3,
    pub(crate) world: Mat4,
    pub(crate) dirty: bool,
}

impl Default for EntityTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            world: Mat4::IDENTITY,
            dirty: true,
        }
    }
}

impl EntityTransform {
    #[inline]
    pub fn local_position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn local_rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    pub fn local_scale(&self) -> Vec3 {
        self.scale
    }

    /// Local rotation as (pitch, yaw, roll) radians.
    pub fn local_euler(&self) -> Vec3 {
        euler_from_quat(self.rotation)
    }

    /// Scale, then rotate, then translate.
    #[inline]
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The cached world matrix, if it is current.
    pub fn cached_world(&self) -> Option<Mat4> {
        (!self.dirty).then_some(self.world)
    }

    /// Same local values, cache invalidated.
    pub(crate) fn detached(&self) -> Self {
        Self {
            world: Mat4::IDENTITY,
            dirty: true,
            ..*self
        }
    }
}

impl World {
    pub fn transform(&self, e: Entity) -> Option<&EntityTransform> {
        self.entity_data(e)?;
        self.transforms.get(e.index() as usize)
    }

    fn transform_mut(&mut self, e: Entity) -> EcsResult<&mut EntityTransform> {
        self.live(e)?;
        Ok(&mut self.transforms[e.index() as usize])
    }

    pub fn set_local_position(&mut self, e: Entity, position: Vec3) -> EcsResult<()> {
        self.transform_mut(e)?.position = position;
        self.mark_subtree_dirty(e);
        Ok(())
    }

    pub fn set_local_rotation(&mut self, e: Entity, rotation: Quat) -> EcsResult<()> {
        self.transform_mut(e)?.rotation = rotation.normalize();
        self.mark_subtree_dirty(e);
        Ok(())
    }

    /// Set the local rotation from (pitch, yaw, roll) radians.
    pub fn set_euler_rotation(&mut self, e: Entity, euler: Vec3) -> EcsResult<()> {
        self.set_local_rotation(e, quat_from_euler(euler))
    }

    pub fn set_local_scale(&mut self, e: Entity, scale: Vec3) -> EcsResult<()> {
        self.transform_mut(e)?.scale = scale;
        self.mark_subtree_dirty(e);
        Ok(())
    }

    pub fn set_local_transform(
        &mut self,
        e: Entity,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> EcsResult<()> {
        let t = self.transform_mut(e)?;
        t.position = position;
        t.rotation = rotation.normalize();
        t.scale = scale;
        self.mark_subtree_dirty(e);
        Ok(())
    }

    pub fn local_position(&self, e: Entity) -> Option<Vec3> {
        self.transform(e).map(EntityTransform::local_position)
    }

    pub fn local_rotation(&self, e: Entity) -> Option<Quat> {
        self.transform(e).map(EntityTransform::local_rotation)
    }

    pub fn local_euler(&self, e: Entity) -> Option<Vec3> {
        self.transform(e).map(EntityTransform::local_euler)
    }

    pub fn local_scale(&self, e: Entity) -> Option<Vec3> {
        self.transform(e).map(EntityTransform::local_scale)
    }

    /// World matrix of `e`, recomputing stale ancestors on the way.
    pub fn world_matrix(&mut self, e: Entity) -> EcsResult<Mat4> {
        self.live(e)?;
        Ok(self.resolve_world(e))
    }

    pub fn world_position(&mut self, e: Entity) -> EcsResult<Vec3> {
        Ok(self.world_matrix(e)?.w_axis.truncate())
    }

    pub fn world_rotation(&mut self, e: Entity) -> EcsResult<Quat> {
        let (_, rotation, _) = self.world_matrix(e)?.to_scale_rotation_translation();
        Ok(rotation)
    }

    /// World rotation as (pitch, yaw, roll) radians.
    pub fn world_euler(&mut self, e: Entity) -> EcsResult<Vec3> {
        Ok(euler_from_quat(self.world_rotation(e)?))
    }

    pub fn world_scale(&mut self, e: Entity) -> EcsResult<Vec3> {
        let (scale, _, _) = self.world_matrix(e)?.to_scale_rotation_translation();
        Ok(scale)
    }

    pub fn is_transform_dirty(&self, e: Entity) -> bool {
        self.transform(e).is_some_and(EntityTransform::is_dirty)
    }

    pub fn cached_world_matrix(&self, e: Entity) -> Option<Mat4> {
        self.transform(e)?.cached_world()
    }

    /// Number of world matrices rebuilt since the world was created.
    #[inline]
    pub fn transform_recompute_count(&self) -> u64 {
        self.recomputes
    }

    pub(crate) fn mark_subtree_dirty(&mut self, e: Entity) {
        let range = self.rec(e).subtree();
        for &member in &self.hierarchy[range] {
            self.transforms[member.index() as usize].dirty = true;
        }
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        for t in &mut self.transforms {
            t.dirty = true;
        }
    }

    fn resolve_world(&mut self, e: Entity) -> Mat4 {
        let mut chain: SmallVec<[Entity; 16]> = SmallVec::new();
        let mut cursor = e;
        while !cursor.is_null() && self.transforms[cursor.index() as usize].dirty {
            chain.push(cursor);
            cursor = self.rec(cursor).parent;
        }

        let mut parent_world = cursor
            .non_null()
            .map(|clean| self.transforms[clean.index() as usize].world);
        for &node in chain.iter().rev() {
            let t = &mut self.transforms[node.index() as usize];
            let local = t.local_matrix();
            t.world = match parent_world {
                Some(parent) => parent * local,
                None => local,
            };
            t.dirty = false;
            parent_world = Some(t.world);
            self.recomputes += 1;
        }
        self.transforms[e.index() as usize].world
    }
}
