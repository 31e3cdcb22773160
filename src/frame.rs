//! The frame, a foundational concept in robotics: a rigid coordinate system
//! with a pose relative to its anchor. Every entity of the kinematic tree
//! (the robot base, each joint, each tool) carries one.
//!
//! A frame stores two poses: the local pose relative to whatever the frame
//! is anchored on, and a cached world pose maintained by
//! [`Robot::update_frames`](crate::robot::Robot::update_frames). Mutating
//! the local pose marks the frame dirty; the next tree refresh recomputes
//! the cached pose of the frame and of everything anchored downstream of
//! it. The cache is only ever mutated through `&mut Robot`, so the
//! single-writer contract is enforced by the borrow checker rather than by
//! interior mutability.

use crate::kinematic_traits::Pose;

/// A named coordinate system with a local pose and a cached world pose.
#[derive(Debug, Clone)]
pub struct Frame {
    name: String,
    id: usize,
    local: Pose,
    world: Pose,
    dirty: bool,
}

impl Frame {
    /// Creates a frame with the given anchor-relative pose. The world pose
    /// is undefined until the owning robot refreshes its tree.
    pub fn new(name: impl Into<String>, local: Pose) -> Self {
        Frame {
            name: name.into(),
            id: 0,
            local,
            world: Pose::identity(),
            dirty: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dense id assigned by the owning robot: the global joint id for joint
    /// frames, the linkage index for tool frames.
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    /// Pose of this frame relative to its anchor.
    pub fn local(&self) -> &Pose {
        &self.local
    }

    /// Replaces the anchor-relative pose and marks the frame stale.
    pub fn set_local(&mut self, local: Pose) {
        self.local = local;
        self.dirty = true;
    }

    /// Cached world pose. Valid once the owning robot has refreshed its
    /// frames after the last mutation.
    pub fn world(&self) -> &Pose {
        &self.world
    }

    pub(crate) fn set_world(&mut self, world: Pose) {
        self.world = world;
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Pose of this frame expressed in `other`'s coordinates, computed from
    /// the cached world poses.
    pub fn pose_in(&self, other: &Frame) -> Pose {
        other.world.inverse() * self.world
    }
}
