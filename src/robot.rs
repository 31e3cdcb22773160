//! The robot: a tree of linkages over a base frame, with flat registries
//! for name and index lookup, and the forward kinematics updater.
//!
//! The robot exclusively owns its linkages as an arena; parent references
//! are integer indices into that arena, so the tree carries no pointer
//! cycles and bulk value updates borrow cleanly. Linkages are stored in
//! topological order (every linkage after its parent), which lets the
//! forward kinematics updater run as a single left-to-right pass.
//!
//! Construction is two-phase: [`Robot::add_linkage`] stages a linkage with
//! an unresolved parent reference, and [`Robot::finalize`] orders the tree,
//! resolves parents and assigns dense linkage indices and global joint ids.
//! Queries that need fresh poses finalize and refresh implicitly.

use std::collections::HashMap;

use nalgebra::{DVector, Vector3};

use crate::frame::Frame;
use crate::joint::Joint;
use crate::kinematic_traits::{FrameRef, Pose};
use crate::linkage::Linkage;
use crate::model_error::ModelError;

/// Unresolved parent of a staged linkage.
#[derive(Debug, Clone)]
enum ParentRef {
    Base,
    Index(usize),
    Name(String),
}

/// A tree of linkages rooted at a base frame.
#[derive(Debug)]
pub struct Robot {
    name: String,
    base: Frame,
    root_mass: f64,
    root_com: Vector3<f64>,
    linkages: Vec<Linkage>,
    linkage_names: HashMap<String, usize>,
    joint_names: HashMap<String, usize>,
    /// Global joint id to (linkage index, joint index within linkage).
    joint_locations: Vec<(usize, usize)>,
    staged: Vec<(Linkage, ParentRef)>,
    initializing: bool,
}

impl Robot {
    /// Creates an empty robot whose base frame has the given world pose.
    pub fn new(name: impl Into<String>, base_pose: Pose) -> Self {
        Robot {
            name: name.into(),
            base: Frame::new("base", base_pose),
            root_mass: 0.0,
            root_com: Vector3::zeros(),
            linkages: Vec::new(),
            linkage_names: HashMap::new(),
            joint_names: HashMap::new(),
            joint_locations: Vec::new(),
            staged: Vec::new(),
            initializing: false,
        }
    }

    /// Builds a robot from linkages and their parent indices, where index
    /// -1 anchors a linkage on the base and any other value refers to a
    /// position in the input vector. The linkages are reordered so that
    /// every linkage appears after its parent.
    pub fn from_linkages(
        name: impl Into<String>,
        base_pose: Pose,
        linkages: Vec<Linkage>,
        parent_indices: &[isize],
    ) -> Result<Self, ModelError> {
        if linkages.len() != parent_indices.len() {
            return Err(ModelError::ValueCountMismatch {
                expected: linkages.len(),
                found: parent_indices.len(),
            });
        }
        let mut robot = Robot::new(name, base_pose);
        for (linkage, &parent) in linkages.into_iter().zip(parent_indices.iter()) {
            let parent = if parent < 0 {
                ParentRef::Base
            } else {
                ParentRef::Index(parent as usize)
            };
            robot.staged.push((linkage, parent));
            robot.initializing = true;
        }
        robot.finalize()?;
        Ok(robot)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages a linkage under the named parent (`None` anchors it on the
    /// base). Id assignment is deferred to the next [`finalize`], so the
    /// parent may itself still be unregistered.
    ///
    /// [`finalize`]: Robot::finalize
    pub fn add_linkage(&mut self, parent: Option<&str>, linkage: Linkage) {
        let parent = match parent {
            None => ParentRef::Base,
            Some(name) => ParentRef::Name(name.to_string()),
        };
        self.staged.push((linkage, parent));
        self.initializing = true;
    }

    /// Stages a linkage under the parent at the given index in the combined
    /// (registered + staged) input order; a negative index anchors it on
    /// the base.
    pub fn add_linkage_at(&mut self, parent_index: isize, linkage: Linkage) {
        let parent = if parent_index < 0 {
            ParentRef::Base
        } else {
            ParentRef::Index(parent_index as usize)
        };
        self.staged.push((linkage, parent));
        self.initializing = true;
    }

    /// Resolves staged linkages, orders the tree and rebuilds the
    /// registries.
    ///
    /// Ordering is a stable drain: linkages whose parent is already placed
    /// are emitted in input order, repeatedly, until the input is empty. A
    /// pass that places nothing means the parent graph has a cycle. After
    /// ordering, linkage indices are dense positions in the new order and
    /// global joint ids run sequentially across it.
    pub fn finalize(&mut self) -> Result<(), ModelError> {
        let total = self.linkages.len() + self.staged.len();

        // Snapshot names and parent references in combined input order.
        let mut names: Vec<String> = Vec::with_capacity(total);
        let mut parents: Vec<ParentRef> = Vec::with_capacity(total);
        for linkage in &self.linkages {
            names.push(linkage.name().to_string());
            parents.push(match linkage.parent_index() {
                None => ParentRef::Base,
                Some(p) => ParentRef::Index(p),
            });
        }
        for (linkage, parent) in &self.staged {
            names.push(linkage.name().to_string());
            parents.push(parent.clone());
        }

        let mut name_positions: HashMap<&str, usize> = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            if name_positions.insert(name.as_str(), i).is_some() {
                return Err(ModelError::DuplicateLinkageName(name.clone()));
            }
        }

        // Joint names must be unique across the whole robot.
        let mut joint_name_check: HashMap<&str, ()> = HashMap::new();
        let all_joints = self
            .linkages
            .iter()
            .chain(self.staged.iter().map(|(l, _)| l))
            .flat_map(|l| l.joints().iter());
        for joint in all_joints {
            if joint_name_check.insert(joint.name(), ()).is_some() {
                return Err(ModelError::DuplicateJointName(joint.name().to_string()));
            }
        }

        // Resolve parent references to input positions.
        let mut parent_positions: Vec<Option<usize>> = Vec::with_capacity(total);
        for (i, parent) in parents.iter().enumerate() {
            match parent {
                ParentRef::Base => parent_positions.push(None),
                ParentRef::Index(p) => {
                    if *p >= total {
                        return Err(ModelError::ParentOutOfRange {
                            linkage: names[i].clone(),
                            parent: *p,
                        });
                    }
                    parent_positions.push(Some(*p));
                }
                ParentRef::Name(parent_name) => match name_positions.get(parent_name.as_str()) {
                    Some(&p) => parent_positions.push(Some(p)),
                    None => {
                        return Err(ModelError::UnknownParent {
                            linkage: names[i].clone(),
                            parent: parent_name.clone(),
                        })
                    }
                },
            }
        }

        // Stable drain: emit, in input order, everything whose parent is
        // already emitted. A pass without progress is a cycle.
        let mut order: Vec<usize> = Vec::with_capacity(total);
        let mut emitted = vec![false; total];
        while order.len() < total {
            let placed_before = order.len();
            for i in 0..total {
                if emitted[i] {
                    continue;
                }
                let ready = match parent_positions[i] {
                    None => true,
                    Some(p) => emitted[p],
                };
                if ready {
                    emitted[i] = true;
                    order.push(i);
                }
            }
            if order.len() == placed_before {
                return Err(ModelError::CyclicParentGraph);
            }
        }

        // Commit: reorder the arena and remap parent indices.
        let mut pool: Vec<Option<Linkage>> = self
            .linkages
            .drain(..)
            .chain(self.staged.drain(..).map(|(l, _)| l))
            .map(Some)
            .collect();
        let mut old_to_new = vec![0usize; total];
        for (new_index, &old_index) in order.iter().enumerate() {
            old_to_new[old_index] = new_index;
        }
        let mut reordered: Vec<Linkage> = Vec::with_capacity(total);
        for &old_index in &order {
            let mut linkage = pool[old_index].take().expect("each input emitted once");
            linkage.set_index(reordered.len());
            linkage.set_parent(parent_positions[old_index].map(|p| old_to_new[p]));
            reordered.push(linkage);
        }
        self.linkages = reordered;

        self.linkage_names.clear();
        self.joint_names.clear();
        self.joint_locations.clear();
        for (linkage_index, linkage) in self.linkages.iter_mut().enumerate() {
            self.linkage_names
                .insert(linkage.name().to_string(), linkage_index);
            for (joint_index, joint) in linkage.joints_mut().iter_mut().enumerate() {
                let global_id = self.joint_locations.len();
                self.joint_names.insert(joint.name().to_string(), global_id);
                joint.frame_mut().set_id(global_id);
                joint.frame_mut().mark_dirty();
                self.joint_locations.push((linkage_index, joint_index));
            }
            linkage.tool_mut().frame_mut().set_id(linkage_index);
            linkage.tool_mut().frame_mut().mark_dirty();
        }
        self.base.mark_dirty();
        self.initializing = false;
        Ok(())
    }

    pub(crate) fn ensure_finalized(&mut self) -> Result<(), ModelError> {
        if self.initializing {
            self.finalize()
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    pub fn n_linkages(&self) -> usize {
        self.linkages.len()
    }

    pub fn n_joints(&self) -> usize {
        self.joint_locations.len()
    }

    pub fn linkages(&self) -> &[Linkage] {
        &self.linkages
    }

    pub fn linkage(&self, index: usize) -> Option<&Linkage> {
        self.linkages.get(index)
    }

    pub fn linkage_named(&self, name: &str) -> Option<&Linkage> {
        self.linkage_index(name).map(|i| &self.linkages[i])
    }

    pub fn linkage_index(&self, name: &str) -> Option<usize> {
        self.linkage_names.get(name).copied()
    }

    pub fn joint(&self, id: usize) -> Option<&Joint> {
        self.joint_locations
            .get(id)
            .map(|&(l, j)| &self.linkages[l].joints()[j])
    }

    pub fn joint_named(&self, name: &str) -> Option<&Joint> {
        self.joint_index(name).and_then(|id| self.joint(id))
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joint_names.get(name).copied()
    }

    fn joint_mut(&mut self, id: usize) -> Option<&mut Joint> {
        let &(l, j) = self.joint_locations.get(id)?;
        Some(&mut self.linkages[l].joints_mut()[j])
    }

    // ------------------------------------------------------------------
    // Base frame and root link
    // ------------------------------------------------------------------

    pub fn base(&self) -> &Frame {
        &self.base
    }

    /// Moves the robot base in the world. Everything downstream refreshes
    /// on the next frame update.
    pub fn set_base_pose(&mut self, pose: Pose) {
        self.base.set_local(pose);
    }

    /// Inertial properties of the root link (the structure below the first
    /// joints), with the center of mass expressed in the base frame.
    pub fn set_root_inertial(&mut self, mass: f64, com: Vector3<f64>) {
        self.root_mass = mass;
        self.root_com = com;
    }

    pub fn root_mass(&self) -> f64 {
        self.root_mass
    }

    pub fn root_com(&self) -> &Vector3<f64> {
        &self.root_com
    }

    // ------------------------------------------------------------------
    // Joint values
    // ------------------------------------------------------------------

    /// All joint values in global id order.
    pub fn values(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.joint_locations.len(),
            self.joint_locations
                .iter()
                .map(|&(l, j)| self.linkages[l].joints()[j].value()),
        )
    }

    /// Writes all joint values in global id order.
    pub fn set_values(&mut self, values: &DVector<f64>) -> Result<(), ModelError> {
        if values.len() != self.joint_locations.len() {
            return Err(ModelError::ValueCountMismatch {
                expected: self.joint_locations.len(),
                found: values.len(),
            });
        }
        for id in 0..values.len() {
            let value = values[id];
            self.joint_mut(id).expect("dense ids").set_value(value);
        }
        Ok(())
    }

    pub fn set_joint_value(&mut self, id: usize, value: f64) -> Result<(), ModelError> {
        self.joint_mut(id)
            .map(|joint| joint.set_value(value))
            .ok_or(ModelError::JointIndexOutOfRange(id))
    }

    pub fn set_joint_value_named(&mut self, name: &str, value: f64) -> Result<(), ModelError> {
        let id = self
            .joint_index(name)
            .ok_or_else(|| ModelError::UnknownJoint(name.to_string()))?;
        self.set_joint_value(id, value)
    }

    /// Vectorised write of one linkage's joint values.
    pub fn set_linkage_values(&mut self, name: &str, values: &[f64]) -> Result<(), ModelError> {
        let index = self
            .linkage_index(name)
            .ok_or_else(|| ModelError::UnknownLinkage(name.to_string()))?;
        self.linkages[index].set_values(values)
    }

    /// Writes values for an ordered chain of global joint ids, reading the
    /// clamped values back into `values`.
    pub(crate) fn set_chain_values(&mut self, joint_ids: &[usize], values: &mut DVector<f64>) {
        for (k, &id) in joint_ids.iter().enumerate() {
            let joint = self.joint_mut(id).expect("ids validated by caller");
            joint.set_value(values[k]);
            values[k] = joint.value();
        }
    }

    /// Replaces the anchor-relative pose of a joint's frame.
    pub fn set_joint_local(&mut self, id: usize, local: Pose) -> Result<(), ModelError> {
        self.joint_mut(id)
            .map(|joint| joint.frame_mut().set_local(local))
            .ok_or(ModelError::JointIndexOutOfRange(id))
    }

    /// Replaces the tool offset of a linkage.
    pub fn set_tool_local(&mut self, linkage_index: usize, local: Pose) -> Result<(), ModelError> {
        self.linkages
            .get_mut(linkage_index)
            .map(|l| l.tool_mut().frame_mut().set_local(local))
            .ok_or(ModelError::LinkageIndexOutOfRange(linkage_index))
    }

    // ------------------------------------------------------------------
    // Forward kinematics
    // ------------------------------------------------------------------

    /// Refreshes the cached world poses, walking the linkages in
    /// topological order. Only frames downstream of a mutation are
    /// recomputed; calling this twice in a row leaves every cached pose
    /// byte-identical. O(total joint count).
    pub fn update_frames(&mut self) {
        let base_changed = if self.base.is_dirty() {
            let pose = *self.base.local();
            self.base.set_world(pose);
            true
        } else {
            false
        };

        let mut chain_changed = vec![false; self.linkages.len()];
        for index in 0..self.linkages.len() {
            let (anchor_pose, anchor_changed) = match self.linkages[index].parent_index() {
                None => (*self.base.world(), base_changed),
                Some(p) => (*self.linkages[p].tool().frame().world(), chain_changed[p]),
            };

            let linkage = &mut self.linkages[index];
            let mut previous = anchor_pose;
            let mut stale = anchor_changed;
            for joint in linkage.joints_mut() {
                if stale || joint.frame().is_dirty() {
                    let world = previous * joint.effective_local();
                    joint.frame_mut().set_world(world);
                    stale = true;
                }
                previous = *joint.frame().world();
            }
            let tool = linkage.tool_mut();
            if stale || tool.frame().is_dirty() {
                let world = previous * *tool.frame().local();
                tool.frame_mut().set_world(world);
                stale = true;
            }
            chain_changed[index] = stale;
        }
    }

    pub(crate) fn resolve_world(&self, frame: FrameRef) -> Result<Pose, ModelError> {
        match frame {
            FrameRef::World => Ok(Pose::identity()),
            FrameRef::Base => Ok(*self.base.world()),
            FrameRef::Joint(id) => self
                .joint(id)
                .map(|j| *j.world())
                .ok_or(ModelError::JointIndexOutOfRange(id)),
            FrameRef::Tool(index) => self
                .linkages
                .get(index)
                .map(|l| *l.tool().frame().world())
                .ok_or(ModelError::LinkageIndexOutOfRange(index)),
        }
    }

    /// World pose of the referenced frame, refreshing the tree first.
    pub fn world_pose(&mut self, frame: FrameRef) -> Result<Pose, ModelError> {
        self.ensure_finalized()?;
        self.update_frames();
        self.resolve_world(frame)
    }

    /// Pose of `frame` expressed in `reference`'s coordinates.
    pub fn pose_of_in(&mut self, frame: FrameRef, reference: FrameRef) -> Result<Pose, ModelError> {
        self.ensure_finalized()?;
        self.update_frames();
        let target = self.resolve_world(frame)?;
        let reference = self.resolve_world(reference)?;
        Ok(reference.inverse() * target)
    }

    /// Pose of a joint's output frame relative to the robot base.
    pub fn joint_pose_in_base(&mut self, id: usize) -> Result<Pose, ModelError> {
        self.pose_of_in(FrameRef::Joint(id), FrameRef::Base)
    }
}
