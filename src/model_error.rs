//! Error handling for model construction, queries and the URDF loader.

use std::io;

/// Unified error for structural problems in the frame tree, scope and
/// reference resolution, and robot description parsing.
#[derive(Debug)]
pub enum ModelError {
    IoError(io::Error),
    ParseError(String),
    MissingField(String),
    XmlProcessingError(String),
    DuplicateLinkageName(String),
    DuplicateJointName(String),
    UnknownLinkage(String),
    UnknownJoint(String),
    UnknownParent { linkage: String, parent: String },
    ParentOutOfRange { linkage: String, parent: usize },
    CyclicParentGraph,
    DuplicateJointInSubset(usize),
    JointIndexOutOfRange(usize),
    LinkageIndexOutOfRange(usize),
    ValueCountMismatch { expected: usize, found: usize },
    EmptyScope,
    ZeroMass,
    InvalidComReference,
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ModelError::IoError(ref err) =>
                write!(f, "IO Error: {}", err),
            ModelError::ParseError(ref msg) =>
                write!(f, "Parse Error: {}", msg),
            ModelError::MissingField(ref field) =>
                write!(f, "Missing Field: {}", field),
            ModelError::XmlProcessingError(ref err) =>
                write!(f, "XML Processing Error: {}", err),
            ModelError::DuplicateLinkageName(ref name) =>
                write!(f, "Duplicate linkage name: {}", name),
            ModelError::DuplicateJointName(ref name) =>
                write!(f, "Duplicate joint name: {}", name),
            ModelError::UnknownLinkage(ref name) =>
                write!(f, "Unknown linkage: {}", name),
            ModelError::UnknownJoint(ref name) =>
                write!(f, "Unknown joint: {}", name),
            ModelError::UnknownParent { ref linkage, ref parent } =>
                write!(f, "Linkage {} refers to unknown parent {}", linkage, parent),
            ModelError::ParentOutOfRange { ref linkage, parent } =>
                write!(f, "Linkage {} refers to parent index {} that is out of range",
                       linkage, parent),
            ModelError::CyclicParentGraph =>
                write!(f, "Linkage parent graph contains a cycle"),
            ModelError::DuplicateJointInSubset(id) =>
                write!(f, "Joint {} appears more than once in the selected subset", id),
            ModelError::JointIndexOutOfRange(id) =>
                write!(f, "Joint index {} is out of range", id),
            ModelError::LinkageIndexOutOfRange(index) =>
                write!(f, "Linkage index {} is out of range", index),
            ModelError::ValueCountMismatch { expected, found } =>
                write!(f, "Value count mismatch: expected {}, found {}", expected, found),
            ModelError::EmptyScope =>
                write!(f, "Empty scope for mass or center of mass calculation"),
            ModelError::ZeroMass =>
                write!(f, "Total mass is zero, center of mass is undefined"),
            ModelError::InvalidComReference =>
                write!(f, "Reference frame tag is not valid for this center of mass scope"),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<io::Error> for ModelError {
    fn from(err: io::Error) -> Self {
        ModelError::IoError(err)
    }
}
