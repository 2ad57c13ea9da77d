use crate::geometry::Point;

/// Errors raised by structural operations on a [`crate::Database`].
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Unknown library {0}")]
    UnknownLibrary(String),

    #[error("Unknown cell {0}")]
    UnknownCell(String),

    #[error("Unknown view {0}")]
    UnknownView(String),

    #[error("Unknown element {0}")]
    UnknownElement(String),

    #[error("Unknown design unit {0}")]
    UnknownDesignUnit(String),

    #[error("Library {0} already exists")]
    DuplicateLibrary(String),

    #[error("Cell {0} already exists")]
    DuplicateCell(String),

    #[error("View {0} already exists")]
    DuplicateView(String),

    #[error("Design {0} already exists")]
    DuplicateDesign(String),

    #[error("Instance {instance} already exists in {view}")]
    DuplicateInstance { instance: String, view: String },

    #[error("Element {0} is not an instance")]
    NotAnInstance(String),

    #[error("Instance {instance} is not part of the implementation of {unit}")]
    InstanceNotInView { instance: String, unit: String },

    #[error("A scene is already attached to {0}")]
    SceneAlreadyAttached(String),

    #[error("Split point {point} does not lie inside segment {segment}")]
    SplitPointOutside { point: Point, segment: String },

    #[error("Recursive instantiation of {view} below {path}")]
    RecursiveHierarchy { view: String, path: String },

    /// Failure reported by a scene, hierarchy view or database view.
    #[error(transparent)]
    Observer(#[from] anyhow::Error),
}

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;
