//! Schematic database for PSchem-style schematic capture.
//!
//! The [`Database`] owns every library, cell, view and element, together
//! with the design hierarchies derived from them:
//!
//! * `database` – libraries, cells and views (schematic, symbol, netlist) and
//!   the element entry points [`Database::add_elem`] / [`Database::remove_elem`]
//!   through which every structural edit flows.
//! * `design` – the design-unit tree. A design is rooted on one view and
//!   resolves each instance to its cell's implementation view, lazily and
//!   with cached, sorted children.
//! * `net` – net consolidation: splitting overlapping wires and maintaining
//!   solder dots at junctions.
//! * `observer` – traits implemented by the graphical layer.
//! * `import` – JSON interchange used by the `pschem` command-line tool.
//!
//! All entities are addressed by arena keys ([`ViewKey`], [`ElementKey`],
//! [`UnitKey`], ...). A key outlives the entity it named, so lookups return
//! `Option` and operations on stale keys fail with a [`DatabaseError`].

pub mod config;
pub mod database;
pub mod design;
pub mod element;
pub mod error;
pub mod geometry;
pub mod import;
pub mod net;
pub mod observer;

pub use config::{ConfigError, DatabaseConfig};
pub use database::{
    Cell, CellKey, CellView, Database, DeferredProcess, ElementKey, Library, LibraryKey, ViewKey,
    ViewKind,
};
pub use design::{DesignUnit, Designs, UnitKey};
pub use element::{
    AttributeLabel, Element, Instance, Label, Line, NetSegment, Pin, Rect, SolderDot,
};
pub use error::{DatabaseError, Result};
pub use geometry::{BoundingBox, Layers, Point, Span};
pub use import::{CellDescription, ImportError, Importer, LibraryDescription, ViewDescription};
pub use net::ConsolidationReport;
pub use observer::{DatabaseView, HierarchyView, SceneObserver};
