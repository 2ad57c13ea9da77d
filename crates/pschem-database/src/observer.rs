//! Hooks through which the graphical layer observes the database.
//!
//! Observers never receive mutable access to the database: they are handed
//! keys and shared references only, so a callback cannot reenter the
//! structure that is being updated.

use crate::database::ElementKey;
use crate::design::{DesignUnit, Designs, UnitKey};
use crate::element::Element;

/// A view-layer consumer attached to a single [`DesignUnit`].
///
/// A unit holds at most one scene and a scene belongs to at most one unit
/// (the unit owns it). Every structural change of the unit produces exactly
/// one matching call.
pub trait SceneObserver {
    /// An element of the unit's view was added, or the scene is being
    /// populated right after it was attached.
    fn add_element(&mut self, key: ElementKey, element: &Element) -> anyhow::Result<()>;

    /// An element of the unit's view is about to be removed.
    fn remove_element(&mut self, _key: ElementKey) -> anyhow::Result<()> {
        Ok(())
    }

    /// A child design unit was created below the observed unit.
    fn add_instance(&mut self, child: UnitKey, unit: &DesignUnit) -> anyhow::Result<()>;

    /// A child design unit is about to be torn down.
    fn remove_instance(&mut self, child: UnitKey, unit: &DesignUnit) -> anyhow::Result<()>;

    /// The observed (non-root) unit itself was torn down.
    fn instance_removed(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// The observed design (or its root view) was removed.
    fn design_removed(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Content of the observed unit changed without a structural edit.
    fn update_item(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Listing of the design hierarchy (a tree widget, a report).
///
/// Notified only when deferred processing runs, so a burst of design
/// additions and removals collapses into one update.
pub trait HierarchyView {
    fn update(&mut self, designs: &Designs) -> anyhow::Result<()>;
}

/// Listing of libraries, cells and views. Notified immediately on change.
pub trait DatabaseView {
    fn update(&mut self) -> anyhow::Result<()>;
}
