//! Libraries, cells and views.
//!
//! Every entity lives in a [`SlotMap`] owned by the [`Database`]; containers
//! refer to their members by key and keep a name map where lookup by name is
//! needed. Removing a container removes everything it owns.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::config::DatabaseConfig;
use crate::design::{Designs, DesignUnit, UnitKey};
use crate::element::{AttributeLabel, Element, Instance, Label, Line, NetSegment, Pin, Rect, SolderDot};
use crate::error::{DatabaseError, Result};
use crate::observer::{DatabaseView, HierarchyView, SceneObserver};

new_key_type! {
    pub struct LibraryKey;
    pub struct CellKey;
    pub struct ViewKey;
    pub struct ElementKey;
}

/// The representations a cell can have. A cell holds at most one view of
/// each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Schematic,
    Symbol,
    Netlist,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Schematic => "schematic",
            ViewKind::Symbol => "symbol",
            ViewKind::Netlist => "netlist",
        }
    }

    /// Diagrams carry drawing elements and a `uu` attribute.
    pub fn is_diagram(&self) -> bool {
        matches!(self, ViewKind::Schematic | ViewKind::Symbol)
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work that is queued by structural edits and run by
/// [`Database::run_deferred_processes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredProcess {
    /// Refresh every installed [`HierarchyView`].
    UpdateHierarchyViews,
}

#[derive(Debug)]
pub struct Library {
    name: String,
    cells: IndexMap<String, CellKey>,
}

impl Library {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, CellKey)> {
        self.cells.iter().map(|(name, key)| (name.as_str(), *key))
    }

    pub fn cell_by_name(&self, name: &str) -> Option<CellKey> {
        self.cells.get(name).copied()
    }
}

#[derive(Debug)]
pub struct Cell {
    name: String,
    library: LibraryKey,
    views: IndexMap<ViewKind, ViewKey>,
}

impl Cell {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn library(&self) -> LibraryKey {
        self.library
    }

    pub fn views(&self) -> impl Iterator<Item = (ViewKind, ViewKey)> + '_ {
        self.views.iter().map(|(kind, key)| (*kind, *key))
    }

    pub fn view_by_kind(&self, kind: ViewKind) -> Option<ViewKey> {
        self.views.get(&kind).copied()
    }
}

/// One representation of a cell together with its elements.
#[derive(Debug)]
pub struct CellView {
    kind: ViewKind,
    cell: CellKey,
    attributes: BTreeMap<String, String>,
    elements: IndexMap<ElementKey, Element>,
    /// Design units whose view this is.
    design_units: IndexSet<UnitKey>,
}

impl CellView {
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn cell(&self) -> CellKey {
        self.cell
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Database units per user unit (diagrams only).
    pub fn uu(&self) -> Option<i64> {
        self.attributes.get("uu").and_then(|v| v.parse().ok())
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementKey, &Element)> {
        self.elements.iter().map(|(key, e)| (*key, e))
    }

    pub fn element(&self, key: ElementKey) -> Option<&Element> {
        self.elements.get(&key)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn instances(&self) -> impl Iterator<Item = (ElementKey, &Instance)> {
        self.elements().filter_map(|(k, e)| match e {
            Element::Instance(i) => Some((k, i)),
            _ => None,
        })
    }

    pub fn instance_by_name(&self, name: &str) -> Option<ElementKey> {
        self.instances()
            .find(|(_, i)| i.name == name)
            .map(|(k, _)| k)
    }

    pub fn net_segments(&self) -> impl Iterator<Item = (ElementKey, &NetSegment)> {
        self.elements().filter_map(|(k, e)| match e {
            Element::NetSegment(n) => Some((k, n)),
            _ => None,
        })
    }

    pub fn solder_dots(&self) -> impl Iterator<Item = (ElementKey, &SolderDot)> {
        self.elements().filter_map(|(k, e)| match e {
            Element::SolderDot(d) => Some((k, d)),
            _ => None,
        })
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.elements.values().filter_map(|e| match e {
            Element::Line(l) => Some(l),
            _ => None,
        })
    }

    pub fn rects(&self) -> impl Iterator<Item = &Rect> {
        self.elements.values().filter_map(|e| match e {
            Element::Rect(r) => Some(r),
            _ => None,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.elements.values().filter_map(|e| match e {
            Element::Label(l) => Some(l),
            _ => None,
        })
    }

    pub fn attribute_labels(&self) -> impl Iterator<Item = &AttributeLabel> {
        self.elements.values().filter_map(|e| match e {
            Element::AttributeLabel(a) => Some(a),
            _ => None,
        })
    }

    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.elements.values().filter_map(|e| match e {
            Element::Pin(p) => Some(p),
            _ => None,
        })
    }

    pub fn design_units(&self) -> impl Iterator<Item = UnitKey> + '_ {
        self.design_units.iter().copied()
    }

    pub(crate) fn design_unit_added(&mut self, unit: UnitKey) {
        let inserted = self.design_units.insert(unit);
        debug_assert!(inserted, "design unit registered twice with its view");
    }

    pub(crate) fn design_unit_removed(&mut self, unit: UnitKey) {
        let removed = self.design_units.shift_remove(&unit);
        debug_assert!(removed, "design unit was not registered with its view");
    }

    pub(crate) fn take_design_units(&mut self) -> Vec<UnitKey> {
        self.design_units.drain(..).collect()
    }
}

/// Owner of every library, cell, view, element and design unit.
pub struct Database {
    pub(crate) config: DatabaseConfig,
    libraries: SlotMap<LibraryKey, Library>,
    library_names: IndexMap<String, LibraryKey>,
    cells: SlotMap<CellKey, Cell>,
    pub(crate) views: SlotMap<ViewKey, CellView>,
    /// Allocates element keys and records the view owning each element.
    element_views: SlotMap<ElementKey, ViewKey>,
    pub(crate) units: SlotMap<UnitKey, DesignUnit>,
    pub(crate) scenes: SecondaryMap<UnitKey, Box<dyn SceneObserver>>,
    pub(crate) designs: Designs,
    deferred: IndexSet<DeferredProcess>,
    database_views: Vec<Box<dyn DatabaseView>>,
    hierarchy_views: Vec<Box<dyn HierarchyView>>,
}

impl Default for Database {
    fn default() -> Self {
        Self::with_config(DatabaseConfig::default())
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DatabaseConfig) -> Self {
        Self {
            config,
            libraries: SlotMap::with_key(),
            library_names: IndexMap::new(),
            cells: SlotMap::with_key(),
            views: SlotMap::with_key(),
            element_views: SlotMap::with_key(),
            units: SlotMap::with_key(),
            scenes: SecondaryMap::new(),
            designs: Designs::default(),
            deferred: IndexSet::new(),
            database_views: Vec::new(),
            hierarchy_views: Vec::new(),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    // Observers ---------------------------------------------------------------

    pub fn install_update_database_views_hook(&mut self, view: Box<dyn DatabaseView>) {
        self.database_views.push(view);
    }

    pub fn install_update_hierarchy_views_hook(&mut self, view: Box<dyn HierarchyView>) {
        self.hierarchy_views.push(view);
    }

    pub fn update_database_views(&mut self) -> Result<()> {
        for view in &mut self.database_views {
            view.update()?;
        }
        Ok(())
    }

    pub fn update_hierarchy_views(&mut self) -> Result<()> {
        for view in &mut self.hierarchy_views {
            view.update(&self.designs)?;
        }
        Ok(())
    }

    /// Queue `process`; repeated requests before the next flush collapse
    /// into one.
    pub fn request_deferred_processing(&mut self, process: DeferredProcess) {
        if self.deferred.insert(process) {
            log::trace!("Deferred process queued: {process:?}");
        }
    }

    pub fn has_deferred_processes(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Run every queued process once, in request order.
    pub fn run_deferred_processes(&mut self) -> Result<()> {
        let pending: Vec<DeferredProcess> = self.deferred.drain(..).collect();
        for process in pending {
            log::debug!("Running deferred process {process:?}");
            match process {
                DeferredProcess::UpdateHierarchyViews => self.update_hierarchy_views()?,
            }
        }
        Ok(())
    }

    // Libraries ---------------------------------------------------------------

    pub fn add_library(&mut self, name: impl Into<String>) -> Result<LibraryKey> {
        let name = name.into();
        if self.library_names.contains_key(&name) {
            return Err(DatabaseError::DuplicateLibrary(name));
        }
        let key = self.libraries.insert(Library {
            name: name.clone(),
            cells: IndexMap::new(),
        });
        self.library_names.insert(name, key);
        self.update_database_views()?;
        Ok(key)
    }

    pub fn library(&self, key: LibraryKey) -> Option<&Library> {
        self.libraries.get(key)
    }

    pub fn libraries(&self) -> impl Iterator<Item = (&str, LibraryKey)> {
        self.library_names
            .iter()
            .map(|(name, key)| (name.as_str(), *key))
    }

    pub fn library_by_name(&self, name: &str) -> Option<LibraryKey> {
        self.library_names.get(name).copied()
    }

    // Cells -------------------------------------------------------------------

    pub fn add_cell(&mut self, library: LibraryKey, name: impl Into<String>) -> Result<CellKey> {
        let name = name.into();
        let lib = self
            .libraries
            .get(library)
            .ok_or_else(|| DatabaseError::UnknownLibrary(format!("{library:?}")))?;
        if lib.cells.contains_key(&name) {
            return Err(DatabaseError::DuplicateCell(format!("{}/{}", lib.name, name)));
        }
        let key = self.cells.insert(Cell {
            name: name.clone(),
            library,
            views: IndexMap::new(),
        });
        self.libraries[library].cells.insert(name, key);
        self.update_database_views()?;
        Ok(key)
    }

    pub fn cell(&self, key: CellKey) -> Option<&Cell> {
        self.cells.get(key)
    }

    pub fn cell_by_name(&self, library: &str, cell: &str) -> Option<CellKey> {
        let lib = self.library_by_name(library)?;
        self.libraries[lib].cell_by_name(cell)
    }

    /// The cell an instance refers to, if it exists.
    pub fn instance_cell(&self, instance: &Instance) -> Option<CellKey> {
        self.cell_by_name(&instance.library, &instance.cell)
    }

    /// The view a cell is implemented by (its schematic unless configured
    /// otherwise).
    pub fn cell_implementation(&self, cell: CellKey) -> Option<ViewKey> {
        self.cells
            .get(cell)?
            .view_by_kind(self.config.implementation_view)
    }

    pub fn cell_symbol(&self, cell: CellKey) -> Option<ViewKey> {
        self.cells.get(cell)?.view_by_kind(self.config.symbol_view)
    }

    pub fn cell_path(&self, cell: CellKey) -> Result<String> {
        let c = self
            .cells
            .get(cell)
            .ok_or_else(|| DatabaseError::UnknownCell(format!("{cell:?}")))?;
        Ok(format!("{}/{}", self.libraries[c.library].name, c.name))
    }

    /// Remove a cell together with all its views.
    pub fn remove_cell(&mut self, cell: CellKey) -> Result<()> {
        let path = self.cell_path(cell)?;
        let views: Vec<ViewKey> = self.cells[cell].views.values().copied().collect();
        for view in views {
            self.remove_view(view)?;
        }
        let removed = self.cells.remove(cell);
        if let Some(c) = removed {
            if let Some(lib) = self.libraries.get_mut(c.library) {
                lib.cells.shift_remove(&c.name);
            }
        }
        log::debug!("Removed cell {path}");
        self.update_database_views()
    }

    // Views -------------------------------------------------------------------

    pub fn add_view(&mut self, cell: CellKey, kind: ViewKind) -> Result<ViewKey> {
        let path = format!("{}/{}", self.cell_path(cell)?, kind);
        if self.cells[cell].views.contains_key(&kind) {
            return Err(DatabaseError::DuplicateView(path));
        }
        let mut attributes = BTreeMap::new();
        if kind.is_diagram() {
            attributes.insert("uu".to_owned(), self.config.user_units.to_string());
        }
        let key = self.views.insert(CellView {
            kind,
            cell,
            attributes,
            elements: IndexMap::new(),
            design_units: IndexSet::new(),
        });
        self.cells[cell].views.insert(kind, key);
        log::debug!("Added view {path}");
        self.update_database_views()?;
        Ok(key)
    }

    pub fn view(&self, key: ViewKey) -> Option<&CellView> {
        self.views.get(key)
    }

    pub(crate) fn view_ref(&self, key: ViewKey) -> Result<&CellView> {
        self.views
            .get(key)
            .ok_or_else(|| DatabaseError::UnknownView(format!("{key:?}")))
    }

    pub fn view_by_name(&self, library: &str, cell: &str, kind: ViewKind) -> Option<ViewKey> {
        let cell = self.cell_by_name(library, cell)?;
        self.cells[cell].view_by_kind(kind)
    }

    /// `library/cell/view`.
    pub fn view_path(&self, view: ViewKey) -> Result<String> {
        let v = self.view_ref(view)?;
        Ok(format!("{}/{}", self.cell_path(v.cell)?, v.kind))
    }

    /// Set a view attribute such as `uu`.
    pub fn set_view_attribute(
        &mut self,
        view: ViewKey,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.view_ref(view)?;
        self.views[view].attributes.insert(key.into(), value.into());
        Ok(())
    }

    /// Remove a view.
    ///
    /// Designs rooted on the view are removed, its elements are removed one
    /// by one (so expanded design units see every instance go away), and
    /// units that were implemented by it become leaves.
    pub fn remove_view(&mut self, view: ViewKey) -> Result<()> {
        let path = self.view_path(view)?;

        let rooted: Vec<UnitKey> = self.views[view]
            .design_units()
            .filter(|u| self.units.get(*u).is_some_and(DesignUnit::is_design))
            .collect();
        for design in rooted {
            self.remove_design_unit(design)?;
        }

        let elements: Vec<ElementKey> = self.views[view].elements.keys().copied().collect();
        for element in elements {
            self.remove_elem(element)?;
        }

        for unit in self.views[view].take_design_units() {
            self.implementation_removed(unit)?;
        }

        if let Some(v) = self.views.remove(view) {
            if let Some(cell) = self.cells.get_mut(v.cell) {
                cell.views.shift_remove(&v.kind);
            }
        }
        log::debug!("Removed view {path}");
        self.update_database_views()
    }

    // Elements ----------------------------------------------------------------

    pub fn element(&self, key: ElementKey) -> Option<&Element> {
        let view = self.element_views.get(key)?;
        self.views.get(*view)?.element(key)
    }

    /// The view owning an element.
    pub fn element_view(&self, key: ElementKey) -> Option<ViewKey> {
        self.element_views.get(key).copied()
    }

    pub(crate) fn instance_ref(&self, key: ElementKey) -> Result<&Instance> {
        let element = self
            .element(key)
            .ok_or_else(|| DatabaseError::UnknownElement(format!("{key:?}")))?;
        element
            .as_instance()
            .ok_or_else(|| DatabaseError::NotAnInstance(element.name()))
    }

    /// Add an element to a view and notify the design units tracking it.
    pub fn add_elem(&mut self, view: ViewKey, element: impl Into<Element>) -> Result<ElementKey> {
        let element = element.into();
        let v = self.view_ref(view)?;
        let is_instance = match element.as_instance() {
            Some(inst) if v.instance_by_name(&inst.name).is_some() => {
                return Err(DatabaseError::DuplicateInstance {
                    instance: inst.name.clone(),
                    view: self.view_path(view)?,
                });
            }
            Some(_) => true,
            None => false,
        };
        log::trace!("Adding {} to {view:?}", element.name());

        let key = self.element_views.insert(view);
        self.views[view].elements.insert(key, element);

        self.element_added_to_view(view, key)?;
        if is_instance {
            self.instance_added_to_view(view, key)?;
        }
        Ok(key)
    }

    /// Remove an element from its view, notifying design units first.
    pub fn remove_elem(&mut self, key: ElementKey) -> Result<Element> {
        let view = self
            .element_view(key)
            .ok_or_else(|| DatabaseError::UnknownElement(format!("{key:?}")))?;
        let is_instance = self.views[view]
            .element(key)
            .is_some_and(|e| e.as_instance().is_some());

        if is_instance {
            self.instance_removed_from_view(view, key)?;
        }
        self.element_removed_from_view(view, key)?;

        self.element_views.remove(key);
        let element = self.views[view]
            .elements
            .shift_remove(&key)
            .ok_or_else(|| DatabaseError::UnknownElement(format!("{key:?}")))?;
        log::trace!("Removed {} from {view:?}", element.name());
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Layers;

    #[test]
    fn containers_resolve_by_name() {
        let mut db = Database::new();
        let lib = db.add_library("work").unwrap();
        let inv = db.add_cell(lib, "INV").unwrap();
        let sch = db.add_view(inv, ViewKind::Schematic).unwrap();
        let sym = db.add_view(inv, ViewKind::Symbol).unwrap();

        assert_eq!(db.cell_by_name("work", "INV"), Some(inv));
        assert_eq!(db.view_by_name("work", "INV", ViewKind::Symbol), Some(sym));
        assert_eq!(db.cell_implementation(inv), Some(sch));
        assert_eq!(db.cell_symbol(inv), Some(sym));
        assert_eq!(db.view_path(sch).unwrap(), "work/INV/schematic");
        assert_eq!(db.view(sch).unwrap().uu(), Some(160));
        assert_eq!(db.cell_by_name("work", "NAND"), None);
        assert_eq!(db.cell_by_name("lib", "INV"), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut db = Database::new();
        let lib = db.add_library("work").unwrap();
        let cell = db.add_cell(lib, "INV").unwrap();
        db.add_view(cell, ViewKind::Schematic).unwrap();

        assert!(matches!(
            db.add_library("work"),
            Err(DatabaseError::DuplicateLibrary(_))
        ));
        assert!(matches!(
            db.add_cell(lib, "INV"),
            Err(DatabaseError::DuplicateCell(_))
        ));
        assert!(matches!(
            db.add_view(cell, ViewKind::Schematic),
            Err(DatabaseError::DuplicateView(p)) if p == "work/INV/schematic"
        ));
    }

    #[test]
    fn netlist_views_have_no_units_attribute() {
        let mut db = Database::new();
        let lib = db.add_library("work").unwrap();
        let cell = db.add_cell(lib, "INV").unwrap();
        let netlist = db.add_view(cell, ViewKind::Netlist).unwrap();
        assert_eq!(db.view(netlist).unwrap().uu(), None);
    }

    #[test]
    fn elements_are_owned_by_their_view() {
        let mut db = Database::new();
        let lib = db.add_library("work").unwrap();
        let cell = db.add_cell(lib, "TOP").unwrap();
        let sch = db.add_view(cell, ViewKind::Schematic).unwrap();

        let seg = db
            .add_elem(sch, NetSegment::new(Layers::single("net"), (0, 0), (5, 0)))
            .unwrap();
        let inst = db.add_elem(sch, Instance::new("U1", "work", "INV")).unwrap();

        assert_eq!(db.element_view(seg), Some(sch));
        assert_eq!(db.view(sch).unwrap().len(), 2);
        assert_eq!(db.view(sch).unwrap().instance_by_name("U1"), Some(inst));
        assert!(matches!(
            db.instance_ref(seg),
            Err(DatabaseError::NotAnInstance(_))
        ));

        let removed = db.remove_elem(seg).unwrap();
        assert!(removed.as_net_segment().is_some());
        assert!(db.element(seg).is_none());
        assert!(matches!(
            db.remove_elem(seg),
            Err(DatabaseError::UnknownElement(_))
        ));
    }

    #[test]
    fn removing_a_cell_removes_its_views() {
        let mut db = Database::new();
        let lib = db.add_library("work").unwrap();
        let cell = db.add_cell(lib, "INV").unwrap();
        let sch = db.add_view(cell, ViewKind::Schematic).unwrap();
        let seg = db
            .add_elem(sch, NetSegment::new(Layers::single("net"), (0, 0), (5, 0)))
            .unwrap();

        db.remove_cell(cell).unwrap();
        assert!(db.cell(cell).is_none());
        assert!(db.view(sch).is_none());
        assert!(db.element(seg).is_none());
        assert_eq!(db.cell_by_name("work", "INV"), None);
    }

    #[test]
    fn deferred_requests_collapse() {
        use std::cell::Cell as Counter;
        use std::rc::Rc;

        struct Count(Rc<Counter<usize>>);
        impl HierarchyView for Count {
            fn update(&mut self, _designs: &Designs) -> anyhow::Result<()> {
                self.0.set(self.0.get() + 1);
                Ok(())
            }
        }

        let calls = Rc::new(Counter::new(0));
        let mut db = Database::new();
        db.install_update_hierarchy_views_hook(Box::new(Count(calls.clone())));

        db.request_deferred_processing(DeferredProcess::UpdateHierarchyViews);
        db.request_deferred_processing(DeferredProcess::UpdateHierarchyViews);
        assert!(db.has_deferred_processes());
        assert_eq!(calls.get(), 0);

        db.run_deferred_processes().unwrap();
        assert_eq!(calls.get(), 1);
        assert!(!db.has_deferred_processes());

        db.run_deferred_processes().unwrap();
        assert_eq!(calls.get(), 1);
    }
}
