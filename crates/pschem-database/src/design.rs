//! Design hierarchy.
//!
//! A [`Design`](DesignUnit::is_design) is the root of a tree of design units
//! built for one top-level view. Every other unit wraps one instance and is
//! implemented by the instantiated cell's implementation view. Children are
//! resolved lazily, the first time they are asked for, and cached until an
//! instance is added or removed through the database.
//!
//! Units live in an arena owned by the [`Database`]; parents and children
//! refer to each other by [`UnitKey`], so tearing down a subtree never
//! leaves a dangling link behind.

use indexmap::IndexMap;
use slotmap::new_key_type;
use unicase::UniCase;

use crate::database::{Database, DeferredProcess, ElementKey, ViewKey};
use crate::error::{DatabaseError, Result};
use crate::observer::SceneObserver;

new_key_type! {
    pub struct UnitKey;
}

/// One node of a design hierarchy.
#[derive(Debug)]
pub struct DesignUnit {
    name: String,
    path: String,
    parent: Option<UnitKey>,
    instance: Option<ElementKey>,
    /// Name of the instantiated cell (the root's own cell for a design).
    cell_name: String,
    design: UnitKey,
    view: Option<ViewKey>,
    /// `None` until the unit is expanded.
    children: Option<IndexMap<ElementKey, UnitKey>>,
    /// Children ordered by cell name, dropped whenever `children` changes.
    sorted: Option<Vec<UnitKey>>,
}

impl DesignUnit {
    /// Instance name, or the root view path for a design.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hierarchical path, e.g. `work/TOP/schematic:U3.U1`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<UnitKey> {
        self.parent
    }

    /// The wrapped instance (`None` for a design).
    pub fn instance(&self) -> Option<ElementKey> {
        self.instance
    }

    pub fn cell_name(&self) -> &str {
        &self.cell_name
    }

    /// Root of the tree this unit belongs to.
    pub fn design(&self) -> UnitKey {
        self.design
    }

    /// The resolved view; `None` for a leaf whose cell has no implementation.
    ///
    /// Resolved again when an unexpanded unit is expanded or shown.
    pub fn view(&self) -> Option<ViewKey> {
        self.view
    }

    pub fn is_design(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// Cached children, without triggering expansion.
    pub fn expanded_children(&self) -> Option<&IndexMap<ElementKey, UnitKey>> {
        self.children.as_ref()
    }

    fn child(&self, instance: ElementKey) -> Option<UnitKey> {
        self.children.as_ref()?.get(&instance).copied()
    }

    fn child_keys(&self) -> Vec<UnitKey> {
        self.children
            .iter()
            .flat_map(|map| map.values().copied())
            .collect()
    }
}

/// Registry of active designs, in the order they were added.
#[derive(Debug, Default)]
pub struct Designs {
    designs: IndexMap<String, UnitKey>,
}

impl Designs {
    pub fn len(&self) -> usize {
        self.designs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }

    /// Designs in insertion order.
    pub fn sorted_designs(&self) -> impl Iterator<Item = (&str, UnitKey)> {
        self.designs.iter().map(|(path, key)| (path.as_str(), *key))
    }

    pub fn design_unit_by_path(&self, path: &str) -> Option<UnitKey> {
        self.designs.get(path).copied()
    }

    pub fn contains(&self, design: UnitKey) -> bool {
        self.designs.values().any(|d| *d == design)
    }

    fn design_added(&mut self, path: String, design: UnitKey) {
        let previous = self.designs.insert(path, design);
        debug_assert!(previous.is_none(), "design path registered twice");
    }

    fn design_removed(&mut self, path: &str) {
        self.designs.shift_remove(path);
    }
}

impl Database {
    pub fn designs(&self) -> &Designs {
        &self.designs
    }

    pub fn design_unit(&self, key: UnitKey) -> Option<&DesignUnit> {
        self.units.get(key)
    }

    fn unit_ref(&self, key: UnitKey) -> Result<&DesignUnit> {
        self.units
            .get(key)
            .ok_or_else(|| DatabaseError::UnknownDesignUnit(format!("{key:?}")))
    }

    pub fn design_unit_by_path(&self, path: &str) -> Option<UnitKey> {
        self.designs.design_unit_by_path(path)
    }

    /// Create a design rooted on `view` and register it.
    pub fn add_design(&mut self, view: ViewKey) -> Result<UnitKey> {
        let path = self.view_path(view)?;
        if self.designs.design_unit_by_path(&path).is_some() {
            return Err(DatabaseError::DuplicateDesign(path));
        }
        let cell_name = self
            .cell(self.views[view].cell())
            .map(|c| c.name().to_owned())
            .unwrap_or_default();

        let key = self.units.insert_with_key(|key| DesignUnit {
            name: path.clone(),
            path: path.clone(),
            parent: None,
            instance: None,
            cell_name,
            design: key,
            view: Some(view),
            children: None,
            sorted: None,
        });
        self.views[view].design_unit_added(key);
        self.designs.design_added(path.clone(), key);
        self.request_deferred_processing(DeferredProcess::UpdateHierarchyViews);
        log::debug!("Added design {path}");
        Ok(key)
    }

    /// The view whose instances become the unit's children.
    ///
    /// For a design this is the implementation of the root view's cell, for
    /// every other unit it is the unit's own view.
    pub fn unit_implementation(&self, unit: UnitKey) -> Option<ViewKey> {
        let u = self.units.get(unit)?;
        let view = u.view?;
        if u.is_design() {
            self.cell_implementation(self.views.get(view)?.cell())
        } else {
            Some(view)
        }
    }

    fn construct_unit(&mut self, parent: UnitKey, instance: ElementKey) -> Result<UnitKey> {
        let inst = self.instance_ref(instance)?;
        let name = inst.name.clone();
        let cell_name = inst.cell.clone();
        let view = self
            .instance_cell(inst)
            .and_then(|cell| self.cell_implementation(cell));

        let p = self.unit_ref(parent)?;
        let separator = if p.is_design() { ':' } else { '.' };
        let path = format!("{}{}{}", p.path, separator, name);
        let design = p.design;

        let key = self.units.insert(DesignUnit {
            name,
            path,
            parent: Some(parent),
            instance: Some(instance),
            cell_name,
            design,
            view,
            children: None,
            sorted: None,
        });
        if let Some(view) = view {
            self.views[view].design_unit_added(key);
        }
        self.child_design_unit_added(parent, instance, key);
        log::debug!("Constructed design unit {}", self.units[key].path);
        Ok(key)
    }

    fn child_design_unit_added(&mut self, parent: UnitKey, instance: ElementKey, child: UnitKey) {
        let unit = &mut self.units[parent];
        unit.children
            .get_or_insert_with(IndexMap::new)
            .insert(instance, child);
        unit.sorted = None;
    }

    fn child_design_unit_removed(&mut self, parent: UnitKey, instance: ElementKey) {
        if let Some(unit) = self.units.get_mut(parent) {
            if let Some(map) = &mut unit.children {
                map.shift_remove(&instance);
            }
            unit.sorted = None;
        }
    }

    fn check_not_recursive(&self, unit: UnitKey, view: ViewKey) -> Result<()> {
        let mut ancestor = self.units.get(unit).and_then(DesignUnit::parent);
        while let Some(a) = ancestor {
            if self.unit_implementation(a) == Some(view) {
                let path = self.units[unit].path.clone();
                log::warn!("Recursive instantiation below {path}");
                return Err(DatabaseError::RecursiveHierarchy {
                    view: self.view_path(view)?,
                    path,
                });
            }
            ancestor = self.units[a].parent;
        }
        Ok(())
    }

    /// Re-resolve the view of an unexpanded unit.
    ///
    /// The instantiated cell may have gained or lost its implementation
    /// since the unit was constructed; expansion uses the current one.
    fn refresh_view(&mut self, unit: UnitKey) -> Result<()> {
        let u = self.unit_ref(unit)?;
        let (Some(instance), false) = (u.instance, u.is_expanded()) else {
            return Ok(());
        };
        let current = u.view;
        let inst = self.instance_ref(instance)?;
        let resolved = self
            .instance_cell(inst)
            .and_then(|cell| self.cell_implementation(cell));
        if resolved == current {
            return Ok(());
        }

        if let Some(v) = current.and_then(|v| self.views.get_mut(v)) {
            v.design_unit_removed(unit);
        }
        if let Some(v) = resolved {
            self.views[v].design_unit_added(unit);
        }
        self.units[unit].view = resolved;
        log::debug!(
            "{} now implemented by {:?}",
            self.units[unit].path,
            resolved
        );
        Ok(())
    }

    fn expand(&mut self, unit: UnitKey) -> Result<()> {
        if self.unit_ref(unit)?.is_expanded() {
            return Ok(());
        }
        self.refresh_view(unit)?;
        let instances: Vec<ElementKey> = match self.unit_implementation(unit) {
            Some(view) => {
                self.check_not_recursive(unit, view)?;
                self.views[view].instances().map(|(k, _)| k).collect()
            }
            None => Vec::new(),
        };

        let u = &mut self.units[unit];
        u.children = Some(IndexMap::new());
        u.sorted = None;
        log::debug!("Expanding {} ({} instances)", u.path, instances.len());

        for instance in instances {
            self.construct_unit(unit, instance)?;
        }
        Ok(())
    }

    /// Children of `unit` keyed by instance, expanding the unit on first use.
    pub fn child_design_units(&mut self, unit: UnitKey) -> Result<&IndexMap<ElementKey, UnitKey>> {
        self.expand(unit)?;
        Ok(self.units[unit].children.get_or_insert_with(IndexMap::new))
    }

    /// Children of `unit` ordered by the case-insensitive name of their cell.
    pub fn sorted_child_design_units(&mut self, unit: UnitKey) -> Result<&[UnitKey]> {
        self.expand(unit)?;
        if self.units[unit].sorted.is_none() {
            let mut children = self.units[unit].child_keys();
            children.sort_by_cached_key(|k| {
                let c = &self.units[*k];
                (UniCase::new(c.cell_name.clone()), c.name.clone())
            });
            self.units[unit].sorted = Some(children);
        }
        Ok(self.units[unit].sorted.as_deref().unwrap_or_default())
    }

    /// The child of `unit` wrapping the instance called `name`.
    pub fn child_by_name(&mut self, unit: UnitKey, name: &str) -> Result<Option<UnitKey>> {
        let children: Vec<UnitKey> = self.child_design_units(unit)?.values().copied().collect();
        Ok(children.into_iter().find(|c| self.units[*c].name == name))
    }

    /// Resolve a hierarchical path such as `work/TOP/schematic:U1.U1a`,
    /// expanding units along the way.
    pub fn find_design_unit(&mut self, path: &str) -> Result<Option<UnitKey>> {
        let (root, rest) = match path.split_once(':') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };
        let Some(mut unit) = self.designs.design_unit_by_path(root) else {
            return Ok(None);
        };
        for name in rest.into_iter().flat_map(|r| r.split('.')) {
            match self.child_by_name(unit, name)? {
                Some(child) => unit = child,
                None => return Ok(None),
            }
        }
        Ok(Some(unit))
    }

    /// Create the child unit for `instance` below `unit` and tell the unit's
    /// scene about it.
    ///
    /// `instance` must belong to the unit's implementation view. An
    /// unexpanded unit is expanded first; an instance that already has a
    /// unit is left alone.
    pub fn add_instance(&mut self, unit: UnitKey, instance: ElementKey) -> Result<UnitKey> {
        self.refresh_view(unit)?;
        let u = self.unit_ref(unit)?;
        let was_expanded = u.is_expanded();
        let unit_path = u.path.clone();
        let instance_name = self.instance_ref(instance)?.name.clone();
        let implementation = self.unit_implementation(unit);
        if implementation.is_none() || self.element_view(instance) != implementation {
            return Err(DatabaseError::InstanceNotInView {
                instance: instance_name,
                unit: unit_path,
            });
        }

        self.expand(unit)?;
        let existing = self.units[unit].child(instance);
        let child = match existing {
            Some(child) if was_expanded => return Ok(child),
            Some(child) => child,
            None => self.construct_unit(unit, instance)?,
        };
        if let Some(scene) = self.scenes.get_mut(unit) {
            scene.add_instance(child, &self.units[child])?;
        }
        Ok(child)
    }

    /// Tear down the child unit for `instance`, if one was ever created.
    pub fn remove_instance(&mut self, unit: UnitKey, instance: ElementKey) -> Result<()> {
        let Some(child) = self.unit_ref(unit)?.child(instance) else {
            return Ok(());
        };
        if let Some(scene) = self.scenes.get_mut(unit) {
            scene.remove_instance(child, &self.units[child])?;
        }
        self.remove_design_unit(child)
    }

    /// Remove a unit and its whole subtree, leaves first.
    ///
    /// Removing a design also deregisters it from the [`Designs`] registry.
    pub fn remove_design_unit(&mut self, key: UnitKey) -> Result<()> {
        let children = self.unit_ref(key)?.child_keys();
        for child in children {
            self.remove_design_unit(child)?;
        }

        let u = &self.units[key];
        let path = u.path.clone();
        let (parent, instance, view) = (u.parent, u.instance, u.view);

        match parent {
            None => {
                if let Some(mut scene) = self.scenes.remove(key) {
                    scene.design_removed()?;
                }
                if let Some(v) = view.and_then(|v| self.views.get_mut(v)) {
                    v.design_unit_removed(key);
                }
                self.designs.design_removed(&path);
                self.request_deferred_processing(DeferredProcess::UpdateHierarchyViews);
            }
            Some(parent) => {
                if let Some(mut scene) = self.scenes.remove(key) {
                    scene.instance_removed()?;
                }
                if let Some(v) = view.and_then(|v| self.views.get_mut(v)) {
                    v.design_unit_removed(key);
                }
                if let Some(instance) = instance {
                    self.child_design_unit_removed(parent, instance);
                }
            }
        }

        self.units.remove(key);
        log::debug!("Removed design unit {path}");
        Ok(())
    }

    /// Remove every design.
    pub fn close_designs(&mut self) -> Result<()> {
        let designs: Vec<UnitKey> = self.designs.designs.values().copied().collect();
        for design in designs {
            self.remove_design_unit(design)?;
        }
        Ok(())
    }

    /// Attach `scene` to `unit` and populate it with the unit's elements.
    ///
    /// Children are not expanded.
    pub fn scene_added(&mut self, unit: UnitKey, mut scene: Box<dyn SceneObserver>) -> Result<()> {
        self.refresh_view(unit)?;
        let u = self.unit_ref(unit)?;
        if self.scenes.contains_key(unit) {
            return Err(DatabaseError::SceneAlreadyAttached(u.path.clone()));
        }
        if let Some(view) = u.view.and_then(|v| self.views.get(v)) {
            for (key, element) in view.elements() {
                scene.add_element(key, element)?;
            }
        }
        self.scenes.insert(unit, scene);
        Ok(())
    }

    /// Detach and return the scene of `unit`.
    pub fn scene_removed(&mut self, unit: UnitKey) -> Option<Box<dyn SceneObserver>> {
        self.scenes.remove(unit)
    }

    pub fn has_scene(&self, unit: UnitKey) -> bool {
        self.scenes.contains_key(unit)
    }

    pub fn update_item(&mut self, unit: UnitKey) -> Result<()> {
        if let Some(scene) = self.scenes.get_mut(unit) {
            scene.update_item()?;
        }
        Ok(())
    }

    /// Call [`SceneObserver::update_item`] for every unit showing `view`.
    pub fn update_designs(&mut self, view: ViewKey) -> Result<()> {
        let units: Vec<UnitKey> = self.view_ref(view)?.design_units().collect();
        for unit in units {
            self.update_item(unit)?;
        }
        Ok(())
    }

    /// Units whose children come from `view`.
    fn instance_targets(&self, view: ViewKey) -> Vec<UnitKey> {
        let mut targets: Vec<UnitKey> = self.views[view]
            .design_units()
            .filter(|u| self.unit_implementation(*u) == Some(view))
            .collect();
        for (_, design) in self.designs.sorted_designs() {
            if !targets.contains(&design) && self.unit_implementation(design) == Some(view) {
                targets.push(design);
            }
        }
        targets
    }

    pub(crate) fn element_added_to_view(&mut self, view: ViewKey, key: ElementKey) -> Result<()> {
        let units: Vec<UnitKey> = self.views[view].design_units().collect();
        for unit in units {
            if let (Some(scene), Some(element)) =
                (self.scenes.get_mut(unit), self.views[view].element(key))
            {
                scene.add_element(key, element)?;
            }
        }
        Ok(())
    }

    pub(crate) fn element_removed_from_view(&mut self, view: ViewKey, key: ElementKey) -> Result<()> {
        let units: Vec<UnitKey> = self.views[view].design_units().collect();
        for unit in units {
            if let Some(scene) = self.scenes.get_mut(unit) {
                scene.remove_element(key)?;
            }
        }
        Ok(())
    }

    /// Unexpanded units are skipped; they see the instance when expanded.
    pub(crate) fn instance_added_to_view(&mut self, view: ViewKey, key: ElementKey) -> Result<()> {
        for unit in self.instance_targets(view) {
            if self.units.get(unit).is_some_and(DesignUnit::is_expanded) {
                self.add_instance(unit, key)?;
            }
        }
        Ok(())
    }

    pub(crate) fn instance_removed_from_view(&mut self, view: ViewKey, key: ElementKey) -> Result<()> {
        for unit in self.instance_targets(view) {
            if self.units.contains_key(unit) {
                self.remove_instance(unit, key)?;
            }
        }
        Ok(())
    }

    /// The implementation view of `unit` is going away: it becomes a leaf.
    pub(crate) fn implementation_removed(&mut self, unit: UnitKey) -> Result<()> {
        if let Some(u) = self.units.get_mut(unit) {
            u.view = None;
            u.sorted = None;
        }
        self.update_item(unit)
    }

    /// Draw the hierarchy below `unit` as a tree, expanding as needed.
    ///
    /// `max_depth` limits how many levels below `unit` are shown.
    pub fn render_hierarchy(&mut self, unit: UnitKey, max_depth: Option<usize>) -> Result<String> {
        let u = self.unit_ref(unit)?;
        let mut lines = vec![if u.is_design() {
            u.path.clone()
        } else {
            format!("{} ({})", u.name, u.cell_name)
        }];
        self.render_children(unit, "", 0, max_depth, &mut lines)?;
        Ok(lines.join("\n"))
    }

    fn render_children(
        &mut self,
        unit: UnitKey,
        prefix: &str,
        depth: usize,
        max_depth: Option<usize>,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        if max_depth.is_some_and(|max| depth >= max) {
            return Ok(());
        }
        let children = self.sorted_child_design_units(unit)?.to_vec();
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let last = i + 1 == count;
            let c = &self.units[child];
            let branch = if last { "└── " } else { "├── " };
            lines.push(format!("{prefix}{branch}{} ({})", c.name, c.cell_name));
            let next = format!("{prefix}{}", if last { "    " } else { "│   " });
            self.render_children(child, &next, depth + 1, max_depth, lines)?;
        }
        Ok(())
    }
}
