#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use pschem_database::{
    Database, DesignUnit, Designs, Element, ElementKey, HierarchyView, Importer, Instance, Layers,
    NetSegment, Point, SceneObserver, UnitKey, ViewKey, ViewKind,
};

/// What a [`RecordingScene`] was told, tagged with the scene's label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    AddElement(String, String),
    RemoveElement(String),
    AddInstance(String, String),
    RemoveInstance(String, String),
    InstanceRemoved(String),
    DesignRemoved(String),
    UpdateItem(String),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Scene that appends every notification to a shared log.
pub struct RecordingScene {
    label: String,
    log: EventLog,
}

impl RecordingScene {
    pub fn boxed(label: impl Into<String>, log: &EventLog) -> Box<dyn SceneObserver> {
        Box::new(Self {
            label: label.into(),
            log: log.clone(),
        })
    }

    fn push(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }
}

impl SceneObserver for RecordingScene {
    fn add_element(&mut self, _key: ElementKey, element: &Element) -> anyhow::Result<()> {
        self.push(Event::AddElement(self.label.clone(), element.name()));
        Ok(())
    }

    fn remove_element(&mut self, _key: ElementKey) -> anyhow::Result<()> {
        self.push(Event::RemoveElement(self.label.clone()));
        Ok(())
    }

    fn add_instance(&mut self, _child: UnitKey, unit: &DesignUnit) -> anyhow::Result<()> {
        self.push(Event::AddInstance(self.label.clone(), unit.path().to_owned()));
        Ok(())
    }

    fn remove_instance(&mut self, _child: UnitKey, unit: &DesignUnit) -> anyhow::Result<()> {
        self.push(Event::RemoveInstance(self.label.clone(), unit.path().to_owned()));
        Ok(())
    }

    fn instance_removed(&mut self) -> anyhow::Result<()> {
        self.push(Event::InstanceRemoved(self.label.clone()));
        Ok(())
    }

    fn design_removed(&mut self) -> anyhow::Result<()> {
        self.push(Event::DesignRemoved(self.label.clone()));
        Ok(())
    }

    fn update_item(&mut self) -> anyhow::Result<()> {
        self.push(Event::UpdateItem(self.label.clone()));
        Ok(())
    }
}

/// Scene whose notifications always fail.
pub struct FailingScene;

impl SceneObserver for FailingScene {
    fn add_element(&mut self, _key: ElementKey, _element: &Element) -> anyhow::Result<()> {
        Ok(())
    }

    fn add_instance(&mut self, _child: UnitKey, _unit: &DesignUnit) -> anyhow::Result<()> {
        anyhow::bail!("scene refused instance")
    }

    fn remove_instance(&mut self, _child: UnitKey, _unit: &DesignUnit) -> anyhow::Result<()> {
        anyhow::bail!("scene refused removal")
    }
}

/// Hierarchy view recording the design paths it was shown.
pub struct RecordingHierarchy(pub Rc<RefCell<Vec<Vec<String>>>>);

impl HierarchyView for RecordingHierarchy {
    fn update(&mut self, designs: &Designs) -> anyhow::Result<()> {
        let paths = designs
            .sorted_designs()
            .map(|(path, _)| path.to_owned())
            .collect();
        self.0.borrow_mut().push(paths);
        Ok(())
    }
}

/// `TOP` instantiates `INV` as `U1` and `U2`, `INV` instantiates `NAND` as
/// `U1a`, and `NAND` only has a symbol.
pub struct Inverters {
    pub db: Database,
    pub top: ViewKey,
    pub inv: ViewKey,
    pub nand_symbol: ViewKey,
}

pub fn inverters() -> Inverters {
    let mut db = Database::new();
    let lib = db.add_library("work").unwrap();
    let top_cell = db.add_cell(lib, "TOP").unwrap();
    let inv_cell = db.add_cell(lib, "INV").unwrap();
    let nand_cell = db.add_cell(lib, "NAND").unwrap();

    let top = db.add_view(top_cell, ViewKind::Schematic).unwrap();
    let inv = db.add_view(inv_cell, ViewKind::Schematic).unwrap();
    db.add_view(inv_cell, ViewKind::Symbol).unwrap();
    let nand_symbol = db.add_view(nand_cell, ViewKind::Symbol).unwrap();

    db.add_elem(top, Instance::new("U1", "work", "INV").at(0, 0))
        .unwrap();
    db.add_elem(top, Instance::new("U2", "work", "INV").at(320, 0))
        .unwrap();
    db.add_elem(inv, Instance::new("U1a", "work", "NAND"))
        .unwrap();
    db.add_elem(inv, wire((0, 0), (160, 0))).unwrap();

    Inverters {
        db,
        top,
        inv,
        nand_symbol,
    }
}

/// Database loaded from a JSON library description into `work`.
pub fn load(json: &str) -> Database {
    let mut db = Database::new();
    Importer::default().import_str(&mut db, json).unwrap();
    db
}

pub fn net() -> Layers {
    Layers::single("net")
}

pub fn wire(a: (i64, i64), b: (i64, i64)) -> NetSegment {
    NetSegment::new(net(), a, b)
}

pub fn path_of(db: &Database, unit: UnitKey) -> String {
    db.design_unit(unit).unwrap().path().to_owned()
}

/// Names of the children of `unit`, in sorted order.
pub fn sorted_names(db: &mut Database, unit: UnitKey) -> Vec<String> {
    let children = db.sorted_child_design_units(unit).unwrap().to_vec();
    children
        .into_iter()
        .map(|k| db.design_unit(k).unwrap().name().to_owned())
        .collect()
}

/// Every lattice point covered by the axis-aligned segments of `view`, per
/// layer set.
pub fn covered_points(db: &Database, view: ViewKey) -> BTreeSet<(Layers, Point)> {
    let mut points = BTreeSet::new();
    for (_, seg) in db.view(view).unwrap().net_segments() {
        let (a, b) = (seg.span.start, seg.span.end);
        assert!(a.x == b.x || a.y == b.y, "only axis-aligned fixtures");
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                points.insert((seg.layers.clone(), Point::new(x, y)));
            }
        }
    }
    points
}

/// Assert that a dot sits exactly where three or more endpoints meet.
pub fn assert_junctions_consistent(db: &Database, view: ViewKey) {
    let v = db.view(view).unwrap();
    let mut endpoints: Vec<(Layers, Point)> = Vec::new();
    for (_, seg) in v.net_segments() {
        for p in seg.span.endpoints() {
            endpoints.push((seg.layers.clone(), p));
        }
    }
    let candidates: BTreeSet<(Layers, Point)> = endpoints
        .iter()
        .cloned()
        .chain(v.solder_dots().map(|(_, d)| (d.layers.clone(), d.at)))
        .collect();

    for (layers, point) in candidates {
        let meeting = endpoints
            .iter()
            .filter(|(l, p)| *l == layers && *p == point)
            .count();
        let dots = v
            .solder_dots()
            .filter(|(_, d)| d.layers == layers && d.at == point)
            .count();
        assert_eq!(
            dots,
            usize::from(meeting >= 3),
            "{meeting} endpoints at {point} on {layers}"
        );
    }
}

/// Declare a test that renders the hierarchy of `work/<top>/schematic`
/// from a JSON library and compares it to an inline snapshot.
#[macro_export]
macro_rules! snapshot_hierarchy {
    ($name:ident, $json:expr, $top:expr, @$snapshot:literal) => {
        #[test]
        fn $name() {
            let mut db = $crate::common::load($json);
            let view = db
                .view_by_name("work", $top, pschem_database::ViewKind::Schematic)
                .unwrap();
            let design = db.add_design(view).unwrap();
            let rendered = db.render_hierarchy(design, None).unwrap();
            insta::assert_snapshot!(rendered, @$snapshot);
        }
    };
}
