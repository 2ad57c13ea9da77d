//! JSON interchange for libraries.
//!
//! A [`LibraryDescription`] is a plain serde tree (library → cells → views
//! → elements). [`Importer`] materialises one into a [`Database`] and
//! [`Database::export_library`] produces one back.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::database::{Database, LibraryKey, ViewKind};
use crate::element::Element;
use crate::error::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Invalid library description: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDescription {
    pub name: String,
    #[serde(default)]
    pub cells: Vec<CellDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDescription {
    pub name: String,
    #[serde(default)]
    pub views: Vec<ViewDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDescription {
    pub kind: ViewKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// Loads library descriptions into a database.
#[derive(Debug, Clone)]
pub struct Importer {
    target_library: String,
    overwrite: bool,
}

impl Default for Importer {
    fn default() -> Self {
        Self {
            target_library: "work".to_owned(),
            overwrite: false,
        }
    }
}

impl Importer {
    pub fn new(target_library: impl Into<String>) -> Self {
        Self {
            target_library: target_library.into(),
            ..Self::default()
        }
    }

    /// Replace cells that already exist in the target library instead of
    /// failing with [`DatabaseError::DuplicateCell`].
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn target_library(&self) -> &str {
        &self.target_library
    }

    pub fn import_path(&self, db: &mut Database, path: &Path) -> Result<LibraryKey, ImportError> {
        log::debug!("Importing {} into {}", path.display(), self.target_library);
        let content =
            fs::read_to_string(path).map_err(|e| ImportError::Read(path.to_path_buf(), e))?;
        self.import_str(db, &content)
    }

    pub fn import_str(&self, db: &mut Database, json: &str) -> Result<LibraryKey, ImportError> {
        let description: LibraryDescription = serde_json::from_str(json)?;
        self.import(db, &description)
    }

    /// Add every cell of `description` to the target library, creating the
    /// library if needed.
    ///
    /// Instances that refer to the description's own library are redirected
    /// to the target library.
    pub fn import(
        &self,
        db: &mut Database,
        description: &LibraryDescription,
    ) -> Result<LibraryKey, ImportError> {
        let library = match db.library_by_name(&self.target_library) {
            Some(library) => library,
            None => db.add_library(self.target_library.clone())?,
        };

        for cell in &description.cells {
            if let Some(existing) = db.cell_by_name(&self.target_library, &cell.name) {
                if !self.overwrite {
                    return Err(DatabaseError::DuplicateCell(format!(
                        "{}/{}",
                        self.target_library, cell.name
                    ))
                    .into());
                }
                log::debug!("Overwriting cell {}/{}", self.target_library, cell.name);
                db.remove_cell(existing)?;
            }

            let cell_key = db.add_cell(library, cell.name.clone())?;
            for view in &cell.views {
                let view_key = db.add_view(cell_key, view.kind)?;
                for (key, value) in &view.attributes {
                    db.set_view_attribute(view_key, key.clone(), value.clone())?;
                }
                for element in &view.elements {
                    db.add_elem(view_key, self.retarget(&description.name, element.clone()))?;
                }
            }
        }

        log::debug!(
            "Imported {} cells from {} into {}",
            description.cells.len(),
            description.name,
            self.target_library
        );
        Ok(library)
    }

    fn retarget(&self, source_library: &str, element: Element) -> Element {
        match element {
            Element::Instance(mut instance) if instance.library == source_library => {
                instance.library = self.target_library.clone();
                Element::Instance(instance)
            }
            other => other,
        }
    }
}

impl Database {
    /// Describe a library, with each view's elements sorted by element name.
    pub fn export_library(&self, library: LibraryKey) -> Result<LibraryDescription, DatabaseError> {
        let lib = self
            .library(library)
            .ok_or_else(|| DatabaseError::UnknownLibrary(format!("{library:?}")))?;

        let mut cells = Vec::new();
        for (name, cell_key) in lib.cells() {
            let cell = self
                .cell(cell_key)
                .ok_or_else(|| DatabaseError::UnknownCell(name.to_owned()))?;
            let mut views = Vec::new();
            for (_, view_key) in cell.views() {
                let view = self.view_ref(view_key)?;
                let mut elements: Vec<Element> =
                    view.elements().map(|(_, e)| e.clone()).collect();
                elements.sort_by_cached_key(Element::name);
                views.push(ViewDescription {
                    kind: view.kind(),
                    attributes: view.attributes().clone(),
                    elements,
                });
            }
            cells.push(CellDescription {
                name: name.to_owned(),
                views,
            });
        }

        Ok(LibraryDescription {
            name: lib.name().to_owned(),
            cells,
        })
    }
}
