//! Net consolidation.
//!
//! Two caller-triggered repairs restore the wiring invariants of a view
//! after an edit:
//!
//! - [`Database::check_net_segments`] splits a segment wherever another
//!   segment on the same layers ends strictly inside it, so that wires only
//!   ever meet at endpoints.
//! - [`Database::check_solder_dots`] places a solder dot wherever three or
//!   more segment endpoints coincide and removes dots that no longer mark a
//!   junction.
//!
//! Both passes go through [`Database::add_elem`] and
//! [`Database::remove_elem`], so attached scenes observe every individual
//! change. Replacement pieces are always added before the segment they
//! replace is removed.

use std::fmt;

use indexmap::IndexSet;

use crate::database::{Database, ElementKey, ViewKey};
use crate::element::{Element, NetSegment, SolderDot};
use crate::error::{DatabaseError, Result};
use crate::geometry::{Layers, Point};

/// Number of elements a consolidation pass added and removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub added: usize,
    pub removed: usize,
}

impl ConsolidationReport {
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

impl std::ops::AddAssign for ConsolidationReport {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.removed += other.removed;
    }
}

impl fmt::Display for ConsolidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} added, {} removed", self.added, self.removed)
    }
}

impl Database {
    /// The non-degenerate segments of `view` (or of `subset`, which must
    /// belong to `view`), in view order.
    fn segment_snapshot(
        &self,
        view: ViewKey,
        subset: Option<&[ElementKey]>,
    ) -> Result<Vec<(ElementKey, NetSegment)>> {
        let v = self.view_ref(view)?;
        let snapshot = match subset {
            None => v
                .net_segments()
                .map(|(key, seg)| (key, seg.clone()))
                .collect(),
            Some(keys) => {
                let mut segments = Vec::with_capacity(keys.len());
                for key in keys {
                    let element = v
                        .element(*key)
                        .ok_or_else(|| DatabaseError::UnknownElement(format!("{key:?}")))?;
                    if let Element::NetSegment(seg) = element {
                        segments.push((*key, seg.clone()));
                    }
                }
                segments
            }
        };
        Ok(snapshot
            .into_iter()
            .filter(|(_, seg)| !seg.span.is_degenerate())
            .collect())
    }

    fn has_segment_like(&self, view: ViewKey, segment: &NetSegment) -> bool {
        self.views[view]
            .net_segments()
            .any(|(_, existing)| existing.same_as(segment))
    }

    /// Remove snapshot segments that repeat an earlier segment of the view.
    fn remove_duplicate_segments(
        &mut self,
        view: ViewKey,
        snapshot: Vec<(ElementKey, NetSegment)>,
        report: &mut ConsolidationReport,
    ) -> Result<Vec<(ElementKey, NetSegment)>> {
        let mut kept = Vec::with_capacity(snapshot.len());
        for (key, seg) in snapshot {
            let duplicate = self.views[view]
                .net_segments()
                .take_while(|(other, _)| *other != key)
                .any(|(_, other)| other.same_as(&seg));
            if duplicate {
                log::debug!("Removing duplicate segment {} {}", seg.layers, seg.span);
                self.remove_elem(key)?;
                report.removed += 1;
            } else {
                kept.push((key, seg));
            }
        }
        Ok(kept)
    }

    /// Split every segment at the endpoints of other segments (on the same
    /// layers) that lie strictly inside it.
    ///
    /// This is a single pass over a snapshot of `subset`, or of all segments
    /// of `view` when `subset` is `None`; pieces created by the pass are not
    /// re-examined. Zero-length segments are ignored. A piece that repeats a
    /// segment already in the view is not added, and a snapshot segment that
    /// repeats an earlier segment of the view is removed.
    pub fn check_net_segments(
        &mut self,
        view: ViewKey,
        subset: Option<&[ElementKey]>,
    ) -> Result<ConsolidationReport> {
        let mut report = ConsolidationReport::default();
        let snapshot = self.segment_snapshot(view, subset)?;
        let snapshot = self.remove_duplicate_segments(view, snapshot, &mut report)?;

        for (key, seg) in &snapshot {
            let split_points: IndexSet<Point> = snapshot
                .iter()
                .filter(|(other, s)| other != key && s.layers == seg.layers)
                .flat_map(|(_, s)| s.span.endpoints())
                .filter(|p| seg.contains_inside(*p))
                .collect();
            if split_points.is_empty() {
                continue;
            }

            let pieces = seg.split_at(split_points)?;
            log::debug!(
                "Splitting {} {} into {} pieces",
                seg.layers,
                seg.span,
                pieces.len()
            );
            for piece in pieces {
                if self.has_segment_like(view, &piece) {
                    log::trace!("Piece {} already present", piece.span);
                    continue;
                }
                self.add_elem(view, piece)?;
                report.added += 1;
            }
            self.remove_elem(*key)?;
            report.removed += 1;
        }
        Ok(report)
    }

    /// Make solder dots match the junctions of `view`.
    ///
    /// Only the endpoints of `subset` (all segments when `None`) are
    /// visited, but endpoints are counted against every segment of the view.
    /// A point on a layer set needs exactly one dot when three or more
    /// segments on those layers end there, and none otherwise. Without a
    /// subset, dots at points where no segment ends are removed as well.
    pub fn check_solder_dots(
        &mut self,
        view: ViewKey,
        subset: Option<&[ElementKey]>,
    ) -> Result<ConsolidationReport> {
        let mut report = ConsolidationReport::default();
        let all = self.segment_snapshot(view, None)?;
        let visited: IndexSet<(Point, Layers)> = self
            .segment_snapshot(view, subset)?
            .into_iter()
            .flat_map(|(_, seg)| seg.span.endpoints().map(|p| (p, seg.layers.clone())))
            .collect();

        for (point, layers) in &visited {
            let count = all
                .iter()
                .filter(|(_, seg)| seg.layers == *layers && seg.span.has_endpoint(*point))
                .count();
            let dots = self.dots_at(view, *point, layers);

            if count >= 3 {
                if dots.is_empty() {
                    log::debug!("Adding solder dot at {point} on {layers} ({count} segments)");
                    self.add_elem(view, SolderDot::new(layers.clone(), *point))?;
                    report.added += 1;
                }
                for surplus in dots.into_iter().skip(1) {
                    log::debug!("Removing surplus solder dot at {point}");
                    self.remove_elem(surplus)?;
                    report.removed += 1;
                }
            } else {
                for dot in dots {
                    log::debug!("Removing solder dot at {point} on {layers} ({count} segments)");
                    self.remove_elem(dot)?;
                    report.removed += 1;
                }
            }
        }

        if subset.is_none() {
            let orphans: Vec<ElementKey> = self.views[view]
                .solder_dots()
                .filter(|(_, dot)| !visited.contains(&(dot.at, dot.layers.clone())))
                .map(|(key, _)| key)
                .collect();
            for dot in orphans {
                log::debug!("Removing solder dot without segments {dot:?}");
                self.remove_elem(dot)?;
                report.removed += 1;
            }
        }
        Ok(report)
    }

    /// Run [`check_net_segments`](Self::check_net_segments) followed by
    /// [`check_solder_dots`](Self::check_solder_dots) over the whole view.
    pub fn consolidate(&mut self, view: ViewKey) -> Result<ConsolidationReport> {
        let mut report = self.check_net_segments(view, None)?;
        report += self.check_solder_dots(view, None)?;
        log::debug!("Consolidated {}: {report}", self.view_path(view)?);
        Ok(report)
    }

    fn dots_at(&self, view: ViewKey, point: Point, layers: &Layers) -> Vec<ElementKey> {
        self.views[view]
            .solder_dots()
            .filter(|(_, dot)| dot.at == point && dot.layers == *layers)
            .map(|(key, _)| key)
            .collect()
    }
}
