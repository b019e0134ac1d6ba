use crate::attachment::AttachmentKind;
use crate::cell::{Cell, Grid, FRAME_STRIDE};
use crate::fixtures::spec_for_kind;
use crate::geometry::{Point, Rect};
use crate::store::{CellStore, FixtureId, FixtureRegistry, FixtureState};
use std::collections::HashMap;

/// In-process tile world: a dense cell grid plus a fixture table.
///
/// World bounds are `(0, 0)` to `(width - 1, height - 1)`.
#[derive(Debug)]
pub struct MemoryWorld {
    cells: Grid<Cell>,
    bounds: Rect,
    fixtures: HashMap<(AttachmentKind, Point), FixtureId>,
    states: HashMap<FixtureId, FixtureState>,
    next_fixture_id: FixtureId,
    /// Mirrors hosts with a fixed-size entity table; `place` fails once reached.
    fixture_limit: Option<usize>,
    pending_invalidations: Vec<Rect>,
    flush_requested: bool,
}

impl MemoryWorld {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.clamp(1, i32::MAX as u32);
        let height = height.clamp(1, i32::MAX as u32);
        let bounds = Rect::from_corners(
            Point::ORIGIN,
            Point::new((width - 1) as i32, (height - 1) as i32),
        );
        Self {
            cells: Grid::new(width, height),
            bounds,
            fixtures: HashMap::new(),
            states: HashMap::new(),
            next_fixture_id: 1,
            fixture_limit: None,
            pending_invalidations: Vec::new(),
            flush_requested: false,
        }
    }

    pub fn with_fixture_limit(mut self, limit: usize) -> Self {
        self.fixture_limit = Some(limit);
        self
    }

    pub fn fixture_count(&self) -> usize {
        self.states.len()
    }

    /// Anchors of every registered fixture of `kind`, sorted.
    pub fn fixtures_of_kind(&self, kind: AttachmentKind) -> Vec<Point> {
        let mut anchors: Vec<Point> = self
            .fixtures
            .keys()
            .filter(|(fixture_kind, _)| *fixture_kind == kind)
            .map(|(_, pos)| *pos)
            .collect();
        anchors.sort_unstable();
        anchors
    }

    /// Writes the framed tiles of a `kind` fixture with its anchor at `anchor`
    /// and registers it.
    pub fn build_fixture(&mut self, kind: AttachmentKind, anchor: Point) -> Option<FixtureId> {
        let spec = spec_for_kind(kind);
        for dx in 0..i32::from(spec.cols) {
            for dy in 0..i32::from(spec.rows) {
                let cell = Cell::framed(
                    spec.tile_type,
                    (dx as i16) * FRAME_STRIDE,
                    (dy as i16) * FRAME_STRIDE,
                );
                self.write_cell(Point::new(anchor.x + dx, anchor.y + dy), cell);
            }
        }
        self.place(kind, anchor)
    }

    pub fn take_invalidations(&mut self) -> Vec<Rect> {
        std::mem::take(&mut self.pending_invalidations)
    }

    pub fn flush_requested(&self) -> bool {
        self.flush_requested
    }

    pub fn clear_flush_request(&mut self) {
        self.flush_requested = false;
    }

    fn local(&self, pos: Point) -> Option<(u32, u32)> {
        self.bounds.contains(pos).then(|| {
            (
                (pos.x - self.bounds.min.x) as u32,
                (pos.y - self.bounds.min.y) as u32,
            )
        })
    }
}

impl CellStore for MemoryWorld {
    fn world_bounds(&self) -> Rect {
        self.bounds
    }

    fn read_cell(&self, pos: Point) -> Cell {
        self.local(pos)
            .and_then(|(x, y)| self.cells.get(x, y).copied())
            .unwrap_or(Cell::EMPTY)
    }

    fn write_cell(&mut self, pos: Point, cell: Cell) {
        if let Some((x, y)) = self.local(pos) {
            self.cells.set(x, y, cell);
        }
    }

    fn invalidate(&mut self, rect: Rect) {
        self.pending_invalidations.push(rect);
    }

    fn schedule_flush(&mut self) {
        self.flush_requested = true;
    }
}

impl FixtureRegistry for MemoryWorld {
    fn find(&self, kind: AttachmentKind, pos: Point) -> Option<FixtureId> {
        self.fixtures.get(&(kind, pos)).copied()
    }

    fn place(&mut self, kind: AttachmentKind, pos: Point) -> Option<FixtureId> {
        if !self.bounds.contains(pos) || self.fixtures.contains_key(&(kind, pos)) {
            return None;
        }
        if self
            .fixture_limit
            .is_some_and(|limit| self.states.len() >= limit)
        {
            return None;
        }
        let id = self.next_fixture_id;
        self.next_fixture_id += 1;
        self.fixtures.insert((kind, pos), id);
        self.states.insert(id, FixtureState::empty_for(kind));
        Some(id)
    }

    fn kill(&mut self, kind: AttachmentKind, pos: Point) -> bool {
        match self.fixtures.remove(&(kind, pos)) {
            Some(id) => {
                self.states.remove(&id);
                true
            }
            None => false,
        }
    }

    fn state(&self, id: FixtureId) -> Option<&FixtureState> {
        self.states.get(&id)
    }

    fn state_mut(&mut self, id: FixtureId) -> Option<&mut FixtureState> {
        self.states.get_mut(&id)
    }
}
