use crate::attachment::Attachments;
use crate::cell::{Cell, Grid};
use crate::fixtures::extract_at;
use crate::geometry::{Offset, Point, Rect};
use crate::store::{CellStore, FixtureRegistry};
use log::debug;
use web_time::Instant;

/// A captured rectangular region: cells plus positioned fixture contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    origin: Point,
    cells: Grid<Cell>,
    attachments: Attachments,
}

impl Snapshot {
    /// Builds a snapshot from parts. Returns `None` when an attachment lies
    /// outside the `cells` footprint anchored at `origin`.
    pub fn from_parts(origin: Point, cells: Grid<Cell>, attachments: Attachments) -> Option<Self> {
        let snapshot = Self {
            origin,
            cells,
            attachments,
        };
        let footprint = snapshot.footprint();
        let inside = snapshot.attachments.iter().all(|attachment| {
            footprint.is_some_and(|rect| rect.contains(attachment.position()))
        });
        inside.then_some(snapshot)
    }

    pub fn empty_at(origin: Point) -> Self {
        Self {
            origin,
            cells: Grid::new(0, 0),
            attachments: Attachments::new(),
        }
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn width(&self) -> u32 {
        self.cells.width()
    }

    pub fn height(&self) -> u32 {
        self.cells.height()
    }

    pub fn cells(&self) -> &Grid<Cell> {
        &self.cells
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Capture-time rectangle, `None` for an empty snapshot.
    pub fn footprint(&self) -> Option<Rect> {
        Rect::from_origin_size(self.origin, self.width(), self.height())
    }

    /// Footprint this snapshot covers once applied at `target_origin`.
    pub fn footprint_at(&self, target_origin: Point) -> Option<Rect> {
        Rect::from_origin_size(target_origin, self.width(), self.height())
    }

    /// Cell at an absolute capture-time position.
    pub fn cell_at(&self, pos: Point) -> Option<&Cell> {
        let local = pos - self.origin;
        let x = u32::try_from(local.dx).ok()?;
        let y = u32::try_from(local.dy).ok()?;
        self.cells.get(x, y)
    }

    /// The same region relocated by `offset`.
    pub fn translated(&self, offset: Offset) -> Snapshot {
        Snapshot {
            origin: self.origin + offset,
            cells: self.cells.clone(),
            attachments: self.attachments.translated(offset),
        }
    }
}

/// Captures `rect` from the host, clipped to world bounds.
///
/// Read-only. A rectangle entirely outside the world yields an empty snapshot
/// anchored at the rectangle's minimum corner.
pub fn capture<H: CellStore + FixtureRegistry + ?Sized>(host: &H, rect: Rect) -> Snapshot {
    let start = Instant::now();
    let Some(clipped) = rect.intersect(&host.world_bounds()) else {
        debug!("capture {rect} lies outside the world; nothing captured");
        return Snapshot::empty_at(rect.min);
    };
    if clipped != rect {
        debug!("capture {rect} clipped to {clipped}");
    }

    let mut cells = Vec::with_capacity(clipped.cell_count() as usize);
    let mut attachments = Attachments::new();
    for pos in clipped.positions() {
        let cell = host.read_cell(pos);
        extract_at(host, &cell, pos, &mut attachments);
        cells.push(cell);
    }

    let grid = Grid::from_column_major(clipped.width(), clipped.height(), cells)
        .unwrap_or_else(|| Grid::new(clipped.width(), clipped.height()));
    debug!(
        "captured {clipped}: {} cells, {} attachments in {:.3} ms",
        grid.len(),
        attachments.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Snapshot {
        origin: clipped.min,
        cells: grid,
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{Attachment, AttachmentKind, ItemStack};
    use crate::store::FixtureState;
    use crate::world::MemoryWorld;

    #[test]
    fn capture_normalizes_corners_and_is_column_major() {
        let mut world = MemoryWorld::new(32, 32);
        world.write_cell(Point::new(5, 6), Cell::solid(7));
        world.write_cell(Point::new(6, 5), Cell::solid(8));

        let snapshot = capture(
            &world,
            Rect::from_corners(Point::new(6, 6), Point::new(5, 5)),
        );
        assert_eq!(snapshot.origin(), Point::new(5, 5));
        assert_eq!(snapshot.width(), 2);
        assert_eq!(snapshot.height(), 2);
        let tiles: Vec<u16> = snapshot
            .cells()
            .as_slice()
            .iter()
            .map(|cell| cell.tile_type)
            .collect();
        assert_eq!(tiles, vec![0, 7, 8, 0]);
    }

    #[test]
    fn capture_is_read_only() {
        let mut world = MemoryWorld::new(16, 16);
        world
            .build_fixture(AttachmentKind::Sign, Point::new(2, 2))
            .expect("sign");
        let before_fixtures = world.fixture_count();
        let _ = capture(
            &world,
            Rect::from_corners(Point::new(0, 0), Point::new(15, 15)),
        );
        assert_eq!(world.fixture_count(), before_fixtures);
        assert!(!world.flush_requested());
    }

    #[test]
    fn capture_clips_to_world_bounds() {
        let world = MemoryWorld::new(10, 10);
        let snapshot = capture(
            &world,
            Rect::from_corners(Point::new(-5, 8), Point::new(3, 20)),
        );
        assert_eq!(snapshot.origin(), Point::new(0, 8));
        assert_eq!(snapshot.width(), 4);
        assert_eq!(snapshot.height(), 2);

        let outside = capture(
            &world,
            Rect::from_corners(Point::new(50, 50), Point::new(60, 60)),
        );
        assert!(outside.is_empty());
        assert_eq!(outside.origin(), Point::new(50, 50));
    }

    #[test]
    fn fixture_cut_by_capture_edge_emits_only_when_anchor_inside() {
        let mut world = MemoryWorld::new(16, 16);
        let id = world
            .build_fixture(AttachmentKind::ItemFrame, Point::new(4, 4))
            .expect("frame");
        if let Some(FixtureState::Display { item }) = world.state_mut(id) {
            *item = ItemStack::new(3, 1, 0);
        }

        let without_anchor = capture(
            &world,
            Rect::from_corners(Point::new(5, 5), Point::new(8, 8)),
        );
        assert!(without_anchor.attachments().is_empty());

        let with_anchor = capture(
            &world,
            Rect::from_corners(Point::new(4, 4), Point::new(4, 4)),
        );
        assert_eq!(
            with_anchor.attachments().iter().collect::<Vec<_>>(),
            vec![&Attachment::ItemFrame {
                position: Point::new(4, 4),
                item: ItemStack::new(3, 1, 0),
            }]
        );
    }

    #[test]
    fn from_parts_rejects_attachments_outside_footprint() {
        let mut attachments = Attachments::new();
        attachments.push(Attachment::Sign {
            position: Point::new(10, 10),
            text: String::new(),
        });
        assert!(Snapshot::from_parts(Point::ORIGIN, Grid::new(4, 4), attachments).is_none());
    }

    #[test]
    fn translated_moves_origin_and_attachments() {
        let mut world = MemoryWorld::new(16, 16);
        world
            .build_fixture(AttachmentKind::LogicSensor, Point::new(1, 1))
            .expect("sensor");
        let snapshot = capture(
            &world,
            Rect::from_corners(Point::new(0, 0), Point::new(3, 3)),
        );
        let moved = snapshot.translated(Offset::new(10, 2));
        assert_eq!(moved.origin(), Point::new(10, 2));
        let positions: Vec<_> = moved.attachments().iter().map(Attachment::position).collect();
        assert_eq!(positions, vec![Point::new(11, 3)]);
        assert_eq!(moved.cells(), snapshot.cells());
    }
}
