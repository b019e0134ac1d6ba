use super::*;
use crate::attachment::{Attachment, AttachmentKind, ItemStack, SensorMode};
use crate::cell::Cell;
use crate::codec;
use crate::geometry::Offset;
use crate::storage::test_root;
use crate::store::{CellStore, FixtureRegistry, FixtureState};
use crate::undo::DEFAULT_UNDO_DEPTH;
use crate::world::MemoryWorld;

const ACTOR: ActorId = ActorId(11);

#[derive(Clone, Copy)]
struct TestRng {
    state: u64,
}

impl TestRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 32) as u32
    }

    fn below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound.max(1)
    }

    fn item(&mut self) -> ItemStack {
        ItemStack::new(1 + self.below(4000) as i32, 1 + self.below(250) as i32, self.below(60) as u8)
    }
}

fn region(x0: i32, y0: i32, x1: i32, y1: i32) -> Rect {
    Rect::from_corners(Point::new(x0, y0), Point::new(x1, y1))
}

fn service(world: MemoryWorld, name: &str) -> Clipboard<MemoryWorld> {
    let config = ClipConfig::with_data_dir(test_root(name));
    Clipboard::with_undo_log(
        Arc::new(Mutex::new(world)),
        config,
        UndoLog::in_memory(DEFAULT_UNDO_DEPTH),
    )
}

fn snapshot_of(clipboard: &Clipboard<MemoryWorld>, rect: Rect) -> Snapshot {
    let host = clipboard.host().lock().expect("host lock");
    capture(&*host, rect)
}

fn undo_len(clipboard: &Clipboard<MemoryWorld>) -> usize {
    clipboard
        .undo_log()
        .lock()
        .expect("undo lock")
        .len(ACTOR)
        .expect("undo len")
}

/// Fills `rect` with random terrain and a lattice of stocked fixtures.
fn furnish(world: &mut MemoryWorld, rng: &mut TestRng, rect: Rect) {
    for pos in rect.positions() {
        if rng.below(3) == 0 {
            let cell = Cell::solid(1 + rng.below(300) as u16).with_wall(rng.below(20) as u16);
            world.write_cell(pos, cell);
        }
    }
    let mut x = rect.min.x;
    while x <= rect.max.x {
        let mut y = rect.min.y;
        while y <= rect.max.y {
            let kind = AttachmentKind::ORDER[rng.below(8) as usize];
            if let Some(id) = world.build_fixture(kind, Point::new(x, y)) {
                stock(world, id, rng);
            }
            y += 5;
        }
        x += 4;
    }
}

fn stock(world: &mut MemoryWorld, id: u64, rng: &mut TestRng) {
    let Some(state) = world.state_mut(id) else {
        return;
    };
    match state {
        FixtureState::Container { slots } => {
            for _ in 0..3 {
                let slot = rng.below(slots.len() as u32) as usize;
                slots[slot] = rng.item();
            }
        }
        FixtureState::Sign { text } => *text = format!("note {}", rng.below(1000)),
        FixtureState::Display { item } => *item = rng.item(),
        FixtureState::Outfit { items, dyes } => {
            items.iter_mut().for_each(|item| *item = rng.item());
            dyes.iter_mut().for_each(|dye| *dye = rng.item());
        }
        FixtureState::Sensor { mode } => {
            *mode = SensorMode::ALL[rng.below(SensorMode::ALL.len() as u32) as usize];
        }
    }
}

#[test]
fn paste_at_capture_origin_restores_region() {
    let mut rng = TestRng::new(1);
    let mut world = MemoryWorld::new(64, 64);
    furnish(&mut world, &mut rng, region(0, 0, 15, 15));
    let clipboard = service(world, "clipboard-identity");

    let rect = region(2, 3, 13, 14);
    let original = clipboard.copy(ACTOR, rect).expect("copy");
    {
        let mut host = clipboard.host().lock().expect("host lock");
        for pos in rect.positions() {
            host.write_cell(pos, Cell::EMPTY);
        }
    }
    clipboard
        .paste(ACTOR, original.clone(), original.origin())
        .expect("paste")
        .wait()
        .expect("apply");
    assert_eq!(snapshot_of(&clipboard, rect), original);
}

#[test]
fn pasted_attachments_follow_translation() {
    let mut rng = TestRng::new(0xfeed);
    let mut world = MemoryWorld::new(160, 96);
    furnish(&mut world, &mut rng, region(0, 0, 19, 19));
    let clipboard = service(world, "clipboard-translation");
    let copied = clipboard.copy(ACTOR, region(0, 0, 19, 19)).expect("copy");
    assert!(!copied.attachments().is_empty());

    for _ in 0..6 {
        let target = Point::new(30 + rng.below(100) as i32, 25 + rng.below(50) as i32);
        let offset = target - copied.origin();
        clipboard
            .paste(ACTOR, copied.clone(), target)
            .expect("paste")
            .wait()
            .expect("apply");
        let landed = snapshot_of(&clipboard, copied.footprint_at(target).expect("footprint"));
        assert_eq!(landed, copied.translated(offset), "paste at {target}");
    }
}

#[test]
fn undo_inverts_paste() {
    let mut rng = TestRng::new(99);
    let mut world = MemoryWorld::new(96, 64);
    furnish(&mut world, &mut rng, region(0, 0, 23, 23));
    furnish(&mut world, &mut rng, region(40, 10, 63, 33));
    let clipboard = service(world, "clipboard-undo");

    let copied = clipboard.copy(ACTOR, region(0, 0, 11, 11)).expect("copy");
    let target = Point::new(45, 15);
    let footprint = copied.footprint_at(target).expect("footprint");
    let before = snapshot_of(&clipboard, footprint);

    clipboard
        .paste(ACTOR, copied.clone(), target)
        .expect("paste")
        .wait()
        .expect("apply");
    assert_ne!(snapshot_of(&clipboard, footprint), before);
    assert_eq!(undo_len(&clipboard), 1);

    clipboard.undo(ACTOR).expect("undo").wait().expect("apply");
    assert_eq!(snapshot_of(&clipboard, footprint), before);
    assert_eq!(undo_len(&clipboard), 0);
}

#[test]
fn paste_past_world_edge_touches_only_in_bound_cells() {
    let mut world = MemoryWorld::new(40, 40);
    for pos in region(0, 0, 5, 5).positions() {
        world.write_cell(pos, Cell::solid(9));
    }
    let clipboard = service(world, "clipboard-clip");
    let copied = clipboard.copy(ACTOR, region(-10, -10, 5, 5)).expect("copy");
    assert_eq!(copied.origin(), Point::ORIGIN);

    let report = clipboard
        .paste(ACTOR, copied.clone(), Point::new(37, 38))
        .expect("paste")
        .wait()
        .expect("apply");
    assert_eq!(report.cells_written, 6);
    assert_eq!(report.cells_clipped, 30);

    let mut host = clipboard.host().lock().expect("host lock");
    assert_eq!(host.read_cell(Point::new(39, 39)), Cell::solid(9));
    assert_eq!(host.read_cell(Point::new(36, 38)), Cell::EMPTY);
    assert_eq!(host.take_invalidations(), vec![region(37, 38, 39, 39)]);
}

#[test]
fn undo_stack_is_lifo() {
    let world = MemoryWorld::new(32, 32);
    let clipboard = service(world, "clipboard-lifo");
    let spot = region(4, 4, 6, 6);
    let states: Vec<Snapshot> = [1u16, 2, 3]
        .into_iter()
        .map(|tile| {
            let mut scratch = MemoryWorld::new(8, 8);
            for pos in region(4, 4, 6, 6).positions() {
                scratch.write_cell(pos, Cell::solid(tile));
            }
            capture(&scratch, spot)
        })
        .collect();

    let empty = snapshot_of(&clipboard, spot);
    for state in &states {
        clipboard
            .paste(ACTOR, state.clone(), state.origin())
            .expect("paste")
            .wait()
            .expect("apply");
    }
    assert_eq!(undo_len(&clipboard), 3);

    let expected = [states[1].clone(), states[0].clone(), empty];
    for want in expected {
        clipboard.undo(ACTOR).expect("undo").wait().expect("apply");
        assert_eq!(snapshot_of(&clipboard, spot), want);
    }
    assert!(matches!(
        clipboard.undo(ACTOR),
        Err(ClipError::NoSnapshot { actor: ACTOR })
    ));
    assert!(!clipboard.is_running(ACTOR));
}

#[test]
fn second_operation_is_busy_while_first_runs() {
    let clipboard = service(MemoryWorld::new(32, 32), "clipboard-busy");
    let copied = clipboard.copy(ACTOR, region(0, 0, 3, 3)).expect("copy");

    let held = clipboard.host().lock().expect("host lock");
    let pending = clipboard
        .paste(ACTOR, copied.clone(), Point::new(10, 10))
        .expect("paste");
    assert!(clipboard.is_running(ACTOR));
    assert!(matches!(
        clipboard.copy(ACTOR, region(0, 0, 1, 1)),
        Err(ClipError::Busy { actor: ACTOR })
    ));
    assert!(matches!(
        clipboard.undo(ACTOR),
        Err(ClipError::Busy { actor: ACTOR })
    ));
    drop(held);

    pending.wait().expect("apply");
    assert!(!clipboard.is_running(ACTOR));
    assert!(clipboard.copy(ActorId(12), region(0, 0, 1, 1)).is_ok());
    assert!(clipboard.copy(ACTOR, region(0, 0, 1, 1)).is_ok());
}

#[test]
fn container_survives_encode_and_shifted_paste() {
    let mut world = MemoryWorld::new(200, 40);
    let chest = Point::new(3, 4);
    let id = world
        .build_fixture(AttachmentKind::Container, chest)
        .expect("chest");
    let item = ItemStack::new(29, 1, 7);
    if let Some(FixtureState::Container { slots }) = world.state_mut(id) {
        slots[3] = item;
    }
    let clipboard = service(world, "clipboard-container");

    let copied = clipboard.copy(ACTOR, region(0, 0, 9, 9)).expect("copy");
    let bytes = codec::encode(&copied).expect("encode");
    let decoded = codec::decode(&bytes).expect("decode");
    assert_eq!(decoded, copied);

    clipboard
        .paste(ACTOR, decoded, Point::new(100, 0))
        .expect("paste")
        .wait()
        .expect("apply");

    let host = clipboard.host().lock().expect("host lock");
    let moved = Point::new(103, 4);
    let moved_id = host
        .find(AttachmentKind::Container, moved)
        .expect("translated chest");
    let Some(FixtureState::Container { slots }) = host.state(moved_id) else {
        panic!("translated fixture is not a container");
    };
    for (index, slot) in slots.iter().enumerate() {
        if index == 3 {
            assert_eq!(*slot, item);
        } else {
            assert!(slot.is_empty(), "slot {index} holds {slot:?}");
        }
    }
    assert_eq!(
        host.fixtures_of_kind(AttachmentKind::Container),
        vec![chest, moved]
    );
}

#[test]
fn cancelled_paste_leaves_world_and_log_untouched() {
    let mut rng = TestRng::new(5);
    let mut world = MemoryWorld::new(64, 64);
    furnish(&mut world, &mut rng, region(20, 20, 35, 35));
    let clipboard = service(world, "clipboard-cancel");
    let target = region(20, 20, 31, 31);
    let before = snapshot_of(&clipboard, target);
    let blank = snapshot_of(&clipboard, region(50, 50, 61, 61));

    let held = clipboard.host().lock().expect("host lock");
    let pending = clipboard
        .paste(ACTOR, blank, target.min)
        .expect("paste");
    assert!(clipboard.cancel(ACTOR));
    drop(held);

    assert!(matches!(pending.wait(), Err(ClipError::Cancelled)));
    assert_eq!(snapshot_of(&clipboard, target), before);
    assert_eq!(undo_len(&clipboard), 0);
    assert!(!clipboard.is_running(ACTOR));
}

#[test]
fn redo_reapplies_what_undo_reverted() {
    let mut rng = TestRng::new(314);
    let mut world = MemoryWorld::new(64, 64);
    furnish(&mut world, &mut rng, region(0, 0, 11, 11));
    let clipboard = service(world, "clipboard-redo");
    let copied = clipboard.copy(ACTOR, region(0, 0, 11, 11)).expect("copy");
    let target = Point::new(30, 30);
    let footprint = copied.footprint_at(target).expect("footprint");

    clipboard
        .paste(ACTOR, copied.clone(), target)
        .expect("paste")
        .wait()
        .expect("apply");
    let pasted = snapshot_of(&clipboard, footprint);
    clipboard.undo(ACTOR).expect("undo").wait().expect("apply");
    let reverted = snapshot_of(&clipboard, footprint);

    clipboard.redo(ACTOR).expect("redo").wait().expect("apply");
    assert_eq!(snapshot_of(&clipboard, footprint), pasted);
    assert!(matches!(
        clipboard.redo(ACTOR),
        Err(ClipError::NoSnapshot { .. })
    ));

    clipboard.undo(ACTOR).expect("undo").wait().expect("apply");
    assert_eq!(snapshot_of(&clipboard, footprint), reverted);

    // A fresh paste discards what could have been redone.
    clipboard
        .paste(ACTOR, copied, Point::new(45, 45))
        .expect("paste")
        .wait()
        .expect("apply");
    assert!(matches!(
        clipboard.redo(ACTOR),
        Err(ClipError::NoSnapshot { .. })
    ));
}

#[test]
fn named_clips_round_trip_through_disk() {
    let mut world = MemoryWorld::new(64, 32);
    let id = world
        .build_fixture(AttachmentKind::Sign, Point::new(1, 1))
        .expect("sign");
    if let Some(FixtureState::Sign { text }) = world.state_mut(id) {
        *text = "welcome".to_string();
    }
    let clipboard = service(world, "clipboard-named");

    let saved = clipboard
        .copy_to_clip(ACTOR, region(0, 0, 4, 4), "porch")
        .expect("copy to clip");
    assert_eq!(clipboard.clips().list().expect("list"), vec!["porch"]);
    assert!(matches!(
        clipboard.copy_to_clip(ACTOR, region(0, 0, 4, 4), "no/slashes"),
        Err(ClipError::InvalidClipName(_))
    ));

    clipboard
        .paste_clip(ACTOR, "porch", Point::new(20, 10))
        .expect("paste clip")
        .wait()
        .expect("apply");
    assert_eq!(
        snapshot_of(&clipboard, region(20, 10, 24, 14)),
        saved.translated(Offset::new(20, 10))
    );
    assert!(matches!(
        clipboard.paste_clip(ACTOR, "missing", Point::ORIGIN),
        Err(ClipError::ClipNotFound(_))
    ));
}

#[test]
fn persisted_undo_survives_service_restart() {
    let root = test_root("clipboard-restart");
    let config = ClipConfig::with_data_dir(&root);
    let host = Arc::new(Mutex::new(MemoryWorld::new(32, 32)));
    let before = {
        let world = host.lock().expect("host lock");
        capture(&*world, region(8, 8, 11, 11))
    };
    {
        let clipboard = Clipboard::new(Arc::clone(&host), config.clone());
        let mut scratch = MemoryWorld::new(16, 16);
        for pos in region(0, 0, 3, 3).positions() {
            scratch.write_cell(pos, Cell::solid(5));
        }
        let block = capture(&scratch, region(0, 0, 3, 3));
        clipboard
            .paste(ACTOR, block, Point::new(8, 8))
            .expect("paste")
            .wait()
            .expect("apply");
    }
    assert!(root.join("undo").join(format!("{ACTOR}.undo")).exists());

    let restarted = Clipboard::new(Arc::clone(&host), config);
    restarted.undo(ACTOR).expect("undo").wait().expect("apply");
    let world = host.lock().expect("host lock");
    assert_eq!(capture(&*world, region(8, 8, 11, 11)), before);
}

#[test]
fn oversized_regions_are_refused() {
    let world = MemoryWorld::new(16, 16);
    let mut config = ClipConfig::with_data_dir(test_root("clipboard-too-large"));
    config.max_clip_cells = 10;
    let clipboard = Clipboard::with_undo_log(
        Arc::new(Mutex::new(world)),
        config,
        UndoLog::in_memory(DEFAULT_UNDO_DEPTH),
    );
    assert!(matches!(
        clipboard.copy(ACTOR, region(0, 0, 3, 3)),
        Err(ClipError::TooLarge {
            cells: 16,
            limit: 10
        })
    ));
    assert!(!clipboard.is_running(ACTOR));

    let mostly_off_world = clipboard
        .copy(ACTOR, region(-100, -100, 1, 1))
        .expect("only the in-world part counts");
    assert_eq!(mostly_off_world.cells().len(), 4);
}

#[test]
fn off_world_paste_leaves_undo_stack_alone() {
    let mut world = MemoryWorld::new(32, 32);
    world.write_cell(Point::new(1, 1), Cell::solid(5));
    let clipboard = service(world, "clipboard-off-world");
    let copied = clipboard.copy(ACTOR, region(0, 0, 3, 3)).expect("copy");
    clipboard
        .paste(ACTOR, copied.clone(), Point::new(10, 10))
        .expect("paste")
        .wait()
        .expect("apply");
    assert_eq!(undo_len(&clipboard), 1);

    let report = clipboard
        .paste(ACTOR, copied, Point::new(500, 500))
        .expect("paste")
        .wait()
        .expect("apply");
    assert_eq!(report.cells_written, 0);
    assert_eq!(report.cells_clipped, 16);
    assert_eq!(undo_len(&clipboard), 1);
}

#[test]
fn fixture_overlapping_region_edge_survives_paste_and_undo() {
    let mut world = MemoryWorld::new(64, 64);
    let chest = Point::new(9, 10);
    let id = world
        .build_fixture(AttachmentKind::Container, chest)
        .expect("chest");
    let item = ItemStack::new(77, 5, 0);
    if let Some(FixtureState::Container { slots }) = world.state_mut(id) {
        slots[0] = item;
    }
    let clipboard = service(world, "clipboard-straddle");
    let rect = region(10, 10, 15, 15);
    let copied = clipboard.copy(ACTOR, rect).expect("copy");
    assert!(copied.attachments().is_empty());

    let chest_slot = |clipboard: &Clipboard<MemoryWorld>| -> Option<ItemStack> {
        let host = clipboard.host().lock().expect("host lock");
        let id = host.find(AttachmentKind::Container, chest)?;
        let slot = match host.state(id) {
            Some(FixtureState::Container { slots }) => Some(slots[0]),
            _ => None,
        };
        slot
    };

    let report = clipboard
        .paste(ACTOR, copied.clone(), copied.origin())
        .expect("paste")
        .wait()
        .expect("apply");
    assert_eq!(report.fixtures_restored, 1);
    assert_eq!(chest_slot(&clipboard), Some(item));

    clipboard.undo(ACTOR).expect("undo").wait().expect("apply");
    assert_eq!(chest_slot(&clipboard), Some(item));
    assert_eq!(snapshot_of(&clipboard, rect), copied);
}

#[test]
fn sensor_mode_crosses_the_clipboard() {
    let mut world = MemoryWorld::new(32, 32);
    let id = world
        .build_fixture(AttachmentKind::LogicSensor, Point::new(2, 2))
        .expect("sensor");
    if let Some(FixtureState::Sensor { mode }) = world.state_mut(id) {
        *mode = SensorMode::Honey;
    }
    let clipboard = service(world, "clipboard-sensor");
    let copied = clipboard.copy(ACTOR, region(2, 2, 2, 2)).expect("copy");
    clipboard
        .paste(ACTOR, copied, Point::new(9, 9))
        .expect("paste")
        .wait()
        .expect("apply");
    let landed = snapshot_of(&clipboard, region(9, 9, 9, 9));
    assert_eq!(
        landed.attachments().iter().collect::<Vec<_>>(),
        vec![&Attachment::LogicSensor {
            position: Point::new(9, 9),
            mode: SensorMode::Honey,
        }]
    );
}
