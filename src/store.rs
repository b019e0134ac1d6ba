//! Capabilities consumed from the host world.
//!
//! Capture and apply never touch global state; they receive a host that
//! implements [`CellStore`] and [`FixtureRegistry`]. [`crate::world::MemoryWorld`]
//! is the in-process implementation.

use crate::attachment::{
    AttachmentKind, ItemStack, SensorMode, CONTAINER_SLOTS, HAT_RACK_SLOTS, MANNEQUIN_SLOTS,
};
use crate::cell::Cell;
use crate::geometry::{Point, Rect};
use std::sync::{Arc, Mutex};

pub type FixtureId = u64;

pub trait CellStore {
    fn world_bounds(&self) -> Rect;

    /// Positions outside [`CellStore::world_bounds`] read as [`Cell::EMPTY`].
    fn read_cell(&self, pos: Point) -> Cell;

    /// Writes outside world bounds are ignored.
    fn write_cell(&mut self, pos: Point, cell: Cell);

    /// Drops observers' cached view of `rect` so they resend it.
    fn invalidate(&mut self, rect: Rect);

    /// Requests that world state is persisted soon.
    fn schedule_flush(&mut self);
}

/// Live fixture entities, keyed by kind and anchor position.
pub trait FixtureRegistry {
    fn find(&self, kind: AttachmentKind, pos: Point) -> Option<FixtureId>;

    /// Registers a fresh, empty fixture. `None` when the host refuses.
    fn place(&mut self, kind: AttachmentKind, pos: Point) -> Option<FixtureId>;

    /// Returns whether a registration existed.
    fn kill(&mut self, kind: AttachmentKind, pos: Point) -> bool;

    fn state(&self, id: FixtureId) -> Option<&FixtureState>;

    fn state_mut(&mut self, id: FixtureId) -> Option<&mut FixtureState>;
}

pub trait Host: CellStore + FixtureRegistry {}

impl<T: CellStore + FixtureRegistry + ?Sized> Host for T {}

pub type SharedHost<H> = Arc<Mutex<H>>;

/// Mutable contents of a live fixture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FixtureState {
    Container { slots: Vec<ItemStack> },
    Sign { text: String },
    /// Item frames, weapon racks and food platters.
    Display { item: ItemStack },
    /// Mannequins and hat racks.
    Outfit {
        items: Vec<ItemStack>,
        dyes: Vec<ItemStack>,
    },
    Sensor { mode: SensorMode },
}

impl FixtureState {
    pub fn empty_for(kind: AttachmentKind) -> Self {
        match kind {
            AttachmentKind::Container => FixtureState::Container {
                slots: vec![ItemStack::EMPTY; CONTAINER_SLOTS],
            },
            AttachmentKind::Sign => FixtureState::Sign {
                text: String::new(),
            },
            AttachmentKind::ItemFrame
            | AttachmentKind::WeaponRack
            | AttachmentKind::FoodPlatter => FixtureState::Display {
                item: ItemStack::EMPTY,
            },
            AttachmentKind::Mannequin => FixtureState::Outfit {
                items: vec![ItemStack::EMPTY; MANNEQUIN_SLOTS],
                dyes: vec![ItemStack::EMPTY; MANNEQUIN_SLOTS],
            },
            AttachmentKind::HatRack => FixtureState::Outfit {
                items: vec![ItemStack::EMPTY; HAT_RACK_SLOTS],
                dyes: vec![ItemStack::EMPTY; HAT_RACK_SLOTS],
            },
            AttachmentKind::LogicSensor => FixtureState::Sensor {
                mode: SensorMode::default(),
            },
        }
    }
}
