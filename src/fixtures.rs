use crate::attachment::{
    Attachment, AttachmentKind, Attachments, ItemStack, HAT_RACK_SLOTS, MANNEQUIN_SLOTS,
};
use crate::cell::Cell;
use crate::geometry::Point;
use crate::store::{FixtureRegistry, FixtureState};
use log::debug;

/// Footprint of a fixture tile type, in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixtureSpec {
    pub tile_type: u16,
    pub kind: AttachmentKind,
    pub cols: u8,
    pub rows: u8,
}

impl FixtureSpec {
    const fn new(tile_type: u16, kind: AttachmentKind, cols: u8, rows: u8) -> Self {
        Self {
            tile_type,
            kind,
            cols,
            rows,
        }
    }

    pub fn matches(&self, cell: &Cell) -> bool {
        cell.is_active() && cell.tile_type == self.tile_type
    }

    /// Only the top-left sub-cell of a fixture owns its registration.
    pub fn is_anchor(&self, cell: &Cell) -> bool {
        cell.frame_cell_offset(self.cols, self.rows) == (0, 0)
    }

    pub fn anchor_of(&self, cell: &Cell, pos: Point) -> Point {
        let (dx, dy) = cell.frame_cell_offset(self.cols, self.rows);
        Point::new(pos.x.wrapping_sub(dx), pos.y.wrapping_sub(dy))
    }
}

pub const TILE_CHEST: u16 = 21;
pub const TILE_SIGN: u16 = 55;
pub const TILE_TOMBSTONE: u16 = 85;
pub const TILE_DRESSER: u16 = 88;
pub const TILE_ITEM_FRAME: u16 = 395;
pub const TILE_LOGIC_SENSOR: u16 = 423;
pub const TILE_ANNOUNCEMENT_BOX: u16 = 425;
pub const TILE_CHEST_ALT: u16 = 467;
pub const TILE_MANNEQUIN: u16 = 470;
pub const TILE_WEAPON_RACK: u16 = 471;
pub const TILE_HAT_RACK: u16 = 475;
pub const TILE_FOOD_PLATTER: u16 = 520;

pub const FIXTURE_SPECS: &[FixtureSpec] = &[
    FixtureSpec::new(TILE_CHEST, AttachmentKind::Container, 2, 2),
    FixtureSpec::new(TILE_CHEST_ALT, AttachmentKind::Container, 2, 2),
    FixtureSpec::new(TILE_DRESSER, AttachmentKind::Container, 3, 2),
    FixtureSpec::new(TILE_SIGN, AttachmentKind::Sign, 2, 2),
    FixtureSpec::new(TILE_TOMBSTONE, AttachmentKind::Sign, 2, 2),
    FixtureSpec::new(TILE_ANNOUNCEMENT_BOX, AttachmentKind::Sign, 2, 2),
    FixtureSpec::new(TILE_ITEM_FRAME, AttachmentKind::ItemFrame, 2, 2),
    FixtureSpec::new(TILE_WEAPON_RACK, AttachmentKind::WeaponRack, 3, 3),
    FixtureSpec::new(TILE_FOOD_PLATTER, AttachmentKind::FoodPlatter, 1, 1),
    FixtureSpec::new(TILE_MANNEQUIN, AttachmentKind::Mannequin, 2, 3),
    FixtureSpec::new(TILE_HAT_RACK, AttachmentKind::HatRack, 3, 4),
    FixtureSpec::new(TILE_LOGIC_SENSOR, AttachmentKind::LogicSensor, 1, 1),
];

pub fn spec_for_cell(cell: &Cell) -> Option<&'static FixtureSpec> {
    FIXTURE_SPECS.iter().find(|spec| spec.matches(cell))
}

/// First tile type registered for `kind`.
pub fn spec_for_kind(kind: AttachmentKind) -> &'static FixtureSpec {
    FIXTURE_SPECS
        .iter()
        .find(|spec| spec.kind == kind)
        .unwrap_or(&FIXTURE_SPECS[0])
}

type Extractor = fn(AttachmentKind, Point, &FixtureState, &mut Attachments) -> bool;
type Applier = fn(&Attachment, &mut FixtureState) -> bool;

struct FixtureHandlers {
    kind: AttachmentKind,
    extract: Extractor,
    apply: Applier,
}

// Indexed by `AttachmentKind as usize`.
const HANDLERS: [FixtureHandlers; 8] = [
    FixtureHandlers {
        kind: AttachmentKind::Container,
        extract: extract_container,
        apply: apply_container,
    },
    FixtureHandlers {
        kind: AttachmentKind::Sign,
        extract: extract_sign,
        apply: apply_sign,
    },
    FixtureHandlers {
        kind: AttachmentKind::ItemFrame,
        extract: extract_display,
        apply: apply_display,
    },
    FixtureHandlers {
        kind: AttachmentKind::WeaponRack,
        extract: extract_display,
        apply: apply_display,
    },
    FixtureHandlers {
        kind: AttachmentKind::FoodPlatter,
        extract: extract_display,
        apply: apply_display,
    },
    FixtureHandlers {
        kind: AttachmentKind::Mannequin,
        extract: extract_outfit,
        apply: apply_outfit,
    },
    FixtureHandlers {
        kind: AttachmentKind::HatRack,
        extract: extract_outfit,
        apply: apply_outfit,
    },
    FixtureHandlers {
        kind: AttachmentKind::LogicSensor,
        extract: extract_sensor,
        apply: apply_sensor,
    },
];

fn handlers_for(kind: AttachmentKind) -> &'static FixtureHandlers {
    let handlers = &HANDLERS[kind as usize];
    debug_assert_eq!(handlers.kind, kind);
    handlers
}

/// Reads the fixture anchored at `pos` (if any) into `out`.
///
/// Returns without output for non-fixture cells, non-anchor sub-cells and
/// anchors with no live registration.
pub fn extract_at<R: FixtureRegistry + ?Sized>(
    registry: &R,
    cell: &Cell,
    pos: Point,
    out: &mut Attachments,
) {
    let Some(spec) = spec_for_cell(cell) else {
        return;
    };
    if !spec.is_anchor(cell) {
        return;
    }
    let Some(state) = registry
        .find(spec.kind, pos)
        .and_then(|id| registry.state(id))
    else {
        return;
    };
    if !(handlers_for(spec.kind).extract)(spec.kind, pos, state, out) {
        debug!(
            "{} at {pos} holds mismatched state {state:?}; skipped",
            spec.kind
        );
    }
}

/// Writes an attachment's payload into the live fixture at `at`.
///
/// Returns `false` when no matching fixture exists or its state does not fit.
pub fn apply_at<R: FixtureRegistry + ?Sized>(
    registry: &mut R,
    attachment: &Attachment,
    at: Point,
) -> bool {
    let kind = attachment.kind();
    let Some(id) = registry.find(kind, at) else {
        return false;
    };
    let Some(state) = registry.state_mut(id) else {
        return false;
    };
    (handlers_for(kind).apply)(attachment, state)
}

fn extract_container(
    _kind: AttachmentKind,
    pos: Point,
    state: &FixtureState,
    out: &mut Attachments,
) -> bool {
    let FixtureState::Container { slots } = state else {
        return false;
    };
    for (slot, item) in slots.iter().enumerate() {
        if item.is_empty() {
            continue;
        }
        let Ok(slot) = u8::try_from(slot) else {
            break;
        };
        out.push(Attachment::Container {
            position: pos,
            slot,
            item: *item,
        });
    }
    true
}

fn apply_container(attachment: &Attachment, state: &mut FixtureState) -> bool {
    let (Attachment::Container { slot, item, .. }, FixtureState::Container { slots }) =
        (attachment, state)
    else {
        return false;
    };
    match slots.get_mut(*slot as usize) {
        Some(target) => {
            *target = *item;
            true
        }
        None => false,
    }
}

fn extract_sign(
    _kind: AttachmentKind,
    pos: Point,
    state: &FixtureState,
    out: &mut Attachments,
) -> bool {
    let FixtureState::Sign { text } = state else {
        return false;
    };
    out.push(Attachment::Sign {
        position: pos,
        text: text.clone(),
    });
    true
}

fn apply_sign(attachment: &Attachment, state: &mut FixtureState) -> bool {
    let (Attachment::Sign { text, .. }, FixtureState::Sign { text: target }) = (attachment, state)
    else {
        return false;
    };
    target.clone_from(text);
    true
}

fn extract_display(
    kind: AttachmentKind,
    position: Point,
    state: &FixtureState,
    out: &mut Attachments,
) -> bool {
    let FixtureState::Display { item } = state else {
        return false;
    };
    let item = *item;
    let attachment = match kind {
        AttachmentKind::ItemFrame => Attachment::ItemFrame { position, item },
        AttachmentKind::WeaponRack => Attachment::WeaponRack { position, item },
        AttachmentKind::FoodPlatter => Attachment::FoodPlatter { position, item },
        _ => return false,
    };
    out.push(attachment);
    true
}

fn apply_display(attachment: &Attachment, state: &mut FixtureState) -> bool {
    let FixtureState::Display { item: target } = state else {
        return false;
    };
    match attachment {
        Attachment::ItemFrame { item, .. }
        | Attachment::WeaponRack { item, .. }
        | Attachment::FoodPlatter { item, .. } => {
            *target = *item;
            true
        }
        _ => false,
    }
}

fn outfit_array<const N: usize>(source: &[ItemStack]) -> [ItemStack; N] {
    let mut out = [ItemStack::EMPTY; N];
    for (target, item) in out.iter_mut().zip(source) {
        *target = *item;
    }
    out
}

fn extract_outfit(
    kind: AttachmentKind,
    position: Point,
    state: &FixtureState,
    out: &mut Attachments,
) -> bool {
    let FixtureState::Outfit { items, dyes } = state else {
        return false;
    };
    let attachment = match kind {
        AttachmentKind::Mannequin => Attachment::Mannequin {
            position,
            items: outfit_array::<MANNEQUIN_SLOTS>(items),
            dyes: outfit_array::<MANNEQUIN_SLOTS>(dyes),
        },
        AttachmentKind::HatRack => Attachment::HatRack {
            position,
            items: outfit_array::<HAT_RACK_SLOTS>(items),
            dyes: outfit_array::<HAT_RACK_SLOTS>(dyes),
        },
        _ => return false,
    };
    out.push(attachment);
    true
}

fn apply_outfit(attachment: &Attachment, state: &mut FixtureState) -> bool {
    let FixtureState::Outfit {
        items: target_items,
        dyes: target_dyes,
    } = state
    else {
        return false;
    };
    let (items, dyes): (&[ItemStack], &[ItemStack]) = match attachment {
        Attachment::Mannequin { items, dyes, .. } => (items.as_slice(), dyes.as_slice()),
        Attachment::HatRack { items, dyes, .. } => (items.as_slice(), dyes.as_slice()),
        _ => return false,
    };
    target_items.clear();
    target_items.extend_from_slice(items);
    target_dyes.clear();
    target_dyes.extend_from_slice(dyes);
    true
}

fn extract_sensor(
    _kind: AttachmentKind,
    position: Point,
    state: &FixtureState,
    out: &mut Attachments,
) -> bool {
    let FixtureState::Sensor { mode } = state else {
        return false;
    };
    out.push(Attachment::LogicSensor {
        position,
        mode: *mode,
    });
    true
}

fn apply_sensor(attachment: &Attachment, state: &mut FixtureState) -> bool {
    let (Attachment::LogicSensor { mode, .. }, FixtureState::Sensor { mode: target }) =
        (attachment, state)
    else {
        return false;
    };
    *target = *mode;
    true
}
