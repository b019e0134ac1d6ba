use crate::geometry::{Offset, Point};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const CONTAINER_SLOTS: usize = 40;
pub const MANNEQUIN_SLOTS: usize = 8;
pub const HAT_RACK_SLOTS: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ItemStack {
    pub kind_id: i32,
    pub count: i32,
    pub modifier: u8,
}

impl ItemStack {
    pub const EMPTY: Self = Self {
        kind_id: 0,
        count: 0,
        modifier: 0,
    };

    pub const fn new(kind_id: i32, count: i32, modifier: u8) -> Self {
        Self {
            kind_id,
            count,
            modifier,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind_id == 0 || self.count <= 0
    }
}

/// Trigger condition of a logic sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SensorMode {
    #[default]
    Day,
    Night,
    PlayerAbove,
    Water,
    Lava,
    Honey,
    Liquid,
}

impl SensorMode {
    pub const ALL: [SensorMode; 7] = [
        SensorMode::Day,
        SensorMode::Night,
        SensorMode::PlayerAbove,
        SensorMode::Water,
        SensorMode::Lava,
        SensorMode::Honey,
        SensorMode::Liquid,
    ];

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }
}

/// Fixture kinds in their fixed serialization order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttachmentKind {
    Container,
    Sign,
    ItemFrame,
    WeaponRack,
    FoodPlatter,
    Mannequin,
    HatRack,
    LogicSensor,
}

impl AttachmentKind {
    pub const ORDER: [AttachmentKind; 8] = [
        AttachmentKind::Container,
        AttachmentKind::Sign,
        AttachmentKind::ItemFrame,
        AttachmentKind::WeaponRack,
        AttachmentKind::FoodPlatter,
        AttachmentKind::Mannequin,
        AttachmentKind::HatRack,
        AttachmentKind::LogicSensor,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AttachmentKind::Container => "container",
            AttachmentKind::Sign => "sign",
            AttachmentKind::ItemFrame => "item-frame",
            AttachmentKind::WeaponRack => "weapon-rack",
            AttachmentKind::FoodPlatter => "food-platter",
            AttachmentKind::Mannequin => "mannequin",
            AttachmentKind::HatRack => "hat-rack",
            AttachmentKind::LogicSensor => "logic-sensor",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Captured contents of one fixture, tied to its absolute capture-time anchor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Attachment {
    Container {
        position: Point,
        slot: u8,
        item: ItemStack,
    },
    Sign {
        position: Point,
        text: String,
    },
    ItemFrame {
        position: Point,
        item: ItemStack,
    },
    WeaponRack {
        position: Point,
        item: ItemStack,
    },
    FoodPlatter {
        position: Point,
        item: ItemStack,
    },
    Mannequin {
        position: Point,
        items: [ItemStack; MANNEQUIN_SLOTS],
        dyes: [ItemStack; MANNEQUIN_SLOTS],
    },
    HatRack {
        position: Point,
        items: [ItemStack; HAT_RACK_SLOTS],
        dyes: [ItemStack; HAT_RACK_SLOTS],
    },
    LogicSensor {
        position: Point,
        mode: SensorMode,
    },
}

impl Attachment {
    pub fn kind(&self) -> AttachmentKind {
        match self {
            Attachment::Container { .. } => AttachmentKind::Container,
            Attachment::Sign { .. } => AttachmentKind::Sign,
            Attachment::ItemFrame { .. } => AttachmentKind::ItemFrame,
            Attachment::WeaponRack { .. } => AttachmentKind::WeaponRack,
            Attachment::FoodPlatter { .. } => AttachmentKind::FoodPlatter,
            Attachment::Mannequin { .. } => AttachmentKind::Mannequin,
            Attachment::HatRack { .. } => AttachmentKind::HatRack,
            Attachment::LogicSensor { .. } => AttachmentKind::LogicSensor,
        }
    }

    pub fn position(&self) -> Point {
        match self {
            Attachment::Container { position, .. }
            | Attachment::Sign { position, .. }
            | Attachment::ItemFrame { position, .. }
            | Attachment::WeaponRack { position, .. }
            | Attachment::FoodPlatter { position, .. }
            | Attachment::Mannequin { position, .. }
            | Attachment::HatRack { position, .. }
            | Attachment::LogicSensor { position, .. } => *position,
        }
    }

    fn position_mut(&mut self) -> &mut Point {
        match self {
            Attachment::Container { position, .. }
            | Attachment::Sign { position, .. }
            | Attachment::ItemFrame { position, .. }
            | Attachment::WeaponRack { position, .. }
            | Attachment::FoodPlatter { position, .. }
            | Attachment::Mannequin { position, .. }
            | Attachment::HatRack { position, .. }
            | Attachment::LogicSensor { position, .. } => position,
        }
    }

    pub fn translated(&self, offset: Offset) -> Attachment {
        let mut moved = self.clone();
        let position = moved.position_mut();
        *position = *position + offset;
        moved
    }
}

/// Attachments grouped by kind. A kind with no records has no entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attachments {
    by_kind: BTreeMap<AttachmentKind, Vec<Attachment>>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attachment: Attachment) {
        self.by_kind
            .entry(attachment.kind())
            .or_default()
            .push(attachment);
    }

    pub fn of_kind(&self, kind: AttachmentKind) -> &[Attachment] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    /// All attachments, kinds in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.by_kind.values().flatten()
    }

    pub fn translated(&self, offset: Offset) -> Attachments {
        let mut out = Attachments::new();
        for attachment in self.iter() {
            out.push(attachment.translated(offset));
        }
        out
    }
}

impl Extend<Attachment> for Attachments {
    fn extend<I: IntoIterator<Item = Attachment>>(&mut self, iter: I) {
        for attachment in iter {
            self.push(attachment);
        }
    }
}

impl FromIterator<Attachment> for Attachments {
    fn from_iter<I: IntoIterator<Item = Attachment>>(iter: I) -> Self {
        let mut out = Attachments::new();
        out.extend(iter);
        out
    }
}
