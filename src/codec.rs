//! Binary snapshot stream.
//!
//! Layout, little-endian and versionless:
//!
//! ```text
//! origin.x i32 | origin.y i32 | width u32 | height u32
//! width * height cells, column-major, 12 bytes each
//! for each kind in AttachmentKind::ORDER: count u32, then `count` records
//! ```
//!
//! Sign positions are stored relative to the origin; every other kind stores
//! absolute capture-time positions. Streams are gzip-wrapped at rest.

use crate::attachment::{
    Attachment, AttachmentKind, Attachments, ItemStack, SensorMode, CONTAINER_SLOTS,
    HAT_RACK_SLOTS, MANNEQUIN_SLOTS,
};
use crate::cell::{Cell, Grid};
use crate::geometry::{Offset, Point};
use crate::snapshot::Snapshot;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt;
use std::io::{self, Read, Write};

const POINT_LEN: usize = 8;
const ITEM_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The stream ended before a complete snapshot was read.
    Truncated,
    Corrupt(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "snapshot stream is truncated"),
            Self::Corrupt(reason) => write!(f, "snapshot stream is corrupt: {reason}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Encodes and compresses a snapshot.
pub fn encode(snapshot: &Snapshot) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    encode_raw(snapshot, &mut raw);
    compress(&raw)
}

/// Decompresses and decodes exactly one snapshot.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, CodecError> {
    let raw = decompress(bytes)?;
    let mut reader = ByteReader::new(&raw);
    let snapshot = decode_raw(&mut reader)?;
    reader.finish()?;
    Ok(snapshot)
}

pub fn compress(raw: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    encoder.finish()
}

pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Truncated);
    }
    let mut decoder = GzDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::Truncated
        } else {
            CodecError::Corrupt(format!("decompression failed: {error}"))
        }
    })?;
    Ok(raw)
}

/// Appends the uncompressed stream for `snapshot` to `out`.
pub fn encode_raw(snapshot: &Snapshot, out: &mut Vec<u8>) {
    let origin = snapshot.origin();
    write_point(out, origin);
    out.extend_from_slice(&snapshot.width().to_le_bytes());
    out.extend_from_slice(&snapshot.height().to_le_bytes());

    out.reserve(snapshot.cells().len() * Cell::ENCODED_LEN);
    for cell in snapshot.cells().as_slice() {
        write_cell(out, cell);
    }

    for kind in AttachmentKind::ORDER {
        let records = snapshot.attachments().of_kind(kind);
        out.extend_from_slice(&(records.len() as u32).to_le_bytes());
        for record in records {
            write_attachment(out, record, origin);
        }
    }
}

/// Reads one uncompressed snapshot, leaving the reader after its last byte.
pub fn decode_raw(reader: &mut ByteReader<'_>) -> Result<Snapshot, CodecError> {
    let origin = reader.point()?;
    let width = reader.u32()?;
    let height = reader.u32()?;
    if (width == 0) != (height == 0) {
        return Err(CodecError::Corrupt(format!(
            "degenerate dimensions {width}x{height}"
        )));
    }

    let cell_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| CodecError::Corrupt(format!("{width}x{height} cells overflow")))?;
    let cell_bytes = cell_count
        .checked_mul(Cell::ENCODED_LEN)
        .ok_or_else(|| CodecError::Corrupt(format!("{width}x{height} cells overflow")))?;
    if cell_bytes > reader.remaining() {
        return Err(CodecError::Truncated);
    }
    let mut cells = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        cells.push(reader.cell()?);
    }
    let cells = Grid::from_column_major(width, height, cells)
        .ok_or_else(|| CodecError::Corrupt("cell count mismatch".to_string()))?;

    let mut attachments = Attachments::new();
    for kind in AttachmentKind::ORDER {
        let count = reader.u32()? as usize;
        if count.saturating_mul(min_record_len(kind)) > reader.remaining() {
            return Err(CodecError::Truncated);
        }
        for _ in 0..count {
            attachments.push(read_attachment(reader, kind, origin)?);
        }
    }

    Snapshot::from_parts(origin, cells, attachments).ok_or_else(|| {
        CodecError::Corrupt("attachment position outside snapshot footprint".to_string())
    })
}

fn min_record_len(kind: AttachmentKind) -> usize {
    match kind {
        AttachmentKind::Container => POINT_LEN + 1 + ITEM_LEN,
        AttachmentKind::Sign => POINT_LEN + 4,
        AttachmentKind::ItemFrame | AttachmentKind::WeaponRack | AttachmentKind::FoodPlatter => {
            POINT_LEN + ITEM_LEN
        }
        AttachmentKind::Mannequin => POINT_LEN + 2 * MANNEQUIN_SLOTS * ITEM_LEN,
        AttachmentKind::HatRack => POINT_LEN + 2 * HAT_RACK_SLOTS * ITEM_LEN,
        AttachmentKind::LogicSensor => POINT_LEN + 1,
    }
}

fn write_point(out: &mut Vec<u8>, pos: Point) {
    out.extend_from_slice(&pos.x.to_le_bytes());
    out.extend_from_slice(&pos.y.to_le_bytes());
}

fn write_cell(out: &mut Vec<u8>, cell: &Cell) {
    out.extend_from_slice(&cell.tile_type.to_le_bytes());
    out.extend_from_slice(&cell.wall.to_le_bytes());
    out.push(cell.liquid);
    out.push(cell.liquid_kind);
    out.extend_from_slice(&cell.header.to_le_bytes());
    out.extend_from_slice(&cell.frame_x.to_le_bytes());
    out.extend_from_slice(&cell.frame_y.to_le_bytes());
}

fn write_item(out: &mut Vec<u8>, item: &ItemStack) {
    out.extend_from_slice(&item.kind_id.to_le_bytes());
    out.extend_from_slice(&item.count.to_le_bytes());
    out.push(item.modifier);
}

fn write_attachment(out: &mut Vec<u8>, attachment: &Attachment, origin: Point) {
    match attachment {
        Attachment::Container {
            position,
            slot,
            item,
        } => {
            write_point(out, *position);
            out.push(*slot);
            write_item(out, item);
        }
        Attachment::Sign { position, text } => {
            let relative = *position - origin;
            write_point(out, Point::new(relative.dx, relative.dy));
            out.extend_from_slice(&(text.len() as u32).to_le_bytes());
            out.extend_from_slice(text.as_bytes());
        }
        Attachment::ItemFrame { position, item }
        | Attachment::WeaponRack { position, item }
        | Attachment::FoodPlatter { position, item } => {
            write_point(out, *position);
            write_item(out, item);
        }
        Attachment::Mannequin {
            position,
            items,
            dyes,
        } => {
            write_point(out, *position);
            items.iter().chain(dyes).for_each(|item| write_item(out, item));
        }
        Attachment::HatRack {
            position,
            items,
            dyes,
        } => {
            write_point(out, *position);
            items.iter().chain(dyes).for_each(|item| write_item(out, item));
        }
        Attachment::LogicSensor { position, mode } => {
            write_point(out, *position);
            out.push(mode.to_u8());
        }
    }
}

fn read_attachment(
    reader: &mut ByteReader<'_>,
    kind: AttachmentKind,
    origin: Point,
) -> Result<Attachment, CodecError> {
    let attachment = match kind {
        AttachmentKind::Container => {
            let position = reader.point()?;
            let slot = reader.u8()?;
            if slot as usize >= CONTAINER_SLOTS {
                return Err(CodecError::Corrupt(format!(
                    "container slot {slot} out of range"
                )));
            }
            let item = reader.item()?;
            Attachment::Container {
                position,
                slot,
                item,
            }
        }
        AttachmentKind::Sign => {
            let relative = reader.point()?;
            let len = reader.u32()? as usize;
            let bytes = reader.take(len)?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|_| CodecError::Corrupt("sign text is not UTF-8".to_string()))?;
            Attachment::Sign {
                position: origin + Offset::new(relative.x, relative.y),
                text,
            }
        }
        AttachmentKind::ItemFrame => {
            let position = reader.point()?;
            let item = reader.item()?;
            Attachment::ItemFrame { position, item }
        }
        AttachmentKind::WeaponRack => {
            let position = reader.point()?;
            let item = reader.item()?;
            Attachment::WeaponRack { position, item }
        }
        AttachmentKind::FoodPlatter => {
            let position = reader.point()?;
            let item = reader.item()?;
            Attachment::FoodPlatter { position, item }
        }
        AttachmentKind::Mannequin => {
            let position = reader.point()?;
            let items = reader.items::<MANNEQUIN_SLOTS>()?;
            let dyes = reader.items::<MANNEQUIN_SLOTS>()?;
            Attachment::Mannequin {
                position,
                items,
                dyes,
            }
        }
        AttachmentKind::HatRack => {
            let position = reader.point()?;
            let items = reader.items::<HAT_RACK_SLOTS>()?;
            let dyes = reader.items::<HAT_RACK_SLOTS>()?;
            Attachment::HatRack {
                position,
                items,
                dyes,
            }
        }
        AttachmentKind::LogicSensor => {
            let position = reader.point()?;
            let raw = reader.u8()?;
            let mode = SensorMode::from_u8(raw)
                .ok_or_else(|| CodecError::Corrupt(format!("unknown sensor mode {raw}")))?;
            Attachment::LogicSensor { position, mode }
        }
    };
    Ok(attachment)
}

/// Bounds-checked cursor over an uncompressed stream.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails with `Corrupt` when unread bytes remain.
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(CodecError::Corrupt(format!("{extra} trailing bytes"))),
        }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::Truncated);
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn point(&mut self) -> Result<Point, CodecError> {
        let x = self.i32()?;
        let y = self.i32()?;
        Ok(Point::new(x, y))
    }

    fn cell(&mut self) -> Result<Cell, CodecError> {
        Ok(Cell {
            tile_type: self.u16()?,
            wall: self.u16()?,
            liquid: self.u8()?,
            liquid_kind: self.u8()?,
            header: self.u16()?,
            frame_x: self.i16()?,
            frame_y: self.i16()?,
        })
    }

    fn item(&mut self) -> Result<ItemStack, CodecError> {
        Ok(ItemStack {
            kind_id: self.i32()?,
            count: self.i32()?,
            modifier: self.u8()?,
        })
    }

    fn items<const N: usize>(&mut self) -> Result<[ItemStack; N], CodecError> {
        let mut out = [ItemStack::EMPTY; N];
        for slot in out.iter_mut() {
            *slot = self.item()?;
        }
        Ok(out)
    }
}
