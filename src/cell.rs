
/// Pixel stride of one tile inside a fixture's frame sheet.
pub const FRAME_STRIDE: i16 = 18;

const HEADER_ACTIVE: u16 = 1 << 0;
const HEADER_SLOPE_SHIFT: u16 = 1;
const HEADER_SLOPE_MASK: u16 = 0b111 << HEADER_SLOPE_SHIFT;
const HEADER_HALF_BRICK: u16 = 1 << 4;
const HEADER_ACTUATOR: u16 = 1 << 5;
const HEADER_INACTIVE: u16 = 1 << 6;
const HEADER_WIRE_SHIFT: u16 = 7;
const HEADER_WIRE_MASK: u16 = 0b1111 << HEADER_WIRE_SHIFT;

/// State of one grid position. Fixture contents live in attachments, never here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Cell {
    pub tile_type: u16,
    pub wall: u16,
    pub liquid: u8,
    pub liquid_kind: u8,
    /// Bitfields: active, slope, half-brick, actuator, inactive, wires.
    pub header: u16,
    pub frame_x: i16,
    pub frame_y: i16,
}

impl Cell {
    pub const EMPTY: Self = Self {
        tile_type: 0,
        wall: 0,
        liquid: 0,
        liquid_kind: 0,
        header: 0,
        frame_x: 0,
        frame_y: 0,
    };

    /// Serialized size in bytes.
    pub const ENCODED_LEN: usize = 12;

    pub fn solid(tile_type: u16) -> Self {
        Self {
            tile_type,
            header: HEADER_ACTIVE,
            ..Self::EMPTY
        }
    }

    /// An active tile that belongs to a multi-cell fixture sheet.
    pub fn framed(tile_type: u16, frame_x: i16, frame_y: i16) -> Self {
        Self {
            tile_type,
            header: HEADER_ACTIVE,
            frame_x,
            frame_y,
            ..Self::EMPTY
        }
    }

    pub fn with_wall(mut self, wall: u16) -> Self {
        self.wall = wall;
        self
    }

    pub fn with_liquid(mut self, amount: u8, kind: u8) -> Self {
        self.liquid = amount;
        self.liquid_kind = kind;
        self
    }

    pub fn is_active(&self) -> bool {
        self.header & HEADER_ACTIVE != 0
    }

    pub fn slope(&self) -> u8 {
        ((self.header & HEADER_SLOPE_MASK) >> HEADER_SLOPE_SHIFT) as u8
    }

    pub fn set_slope(&mut self, slope: u8) {
        self.header = (self.header & !HEADER_SLOPE_MASK)
            | ((u16::from(slope) << HEADER_SLOPE_SHIFT) & HEADER_SLOPE_MASK);
    }

    pub fn is_half_brick(&self) -> bool {
        self.header & HEADER_HALF_BRICK != 0
    }

    pub fn has_actuator(&self) -> bool {
        self.header & HEADER_ACTUATOR != 0
    }

    pub fn is_inactive(&self) -> bool {
        self.header & HEADER_INACTIVE != 0
    }

    pub fn wires(&self) -> u8 {
        ((self.header & HEADER_WIRE_MASK) >> HEADER_WIRE_SHIFT) as u8
    }

    pub fn set_wires(&mut self, wires: u8) {
        self.header = (self.header & !HEADER_WIRE_MASK)
            | ((u16::from(wires) << HEADER_WIRE_SHIFT) & HEADER_WIRE_MASK);
    }

    /// Tile offset of this cell inside a fixture spanning `cols × rows` tiles.
    pub fn frame_cell_offset(&self, cols: u8, rows: u8) -> (i32, i32) {
        let col_span = i32::from(FRAME_STRIDE) * i32::from(cols.max(1));
        let row_span = i32::from(FRAME_STRIDE) * i32::from(rows.max(1));
        let dx = i32::from(self.frame_x).rem_euclid(col_span) / i32::from(FRAME_STRIDE);
        let dy = i32::from(self.frame_y).rem_euclid(row_span) / i32::from(FRAME_STRIDE);
        (dx, dy)
    }
}

/// Dense `width × height` cell storage, column-major (`x * height + y`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    cells: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![T::default(); width as usize * height as usize],
        }
    }
}

impl<T> Grid<T> {
    /// Wraps pre-built column-major cells. Returns `None` on a length mismatch.
    pub fn from_column_major(width: u32, height: u32, cells: Vec<T>) -> Option<Self> {
        (cells.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| x as usize * self.height as usize + y as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&T> {
        self.index(x, y).map(|idx| &self.cells[idx])
    }

    pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut T> {
        self.index(x, y).map(move |idx| &mut self.cells[idx])
    }

    pub fn set(&mut self, x: u32, y: u32, value: T) -> bool {
        match self.get_mut(x, y) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Column-major cell slice.
    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    /// `(x, y, cell)` in column-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        let height = self.height.max(1);
        self.cells.iter().enumerate().map(move |(idx, cell)| {
            let x = (idx / height as usize) as u32;
            let y = (idx % height as usize) as u32;
            (x, y, cell)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bitfields_are_independent() {
        let mut cell = Cell::solid(1);
        cell.set_slope(3);
        cell.set_wires(0b1010);
        assert!(cell.is_active());
        assert_eq!(cell.slope(), 3);
        assert_eq!(cell.wires(), 0b1010);
        assert!(!cell.is_half_brick());
        cell.set_slope(0);
        assert_eq!(cell.wires(), 0b1010);
    }

    #[test]
    fn frame_offset_resolves_sub_cell() {
        // Second column, first row of the third chest style.
        let cell = Cell::framed(21, 2 * 36 + 18, 0);
        assert_eq!(cell.frame_cell_offset(2, 2), (1, 0));
        let bottom = Cell::framed(21, 36, 18);
        assert_eq!(bottom.frame_cell_offset(2, 2), (0, 1));
    }

    #[test]
    fn grid_is_column_major() {
        let mut grid: Grid<u8> = Grid::new(3, 2);
        assert!(grid.set(1, 0, 7));
        assert!(grid.set(2, 1, 9));
        assert!(!grid.set(3, 0, 1));
        assert_eq!(grid.as_slice(), &[0, 0, 7, 0, 0, 9]);
        let visited: Vec<_> = grid.iter().map(|(x, y, v)| (x, y, *v)).collect();
        assert_eq!(visited[2], (1, 0, 7));
        assert_eq!(visited[5], (2, 1, 9));
    }

    #[test]
    fn from_column_major_checks_length() {
        assert!(Grid::from_column_major(2, 2, vec![0u8; 3]).is_none());
        assert!(Grid::from_column_major(2, 2, vec![0u8; 4]).is_some());
    }
}
