//! # Cells
//!
//! A cell is an axis-aligned box in chunk-local space (0..255 per axis)
//! carrying a material and a mask of externally visible faces.
//!
//! ## Record Layout
//!
//! Cells are `Pod` and 9 bytes wide, which is the wire format shared by the
//! arena packer and the persisted chunk file:
//!
//! ```text
//! [x0, y0, z0, material_lo]   lower corner word (inclusive)
//! [x1, y1, z1, material_hi]   upper corner word (exclusive)
//! [faces]                     visible face bits (see `Face`)
//! ```

use bytemuck::{Pod, Zeroable};

/// Size in bytes of one serialized cell record.
pub const CELL_RECORD_SIZE: usize = std::mem::size_of::<Cell>();

/// Mask with every face bit set.
pub const ALL_FACES: u8 = 0b0011_1111;

/// Axis-aligned face of a box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    /// +X face.
    PosX = 0,
    /// -X face.
    NegX = 1,
    /// +Y face.
    PosY = 2,
    /// -Y face.
    NegY = 3,
    /// +Z face.
    PosZ = 4,
    /// -Z face.
    NegZ = 5,
}

/// Outward unit offsets, indexed by `Face as usize`.
pub const FACE_OFFSETS: [[i32; 3]; 6] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];

impl Face {
    /// All faces in bit order.
    pub const ALL: [Self; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// Face crossed when moving along `axis` in the given direction.
    #[inline]
    #[must_use]
    pub const fn from_axis(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, true) => Self::PosX,
            (0, false) => Self::NegX,
            (1, true) => Self::PosY,
            (1, false) => Self::NegY,
            (_, true) => Self::PosZ,
            (_, false) => Self::NegZ,
        }
    }

    /// Axis this face is perpendicular to (0 = x, 1 = y, 2 = z).
    #[inline]
    #[must_use]
    pub const fn axis(self) -> usize {
        self as usize / 2
    }

    /// True for the +X, +Y and +Z faces.
    #[inline]
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self as usize % 2 == 0
    }

    /// Bit of this face in a visible-face mask.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Outward unit offset of this face.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> [i32; 3] {
        FACE_OFFSETS[self as usize]
    }
}

/// An axis-aligned box with a material, packed into a 9-byte record.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Cell {
    /// Lower corner (inclusive) plus the low material byte.
    lo: [u8; 4],
    /// Upper corner (exclusive) plus the high material byte.
    hi: [u8; 4],
    /// Visible face bits.
    faces: u8,
}

impl Cell {
    /// The zero-volume sentinel written into freed slots.
    pub const EMPTY: Self = Self { lo: [0; 4], hi: [0; 4], faces: 0 };

    /// Creates a cell with every face visible.
    #[inline]
    #[must_use]
    pub const fn new(pos0: [u8; 3], pos1: [u8; 3], material: u16) -> Self {
        Self::with_faces(pos0, pos1, material, ALL_FACES)
    }

    /// Creates a cell with an explicit visible-face mask.
    #[inline]
    #[must_use]
    pub const fn with_faces(pos0: [u8; 3], pos1: [u8; 3], material: u16, faces: u8) -> Self {
        let m = material.to_le_bytes();
        Self {
            lo: [pos0[0], pos0[1], pos0[2], m[0]],
            hi: [pos1[0], pos1[1], pos1[2], m[1]],
            faces: faces & ALL_FACES,
        }
    }

    /// Lower corner (inclusive).
    #[inline]
    #[must_use]
    pub const fn pos0(&self) -> [u8; 3] {
        [self.lo[0], self.lo[1], self.lo[2]]
    }

    /// Upper corner (exclusive).
    #[inline]
    #[must_use]
    pub const fn pos1(&self) -> [u8; 3] {
        [self.hi[0], self.hi[1], self.hi[2]]
    }

    /// Material id.
    #[inline]
    #[must_use]
    pub const fn material(&self) -> u16 {
        u16::from_le_bytes([self.lo[3], self.hi[3]])
    }

    /// Visible face mask.
    #[inline]
    #[must_use]
    pub const fn visible_faces(&self) -> u8 {
        self.faces
    }

    /// True if `face` is marked visible.
    #[inline]
    #[must_use]
    pub const fn is_face_visible(&self, face: Face) -> bool {
        self.faces & face.bit() != 0
    }

    /// Same box and material with a different face mask.
    #[inline]
    #[must_use]
    pub const fn set_faces(self, faces: u8) -> Self {
        Self { faces: faces & ALL_FACES, ..self }
    }

    /// Same material and faces with a different box.
    #[inline]
    #[must_use]
    pub const fn with_box(self, pos0: [u8; 3], pos1: [u8; 3]) -> Self {
        Self::with_faces(pos0, pos1, self.material(), self.faces)
    }

    /// True unless some axis has `pos0 == pos1`.
    #[inline]
    #[must_use]
    pub const fn has_volume(&self) -> bool {
        self.lo[0] != self.hi[0] && self.lo[1] != self.hi[1] && self.lo[2] != self.hi[2]
    }

    /// True if `pos0 < pos1` on every axis, i.e. the box is a live cell.
    #[inline]
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.lo[0] < self.hi[0] && self.lo[1] < self.hi[1] && self.lo[2] < self.hi[2]
    }

    /// Number of voxels covered.
    #[must_use]
    pub fn volume(&self) -> u32 {
        let (p0, p1) = (self.pos0(), self.pos1());
        (0..3)
            .map(|a| u32::from(p1[a].saturating_sub(p0[a])))
            .product()
    }

    /// True if the intersection with `other` has positive extent on every
    /// axis. Boxes that only touch do not share volume.
    #[inline]
    #[must_use]
    pub fn shares_volume(&self, other: &Self) -> bool {
        let (a0, a1) = (self.pos0(), self.pos1());
        let (b0, b1) = (other.pos0(), other.pos1());
        (0..3).all(|i| a0[i] < b1[i] && b0[i] < a1[i])
    }

    /// True if voxel `(x, y, z)` lies in `[pos0, pos1)`.
    #[inline]
    #[must_use]
    pub fn contains_point(&self, x: i32, y: i32, z: i32) -> bool {
        let (p0, p1) = (self.pos0(), self.pos1());
        [x, y, z]
            .iter()
            .enumerate()
            .all(|(i, &v)| i32::from(p0[i]) <= v && v < i32::from(p1[i]))
    }
}
