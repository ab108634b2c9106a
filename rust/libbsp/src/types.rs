use crate::error::BspResult;
use crate::io::{Readable, Record, Writable};
use bsp_derive::{Readable, Writable};
use bytes::{Buf, BufMut};
use cgmath::{InnerSpace, Vector3, Vector4};

pub type Point3F = Vector3<f32>;

/// A texture projection axis: `dot(xyz, point) + w`.
pub type TexAxis = Vector4<f32>;

/// Offset or index field value meaning "no reference".
pub const NO_REFERENCE: u32 = u32::MAX;

pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;

typed_index!(PlaneIndex, _PlaneIndex);
typed_index!(NodeIndex, _NodeIndex);
typed_index!(LeafIndex, _LeafIndex);
typed_index!(VertexIndex, _VertexIndex);
typed_index!(EdgeIndex, _EdgeIndex);
typed_index!(FaceIndex, _FaceIndex);
typed_index!(TexInfoIndex, _TexInfoIndex);
typed_index!(TextureIndex, _TextureIndex);
typed_index!(PolygonIndex, _PolygonIndex);

/// A BSP node child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildRef {
    Node(NodeIndex),
    Leaf(LeafIndex),
}

bitflags! {
    #[derive(Default)]
    pub struct TexInfoFlags: u32 {
        /// Sky or liquid, no lightmap.
        const SPECIAL = 0x1;
    }
}

bitflags! {
    /// Per-face render flags stored by the console format.
    #[derive(Default)]
    pub struct SurfaceFlags: u32 {
        const PLANE_BACK = 0x2;
        const SKY = 0x4;
        const TURB = 0x10;
        const TILED = 0x20;
        const TRANSPARENT = 0x100;
        const SCROLL = 0x200;

        /// Faces that get a rendering polygon.
        const GEOMETRY = Self::TURB.bits | Self::TRANSPARENT.bits | Self::SCROLL.bits;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Readable, Writable)]
pub struct Plane {
    pub normal: Point3F,
    pub dist: f32,
    pub kind: i32,
}

impl Record for Plane {
    const SIZE: usize = 20;
}

impl Plane {
    /// Bit `i` is set when the `i`th normal component is negative.
    pub fn signbits(&self) -> u8 {
        let mut bits = 0;
        for (i, component) in [self.normal.x, self.normal.y, self.normal.z]
            .iter()
            .enumerate()
        {
            if *component < 0.0 {
                bits |= 1 << i;
            }
        }
        bits
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct Edge {
    pub vertices: [u16; 2],
}

impl Record for Edge {
    const SIZE: usize = 4;
}

impl Edge {
    pub fn new(a: VertexIndex, b: VertexIndex) -> Edge {
        Edge {
            vertices: [a.raw() as u16, b.raw() as u16],
        }
    }

    pub fn vertex(&self, i: usize) -> VertexIndex {
        VertexIndex::from_raw(self.vertices[i] as u32)
    }
}

/// A collision hull node. Non-negative children index clipnodes, negative
/// ones are leaf contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct Clipnode {
    pub plane: i32,
    pub children: [i16; 2],
}

impl Record for Clipnode {
    const SIZE: usize = 8;
}

#[derive(Debug, Clone, Copy, PartialEq, Readable, Writable)]
pub struct Model {
    pub mins: Point3F,
    pub maxs: Point3F,
    pub origin: Point3F,
    pub headnode: [i32; 4],
    pub visleafs: i32,
    pub first_face: i32,
    pub num_faces: i32,
}

impl Record for Model {
    const SIZE: usize = 64;
}

/// Texture projection shared by PC texinfo and console faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub s: TexAxis,
    pub t: TexAxis,
}

impl Projection {
    pub fn s_of(&self, point: Point3F) -> f32 {
        point.dot(self.s.truncate()) + self.s.w
    }

    pub fn t_of(&self, point: Point3F) -> f32 {
        point.dot(self.t.truncate()) + self.t.w
    }

    /// Unit directions of the two texture axes.
    pub fn directions(&self) -> [Point3F; 2] {
        [
            normalize_or_zero(self.s.truncate()),
            normalize_or_zero(self.t.truncate()),
        ]
    }

    /// Bitwise equality, used to share texinfo between faces.
    pub fn bits(&self) -> [u32; 8] {
        [
            self.s.x.to_bits(),
            self.s.y.to_bits(),
            self.s.z.to_bits(),
            self.s.w.to_bits(),
            self.t.x.to_bits(),
            self.t.y.to_bits(),
            self.t.z.to_bits(),
            self.t.w.to_bits(),
        ]
    }
}

fn normalize_or_zero(v: Point3F) -> Point3F {
    if v.magnitude2() > 0.0 {
        v.normalize()
    } else {
        v
    }
}

/// Vertex indices of a face, walked through its signed edge list. The ranges
/// must already be validated.
pub fn face_loop(
    edges: &[Edge],
    surfedges: &[i32],
    first_edge: usize,
    num_edges: usize,
) -> Vec<VertexIndex> {
    surfedges[first_edge..first_edge + num_edges]
        .iter()
        .map(|surfedge| {
            if *surfedge >= 0 {
                edges[*surfedge as usize].vertex(0)
            } else {
                edges[surfedge.unsigned_abs() as usize].vertex(1)
            }
        })
        .collect()
}
