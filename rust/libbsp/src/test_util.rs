use crate::console::{self, ConsoleBsp};
use crate::pc::{self, PcBsp};
use crate::polygon::{Polygon, PolygonVertex};
use crate::texture::Texture;
use crate::types::*;
use cgmath::{Vector3, Vector4};

fn planes() -> Vec<Plane> {
    vec![
        Plane {
            normal: Vector3::new(0.0, 0.0, 1.0),
            dist: 0.0,
            kind: 2,
        },
        Plane {
            normal: Vector3::new(1.0, 0.0, 0.0),
            dist: 96.0,
            kind: 0,
        },
    ]
}

fn vertices() -> Vec<Point3F> {
    vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(64.0, 0.0, 0.0),
        Vector3::new(64.0, 64.0, 0.0),
        Vector3::new(0.0, 64.0, 0.0),
        Vector3::new(100.0, 0.0, 0.0),
        Vector3::new(110.0, 0.0, 0.0),
        Vector3::new(100.0, 10.0, 0.0),
    ]
}

fn edges() -> Vec<Edge> {
    [[0, 0], [0, 1], [1, 2], [2, 3], [3, 0], [4, 5], [5, 6], [6, 4]]
        .iter()
        .map(|vertices| Edge {
            vertices: *vertices,
        })
        .collect()
}

fn textures() -> Vec<Option<Texture>> {
    vec![
        Some(Texture::new("wall", 16, 16, vec![7; 16 * 16 + 8 * 8 + 4 * 4 + 2 * 2]).unwrap()),
        Some(Texture::new("!water", 16, 16, vec![9; 16 * 16 + 8 * 8 + 4 * 4 + 2 * 2]).unwrap()),
    ]
}

fn flat_projection() -> Projection {
    Projection {
        s: Vector4::new(1.0, 0.0, 0.0, 0.0),
        t: Vector4::new(0.0, 1.0, 0.0, 0.0),
    }
}

fn model() -> Model {
    Model {
        mins: Vector3::new(0.0, 0.0, -16.0),
        maxs: Vector3::new(128.0, 64.0, 16.0),
        origin: Vector3::new(0.0, 0.0, 0.0),
        headnode: [0, 0, 0, 0],
        visleafs: 2,
        first_face: 0,
        num_faces: 2,
    }
}

const ENTITIES: &[u8] = b"{\n\"classname\" \"worldspawn\"\n}\n";

/// One node splitting a water leaf from an empty leaf, a 64x64 water face
/// and a small wall triangle.
pub fn sample_pc() -> PcBsp {
    PcBsp {
        entities: ENTITIES.to_vec(),
        planes: planes(),
        textures: textures(),
        vertices: vertices(),
        visibility: vec![0xff, 0x01, 0xff, 0x02],
        nodes: vec![pc::Node {
            plane: PlaneIndex::new(1),
            children: [
                ChildRef::Leaf(LeafIndex::new(1)),
                ChildRef::Leaf(LeafIndex::new(2)),
            ],
            mins: [0, 0, -16],
            maxs: [128, 64, 16],
            first_face: 0,
            num_faces: 2,
        }],
        texinfo: vec![
            pc::TexInfo {
                projection: flat_projection(),
                texture: TextureIndex::new(0),
                flags: TexInfoFlags::empty(),
            },
            pc::TexInfo {
                projection: flat_projection(),
                texture: TextureIndex::new(1),
                flags: TexInfoFlags::SPECIAL,
            },
        ],
        faces: vec![
            pc::Face {
                plane: PlaneIndex::new(0),
                side: 0,
                first_edge: 0,
                num_edges: 4,
                texinfo: TexInfoIndex::new(1),
                styles: [0, 255, 255, 255],
                lighting: None,
            },
            pc::Face {
                plane: PlaneIndex::new(0),
                side: 1,
                first_edge: 4,
                num_edges: 3,
                texinfo: TexInfoIndex::new(0),
                styles: [0, 255, 255, 255],
                lighting: Some(0),
            },
        ],
        lighting: vec![128; 16],
        clipnodes: vec![Clipnode {
            plane: 1,
            children: [CONTENTS_EMPTY as i16, CONTENTS_SOLID as i16],
        }],
        leafs: vec![
            pc::Leaf {
                contents: CONTENTS_SOLID,
                visibility: None,
                mins: [0; 3],
                maxs: [0; 3],
                first_marksurface: 0,
                num_marksurfaces: 0,
                ambient: [0; 4],
            },
            pc::Leaf {
                contents: CONTENTS_EMPTY,
                visibility: Some(0),
                mins: [0, 0, -16],
                maxs: [96, 64, 16],
                first_marksurface: 0,
                num_marksurfaces: 1,
                ambient: [0; 4],
            },
            pc::Leaf {
                contents: CONTENTS_WATER,
                visibility: Some(2),
                mins: [96, 0, -16],
                maxs: [128, 64, 16],
                first_marksurface: 1,
                num_marksurfaces: 1,
                ambient: [0, 0, 64, 0],
            },
        ],
        marksurfaces: vec![0, 1],
        edges: edges(),
        surfedges: vec![1, 2, 3, 4, 5, 6, 7],
        models: vec![model()],
    }
}

/// The console counterpart of `sample_pc`, with a hand-built polygon for the
/// water face.
pub fn sample_console() -> ConsoleBsp {
    let vertex = |x: f32, y: f32| PolygonVertex {
        position: Vector3::new(x, y, 0.0),
        st: [x / 16.0, y / 16.0],
        lightmap: [(x * 255.0 / 64.0) as u8, (y * 255.0 / 64.0) as u8],
    };
    ConsoleBsp {
        planes: planes(),
        nodes: vec![console::Node {
            plane: PlaneIndex::new(1),
            children: [
                ChildRef::Leaf(LeafIndex::new(1)),
                ChildRef::Leaf(LeafIndex::new(2)),
            ],
            mins: Vector3::new(0.0, 0.0, -16.0),
            maxs: Vector3::new(128.0, 64.0, 16.0),
            parent: None,
            first_face: 0,
            num_faces: 2,
        }],
        leafs: vec![
            console::Leaf {
                contents: CONTENTS_SOLID,
                mins: Vector3::new(0.0, 0.0, 0.0),
                maxs: Vector3::new(0.0, 0.0, 0.0),
                parent: None,
                visibility: None,
                first_marksurface: 0,
                num_marksurfaces: 0,
                key: 0,
                ambient: [0; 4],
            },
            console::Leaf {
                contents: CONTENTS_EMPTY,
                mins: Vector3::new(0.0, 0.0, -16.0),
                maxs: Vector3::new(96.0, 64.0, 16.0),
                parent: Some(NodeIndex::new(0)),
                visibility: Some(0),
                first_marksurface: 0,
                num_marksurfaces: 1,
                key: 0,
                ambient: [0; 4],
            },
            console::Leaf {
                contents: CONTENTS_WATER,
                mins: Vector3::new(96.0, 0.0, -16.0),
                maxs: Vector3::new(128.0, 64.0, 16.0),
                parent: Some(NodeIndex::new(0)),
                visibility: Some(2),
                first_marksurface: 1,
                num_marksurfaces: 1,
                key: 0,
                ambient: [0, 0, 64, 0],
            },
        ],
        edges: edges(),
        surfedges: vec![1, 2, 3, 4, 5, 6, 7],
        vertices: vertices(),
        hull0: vec![Clipnode {
            plane: 1,
            children: [CONTENTS_EMPTY as i16, CONTENTS_WATER as i16],
        }],
        clipnodes: vec![Clipnode {
            plane: 1,
            children: [CONTENTS_EMPTY as i16, CONTENTS_SOLID as i16],
        }],
        models: vec![model()],
        faces: vec![
            console::Face {
                plane: PlaneIndex::new(0),
                flags: SurfaceFlags::TURB | SurfaceFlags::TILED,
                first_edge: 0,
                num_edges: 4,
                texture_mins: [0, 0],
                extents: [64, 64],
                projection: flat_projection(),
                texture: TextureIndex::new(1),
                texinfo_flags: TexInfoFlags::SPECIAL,
                styles: [0, 255, 255, 255],
                lighting: None,
                polygon: Some(PolygonIndex::new(0)),
            },
            console::Face {
                plane: PlaneIndex::new(0),
                flags: SurfaceFlags::PLANE_BACK,
                first_edge: 4,
                num_edges: 3,
                texture_mins: [96, 0],
                extents: [16, 16],
                projection: flat_projection(),
                texture: TextureIndex::new(0),
                texinfo_flags: TexInfoFlags::empty(),
                styles: [0, 255, 255, 255],
                lighting: Some(0),
                polygon: None,
            },
        ],
        marksurfaces: vec![0, 1],
        visibility: vec![0xff, 0x01, 0xff, 0x02],
        lighting: vec![128; 16],
        textures: textures(),
        entities: ENTITIES.to_vec(),
        polygons: vec![Polygon {
            face: FaceIndex::new(0),
            vertices: vec![
                vertex(0.0, 0.0),
                vertex(64.0, 0.0),
                vertex(64.0, 64.0),
                vertex(0.0, 64.0),
            ],
            strips: vec![vec![0, 1, 3, 2]],
        }],
    }
}
