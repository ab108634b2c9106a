#![allow(dead_code)]

use bsp::pc::{self, PcBsp};
use bsp::texture::Texture;
use bsp::types::*;
use cgmath::{InnerSpace, Vector3, Vector4};

/// Builds small PC maps: every face lies on the z = 0 plane with a flat
/// texture projection and lives in the single empty leaf.
pub struct MapBuilder {
    pc: PcBsp,
}

impl MapBuilder {
    pub fn new() -> MapBuilder {
        let plane = |normal: Vector3<f32>, dist, kind| Plane { normal, dist, kind };
        let leaf = |contents, visibility| pc::Leaf {
            contents,
            visibility,
            mins: [-2048, -2048, -64],
            maxs: [2048, 2048, 64],
            first_marksurface: 0,
            num_marksurfaces: 0,
            ambient: [0; 4],
        };
        MapBuilder {
            pc: PcBsp {
                entities: b"{\n\"classname\" \"worldspawn\"\n\"wad\" \"base.wad\"\n}\n".to_vec(),
                planes: vec![
                    plane(Vector3::new(0.0, 0.0, 1.0), 0.0, 2),
                    plane(Vector3::new(1.0, 0.0, 0.0), 2048.0, 0),
                ],
                textures: vec![],
                vertices: vec![],
                visibility: vec![0xff, 0x00, 0x01, 0x02],
                nodes: vec![pc::Node {
                    plane: PlaneIndex::new(1),
                    children: [
                        ChildRef::Leaf(LeafIndex::new(1)),
                        ChildRef::Leaf(LeafIndex::new(2)),
                    ],
                    mins: [-2048, -2048, -64],
                    maxs: [2048, 2048, 64],
                    first_face: 0,
                    num_faces: 0,
                }],
                texinfo: vec![],
                faces: vec![],
                lighting: vec![0x40; 64],
                clipnodes: vec![Clipnode {
                    plane: 1,
                    children: [CONTENTS_EMPTY as i16, CONTENTS_SOLID as i16],
                }],
                leafs: vec![
                    leaf(CONTENTS_SOLID, None),
                    leaf(CONTENTS_EMPTY, Some(0)),
                    leaf(CONTENTS_WATER, Some(2)),
                ],
                marksurfaces: vec![],
                edges: vec![Edge { vertices: [0, 0] }],
                surfedges: vec![],
                models: vec![Model {
                    mins: Vector3::new(-2048.0, -2048.0, -64.0),
                    maxs: Vector3::new(2048.0, 2048.0, 64.0),
                    origin: Vector3::new(0.0, 0.0, 0.0),
                    headnode: [0, 0, 0, 0],
                    visleafs: 2,
                    first_face: 0,
                    num_faces: 0,
                }],
            },
        }
    }

    /// Adds a texture and a flat texinfo using it.
    pub fn texture(&mut self, name: &str, size: u32) -> TexInfoIndex {
        let area = size * size;
        let pixels = vec![0x11; (area + area / 4 + area / 16 + area / 64) as usize];
        let texture = Texture::new(name, size, size, pixels).expect("texture size fits");
        self.pc.textures.push(Some(texture));
        let texture = TextureIndex::new(self.pc.textures.len() - 1);
        let special = name.starts_with('!') || name.starts_with('*') || name.starts_with("sky");
        self.pc.texinfo.push(pc::TexInfo {
            projection: Projection {
                s: Vector4::new(1.0, 0.0, 0.0, 0.0),
                t: Vector4::new(0.0, 1.0, 0.0, 0.0),
            },
            texture,
            flags: if special {
                TexInfoFlags::SPECIAL
            } else {
                TexInfoFlags::empty()
            },
        });
        TexInfoIndex::new(self.pc.texinfo.len() - 1)
    }

    fn vertex(&mut self, x: f32, y: f32) -> VertexIndex {
        let point = Vector3::new(x, y, 0.0);
        let index = match self.pc.vertices.iter().position(|v| *v == point) {
            Some(index) => index,
            None => {
                self.pc.vertices.push(point);
                self.pc.vertices.len() - 1
            }
        };
        VertexIndex::new(index)
    }

    /// Adds a counter-clockwise face on z = 0.
    pub fn face(&mut self, points: &[(f32, f32)], texinfo: TexInfoIndex) -> FaceIndex {
        let corners: Vec<VertexIndex> = points.iter().map(|(x, y)| self.vertex(*x, *y)).collect();
        let first_edge = self.pc.surfedges.len() as u32;
        for i in 0..corners.len() {
            let (a, b) = (corners[i], corners[(i + 1) % corners.len()]);
            let reversed = self
                .pc
                .edges
                .iter()
                .position(|edge| edge.vertex(0) == b && edge.vertex(1) == a);
            let surfedge = match reversed {
                Some(edge) if edge > 0 => -(edge as i32),
                _ => {
                    self.pc.edges.push(Edge::new(a, b));
                    (self.pc.edges.len() - 1) as i32
                }
            };
            self.pc.surfedges.push(surfedge);
        }

        let texture = self.pc.texinfo[texinfo.index()].texture;
        let liquid = self.pc.textures[texture.index()]
            .as_ref()
            .map_or(false, |texture| texture.is_liquid());
        self.pc.faces.push(pc::Face {
            plane: PlaneIndex::new(0),
            side: 0,
            first_edge,
            num_edges: corners.len() as u16,
            texinfo,
            styles: [0, 255, 255, 255],
            lighting: if liquid { None } else { Some(0) },
        });

        let face = self.pc.faces.len() - 1;
        self.pc.marksurfaces.push(face as u16);
        self.pc.nodes[0].num_faces += 1;
        self.pc.models[0].num_faces += 1;
        self.pc.leafs[1].num_marksurfaces += 1;
        FaceIndex::new(face)
    }

    pub fn build(self) -> PcBsp {
        self.pc
    }

    pub fn bytes(self) -> Vec<u8> {
        self.pc.to_bytes().expect("builder map serializes")
    }
}

pub fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<(f32, f32)> {
    vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
}

/// A water square, a wall square, a glass triangle and a scrolling belt.
pub fn mixed_map() -> MapBuilder {
    let mut map = MapBuilder::new();
    let water = map.texture("!water", 64);
    let wall = map.texture("wall", 64);
    let glass = map.texture("{glass", 16);
    let belt = map.texture("scroll_belt", 32);
    map.face(&rect(0.0, 0.0, 64.0, 64.0), water);
    map.face(&rect(64.0, 0.0, 128.0, 64.0), wall);
    map.face(&[(200.0, 0.0), (210.0, 0.0), (200.0, 10.0)], glass);
    map.face(
        &[(300.0, 0.0), (400.0, -20.0), (460.0, 40.0), (420.0, 110.0), (330.0, 90.0)],
        belt,
    );
    map
}

/// Unsigned area of a planar polygon.
pub fn area(points: &[Vector3<f32>]) -> f32 {
    let mut sum = Vector3::new(0.0, 0.0, 0.0);
    for i in 1..points.len().saturating_sub(1) {
        sum += (points[i] - points[0]).cross(points[i + 1] - points[0]);
    }
    sum.magnitude() * 0.5
}
