use crate::error::{narrow, BspResult};
use crate::io::{read_records, write_records, Readable, Record, Writable};
use crate::lump::{read_text_lump, Format, Header, LumpKind, LumpWriter};
use crate::resolve::{check_index, check_optional_offset, check_range};
use crate::texture::{read_pc_textures, write_pc_textures, Texture};
use crate::types::*;
use bsp_derive::{Readable, Writable};
use bytes::{Buf, BufMut};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexInfo {
    pub projection: Projection,
    pub texture: TextureIndex,
    pub flags: TexInfoFlags,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub plane: PlaneIndex,
    pub children: [ChildRef; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_face: u16,
    pub num_faces: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub plane: PlaneIndex,
    pub side: u16,
    pub first_edge: u32,
    pub num_edges: u16,
    pub texinfo: TexInfoIndex,
    pub styles: [u8; 4],
    /// Byte offset into the lighting lump.
    pub lighting: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leaf {
    pub contents: i32,
    /// Byte offset into the visibility lump.
    pub visibility: Option<u32>,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_marksurface: u16,
    pub num_marksurfaces: u16,
    pub ambient: [u8; 4],
}

#[derive(Debug, Readable, Writable)]
struct NodeRecord {
    plane: u32,
    children: [i16; 2],
    mins: [i16; 3],
    maxs: [i16; 3],
    first_face: u16,
    num_faces: u16,
}

impl Record for NodeRecord {
    const SIZE: usize = 24;
}

#[derive(Debug, Readable, Writable)]
struct TexInfoRecord {
    s: TexAxis,
    t: TexAxis,
    texture: u32,
    flags: u32,
}

impl Record for TexInfoRecord {
    const SIZE: usize = 40;
}

#[derive(Debug, Readable, Writable)]
struct FaceRecord {
    plane: u16,
    side: u16,
    first_edge: i32,
    num_edges: u16,
    texinfo: u16,
    styles: [u8; 4],
    lighting: i32,
}

impl Record for FaceRecord {
    const SIZE: usize = 20;
}

#[derive(Debug, Readable, Writable)]
struct LeafRecord {
    contents: i32,
    visibility: i32,
    mins: [i16; 3],
    maxs: [i16; 3],
    first_marksurface: u16,
    num_marksurfaces: u16,
    ambient: [u8; 4],
}

impl Record for LeafRecord {
    const SIZE: usize = 28;
}

/// A version 30 map: flat arrays cross-referenced by index.
#[derive(Debug, Clone, PartialEq)]
pub struct PcBsp {
    /// Entity text without its NUL terminator.
    pub entities: Vec<u8>,
    pub planes: Vec<Plane>,
    pub textures: Vec<Option<Texture>>,
    pub vertices: Vec<Point3F>,
    pub visibility: Vec<u8>,
    pub nodes: Vec<Node>,
    pub texinfo: Vec<TexInfo>,
    pub faces: Vec<Face>,
    pub lighting: Vec<u8>,
    pub clipnodes: Vec<Clipnode>,
    pub leafs: Vec<Leaf>,
    pub marksurfaces: Vec<u16>,
    pub edges: Vec<Edge>,
    pub surfedges: Vec<i32>,
    pub models: Vec<Model>,
}

fn lump_records<T: Record>(data: &[u8], header: &Header, kind: LumpKind) -> BspResult<Vec<T>> {
    let count = header.element_count(kind, T::SIZE)?;
    read_records(header.slice(data, kind), count)
}

impl PcBsp {
    pub fn from_bytes(data: &[u8]) -> BspResult<PcBsp> {
        let header = Header::read(data, Format::Pc)?;

        let entities = read_text_lump(header.slice(data, LumpKind::Entities), LumpKind::Entities)?;
        let planes: Vec<Plane> = lump_records(data, &header, LumpKind::Planes)?;
        let textures = read_pc_textures(header.slice(data, LumpKind::Textures))?;
        let vertices: Vec<Point3F> = lump_records(data, &header, LumpKind::Vertexes)?;
        let visibility = header.slice(data, LumpKind::Visibility).to_vec();
        let raw_nodes: Vec<NodeRecord> = lump_records(data, &header, LumpKind::Nodes)?;
        let raw_texinfo: Vec<TexInfoRecord> = lump_records(data, &header, LumpKind::TexInfo)?;
        let raw_faces: Vec<FaceRecord> = lump_records(data, &header, LumpKind::Faces)?;
        let lighting = header.slice(data, LumpKind::Lighting).to_vec();
        let clipnodes: Vec<Clipnode> = lump_records(data, &header, LumpKind::Clipnodes)?;
        let raw_leafs: Vec<LeafRecord> = lump_records(data, &header, LumpKind::Leafs)?;
        let marksurfaces: Vec<u16> = lump_records(data, &header, LumpKind::Marksurfaces)?;
        let edges: Vec<Edge> = lump_records(data, &header, LumpKind::Edges)?;
        let surfedges: Vec<i32> = lump_records(data, &header, LumpKind::Surfedges)?;
        let models: Vec<Model> = lump_records(data, &header, LumpKind::Models)?;

        for edge in &edges {
            for vertex in edge.vertices {
                check_index(LumpKind::Edges, LumpKind::Vertexes, vertex as i64, vertices.len())?;
            }
        }
        for surfedge in &surfedges {
            check_index(
                LumpKind::Surfedges,
                LumpKind::Edges,
                surfedge.unsigned_abs() as i64,
                edges.len(),
            )?;
        }
        for face in &marksurfaces {
            check_index(LumpKind::Marksurfaces, LumpKind::Faces, *face as i64, raw_faces.len())?;
        }
        for clipnode in &clipnodes {
            check_index(
                LumpKind::Clipnodes,
                LumpKind::Planes,
                clipnode.plane as i64,
                planes.len(),
            )?;
            for child in clipnode.children {
                if child >= 0 {
                    let count = clipnodes.len();
                    check_index(LumpKind::Clipnodes, LumpKind::Clipnodes, child as i64, count)?;
                }
            }
        }

        let texinfo = raw_texinfo
            .into_iter()
            .map(|raw| -> BspResult<TexInfo> {
                let texture = check_index(
                    LumpKind::TexInfo,
                    LumpKind::Textures,
                    raw.texture as i64,
                    textures.len(),
                )?;
                Ok(TexInfo {
                    projection: Projection { s: raw.s, t: raw.t },
                    texture: TextureIndex::new(texture),
                    flags: TexInfoFlags::from_bits_truncate(raw.flags),
                })
            })
            .collect::<BspResult<Vec<_>>>()?;

        let faces = raw_faces
            .into_iter()
            .map(|raw| -> BspResult<Face> {
                let plane =
                    check_index(LumpKind::Faces, LumpKind::Planes, raw.plane as i64, planes.len())?;
                let first_edge = check_range(
                    LumpKind::Faces,
                    LumpKind::Surfedges,
                    raw.first_edge as i64,
                    raw.num_edges as i64,
                    surfedges.len(),
                )?;
                let texinfo_index = check_index(
                    LumpKind::Faces,
                    LumpKind::TexInfo,
                    raw.texinfo as i64,
                    texinfo.len(),
                )?;
                let lighting = check_optional_offset(
                    LumpKind::Faces,
                    LumpKind::Lighting,
                    raw.lighting,
                    lighting.len(),
                )?;
                Ok(Face {
                    plane: PlaneIndex::new(plane),
                    side: raw.side,
                    first_edge: first_edge as u32,
                    num_edges: raw.num_edges,
                    texinfo: TexInfoIndex::new(texinfo_index),
                    styles: raw.styles,
                    lighting,
                })
            })
            .collect::<BspResult<Vec<_>>>()?;

        let node_count = raw_nodes.len();
        let nodes = raw_nodes
            .into_iter()
            .map(|raw| -> BspResult<Node> {
                let plane =
                    check_index(LumpKind::Nodes, LumpKind::Planes, raw.plane as i64, planes.len())?;
                check_range(
                    LumpKind::Nodes,
                    LumpKind::Faces,
                    raw.first_face as i64,
                    raw.num_faces as i64,
                    faces.len(),
                )?;
                Ok(Node {
                    plane: PlaneIndex::new(plane),
                    children: [
                        ChildRef::from_pc(raw.children[0], node_count, raw_leafs.len())?,
                        ChildRef::from_pc(raw.children[1], node_count, raw_leafs.len())?,
                    ],
                    mins: raw.mins,
                    maxs: raw.maxs,
                    first_face: raw.first_face,
                    num_faces: raw.num_faces,
                })
            })
            .collect::<BspResult<Vec<_>>>()?;

        let leafs = raw_leafs
            .into_iter()
            .map(|raw| -> BspResult<Leaf> {
                check_range(
                    LumpKind::Leafs,
                    LumpKind::Marksurfaces,
                    raw.first_marksurface as i64,
                    raw.num_marksurfaces as i64,
                    marksurfaces.len(),
                )?;
                Ok(Leaf {
                    contents: raw.contents,
                    visibility: check_optional_offset(
                        LumpKind::Leafs,
                        LumpKind::Visibility,
                        raw.visibility,
                        visibility.len(),
                    )?,
                    mins: raw.mins,
                    maxs: raw.maxs,
                    first_marksurface: raw.first_marksurface,
                    num_marksurfaces: raw.num_marksurfaces,
                    ambient: raw.ambient,
                })
            })
            .collect::<BspResult<Vec<_>>>()?;

        check_models(&models, nodes.len(), faces.len())?;

        debug!(
            "read PC map: {} planes, {} nodes, {} leafs, {} faces, {} textures",
            planes.len(),
            nodes.len(),
            leafs.len(),
            faces.len(),
            textures.len()
        );

        Ok(PcBsp {
            entities,
            planes,
            textures,
            vertices,
            visibility,
            nodes,
            texinfo,
            faces,
            lighting,
            clipnodes,
            leafs,
            marksurfaces,
            edges,
            surfedges,
            models,
        })
    }

    pub fn to_bytes(&self) -> BspResult<Vec<u8>> {
        let mut writer = LumpWriter::new(Format::Pc);

        writer.lump(LumpKind::Entities, 0, |out| {
            out.extend_from_slice(&self.entities);
            out.push(0);
            Ok(())
        })?;
        writer.lump(LumpKind::Planes, 0, |out| write_records(&self.planes, out))?;
        writer.lump(LumpKind::Textures, 0, |out| write_pc_textures(&self.textures, out))?;
        writer.lump(LumpKind::Vertexes, 0, |out| write_records(&self.vertices, out))?;
        writer.lump(LumpKind::Visibility, 0, |out| {
            out.extend_from_slice(&self.visibility);
            Ok(())
        })?;
        writer.lump(LumpKind::Nodes, 0, |out| {
            for node in &self.nodes {
                NodeRecord {
                    plane: node.plane.raw(),
                    children: [node.children[0].to_pc()?, node.children[1].to_pc()?],
                    mins: node.mins,
                    maxs: node.maxs,
                    first_face: node.first_face,
                    num_faces: node.num_faces,
                }
                .write(out)?;
            }
            Ok(())
        })?;
        writer.lump(LumpKind::TexInfo, 0, |out| {
            for texinfo in &self.texinfo {
                TexInfoRecord {
                    s: texinfo.projection.s,
                    t: texinfo.projection.t,
                    texture: texinfo.texture.raw(),
                    flags: texinfo.flags.bits(),
                }
                .write(out)?;
            }
            Ok(())
        })?;
        writer.lump(LumpKind::Faces, 0, |out| {
            for face in &self.faces {
                FaceRecord {
                    plane: narrow(face.plane.index(), "face planes", u16::MAX as usize)?,
                    side: face.side,
                    first_edge: narrow(face.first_edge as usize, "surfedges", i32::MAX as usize)?,
                    num_edges: face.num_edges,
                    texinfo: narrow(face.texinfo.index(), "texinfo", u16::MAX as usize)?,
                    styles: face.styles,
                    lighting: face.lighting.map_or(-1, |offset| offset as i32),
                }
                .write(out)?;
            }
            Ok(())
        })?;
        writer.lump(LumpKind::Lighting, 0, |out| {
            out.extend_from_slice(&self.lighting);
            Ok(())
        })?;
        writer.lump(LumpKind::Clipnodes, 0, |out| write_records(&self.clipnodes, out))?;
        writer.lump(LumpKind::Leafs, 0, |out| {
            for leaf in &self.leafs {
                LeafRecord {
                    contents: leaf.contents,
                    visibility: leaf.visibility.map_or(-1, |offset| offset as i32),
                    mins: leaf.mins,
                    maxs: leaf.maxs,
                    first_marksurface: leaf.first_marksurface,
                    num_marksurfaces: leaf.num_marksurfaces,
                    ambient: leaf.ambient,
                }
                .write(out)?;
            }
            Ok(())
        })?;
        writer.lump(LumpKind::Marksurfaces, 0, |out| write_records(&self.marksurfaces, out))?;
        writer.lump(LumpKind::Edges, 0, |out| write_records(&self.edges, out))?;
        writer.lump(LumpKind::Surfedges, 0, |out| write_records(&self.surfedges, out))?;
        writer.lump(LumpKind::Models, 0, |out| write_records(&self.models, out))?;

        writer.finish()
    }

    /// Vertex indices of a face in winding order.
    pub fn face_vertices(&self, face: &Face) -> Vec<VertexIndex> {
        face_loop(
            &self.edges,
            &self.surfedges,
            face.first_edge as usize,
            face.num_edges as usize,
        )
    }

    /// The texture a face is drawn with, if its texinfo and texture exist.
    pub fn face_texture(&self, face: &Face) -> Option<&Texture> {
        let texinfo = self.texinfo.get(face.texinfo.index())?;
        self.textures.get(texinfo.texture.index())?.as_ref()
    }
}

/// Checks the face ranges and world head node shared by both layouts.
pub(crate) fn check_models(models: &[Model], nodes: usize, faces: usize) -> BspResult<()> {
    for model in models {
        check_range(
            LumpKind::Models,
            LumpKind::Faces,
            model.first_face as i64,
            model.num_faces as i64,
            faces,
        )?;
        if nodes > 0 {
            check_index(LumpKind::Models, LumpKind::Nodes, model.headnode[0] as i64, nodes)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BspError, DanglingReason};
    use crate::test_util::sample_pc;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_is_byte_identical() {
        let map = sample_pc();
        let bytes = map.to_bytes().unwrap();
        let read = PcBsp::from_bytes(&bytes).unwrap();
        assert_eq!(read, map);
        assert_eq!(read.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn lumps_are_four_byte_aligned() {
        let bytes = sample_pc().to_bytes().unwrap();
        let header = Header::read(&bytes, Format::Pc).unwrap();
        for (_, entry) in &header.entries {
            assert_eq!(entry.offset % 4, 0);
        }
    }

    #[test]
    fn rejects_face_with_missing_texinfo() {
        let mut map = sample_pc();
        map.faces[0].texinfo = TexInfoIndex::new(9);
        let bytes = map.to_bytes().unwrap();
        match PcBsp::from_bytes(&bytes) {
            Err(BspError::DanglingReference {
                from, to, reason, ..
            }) => {
                assert_eq!(from, LumpKind::Faces);
                assert_eq!(to, LumpKind::TexInfo);
                assert!(matches!(reason, DanglingReason::PastEnd { .. }));
            }
            other => panic!("expected dangling texinfo, got {:?}", other),
        }
    }

    #[test]
    fn rejects_leaf_child_past_leaf_count() {
        let mut map = sample_pc();
        map.nodes[0].children[1] = ChildRef::Leaf(LeafIndex::new(map.leafs.len()));
        let bytes = map.to_bytes().unwrap();
        assert!(matches!(
            PcBsp::from_bytes(&bytes),
            Err(BspError::DanglingReference {
                to: LumpKind::Leafs,
                ..
            })
        ));
    }

    #[test]
    fn rejects_unterminated_entities() {
        let bytes = sample_pc().to_bytes().unwrap();
        let header = Header::read(&bytes, Format::Pc).unwrap();
        let entities = header.entry(LumpKind::Entities);
        let mut broken = bytes.clone();
        broken[(entities.end() - 1) as usize] = b'}';
        assert!(matches!(
            PcBsp::from_bytes(&broken),
            Err(BspError::UnterminatedTextLump { .. })
        ));
    }

    #[test]
    fn face_texture_follows_texinfo() {
        let mut map = sample_pc();
        let water = map.faces[0];
        assert_eq!(map.face_texture(&water).map(|t| t.name()), Some("!water".to_string()));
        map.textures[1] = None;
        assert_eq!(map.face_texture(&water), None);
        let dangling = Face {
            texinfo: TexInfoIndex::new(9),
            ..water
        };
        assert_eq!(map.face_texture(&dangling), None);
    }

    #[test]
    fn sentinels_survive() {
        let mut map = sample_pc();
        map.faces[0].lighting = None;
        map.leafs[1].visibility = None;
        let read = PcBsp::from_bytes(&map.to_bytes().unwrap()).unwrap();
        assert_eq!(read.faces[0].lighting, None);
        assert_eq!(read.leafs[1].visibility, None);
    }
}
