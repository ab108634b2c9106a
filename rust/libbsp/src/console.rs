use crate::error::{narrow, BspError, BspResult, DanglingReason};
use crate::io::{read_records, write_records, Readable, Record, Writable};
use crate::lump::{plan_layout, read_text_lump, Format, Header, LumpEntry, LumpKind, LumpWriter};
use crate::pc::check_models;
use crate::polygon::{polygon_offsets, read_polygons, Polygon};
use crate::resolve::{check_index, check_range, ChildRanges, LumpRange};
use crate::texture::{
    console_textures_size, read_console_textures, write_console_textures, Texture,
    CONSOLE_TEXTURE_SIZE,
};
use crate::types::*;
use bsp_derive::{Readable, Writable};
use bytes::{Buf, BufMut};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub plane: PlaneIndex,
    pub children: [ChildRef; 2],
    pub mins: Point3F,
    pub maxs: Point3F,
    pub parent: Option<NodeIndex>,
    pub first_face: u16,
    pub num_faces: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leaf {
    pub contents: i32,
    pub mins: Point3F,
    pub maxs: Point3F,
    pub parent: Option<NodeIndex>,
    /// Byte offset into the visibility lump.
    pub visibility: Option<u32>,
    pub first_marksurface: u32,
    pub num_marksurfaces: u32,
    pub key: u32,
    pub ambient: [u8; 4],
}

/// A face with its texinfo folded in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub plane: PlaneIndex,
    pub flags: SurfaceFlags,
    pub first_edge: u32,
    pub num_edges: u32,
    pub texture_mins: [i16; 2],
    pub extents: [i16; 2],
    pub projection: Projection,
    pub texture: TextureIndex,
    pub texinfo_flags: TexInfoFlags,
    pub styles: [u8; 4],
    /// Byte offset into the lighting lump.
    pub lighting: Option<u32>,
    pub polygon: Option<PolygonIndex>,
}

#[derive(Debug, Readable, Writable)]
struct PlaneRecord {
    normal: Point3F,
    dist: f32,
    kind: u8,
    signbits: u8,
    pad: u16,
}

impl Record for PlaneRecord {
    const SIZE: usize = 20;
}

#[derive(Debug, Readable, Writable)]
struct NodeRecord {
    contents: i32,
    visframe: i32,
    mins: Point3F,
    maxs: Point3F,
    parent: u32,
    plane: u32,
    children: [i32; 2],
    first_face: u16,
    num_faces: u16,
}

impl Record for NodeRecord {
    const SIZE: usize = 52;
}

#[derive(Debug, Readable, Writable)]
struct LeafRecord {
    contents: i32,
    visframe: i32,
    mins: Point3F,
    maxs: Point3F,
    parent: u32,
    visibility: u32,
    efrags: u32,
    first_marksurface: u32,
    num_marksurfaces: u32,
    key: u32,
    ambient: [u8; 4],
}

impl Record for LeafRecord {
    const SIZE: usize = 60;
}

#[derive(Debug, Readable, Writable)]
struct FaceRecord {
    plane: u32,
    flags: u32,
    first_edge: i32,
    num_edges: i32,
    texture_mins: [i16; 2],
    extents: [i16; 2],
    s: TexAxis,
    t: TexAxis,
    texture: u32,
    texinfo_flags: u32,
    styles: [u8; 4],
    lighting: u32,
    polygon: u32,
}

impl Record for FaceRecord {
    const SIZE: usize = 76;
}

/// A version 40 map: an in-memory image whose cross-references are absolute
/// byte offsets. Offsets are resolved to indices on load and re-linearized
/// on save.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleBsp {
    pub planes: Vec<Plane>,
    pub nodes: Vec<Node>,
    pub leafs: Vec<Leaf>,
    pub edges: Vec<Edge>,
    pub surfedges: Vec<i32>,
    pub vertices: Vec<Point3F>,
    /// Drawing hull: node children are clipnode indices or leaf contents.
    pub hull0: Vec<Clipnode>,
    pub clipnodes: Vec<Clipnode>,
    pub models: Vec<Model>,
    pub faces: Vec<Face>,
    pub marksurfaces: Vec<u16>,
    pub visibility: Vec<u8>,
    pub lighting: Vec<u8>,
    pub textures: Vec<Option<Texture>>,
    /// Entity text without its NUL terminator.
    pub entities: Vec<u8>,
    pub polygons: Vec<Polygon>,
}

/// Where every lump of a console image lands, in directory order.
struct Layout {
    planes: LumpRange,
    nodes: LumpRange,
    leafs: LumpRange,
    vertices: LumpRange,
    faces: LumpRange,
    marksurfaces: LumpRange,
    visibility: LumpRange,
    lighting: LumpRange,
    textures: LumpRange,
    polygons: Vec<u32>,
    offsets: Vec<u32>,
}

fn lump_records<T: Record>(data: &[u8], header: &Header, kind: LumpKind) -> BspResult<Vec<T>> {
    let count = header.element_count(kind, T::SIZE)?;
    read_records(header.slice(data, kind), count)
}

fn check_hull(hull: &[Clipnode], lump: LumpKind, planes: usize) -> BspResult<()> {
    for clipnode in hull {
        check_index(lump, LumpKind::Planes, clipnode.plane as i64, planes)?;
        for child in clipnode.children {
            if child >= 0 {
                check_index(lump, lump, child as i64, hull.len())?;
            }
        }
    }
    Ok(())
}

impl ConsoleBsp {
    pub fn from_bytes(data: &[u8]) -> BspResult<ConsoleBsp> {
        let header = Header::read(data, Format::Console)?;
        let entry = |kind: LumpKind| header.entry(kind);

        let raw_planes: Vec<PlaneRecord> = lump_records(data, &header, LumpKind::Planes)?;
        let raw_nodes: Vec<NodeRecord> = lump_records(data, &header, LumpKind::Nodes)?;
        let raw_leafs: Vec<LeafRecord> = lump_records(data, &header, LumpKind::Leafs)?;
        let edges: Vec<Edge> = lump_records(data, &header, LumpKind::Edges)?;
        let surfedges: Vec<i32> = lump_records(data, &header, LumpKind::Surfedges)?;
        let vertices: Vec<Point3F> = lump_records(data, &header, LumpKind::Vertexes)?;
        let hull0: Vec<Clipnode> = lump_records(data, &header, LumpKind::Hull0)?;
        let clipnodes: Vec<Clipnode> = lump_records(data, &header, LumpKind::Clipnodes)?;
        let models: Vec<Model> = lump_records(data, &header, LumpKind::Models)?;
        let raw_faces: Vec<FaceRecord> = lump_records(data, &header, LumpKind::Faces)?;
        let marksurfaces: Vec<u16> = lump_records(data, &header, LumpKind::Marksurfaces)?;
        let visibility = header.slice(data, LumpKind::Visibility).to_vec();
        let lighting = header.slice(data, LumpKind::Lighting).to_vec();
        let entities = read_text_lump(header.slice(data, LumpKind::Entities), LumpKind::Entities)?;

        let range = |kind: LumpKind, size: usize, count: usize| {
            LumpRange::new(kind, entry(kind), size, count)
        };
        let planes_range = range(LumpKind::Planes, PlaneRecord::SIZE, raw_planes.len());
        let children = ChildRanges {
            nodes: range(LumpKind::Nodes, NodeRecord::SIZE, raw_nodes.len()),
            leafs: range(LumpKind::Leafs, LeafRecord::SIZE, raw_leafs.len()),
        };
        let marksurfaces_range = range(LumpKind::Marksurfaces, 2, marksurfaces.len());
        let visibility_range = LumpRange::bytes(LumpKind::Visibility, entry(LumpKind::Visibility));
        let lighting_range = LumpRange::bytes(LumpKind::Lighting, entry(LumpKind::Lighting));
        let texture_count = header.element_count(LumpKind::Textures, CONSOLE_TEXTURE_SIZE)?;
        let textures_range = range(LumpKind::Textures, CONSOLE_TEXTURE_SIZE, texture_count);
        let textures =
            read_console_textures(header.slice(data, LumpKind::Textures), &textures_range)?;

        let polygon_count = header.element_count(LumpKind::Polygons, 12)?;
        let (polygons, polygon_starts) = read_polygons(
            header.slice(data, LumpKind::Polygons),
            polygon_count,
            entry(LumpKind::Polygons).offset,
            raw_faces.len(),
        )?;

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
        check_hull(&hull0, LumpKind::Hull0, raw_planes.len())?;
        check_hull(&clipnodes, LumpKind::Clipnodes, raw_planes.len())?;

        let planes = raw_planes
            .into_iter()
            .map(|raw| Plane {
                normal: raw.normal,
                dist: raw.dist,
                kind: raw.kind as i32,
            })
            .collect::<Vec<_>>();

        let parent = |from: LumpKind, offset: u32| -> BspResult<Option<NodeIndex>> {
            Ok(children
                .nodes
                .resolve_optional(from, offset)?
                .map(NodeIndex::new))
        };

        let nodes = raw_nodes
            .into_iter()
            .map(|raw| -> BspResult<Node> {
                check_range(
                    LumpKind::Nodes,
                    LumpKind::Faces,
                    raw.first_face as i64,
                    raw.num_faces as i64,
                    raw_faces.len(),
                )?;
                Ok(Node {
                    plane: PlaneIndex::new(planes_range.resolve(LumpKind::Nodes, raw.plane)?),
                    children: [
                        children.resolve(LumpKind::Nodes, raw.children[0])?,
                        children.resolve(LumpKind::Nodes, raw.children[1])?,
                    ],
                    mins: raw.mins,
                    maxs: raw.maxs,
                    parent: parent(LumpKind::Nodes, raw.parent)?,
                    first_face: raw.first_face,
                    num_faces: raw.num_faces,
                })
            })
            .collect::<BspResult<Vec<_>>>()?;

        let leafs = raw_leafs
            .into_iter()
            .map(|raw| -> BspResult<Leaf> {
                let first_marksurface = marksurfaces_range.resolve_range_start(
                    LumpKind::Leafs,
                    raw.first_marksurface,
                    raw.num_marksurfaces as usize,
                )?;
                Ok(Leaf {
                    contents: raw.contents,
                    mins: raw.mins,
                    maxs: raw.maxs,
                    parent: parent(LumpKind::Leafs, raw.parent)?,
                    visibility: visibility_range
                        .resolve_optional(LumpKind::Leafs, raw.visibility)?
                        .map(|offset| offset as u32),
                    first_marksurface: first_marksurface as u32,
                    num_marksurfaces: raw.num_marksurfaces,
                    key: raw.key,
                    ambient: raw.ambient,
                })
            })
            .collect::<BspResult<Vec<_>>>()?;

        let faces = raw_faces
            .into_iter()
            .map(|raw| -> BspResult<Face> {
                let first_edge = check_range(
                    LumpKind::Faces,
                    LumpKind::Surfedges,
                    raw.first_edge as i64,
                    raw.num_edges as i64,
                    surfedges.len(),
                )?;
                let polygon = match raw.polygon {
                    NO_REFERENCE => None,
                    offset => match polygon_starts.get(&offset) {
                        Some(index) => Some(PolygonIndex::new(*index)),
                        None => {
                            return Err(BspError::dangling(
                                LumpKind::Faces,
                                LumpKind::Polygons,
                                offset as i64,
                                DanglingReason::NotARecordStart,
                            ))
                        }
                    },
                };
                Ok(Face {
                    plane: PlaneIndex::new(planes_range.resolve(LumpKind::Faces, raw.plane)?),
                    flags: SurfaceFlags::from_bits_truncate(raw.flags),
                    first_edge: first_edge as u32,
                    num_edges: raw.num_edges as u32,
                    texture_mins: raw.texture_mins,
                    extents: raw.extents,
                    projection: Projection { s: raw.s, t: raw.t },
                    texture: TextureIndex::new(
                        textures_range.resolve(LumpKind::Faces, raw.texture)?,
                    ),
                    texinfo_flags: TexInfoFlags::from_bits_truncate(raw.texinfo_flags),
                    styles: raw.styles,
                    lighting: lighting_range
                        .resolve_optional(LumpKind::Faces, raw.lighting)?
                        .map(|offset| offset as u32),
                    polygon,
                })
            })
            .collect::<BspResult<Vec<_>>>()?;

        check_models(&models, nodes.len(), faces.len())?;
        debug!(
            "read console map: {} planes, {} nodes, {} leafs, {} faces, {} polygons",
            planes.len(),
            nodes.len(),
            leafs.len(),
            faces.len(),
            polygons.len()
        );

        let map = ConsoleBsp {
            planes,
            nodes,
            leafs,
            edges,
            surfedges,
            vertices,
            hull0,
            clipnodes,
            models,
            faces,
            marksurfaces,
            visibility,
            lighting,
            textures,
            entities,
            polygons,
        };
        map.check_polygon_links()?;
        Ok(map)
    }

    fn layout(&self) -> Layout {
        let lengths = [
            self.planes.len() * PlaneRecord::SIZE,
            self.nodes.len() * NodeRecord::SIZE,
            self.leafs.len() * LeafRecord::SIZE,
            self.edges.len() * Edge::SIZE,
            self.surfedges.len() * i32::SIZE,
            self.vertices.len() * Point3F::SIZE,
            self.hull0.len() * Clipnode::SIZE,
            self.clipnodes.len() * Clipnode::SIZE,
            self.models.len() * Model::SIZE,
            self.faces.len() * FaceRecord::SIZE,
            self.marksurfaces.len() * u16::SIZE,
            self.visibility.len(),
            self.lighting.len(),
            console_textures_size(&self.textures),
            self.entities.len() + 1,
            self.polygons.iter().map(|polygon| polygon.byte_size()).sum(),
        ];
        let offsets = plan_layout(Format::Console, &lengths);
        let at = |kind: LumpKind| {
            let slot = Format::Console
                .lumps()
                .iter()
                .position(|k| *k == kind)
                .unwrap_or(0);
            LumpEntry {
                offset: offsets[slot],
                length: lengths[slot] as u32,
                count: 0,
            }
        };

        let range = |kind: LumpKind, size: usize, count: usize| {
            LumpRange::new(kind, at(kind), size, count)
        };

        Layout {
            planes: range(LumpKind::Planes, PlaneRecord::SIZE, self.planes.len()),
            nodes: range(LumpKind::Nodes, NodeRecord::SIZE, self.nodes.len()),
            leafs: range(LumpKind::Leafs, LeafRecord::SIZE, self.leafs.len()),
            vertices: range(LumpKind::Vertexes, Point3F::SIZE, self.vertices.len()),
            faces: range(LumpKind::Faces, FaceRecord::SIZE, self.faces.len()),
            marksurfaces: range(LumpKind::Marksurfaces, 2, self.marksurfaces.len()),
            visibility: LumpRange::bytes(LumpKind::Visibility, at(LumpKind::Visibility)),
            lighting: LumpRange::bytes(LumpKind::Lighting, at(LumpKind::Lighting)),
            textures: range(LumpKind::Textures, CONSOLE_TEXTURE_SIZE, self.textures.len()),
            polygons: polygon_offsets(&self.polygons, at(LumpKind::Polygons).offset),
            offsets,
        }
    }

    pub fn to_bytes(&self) -> BspResult<Vec<u8>> {
        let layout = self.layout();
        let children = ChildRanges {
            nodes: layout.nodes,
            leafs: layout.leafs,
        };
        let mut writer = LumpWriter::new(Format::Console);
        let mut written = Vec::with_capacity(layout.offsets.len());

        written.push(writer.lump(LumpKind::Planes, self.planes.len(), |out| {
            for plane in &self.planes {
                PlaneRecord {
                    normal: plane.normal,
                    dist: plane.dist,
                    kind: narrow(plane.kind.max(0) as usize, "plane type", u8::MAX as usize)?,
                    signbits: plane.signbits(),
                    pad: 0,
                }
                .write(out)?;
            }
            Ok(())
        })?);
        written.push(writer.lump(LumpKind::Nodes, self.nodes.len(), |out| {
            for node in &self.nodes {
                NodeRecord {
                    contents: 0,
                    visframe: 0,
                    mins: node.mins,
                    maxs: node.maxs,
                    parent: layout.nodes.offset_of_optional(node.parent.map(|p| p.index())),
                    plane: layout.planes.offset_of(node.plane.index()),
                    children: [
                        children.offset_of(node.children[0]),
                        children.offset_of(node.children[1]),
                    ],
                    first_face: node.first_face,
                    num_faces: node.num_faces,
                }
                .write(out)?;
            }
            Ok(())
        })?);
        written.push(writer.lump(LumpKind::Leafs, self.leafs.len(), |out| {
            for leaf in &self.leafs {
                LeafRecord {
                    contents: leaf.contents,
                    visframe: 0,
                    mins: leaf.mins,
                    maxs: leaf.maxs,
                    parent: layout.nodes.offset_of_optional(leaf.parent.map(|p| p.index())),
                    visibility: layout
                        .visibility
                        .offset_of_optional(leaf.visibility.map(|offset| offset as usize)),
                    efrags: 0,
                    first_marksurface: layout
                        .marksurfaces
                        .offset_of(leaf.first_marksurface as usize),
                    num_marksurfaces: leaf.num_marksurfaces,
                    key: leaf.key,
                    ambient: leaf.ambient,
                }
                .write(out)?;
            }
            Ok(())
        })?);
        written.push(writer.lump(LumpKind::Edges, self.edges.len(), |out| {
            write_records(&self.edges, out)
        })?);
        written.push(writer.lump(LumpKind::Surfedges, self.surfedges.len(), |out| {
            write_records(&self.surfedges, out)
        })?);
        written.push(writer.lump(LumpKind::Vertexes, layout.vertices.count, |out| {
            write_records(&self.vertices, out)
        })?);
        written.push(writer.lump(LumpKind::Hull0, self.hull0.len(), |out| {
            write_records(&self.hull0, out)
        })?);
        written.push(writer.lump(LumpKind::Clipnodes, self.clipnodes.len(), |out| {
            write_records(&self.clipnodes, out)
        })?);
        written.push(writer.lump(LumpKind::Models, self.models.len(), |out| {
            write_records(&self.models, out)
        })?);
        written.push(writer.lump(LumpKind::Faces, layout.faces.count, |out| {
            for face in &self.faces {
                FaceRecord {
                    plane: layout.planes.offset_of(face.plane.index()),
                    flags: face.flags.bits(),
                    first_edge: narrow(face.first_edge as usize, "surfedges", i32::MAX as usize)?,
                    num_edges: narrow(face.num_edges as usize, "face edges", i32::MAX as usize)?,
                    texture_mins: face.texture_mins,
                    extents: face.extents,
                    s: face.projection.s,
                    t: face.projection.t,
                    texture: layout.textures.offset_of(face.texture.index()),
                    texinfo_flags: face.texinfo_flags.bits(),
                    styles: face.styles,
                    lighting: layout
                        .lighting
                        .offset_of_optional(face.lighting.map(|offset| offset as usize)),
                    polygon: match face.polygon {
                        None => NO_REFERENCE,
                        Some(polygon) => *layout.polygons.get(polygon.index()).ok_or_else(|| {
                            BspError::dangling(
                                LumpKind::Faces,
                                LumpKind::Polygons,
                                polygon.index() as i64,
                                DanglingReason::PastEnd {
                                    count: self.polygons.len(),
                                },
                            )
                        })?,
                    },
                }
                .write(out)?;
            }
            Ok(())
        })?);
        written.push(writer.lump(LumpKind::Marksurfaces, self.marksurfaces.len(), |out| {
            write_records(&self.marksurfaces, out)
        })?);
        written.push(writer.lump(LumpKind::Visibility, self.visibility.len(), |out| {
            out.extend_from_slice(&self.visibility);
            Ok(())
        })?);
        written.push(writer.lump(LumpKind::Lighting, self.lighting.len(), |out| {
            out.extend_from_slice(&self.lighting);
            Ok(())
        })?);
        written.push(writer.lump(LumpKind::Textures, self.textures.len(), |out| {
            write_console_textures(&self.textures, &layout.textures, out)
        })?);
        written.push(writer.lump(LumpKind::Entities, self.entities.len() + 1, |out| {
            out.extend_from_slice(&self.entities);
            out.push(0);
            Ok(())
        })?);
        written.push(writer.lump(LumpKind::Polygons, self.polygons.len(), |out| {
            write_records(&self.polygons, out)
        })?);

        debug_assert_eq!(written, layout.offsets);
        writer.finish()
    }

    /// Number of faces flagged for a rendering polygon.
    pub fn flagged_faces(&self) -> usize {
        self.faces
            .iter()
            .filter(|face| face.flags.intersects(SurfaceFlags::GEOMETRY))
            .count()
    }

    /// Every polygon names a face that links back to it, every linked face is
    /// named by its polygon, and there is one polygon per flagged face.
    fn check_polygon_links(&self) -> BspResult<()> {
        let flagged = self.flagged_faces();
        if flagged != self.polygons.len() {
            return Err(BspError::TopologyMismatch {
                declared: self.polygons.len(),
                flagged,
            });
        }

        for (i, polygon) in self.polygons.iter().enumerate() {
            let face = polygon.face.index();
            if self.faces[face].polygon != Some(PolygonIndex::new(i)) {
                return Err(BspError::PolygonBackLink { polygon: i, face });
            }
        }
        for (face, linked) in self.faces.iter().enumerate() {
            if let Some(polygon) = linked.polygon {
                if self.polygons[polygon.index()].face.index() != face {
                    return Err(BspError::PolygonBackLink {
                        polygon: polygon.index(),
                        face,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn face_vertices(&self, face: &Face) -> Vec<VertexIndex> {
        face_loop(
            &self.edges,
            &self.surfedges,
            face.first_edge as usize,
            face.num_edges as usize,
        )
    }
}
