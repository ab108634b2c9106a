use crate::liquid::fix_liquids;
use crate::mesh::FaceMesh;
use crate::services::{EntityService, TextureService};
use crate::surface::{surface_flags, texture_extents, to_i16};
use crate::ConvertOptions;
use bsp::console::{self, ConsoleBsp};
use bsp::error::{narrow, BspError, BspResult, DanglingReason};
use bsp::lump::{Format, LumpKind};
use bsp::pc::{self, PcBsp};
use bsp::texture::link_animations;
use bsp::types::*;
use cgmath::Vector3;
use std::collections::HashMap;
use std::iter;
use typed_ints::TypedEnum;

/// Parents of every node and leaf. Node 0 is walked first, then each
/// submodel's head node; a child reached twice keeps the later parent.
pub fn node_parents(
    children: &[[ChildRef; 2]],
    leafs: usize,
    roots: &[usize],
) -> (Vec<Option<NodeIndex>>, Vec<Option<NodeIndex>>) {
    let mut node_parents = vec![None; children.len()];
    let mut leaf_parents = vec![None; leafs];
    let mut visited = vec![false; children.len()];
    let mut stack = vec![];

    for root in roots.iter().copied().filter(|root| *root < children.len()) {
        stack.push(root);
        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            let parent = Some(NodeIndex::new(node));
            // Reversed so the front child is walked first.
            for child in children[node].iter().rev() {
                match child {
                    ChildRef::Node(index) if index.within(children.len()) => {
                        node_parents[index.index()] = parent;
                        stack.push(index.index());
                    }
                    ChildRef::Leaf(index) if index.within(leafs) => {
                        leaf_parents[index.index()] = parent;
                    }
                    _ => {}
                }
            }
        }
    }

    (node_parents, leaf_parents)
}

/// The drawing hull: one clipnode per node, leaf children replaced by their
/// contents.
pub fn drawing_hull(nodes: &[console::Node], leafs: &[console::Leaf]) -> BspResult<Vec<Clipnode>> {
    nodes
        .iter()
        .map(|node| -> BspResult<Clipnode> {
            let mut children = [0i16; 2];
            for (slot, child) in children.iter_mut().zip(node.children) {
                *slot = match child {
                    ChildRef::Node(index) => {
                        narrow::<i16>(index.index(), "hull 0 nodes", i16::MAX as usize)?
                    }
                    ChildRef::Leaf(index) => {
                        let leaf = leafs.get(index.index()).ok_or_else(|| {
                            BspError::dangling(
                                LumpKind::Nodes,
                                LumpKind::Leafs,
                                index.index() as i64,
                                DanglingReason::PastEnd { count: leafs.len() },
                            )
                        })?;
                        leaf.contents as i16
                    }
                };
            }
            Ok(Clipnode {
                plane: narrow::<i32>(node.plane.index(), "planes", i32::MAX as usize)?,
                children,
            })
        })
        .collect()
}

fn widen(bounds: [i16; 3]) -> Point3F {
    Vector3::new(bounds[0] as f32, bounds[1] as f32, bounds[2] as f32)
}

fn narrow_bounds(bounds: Point3F, round: fn(f32) -> f32) -> BspResult<[i16; 3]> {
    Ok([
        to_i16(round(bounds.x), "node bounds")?,
        to_i16(round(bounds.y), "node bounds")?,
        to_i16(round(bounds.z), "node bounds")?,
    ])
}

fn past_end(from: LumpKind, to: LumpKind, index: usize, count: usize) -> BspError {
    BspError::dangling(from, to, index as i64, DanglingReason::PastEnd { count })
}

/// Builds the console model of a validated PC map.
pub fn pc_to_console(
    pc: &PcBsp,
    options: &ConvertOptions,
    texture_service: &dyn TextureService,
    entity_service: &dyn EntityService,
) -> BspResult<ConsoleBsp> {
    let entities = entity_service.rewrite(&pc.entities, Format::Console)?;
    let (mut textures, remap) = texture_service.convert(&pc.textures, Format::Console)?;
    link_animations(&mut textures);

    let roots: Vec<usize> = iter::once(0)
        .chain(
            pc.models
                .iter()
                .skip(1)
                .filter_map(|model| usize::try_from(model.headnode[0]).ok()),
        )
        .collect();
    let children: Vec<[ChildRef; 2]> = pc.nodes.iter().map(|node| node.children).collect();
    let (node_parents, leaf_parents) = node_parents(&children, pc.leafs.len(), &roots);

    let nodes: Vec<console::Node> = pc
        .nodes
        .iter()
        .zip(node_parents)
        .map(|(node, parent)| console::Node {
            plane: node.plane,
            children: node.children,
            mins: widen(node.mins),
            maxs: widen(node.maxs),
            parent,
            first_face: node.first_face,
            num_faces: node.num_faces,
        })
        .collect();

    let leafs: Vec<console::Leaf> = pc
        .leafs
        .iter()
        .zip(leaf_parents)
        .map(|(leaf, parent)| console::Leaf {
            contents: leaf.contents,
            mins: widen(leaf.mins),
            maxs: widen(leaf.maxs),
            parent,
            visibility: leaf.visibility,
            first_marksurface: leaf.first_marksurface as u32,
            num_marksurfaces: leaf.num_marksurfaces as u32,
            key: 0,
            ambient: leaf.ambient,
        })
        .collect();

    let mut faces = Vec::with_capacity(pc.faces.len());
    let mut polygons = vec![];
    for (index, face) in pc.faces.iter().typed_enumerate() {
        let texinfo = pc
            .texinfo
            .get(face.texinfo.index())
            .ok_or_else(|| {
                past_end(LumpKind::Faces, LumpKind::TexInfo, face.texinfo.index(), pc.texinfo.len())
            })?;
        let texture = *remap
            .get(texinfo.texture.index())
            .ok_or_else(|| {
                let index = texinfo.texture.index();
                past_end(LumpKind::TexInfo, LumpKind::Textures, index, remap.len())
            })?;
        let source = pc.face_texture(face);

        let points: Vec<Point3F> = pc
            .face_vertices(face)
            .iter()
            .map(|vertex| pc.vertices[vertex.index()])
            .collect();
        let flags = surface_flags(face.side, source);
        let (texture_mins, extents) = texture_extents(&points, &texinfo.projection)?;

        let polygon = if flags.intersects(SurfaceFlags::GEOMETRY) {
            let texture_size = textures
                .get(texture.index())
                .and_then(Option::as_ref)
                .map_or((0, 0), |texture| texture_service.dimensions(texture));
            if texture_size.0 == 0 || texture_size.1 == 0 {
                warn!("face {} has a rendering polygon but its texture has no size", index);
            }
            let mesh = FaceMesh {
                points: &points,
                projection: &texinfo.projection,
                texture_mins,
                extents,
                texture_size,
            };
            polygons.push(mesh.build(index, options)?);
            Some(PolygonIndex::new(polygons.len() - 1))
        } else {
            None
        };

        faces.push(console::Face {
            plane: face.plane,
            flags,
            first_edge: face.first_edge,
            num_edges: face.num_edges as u32,
            texture_mins,
            extents,
            projection: texinfo.projection,
            texture,
            texinfo_flags: texinfo.flags,
            styles: face.styles,
            lighting: face.lighting,
            polygon,
        });
    }

    let hull0 = drawing_hull(&nodes, &leafs)?;

    info!(
        "PC -> console: {} faces, {} rendering polygons",
        faces.len(),
        polygons.len()
    );

    Ok(ConsoleBsp {
        planes: pc.planes.clone(),
        nodes,
        leafs,
        edges: pc.edges.clone(),
        surfedges: pc.surfedges.clone(),
        vertices: pc.vertices.clone(),
        hull0,
        clipnodes: pc.clipnodes.clone(),
        models: pc.models.clone(),
        faces,
        marksurfaces: pc.marksurfaces.clone(),
        visibility: pc.visibility.clone(),
        lighting: pc.lighting.clone(),
        textures,
        entities,
        polygons,
    })
}

type TexInfoKey = ([u32; 8], u32, u32);

/// One texinfo per distinct `(projection, texture, flags)`, numbered in face
/// order, and the texinfo of each face.
pub fn share_texinfo(
    faces: &[console::Face],
    remap: &[TextureIndex],
) -> BspResult<(Vec<pc::TexInfo>, Vec<TexInfoIndex>)> {
    let mut texinfo = vec![];
    let mut known: HashMap<TexInfoKey, TexInfoIndex> = HashMap::new();
    let mut assigned = Vec::with_capacity(faces.len());

    for face in faces {
        let texture = *remap
            .get(face.texture.index())
            .ok_or_else(|| {
                past_end(LumpKind::Faces, LumpKind::Textures, face.texture.index(), remap.len())
            })?;
        let key = (face.projection.bits(), texture.raw(), face.texinfo_flags.bits());
        let index = *known.entry(key).or_insert_with(|| {
            texinfo.push(pc::TexInfo {
                projection: face.projection,
                texture,
                flags: face.texinfo_flags,
            });
            TexInfoIndex::new(texinfo.len() - 1)
        });
        assigned.push(index);
    }

    Ok((texinfo, assigned))
}

/// Builds the PC model of a validated console map.
pub fn console_to_pc(
    console: &ConsoleBsp,
    options: &ConvertOptions,
    texture_service: &dyn TextureService,
    entity_service: &dyn EntityService,
) -> BspResult<PcBsp> {
    let entities = entity_service.rewrite(&console.entities, Format::Pc)?;
    let (textures, remap) = texture_service.convert(&console.textures, Format::Pc)?;
    let (texinfo, face_texinfo) = share_texinfo(&console.faces, &remap)?;

    let nodes = console
        .nodes
        .iter()
        .map(|node| -> BspResult<pc::Node> {
            Ok(pc::Node {
                plane: node.plane,
                children: node.children,
                mins: narrow_bounds(node.mins, f32::floor)?,
                maxs: narrow_bounds(node.maxs, f32::ceil)?,
                first_face: node.first_face,
                num_faces: node.num_faces,
            })
        })
        .collect::<BspResult<Vec<_>>>()?;

    let leafs = console
        .leafs
        .iter()
        .map(|leaf| -> BspResult<pc::Leaf> {
            Ok(pc::Leaf {
                contents: leaf.contents,
                visibility: leaf.visibility,
                mins: narrow_bounds(leaf.mins, f32::floor)?,
                maxs: narrow_bounds(leaf.maxs, f32::ceil)?,
                first_marksurface: narrow(
                    leaf.first_marksurface as usize,
                    "marksurfaces",
                    u16::MAX as usize,
                )?,
                num_marksurfaces: narrow(
                    leaf.num_marksurfaces as usize,
                    "marksurfaces",
                    u16::MAX as usize,
                )?,
                ambient: leaf.ambient,
            })
        })
        .collect::<BspResult<Vec<_>>>()?;

    let faces = console
        .faces
        .iter()
        .zip(face_texinfo)
        .map(|(face, texinfo)| -> BspResult<pc::Face> {
            Ok(pc::Face {
                plane: face.plane,
                side: if face.flags.contains(SurfaceFlags::PLANE_BACK) { 1 } else { 0 },
                first_edge: face.first_edge,
                num_edges: narrow(face.num_edges as usize, "face edges", u16::MAX as usize)?,
                texinfo,
                styles: face.styles,
                lighting: face.lighting,
            })
        })
        .collect::<BspResult<Vec<_>>>()?;

    let mut pc = PcBsp {
        entities,
        planes: console.planes.clone(),
        textures,
        vertices: console.vertices.clone(),
        visibility: console.visibility.clone(),
        nodes,
        texinfo,
        faces,
        lighting: console.lighting.clone(),
        clipnodes: console.clipnodes.clone(),
        leafs,
        marksurfaces: console.marksurfaces.clone(),
        edges: console.edges.clone(),
        surfedges: console.surfedges.clone(),
        models: console.models.clone(),
    };

    let split = if options.fix_liquids {
        fix_liquids(&mut pc, options)?
    } else {
        0
    };

    info!(
        "console -> PC: {} faces, {} texinfo, {} liquid faces split",
        pc.faces.len(),
        pc.texinfo.len(),
        split
    );
    Ok(pc)
}
