use crate::error::{narrow, BspError, BspResult, DanglingReason};
use crate::io::{Readable, Writable};
use crate::lump::LumpKind;
use crate::resolve::check_index;
use crate::types::{FaceIndex, Point3F};
use bytes::{Buf, BufMut};
use std::collections::HashMap;

pub const POLYGON_VERTEX_SIZE: usize = 24;

/// A rendering vertex: position, texture coordinates normalized by the
/// texture size, and lightmap coordinates quantized to a byte.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonVertex {
    pub position: Point3F,
    pub st: [f32; 2],
    pub lightmap: [u8; 2],
}

impl Readable for PolygonVertex {
    fn read(from: &mut dyn Buf) -> BspResult<Self> {
        let position = Point3F::read(from)?;
        let st = <[f32; 2]>::read(from)?;
        let lightmap = <[u8; 2]>::read(from)?;
        let _pad = u16::read(from)?;
        Ok(PolygonVertex {
            position,
            st,
            lightmap,
        })
    }
}

impl Writable for PolygonVertex {
    fn write(&self, to: &mut dyn BufMut) -> BspResult<()> {
        self.position.write(to)?;
        self.st.write(to)?;
        self.lightmap.write(to)?;
        0u16.write(to)?;
        Ok(())
    }
}

/// The console-only rendering mesh of one face.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub face: FaceIndex,
    pub vertices: Vec<PolygonVertex>,
    pub strips: Vec<Vec<u16>>,
}

impl Polygon {
    pub fn byte_size(&self) -> usize {
        8 + self.vertices.len() * POLYGON_VERTEX_SIZE
            + 4
            + self
                .strips
                .iter()
                .map(|strip| (2 + 2 * strip.len() + 3) / 4 * 4)
                .sum::<usize>()
    }

    /// Number of non-degenerate triangles across all strips.
    pub fn triangle_count(&self) -> usize {
        self.strips
            .iter()
            .map(|strip| {
                strip
                    .windows(3)
                    .filter(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
                    .count()
            })
            .sum()
    }
}

impl Readable for Polygon {
    fn read(from: &mut dyn Buf) -> BspResult<Self> {
        let face = FaceIndex::from_raw(u32::read(from)?);
        let vertex_count = u32::read(from)? as usize;
        if vertex_count > from.remaining() / POLYGON_VERTEX_SIZE {
            return Err(BspError::UnexpectedEof {
                needed: vertex_count * POLYGON_VERTEX_SIZE,
                remaining: from.remaining(),
            });
        }
        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            vertices.push(PolygonVertex::read(from)?);
        }

        let strip_count = u32::read(from)? as usize;
        let mut strips = Vec::new();
        for _ in 0..strip_count {
            let length = u16::read(from)? as usize;
            let mut strip = Vec::with_capacity(length);
            for _ in 0..length {
                strip.push(u16::read(from)?);
            }
            if length % 2 == 0 {
                let _pad = u16::read(from)?;
            }
            strips.push(strip);
        }

        Ok(Polygon {
            face,
            vertices,
            strips,
        })
    }
}

impl Writable for Polygon {
    fn write(&self, to: &mut dyn BufMut) -> BspResult<()> {
        self.face.raw().write(to)?;
        narrow::<u32>(self.vertices.len(), "polygon vertices", u32::MAX as usize)?.write(to)?;
        for vertex in &self.vertices {
            vertex.write(to)?;
        }
        (self.strips.len() as u32).write(to)?;
        for strip in &self.strips {
            narrow::<u16>(strip.len(), "strip indices", u16::MAX as usize)?.write(to)?;
            for index in strip {
                index.write(to)?;
            }
            if strip.len() % 2 == 0 {
                0u16.write(to)?;
            }
        }
        Ok(())
    }
}

/// Record start offsets of each polygon in a lump placed at `base`.
pub fn polygon_offsets(polygons: &[Polygon], base: u32) -> Vec<u32> {
    let mut cursor = base;
    polygons
        .iter()
        .map(|polygon| {
            let offset = cursor;
            cursor += polygon.byte_size() as u32;
            offset
        })
        .collect()
}

/// Reads `count` polygons and returns them along with a map from each
/// record's absolute offset to its index.
pub fn read_polygons(
    lump: &[u8],
    count: usize,
    base: u32,
    faces: usize,
) -> BspResult<(Vec<Polygon>, HashMap<u32, usize>)> {
    let mut from = lump;
    let mut polygons = Vec::new();
    let mut starts = HashMap::new();

    for i in 0..count {
        let offset = base + (lump.len() - from.remaining()) as u32;
        let polygon = Polygon::read(&mut from)?;

        check_index(LumpKind::Polygons, LumpKind::Faces, polygon.face.raw() as i64, faces)?;
        for strip in &polygon.strips {
            if let Some(index) = strip
                .iter()
                .find(|index| **index as usize >= polygon.vertices.len())
            {
                return Err(BspError::dangling(
                    LumpKind::Polygons,
                    LumpKind::Polygons,
                    *index as i64,
                    DanglingReason::PastEnd {
                        count: polygon.vertices.len(),
                    },
                ));
            }
        }

        starts.insert(offset, i);
        polygons.push(polygon);
    }

    Ok((polygons, starts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;
    use pretty_assertions::assert_eq;

    fn quad() -> Polygon {
        let vertex = |x, y| PolygonVertex {
            position: Vector3::new(x, y, 0.0),
            st: [x / 64.0, y / 64.0],
            lightmap: [0, 255],
        };
        Polygon {
            face: FaceIndex::new(2),
            vertices: vec![
                vertex(0.0, 0.0),
                vertex(32.0, 0.0),
                vertex(32.0, 32.0),
                vertex(0.0, 32.0),
            ],
            strips: vec![vec![0, 1, 3, 2], vec![0, 1, 2]],
        }
    }

    #[test]
    fn strips_are_padded_to_four_bytes() {
        let polygon = quad();
        let mut out = vec![];
        polygon.write(&mut out).unwrap();
        // 8 header + 4 * 24 vertices + 4 strip count + (2 + 8 + 2) + (2 + 6)
        assert_eq!(out.len(), 8 + 96 + 4 + 12 + 8);
        assert_eq!(out.len(), polygon.byte_size());
        assert_eq!(polygon.triangle_count(), 3);
    }

    #[test]
    fn reads_back_with_record_offsets() {
        let polygons = vec![quad(), quad()];
        let mut lump = vec![];
        for polygon in &polygons {
            polygon.write(&mut lump).unwrap();
        }
        let (read, starts) = read_polygons(&lump, 2, 4096, 3).unwrap();
        assert_eq!(read, polygons);
        let offsets = polygon_offsets(&polygons, 4096);
        assert_eq!(starts.get(&offsets[1]), Some(&1));
        assert_eq!(starts.get(&(offsets[1] + 4)), None);
    }

    #[test]
    fn strip_indices_must_hit_vertices() {
        let mut polygon = quad();
        polygon.strips[1][2] = 4;
        let mut lump = vec![];
        polygon.write(&mut lump).unwrap();
        assert!(matches!(
            read_polygons(&lump, 1, 0, 3),
            Err(BspError::DanglingReference { .. })
        ));
    }
}
