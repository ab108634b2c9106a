use bsp::error::{BspError, BspResult};
use bsp::texture::Texture;
use bsp::types::{Point3F, Projection, SurfaceFlags};

/// Texels per lightmap sample.
pub const LIGHTMAP_GRID: f32 = 16.0;

/// Texture-space bounds of a face snapped outward to the lightmap grid, as
/// `(texture_mins, extents)`.
pub fn texture_extents(
    points: &[Point3F],
    projection: &Projection,
) -> BspResult<([i16; 2], [i16; 2])> {
    let mut mins = [f32::INFINITY; 2];
    let mut maxs = [f32::NEG_INFINITY; 2];
    for point in points {
        let st = [projection.s_of(*point), projection.t_of(*point)];
        for axis in 0..2 {
            mins[axis] = mins[axis].min(st[axis]);
            maxs[axis] = maxs[axis].max(st[axis]);
        }
    }

    let mut texture_mins = [0i16; 2];
    let mut extents = [0i16; 2];
    if points.is_empty() {
        return Ok((texture_mins, extents));
    }
    for axis in 0..2 {
        let low = (mins[axis] / LIGHTMAP_GRID).floor();
        let high = (maxs[axis] / LIGHTMAP_GRID).ceil();
        texture_mins[axis] = to_i16(low * LIGHTMAP_GRID, "texture mins")?;
        extents[axis] = to_i16((high - low) * LIGHTMAP_GRID, "texture extents")?;
    }
    Ok((texture_mins, extents))
}

/// Converts an already rounded float to a 16-bit field.
pub fn to_i16(value: f32, what: &'static str) -> BspResult<i16> {
    if value.is_nan() || value < i16::MIN as f32 || value > i16::MAX as f32 {
        return Err(BspError::CapacityExceeded {
            what,
            needed: value.abs() as usize,
            limit: i16::MAX as usize,
        });
    }
    Ok(value as i16)
}

/// Console render flags for a face.
pub fn surface_flags(side: u16, texture: Option<&Texture>) -> SurfaceFlags {
    let mut flags = SurfaceFlags::empty();
    if side != 0 {
        flags |= SurfaceFlags::PLANE_BACK;
    }
    if let Some(texture) = texture {
        if texture.is_sky() {
            flags |= SurfaceFlags::SKY | SurfaceFlags::TILED;
        }
        if texture.is_liquid() {
            flags |= SurfaceFlags::TURB | SurfaceFlags::TILED;
        }
        if texture.is_transparent() {
            flags |= SurfaceFlags::TRANSPARENT;
        }
        if texture.is_scrolling() {
            flags |= SurfaceFlags::SCROLL;
        }
    }
    flags
}

/// Lightmap coordinate of a texture-space value, quantized across the
/// face's lightmap samples.
pub fn lightmap_coord(value: f32, texture_min: i16, extent: i16) -> u8 {
    let samples = extent as f32 / LIGHTMAP_GRID + 1.0;
    let sample = (value - texture_min as f32) / LIGHTMAP_GRID + 0.5;
    (sample * 255.0 / samples).round().clamp(0.0, 255.0) as u8
}
