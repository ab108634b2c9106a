use crate::error::{BspError, BspResult, DanglingReason};
use crate::io::{read_records, Readable, Record, Writable};
use crate::lump::LumpKind;
use crate::resolve::LumpRange;
use crate::types::{TextureIndex, NO_REFERENCE};
use bsp_derive::{Readable, Writable};
use bytes::{Buf, BufMut};
use std::collections::BTreeMap;

pub const TEXTURE_NAME_LENGTH: usize = 16;
const MIPTEX_HEADER_SIZE: usize = 40;

/// A texture as an opaque handle: name, size, animation links and the
/// pixel payload as stored after the texture header.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: [u8; TEXTURE_NAME_LENGTH],
    pub width: u32,
    pub height: u32,
    pub mip_offsets: [u32; 4],
    pub pixels: Vec<u8>,
    pub anim_next: Option<TextureIndex>,
    pub anim_alternate: Option<TextureIndex>,
}

#[derive(Debug, Readable, Writable)]
struct MiptexHeader {
    name: [u8; 16],
    width: u32,
    height: u32,
    mip_offsets: [u32; 4],
}

#[derive(Debug, Readable, Writable)]
struct ConsoleTextureRecord {
    name: [u8; 16],
    width: u32,
    height: u32,
    anim_next: u32,
    anim_alternate: u32,
    pixel_offset: u32,
    pixel_length: u32,
}

impl Record for ConsoleTextureRecord {
    const SIZE: usize = 40;
}

pub const CONSOLE_TEXTURE_SIZE: usize = ConsoleTextureRecord::SIZE;

/// Mip offsets of a texture whose four mip levels follow its header.
pub fn standard_mip_offsets(width: u32, height: u32) -> BspResult<[u32; 4]> {
    let area = width as u64 * height as u64;
    let base = MIPTEX_HEADER_SIZE as u64;
    let last = base + area + area / 4 + area / 16;
    if last > u32::MAX as u64 {
        return Err(BspError::CapacityExceeded {
            what: "texture mip offsets",
            needed: usize::try_from(last).unwrap_or(usize::MAX),
            limit: u32::MAX as usize,
        });
    }
    Ok([
        base as u32,
        (base + area) as u32,
        (base + area + area / 4) as u32,
        last as u32,
    ])
}

impl Texture {
    pub fn new(name: &str, width: u32, height: u32, pixels: Vec<u8>) -> BspResult<Texture> {
        let mut stored = [0u8; TEXTURE_NAME_LENGTH];
        for (to, from) in stored.iter_mut().zip(name.bytes().take(TEXTURE_NAME_LENGTH - 1)) {
            *to = from;
        }
        Ok(Texture {
            name: stored,
            width,
            height,
            mip_offsets: standard_mip_offsets(width, height)?,
            pixels,
            anim_next: None,
            anim_alternate: None,
        })
    }

    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(TEXTURE_NAME_LENGTH);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn is_liquid(&self) -> bool {
        self.name[0] == b'!' || self.name[0] == b'*'
    }

    pub fn is_sky(&self) -> bool {
        self.name().to_ascii_lowercase().starts_with("sky")
    }

    pub fn is_transparent(&self) -> bool {
        self.name[0] == b'{'
    }

    pub fn is_scrolling(&self) -> bool {
        self.name().to_ascii_lowercase().starts_with("scroll")
    }

    /// `+0name`..`+9name` are animation frames, `+aname`..`+jname` the
    /// alternate animation.
    fn animation_frame(&self) -> Option<(bool, u8, String)> {
        if self.name[0] != b'+' {
            return None;
        }
        let frame = self.name[1].to_ascii_lowercase();
        let (alternate, number) = match frame {
            b'0'..=b'9' => (false, frame - b'0'),
            b'a'..=b'j' => (true, frame - b'a'),
            _ => return None,
        };
        let tail = &self.name[2..];
        let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
        let base = String::from_utf8_lossy(&tail[..end]).to_ascii_lowercase();
        Some((alternate, number, base))
    }

    fn pc_size(&self) -> usize {
        MIPTEX_HEADER_SIZE + self.pixels.len()
    }
}

/// Links animation frames into cycles by name, replacing any existing links.
pub fn link_animations(textures: &mut [Option<Texture>]) {
    let mut sequences: BTreeMap<String, [BTreeMap<u8, TextureIndex>; 2]> = BTreeMap::new();
    for (i, texture) in textures.iter().enumerate() {
        if let Some((alternate, frame, base)) = texture.as_ref().and_then(|t| t.animation_frame()) {
            let frames = sequences.entry(base).or_default();
            frames[alternate as usize].insert(frame, TextureIndex::new(i));
        }
    }

    for texture in textures.iter_mut().flatten() {
        texture.anim_next = None;
        texture.anim_alternate = None;
    }

    for (base, [primary, alternate]) in sequences {
        for (frames, other) in [(&primary, &alternate), (&alternate, &primary)] {
            let cycle = frames.values().copied().collect::<Vec<_>>();
            if let Some(last) = frames.keys().last() {
                if *last as usize + 1 != frames.len() {
                    warn!("animation {} is missing frames", base);
                }
            }
            for (i, index) in cycle.iter().enumerate() {
                if let Some(texture) = textures[index.index()].as_mut() {
                    texture.anim_next = Some(cycle[(i + 1) % cycle.len()]);
                    texture.anim_alternate = other.values().next().copied();
                }
            }
        }
    }
}

/// Reads a PC texture lump: a count, per-texture offsets (-1 for a missing
/// texture) and the miptex blocks. Each block runs to the next block or the
/// end of the lump.
pub fn read_pc_textures(lump: &[u8]) -> BspResult<Vec<Option<Texture>>> {
    if lump.is_empty() {
        return Ok(vec![]);
    }
    let mut from = lump;
    let count = u32::read(&mut from)? as usize;
    if count > from.remaining() / 4 {
        return Err(BspError::ElementSizeMismatch {
            lump: LumpKind::Textures,
            length: lump.len() as u64,
            element_size: 4,
            count: count as u64,
        });
    }
    let offsets = read_records::<i32>(from, count)?;

    let mut starts = offsets
        .iter()
        .filter(|offset| **offset >= 0)
        .map(|offset| *offset as usize)
        .collect::<Vec<_>>();
    starts.sort_unstable();

    let mut textures = Vec::with_capacity(count);
    for offset in offsets {
        if offset < 0 {
            textures.push(None);
            continue;
        }
        let start = offset as usize;
        if start + MIPTEX_HEADER_SIZE > lump.len() {
            return Err(BspError::dangling(
                LumpKind::Textures,
                LumpKind::Textures,
                offset as i64,
                DanglingReason::PastEnd { count: lump.len() },
            ));
        }
        let end = starts
            .iter()
            .copied()
            .find(|next| *next > start)
            .unwrap_or(lump.len());

        let mut block = &lump[start..end];
        let header = MiptexHeader::read(&mut block)?;
        textures.push(Some(Texture {
            name: header.name,
            width: header.width,
            height: header.height,
            mip_offsets: header.mip_offsets,
            pixels: block.to_vec(),
            anim_next: None,
            anim_alternate: None,
        }));
    }

    Ok(textures)
}

pub fn write_pc_textures(textures: &[Option<Texture>], to: &mut Vec<u8>) -> BspResult<()> {
    if textures.is_empty() {
        return Ok(());
    }
    (textures.len() as u32).write(to)?;
    let mut cursor = 4 + 4 * textures.len();
    for texture in textures {
        match texture {
            Some(texture) => {
                (cursor as i32).write(to)?;
                cursor += texture.pc_size();
            }
            None => (-1i32).write(to)?,
        }
    }
    for texture in textures.iter().flatten() {
        MiptexHeader {
            name: texture.name,
            width: texture.width,
            height: texture.height,
            mip_offsets: texture.mip_offsets,
        }
        .write(to)?;
        to.extend_from_slice(&texture.pixels);
    }
    Ok(())
}

/// Reads a console texture lump: `records.count` fixed records followed by
/// pixel data addressed relative to the lump start.
pub fn read_console_textures(lump: &[u8], records: &LumpRange) -> BspResult<Vec<Option<Texture>>> {
    let raw = read_records::<ConsoleTextureRecord>(lump, records.count)?;
    let mut textures = Vec::with_capacity(raw.len());
    for record in raw {
        if record.name == [0; TEXTURE_NAME_LENGTH] && record.width == 0 && record.height == 0 {
            textures.push(None);
            continue;
        }
        let start = record.pixel_offset as u64;
        let end = start + record.pixel_length as u64;
        if end > lump.len() as u64 {
            return Err(BspError::dangling(
                LumpKind::Textures,
                LumpKind::Textures,
                start as i64,
                DanglingReason::PastEnd { count: lump.len() },
            ));
        }
        let anim_next = records.resolve_optional(LumpKind::Textures, record.anim_next)?;
        let anim_alternate = records.resolve_optional(LumpKind::Textures, record.anim_alternate)?;
        textures.push(Some(Texture {
            name: record.name,
            width: record.width,
            height: record.height,
            mip_offsets: standard_mip_offsets(record.width, record.height)?,
            pixels: lump[start as usize..end as usize].to_vec(),
            anim_next: anim_next.map(TextureIndex::new),
            anim_alternate: anim_alternate.map(TextureIndex::new),
        }));
    }
    Ok(textures)
}

pub fn console_textures_size(textures: &[Option<Texture>]) -> usize {
    textures.len() * CONSOLE_TEXTURE_SIZE
        + textures
            .iter()
            .flatten()
            .map(|texture| texture.pixels.len())
            .sum::<usize>()
}

/// Writes console texture records; `records` is where the lump will land.
pub fn write_console_textures(
    textures: &[Option<Texture>],
    records: &LumpRange,
    to: &mut Vec<u8>,
) -> BspResult<()> {
    let mut cursor = textures.len() * CONSOLE_TEXTURE_SIZE;
    for texture in textures {
        let record = match texture {
            Some(texture) => {
                let record = ConsoleTextureRecord {
                    name: texture.name,
                    width: texture.width,
                    height: texture.height,
                    anim_next: records.offset_of_optional(texture.anim_next.map(|i| i.index())),
                    anim_alternate: records
                        .offset_of_optional(texture.anim_alternate.map(|i| i.index())),
                    pixel_offset: cursor as u32,
                    pixel_length: texture.pixels.len() as u32,
                };
                cursor += texture.pixels.len();
                record
            }
            None => ConsoleTextureRecord {
                name: [0; TEXTURE_NAME_LENGTH],
                width: 0,
                height: 0,
                anim_next: NO_REFERENCE,
                anim_alternate: NO_REFERENCE,
                pixel_offset: 0,
                pixel_length: 0,
            },
        };
        record.write(to)?;
    }
    for texture in textures.iter().flatten() {
        to.extend_from_slice(&texture.pixels);
    }
    Ok(())
}
