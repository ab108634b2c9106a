use crate::error::{BspError, BspResult};
use crate::io::{align_up, pad_to, Readable, Writable};
use std::fmt::{self, Display, Formatter};

pub const PC_VERSION: u32 = 30;
pub const CONSOLE_VERSION: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Pc,
    Console,
}

impl Format {
    pub fn version(self) -> u32 {
        match self {
            Format::Pc => PC_VERSION,
            Format::Console => CONSOLE_VERSION,
        }
    }

    /// Lump start alignment.
    pub fn alignment(self) -> usize {
        match self {
            Format::Pc => 4,
            Format::Console => 16,
        }
    }

    pub fn lumps(self) -> &'static [LumpKind] {
        match self {
            Format::Pc => &PC_LUMPS,
            Format::Console => &CONSOLE_LUMPS,
        }
    }

    pub fn header_size(self) -> usize {
        match self {
            Format::Pc => 4 + PC_LUMPS.len() * 8,
            Format::Console => 4 + CONSOLE_LUMPS.len() * 12,
        }
    }

    /// Guesses the format from the version word.
    pub fn detect(data: &[u8]) -> Option<Format> {
        let mut from = data;
        match u32::read(&mut from).ok()? {
            PC_VERSION => Some(Format::Pc),
            CONSOLE_VERSION => Some(Format::Console),
            _ => None,
        }
    }

    pub fn other(self) -> Format {
        match self {
            Format::Pc => Format::Console,
            Format::Console => Format::Pc,
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Format::Pc => write!(f, "PC"),
            Format::Console => write!(f, "console"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LumpKind {
    Entities,
    Planes,
    Textures,
    Vertexes,
    Visibility,
    Nodes,
    TexInfo,
    Faces,
    Lighting,
    Clipnodes,
    Leafs,
    Marksurfaces,
    Edges,
    Surfedges,
    Models,
    Hull0,
    Polygons,
}

impl Display for LumpKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            LumpKind::Entities => "entities",
            LumpKind::Planes => "planes",
            LumpKind::Textures => "textures",
            LumpKind::Vertexes => "vertexes",
            LumpKind::Visibility => "visibility",
            LumpKind::Nodes => "nodes",
            LumpKind::TexInfo => "texinfo",
            LumpKind::Faces => "faces",
            LumpKind::Lighting => "lighting",
            LumpKind::Clipnodes => "clipnodes",
            LumpKind::Leafs => "leafs",
            LumpKind::Marksurfaces => "marksurfaces",
            LumpKind::Edges => "edges",
            LumpKind::Surfedges => "surfedges",
            LumpKind::Models => "models",
            LumpKind::Hull0 => "hull 0",
            LumpKind::Polygons => "polygons",
        };
        write!(f, "{}", name)
    }
}

pub const PC_LUMPS: [LumpKind; 15] = [
    LumpKind::Entities,
    LumpKind::Planes,
    LumpKind::Textures,
    LumpKind::Vertexes,
    LumpKind::Visibility,
    LumpKind::Nodes,
    LumpKind::TexInfo,
    LumpKind::Faces,
    LumpKind::Lighting,
    LumpKind::Clipnodes,
    LumpKind::Leafs,
    LumpKind::Marksurfaces,
    LumpKind::Edges,
    LumpKind::Surfedges,
    LumpKind::Models,
];

pub const CONSOLE_LUMPS: [LumpKind; 16] = [
    LumpKind::Planes,
    LumpKind::Nodes,
    LumpKind::Leafs,
    LumpKind::Edges,
    LumpKind::Surfedges,
    LumpKind::Vertexes,
    LumpKind::Hull0,
    LumpKind::Clipnodes,
    LumpKind::Models,
    LumpKind::Faces,
    LumpKind::Marksurfaces,
    LumpKind::Visibility,
    LumpKind::Lighting,
    LumpKind::Textures,
    LumpKind::Entities,
    LumpKind::Polygons,
];

/// One lump directory entry. `count` is only stored by the console format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LumpEntry {
    pub offset: u32,
    pub length: u32,
    pub count: u32,
}

impl LumpEntry {
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }
}

/// A bounds-checked lump directory.
#[derive(Debug, Clone)]
pub struct Header {
    pub format: Format,
    pub entries: Vec<(LumpKind, LumpEntry)>,
}

impl Header {
    /// Reads the directory and checks every lump against the buffer before
    /// any lump content is looked at.
    pub fn read(data: &[u8], format: Format) -> BspResult<Header> {
        let needed = format.header_size();
        if data.len() < needed {
            return Err(BspError::TruncatedHeader {
                format,
                needed,
                size: data.len(),
            });
        }

        let mut from = data;
        let version = u32::read(&mut from)?;
        if version != format.version() {
            return Err(BspError::FormatVersionMismatch {
                format,
                expected: format.version(),
                found: version,
            });
        }

        let lumps = format.lumps();
        let mut entries = lumps
            .iter()
            .map(|kind| (*kind, LumpEntry::default()))
            .collect::<Vec<_>>();

        match format {
            Format::Pc => {
                for (_, entry) in entries.iter_mut() {
                    entry.offset = u32::read(&mut from)?;
                    entry.length = u32::read(&mut from)?;
                }
            }
            Format::Console => {
                for (_, entry) in entries.iter_mut() {
                    entry.offset = u32::read(&mut from)?;
                }
                for (_, entry) in entries.iter_mut() {
                    entry.length = u32::read(&mut from)?;
                }
                for (_, entry) in entries.iter_mut() {
                    entry.count = u32::read(&mut from)?;
                }
            }
        }

        for (kind, entry) in entries.iter() {
            if entry.end() > data.len() as u64 {
                return Err(BspError::LumpOutOfBounds {
                    lump: *kind,
                    offset: entry.offset as u64,
                    length: entry.length as u64,
                    size: data.len() as u64,
                });
            }
            debug!(
                "{} lump {}: offset {} length {} count {}",
                format, kind, entry.offset, entry.length, entry.count
            );
        }

        Ok(Header { format, entries })
    }

    pub fn entry(&self, kind: LumpKind) -> LumpEntry {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, entry)| *entry)
            .unwrap_or_default()
    }

    /// The bytes of an already bounds-checked lump.
    pub fn slice<'a>(&self, data: &'a [u8], kind: LumpKind) -> &'a [u8] {
        let entry = self.entry(kind);
        let start = (entry.offset as usize).min(data.len());
        let end = (entry.end() as usize).min(data.len());
        &data[start..end]
    }

    /// Number of `element_size` records in a lump. The PC format derives it
    /// from the length, the console format declares it and the declaration
    /// must fit inside the length.
    pub fn element_count(&self, kind: LumpKind, element_size: usize) -> BspResult<usize> {
        let entry = self.entry(kind);
        match self.format {
            Format::Pc => {
                if entry.length as usize % element_size != 0 {
                    return Err(BspError::ElementSizeMismatch {
                        lump: kind,
                        length: entry.length as u64,
                        element_size,
                        count: (entry.length as usize / element_size) as u64,
                    });
                }
                Ok(entry.length as usize / element_size)
            }
            Format::Console => {
                if entry.count as u64 * element_size as u64 > entry.length as u64 {
                    return Err(BspError::ElementSizeMismatch {
                        lump: kind,
                        length: entry.length as u64,
                        element_size,
                        count: entry.count as u64,
                    });
                }
                Ok(entry.count as usize)
            }
        }
    }
}

/// Reads a NUL-terminated text lump, returning the text without the terminator.
pub fn read_text_lump(lump: &[u8], kind: LumpKind) -> BspResult<Vec<u8>> {
    match lump.iter().position(|b| *b == 0) {
        Some(end) => Ok(lump[..end].to_vec()),
        None => Err(BspError::UnterminatedTextLump { lump: kind }),
    }
}

/// Computes the offsets `LumpWriter` will assign to lumps of the given lengths.
pub fn plan_layout(format: Format, lengths: &[usize]) -> Vec<u32> {
    let mut cursor = format.header_size();
    let mut offsets = Vec::with_capacity(lengths.len());
    for length in lengths {
        cursor = align_up(cursor, format.alignment());
        offsets.push(cursor as u32);
        cursor += length;
    }
    offsets
}

/// Appends lumps in directory order to a zeroed buffer and fills in the
/// header on `finish`.
pub struct LumpWriter {
    format: Format,
    out: Vec<u8>,
    entries: Vec<(LumpKind, LumpEntry)>,
}

impl LumpWriter {
    pub fn new(format: Format) -> LumpWriter {
        LumpWriter {
            format,
            out: vec![0; format.header_size()],
            entries: Vec::with_capacity(format.lumps().len()),
        }
    }

    /// Writes one lump and returns the offset it landed at.
    pub fn lump<F>(&mut self, kind: LumpKind, count: usize, write: F) -> BspResult<u32>
    where
        F: FnOnce(&mut Vec<u8>) -> BspResult<()>,
    {
        pad_to(&mut self.out, self.format.alignment());
        let offset = self.out.len();
        write(&mut self.out)?;
        let length = self.out.len() - offset;

        debug!(
            "wrote {} lump {}: offset {} length {} count {}",
            self.format, kind, offset, length, count
        );
        self.entries.push((
            kind,
            LumpEntry {
                offset: offset as u32,
                length: length as u32,
                count: count as u32,
            },
        ));
        Ok(offset as u32)
    }

    pub fn finish(mut self) -> BspResult<Vec<u8>> {
        let lumps = self.format.lumps();
        let entry = |kind: &LumpKind| {
            self.entries
                .iter()
                .find(|(k, _)| k == kind)
                .map(|(_, entry)| *entry)
                .unwrap_or_default()
        };

        let mut header: Vec<u8> = Vec::with_capacity(self.format.header_size());
        self.format.version().write(&mut header)?;
        match self.format {
            Format::Pc => {
                for kind in lumps {
                    let entry = entry(kind);
                    entry.offset.write(&mut header)?;
                    entry.length.write(&mut header)?;
                }
            }
            Format::Console => {
                for kind in lumps {
                    entry(kind).offset.write(&mut header)?;
                }
                for kind in lumps {
                    entry(kind).length.write(&mut header)?;
                }
                for kind in lumps {
                    entry(kind).count.write(&mut header)?;
                }
            }
        }

        self.out[..header.len()].copy_from_slice(&header);
        Ok(self.out)
    }
}
