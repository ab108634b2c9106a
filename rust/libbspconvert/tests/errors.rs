mod common;

use bsp::console::ConsoleBsp;
use bsp::error::{BspError, DanglingReason};
use bsp::lump::{Header, LumpKind};
use bsp::pc::PcBsp;
use bspconvert::{Format, Transcoder};
use cgmath::Vector3;
use common::mixed_map;

fn put_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn pc_bytes() -> Vec<u8> {
    mixed_map().bytes()
}

fn console_bytes() -> Vec<u8> {
    Transcoder::default()
        .convert(&pc_bytes(), Format::Console)
        .unwrap()
}

fn lump_offset(data: &[u8], format: Format, kind: LumpKind) -> usize {
    Header::read(data, format).unwrap().entry(kind).offset as usize
}

/// Header position of a console lump's offset, length and count words.
fn console_slot(kind: LumpKind) -> usize {
    Format::Console
        .lumps()
        .iter()
        .position(|k| *k == kind)
        .unwrap()
}

#[test]
fn short_buffer_is_a_truncated_header() {
    let data = pc_bytes();
    assert!(matches!(
        PcBsp::from_bytes(&data[..100]),
        Err(BspError::TruncatedHeader { needed: 124, size: 100, .. })
    ));
}

#[test]
fn console_reader_rejects_pc_version() {
    let error = ConsoleBsp::from_bytes(&pc_bytes()).unwrap_err();
    assert!(matches!(
        error,
        BspError::FormatVersionMismatch {
            format: Format::Console,
            expected: 40,
            found: 30,
        }
    ));
}

#[test]
fn lump_past_the_buffer_is_rejected() {
    let mut data = pc_bytes();
    let size = data.len() as u32;
    // Planes length word.
    put_u32(&mut data, 4 + 8 + 4, size);
    assert!(matches!(
        PcBsp::from_bytes(&data),
        Err(BspError::LumpOutOfBounds {
            lump: LumpKind::Planes,
            ..
        })
    ));
}

#[test]
fn pc_lump_length_must_be_whole_records() {
    let mut data = pc_bytes();
    let length = Header::read(&data, Format::Pc).unwrap().entry(LumpKind::Planes).length;
    put_u32(&mut data, 4 + 8 + 4, length - 2);
    assert!(matches!(
        PcBsp::from_bytes(&data),
        Err(BspError::ElementSizeMismatch {
            lump: LumpKind::Planes,
            element_size: 20,
            ..
        })
    ));
}

#[test]
fn console_count_must_fit_its_length() {
    let mut data = console_bytes();
    let count_at = 4 + 16 * 4 + 16 * 4 + console_slot(LumpKind::Planes) * 4;
    put_u32(&mut data, count_at, 1000);
    assert!(matches!(
        ConsoleBsp::from_bytes(&data),
        Err(BspError::ElementSizeMismatch {
            lump: LumpKind::Planes,
            count: 1000,
            ..
        })
    ));
}

#[test]
fn pc_face_plane_out_of_range() {
    let mut data = pc_bytes();
    let faces = lump_offset(&data, Format::Pc, LumpKind::Faces);
    put_u16(&mut data, faces, 9);
    assert!(matches!(
        PcBsp::from_bytes(&data),
        Err(BspError::DanglingReference {
            from: LumpKind::Faces,
            to: LumpKind::Planes,
            value: 9,
            reason: DanglingReason::PastEnd { count: 2 },
        })
    ));
}

#[test]
fn unterminated_entities() {
    let mut data = pc_bytes();
    let entry = Header::read(&data, Format::Pc).unwrap().entry(LumpKind::Entities);
    let last = (entry.offset + entry.length - 1) as usize;
    data[last] = b'}';
    assert!(matches!(
        PcBsp::from_bytes(&data),
        Err(BspError::UnterminatedTextLump {
            lump: LumpKind::Entities
        })
    ));
}

#[test]
fn console_child_between_leaf_records() {
    let mut data = console_bytes();
    let nodes = lump_offset(&data, Format::Console, LumpKind::Nodes);
    let leafs = lump_offset(&data, Format::Console, LumpKind::Leafs) as u32;
    put_u32(&mut data, nodes + 40, leafs + 6);
    assert!(matches!(
        ConsoleBsp::from_bytes(&data),
        Err(BspError::DanglingReference {
            from: LumpKind::Nodes,
            reason: DanglingReason::Misaligned { .. },
            ..
        })
    ));
}

#[test]
fn console_child_outside_both_ranges() {
    let mut data = console_bytes();
    let nodes = lump_offset(&data, Format::Console, LumpKind::Nodes);
    let planes = lump_offset(&data, Format::Console, LumpKind::Planes) as u32;
    put_u32(&mut data, nodes + 40, planes);
    assert!(matches!(
        ConsoleBsp::from_bytes(&data),
        Err(BspError::DanglingReference {
            reason: DanglingReason::OutsideChildRanges,
            ..
        })
    ));
}

#[test]
fn flagging_a_face_without_polygon_is_a_topology_mismatch() {
    let mut data = console_bytes();
    let faces = lump_offset(&data, Format::Console, LumpKind::Faces);
    // Face 1 is the plain wall.
    put_u32(&mut data, faces + 76 + 4, 0x10);
    assert!(matches!(
        ConsoleBsp::from_bytes(&data),
        Err(BspError::TopologyMismatch {
            declared: 3,
            flagged: 4,
        })
    ));
}

#[test]
fn polygon_link_must_hit_a_record_start() {
    let mut data = console_bytes();
    let faces = lump_offset(&data, Format::Console, LumpKind::Faces);
    let polygons = lump_offset(&data, Format::Console, LumpKind::Polygons) as u32;
    put_u32(&mut data, faces + 72, polygons + 4);
    assert!(matches!(
        ConsoleBsp::from_bytes(&data),
        Err(BspError::DanglingReference {
            to: LumpKind::Polygons,
            ..
        })
    ));
}

#[test]
fn console_bounds_too_large_for_pc() {
    let mut console = Transcoder::default()
        .pc_to_console(&mixed_map().build())
        .unwrap();
    console.nodes[0].maxs = Vector3::new(40000.0, 0.0, 0.0);
    assert!(matches!(
        Transcoder::default().console_to_pc(&console),
        Err(BspError::CapacityExceeded { .. })
    ));
}

#[test]
fn failed_conversion_produces_nothing() {
    let mut data = pc_bytes();
    let faces = lump_offset(&data, Format::Pc, LumpKind::Faces);
    put_u16(&mut data, faces, 9);
    assert!(Transcoder::default().convert(&data, Format::Console).is_err());
}
