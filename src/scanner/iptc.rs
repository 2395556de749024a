//! IPTC-IIM reader for JPEG files.
//!
//! The IIM block lives in the APP13 segment inside a Photoshop "8BIM"
//! resource with id 0x0404. Only application record 2 is decoded.

use std::path::Path;

const APP13: u8 = 0xED;
const START_OF_SCAN: u8 = 0xDA;
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const RESOURCE_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE: u16 = 0x0404;

const DATASET_KEYWORDS: u8 = 25;
const DATASET_CITY: u8 = 90;
const DATASET_STATE: u8 = 95;
const DATASET_COUNTRY: u8 = 101;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptcData {
    pub keywords: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Empty data for non-JPEG files and on any parse failure.
pub fn read_iptc(path: &Path) -> IptcData {
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    if !is_jpeg {
        return IptcData::default();
    }
    match std::fs::read(path) {
        Ok(bytes) => find_iim_block(&bytes).map(parse_iim).unwrap_or_default(),
        Err(_) => IptcData::default(),
    }
}

/// Walks the JPEG marker segments up to the image data looking for APP13.
fn find_iim_block(data: &[u8]) -> Option<&[u8]> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == START_OF_SCAN {
            return None;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let end = (pos + 2 + len).min(data.len());
        if marker == APP13 && pos + 4 <= end {
            if let Some(block) = find_resource(&data[pos + 4..end]) {
                return Some(block);
            }
        }
        pos = pos + 2 + len;
    }
    None
}

fn find_resource(segment: &[u8]) -> Option<&[u8]> {
    let mut data = segment.strip_prefix(PHOTOSHOP_HEADER)?;
    while data.len() >= 12 && data.starts_with(RESOURCE_MARKER) {
        let id = u16::from_be_bytes([data[4], data[5]]);
        // Pascal-string name, padded to an even length
        let name_len = data[6] as usize;
        let name_total = (1 + name_len + 1) & !1;
        let size_at = 6 + name_total;
        if size_at + 4 > data.len() {
            return None;
        }
        let size = u32::from_be_bytes([data[size_at], data[size_at + 1], data[size_at + 2], data[size_at + 3]])
            as usize;
        let body_at = size_at + 4;
        if body_at + size > data.len() {
            return None;
        }
        if id == IPTC_RESOURCE {
            return Some(&data[body_at..body_at + size]);
        }
        let next = body_at + size + (size & 1);
        data = data.get(next..)?;
    }
    None
}

fn parse_iim(block: &[u8]) -> IptcData {
    let mut out = IptcData::default();
    let mut pos = 0;
    while pos + 5 <= block.len() && block[pos] == 0x1C {
        let record = block[pos + 1];
        let dataset = block[pos + 2];
        let len = u16::from_be_bytes([block[pos + 3], block[pos + 4]]) as usize;
        let start = pos + 5;
        if start + len > block.len() {
            break;
        }
        if record == 2 {
            let value = String::from_utf8_lossy(&block[start..start + len]).trim().to_string();
            if !value.is_empty() {
                match dataset {
                    DATASET_KEYWORDS => out.keywords.push(value),
                    DATASET_CITY => out.city = Some(value),
                    DATASET_STATE => out.state = Some(value),
                    DATASET_COUNTRY => out.country = Some(value),
                    _ => {}
                }
            }
        }
        pos = start + len;
    }
    out
}
