//! `cmap`: Unicode codepoint to glyph ID mapping.
//!
//! Subtable selection prefers full-repertoire encodings over BMP-only ones,
//! and Unicode/Windows-Unicode platforms over everything else.

use crate::reader::Reader;

/// Looks up `codepoint` through the best subtable the font carries.
pub fn lookup(cmap_data: &[u8], codepoint: u32) -> Option<u16> {
    let offset = best_subtable_offset(cmap_data)?;
    let mut r = Reader::new(cmap_data);
    r.skip(offset).ok()?;
    let format = r.read_u16().ok()?;
    let sub = &cmap_data[offset..];
    match format {
        0 => lookup_format0(sub, codepoint),
        4 => lookup_format4(sub, codepoint),
        6 => lookup_format6(sub, codepoint),
        10 => lookup_format10(sub, codepoint),
        12 => lookup_format12(sub, codepoint),
        13 => lookup_format13(sub, codepoint),
        _ => None,
    }
}

/// Format-14 variation-selector lookup: `(base, selector) -> glyph`.
pub fn lookup_variation(cmap_data: &[u8], base: u32, selector: u32) -> Option<u16> {
    let offset = subtable_offset_for(cmap_data, |p, e| p == 0 && e == 5)?;
    let mut r = Reader::new(cmap_data);
    r.skip(offset).ok()?;
    let format = r.read_u16().ok()?;
    if format != 14 {
        return None;
    }
    lookup_format14(&cmap_data[offset..], base, selector)
}

fn subtable_offset_for(
    cmap_data: &[u8],
    pred: impl Fn(u16, u16) -> bool,
) -> Option<usize> {
    let mut r = Reader::new(cmap_data);
    let _version = r.read_u16().ok()?;
    let num_tables = r.read_u16().ok()?;
    for _ in 0..num_tables {
        let platform_id = r.read_u16().ok()?;
        let encoding_id = r.read_u16().ok()?;
        let offset = r.read_u32().ok()?;
        if pred(platform_id, encoding_id) {
            return Some(offset as usize);
        }
    }
    None
}

fn best_subtable_offset(cmap_data: &[u8]) -> Option<usize> {
    let mut r = Reader::new(cmap_data);
    let _version = r.read_u16().ok()?;
    let num_tables = r.read_u16().ok()?;

    let mut best_offset = None;
    let mut best_priority = 0u8;

    for _ in 0..num_tables {
        let platform_id = r.read_u16().ok()?;
        let encoding_id = r.read_u16().ok()?;
        let offset = r.read_u32().ok()?;

        let priority = match (platform_id, encoding_id) {
            (3, 10) => 5, // Windows full Unicode
            (0, 6) | (0, 4) => 4, // Unicode full repertoire
            (3, 1) => 3, // Windows BMP Unicode
            (0, 3) => 2, // Unicode BMP
            (0, _) => 1,
            _ => 0,
        };

        if priority > best_priority {
            best_priority = priority;
            best_offset = Some(offset as usize);
        }
    }

    best_offset
}

fn lookup_format0(data: &[u8], codepoint: u32) -> Option<u16> {
    if codepoint > 255 {
        return None;
    }
    lookup_format0_impl(data, codepoint as u8)
}

fn lookup_format0_impl(data: &[u8], codepoint: u8) -> Option<u16> {
    let mut r = Reader::new(data);
    r.skip(6).ok()?;
    r.skip(codepoint as usize).ok()?;
    let gid = r.read_u8().ok()? as u16;
    (gid != 0).then_some(gid)
}

fn lookup_format4(data: &[u8], codepoint: u32) -> Option<u16> {
    if codepoint > 0xFFFF {
        return None;
    }
    let code = codepoint as u16;

    let mut header = Reader::new(data);
    header.skip(6).ok()?;
    let seg_count_x2 = header.read_u16().ok()?;
    let seg_count = seg_count_x2 / 2;
    header.skip(6).ok()?;

    let end_codes_offset = header.pos();
    let start_codes_offset = end_codes_offset + (seg_count as usize) * 2 + 2;
    let deltas_offset = start_codes_offset + (seg_count as usize) * 2;
    let ranges_offset = deltas_offset + (seg_count as usize) * 2;

    let mut lo = 0u16;
    let mut hi = seg_count;
    while lo < hi {
        let mid = (lo + hi) / 2;
        let mut r = Reader::new(data);
        r.skip(end_codes_offset + mid as usize * 2).ok()?;
        let end_code = r.read_u16().ok()?;
        if end_code < code {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo >= seg_count {
        return None;
    }
    let idx = lo as usize;

    let mut r = Reader::new(data);
    r.skip(start_codes_offset + idx * 2).ok()?;
    let start_code = r.read_u16().ok()?;
    if code < start_code {
        return None;
    }

    let mut r = Reader::new(data);
    r.skip(deltas_offset + idx * 2).ok()?;
    let id_delta = r.read_i16().ok()?;

    let mut r = Reader::new(data);
    r.skip(ranges_offset + idx * 2).ok()?;
    let id_range_offset = r.read_u16().ok()?;

    let glyph_id = if id_range_offset == 0 {
        (code as i32 + id_delta as i32) as u16
    } else {
        let glyph_addr = ranges_offset + idx * 2 + id_range_offset as usize + ((code - start_code) as usize) * 2;
        let mut r = Reader::new(data);
        r.skip(glyph_addr).ok()?;
        let raw = r.read_u16().ok()?;
        if raw == 0 {
            0
        } else {
            (raw as i32 + id_delta as i32) as u16
        }
    };

    (glyph_id != 0).then_some(glyph_id)
}

fn lookup_format6(data: &[u8], codepoint: u32) -> Option<u16> {
    let mut r = Reader::new(data);
    r.skip(6).ok()?;
    let first_code = r.read_u16().ok()? as u32;
    let entry_count = r.read_u16().ok()? as u32;
    if codepoint < first_code || codepoint >= first_code + entry_count {
        return None;
    }
    r.skip(((codepoint - first_code) as usize) * 2).ok()?;
    let gid = r.read_u16().ok()?;
    (gid != 0).then_some(gid)
}

/// Format 10: trimmed array over a contiguous codepoint range.
fn lookup_format10(data: &[u8], codepoint: u32) -> Option<u16> {
    let mut r = Reader::new(data);
    r.skip(12).ok()?; // format(2)+reserved(2)+length(4)+language(4)
    let start_char_code = r.read_u32().ok()?;
    let num_chars = r.read_u32().ok()?;
    if codepoint < start_char_code || codepoint >= start_char_code + num_chars {
        return None;
    }
    r.skip(((codepoint - start_char_code) as usize) * 2).ok()?;
    let gid = r.read_u16().ok()?;
    (gid != 0).then_some(gid)
}

fn lookup_format13(data: &[u8], codepoint: u32) -> Option<u16> {
    let mut header = Reader::new(data);
    header.skip(12).ok()?;
    let num_groups = header.read_u32().ok()?;
    let groups_start = header.pos();

    let mut lo = 0u32;
    let mut hi = num_groups;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mut r = Reader::new(data);
        r.skip(groups_start + mid as usize * 12).ok()?;
        let start_char = r.read_u32().ok()?;
        let end_char = r.read_u32().ok()?;
        if codepoint < start_char {
            hi = mid;
        } else if codepoint > end_char {
            lo = mid + 1;
        } else {
            let glyph_id = r.read_u32().ok()?;
            return (glyph_id != 0).then_some(glyph_id as u16);
        }
    }
    None
}

fn lookup_format12(data: &[u8], codepoint: u32) -> Option<u16> {
    let mut header = Reader::new(data);
    header.skip(12).ok()?;
    let num_groups = header.read_u32().ok()?;
    let groups_start = header.pos();

    let mut lo = 0u32;
    let mut hi = num_groups;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mut r = Reader::new(data);
        r.skip(groups_start + mid as usize * 12).ok()?;
        let start_char = r.read_u32().ok()?;
        let end_char = r.read_u32().ok()?;
        if codepoint < start_char {
            hi = mid;
        } else if codepoint > end_char {
            lo = mid + 1;
        } else {
            let start_glyph = r.read_u32().ok()?;
            return Some((start_glyph + (codepoint - start_char)) as u16);
        }
    }
    None
}

fn lookup_format14(data: &[u8], base: u32, selector: u32) -> Option<u16> {
    let mut header = Reader::new(data);
    header.skip(6).ok()?;
    let num_records = header.read_u32().ok()?;
    let records_start = header.pos();

    for i in 0..num_records {
        let mut r = Reader::new(data);
        r.skip(records_start + i as usize * 11).ok()?;
        let var_selector = r.read_u24().ok()?;
        if var_selector != selector {
            continue;
        }
        let default_uvs_offset = r.read_u32().ok()?;
        let non_default_uvs_offset = r.read_u32().ok()?;

        if non_default_uvs_offset != 0 {
            if let Some(gid) =
                lookup_non_default_uvs(data, non_default_uvs_offset as usize, base)
            {
                return Some(gid);
            }
        }
        if default_uvs_offset != 0 {
            // Default-UVS table lists ranges mapped via the normal cmap —
            // presence means "use the default glyph", which callers resolve
            // by falling back to the base codepoint lookup themselves.
            return None;
        }
        return None;
    }
    None
}

fn lookup_non_default_uvs(data: &[u8], offset: usize, base: u32) -> Option<u16> {
    let mut header = Reader::new(data);
    header.skip(offset).ok()?;
    let num_mappings = header.read_u32().ok()?;
    let mappings_start = header.pos();

    let mut lo = 0u32;
    let mut hi = num_mappings;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mut r = Reader::new(data);
        r.skip(mappings_start + mid as usize * 5).ok()?;
        let unicode_value = r.read_u24().ok()?;
        if base < unicode_value {
            hi = mid;
        } else if base > unicode_value {
            lo = mid + 1;
        } else {
            return r.read_u16().ok().filter(|&g| g != 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format0_maps_byte_codepoints() {
        let mut data = vec![0u8; 6];
        data.extend(std::iter::repeat(0u8).take(256));
        data[6 + 0x41] = 7;
        assert_eq!(lookup_format0_impl(&data, 0x41), Some(7));
        assert_eq!(lookup_format0_impl(&data, 0x42), None);
    }
}
