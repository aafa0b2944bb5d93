// Patch builders shared by the integration tests.
#![allow(dead_code)]

use oxipatch::codec::crc32;
use oxipatch::codec::varint::write_varint;

fn varint(buf: &mut Vec<u8>, n: u64) {
    write_varint(buf, n).unwrap();
}

/// Append the UPS/BPS footer: source CRC, target CRC, then the CRC of
/// everything before the patch CRC.
fn finish(mut p: Vec<u8>, source: &[u8], target: &[u8]) -> Vec<u8> {
    p.extend_from_slice(&crc32(source).to_le_bytes());
    p.extend_from_slice(&crc32(target).to_le_bytes());
    let patch_crc = crc32(&p);
    p.extend_from_slice(&patch_crc.to_le_bytes());
    p
}

// ---------------------------------------------------------------------------
// IPS
// ---------------------------------------------------------------------------

pub enum IpsRecord<'a> {
    Literal(u32, &'a [u8]),
    Rle(u32, u16, u8),
}

pub fn ips_patch(records: &[IpsRecord<'_>], footer: Option<u32>) -> Vec<u8> {
    let mut p = b"PATCH".to_vec();
    for record in records {
        match *record {
            IpsRecord::Literal(offset, data) => {
                p.extend_from_slice(&offset.to_be_bytes()[1..]);
                p.extend_from_slice(&(data.len() as u16).to_be_bytes());
                p.extend_from_slice(data);
            }
            IpsRecord::Rle(offset, count, value) => {
                p.extend_from_slice(&offset.to_be_bytes()[1..]);
                p.extend_from_slice(&[0, 0]);
                p.extend_from_slice(&count.to_be_bytes());
                p.push(value);
            }
        }
    }
    p.extend_from_slice(b"EOF");
    if let Some(size) = footer {
        p.extend_from_slice(&size.to_be_bytes()[1..]);
    }
    p
}

/// IPS patch turning `source` into `target`: one literal record per run of
/// differing bytes plus a size footer. Targets must stay below 4 MiB.
pub fn ips_diff(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut p = b"PATCH".to_vec();
    let mut i = 0;
    while i < target.len() {
        if source.get(i) == Some(&target[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < target.len() && source.get(i) != Some(&target[i]) && i - start < 0xFFFF {
            i += 1;
        }
        p.extend_from_slice(&(start as u32).to_be_bytes()[1..]);
        p.extend_from_slice(&((i - start) as u16).to_be_bytes());
        p.extend_from_slice(&target[start..i]);
    }
    p.extend_from_slice(b"EOF");
    p.extend_from_slice(&(target.len() as u32).to_be_bytes()[1..]);
    p
}

// ---------------------------------------------------------------------------
// UPS
// ---------------------------------------------------------------------------

/// UPS patch with a hand-written hunk body and a correct footer.
pub fn ups_patch(source: &[u8], target: &[u8], hunks: &[u8]) -> Vec<u8> {
    let mut p = b"UPS1".to_vec();
    varint(&mut p, source.len() as u64);
    varint(&mut p, target.len() as u64);
    p.extend_from_slice(hunks);
    finish(p, source, target)
}

/// UPS patch turning `source` into `target`.
pub fn ups_diff(source: &[u8], target: &[u8]) -> Vec<u8> {
    let xor = |i: usize| source.get(i).copied().unwrap_or(0) ^ target[i];
    let mut hunks = Vec::new();
    let mut i = 0;
    let mut cursor = 0;
    while i < target.len() {
        if xor(i) == 0 {
            i += 1;
            continue;
        }
        varint(&mut hunks, (i - cursor) as u64);
        while i < target.len() && xor(i) != 0 {
            hunks.push(xor(i));
            i += 1;
        }
        hunks.push(0);
        // The terminator consumes one more position.
        i += 1;
        cursor = i;
    }
    ups_patch(source, target, &hunks)
}

// ---------------------------------------------------------------------------
// BPS
// ---------------------------------------------------------------------------

pub const SOURCE_READ: u64 = 0;
pub const TARGET_READ: u64 = 1;
pub const SOURCE_COPY: u64 = 2;
pub const TARGET_COPY: u64 = 3;

pub fn bps_action(buf: &mut Vec<u8>, action: u64, len: usize) {
    varint(buf, ((len as u64 - 1) << 2) | action);
}

pub fn bps_delta(buf: &mut Vec<u8>, d: i64) {
    varint(buf, (d.unsigned_abs() << 1) | u64::from(d < 0));
}

pub fn bps_patch(source: &[u8], target: &[u8], metadata: &[u8], actions: &[u8]) -> Vec<u8> {
    let mut p = b"BPS1".to_vec();
    varint(&mut p, source.len() as u64);
    varint(&mut p, target.len() as u64);
    varint(&mut p, metadata.len() as u64);
    p.extend_from_slice(metadata);
    p.extend_from_slice(actions);
    finish(p, source, target)
}

/// BPS patch turning `source` into `target` with SourceRead runs where the
/// bytes agree and TargetRead runs elsewhere.
pub fn bps_diff(source: &[u8], target: &[u8]) -> Vec<u8> {
    let same = |i: usize| source.get(i) == Some(&target[i]);
    let mut actions = Vec::new();
    let mut i = 0;
    while i < target.len() {
        let start = i;
        if same(i) {
            while i < target.len() && same(i) {
                i += 1;
            }
            bps_action(&mut actions, SOURCE_READ, i - start);
        } else {
            while i < target.len() && !same(i) {
                i += 1;
            }
            bps_action(&mut actions, TARGET_READ, i - start);
            actions.extend_from_slice(&target[start..i]);
        }
    }
    bps_patch(source, target, &[], &actions)
}
