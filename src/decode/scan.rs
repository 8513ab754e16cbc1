//! Payload-wide token scanners
//!
//! These run over an arbitrary byte range without any knowledge of the
//! section layout. Their output enriches a decoded record but is never
//! used to drive entry parsing.

use serde::Serialize;

use crate::codec::types::{f32_at, u16_at, Vec3};

const TRIPLE_ZERO_EPSILON: f32 = 1e-6;
const TRIPLE_MAGNITUDE_LIMIT: f32 = 1e7;
const NEAR_ONE_EPSILON: f32 = 1e-4;
const NEAR_ZERO_EPSILON: f32 = 1e-5;
const MIN_NEAR_ONE: usize = 3;
const MIN_NEAR_ZERO: usize = 6;
const MATRIX_LEN: usize = 64;

const MAX_LP_STRING_LEN: usize = 0x7FFF;
const MIN_PRINTABLE_RATIO: f32 = 0.60;

const GUID_LEN: usize = 36;
const GUID_DASHES: [usize; 4] = [8, 13, 18, 23];
const SKIN_SUFFIX: &[u8] = b".sk";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionCandidate {
    pub offset: usize,
    pub position: Vec3,
}

/// A 16-float window that looks like an affine matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformCandidate {
    pub offset: usize,
    pub near_one: usize,
    pub near_zero: usize,
    /// Floats 3, 7, 11.
    pub row_major_translation: Vec3,
    /// Floats 12, 13, 14.
    pub col_major_translation: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LpString {
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidRef {
    pub offset: usize,
    pub guid: String,
    /// The GUID is immediately followed by `.sk`.
    pub skin_ref: bool,
}

/// 4-byte aligned windows of `len` bytes starting in `start..end`.
fn aligned_windows(start: usize, end: usize, len: usize) -> impl Iterator<Item = usize> {
    let last = end.checked_sub(len);
    (start..).step_by(4).take_while(move |&i| last.is_some_and(|last| i <= last))
}

/// Finite, non-zero, bounded float triples in `payload[start..end]`.
pub fn position_candidates(payload: &[u8], start: usize, end: usize, limit: usize) -> Vec<PositionCandidate> {
    let end = end.min(payload.len());
    aligned_windows(start, end, 12)
        .filter_map(|i| {
            let v = Vec3::from_slice(&payload[i..i + 12])?;
            let plausible = v.is_finite()
                && v.components().iter().any(|c| c.abs() >= TRIPLE_ZERO_EPSILON)
                && v.components().iter().all(|c| c.abs() < TRIPLE_MAGNITUDE_LIMIT);
            plausible.then_some(PositionCandidate { offset: i, position: v })
        })
        .take(limit)
        .collect()
}

/// 16-float windows with enough values near 1.0 and near 0.0 to be a
/// transform matrix. Both translation layouts are reported.
pub fn transform_candidates(payload: &[u8], start: usize, end: usize, limit: usize) -> Vec<TransformCandidate> {
    let end = end.min(payload.len());
    aligned_windows(start, end, MATRIX_LEN)
        .filter_map(|i| {
            let mut m = [0f32; 16];
            for (k, v) in m.iter_mut().enumerate() {
                *v = f32_at(payload, i + k * 4)?;
            }
            let near_one = m.iter().filter(|f| (*f - 1.0).abs() < NEAR_ONE_EPSILON).count();
            let near_zero = m.iter().filter(|f| f.abs() < NEAR_ZERO_EPSILON).count();
            if near_one < MIN_NEAR_ONE || near_zero < MIN_NEAR_ZERO {
                return None;
            }
            Some(TransformCandidate {
                offset: i,
                near_one,
                near_zero,
                row_major_translation: Vec3::new(m[3], m[7], m[11]),
                col_major_translation: Vec3::new(m[12], m[13], m[14]),
            })
        })
        .take(limit)
        .collect()
}

/// Extract u16 length-prefixed strings that are mostly printable.
///
/// Accepted strings are skipped over as a whole; otherwise the scan moves
/// one byte at a time.
pub fn extract_lp_strings(payload: &[u8], limit: usize) -> Vec<LpString> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while out.len() < limit {
        let Some(len) = u16_at(payload, i).map(usize::from) else {
            break;
        };
        let start = i + 2;
        if (1..=MAX_LP_STRING_LEN).contains(&len) && start + len <= payload.len() {
            let raw = &payload[start..start + len];
            let printable = raw.iter().filter(|b| (0x20..0x7f).contains(*b)).count();
            if len <= 2 || printable as f32 / len as f32 >= MIN_PRINTABLE_RATIO {
                out.push(LpString {
                    offset: i,
                    text: String::from_utf8_lossy(raw).into_owned(),
                });
                i = start + len;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Find textual GUIDs (`8-4-4-4-12` hex digits) and skin file references.
pub fn find_guid_refs(payload: &[u8], limit: usize) -> Vec<GuidRef> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + GUID_LEN <= payload.len() && out.len() < limit {
        let window = &payload[i..i + GUID_LEN];
        if is_guid(window) {
            let skin_ref = payload[i + GUID_LEN..].starts_with(SKIN_SUFFIX);
            out.push(GuidRef {
                offset: i,
                guid: String::from_utf8_lossy(window).into_owned(),
                skin_ref,
            });
            i += GUID_LEN;
        } else {
            i += 1;
        }
    }
    out
}

fn is_guid(window: &[u8]) -> bool {
    window.iter().enumerate().all(|(k, b)| {
        if GUID_DASHES.contains(&k) {
            *b == b'-'
        } else {
            b.is_ascii_hexdigit()
        }
    })
}
