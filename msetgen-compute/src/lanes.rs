//! Lane-mask helpers over `wide` vectors.
//!
//! Masks are `i32x8` with every bit of a lane set (true) or clear (false),
//! the form produced by `cmp_eq` / `cmp_gt` and consumed by `blend`.

use msetgen_core::LANES;
use wide::{i32x8, u32x8, u64x4};

/// `u32x8::blend` needs the mask in the limb type.
#[inline]
pub fn limb_mask(mask: i32x8) -> u32x8 {
    bytemuck::cast(mask)
}

pub fn mask_from_bools(flags: &[bool]) -> i32x8 {
    let mut lanes = [0i32; LANES];
    for (lane, &flag) in lanes.iter_mut().zip(flags) {
        *lane = if flag { -1 } else { 0 };
    }
    i32x8::new(lanes)
}

pub fn mask_to_bools(mask: i32x8) -> [bool; LANES] {
    mask.to_array().map(|lane| lane != 0)
}

/// Widen lanes 0–3 and 4–7 into two 64-bit groups.
#[inline]
pub fn split(v: u32x8) -> (u64x4, u64x4) {
    let a = v.to_array();
    (
        u64x4::new([a[0] as u64, a[1] as u64, a[2] as u64, a[3] as u64]),
        u64x4::new([a[4] as u64, a[5] as u64, a[6] as u64, a[7] as u64]),
    )
}

/// Narrow two 64-bit groups back into eight 32-bit lanes, keeping the low halves.
#[inline]
pub fn join(low: u64x4, high: u64x4) -> u32x8 {
    let l = low.to_array();
    let h = high.to_array();
    u32x8::new([
        l[0] as u32, l[1] as u32, l[2] as u32, l[3] as u32,
        h[0] as u32, h[1] as u32, h[2] as u32, h[3] as u32,
    ])
}

/// Lane-wise 64-bit product of operands that fit in 32 bits.
#[inline]
pub fn mul_lanes(a: u64x4, b: u64x4) -> u64x4 {
    let a = a.to_array();
    let b = b.to_array();
    u64x4::new([a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]])
}
