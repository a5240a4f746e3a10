/// Cumulative referral bonus credits for a lifetime referral count.
///
/// Tier table: 0 → 0, 1 → 3, 2 → 8, everything else → 15.
///
/// The catch-all arm covers the n ≥ 3 plateau and, deliberately, negative
/// input: out-of-table counts fall to the plateau rather than clamping to
/// zero. Counts are unsigned at the store level so no reachable path
/// produces a negative value; the quirk is pinned by tests so changing it
/// is a deliberate choice, not an accident.
pub fn cumulative_bonus(count: i64) -> u32 {
    match count {
        0 => 0,
        1 => 3,
        2 => 8,
        _ => 15,
    }
}

/// Credits newly earned when a referrer's count moves `old` → `new`.
///
/// Saturating: once the tiers plateau, further referrals award 0.
pub fn incremental_bonus(old: i64, new: i64) -> u32 {
    cumulative_bonus(new).saturating_sub(cumulative_bonus(old))
}
