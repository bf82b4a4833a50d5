//! Display colors for collaborators on the shared canvas.

use super::id::UserId;

/// Palette cursors are drawn from.
pub const PALETTE: [&str; 12] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
    "#469990", "#9a6324", "#800000", "#000075",
];

/// Assign the stable display color for a user.
///
/// Every session of the same user gets the same color, on every instance,
/// without coordination.
pub fn assign_color(user_id: UserId) -> &'static str {
    let idx = (user_id.as_uuid().as_u128() % PALETTE.len() as u128) as usize;
    PALETTE[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_is_stable_per_user() {
        let user = UserId::new();
        assert_eq!(assign_color(user), assign_color(user));
    }

    #[test]
    fn test_color_comes_from_palette() {
        for _ in 0..32 {
            assert!(PALETTE.contains(&assign_color(UserId::new())));
        }
    }
}
