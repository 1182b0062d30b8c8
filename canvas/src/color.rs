//! Per-client stroke color.

use uuid::Uuid;

/// Pick a random RGB hex color for this client's strokes.
#[must_use]
pub fn random_stroke_color() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    color_from_seed(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
}

/// Format the low 24 bits of `seed` as `#rrggbb`.
#[must_use]
pub fn color_from_seed(seed: u32) -> String {
    format!("#{:06x}", seed & 0x00FF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_masked_and_zero_padded() {
        assert_eq!(color_from_seed(0), "#000000");
        assert_eq!(color_from_seed(0xff), "#0000ff");
        assert_eq!(color_from_seed(0xAB12_3456), "#123456");
    }

    #[test]
    fn random_color_is_rgb_hex() {
        let color = random_stroke_color();
        assert_eq!(color.len(), 7);
        assert!(color.starts_with('#'));
        assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
