use serde::{Deserialize, Serialize};

use crate::buffer::{IndexField, PixelBuffer, CHANNELS};

/// False-color palette for index visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Green for vegetation, brown for soil.
    Green,
    /// Red-to-green gradient.
    Jet,
    /// Viridis-like dark-blue-to-green gradient.
    Viridis,
}

/// Map a [0, 1] index field to a false-color RGB visualization buffer.
///
/// Pure and stateless; output dimensions match the field. Index values are
/// scaled to v in 0-255 and each palette applies fixed per-channel linear
/// formulas:
/// - green:   R = 139 - 0.5*v, G = v, B = 69 - 0.3*v
/// - jet:     R = 255 - v,     G = v, B = 0
/// - viridis: R = 0.3*v,       G = v, B = 255 - 0.5*v
pub fn render_heatmap(field: &IndexField, colormap: Colormap) -> PixelBuffer {
    let (width, height) = field.dimensions();
    let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);

    for &value in field.values() {
        let v = (value.clamp(0.0, 1.0) * 255.0) as u8;
        let pixel = match colormap {
            Colormap::Green => [
                139u8.saturating_sub((v as f32 * 0.5) as u8),
                v,
                69u8.saturating_sub((v as f32 * 0.3) as u8),
            ],
            Colormap::Jet => [255 - v, v, 0],
            Colormap::Viridis => [
                (v as f32 * 0.3) as u8,
                v,
                255 - (v as f32 * 0.5) as u8,
            ],
        };
        data.extend_from_slice(&pixel);
    }

    PixelBuffer::new(width, height, data).expect("field dimensions are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_value_field() -> IndexField {
        IndexField::from_data(2, 1, vec![0.0, 1.0])
    }

    #[test]
    fn output_dimensions_match_field() {
        let field = IndexField::from_data(7, 3, vec![0.5; 21]);
        for cm in [Colormap::Green, Colormap::Jet, Colormap::Viridis] {
            let out = render_heatmap(&field, cm);
            assert_eq!(out.dimensions(), (7, 3));
        }
    }

    #[test]
    fn green_palette_endpoints() {
        let out = render_heatmap(&two_value_field(), Colormap::Green);
        assert_eq!(out.get(0, 0), [139, 0, 69]); // bare soil
        assert_eq!(out.get(1, 0), [12, 255, 0]); // full vegetation
    }

    #[test]
    fn jet_palette_endpoints() {
        let out = render_heatmap(&two_value_field(), Colormap::Jet);
        assert_eq!(out.get(0, 0), [255, 0, 0]);
        assert_eq!(out.get(1, 0), [0, 255, 0]);
    }

    #[test]
    fn viridis_palette_endpoints() {
        let out = render_heatmap(&two_value_field(), Colormap::Viridis);
        assert_eq!(out.get(0, 0), [0, 0, 255]);
        assert_eq!(out.get(1, 0), [76, 255, 128]);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let field = IndexField::from_data(2, 1, vec![-0.5, 1.5]);
        let out = render_heatmap(&field, Colormap::Jet);
        assert_eq!(out.get(0, 0), [255, 0, 0]);
        assert_eq!(out.get(1, 0), [0, 255, 0]);
    }
}
