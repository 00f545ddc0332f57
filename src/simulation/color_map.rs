use crate::{floating_type_mod::FT, vec3f, V};

pub type Color = V<FT, 3>;

/**
 * Piecewise-linear color ramp over a scalar attribute.
 */
pub struct ColorMap {
    insertions: Vec<(FT, Color)>,
}

impl ColorMap {
    pub fn new(mut insertions: Vec<(FT, Color)>) -> Self {
        insertions.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Self { insertions }
    }

    pub fn get(&self, x: FT) -> Color {
        if x <= self.insertions[0].0 {
            return self.insertions[0].1;
        }
        if x >= self.insertions.last().unwrap().0 {
            return self.insertions.last().unwrap().1;
        }

        for i in 0..self.insertions.len() - 1 {
            if x >= self.insertions[i].0 && x <= self.insertions[i + 1].0 {
                let interp = (x - self.insertions[i].0) / (self.insertions[i + 1].0 - self.insertions[i].0);
                return self.insertions[i].1 + interp * (self.insertions[i + 1].1 - self.insertions[i].1);
            }
        }

        unreachable!("retrieving color for value {} failed", x)
    }

    pub fn get_u8(&self, x: FT) -> V<u8, 3> {
        self.get(x).map(|f| (f * 255.) as u8)
    }
}

pub fn color_map_viridis(min: FT, max: FT) -> ColorMap {
    let stops = [
        (0.0, vec3f(0.267004, 0.004874, 0.329415)),
        (0.125, vec3f(0.282623, 0.140926, 0.457517)),
        (0.25, vec3f(0.253935, 0.265254, 0.529983)),
        (0.375, vec3f(0.206756, 0.371758, 0.553117)),
        (0.5, vec3f(0.163625, 0.471133, 0.558148)),
        (0.625, vec3f(0.127568, 0.566949, 0.550556)),
        (0.75, vec3f(0.134692, 0.658636, 0.517649)),
        (0.875, vec3f(0.266941, 0.748751, 0.440573)),
        (0.9375, vec3f(0.477504, 0.821444, 0.318195)),
        (1.0, vec3f(0.993248, 0.906157, 0.143936)),
    ];

    ColorMap::new(
        stops
            .iter()
            .map(|&(t, color)| (min + (max - min) * t, color))
            .collect(),
    )
}

#[test]
fn color_map_clamps_and_interpolates() {
    let map = color_map_viridis(0., 10.);
    assert_eq!(map.get(-5.), map.get(0.));
    assert_eq!(map.get(15.), map.get(10.));

    let mid = map.get(4.375); // halfway between the 0.375 and 0.5 stops
    let expected = (vec3f(0.206756, 0.371758, 0.553117) + vec3f(0.163625, 0.471133, 0.558148)) * 0.5;
    assert!((mid - expected).norm() < 1e-4);
}
