/// Offset from a receiver toward the nearest defender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparationVector {
    pub dx: f64,
    pub dy: f64,
    /// Degrees in [0, 360), counter-clockwise from the +x axis.
    pub angle: f64,
}

impl SeparationVector {
    pub fn between(receiver: (f64, f64), defender: (f64, f64)) -> Self {
        let dx = defender.0 - receiver.0;
        let dy = defender.1 - receiver.1;
        Self {
            dx,
            dy,
            angle: bearing_degrees(dx, dy),
        }
    }
}

pub fn bearing_degrees(dx: f64, dy: f64) -> f64 {
    let deg = dy.atan2(dx).to_degrees();
    if deg < 0.0 { deg + 360.0 } else { deg }
}

pub fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
