//! 2D affine matrix that remembers how it was composed

use std::fmt;

/// One recorded matrix operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatrixOp {
    /// Clockwise in image coordinates (y grows downward).
    Rotate {
        degrees: f32,
        pivot: Option<(f32, f32)>,
    },
    Scale {
        sx: f32,
        sy: f32,
    },
}

impl fmt::Display for MatrixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixOp::Rotate {
                degrees,
                pivot: None,
            } => write!(f, "rotate {degrees}"),
            MatrixOp::Rotate {
                degrees,
                pivot: Some((px, py)),
            } => write!(f, "rotate {degrees} {px} {py}"),
            MatrixOp::Scale { sx, sy } => write!(f, "scale {sx} {sy}"),
        }
    }
}

/// `x' = a*x + b*y + tx`, `y' = c*x + d*y + ty`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Affine {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    tx: f64,
    ty: f64,
}

impl Affine {
    pub(crate) const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    fn from_op(op: MatrixOp) -> Self {
        match op {
            MatrixOp::Scale { sx, sy } => Affine {
                a: f64::from(sx),
                d: f64::from(sy),
                ..Self::IDENTITY
            },
            MatrixOp::Rotate { degrees, pivot } => {
                let (sin, cos) = sin_cos(f64::from(degrees));
                let (px, py) = pivot.map_or((0.0, 0.0), |(x, y)| (f64::from(x), f64::from(y)));
                Affine {
                    a: cos,
                    b: -sin,
                    c: sin,
                    d: cos,
                    tx: px - cos * px + sin * py,
                    ty: py - sin * px - cos * py,
                }
            }
        }
    }

    /// `self * other`: applies `other` first.
    fn concat(&self, other: &Affine) -> Affine {
        Affine {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            tx: self.a * other.tx + self.b * other.ty + self.tx,
            ty: self.c * other.tx + self.d * other.ty + self.ty,
        }
    }

    pub(crate) fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.tx,
            self.c * x + self.d * y + self.ty,
        )
    }

    pub(crate) fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.b * self.ty - self.d * self.tx) * inv,
            ty: (self.c * self.tx - self.a * self.ty) * inv,
        })
    }
}

/// Exact values for quarter turns so right-angle rotations stay pixel exact.
fn sin_cos(degrees: f64) -> (f64, f64) {
    let normalized = degrees.rem_euclid(360.0);
    if normalized == 0.0 {
        (0.0, 1.0)
    } else if normalized == 90.0 {
        (1.0, 0.0)
    } else if normalized == 180.0 {
        (0.0, -1.0)
    } else if normalized == 270.0 {
        (-1.0, 0.0)
    } else {
        normalized.to_radians().sin_cos()
    }
}

/// Affine transform plus the operations that built it.
///
/// `set_*` replaces the whole matrix; `pre_*` composes an operation that is
/// applied to points before the current matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    affine: Affine,
    set_ops: Vec<MatrixOp>,
    pre_ops: Vec<MatrixOp>,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            affine: Affine::IDENTITY,
            set_ops: Vec::new(),
            pre_ops: Vec::new(),
        }
    }

    pub fn set_rotate(&mut self, degrees: f32, pivot: Option<(f32, f32)>) {
        let op = MatrixOp::Rotate { degrees, pivot };
        self.affine = Affine::from_op(op);
        self.set_ops = vec![op];
        self.pre_ops.clear();
    }

    pub fn pre_scale(&mut self, sx: f32, sy: f32) {
        self.pre(MatrixOp::Scale { sx, sy });
    }

    pub fn pre_rotate(&mut self, degrees: f32) {
        self.pre(MatrixOp::Rotate {
            degrees,
            pivot: None,
        });
    }

    fn pre(&mut self, op: MatrixOp) {
        self.affine = self.affine.concat(&Affine::from_op(op));
        self.pre_ops.push(op);
    }

    pub fn set_ops(&self) -> &[MatrixOp] {
        &self.set_ops
    }

    pub fn pre_ops(&self) -> &[MatrixOp] {
        &self.pre_ops
    }

    pub fn is_identity(&self) -> bool {
        self.affine == Affine::IDENTITY
    }

    /// Map a point through the composed transform.
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let (x, y) = self.affine.apply(f64::from(x), f64::from(y));
        (x as f32, y as f32)
    }

    pub(crate) fn affine(&self) -> &Affine {
        &self.affine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close((x, y): (f32, f32), (ex, ey): (f32, f32)) {
        assert!(
            (x - ex).abs() < 1e-4 && (y - ey).abs() < 1e-4,
            "({x}, {y}) != ({ex}, {ey})"
        );
    }

    #[test]
    fn test_identity() {
        let matrix = Matrix::identity();
        assert!(matrix.is_identity());
        assert_eq!(matrix.map_point(3.0, 4.0), (3.0, 4.0));
    }

    #[test]
    fn test_pre_ops_apply_before_set_rotation() {
        let mut matrix = Matrix::identity();
        matrix.set_rotate(90.0, None);
        matrix.pre_scale(2.0, 3.0);

        // scale (1, 1) -> (2, 3), then rotate clockwise -> (-3, 2)
        assert_close(matrix.map_point(1.0, 1.0), (-3.0, 2.0));
        assert_eq!(matrix.set_ops(), &[MatrixOp::Rotate { degrees: 90.0, pivot: None }]);
        assert_eq!(matrix.pre_ops(), &[MatrixOp::Scale { sx: 2.0, sy: 3.0 }]);
    }

    #[test]
    fn test_set_rotate_resets() {
        let mut matrix = Matrix::identity();
        matrix.pre_scale(2.0, 2.0);
        matrix.set_rotate(180.0, Some((5.0, 5.0)));

        assert!(matrix.pre_ops().is_empty());
        assert_close(matrix.map_point(0.0, 0.0), (10.0, 10.0));
        assert_close(matrix.map_point(5.0, 5.0), (5.0, 5.0));
    }

    #[test]
    fn test_quarter_turns_are_exact() {
        let mut matrix = Matrix::identity();
        matrix.pre_rotate(90.0);
        assert_eq!(matrix.map_point(1.0, 0.0), (0.0, 1.0));
    }

    #[test]
    fn test_invert_round_trips() {
        let mut matrix = Matrix::identity();
        matrix.set_rotate(-45.0, Some((10.0, 10.0)));
        matrix.pre_scale(0.5, 2.0);

        let inverse = matrix.affine().invert().unwrap();
        let (x, y) = matrix.affine().apply(7.0, -3.0);
        let (bx, by) = inverse.apply(x, y);
        assert!((bx - 7.0).abs() < 1e-9 && (by + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_op_display() {
        assert_eq!(MatrixOp::Scale { sx: 2.0, sy: 1.5 }.to_string(), "scale 2 1.5");
        assert_eq!(
            MatrixOp::Rotate { degrees: -45.0, pivot: Some((10.0, 10.0)) }.to_string(),
            "rotate -45 10 10"
        );
    }
}
