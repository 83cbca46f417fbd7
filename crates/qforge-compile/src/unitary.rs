//! Exact 2x2 unitaries for single-qubit composition.
//!
//! Merging and lowering compose matrices rather than rotation angles, so the
//! net effect of a run of gates is preserved up to global phase.

use std::f64::consts::PI;

use num_complex::Complex64;

use qforge_ir::StandardGate;

/// Default tolerance for matrix comparisons.
pub const EPSILON: f64 = 1e-10;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// A 2x2 unitary matrix in row-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unitary2x2 {
    /// `[[a, b], [c, d]]` as `[a, b, c, d]`.
    pub data: [Complex64; 4],
}

impl Unitary2x2 {
    /// Build from row-major entries.
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Self { data: [a, b, c, d] }
    }

    /// Identity.
    pub fn identity() -> Self {
        Self::new(ONE, ZERO, ZERO, ONE)
    }

    /// Hadamard.
    pub fn h() -> Self {
        let s = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
        Self::new(s, s, s, -s)
    }

    /// Pauli-X.
    pub fn x() -> Self {
        Self::new(ZERO, ONE, ONE, ZERO)
    }

    /// Pauli-Y.
    pub fn y() -> Self {
        Self::new(ZERO, Complex64::new(0.0, -1.0), Complex64::new(0.0, 1.0), ZERO)
    }

    /// Pauli-Z.
    pub fn z() -> Self {
        Self::new(ONE, ZERO, ZERO, -ONE)
    }

    /// sqrt(X).
    pub fn sx() -> Self {
        let p = Complex64::new(0.5, 0.5);
        let m = Complex64::new(0.5, -0.5);
        Self::new(p, m, m, p)
    }

    /// sqrt(X) dagger.
    pub fn sxdg() -> Self {
        Self::sx().dagger()
    }

    /// Rotation about X.
    pub fn rx(theta: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        let off = Complex64::new(0.0, -s);
        Self::new(Complex64::new(c, 0.0), off, off, Complex64::new(c, 0.0))
    }

    /// Rotation about Y.
    pub fn ry(theta: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        Self::new(
            Complex64::new(c, 0.0),
            Complex64::new(-s, 0.0),
            Complex64::new(s, 0.0),
            Complex64::new(c, 0.0),
        )
    }

    /// Rotation about Z.
    pub fn rz(theta: f64) -> Self {
        Self::new(
            Complex64::from_polar(1.0, -theta / 2.0),
            ZERO,
            ZERO,
            Complex64::from_polar(1.0, theta / 2.0),
        )
    }

    /// Phase gate `diag(1, e^{iλ})`.
    pub fn p(lambda: f64) -> Self {
        Self::new(ONE, ZERO, ZERO, Complex64::from_polar(1.0, lambda))
    }

    /// `U(θ, φ, λ)`.
    pub fn u(theta: f64, phi: f64, lambda: f64) -> Self {
        let (s, c) = (theta / 2.0).sin_cos();
        Self::new(
            Complex64::new(c, 0.0),
            -Complex64::from_polar(s, lambda),
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda),
        )
    }

    /// Matrix of a single-qubit standard gate; `None` for wider gates.
    pub fn from_gate(gate: &StandardGate) -> Option<Self> {
        let m = match *gate {
            StandardGate::I => Self::identity(),
            StandardGate::X => Self::x(),
            StandardGate::Y => Self::y(),
            StandardGate::Z => Self::z(),
            StandardGate::H => Self::h(),
            StandardGate::S => Self::p(PI / 2.0),
            StandardGate::Sdg => Self::p(-PI / 2.0),
            StandardGate::T => Self::p(PI / 4.0),
            StandardGate::Tdg => Self::p(-PI / 4.0),
            StandardGate::SX => Self::sx(),
            StandardGate::SXdg => Self::sxdg(),
            StandardGate::Rx(t) => Self::rx(t),
            StandardGate::Ry(t) => Self::ry(t),
            StandardGate::Rz(t) => Self::rz(t),
            StandardGate::P(l) => Self::p(l),
            StandardGate::U(t, p, l) => Self::u(t, p, l),
            _ => return None,
        };
        Some(m)
    }

    /// `self * other`: apply `other` first, then `self`.
    #[allow(clippy::many_single_char_names)]
    pub fn mul(&self, other: &Self) -> Self {
        let [a, b, c, d] = self.data;
        let [e, f, g, h] = other.data;
        Self::new(a * e + b * g, a * f + b * h, c * e + d * g, c * f + d * h)
    }

    /// Conjugate transpose.
    pub fn dagger(&self) -> Self {
        let [a, b, c, d] = self.data;
        Self::new(a.conj(), c.conj(), b.conj(), d.conj())
    }

    /// Identity up to global phase, within `tol`.
    pub fn is_identity_within(&self, tol: f64) -> bool {
        let [a, b, c, d] = self.data;
        b.norm() <= tol && c.norm() <= tol && (a - d).norm() <= tol
    }

    /// Identity up to global phase.
    pub fn is_identity(&self) -> bool {
        self.is_identity_within(EPSILON)
    }

    /// Equal to `other` up to a global phase, within `tol`.
    pub fn equiv_up_to_phase(&self, other: &Self, tol: f64) -> bool {
        let pivot = (0..4)
            .max_by(|&i, &j| self.data[i].norm().total_cmp(&self.data[j].norm()))
            .unwrap_or(0);
        if self.data[pivot].norm() <= tol {
            return false;
        }
        let phase = other.data[pivot] / self.data[pivot];
        if (phase.norm() - 1.0).abs() > tol {
            return false;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(&x, &y)| (x * phase - y).norm() <= tol)
    }

    /// ZYZ Euler angles `(α, β, γ, φ)` with `U = e^{iφ} Rz(α) Ry(β) Rz(γ)`.
    ///
    /// `β` lies in `[0, π]`.
    pub fn zyz_decomposition(&self) -> (f64, f64, f64, f64) {
        let [a, b, c, d] = self.data;
        let det = a * d - b * c;
        let phase = det.arg() / 2.0;

        let unphase = Complex64::from_polar(1.0, -phase);
        let (a, b, c) = (a * unphase, b * unphase, c * unphase);

        let beta = 2.0 * c.norm().atan2(a.norm());

        if beta.abs() < EPSILON {
            let sum = -2.0 * a.arg();
            return (sum / 2.0, 0.0, sum / 2.0, phase);
        }
        if (beta - PI).abs() < EPSILON {
            let diff = -2.0 * (-b).arg();
            return (diff / 2.0, PI, -diff / 2.0, phase);
        }

        let sum = -2.0 * a.arg();
        let diff = 2.0 * c.arg();
        (f64::midpoint(sum, diff), beta, (sum - diff) / 2.0, phase)
    }

    /// `(θ, φ, λ)` such that `U(θ, φ, λ)` equals `self` up to global phase.
    pub fn to_u_angles(&self) -> (f64, f64, f64) {
        let (alpha, beta, gamma, _) = self.zyz_decomposition();
        (
            beta,
            Self::normalize_angle(alpha),
            Self::normalize_angle(gamma),
        )
    }

    /// Wrap an angle into `(-π, π]`; non-finite input maps to 0.
    pub fn normalize_angle(angle: f64) -> f64 {
        if !angle.is_finite() {
            return 0.0;
        }
        let mut a = angle.rem_euclid(2.0 * PI);
        if a > PI {
            a -= 2.0 * PI;
        }
        a
    }
}

impl Default for Unitary2x2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Unitary2x2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Unitary2x2::mul(&self, &rhs)
    }
}

/// Compose single-qubit gates given in time order.
pub fn compose<'a>(gates: impl IntoIterator<Item = &'a StandardGate>) -> Option<Unitary2x2> {
    gates
        .into_iter()
        .try_fold(Unitary2x2::identity(), |acc, g| {
            Unitary2x2::from_gate(g).map(|m| m * acc)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn test_squares_are_identity() {
        for m in [Unitary2x2::h(), Unitary2x2::x(), Unitary2x2::y(), Unitary2x2::z()] {
            assert!((m * m).is_identity());
        }
    }

    #[test]
    fn test_sx_squared_is_x() {
        let sx = Unitary2x2::sx();
        assert!((sx * sx).equiv_up_to_phase(&Unitary2x2::x(), TOL));
        assert!((sx * Unitary2x2::sxdg()).is_identity());
    }

    #[test]
    fn test_zyz_reconstructs() {
        let cases = [
            Unitary2x2::h(),
            Unitary2x2::sx(),
            Unitary2x2::y(),
            Unitary2x2::u(0.3, 1.1, -0.4),
            Unitary2x2::rz(0.7),
            Unitary2x2::rx(PI),
        ];
        for m in cases {
            let (alpha, beta, gamma, _) = m.zyz_decomposition();
            let rebuilt = Unitary2x2::rz(alpha) * Unitary2x2::ry(beta) * Unitary2x2::rz(gamma);
            assert!(rebuilt.equiv_up_to_phase(&m, TOL), "{m:?}");
        }
    }

    #[test]
    fn test_u_angles_roundtrip() {
        let m = Unitary2x2::h() * Unitary2x2::p(PI / 4.0) * Unitary2x2::sx();
        let (t, p, l) = m.to_u_angles();
        assert!(Unitary2x2::u(t, p, l).equiv_up_to_phase(&m, TOL));
    }

    #[test]
    fn test_compose_time_order() {
        // h then s: S·H, not H·S
        let m = compose(&[StandardGate::H, StandardGate::S]).unwrap();
        let expected = Unitary2x2::p(PI / 2.0) * Unitary2x2::h();
        assert!(m.equiv_up_to_phase(&expected, TOL));
        assert!(!m.equiv_up_to_phase(&(Unitary2x2::h() * Unitary2x2::p(PI / 2.0)), TOL));
    }

    #[test]
    fn test_compose_rejects_two_qubit() {
        assert!(compose(&[StandardGate::CX]).is_none());
    }

    #[test]
    fn test_phase_difference_is_equivalent() {
        // Rz(θ) and P(θ) differ by e^{-iθ/2}
        assert!(Unitary2x2::rz(0.9).equiv_up_to_phase(&Unitary2x2::p(0.9), TOL));
        assert!(!Unitary2x2::rz(0.9).equiv_up_to_phase(&Unitary2x2::rx(0.9), TOL));
    }

    #[test]
    fn test_normalize_angle() {
        assert!((Unitary2x2::normalize_angle(3.0 * PI) - PI).abs() < TOL);
        assert!((Unitary2x2::normalize_angle(-PI / 2.0) + PI / 2.0).abs() < TOL);
        assert_eq!(Unitary2x2::normalize_angle(f64::NAN), 0.0);
    }
}
