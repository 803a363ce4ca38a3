//! BabyJubjub twisted Edwards curve: `a·x² + y² = 1 + d·x²·y²` over the
//! BN254 scalar field.

use std::ops::Add;
use std::sync::OnceLock;

use ark_ff::{Field, MontFp, One, Zero};
use num_bigint::BigUint;

use super::field::{self, FieldElement};
use crate::{Error, Result};

pub const A: FieldElement = MontFp!("168700");
pub const D: FieldElement = MontFp!("168696");

const BASE8_X: FieldElement =
    MontFp!("5299619240641551281634865583518297030282874472190772894086521144482721001553");
const BASE8_Y: FieldElement =
    MontFp!("16950150798460657717958625567821834550301663161624707787222815936182638968203");

const SUBORDER: &str =
    "2736030358979909402780800718157159386076813972158567259200215660948447373041";

/// Order `l` of the prime subgroup generated by [`Point::base8`].
pub fn subgroup_order() -> &'static BigUint {
    static ORDER: OnceLock<BigUint> = OnceLock::new();
    ORDER.get_or_init(|| {
        BigUint::parse_bytes(SUBORDER.as_bytes(), 10).expect("subgroup order constant is decimal")
    })
}

/// An affine point known to lie on the curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    x: FieldElement,
    y: FieldElement,
}

impl Point {
    pub fn new(x: FieldElement, y: FieldElement) -> Result<Self> {
        let point = Self { x, y };
        if !point.is_on_curve() {
            return Err(Error::encoding("point is not on the BabyJubjub curve"));
        }
        Ok(point)
    }

    pub fn identity() -> Self {
        Self {
            x: FieldElement::zero(),
            y: FieldElement::one(),
        }
    }

    /// Generator of the prime-order subgroup.
    pub fn base8() -> Self {
        Self {
            x: BASE8_X,
            y: BASE8_Y,
        }
    }

    pub fn x(&self) -> &FieldElement {
        &self.x
    }

    pub fn y(&self) -> &FieldElement {
        &self.y
    }

    fn is_on_curve(&self) -> bool {
        let x2 = self.x.square();
        let y2 = self.y.square();
        A * x2 + y2 == FieldElement::one() + D * x2 * y2
    }

    pub fn is_identity(&self) -> bool {
        self.x.is_zero() && self.y.is_one()
    }

    pub fn in_subgroup(&self) -> bool {
        self.mul_scalar(subgroup_order()).is_identity()
    }

    pub fn double(&self) -> Self {
        *self + *self
    }

    /// Double-and-add scalar multiplication, most significant bit first.
    pub fn mul_scalar(&self, k: &BigUint) -> Self {
        let base = Projective::from(*self);
        let mut acc = Projective::identity();
        for i in (0..k.bits()).rev() {
            acc = acc.add(&acc);
            if k.bit(i) {
                acc = acc.add(&base);
            }
        }
        acc.to_affine()
    }

    /// Compressed form: little-endian `y` with the sign of `x` in the top bit.
    pub fn pack(&self) -> [u8; 32] {
        let mut out = field::to_le_bytes(&self.y);
        if field::is_negative(&self.x) {
            out[31] |= 0x80;
        }
        out
    }

    pub fn unpack(packed: &[u8; 32]) -> Result<Self> {
        let mut bytes = *packed;
        let negative = bytes[31] & 0x80 != 0;
        bytes[31] &= 0x7f;

        let y = field::from_canonical_le_bytes(&bytes)?;
        let y2 = y.square();
        let denominator = (A - D * y2)
            .inverse()
            .ok_or_else(|| Error::encoding("packed point has no x coordinate"))?;
        let x2 = (FieldElement::one() - y2) * denominator;
        let mut x = x2
            .sqrt()
            .ok_or_else(|| Error::encoding("packed point is not on the curve"))?;
        if field::is_negative(&x) {
            x = -x;
        }
        if negative {
            x = -x;
        }
        Point::new(x, y)
    }

    /// Parse `[x, y]` decimal coordinates.
    pub fn from_decimal_strings(coords: &[String; 2]) -> Result<Self> {
        Point::new(
            field::from_decimal(&coords[0])?,
            field::from_decimal(&coords[1])?,
        )
    }

    pub fn to_decimal_strings(&self) -> [String; 2] {
        [field::to_decimal(&self.x), field::to_decimal(&self.y)]
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Projective::from(self)
            .add(&Projective::from(rhs))
            .to_affine()
    }
}

/// Projective `(X : Y : Z)` coordinates; the unified addition law is
/// complete on this curve so doubling reuses it.
#[derive(Clone, Copy)]
struct Projective {
    x: FieldElement,
    y: FieldElement,
    z: FieldElement,
}

impl Projective {
    fn identity() -> Self {
        Self {
            x: FieldElement::zero(),
            y: FieldElement::one(),
            z: FieldElement::one(),
        }
    }

    fn add(&self, other: &Self) -> Self {
        let a = self.z * other.z;
        let b = a.square();
        let c = self.x * other.x;
        let d = self.y * other.y;
        let e = D * c * d;
        let f = b - e;
        let g = b + e;
        let x3 = a * f * ((self.x + self.y) * (other.x + other.y) - c - d);
        let y3 = a * g * (d - A * c);
        let z3 = f * g;
        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    fn to_affine(self) -> Point {
        let z_inv = self
            .z
            .inverse()
            .expect("Z is nonzero for points on a complete twisted Edwards curve");
        Point {
            x: self.x * z_inv,
            y: self.y * z_inv,
        }
    }
}

impl From<Point> for Projective {
    fn from(p: Point) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: FieldElement::one(),
        }
    }
}
