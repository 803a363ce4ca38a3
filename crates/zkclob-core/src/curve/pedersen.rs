//! Windowed Pedersen hash over BabyJubjub, bit-compatible with the hash the
//! order circuit's EdDSA verifier recomputes.
//!
//! The message is split into 200-bit segments; each segment is consumed in
//! 4-bit windows (three magnitude bits and a sign bit) that form a signed
//! scalar for that segment's generator.

use ark_ff::MontFp;
use num_bigint::BigUint;

use super::babyjub::{subgroup_order, Point};
use super::field::FieldElement;
use crate::{Error, Result};

const WINDOW_SIZE: usize = 4;
const WINDOWS_PER_SEGMENT: usize = 50;
const BITS_PER_SEGMENT: usize = WINDOW_SIZE * WINDOWS_PER_SEGMENT;

/// Segment generators: `8 · unpack(blake256("PedersenGenerator_<i>_<try>"))`,
/// zero-padded to 32 digits, first try that decodes.
const GENERATORS: [(FieldElement, FieldElement); 10] = [
    (
        MontFp!("10457101036533406547632367118273992217979173478358440826365724437999023779287"),
        MontFp!("19824078218392094440610104313265183977899662750282163392862422243483260492317"),
    ),
    (
        MontFp!("2671756056509184035029146175565761955751135805354291559563293617232983272177"),
        MontFp!("2663205510731142763556352975002641716101654201788071096152948830924149045094"),
    ),
    (
        MontFp!("5802099305472655231388284418920769829666717045250560929368476121199858275951"),
        MontFp!("5980429700218124965372158798884772646841287887664001482443826541541529227896"),
    ),
    (
        MontFp!("7107336197374528537877327281242680114152313102022415488494307685842428166594"),
        MontFp!("2857869773864086953506483169737724679646433914307247183624878062391496185654"),
    ),
    (
        MontFp!("20265828622013100949498132415626198973119240347465898028410217039057588424236"),
        MontFp!("1160461593266035632937973507065134938065359936056410650153315956301179689506"),
    ),
    (
        MontFp!("1487999857809287756929114517587739322941449154962237464737694709326309567994"),
        MontFp!("14017256862867289575056460215526364897734808720610101650676790868051368668003"),
    ),
    (
        MontFp!("14618644331049802168996997831720384953259095788558646464435263343433563860015"),
        MontFp!("13115243279999696210147231297848654998887864576952244320558158620692603342236"),
    ),
    (
        MontFp!("6814338563135591367010655964669793483652536871717891893032616415581401894627"),
        MontFp!("13660303521961041205824633772157003587453809761793065294055279768121314853695"),
    ),
    (
        MontFp!("3571615583211663069428808372184817973703476260057504149923239576077102575715"),
        MontFp!("11981351099832644138306422070127357074117642951423551606012551622164230222506"),
    ),
    (
        MontFp!("18597552580465440374022635246985743886550544261632147935254624835147509493269"),
        MontFp!("6753322320275422086923032033899357299485124665258735666995435957890214041481"),
    ),
];

/// Longest message the generator table covers, in bytes.
pub const MAX_MESSAGE_BYTES: usize = GENERATORS.len() * BITS_PER_SEGMENT / 8;

fn generator(segment: usize) -> Point {
    let (x, y) = GENERATORS[segment];
    Point::new(x, y).expect("pedersen generator constants lie on the curve")
}

/// Hash to a curve point.
pub fn hash_to_point(message: &[u8]) -> Result<Point> {
    if message.is_empty() {
        return Err(Error::encoding("pedersen hash of an empty message"));
    }
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(Error::encoding(format!(
            "pedersen message is {} bytes, at most {} supported",
            message.len(),
            MAX_MESSAGE_BYTES
        )));
    }

    let bits: Vec<bool> = message
        .iter()
        .flat_map(|byte| (0..8).map(move |j| (byte >> j) & 1 == 1))
        .collect();
    let segments = (bits.len() - 1) / BITS_PER_SEGMENT + 1;
    let order = subgroup_order();

    let mut acc = Point::identity();
    for (segment, chunk) in bits.chunks(BITS_PER_SEGMENT).enumerate().take(segments) {
        let mut positive = BigUint::default();
        let mut negative = BigUint::default();

        for (w, window) in chunk.chunks(WINDOW_SIZE).enumerate() {
            let mut magnitude = 1u32;
            for (b, bit) in window.iter().take(WINDOW_SIZE - 1).enumerate() {
                if *bit {
                    magnitude += 1 << b;
                }
            }
            let term = BigUint::from(magnitude) << (w * (WINDOW_SIZE + 1));
            if window.len() == WINDOW_SIZE && window[WINDOW_SIZE - 1] {
                negative += term;
            } else {
                positive += term;
            }
        }

        let scalar = (positive % order + order - negative % order) % order;
        acc = acc + generator(segment).mul_scalar(&scalar);
    }
    Ok(acc)
}

/// Hash to the packed 32-byte form of the result point.
pub fn hash(message: &[u8]) -> Result<[u8; 32]> {
    Ok(hash_to_point(message)?.pack())
}
