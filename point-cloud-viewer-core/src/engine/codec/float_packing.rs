use bytemuck::{Pod, Zeroable};

/// IEEE-754 single precision exponent bias
const EXPONENT_BIAS: f64 = 127.0;
/// 2^23, the implicit leading mantissa bit
const IMPLICIT_MANTISSA_BIT: f64 = 8_388_608.0;

/// A float spread over four 8-bit channels.
///
/// Channel values are whole numbers in `[0, 255]` stored as `f32` so the
/// struct can be written straight into a `Float32x4` vertex attribute.
/// Layout:
/// - `x`: sign in the high bit, upper seven bits of the biased exponent
/// - `y`: lowest exponent bit in the high bit, top seven mantissa bits
/// - `z`: next eight mantissa bits
/// - `w`: lowest eight mantissa bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PackedFloat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl PackedFloat {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Channels scaled to `[0, 1]` for normalised texture formats.
    pub fn normalized(self) -> [f32; 4] {
        self.to_array().map(|channel| channel / 255.0)
    }
}

/// Pack `value` into four un-normalised byte channels.
///
/// Works arithmetically (log2/floor/mod) instead of reinterpreting bits.
/// Not bit exact: anything below the 23-bit mantissa is dropped.
pub fn pack(value: f64) -> PackedFloat {
    let magnitude = value.abs();
    if magnitude == 0.0 {
        return PackedFloat::ZERO;
    }

    let sign = if -value >= 0.0 { 1.0 } else { 0.0 };

    let mut exponent = magnitude.log2().floor();
    let mantissa = magnitude / exponent.exp2();
    // log2 can round up just below a power of two. The mantissa is
    // left as computed against the undecremented exponent.
    if mantissa < 1.0 {
        exponent -= 1.0;
    }
    exponent += EXPONENT_BIAS;

    let x = sign * 128.0 + (exponent / 2.0).floor();
    let y = (exponent % 2.0) * 128.0 + (mantissa * 128.0).floor() % 128.0;
    let z = (mantissa * 32_768.0).floor() % 256.0;
    let w = (IMPLICIT_MANTISSA_BIT * (mantissa % 2f64.powi(-15))).floor();

    PackedFloat::new(x as f32, y as f32, z as f32, w as f32)
}

/// Inverse of [`pack`].
pub fn unpack(packed: PackedFloat) -> f64 {
    let x = packed.x as f64;
    let y = packed.y as f64;
    let z = packed.z as f64;
    let w = packed.w as f64;

    let sign = if x >= 128.0 { -1.0 } else { 1.0 };
    let exponent = (x % 128.0) * 2.0 + (y / 128.0).floor() - EXPONENT_BIAS;
    if (exponent + EXPONENT_BIAS).abs() < 0.001 {
        return 0.0;
    }

    let mantissa = (y % 128.0) * 65_536.0 + z * 256.0 + w + IMPLICIT_MANTISSA_BIT;
    sign * (exponent - 23.0).exp2() * mantissa
}

/// Pack every value and return the raw bytes, ready for a GPU buffer.
pub fn pack_into_bytes(values: &[f32]) -> Vec<u8> {
    let packed: Vec<PackedFloat> = values.iter().map(|&value| pack(value as f64)).collect();
    bytemuck::cast_slice(&packed).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn zero_packs_to_all_zero_channels() {
        assert_eq!(pack(0.0), PackedFloat::ZERO);
        assert_eq!(pack(-0.0), PackedFloat::ZERO);
        assert_eq!(unpack(PackedFloat::ZERO), 0.0);
    }

    #[test]
    fn one_and_minus_one() {
        assert_eq!(pack(1.0), PackedFloat::new(63.0, 128.0, 0.0, 0.0));
        assert_eq!(pack(-1.0), PackedFloat::new(191.0, 128.0, 0.0, 0.0));
        assert_eq!(unpack(PackedFloat::new(63.0, 128.0, 0.0, 0.0)), 1.0);
        assert_eq!(unpack(PackedFloat::new(191.0, 128.0, 0.0, 0.0)), -1.0);
    }

    #[test]
    fn pi_channels_and_round_trip() {
        assert_eq!(pack(PI), PackedFloat::new(64.0, 73.0, 15.0, 218.0));
        assert_eq!(pack(-PI), PackedFloat::new(192.0, 73.0, 15.0, 218.0));
        assert!((unpack(PackedFloat::new(64.0, 73.0, 15.0, 218.0)) - PI).abs() < 1e-6);
        assert!((unpack(PackedFloat::new(192.0, 73.0, 15.0, 218.0)) + PI).abs() < 1e-6);
    }

    #[test]
    fn powers_of_two_are_exact() {
        for exponent in -20..=20 {
            let value = 2f64.powi(exponent);
            assert_eq!(unpack(pack(value)), value, "2^{exponent}");
            assert_eq!(unpack(pack(-value)), -value, "-2^{exponent}");
        }
    }

    #[test]
    fn relative_error_stays_small() {
        let samples = [
            1.0e-30, 3.7e-9, 0.001, 0.1, 0.3333, 0.75, 1.5, 2.71828, 9.81, 123.456, 65_535.0,
            1.0e7, 4.2e19, 3.0e37,
        ];
        for value in samples {
            for signed in [value, -value] {
                let restored = unpack(pack(signed));
                assert!(
                    ((restored - signed) / signed).abs() < 1e-5,
                    "{signed} came back as {restored}"
                );
            }
        }
    }

    #[test]
    fn negating_only_flips_the_sign_bit() {
        for value in [0.5, 1.0, PI, 42.0, 1.0e-3, 7.5e5] {
            let positive = pack(value);
            let negative = pack(-value);
            assert_eq!(negative.x - positive.x, 128.0);
            assert_eq!(positive.y, negative.y);
            assert_eq!(positive.z, negative.z);
            assert_eq!(positive.w, negative.w);
        }
    }

    #[test]
    fn channels_stay_within_a_byte() {
        for value in [1.0e-37, 0.2, 1.0, 1000.0, 1.0e38] {
            for channel in pack(value).to_array() {
                assert!((0.0..=255.0).contains(&channel));
                assert_eq!(channel.fract(), 0.0);
            }
        }
    }

    #[test]
    fn packed_bytes_match_channel_layout() {
        let bytes = pack_into_bytes(&[1.0, -2.0]);
        assert_eq!(bytes.len(), 2 * std::mem::size_of::<PackedFloat>());
        let first: PackedFloat = bytemuck::pod_read_unaligned(&bytes[..16]);
        let second: PackedFloat = bytemuck::pod_read_unaligned(&bytes[16..]);
        assert_eq!(first, pack(1.0));
        assert_eq!(second, pack(-2.0));
        assert_eq!(first.normalized()[1], 128.0 / 255.0);
    }
}
