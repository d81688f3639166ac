//! Sample representations the shim can carry.

/// A PCM sample type with a well-defined silence value.
///
/// `SILENCE` is the equilibrium of the representation: zero for signed and
/// floating-point formats, the midpoint for unsigned ones. It is what the
/// callback writes into any part of the output slot it could not fill.
pub trait Sample: Copy + Send + 'static {
    const SILENCE: Self;
}

macro_rules! impl_sample {
    ($($ty:ty => $silence:expr),* $(,)?) => {
        $(
            impl Sample for $ty {
                const SILENCE: Self = $silence;
            }
        )*
    };
}

impl_sample! {
    f32 => 0.0,
    f64 => 0.0,
    i8 => 0,
    i16 => 0,
    i32 => 0,
    u8 => 0x80,
    u16 => 0x8000,
    u32 => 0x8000_0000,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_silence_is_the_midpoint() {
        assert_eq!(u8::SILENCE, 128);
        assert_eq!(u16::SILENCE, 32_768);
        assert_eq!(u32::SILENCE, 1 << 31);
    }

    #[test]
    fn signed_and_float_silence_is_zero() {
        assert_eq!(i16::SILENCE, 0);
        assert_eq!(i32::SILENCE, 0);
        assert_eq!(f32::SILENCE, 0.0);
    }
}
