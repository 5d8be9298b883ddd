use num_traits::Float;

/// Clamps to [0, 1], mapping NaN to 0.
pub fn clamp_unit<T>(value: T) -> T
where
    T: Float,
{
    if value.is_nan() {
        return T::zero();
    }
    value.max(T::zero()).min(T::one())
}

pub fn lerp<T>(a: T, b: T, t: T) -> T
where
    T: Float,
{
    a + (b - a) * t
}
