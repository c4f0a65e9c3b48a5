//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// A cell is unusable when it is an undefined float (NaN) or when it equals
/// the raster's nodata sentinel. The two conditions are independent: a float
/// raster may carry NaN cells and a `-9999` sentinel at the same time.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Fill value used when a source value cannot be represented in this type
    fn fill_value() -> Self;

    /// Whether this value is an undefined number (always false for integers)
    fn is_undefined(&self) -> bool;

    /// Check if this value represents no-data: undefined, or exactly the sentinel
    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        self.is_undefined() || nodata.is_some_and(|nd| *self == nd)
    }

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn fill_value() -> Self {
                <$t>::MIN
            }

            fn is_undefined(&self) -> bool {
                false
            }
        }
    )*};
}

macro_rules! impl_raster_element_float {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn fill_value() -> Self {
                <$t>::NAN
            }

            fn is_undefined(&self) -> bool {
                self.is_nan()
            }
        }
    )*};
}

impl_raster_element_int!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_raster_element_float!(f32, f64);
