use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;
use std::iter::Sum;
use std::ops::AddAssign;

// A Float trait that captures the requirements we need for the various places
// we need floats. These requirements are imposed by ndarray and rayon.
pub trait SprFloat:
    Float + Debug + Default + AddAssign + Sum + FromPrimitive + Copy + Send + Sync + 'static
{
}

impl SprFloat for f32 {}
impl SprFloat for f64 {}
