#[macro_use]
extern crate approx;

mod cube_decomposition;
mod heightfield_extraction;
