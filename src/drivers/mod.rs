pub mod atmosphere;
pub mod crsf;
pub mod dshot;
pub mod energy;
pub mod fan;
pub mod filter;
pub mod regime;
pub mod safety;
pub mod wind;
