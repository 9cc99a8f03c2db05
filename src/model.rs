//! The driver behaviour models: IDM car-following and MOBIL lane changing.

pub mod idm;
pub mod mobil;

pub use mobil::LaneChangeContext;
