pub mod event;
pub mod frequency;
pub mod histogram;
pub mod series;
pub mod simulator;
pub mod trace;

#[cfg(test)]
pub(crate) mod testing;
