//! Ready-made lumped models.
//!
//! Each constructor returns an [Equation](crate::simulator::equation::Equation)
//! together with a constant listing its parameter names in model order.

pub mod rlc;
pub mod suspension;
