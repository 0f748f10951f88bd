//! # Stats
//!
//! $$
//! \hat f_h(x)=\frac{1}{nh}\sum_{i=1}^n K\left(\frac{x-x_i}{h}\right)
//! $$
//!
//! Kernel density and percentile helpers shared by the estimators.

pub mod kde;
