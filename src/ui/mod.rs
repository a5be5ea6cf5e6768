//! # UI Module
//!
//! Styling shared by the monitor's sidebar and views.

pub mod styles;
