#![allow(clippy::upper_case_acronyms)]

#[macro_use]
extern crate bitflags;

pub mod gb;
