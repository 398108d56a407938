#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::let_and_return)]
#![allow(clippy::new_without_default)]

pub mod util;
pub mod web;
