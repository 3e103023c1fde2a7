//! CLI command implementations

pub(crate) mod common;
pub(crate) mod control;
pub(crate) mod revert;
pub(crate) mod run;
pub(crate) mod show;
pub(crate) mod submit;
