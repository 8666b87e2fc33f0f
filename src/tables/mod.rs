//! Lookup-acceleration structures shared by GSUB and GPOS (§4.C).

pub mod classdef;
pub mod coverage;
pub mod device;
pub mod digest;
pub mod lookup;

pub use classdef::ClassDef;
pub use coverage::Coverage;
pub use device::Device;
pub use digest::SetDigest;
pub use lookup::{LookupFlag, SkipPredicate};
