pub use flotilla_core::*;
