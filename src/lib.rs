pub mod aggregate;
pub mod bench;
pub mod check;
pub mod classify;
pub mod ext;
pub mod extract;
pub mod format;
pub mod parse;
pub mod slil;
pub mod som;
pub mod spills;
pub mod split;
pub mod stats;
