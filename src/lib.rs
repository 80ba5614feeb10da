pub mod cli;
pub mod render;
pub mod run;
pub mod trace;
pub mod util;
