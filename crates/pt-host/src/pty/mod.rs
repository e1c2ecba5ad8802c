//! Pseudo-terminal allocation and child spawning

mod master;
mod spawn;

pub use master::{open_master, PtyMaster, PtyReader};
pub use spawn::{spawn_in_pty, spawn_piped, PipedChild, PtyChild, PtyOptions};
