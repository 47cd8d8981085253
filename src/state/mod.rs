pub mod live_table;

pub use live_table::{LiveEntry, LiveTable};
