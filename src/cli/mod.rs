pub mod console;
pub mod progress;

pub use console::Console;
pub use progress::{build_steps, watch_steps};
