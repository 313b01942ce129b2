//! Terminal video driver on top of notcurses.
//!
//! The notcurses core library is resolved at runtime (with the `dynamic` feature) so the
//! backend costs nothing where it is not installed. The terminal is one display whose single
//! mode is its cell grid; window framebuffers are RGBA surfaces scaled onto the standard plane
//! on every update, and terminal input becomes keyboard, mouse and resize events.

mod driver;
mod error;
pub mod events;
pub mod ffi;
pub mod keys;
pub mod sym;
pub mod terminal;
pub mod testing;
pub mod video;

pub use driver::init;
pub use error::{NotcursesError, Result};
pub use sym::{LoadedSymbols, SymbolLoader, SymbolSource, Symbols};
pub use terminal::{
    CellSize, InitFlags, Input, InputType, MiceEvents, Modifiers, NcTerminal, Terminal,
};
pub use video::NotcursesVideo;

pub const DRIVER_NAME: &str = "notcurses";
pub const DRIVER_DESC: &str = "Notcurses Video Driver";
