pub mod console;
pub mod error;
pub mod io;
pub mod lump;
pub mod pc;
pub mod polygon;
pub mod resolve;
pub mod texture;
pub mod types;

extern crate bsp_derive;
extern crate bytes;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate typed_ints;
#[macro_use]
extern crate log;

#[cfg(test)]
pub(crate) mod test_util;
