/*!
 * Byte Streams
 * Buffered input/output streams over backend file handles
 */

mod reader;
mod writer;

pub use reader::RgwInputStream;
pub use writer::RgwOutputStream;
