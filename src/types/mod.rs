// ABOUTME: Typed identifiers and validated value types.
// ABOUTME: Image references, exposed port tokens, and engine ids.

mod id;
mod image_ref;
mod port;

pub use id::{ContainerId, Id, NetworkId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use port::{ExposedPort, InternetProtocol, ParsePortError};
