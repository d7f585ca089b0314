// ABOUTME: Compile-fail test verifying a pending launch cannot be started.
// ABOUTME: start() only exists once the container has been created.

use cairn::launch::Launch;
use cairn::runtime::{ContainerConfig, ContainerOps};
use cairn::types::ImageRef;

async fn try_start(runtime: &dyn ContainerOps) {
    let image = ImageRef::parse("redis:7").unwrap();
    let pending = Launch::new(ContainerConfig::new(image));
    let _ = pending.start(runtime).await; // ERROR: no method `start` on Launch<Pending>
}

fn main() {
    let _ = try_start;
}
