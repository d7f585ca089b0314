// ABOUTME: Compile-fail test verifying only a started launch yields a final id.
// ABOUTME: into_id() is not available on a merely created launch.

use cairn::launch::{Created, Launch};

fn finish(created: Launch<Created>) {
    let _id = created.into_id(); // ERROR: no method `into_id` on Launch<Created>
}

fn main() {
    let _ = finish;
}
