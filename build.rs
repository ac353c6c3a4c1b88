use vergen_gitcl::{Emitter, GitclBuilder};

fn main() {
    let gitcl = GitclBuilder::default()
        .describe(true, true, None)
        .build()
        .expect("failed to configure git build info");

    // Falls back to IDEMPOTENT-prefixed output outside a git checkout (e.g. crates.io
    // source tarballs); `cli.rs` treats that as "use CARGO_PKG_VERSION instead".
    if Emitter::default()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|e| e.emit())
        .is_err()
    {
        println!("cargo:rustc-env=VERGEN_GIT_DESCRIBE=IDEMPOTENT");
    }
}
