/// Build script for SpinRender
///
/// # Shader Strategy:
/// - WGSL shaders are embedded with `include_str!` and compiled at runtime through naga,
///   so edits only need to trigger a rebuild.
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=src/renderer/shaders/mesh.vert.wgsl");
    println!("cargo:rerun-if-changed=src/renderer/shaders/mesh.frag.wgsl");
}
