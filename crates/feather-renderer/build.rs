use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Bundled shaders, compiled to `<name>.spv`.
const SHADERS: [(&str, &str); 9] = [
    ("mesh_shade.vert", "vertex"),
    ("mesh_shade.frag", "fragment"),
    ("mesh_wire.vert", "vertex"),
    ("mesh_wire.frag", "fragment"),
    ("mesh_wire.geom", "geometry"),
    ("mesh_point.vert", "vertex"),
    ("mesh_point.frag", "fragment"),
    ("mesh_point.geom", "geometry"),
    ("light_wire.frag", "fragment"),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    // ========================================================================
    // SPIR-V Shader Compilation (via glslc from Vulkan SDK)
    // ========================================================================
    // Missing glslc is not fatal: the library then expects precompiled
    // binaries under the configured shader directory.
    let shader_dir = Path::new("shaders");
    if !shader_dir.exists() {
        return;
    }
    for (filename, _) in &SHADERS {
        println!("cargo:rerun-if-changed=shaders/{filename}");
    }

    let Some(glslc) = find_glslc() else {
        println!("cargo:warning=glslc not found; bundled shaders were not compiled");
        return;
    };

    let Ok(dest) = env::var("OUT_DIR") else {
        return;
    };
    let spirv_dir = Path::new(&dest).join("spirv");
    if let Err(e) = fs::create_dir_all(&spirv_dir) {
        println!("cargo:warning=cannot create {}: {e}", spirv_dir.display());
        return;
    }

    let mut any_failed = false;
    for (filename, stage) in &SHADERS {
        let src_path = shader_dir.join(filename);
        let spv_path = spirv_dir.join(format!("{filename}.spv"));
        any_failed |= !compile_shader(&glslc, &src_path, &spv_path, stage, filename);
    }

    if any_failed {
        println!("cargo:warning=Some shaders failed to compile (see warnings above)");
    } else {
        println!("cargo:rustc-env=FEATHER_SPIRV_DIR={}", spirv_dir.display());
    }
}

/// Compile one shader to SPIR-V, forwarding glslc diagnostics as build
/// warnings. Returns whether the binary was written.
fn compile_shader(glslc: &Path, src_path: &Path, spv_path: &Path, stage: &str, filename: &str) -> bool {
    let result = Command::new(glslc)
        .arg(format!("-fshader-stage={stage}"))
        .args(["--target-env=vulkan1.0", "-O", "-o"])
        .arg(spv_path)
        .arg(src_path)
        .output();

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            println!("cargo:warning=glslc: failed to run for {filename}: {e}");
            return false;
        }
    };

    let ok = output.status.success();
    let diagnostics = String::from_utf8_lossy(&output.stderr);
    for line in diagnostics.lines().filter(|l| !l.trim().is_empty()) {
        println!("cargo:warning={filename}: {line}");
    }
    if !ok {
        println!("cargo:warning={filename} not compiled ({})", output.status);
    }
    ok
}

/// glslc on PATH, else the one shipped in `$VULKAN_SDK`.
fn find_glslc() -> Option<PathBuf> {
    let on_path = Command::new("glslc")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success());
    if on_path {
        return Some(PathBuf::from("glslc"));
    }

    let sdk = PathBuf::from(env::var("VULKAN_SDK").ok()?);
    ["Bin/glslc.exe", "bin/glslc"]
        .iter()
        .map(|rel| sdk.join(rel))
        .find(|path| path.exists())
}
