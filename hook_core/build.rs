extern crate winres;

fn main() {
  if cfg!(target_os = "windows") {
    let res = winres::WindowsResource::new();
    // can't set an icon because its a DLL, but winres will still pull
    // values out of cargo.toml and stick them in the resource.
    if let Err(e) = res.compile() {
      panic!("winres failed: {}", e);
    }

    // cimgui built with the win32 and dx12 backends exported with C linkage
    println!("cargo:rerun-if-env-changed=CIMGUI_LIB_DIR");
    if let Ok(dir) = std::env::var("CIMGUI_LIB_DIR") {
      println!("cargo:rustc-link-search=native={}", dir);
    }
    println!("cargo:rustc-link-lib=dylib=cimgui");
    println!("cargo:rustc-env=OVERLAY_BUILD_DATE={}", chrono::Local::now().format("%Y-%m-%d"));
  }
}
