use std::path::Path;

fn main() {
    println!("cargo:rerun-if-env-changed=MSFS_SDK");

    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    // SimConnect.lib ships with the MSFS SDK, which installs itself under MSFS_SDK
    if let Ok(sdk) = std::env::var("MSFS_SDK") {
        let lib = Path::new(&sdk).join("SimConnect SDK").join("lib");
        println!("cargo:rustc-link-search=native={}", lib.display());
    }
}
