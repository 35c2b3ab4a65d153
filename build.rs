//! Build script for cufw
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! shown by `cufw --version` and logged at startup.

fn main() {
    // Re-run build if the packager-provided ufw location changes
    println!("cargo:rerun-if-env-changed=CUFW_SYSTEM_UFW_PATH");

    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
