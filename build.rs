use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    // Reproducible builds pin the stamp through `SOURCE_DATE_EPOCH`.
    let timestamp = match env::var("SOURCE_DATE_EPOCH") {
        Ok(epoch) => epoch,
        Err(_) => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|_| "0".to_string()),
    };

    println!("cargo:rustc-env=SSEGUI_BUILD_TIMESTAMP={timestamp}");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=build.rs");
}
