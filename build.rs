use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=HAND_ENGINE_LIB_DIR");

    // Only the native engine needs a library to link against.
    if env::var_os("CARGO_FEATURE_NATIVE_ENGINE").is_none() {
        return;
    }
    match env::var("HAND_ENGINE_LIB_DIR") {
        Ok(dir) => println!("cargo:rustc-link-search=native={dir}"),
        Err(_) => println!("cargo:warning=HAND_ENGINE_LIB_DIR not set; relying on the system linker path"),
    }
}
