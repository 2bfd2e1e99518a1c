fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // ESP-IDF link arguments are only needed when building the firmware image.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
