extern crate tonic_build;

fn main() {
    let descriptor_path = std::path::PathBuf::from(std::env::var("OUT_DIR").unwrap()).join("dinosaur_fossil_descriptor.bin");
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(descriptor_path)
        .compile(
            &["proto/dinosaur.proto", "proto/fossil.proto"],
            &["proto"],
        )
        .unwrap_or_else(|e| panic!("dinosaur/fossil protobuf compilation failed: {}", e));
}
