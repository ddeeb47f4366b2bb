fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "gen-proto")]
    {
        println!("cargo:warning=Feature 'gen-proto' enabled: Running protobuf codegen");

        tonic_build::configure()
            .build_server(true)
            .build_client(true)
            .out_dir("src/proto")
            .compile_protos(&["proto/greet.proto"], &["proto/"])?;

        // Instruct cargo to rerun this build script if any of the proto files change
        println!("cargo:rerun-if-changed=proto");
    }
    Ok(())
}
