fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate client and server code from the shared proto file
    tonic_prost_build::configure().compile_protos(&["proto/flock.proto"], &["proto"])?;
    Ok(())
}
