fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    let well_known = protoc_bin_vendored::include_path()?;

    println!("cargo:rerun-if-changed=proto/ledger/v1/ledger.proto");
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile(
            &["proto/ledger/v1/ledger.proto"],
            &[std::path::PathBuf::from("proto"), well_known],
        )?;
    Ok(())
}
