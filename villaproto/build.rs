fn main() -> std::io::Result<()> {
    // `vila_bot.rs` is checked in. Only regenerate it when `GENERATE_PROTO`
    // is set, so a normal build does not need `protoc`.
    if std::env::var("GENERATE_PROTO").is_err() {
        println!("cargo:rerun-if-changed=build.rs");
        return Ok(());
    }

    println!("cargo:rerun-if-changed=src/command.proto");
    println!("cargo:warning=GENERATE_PROTO is set, regenerating command definitions...");

    let mut config = prost_build::Config::new();
    config.type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]");
    config.out_dir("src/");
    config.compile_protos(&["src/command.proto"], &["src/"])?;
    Ok(())
}
