use std::{env, fs::File, io::Write, path::Path};

fn main() {
    // write build time info
    built::write_built_file().expect("Failed to acquire build-time information");
    // unconditionally rerun this build script so build time info is always up to date
    #[cfg(not(debug_assertions))]
    println!("cargo:rerun-if-changed=foobaz");

    // the following lines allow overriding the default contraction parameters through env vars.
    // If the env var is set, we enable a cfg flag.
    // `ContractorParams::default` either uses the hardcoded value or includes the file created here.
    let out_dir = env::var("OUT_DIR").unwrap();

    for (var, flag) in [
        ("CH_FLUSH_THRESHOLD", "override_ch_flush_threshold"),
        ("CH_SIMULATION_WITNESS_LIMIT", "override_ch_simulation_witness_limit"),
        ("CH_CONTRACTION_WITNESS_LIMIT", "override_ch_contraction_witness_limit"),
    ] {
        if let Ok(val) = env::var(var) {
            let dest_path = Path::new(&out_dir).join(var);
            let mut f = File::create(&dest_path).unwrap();
            f.write_all(val.as_bytes()).unwrap();
            println!("cargo:rustc-cfg={}", flag);
        }
        println!("cargo:rustc-check-cfg=cfg({})", flag);
        println!("cargo:rerun-if-env-changed={}", var);
    }
}
