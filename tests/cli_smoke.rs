use std::path::PathBuf;

use captioner::{FontAsset, FontHandle};

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_captioner")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "captioner.exe"
            } else {
                "captioner"
            });
            p
        })
}

#[test]
fn cli_render_writes_png() {
    if FontHandle::load(&FontAsset::SystemDefault).is_err() {
        eprintln!("skipping: no system font available");
        return;
    }
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();

    let cfg_path = dir.join("style.json");
    let out_path = dir.join("out.png");
    let _ = std::fs::remove_file(&out_path);
    std::fs::write(&cfg_path, r#"{ "font_size": 24, "scale_factor": 2, "margin": 6 }"#).unwrap();

    let out_arg = out_path.to_string_lossy().to_string();
    let cfg_arg = cfg_path.to_string_lossy().to_string();
    let status = std::process::Command::new(exe())
        .args(["render", "Hello from the CLI", "--width", "320", "--config"])
        .arg(cfg_arg.as_str())
        .args(["--tracking", "-1", "--out"])
        .arg(out_arg.as_str())
        .status()
        .unwrap();

    assert!(status.success());
    let img = image::open(&out_path).unwrap().to_rgba8();
    assert_eq!(img.width(), 320);
    assert!(img.height() > 12);
}

#[test]
fn cli_rejects_invalid_config() {
    let dir = PathBuf::from("target").join("cli_smoke_invalid");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("never.png");

    let out_arg = out_path.to_string_lossy().to_string();
    let output = std::process::Command::new(exe())
        .args(["render", "x", "--scale", "0", "--out"])
        .arg(out_arg.as_str())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("scale_factor"));
    assert!(!out_path.exists());
}
