use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

fn build_number() -> String {
    // CI sets the number explicitly; local builds fall back to the file
    if let Ok(number) = env::var("PWGCRYPT_BUILD_NUMBER") {
        return number.trim().to_string();
    }
    fs::read_to_string(Path::new("BUILD_NUMBER"))
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|n| n.to_string())
        .unwrap_or_else(|| "0".to_string())
}

fn git_hash() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    let profile = match env::var("PROFILE").as_deref() {
        Ok("release") => "release",
        _ => "development",
    };

    println!("cargo:rustc-env=PWGCRYPT_VERSION={}", version);
    println!("cargo:rustc-env=PWGCRYPT_BUILD={}", build_number());
    println!("cargo:rustc-env=PWGCRYPT_PROFILE={}", profile);
    println!("cargo:rustc-env=PWGCRYPT_GIT_HASH={}", git_hash());

    println!("cargo:rerun-if-changed=BUILD_NUMBER");
    println!("cargo:rerun-if-env-changed=PWGCRYPT_BUILD_NUMBER");
    println!("cargo:rerun-if-env-changed=PROFILE");
}
