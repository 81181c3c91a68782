use std::error::Error;
use std::fs;
use std::process::{Command, Output};
use tempfile::tempdir;

fn pwgcrypt_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pwgcrypt"))
}

fn run(args: &[&str]) -> Result<Output, Box<dyn Error>> {
    Ok(pwgcrypt_command().args(args).output()?)
}

#[test]
fn cli_encrypt_decrypt_flow() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("secret.txt");
    let sealed = dir.path().join("secret.pwg");
    let recovered = dir.path().join("recovered.txt");

    fs::write(&input, "Hello, world!")?;

    let encrypt = run(&[
        "encrypt",
        "--password",
        "correct-horse",
        input.to_str().unwrap(),
        sealed.to_str().unwrap(),
    ])?;
    assert!(
        encrypt.status.success(),
        "encrypt command failed: {}",
        String::from_utf8_lossy(&encrypt.stderr)
    );
    assert!(String::from_utf8(encrypt.stdout)?.contains("Encrypted"));

    let armored = fs::read_to_string(&sealed)?;
    assert!(!armored.contains("Hello"));

    let decrypt = run(&[
        "decrypt",
        "--password",
        "correct-horse",
        sealed.to_str().unwrap(),
        recovered.to_str().unwrap(),
    ])?;
    assert!(
        decrypt.status.success(),
        "decrypt command failed: {}",
        String::from_utf8_lossy(&decrypt.stderr)
    );
    assert_eq!(fs::read_to_string(&recovered)?, "Hello, world!");

    let wrong = run(&[
        "decrypt",
        "--password",
        "wrong",
        sealed.to_str().unwrap(),
        dir.path().join("nope.txt").to_str().unwrap(),
    ])?;
    assert!(!wrong.status.success(), "wrong password must fail");
    assert!(String::from_utf8_lossy(&wrong.stderr).contains("Invalid password"));

    Ok(())
}

#[test]
fn cli_legacy_format_and_config() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("pwgcrypt.json");
    let seed = dir.path().join("seed.bin");
    let input = dir.path().join("note.txt");
    let sealed = dir.path().join("note.pwg");
    let recovered = dir.path().join("note.out");

    fs::write(
        &config,
        format!(
            r#"{{ "cipher": "chacha20", "seed_file": {:?}, "randomize_on_start": true }}"#,
            seed.to_str().unwrap()
        ),
    )?;
    fs::write(&input, "written in the old format")?;

    let encrypt = run(&[
        "--config",
        config.to_str().unwrap(),
        "encrypt",
        "--password",
        "pw",
        "--format",
        "v0",
        input.to_str().unwrap(),
        sealed.to_str().unwrap(),
    ])?;
    assert!(
        encrypt.status.success(),
        "encrypt failed: {}",
        String::from_utf8_lossy(&encrypt.stderr)
    );
    assert_eq!(fs::read(&seed)?.len(), 128, "seed file is rewritten after use");

    let decrypt = run(&[
        "decrypt",
        "--password",
        "pw",
        sealed.to_str().unwrap(),
        recovered.to_str().unwrap(),
    ])?;
    assert!(decrypt.status.success());
    assert_eq!(fs::read_to_string(&recovered)?, "written in the old format");

    Ok(())
}

#[test]
fn cli_random_prints_hex() -> Result<(), Box<dyn Error>> {
    let output = run(&["random", "--count", "24", "--cipher", "chacha20"])?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let line = stdout.trim();
    assert_eq!(line.len(), 48);
    assert!(line.chars().all(|c| c.is_ascii_hexdigit()));

    let bad = run(&["random", "--cipher", "rc4"])?;
    assert!(!bad.status.success());
    Ok(())
}

#[test]
fn cli_seed_creates_and_refreshes() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let seed = dir.path().join("seed.bin");

    let first = run(&["seed", seed.to_str().unwrap()])?;
    assert!(first.status.success());
    assert!(String::from_utf8(first.stdout)?.contains("Created"));
    let before = fs::read(&seed)?;

    let second = run(&["seed", seed.to_str().unwrap()])?;
    assert!(second.status.success());
    assert!(String::from_utf8(second.stdout)?.contains("Refreshed"));
    assert_ne!(before, fs::read(&seed)?);
    Ok(())
}

#[test]
fn version_flag_prints_build_information() -> Result<(), Box<dyn Error>> {
    let output = run(&["--version"])?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("pwgcrypt "), "unexpected version line: {}", stdout);
    assert!(stdout.contains("build"));
    Ok(())
}

#[test]
fn running_without_subcommand_displays_help() -> Result<(), Box<dyn Error>> {
    let output = pwgcrypt_command().output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "help text expected: {}", stdout);
    Ok(())
}
