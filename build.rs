use std::process::Command;

/// Run a git command, returning its trimmed stdout if it succeeded
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    // Stamped into the startup banner
    if let Some(desc) = git(&["describe", "--always", "--dirty", "--tags"]) {
        println!("cargo:rustc-env=GIT_DESC={}", desc);
    }
    if let Some(hash) = git(&["rev-parse", "--short", "HEAD"]) {
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rustc-env=BUILD_TIME={}", chrono::Utc::now().to_rfc3339());
    println!("cargo:rerun-if-changed=build.rs");
}
