use std::process::Command;

/// Exposes `APP_VERSION` to the crate; published as `/Mgmt/ProcessVersion`.
///
/// Release builds use the package version. Setting `TWCBUS_DEV_BUILD=1`
/// appends the git revision (from `git` or `TWCBUS_GIT_SHA`) so test
/// installs on a GX device can be told apart.
fn main() {
    let base = env!("CARGO_PKG_VERSION");
    let dev_build = std::env::var("TWCBUS_DEV_BUILD")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let version = if dev_build {
        match git_revision() {
            Some(rev) => format!("{}-dev+{}", base, rev),
            None => format!("{}-dev", base),
        }
    } else {
        base.to_string()
    };
    println!("cargo:rustc-env=APP_VERSION={}", version);

    println!("cargo:rerun-if-env-changed=TWCBUS_DEV_BUILD");
    println!("cargo:rerun-if-env-changed=TWCBUS_GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn git_revision() -> Option<String> {
    let from_git = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string());
    from_git
        .or_else(|| std::env::var("TWCBUS_GIT_SHA").ok())
        .filter(|rev| !rev.is_empty())
}
