use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git").args(&["describe", "--tags"]).output() {
        let version = String::from_utf8_lossy(&output.stdout);
        let version = version.trim();

        if output.status.success() && !version.is_empty() {
            println!("cargo:rustc-env=DMXCTL_VERSION_ID=dmxctl {}", version);
        }
    }
}
